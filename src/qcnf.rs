//! The authoritative formula store.
//!
//! Owns variables (with scopes and occurrence lists), clauses (with lazy
//! deletion through the active-clause vector), and a transactional undo
//! stack. All mutation of the formula goes through this store so that a
//! single [`QCNF::pop`] restores a consistent state.

use crate::{
    datastructure::{UndoStack, VarVec},
    literal::{Lit, Var},
    quantifier::{QuantTy, ScopeId},
};
use std::fmt::Display;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QcnfError {
    #[error("variable {0} is bound twice in the quantifier prefix")]
    DuplicateVar(Var),

    #[error("clause iterator was invalidated by a concurrent modification")]
    StaleIterator,

    #[error("the quantifier prefix has more than two alternations")]
    UnsupportedPrefix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClauseId(u32);

impl ClauseId {
    pub(crate) fn as_index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(idx: usize) -> Self {
        Self(idx.try_into().expect("clause count fits u32"))
    }
}

impl Display for ClauseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Clause {
    id: ClauseId,
    lits: Vec<Lit>,
    original: bool,
    is_cube: bool,
    active: bool,
    in_active_vector: bool,
}

impl Clause {
    pub(crate) fn lits(&self) -> &[Lit] {
        &self.lits
    }

    pub(crate) fn iter(&self) -> std::slice::Iter<'_, Lit> {
        self.lits.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.lits.len()
    }

    pub(crate) fn contains(&self, lit: Lit) -> bool {
        self.lits.contains(&lit)
    }

    pub(crate) fn is_original(&self) -> bool {
        self.original
    }

    pub(crate) fn is_cube(&self) -> bool {
        self.is_cube
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }
}

impl Display for Clause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &lit in &self.lits {
            write!(f, "{lit} ")?;
        }
        write!(f, "0")
    }
}

impl<'a> IntoIterator for &'a Clause {
    type Item = &'a Lit;
    type IntoIter = std::slice::Iter<'a, Lit>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct VarInfo {
    scope: ScopeId,
    is_universal: bool,
    /// user-supplied variable, as opposed to a solver-introduced helper
    original: bool,
    pos_occs: Vec<ClauseId>,
    neg_occs: Vec<ClauseId>,
    activity: f32,
}

impl VarInfo {
    fn new(scope: ScopeId, is_universal: bool, original: bool) -> Self {
        Self {
            scope,
            is_universal,
            original,
            pos_occs: Vec::new(),
            neg_occs: Vec::new(),
            activity: 0.0,
        }
    }

    pub(crate) fn scope(&self) -> ScopeId {
        self.scope
    }

    pub(crate) fn is_universal(&self) -> bool {
        self.is_universal
    }

    pub(crate) fn is_existential(&self) -> bool {
        !self.is_universal
    }

    pub(crate) fn is_original(&self) -> bool {
        self.original
    }

    fn occs(&self, lit: Lit) -> &[ClauseId] {
        if lit.is_negative() {
            &self.neg_occs
        } else {
            &self.pos_occs
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum QcnfOp {
    NewVar(Var),
    NewClause(ClauseId),
}

/// Cursor into the active-clause vector; see [`QCNF::next_active`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct ClauseIter {
    idx: usize,
    token: u64,
}

#[derive(Debug, Default)]
pub struct QCNF {
    vars: VarVec<Option<VarInfo>>,
    clauses: Vec<Clause>,
    /// the active-clause vector: contains every active clause exactly once
    active: Vec<ClauseId>,
    /// bumped on every clause addition or removal, invalidates iterators
    token: u64,
    /// buffer for the clause currently under construction
    pending: Vec<Lit>,
    /// the quantifier prefix as declared (consecutive equal quantifiers merged)
    blocks: Vec<(QuantTy, Vec<Var>)>,
    seen_universal: bool,
    seen_inner_existential: bool,
    undo: UndoStack<QcnfOp>,
    /// set when closing a clause leaves it empty
    empty_clause: Option<ClauseId>,
    /// number of literals removed by universal reduction
    universal_reductions: u64,
}

impl QCNF {
    /// Declares a new variable at the given scope.
    ///
    /// # Errors
    ///
    /// Fails with [`QcnfError::DuplicateVar`] if the variable is already
    /// bound.
    pub(crate) fn new_var(
        &mut self,
        var: Var,
        scope: ScopeId,
        is_universal: bool,
    ) -> Result<(), QcnfError> {
        self.vars.ensure(var);
        if self.vars[var].is_some() {
            return Err(QcnfError::DuplicateVar(var));
        }
        self.vars[var] = Some(VarInfo::new(scope, is_universal, true));
        self.undo.record(QcnfOp::NewVar(var));
        Ok(())
    }

    /// Binds `vars` in a new (or merged) quantifier block.
    ///
    /// # Errors
    ///
    /// Fails when a variable is bound twice or when the block introduces a
    /// third quantifier alternation.
    pub fn quantify(&mut self, quant: QuantTy, vars: &[Var]) -> Result<(), QcnfError> {
        let scope = match quant {
            QuantTy::Exists => {
                if self.seen_universal {
                    self.seen_inner_existential = true;
                    ScopeId::INNER
                } else {
                    ScopeId::OUTER
                }
            }
            QuantTy::Forall => {
                if self.seen_inner_existential {
                    return Err(QcnfError::UnsupportedPrefix);
                }
                self.seen_universal = true;
                ScopeId::UNIVERSAL
            }
        };
        for &var in vars {
            self.new_var(var, scope, quant == QuantTy::Forall)?;
        }
        match self.blocks.last_mut() {
            Some((last, bound)) if *last == quant => bound.extend_from_slice(vars),
            _ => self.blocks.push((quant, vars.to_owned())),
        }
        Ok(())
    }

    /// Free variables are treated as outermost existentials.
    fn ensure_var(&mut self, var: Var) {
        self.vars.ensure(var);
        if self.vars[var].is_none() {
            debug!("free variable {var}, binding as outer existential");
            self.vars[var] = Some(VarInfo::new(ScopeId::OUTER, false, true));
            self.undo.record(QcnfOp::NewVar(var));
            match self.blocks.first_mut() {
                Some((QuantTy::Exists, bound)) => bound.push(var),
                _ => self.blocks.insert(0, (QuantTy::Exists, vec![var])),
            }
        }
    }

    pub(crate) fn var_info(&self, var: Var) -> &VarInfo {
        self.vars[var].as_ref().expect("all variables are bound")
    }

    pub(crate) fn is_universal(&self, var: Var) -> bool {
        self.var_info(var).is_universal
    }

    pub(crate) fn is_existential(&self, var: Var) -> bool {
        !self.is_universal(var)
    }

    pub(crate) fn scope_of(&self, var: Var) -> ScopeId {
        self.var_info(var).scope
    }

    pub(crate) fn occs_of_lit(&self, lit: Lit) -> &[ClauseId] {
        self.var_info(lit.var()).occs(lit)
    }

    pub(crate) fn occurrence_count(&self, var: Var) -> usize {
        let info = self.var_info(var);
        info.pos_occs.len() + info.neg_occs.len()
    }

    pub(crate) fn vars(&self) -> impl Iterator<Item = (Var, &VarInfo)> {
        self.vars.iter().filter_map(|(var, info)| Some((var, info.as_ref()?)))
    }

    pub(crate) fn var_count(&self) -> usize {
        self.vars.get_var_count()
    }

    pub(crate) fn has_universals(&self) -> bool {
        self.seen_universal
    }

    pub(crate) fn activity(&self, var: Var) -> f32 {
        self.var_info(var).activity
    }

    pub(crate) fn add_activity(&mut self, var: Var, summand: f32) {
        let info = self.vars[var].as_mut().expect("all variables are bound");
        info.activity += summand;
    }

    pub(crate) fn scale_activity(&mut self, var: Var, factor: f32) {
        let info = self.vars[var].as_mut().expect("all variables are bound");
        info.activity *= factor;
    }

    pub(crate) fn clear_activities(&mut self) {
        for info in self.vars.values_mut().filter_map(Option::as_mut) {
            info.activity = 0.0;
        }
    }

    /// Accumulates a literal into the pending clause buffer.
    pub(crate) fn add_lit(&mut self, lit: Lit) {
        self.ensure_var(lit.var());
        self.pending.push(lit);
    }

    pub(crate) fn close_clause(&mut self, original: bool) -> Option<ClauseId> {
        self.close_clause_with(original, false)
    }

    /// Closes the pending clause: sorts, deduplicates, rejects tautologies
    /// and literal-identical duplicates, applies universal reduction, and
    /// registers the clause in the occurrence lists.
    ///
    /// Returns `None` if the clause was rejected.
    pub(crate) fn close_clause_with(&mut self, original: bool, is_cube: bool) -> Option<ClauseId> {
        let mut lits = std::mem::take(&mut self.pending);

        // Sort universal-before-existential, then by scope, then by variable,
        // so that the last literal is the innermost existential.
        lits.sort_unstable_by_key(|l| {
            (self.is_existential(l.var()), self.scope_of(l.var()), l.var(), l.is_negative())
        });
        lits.dedup();
        if lits.iter().zip(lits.iter().skip(1)).any(|(&left, &right)| left == !right) {
            // Tautology; literals of opposing signs are consecutive after
            // sorting and deduplication.
            debug!(
                "rejecting tautological clause {:?}",
                lits.iter().map(|l| l.to_dimacs()).collect::<Vec<_>>()
            );
            return None;
        }

        // Universal reduction: a universal literal stays only if some
        // existential in the clause is bound after it.
        let max_existential_scope = lits
            .iter()
            .filter(|l| self.is_existential(l.var()))
            .map(|l| self.scope_of(l.var()))
            .max();
        let before = lits.len();
        lits.retain(|l| {
            self.is_existential(l.var())
                || max_existential_scope.is_some_and(|scope| self.scope_of(l.var()) < scope)
        });
        self.universal_reductions += (before - lits.len()) as u64;

        // Reject literal-identical duplicates of active clauses.
        if let Some(&first) = lits.first() {
            for &other in self.occs_of_lit(first) {
                if self.clauses[other.as_index()].active
                    && self.clauses[other.as_index()].lits == lits
                {
                    debug!("rejecting duplicate of clause {other}");
                    return None;
                }
            }
        }

        let id = ClauseId::from_index(self.clauses.len());
        if lits.is_empty() {
            warn!("empty clause was added, instance is unsatisfiable");
            self.empty_clause = Some(id);
        }
        for &lit in &lits {
            let info = self.vars[lit.var()].as_mut().expect("all variables are bound");
            if lit.is_negative() {
                info.neg_occs.push(id);
            } else {
                info.pos_occs.push(id);
            }
        }
        self.clauses.push(Clause {
            id,
            lits,
            original,
            is_cube,
            active: true,
            in_active_vector: true,
        });
        self.active.push(id);
        self.token += 1;
        if original {
            // learnt clauses are entailed knowledge; they survive pops
            self.undo.record(QcnfOp::NewClause(id));
        }
        Some(id)
    }

    /// Retires a (learnt) clause: the clause is removed from the occurrence
    /// lists and will be compacted out of the active-clause vector lazily.
    /// Retirement is permanent; it is not recorded on the undo stack.
    pub(crate) fn retire_clause(&mut self, id: ClauseId) {
        let clause = &mut self.clauses[id.as_index()];
        assert!(!clause.original, "original clauses are never retired");
        if !clause.active {
            return;
        }
        clause.active = false;
        self.token += 1;
        let lits = clause.lits.clone();
        for lit in lits {
            let info = self.vars[lit.var()].as_mut().expect("all variables are bound");
            if lit.is_negative() {
                info.neg_occs.retain(|&c| c != id);
            } else {
                info.pos_occs.retain(|&c| c != id);
            }
        }
    }

    pub(crate) fn clause_iter(&self) -> ClauseIter {
        ClauseIter { idx: 0, token: self.token }
    }

    /// Advances the iterator to the next active clause, compacting retired
    /// clauses out of the active-clause vector as they are encountered.
    ///
    /// # Errors
    ///
    /// Fails with [`QcnfError::StaleIterator`] if the clause set was
    /// modified since the iterator was created (other than through the
    /// iterator's own compaction).
    pub(crate) fn next_active(&mut self, iter: &mut ClauseIter) -> Result<Option<ClauseId>, QcnfError> {
        if iter.token != self.token {
            return Err(QcnfError::StaleIterator);
        }
        while iter.idx < self.active.len() {
            let id = self.active[iter.idx];
            if self.clauses[id.as_index()].active {
                iter.idx += 1;
                return Ok(Some(id));
            }
            self.active.swap_remove(iter.idx);
            self.clauses[id.as_index()].in_active_vector = false;
            self.token += 1;
            iter.token = self.token;
        }
        Ok(None)
    }

    /// Read-only view of the currently active clauses.
    pub(crate) fn active_clauses(&self) -> impl Iterator<Item = ClauseId> + '_ {
        self.active.iter().copied().filter(|id| self.clauses[id.as_index()].active)
    }

    pub(crate) fn clause_count(&self) -> usize {
        self.clauses.len()
    }

    pub(crate) fn empty_clause(&self) -> Option<ClauseId> {
        self.empty_clause
    }

    pub(crate) fn universal_reductions(&self) -> u64 {
        self.universal_reductions
    }

    pub(crate) fn prefix(&self) -> &[(QuantTy, Vec<Var>)] {
        &self.blocks
    }

    pub fn push(&mut self) {
        self.undo.push();
    }

    pub fn pop(&mut self) {
        for op in self.undo.pop() {
            match op {
                QcnfOp::NewVar(var) => {
                    self.vars[var] = None;
                    for (_, bound) in &mut self.blocks {
                        bound.retain(|&v| v != var);
                    }
                }
                QcnfOp::NewClause(id) => {
                    // unregister in place; the storage is reclaimed lazily
                    let lits = self.clauses[id.as_index()].lits.clone();
                    self.clauses[id.as_index()].active = false;
                    for lit in lits {
                        let info = self.vars[lit.var()].as_mut().expect("all variables are bound");
                        if lit.is_negative() {
                            info.neg_occs.retain(|&c| c != id);
                        } else {
                            info.pos_occs.retain(|&c| c != id);
                        }
                    }
                    if self.clauses[id.as_index()].in_active_vector {
                        self.clauses[id.as_index()].in_active_vector = false;
                        let pos = self
                            .active
                            .iter()
                            .position(|&c| c == id)
                            .expect("clause is in the active-clause vector");
                        self.active.swap_remove(pos);
                    }
                    if self.empty_clause == Some(id) {
                        self.empty_clause = None;
                    }
                    self.token += 1;
                }
            }
        }
    }

    fn num_variables(&self) -> u32 {
        self.vars
            .iter()
            .filter(|(_, info)| info.is_some())
            .map(|(var, _)| var.to_dimacs())
            .max()
            .unwrap_or_default()
            .try_into()
            .unwrap()
    }

    #[cfg(test)]
    pub(crate) fn from_formula(prefix: &[(QuantTy, &[u32])], matrix: &[&[i32]]) -> Self {
        let mut qcnf = QCNF::default();
        for &(quant, vars) in prefix {
            let vars: Vec<_> =
                vars.iter().map(|&v| Var::from_dimacs(v.try_into().unwrap())).collect();
            qcnf.quantify(quant, &vars).expect("valid test prefix");
        }
        for &lits in matrix {
            for &lit in lits {
                qcnf.add_lit(Lit::from_dimacs(lit));
            }
            let _ = qcnf.close_clause(true);
        }
        qcnf
    }

    /// Structural digest used to validate push/pop round trips.
    #[cfg(test)]
    pub(crate) fn digest(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for (var, info) in self.vars() {
            var.hash(&mut hasher);
            info.scope.hash(&mut hasher);
            info.is_universal.hash(&mut hasher);
            info.pos_occs.hash(&mut hasher);
            info.neg_occs.hash(&mut hasher);
        }
        let mut active: Vec<_> = self.active_clauses().collect();
        active.sort_unstable();
        for id in active {
            self.clauses[id.as_index()].lits.hash(&mut hasher);
        }
        hasher.finish()
    }
}

impl std::ops::Index<ClauseId> for QCNF {
    type Output = Clause;

    fn index(&self, index: ClauseId) -> &Self::Output {
        &self.clauses[index.as_index()]
    }
}

impl Display for QCNF {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "p cnf {} {}", self.num_variables(), self.active_clauses().count())?;
        for (quant, vars) in &self.blocks {
            if vars.is_empty() {
                continue;
            }
            writeln!(
                f,
                "{quant} {} 0",
                vars.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
            )?;
        }
        for id in self.active_clauses() {
            writeln!(f, "{}", self.clauses[id.as_index()])?;
        }
        Ok(())
    }
}

#[cfg(test)]
macro_rules! qcnf_core {
    ($prefix:expr, $matrix:expr,) => {
		(crate::qcnf::QCNF::from_formula(&$prefix, &$matrix))
	};
    ($prefix:expr, $matrix:expr, a $( $x:literal )* ; $($tail:tt)* ) => {{
		$prefix.push((crate::quantifier::QuantTy::Forall, &[ $( $x ),* ]));
        qcnf_core![$prefix, $matrix, $($tail)*]
    }};
    ($prefix:expr, $matrix:expr, e $( $x:literal )* ; $($tail:tt)* ) => {{
		$prefix.push((crate::quantifier::QuantTy::Exists, &[ $( $x ),* ]));
        qcnf_core![$prefix, $matrix,$($tail)*]
    }};
    ($prefix:expr, $matrix:expr, $( $x:literal )* ; $($tail:tt)* ) => {{
		$matrix.push(&[ $( $x ),* ]);
        qcnf_core![$prefix, $matrix, $($tail)*]
    }};
}

/// Macro that creates a [`QCNF`] instance from a QDIMACS-like representation.
/// The main differences are:
/// * No support for comments
/// * No header line
/// * Lines are seperated by `;`, whereas QDIMACS uses `0`.
///
/// # Example
/// ```
/// let qcnf = qcnf_formula![
///     a 1 2;
///     e 3;
///     1 2;
/// ];
/// ```
///
#[cfg(test)]
macro_rules! qcnf_formula {
	($($tail:tt)*) => {
		 {
			 let mut prefix: Vec<(crate::quantifier::QuantTy, &[u32])> = Vec::new();
			 let mut matrix: Vec<&[i32]> = Vec::new();
			 qcnf_core![prefix, matrix, $($tail)*]
		 }

	};
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn qcnf_macro() {
        let qcnf = qcnf_formula![
            a 1 2;
            e 3;
            1 2 3;
        ];
        assert_eq!(qcnf.active_clauses().count(), 1);
        assert_eq!(qcnf.num_variables(), 3);
        assert!(qcnf.is_universal(Var::from_dimacs(1)));
        assert!(qcnf.is_existential(Var::from_dimacs(3)));
    }

    #[test]
    fn duplicate_var() {
        let mut qcnf = QCNF::default();
        let v = Var::from_dimacs(1);
        qcnf.quantify(QuantTy::Forall, &[v]).unwrap();
        assert_eq!(qcnf.quantify(QuantTy::Exists, &[v]), Err(QcnfError::DuplicateVar(v)));
    }

    #[test]
    fn unsupported_prefix() {
        let mut qcnf = QCNF::default();
        qcnf.quantify(QuantTy::Exists, &[Var::from_dimacs(1)]).unwrap();
        qcnf.quantify(QuantTy::Forall, &[Var::from_dimacs(2)]).unwrap();
        qcnf.quantify(QuantTy::Exists, &[Var::from_dimacs(3)]).unwrap();
        assert_eq!(
            qcnf.quantify(QuantTy::Forall, &[Var::from_dimacs(4)]),
            Err(QcnfError::UnsupportedPrefix)
        );
    }

    #[test]
    fn tautology_rejected() {
        let qcnf = qcnf_formula![
            a 1;
            e 2;
            1 2 -2;
        ];
        assert_eq!(qcnf.active_clauses().count(), 0);
    }

    #[test]
    fn duplicate_clause_rejected() {
        let qcnf = qcnf_formula![
            a 1;
            e 2;
            1 2;
            2 1;
        ];
        assert_eq!(qcnf.active_clauses().count(), 1);
    }

    #[test]
    fn universal_reduction() {
        // The universal is bound after the outer existential, so it cannot
        // be relevant for the clause.
        let qcnf = qcnf_formula![
            e 1;
            a 2;
            1 2;
        ];
        let id = qcnf.active_clauses().next().unwrap();
        assert_eq!(qcnf[id].lits(), &[Lit::from_dimacs(1)]);
        assert_eq!(qcnf.universal_reductions(), 1);
    }

    #[test]
    fn universal_only_clause_is_empty() {
        let qcnf = qcnf_formula![
            a 1 2;
            e 3;
            1 2;
        ];
        assert!(qcnf.empty_clause().is_some());
    }

    #[test]
    fn clause_ordering() {
        let qcnf = qcnf_formula![
            e 1;
            a 2;
            e 3;
            3 2 1;
        ];
        let id = qcnf.active_clauses().next().unwrap();
        // outer existential, universal, inner existential
        assert_eq!(
            qcnf[id].lits(),
            &[Lit::from_dimacs(1), Lit::from_dimacs(2), Lit::from_dimacs(3)]
        );
    }

    #[test]
    fn iterator_compacts_retired_clauses() {
        let mut qcnf = qcnf_formula![
            a 1;
            e 2 3;
            1 2;
            1 3;
            2 3;
        ];
        let learnt = {
            qcnf.add_lit(Lit::from_dimacs(-2));
            qcnf.add_lit(Lit::from_dimacs(-3));
            qcnf.close_clause(false).unwrap()
        };
        qcnf.retire_clause(learnt);

        let mut iter = qcnf.clause_iter();
        let mut seen = Vec::new();
        while let Some(id) = qcnf.next_active(&mut iter).unwrap() {
            seen.push(id);
        }
        assert_eq!(seen.len(), 3);
        assert!(!seen.contains(&learnt));
        // the retired clause was compacted out
        assert_eq!(qcnf.active.len(), 3);
    }

    #[test]
    fn stale_iterator_detected() {
        let mut qcnf = qcnf_formula![
            a 1;
            e 2;
            1 2;
        ];
        let mut iter = qcnf.clause_iter();
        qcnf.add_lit(Lit::from_dimacs(2));
        let _ = qcnf.close_clause(false);
        assert_eq!(qcnf.next_active(&mut iter), Err(QcnfError::StaleIterator));
    }

    #[test]
    fn push_pop_restores_digest() {
        let mut qcnf = qcnf_formula![
            a 1;
            e 2 3;
            1 2;
            -1 3;
        ];
        let digest = qcnf.digest();
        qcnf.push();
        qcnf.add_lit(Lit::from_dimacs(2));
        qcnf.add_lit(Lit::from_dimacs(3));
        let _ = qcnf.close_clause(true);
        assert_ne!(qcnf.digest(), digest);
        qcnf.pop();
        assert_eq!(qcnf.digest(), digest);
    }

    #[test]
    fn occurrence_lists_track_clauses() {
        let qcnf = qcnf_formula![
            a 1;
            e 2;
            1 2;
            -1 2;
            1 -2;
        ];
        let v2 = Var::from_dimacs(2);
        assert_eq!(qcnf.occs_of_lit(v2.positive()).len(), 2);
        assert_eq!(qcnf.occs_of_lit(v2.negative()).len(), 1);
        assert_eq!(qcnf.occurrence_count(v2), 3);
    }
}

/// Provides a strategy for randomly generating QCNFs.
#[cfg(test)]
pub(crate) mod strategy {
    use super::{QuantTy, Var, QCNF};
    use crate::literal::strategy::lit;
    use proptest::{collection, prelude::*};

    /// A strategy to generate a 2QBF instance with the provided parameters.
    pub(crate) fn qcnf_2qbf(
        universals: u32,
        existentials: u32,
        clauses: impl Into<collection::SizeRange>,
        clause_len: impl Into<collection::SizeRange>,
    ) -> impl Strategy<Value = QCNF> {
        let max_var = universals + existentials;
        collection::vec(collection::vec(lit(0..max_var), clause_len), clauses.into())
            .prop_map(move |matrix| {
                let mut qcnf = QCNF::default();
                let univ: Vec<_> = (0..universals).map(Var::from_index).collect();
                let exist: Vec<_> = (universals..max_var).map(Var::from_index).collect();
                qcnf.quantify(QuantTy::Forall, &univ).expect("valid prefix");
                qcnf.quantify(QuantTy::Exists, &exist).expect("valid prefix");
                for clause in matrix {
                    for lit in clause {
                        qcnf.add_lit(lit);
                    }
                    let _ = qcnf.close_clause(true);
                }
                qcnf
            })
            .no_shrink()
    }
}
