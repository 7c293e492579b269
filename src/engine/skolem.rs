//! The Skolem engine.
//!
//! Maintains, for every existential variable, a pair of literals in an
//! embedded SAT instance that encode under which universal assignments the
//! variable is forced to true respectively false. Variables whose value is
//! implied by the universals and earlier-proven variables are proven
//! *deterministic* one by one; candidate functions that can output both
//! values for the same input are detected by conflict checks against the
//! embedded solver.

use crate::{
    datastructure::{queue::VarQueue, ClauseVec, UndoStack, VarVec},
    engine::{
        options::Options,
        stats::SkolemStats,
        DecLvl,
    },
    literal::{Lit, Var},
    qcnf::{ClauseId, QCNF},
    quantifier::ScopeId,
    sat::{LookupSolver, SatSolver, SatSolverLit, ScopedSat},
};
use derivative::Derivative;
use std::{collections::VecDeque, time::Instant};
use tracing::{debug, trace};

const INITIAL_CONFLICT_POTENTIAL: f32 = 0.3;
const CONFLICT_POTENTIAL_CHANGE_FACTOR: f32 = 0.81;
const BLOCKED_CLAUSE_OCCURRENCE_CUTOFF: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SkolemState {
    Ready,
    ConstantsConflict,
    SkolemConflict,
    EmptyDomain,
}

/// How a variable entered the deterministic set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DetKind {
    /// Defined on both sides by its unique-consequence antecedents.
    TwoSided,
    /// Pure literal; the contained literal is the pure side.
    Pure(Lit),
    /// Branching decision; the contained literal is the decided phase.
    Decision(Lit),
    /// Propagated constant; the contained literal is true.
    Constant(Lit),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct DetEntry {
    pub(crate) var: Var,
    pub(crate) kind: DetKind,
    pub(crate) dlvl: DecLvl,
    /// whether the variable was locally conflicted when it was encoded
    pub(crate) conflictable: bool,
}

#[derive(Debug, Clone, Copy)]
struct SkolemVar<L> {
    /// Satisfied in the embedded instance iff the Skolem function outputs
    /// true. `true_lit` denotes constant true, `!true_lit` constant false.
    pos_lit: L,
    /// Symmetric for the false output.
    neg_lit: L,
    deterministic: bool,
    pure_pos: bool,
    pure_neg: bool,
    decision_pos: bool,
    decision_neg: bool,
    /// supremum of the scopes this variable's definition depends on
    dep: ScopeId,
    decision_lvl: DecLvl,
    reason_for_constant: Option<ClauseId>,
    dlvl_for_constant: DecLvl,
    conflict_potential: f32,
}

#[derive(Debug, Clone, Copy)]
enum SkolemOp<L> {
    PosLit { var: Var, prev: L },
    NegLit { var: Var, prev: L },
    Deterministic(Var),
    PurePos(Var),
    PureNeg(Var),
    DecisionPos(Var),
    DecisionNeg(Var),
    Dep { var: Var, prev: ScopeId },
    DecisionLvl { var: Var, prev: DecLvl },
    ReasonForConstant { var: Var, prev: Option<ClauseId>, prev_dlvl: DecLvl },
    UniqueConsequence { clause: ClauseId, prev: Option<Lit> },
    State { prev: SkolemState, prev_var: Option<Var>, prev_clause: Option<ClauseId> },
    GlobalDecisionLvl { prev: DecLvl },
    Determinized,
    UniversalAssumption,
}

#[derive(Derivative)]
#[derivative(Debug)]
pub(crate) struct Skolem<S: SatSolver> {
    /// the embedded SAT instance holding the Skolem-function encoding
    #[derivative(Debug = "ignore")]
    sat: ScopedSat<S>,
    #[derivative(Debug = "ignore")]
    true_lit: S::Lit,
    #[derivative(Debug = "ignore")]
    vars: VarVec<Option<SkolemVar<S::Lit>>>,
    /// the original satlits of the universals, never overwritten
    #[derivative(Debug = "ignore")]
    universal_base: VarVec<Option<S::Lit>>,
    /// unique-consequence map, indexed by clause id
    uc: ClauseVec<Option<Lit>>,
    determinization_order: Vec<DetEntry>,
    /// candidates for determinicity checks, cheapest occurrence count first
    determinicity_queue: VarQueue,
    pure_queue: VarQueue,
    /// clauses to check for constant propagation
    clauses_to_check: VecDeque<ClauseId>,
    universal_assumptions: Vec<Lit>,
    state: SkolemState,
    conflict_var: Option<Var>,
    conflicted_clause: Option<ClauseId>,
    decision_lvl: DecLvl,
    #[derivative(Debug = "ignore")]
    undo: UndoStack<SkolemOp<S::Lit>>,
    pure_literals: bool,
    enhanced_pure_literals: bool,
    functional_synthesis: bool,
    pub(crate) stats: SkolemStats,
}

impl<S: SatSolver> Skolem<S> {
    pub(crate) fn new(options: &Options) -> Self {
        let mut sat = ScopedSat::default();
        let true_lit = sat.add_variable();
        sat.add_clause(&[true_lit]);
        Self {
            sat,
            true_lit,
            vars: VarVec::default(),
            universal_base: VarVec::default(),
            uc: ClauseVec::default(),
            determinization_order: Vec::new(),
            determinicity_queue: VarQueue::default(),
            pure_queue: VarQueue::default(),
            clauses_to_check: VecDeque::new(),
            universal_assumptions: Vec::new(),
            state: SkolemState::Ready,
            conflict_var: None,
            conflicted_clause: None,
            decision_lvl: DecLvl::ROOT,
            undo: UndoStack::default(),
            pure_literals: options.pure_literals,
            enhanced_pure_literals: options.enhanced_pure_literals,
            functional_synthesis: options.functional_synthesis,
            stats: SkolemStats::default(),
        }
    }

    /// Registers all variables and the currently active clauses.
    pub(crate) fn add_formula(&mut self, qcnf: &QCNF) {
        let count = qcnf.var_count();
        self.vars.set_var_count(count);
        self.universal_base.set_var_count(count);
        self.determinicity_queue.set_var_count(count);
        self.pure_queue.set_var_count(count);
        let false_lit = !self.true_lit;
        for (var, info) in qcnf.vars() {
            let mut record = SkolemVar {
                pos_lit: false_lit,
                neg_lit: false_lit,
                deterministic: false,
                pure_pos: false,
                pure_neg: false,
                decision_pos: false,
                decision_neg: false,
                dep: ScopeId::OUTER,
                decision_lvl: DecLvl::ROOT,
                reason_for_constant: None,
                dlvl_for_constant: DecLvl::ROOT,
                conflict_potential: INITIAL_CONFLICT_POTENTIAL,
            };
            if info.is_universal() {
                // universals are inputs; they are trivially deterministic
                let base = self.sat.add_variable();
                record.pos_lit = base;
                record.neg_lit = !base;
                record.deterministic = true;
                record.dep = ScopeId::UNIVERSAL;
                self.universal_base[var] = Some(base);
            }
            self.vars[var] = Some(record);
        }
        for cid in qcnf.active_clauses().collect::<Vec<_>>() {
            self.new_clause(qcnf, cid);
        }
        // seed the pure-variable queue so no pure variable is missed
        for (var, info) in qcnf.vars() {
            if info.is_existential() {
                self.pure_queue.add_and_set(var, qcnf.occurrence_count(var));
            }
        }
    }

    pub(crate) fn state(&self) -> SkolemState {
        self.state
    }

    pub(crate) fn is_conflicted(&self) -> bool {
        matches!(self.state, SkolemState::ConstantsConflict | SkolemState::SkolemConflict)
    }

    pub(crate) fn conflict_var(&self) -> Option<Var> {
        self.conflict_var
    }

    pub(crate) fn conflicted_clause(&self) -> Option<ClauseId> {
        self.conflicted_clause
    }

    pub(crate) fn decision_level(&self) -> DecLvl {
        self.decision_lvl
    }

    pub(crate) fn universal_assumptions(&self) -> &[Lit] {
        &self.universal_assumptions
    }

    pub(crate) fn determinization_order(&self) -> &[DetEntry] {
        &self.determinization_order
    }

    pub(crate) fn deterministic_count(&self) -> usize {
        self.determinization_order.len()
    }

    fn info(&self, var: Var) -> &SkolemVar<S::Lit> {
        self.vars[var].as_ref().expect("skolem record exists for every variable")
    }

    fn info_mut(&mut self, var: Var) -> &mut SkolemVar<S::Lit> {
        self.vars[var].as_mut().expect("skolem record exists for every variable")
    }

    pub(crate) fn is_deterministic(&self, var: Var) -> bool {
        self.info(var).deterministic
    }

    pub(crate) fn decision_lvl_of(&self, var: Var) -> DecLvl {
        self.info(var).decision_lvl
    }

    pub(crate) fn is_decision_var(&self, var: Var) -> bool {
        let info = self.info(var);
        info.decision_pos || info.decision_neg
    }

    pub(crate) fn reason_for_constant(&self, var: Var) -> Option<ClauseId> {
        self.info(var).reason_for_constant
    }

    pub(crate) fn dlvl_for_constant(&self, var: Var) -> DecLvl {
        self.info(var).dlvl_for_constant
    }

    pub(crate) fn conflict_potential(&self, var: Var) -> f32 {
        self.info(var).conflict_potential
    }

    pub(crate) fn satlit(&self, lit: Lit) -> S::Lit {
        let info = self.info(lit.var());
        if lit.is_negative() {
            info.neg_lit
        } else {
            info.pos_lit
        }
    }

    /// The original input satlit of a universal, unaffected by later
    /// constant assignments.
    pub(crate) fn base_satlit(&self, lit: Lit) -> S::Lit {
        let base = self.universal_base[lit.var()].expect("literal is universal");
        if lit.is_negative() {
            !base
        } else {
            base
        }
    }

    /// Returns `1`/`-1` if the variable is a constant, `0` otherwise.
    pub(crate) fn get_constant_value(&self, lit: Lit) -> i8 {
        let info = self.info(lit.var());
        let mut val = if info.pos_lit == self.true_lit {
            1
        } else if info.neg_lit == self.true_lit {
            -1
        } else {
            0
        };
        if lit.is_negative() {
            val = -val;
        }
        val
    }

    pub(crate) fn lit_satisfied(&self, lit: Lit) -> bool {
        self.get_constant_value(lit) == 1
    }

    pub(crate) fn clause_satisfied(&self, qcnf: &QCNF, cid: ClauseId) -> bool {
        qcnf[cid].iter().any(|&l| self.lit_satisfied(l))
    }

    pub(crate) fn unique_consequence(&self, cid: ClauseId) -> Option<Lit> {
        self.uc.get(cid).copied().flatten()
    }

    pub(crate) fn has_unique_consequence(&self, cid: ClauseId) -> bool {
        self.unique_consequence(cid).is_some()
    }

    /// Whether `var`'s Skolem function may depend on `on`.
    pub(crate) fn may_depend_on(&self, qcnf: &QCNF, var: Var, on: Var) -> bool {
        if qcnf.is_universal(var) {
            return false;
        }
        let allowed = qcnf.scope_of(var).allowed_dependencies();
        let dep = if qcnf.is_universal(on) { ScopeId::UNIVERSAL } else { self.info(on).dep };
        dep <= allowed
    }

    pub(crate) fn has_illegal_dependence(&self, qcnf: &QCNF, cid: ClauseId, var: Var) -> bool {
        qcnf[cid]
            .iter()
            .any(|&l| l.var() != var && !self.may_depend_on(qcnf, var, l.var()))
    }

    // ------------------------------------------------------------------
    // undoable field updates

    fn update_satlit(&mut self, lit: Lit, new: S::Lit) {
        let var = lit.var();
        if lit.is_positive() {
            let prev = self.info(var).pos_lit;
            self.undo.record(SkolemOp::PosLit { var, prev });
            self.info_mut(var).pos_lit = new;
        } else {
            let prev = self.info(var).neg_lit;
            self.undo.record(SkolemOp::NegLit { var, prev });
            self.info_mut(var).neg_lit = new;
        }
    }

    fn update_decision_lvl(&mut self, var: Var, lvl: DecLvl) {
        let prev = self.info(var).decision_lvl;
        self.undo.record(SkolemOp::DecisionLvl { var, prev });
        self.info_mut(var).decision_lvl = lvl;
    }

    fn update_dependencies(&mut self, var: Var, dep: ScopeId) {
        let prev = self.info(var).dep;
        self.undo.record(SkolemOp::Dep { var, prev });
        self.info_mut(var).dep = dep;
    }

    fn update_reason_for_constant(&mut self, var: Var, reason: Option<ClauseId>) {
        let info = self.info(var);
        self.undo.record(SkolemOp::ReasonForConstant {
            var,
            prev: info.reason_for_constant,
            prev_dlvl: info.dlvl_for_constant,
        });
        let lvl = self.decision_lvl;
        let info = self.info_mut(var);
        info.reason_for_constant = reason;
        info.dlvl_for_constant = lvl;
    }

    fn update_state(&mut self, state: SkolemState) {
        self.undo.record(SkolemOp::State {
            prev: self.state,
            prev_var: self.conflict_var,
            prev_clause: self.conflicted_clause,
        });
        self.state = state;
    }

    fn set_unique_consequence(&mut self, cid: ClauseId, lit: Lit) {
        self.uc.ensure(cid);
        let prev = self.uc[cid];
        self.undo.record(SkolemOp::UniqueConsequence { clause: cid, prev });
        self.uc[cid] = Some(lit);
    }

    fn mark_deterministic(&mut self, var: Var, kind: DetKind, conflictable: bool) {
        assert!(!self.info(var).deterministic, "determinism is monotone between pushes");
        self.undo.record(SkolemOp::Deterministic(var));
        self.info_mut(var).deterministic = true;
        self.undo.record(SkolemOp::Determinized);
        self.determinization_order.push(DetEntry {
            var,
            kind,
            dlvl: self.decision_lvl,
            conflictable,
        });
    }

    // ------------------------------------------------------------------
    // unique consequences

    pub(crate) fn new_clause(&mut self, qcnf: &QCNF, cid: ClauseId) {
        assert!(!self.has_unique_consequence(cid));
        self.uc.ensure(cid);
        if self.clause_satisfied(qcnf, cid) {
            return;
        }
        let mut fully_deterministic = true;
        let mut non_constants = 0usize;
        for &lit in qcnf[cid].iter().rev() {
            if !self.is_deterministic(lit.var()) {
                fully_deterministic = false;
            }
            if self.get_constant_value(lit) == 0 {
                non_constants += 1;
            }
        }
        if fully_deterministic {
            if qcnf[cid].is_cube() {
                self.clauses_to_check.push_back(cid);
                return;
            }
            if self.functional_synthesis {
                let satlits: Vec<_> = qcnf[cid].iter().map(|&l| self.satlit(l)).collect();
                self.sat.add_clause_root(&satlits);
                return;
            }
            // all variables are defined; check whether the current
            // functions can still violate the clause
            let assumptions: Vec<_> = qcnf[cid].iter().map(|&l| self.satlit(!l)).collect();
            if self.sat.solve_with_assumptions(&assumptions) {
                debug!("clause {cid} is violated by the current functions");
                let lastlit =
                    *qcnf[cid].iter().last().expect("deterministic clause is non-empty");
                self.set_unique_consequence(cid, lastlit);
                self.update_state(SkolemState::SkolemConflict);
                self.conflict_var = Some(lastlit.var());
                self.conflicted_clause = Some(cid);
            }
        } else {
            self.check_for_unique_consequence(qcnf, cid);
            if non_constants == 1 {
                self.clauses_to_check.push_back(cid);
            }
        }
    }

    /// Schedules a variable for a fresh pure-literal check, e.g. after
    /// clause minimization freed its literals.
    pub(crate) fn schedule_pure_check(&mut self, qcnf: &QCNF, var: Var) {
        if qcnf.is_existential(var) && !self.is_deterministic(var) {
            self.pure_queue.add_and_set(var, qcnf.occurrence_count(var));
        }
    }

    fn check_occs_for_unique_consequences(&mut self, qcnf: &QCNF, lit: Lit) {
        for &cid in qcnf.occs_of_lit(lit) {
            if self.has_unique_consequence(cid) {
                continue;
            }
            self.check_for_unique_consequence(qcnf, cid);
        }
    }

    fn check_for_unique_consequence(&mut self, qcnf: &QCNF, cid: ClauseId) {
        if self.has_unique_consequence(cid) || self.clause_satisfied(qcnf, cid) {
            return;
        }
        let mut undecided = None;
        // iterate from the innermost existential
        for &lit in qcnf[cid].iter().rev() {
            if !self.is_deterministic(lit.var()) {
                if undecided.is_none() {
                    undecided = Some(lit);
                } else {
                    return;
                }
            }
        }
        if let Some(lit) = undecided {
            trace!("unique consequence {lit} in clause {cid}");
            self.set_unique_consequence(cid, lit);
            self.determinicity_queue.add_and_set(lit.var(), qcnf.occurrence_count(lit.var()));
        }
    }

    // ------------------------------------------------------------------
    // propagation

    pub(crate) fn can_propagate(&self) -> bool {
        !self.clauses_to_check.is_empty()
            || !self.determinicity_queue.is_empty()
            || !self.pure_queue.is_empty()
    }

    pub(crate) fn propagate(&mut self, qcnf: &QCNF) {
        trace!("propagating in Skolem domain");
        while self.can_propagate() {
            if self.is_conflicted() {
                return;
            }
            if let Some(cid) = self.clauses_to_check.pop_front() {
                if qcnf[cid].is_active() {
                    self.propagate_constants_over_clause(qcnf, cid);
                }
            } else if let Some(var) = self.determinicity_queue.pop() {
                self.propagate_determinicity(qcnf, var);
            } else if let Some(var) = self.pure_queue.pop() {
                self.propagate_pure_variable(qcnf, var);
            }
        }
    }

    fn propagate_determinicity(&mut self, qcnf: &QCNF, var: Var) {
        if self.is_deterministic(var) {
            return;
        }
        trace!("checking determinicity of {var}");
        if self.check_for_local_determinicity(qcnf, var) {
            debug!("{var} is deterministic");
            self.stats.propagations += 1;
            let lvl = self.decision_lvl;
            self.update_decision_lvl(var, lvl);

            if self.is_locally_conflicted(qcnf, var) {
                // encode as partial functions and check for a real conflict
                self.fix_lit_for_unique_antecedents(qcnf, var.positive(), false);
                self.fix_lit_for_unique_antecedents(qcnf, var.negative(), false);
                let clause = [self.satlit(var.positive()), self.satlit(var.negative())];
                self.sat.add_clause(&clause);
                if self.global_conflict_check(var) {
                    return;
                }
                self.mark_deterministic(var, DetKind::TwoSided, true);
            } else {
                let satlit = self.sat.add_variable();
                self.update_satlit(var.positive(), satlit);
                self.update_satlit(var.negative(), !satlit);
                self.add_clauses_using_existing_satlits(qcnf, var);
                self.mark_deterministic(var, DetKind::TwoSided, false);
            }

            let dep = self.compute_dependencies(qcnf, var);
            self.update_dependencies(var, dep);
            self.check_occs_for_unique_consequences(qcnf, var.positive());
            self.check_occs_for_unique_consequences(qcnf, var.negative());
        } else {
            self.pure_queue.add_and_set(var, qcnf.occurrence_count(var));
        }
    }

    /// The union of unique-consequence antecedents is a definition iff for
    /// every universal assignment at least one antecedent fires. Tested on
    /// a disposable instance holding each unique-consequence clause with
    /// the candidate removed.
    fn check_for_local_determinicity(&mut self, qcnf: &QCNF, var: Var) -> bool {
        self.stats.local_determinicity_checks += 1;
        let mut solver: LookupSolver<S> = LookupSolver::default();
        let mut clause = Vec::new();
        for lit in [var.positive(), var.negative()] {
            for &cid in qcnf.occs_of_lit(lit) {
                if self.unique_consequence(cid) != Some(lit)
                    || self.has_illegal_dependence(qcnf, cid, var)
                    || self.clause_satisfied(qcnf, cid)
                {
                    continue;
                }
                clause.clear();
                for &other in qcnf[cid].iter() {
                    if other.var() != var && !self.lit_satisfied(!other) {
                        clause.push(solver.lookup(other));
                    }
                }
                solver.add_clause(&clause);
            }
        }
        !solver.solve().expect("embedded SAT solver failed")
    }

    /// Encodes "antecedent fires implies consequence" for all unique
    /// consequences of `var`, re-using the satlits of the other literals.
    fn add_clauses_using_existing_satlits(&mut self, qcnf: &QCNF, var: Var) {
        let mut clause = Vec::new();
        for lit in [var.positive(), var.negative()] {
            for &cid in qcnf.occs_of_lit(lit) {
                if self.unique_consequence(cid) != Some(lit)
                    || self.has_illegal_dependence(qcnf, cid, var)
                {
                    continue;
                }
                clause.clear();
                for &other in qcnf[cid].iter() {
                    clause.push(self.satlit(other));
                }
                self.sat.add_clause(&clause);
            }
        }
    }

    fn compute_dependencies(&self, qcnf: &QCNF, var: Var) -> ScopeId {
        let mut dep = ScopeId::OUTER;
        for lit in [var.positive(), var.negative()] {
            for &cid in qcnf.occs_of_lit(lit) {
                if self.unique_consequence(cid) != Some(lit) {
                    continue;
                }
                for &other in qcnf[cid].iter() {
                    if other.var() == var {
                        continue;
                    }
                    let other_dep = if qcnf.is_universal(other.var()) {
                        ScopeId::UNIVERSAL
                    } else {
                        self.info(other.var()).dep
                    };
                    dep = dep.max(other_dep);
                }
            }
        }
        dep
    }

    // ------------------------------------------------------------------
    // local conflict check

    /// Tests on a disposable instance whether a positive and a negative
    /// unique-consequence antecedent can fire for the same universal
    /// assignment. The disposable instance mirrors the satlits of the
    /// embedded solver so correlations between definitions are kept.
    fn is_locally_conflicted(&mut self, qcnf: &QCNF, var: Var) -> bool {
        self.stats.local_conflict_checks += 1;
        let mut mirror = SatlitMirror::<S>::default();
        let true_mirror = mirror.lookup(self.true_lit);
        mirror.solver.add_clause(&[true_mirror]);
        self.add_antecedents_for_local_conflict_check(qcnf, &mut mirror, var.positive());
        self.add_antecedents_for_local_conflict_check(qcnf, &mut mirror, var.negative());
        let conflicted = mirror.solver.solve().expect("embedded SAT solver failed");
        trace!("{var} is {}locally conflicted", if conflicted { "" } else { "not " });
        conflicted
    }

    fn add_antecedents_for_local_conflict_check(
        &self,
        qcnf: &QCNF,
        mirror: &mut SatlitMirror<S>,
        lit: Lit,
    ) {
        // A false conjunction var means the antecedent of its clause fires;
        // the final clause requires some antecedent of this side to fire.
        let mut conjunction_vars = Vec::new();
        for &cid in qcnf.occs_of_lit(lit) {
            if self.unique_consequence(cid) != Some(lit) {
                continue;
            }
            if qcnf[cid].len() == 1 {
                // empty antecedent always fires; this side is unconstrained
                return;
            }
            let conjunction_var = mirror.solver.add_variable();
            conjunction_vars.push(conjunction_var);
            for &inner in qcnf[cid].iter() {
                if inner.var() == lit.var() || !self.may_depend_on(qcnf, lit.var(), inner.var()) {
                    continue;
                }
                if self.lit_satisfied(inner) {
                    // this antecedent can never fire
                    mirror.solver.add_clause(&[conjunction_var]);
                    break;
                }
                let mirrored = mirror.lookup(self.satlit(!inner));
                mirror.solver.add_clause(&[mirrored, conjunction_var]);
            }
        }
        let fires: Vec<_> = conjunction_vars.into_iter().map(|l| !l).collect();
        mirror.solver.add_clause(&fires);
    }

    // ------------------------------------------------------------------
    // partial-function encoding

    /// Extends the definition of `lit` by its unique-consequence clauses.
    /// Returns whether at least one case was encoded.
    fn fix_lit_for_unique_antecedents(
        &mut self,
        qcnf: &QCNF,
        lit: Lit,
        define_both_sides: bool,
    ) -> bool {
        let mut case_exists = false;
        for cid in qcnf.occs_of_lit(lit).to_vec() {
            if self.unique_consequence(cid) != Some(lit) || self.clause_satisfied(qcnf, cid) {
                continue;
            }
            case_exists = true;
            if !self.has_illegal_dependence(qcnf, cid, lit.var()) {
                self.propagate_partial_over_clause(qcnf, cid, lit, define_both_sides);
            }
        }
        case_exists
    }

    /// `newlit := prevlit || antecedent-of-c-fires`, one-sided unless
    /// requested otherwise. Functional synthesis always needs both sides.
    /// The Skolem literal of `lit` only ever grows: each clause enlarges
    /// the set of assignments under which `lit` is forced true.
    fn propagate_partial_over_clause(
        &mut self,
        qcnf: &QCNF,
        cid: ClauseId,
        lit: Lit,
        define_both_sides: bool,
    ) {
        let define_both_sides = define_both_sides || self.functional_synthesis;
        let newlit = self.sat.add_variable();
        let prevlit = self.satlit(lit);
        let mut dep = self.info(lit.var()).dep;
        for &other in qcnf[cid].iter() {
            if other == lit || !self.may_depend_on(qcnf, lit.var(), other.var()) {
                continue;
            }
            let clause = [!newlit, prevlit, self.satlit(!other)];
            self.sat.add_clause(&clause);
            let other_dep = if qcnf.is_universal(other.var()) {
                ScopeId::UNIVERSAL
            } else {
                self.info(other.var()).dep
            };
            dep = dep.max(other_dep);
        }
        if define_both_sides {
            self.sat.add_clause(&[!prevlit, newlit]);
            let mut reverse: Vec<_> = qcnf[cid]
                .iter()
                .filter(|&&other| other != lit)
                .filter(|&&other| self.may_depend_on(qcnf, lit.var(), other.var()))
                .map(|&other| self.satlit(other))
                .collect();
            reverse.push(newlit);
            self.sat.add_clause(&reverse);
        }
        self.update_satlit(lit, newlit);
        self.update_dependencies(lit.var(), dep);
    }

    // ------------------------------------------------------------------
    // pure literals

    fn is_lit_pure(&self, qcnf: &QCNF, lit: Lit) -> bool {
        for &cid in qcnf.occs_of_lit(lit) {
            let relevant = (self.unique_consequence(cid) != Some(lit)
                || self.has_illegal_dependence(qcnf, cid, lit.var()))
                && !self.clause_satisfied(qcnf, cid);
            if relevant {
                if self.enhanced_pure_literals && self.clause_is_blocked_by_lit(qcnf, cid, lit) {
                    continue;
                }
                return false;
            }
        }
        true
    }

    /// Blocked-clause check: every unsatisfied clause of the opposite
    /// polarity has a tautological resolvent with this clause.
    fn clause_is_blocked_by_lit(&self, qcnf: &QCNF, cid: ClauseId, lit: Lit) -> bool {
        let opp_occs = qcnf.occs_of_lit(!lit);
        if opp_occs.len() > BLOCKED_CLAUSE_OCCURRENCE_CUTOFF {
            return false;
        }
        for &other in opp_occs {
            if !self.clause_satisfied(qcnf, other)
                && !resolvent_is_tautological(qcnf, cid, other, lit.var())
            {
                return false;
            }
        }
        true
    }

    fn propagate_pure_variable(&mut self, qcnf: &QCNF, var: Var) {
        if !self.pure_literals || self.is_deterministic(var) {
            return;
        }
        assert!(qcnf.is_existential(var), "universals never reach the pure-variable queue");

        let pure_lit = if self.is_lit_pure(qcnf, var.positive()) {
            var.positive()
        } else if self.is_lit_pure(qcnf, var.negative()) {
            var.negative()
        } else {
            trace!("{var} is not pure");
            return;
        };
        debug!("{var} is pure with side {pure_lit}");
        let lvl = self.decision_lvl;
        self.update_decision_lvl(var, lvl);
        self.stats.propagations += 1;
        self.stats.pure_vars += 1;

        if self.is_locally_conflicted(qcnf, var) {
            // pure but locally conflicted; the other side is not both-sided
            self.fix_lit_for_unique_antecedents(qcnf, pure_lit, true);
            self.fix_lit_for_unique_antecedents(qcnf, !pure_lit, false);

            let new_opposite = self.sat.add_variable();
            // the remaining cases of the opposite side are false
            let clause = [!self.satlit(pure_lit), self.satlit(!pure_lit), !new_opposite];
            self.sat.add_clause(&clause);
            if self.functional_synthesis {
                let clause = [self.satlit(pure_lit), new_opposite];
                self.sat.add_clause(&clause);
                let clause = [!self.satlit(!pure_lit), new_opposite];
                self.sat.add_clause(&clause);
            }
            self.update_satlit(!pure_lit, new_opposite);
            self.set_pure_flag(pure_lit);
            let dep = self.compute_dependencies(qcnf, var);
            self.update_dependencies(var, dep);

            let clause = [self.satlit(var.positive()), self.satlit(var.negative())];
            self.sat.add_clause(&clause);
            if self.global_conflict_check(var) {
                return;
            }
            self.mark_deterministic(var, DetKind::Pure(pure_lit), true);
        } else {
            self.fix_lit_for_unique_antecedents(qcnf, pure_lit, true);
            let opposite = !self.satlit(pure_lit);
            self.update_satlit(!pure_lit, opposite);
            self.set_pure_flag(pure_lit);
            self.mark_deterministic(var, DetKind::Pure(pure_lit), false);
            let dep = self.compute_dependencies(qcnf, var);
            self.update_dependencies(var, dep);
        }

        let val = self.get_constant_value(var.positive());
        if val != 0 {
            debug!("pure variable {var} collapses to a constant");
            self.stats.pure_constants += 1;
            self.assign_constant(qcnf, var.lit(val > 0), None, false);
        } else if self.enhanced_pure_literals {
            self.check_occs_for_unique_consequences(qcnf, var.positive());
            self.check_occs_for_unique_consequences(qcnf, var.negative());
        } else {
            self.check_occs_for_unique_consequences(qcnf, !pure_lit);
        }
    }

    fn set_pure_flag(&mut self, pure_lit: Lit) {
        let var = pure_lit.var();
        if pure_lit.is_positive() {
            self.undo.record(SkolemOp::PurePos(var));
            self.info_mut(var).pure_pos = true;
        } else {
            self.undo.record(SkolemOp::PureNeg(var));
            self.info_mut(var).pure_neg = true;
        }
    }

    // ------------------------------------------------------------------
    // constants

    /// Has the same effect as propagating a singleton clause. May be
    /// expensive for deterministic variables because of the required
    /// conflict check.
    pub(crate) fn assign_constant(
        &mut self,
        qcnf: &QCNF,
        lit: Lit,
        reason: Option<ClauseId>,
        ignore_universal_conflicts: bool,
    ) {
        assert!(!self.is_conflicted());
        assert!(
            self.get_constant_value(!lit) != 1,
            "propagation ended in inconsistent state"
        );
        debug!("assign constant value {lit}");
        let var = lit.var();
        self.update_reason_for_constant(var, reason);

        let was_deterministic = self.is_deterministic(var);
        if !was_deterministic {
            let lvl = self.decision_lvl;
            self.update_decision_lvl(var, lvl);
        }

        let potentially_conflicted = if ignore_universal_conflicts {
            false
        } else if qcnf.is_universal(var) {
            true
        } else {
            qcnf.occs_of_lit(!lit).iter().any(|&cid| {
                self.unique_consequence(cid) == Some(!lit) && !self.clause_satisfied(qcnf, cid)
            })
        };

        if potentially_conflicted {
            debug!("{var} is assigned a constant but may be conflicted");
            if !was_deterministic {
                // the opposite-side clauses are needed for the conflict check
                self.fix_lit_for_unique_antecedents(qcnf, !lit, false);
            }
            self.update_satlit(lit, self.true_lit);
            if self.global_conflict_check(var) {
                return;
            }
        }

        if !was_deterministic {
            self.mark_deterministic(var, DetKind::Constant(lit), potentially_conflicted);
        }
        self.update_satlit(lit, self.true_lit);
        self.update_satlit(!lit, !self.true_lit);

        // queue potentially new constants
        for &cid in qcnf.occs_of_lit(!lit) {
            self.clauses_to_check.push_back(cid);
        }
        // queue potentially new pure variables from satisfied clauses
        for &cid in qcnf.occs_of_lit(lit) {
            for &occ in qcnf[cid].iter() {
                if qcnf.is_existential(occ.var()) && !self.is_deterministic(occ.var()) {
                    self.pure_queue.add_and_set(occ.var(), qcnf.occurrence_count(occ.var()));
                }
            }
        }

        if !was_deterministic {
            self.check_occs_for_unique_consequences(qcnf, var.positive());
            self.check_occs_for_unique_consequences(qcnf, var.negative());
        }
    }

    fn propagate_constants_over_clause(&mut self, qcnf: &QCNF, cid: ClauseId) {
        let mut unassigned = None;
        for &lit in qcnf[cid].iter() {
            match self.get_constant_value(lit) {
                1 => return, // clause satisfied
                -1 => {}
                _ => {
                    if unassigned.is_some() {
                        // two unassigned literals; clause cannot propagate
                        return;
                    }
                    unassigned = Some(lit);
                }
            }
        }
        match unassigned {
            None => {
                assert!(!self.is_conflicted());
                self.stats.explicit_propagation_conflicts += 1;
                let conflict_var = qcnf[cid]
                    .iter()
                    .max_by_key(|l| self.dlvl_for_constant(l.var()))
                    .map(|l| l.var())
                    .expect("conflicted clause is non-empty");
                debug!("constants conflict in clause {cid} at {conflict_var}");
                self.update_state(SkolemState::ConstantsConflict);
                self.conflict_var = Some(conflict_var);
                self.conflicted_clause = Some(cid);
            }
            Some(lit) => {
                self.stats.propagations += 1;
                self.stats.explicit_propagations += 1;
                self.assign_constant(qcnf, lit, Some(cid), false);
            }
        }
    }

    // ------------------------------------------------------------------
    // conflict checks

    /// Checks against the full embedded instance whether both sides of the
    /// candidate can hold for the same universal assignment. On success the
    /// model stays available for conflict analysis; on failure the two
    /// sides are permanently made equal.
    fn global_conflict_check(&mut self, var: Var) -> bool {
        assert!(!self.is_conflicted());
        self.stats.global_conflict_checks += 1;
        let pos = self.satlit(var.positive());
        let neg = self.satlit(var.negative());
        let start = Instant::now();
        let conflicted = self.sat.solve_with_assumptions(&[pos, neg]);
        let elapsed = start.elapsed();
        if conflicted {
            debug!("global conflict for {var}");
            self.stats.global_conflict_checks_sat.record(elapsed);
            self.info_mut(var).conflict_potential = 1.0;
            self.update_state(SkolemState::SkolemConflict);
            self.conflict_var = Some(var);
        } else {
            self.stats.global_conflict_checks_unsat.record(elapsed);
            self.info_mut(var).conflict_potential *= CONFLICT_POTENTIAL_CHANGE_FACTOR;
            // make the two sides mutually exclusive; the covering clause
            // was asserted before the check
            self.sat.add_clause(&[!pos, !neg]);
        }
        conflicted
    }

    /// Refreshes the model of the embedded instance under the current
    /// scopes; used between CEGAR rounds.
    pub(crate) fn resolve_model(&mut self) -> bool {
        self.sat.solve()
    }

    /// Leaves the conflict state without backtracking. Only valid after
    /// the conflict was neutralized at the root, e.g. by excluding the
    /// conflicting universal cube.
    pub(crate) fn clear_conflict(&mut self) {
        if self.is_conflicted() {
            self.update_state(SkolemState::Ready);
            self.conflict_var = None;
            self.conflicted_clause = None;
        }
    }

    /// The domain is empty when the embedded instance became unsatisfiable
    /// even without conflict assumptions.
    pub(crate) fn check_if_domain_is_empty(&mut self) -> bool {
        if self.state == SkolemState::Ready && !self.sat.solve() {
            self.update_state(SkolemState::EmptyDomain);
        }
        self.state == SkolemState::EmptyDomain
    }

    // ------------------------------------------------------------------
    // decisions

    pub(crate) fn increase_decision_lvl(&mut self) {
        self.undo.record(SkolemOp::GlobalDecisionLvl { prev: self.decision_lvl });
        self.decision_lvl = self.decision_lvl.successor();
    }

    /// Fixes the remaining cases of the decision variable to the decided
    /// phase while retaining any forced truths.
    pub(crate) fn decision(&mut self, qcnf: &QCNF, decision_lit: Lit) {
        assert!(!self.can_propagate());
        let var = decision_lit.var();
        debug!("decision {decision_lit} at level {}", self.decision_lvl);
        assert!(!self.is_deterministic(var));
        assert_eq!(self.get_constant_value(decision_lit), 0);

        if decision_lit.is_positive() {
            self.undo.record(SkolemOp::DecisionPos(var));
            self.info_mut(var).decision_pos = true;
        } else {
            self.undo.record(SkolemOp::DecisionNeg(var));
            self.info_mut(var).decision_neg = true;
        }
        let lvl = self.decision_lvl;
        self.update_decision_lvl(var, lvl);

        self.fix_lit_for_unique_antecedents(qcnf, decision_lit, false);
        let opposite_case_exists =
            self.fix_lit_for_unique_antecedents(qcnf, !decision_lit, true);

        // new_val := val || !opposite: the decision only applies where the
        // opposite side is not forced
        let val_satlit = self.satlit(decision_lit);
        let opposite_satlit = self.satlit(!decision_lit);
        let new_val = self.sat.add_variable();
        self.sat.add_clause(&[!new_val, val_satlit, !opposite_satlit]);
        self.sat.add_clause(&[!val_satlit, new_val]);
        self.sat.add_clause(&[opposite_satlit, new_val]);
        self.update_satlit(decision_lit, new_val);

        // the decision variable itself may be conflicted
        let conflictable = self.is_locally_conflicted(qcnf, var);
        if conflictable {
            let clause = [self.satlit(var.positive()), self.satlit(var.negative())];
            self.sat.add_clause(&clause);
            if self.global_conflict_check(var) {
                debug!("decision variable {var} is conflicted");
                return;
            }
        }
        self.mark_deterministic(var, DetKind::Decision(decision_lit), conflictable);

        if !opposite_case_exists {
            // value decision: the opposite side has no case at all
            debug!("value decision for {var}");
            self.assign_constant(qcnf, decision_lit, None, false);
        }

        self.check_occs_for_unique_consequences(qcnf, var.positive());
        self.check_occs_for_unique_consequences(qcnf, var.negative());
    }

    // ------------------------------------------------------------------
    // universal assumptions (case splits)

    /// Restricts the universal domain to the sub-cube where `lit` holds.
    pub(crate) fn assume_universal(&mut self, qcnf: &QCNF, lit: Lit) {
        assert!(qcnf.is_universal(lit.var()));
        debug!("universal assumption {lit}, case-split depth {}", self.universal_assumptions.len() + 1);
        self.undo.record(SkolemOp::UniversalAssumption);
        self.universal_assumptions.push(lit);
        let satlit = self.satlit(lit);
        self.sat.add_clause(&[satlit]);
        self.assign_constant(qcnf, lit, None, true);
    }

    /// Whether assuming `lit` would immediately empty the Skolem domain.
    pub(crate) fn is_universal_assumption_vacuous(&mut self, lit: Lit) -> bool {
        let satlit = self.satlit(lit);
        !self.sat.solve_with_assumptions(&[satlit])
    }

    /// Permanently excludes a cube over the universals; the blocking clause
    /// goes to the root context so it survives backtracking.
    pub(crate) fn block_universal_cube(&mut self, cube: &[Lit]) {
        let clause: Vec<_> = cube.iter().map(|&lit| self.base_satlit(!lit)).collect();
        self.sat.add_clause_root(&clause);
    }

    // ------------------------------------------------------------------
    // conflict analysis interface

    /// The value of a literal in the current conflict domain: the constant
    /// assignment for constants conflicts, the embedded solver's model for
    /// Skolem conflicts.
    pub(crate) fn value_for_conflict_analysis(&self, lit: Lit) -> i8 {
        if self.state == SkolemState::ConstantsConflict {
            self.get_constant_value(lit)
        } else {
            match self.sat.value(self.satlit(lit)) {
                Some(true) => 1,
                Some(false) => -1,
                None => 0,
            }
        }
    }

    pub(crate) fn is_relevant_clause(&self, cid: ClauseId, lit: Lit) -> bool {
        self.unique_consequence(cid) == Some(lit)
            || self.reason_for_constant(lit.var()) == Some(cid)
    }

    // ------------------------------------------------------------------
    // backtracking

    pub(crate) fn push(&mut self) {
        self.undo.push();
        self.sat.push();
    }

    pub(crate) fn pop(&mut self) {
        for op in self.undo.pop() {
            match op {
                SkolemOp::PosLit { var, prev } => self.info_mut(var).pos_lit = prev,
                SkolemOp::NegLit { var, prev } => self.info_mut(var).neg_lit = prev,
                SkolemOp::Deterministic(var) => self.info_mut(var).deterministic = false,
                SkolemOp::PurePos(var) => self.info_mut(var).pure_pos = false,
                SkolemOp::PureNeg(var) => self.info_mut(var).pure_neg = false,
                SkolemOp::DecisionPos(var) => self.info_mut(var).decision_pos = false,
                SkolemOp::DecisionNeg(var) => self.info_mut(var).decision_neg = false,
                SkolemOp::Dep { var, prev } => self.info_mut(var).dep = prev,
                SkolemOp::DecisionLvl { var, prev } => self.info_mut(var).decision_lvl = prev,
                SkolemOp::ReasonForConstant { var, prev, prev_dlvl } => {
                    let info = self.info_mut(var);
                    info.reason_for_constant = prev;
                    info.dlvl_for_constant = prev_dlvl;
                }
                SkolemOp::UniqueConsequence { clause, prev } => self.uc[clause] = prev,
                SkolemOp::State { prev, prev_var, prev_clause } => {
                    self.state = prev;
                    self.conflict_var = prev_var;
                    self.conflicted_clause = prev_clause;
                }
                SkolemOp::GlobalDecisionLvl { prev } => self.decision_lvl = prev,
                SkolemOp::Determinized => {
                    let _ = self.determinization_order.pop();
                }
                SkolemOp::UniversalAssumption => {
                    let _ = self.universal_assumptions.pop();
                }
            }
        }
        self.sat.pop();
    }

    pub(crate) fn push_count(&self) -> usize {
        self.undo.milestone_count()
    }

    /// Structural digest used to validate push/pop round trips.
    #[cfg(test)]
    pub(crate) fn digest(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for (var, info) in self.vars.iter() {
            let Some(info) = info else { continue };
            var.hash(&mut hasher);
            info.deterministic.hash(&mut hasher);
            (info.pure_pos, info.pure_neg).hash(&mut hasher);
            (info.decision_pos, info.decision_neg).hash(&mut hasher);
            info.dep.hash(&mut hasher);
            info.decision_lvl.hash(&mut hasher);
            info.reason_for_constant.hash(&mut hasher);
        }
        for (cid, uc) in self.uc.iter() {
            cid.hash(&mut hasher);
            uc.hash(&mut hasher);
        }
        self.determinization_order.len().hash(&mut hasher);
        self.universal_assumptions.hash(&mut hasher);
        hasher.finish()
    }
}

fn resolvent_is_tautological(qcnf: &QCNF, left: ClauseId, right: ClauseId, pivot: Var) -> bool {
    qcnf[left]
        .iter()
        .any(|&l| l.var() != pivot && qcnf[right].contains(!l))
}

/// Fresh SAT instance whose variables mirror satlits of another instance,
/// preserving polarities. Used by the disposable local checks.
#[derive(Derivative)]
#[derivative(Debug)]
struct SatlitMirror<S: SatSolver> {
    #[derivative(Debug = "ignore")]
    solver: S,
    #[derivative(Debug = "ignore")]
    map: std::collections::HashMap<usize, S::Lit>,
}

impl<S: SatSolver> Default for SatlitMirror<S> {
    fn default() -> Self {
        Self { solver: S::default(), map: std::collections::HashMap::new() }
    }
}

impl<S: SatSolver> SatlitMirror<S> {
    fn lookup(&mut self, outer: S::Lit) -> S::Lit {
        let mirrored =
            *self.map.entry(outer.var_index()).or_insert_with(|| self.solver.add_variable());
        if outer.is_negative() {
            !mirrored
        } else {
            mirrored
        }
    }
}
