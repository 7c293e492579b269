//! Partial-assignment workers.
//!
//! A [`PartialAssignment`] propagates one concrete assignment to the
//! universals through the matrix by classical unit propagation. The
//! [`Examples`] manager runs several of them in parallel with the Skolem
//! engine to catch conflicts cheaply and to generate reasons.

use crate::{
    datastructure::{UndoStack, VarVec},
    engine::{stats::ExampleStats, DecLvl},
    literal::{Lit, Var},
    qcnf::{ClauseId, QCNF},
};
use std::collections::VecDeque;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Val {
    #[default]
    Top,
    True,
    False,
}

#[derive(Debug, Clone, Copy)]
enum PaOp {
    Assign(Var),
    Conflict,
    DecisionLvl { prev: DecLvl },
}

#[derive(Debug, Default)]
pub(crate) struct PartialAssignment {
    vals: VarVec<Val>,
    /// the clause that propagated the variable, if any
    causes: VarVec<Option<ClauseId>>,
    decision_lvls: VarVec<DecLvl>,
    decision_lvl: DecLvl,
    clauses_to_check: VecDeque<ClauseId>,
    conflicted_clause: Option<ClauseId>,
    /// the universal assignment this worker was seeded with
    seed: Vec<Lit>,
    undo: UndoStack<PaOp>,
    pub(crate) propagations: u64,
    pub(crate) conflicts: u64,
}

impl PartialAssignment {
    pub(crate) fn new(qcnf: &QCNF) -> Self {
        let mut pa = Self::default();
        pa.vals.set_var_count(qcnf.var_count());
        pa.causes.set_var_count(qcnf.var_count());
        pa.decision_lvls.set_var_count(qcnf.var_count());
        pa
    }

    /// `1` if the literal is true, `-1` if false, `0` if unassigned.
    pub(crate) fn value(&self, lit: Lit) -> i8 {
        let val = match self.vals[lit.var()] {
            Val::Top => return 0,
            Val::True => 1,
            Val::False => -1,
        };
        if lit.is_negative() {
            -val
        } else {
            val
        }
    }

    pub(crate) fn decision_lvl_of(&self, var: Var) -> DecLvl {
        self.decision_lvls[var]
    }

    pub(crate) fn cause_of(&self, var: Var) -> Option<ClauseId> {
        self.causes[var]
    }

    pub(crate) fn is_conflicted(&self) -> bool {
        self.conflicted_clause.is_some()
    }

    pub(crate) fn conflicted_clause(&self) -> Option<ClauseId> {
        self.conflicted_clause
    }

    pub(crate) fn assign(&mut self, qcnf: &QCNF, lit: Lit, cause: Option<ClauseId>) {
        assert_eq!(self.value(lit), 0, "only unassigned variables can be assigned");
        trace!("partial assignment: {lit}");
        let var = lit.var();
        self.undo.record(PaOp::Assign(var));
        self.vals[var] = if lit.is_positive() { Val::True } else { Val::False };
        self.causes[var] = cause;
        self.decision_lvls[var] = self.decision_lvl;
        for &cid in qcnf.occs_of_lit(!lit) {
            self.clauses_to_check.push_back(cid);
        }
    }

    pub(crate) fn new_clause(&mut self, cid: ClauseId) {
        self.clauses_to_check.push_back(cid);
    }

    pub(crate) fn propagate(&mut self, qcnf: &QCNF) {
        while let Some(cid) = self.clauses_to_check.pop_front() {
            if self.is_conflicted() {
                return;
            }
            if qcnf[cid].is_active() {
                self.propagate_clause(qcnf, cid);
            }
        }
    }

    fn propagate_clause(&mut self, qcnf: &QCNF, cid: ClauseId) {
        let mut unassigned = None;
        for &lit in qcnf[cid].iter() {
            match self.value(lit) {
                1 => return, // satisfied
                -1 => {}
                _ => {
                    if unassigned.is_some() {
                        return;
                    }
                    unassigned = Some(lit);
                }
            }
        }
        match unassigned {
            None => {
                self.conflicts += 1;
                debug!("partial assignment conflicted on clause {cid}");
                self.undo.record(PaOp::Conflict);
                self.conflicted_clause = Some(cid);
            }
            Some(lit) => {
                self.propagations += 1;
                self.assign(qcnf, lit, Some(cid));
            }
        }
    }

    pub(crate) fn push(&mut self) {
        self.undo.push();
        self.undo.record(PaOp::DecisionLvl { prev: self.decision_lvl });
        self.decision_lvl = self.decision_lvl.successor();
    }

    pub(crate) fn pop(&mut self) {
        for op in self.undo.pop() {
            match op {
                PaOp::Assign(var) => {
                    self.vals[var] = Val::Top;
                    self.causes[var] = None;
                    self.decision_lvls[var] = DecLvl::ROOT;
                }
                PaOp::Conflict => {
                    self.conflicted_clause = None;
                }
                PaOp::DecisionLvl { prev } => self.decision_lvl = prev,
            }
        }
        self.clauses_to_check.clear();
    }

    pub(crate) fn push_count(&self) -> usize {
        self.undo.milestone_count()
    }

    /// Re-seeds the worker after backtracking removed its assignments.
    fn redo(&mut self, qcnf: &QCNF) {
        let seed = self.seed.clone();
        for lit in seed {
            if !self.is_conflicted() && self.value(lit) == 0 {
                self.assign(qcnf, lit, None);
            }
        }
        self.propagate(qcnf);
    }
}

#[derive(Debug, Default)]
pub(crate) struct Examples {
    max_num: usize,
    ex: Vec<PartialAssignment>,
    pub(crate) stats: ExampleStats,
}

impl Examples {
    pub(crate) fn new(max_num: usize) -> Self {
        Self { max_num, ex: Vec::new(), stats: ExampleStats::default() }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.max_num > 0
    }

    pub(crate) fn is_conflicted(&self) -> bool {
        self.conflicted_assignment().is_some()
    }

    pub(crate) fn conflicted_assignment(&self) -> Option<&PartialAssignment> {
        self.ex.iter().find(|pa| pa.is_conflicted())
    }

    /// Adds a worker seeded with the provided universal assignment. The
    /// oldest worker is evicted when the limit is reached. Returns whether
    /// the new worker is conflicted right away.
    pub(crate) fn add_assignment(&mut self, qcnf: &QCNF, seed: Vec<Lit>, depth: usize) -> bool {
        if self.max_num == 0 {
            return false;
        }
        if self.ex.len() >= self.max_num {
            let _ = self.ex.remove(0);
        }
        debug!("new partial-assignment worker over {} universals", seed.len());
        let mut pa = PartialAssignment::new(qcnf);
        // align the undo stack with the enclosing search depth
        for _ in 0..depth {
            pa.push();
        }
        pa.seed = seed;
        pa.redo(qcnf);
        let conflicted = pa.is_conflicted();
        self.ex.push(pa);
        conflicted
    }

    /// Replays seeds of all workers, used after backtracking.
    pub(crate) fn redo(&mut self, qcnf: &QCNF) {
        for pa in &mut self.ex {
            if !pa.is_conflicted() {
                pa.redo(qcnf);
            }
        }
    }

    pub(crate) fn decision(&mut self, qcnf: &QCNF, decision_lit: Lit) {
        for pa in &mut self.ex {
            if !pa.is_conflicted() && pa.value(decision_lit) == 0 {
                pa.assign(qcnf, decision_lit, None);
            }
        }
    }

    pub(crate) fn propagate(&mut self, qcnf: &QCNF) {
        for pa in &mut self.ex {
            pa.propagate(qcnf);
            if pa.is_conflicted() {
                self.stats.conflicts += 1;
                return;
            }
        }
    }

    pub(crate) fn new_clause(&mut self, cid: ClauseId) {
        for pa in &mut self.ex {
            pa.new_clause(cid);
        }
    }

    pub(crate) fn push(&mut self) {
        for pa in &mut self.ex {
            pa.push();
        }
    }

    pub(crate) fn pop(&mut self) {
        for pa in &mut self.ex {
            pa.pop();
        }
    }

    pub(crate) fn collect_propagation_stats(&mut self) {
        self.stats.propagations = self.ex.iter().map(|pa| pa.propagations).sum();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unit_propagation() {
        let qcnf = qcnf_formula![
            a 1;
            e 2 3;
            1 2;
            -2 3;
        ];
        let mut pa = PartialAssignment::new(&qcnf);
        pa.push();
        pa.assign(&qcnf, Lit::from_dimacs(-1), None);
        pa.propagate(&qcnf);
        assert!(!pa.is_conflicted());
        assert_eq!(pa.value(Lit::from_dimacs(2)), 1);
        assert_eq!(pa.value(Lit::from_dimacs(3)), 1);
        assert_eq!(pa.cause_of(Var::from_dimacs(3)), qcnf.active_clauses().nth(1));
    }

    #[test]
    fn conflict_and_pop() {
        let qcnf = qcnf_formula![
            a 1;
            e 2;
            1 2;
            1 -2;
        ];
        let mut pa = PartialAssignment::new(&qcnf);
        pa.push();
        pa.assign(&qcnf, Lit::from_dimacs(-1), None);
        pa.propagate(&qcnf);
        assert!(pa.is_conflicted());
        pa.pop();
        assert!(!pa.is_conflicted());
        assert_eq!(pa.value(Lit::from_dimacs(1)), 0);
    }

    #[test]
    fn example_worker_catches_conflict() {
        let qcnf = qcnf_formula![
            a 1;
            e 2;
            1 2;
            1 -2;
        ];
        let mut examples = Examples::new(2);
        let conflicted = examples.add_assignment(&qcnf, vec![Lit::from_dimacs(-1)], 0);
        assert!(conflicted);
        assert!(examples.is_conflicted());
    }
}
