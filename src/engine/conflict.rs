//! Conflict analysis.
//!
//! A single reusable worker follows the implicit reason graph of either the
//! Skolem engine or a partial assignment backward and produces the
//! conflicting assignment whose negation is the learnt clause.

use crate::{
    engine::{partial::PartialAssignment, skolem::Skolem, DecLvl},
    literal::{Lit, Var},
    qcnf::{ClauseId, QCNF},
    sat::SatSolver,
};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, trace};

/// The reasoning domain interrogated during conflict analysis.
#[derive(Debug)]
pub(crate) enum Domain<'a, S: SatSolver> {
    Skolem(&'a Skolem<S>),
    Partial(&'a PartialAssignment),
}

impl<S: SatSolver> Domain<'_, S> {
    fn value(&self, lit: Lit) -> i8 {
        match self {
            Domain::Skolem(skolem) => skolem.value_for_conflict_analysis(lit),
            Domain::Partial(pa) => pa.value(lit),
        }
    }

    fn is_relevant_clause(&self, cid: ClauseId, lit: Lit) -> bool {
        match self {
            Domain::Skolem(skolem) => skolem.is_relevant_clause(cid, lit),
            Domain::Partial(pa) => pa.cause_of(lit.var()) == Some(cid),
        }
    }

    fn is_legal_dependence(&self, qcnf: &QCNF, var: Var, on: Var) -> bool {
        match self {
            Domain::Skolem(skolem) => skolem.may_depend_on(qcnf, var, on),
            // a concrete assignment carries no dependence restrictions
            Domain::Partial(_) => true,
        }
    }

    fn decision_lvl(&self, var: Var) -> DecLvl {
        match self {
            Domain::Skolem(skolem) => {
                if skolem.get_constant_value(var.positive()) != 0 {
                    skolem.dlvl_for_constant(var)
                } else {
                    skolem.decision_lvl_of(var)
                }
            }
            Domain::Partial(pa) => pa.decision_lvl_of(var),
        }
    }

    /// Whether a literal is legitimately reason-less in this domain.
    fn expects_no_reason(&self, qcnf: &QCNF, lit: Lit) -> bool {
        match self {
            Domain::Skolem(skolem) => {
                qcnf.is_universal(lit.var())
                    || skolem.is_decision_var(lit.var())
                    || skolem.universal_assumptions().contains(&lit)
            }
            Domain::Partial(pa) => pa.cause_of(lit.var()).is_none(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum ConflictSeed {
    /// All literals of a falsified clause.
    Clause(ClauseId),
    /// Both polarities of a conflicted variable.
    Var(Var),
}

#[derive(Debug, Default)]
pub(crate) struct ConflictAnalysis {
    /// worklist of literals, resolved in descending variable order
    queue: BTreeSet<Lit>,
    /// every literal is resolved at most once
    seen: BTreeSet<Lit>,
    conflicting_assignment: Vec<Lit>,
    /// variables touched by this conflict, for activity bumping
    involved: Vec<Var>,
    /// clause ids that acted as reasons in the last conflict
    resolutions_of_last_conflict: Vec<ClauseId>,
    /// maps learnt clauses to the clauses they were derived from
    resolution_graph: HashMap<ClauseId, Vec<ClauseId>>,
    conflict_decision_lvl: DecLvl,
}

impl ConflictAnalysis {
    fn reset(&mut self) {
        self.queue.clear();
        self.seen.clear();
        self.conflicting_assignment.clear();
        self.involved.clear();
        self.resolutions_of_last_conflict.clear();
        self.conflict_decision_lvl = DecLvl::ROOT;
    }

    pub(crate) fn involved_vars(&self) -> &[Var] {
        &self.involved
    }

    /// Records that `learnt` was derived from the reasons of the last
    /// conflict.
    pub(crate) fn record_learnt(&mut self, learnt: ClauseId) {
        let _ = self
            .resolution_graph
            .insert(learnt, self.resolutions_of_last_conflict.clone());
    }

    #[cfg(test)]
    pub(crate) fn resolution_graph(&self) -> &HashMap<ClauseId, Vec<ClauseId>> {
        &self.resolution_graph
    }

    /// Produces the conflicting assignment; its negation is the learnt
    /// clause. An empty result refutes the formula.
    pub(crate) fn analyze<S: SatSolver>(
        &mut self,
        qcnf: &QCNF,
        domain: &Domain<'_, S>,
        seed: ConflictSeed,
        current_dlvl: DecLvl,
    ) -> Vec<Lit> {
        self.reset();

        let conflicted_var = match seed {
            ConflictSeed::Clause(cid) => {
                self.resolutions_of_last_conflict.push(cid);
                for &lit in qcnf[cid].iter() {
                    self.schedule(!lit);
                    let lvl = domain.decision_lvl(lit.var());
                    self.conflict_decision_lvl = self.conflict_decision_lvl.max(lvl);
                }
                None
            }
            ConflictSeed::Var(var) => {
                debug_assert_eq!(domain.value(var.positive()), 1);
                debug_assert_eq!(domain.value(var.negative()), 1);
                self.conflict_decision_lvl = current_dlvl;
                self.schedule(var.positive());
                self.schedule(var.negative());
                Some(var)
            }
        };

        while let Some(lit) = self.pop() {
            let var = lit.var();
            let d_lvl = if conflicted_var == Some(var) {
                current_dlvl
            } else {
                domain.decision_lvl(var)
            };
            assert!(d_lvl <= self.conflict_decision_lvl);

            if d_lvl < self.conflict_decision_lvl {
                self.accumulate(lit);
                continue;
            }
            if let Some(reason) = self.find_reason(qcnf, domain, lit) {
                trace!("reason for {lit} is clause {reason}");
                self.resolutions_of_last_conflict.push(reason);
                self.schedule_causing_vars(qcnf, domain, reason, lit);
            } else {
                assert!(
                    domain.expects_no_reason(qcnf, lit),
                    "no reason for literal {lit} found in conflict analysis"
                );
                self.accumulate(lit);
            }
        }

        debug!(
            "conflicting assignment: {:?}",
            self.conflicting_assignment.iter().map(|l| l.to_dimacs()).collect::<Vec<_>>()
        );
        self.conflicting_assignment.clone()
    }

    fn schedule(&mut self, lit: Lit) {
        if self.seen.insert(lit) {
            let _ = self.queue.insert(lit);
            self.involved.push(lit.var());
        }
    }

    fn pop(&mut self) -> Option<Lit> {
        self.queue.pop_last()
    }

    fn accumulate(&mut self, lit: Lit) {
        if !self.conflicting_assignment.contains(&lit) {
            self.conflicting_assignment.push(lit);
        }
    }

    /// A reason clause forces `lit`: all its other literals are falsified
    /// by the domain. Among candidates the one with the fewest unvisited
    /// variables wins; cubes are only taken when nothing else fits.
    fn find_reason<S: SatSolver>(
        &self,
        qcnf: &QCNF,
        domain: &Domain<'_, S>,
        lit: Lit,
    ) -> Option<ClauseId> {
        let mut candidate: Option<ClauseId> = None;
        let mut candidate_cost = usize::MAX;
        let mut candidate_is_cube = false;
        for &cid in qcnf.occs_of_lit(lit) {
            if !domain.is_relevant_clause(cid, lit) {
                continue;
            }
            if !self.is_reason_for_lit(qcnf, domain, cid, lit) {
                continue;
            }
            let cost = self.cost(qcnf, cid);
            let is_cube = qcnf[cid].is_cube();
            let better = match candidate {
                None => true,
                Some(_) => (candidate_is_cube && !is_cube) || (cost < candidate_cost && !is_cube),
            };
            if better {
                candidate = Some(cid);
                candidate_cost = cost;
                candidate_is_cube = is_cube;
                if cost == 0 {
                    break;
                }
            }
        }
        candidate
    }

    fn is_reason_for_lit<S: SatSolver>(
        &self,
        qcnf: &QCNF,
        domain: &Domain<'_, S>,
        cid: ClauseId,
        lit: Lit,
    ) -> bool {
        qcnf[cid].iter().all(|&other| {
            // conflicted variables may serve as reasons, so only the other
            // literals must be surely false
            other == lit || domain.value(!other) == 1
        })
    }

    /// The number of literals whose negation was not yet scheduled.
    fn cost(&self, qcnf: &QCNF, cid: ClauseId) -> usize {
        qcnf[cid].iter().filter(|&&l| !self.seen.contains(&!l)).count()
    }

    fn schedule_causing_vars<S: SatSolver>(
        &mut self,
        qcnf: &QCNF,
        domain: &Domain<'_, S>,
        reason: ClauseId,
        consequence: Lit,
    ) {
        for &lit in qcnf[reason].iter() {
            if lit == consequence {
                continue;
            }
            if !domain.is_legal_dependence(qcnf, consequence.var(), lit.var()) {
                // illegal dependencies would not resolve; keep them as
                // atomic terms of the conflict
                debug_assert_eq!(domain.value(lit), -1);
                self.accumulate(!lit);
                continue;
            }
            debug_assert_eq!(domain.value(!lit), 1);
            self.schedule(!lit);
        }
    }
}
