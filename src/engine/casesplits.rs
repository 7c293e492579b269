//! Case splits and the solved-cases database.
//!
//! A case split restricts the search to a universal sub-cube by assuming a
//! universal literal. When the engine proves the sub-cube satisfiable, the
//! case is recorded for certificate emission, the cube is permanently
//! blocked in the embedded solver, and the search continues on the rest.

use crate::{
    datastructure::VarVec,
    engine::{
        skolem::{DetKind, Skolem},
        Embedded, Solver,
    },
    literal::{Lit, Var},
    qcnf::{ClauseId, QCNF},
    sat::{LookupSolver, SatSolver},
};
use derivative::Derivative;
use tracing::{debug, info};

const NOTORIOUSITY_THRESHOLD_FACTOR: f32 = 5.0;
const CASE_SPLIT_LINEAR_DEPTH_PENALTY_FACTOR: u64 = 5;
const NUM_RESTARTS_BEFORE_CASE_SPLITS: u64 = 3;
const UNIVERSAL_ACTIVITY_DECAY: f32 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CaseKind {
    /// A completed case split; the Skolem function is recorded as the
    /// determinization order with its unique-consequence antecedents.
    Function,
    /// A cube closed by CEGAR; the witness is a concrete existential
    /// assignment.
    CegarCube,
}

#[derive(Debug, Clone)]
pub(crate) struct CaseDet {
    pub(crate) var: Var,
    pub(crate) kind: DetKind,
    pub(crate) pos_clauses: Vec<ClauseId>,
    pub(crate) neg_clauses: Vec<ClauseId>,
}

#[derive(Debug, Clone)]
pub(crate) struct Case {
    pub(crate) kind: CaseKind,
    /// universal cube under which this case applies; empty means "the rest"
    pub(crate) cube: Vec<Lit>,
    pub(crate) dets: Vec<CaseDet>,
    /// existential witness of CEGAR cubes
    pub(crate) assignment: Vec<Lit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CaseSplitOutcome {
    /// An assumption was placed, the search continues in the sub-cube.
    Progress,
    /// Both polarities of every candidate are vacuous; every universal
    /// assignment is covered by solved cases.
    EmptyDomain,
    NoSplit,
}

#[derive(Derivative)]
#[derivative(Debug)]
pub(crate) struct Casesplits<S: SatSolver> {
    /// dual SAT instance over the original clauses, used by CEGAR
    #[derivative(Debug = "ignore")]
    pub(crate) exists_solver: LookupSolver<S>,
    /// the universals the abstraction talks about
    pub(crate) interface_vars: Vec<Var>,
    interface_activities: VarVec<f32>,
    is_used_in_lemma: VarVec<bool>,
    pub(crate) additional_assignment: Vec<Lit>,
    pub(crate) solved_cases: Vec<Case>,
    pub(crate) stats: crate::engine::stats::CegarStats,
    initialized: bool,
}

impl<S: SatSolver> Default for Casesplits<S> {
    fn default() -> Self {
        Self {
            exists_solver: LookupSolver::default(),
            interface_vars: Vec::new(),
            interface_activities: VarVec::default(),
            is_used_in_lemma: VarVec::default(),
            additional_assignment: Vec::new(),
            solved_cases: Vec::new(),
            stats: crate::engine::stats::CegarStats::default(),
            initialized: false,
        }
    }
}

impl<S: SatSolver> Casesplits<S> {
    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// (Re-)encodes the existential abstraction and determines the
    /// universal interface: the universals occurring in clauses that are
    /// not yet covered by a deterministic unique consequence. Walking the
    /// clauses also compacts previously retired clauses out of the
    /// active-clause vector.
    pub(crate) fn update_interface(&mut self, qcnf: &mut QCNF, skolem: &Skolem<S>) {
        self.initialized = true;
        self.exists_solver = LookupSolver::default();
        self.interface_vars.clear();
        let mut clause = Vec::new();
        let mut iter = qcnf.clause_iter();
        while let Some(cid) =
            qcnf.next_active(&mut iter).expect("interface update does not add clauses")
        {
            if !qcnf[cid].is_original() {
                continue;
            }
            if let Some(uc) = skolem.unique_consequence(cid) {
                if skolem.is_deterministic(uc.var()) {
                    continue;
                }
            }
            clause.clear();
            for &lit in qcnf[cid].iter() {
                clause.push(self.exists_solver.lookup(lit));
                if qcnf.is_universal(lit.var()) {
                    self.interface_vars.push(lit.var());
                }
            }
            self.exists_solver.add_clause(&clause);
        }
        self.interface_vars.sort_unstable();
        self.interface_vars.dedup();
        for &var in &self.interface_vars {
            self.interface_activities.ensure(var);
            self.is_used_in_lemma.ensure(var);
        }
        debug!("interface has {} universals", self.interface_vars.len());
    }

    pub(crate) fn interface_activity(&self, var: Var) -> f32 {
        self.interface_activities.get(var).copied().unwrap_or(0.0)
    }

    pub(crate) fn add_interface_activity(&mut self, var: Var, value: f32) {
        self.interface_activities.ensure(var);
        self.interface_activities[var] += value;
    }

    pub(crate) fn decay_interface_activity(&mut self, var: Var) {
        self.interface_activities.ensure(var);
        self.interface_activities[var] *= UNIVERSAL_ACTIVITY_DECAY;
    }

    pub(crate) fn is_used_in_lemma(&self, var: Var) -> bool {
        self.is_used_in_lemma.get(var).copied().unwrap_or(false)
    }

    pub(crate) fn set_used_in_lemma(&mut self, var: Var, used: bool) {
        self.is_used_in_lemma.ensure(var);
        self.is_used_in_lemma[var] = used;
    }

    /// Snapshot of the current Skolem function for certificate emission.
    pub(crate) fn capture_case(qcnf: &QCNF, skolem: &Skolem<S>, cube: Vec<Lit>) -> Case {
        let mut dets = Vec::with_capacity(skolem.determinization_order().len());
        for entry in skolem.determinization_order() {
            let var = entry.var;
            let clauses_for = |lit: Lit| -> Vec<ClauseId> {
                qcnf.occs_of_lit(lit)
                    .iter()
                    .copied()
                    .filter(|&cid| {
                        skolem.unique_consequence(cid) == Some(lit)
                            && !qcnf[cid].is_cube()
                            && !skolem.has_illegal_dependence(qcnf, cid, var)
                    })
                    .collect()
            };
            dets.push(CaseDet {
                var,
                kind: entry.kind,
                pos_clauses: clauses_for(var.positive()),
                neg_clauses: clauses_for(var.negative()),
            });
        }
        Case { kind: CaseKind::Function, cube, dets, assignment: Vec::new() }
    }
}

impl Solver {
    /// Tries to restrict the search to a notoriously conflicted universal
    /// sub-cube.
    pub(crate) fn case_split(&mut self) -> CaseSplitOutcome {
        let warmup =
            if self.options.easy_debugging { 0 } else { NUM_RESTARTS_BEFORE_CASE_SPLITS };
        if self.stats.restarts < warmup
            || self.conflicts_between_case_splits_countdown > 0
            || self.skolem.decision_level() != self.restart_base_decision_lvl
            || !self.casesplits.is_initialized()
        {
            return CaseSplitOutcome::NoSplit;
        }

        let Some(var) = self.pick_notorious_universal() else {
            return CaseSplitOutcome::NoSplit;
        };
        for &v in &self.casesplits.interface_vars.clone() {
            self.casesplits.decay_interface_activity(v);
        }

        let phase = self.jeroslow_wang_log_weight(var.positive())
            >= self.jeroslow_wang_log_weight(var.negative());
        let mut assumption = var.lit(phase);
        if self.skolem.is_universal_assumption_vacuous(assumption) {
            debug!("assumption {assumption} is vacuous, flipping");
            assumption = !assumption;
            if self.skolem.is_universal_assumption_vacuous(assumption) {
                info!("both polarities of {var} are vacuous; domain is empty");
                return CaseSplitOutcome::EmptyDomain;
            }
        }

        debug!("case split on {assumption}");
        self.push_level();
        self.restart_base_decision_lvl = self.skolem.decision_level();
        self.skolem.assume_universal(&self.qcnf, assumption);
        self.case_split_stack.push(assumption);
        let depth = self.case_split_stack.len() as u64;
        let penalty = if self.options.easy_debugging {
            1
        } else {
            CASE_SPLIT_LINEAR_DEPTH_PENALTY_FACTOR
        };
        self.conflicts_between_case_splits_countdown = depth * penalty;
        CaseSplitOutcome::Progress
    }

    /// A universal is notorious when its recent share of conflicts exceeds
    /// what the plain search resolves easily.
    fn pick_notorious_universal(&self) -> Option<Var> {
        let threshold = NOTORIOUSITY_THRESHOLD_FACTOR
            * self.skolem_success_recent_average
            * (1.0 + self.case_split_stack.len() as f32);
        let mut best: Option<(Var, f32)> = None;
        for &var in &self.casesplits.interface_vars {
            if self.skolem.get_constant_value(var.positive()) != 0 {
                continue;
            }
            let notoriousity = self.casesplits.interface_activity(var)
                + self.skolem.conflict_potential(var);
            if notoriousity > threshold
                && best.map_or(true, |(_, score)| notoriousity > score)
            {
                best = Some((var, notoriousity));
            }
        }
        best.map(|(var, _)| var)
    }

    /// The sub-cube was proven satisfiable: record the case, step out of
    /// the innermost assumption, and exclude the cube from future search.
    /// The cube is generalized to its failed-assumption core first.
    pub(crate) fn successful_case_completion(&mut self) {
        self.stats.cases_explored += 1;
        let assumptions = self.skolem.universal_assumptions().to_vec();
        info!("completed case split of depth {}", assumptions.len());
        let mut case = Casesplits::capture_case(&self.qcnf, &self.skolem, assumptions);
        if let Some(core) = self.generalize_case_cube(&case) {
            if core.len() < case.cube.len() {
                debug!(
                    "generalized case cube from {} to {} assumptions",
                    case.cube.len(),
                    core.len()
                );
                self.casesplits.stats.case_generalizations +=
                    (case.cube.len() - core.len()) as u64;
            }
            case.cube = core;
        }
        let cube = case.cube.clone();
        self.casesplits.solved_cases.push(case);

        let assumption = self.case_split_stack.pop().expect("completed case has an assumption");
        debug!("stepping out of assumption {assumption}");
        let target = self.restart_base_decision_lvl.predecessor();
        self.restart_base_decision_lvl = target;
        self.backtrack_to(target);
        self.skolem.block_universal_cube(&cube);
        self.conflicts_between_case_splits_countdown = 1;
    }

    /// Tests which assumptions of a closed case are actually needed: the
    /// recorded function is co-encoded with "some original clause is
    /// violated" and the cube is assumed. The check must come back
    /// unsatisfiable, and its failed-assumption subset is already
    /// sufficient for the function to work. Returns `None` when the check
    /// unexpectedly finds a violation; the full cube stays in place then.
    pub(crate) fn generalize_case_cube(&self, case: &Case) -> Option<Vec<Lit>> {
        let mut solver: LookupSolver<Embedded> = LookupSolver::default();

        // each variable's solver literal is constrained to the output of
        // the recorded function
        for det in &case.dets {
            match det.kind {
                DetKind::Constant(lit) => {
                    let unit = solver.lookup(lit);
                    solver.add_clause(&[unit]);
                }
                DetKind::TwoSided => {
                    let fires = encode_antecedents_fire(
                        &self.qcnf,
                        &mut solver,
                        &det.pos_clauses,
                        det.var.positive(),
                    );
                    let value = solver.lookup(det.var.positive());
                    solver.add_clause(&[!value, fires]);
                    solver.add_clause(&[value, !fires]);
                }
                DetKind::Pure(side) => {
                    let clauses =
                        if side.is_positive() { &det.pos_clauses } else { &det.neg_clauses };
                    let fires = encode_antecedents_fire(&self.qcnf, &mut solver, clauses, side);
                    let value = solver.lookup(side);
                    solver.add_clause(&[!value, fires]);
                    solver.add_clause(&[value, !fires]);
                }
                DetKind::Decision(side) => {
                    let (own, opposite) = if side.is_positive() {
                        (&det.pos_clauses, &det.neg_clauses)
                    } else {
                        (&det.neg_clauses, &det.pos_clauses)
                    };
                    let own_fires =
                        encode_antecedents_fire(&self.qcnf, &mut solver, own, side);
                    let opposite_fires =
                        encode_antecedents_fire(&self.qcnf, &mut solver, opposite, !side);
                    // the decided phase fills the remaining cases
                    let value = solver.lookup(side);
                    solver.add_clause(&[!value, own_fires, !opposite_fires]);
                    solver.add_clause(&[!own_fires, value]);
                    solver.add_clause(&[opposite_fires, value]);
                }
            }
        }

        // some original clause is violated
        let mut violated = Vec::new();
        for cid in self.qcnf.active_clauses().collect::<Vec<_>>() {
            if !self.qcnf[cid].is_original() {
                continue;
            }
            let selector = solver.add_variable();
            for &lit in self.qcnf[cid].iter() {
                let mapped = solver.lookup(!lit);
                solver.add_clause(&[!selector, mapped]);
            }
            violated.push(selector);
        }
        solver.add_clause(&violated);

        let assumptions: Vec<_> = case.cube.iter().map(|&lit| solver.lookup(lit)).collect();
        if solver
            .solve_with_assumptions(&assumptions)
            .expect("embedded SAT solver failed")
        {
            debug!("closed case did not pass the generalization check");
            return None;
        }
        Some(case.cube.iter().copied().filter(|&lit| solver.is_failed(lit)).collect())
    }

    pub(crate) fn backtrack_out_of_case_splits(&mut self) {
        if self.case_split_stack.is_empty() {
            return;
        }
        debug!("abandoning {} open case splits", self.case_split_stack.len());
        self.case_split_stack.clear();
        self.restart_base_decision_lvl = crate::engine::DecLvl::ROOT;
        self.backtrack_to(crate::engine::DecLvl::ROOT);
    }
}

/// Holds iff the antecedent of some of the clauses fires, i.e. all its
/// literals besides `lit` are false.
fn encode_antecedents_fire(
    qcnf: &QCNF,
    solver: &mut LookupSolver<Embedded>,
    clauses: &[ClauseId],
    lit: Lit,
) -> <Embedded as SatSolver>::Lit {
    let fires = solver.add_variable();
    let mut some_antecedent = vec![!fires];
    for &cid in clauses {
        let antecedent = solver.add_variable();
        let mut cover = vec![antecedent];
        for &other in qcnf[cid].iter() {
            if other == lit {
                continue;
            }
            let mapped = solver.lookup(other);
            solver.add_clause(&[!antecedent, !mapped]);
            cover.push(mapped);
        }
        solver.add_clause(&cover);
        solver.add_clause(&[!antecedent, fires]);
        some_antecedent.push(antecedent);
    }
    solver.add_clause(&some_antecedent);
    fires
}
