//! The outer solver loop.
//!
//! Orchestrates propagation of the reasoning domains, conflict analysis and
//! clause learning, restarts, case splits, and CEGAR refinement.

use crate::{
    engine::{
        casesplits::Casesplits,
        conflict::{ConflictAnalysis, ConflictSeed, Domain},
        options::Options,
        partial::{Examples, PartialAssignment},
        skolem::{Skolem, SkolemState},
        stats::GlobalStats,
    },
    literal::{Lit, Var},
    qcnf::{ClauseId, QcnfError, QCNF},
    qdimacs::FromQdimacs,
    sat::{varisat::Varisat, LookupSolver, SatSolver},
    QuantTy, SolverResult,
};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};
use tracing::{debug, info, trace, warn};

pub(crate) mod casesplits;
pub(crate) mod cegar;
pub(crate) mod certificate;
pub(crate) mod conflict;
pub(crate) mod minimize;
pub mod options;
pub(crate) mod partial;
pub(crate) mod skolem;
pub(crate) mod stats;

#[cfg(test)]
mod test;

pub use certificate::CertificateError;
pub use options::{CertificateFormat, Options as SolverOptions};

/// The embedded SAT solver backing all reasoning domains.
pub(crate) type Embedded = Varisat<'static>;

const INITIAL_RESTART: u64 = 6;
const RESTART_FACTOR: f32 = 1.2;
const MAJOR_RESTART_FREQUENCY: u64 = 15;
const REPLENISH_FREQUENCY: u64 = 100;
const NUM_RESTARTS_BEFORE_JEROSLOW_WANG: u64 = 3;
const KEEPING_CLAUSES_THRESHOLD: usize = 3;
const DECAY_RATE: f32 = 0.9;
const DECISION_VAR_ACTIVITY_MODIFIER: f32 = 0.8;
const CONFLICT_VAR_WEIGHT: f32 = 2.0;
const IMPLICATION_GRAPH_VARIABLE_ACTIVITY: f32 = 0.5;
const SKOLEM_SUCCESS_HORIZON: f32 = 0.9;
const MAX_CEGAR_ITERATIONS_PER_LEARNT_CLAUSE: u32 = 50;
const CEGAR_EFFECTIVENESS_THRESHOLD: f32 = 17.0;

/// Decision level; level 0 is the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub(crate) struct DecLvl(u32);

impl DecLvl {
    pub(crate) const ROOT: DecLvl = DecLvl(0);

    pub(crate) fn is_root(self) -> bool {
        self == Self::ROOT
    }

    pub(crate) fn successor(self) -> Self {
        Self(self.0 + 1)
    }

    pub(crate) fn predecessor(self) -> Self {
        assert!(self.0 > 0, "the root level has no predecessor");
        Self(self.0 - 1)
    }
}

impl Display for DecLvl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConflictDomainKind {
    Skolem,
    Examples,
}

#[derive(Debug, Clone, Copy)]
struct PendingConflict {
    kind: ConflictDomainKind,
    seed: ConflictSeed,
}

#[derive(Debug)]
pub struct Solver {
    qcnf: QCNF,
    options: Options,
    skolem: Skolem<Embedded>,
    examples: Examples,
    ca: ConflictAnalysis,
    casesplits: Casesplits<Embedded>,
    minimization_pa: PartialAssignment,
    rng: SmallRng,
    /// current VSIDS bump value; activities are rescaled when it overflows
    activity_factor: f32,
    restart_base_decision_lvl: DecLvl,
    next_restart: u64,
    next_major_restart: u64,
    restarts_since_last_major: u64,
    keeping_clauses_threshold: usize,
    decisions_since_last_conflict: u64,
    skolem_success_recent_average: f32,
    conflicts_between_case_splits_countdown: u64,
    case_split_stack: Vec<Lit>,
    refuting_assignment: Option<Vec<Lit>>,
    interrupt: Arc<AtomicBool>,
    halted: bool,
    result: Option<SolverResult>,
    stats: GlobalStats,
}

impl Default for Solver {
    fn default() -> Self {
        Self::with_options(Options::default())
    }
}

impl FromQdimacs for Solver {
    fn set_num_variables(&mut self, _: u32) {}

    fn set_num_clauses(&mut self, _: u32) {}

    fn quantify(&mut self, quant: QuantTy, vars: &[Var]) -> Result<(), QcnfError> {
        self.qcnf.quantify(quant, vars)
    }

    fn add_clause(&mut self, lits: &[Lit]) -> Result<(), QcnfError> {
        for &lit in lits {
            self.qcnf.add_lit(lit);
        }
        let _ = self.qcnf.close_clause(true);
        Ok(())
    }
}

impl Solver {
    #[must_use]
    pub fn with_options(options: Options) -> Self {
        let skolem = Skolem::new(&options);
        let rng = SmallRng::seed_from_u64(options.seed);
        Self {
            qcnf: QCNF::default(),
            skolem,
            examples: Examples::new(options.max_examples),
            ca: ConflictAnalysis::default(),
            casesplits: Casesplits::default(),
            minimization_pa: PartialAssignment::default(),
            rng,
            activity_factor: 1.0,
            restart_base_decision_lvl: DecLvl::ROOT,
            next_restart: INITIAL_RESTART,
            next_major_restart: MAJOR_RESTART_FREQUENCY,
            restarts_since_last_major: 0,
            keeping_clauses_threshold: KEEPING_CLAUSES_THRESHOLD,
            decisions_since_last_conflict: 0,
            skolem_success_recent_average: 1.0,
            conflicts_between_case_splits_countdown: 1,
            case_split_stack: Vec::new(),
            refuting_assignment: None,
            interrupt: Arc::new(AtomicBool::new(false)),
            halted: false,
            result: None,
            stats: GlobalStats::default(),
            options,
        }
    }

    #[cfg(test)]
    pub(crate) fn from_qcnf(qcnf: &crate::qcnf::QCNF, options: Options) -> Self {
        let mut solver = Self::with_options(options);
        for (quant, vars) in qcnf.prefix() {
            solver.qcnf.quantify(*quant, vars).expect("valid test prefix");
        }
        for cid in qcnf.active_clauses() {
            for &lit in qcnf[cid].iter() {
                solver.qcnf.add_lit(lit);
            }
            let _ = solver.qcnf.close_clause(true);
        }
        solver
    }

    pub fn qcnf(&self) -> &QCNF {
        &self.qcnf
    }

    /// Replaces the configuration; only meaningful before solving.
    pub fn set_options(&mut self, options: Options) {
        self.rng = SmallRng::seed_from_u64(options.seed);
        self.examples = Examples::new(options.max_examples);
        self.options = options;
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The refuting universal assignment after an `Unsatisfiable` result.
    pub fn refuting_assignment(&self) -> Option<&[Lit]> {
        self.refuting_assignment.as_deref()
    }

    /// Handle for cooperative cancellation; setting the flag makes the
    /// solver return `Unknown` with a valid, resumable state.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    /// Decides the formula.
    pub fn solve(&mut self) -> SolverResult {
        let start = Instant::now();
        let mut result = self.solve_inner();
        if result == SolverResult::Satisfiable
            && self.options.functional_synthesis
            && self.refuting_assignment.is_some()
        {
            // a function was synthesized, but some universal cube had to
            // be excluded: the formula itself is false
            result = SolverResult::Unsatisfiable;
        }
        self.stats.solve_time = start.elapsed();
        self.result = Some(result);
        self.print_statistics();
        result
    }

    fn solve_inner(&mut self) -> SolverResult {
        if let Some(result) = self.result {
            return result;
        }
        if let Some(empty) = self.qcnf.empty_clause() {
            info!("formula contains the empty clause {empty}");
            self.refuting_assignment = Some(Vec::new());
            return SolverResult::Unsatisfiable;
        }
        if !self.qcnf.has_universals() && !self.options.sat_by_qbf {
            return self.check_propositional();
        }

        self.initialize();

        // initial propagation establishes the root level
        while let Some(pending) = self.propagate() {
            if let Some(result) = self.handle_conflict(pending) {
                return result;
            }
        }
        info!("deterministic vars after initial propagation: {}", self.skolem.deterministic_count());
        self.casesplits.update_interface(&mut self.qcnf, &self.skolem);

        if self.options.cegar_only {
            return self.solve_by_cegar();
        }

        loop {
            if let Some(result) = self.run(self.next_restart) {
                match result {
                    SolverResult::Satisfiable if !self.case_split_stack.is_empty() => {
                        self.successful_case_completion();
                        if self.case_split_stack.is_empty()
                            && self.skolem.check_if_domain_is_empty()
                        {
                            return SolverResult::Satisfiable;
                        }
                        continue;
                    }
                    result => return result,
                }
            }
            if self.halted {
                return SolverResult::Unknown;
            }
            self.stats.restarts += 1;
            debug!("restart {}", self.stats.restarts);
            self.restart_heuristics();
        }
    }

    fn initialize(&mut self) {
        self.skolem = Skolem::new(&self.options);
        self.skolem.add_formula(&self.qcnf);
        self.minimization_pa = PartialAssignment::new(&self.qcnf);
        self.examples = Examples::new(self.options.max_examples);
        let universals: Vec<Var> = self
            .qcnf
            .vars()
            .filter(|(_, info)| info.is_universal())
            .map(|(var, _)| var)
            .collect();
        for _ in 0..self.options.max_examples {
            let seed: Vec<Lit> = universals.iter().map(|&u| u.lit(self.rng.gen())).collect();
            if self.examples.add_assignment(&self.qcnf, seed, 0) {
                // a random counterexample already refutes some propagation
                break;
            }
        }
    }

    fn check_propositional(&mut self) -> SolverResult {
        info!("no universal variables, solving propositionally");
        let mut solver: LookupSolver<Embedded> = LookupSolver::default();
        let mut clause = Vec::new();
        for cid in self.qcnf.active_clauses().collect::<Vec<_>>() {
            clause.clear();
            for &lit in self.qcnf[cid].iter() {
                clause.push(solver.lookup(lit));
            }
            solver.add_clause(&clause);
        }
        if solver.solve().expect("embedded SAT solver failed") {
            SolverResult::Satisfiable
        } else {
            self.refuting_assignment = Some(Vec::new());
            SolverResult::Unsatisfiable
        }
    }

    /// Runs the main loop for the given conflict budget. Returns `None`
    /// when the budget is exhausted (leading to a restart).
    fn run(&mut self, mut remaining_conflicts: u64) -> Option<SolverResult> {
        loop {
            if self.interrupt.load(Ordering::Relaxed) {
                info!("terminate requested");
                self.halted = true;
                self.backtrack_to(self.restart_base_decision_lvl);
                return None;
            }
            trace!("main loop at decision level {}", self.skolem.decision_level());

            if let Some(pending) = self.propagate() {
                if let Some(result) = self.handle_conflict(pending) {
                    return Some(result);
                }
                remaining_conflicts -= 1;
                if remaining_conflicts == 0 {
                    self.backtrack_to(self.restart_base_decision_lvl);
                    return None;
                }
                continue;
            }

            if self.skolem.can_propagate() {
                // a potentially conflicted variable turned out clean
                continue;
            }

            if self.options.case_splits {
                match self.case_split() {
                    casesplits::CaseSplitOutcome::Progress => continue,
                    casesplits::CaseSplitOutcome::EmptyDomain => {
                        return Some(SolverResult::Satisfiable);
                    }
                    casesplits::CaseSplitOutcome::NoSplit => {}
                }
            }

            let Some(var) = self.pick_decision_var() else {
                // no non-deterministic existential remains
                return Some(SolverResult::Satisfiable);
            };

            if let Some(limit) = self.options.hard_decision_limit {
                if self.stats.decisions >= limit {
                    warn!("hard decision limit reached");
                    self.halted = true;
                    self.backtrack_to(self.restart_base_decision_lvl);
                    return None;
                }
            }

            let phase = self.decision_phase(var);
            let decision = var.lit(phase);
            debug!("decision {decision}");
            self.qcnf.scale_activity(var, DECISION_VAR_ACTIVITY_MODIFIER);

            // pushing before the decision keeps level 0 clean
            self.push_level();
            self.stats.decisions += 1;
            self.decisions_since_last_conflict += 1;

            self.examples.decision(&self.qcnf, decision);
            self.examples.propagate(&self.qcnf);
            if self.examples.is_conflicted() {
                debug!("examples domain is conflicted");
            } else {
                self.skolem.decision(&self.qcnf, decision);
            }
        }
    }

    fn propagate(&mut self) -> Option<PendingConflict> {
        self.examples.propagate(&self.qcnf);
        if let Some(pa) = self.examples.conflicted_assignment() {
            let seed = ConflictSeed::Clause(
                pa.conflicted_clause().expect("conflicted worker has a conflicted clause"),
            );
            return Some(PendingConflict { kind: ConflictDomainKind::Examples, seed });
        }
        self.skolem.propagate(&self.qcnf);
        if self.skolem.is_conflicted() {
            // skolem conflicts from violated deterministic clauses and all
            // constants conflicts carry a clause; global conflict checks a
            // conflicted variable
            let seed = match self.skolem.conflicted_clause() {
                Some(cid) => ConflictSeed::Clause(cid),
                None => ConflictSeed::Var(
                    self.skolem.conflict_var().expect("skolem conflict has a variable"),
                ),
            };
            return Some(PendingConflict { kind: ConflictDomainKind::Skolem, seed });
        }
        None
    }

    /// Learns a clause from the conflict. Returns the final result if the
    /// conflict refutes the formula.
    fn handle_conflict(&mut self, pending: PendingConflict) -> Option<SolverResult> {
        self.stats.conflicts += 1;
        if self.conflicts_between_case_splits_countdown > 0 {
            self.conflicts_between_case_splits_countdown -= 1;
        }

        let current_dlvl = self.skolem.decision_level();
        let assignment = match pending.kind {
            ConflictDomainKind::Skolem => self.ca.analyze(
                &self.qcnf,
                &Domain::Skolem(&self.skolem),
                pending.seed,
                current_dlvl,
            ),
            ConflictDomainKind::Examples => {
                let pa = self
                    .examples
                    .conflicted_assignment()
                    .expect("examples conflict has a conflicted worker");
                self.ca.analyze(&self.qcnf, &Domain::<Embedded>::Partial(pa), pending.seed, current_dlvl)
            }
        };
        debug!(
            "conflict {}: {:?}",
            self.stats.conflicts,
            assignment.iter().map(|l| l.to_dimacs()).collect::<Vec<_>>()
        );

        // activity heuristics
        let involved = self.ca.involved_vars().to_vec();
        for var in involved {
            self.bump_activity(var, IMPLICATION_GRAPH_VARIABLE_ACTIVITY);
        }
        if let ConflictSeed::Var(var) = pending.seed {
            self.bump_activity(var, CONFLICT_VAR_WEIGHT);
        }
        for &lit in assignment.iter().filter(|l| self.qcnf.is_universal(l.var())) {
            self.casesplits.add_interface_activity(lit.var(), 1.0);
        }

        // the learnt clause is the negated conflicting assignment
        for &lit in &assignment {
            self.qcnf.add_lit(!lit);
        }
        let mut learnt = self
            .qcnf
            .close_clause(false)
            .expect("conflict clause could not be created");
        self.ca.record_learnt(learnt);
        self.stats.added_clauses += 1;
        self.stats.learnt_clauses_total_length += self.qcnf[learnt].len() as u64;

        let rating = 1.0
            / (self.qcnf[learnt].len() as f32 * self.decisions_since_last_conflict as f32 + 1.0);
        self.skolem_success_recent_average = self.skolem_success_recent_average
            * SKOLEM_SUCCESS_HORIZON
            + rating * (1.0 - SKOLEM_SUCCESS_HORIZON);
        self.decisions_since_last_conflict = 0;

        if self.options.minimize_learnt_clauses {
            if let Some(smaller) = self.minimize_clause(learnt) {
                learnt = smaller;
            }
        }
        let lits: Vec<Lit> = self.qcnf[learnt].lits().to_vec();

        if self.decisions_involved(&lits, pending.kind) {
            // update the examples database with the conflicting universal
            // assignment of the embedded solver
            if self.skolem.state() == SkolemState::SkolemConflict && self.examples.is_enabled() {
                let seed = self.universal_assignment_from_skolem();
                if self.examples.add_assignment(
                    &self.qcnf,
                    seed.clone(),
                    self.skolem.push_count(),
                ) {
                    debug!("conflicting universal assignment refutes by propagation alone");
                    self.refuting_assignment = Some(seed);
                    return Some(SolverResult::Unsatisfiable);
                }
            }

            // CEGAR closes nearby counterexamples before backtracking
            if self.options.cegar && self.skolem.state() == SkolemState::SkolemConflict {
                for _ in 0..MAX_CEGAR_ITERATIONS_PER_LEARNT_CLAUSE {
                    if let Some(result) = self.cegar_one_round() {
                        return Some(result);
                    }
                    if self.casesplits.stats.recent_average_cube_size
                        >= CEGAR_EFFECTIVENESS_THRESHOLD
                        || !self.skolem.resolve_model()
                    {
                        break;
                    }
                }
            }

            let backtracking_lvl = self.determine_backtracking_lvl(&lits, pending.kind);
            debug!(
                "learnt clause of length {}, backtracking to level {backtracking_lvl}",
                lits.len()
            );
            self.backtrack_to(backtracking_lvl);
            self.skolem.new_clause(&self.qcnf, learnt);
            self.examples.new_clause(learnt);
            self.decay_activity();
            None
        } else if self.options.functional_synthesis
            && assignment.iter().any(|l| self.qcnf.is_universal(l.var()))
        {
            // exclude the refuted universal cube and keep searching for a
            // function on the rest; the formula itself is refuted
            debug!("excluding refuted cube of length {}", lits.len());
            self.backtrack_to(self.restart_base_decision_lvl);
            self.skolem.clear_conflict();
            let cube: Vec<Lit> = assignment
                .iter()
                .copied()
                .filter(|l| self.qcnf.is_universal(l.var()))
                .collect();
            if self.refuting_assignment.is_none() {
                self.refuting_assignment = Some(cube.clone());
            }
            self.skolem.block_universal_cube(&cube);
            None
        } else {
            self.refuting_assignment = Some(
                assignment
                    .iter()
                    .copied()
                    .filter(|l| self.qcnf.is_universal(l.var()))
                    .collect(),
            );
            Some(SolverResult::Unsatisfiable)
        }
    }

    fn universal_assignment_from_skolem(&self) -> Vec<Lit> {
        self.qcnf
            .vars()
            .filter(|(_, info)| info.is_universal())
            .map(|(var, _)| {
                let val = self.skolem.value_for_conflict_analysis(var.positive());
                var.lit(val >= 0)
            })
            .collect()
    }

    fn domain_decision_lvl(&self, kind: ConflictDomainKind, var: Var) -> DecLvl {
        match kind {
            ConflictDomainKind::Skolem => self.skolem.decision_lvl_of(var),
            ConflictDomainKind::Examples => self
                .examples
                .conflicted_assignment()
                .map_or(DecLvl::ROOT, |pa| pa.decision_lvl_of(var)),
        }
    }

    fn decisions_involved(&self, lits: &[Lit], kind: ConflictDomainKind) -> bool {
        lits.iter()
            .any(|l| self.domain_decision_lvl(kind, l.var()) > self.restart_base_decision_lvl)
    }

    /// The second largest decision level of the learnt clause, clamped to
    /// the restart base.
    fn determine_backtracking_lvl(&self, lits: &[Lit], kind: ConflictDomainKind) -> DecLvl {
        let mut dlvls: Vec<DecLvl> = lits
            .iter()
            .map(|l| {
                let mut dlvl = self.domain_decision_lvl(kind, l.var());
                if kind == ConflictDomainKind::Skolem {
                    dlvl = dlvl.min(self.skolem.dlvl_for_constant(l.var()));
                }
                dlvl
            })
            .collect();
        dlvls.sort_unstable();
        while dlvls.len() >= 2 && dlvls[dlvls.len() - 1] == dlvls[dlvls.len() - 2] {
            let _ = dlvls.pop();
        }
        let second_largest = if dlvls.len() <= 1 {
            DecLvl::ROOT
        } else {
            dlvls[dlvls.len() - 2]
        };
        second_largest.max(self.restart_base_decision_lvl)
    }

    fn pick_decision_var(&self) -> Option<Var> {
        let mut best: Option<(Var, f32)> = None;
        for (var, info) in self.qcnf.vars() {
            if info.is_universal() || self.skolem.is_deterministic(var) {
                continue;
            }
            if self.qcnf.occurrence_count(var) == 0 {
                // variables without occurrences are unconstrained
                continue;
            }
            let activity = self.qcnf.activity(var);
            if best.map_or(true, |(_, best_activity)| activity > best_activity) {
                best = Some((var, activity));
            }
        }
        best.map(|(var, _)| var)
    }

    /// Phase selection: positive during warm-up, by Jeroslow-Wang weight
    /// afterwards.
    fn decision_phase(&self, var: Var) -> bool {
        let warmup = if self.options.easy_debugging { 0 } else { NUM_RESTARTS_BEFORE_JEROSLOW_WANG };
        if self.stats.restarts < warmup {
            return true;
        }
        let pos = self.jeroslow_wang_log_weight(var.positive());
        let neg = self.jeroslow_wang_log_weight(var.negative());
        pos > neg
    }

    fn jeroslow_wang_log_weight(&self, lit: Lit) -> f32 {
        let occs = self.qcnf.occs_of_lit(lit);
        let mut weight = 0.0f32;
        for &cid in occs {
            let len = self.qcnf[cid].len();
            if len <= 10 {
                weight += (2.0f32).powi(-(len as i32));
            }
        }
        weight + occs.len() as f32 * 0.05
    }

    // ------------------------------------------------------------------
    // activities

    fn bump_activity(&mut self, var: Var, weight: f32) {
        self.qcnf.add_activity(var, weight * self.activity_factor);
    }

    fn decay_activity(&mut self) {
        let new_factor = self.activity_factor / DECAY_RATE;
        if new_factor.is_finite() && new_factor < 1000.0 {
            self.activity_factor = new_factor;
        } else {
            self.rescale_activity_values();
            self.activity_factor /= DECAY_RATE;
        }
    }

    fn rescale_activity_values(&mut self) {
        let rescale = 1.0 / self.activity_factor;
        let vars: Vec<Var> = self.qcnf.vars().map(|(var, _)| var).collect();
        for var in vars {
            self.qcnf.scale_activity(var, rescale);
        }
        self.activity_factor = 1.0;
    }

    // ------------------------------------------------------------------
    // backtracking

    fn push_level(&mut self) {
        self.qcnf.push();
        self.skolem.push();
        self.skolem.increase_decision_lvl();
        self.examples.push();
    }

    fn pop_level(&mut self) {
        self.qcnf.pop();
        self.skolem.pop();
        self.examples.pop();
        self.stats.lvls_backtracked += 1;
    }

    fn backtrack_to(&mut self, lvl: DecLvl) {
        let mut popped = false;
        while self.skolem.decision_level() > lvl {
            self.pop_level();
            popped = true;
        }
        if popped {
            // re-seed the partial-assignment workers whose assignments
            // were unwound
            self.examples.redo(&self.qcnf);
        }
    }

    // ------------------------------------------------------------------
    // restarts

    fn restart_heuristics(&mut self) {
        self.restarts_since_last_major += 1;
        self.next_restart = (self.next_restart as f32 * RESTART_FACTOR) as u64;
        self.rescale_activity_values();

        if self.next_major_restart == self.restarts_since_last_major {
            info!("major restart");
            self.stats.major_restarts += 1;
            self.restarts_since_last_major = 0;
            self.next_restart = INITIAL_RESTART;
            if self.options.delete_clauses_on_restarts {
                self.delete_learnt_clauses_greater_than(self.keeping_clauses_threshold);
                self.keeping_clauses_threshold += 1;
            }
            self.qcnf.clear_activities();
            self.activity_factor = 1.0;
            self.next_major_restart = (self.next_major_restart as f32 * RESTART_FACTOR) as u64;
        }

        if self.stats.restarts % REPLENISH_FREQUENCY == REPLENISH_FREQUENCY - 1 {
            // stepping out of case splits keeps replenishing simple
            self.backtrack_out_of_case_splits();
            self.replenish_skolem();
        }
    }

    fn delete_learnt_clauses_greater_than(&mut self, threshold: usize) {
        // clause deletion invalidates the cached reasons of the
        // partial-assignment workers
        self.examples = Examples::new(self.options.max_examples);
        let mut deleted = 0usize;
        for idx in 0..self.qcnf.clause_count() {
            let cid = ClauseId::from_index(idx);
            let clause = &self.qcnf[cid];
            if !clause.is_active()
                || clause.is_original()
                || clause.is_cube()
                || clause.len() <= threshold
                || self.skolem.has_unique_consequence(cid)
            {
                continue;
            }
            self.qcnf.retire_clause(cid);
            deleted += 1;
        }
        debug!("deleted {deleted} learnt clauses above length {threshold}");
    }

    /// Rebuilds the embedded SAT instance from scratch, preserving solved
    /// cubes and statistics.
    fn replenish_skolem(&mut self) {
        info!("replenishing the embedded SAT solver");
        assert!(self.skolem.decision_level().is_root());
        self.stats.replenishments += 1;
        let stats = std::mem::take(&mut self.skolem.stats);
        self.skolem = Skolem::new(&self.options);
        self.skolem.stats = stats;
        self.skolem.add_formula(&self.qcnf);
        let conflict = self.propagate();
        assert!(conflict.is_none(), "conflicted after replenishing");
        self.casesplits.update_interface(&mut self.qcnf, &self.skolem);
        let cubes: Vec<Vec<Lit>> = self
            .casesplits
            .solved_cases
            .iter()
            .map(|case| case.cube.clone())
            .filter(|cube| !cube.is_empty())
            .collect();
        for cube in cubes {
            self.skolem.block_universal_cube(&cube);
        }
    }

    fn print_statistics(&mut self) {
        self.examples.collect_propagation_stats();
        info!("\n{:#?}", self.stats);
        info!("\n{:#?}", self.skolem.stats);
        info!("\n{:#?}", self.casesplits.stats);
        info!("\n{:#?}", self.examples.stats);
        info!("universal reductions: {}", self.qcnf.universal_reductions());
    }
}
