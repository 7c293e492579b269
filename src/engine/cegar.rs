//! Counterexample-guided refinement against the existential abstraction.
//!
//! Given the universal assignment of a failed Skolem candidate, the dual
//! existential SAT instance is asked for a witness. A satisfiable answer is
//! generalized into a cube over the universals that is excluded from future
//! search; an unsatisfiable answer refutes the formula.

use crate::{
    engine::{
        casesplits::{Case, CaseKind},
        Solver,
    },
    literal::{Lit, Var},
    sat::SatSolver,
    SolverResult,
};
use std::sync::atomic::Ordering;
use tracing::{debug, info};

impl Solver {
    /// The value the failed candidate assigns to an interface universal;
    /// unconstrained universals default to true.
    fn cegar_get_val(&self, var: Var) -> bool {
        self.skolem.value_for_conflict_analysis(var.positive()) >= 0
    }

    /// One CEGAR round for the current conflicting assignment. Returns the
    /// overall result when the abstraction refutes the formula.
    pub(crate) fn cegar_one_round(&mut self) -> Option<SolverResult> {
        assert!(self.casesplits.is_initialized());
        self.casesplits.stats.rounds += 1;

        let interface = self.casesplits.interface_vars.clone();
        let mut assumptions = Vec::with_capacity(interface.len());
        for &var in &interface {
            self.casesplits.set_used_in_lemma(var, true);
            assumptions.push(var.lit(self.cegar_get_val(var)));
        }
        let mapped: Vec<_> =
            assumptions.iter().map(|&lit| self.casesplits.exists_solver.lookup(lit)).collect();
        let witness_exists = self
            .casesplits
            .exists_solver
            .solve_with_assumptions(&mapped)
            .expect("embedded SAT solver failed");

        if witness_exists {
            self.casesplits.additional_assignment.clear();
            let mut cube = Vec::new();
            for &var in &interface {
                if self.cegar_var_needs_to_be_set(var) {
                    let val = self
                        .casesplits
                        .exists_solver
                        .value_of(var.positive())
                        .expect("interface variable is set in the witness");
                    cube.push(var.lit(val));
                } else {
                    self.casesplits.set_used_in_lemma(var, false);
                }
            }
            let assignment = self.cegar_existential_witness();
            debug!("completed cube of length {}", cube.len());
            self.casesplits.stats.recent_average_cube_size =
                cube.len() as f32 * 0.1 + self.casesplits.stats.recent_average_cube_size * 0.9;
            self.skolem.block_universal_cube(&cube);
            self.casesplits.solved_cases.push(Case {
                kind: CaseKind::CegarCube,
                cube,
                dets: Vec::new(),
                assignment,
            });
            None
        } else if self.options.functional_synthesis {
            // exclude the unsatisfiable core and keep synthesizing on the
            // remaining domain; the formula itself is refuted
            let core: Vec<Lit> = assumptions
                .iter()
                .copied()
                .filter(|&lit| self.casesplits.exists_solver.is_failed(lit))
                .collect();
            debug!("excluding unsatisfiable core of length {}", core.len());
            if self.refuting_assignment.is_none() {
                self.refuting_assignment = Some(core.clone());
            }
            self.skolem.block_universal_cube(&core);
            None
        } else {
            info!("existential abstraction is unsatisfiable, formula is refuted");
            self.refuting_assignment = Some(assumptions);
            Some(SolverResult::Unsatisfiable)
        }
    }

    /// The witness assignment for all original existentials, used by the
    /// certificate.
    fn cegar_existential_witness(&self) -> Vec<Lit> {
        self.qcnf
            .vars()
            .filter(|(_, info)| info.is_existential() && info.is_original())
            .map(|(var, _)| {
                let val = self.casesplits.exists_solver.value_of(var.positive()).unwrap_or_else(
                    || {
                        // unassigned by the witness; honor additional
                        // assignments made during minimization
                        !self.casesplits.additional_assignment.contains(&var.negative())
                    },
                );
                var.lit(val)
            })
            .collect()
    }

    /// Greedy cube minimization: an interface variable is dropped when its
    /// clauses stay satisfied by the remaining witness alone, possibly by
    /// fixing one further unset literal.
    fn cegar_var_needs_to_be_set(&mut self, var: Var) -> bool {
        let val = self
            .casesplits
            .exists_solver
            .value_of(var.positive())
            .expect("cegar interface variable is set");
        let lit = var.lit(val);
        let mut additional_for_var: Vec<Lit> = Vec::new();

        for &cid in self.qcnf.occs_of_lit(lit) {
            if !self.qcnf[cid].is_original() || !self.qcnf[cid].is_active() {
                continue;
            }
            let mut satisfied_without = false;
            let mut can_be_satisfied_by_unset: Option<Lit> = None;
            for &occ in self.qcnf[cid].iter() {
                if occ.var() == var {
                    continue;
                }
                let occ_val = self.casesplits.exists_solver.value_of(occ);
                if occ_val == Some(false) || !self.casesplits.is_used_in_lemma(occ.var()) {
                    continue;
                }
                if occ_val == Some(true)
                    || self.casesplits.additional_assignment.contains(&occ)
                    || additional_for_var.contains(&occ)
                {
                    satisfied_without = true;
                    break;
                }
                if can_be_satisfied_by_unset.is_none()
                    && !self.casesplits.additional_assignment.contains(&!occ)
                    && !additional_for_var.contains(&!occ)
                {
                    satisfied_without = true;
                    can_be_satisfied_by_unset = Some(occ);
                }
            }
            if !satisfied_without {
                return true;
            }
            if let Some(unset) = can_be_satisfied_by_unset {
                self.casesplits.stats.additional_assignments_num += 1;
                additional_for_var.push(unset);
            }
        }
        self.casesplits.additional_assignment.append(&mut additional_for_var);
        self.casesplits.stats.successful_minimizations += 1;
        false
    }

    /// The CEGAR-only loop: refine cubes until the domain is empty or a
    /// counterexample survives.
    pub(crate) fn solve_by_cegar(&mut self) -> SolverResult {
        info!("solving by CEGAR refinement only");
        loop {
            if self.interrupt.load(Ordering::Relaxed) {
                self.halted = true;
                return SolverResult::Unknown;
            }
            if self.skolem.check_if_domain_is_empty() {
                return SolverResult::Satisfiable;
            }
            if let Some(result) = self.cegar_one_round() {
                return result;
            }
        }
    }
}
