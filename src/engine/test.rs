use crate::{
    aig::{negate, AIG_TRUE},
    engine::{casesplits::Casesplits, options::Options, Embedded, Solver},
    qcnf::QCNF,
    sat::{LookupSolver, SatSolver},
    Lit, SolverResult,
};

fn solve(qcnf: &QCNF) -> SolverResult {
    solve_with(qcnf, Options::default())
}

fn solve_with(qcnf: &QCNF, options: Options) -> SolverResult {
    let mut solver = Solver::from_qcnf(qcnf, options);
    solver.solve()
}

/// All workers and optimizations switched on.
fn eager_options() -> Options {
    Options {
        case_splits: true,
        max_examples: 2,
        enhanced_pure_literals: true,
        delete_clauses_on_restarts: true,
        ..Options::default()
    }
}

#[test]
fn propagation_sat() {
    let qcnf = qcnf_formula![
        a 1;
        e 2;
        1 -2;
        -1 2;
    ];
    assert_eq!(solve(&qcnf), SolverResult::Satisfiable);
}

#[test]
fn propagation_unsat() {
    let qcnf = qcnf_formula![
        a 1;
        e 2;
        1 -2;
        -1 2;
        -1 -2;
    ];
    assert_eq!(solve(&qcnf), SolverResult::Unsatisfiable);
}

/// Example from "Incremental Determinization" by Rabe & Seshia.
/// The formula is solved by propagation only.
#[test]
fn propagation_sat_incdet_paper() {
    let qcnf = qcnf_formula![
        a 1 2;
        e 3 4;
        // 3 <=> 1 & 2
        1 -3; 2 -3; -1 -2 3;
        // 4 <=> 1 | 3
        -1 -4; -3 -4; 1 3 4;
    ];
    assert_eq!(solve(&qcnf), SolverResult::Satisfiable);
}

#[test]
fn global_conflict_analysis() {
    let qcnf = qcnf_formula![
        a 1;
        e 2 3;
        2;
        2 -3;
        -2 3;
        2 3;
    ];
    assert_eq!(solve(&qcnf), SolverResult::Satisfiable);
}

#[test]
fn unsat_with_decision() {
    let qcnf = qcnf_formula![
        a 1 2;
        e 3 4 5;
        2 -3;
        -1 -2 3;
        1 -4;
        -3 -4;
        1 3 4;
        -1 5;
        1 -5;
    ];
    assert_eq!(solve(&qcnf), SolverResult::Unsatisfiable);
}

#[test]
fn unsat_1() {
    let qcnf = qcnf_formula![
        a 3;
        e 1 2 4 5;
        -5 -3;
        5 -1;
        1;
        4 2;
    ];
    assert_eq!(solve(&qcnf), SolverResult::Unsatisfiable);
}

#[test]
fn unsat_2() {
    let qcnf = qcnf_formula![
        a 2 4;
        e 1 3 5;
        -5 2;
        -3 -1;
        3 1;
        1 -3 5;
        -1 -4;
    ];
    assert_eq!(solve(&qcnf), SolverResult::Unsatisfiable);
}

#[test]
fn constant_propagation_unsat() {
    let qcnf = qcnf_formula![
        a 2;
        e 1;
        -1;
        1 -2;
    ];
    assert_eq!(solve(&qcnf), SolverResult::Unsatisfiable);
}

#[test]
fn pure_literal_forces_true() {
    // y occurs only positively and must hold for every x
    let qcnf = qcnf_formula![
        a 1;
        e 2;
        1 2;
        -1 2;
    ];
    let mut solver = Solver::from_qcnf(&qcnf, Options::default());
    assert_eq!(solver.solve(), SolverResult::Satisfiable);
    let aig = solver.build_certificate().unwrap();
    solver.verify_certificate(&aig).unwrap();
    assert_eq!(aig.outputs().len(), 1);
    assert_eq!(aig.outputs()[0].0, AIG_TRUE);
}

#[test]
fn certificate_negated_input() {
    // y must equal !x
    let qcnf = qcnf_formula![
        a 1;
        e 2;
        1 2;
        -1 -2;
    ];
    let mut solver = Solver::from_qcnf(&qcnf, Options::default());
    assert_eq!(solver.solve(), SolverResult::Satisfiable);
    let aig = solver.build_certificate().unwrap();
    solver.verify_certificate(&aig).unwrap();
    let input = aig.inputs()[0].0;
    assert_eq!(aig.outputs()[0].0, negate(input));
}

#[test]
fn universal_clauses_refute() {
    // clauses over universals only reduce to the empty clause
    let qcnf = qcnf_formula![
        a 1;
        e 2;
        1;
        -1;
    ];
    let mut solver = Solver::from_qcnf(&qcnf, Options::default());
    assert_eq!(solver.solve(), SolverResult::Unsatisfiable);
    assert!(solver.refuting_assignment().is_some());
}

#[test]
fn certificate_and_function() {
    // y <=> x1 & x2
    let qcnf = qcnf_formula![
        a 1 2;
        e 3;
        -1 -2 3;
        1 -3;
        2 -3;
    ];
    let mut solver = Solver::from_qcnf(&qcnf, Options::default());
    assert_eq!(solver.solve(), SolverResult::Satisfiable);
    let aig = solver.build_certificate().unwrap();
    solver.verify_certificate(&aig).unwrap();
}

#[test]
fn pure_literal_with_decision() {
    // y2 = !y1 and y1 = x
    let qcnf = qcnf_formula![
        a 1;
        e 2 3;
        2 3;
        -2 3 1;
        2 -3 -1;
        -2 -3;
    ];
    let mut solver = Solver::from_qcnf(&qcnf, Options::default());
    assert_eq!(solver.solve(), SolverResult::Satisfiable);
    let aig = solver.build_certificate().unwrap();
    solver.verify_certificate(&aig).unwrap();
}

#[test]
fn contradictory_units_conflict_constants() {
    let qcnf = qcnf_formula![
        a 1;
        e 2;
        1 2;
        -1 -2;
        -2;
        2;
    ];
    let mut solver = Solver::from_qcnf(&qcnf, Options::default());
    assert_eq!(solver.solve(), SolverResult::Unsatisfiable);
    solver.verify_refutation().unwrap();
}

#[test]
fn propositional_fallback() {
    let qcnf = qcnf_formula![
        e 1 2;
        1 2;
        -1 2;
        1 -2;
    ];
    assert_eq!(solve(&qcnf), SolverResult::Satisfiable);

    let refuted = qcnf_formula![
        e 1;
        1;
        -1;
    ];
    assert_eq!(solve(&refuted), SolverResult::Unsatisfiable);
}

#[test]
fn propositional_by_qbf_engine() {
    let qcnf = qcnf_formula![
        e 1 2;
        1 2;
        -1 2;
        1 -2;
    ];
    let options = Options { sat_by_qbf: true, ..Options::default() };
    assert_eq!(solve_with(&qcnf, options), SolverResult::Satisfiable);
}

#[test]
fn cegar_only_sat() {
    let qcnf = qcnf_formula![
        a 1;
        e 2 3;
        2 3;
        -2 3 1;
        2 -3 -1;
        -2 -3;
    ];
    let options = Options { cegar_only: true, ..Options::default() };
    let mut solver = Solver::from_qcnf(&qcnf, options);
    assert_eq!(solver.solve(), SolverResult::Satisfiable);
    let aig = solver.build_certificate().unwrap();
    solver.verify_certificate(&aig).unwrap();
}

#[test]
fn cegar_only_unsat() {
    let qcnf = qcnf_formula![
        a 1;
        e 2;
        1 -2;
        -1 2;
        -1 -2;
    ];
    let options = Options { cegar_only: true, ..Options::default() };
    let mut solver = Solver::from_qcnf(&qcnf, options);
    assert_eq!(solver.solve(), SolverResult::Unsatisfiable);
    solver.verify_refutation().unwrap();
}

#[test]
fn eager_configuration() {
    let sat = qcnf_formula![
        a 1 2;
        e 3 4;
        1 -3; 2 -3; -1 -2 3;
        -1 -4; -3 -4; 1 3 4;
    ];
    assert_eq!(solve_with(&sat, eager_options()), SolverResult::Satisfiable);

    let unsat = qcnf_formula![
        a 2 4;
        e 1 3 5;
        -5 2;
        -3 -1;
        3 1;
        1 -3 5;
        -1 -4;
    ];
    assert_eq!(solve_with(&unsat, eager_options()), SolverResult::Unsatisfiable);
}

#[test]
fn decision_limit_yields_unknown() {
    let qcnf = qcnf_formula![
        a 1 2 3;
        e 4 5 6;
        1 2 4 5;
        -1 5 6;
        2 -4 -6;
        3 -5 6;
        -2 -3 4 6;
        1 -2 -5 -6;
    ];
    let options = Options { hard_decision_limit: Some(0), cegar: false, ..Options::default() };
    let result = solve_with(&qcnf, options);
    // either solved by propagation alone or cut off by the limit
    assert_ne!(result, SolverResult::Satisfiable);
}

#[test]
fn quantifier_elimination_output() {
    let qcnf = qcnf_formula![
        a 1;
        e 2;
        1 2;
        -1 2;
    ];
    let options = Options { quantifier_elimination: true, ..Options::default() };
    let mut solver = Solver::from_qcnf(&qcnf, options);
    assert_eq!(solver.solve(), SolverResult::Satisfiable);
    let aig = solver.build_certificate().unwrap();
    assert_eq!(aig.outputs().len(), 1);
}

#[test]
fn functional_synthesis_produces_function_on_unsat() {
    let qcnf = qcnf_formula![
        a 1;
        e 2;
        1 -2;
        -1 2;
        -1 -2;
    ];
    let options = Options { functional_synthesis: true, cegar: false, ..Options::default() };
    let mut solver = Solver::from_qcnf(&qcnf, options);
    // the formula is false, but a function for the non-refuted cubes is
    // still synthesized
    assert_eq!(solver.solve(), SolverResult::Unsatisfiable);
    solver.verify_refutation().unwrap();
    let aig = solver.build_certificate().unwrap();
    assert_eq!(aig.outputs().len(), 1);
}

#[test]
fn skolem_push_pop_restores_state() {
    let qcnf = qcnf_formula![
        a 1 2;
        e 3;
        1 2 3;
        -1 -3;
    ];
    let mut solver = Solver::from_qcnf(&qcnf, Options::default());
    solver.initialize();
    assert!(solver.propagate().is_none());

    let digest = solver.skolem.digest();
    solver.push_level();
    solver.skolem.assume_universal(&solver.qcnf, Lit::from_dimacs(1));
    solver.skolem.propagate(&solver.qcnf);
    assert_ne!(solver.skolem.digest(), digest);
    solver.pop_level();
    assert_eq!(solver.skolem.digest(), digest);
}

#[test]
fn case_generalization_drops_irrelevant_assumptions() {
    // y equals x1; x2 never matters for the recorded function
    let qcnf = qcnf_formula![
        a 1 2;
        e 3;
        -1 3;
        1 -3;
    ];
    let mut solver = Solver::from_qcnf(&qcnf, Options::default());
    solver.initialize();
    assert!(solver.propagate().is_none());

    let case = Casesplits::capture_case(
        &solver.qcnf,
        &solver.skolem,
        vec![Lit::from_dimacs(1), Lit::from_dimacs(2)],
    );
    // the function works for every universal assignment, so no assumption
    // is necessary at all
    let core = solver.generalize_case_cube(&case).unwrap();
    assert!(core.is_empty());
}

#[test]
fn completed_case_records_generalized_cube() {
    // under x1 the only choice is y = true; x2 is irrelevant
    let qcnf = qcnf_formula![
        a 1 2;
        e 3;
        1 3;
        1 -3;
        -1 3;
    ];
    let mut solver = Solver::from_qcnf(&qcnf, Options::default());
    solver.initialize();
    // enter a case split of depth two before any propagation
    for assumption in [Lit::from_dimacs(1), Lit::from_dimacs(2)] {
        solver.push_level();
        solver.restart_base_decision_lvl = solver.skolem.decision_level();
        solver.skolem.assume_universal(&solver.qcnf, assumption);
        solver.case_split_stack.push(assumption);
    }
    assert!(solver.propagate().is_none());

    solver.successful_case_completion();
    let case = solver.casesplits.solved_cases.last().unwrap();
    // the recorded cube kept the necessary assumption and is strictly
    // shorter than the assumption depth
    assert_eq!(case.cube, vec![Lit::from_dimacs(1)]);
    assert_eq!(solver.case_split_stack.len(), 1);
    assert_eq!(solver.casesplits.stats.case_generalizations, 1);
}

#[test]
fn resolution_graph_entails_learnt_clauses() {
    let qcnf = qcnf_formula![
        a 2 4;
        e 1 3 5;
        -5 2;
        -3 -1;
        3 1;
        1 -3 5;
        -1 -4;
    ];
    let mut solver = Solver::from_qcnf(&qcnf, Options::default());
    assert_eq!(solver.solve(), SolverResult::Unsatisfiable);
    for (&learnt, sources) in solver.ca.resolution_graph() {
        // every learnt clause is entailed by the clauses it resolves:
        // the sources together with the negated learnt literals conflict
        let mut checker: LookupSolver<Embedded> = LookupSolver::default();
        let mut clause = Vec::new();
        for &source in sources {
            clause.clear();
            for &lit in solver.qcnf()[source].iter() {
                clause.push(checker.lookup(lit));
            }
            checker.add_clause(&clause);
        }
        for &lit in solver.qcnf()[learnt].iter() {
            let mapped = checker.lookup(!lit);
            checker.add_clause(&[mapped]);
        }
        assert!(!checker.solve().unwrap(), "learnt clause {learnt} is not entailed");
    }
}

/// Reference semantics: a 2QBF of the form forall-exists is true iff the
/// matrix is satisfiable under every universal assignment.
fn brute_force(qcnf: &QCNF) -> SolverResult {
    let universals: Vec<_> = qcnf
        .vars()
        .filter(|(_, info)| info.is_universal())
        .map(|(var, _)| var)
        .collect();
    for bits in 0..(1u32 << universals.len()) {
        let assignment: Vec<(crate::Var, bool)> = universals
            .iter()
            .enumerate()
            .map(|(idx, &var)| (var, bits & (1 << idx) != 0))
            .collect();
        let mut solver: LookupSolver<Embedded> = LookupSolver::default();
        let mut clause = Vec::new();
        let mut refuted = false;
        'clauses: for cid in qcnf.active_clauses() {
            clause.clear();
            for &lit in qcnf[cid].iter() {
                if let Some(&(_, value)) =
                    assignment.iter().find(|(var, _)| *var == lit.var())
                {
                    if value != lit.is_negative() {
                        continue 'clauses; // satisfied by the universal
                    }
                    continue;
                }
                clause.push(solver.lookup(lit));
            }
            if clause.is_empty() {
                refuted = true;
                break;
            }
            solver.add_clause(&clause);
        }
        if refuted || !solver.solve().expect("SAT solver failed") {
            return SolverResult::Unsatisfiable;
        }
    }
    SolverResult::Satisfiable
}

mod random {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn matches_brute_force(qcnf in crate::qcnf::strategy::qcnf_2qbf(3, 4, 1..12, 1..5)) {
            let expected = brute_force(&qcnf);
            let mut solver = Solver::from_qcnf(&qcnf, Options::default());
            prop_assert_eq!(solver.solve(), expected);
            if expected == SolverResult::Satisfiable {
                let aig = solver.build_certificate().unwrap();
                prop_assert!(solver.verify_certificate(&aig).is_ok());
            } else {
                prop_assert!(solver.verify_refutation().is_ok());
            }
        }

        #[test]
        fn matches_brute_force_eager(qcnf in crate::qcnf::strategy::qcnf_2qbf(3, 3, 1..10, 1..4)) {
            let expected = brute_force(&qcnf);
            prop_assert_eq!(solve_with(&qcnf, eager_options()), expected);
        }
    }
}
