//! Certificate emission.
//!
//! Replays the recorded cases into an AIG: inputs are the universals,
//! outputs the original existentials. Within a case every existential is
//! either a constant, the disjunction of its unique-consequence
//! antecedents, or that disjunction extended by the decided phase; a
//! priority multiplexer chain selects among the cases.

use crate::{
    aig::{negate, Aig, AIG_FALSE, AIG_TRUE},
    datastructure::VarVec,
    engine::{
        casesplits::{Case, CaseKind, Casesplits},
        options::CertificateFormat,
        skolem::{DetKind, SkolemState},
        Embedded, Solver,
    },
    literal::{Lit, Var},
    qcnf::ClauseId,
    sat::{LookupSolver, SatSolver},
    SolverResult,
};
use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, Diagnostic)]
pub enum CertificateError {
    #[error("certificates are only available for satisfiable results")]
    NotSatisfiable,

    #[error("certificate disagrees with the formula for universal assignment {assignment:?}")]
    Inconsistent { assignment: Vec<i32> },

    #[error("no refuting assignment was recorded")]
    NoRefutation,

    #[error("refuting assignment {assignment:?} admits an existential witness")]
    RefutationInconsistent { assignment: Vec<i32> },
}

impl Solver {
    fn original_universals(&self) -> Vec<Var> {
        self.qcnf
            .vars()
            .filter(|(_, info)| info.is_universal() && info.is_original())
            .map(|(var, _)| var)
            .collect()
    }

    fn original_existentials(&self) -> Vec<Var> {
        self.qcnf
            .vars()
            .filter(|(_, info)| info.is_existential() && info.is_original())
            .map(|(var, _)| var)
            .collect()
    }

    /// Builds the Skolem-function circuit from the solver trace. In
    /// functional-synthesis mode a circuit is also available for refuted
    /// formulas; it covers the non-refuted universal cubes.
    ///
    /// # Errors
    ///
    /// Fails unless the previous [`Solver::solve`] returned `Satisfiable`
    /// (or anything but `Unknown` in functional-synthesis mode).
    pub fn build_certificate(&self) -> Result<Aig, CertificateError> {
        let eligible = match self.result {
            Some(SolverResult::Satisfiable) => true,
            Some(SolverResult::Unsatisfiable) => self.options.functional_synthesis,
            _ => false,
        };
        if !eligible {
            return Err(CertificateError::NotSatisfiable);
        }

        let mut cases = self.casesplits.solved_cases.clone();
        if self.skolem.state() != SkolemState::EmptyDomain {
            // the current engine state covers the remaining universal domain
            cases.push(Casesplits::capture_case(&self.qcnf, &self.skolem, Vec::new()));
        }
        debug!("emitting certificate with {} cases", cases.len());

        // QBFcert tools do not expect a symbol table
        let with_symbols = self.options.certificate_format != CertificateFormat::Qbfcert;
        let symbol = |var: Var| with_symbols.then(|| var.to_dimacs().to_string());

        let mut aig = Aig::default();
        let mut input_signals: VarVec<Option<u32>> = VarVec::default();
        input_signals.set_var_count(self.qcnf.var_count());
        for &var in &self.original_universals() {
            input_signals[var] = Some(aig.new_input(symbol(var)));
        }

        let encoded: Vec<(u32, VarVec<Option<u32>>)> =
            cases.iter().map(|case| self.encode_case(&mut aig, case, &input_signals)).collect();

        if self.options.quantifier_elimination {
            // a single bit: some case applies
            let selectors: Vec<u32> = encoded.iter().map(|(selector, _)| *selector).collect();
            let applies = aig.multi_or(&selectors);
            aig.add_output(applies, with_symbols.then(|| "result".to_owned()));
            return Ok(aig);
        }

        for &var in &self.original_existentials() {
            // priority multiplexer chain: the first case whose selector
            // holds provides the value
            let mut out = AIG_FALSE;
            let mut previous_applies = AIG_FALSE;
            for (selector, values) in &encoded {
                // variables without occurrences stay undefined; any output
                // works for them
                let value = values.get(var).copied().flatten().unwrap_or(AIG_FALSE);
                let this_applies = {
                    let not_prev = negate(previous_applies);
                    aig.and(not_prev, *selector)
                };
                let selected = aig.and(this_applies, value);
                out = aig.or(out, selected);
                previous_applies = aig.or(previous_applies, *selector);
            }
            aig.add_output(out, symbol(var));
        }
        Ok(aig)
    }

    fn encode_case(
        &self,
        aig: &mut Aig,
        case: &Case,
        input_signals: &VarVec<Option<u32>>,
    ) -> (u32, VarVec<Option<u32>>) {
        let mut values: VarVec<Option<u32>> = VarVec::default();
        values.set_var_count(self.qcnf.var_count());

        match case.kind {
            CaseKind::CegarCube => {
                for &lit in &case.assignment {
                    values[lit.var()] = Some(if lit.is_positive() { AIG_TRUE } else { AIG_FALSE });
                }
            }
            CaseKind::Function => {
                for det in &case.dets {
                    let signal = match det.kind {
                        DetKind::Constant(lit) => {
                            if lit.is_positive() {
                                AIG_TRUE
                            } else {
                                AIG_FALSE
                            }
                        }
                        DetKind::TwoSided => self.encode_antecedents(
                            aig,
                            &det.pos_clauses,
                            det.var.positive(),
                            &values,
                            input_signals,
                        ),
                        DetKind::Pure(side) => {
                            let clauses =
                                if side.is_positive() { &det.pos_clauses } else { &det.neg_clauses };
                            let fires =
                                self.encode_antecedents(aig, clauses, side, &values, input_signals);
                            if side.is_positive() {
                                fires
                            } else {
                                negate(fires)
                            }
                        }
                        DetKind::Decision(side) => {
                            let (own, opposite) = if side.is_positive() {
                                (&det.pos_clauses, &det.neg_clauses)
                            } else {
                                (&det.neg_clauses, &det.pos_clauses)
                            };
                            let own_fires =
                                self.encode_antecedents(aig, own, side, &values, input_signals);
                            let opposite_fires = self.encode_antecedents(
                                aig,
                                opposite,
                                !side,
                                &values,
                                input_signals,
                            );
                            // the decided phase fills the remaining cases
                            let value = aig.or(own_fires, negate(opposite_fires));
                            if side.is_positive() {
                                value
                            } else {
                                negate(value)
                            }
                        }
                    };
                    values[det.var] = Some(signal);
                }
            }
        }

        let cube_signals: Vec<u32> = case
            .cube
            .iter()
            .map(|&lit| {
                let input = input_signals[lit.var()].expect("cube literals are universal inputs");
                if lit.is_negative() {
                    negate(input)
                } else {
                    input
                }
            })
            .collect();
        let selector = aig.multi_and(&cube_signals);
        (selector, values)
    }

    /// The disjunction over the clauses' antecedents; an antecedent is the
    /// conjunction of the negations of the other literals.
    fn encode_antecedents(
        &self,
        aig: &mut Aig,
        clauses: &[ClauseId],
        lit: Lit,
        values: &VarVec<Option<u32>>,
        input_signals: &VarVec<Option<u32>>,
    ) -> u32 {
        let mut antecedents = Vec::with_capacity(clauses.len());
        for &cid in clauses {
            let mut antecedent = AIG_TRUE;
            for &other in self.qcnf[cid].iter() {
                if other == lit {
                    continue;
                }
                let signal = signal_of(other, values, input_signals);
                antecedent = aig.and(antecedent, negate(signal));
            }
            antecedents.push(antecedent);
        }
        aig.multi_or(&antecedents)
    }

    /// Co-encodes the certificate and the CNF and checks that no clause can
    /// be violated while the circuit drives the existentials.
    ///
    /// # Errors
    ///
    /// Fails with [`CertificateError::Inconsistent`] when a violating
    /// universal assignment exists; such an assignment is a solver bug.
    pub fn verify_certificate(&self, aig: &Aig) -> Result<(), CertificateError> {
        info!("verifying certificate against the formula");
        let mut solver: LookupSolver<Embedded> = LookupSolver::default();
        let true_lit = solver.add_variable();
        solver.add_clause(&[true_lit]);

        let mut gate_lits: Vec<Option<<Embedded as SatSolver>::Lit>> = Vec::new();
        let mut siglit = |solver: &mut LookupSolver<Embedded>, signal: u32| {
            if signal <= 1 {
                return if signal == AIG_TRUE { true_lit } else { !true_lit };
            }
            let idx = (signal >> 1) as usize;
            if idx >= gate_lits.len() {
                gate_lits.resize(idx + 1, None);
            }
            let base = *gate_lits[idx].get_or_insert_with(|| solver.add_variable());
            if signal & 1 == 1 {
                !base
            } else {
                base
            }
        };

        // inputs are the universals, in variable order
        for (&var, &(signal, _)) in self.original_universals().iter().zip(aig.inputs()) {
            let mapped = solver.lookup(var.positive());
            let input = siglit(&mut solver, signal);
            solver.add_clause(&[!input, mapped]);
            solver.add_clause(&[input, !mapped]);
        }
        // and gates
        for gate in aig.ands() {
            let lhs = siglit(&mut solver, gate.lhs);
            let rhs0 = siglit(&mut solver, gate.rhs0);
            let rhs1 = siglit(&mut solver, gate.rhs1);
            solver.add_clause(&[!lhs, rhs0]);
            solver.add_clause(&[!lhs, rhs1]);
            solver.add_clause(&[lhs, !rhs0, !rhs1]);
        }
        // the circuit drives the existentials
        for (&var, &(signal, _)) in self.original_existentials().iter().zip(aig.outputs()) {
            let mapped = solver.lookup(var.positive());
            let output = siglit(&mut solver, signal);
            solver.add_clause(&[!output, mapped]);
            solver.add_clause(&[output, !mapped]);
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

        if solver.solve().expect("embedded SAT solver failed") {
            let assignment: Vec<i32> = self
                .original_universals()
                .iter()
                .map(|&var| {
                    let value = solver.value_of(var.positive()).unwrap_or(true);
                    var.lit(value).to_dimacs()
                })
                .collect();
            Err(CertificateError::Inconsistent { assignment })
        } else {
            Ok(())
        }
    }
}

impl Solver {
    /// Internal certification of `Unsatisfiable` results: under the
    /// refuting universal cube, no existential witness may exist.
    ///
    /// # Errors
    ///
    /// Fails when no refutation was recorded or when the matrix is still
    /// satisfiable under the cube.
    pub fn verify_refutation(&self) -> Result<(), CertificateError> {
        let Some(refutation) = self.refuting_assignment.as_deref() else {
            return Err(CertificateError::NoRefutation);
        };
        info!("verifying refuting assignment against the formula");
        let mut solver: LookupSolver<Embedded> = LookupSolver::default();
        let mut clause = Vec::new();
        for cid in self.qcnf.active_clauses().collect::<Vec<_>>() {
            if !self.qcnf[cid].is_original() {
                continue;
            }
            clause.clear();
            for &lit in self.qcnf[cid].iter() {
                clause.push(solver.lookup(lit));
            }
            solver.add_clause(&clause);
        }
        let assumptions: Vec<_> = refutation.iter().map(|&lit| solver.lookup(lit)).collect();
        if solver.solve_with_assumptions(&assumptions).expect("embedded SAT solver failed") {
            Err(CertificateError::RefutationInconsistent {
                assignment: refutation.iter().map(|l| l.to_dimacs()).collect(),
            })
        } else {
            Ok(())
        }
    }
}

fn signal_of(lit: Lit, values: &VarVec<Option<u32>>, input_signals: &VarVec<Option<u32>>) -> u32 {
    let base = input_signals[lit.var()]
        .or(values[lit.var()])
        .expect("literal is defined before use");
    if lit.is_negative() {
        negate(base)
    } else {
        base
    }
}
