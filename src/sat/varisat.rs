//! Implementation of SAT solver interface for (varisat)[https://crates.io/crates/varisat].

use super::{SatSolver, SatSolverLit};
use crate::literal::{Lit, Var};
use varisat::ExtendFormula;

pub(crate) struct Varisat<'a> {
    solver: varisat::Solver<'a>,
    /// the index of the next variable
    new_lit: usize,
    /// values of the last model, indexed by variable
    values: Vec<Option<bool>>,
}

impl<'a> SatSolver for Varisat<'a> {
    type Lit = varisat::Lit;
    type Err = varisat::solver::SolverError;

    fn add_variable(&mut self) -> Self::Lit {
        let var = Var::from_index(self.new_lit.try_into().unwrap());
        self.new_lit += 1;
        Lit::positive(var).into()
    }

    fn add_clause(&mut self, lits: &[Self::Lit]) {
        self.solver.add_clause(lits);
    }

    fn solve_with_assumptions(&mut self, assumptions: &[Self::Lit]) -> Result<bool, Self::Err> {
        self.solver.assume(assumptions);
        let result = self.solver.solve()?;
        self.values.clear();
        if result {
            if let Some(model) = self.solver.model() {
                self.values.resize(self.new_lit, None);
                for lit in model {
                    let idx = lit.var_index();
                    if idx >= self.values.len() {
                        self.values.resize(idx + 1, None);
                    }
                    self.values[idx] = Some(!lit.is_negative());
                }
            }
        }
        Ok(result)
    }

    fn value(&self, lit: Self::Lit) -> Option<bool> {
        let value = (*self.values.get(lit.var_index())?)?;
        Some(if lit.is_negative() { !value } else { value })
    }

    fn failed_assumptions(&mut self) -> Option<&[Self::Lit]> {
        self.solver.failed_core()
    }
}

impl<'a> Default for Varisat<'a> {
    fn default() -> Self {
        Self { solver: varisat::Solver::new(), new_lit: 0, values: Vec::default() }
    }
}

impl SatSolverLit for varisat::Lit {
    fn var_index(self) -> usize {
        usize::try_from(self.to_dimacs().unsigned_abs()).unwrap() - 1
    }

    fn is_negative(self) -> bool {
        self.to_dimacs() < 0
    }
}

impl From<Lit> for varisat::Lit {
    fn from(lit: Lit) -> Self {
        varisat::Lit::from_dimacs(lit.to_dimacs().try_into().unwrap())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_basic() -> Result<(), Box<dyn std::error::Error>> {
        crate::sat::test::test_basic::<Varisat>()
    }

    #[test]
    fn test_scoped() {
        crate::sat::test::test_scoped::<Varisat>();
    }
}
