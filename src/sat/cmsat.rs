//! Implementation of SAT solver interface for (cryptominisat)[https://crates.io/crates/cryptominisat].

use std::convert::Infallible;

use cryptominisat::Lbool;

use super::{SatSolver, SatSolverLit};

pub(crate) struct CryptoMiniSat {
    solver: cryptominisat::Solver,
    values: Vec<Option<bool>>,
}

impl SatSolver for CryptoMiniSat {
    type Lit = cryptominisat::Lit;
    type Err = Infallible;

    fn add_variable(&mut self) -> Self::Lit {
        self.solver.new_var()
    }

    fn add_clause(&mut self, lits: &[Self::Lit]) {
        self.solver.add_clause(lits);
    }

    fn solve_with_assumptions(&mut self, assumptions: &[Self::Lit]) -> Result<bool, Self::Err> {
        let result = self.solver.solve_with_assumptions(assumptions);
        let result = match result {
            Lbool::True => true,
            Lbool::False => false,
            Lbool::Undef => unreachable!("solver was interrupted"),
        };
        self.values.clear();
        if result {
            self.values = self
                .solver
                .get_model()
                .iter()
                .map(|&value| match value {
                    Lbool::True => Some(true),
                    Lbool::False => Some(false),
                    Lbool::Undef => None,
                })
                .collect();
        }
        Ok(result)
    }

    fn value(&self, lit: Self::Lit) -> Option<bool> {
        let value = (*self.values.get(lit.var_index())?)?;
        Some(if lit.is_negative() { !value } else { value })
    }

    fn failed_assumptions(&mut self) -> Option<&[Self::Lit]> {
        Some(self.solver.get_conflict())
    }
}

impl Default for CryptoMiniSat {
    fn default() -> Self {
        Self { solver: cryptominisat::Solver::new(), values: Vec::default() }
    }
}

impl SatSolverLit for cryptominisat::Lit {
    fn var_index(self) -> usize {
        self.var() as usize
    }

    fn is_negative(self) -> bool {
        self.isneg()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_basic() -> Result<(), Box<dyn std::error::Error>> {
        crate::sat::test::test_basic::<CryptoMiniSat>()
    }
}
