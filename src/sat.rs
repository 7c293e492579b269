//! Generic SAT solver interface that supports incremental solving

use derivative::Derivative;

use crate::{datastructure::VarVec, literal::Lit};

#[cfg(feature = "cryptominisat")]
pub(crate) mod cmsat;
pub(crate) mod varisat;

/// Incremental SAT solver interface.
///
/// We assume variables to be index-based, such that mapping from
/// [`crate::literal::Lit`] to [`SatSolver::Lit`] is cheap.
pub(crate) trait SatSolver: Default {
    type Lit: SatSolverLit;
    type Err: std::error::Error + 'static;

    fn add_variable(&mut self) -> Self::Lit;
    fn add_clause(&mut self, lits: &[Self::Lit]);
    fn solve_with_assumptions(&mut self, assumptions: &[Self::Lit]) -> Result<bool, Self::Err>;
    /// The value of `lit` in the model of the last successful
    /// [`SatSolver::solve_with_assumptions`] call.
    fn value(&self, lit: Self::Lit) -> Option<bool>;
    fn failed_assumptions(&mut self) -> Option<&[Self::Lit]>;

    fn solve(&mut self) -> Result<bool, Self::Err> {
        self.solve_with_assumptions(&[])
    }
}

pub(crate) trait SatSolverLit: Copy + Eq + std::fmt::Debug + std::ops::Not<Output = Self> {
    fn var_index(self) -> usize;
    fn is_negative(self) -> bool;
}

/// A SAT solver together with a lazy [`Lit`] to [`SatSolver::Lit`] mapping.
#[derive(Derivative)]
#[derivative(Debug)]
pub(crate) struct LookupSolver<S: SatSolver> {
    #[derivative(Debug = "ignore")]
    sat_solver: S,
    #[derivative(Debug = "ignore")]
    var_lookup: VarVec<Option<S::Lit>>,
}

impl<S: SatSolver> Default for LookupSolver<S> {
    fn default() -> Self {
        Self { sat_solver: Default::default(), var_lookup: VarVec::default() }
    }
}

impl<S: SatSolver> LookupSolver<S> {
    pub(crate) fn lookup(&mut self, lit: Lit) -> S::Lit {
        self.var_lookup.ensure(lit.var());
        let sat_var =
            *self.var_lookup[lit.var()].get_or_insert_with(|| self.sat_solver.add_variable());
        if lit.is_negative() {
            !sat_var
        } else {
            sat_var
        }
    }

    /// The value of the original literal in the last model, if the literal
    /// was ever mapped.
    pub(crate) fn value_of(&self, lit: Lit) -> Option<bool> {
        let mapped = (*self.var_lookup.get(lit.var())?)?;
        let value = self.sat_solver.value(mapped)?;
        Some(if lit.is_negative() { !value } else { value })
    }

    /// Whether the mapped literal is part of the failed assumptions.
    pub(crate) fn is_failed(&mut self, lit: Lit) -> bool {
        let Some(Some(mapped)) = self.var_lookup.get(lit.var()).copied() else {
            return false;
        };
        let mapped = if lit.is_negative() { !mapped } else { mapped };
        self.sat_solver.failed_assumptions().is_some_and(|failed| failed.contains(&mapped))
    }
}

impl<S: SatSolver> SatSolver for LookupSolver<S> {
    type Lit = S::Lit;
    type Err = S::Err;

    fn add_variable(&mut self) -> Self::Lit {
        self.sat_solver.add_variable()
    }

    fn add_clause(&mut self, lits: &[Self::Lit]) {
        self.sat_solver.add_clause(lits);
    }

    fn solve_with_assumptions(&mut self, assumptions: &[Self::Lit]) -> Result<bool, Self::Err> {
        self.sat_solver.solve_with_assumptions(assumptions)
    }

    fn value(&self, lit: Self::Lit) -> Option<bool> {
        self.sat_solver.value(lit)
    }

    fn failed_assumptions(&mut self) -> Option<&[Self::Lit]> {
        self.sat_solver.failed_assumptions()
    }
}

/// A SAT solver with a stack of assumption-scoped contexts.
///
/// Every open scope is backed by an activation literal. Clauses added while
/// a scope is open are guarded by the negated activation literal of the
/// innermost scope and are retracted when that scope is popped; solving
/// assumes the activation literals of all open scopes. This realizes the
/// strictly matched push/pop discipline the engine relies on with solvers
/// that only offer assumptions.
#[derive(Derivative)]
#[derivative(Debug)]
pub(crate) struct ScopedSat<S: SatSolver> {
    #[derivative(Debug = "ignore")]
    solver: S,
    #[derivative(Debug = "ignore")]
    scopes: Vec<S::Lit>,
}

impl<S: SatSolver> Default for ScopedSat<S> {
    fn default() -> Self {
        Self { solver: S::default(), scopes: Vec::default() }
    }
}

impl<S: SatSolver> ScopedSat<S> {
    pub(crate) fn add_variable(&mut self) -> S::Lit {
        self.solver.add_variable()
    }

    pub(crate) fn add_clause(&mut self, lits: &[S::Lit]) {
        match self.scopes.last() {
            Some(&activation) => {
                let mut guarded = Vec::with_capacity(lits.len() + 1);
                guarded.extend_from_slice(lits);
                guarded.push(!activation);
                self.solver.add_clause(&guarded);
            }
            None => self.solver.add_clause(lits),
        }
    }

    /// Adds a clause to the root context: it survives every pop.
    pub(crate) fn add_clause_root(&mut self, lits: &[S::Lit]) {
        self.solver.add_clause(lits);
    }

    pub(crate) fn push(&mut self) {
        let activation = self.solver.add_variable();
        self.scopes.push(activation);
    }

    pub(crate) fn pop(&mut self) {
        let activation = self.scopes.pop().expect("scope stack underflow");
        // permanently disable all clauses guarded by this scope
        self.solver.add_clause(&[!activation]);
    }

    #[allow(dead_code)]
    pub(crate) fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    pub(crate) fn solve_with_assumptions(&mut self, assumptions: &[S::Lit]) -> bool {
        let assumptions: Vec<_> =
            self.scopes.iter().copied().chain(assumptions.iter().copied()).collect();
        self.solver
            .solve_with_assumptions(&assumptions)
            .expect("embedded SAT solver failed")
    }

    pub(crate) fn solve(&mut self) -> bool {
        self.solve_with_assumptions(&[])
    }

    pub(crate) fn value(&self, lit: S::Lit) -> Option<bool> {
        self.solver.value(lit)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    pub(crate) fn test_basic<S: SatSolver>() -> Result<(), Box<dyn std::error::Error>> {
        let mut solver = S::default();

        // create variables
        let x = solver.add_variable();
        let y = solver.add_variable();
        let z = solver.add_variable();

        solver.add_clause(&[!x, y]);
        solver.add_clause(&[!y, z]);
        assert!(solver.solve()?);

        solver.add_clause(&[!z, x]);
        assert!(solver.solve()?);

        let all_true = [x, y, z].into_iter().all(|lit| solver.value(lit) == Some(true));
        let all_false = [x, y, z].into_iter().all(|lit| solver.value(lit) == Some(false));
        assert!(all_true || all_false);

        // solve with assumptions
        let ignore_clauses = solver.add_variable();
        solver.add_clause(&[ignore_clauses, !z, !y]);
        solver.add_clause(&[ignore_clauses, z, y]);

        assert!(!solver.solve_with_assumptions(&[!ignore_clauses])?);

        solver.add_clause(&[ignore_clauses]);
        assert!(solver.solve()?);

        Ok(())
    }

    pub(crate) fn test_scoped<S: SatSolver>() {
        let mut solver: ScopedSat<S> = ScopedSat::default();
        let x = solver.add_variable();
        let y = solver.add_variable();
        solver.add_clause(&[x, y]);
        assert!(solver.solve());

        solver.push();
        solver.add_clause(&[!x]);
        solver.add_clause(&[!y]);
        assert!(!solver.solve());
        solver.pop();

        assert!(solver.solve());
        assert_eq!(solver.scope_depth(), 0);
    }

    #[test]
    fn lookup_solver() {
        use crate::literal::{Lit, Var};
        use crate::sat::varisat::Varisat;

        let mut solver: LookupSolver<Varisat> = LookupSolver::default();
        let a = Lit::positive(Var::from_dimacs(1));
        let b = Lit::positive(Var::from_dimacs(2));
        let mapped = [solver.lookup(a), solver.lookup(!b)];
        solver.add_clause(&mapped[..1]);
        solver.add_clause(&mapped[1..]);
        assert!(solver.solve().unwrap());
        assert_eq!(solver.value_of(a), Some(true));
        assert_eq!(solver.value_of(b), Some(false));
        assert_eq!(solver.value_of(!b), Some(true));
    }
}
