//! Incremental solving on a persistent handle.
use log::debug;

use satbridge_dimacs::var_count_with;
use satbridge_formula::{ExtendFormula, Lit, Var};

use crate::error::Error;
use crate::handle::{IncrementalHandle, SolveResult, VarisatHandle};

/// State of an [`IncrementalSolver`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SolverState {
    /// Not solved since the last change.
    Idle,
    Sat,
    Unsat,
    Unknown,
}

impl From<SolveResult> for SolverState {
    fn from(result: SolveResult) -> SolverState {
        match result {
            SolveResult::Sat => SolverState::Sat,
            SolveResult::Unsat => SolverState::Unsat,
            SolveResult::Unknown => SolverState::Unknown,
        }
    }
}

/// A formula that is solved repeatedly while it grows.
///
/// Clauses are forwarded to the handle as they are added, assumptions are held back until the
/// next [`solve`](IncrementalSolver::solve) and dropped by it, whatever its outcome. The variable
/// count only covers committed clauses, so assumptions of one solve never change the size of the
/// model of a later one.
///
/// Any change after a solve returns the solver to [`SolverState::Idle`], which makes the previous
/// model unavailable.
pub struct IncrementalSolver<H = VarisatHandle> {
    handle: H,
    var_count: usize,
    open_len: usize,
    open_var_count: usize,
    assumptions: Vec<Lit>,
    state: SolverState,
    model_var_count: usize,
}

impl Default for IncrementalSolver<VarisatHandle> {
    fn default() -> IncrementalSolver<VarisatHandle> {
        IncrementalSolver::with_handle(VarisatHandle::new())
    }
}

impl IncrementalSolver<VarisatHandle> {
    pub fn new() -> IncrementalSolver<VarisatHandle> {
        IncrementalSolver::default()
    }
}

impl<H: IncrementalHandle> IncrementalSolver<H> {
    /// Wrap an existing handle, which must not contain any clauses yet.
    pub fn with_handle(handle: H) -> IncrementalSolver<H> {
        IncrementalSolver {
            handle,
            var_count: 0,
            open_len: 0,
            open_var_count: 0,
            assumptions: vec![],
            state: SolverState::Idle,
            model_var_count: 0,
        }
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    /// Number of variables in committed clauses.
    pub fn var_count(&self) -> usize {
        self.var_count
    }

    /// Solve under the pending assumptions.
    ///
    /// Commits the open clause first. The pending assumptions are cleared afterwards.
    pub fn solve(&mut self) -> SolveResult {
        self.end_clause();

        self.model_var_count = var_count_with(self.var_count, &self.assumptions);
        for &lit in self.assumptions.iter() {
            self.handle.assume(lit);
        }
        let assumption_count = self.assumptions.len();
        self.assumptions.clear();

        let result = self.handle.solve();
        self.state = result.into();

        debug!(
            "Solved {} variables under {} assumptions: {:?}",
            self.model_var_count, assumption_count, result
        );

        result
    }

    fn check_sat(&self) -> Result<(), Error> {
        match self.state {
            SolverState::Sat => Ok(()),
            _ => Err(Error::PreconditionViolation(
                "a model is only available directly after a satisfiable solve",
            )),
        }
    }

    /// Value of a single variable in the current model.
    pub fn value(&self, var: Var) -> Result<Lit, Error> {
        self.check_sat()?;
        Ok(self.handle.value(var).unwrap_or_else(|| var.negative()))
    }

    /// The current model.
    ///
    /// Contains one literal for every variable up to the variable count of the last solve,
    /// which includes the variables of its assumptions.
    pub fn model(&self) -> Result<Vec<Lit>, Error> {
        self.check_sat()?;
        Ok((0..self.model_var_count)
            .map(Var::from_index)
            .map(|var| self.handle.value(var).unwrap_or_else(|| var.negative()))
            .collect())
    }

    /// Solve and return a model if there is one.
    pub fn witness(&mut self) -> Result<Option<Vec<Lit>>, Error> {
        match self.solve() {
            SolveResult::Sat => self.model().map(Some),
            SolveResult::Unsat => Ok(None),
            SolveResult::Unknown => Err(Error::Interrupted),
        }
    }

    /// Commit the open clause and return the handle.
    pub fn close(mut self) -> H {
        self.end_clause();
        self.handle
    }
}

impl<H: IncrementalHandle> ExtendFormula for IncrementalSolver<H> {
    fn max_var_count(&self) -> usize {
        self.handle.max_var_count()
    }

    fn push_lit(&mut self, lit: Lit) {
        self.state = SolverState::Idle;
        self.handle.push_lit(lit);
        self.open_len += 1;
        self.open_var_count = self.open_var_count.max(lit.index() + 1);
    }

    fn end_clause(&mut self) {
        if self.open_len > 0 {
            self.state = SolverState::Idle;
            self.handle.end_clause();
            self.var_count = self.var_count.max(self.open_var_count);
        }
        self.open_len = 0;
        self.open_var_count = 0;
    }

    fn assume_lit(&mut self, lit: Lit) {
        self.state = SolverState::Idle;
        self.assumptions.push(lit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use satbridge_dimacs::{ReadError, ReadFormula};
    use satbridge_formula::{
        lit, lits,
        test::{sat_formula, sgen_unsat_formula},
        FormatError,
    };

    #[test]
    fn model_needs_sat() -> Result<(), Error> {
        let mut solver = IncrementalSolver::new();
        solver.add(vec![1, 2, 0])?;

        assert!(matches!(
            solver.model(),
            Err(Error::PreconditionViolation(_))
        ));

        assert_eq!(solver.solve(), SolveResult::Sat);
        assert_eq!(solver.model()?.len(), 2);

        solver.add(vec![-1, 0])?;
        assert_eq!(solver.state(), SolverState::Idle);
        assert!(matches!(
            solver.value(Var::from_dimacs(1)),
            Err(Error::PreconditionViolation(_))
        ));

        solver.add(vec![-2, 0])?;
        assert_eq!(solver.solve(), SolveResult::Unsat);
        assert!(matches!(
            solver.model(),
            Err(Error::PreconditionViolation(_))
        ));
        Ok(())
    }

    #[test]
    fn assumptions_are_isolated() -> Result<(), Error> {
        let mut solver = IncrementalSolver::new();
        solver.add(vec![vec![1, 2]])?;

        solver.assume(vec![-1, 9])?;
        let model = solver.witness()?.unwrap();
        assert_eq!(model.len(), 9);
        assert_eq!(model[..2], lits![-1, 2]);
        assert_eq!(model[8], lit!(9));
        assert_eq!(solver.var_count(), 2);

        solver.assume(vec![-2])?;
        assert_eq!(solver.witness()?, Some(lits![1, -2].to_vec()));
        assert_eq!(solver.var_count(), 2);

        solver.assume(vec![-1, -2])?;
        assert_eq!(solver.witness()?, None);

        assert!(solver.witness()?.is_some());
        Ok(())
    }

    #[test]
    fn solve_commits_open_clause() -> Result<(), Error> {
        let mut solver = IncrementalSolver::new();
        solver.add(vec![1, 3])?;
        assert_eq!(solver.var_count(), 0);

        solver.assume(vec![-3])?;
        let model = solver.witness()?.unwrap();
        assert_eq!(model.len(), 3);
        assert!(model.contains(&lit!(1)));
        assert!(model.contains(&lit!(-3)));
        assert_eq!(solver.var_count(), 3);
        Ok(())
    }

    #[test]
    fn value_of_single_var() -> Result<(), Error> {
        let mut solver = IncrementalSolver::new();
        solver.add(vec![vec![-4]])?;

        assert_eq!(solver.solve(), SolveResult::Sat);
        assert_eq!(solver.value(Var::from_dimacs(4))?, lit!(-4));
        Ok(())
    }

    #[test]
    fn literals_beyond_handle_limit() -> Result<(), Error> {
        let mut solver = IncrementalSolver::new();
        let max = solver.max_var_count();
        let too_large = max as isize + 1;

        solver.add(vec![1, 0])?;
        assert!(matches!(
            solver.add(vec![2, too_large, 0]),
            Err(FormatError::LiteralTooLarge { .. })
        ));
        assert!(matches!(
            solver.add(vec![vec![3, -too_large]]),
            Err(FormatError::LiteralTooLarge { .. })
        ));
        assert!(matches!(
            solver.add_clause(&[Lit::from_dimacs(too_large)]),
            Err(FormatError::LiteralTooLarge { .. })
        ));
        assert!(matches!(
            solver.assume(vec![too_large]),
            Err(FormatError::LiteralTooLarge { .. })
        ));
        assert!(matches!(
            solver.read(format!("1 {} 0\n", too_large).as_str()),
            Err(ReadError::Parser(_))
        ));

        // Literals accepted before an error stay in the open clause
        solver.add(vec![0])?;
        assert_eq!(solver.var_count(), 2);

        solver.assume(vec![-1])?;
        assert_eq!(solver.solve(), SolveResult::Unsat);
        Ok(())
    }

    struct GivingUp;

    impl IncrementalHandle for GivingUp {
        fn push_lit(&mut self, _lit: Lit) {}
        fn end_clause(&mut self) {}
        fn assume(&mut self, _lit: Lit) {}
        fn solve(&mut self) -> SolveResult {
            SolveResult::Unknown
        }
        fn value(&self, _var: Var) -> Option<Lit> {
            None
        }
    }

    #[test]
    fn unknown_is_interrupted() -> Result<(), Error> {
        let mut solver = IncrementalSolver::with_handle(GivingUp);
        solver.add(vec![1, 0])?;

        assert!(matches!(solver.witness(), Err(Error::Interrupted)));
        assert_eq!(solver.state(), SolverState::Unknown);
        assert!(matches!(
            solver.model(),
            Err(Error::PreconditionViolation(_))
        ));
        Ok(())
    }

    proptest! {
        #[test]
        fn sgen_unsat(formula in sgen_unsat_formula(1..7usize)) {
            let mut solver = IncrementalSolver::new();

            for clause in formula.iter() {
                solver.add_clause(clause).unwrap();
            }

            prop_assert_eq!(solver.solve(), SolveResult::Unsat);
        }

        #[test]
        fn sat(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut solver = IncrementalSolver::new();

            for clause in formula.iter() {
                solver.add_clause(clause).unwrap();
            }

            let model = solver.witness().unwrap().unwrap();

            prop_assert_eq!(model.len(), formula.var_count());
            for clause in formula.iter() {
                prop_assert!(clause.iter().any(|lit| model.contains(lit)));
            }
        }
    }
}
