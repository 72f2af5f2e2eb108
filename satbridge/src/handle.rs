//! Persistent solver handles used by the incremental wrapper.
use log::{debug, warn};

use varisat::ExtendFormula as _;

use satbridge_formula::{Lit, Var};

/// Outcome of a single solver invocation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SolveResult {
    Sat,
    Unsat,
    /// The solver stopped without deciding satisfiability.
    Unknown,
}

/// A persistent solver instance that clauses are loaded into incrementally.
///
/// Clauses are received literal by literal. Assumptions only apply to the next call of
/// [`solve`](IncrementalHandle::solve) and are dropped by it. The handle is released when it is
/// dropped.
pub trait IncrementalHandle {
    /// Number of variables the handle supports.
    fn max_var_count(&self) -> usize {
        Var::max_count()
    }

    /// Push a literal onto the clause under construction.
    ///
    /// The literal's variable is below [`max_var_count`](IncrementalHandle::max_var_count).
    fn push_lit(&mut self, lit: Lit);

    /// Commit the clause under construction.
    fn end_clause(&mut self);

    /// Assume a literal for the next solve only.
    fn assume(&mut self, lit: Lit);

    /// Solve the clauses loaded so far under the pending assumptions.
    fn solve(&mut self) -> SolveResult;

    /// Value of a variable in the model found by the last solve.
    ///
    /// Only meaningful directly after a solve returned [`SolveResult::Sat`]. Returns `None` for
    /// variables the solver knows nothing about.
    fn value(&self, var: Var) -> Option<Lit>;
}

/// Incremental handle backed by the in-process varisat CDCL solver.
pub struct VarisatHandle {
    solver: varisat::Solver<'static>,
    clause: Vec<varisat::Lit>,
    assumptions: Vec<varisat::Lit>,
    model: Vec<Option<bool>>,
}

impl Default for VarisatHandle {
    fn default() -> VarisatHandle {
        VarisatHandle {
            solver: varisat::Solver::new(),
            clause: vec![],
            assumptions: vec![],
            model: vec![],
        }
    }
}

impl VarisatHandle {
    pub fn new() -> VarisatHandle {
        VarisatHandle::default()
    }
}

fn to_varisat(lit: Lit) -> varisat::Lit {
    varisat::Lit::from_dimacs(lit.to_dimacs())
}

impl IncrementalHandle for VarisatHandle {
    fn max_var_count(&self) -> usize {
        varisat::Var::max_count().min(Var::max_count())
    }

    fn push_lit(&mut self, lit: Lit) {
        self.clause.push(to_varisat(lit));
    }

    fn end_clause(&mut self) {
        self.solver.add_clause(&self.clause);
        self.clause.clear();
    }

    fn assume(&mut self, lit: Lit) {
        self.assumptions.push(to_varisat(lit));
    }

    fn solve(&mut self) -> SolveResult {
        // varisat keeps assumptions until replaced, so this also clears the previous ones
        self.solver.assume(&self.assumptions);
        self.assumptions.clear();
        self.model.clear();

        match self.solver.solve() {
            Ok(true) => {
                if let Some(model) = self.solver.model() {
                    for lit in model {
                        if self.model.len() <= lit.index() {
                            self.model.resize(lit.index() + 1, None);
                        }
                        self.model[lit.index()] = Some(lit.is_positive());
                    }
                }
                debug!("Model covers {} variables", self.model.len());
                SolveResult::Sat
            }
            Ok(false) => SolveResult::Unsat,
            Err(err) => {
                warn!("Solver stopped: {}", err);
                SolveResult::Unknown
            }
        }
    }

    fn value(&self, var: Var) -> Option<Lit> {
        self.model
            .get(var.index())
            .cloned()
            .flatten()
            .map(|polarity| var.lit(polarity))
    }
}
