//! Satbridge is a front end for SAT, #SAT and AllSAT solvers. Formulas in [conjunctive normal
//! form][cnf] are built in memory, together with assumptions that only hold for a single solver
//! invocation, and are then handed to an external backend as [DIMACS CNF][dimacs] text or
//! loaded into a persistent in-process solver.
//!
//! Backends come in three shapes:
//!
//! * batch backends ([`WitnessBackend`], [`ExactCounter`], [`ProbabilisticCounter`]) run once on
//!   a complete formula and report a single result,
//! * an [`Enumerator`] streams the models of a formula from a long running process,
//! * an [`IncrementalSolver`] keeps solver state between invocations while the formula grows.
//!
//! Every instance is meant to be used by one thread at a time.
//!
//! [cnf]: https://en.wikipedia.org/wiki/Conjunctive_normal_form
//! [dimacs]: http://www.satcompetition.org/2009/format-benchmarks2009.html

pub mod batch;
pub mod config;
pub mod enumerate;
pub mod error;
pub mod handle;
pub mod incremental;
pub mod process;

pub use satbridge_formula::{cnf, lit, CnfFormula, ExtendFormula, FormatError, FormulaItem, Lit, Var};

pub mod dimacs {
    //! DIMACS CNF parser and writer.
    pub use satbridge_dimacs::*;
}

pub use batch::{
    run_batch, run_batch_assuming, BatchBackend, ExactCounter, ProbabilisticCounter,
    WitnessBackend,
};
pub use config::{BackendConfig, BackendConfigUpdate};
pub use dimacs::{ReadFormula, Source};
pub use enumerate::{Enumerator, EnumeratorState};
pub use error::Error;
pub use handle::{IncrementalHandle, SolveResult, VarisatHandle};
pub use incremental::{IncrementalSolver, SolverState};
pub use process::{run_command, BackendCommand, ProcessOutput};
