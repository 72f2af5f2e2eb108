//! DIMACS CNF reader and writer for the satbridge solver front end.
//!
//! Reading streams literals into anything implementing
//! [`ExtendFormula`](satbridge_formula::ExtendFormula). Writing renders a formula store together
//! with assumptions, either lazily line by line ([`DimacsEncoder`]) or into an [`io::Write`]
//! ([`write_dimacs`]).
//!
//! [`io::Write`]: std::io::Write

pub mod encoder;
pub mod parser;
pub mod read;

pub use encoder::{
    var_count_with, write_dimacs, write_dimacs_clauses, write_dimacs_header, DimacsEncoder,
};
pub use parser::{DimacsHeader, DimacsParser, ParserError};
pub use read::{ReadError, ReadFormula, Source};
