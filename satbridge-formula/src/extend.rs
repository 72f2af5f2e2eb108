//! The add/assume vocabulary shared by every formula consumer.
use thiserror::Error;

use crate::lit::{Lit, Var};

/// Malformed input to `add` or `assume`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("0 is a clause terminator and cannot be used as a literal")]
    ZeroLiteral,
    #[error("0 is not a valid assumption")]
    ZeroAssumption,
    #[error("Literal {} exceeds the largest supported variable {}", number, max)]
    LiteralTooLarge { number: isize, max: usize },
    #[error("Clause contains a terminator at position {} of {}", position, len)]
    MisplacedTerminator { position: usize, len: usize },
}

/// One item of an `add` call: either a single integer or a whole clause.
///
/// A single integer is pushed onto the open clause, with `0` committing it. A whole clause first
/// commits whatever is open and is then committed on its own. A trailing `0` in a whole clause is
/// accepted and dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormulaItem {
    Number(isize),
    Clause(Vec<isize>),
}

impl From<isize> for FormulaItem {
    fn from(number: isize) -> FormulaItem {
        FormulaItem::Number(number)
    }
}

impl From<i32> for FormulaItem {
    fn from(number: i32) -> FormulaItem {
        FormulaItem::Number(number as isize)
    }
}

impl From<Vec<isize>> for FormulaItem {
    fn from(clause: Vec<isize>) -> FormulaItem {
        FormulaItem::Clause(clause)
    }
}

impl From<Vec<i32>> for FormulaItem {
    fn from(clause: Vec<i32>) -> FormulaItem {
        FormulaItem::Clause(clause.into_iter().map(|number| number as isize).collect())
    }
}

impl From<&[i32]> for FormulaItem {
    fn from(clause: &[i32]) -> FormulaItem {
        FormulaItem::Clause(clause.iter().map(|&number| number as isize).collect())
    }
}

/// Anything that accepts clauses and assumptions.
///
/// The formula store buffers what it receives, the incremental solver forwards it to its handle.
/// Only the three primitive operations need to be implemented.
pub trait ExtendFormula {
    /// Push a literal onto the open clause.
    fn push_lit(&mut self, lit: Lit);

    /// Commit the open clause.
    ///
    /// An open clause without literals is dropped.
    fn end_clause(&mut self);

    /// Add an assumption for the next solver invocation only.
    fn assume_lit(&mut self, lit: Lit);

    /// Number of variables that can be used.
    ///
    /// The primitive operations may assume that every literal they receive is below this limit,
    /// all other operations check it.
    fn max_var_count(&self) -> usize {
        Var::max_count()
    }

    /// Check that a literal's variable is within [`max_var_count`](ExtendFormula::max_var_count).
    fn check_lit(&self, lit: Lit) -> Result<Lit, FormatError> {
        let max = self.max_var_count();
        if lit.index() < max {
            Ok(lit)
        } else {
            Err(FormatError::LiteralTooLarge {
                number: lit.to_dimacs(),
                max,
            })
        }
    }

    /// Checked conversion of a nonzero DIMACS integer.
    fn check_number(&self, number: isize) -> Result<Lit, FormatError> {
        self.check_lit(Lit::try_from_dimacs(number)?)
    }

    /// Commit the open clause and then the given clause.
    ///
    /// The clause is validated before anything is pushed.
    fn add_clause(&mut self, clause: &[Lit]) -> Result<(), FormatError> {
        for &lit in clause {
            self.check_lit(lit)?;
        }
        self.end_clause();
        for &lit in clause {
            self.push_lit(lit);
        }
        self.end_clause();
        Ok(())
    }

    /// Push a DIMACS integer, where `0` commits the open clause.
    fn add_number(&mut self, number: isize) -> Result<(), FormatError> {
        if number == 0 {
            self.end_clause();
        } else {
            let lit = self.check_number(number)?;
            self.push_lit(lit);
        }
        Ok(())
    }

    /// Commit the open clause and then the given DIMACS clause.
    ///
    /// The clause is validated before anything is pushed.
    fn add_numbers(&mut self, clause: &[isize]) -> Result<(), FormatError> {
        let body = match clause.split_last() {
            Some((&0, body)) => body,
            _ => clause,
        };
        let mut lits = Vec::with_capacity(body.len());
        for (position, &number) in body.iter().enumerate() {
            if number == 0 {
                return Err(FormatError::MisplacedTerminator {
                    position,
                    len: clause.len(),
                });
            }
            lits.push(self.check_number(number)?);
        }
        self.add_clause(&lits)
    }

    /// Add a sequence of numbers and clauses.
    fn add<I>(&mut self, items: impl IntoIterator<Item = I>) -> Result<(), FormatError>
    where
        I: Into<FormulaItem>,
    {
        for item in items {
            match item.into() {
                FormulaItem::Number(number) => self.add_number(number)?,
                FormulaItem::Clause(clause) => self.add_numbers(&clause)?,
            }
        }
        Ok(())
    }

    /// Add DIMACS integers as assumptions.
    fn assume(&mut self, numbers: impl IntoIterator<Item = isize>) -> Result<(), FormatError> {
        for number in numbers {
            if number == 0 {
                return Err(FormatError::ZeroAssumption);
            }
            let lit = self.check_number(number)?;
            self.assume_lit(lit);
        }
        Ok(())
    }
}
