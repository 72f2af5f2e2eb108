//! Lazy DIMACS CNF encoding of a formula store plus assumptions.
use std::{cmp::max, io, slice};

use satbridge_formula::{cnf::Clauses, CnfFormula, Lit};

use crate::parser::DimacsHeader;

impl DimacsHeader {
    /// The header describing `formula` with `assumptions` added as unit clauses.
    pub fn for_formula(formula: &CnfFormula, assumptions: &[Lit]) -> DimacsHeader {
        DimacsHeader {
            var_count: var_count_with(formula.var_count(), assumptions),
            clause_count: formula.len() + assumptions.len(),
        }
    }
}

/// Largest variable of `var_count` and `assumptions`.
pub fn var_count_with(var_count: usize, assumptions: &[Lit]) -> usize {
    assumptions
        .iter()
        .fold(var_count, |count, lit| max(count, lit.index() + 1))
}

/// Renders a formula as DIMACS CNF, one line at a time.
///
/// Yields the problem line, then every committed clause in commit order and finally every
/// assumption as a unit clause. Lines carry no line terminator. The open clause of the formula is
/// not part of the output, call [`close`](CnfFormula::close) first.
///
/// The encoder is a single pass over the borrowed formula and never holds more than one line.
pub struct DimacsEncoder<'a> {
    header: Option<DimacsHeader>,
    clauses: Clauses<'a>,
    assumptions: slice::Iter<'a, Lit>,
}

impl<'a> DimacsEncoder<'a> {
    pub fn new(formula: &'a CnfFormula, assumptions: &'a [Lit]) -> DimacsEncoder<'a> {
        DimacsEncoder {
            header: Some(DimacsHeader::for_formula(formula, assumptions)),
            clauses: formula.iter(),
            assumptions: assumptions.iter(),
        }
    }
}

impl<'a> Iterator for DimacsEncoder<'a> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if let Some(header) = self.header.take() {
            return Some(format!(
                "p cnf {} {}",
                header.var_count, header.clause_count
            ));
        }
        if let Some(clause) = self.clauses.next() {
            return Some(clause_line(clause));
        }
        self.assumptions
            .next()
            .map(|&lit| clause_line(slice::from_ref(&lit)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.header.is_some() as usize + self.clauses.len() + self.assumptions.len();
        (len, Some(len))
    }
}

impl<'a> ExactSizeIterator for DimacsEncoder<'a> {}

fn clause_line(clause: &[Lit]) -> String {
    let mut buffer = itoa::Buffer::new();
    let mut line = String::with_capacity(clause.len() * 4 + 1);
    for &lit in clause {
        line.push_str(buffer.format(lit.to_dimacs()));
        line.push(' ');
    }
    line.push('0');
    line
}

/// Write a DIMACS CNF header.
///
/// Can be used with [`write_dimacs_clauses`] to implement incremental writing.
pub fn write_dimacs_header(target: &mut impl io::Write, header: DimacsHeader) -> io::Result<()> {
    writeln!(
        target,
        "p cnf {var_count} {clause_count}",
        var_count = header.var_count,
        clause_count = header.clause_count
    )
}

/// Write an iterator of clauses as headerless DIMACS CNF.
///
/// Can be used with [`write_dimacs_header`] to implement incremental writing.
pub fn write_dimacs_clauses<'c>(
    target: &mut impl io::Write,
    clauses: impl IntoIterator<Item = &'c [Lit]>,
) -> io::Result<()> {
    for clause in clauses.into_iter() {
        for &lit in clause.iter() {
            itoa::write(&mut *target, lit.to_dimacs())?;
            target.write_all(b" ")?;
        }
        target.write_all(b"0\n")?;
    }
    Ok(())
}

/// Write a formula and assumptions as DIMACS CNF.
///
/// Produces the same text as [`DimacsEncoder`] with a newline after each line.
pub fn write_dimacs(
    target: &mut impl io::Write,
    formula: &CnfFormula,
    assumptions: &[Lit],
) -> io::Result<()> {
    write_dimacs_header(&mut *target, DimacsHeader::for_formula(formula, assumptions))?;
    write_dimacs_clauses(&mut *target, formula.iter())?;
    write_dimacs_clauses(&mut *target, assumptions.chunks(1))
}
