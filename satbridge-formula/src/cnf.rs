//! The formula store.
use std::cmp::max;
use std::fmt;
use std::mem::take;
use std::ops::Range;
use std::slice;

use crate::extend::ExtendFormula;
use crate::lit::Lit;

/// A formula in conjunctive normal form (CNF) under construction.
///
/// Holds the committed clauses, one open clause that is still being built and the assumptions
/// for the next backend invocation. All literals share a single buffer; the open clause is the
/// tail of that buffer after the last committed clause.
///
/// [`var_count`](CnfFormula::var_count) (the largest variable of any committed clause) is never
/// affected by the open clause or by assumptions.
///
/// A store has a single owner. It is not synchronized and must not be mutated while an encoder
/// borrows it.
#[derive(Default, Eq)]
pub struct CnfFormula {
    var_count: usize,
    literals: Vec<Lit>,
    clause_ranges: Vec<Range<usize>>,
    assumptions: Vec<Lit>,
}

impl CnfFormula {
    /// Create an empty CNF formula.
    pub fn new() -> CnfFormula {
        CnfFormula::default()
    }

    /// Largest variable present in a committed clause.
    ///
    /// This also counts missing variables if a variable with a higher index is present.
    /// A vector of this length can be indexed with the variable indices present.
    pub fn var_count(&self) -> usize {
        self.var_count
    }

    /// Number of committed clauses.
    pub fn len(&self) -> usize {
        self.clause_ranges.len()
    }

    /// Whether no clause was committed yet.
    pub fn is_empty(&self) -> bool {
        self.clause_ranges.is_empty()
    }

    /// Literals pushed since the last commit.
    pub fn open_clause(&self) -> &[Lit] {
        &self.literals[self.open_start()..]
    }

    /// Commit the open clause if it has any literals.
    ///
    /// After this the formula is closed and can be encoded.
    pub fn close(&mut self) {
        self.end_clause();
    }

    /// Iterator over all committed clauses in commit order.
    pub fn iter(&self) -> Clauses {
        Clauses {
            literals: &self.literals,
            ranges: self.clause_ranges.iter(),
        }
    }

    /// Pending assumptions for the next invocation.
    pub fn assumptions(&self) -> &[Lit] {
        &self.assumptions
    }

    /// Remove and return the pending assumptions.
    pub fn take_assumptions(&mut self) -> Vec<Lit> {
        take(&mut self.assumptions)
    }

    fn open_start(&self) -> usize {
        self.clause_ranges.last().map_or(0, |range| range.end)
    }
}

impl ExtendFormula for CnfFormula {
    fn push_lit(&mut self, lit: Lit) {
        self.literals.push(lit);
    }

    fn end_clause(&mut self) {
        let begin = self.open_start();
        let end = self.literals.len();
        if begin == end {
            return;
        }

        for &lit in self.literals[begin..end].iter() {
            self.var_count = max(lit.index() + 1, self.var_count);
        }

        self.clause_ranges.push(begin..end);
    }

    fn assume_lit(&mut self, lit: Lit) {
        self.assumptions.push(lit);
    }
}

/// Iterator over the committed clauses of a [`CnfFormula`].
#[derive(Clone)]
pub struct Clauses<'a> {
    literals: &'a [Lit],
    ranges: slice::Iter<'a, Range<usize>>,
}

impl<'a> Iterator for Clauses<'a> {
    type Item = &'a [Lit];

    fn next(&mut self) -> Option<&'a [Lit]> {
        let literals = self.literals;
        self.ranges.next().map(|range| &literals[range.clone()])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ranges.size_hint()
    }
}

impl<'a> ExactSizeIterator for Clauses<'a> {}

/// Convert any iterable of [`Lit`] iterables into a closed CnfFormula.
impl<F, I, L> From<F> for CnfFormula
where
    F: IntoIterator<Item = I>,
    I: IntoIterator<Item = L>,
    Vec<Lit>: Extend<L>,
{
    fn from(formula: F) -> CnfFormula {
        let mut cnf_formula = CnfFormula::new();
        for clause in formula {
            cnf_formula.literals.extend(clause);
            cnf_formula.end_clause();
        }
        cnf_formula
    }
}

impl fmt::Debug for CnfFormula {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.var_count(), f)?;
        f.debug_list().entries(self.iter()).finish()?;
        if !self.open_clause().is_empty() {
            write!(f, " open {:?}", self.open_clause())?;
        }
        if !self.assumptions.is_empty() {
            write!(f, " assuming {:?}", self.assumptions)?;
        }
        Ok(())
    }
}

/// Compares committed clauses, open clause and assumptions.
impl PartialEq for CnfFormula {
    fn eq(&self, other: &CnfFormula) -> bool {
        self.var_count() == other.var_count()
            && self.clause_ranges.len() == other.clause_ranges.len()
            && self.iter().zip(other.iter()).all(|(a, b)| a == b)
            && self.open_clause() == other.open_clause()
            && self.assumptions == other.assumptions
    }
}

#[cfg(any(test, feature = "proptest-strategies"))]
#[doc(hidden)]
pub mod strategy {
    use super::*;

    use proptest::{collection::SizeRange, prelude::*, *};

    use crate::lit::strategy::lit;

    pub fn vec_formula(
        vars: impl Strategy<Value = usize>,
        clauses: impl Into<SizeRange>,
        clause_len: impl Into<SizeRange>,
    ) -> impl Strategy<Value = Vec<Vec<Lit>>> {
        let clauses = clauses.into();
        let clause_len = clause_len.into();

        // Not using ind_flat_map makes shrinking too expensive
        vars.prop_ind_flat_map(move |vars| {
            collection::vec(
                collection::vec(lit(0..vars), clause_len.clone()),
                clauses.clone(),
            )
        })
    }

    /// Closed formulas.
    ///
    /// Empty clauses are dropped by the store, so a clause length range starting at zero
    /// produces fewer clauses than requested.
    pub fn cnf_formula(
        vars: impl Strategy<Value = usize>,
        clauses: impl Into<SizeRange>,
        clause_len: impl Into<SizeRange>,
    ) -> impl Strategy<Value = CnfFormula> {
        vec_formula(vars, clauses, clause_len).prop_map(CnfFormula::from)
    }
}
