//! Reading formulas from the supported kinds of sources.
use std::{
    borrow::Cow,
    fs, io,
    path::{Path, PathBuf},
};

use log::info;
use thiserror::Error;

use satbridge_formula::{ExtendFormula, FormatError};

use crate::parser::{DimacsParser, ParserError};

/// Possible errors while reading a formula.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("Error reading input: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Parser(#[from] ParserError),
    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Where to read clauses from.
///
/// In-memory clauses are given as DIMACS integers with an optional trailing `0` per clause.
pub enum Source<'a> {
    /// A sequence of clauses.
    Clauses(Vec<Vec<isize>>),
    /// A lazy producer of clauses, pulled one at a time.
    Producer(Box<dyn Iterator<Item = Vec<isize>> + 'a>),
    /// A DIMACS CNF file.
    Path(PathBuf),
    /// DIMACS CNF text.
    Text(Cow<'a, str>),
    /// A stream of DIMACS CNF text.
    Reader(Box<dyn io::Read + 'a>),
}

impl<'a> Source<'a> {
    /// A lazy producer of clauses.
    pub fn producer<I>(clauses: I) -> Source<'a>
    where
        I: IntoIterator<Item = Vec<isize>>,
        I::IntoIter: 'a,
    {
        Source::Producer(Box::new(clauses.into_iter()))
    }

    /// A path if `input` names an existing file, DIMACS text otherwise.
    pub fn detect(input: impl Into<Cow<'a, str>>) -> Source<'a> {
        let input = input.into();
        if Path::new(input.as_ref()).is_file() {
            Source::Path(PathBuf::from(input.into_owned()))
        } else {
            Source::Text(input)
        }
    }
}

impl<'a> From<&'a str> for Source<'a> {
    fn from(input: &'a str) -> Source<'a> {
        Source::detect(input)
    }
}

impl<'a> From<String> for Source<'a> {
    fn from(input: String) -> Source<'a> {
        Source::detect(input)
    }
}

impl<'a> From<&'a Path> for Source<'a> {
    fn from(path: &'a Path) -> Source<'a> {
        Source::Path(path.to_owned())
    }
}

impl<'a> From<PathBuf> for Source<'a> {
    fn from(path: PathBuf) -> Source<'a> {
        Source::Path(path)
    }
}

impl<'a> From<Vec<Vec<isize>>> for Source<'a> {
    fn from(clauses: Vec<Vec<isize>>) -> Source<'a> {
        Source::Clauses(clauses)
    }
}

impl<'a> From<Vec<Vec<i32>>> for Source<'a> {
    fn from(clauses: Vec<Vec<i32>>) -> Source<'a> {
        Source::Clauses(
            clauses
                .into_iter()
                .map(|clause| clause.into_iter().map(|number| number as isize).collect())
                .collect(),
        )
    }
}

/// The `read` operation, available for everything that accepts clauses.
pub trait ReadFormula: ExtendFormula {
    /// Add all clauses of `source`.
    ///
    /// In-memory clauses are added as whole clauses, DIMACS text is streamed literal by literal.
    fn read<'a>(&mut self, source: impl Into<Source<'a>>) -> Result<(), ReadError>;
}

impl<T: ExtendFormula> ReadFormula for T {
    fn read<'a>(&mut self, source: impl Into<Source<'a>>) -> Result<(), ReadError> {
        match source.into() {
            Source::Clauses(clauses) => {
                for clause in clauses {
                    self.add_numbers(&clause)?;
                }
            }
            Source::Producer(clauses) => {
                for clause in clauses {
                    self.add_numbers(&clause)?;
                }
            }
            Source::Path(path) => {
                info!("Reading file '{}'", path.display());
                DimacsParser::parse_into(fs::File::open(path)?, self)?;
            }
            Source::Text(text) => {
                DimacsParser::parse_into(text.as_bytes(), self)?;
            }
            Source::Reader(reader) => {
                DimacsParser::parse_into(reader, self)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use anyhow::Error;
    use tempfile::NamedTempFile;

    use satbridge_formula::{cnf_formula, CnfFormula};

    #[test]
    fn in_memory_clauses() -> Result<(), Error> {
        let mut formula = CnfFormula::new();
        formula.read(vec![vec![1, -2, 0], vec![3]])?;
        formula.read(Source::producer((4..6).map(|n| vec![n, -n])))?;
        formula.close();

        assert_eq!(
            formula,
            cnf_formula![
                1, -2;
                3;
                4, -4;
                5, -5;
            ]
        );

        Ok(())
    }

    #[test]
    fn text_and_file() -> Result<(), Error> {
        let text = "c example\np cnf 3 2\n1 -3 0\n2 0\n";

        let mut file = NamedTempFile::new()?;
        file.write_all(text.as_bytes())?;
        file.flush()?;

        let path = file.path().to_str().unwrap().to_owned();
        assert!(matches!(Source::detect(path.as_str()), Source::Path(_)));
        assert!(matches!(Source::detect(text), Source::Text(_)));

        let mut from_file = CnfFormula::new();
        from_file.read(path)?;

        let mut from_text = CnfFormula::new();
        from_text.read(text)?;

        let mut from_reader = CnfFormula::new();
        from_reader.read(Source::Reader(Box::new(text.as_bytes())))?;

        let expected = cnf_formula![
            1, -3;
            2;
        ];
        assert_eq!(from_file, expected);
        assert_eq!(from_text, expected);
        assert_eq!(from_reader, expected);

        Ok(())
    }

    #[test]
    fn errors() {
        let mut formula = CnfFormula::new();

        assert!(matches!(
            formula.read(vec![vec![1, 0, 2]]),
            Err(ReadError::Format(FormatError::MisplacedTerminator { .. }))
        ));
        assert!(matches!(
            formula.read("1 x 0"),
            Err(ReadError::Parser(ParserError::UnexpectedInput { .. }))
        ));
        assert!(matches!(
            formula.read(Path::new("/nonexistent/formula.cnf")),
            Err(ReadError::Io(_))
        ));
    }
}
