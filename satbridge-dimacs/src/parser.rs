//! Streaming DIMACS CNF parser.
use std::io;

use log::{info, warn};
use thiserror::Error;

use satbridge_formula::{CnfFormula, ExtendFormula, Var};

use crate::read::ReadError;

/// Possible syntax errors while parsing DIMACS CNF input.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error(
        "line {}: Unexpected character in DIMACS CNF input: '{}'",
        line,
        unexpected
    )]
    UnexpectedInput { line: usize, unexpected: char },
    #[error(
        "line {}: Literal index is too large: {}{}...",
        line,
        index,
        final_digit
    )]
    LiteralTooLarge {
        line: usize,
        index: usize,
        final_digit: usize,
    },
    #[error("Parser invoked after a previous error")]
    PreviousError,
}

/// Variable and clause count present in a DIMACS CNF problem line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DimacsHeader {
    pub var_count: usize,
    pub clause_count: usize,
}

/// Parser for DIMACS CNF input.
///
/// The parser consumes its input in chunks and forwards every literal and every clause
/// terminator to an [`ExtendFormula`] as soon as it is complete. Comment lines, problem lines and
/// blank lines are skipped. A well-formed problem line is recorded but its counts are not
/// enforced.
///
/// Clauses may span several lines or share a line, only the `0` terminator delimits them. A clause
/// that is still unterminated at the end of the input is left open in the receiving formula.
#[derive(Default)]
pub struct DimacsParser {
    header: Option<DimacsHeader>,

    line_number: usize,
    clause_count: usize,
    open_lits: usize,
    partial_lit: usize,
    negate_next_lit: bool,

    in_lit: bool,
    in_comment_or_header: bool,
    in_header: bool,
    start_of_line: bool,
    error: bool,

    header_line: Vec<u8>,
}

impl DimacsParser {
    /// Create a new DIMACS CNF parser.
    pub fn new() -> DimacsParser {
        DimacsParser {
            line_number: 1,
            start_of_line: true,
            ..DimacsParser::default()
        }
    }

    /// Parse the whole input into a closed [`CnfFormula`].
    pub fn parse(input: impl io::Read) -> Result<CnfFormula, ReadError> {
        let mut formula = CnfFormula::new();
        Self::parse_into(input, &mut formula)?;
        formula.close();
        Ok(formula)
    }

    /// Parse the whole input, forwarding everything to `sink`.
    pub fn parse_into(
        input: impl io::Read,
        sink: &mut impl ExtendFormula,
    ) -> Result<DimacsParser, ReadError> {
        use io::BufRead;

        let mut buffer = io::BufReader::new(input);
        let mut parser = Self::new();

        loop {
            let data = buffer.fill_buf()?;
            if data.is_empty() {
                break;
            }
            parser.parse_chunk(data, sink)?;
            let len = data.len();
            buffer.consume(len);
        }
        parser.eof(sink)?;

        info!(
            "Parsed {} clauses in {} lines",
            parser.clause_count(),
            parser.line_number
        );

        Ok(parser)
    }

    /// Parse a chunk of input.
    ///
    /// After parsing the last chunk call the [`eof`](DimacsParser::eof) method.
    ///
    /// If this method returns an error, the parser is in an invalid state and cannot parse further
    /// chunks.
    pub fn parse_chunk(
        &mut self,
        chunk: &[u8],
        sink: &mut impl ExtendFormula,
    ) -> Result<(), ParserError> {
        if self.error {
            return Err(ParserError::PreviousError);
        }

        let max_var_count = sink.max_var_count();
        let can_overflow = max_var_count / 10;
        let overflow_digit = max_var_count % 10;

        for &byte in chunk.iter() {
            if byte == b'\n' {
                self.line_number += 1;
            }
            match byte {
                b'\n' | b'\r' if self.in_comment_or_header => {
                    if self.in_header {
                        self.in_header = false;
                        self.parse_header_line();
                    }
                    self.in_comment_or_header = false;
                    self.start_of_line = true
                }
                _ if self.in_comment_or_header => {
                    if self.in_header {
                        self.header_line.push(byte);
                    }
                }
                b'0'..=b'9' => {
                    self.in_lit = true;
                    let digit = (byte - b'0') as usize;

                    // Checks against the sink's variable limit without overflowing usize
                    if can_overflow <= self.partial_lit {
                        let carry = (digit <= overflow_digit) as usize;

                        if can_overflow + carry <= self.partial_lit {
                            self.error = true;
                            return Err(ParserError::LiteralTooLarge {
                                line: self.line_number,
                                index: self.partial_lit,
                                final_digit: digit,
                            });
                        }
                    }

                    self.partial_lit = self.partial_lit * 10 + digit;

                    self.start_of_line = false
                }
                b'-' if !self.negate_next_lit && !self.in_lit => {
                    self.negate_next_lit = true;
                    self.start_of_line = false
                }
                b' ' | b'\t' | b'\n' | b'\r' if !self.negate_next_lit || self.in_lit => {
                    // Leading blanks keep a line eligible for a comment or problem line
                    let blank_so_far = self.start_of_line && !self.in_lit;
                    self.finish_literal(sink);
                    self.negate_next_lit = false;
                    self.in_lit = false;
                    self.partial_lit = 0;
                    self.start_of_line = blank_so_far || byte == b'\n' || byte == b'\r';
                }
                b'c' if self.start_of_line => {
                    self.in_comment_or_header = true;
                }
                b'p' if self.start_of_line => {
                    self.in_comment_or_header = true;
                    self.in_header = true;
                    self.header_line.clear();
                    self.header_line.push(b'p');
                }
                _ => {
                    self.error = true;
                    return Err(ParserError::UnexpectedInput {
                        line: self.line_number,
                        unexpected: byte as char,
                    });
                }
            }
        }

        Ok(())
    }

    /// Finish parsing the input.
    pub fn eof(&mut self, sink: &mut impl ExtendFormula) -> Result<(), ParserError> {
        if self.error {
            return Err(ParserError::PreviousError);
        }

        if self.in_header {
            self.in_header = false;
            self.parse_header_line();
        }

        if self.negate_next_lit && !self.in_lit {
            self.error = true;
            return Err(ParserError::UnexpectedInput {
                line: self.line_number,
                unexpected: '-',
            });
        }

        self.finish_literal(sink);
        self.in_lit = false;
        self.negate_next_lit = false;
        self.partial_lit = 0;

        Ok(())
    }

    /// Return the last well-formed problem line if present.
    pub fn header(&self) -> Option<DimacsHeader> {
        self.header
    }

    /// Number of clause terminators parsed.
    pub fn clause_count(&self) -> usize {
        self.clause_count
    }

    /// Whether literals were parsed after the last clause terminator.
    pub fn is_clause_open(&self) -> bool {
        self.open_lits > 0
    }

    fn finish_literal(&mut self, sink: &mut impl ExtendFormula) {
        if self.in_lit {
            if self.partial_lit == 0 {
                sink.end_clause();
                self.clause_count += 1;
                self.open_lits = 0;
            } else {
                sink.push_lit(Var::from_dimacs(self.partial_lit as isize).lit(!self.negate_next_lit));
                self.open_lits += 1;
            }
        }
    }

    fn parse_header_line(&mut self) {
        let header_line = String::from_utf8_lossy(&self.header_line).into_owned();

        let mut header_values = header_line[1..].split_whitespace();

        let header = match (
            header_values.next(),
            header_values.next().and_then(|value| str::parse(value).ok()),
            header_values.next().and_then(|value| str::parse(value).ok()),
            header_values.next(),
        ) {
            (Some("cnf"), Some(var_count), Some(clause_count), None) => DimacsHeader {
                var_count,
                clause_count,
            },
            _ => {
                warn!(
                    "line {}: Ignoring malformed problem line '{}'",
                    self.line_number, header_line
                );
                return;
            }
        };

        self.header = Some(header);
    }
}
