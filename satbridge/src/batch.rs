//! Batch backends: run once on a complete formula and parse the final output.
use std::str::FromStr;

use log::{info, warn};
use num_bigint::BigUint;
use regex::{Regex, RegexBuilder};

use satbridge_dimacs::{var_count_with, DimacsEncoder};
use satbridge_formula::{CnfFormula, Lit};

use crate::error::Error;
use crate::process::{run_command, BackendCommand, ProcessOutput};

/// Result line of a satisfiable witness search.
pub const SAT_MARKER: &str = "s SATISFIABLE";
/// Result line of an unsatisfiable witness search.
pub const UNSAT_MARKER: &str = "s UNSATISFIABLE";

/// Exit code of a witness backend that found a model.
pub const SAT_EXIT_CODE: i32 = 10;
/// Exit code of a witness backend that proved unsatisfiability.
pub const UNSAT_EXIT_CODE: i32 = 20;

/// A backend that is run synchronously on a DIMACS CNF stream.
pub trait BatchBackend {
    type Output;

    /// Command line for the next invocation.
    fn command(&self) -> BackendCommand;

    /// Extract the result from the output of a finished invocation.
    ///
    /// `var_count` is the variable count announced in the problem line of the input.
    fn extract(
        &self,
        program: &str,
        var_count: usize,
        output: &ProcessOutput,
    ) -> Result<Self::Output, Error>;
}

/// Run a batch backend on `formula` and its pending assumptions.
///
/// Commits the open clause first. The pending assumptions are consumed by this invocation, also
/// when it fails.
pub fn run_batch<B: BatchBackend>(backend: &B, formula: &mut CnfFormula) -> Result<B::Output, Error> {
    formula.close();
    let assumptions = formula.take_assumptions();
    run_batch_assuming(backend, formula, &assumptions)
}

/// Run a batch backend on a closed `formula` with explicitly given assumptions.
pub fn run_batch_assuming<B: BatchBackend>(
    backend: &B,
    formula: &CnfFormula,
    assumptions: &[Lit],
) -> Result<B::Output, Error> {
    let command = backend.command();
    info!(
        "Running '{}' on {} clauses and {} assumptions",
        command.program,
        formula.len(),
        assumptions.len()
    );
    let var_count = var_count_with(formula.var_count(), assumptions);
    let output = run_command(&command, DimacsEncoder::new(formula, assumptions))?;
    backend.extract(&command.program, var_count, &output)
}

/// A SAT solver following the SAT competition output conventions.
///
/// Exit code 10 or 20, an `s` result line and the model on `v` lines.
#[derive(Clone, Debug)]
pub struct WitnessBackend {
    command: BackendCommand,
}

impl WitnessBackend {
    pub fn new(command: BackendCommand) -> WitnessBackend {
        WitnessBackend { command }
    }

    /// Search a model of `formula` under its pending assumptions.
    ///
    /// Returns `None` if there is none.
    pub fn witness(&self, formula: &mut CnfFormula) -> Result<Option<Vec<Lit>>, Error> {
        run_batch(self, formula)
    }
}

impl BatchBackend for WitnessBackend {
    type Output = Option<Vec<Lit>>;

    fn command(&self) -> BackendCommand {
        self.command.clone()
    }

    fn extract(
        &self,
        program: &str,
        var_count: usize,
        output: &ProcessOutput,
    ) -> Result<Option<Vec<Lit>>, Error> {
        let code = output.code();
        if code != Some(SAT_EXIT_CODE) && code != Some(UNSAT_EXIT_CODE) {
            return Err(Error::Backend {
                program: program.to_owned(),
                status: code,
                output: output.stdout.clone() + &output.stderr,
            });
        }

        let mut satisfiable = None;
        let mut model = vec![];

        for line in output.stdout.lines() {
            let line = line.trim_end();
            if line == SAT_MARKER {
                satisfiable = Some(true);
            } else if line == UNSAT_MARKER {
                satisfiable = Some(false);
            } else if let Some(values) = value_line(line) {
                for token in values.split_whitespace() {
                    let number = parse_number(program, token)?;
                    if number != 0 {
                        model.push(Lit::try_from_dimacs(number)?);
                    }
                }
            }
        }

        match satisfiable {
            Some(true) if code == Some(SAT_EXIT_CODE) => {
                check_model(program, var_count, &model)?;
                Ok(Some(model))
            }
            Some(false) if code == Some(UNSAT_EXIT_CODE) => Ok(None),
            Some(_) => Err(Error::parse(
                program,
                format!("result line contradicts exit code {:?}", code),
            )),
            None => Err(Error::parse(program, "missing result line")),
        }
    }
}

/// A model assigns each variable from 1 to `var_count` in order.
fn check_model(program: &str, var_count: usize, model: &[Lit]) -> Result<(), Error> {
    if model.len() != var_count {
        return Err(Error::parse(
            program,
            format!(
                "model has {} literals for {} variables",
                model.len(),
                var_count
            ),
        ));
    }
    match model.iter().enumerate().find(|(index, lit)| lit.index() != *index) {
        Some((index, lit)) => Err(Error::parse(
            program,
            format!("expected variable {} in model, found literal {}", index + 1, lit),
        )),
        None => Ok(()),
    }
}

fn value_line(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('v')?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}

fn parse_number(program: &str, token: &str) -> Result<isize, Error> {
    token
        .parse()
        .map_err(|_| Error::parse(program, format!("invalid literal '{}'", token)))
}

fn compile_pattern(pattern: &str) -> Result<Regex, Error> {
    let regex = RegexBuilder::new(pattern)
        .multi_line(true)
        .build()
        .map_err(|err| Error::InvalidArgument(format!("count pattern '{}': {}", pattern, err)))?;
    if regex.captures_len() < 2 {
        return Err(Error::InvalidArgument(format!(
            "count pattern '{}' has no capture group",
            pattern
        )));
    }
    Ok(regex)
}

fn extract_count(
    program: &str,
    pattern: &Regex,
    output: &ProcessOutput,
) -> Result<BigUint, Error> {
    if output.code().is_none() {
        return Err(Error::Backend {
            program: program.to_owned(),
            status: None,
            output: output.stdout.clone() + &output.stderr,
        });
    }
    if !output.status.success() {
        warn!("Counter '{}' exited with {}", program, output.status);
    }

    let count = pattern
        .captures(&output.stdout)
        .and_then(|captures| captures.get(1))
        .ok_or_else(|| Error::parse(program, format!("no line matches '{}'", pattern)))?;

    BigUint::from_str(count.as_str())
        .map_err(|_| Error::parse(program, format!("invalid count '{}'", count.as_str())))
}

/// An exact model counter.
///
/// The count is the first capture group of the first match of `pattern` in the output.
#[derive(Clone, Debug)]
pub struct ExactCounter {
    command: BackendCommand,
    pattern: Regex,
}

impl ExactCounter {
    pub fn new(command: BackendCommand, pattern: &str) -> Result<ExactCounter, Error> {
        Ok(ExactCounter {
            command,
            pattern: compile_pattern(pattern)?,
        })
    }

    /// Count the models of `formula` under its pending assumptions.
    pub fn count(&self, formula: &mut CnfFormula) -> Result<BigUint, Error> {
        run_batch(self, formula)
    }
}

impl BatchBackend for ExactCounter {
    type Output = BigUint;

    fn command(&self) -> BackendCommand {
        self.command.clone()
    }

    fn extract(
        &self,
        program: &str,
        _var_count: usize,
        output: &ProcessOutput,
    ) -> Result<BigUint, Error> {
        extract_count(program, &self.pattern, output)
    }
}

/// A probabilistic model counter with a fixed risk.
///
/// The risk is the probability that the reported count is outside of the backend's tolerance. It
/// is passed as `risk_flag <risk>`, or as a bare argument if `risk_flag` is empty.
#[derive(Clone, Debug)]
pub struct ProbabilisticCounter {
    command: BackendCommand,
    pattern: Regex,
    risk_flag: String,
    risk: f64,
}

impl ProbabilisticCounter {
    /// Fails with [`Error::InvalidArgument`] unless `0 < risk < 1`.
    ///
    /// A risk of `0` is rejected rather than treated as exact counting, use an [`ExactCounter`]
    /// for that.
    pub fn new(
        command: BackendCommand,
        pattern: &str,
        risk_flag: impl Into<String>,
        risk: f64,
    ) -> Result<ProbabilisticCounter, Error> {
        check_risk(risk)?;
        Ok(ProbabilisticCounter {
            command,
            pattern: compile_pattern(pattern)?,
            risk_flag: risk_flag.into(),
            risk,
        })
    }

    pub fn risk(&self) -> f64 {
        self.risk
    }

    /// Count the models of `formula` under its pending assumptions.
    pub fn count(&self, formula: &mut CnfFormula) -> Result<BigUint, Error> {
        run_batch(self, formula)
    }
}

/// Fails with [`Error::InvalidArgument`] unless `0 < risk < 1`.
pub fn check_risk(risk: f64) -> Result<(), Error> {
    if risk > 0.0 && risk < 1.0 {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "risk must be strictly between 0 and 1, got {}",
            risk
        )))
    }
}

impl BatchBackend for ProbabilisticCounter {
    type Output = BigUint;

    fn command(&self) -> BackendCommand {
        let command = self.command.clone();
        let command = if self.risk_flag.is_empty() {
            command
        } else {
            command.arg(self.risk_flag.as_str())
        };
        command.arg(self.risk.to_string())
    }

    fn extract(
        &self,
        program: &str,
        _var_count: usize,
        output: &ProcessOutput,
    ) -> Result<BigUint, Error> {
        extract_count(program, &self.pattern, output)
    }
}
