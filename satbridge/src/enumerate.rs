//! Streaming model enumeration from a long running backend.
use std::{
    io::{self, BufRead, BufReader},
    process::{Child, ChildStdout, Stdio},
};

use log::{debug, info, warn};

use satbridge_dimacs::DimacsEncoder;
use satbridge_formula::{CnfFormula, Lit};

use crate::error::Error;
use crate::process::{write_feed, BackendCommand};

/// Lifecycle of an [`Enumerator`]. Both `Exhausted` and `Canceled` are final.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EnumeratorState {
    Running,
    Exhausted,
    Canceled,
}

/// Models of a formula, read one line at a time from an enumeration backend.
///
/// The backend receives the formula on its standard input, which is then closed, and prints one
/// model per line. Models are only read when requested. A backend that is ahead of its consumer
/// blocks once the pipe buffer is full, which is the only flow control there is.
///
/// The process is reaped and the pipe closed when the output ends, on [`cancel`], and when the
/// enumerator is dropped, whichever comes first. An enumerator is meant to be used from one thread
/// at a time.
///
/// [`cancel`]: Enumerator::cancel
pub struct Enumerator {
    program: String,
    child: Option<Child>,
    output: Option<BufReader<ChildStdout>>,
    state: EnumeratorState,
    line: String,
}

impl Enumerator {
    /// Start enumerating the models of `formula` under its pending assumptions.
    ///
    /// Commits the open clause and consumes the pending assumptions.
    pub fn start(command: &BackendCommand, formula: &mut CnfFormula) -> Result<Enumerator, Error> {
        formula.close();
        let assumptions = formula.take_assumptions();
        Self::start_assuming(command, formula, &assumptions)
    }

    /// Start enumerating the models of a closed `formula` with explicitly given assumptions.
    ///
    /// The formula is written completely before this returns, so the backend has to read its
    /// whole input before producing a pipe buffer worth of output.
    pub fn start_assuming(
        command: &BackendCommand,
        formula: &CnfFormula,
        assumptions: &[Lit],
    ) -> Result<Enumerator, Error> {
        info!(
            "Enumerating models with '{}' on {} clauses",
            command.program,
            formula.len()
        );

        let mut child = command
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| command.spawn_error(err))?;

        let stdin = child.stdin.take();
        let output = child.stdout.take().map(BufReader::new);

        // From here on dropping the enumerator cleans up the process.
        let enumerator = Enumerator {
            program: command.program.clone(),
            child: Some(child),
            output,
            state: EnumeratorState::Running,
            line: String::new(),
        };

        write_feed(stdin, DimacsEncoder::new(formula, assumptions))?;

        Ok(enumerator)
    }

    pub fn state(&self) -> EnumeratorState {
        self.state
    }

    /// Wait for the next model.
    ///
    /// Returns `None` once the backend's output ended or after cancelation. Blank lines and `c`
    /// comment lines are skipped, a trailing `0` on a model line is ignored. When the output ends
    /// the backend is reaped, and an unsuccessful exit fails with [`Error::Backend`].
    pub fn next_model(&mut self) -> Result<Option<Vec<Lit>>, Error> {
        loop {
            if self.state != EnumeratorState::Running {
                return Ok(None);
            }
            let output = match self.output.as_mut() {
                Some(output) => output,
                None => {
                    self.finish(EnumeratorState::Exhausted)?;
                    return Ok(None);
                }
            };

            self.line.clear();
            match output.read_line(&mut self.line) {
                Ok(0) => {
                    self.finish(EnumeratorState::Exhausted)?;
                    return Ok(None);
                }
                Ok(_) => {
                    let line = self.line.trim();
                    if line.is_empty() || line.starts_with('c') {
                        continue;
                    }
                    return parse_model(&self.program, line).map(Some);
                }
                Err(err) => {
                    self.cancel()?;
                    return Err(err.into());
                }
            }
        }
    }

    /// Read all remaining models into memory.
    ///
    /// The number of models can be exponential in the size of the formula, this holds all of them
    /// at once.
    pub fn list(&mut self) -> Result<Vec<Vec<Lit>>, Error> {
        let mut models = vec![];
        while let Some(model) = self.next_model()? {
            models.push(model);
        }
        Ok(models)
    }

    /// Stop the backend.
    ///
    /// Kills the process, waits for it and closes the pipe. Does nothing if the enumerator is not
    /// running anymore, so calling this repeatedly is fine.
    pub fn cancel(&mut self) -> Result<(), Error> {
        if self.state != EnumeratorState::Running {
            return Ok(());
        }
        if let Some(child) = self.child.as_mut() {
            match child.kill() {
                Ok(()) => debug!("Sent kill to '{}'", self.program),
                // Already exited
                Err(err) if err.kind() == io::ErrorKind::InvalidInput => (),
                Err(err) => {
                    self.finish(EnumeratorState::Canceled)?;
                    return Err(err.into());
                }
            }
        }
        self.finish(EnumeratorState::Canceled)
    }

    /// Reap the process and close the pipe.
    ///
    /// Reaching the end of the output only counts as exhaustion if the backend exited
    /// successfully, otherwise it fails with [`Error::Backend`].
    fn finish(&mut self, state: EnumeratorState) -> Result<(), Error> {
        self.state = state;
        let waited = self.child.take().map(|mut child| child.wait());
        self.output = None;
        if let Some(status) = waited.transpose()? {
            debug!(
                "Enumeration backend '{}' {:?} with {}",
                self.program, state, status
            );
            if state == EnumeratorState::Exhausted && !status.success() {
                return Err(Error::Backend {
                    program: self.program.clone(),
                    status: status.code(),
                    output: String::new(),
                });
            }
        }
        Ok(())
    }
}

impl Iterator for Enumerator {
    type Item = Result<Vec<Lit>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_model().transpose()
    }
}

impl Drop for Enumerator {
    fn drop(&mut self) {
        if let Err(err) = self.cancel() {
            warn!("Failed to stop enumeration backend '{}': {}", self.program, err);
        }
    }
}

fn parse_model(program: &str, line: &str) -> Result<Vec<Lit>, Error> {
    let mut tokens = line.split_whitespace().peekable();
    let mut model = vec![];
    while let Some(token) = tokens.next() {
        let number: isize = token
            .parse()
            .map_err(|_| Error::parse(program, format!("invalid literal '{}'", token)))?;
        if number == 0 {
            if tokens.peek().is_some() {
                return Err(Error::parse(
                    program,
                    format!("terminator inside model line '{}'", line),
                ));
            }
            break;
        }
        model.push(Lit::try_from_dimacs(number)?);
    }
    Ok(model)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    use std::collections::HashSet;

    use satbridge_formula::{cnf_formula, lits, ExtendFormula};

    fn sh(script: &str) -> BackendCommand {
        BackendCommand::new("sh").arg("-c").arg(script)
    }

    fn three_models() -> BackendCommand {
        sh("cat > /dev/null; echo '1 2 0'; echo; echo 'c note'; echo '-1 2'; echo '1 -2 0'")
    }

    #[test]
    fn next_until_exhausted() -> Result<(), Error> {
        let mut formula = cnf_formula![1, 2;];
        let mut models = Enumerator::start(&three_models(), &mut formula)?;

        assert_eq!(models.state(), EnumeratorState::Running);
        assert_eq!(models.next_model()?, Some(lits![1, 2].to_vec()));
        assert_eq!(models.next_model()?, Some(lits![-1, 2].to_vec()));
        assert_eq!(models.next_model()?, Some(lits![1, -2].to_vec()));
        assert_eq!(models.next_model()?, None);
        assert_eq!(models.state(), EnumeratorState::Exhausted);
        assert_eq!(models.next_model()?, None);

        models.cancel()?;
        assert_eq!(models.state(), EnumeratorState::Exhausted);
        Ok(())
    }

    #[test]
    fn list_matches_next() -> Result<(), Error> {
        let mut formula = cnf_formula![1, 2;];

        let listed: HashSet<Vec<Lit>> = Enumerator::start(&three_models(), &mut formula)?
            .list()?
            .into_iter()
            .collect();

        let iterated: HashSet<Vec<Lit>> = Enumerator::start(&three_models(), &mut formula)?
            .collect::<Result<_, _>>()?;

        assert_eq!(listed.len(), 3);
        assert_eq!(listed, iterated);
        Ok(())
    }

    #[test]
    fn cancel_is_idempotent() -> Result<(), Error> {
        let mut formula = cnf_formula![1, -2;];
        let mut models = Enumerator::start(&sh("cat > /dev/null; exec yes '1 -2 0'"), &mut formula)?;

        assert_eq!(models.next_model()?, Some(lits![1, -2].to_vec()));

        models.cancel()?;
        assert_eq!(models.state(), EnumeratorState::Canceled);
        models.cancel()?;
        assert_eq!(models.state(), EnumeratorState::Canceled);
        assert_eq!(models.next_model()?, None);
        assert!(models.list()?.is_empty());
        Ok(())
    }

    #[test]
    fn drop_stops_backend() -> Result<(), Error> {
        let mut formula = cnf_formula![1;];
        for _ in 0..20 {
            let mut models = Enumerator::start(&sh("cat > /dev/null; exec yes 1"), &mut formula)?;
            assert!(models.next_model()?.is_some());
        }
        Ok(())
    }

    #[test]
    fn feed_contains_assumptions() -> Result<(), Error> {
        let mut formula = CnfFormula::new();
        formula.add(vec![1, 2, 0])?;
        formula.assume(vec![-2])?;

        // Echo the unit clauses back as models
        let mut models = Enumerator::start(&sh("grep -v '^p' | tail -n 1"), &mut formula)?;

        assert_eq!(models.list()?, vec![lits![-2].to_vec()]);
        assert!(formula.assumptions().is_empty());
        Ok(())
    }

    #[test]
    fn failing_backend() -> Result<(), Error> {
        let mut formula = cnf_formula![1;];

        let mut models = Enumerator::start(&sh("cat > /dev/null; echo '1 0'; exit 3"), &mut formula)?;
        assert_eq!(models.next_model()?, Some(lits![1].to_vec()));
        match models.next_model() {
            Err(Error::Backend { status, .. }) => assert_eq!(status, Some(3)),
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(models.state(), EnumeratorState::Exhausted);
        assert_eq!(models.next_model()?, None);

        let mut models = Enumerator::start(&sh("exit 127"), &mut formula)?;
        assert!(matches!(
            models.list(),
            Err(Error::Backend {
                status: Some(127),
                ..
            })
        ));

        let mut models = Enumerator::start(&sh("cat > /dev/null; kill -9 $$"), &mut formula)?;
        assert!(matches!(
            models.next_model(),
            Err(Error::Backend { status: None, .. })
        ));
        Ok(())
    }

    #[test]
    fn cancel_is_not_a_failure() -> Result<(), Error> {
        let mut formula = cnf_formula![1;];
        let mut models = Enumerator::start(&sh("cat > /dev/null; exec yes 1"), &mut formula)?;

        assert!(models.next_model()?.is_some());
        models.cancel()?;
        assert_eq!(models.state(), EnumeratorState::Canceled);
        Ok(())
    }

    #[test]
    fn malformed_line() -> Result<(), Error> {
        let mut formula = cnf_formula![1;];
        let mut models = Enumerator::start(&sh("cat > /dev/null; echo '1 x'; echo '1 0 2'"), &mut formula)?;

        assert!(matches!(models.next_model(), Err(Error::Parse { .. })));
        assert!(matches!(models.next_model(), Err(Error::Parse { .. })));
        assert_eq!(models.next_model()?, None);
        Ok(())
    }
}
