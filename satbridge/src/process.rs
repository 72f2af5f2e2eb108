//! Spawning backends and feeding them formulas.
use std::{
    io::{self, Read, Write},
    process::{ChildStdin, Command, ExitStatus, Stdio},
    thread::{self, ScopedJoinHandle},
};

use log::{debug, warn};

use crate::error::Error;

/// Executable and arguments of a backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl BackendCommand {
    pub fn new(program: impl Into<String>) -> BackendCommand {
        BackendCommand {
            program: program.into(),
            args: vec![],
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> BackendCommand {
        self.args.push(arg.into());
        self
    }

    pub(crate) fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }

    pub(crate) fn spawn_error(&self, source: io::Error) -> Error {
        Error::Spawn {
            program: self.program.clone(),
            source,
        }
    }
}

/// Everything a finished backend process left behind.
#[derive(Clone, Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Run `command` with `feed` written line by line to its standard input.
///
/// The feed is written and standard error is collected from separate threads while standard
/// output is read, so a backend that writes before it has read all of its input can't deadlock.
/// Returns once the process has exited and was reaped, also when collecting its output failed.
pub fn run_command<F>(command: &BackendCommand, feed: F) -> Result<ProcessOutput, Error>
where
    F: Iterator<Item = String> + Send,
{
    debug!("Spawning {:?}", command);

    let mut child = command
        .command()
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| command.spawn_error(err))?;

    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (stdout, stderr, written) = thread::scope(|scope| {
        let writer = scope.spawn(move || write_feed(stdin, feed));
        let stderr_reader = scope.spawn(move || read_all(stderr));
        let stdout = read_all(stdout);
        if stdout.is_err() {
            // Closes the pipes the other threads are blocked on
            if let Err(err) = child.kill() {
                warn!("Could not kill '{}': {}", command.program, err);
            }
        }
        let stderr = join_io(stderr_reader, "stderr reader");
        let written = join_io(writer, "feed writer");
        (stdout, stderr, written)
    });

    let status = child.wait()?;
    debug!("Backend '{}' exited with {}", command.program, status);

    let stdout = stdout?;
    let stderr = stderr?;
    written?;

    Ok(ProcessOutput {
        status,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

fn read_all(source: Option<impl Read>) -> io::Result<Vec<u8>> {
    let mut buffer = vec![];
    if let Some(mut source) = source {
        source.read_to_end(&mut buffer)?;
    }
    Ok(buffer)
}

fn join_io<T>(handle: ScopedJoinHandle<'_, io::Result<T>>, name: &str) -> io::Result<T> {
    handle.join().unwrap_or_else(|_| {
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!("{} panicked", name),
        ))
    })
}

/// Write all lines of `feed` and close the pipe.
///
/// A process that exits before reading all of its input is not an error here, its exit status
/// tells the caller what happened.
pub(crate) fn write_feed(
    stdin: Option<ChildStdin>,
    feed: impl Iterator<Item = String>,
) -> io::Result<()> {
    let stdin = match stdin {
        Some(stdin) => stdin,
        None => return Ok(()),
    };

    match write_lines(io::BufWriter::new(stdin), feed) {
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
            debug!("Backend closed its input early");
            Ok(())
        }
        result => result,
    }
}

fn write_lines(mut target: impl Write, feed: impl Iterator<Item = String>) -> io::Result<()> {
    for line in feed {
        target.write_all(line.as_bytes())?;
        target.write_all(b"\n")?;
    }
    target.flush()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> BackendCommand {
        BackendCommand::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn feed_reaches_stdin() -> Result<(), Error> {
        let lines = vec!["p cnf 1 1".to_owned(), "1 0".to_owned()];
        let output = run_command(&sh("cat; echo done >&2; exit 3"), lines.into_iter())?;

        assert_eq!(output.stdout, "p cnf 1 1\n1 0\n");
        assert_eq!(output.stderr, "done\n");
        assert_eq!(output.code(), Some(3));
        Ok(())
    }

    #[test]
    fn large_output_before_input_does_not_deadlock() -> Result<(), Error> {
        let lines = (0..20000).map(|n| format!("{} 0", n + 1));
        let output = run_command(&sh("seq 1 100000; cat > /dev/null"), lines)?;

        assert_eq!(output.stdout.lines().count(), 100000);
        Ok(())
    }

    #[test]
    fn early_exit_is_not_an_io_error() -> Result<(), Error> {
        let lines = (0..100000).map(|n| format!("{} 0", n + 1));
        let output = run_command(&sh("exit 1"), lines)?;

        assert_eq!(output.code(), Some(1));
        Ok(())
    }

    #[test]
    fn waits_for_exit_after_output_closes() -> Result<(), Error> {
        let lines = vec!["1 0".to_owned()];
        let output = run_command(
            &sh("cat > /dev/null; echo out; exec >&- 2>&-; sleep 0.2; exit 4"),
            lines.into_iter(),
        )?;

        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "");
        assert_eq!(output.code(), Some(4));
        Ok(())
    }

    #[test]
    fn missing_program() {
        let result = run_command(
            &BackendCommand::new("/nonexistent/satbridge-backend"),
            vec![].into_iter(),
        );
        assert!(matches!(result, Err(Error::Spawn { .. })));
    }
}
