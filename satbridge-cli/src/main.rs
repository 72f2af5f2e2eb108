use std::env;
use std::io::{self, Write};

use anyhow::{anyhow, Error};
use clap::{App, AppSettings, Arg, ArgMatches};
use env_logger::{fmt, Builder, Target};
use log::{error, info, warn};
use log::{Level, LevelFilter, Record};
use num_bigint::BigUint;

use satbridge::batch::{check_risk, SAT_EXIT_CODE, SAT_MARKER, UNSAT_EXIT_CODE, UNSAT_MARKER};
use satbridge::{ExtendFormula, IncrementalSolver, Lit, ReadFormula, SolveResult, Source};

mod run;

fn main() {
    let exit_code = match main_with_err() {
        Err(err) => {
            error!("{}", err);
            1
        }
        Ok(exit_code) => exit_code,
    };
    std::process::exit(exit_code);
}

fn init_logging() {
    let format = |buf: &mut fmt::Formatter, record: &Record| {
        if record.level() == Level::Info {
            writeln!(buf, "c {}", record.args())
        } else {
            writeln!(buf, "c {}: {}", record.level(), record.args())
        }
    };

    let mut builder = Builder::new();
    builder
        .target(Target::Stdout)
        .format(format)
        .filter(None, LevelFilter::Info);

    if let Ok(ref env_var) = env::var("SATBRIDGE_LOG") {
        builder.parse_filters(env_var);
    }

    builder.init();
}

fn banner() {
    info!("This is satbridge {}", env!("SATBRIDGE_VERSION"));
    info!(
        "  {} build - {}",
        env!("SATBRIDGE_PROFILE"),
        env!("SATBRIDGE_RUSTC_VERSION")
    );
}

pub(crate) fn assume_arg() -> Arg<'static, 'static> {
    Arg::from_usage("[assume] --assume=[LIT]")
        .help("Assume a literal for this invocation only")
        .multiple(true)
        .number_of_values(1)
        .allow_hyphen_values(true)
}

pub(crate) fn assumptions(matches: &ArgMatches) -> Result<Vec<isize>, Error> {
    matches
        .values_of("assume")
        .into_iter()
        .flatten()
        .map(|value| {
            value
                .parse()
                .map_err(|_| anyhow!("Invalid literal '{}' given to --assume", value))
        })
        .collect()
}

/// Where the formula is read from, stdin if no input file was given.
pub(crate) fn input_source<'a>(matches: &ArgMatches, stdin: &'a io::Stdin) -> Source<'a> {
    match matches.value_of("INPUT") {
        Some(path) => {
            info!("Reading file '{}'", path);
            Source::Path(path.into())
        }
        None => {
            info!("Reading from stdin");
            Source::Reader(Box::new(stdin.lock()))
        }
    }
}

/// Write a model as a `0` terminated line, optionally after a line prefix like `v`.
pub(crate) fn print_model(target: &mut impl Write, prefix: &str, model: &[Lit]) -> io::Result<()> {
    let mut line = prefix.to_owned();
    for lit in model.iter().map(|lit| lit.to_string()).chain(Some("0".to_owned())) {
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&lit);
    }
    writeln!(target, "{}", line)?;
    target.flush()
}

fn main_with_err() -> Result<i32, Error> {
    let matches = App::new("satbridge")
        .version(env!("SATBRIDGE_VERSION"))
        .setting(AppSettings::DisableHelpSubcommand)
        .setting(AppSettings::ArgsNegateSubcommands)
        .setting(AppSettings::VersionlessSubcommands)
        .arg_from_usage("[INPUT] 'The input file to use (stdin if omitted)'")
        .arg(assume_arg())
        .arg_from_usage("--enumerate 'Print every model on a line of its own'")
        .arg(
            Arg::from_usage("--count 'Print the number of models'").conflicts_with("enumerate"),
        )
        .arg(
            Arg::from_usage("[delta] --delta=[RISK] 'Accepted risk of a probabilistic count'")
                .requires("count"),
        )
        .subcommand(run::run_args())
        .get_matches();

    if let Some(matches) = matches.subcommand_matches("--run") {
        return run::run_main(matches);
    }

    init_logging();
    banner();

    let assumptions = assumptions(&matches)?;

    let mut solver = IncrementalSolver::new();

    let stdin = io::stdin();
    solver.read(input_source(&matches, &stdin))?;

    info!("Loaded formula with {} variables", solver.var_count());

    if matches.is_present("enumerate") {
        let stdout = io::stdout();
        let mut stdout = stdout.lock();
        let mut models = 0usize;
        let complete = for_each_model(&mut solver, &assumptions, |model| {
            models += 1;
            print_model(&mut stdout, "", model)
        })?;
        if complete {
            info!("Found all {} models", models);
        } else {
            warn!("Stopped after {} models", models);
        }
        Ok(0)
    } else if matches.is_present("count") {
        if let Some(delta) = matches.value_of("delta") {
            let risk: f64 = delta
                .parse()
                .map_err(|_| anyhow!("Invalid risk '{}' given to --delta", delta))?;
            check_risk(risk)?;
            info!("Counting exactly, which meets any risk");
        }
        let mut count = BigUint::from(0u32);
        if for_each_model(&mut solver, &assumptions, |_| {
            count += 1u32;
            Ok(())
        })? {
            println!("s mc {}", count);
        } else {
            println!("s UNKNOWN");
        }
        Ok(0)
    } else {
        solver.assume(assumptions)?;
        match solver.solve() {
            SolveResult::Sat => {
                println!("{}", SAT_MARKER);
                print_model(&mut io::stdout(), "v", &solver.model()?)?;
                Ok(SAT_EXIT_CODE)
            }
            SolveResult::Unsat => {
                println!("{}", UNSAT_MARKER);
                Ok(UNSAT_EXIT_CODE)
            }
            SolveResult::Unknown => {
                println!("s UNKNOWN");
                Ok(0)
            }
        }
    }
}

/// Solve repeatedly, excluding each model found by a blocking clause.
///
/// Returns `false` if the solver stopped before all models were found.
fn for_each_model(
    solver: &mut IncrementalSolver,
    assumptions: &[isize],
    mut found: impl FnMut(&[Lit]) -> io::Result<()>,
) -> Result<bool, Error> {
    loop {
        solver.assume(assumptions.iter().cloned())?;
        match solver.solve() {
            SolveResult::Sat => {
                let model = solver.model()?;
                found(&model)?;
                if model.is_empty() {
                    // The empty assignment is the only one
                    return Ok(true);
                }
                let blocking: Vec<Lit> = model.iter().map(|&lit| !lit).collect();
                solver.add_clause(&blocking)?;
            }
            SolveResult::Unsat => return Ok(true),
            SolveResult::Unknown => return Ok(false),
        }
    }
}
