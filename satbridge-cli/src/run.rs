use std::{fs, io};

use anyhow::{anyhow, Error};
use clap::{values_t, App, Arg, ArgMatches, SubCommand};

use satbridge::batch::{SAT_EXIT_CODE, SAT_MARKER, UNSAT_EXIT_CODE, UNSAT_MARKER};
use satbridge::{BackendConfig, BackendConfigUpdate, CnfFormula, Enumerator, ExtendFormula, ReadFormula};

use super::{assume_arg, assumptions, banner, init_logging, input_source, print_model};

pub fn run_args() -> App<'static, 'static> {
    SubCommand::with_name("--run")
        .arg(
            Arg::from_usage("<MODE> 'What to compute using the configured backends'")
                .possible_values(&["witness", "count", "enumerate"]),
        )
        .arg_from_usage("[INPUT] 'The input file to use (stdin if omitted)'")
        .arg_from_usage("[config-file] --config=[FILE] 'Read backends from configuration file'")
        .arg(
            Arg::from_usage("[config-option] -C --config-option")
                .value_name("OPTION>=<VALUE")
                .help(
                    "Specify a single config option, see 'satbridge --run witness -C help' for a \
                     list of options.",
                )
                .multiple(true)
                .number_of_values(1),
        )
        .arg_from_usage(
            "[risk] --risk=[RISK] 'Count probabilistically with the given risk (exact if omitted)'",
        )
        .arg(assume_arg())
}

pub fn run_main(matches: &ArgMatches) -> Result<i32, Error> {
    let config_options = values_t!(matches, "config-option", String).unwrap_or_default();

    if config_options.iter().any(|option| option == "help") {
        print!("{}", BackendConfig::help());
        return Ok(0);
    }

    init_logging();
    banner();

    let mut config_update = BackendConfigUpdate::new();

    if let Some(config_path) = matches.value_of("config-file") {
        log::info!("Reading backend configuration '{}'", config_path);
        config_update.merge(BackendConfigUpdate::from_toml(&fs::read_to_string(
            config_path,
        )?)?);
    }

    for config_option in config_options {
        config_update.merge(BackendConfigUpdate::from_toml(&config_option)?);
    }

    let config = config_update.config();

    let risk = match matches.value_of("risk") {
        Some(risk) => Some(
            risk.parse::<f64>()
                .map_err(|_| anyhow!("Invalid risk '{}' given to --risk", risk))?,
        ),
        None => None,
    };

    let mut formula = CnfFormula::new();

    let stdin = io::stdin();
    formula.read(input_source(matches, &stdin))?;
    formula.assume(assumptions(matches)?)?;

    log::info!(
        "Loaded formula with {} variables and {} clauses",
        formula.var_count(),
        formula.len()
    );

    match matches.value_of("MODE") {
        Some("witness") => match config.witness_backend().witness(&mut formula)? {
            Some(model) => {
                println!("{}", SAT_MARKER);
                print_model(&mut io::stdout(), "v", &model)?;
                Ok(SAT_EXIT_CODE)
            }
            None => {
                println!("{}", UNSAT_MARKER);
                Ok(UNSAT_EXIT_CODE)
            }
        },
        Some("count") => {
            let count = match risk {
                Some(risk) => config.probabilistic_counter(risk)?.count(&mut formula)?,
                None => config.exact_counter()?.count(&mut formula)?,
            };
            println!("s mc {}", count);
            Ok(0)
        }
        Some("enumerate") => {
            let stdout = io::stdout();
            let mut stdout = stdout.lock();
            let mut models = Enumerator::start(config.enumerate_command(), &mut formula)?;
            while let Some(model) = models.next_model()? {
                print_model(&mut stdout, "", &model)?;
            }
            Ok(0)
        }
        mode => Err(anyhow!("Unknown mode {:?}", mode)),
    }
}
