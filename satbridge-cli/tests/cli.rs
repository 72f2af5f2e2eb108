//! Drives the `satbridge` binary as witness, counting and enumeration backend.
use std::collections::{BTreeSet, HashSet};
use std::io::Write;
use std::process::Command;

use anyhow::Error;
use num_bigint::BigUint;
use tempfile::NamedTempFile;

use satbridge::config::MC_PATTERN;
use satbridge::{
    BackendCommand, CnfFormula, Enumerator, EnumeratorState, ExactCounter, ExtendFormula, Lit,
    ProbabilisticCounter, ReadFormula, Var, WitnessBackend,
};

const BINARY: &str = env!("CARGO_BIN_EXE_satbridge");

/// Three independent binary clauses over six variables.
const PAIRS: &str = "c three pairs\np cnf 6 3\n1 2 0\n3 4 0\n5 6 0\n";
/// A single tautological clause leaving all six variables free.
const FREE: &str = "p cnf 6 1\n1 2 3 4 5 6 -1 0\n";
/// Like `PAIRS` with the first pair exclusive.
const EXCLUSIVE: &str = "1 2 0 -1 -2 0\n3 4 0\n5\n6 0\n";
/// Three variables with 4 models.
const BASE: &str = "p cnf 3 2\n1 2 0\n-2 3 0\n";
/// `BASE` on the odd variables, constrained but never blocked by the even ones.
const SPREAD: &str = "p cnf 6 4\n1 3 0\n-3 5 0\n2 4 0\n1 6 0\n";
const UNSAT: &str = "p cnf 2 3\n1 2 0\n-1 0\n-2 0\n";

const FIXTURES: &[(&str, u32)] = &[
    (PAIRS, 27),
    (FREE, 64),
    (EXCLUSIVE, 18),
    (BASE, 4),
    (SPREAD, 21),
    (UNSAT, 0),
];

fn binary(args: &[&str]) -> BackendCommand {
    args.iter()
        .fold(BackendCommand::new(BINARY), |command, &arg| command.arg(arg))
}

fn formula(text: &str) -> Result<CnfFormula, Error> {
    let mut formula = CnfFormula::new();
    formula.read(text)?;
    Ok(formula)
}

fn satisfies(formula: &CnfFormula, model: &[Lit]) -> bool {
    formula
        .iter()
        .all(|clause| clause.iter().any(|lit| model.contains(lit)))
}

#[test]
fn exact_and_probabilistic_counts_agree() -> Result<(), Error> {
    let exact = ExactCounter::new(binary(&["--count"]), MC_PATTERN)?;

    for &(text, expected) in FIXTURES {
        let mut formula = formula(text)?;
        assert_eq!(exact.count(&mut formula)?, BigUint::from(expected));

        for &risk in [0.2, 0.05].iter() {
            let counter =
                ProbabilisticCounter::new(binary(&["--count"]), MC_PATTERN, "--delta", risk)?;
            assert_eq!(counter.count(&mut formula)?, BigUint::from(expected));
        }
    }
    Ok(())
}

#[test]
fn witnesses_satisfy_their_formula() -> Result<(), Error> {
    let backend = WitnessBackend::new(binary(&[]));

    for &(text, expected) in FIXTURES {
        let mut formula = formula(text)?;
        match backend.witness(&mut formula)? {
            Some(model) => {
                assert!(expected > 0);
                assert_eq!(model.len(), formula.var_count());
                assert!(satisfies(&formula, &model));
            }
            None => assert_eq!(expected, 0),
        }
    }
    Ok(())
}

#[test]
fn witness_under_assumptions() -> Result<(), Error> {
    let backend = WitnessBackend::new(binary(&[]));
    let mut formula = formula(EXCLUSIVE)?;

    formula.assume(vec![1, -3])?;
    let model = backend.witness(&mut formula)?.unwrap();
    assert!(model.contains(&Lit::from_dimacs(-2)));
    assert!(model.contains(&Lit::from_dimacs(4)));

    formula.assume(vec![1, 2])?;
    assert_eq!(backend.witness(&mut formula)?, None);

    assert!(backend.witness(&mut formula)?.is_some());
    Ok(())
}

#[test]
fn assumptions_do_not_leak_between_counts() -> Result<(), Error> {
    let exact = ExactCounter::new(binary(&["--count"]), MC_PATTERN)?;
    let mut formula = formula(PAIRS)?;

    formula.assume(vec![-1])?;
    assert_eq!(exact.count(&mut formula)?, BigUint::from(9u32));
    assert_eq!(formula.var_count(), 6);

    assert_eq!(exact.count(&mut formula)?, BigUint::from(27u32));
    assert_eq!(formula.var_count(), 6);

    // Variables 7 and 8 are free while 9 is assumed
    formula.assume(vec![9])?;
    assert_eq!(exact.count(&mut formula)?, BigUint::from(108u32));
    assert_eq!(formula.var_count(), 6);

    assert_eq!(exact.count(&mut formula)?, BigUint::from(27u32));
    Ok(())
}

#[test]
fn enumerated_models_match_counts() -> Result<(), Error> {
    let command = binary(&["--enumerate"]);

    for &(text, expected) in FIXTURES {
        let mut formula = formula(text)?;

        let mut models = Enumerator::start(&command, &mut formula)?;
        let listed: HashSet<Vec<Lit>> = models.list()?.into_iter().collect();
        assert_eq!(models.state(), EnumeratorState::Exhausted);

        let streamed: HashSet<Vec<Lit>> =
            Enumerator::start(&command, &mut formula)?.collect::<Result<_, _>>()?;

        assert_eq!(listed.len(), expected as usize);
        assert_eq!(listed, streamed);
        for model in listed.iter() {
            assert!(satisfies(&formula, model));
        }
    }
    Ok(())
}

#[test]
fn projection_onto_odd_variables() -> Result<(), Error> {
    let command = binary(&["--enumerate"]);

    let base: BTreeSet<Vec<Lit>> = Enumerator::start(&command, &mut formula(BASE)?)?
        .collect::<Result<_, _>>()?;

    let spread = Enumerator::start(&command, &mut formula(SPREAD)?)?.list()?;
    assert_eq!(spread.len(), 21);

    let projected: BTreeSet<Vec<Lit>> = spread
        .iter()
        .map(|model| {
            model
                .iter()
                .filter(|lit| lit.index() % 2 == 0)
                .map(|&lit| Var::from_index(lit.index() / 2).lit(lit.is_positive()))
                .collect()
        })
        .collect();

    assert_eq!(base.len(), 4);
    assert_eq!(projected, base);
    Ok(())
}

#[test]
fn canceled_enumeration() -> Result<(), Error> {
    let mut models = Enumerator::start(&binary(&["--enumerate"]), &mut formula(FREE)?)?;

    assert!(models.next_model()?.is_some());
    models.cancel()?;
    models.cancel()?;
    assert_eq!(models.state(), EnumeratorState::Canceled);
    assert_eq!(models.next_model()?, None);
    Ok(())
}

fn fixture_file(text: &str) -> Result<NamedTempFile, Error> {
    let mut file = NamedTempFile::new()?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    Ok(file)
}

fn run(args: &[&str]) -> Result<(Option<i32>, String), Error> {
    let output = Command::new(BINARY).args(args).output()?;
    Ok((
        output.status.code(),
        String::from_utf8_lossy(&output.stdout).into_owned(),
    ))
}

#[test]
fn reference_backend_exit_codes() -> Result<(), Error> {
    let sat = fixture_file(PAIRS)?;
    let sat_path = sat.path().to_string_lossy().into_owned();

    let (code, stdout) = run(&[&sat_path])?;
    assert_eq!(code, Some(10));
    assert!(stdout.lines().any(|line| line == "s SATISFIABLE"));
    assert!(stdout.lines().any(|line| line.starts_with("v ") && line.ends_with(" 0")));

    let (code, stdout) = run(&[&sat_path, "--assume=-1", "--assume=-2"])?;
    assert_eq!(code, Some(20));
    assert!(stdout.lines().any(|line| line == "s UNSATISFIABLE"));

    let (code, stdout) = run(&[&sat_path, "--count", "--delta", "0"])?;
    assert_eq!(code, Some(1));
    assert!(!stdout.contains("s mc"));
    Ok(())
}

#[test]
fn run_with_configured_backends() -> Result<(), Error> {
    let input = fixture_file(SPREAD)?;
    let input_path = input.path().to_string_lossy().into_owned();

    let mut config = NamedTempFile::new()?;
    writeln!(config, "[exact_count]")?;
    writeln!(config, "program = {:?}", BINARY)?;
    writeln!(config, "args = [\"--count\"]")?;
    config.flush()?;
    let config_path = config.path().to_string_lossy().into_owned();

    let (code, stdout) = run(&["--run", "count", &input_path, "--config", &config_path])?;
    assert_eq!(code, Some(0));
    assert!(stdout.lines().any(|line| line == "s mc 21"));

    let program_option = format!("enumerate.program = {:?}", BINARY);
    let (code, stdout) = run(&[
        "--run",
        "enumerate",
        &input_path,
        "-C",
        &program_option,
        "-C",
        r#"enumerate.args = ["--enumerate"]"#,
        "--assume=-1",
    ])?;
    assert_eq!(code, Some(0));
    // -1 forces 3, 5 and 6, leaving 3 choices for 2 and 4
    let models: Vec<&str> = stdout.lines().filter(|line| !line.starts_with('c')).collect();
    assert_eq!(models.len(), 3);
    assert!(models.iter().all(|line| line.starts_with("-1 ") && line.ends_with(" 0")));

    let witness_option = format!("witness.program = {:?}", BINARY);
    let (code, stdout) = run(&["--run", "witness", &input_path, "-C", &witness_option])?;
    assert_eq!(code, Some(10));
    assert!(stdout.lines().any(|line| line == "s SATISFIABLE"));
    Ok(())
}
