//! Backend configuration.
use serde::Deserialize;

use crate::batch::{ExactCounter, ProbabilisticCounter, WitnessBackend};
use crate::error::Error;
use crate::process::BackendCommand;

/// Pattern matching the `s mc <count>` result line used by common model counters.
pub const MC_PATTERN: &str = r"^s mc (\d+)";

/// An exact model counter backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CounterConfig {
    pub command: BackendCommand,
    /// Regular expression with one capture group for the count.
    pub pattern: String,
}

/// A probabilistic model counter backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbabilisticConfig {
    pub command: BackendCommand,
    /// Regular expression with one capture group for the count.
    pub pattern: String,
    /// Option preceding the risk argument, empty to pass the risk as a bare argument.
    pub risk_flag: String,
}

/// Commands used for the different backend roles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendConfig {
    /// SAT solver for witness search. (Default: varisat)
    pub witness: BackendCommand,
    /// Exact model counter. (Default: ganak)
    pub exact_count: CounterConfig,
    /// Probabilistic model counter. (Default: approxmc --delta)
    pub probabilistic_count: ProbabilisticConfig,
    /// Model enumerator. (Default: satbridge --enumerate)
    pub enumerate: BackendCommand,
}

impl Default for BackendConfig {
    fn default() -> BackendConfig {
        BackendConfig {
            witness: BackendCommand::new("varisat"),
            exact_count: CounterConfig {
                command: BackendCommand::new("ganak"),
                pattern: MC_PATTERN.to_owned(),
            },
            probabilistic_count: ProbabilisticConfig {
                command: BackendCommand::new("approxmc"),
                pattern: MC_PATTERN.to_owned(),
                risk_flag: "--delta".to_owned(),
            },
            enumerate: BackendCommand::new("satbridge").arg("--enumerate"),
        }
    }
}

impl BackendConfig {
    pub fn witness_backend(&self) -> WitnessBackend {
        WitnessBackend::new(self.witness.clone())
    }

    pub fn exact_counter(&self) -> Result<ExactCounter, Error> {
        ExactCounter::new(self.exact_count.command.clone(), &self.exact_count.pattern)
    }

    /// Fails with [`Error::InvalidArgument`] unless `0 < risk < 1`.
    pub fn probabilistic_counter(&self, risk: f64) -> Result<ProbabilisticCounter, Error> {
        let config = &self.probabilistic_count;
        ProbabilisticCounter::new(
            config.command.clone(),
            &config.pattern,
            config.risk_flag.as_str(),
            risk,
        )
    }

    pub fn enumerate_command(&self) -> &BackendCommand {
        &self.enumerate
    }

    /// Description of the configurable options.
    pub fn help() -> &'static str {
        concat!(
            "witness.program = STRING         SAT solver for witness search (default \"varisat\")\n",
            "witness.args = [STRING]          its arguments\n",
            "exact_count.program = STRING     exact model counter (default \"ganak\")\n",
            "exact_count.args = [STRING]      its arguments\n",
            "exact_count.pattern = STRING     result regex with one capture group\n",
            "probabilistic_count.program = STRING\n",
            "                                 probabilistic model counter (default \"approxmc\")\n",
            "probabilistic_count.args = [STRING]\n",
            "probabilistic_count.pattern = STRING\n",
            "probabilistic_count.risk_flag = STRING\n",
            "                                 option preceding the risk (default \"--delta\")\n",
            "enumerate.program = STRING       model enumerator (default \"satbridge\")\n",
            "                                 a program without args runs without arguments\n",
            "enumerate.args = [STRING]        its arguments (default [\"--enumerate\"])\n",
        )
    }
}

/// Partial update of a [`BackendCommand`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandUpdate {
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
}

/// Partial update of a [`CounterConfig`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CounterUpdate {
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    pub pattern: Option<String>,
}

/// Partial update of a [`ProbabilisticConfig`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbabilisticUpdate {
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    pub pattern: Option<String>,
    pub risk_flag: Option<String>,
}

/// Partial update of a [`BackendConfig`], as read from a TOML file or command line option.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfigUpdate {
    pub witness: Option<CommandUpdate>,
    pub exact_count: Option<CounterUpdate>,
    pub probabilistic_count: Option<ProbabilisticUpdate>,
    pub enumerate: Option<CommandUpdate>,
}

fn merge_option<T>(target: &mut Option<T>, update: Option<T>) {
    if update.is_some() {
        *target = update;
    }
}

fn apply_option<T: Clone>(target: &mut T, update: &Option<T>) {
    if let Some(value) = update {
        *target = value.clone();
    }
}

/// A program without arguments replaces the arguments of the program it overrides.
fn apply_command(
    command: &mut BackendCommand,
    program: &Option<String>,
    args: &Option<Vec<String>>,
) {
    if program.is_some() && args.is_none() {
        command.args.clear();
    }
    apply_option(&mut command.program, program);
    apply_option(&mut command.args, args);
}

impl CommandUpdate {
    fn merge(&mut self, other: CommandUpdate) {
        merge_option(&mut self.program, other.program);
        merge_option(&mut self.args, other.args);
    }
}

impl CounterUpdate {
    fn merge(&mut self, other: CounterUpdate) {
        merge_option(&mut self.program, other.program);
        merge_option(&mut self.args, other.args);
        merge_option(&mut self.pattern, other.pattern);
    }
}

impl ProbabilisticUpdate {
    fn merge(&mut self, other: ProbabilisticUpdate) {
        merge_option(&mut self.program, other.program);
        merge_option(&mut self.args, other.args);
        merge_option(&mut self.pattern, other.pattern);
        merge_option(&mut self.risk_flag, other.risk_flag);
    }
}

macro_rules! merge_role {
    ($target:expr, $update:expr) => {
        match (&mut $target, $update) {
            (Some(target), Some(update)) => target.merge(update),
            (target, update @ Some(_)) => *target = update,
            _ => (),
        }
    };
}

impl BackendConfigUpdate {
    /// Create an empty update.
    pub fn new() -> BackendConfigUpdate {
        BackendConfigUpdate::default()
    }

    /// Parse an update from TOML.
    ///
    /// Single options can be given using dotted keys, e.g. `exact_count.program = "sharpSAT"`.
    pub fn from_toml(input: &str) -> Result<BackendConfigUpdate, toml::de::Error> {
        toml::from_str(input)
    }

    /// Merge configuration values from `other`, values in `other` take precedence.
    pub fn merge(&mut self, other: BackendConfigUpdate) {
        merge_role!(self.witness, other.witness);
        merge_role!(self.exact_count, other.exact_count);
        merge_role!(self.probabilistic_count, other.probabilistic_count);
        merge_role!(self.enumerate, other.enumerate);
    }

    /// Overwrite the values of `config` that are present in this update.
    ///
    /// Overriding a role's program without giving its arguments clears the arguments.
    pub fn apply(&self, config: &mut BackendConfig) {
        if let Some(update) = &self.witness {
            apply_command(&mut config.witness, &update.program, &update.args);
        }
        if let Some(update) = &self.exact_count {
            apply_command(&mut config.exact_count.command, &update.program, &update.args);
            apply_option(&mut config.exact_count.pattern, &update.pattern);
        }
        if let Some(update) = &self.probabilistic_count {
            let target = &mut config.probabilistic_count;
            apply_command(&mut target.command, &update.program, &update.args);
            apply_option(&mut target.pattern, &update.pattern);
            apply_option(&mut target.risk_flag, &update.risk_flag);
        }
        if let Some(update) = &self.enumerate {
            apply_command(&mut config.enumerate, &update.program, &update.args);
        }
    }

    /// The default configuration with this update applied.
    pub fn config(&self) -> BackendConfig {
        let mut config = BackendConfig::default();
        self.apply(&mut config);
        config
    }
}
