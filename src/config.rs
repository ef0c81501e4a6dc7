use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use std::{
    fmt::Debug,
    fs,
    ops::RangeBounds,
    path::{Path, PathBuf},
};

/// Infection sampling method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum InfectionMethod {
    /// Method one for even run identities, method two for odd ones.
    Both,
    /// Random pairwise encounters.
    One,
    /// Bounded susceptible scan followed by a shuffle.
    Two,
}

/// Run set and loop parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Number of independent runs.
    pub simulations: usize,
    /// Identity of the run when a single run is requested.
    pub identity: usize,
    /// Number of iterations per run.
    pub iterations: usize,
    /// Number of worker threads (`0` uses the available parallelism).
    pub threads: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            simulations: 10,
            identity: 0,
            iterations: 365 * 4,
            threads: 0,
        }
    }
}

/// Initial population.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InitConfig {
    /// Initial number of agents.
    pub n_agents: usize,
    /// Initial number of infectious agents.
    pub n_infections: usize,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            n_agents: 10_000,
            n_infections: 10,
        }
    }
}

/// Per-iteration event parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Growth rate of the non-dead population.
    pub growth: f64,
    /// Number of encounters considered by the infection methods.
    pub encounters: usize,
    /// Death probability of a susceptible agent.
    pub death_prob_susceptible: f64,
    /// Death probability of an infectious agent.
    pub death_prob_infectious: f64,
    /// Recovery probability of an infectious agent.
    pub recovery_prob: f64,
    /// Vaccination probability of a susceptible agent.
    pub vaccination_prob: f64,
    /// Probability of a recovered or vaccinated agent becoming susceptible.
    pub regression_prob: f64,
    /// Infection sampling method.
    pub infection_method: InfectionMethod,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            growth: 0.0001,
            encounters: 100,
            death_prob_susceptible: 0.0001,
            death_prob_infectious: 0.001,
            recovery_prob: 0.01,
            vaccination_prob: 0.001,
            regression_prob: 0.0003,
            infection_method: InfectionMethod::Both,
        }
    }
}

/// Report and dump parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Number of iterations between reports.
    pub report_interval: usize,
    /// Number of iterations between agent dumps (`0` disables dumps).
    pub output_agents: usize,
    /// Template path of the agent dump files.
    pub agent_filename: PathBuf,
    /// Report file (standard output if absent).
    pub report_file: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_interval: 100,
            output_agents: 0,
            agent_filename: PathBuf::from("agents.csv"),
            report_file: None,
        }
    }
}

impl OutputConfig {
    /// Path of the dump written by run `identity` at `iteration`.
    pub fn dump_file(&self, identity: usize, iteration: usize) -> PathBuf {
        let (stem, ext) = self.dump_parts();
        self.agent_filename
            .with_file_name(format!("{stem}-{identity:04}-{iteration:06}.{ext}"))
    }

    /// Glob pattern matching every dump file.
    pub fn dump_pattern(&self) -> PathBuf {
        let (stem, ext) = self.dump_parts();
        self.agent_filename
            .with_file_name(format!("{stem}-*-*.{ext}"))
    }

    fn dump_parts(&self) -> (String, String) {
        let stem = self
            .agent_filename
            .file_stem()
            .map_or_else(|| "agents".into(), |s| s.to_string_lossy().into_owned());
        let ext = self
            .agent_filename
            .extension()
            .map_or_else(|| "csv".into(), |s| s.to_string_lossy().into_owned());
        (stem, ext)
    }
}

/// Simulation configuration parameters.
///
/// Loaded from a TOML file (every key is optional), then overridden by
/// command line flags and validated before use.
/// See [`Config::new`] for loading.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub run: RunConfig,
    pub init: InitConfig,
    pub model: ModelConfig,
    pub output: OutputConfig,
}

/// Command line overrides of configuration values.
#[derive(Debug, Default, Clone, Args)]
pub struct Overrides {
    /// Number of simulations
    #[arg(short, long)]
    pub simulations: Option<usize>,
    /// Identity of the simulation (if running only one)
    #[arg(long)]
    pub identity: Option<usize>,
    /// Number of iterations in a simulation
    #[arg(short, long)]
    pub iterations: Option<usize>,
    /// Number of worker threads (0 = available parallelism)
    #[arg(long)]
    pub threads: Option<usize>,
    /// Number of initial agents
    #[arg(short, long)]
    pub agents: Option<usize>,
    /// Number of initial agents who are infectious
    #[arg(long)]
    pub infections: Option<usize>,
    /// Number of encounters in the infection methods
    #[arg(short, long)]
    pub encounters: Option<usize>,
    /// Growth rate of the agent population per iteration
    #[arg(short, long)]
    pub growth: Option<f64>,
    /// Death probability of a susceptible agent per iteration
    #[arg(long)]
    pub death_prob_susceptible: Option<f64>,
    /// Death probability of an infectious agent per iteration
    #[arg(long)]
    pub death_prob_infectious: Option<f64>,
    /// Probability of an infectious agent recovering per iteration
    #[arg(short, long)]
    pub recovery_prob: Option<f64>,
    /// Probability of a susceptible agent being vaccinated per iteration
    #[arg(short, long)]
    pub vaccination_prob: Option<f64>,
    /// Probability of a recovered or vaccinated agent becoming susceptible per iteration
    #[arg(long)]
    pub regression_prob: Option<f64>,
    /// Infection method to use
    #[arg(long, value_enum, ignore_case = true)]
    pub infection_method: Option<InfectionMethod>,
    /// Number of iterations between reports
    #[arg(long)]
    pub report_interval: Option<usize>,
    /// Iteration frequency to write out agents (0 = never)
    #[arg(long)]
    pub output_agents: Option<usize>,
    /// Agent output file name
    #[arg(long)]
    pub agent_filename: Option<PathBuf>,
    /// Report output file (standard output if absent)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl Config {
    /// Build a [`Config`] from an optional file and command line overrides.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or deserialized,
    /// or if the resulting configuration values are invalid.
    pub fn new<P: AsRef<Path>>(file: Option<P>, overrides: &Overrides) -> Result<Self> {
        let mut config = match file {
            Some(file) => Config::from_file(file)?,
            None => Config::default(),
        };

        config.apply(overrides);

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Load a [`Config`] from a TOML file without validating it.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        Ok(config)
    }

    fn apply(&mut self, ovr: &Overrides) {
        fn set<T: Clone>(dst: &mut T, src: &Option<T>) {
            if let Some(val) = src {
                *dst = val.clone();
            }
        }

        set(&mut self.run.simulations, &ovr.simulations);
        set(&mut self.run.identity, &ovr.identity);
        set(&mut self.run.iterations, &ovr.iterations);
        set(&mut self.run.threads, &ovr.threads);

        set(&mut self.init.n_agents, &ovr.agents);
        set(&mut self.init.n_infections, &ovr.infections);

        set(&mut self.model.growth, &ovr.growth);
        set(&mut self.model.encounters, &ovr.encounters);
        set(&mut self.model.death_prob_susceptible, &ovr.death_prob_susceptible);
        set(&mut self.model.death_prob_infectious, &ovr.death_prob_infectious);
        set(&mut self.model.recovery_prob, &ovr.recovery_prob);
        set(&mut self.model.vaccination_prob, &ovr.vaccination_prob);
        set(&mut self.model.regression_prob, &ovr.regression_prob);
        set(&mut self.model.infection_method, &ovr.infection_method);

        set(&mut self.output.report_interval, &ovr.report_interval);
        set(&mut self.output.output_agents, &ovr.output_agents);
        set(&mut self.output.agent_filename, &ovr.agent_filename);
        if ovr.output.is_some() {
            self.output.report_file = ovr.output.clone();
        }
    }

    /// Check every value against its allowed range.
    pub fn validate(&self) -> Result<()> {
        let n_agents = self.init.n_agents;
        check_num(n_agents, 1..).context("invalid number of agents")?;
        check_num(self.init.n_infections, 0..=n_agents)
            .context("invalid number of infections")?;
        check_num(self.model.encounters, 0..=n_agents).context("invalid number of encounters")?;

        check_num(self.model.growth, 0.0..f64::INFINITY).context("invalid growth rate")?;
        check_prob(self.model.death_prob_susceptible)
            .context("invalid death probability of susceptible agents")?;
        check_prob(self.model.death_prob_infectious)
            .context("invalid death probability of infectious agents")?;
        check_prob(self.model.recovery_prob).context("invalid recovery probability")?;
        check_prob(self.model.vaccination_prob).context("invalid vaccination probability")?;
        check_prob(self.model.regression_prob).context("invalid regression probability")?;

        check_num(self.output.report_interval, 1..).context("invalid report interval")?;
        if self.output.agent_filename.file_name().is_none() {
            bail!("agent filename must name a file");
        }

        Ok(())
    }

    /// Identities of the runs to execute.
    pub fn run_identities(&self) -> Vec<usize> {
        if self.run.simulations <= 1 {
            vec![self.run.identity]
        } else {
            (0..self.run.simulations).collect()
        }
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_prob(prob: f64) -> Result<()> {
    check_num(prob, 0.0..=1.0)
}
