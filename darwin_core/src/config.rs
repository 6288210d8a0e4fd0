use crate::fitness::{DEFAULT_COST_CAP, FitnessEvaluator, MetricKind};
use crate::genome::{CrossoverPoint, GenomeBounds};
use crate::harness::{CommandHarnessConfig, CostSource, InputDelivery, InputEncoding};
use crate::population::DEFAULT_ELITE_SIZE;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// A configuration value the engine refuses to start with.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("Missing `{0}` section for the selected harness type")]
    MissingSection(&'static str),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidField {
        field,
        reason: reason.into(),
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigInputDelivery {
    #[default]
    StdIn,
    File {
        template: String,
    },
}

impl From<ConfigInputDelivery> for InputDelivery {
    fn from(delivery: ConfigInputDelivery) -> Self {
        match delivery {
            ConfigInputDelivery::StdIn => InputDelivery::StdIn,
            ConfigInputDelivery::File { template } => InputDelivery::File(template),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct CommandHarnessSettings {
    pub command: Vec<String>,
    #[serde(default)]
    pub input_delivery: ConfigInputDelivery,
    #[serde(default)]
    pub encoding: InputEncoding,
    #[serde(default)]
    pub cost_source: CostSource,
    pub working_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum HarnessType {
    #[default]
    InProcess,
    Command,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct InProcessHarnessSettings {
    /// Name of a target the embedding binary knows how to build.
    #[serde(default = "default_target")]
    pub target: String,
    pub work_limit: Option<u64>,
    /// Timed-out targets allowed to keep running before evaluations fail.
    pub max_abandoned: Option<usize>,
}

fn default_target() -> String {
    "bubble-sort".to_string()
}

impl Default for InProcessHarnessSettings {
    fn default() -> Self {
        Self {
            target: default_target(),
            work_limit: None,
            max_abandoned: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct HarnessSettings {
    #[serde(default)]
    pub harness_type: HarnessType,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub in_process_settings: Option<InProcessHarnessSettings>,
    #[serde(default)]
    pub command_settings: Option<CommandHarnessSettings>,
}

fn default_timeout_ms() -> u64 {
    1000
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            harness_type: HarnessType::InProcess,
            timeout_ms: default_timeout_ms(),
            in_process_settings: Some(InProcessHarnessSettings::default()),
            command_settings: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct FitnessSettings {
    #[serde(default)]
    pub metric: MetricKind,
    #[serde(default = "default_cost_cap")]
    pub cost_cap: f64,
}

fn default_cost_cap() -> f64 {
    DEFAULT_COST_CAP
}

impl Default for FitnessSettings {
    fn default() -> Self {
        Self {
            metric: MetricKind::default(),
            cost_cap: default_cost_cap(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct SearchSettings {
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    #[serde(default = "default_generations")]
    pub generations: usize,
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    #[serde(default = "default_survivor_fraction")]
    pub survivor_fraction: f64,
    #[serde(default = "default_elite_size")]
    pub elite_size: usize,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub fitness_threshold: Option<f64>,
    #[serde(default)]
    pub crossover_point: CrossoverPoint,
    #[serde(default)]
    pub length_mutation_rate: f64,
    /// Evaluation worker threads; `0` means the available parallelism.
    #[serde(default)]
    pub workers: usize,
    #[serde(default = "default_report_every")]
    pub report_every: usize,
    #[serde(default)]
    pub stop_on_crash: bool,
}

pub fn default_population_size() -> usize {
    50
}
pub fn default_generations() -> usize {
    100
}
fn default_mutation_rate() -> f64 {
    0.1
}
fn default_survivor_fraction() -> f64 {
    0.5
}
fn default_elite_size() -> usize {
    DEFAULT_ELITE_SIZE
}
fn default_report_every() -> usize {
    10
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            generations: default_generations(),
            mutation_rate: default_mutation_rate(),
            survivor_fraction: default_survivor_fraction(),
            elite_size: default_elite_size(),
            seed: 0,
            fitness_threshold: None,
            crossover_point: CrossoverPoint::default(),
            length_mutation_rate: 0.0,
            workers: 0,
            report_every: default_report_every(),
            stop_on_crash: false,
        }
    }
}

/// Top-level configuration file layout.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct DarwinConfig {
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub genome: GenomeBounds,
    #[serde(default)]
    pub fitness: FitnessSettings,
    #[serde(default)]
    pub harness: HarnessSettings,
}

impl DarwinConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;
        Self::from_toml_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from config file {:?}: {}", path, e)
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Checks every section relevant to the selected harness type.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine_config()?.validate()?;
        self.fitness_evaluator()?;
        if self.harness.harness_type == HarnessType::Command {
            self.command_harness_config()?;
        }
        Ok(())
    }

    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let search = &self.search;
        let config = EngineConfig {
            population_size: search.population_size,
            generations: search.generations,
            mutation_rate: search.mutation_rate,
            length_mutation_rate: search.length_mutation_rate,
            survivor_fraction: search.survivor_fraction,
            elite_size: search.elite_size,
            crossover_point: search.crossover_point,
            bounds: self.genome,
            timeout: Duration::from_millis(self.harness.timeout_ms),
            seed: search.seed,
            fitness_threshold: search.fitness_threshold,
            workers: search.workers,
            report_every: search.report_every,
            stop_on_crash: search.stop_on_crash,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn fitness_evaluator(&self) -> Result<FitnessEvaluator, ConfigError> {
        let cap = self.fitness.cost_cap;
        if !(cap.is_finite() && cap > 0.0) {
            return Err(invalid("cost_cap", format!("must be finite and > 0, got {cap}")));
        }
        Ok(FitnessEvaluator::new(self.fitness.metric).with_cost_cap(cap))
    }

    pub fn command_harness_config(&self) -> Result<CommandHarnessConfig, ConfigError> {
        let settings = self
            .harness
            .command_settings
            .as_ref()
            .ok_or(ConfigError::MissingSection("harness.command-settings"))?;
        if settings.command.is_empty() || settings.command[0].trim().is_empty() {
            return Err(invalid("command", "must name a program to run"));
        }
        Ok(CommandHarnessConfig {
            command: settings.command.clone(),
            input_delivery: settings.input_delivery.clone().into(),
            encoding: settings.encoding,
            cost_source: settings.cost_source,
            working_dir: settings.working_dir.clone(),
        })
    }
}

/// Validated knobs of one search run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub population_size: usize,
    pub generations: usize,
    pub mutation_rate: f64,
    pub length_mutation_rate: f64,
    pub survivor_fraction: f64,
    pub elite_size: usize,
    pub crossover_point: CrossoverPoint,
    pub bounds: GenomeBounds,
    pub timeout: Duration,
    pub seed: u64,
    pub fitness_threshold: Option<f64>,
    pub workers: usize,
    pub report_every: usize,
    pub stop_on_crash: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let search = SearchSettings::default();
        Self {
            population_size: search.population_size,
            generations: search.generations,
            mutation_rate: search.mutation_rate,
            length_mutation_rate: search.length_mutation_rate,
            survivor_fraction: search.survivor_fraction,
            elite_size: search.elite_size,
            crossover_point: search.crossover_point,
            bounds: GenomeBounds::default(),
            timeout: Duration::from_millis(default_timeout_ms()),
            seed: search.seed,
            fitness_threshold: search.fitness_threshold,
            workers: search.workers,
            report_every: search.report_every,
            stop_on_crash: search.stop_on_crash,
        }
    }
}

fn check_probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, format!("must be within [0, 1], got {value}")))
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size == 0 {
            return Err(invalid("population_size", "must be greater than 0"));
        }
        if self.generations == 0 {
            return Err(invalid("generations", "must be greater than 0"));
        }
        check_probability("mutation_rate", self.mutation_rate)?;
        check_probability("length_mutation_rate", self.length_mutation_rate)?;
        if !(self.survivor_fraction > 0.0 && self.survivor_fraction <= 1.0) {
            return Err(invalid(
                "survivor_fraction",
                format!("must be within (0, 1], got {}", self.survivor_fraction),
            ));
        }
        if self.elite_size == 0 {
            return Err(invalid("elite_size", "must be greater than 0"));
        }
        let b = &self.bounds;
        if b.min_len > b.max_len {
            return Err(invalid(
                "min_len",
                format!("min_len ({}) exceeds max_len ({})", b.min_len, b.max_len),
            ));
        }
        if b.min_val > b.max_val {
            return Err(invalid(
                "min_val",
                format!("min_val ({}) exceeds max_val ({})", b.min_val, b.max_val),
            ));
        }
        if self.timeout.is_zero() {
            return Err(invalid("timeout", "must be greater than 0"));
        }
        if let Some(threshold) = self.fitness_threshold {
            if threshold.is_nan() {
                return Err(invalid("fitness_threshold", "must be a number"));
            }
        }
        if self.report_every == 0 {
            return Err(invalid("report_every", "must be greater than 0"));
        }
        Ok(())
    }
}
