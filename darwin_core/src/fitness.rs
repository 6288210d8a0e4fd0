use crate::genome::Genome;
use crate::harness::{Measurement, MeasurementStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default ceiling applied to every fitness score.
pub const DEFAULT_COST_CAP: f64 = 1e12;

/// Built-in scoring formulas selectable from configuration.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MetricKind {
    /// The harness cost alone. Reproducible when the cost is a work counter.
    #[default]
    CostOnly,
    /// Elapsed wall-clock time in microseconds. Noisy under load.
    TimeOnly,
    /// `cost * elapsed seconds`: slow and expensive at once.
    CostTimesTime,
}

pub type CustomScore = Arc<dyn Fn(&Measurement, &Genome) -> f64 + Send + Sync>;

#[derive(Clone)]
pub enum FitnessMetric {
    Builtin(MetricKind),
    Custom(CustomScore),
}

impl fmt::Debug for FitnessMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitnessMetric::Builtin(kind) => f.debug_tuple("Builtin").field(kind).finish(),
            FitnessMetric::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<MetricKind> for FitnessMetric {
    fn from(kind: MetricKind) -> Self {
        FitnessMetric::Builtin(kind)
    }
}

/// Turns harness measurements into comparable fitness scores.
///
/// Scores live in `[0, cost_cap]` and are never NaN. Crashes, timeouts and
/// resource exhaustion score exactly `cost_cap`: each is a finding in its own
/// right, and a timeout's cost is only a lower bound. A harness error scores
/// zero, as does a completed run on an empty genome, so the search cannot
/// drift toward trivial inputs.
#[derive(Debug, Clone)]
pub struct FitnessEvaluator {
    metric: FitnessMetric,
    cost_cap: f64,
}

impl Default for FitnessEvaluator {
    fn default() -> Self {
        Self::new(MetricKind::default())
    }
}

impl FitnessEvaluator {
    pub fn new(metric: impl Into<FitnessMetric>) -> Self {
        Self {
            metric: metric.into(),
            cost_cap: DEFAULT_COST_CAP,
        }
    }

    pub fn custom<F>(score: F) -> Self
    where
        F: Fn(&Measurement, &Genome) -> f64 + Send + Sync + 'static,
    {
        Self::new(FitnessMetric::Custom(Arc::new(score)))
    }

    pub fn with_cost_cap(mut self, cost_cap: f64) -> Self {
        self.cost_cap = cost_cap;
        self
    }

    pub fn cost_cap(&self) -> f64 {
        self.cost_cap
    }

    pub fn metric(&self) -> &FitnessMetric {
        &self.metric
    }

    pub fn score(&self, measurement: &Measurement, genome: &Genome) -> f64 {
        match measurement.status {
            MeasurementStatus::Crashed(_)
            | MeasurementStatus::TimedOut
            | MeasurementStatus::ResourceExceeded(_) => return self.cost_cap,
            MeasurementStatus::HarnessError(_) => return 0.0,
            MeasurementStatus::Completed => {}
        }
        if genome.is_empty() {
            return 0.0;
        }

        let cost = measurement.cost.max(0.0);
        let raw = match &self.metric {
            FitnessMetric::Builtin(MetricKind::CostOnly) => cost,
            FitnessMetric::Builtin(MetricKind::TimeOnly) => {
                measurement.elapsed.as_secs_f64() * 1_000_000.0
            }
            FitnessMetric::Builtin(MetricKind::CostTimesTime) => {
                cost * measurement.elapsed.as_secs_f64()
            }
            FitnessMetric::Custom(score) => score(measurement, genome),
        };

        if raw.is_nan() {
            0.0
        } else {
            raw.clamp(0.0, self.cost_cap)
        }
    }
}
