pub mod config;
pub mod engine;
pub mod fitness;
pub mod genome;
pub mod harness;
pub mod mutator;
pub mod oracle;
pub mod population;

pub use config::{ConfigError, DarwinConfig, EngineConfig, HarnessType};
pub use engine::{
    CancelHandle, EngineError, EngineState, EvolutionEngine, GenerationStats, ProgressReporter,
    RunReport, TerminationReason,
};
pub use fitness::{FitnessEvaluator, FitnessMetric, MetricKind};
pub use genome::{CrossoverPoint, Genome, GenomeBounds};
pub use harness::{
    CommandHarness, CommandHarnessConfig, CostSource, Harness, InProcessHarness, InputDelivery,
    InputEncoding, Measurement, MeasurementStatus, StopToken,
};
pub use mutator::{Crossover, Mutator, PointMutator, SpliceCrossover};
pub use oracle::{CrashFinding, CrashOracle, Oracle};
pub use population::{Population, ScoredGenome};
