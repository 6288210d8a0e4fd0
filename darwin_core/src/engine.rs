//! The evolution controller: owns the population and the random stream and
//! drives generations until a termination condition holds.

use crate::config::{ConfigError, EngineConfig};
use crate::fitness::FitnessEvaluator;
use crate::genome::Genome;
use crate::harness::{Harness, Measurement, MeasurementStatus};
use crate::mutator::{PointMutator, SpliceCrossover};
use crate::oracle::{CrashFinding, CrashOracle, Oracle};
use crate::population::{Population, ScoredGenome};
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Errors that end a run.
///
/// Target misbehavior never shows up here; it is recorded per genome in the
/// measurements and crash findings instead.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration rejected: {0}")]
    Config(#[from] ConfigError),
    /// An internal consistency check failed. This is a defect in the engine,
    /// not in the target.
    #[error("Invariant violated in generation {generation}: {detail} (offending genome: {genome:?})")]
    InvariantViolation {
        generation: usize,
        detail: String,
        genome: Option<Genome>,
    },
    #[error("Failed to build evaluation worker pool: {0}")]
    WorkerPool(String),
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationReason {
    MaxGenerations,
    ThresholdMet,
    Cancelled,
    CrashFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Initializing,
    Running { generation: usize },
    Terminated(TerminationReason),
}

/// Receives the best-so-far result once per reported generation.
pub trait ProgressReporter {
    fn on_generation(&mut self, generation: usize, best_fitness: f64, best_genome: &Genome);
}

impl<F> ProgressReporter for F
where
    F: FnMut(usize, f64, &Genome),
{
    fn on_generation(&mut self, generation: usize, best_fitness: f64, best_genome: &Genome) {
        self(generation, best_fitness, best_genome)
    }
}

/// Shared flag that asks a running engine to stop at the next generation
/// boundary. The generation in flight is always completed and recorded.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct GenerationStats {
    pub generation: usize,
    pub best_fitness: f64,
    pub best_ever_fitness: f64,
    pub mean_fitness: f64,
    pub completed: usize,
    pub timed_out: usize,
    pub crashed: usize,
    pub resource_exceeded: usize,
    pub harness_errors: usize,
}

impl GenerationStats {
    fn collect(generation: usize, population: &Population, best_ever_fitness: f64) -> Self {
        let members = population.members();
        let mut stats = GenerationStats {
            generation,
            best_fitness: population.best().map_or(0.0, |b| b.fitness),
            best_ever_fitness,
            mean_fitness: members.iter().map(|m| m.fitness).sum::<f64>()
                / members.len().max(1) as f64,
            ..Default::default()
        };
        for member in members {
            match member.measurement.status {
                MeasurementStatus::Completed => stats.completed += 1,
                MeasurementStatus::TimedOut => stats.timed_out += 1,
                MeasurementStatus::Crashed(_) => stats.crashed += 1,
                MeasurementStatus::ResourceExceeded(_) => stats.resource_exceeded += 1,
                MeasurementStatus::HarnessError(_) => stats.harness_errors += 1,
            }
        }
        stats
    }
}

/// Everything a finished run exposes.
#[derive(Serialize, Debug, Clone)]
pub struct RunReport {
    pub best: ScoredGenome,
    pub termination: TerminationReason,
    pub generations_run: usize,
    pub crash_findings: Vec<CrashFinding>,
    pub history: Vec<GenerationStats>,
    pub evaluations: usize,
}

impl RunReport {
    pub fn best_genome(&self) -> &Genome {
        &self.best.genome
    }

    pub fn best_fitness(&self) -> f64 {
        self.best.fitness
    }
}

/// Genetic search over genomes, evaluated through a [`Harness`].
///
/// The engine is the single owner of the seeded random stream; every
/// stochastic step (initial population, parent picks, crossover, mutation)
/// draws from it sequentially, while harness calls run in a bounded worker
/// pool and never touch it. Two engines built from equal configurations and
/// deterministic targets therefore produce identical runs.
pub struct EvolutionEngine<H: Harness> {
    config: EngineConfig,
    harness: H,
    evaluator: FitnessEvaluator,
    oracle: Box<dyn Oracle>,
    crossover: SpliceCrossover,
    mutator: PointMutator,
    rng: ChaCha8Rng,
    pool: rayon::ThreadPool,
    cancel: CancelHandle,
    state: EngineState,
}

impl<H: Harness> EvolutionEngine<H> {
    pub fn new(
        config: EngineConfig,
        harness: H,
        evaluator: FitnessEvaluator,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let cap = evaluator.cost_cap();
        if !(cap.is_finite() && cap > 0.0) {
            return Err(ConfigError::InvalidField {
                field: "cost_cap",
                reason: format!("must be finite and > 0, got {cap}"),
            }
            .into());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("darwin-eval-{i}"))
            .build()
            .map_err(|e| EngineError::WorkerPool(e.to_string()))?;

        Ok(Self {
            crossover: SpliceCrossover::new(config.crossover_point, config.bounds),
            mutator: PointMutator::new(config.mutation_rate, config.bounds)
                .with_length_mutation(config.length_mutation_rate),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            oracle: Box::new(CrashOracle::new()),
            cancel: CancelHandle::default(),
            state: EngineState::Initializing,
            config,
            harness,
            evaluator,
            pool,
        })
    }

    /// Replaces the default [`CrashOracle`].
    pub fn with_oracle(mut self, oracle: Box<dyn Oracle>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs the search to completion and returns its report.
    ///
    /// Consumes the engine: a terminated run cannot be resumed or altered.
    pub fn run<P: ProgressReporter>(mut self, mut reporter: P) -> Result<RunReport, EngineError> {
        log::info!(
            "Starting search: population {}, up to {} generations, seed {}, {} workers",
            self.config.population_size,
            self.config.generations,
            self.config.seed,
            self.pool.current_num_threads()
        );

        let mut genomes = self.initial_genomes();
        let mut best: Option<ScoredGenome> = None;
        let mut crash_findings: Vec<CrashFinding> = Vec::new();
        let mut seen_crashes: HashSet<String> = HashSet::new();
        let mut history: Vec<GenerationStats> = Vec::new();
        let mut evaluations = 0;
        let mut generation = 0;

        let termination = loop {
            self.state = EngineState::Running { generation };

            let mut population = self.evaluate(genomes);
            evaluations += population.len();

            let mut found_crash = false;
            for member in population.members() {
                if let Some(finding) =
                    self.oracle
                        .examine(&member.genome, &member.measurement, generation)
                {
                    if seen_crashes.insert(finding.input_hash.clone()) {
                        log::warn!(
                            "New crash in generation {generation}: {} (input {:?})",
                            finding.description,
                            finding.genome.elements()
                        );
                        crash_findings.push(finding);
                        found_crash = true;
                    }
                }
            }

            population.rank();
            self.check_invariants(&population, generation)?;

            let generation_best = population.best().cloned().ok_or_else(|| {
                EngineError::InvariantViolation {
                    generation,
                    detail: "population is empty after evaluation".to_string(),
                    genome: None,
                }
            })?;
            // Ties keep the earlier champion.
            if best
                .as_ref()
                .is_none_or(|b| generation_best.fitness > b.fitness)
            {
                best = Some(generation_best);
            }
            let best_ref = best.as_ref().ok_or_else(|| EngineError::InvariantViolation {
                generation,
                detail: "no best genome recorded".to_string(),
                genome: None,
            })?;

            let stats = GenerationStats::collect(generation, &population, best_ref.fitness);
            log::debug!(
                "Generation {generation}: best {:.4}, best ever {:.4}, mean {:.4}, timeouts {}, crashes {}",
                stats.best_fitness,
                stats.best_ever_fitness,
                stats.mean_fitness,
                stats.timed_out,
                stats.crashed
            );
            history.push(stats);

            let mut reason = self.termination_reason(generation, found_crash, best_ref.fitness);
            let reported = reason.is_some() || generation % self.config.report_every == 0;
            if reported {
                reporter.on_generation(generation, best_ref.fitness, &best_ref.genome);
            }
            // The reporter may have cancelled; this generation is then the last.
            if reason.is_none() && self.cancel.is_cancelled() {
                reason = Some(TerminationReason::Cancelled);
                if !reported {
                    reporter.on_generation(generation, best_ref.fitness, &best_ref.genome);
                }
            }
            if let Some(reason) = reason {
                break reason;
            }

            let survivors = population.select_survivors(self.config.survivor_fraction);
            genomes = Population::refill(
                survivors,
                self.config.population_size,
                self.config.elite_size,
                &mut self.rng,
                &self.crossover,
                &self.mutator,
                &self.config.bounds,
            );
            generation += 1;
        };

        self.state = EngineState::Terminated(termination);
        let best = best.ok_or_else(|| EngineError::InvariantViolation {
            generation,
            detail: "run ended without evaluating any genome".to_string(),
            genome: None,
        })?;
        log::info!(
            "Search terminated ({termination:?}) after {} generations: best fitness {:.4}, {} crash findings",
            generation + 1,
            best.fitness,
            crash_findings.len()
        );

        Ok(RunReport {
            best,
            termination,
            generations_run: generation + 1,
            crash_findings,
            history,
            evaluations,
        })
    }

    fn initial_genomes(&mut self) -> Vec<Genome> {
        (0..self.config.population_size)
            .map(|_| Genome::random(&mut self.rng, &self.config.bounds))
            .collect()
    }

    /// Evaluates every genome in the worker pool. Results keep the order of
    /// `genomes`, so completion order never influences ranking.
    fn evaluate(&self, genomes: Vec<Genome>) -> Population {
        let harness = &self.harness;
        let evaluator = &self.evaluator;
        let timeout = self.config.timeout;

        let scored: Vec<(Genome, f64, Measurement)> = self.pool.install(|| {
            genomes
                .into_par_iter()
                .map(|genome| {
                    let measurement = harness.evaluate(&genome, timeout);
                    let fitness = evaluator.score(&measurement, &genome);
                    (genome, fitness, measurement)
                })
                .collect()
        });
        Population::from_scored(scored)
    }

    fn check_invariants(&self, population: &Population, generation: usize) -> Result<(), EngineError> {
        if population.len() != self.config.population_size {
            return Err(EngineError::InvariantViolation {
                generation,
                detail: format!(
                    "population size drifted to {} (expected {})",
                    population.len(),
                    self.config.population_size
                ),
                genome: None,
            });
        }
        if let Some(member) = population
            .members()
            .iter()
            .find(|m| !self.config.bounds.contains(&m.genome))
        {
            return Err(EngineError::InvariantViolation {
                generation,
                detail: format!("genome outside {:?}", self.config.bounds),
                genome: Some(member.genome.clone()),
            });
        }
        Ok(())
    }

    fn termination_reason(
        &self,
        generation: usize,
        found_crash: bool,
        best_fitness: f64,
    ) -> Option<TerminationReason> {
        if found_crash && self.config.stop_on_crash {
            Some(TerminationReason::CrashFound)
        } else if self
            .config
            .fitness_threshold
            .is_some_and(|threshold| best_fitness >= threshold)
        {
            Some(TerminationReason::ThresholdMet)
        } else if generation + 1 >= self.config.generations {
            Some(TerminationReason::MaxGenerations)
        } else if self.cancel.is_cancelled() {
            Some(TerminationReason::Cancelled)
        } else {
            None
        }
    }
}
