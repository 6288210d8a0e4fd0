use crate::genome::{CrossoverPoint, Genome, GenomeBounds};
use rand::Rng;

/// A `Mutator` turns one genome into a new, possibly perturbed genome.
///
/// Mutators never modify their input. Every randomized decision is drawn from
/// the `rng` handed in by the caller, so a run stays reproducible as long as
/// the caller owns a single seeded generator.
///
/// # Type Parameters
/// * `R`: The type of random number generator used for mutation decisions.
pub trait Mutator<R: Rng + ?Sized> {
    /// Produces a mutated copy of `genome`.
    fn mutate(&self, genome: &Genome, rng: &mut R) -> Genome;
}

/// A `Crossover` combines two parent genomes into one offspring.
pub trait Crossover<R: Rng + ?Sized> {
    /// Produces an offspring from `parent_a` and `parent_b`.
    fn crossover(&self, parent_a: &Genome, parent_b: &Genome, rng: &mut R) -> Genome;
}

/// Per-element point mutation with optional insert/delete of a single element.
///
/// Each element is replaced with probability `mutation_rate`. Length mutation
/// is off unless `length_mutation_rate` is positive.
#[derive(Debug, Clone, Copy)]
pub struct PointMutator {
    pub mutation_rate: f64,
    pub length_mutation_rate: f64,
    pub bounds: GenomeBounds,
}

impl PointMutator {
    pub fn new(mutation_rate: f64, bounds: GenomeBounds) -> Self {
        Self {
            mutation_rate,
            length_mutation_rate: 0.0,
            bounds,
        }
    }

    pub fn with_length_mutation(mut self, length_mutation_rate: f64) -> Self {
        self.length_mutation_rate = length_mutation_rate;
        self
    }
}

impl<R: Rng + ?Sized> Mutator<R> for PointMutator {
    fn mutate(&self, genome: &Genome, rng: &mut R) -> Genome {
        genome.mutate(
            rng,
            self.mutation_rate,
            self.length_mutation_rate,
            &self.bounds,
        )
    }
}

/// Single-point splice crossover; see [`Genome::crossover`].
#[derive(Debug, Clone, Copy)]
pub struct SpliceCrossover {
    pub point: CrossoverPoint,
    pub bounds: GenomeBounds,
}

impl SpliceCrossover {
    pub fn new(point: CrossoverPoint, bounds: GenomeBounds) -> Self {
        Self { point, bounds }
    }
}

impl<R: Rng + ?Sized> Crossover<R> for SpliceCrossover {
    fn crossover(&self, parent_a: &Genome, parent_b: &Genome, rng: &mut R) -> Genome {
        Genome::crossover(parent_a, parent_b, rng, self.point, &self.bounds)
    }
}
