use crate::genome::{Genome, GenomeBounds};
use crate::harness::Measurement;
use crate::mutator::{Crossover, Mutator};
use rand::Rng;
use serde::Serialize;
use std::cmp::Ordering;

/// Default number of top survivors eligible as crossover parents.
pub const DEFAULT_ELITE_SIZE: usize = 10;

/// Absorbs floating-point noise in `len * fraction` before rounding up.
const SURVIVOR_EPSILON: f64 = 1e-9;

/// A genome together with the score it earned in the current generation.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ScoredGenome {
    pub genome: Genome,
    pub fitness: f64,
    pub measurement: Measurement,
    /// Position in which the genome entered the population; final tiebreak.
    #[serde(skip)]
    pub order: usize,
}

impl ScoredGenome {
    pub fn new(genome: Genome, fitness: f64, measurement: Measurement, order: usize) -> Self {
        Self {
            genome,
            fitness,
            measurement,
            order,
        }
    }
}

/// Ranking order: fitness descending, then shorter genome, then earlier entry.
fn rank_order(a: &ScoredGenome, b: &ScoredGenome) -> Ordering {
    b.fitness
        .total_cmp(&a.fitness)
        .then_with(|| a.genome.len().cmp(&b.genome.len()))
        .then_with(|| a.order.cmp(&b.order))
}

/// One generation's worth of scored genomes.
#[derive(Debug, Clone, Default)]
pub struct Population {
    members: Vec<ScoredGenome>,
}

impl Population {
    /// Builds a population from genomes in evaluation order; each member's
    /// `order` is its index in `scored`.
    pub fn from_scored(scored: Vec<(Genome, f64, Measurement)>) -> Self {
        let members = scored
            .into_iter()
            .enumerate()
            .map(|(order, (genome, fitness, measurement))| {
                ScoredGenome::new(genome, fitness, measurement, order)
            })
            .collect();
        Self { members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[ScoredGenome] {
        &self.members
    }

    pub fn best(&self) -> Option<&ScoredGenome> {
        self.members.first()
    }

    /// Sorts members into ranking order and returns them.
    ///
    /// The sort is stable and the order total, so ranking an already ranked
    /// population leaves it unchanged.
    pub fn rank(&mut self) -> &[ScoredGenome] {
        self.members.sort_by(rank_order);
        &self.members
    }

    /// Copies of the top `ceil(len * fraction)` members, at least one and at
    /// most all of them. Expects a ranked population.
    pub fn select_survivors(&self, fraction: f64) -> Vec<Genome> {
        if self.members.is_empty() {
            return Vec::new();
        }
        let wanted = (self.members.len() as f64 * fraction - SURVIVOR_EPSILON).ceil() as usize;
        let count = wanted.clamp(1, self.members.len());
        self.members[..count]
            .iter()
            .map(|m| m.genome.clone())
            .collect()
    }

    /// Builds the next generation's genomes, exactly `target_size` of them.
    ///
    /// Survivors are carried over first in their given order. Offspring are
    /// then bred from parents drawn uniformly, with replacement, from the first
    /// `elite_size` survivors. Per offspring the draws from `rng` happen in a
    /// fixed order: parent A, parent B, crossover, mutation. With no
    /// survivors the rest is filled with random genomes.
    ///
    /// # Arguments
    /// * `survivors`: Ranked survivors of the previous generation. Any beyond
    ///   `target_size` are dropped.
    /// * `target_size`: The population size `N`.
    /// * `elite_size`: How many of the top survivors may be picked as parents.
    /// * `rng`: The run's random stream.
    /// * `crossover`, `mutator`: The operators applied to every offspring.
    /// * `bounds`: Used only for the random fallback when `survivors` is empty.
    ///
    /// # Returns
    /// Survivors followed by offspring, `target_size` genomes in total.
    pub fn refill<R, C, M>(
        survivors: Vec<Genome>,
        target_size: usize,
        elite_size: usize,
        rng: &mut R,
        crossover: &C,
        mutator: &M,
        bounds: &GenomeBounds,
    ) -> Vec<Genome>
    where
        R: Rng + ?Sized,
        C: Crossover<R> + ?Sized,
        M: Mutator<R> + ?Sized,
    {
        let mut next = survivors;
        next.truncate(target_size);

        if next.is_empty() {
            log::warn!("No survivors to breed from, refilling with random genomes");
            while next.len() < target_size {
                next.push(Genome::random(rng, bounds));
            }
            return next;
        }

        let elite_len = elite_size.clamp(1, next.len());
        while next.len() < target_size {
            let a = rng.random_range(0..elite_len);
            let b = rng.random_range(0..elite_len);
            let child = crossover.crossover(&next[a], &next[b], rng);
            let child = mutator.mutate(&child, rng);
            next.push(child);
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::CrossoverPoint;
    use crate::mutator::{PointMutator, SpliceCrossover};
    use proptest::prelude::*;
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;
    use std::time::Duration;

    fn scored(elements: Vec<i64>, fitness: f64) -> (Genome, f64, Measurement) {
        (
            Genome::new(elements),
            fitness,
            Measurement::completed(fitness, Duration::from_millis(1)),
        )
    }

    #[test]
    fn rank_sorts_by_fitness_then_length_then_order() {
        let mut population = Population::from_scored(vec![
            scored(vec![1, 1, 1], 5.0),
            scored(vec![2, 2], 9.0),
            scored(vec![3, 3, 3], 9.0),
            scored(vec![4, 4], 9.0),
            scored(vec![5], 1.0),
        ]);
        let ranked: Vec<Vec<i64>> = population
            .rank()
            .iter()
            .map(|m| m.genome.elements().to_vec())
            .collect();
        assert_eq!(
            ranked,
            vec![
                vec![2, 2],
                vec![4, 4],
                vec![3, 3, 3],
                vec![1, 1, 1],
                vec![5]
            ]
        );
    }

    #[test]
    fn rank_is_idempotent() {
        let mut population = Population::from_scored(vec![
            scored(vec![1], 3.0),
            scored(vec![2, 2], 3.0),
            scored(vec![3], 3.0),
            scored(vec![4], 7.0),
        ]);
        let first = population.rank().to_vec();
        let second = population.rank().to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn select_survivors_rounds_up() {
        let mut population = Population::from_scored(
            (0..5).map(|i| scored(vec![i], i as f64)).collect(),
        );
        population.rank();
        let survivors = population.select_survivors(0.5);
        assert_eq!(survivors.len(), 3);
        assert_eq!(survivors[0].elements(), &[4]);
        assert_eq!(population.select_survivors(1.0).len(), 5);
        assert_eq!(population.select_survivors(0.01).len(), 1);
    }

    #[test]
    fn select_survivors_ignores_rounding_noise() {
        let mut population =
            Population::from_scored((0..50).map(|i| scored(vec![i], i as f64)).collect());
        population.rank();
        assert_eq!(population.select_survivors(0.14).len(), 7);
        assert_eq!(population.select_survivors(0.141).len(), 8);
        assert_eq!(population.select_survivors(0.5).len(), 25);
    }

    #[test]
    fn refill_reaches_target_size_exactly() {
        let bounds = GenomeBounds::new(2, 6, 0, 9);
        let crossover = SpliceCrossover::new(CrossoverPoint::Midpoint, bounds);
        let mutator = PointMutator::new(0.1, bounds);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let survivors = vec![Genome::new(vec![1, 2, 3]), Genome::new(vec![4, 5])];

        let next = Population::refill(
            survivors.clone(),
            20,
            DEFAULT_ELITE_SIZE,
            &mut rng,
            &crossover,
            &mutator,
            &bounds,
        );
        assert_eq!(next.len(), 20);
        assert_eq!(&next[..2], &survivors[..]);
        assert!(next.iter().all(|g| bounds.contains(g)));
    }

    #[test]
    fn refill_truncates_excess_survivors() {
        let bounds = GenomeBounds::new(1, 3, 0, 9);
        let crossover = SpliceCrossover::new(CrossoverPoint::Midpoint, bounds);
        let mutator = PointMutator::new(0.1, bounds);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let survivors: Vec<Genome> = (0..5).map(|i| Genome::new(vec![i])).collect();
        let next = Population::refill(survivors, 3, 10, &mut rng, &crossover, &mutator, &bounds);
        assert_eq!(next.len(), 3);
    }

    #[test]
    fn refill_only_breeds_from_the_elite() {
        let bounds = GenomeBounds::new(2, 2, 0, 9);
        let crossover = SpliceCrossover::new(CrossoverPoint::Midpoint, bounds);
        let mutator = PointMutator::new(0.0, bounds);
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let survivors = vec![
            Genome::new(vec![1, 1]),
            Genome::new(vec![2, 2]),
            Genome::new(vec![9, 9]),
        ];
        let next = Population::refill(survivors, 30, 2, &mut rng, &crossover, &mutator, &bounds);
        for child in &next[3..] {
            assert!(child.elements().iter().all(|v| *v == 1 || *v == 2));
        }
    }

    #[test]
    fn refill_without_survivors_generates_random_genomes() {
        let bounds = GenomeBounds::new(1, 4, 0, 9);
        let crossover = SpliceCrossover::new(CrossoverPoint::Midpoint, bounds);
        let mutator = PointMutator::new(0.1, bounds);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let next = Population::refill(Vec::new(), 7, 10, &mut rng, &crossover, &mutator, &bounds);
        assert_eq!(next.len(), 7);
        assert!(next.iter().all(|g| bounds.contains(g)));
    }

    #[test]
    fn refill_is_deterministic_for_a_seed() {
        let bounds = GenomeBounds::new(2, 8, 0, 50);
        let crossover = SpliceCrossover::new(CrossoverPoint::Random, bounds);
        let mutator = PointMutator::new(0.3, bounds).with_length_mutation(0.2);
        let survivors = vec![
            Genome::new(vec![1, 2, 3, 4]),
            Genome::new(vec![5, 6, 7]),
            Genome::new(vec![8, 9]),
        ];
        let run = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            Population::refill(
                survivors.clone(),
                12,
                10,
                &mut rng,
                &crossover,
                &mutator,
                &bounds,
            )
        };
        assert_eq!(run(99), run(99));
    }

    proptest! {
        #[test]
        fn refill_size_is_exact(
            survivor_count in 0usize..12,
            target in 1usize..40,
            elite in 1usize..15,
            seed in any::<u64>(),
        ) {
            let bounds = GenomeBounds::new(1, 5, 0, 3);
            let crossover = SpliceCrossover::new(CrossoverPoint::Midpoint, bounds);
            let mutator = PointMutator::new(0.2, bounds);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let survivors: Vec<Genome> =
                (0..survivor_count).map(|_| Genome::random(&mut rng, &bounds)).collect();
            let next = Population::refill(survivors, target, elite, &mut rng, &crossover, &mutator, &bounds);
            prop_assert_eq!(next.len(), target);
            prop_assert!(next.iter().all(|g| bounds.contains(g)));
        }

        #[test]
        fn ranking_twice_changes_nothing(
            fitnesses in proptest::collection::vec((0u8..4, 1usize..4), 1..30),
        ) {
            let mut population = Population::from_scored(
                fitnesses
                    .iter()
                    .map(|(f, len)| scored(vec![0; *len], *f as f64))
                    .collect(),
            );
            let first = population.rank().to_vec();
            let second = population.rank().to_vec();
            prop_assert_eq!(first, second);
        }
    }
}
