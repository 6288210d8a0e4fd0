use rand::Rng;
use serde::{Deserialize, Serialize};

/// Inclusive bounds every genome in a run must respect.
///
/// `min_len..=max_len` bounds the number of elements and `min_val..=max_val`
/// bounds each element. All genome operations take the bounds explicitly and
/// return genomes that satisfy them.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct GenomeBounds {
    #[serde(default = "default_min_len")]
    pub min_len: usize,
    #[serde(default = "default_max_len")]
    pub max_len: usize,
    #[serde(default = "default_min_val")]
    pub min_val: i64,
    #[serde(default = "default_max_val")]
    pub max_val: i64,
}

fn default_min_len() -> usize {
    5
}
fn default_max_len() -> usize {
    20
}
fn default_min_val() -> i64 {
    0
}
fn default_max_val() -> i64 {
    100
}

impl Default for GenomeBounds {
    fn default() -> Self {
        Self {
            min_len: default_min_len(),
            max_len: default_max_len(),
            min_val: default_min_val(),
            max_val: default_max_val(),
        }
    }
}

impl GenomeBounds {
    pub fn new(min_len: usize, max_len: usize, min_val: i64, max_val: i64) -> Self {
        Self {
            min_len,
            max_len,
            min_val,
            max_val,
        }
    }

    /// Returns `true` if `genome` has an in-range length and only in-range elements.
    pub fn contains(&self, genome: &Genome) -> bool {
        (self.min_len..=self.max_len).contains(&genome.len())
            && genome
                .elements()
                .iter()
                .all(|v| (self.min_val..=self.max_val).contains(v))
    }

    fn random_value<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        rng.random_range(self.min_val..=self.max_val)
    }
}

/// How the splice point of a single-point crossover is chosen.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CrossoverPoint {
    /// `len(parent_a) / 2`. Consumes no randomness.
    #[default]
    Midpoint,
    /// Uniform in `[1, min(len_a, len_b) - 1]`.
    Random,
}

/// One candidate input: an ordered sequence of integer elements.
///
/// Genomes are value-semantic. `crossover`, `mutate` and `clamp` all return a
/// fresh genome and never share storage with their arguments.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash, Default)]
#[serde(transparent)]
pub struct Genome(Vec<i64>);

impl Genome {
    /// Wraps `elements` without checking them against any bounds.
    pub fn new(elements: Vec<i64>) -> Self {
        Self(elements)
    }

    pub fn elements(&self) -> &[i64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<i64> {
        self.0
    }

    /// Generates a genome with a uniform length in `[min_len, max_len]` and
    /// uniform elements in `[min_val, max_val]`.
    ///
    /// The length is drawn first, then one draw per element in order.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, bounds: &GenomeBounds) -> Self {
        let len = rng.random_range(bounds.min_len..=bounds.max_len);
        let elements = (0..len).map(|_| bounds.random_value(rng)).collect();
        Self(elements)
    }

    /// Single-point splice of `parent_a`'s prefix and `parent_b`'s suffix.
    ///
    /// If either parent has at most one element the offspring is a copy of
    /// `parent_a`. The offspring is clamped back into `bounds`, which may draw
    /// padding values from `rng`.
    pub fn crossover<R: Rng + ?Sized>(
        parent_a: &Genome,
        parent_b: &Genome,
        rng: &mut R,
        point: CrossoverPoint,
        bounds: &GenomeBounds,
    ) -> Self {
        let (len_a, len_b) = (parent_a.len(), parent_b.len());
        if len_a <= 1 || len_b <= 1 {
            return parent_a.clamp(rng, bounds);
        }

        let split = match point {
            CrossoverPoint::Midpoint => len_a / 2,
            CrossoverPoint::Random => rng.random_range(1..=len_a.min(len_b) - 1),
        };

        let mut elements = Vec::with_capacity(split + len_b.saturating_sub(split));
        elements.extend_from_slice(&parent_a.0[..split]);
        if split < len_b {
            elements.extend_from_slice(&parent_b.0[split..]);
        }
        Self(elements).clamp(rng, bounds)
    }

    /// Returns a copy where every element is independently replaced, with
    /// probability `mutation_rate`, by a fresh in-bound value.
    ///
    /// When `length_mutation_rate > 0.0` a second step may insert or delete a
    /// single element, staying inside `[min_len, max_len]`. A zero rate draws
    /// nothing from `rng`, so enabling it is the only way it changes a run.
    pub fn mutate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        mutation_rate: f64,
        length_mutation_rate: f64,
        bounds: &GenomeBounds,
    ) -> Self {
        let mut elements = self.0.clone();

        for element in elements.iter_mut() {
            if rng.random_bool(mutation_rate) {
                *element = bounds.random_value(rng);
            }
        }

        if length_mutation_rate > 0.0 && rng.random_bool(length_mutation_rate) {
            let can_grow = elements.len() < bounds.max_len;
            let can_shrink = elements.len() > bounds.min_len && !elements.is_empty();
            let grow = match (can_grow, can_shrink) {
                (true, true) => rng.random_bool(0.5),
                (grow, _) => grow,
            };
            if grow && can_grow {
                let at = rng.random_range(0..=elements.len());
                elements.insert(at, bounds.random_value(rng));
            } else if can_shrink {
                let at = rng.random_range(0..elements.len());
                elements.remove(at);
            }
        }

        Self(elements)
    }

    /// Brings a genome back inside `bounds`: truncates to `max_len`, pads to
    /// `min_len` with random values and clamps out-of-range elements.
    pub fn clamp<R: Rng + ?Sized>(&self, rng: &mut R, bounds: &GenomeBounds) -> Self {
        let mut elements: Vec<i64> = self
            .0
            .iter()
            .take(bounds.max_len)
            .map(|v| (*v).clamp(bounds.min_val, bounds.max_val))
            .collect();
        while elements.len() < bounds.min_len {
            elements.push(bounds.random_value(rng));
        }
        Self(elements)
    }
}

impl From<Vec<i64>> for Genome {
    fn from(elements: Vec<i64>) -> Self {
        Self(elements)
    }
}

impl AsRef<[i64]> for Genome {
    fn as_ref(&self) -> &[i64] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;

    #[test]
    fn random_genome_respects_bounds() {
        let bounds = GenomeBounds::new(3, 7, -5, 5);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..200 {
            let genome = Genome::random(&mut rng, &bounds);
            assert!(bounds.contains(&genome), "out of bounds: {genome:?}");
        }
    }

    #[test]
    fn random_genome_is_deterministic_for_a_seed() {
        let bounds = GenomeBounds::default();
        let mut rng_a = ChaCha8Rng::seed_from_u64(42);
        let mut rng_b = ChaCha8Rng::seed_from_u64(42);
        assert_eq!(
            Genome::random(&mut rng_a, &bounds),
            Genome::random(&mut rng_b, &bounds)
        );
    }

    #[test]
    fn crossover_with_length_one_parent_copies_parent_a() {
        let bounds = GenomeBounds::new(1, 10, 0, 100);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let a = Genome::new(vec![42]);
        let b = Genome::new(vec![1, 2, 3, 4]);
        let child = Genome::crossover(&a, &b, &mut rng, CrossoverPoint::Midpoint, &bounds);
        assert_eq!(child, a);

        let child = Genome::crossover(&b, &a, &mut rng, CrossoverPoint::Random, &bounds);
        assert_eq!(child, b);
    }

    #[test]
    fn midpoint_crossover_splices_prefix_and_suffix() {
        let bounds = GenomeBounds::new(1, 10, 0, 100);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let a = Genome::new(vec![1, 2, 3, 4]);
        let b = Genome::new(vec![10, 20, 30, 40, 50]);
        let child = Genome::crossover(&a, &b, &mut rng, CrossoverPoint::Midpoint, &bounds);
        assert_eq!(child.elements(), &[1, 2, 30, 40, 50]);
    }

    #[test]
    fn midpoint_past_parent_b_leaves_prefix_only() {
        let bounds = GenomeBounds::new(1, 20, 0, 100);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let a = Genome::new(vec![1, 2, 3, 4, 5, 6, 7, 8]);
        let b = Genome::new(vec![10, 20]);
        let child = Genome::crossover(&a, &b, &mut rng, CrossoverPoint::Midpoint, &bounds);
        assert_eq!(child.elements(), &[1, 2, 3, 4]);
    }

    #[test]
    fn crossover_does_not_alias_parents() {
        let bounds = GenomeBounds::new(1, 10, 0, 100);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let a = Genome::new(vec![1, 2, 3, 4]);
        let b = Genome::new(vec![5, 6, 7, 8]);
        let child = Genome::crossover(&a, &b, &mut rng, CrossoverPoint::Midpoint, &bounds);
        let mutated = child.mutate(&mut rng, 1.0, 0.0, &bounds);
        assert_ne!(child.elements().as_ptr(), mutated.elements().as_ptr());
        assert_eq!(a.elements(), &[1, 2, 3, 4]);
        assert_eq!(b.elements(), &[5, 6, 7, 8]);
    }

    #[test]
    fn crossover_result_is_clamped_to_length_bounds() {
        let bounds = GenomeBounds::new(4, 4, 0, 9);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let a = Genome::new(vec![1, 1, 1, 1]);
        let b = Genome::new(vec![2, 2]);
        let child = Genome::crossover(&a, &b, &mut rng, CrossoverPoint::Midpoint, &bounds);
        assert_eq!(child.len(), 4);
        assert_eq!(&child.elements()[..2], &[1, 1]);
        assert!(bounds.contains(&child));
    }

    #[test]
    fn mutate_with_zero_rate_returns_equal_copy() {
        let bounds = GenomeBounds::default();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let genome = Genome::new(vec![1, 2, 3, 4, 5]);
        assert_eq!(genome.mutate(&mut rng, 0.0, 0.0, &bounds), genome);
    }

    #[test]
    fn mutate_empty_genome_is_a_noop() {
        let bounds = GenomeBounds::new(0, 4, 0, 9);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let genome = Genome::default();
        assert!(genome.mutate(&mut rng, 1.0, 0.0, &bounds).is_empty());
    }

    #[test]
    fn mutate_with_full_rate_stays_in_value_bounds() {
        let bounds = GenomeBounds::new(1, 10, 3, 4);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let genome = Genome::new(vec![3; 10]);
        let mutated = genome.mutate(&mut rng, 1.0, 0.0, &bounds);
        assert_eq!(mutated.len(), 10);
        assert!(bounds.contains(&mutated));
    }

    #[test]
    fn length_mutation_changes_length_by_at_most_one() {
        let bounds = GenomeBounds::new(2, 6, 0, 9);
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let mut genome = Genome::new(vec![0, 1, 2, 3]);
        let mut saw_change = false;
        for _ in 0..100 {
            let next = genome.mutate(&mut rng, 0.0, 1.0, &bounds);
            assert!(next.len().abs_diff(genome.len()) == 1);
            assert!(bounds.contains(&next));
            saw_change |= next.len() != 4;
            genome = next;
        }
        assert!(saw_change);
    }

    #[test]
    fn clamp_truncates_pads_and_clamps_values() {
        let bounds = GenomeBounds::new(3, 4, 0, 10);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let long = Genome::new(vec![-5, 50, 5, 6, 7]);
        assert_eq!(long.clamp(&mut rng, &bounds).elements(), &[0, 10, 5, 6]);

        let short = Genome::new(vec![1]);
        let padded = short.clamp(&mut rng, &bounds);
        assert_eq!(padded.len(), 3);
        assert_eq!(padded.elements()[0], 1);
        assert!(bounds.contains(&padded));
    }

    fn arb_bounds() -> impl Strategy<Value = GenomeBounds> {
        (0usize..8, 0usize..8, -50i64..50, 0i64..50).prop_map(|(min_len, extra, min_val, span)| {
            GenomeBounds::new(min_len, min_len + extra, min_val, min_val + span)
        })
    }

    proptest! {
        #[test]
        fn operators_preserve_bounds(
            bounds in arb_bounds(),
            seed in any::<u64>(),
            rate in 0.0f64..=1.0,
            length_rate in 0.0f64..=1.0,
            random_point in any::<bool>(),
        ) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let point = if random_point { CrossoverPoint::Random } else { CrossoverPoint::Midpoint };
            let a = Genome::random(&mut rng, &bounds);
            let b = Genome::random(&mut rng, &bounds);
            prop_assert!(bounds.contains(&a));
            prop_assert!(bounds.contains(&b));

            let child = Genome::crossover(&a, &b, &mut rng, point, &bounds);
            prop_assert!(bounds.contains(&child));

            let mutated = child.mutate(&mut rng, rate, length_rate, &bounds);
            prop_assert!(bounds.contains(&mutated));
        }
    }
}
