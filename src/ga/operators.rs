//! Random-key genetic operators.
//!
//! BRKGA needs only two operators: fresh random individuals (mutants) and a
//! parameterized uniform crossover biased toward one parent.
//!
//! # Reference
//! Gonçalves & Resende (2011), "Biased random-key genetic algorithms for
//! combinatorial optimization"

use rand::Rng;

use super::Individual;

/// Biased uniform crossover.
///
/// The favored parent is the elite one when `elite_probability >= 0.5`,
/// otherwise the non-elite one; each key comes from the favored parent with
/// probability `max(elite_probability, 1 - elite_probability)`. Returns two
/// complementary offspring: wherever the first child takes the favored
/// parent's key, the second takes the other parent's, and vice versa.
///
/// Parents of different lengths are combined over the shorter length.
pub fn biased_crossover<R: Rng>(
    elite: &Individual,
    non_elite: &Individual,
    elite_probability: f64,
    rng: &mut R,
) -> (Individual, Individual) {
    let (favored, other, p) = if elite_probability >= 0.5 {
        (elite, non_elite, elite_probability)
    } else {
        (non_elite, elite, 1.0 - elite_probability)
    };

    let len = favored.len().min(other.len());
    let mut first = Vec::with_capacity(len);
    let mut second = Vec::with_capacity(len);
    for (&f, &o) in favored.genes()[..len].iter().zip(&other.genes()[..len]) {
        if rng.random::<f64>() < p {
            first.push(f);
            second.push(o);
        } else {
            first.push(o);
            second.push(f);
        }
    }
    (Individual::new(first), Individual::new(second))
}

/// Generates `count` random individuals of length `nb_genes`.
pub fn mutants<R: Rng>(count: usize, nb_genes: usize, rng: &mut R) -> Vec<Individual> {
    (0..count).map(|_| Individual::random(nb_genes, rng)).collect()
}
