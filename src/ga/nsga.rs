//! Multi-objective ranking (NSGA-II) and adaptive stopping (MGBM).
//!
//! # Ranking
//!
//! Individuals are ordered by Pareto front (rank ascending) and, inside a
//! front, by crowding distance (descending). Crowding depends on the front
//! structure of the current generation, so the order is a comparator
//! recomputed every generation rather than a stored key.
//!
//! # Adaptive stopping
//!
//! The Mutual Domination Rate between consecutive first fronts measures
//! progress; its running average falling below a threshold means the search
//! has stagnated.
//!
//! # References
//! - Deb et al. (2002), "A Fast and Elitist Multiobjective Genetic Algorithm: NSGA-II"
//! - Martí et al. (2016), "A stopping criterion for multi-objective
//!   optimization evolutionary algorithms" (MGBM)

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use super::Individual;

/// Crowding distance given to the boundary members of a front.
pub const MAX_CROWDING: f64 = 1.0;

const PRIORITY_EPSILON: f64 = 1e-9;

/// Pluggable dominance relation: `dominates(a, b)` is true when `a` dominates `b`.
#[derive(Clone)]
pub struct Dominance {
    func: Arc<dyn Fn(&[f64], &[f64]) -> bool + Send + Sync>,
}

impl Dominance {
    /// Strict Pareto dominance.
    pub fn pareto() -> Self {
        Self::custom(pareto_dominates)
    }

    /// Dominance that first compares one prioritized objective.
    ///
    /// `a` dominates `b` when it is strictly better on `objective`; when the
    /// two tie on it, plain Pareto dominance decides.
    pub fn prioritized(objective: usize) -> Self {
        Self::custom(move |a: &[f64], b: &[f64]| {
            match (a.get(objective), b.get(objective)) {
                (Some(x), Some(y)) if (x - y).abs() > PRIORITY_EPSILON => x < y,
                _ => pareto_dominates(a, b),
            }
        })
    }

    /// Wraps an arbitrary relation.
    pub fn custom<F>(func: F) -> Self
    where
        F: Fn(&[f64], &[f64]) -> bool + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
        }
    }

    /// Whether `a` dominates `b`.
    #[inline]
    pub fn dominates(&self, a: &[f64], b: &[f64]) -> bool {
        (self.func)(a, b)
    }
}

impl Default for Dominance {
    fn default() -> Self {
        Self::pareto()
    }
}

impl fmt::Debug for Dominance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Dominance")
    }
}

/// `a` is no worse than `b` in every objective and strictly better in one.
pub fn pareto_dominates(a: &[f64], b: &[f64]) -> bool {
    let mut strictly_better = false;
    for (x, y) in a.iter().zip(b) {
        if x > y {
            return false;
        }
        if x < y {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Fast non-dominated sort.
///
/// Returns the fronts as lists of indices into `fitness`; front 0 holds every
/// point dominated by no other.
///
/// # Complexity
/// O(M·N²) dominance checks for N points.
pub fn fast_non_dominated_sort(fitness: &[&[f64]], dominance: &Dominance) -> Vec<Vec<usize>> {
    let n = fitness.len();
    let mut dominated_by_count = vec![0usize; n];
    let mut dominates_set: Vec<Vec<usize>> = vec![Vec::new(); n];

    for p in 0..n {
        for q in 0..n {
            if p == q {
                continue;
            }
            if dominance.dominates(fitness[p], fitness[q]) {
                dominates_set[p].push(q);
            } else if dominance.dominates(fitness[q], fitness[p]) {
                dominated_by_count[p] += 1;
            }
        }
    }

    let mut fronts = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&p| dominated_by_count[p] == 0).collect();
    while !current.is_empty() {
        let mut next = Vec::new();
        for &p in &current {
            for &q in &dominates_set[p] {
                dominated_by_count[q] -= 1;
                if dominated_by_count[q] == 0 {
                    next.push(q);
                }
            }
        }
        next.sort_unstable();
        fronts.push(current);
        current = next;
    }
    fronts
}

/// Crowding distance of every member of `front`, aligned with `front`.
///
/// For each objective the members are sorted by value; the two extremes get
/// [`MAX_CROWDING`], interior members accumulate the gap between their
/// neighbours normalized by the front's range (a zero range contributes
/// nothing). Interior distances are left unbounded.
pub fn crowding_distance(fitness: &[&[f64]], front: &[usize]) -> Vec<f64> {
    let size = front.len();
    let mut distance = vec![0.0; size];
    if size <= 2 {
        return vec![MAX_CROWDING; size];
    }

    let nb_objectives = front
        .iter()
        .map(|&i| fitness[i].len())
        .min()
        .unwrap_or(0);
    let mut boundary = vec![false; size];
    let mut order: Vec<usize> = (0..size).collect();

    for m in 0..nb_objectives {
        order.sort_by(|&a, &b| fitness[front[a]][m].total_cmp(&fitness[front[b]][m]));
        let first = order[0];
        let last = order[size - 1];
        boundary[first] = true;
        boundary[last] = true;

        let min = fitness[front[first]][m];
        let max = fitness[front[last]][m];
        let range = max - min;
        if !(range > 0.0) || !range.is_finite() {
            continue;
        }
        for k in 1..size - 1 {
            let gap = fitness[front[order[k + 1]]][m] - fitness[front[order[k - 1]]][m];
            if gap.is_finite() {
                distance[order[k]] += gap / range;
            }
        }
    }

    for (d, &b) in distance.iter_mut().zip(&boundary) {
        if b {
            *d = MAX_CROWDING;
        }
    }
    distance
}

/// Orders a population best-first.
///
/// `rank` sorts the population in place and returns the Pareto rank of each
/// position (0 = first front).
pub trait Ranking: Send {
    /// Sorts `population` best-first and returns the aligned ranks.
    fn rank(&mut self, population: &mut [Individual]) -> Vec<usize>;

    /// Adaptive stop, checked after each generation. Default: never.
    fn should_stop(&mut self, _population: &[Individual], _ranks: &[usize]) -> bool {
        false
    }
}

/// Single-objective ranking: lexicographic order of fitness vectors.
///
/// Rank 0 is given to every individual tied with the best.
#[derive(Debug, Clone, Default)]
pub struct ScalarRanking;

impl Ranking for ScalarRanking {
    fn rank(&mut self, population: &mut [Individual]) -> Vec<usize> {
        population.sort_by(|a, b| lexicographic(fitness_of(a), fitness_of(b)));
        let mut ranks = Vec::with_capacity(population.len());
        let mut rank = 0;
        for i in 0..population.len() {
            if i > 0
                && lexicographic(fitness_of(&population[i - 1]), fitness_of(&population[i]))
                    != Ordering::Equal
            {
                rank += 1;
            }
            ranks.push(rank);
        }
        ranks
    }
}

/// NSGA-II ranking with optional MGBM stopping.
#[derive(Debug, Clone, Default)]
pub struct Nsga2Ranking {
    dominance: Dominance,
    stop: Option<Mgbm>,
}

impl Nsga2Ranking {
    /// Creates a ranking with the given dominance relation.
    pub fn new(dominance: Dominance) -> Self {
        Self {
            dominance,
            stop: None,
        }
    }

    /// Enables adaptive stopping below `threshold`.
    pub fn with_stop_threshold(mut self, threshold: f64) -> Self {
        self.stop = Some(Mgbm::new(threshold));
        self
    }
}

impl Ranking for Nsga2Ranking {
    fn rank(&mut self, population: &mut [Individual]) -> Vec<usize> {
        let (ranks, crowding) = {
            let fitness: Vec<&[f64]> = population.iter().map(fitness_of).collect();
            let fronts = fast_non_dominated_sort(&fitness, &self.dominance);
            let mut ranks = vec![0usize; population.len()];
            let mut crowding = vec![0.0; population.len()];
            for (r, front) in fronts.iter().enumerate() {
                let distances = crowding_distance(&fitness, front);
                for (&i, d) in front.iter().zip(distances) {
                    ranks[i] = r;
                    crowding[i] = d;
                }
            }
            (ranks, crowding)
        };

        let mut order: Vec<usize> = (0..population.len()).collect();
        order.sort_by(|&a, &b| {
            ranks[a]
                .cmp(&ranks[b])
                .then_with(|| crowding[b].total_cmp(&crowding[a]))
        });

        let mut slots: Vec<Option<Individual>> = population
            .iter_mut()
            .map(|ind| Some(std::mem::replace(ind, Individual::new(Vec::new()))))
            .collect();
        for (dst, &src) in order.iter().enumerate() {
            if let Some(ind) = slots[src].take() {
                population[dst] = ind;
            }
        }
        order.iter().map(|&i| ranks[i]).collect()
    }

    fn should_stop(&mut self, population: &[Individual], ranks: &[usize]) -> bool {
        let Some(stop) = self.stop.as_mut() else {
            return false;
        };
        let front: Vec<Vec<f64>> = population
            .iter()
            .zip(ranks)
            .filter(|(_, &r)| r == 0)
            .map(|(ind, _)| fitness_of(ind).to_vec())
            .collect();
        stop.update(front, &self.dominance)
    }
}

/// MGBM stopping state.
#[derive(Debug, Clone)]
pub struct Mgbm {
    threshold: f64,
    steps: usize,
    indicator: f64,
    previous: Option<Vec<Vec<f64>>>,
}

impl Mgbm {
    /// Creates the criterion.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            steps: 0,
            indicator: 0.0,
            previous: None,
        }
    }

    /// Current running average of the mutual domination rate.
    pub fn indicator(&self) -> f64 {
        self.indicator
    }

    /// Feeds the current first front; returns `true` once the running
    /// average falls below the threshold.
    pub fn update(&mut self, front: Vec<Vec<f64>>, dominance: &Dominance) -> bool {
        let Some(previous) = self.previous.replace(front) else {
            return false;
        };
        let current = self.previous.as_deref().unwrap_or(&[]);
        let mdr = mutual_domination_rate(&previous, current, dominance);

        let t = self.steps as f64;
        self.indicator = t / (t + 1.0) * self.indicator + mdr / (t + 1.0);
        self.steps += 1;
        self.indicator < self.threshold
    }
}

/// Fraction of `previous` dominated by `current` minus the fraction of
/// `current` dominated by `previous`.
pub fn mutual_domination_rate(
    previous: &[Vec<f64>],
    current: &[Vec<f64>],
    dominance: &Dominance,
) -> f64 {
    let dominated_fraction = |targets: &[Vec<f64>], by: &[Vec<f64>]| -> f64 {
        if targets.is_empty() {
            return 0.0;
        }
        let count = targets
            .iter()
            .filter(|t| by.iter().any(|b| dominance.dominates(b, t)))
            .count();
        count as f64 / targets.len() as f64
    };
    dominated_fraction(previous, current) - dominated_fraction(current, previous)
}

fn fitness_of(individual: &Individual) -> &[f64] {
    individual.fitness().unwrap_or(&[f64::INFINITY])
}

fn lexicographic(a: &[f64], b: &[f64]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        match x.total_cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points() -> Vec<Vec<f64>> {
        vec![
            vec![1.0, 5.0], // 0: front 0
            vec![2.0, 3.0], // 1: front 0
            vec![4.0, 1.0], // 2: front 0
            vec![3.0, 4.0], // 3: dominated by 1
            vec![5.0, 5.0], // 4: dominated by 3
            vec![2.0, 3.0], // 5: duplicate of 1, front 0
        ]
    }

    fn as_slices(p: &[Vec<f64>]) -> Vec<&[f64]> {
        p.iter().map(|v| v.as_slice()).collect()
    }

    fn individual(f: &[f64]) -> Individual {
        let mut ind = Individual::new(vec![0.5]);
        ind.set_fitness(f.to_vec());
        ind
    }

    #[test]
    fn test_pareto_dominates() {
        assert!(pareto_dominates(&[1.0, 1.0], &[1.0, 2.0]));
        assert!(!pareto_dominates(&[1.0, 2.0], &[1.0, 2.0]));
        assert!(!pareto_dominates(&[0.0, 3.0], &[1.0, 2.0]));
    }

    #[test]
    fn test_prioritized_dominance() {
        let d = Dominance::prioritized(1);
        assert!(d.dominates(&[9.0, 1.0], &[0.0, 2.0]));
        assert!(!d.dominates(&[0.0, 2.0], &[9.0, 1.0]));
        assert!(d.dominates(&[0.0, 2.0], &[1.0, 2.0]));
    }

    #[test]
    fn test_non_dominated_sort_fronts() {
        let p = points();
        let fitness = as_slices(&p);
        let fronts = fast_non_dominated_sort(&fitness, &Dominance::pareto());
        assert_eq!(fronts, vec![vec![0, 1, 2, 5], vec![3], vec![4]]);
    }

    #[test]
    fn test_non_dominated_sort_properties() {
        let p: Vec<Vec<f64>> = (0..40)
            .map(|i| {
                let x = ((i * 37) % 17) as f64;
                let y = ((i * 53) % 13) as f64;
                vec![x, y, ((i * 11) % 7) as f64]
            })
            .collect();
        let fitness = as_slices(&p);
        let dom = Dominance::pareto();
        let fronts = fast_non_dominated_sort(&fitness, &dom);

        assert_eq!(fronts.iter().map(|f| f.len()).sum::<usize>(), p.len());
        // Front 0 is exactly the non-dominated set.
        for i in 0..p.len() {
            let dominated = (0..p.len()).any(|j| dom.dominates(fitness[j], fitness[i]));
            assert_eq!(fronts[0].contains(&i), !dominated);
        }
        // Every point of front k+1 is dominated by front k and by nothing later.
        for k in 0..fronts.len() - 1 {
            for &q in &fronts[k + 1] {
                assert!(fronts[k].iter().any(|&p| dom.dominates(fitness[p], fitness[q])));
                for later in &fronts[k + 1..] {
                    assert!(!later.iter().any(|&p| dom.dominates(fitness[p], fitness[q])));
                }
            }
        }
    }

    #[test]
    fn test_crowding_boundaries() {
        let p = vec![
            vec![1.0, 9.0],
            vec![2.0, 7.0],
            vec![4.0, 4.0],
            vec![7.0, 2.0],
            vec![9.0, 1.0],
        ];
        let fitness = as_slices(&p);
        let front: Vec<usize> = (0..5).collect();
        let d = crowding_distance(&fitness, &front);
        assert_eq!(d[0], MAX_CROWDING);
        assert_eq!(d[4], MAX_CROWDING);
        // interior: (4-1)/8 + (9-4)/8
        assert!((d[1] - 1.0).abs() < 1e-12);
        // (7-2)/8 + (7-2)/8
        assert!((d[2] - 1.25).abs() < 1e-12);
        assert!((d[3] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_crowding_interior_not_capped() {
        // Interior neighbours span the whole range on both objectives.
        let p = vec![vec![0.0, 4.0], vec![2.0, 2.0], vec![4.0, 0.0]];
        let fitness = as_slices(&p);
        let d = crowding_distance(&fitness, &[0, 1, 2]);
        assert_eq!(d[0], MAX_CROWDING);
        assert_eq!(d[2], MAX_CROWDING);
        assert!((d[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_crowding_zero_range() {
        let p = vec![vec![1.0, 1.0], vec![1.0, 2.0], vec![1.0, 3.0], vec![1.0, 4.0]];
        let fitness = as_slices(&p);
        let d = crowding_distance(&fitness, &[0, 1, 2, 3]);
        assert_eq!(d[0], MAX_CROWDING);
        assert_eq!(d[3], MAX_CROWDING);
        assert!((d[1] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_crowding_small_front() {
        let p = vec![vec![1.0], vec![2.0]];
        let fitness = as_slices(&p);
        assert_eq!(crowding_distance(&fitness, &[0, 1]), vec![MAX_CROWDING; 2]);
    }

    #[test]
    fn test_nsga2_ranking_order() {
        let mut pop: Vec<Individual> = points().iter().map(|f| individual(f)).collect();
        let ranks = Nsga2Ranking::default().rank(&mut pop);
        assert_eq!(ranks, vec![0, 0, 0, 0, 1, 2]);
        assert_eq!(pop[5].fitness(), Some(&[5.0, 5.0][..]));
        // The two extremes of front 0 come first.
        let first_two: Vec<&[f64]> = pop[..2].iter().map(|i| i.fitness().unwrap()).collect();
        assert!(first_two.contains(&&[1.0, 5.0][..]));
        assert!(first_two.contains(&&[4.0, 1.0][..]));
    }

    #[test]
    fn test_scalar_ranking() {
        let mut pop = vec![
            individual(&[3.0, 0.0]),
            individual(&[1.0, 2.0]),
            individual(&[1.0, 1.0]),
            individual(&[1.0, 1.0]),
        ];
        let ranks = ScalarRanking.rank(&mut pop);
        assert_eq!(pop[0].fitness(), Some(&[1.0, 1.0][..]));
        assert_eq!(ranks, vec![0, 0, 1, 2]);
    }

    #[test]
    fn test_mutual_domination_rate() {
        let dom = Dominance::pareto();
        let prev = vec![vec![2.0, 2.0], vec![3.0, 1.0]];
        let curr = vec![vec![1.0, 1.0]];
        assert!((mutual_domination_rate(&prev, &curr, &dom) - 1.0).abs() < 1e-12);
        assert!((mutual_domination_rate(&curr, &prev, &dom) + 1.0).abs() < 1e-12);
        assert_eq!(mutual_domination_rate(&prev, &prev, &dom), 0.0);
    }

    #[test]
    fn test_mgbm_stops_on_stagnation() {
        let dom = Dominance::pareto();
        let mut stop = Mgbm::new(0.1);
        assert!(!stop.update(vec![vec![3.0, 3.0]], &dom));
        assert!(!stop.update(vec![vec![1.0, 1.0]], &dom)); // MDR = 1
        assert!((stop.indicator() - 1.0).abs() < 1e-12);
        let mut stopped = false;
        for _ in 0..20 {
            if stop.update(vec![vec![1.0, 1.0]], &dom) {
                stopped = true;
                break;
            }
        }
        assert!(stopped);
        assert!(stop.indicator() < 0.1);
    }
}
