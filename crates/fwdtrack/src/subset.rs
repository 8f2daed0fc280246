//! Conflict resolution among overlapping seeds.
//!
//! Every seed is a neuron with an activation in `[0, 1]`. Seeds sharing hits
//! inhibit each other, and each seed is driven by its own quality. The
//! network is relaxed with asynchronous sigmoid updates while the temperature
//! anneals geometrically toward its floor; neurons that end above the
//! activation threshold are accepted.
//!
//! A neuron feels only its strongest competitor and its strongest ally, so
//! the interaction term stays in `[-1, 1]` however many seeds overlap.
//!
//! With the default weights, inhibition between two overlapping seeds is
//! always stronger than the largest quality drive, so a relaxed network
//! never keeps two conflicting seeds active.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::SubsetConfig;
use crate::hit::Seed;

/// Half-width of the uniform jitter added to initial activations.
const INITIAL_JITTER: f64 = 0.05;

/// Pairwise interaction between two seeds, in `[-1, 1]`.
pub trait Compatibility {
    fn weight(&self, a: &Seed, b: &Seed) -> f64;
}

/// Intrinsic score of a seed, in `[0, 1]`.
pub trait SeedQuality {
    fn quality(&self, seed: &Seed) -> f64;
}

/// `0` for disjoint seeds, `-(0.75 + 0.25 f)` otherwise, where `f` is the
/// shared-hit fraction of the shorter seed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SharedHitCompatibility;

impl Compatibility for SharedHitCompatibility {
    fn weight(&self, a: &Seed, b: &Seed) -> f64 {
        let shared = a.shared_hits(b);
        if shared == 0 {
            return 0.0;
        }
        let shorter = a.len().min(b.len()).max(1);
        let fraction = shared as f64 / shorter as f64;
        -(0.75 + 0.25 * fraction.min(1.0))
    }
}

/// `min(1, len / reference)`.
#[derive(Debug, Clone, Copy)]
pub struct HitCountQuality {
    pub reference: usize,
}

impl HitCountQuality {
    pub fn new(reference: usize) -> Self {
        Self { reference }
    }
}

impl SeedQuality for HitCountQuality {
    fn quality(&self, seed: &Seed) -> f64 {
        (seed.len() as f64 / self.reference.max(1) as f64).min(1.0)
    }
}

/// Outcome of [`SubsetSelector::calculate_best_set`].
#[derive(Debug, Clone, Default)]
pub struct SubsetResult {
    /// Accepted seeds in input order.
    pub accepted: Vec<Seed>,
    /// Rejected seeds in input order.
    pub rejected: Vec<Seed>,
    /// Final activation per input seed.
    pub activations: Vec<f64>,
    pub sweeps: usize,
    /// `false` when `max_sweeps` ended the relaxation.
    pub converged: bool,
}

/// Hopfield-style subset selector.
#[derive(Debug, Clone)]
pub struct SubsetSelector {
    config: SubsetConfig,
}

impl SubsetSelector {
    pub fn new(config: &SubsetConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &SubsetConfig {
        &self.config
    }

    fn cooled(&self, temperature: f64) -> bool {
        let floor = self.config.inf_temp;
        temperature - floor <= 1e-3 + 0.05 * floor
    }

    /// Partition `seeds` into accepted and rejected sets.
    ///
    /// Deterministic for a fixed `config.seed`.
    pub fn calculate_best_set<C, Q>(
        &self,
        seeds: Vec<Seed>,
        compatibility: &C,
        quality: &Q,
    ) -> SubsetResult
    where
        C: Compatibility + ?Sized,
        Q: SeedQuality + ?Sized,
    {
        let n = seeds.len();
        if n == 0 {
            return SubsetResult {
                converged: true,
                ..SubsetResult::default()
            };
        }
        let cfg = &self.config;

        let weights = DMatrix::from_fn(n, n, |i, j| {
            if i == j {
                0.0
            } else {
                compatibility.weight(&seeds[i], &seeds[j]).clamp(-1.0, 1.0)
            }
        });
        let drive = DVector::from_iterator(
            n,
            seeds
                .iter()
                .map(|s| cfg.quality_weight * quality.quality(s).clamp(0.0, 1.0)),
        );

        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let mut activation = DVector::from_fn(n, |_, _| {
            let jitter = rng.gen_range(-INITIAL_JITTER..INITIAL_JITTER);
            (cfg.initial_activation + jitter).clamp(0.0, 1.0)
        });

        let mut order: Vec<usize> = (0..n).collect();
        let mut temperature = cfg.initial_temp;
        let mut sweeps = 0;
        let mut converged = false;
        while sweeps < cfg.max_sweeps {
            sweeps += 1;
            order.shuffle(&mut rng);
            let mut max_change = 0.0f64;
            for &i in &order {
                let input = drive[i] + interaction(&weights, &activation, i);
                let updated = 0.5 * (1.0 + (input / temperature.max(f64::EPSILON)).tanh());
                max_change = max_change.max((updated - activation[i]).abs());
                activation[i] = updated;
            }
            if max_change < cfg.stable_threshold && self.cooled(temperature) {
                converged = true;
                break;
            }
            temperature = cfg.inf_temp + cfg.omega * (temperature - cfg.inf_temp);
        }
        if !converged {
            tracing::warn!(
                n_seeds = n,
                sweeps,
                "subset relaxation hit the sweep cap, using best-effort result"
            );
        }

        let activations: Vec<f64> = activation.iter().copied().collect();
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for (seed, &x) in seeds.into_iter().zip(&activations) {
            if x > cfg.activation_threshold {
                accepted.push(seed);
            } else {
                rejected.push(seed);
            }
        }
        tracing::debug!(
            accepted = accepted.len(),
            rejected = rejected.len(),
            sweeps,
            "subset selection finished"
        );
        SubsetResult {
            accepted,
            rejected,
            activations,
            sweeps,
            converged,
        }
    }
}

/// Strongest inhibition plus strongest excitation acting on neuron `i`.
fn interaction(weights: &DMatrix<f64>, activation: &DVector<f64>, i: usize) -> f64 {
    let mut inhibition = 0.0f64;
    let mut excitation = 0.0f64;
    for (w, x) in weights.row(i).iter().zip(activation.iter()) {
        let pull = w * x;
        inhibition = inhibition.min(pull);
        excitation = excitation.max(pull);
    }
    inhibition + excitation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hit::{Hit, HitRef};
    use std::sync::Arc;

    fn pool(n: u32) -> Vec<HitRef> {
        (0..n)
            .map(|i| Arc::new(Hit::new(i, (i % 7) as i32, [1.0, 0.0, 10.0])))
            .collect()
    }

    fn seed(pool: &[HitRef], ids: &[usize]) -> Seed {
        Seed::new(ids.iter().map(|&i| HitRef::clone(&pool[i])).collect())
    }

    fn selector(seed: u64) -> SubsetSelector {
        SubsetSelector::new(&SubsetConfig {
            seed,
            ..SubsetConfig::default()
        })
    }

    fn conflicts(accepted: &[Seed]) -> usize {
        let mut count = 0;
        for (i, a) in accepted.iter().enumerate() {
            for b in &accepted[i + 1..] {
                if a.shared_hits(b) > 0 {
                    count += 1;
                }
            }
        }
        count
    }

    /// One hit out of two on each of the first `doubled` layers, completed by
    /// a tail shared by every chain.
    fn doubled_layer_chains(hits: &[HitRef], doubled: usize) -> Vec<Seed> {
        (0..1usize << doubled)
            .map(|mask| {
                let ids: Vec<usize> = (0..7)
                    .map(|layer| {
                        if layer < doubled {
                            2 * layer + ((mask >> layer) & 1)
                        } else {
                            14 + layer
                        }
                    })
                    .collect();
                seed(hits, &ids)
            })
            .collect()
    }

    #[test]
    fn compatibility_scales_with_overlap() {
        let hits = pool(20);
        let a = seed(&hits, &[0, 1, 2, 3]);
        let b = seed(&hits, &[3, 4, 5, 6]);
        let c = seed(&hits, &[7, 8, 9, 10]);
        let w = SharedHitCompatibility;
        assert_eq!(w.weight(&a, &c), 0.0);
        assert!((w.weight(&a, &b) - -0.8125).abs() < 1e-12);
        assert!((w.weight(&a, &a) - -1.0).abs() < 1e-12);
    }

    #[test]
    fn tie_between_two_overlapping_seeds_accepts_exactly_one() {
        let hits = pool(20);
        // sharing exactly one hit, equal length and quality
        let a = seed(&hits, &[0, 1, 2, 3, 4, 5, 6]);
        let b = seed(&hits, &[6, 7, 8, 9, 10, 11, 12]);
        for rng_seed in 0..8 {
            let result = selector(rng_seed).calculate_best_set(
                vec![a.clone(), b.clone()],
                &SharedHitCompatibility,
                &HitCountQuality::new(7),
            );
            assert!(result.converged);
            assert_eq!(result.accepted.len(), 1, "seed {rng_seed}");
            assert_eq!(result.rejected.len(), 1);
        }
    }

    #[test]
    fn tie_break_is_deterministic_for_fixed_seed() {
        let hits = pool(20);
        let seeds = vec![
            seed(&hits, &[0, 1, 2, 3, 4, 5, 6]),
            seed(&hits, &[0, 1, 2, 3, 4, 5, 6]),
        ];
        let run = || {
            selector(42)
                .calculate_best_set(
                    seeds.clone(),
                    &SharedHitCompatibility,
                    &HitCountQuality::new(7),
                )
                .activations
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn disjoint_seeds_are_all_accepted() {
        let hits = pool(21);
        let seeds = vec![
            seed(&hits, &[0, 1, 2, 3, 4, 5, 6]),
            seed(&hits, &[7, 8, 9, 10, 11, 12, 13]),
            seed(&hits, &[14, 15, 16, 17, 18, 19, 20]),
        ];
        let result = selector(1).calculate_best_set(
            seeds,
            &SharedHitCompatibility,
            &HitCountQuality::new(7),
        );
        assert_eq!(result.accepted.len(), 3);
        assert!(result.rejected.is_empty());
    }

    #[test]
    fn empty_input_converges_immediately() {
        let result = selector(1).calculate_best_set(
            Vec::new(),
            &SharedHitCompatibility,
            &HitCountQuality::new(7),
        );
        assert!(result.converged);
        assert_eq!(result.sweeps, 0);
        assert!(result.accepted.is_empty());
    }

    #[test]
    fn accepted_sets_are_conflict_free_on_random_overlaps() {
        let hits = pool(30);
        let mut rng = StdRng::seed_from_u64(99);
        for trial in 0..50 {
            let n_seeds = rng.gen_range(2..10);
            let seeds: Vec<Seed> = (0..n_seeds)
                .map(|_| {
                    let len = rng.gen_range(4..8);
                    let mut ids: Vec<usize> = (0..30).collect();
                    ids.shuffle(&mut rng);
                    ids.truncate(len);
                    ids.sort_unstable();
                    seed(&hits, &ids)
                })
                .collect();
            let result = selector(trial).calculate_best_set(
                seeds,
                &SharedHitCompatibility,
                &HitCountQuality::new(7),
            );
            assert_eq!(conflicts(&result.accepted), 0, "trial {trial}");
            assert!(!result.accepted.is_empty());
        }
    }

    #[test]
    fn dense_cluster_sharing_a_hit_keeps_exactly_one_chain() {
        let hits = pool(21);
        let seeds = doubled_layer_chains(&hits, 6);
        assert_eq!(seeds.len(), 64);
        for rng_seed in 0..6 {
            let result = selector(rng_seed).calculate_best_set(
                seeds.clone(),
                &SharedHitCompatibility,
                &HitCountQuality::new(7),
            );
            assert!(result.converged, "seed {rng_seed}");
            assert_eq!(result.accepted.len(), 1, "seed {rng_seed}");
            assert_eq!(result.rejected.len(), 63);
        }
    }

    #[test]
    fn fully_doubled_cluster_keeps_one_disjoint_pair() {
        let hits = pool(21);
        let seeds = doubled_layer_chains(&hits, 7);
        assert_eq!(seeds.len(), 128);
        for rng_seed in 0..4 {
            let result = selector(rng_seed).calculate_best_set(
                seeds.clone(),
                &SharedHitCompatibility,
                &HitCountQuality::new(7),
            );
            assert_eq!(result.accepted.len(), 2, "seed {rng_seed}");
            assert_eq!(conflicts(&result.accepted), 0);
            let covered: usize = result.accepted.iter().map(|s| s.len()).sum();
            assert_eq!(covered, 14);
        }
    }

    #[test]
    fn chain_overlapping_two_disjoint_chains_loses_to_both() {
        let hits = pool(21);
        let wide = seed(&hits, &[0, 1, 2, 3, 4, 5, 6]);
        let left = seed(&hits, &[6, 7, 8, 9, 10, 11, 12]);
        let right = seed(&hits, &[0, 13, 14, 15, 16, 17, 18]);
        let result = selector(3).calculate_best_set(
            vec![wide, left.clone(), right.clone()],
            &SharedHitCompatibility,
            &HitCountQuality::new(7),
        );
        assert_eq!(result.accepted, vec![left, right]);
    }
}
