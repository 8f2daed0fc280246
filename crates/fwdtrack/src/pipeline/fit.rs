//! Fitting of accepted seeds.

use std::time::Instant;

use crate::config::FitterConfig;
use crate::diagnostics::{FitStats, GOOD_FIT_MIN_PT};
use crate::fitter::{FitRecord, TrackFitter};
use crate::hit::Seed;
use crate::truth::dominant_truth;

fn passes_truth_filter(seed: &Seed, min_purity: f64) -> bool {
    if min_purity <= 0.0 {
        return true;
    }
    match dominant_truth(seed.hits().iter().map(|h| h.as_ref())) {
        Some((_, purity)) => purity >= min_purity,
        None => true,
    }
}

/// Fit every seed; the result is positional with `seeds`.
///
/// Failures are logged and leave `None` in place of the record.
pub(crate) fn fit_seeds<F: TrackFitter + ?Sized>(
    seeds: &[Seed],
    fitter: &mut F,
    config: &FitterConfig,
    stats: &mut FitStats,
) -> Vec<Option<FitRecord>> {
    let mut records = Vec::with_capacity(seeds.len());
    for seed in seeds {
        stats.n_seeds += 1;
        if !config.enable {
            records.push(None);
            continue;
        }
        if !passes_truth_filter(seed, config.truth_quality_min) {
            stats.n_low_purity += 1;
            tracing::debug!(hits = ?seed.hit_ids(), "seed below truth purity, not fitted");
            records.push(None);
            continue;
        }

        stats.n_attempted += 1;
        let start = Instant::now();
        let outcome = fitter.fit(seed);
        stats.add_duration(start.elapsed());
        match outcome {
            Ok(record) => {
                if record.pt() > GOOD_FIT_MIN_PT {
                    stats.n_good += 1;
                } else {
                    stats.n_bad += 1;
                }
                if record.converged {
                    stats.n_converged += 1;
                }
                records.push(Some(record));
            }
            Err(err) => {
                stats.n_bad += 1;
                tracing::warn!(hits = ?seed.hit_ids(), error = %err, "track fit failed");
                records.push(None);
            }
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitter::{LineFitter, ProjectedState};
    use crate::error::FitError;
    use crate::hit::{Hit, HitRef, LayerKey};
    use nalgebra::Vector3;
    use std::sync::Arc;

    fn seed(truths: &[i32]) -> Seed {
        Seed::new(
            truths
                .iter()
                .enumerate()
                .map(|(k, &t)| {
                    let z = 10.0 * (k + 1) as f64;
                    Arc::new(Hit::new(k as u32, k as LayerKey, [0.1 * z, 0.0, z]).with_truth(t))
                })
                .collect(),
        )
    }

    struct FailingFitter;

    impl TrackFitter for FailingFitter {
        fn fit(&mut self, _seed: &Seed) -> Result<FitRecord, FitError> {
            Err(FitError::Failed("no field map".to_string()))
        }

        fn refit(
            &mut self,
            _fit: &FitRecord,
            _seed: &Seed,
            _extension: &[Option<HitRef>],
        ) -> Result<Vector3<f64>, FitError> {
            Err(FitError::NotConverged)
        }

        fn project(
            &mut self,
            _fit: &FitRecord,
            layer: LayerKey,
        ) -> Result<ProjectedState, FitError> {
            Err(FitError::Projection {
                layer,
                reason: "no geometry".to_string(),
            })
        }
    }

    #[test]
    fn records_are_positional_and_counted() {
        let seeds = vec![seed(&[1, 1, 1, 1]), seed(&[2, 3, 4, 5])];
        let config = FitterConfig {
            truth_quality_min: 0.5,
            ..FitterConfig::default()
        };
        let mut stats = FitStats::default();
        let records = fit_seeds(&seeds, &mut LineFitter::default(), &config, &mut stats);
        assert!(records[0].is_some());
        assert!(records[1].is_none());
        assert_eq!(stats.n_seeds, 2);
        assert_eq!(stats.n_attempted, 1);
        assert_eq!(stats.n_low_purity, 1);
        assert_eq!(stats.n_good, 1);
        assert_eq!(stats.n_converged, 1);
    }

    #[test]
    fn failures_do_not_abort() {
        let seeds = vec![seed(&[1, 1, 1, 1]), seed(&[2, 2, 2, 2])];
        let mut stats = FitStats::default();
        let records = fit_seeds(&seeds, &mut FailingFitter, &FitterConfig::default(), &mut stats);
        assert_eq!(records, vec![None, None]);
        assert_eq!(stats.n_bad, 2);
    }

    #[test]
    fn disabled_fitting_skips_everything() {
        let config = FitterConfig {
            enable: false,
            ..FitterConfig::default()
        };
        let mut stats = FitStats::default();
        let records = fit_seeds(&[seed(&[1, 1, 1])], &mut FailingFitter, &config, &mut stats);
        assert_eq!(records, vec![None]);
        assert_eq!(stats.n_attempted, 0);
    }
}
