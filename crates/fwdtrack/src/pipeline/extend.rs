//! Extension of fitted tracks with hits from a separate population.

use std::time::Instant;

use crate::associate::unique_near_hit;
use crate::config::AssociatorConfig;
use crate::diagnostics::FitStats;
use crate::fitter::TrackFitter;
use crate::hit::{HitPopulation, HitRef, LayerKey};

use super::{FoundTrack, SeedSource};

/// First hit of `hits` labelled with `truth_id`.
fn first_with_truth(hits: &[HitRef], truth_id: i32) -> Option<HitRef> {
    hits.iter()
        .find(|h| h.truth_track_id() == Some(truth_id))
        .cloned()
}

/// Extend every converged track with at most one hit per extension layer and
/// refit with them.
///
/// Automaton tracks are projected onto each layer and keep layers with
/// exactly one nearby hit. Truth-seeded tracks take the first hit carrying
/// their dominant truth id instead.
///
/// A failed refit, or one that leaves the transverse momentum unchanged,
/// keeps the previous momentum. Tracks without a converged fit are skipped.
pub(crate) fn extend_tracks<F: TrackFitter + ?Sized>(
    tracks: &mut [FoundTrack],
    extension: &HitPopulation,
    fitter: &mut F,
    window: &AssociatorConfig,
    stats: &mut FitStats,
) {
    let layers: Vec<LayerKey> = extension.layer_keys().collect();
    if layers.is_empty() {
        return;
    }
    for track in tracks.iter_mut() {
        let Some(fit) = track.fit.clone() else {
            continue;
        };
        if !fit.converged {
            tracing::debug!(hits = ?track.seed.hit_ids(), "unconverged track not extended");
            continue;
        }
        stats.n_possible_refits += 1;

        let selection: Vec<Option<HitRef>> = match track.source {
            SeedSource::Truth => {
                let truth_id = track.truth.map(|(id, _)| id);
                layers
                    .iter()
                    .map(|&layer| {
                        truth_id.and_then(|id| first_with_truth(extension.layer(layer), id))
                    })
                    .collect()
            }
            SeedSource::Automaton { .. } => layers
                .iter()
                .map(|&layer| match fitter.project(&fit, layer) {
                    Ok(state) => unique_near_hit(extension.layer(layer), &state, window),
                    Err(err) => {
                        tracing::warn!(layer, error = %err, "projection failed, layer unmatched");
                        None
                    }
                })
                .collect(),
        };
        let n_matched = selection.iter().flatten().count();
        *stats.n_extended_by.entry(n_matched).or_default() += 1;
        if n_matched == 0 {
            continue;
        }

        stats.n_attempted_refits += 1;
        let start = Instant::now();
        let outcome = fitter.refit(&fit, &track.seed, &selection);
        stats.add_duration(start.elapsed());
        match outcome {
            Ok(momentum) if momentum.x.hypot(momentum.y) != fit.pt() => {
                stats.n_good_refits += 1;
                if let Some(record) = track.fit.as_mut() {
                    record.momentum = momentum;
                }
                track.extension_hits = selection.into_iter().flatten().collect();
            }
            Ok(_) => {
                stats.n_bad_refits += 1;
                tracing::debug!(hits = ?track.seed.hit_ids(), "refit left pt unchanged");
            }
            Err(err) => {
                stats.n_bad_refits += 1;
                tracing::warn!(hits = ?track.seed.hit_ids(), error = %err, "refit failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FitError;
    use crate::fitter::{layer_planes, FitRecord, LineFitter, LineFitterConfig, TrackFitter};
    use crate::hit::{Hit, Seed};
    use nalgebra::Vector3;
    use std::sync::Arc;

    fn track_on(direction: [f64; 3], n: usize, fitter: &mut LineFitter) -> FoundTrack {
        let hits: Vec<HitRef> = (0..n)
            .map(|k| {
                let t = (k + 1) as f64;
                let p = [direction[0] * t, direction[1] * t, direction[2] * t];
                Arc::new(Hit::new(k as u32, k as LayerKey, p))
            })
            .collect();
        let seed = Seed::new(hits);
        let fit = fitter.fit(&seed).ok();
        FoundTrack::new(seed, SeedSource::Automaton { iteration: 0 }, fit)
    }

    fn truth_track(truth_id: i32, fitter: &mut LineFitter) -> FoundTrack {
        let hits: Vec<HitRef> = (0..4)
            .map(|k| {
                let t = (k + 1) as f64;
                Arc::new(Hit::new(k, k as LayerKey, [t, t, 10.0 * t]).with_truth(truth_id))
            })
            .collect();
        let seed = Seed::new(hits);
        let fit = fitter.fit(&seed).ok();
        FoundTrack::new(seed, SeedSource::Truth, fit)
    }

    /// Line fitter whose refits reverse the transverse direction.
    struct ReversingFitter(LineFitter);

    impl TrackFitter for ReversingFitter {
        fn fit(&mut self, seed: &Seed) -> Result<FitRecord, FitError> {
            self.0.fit(seed)
        }

        fn refit(
            &mut self,
            fit: &FitRecord,
            _seed: &Seed,
            _extension: &[Option<HitRef>],
        ) -> Result<Vector3<f64>, FitError> {
            Ok(Vector3::new(-fit.momentum.x, -fit.momentum.y, fit.momentum.z))
        }

        fn project(
            &mut self,
            fit: &FitRecord,
            layer: LayerKey,
        ) -> Result<crate::fitter::ProjectedState, FitError> {
            self.0.project(fit, layer)
        }
    }

    #[test]
    fn single_matches_are_attached() {
        // extension disks behind the seed along the same line, slightly bent
        let extension = HitPopulation::from_hits([
            Hit::new(100, 10, [5.0, 5.05, 50.0]),
            Hit::new(101, 11, [6.0, 6.1, 60.0]),
            Hit::new(102, 11, [-9.0, -9.0, 60.0]),
        ]);
        let mut fitter = LineFitter::default().with_planes(layer_planes(&extension));
        let mut tracks = vec![track_on([1.0, 1.0, 10.0], 4, &mut fitter)];
        let before = tracks[0].fit.clone().unwrap().momentum;
        let mut stats = FitStats::default();
        extend_tracks(
            &mut tracks,
            &extension,
            &mut fitter,
            &AssociatorConfig::default(),
            &mut stats,
        );
        let ids: Vec<u32> = tracks[0].extension_hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![100, 101]);
        assert_eq!(stats.n_attempted_refits, 1);
        assert_eq!(stats.n_good_refits, 1);
        assert_ne!(tracks[0].fit.as_ref().unwrap().momentum, before);
    }

    #[test]
    fn ambiguous_and_unprojectable_layers_stay_unmatched() {
        let extension = HitPopulation::from_hits([
            Hit::new(100, 10, [5.0, 5.0, 50.0]),
            Hit::new(101, 10, [5.1, 5.0, 50.0]),
            Hit::new(102, 12, [7.0, 7.0, 70.0]),
        ]);
        // no plane for layer 12
        let planes = layer_planes(&extension)
            .into_iter()
            .filter(|(k, _)| *k != 12)
            .collect();
        let mut fitter = LineFitter::default().with_planes(planes);
        let mut tracks = vec![track_on([1.0, 1.0, 10.0], 4, &mut fitter)];
        let mut stats = FitStats::default();
        extend_tracks(
            &mut tracks,
            &extension,
            &mut fitter,
            &AssociatorConfig::default(),
            &mut stats,
        );
        assert!(tracks[0].extension_hits.is_empty());
        assert_eq!(stats.n_extended_by.get(&0), Some(&1));
        assert_eq!(stats.n_attempted_refits, 0);
    }

    #[test]
    fn tracks_without_converged_fit_are_skipped() {
        let extension = HitPopulation::from_hits([Hit::new(100, 10, [5.0, 5.0, 50.0])]);
        let mut fitter = LineFitter::default().with_planes(layer_planes(&extension));
        let mut unfitted = track_on([1.0, 1.0, 10.0], 4, &mut fitter);
        unfitted.fit = None;
        let mut unconverged = track_on([1.0, 1.0, 10.0], 4, &mut fitter);
        if let Some(fit) = unconverged.fit.as_mut() {
            fit.converged = false;
        }
        let good = track_on([1.0, 1.0, 10.0], 4, &mut fitter);
        let mut tracks = vec![unfitted, unconverged, good];
        let mut stats = FitStats::default();
        extend_tracks(
            &mut tracks,
            &extension,
            &mut fitter,
            &AssociatorConfig::default(),
            &mut stats,
        );
        assert_eq!(stats.n_possible_refits, 1);
        assert_eq!(stats.n_attempted_refits, 1);
        assert!(tracks[0].extension_hits.is_empty());
        assert!(tracks[1].extension_hits.is_empty());
    }

    #[test]
    fn truth_tracks_take_the_first_hit_with_their_label() {
        // hit 101 sits on the projection but belongs to another particle,
        // hit 100 is far off the line but shares the track's label
        let extension = HitPopulation::from_hits([
            Hit::new(101, 10, [5.0, 5.0, 50.0]).with_truth(3),
            Hit::new(100, 10, [7.0, 4.5, 50.0]).with_truth(7),
            Hit::new(102, 11, [6.0, 6.0, 60.0]),
            Hit::new(103, 11, [6.2, 6.1, 60.0]).with_truth(7),
            Hit::new(104, 11, [6.3, 6.2, 60.0]).with_truth(7),
            Hit::new(105, 12, [7.0, 7.0, 70.0]).with_truth(3),
        ]);
        // no planes: truth matching never projects
        let mut fitter = LineFitter::new(LineFitterConfig {
            max_rms: 5.0,
            ..LineFitterConfig::default()
        });
        let mut tracks = vec![truth_track(7, &mut fitter), truth_track(9, &mut fitter)];
        let mut stats = FitStats::default();
        extend_tracks(
            &mut tracks,
            &extension,
            &mut fitter,
            &AssociatorConfig::default(),
            &mut stats,
        );
        let ids: Vec<u32> = tracks[0].extension_hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![100, 103]);
        assert!(tracks[1].extension_hits.is_empty());
        assert_eq!(stats.n_extended_by.get(&2), Some(&1));
        assert_eq!(stats.n_extended_by.get(&0), Some(&1));
        assert_eq!(stats.n_good_refits, 1);
    }

    #[test]
    fn refit_with_unchanged_pt_is_bad() {
        let extension = HitPopulation::from_hits([Hit::new(100, 10, [5.0, 5.0, 50.0])]);
        let mut line = LineFitter::default().with_planes(layer_planes(&extension));
        let mut tracks = vec![track_on([1.0, 1.0, 10.0], 4, &mut line)];
        let before = tracks[0].fit.clone().unwrap().momentum;
        let mut fitter = ReversingFitter(line);
        let mut stats = FitStats::default();
        extend_tracks(
            &mut tracks,
            &extension,
            &mut fitter,
            &AssociatorConfig::default(),
            &mut stats,
        );
        assert_eq!(stats.n_attempted_refits, 1);
        assert_eq!(stats.n_bad_refits, 1);
        assert_eq!(stats.n_good_refits, 0);
        assert!(tracks[0].extension_hits.is_empty());
        assert_eq!(tracks[0].fit.as_ref().unwrap().momentum, before);
    }
}
