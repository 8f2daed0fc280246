//! Found tracks and per-event results.

use crate::fitter::FitRecord;
use crate::hit::{HitPopulation, HitRef, Seed};
use crate::truth::dominant_truth;

/// Where a seed came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedSource {
    /// Accepted by subset selection in the given iteration.
    Automaton { iteration: usize },
    /// Built from simulation truth.
    Truth,
}

/// One accepted seed with its fit and extension.
#[derive(Debug, Clone)]
pub struct FoundTrack {
    pub seed: Seed,
    pub source: SeedSource,
    /// Dominant truth id and purity, if any hit is labelled.
    pub truth: Option<(i32, f64)>,
    /// `None` when fitting is disabled, filtered, or failed.
    pub fit: Option<FitRecord>,
    /// Hits added by the extension pass, in extension-layer order.
    pub extension_hits: Vec<HitRef>,
}

impl FoundTrack {
    pub fn new(seed: Seed, source: SeedSource, fit: Option<FitRecord>) -> Self {
        let truth = dominant_truth(seed.hits().iter().map(|h| h.as_ref()));
        Self {
            seed,
            source,
            truth,
            fit,
            extension_hits: Vec::new(),
        }
    }

    /// Serializable view of the track.
    pub fn summary(&self) -> TrackSummary {
        TrackSummary {
            hit_ids: self.seed.hit_ids(),
            source: self.source,
            truth_track_id: self.truth.map(|(id, _)| id),
            truth_purity: self.truth.map(|(_, purity)| purity),
            converged: self.fit.as_ref().map(|f| f.converged),
            position: self.fit.as_ref().map(|f| f.position.into()),
            momentum: self.fit.as_ref().map(|f| f.momentum.into()),
            extension_hit_ids: self.extension_hits.iter().map(|h| h.id).collect(),
        }
    }
}

/// JSON-friendly description of a [`FoundTrack`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrackSummary {
    pub hit_ids: Vec<u32>,
    pub source: SeedSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truth_track_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truth_purity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converged: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub momentum: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension_hit_ids: Vec<u32>,
}

/// Outcome of one event.
#[derive(Debug, Clone, Default)]
pub struct EventResult {
    /// Tracks in iteration order, then in acceptance order.
    pub tracks: Vec<FoundTrack>,
    /// Hits not consumed by any accepted seed.
    pub residual: HitPopulation,
}

impl EventResult {
    pub fn summaries(&self) -> Vec<TrackSummary> {
        self.tracks.iter().map(FoundTrack::summary).collect()
    }
}
