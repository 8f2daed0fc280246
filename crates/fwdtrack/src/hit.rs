//! Hits, seeds and the per-event hit population.
//!
//! Hits are created once per event and shared through [`Arc`]; segments,
//! seeds and sliced populations reference the same allocation and never
//! copy hit data. Hit identity is the integer id, unique within an event.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::geometry;

/// Layer or sector key used to bucket hits.
pub type LayerKey = i32;

/// Ground-truth association of a simulated hit.
///
/// Used for diagnostics only; no finding decision reads it.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TruthLabel {
    /// Identifier of the generating particle.
    pub track_id: i32,
    /// Fraction of the hit's charge deposited by that particle.
    #[serde(default = "default_purity")]
    pub purity: f32,
}

fn default_purity() -> f32 {
    1.0
}

/// A single spatial measurement on one detector layer.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Hit {
    /// Event-unique identifier.
    pub id: u32,
    /// Layer/sector key.
    pub sector: LayerKey,
    /// Cartesian position `[x, y, z]`.
    pub position: [f64; 3],
    /// Optional truth association.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truth: Option<TruthLabel>,
}

impl Hit {
    /// Create an unlabelled hit.
    pub fn new(id: u32, sector: LayerKey, position: [f64; 3]) -> Self {
        Self {
            id,
            sector,
            position,
            truth: None,
        }
    }

    /// Attach a truth label with full purity.
    pub fn with_truth(mut self, track_id: i32) -> Self {
        self.truth = Some(TruthLabel {
            track_id,
            purity: 1.0,
        });
        self
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.position[0]
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.position[1]
    }

    #[inline]
    pub fn z(&self) -> f64 {
        self.position[2]
    }

    /// Transverse radius.
    #[inline]
    pub fn rho(&self) -> f64 {
        geometry::rho(self.position)
    }

    /// Azimuth in `[-π, π]`.
    #[inline]
    pub fn phi(&self) -> f64 {
        geometry::phi(self.position)
    }

    /// Truth track id, if labelled.
    #[inline]
    pub fn truth_track_id(&self) -> Option<i32> {
        self.truth.map(|t| t.track_id)
    }
}

/// Shared handle to a hit.
pub type HitRef = Arc<Hit>;

/// An ordered hit chain, one hit per layer, ordered by increasing layer key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Seed {
    hits: Vec<HitRef>,
}

impl Seed {
    pub fn new(hits: Vec<HitRef>) -> Self {
        Self { hits }
    }

    pub fn hits(&self) -> &[HitRef] {
        &self.hits
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Hit ids in chain order.
    pub fn hit_ids(&self) -> Vec<u32> {
        self.hits.iter().map(|h| h.id).collect()
    }

    /// Number of hits this seed shares with `other`.
    pub fn shared_hits(&self, other: &Seed) -> usize {
        self.hits
            .iter()
            .filter(|h| other.hits.iter().any(|o| o.id == h.id))
            .count()
    }

    /// `true` when no layer key occurs twice.
    pub fn has_unique_layers(&self) -> bool {
        let mut seen = BTreeSet::new();
        self.hits.iter().all(|h| seen.insert(h.sector))
    }
}

impl From<Vec<HitRef>> for Seed {
    fn from(hits: Vec<HitRef>) -> Self {
        Self::new(hits)
    }
}

/// Outcome of removing seed hits from a population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalReport {
    /// Hits erased from the population.
    pub removed: usize,
    /// Seed hits that were no longer present.
    pub missing: usize,
}

/// Hits of one event bucketed by layer key.
///
/// Iteration over layers is in ascending key order; hits within a layer keep
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitPopulation {
    layers: BTreeMap<LayerKey, Vec<HitRef>>,
}

impl HitPopulation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bucket owned hits by their sector key.
    pub fn from_hits(hits: impl IntoIterator<Item = Hit>) -> Self {
        let mut out = Self::new();
        for hit in hits {
            out.insert(Arc::new(hit));
        }
        out
    }

    pub fn insert(&mut self, hit: HitRef) {
        self.layers.entry(hit.sector).or_default().push(hit);
    }

    /// Total number of hits over all layers.
    pub fn len(&self) -> usize {
        self.layers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn layer(&self, key: LayerKey) -> &[HitRef] {
        self.layers.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Layer keys in ascending order (including emptied layers).
    pub fn layer_keys(&self) -> impl Iterator<Item = LayerKey> + '_ {
        self.layers.keys().copied()
    }

    pub fn layers(&self) -> impl Iterator<Item = (LayerKey, &[HitRef])> + '_ {
        self.layers.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// Every hit, layer by layer.
    pub fn iter(&self) -> impl Iterator<Item = &HitRef> + '_ {
        self.layers.values().flatten()
    }

    /// Sub-population of hits with azimuth in `[phi_min, phi_max)`.
    ///
    /// When `include_upper` is set the upper bound is inclusive, which the
    /// last slice of a `[-π, π]` partition uses to keep hits at exactly +π.
    pub fn slice_phi(&self, phi_min: f64, phi_max: f64, include_upper: bool) -> Self {
        let layers = self
            .layers
            .iter()
            .filter_map(|(key, hits)| {
                let kept: Vec<HitRef> = hits
                    .iter()
                    .filter(|h| {
                        let phi = h.phi();
                        phi >= phi_min && (phi < phi_max || (include_upper && phi <= phi_max))
                    })
                    .cloned()
                    .collect();
                (!kept.is_empty()).then_some((*key, kept))
            })
            .collect();
        Self { layers }
    }

    /// Erase every hit referenced by `seeds`.
    ///
    /// A hit that is no longer present is counted as missing and logged;
    /// it is never removed twice.
    pub fn remove_seed_hits(&mut self, seeds: &[Seed]) -> RemovalReport {
        let mut report = RemovalReport::default();
        for seed in seeds {
            for hit in seed.hits() {
                let position = self
                    .layers
                    .get(&hit.sector)
                    .and_then(|hits| hits.iter().position(|h| h.id == hit.id));
                match position {
                    Some(index) => {
                        if let Some(hits) = self.layers.get_mut(&hit.sector) {
                            hits.remove(index);
                            report.removed += 1;
                        }
                    }
                    None => {
                        tracing::warn!(
                            hit_id = hit.id,
                            sector = hit.sector,
                            "hit on accepted seed is missing from the residual population"
                        );
                        report.missing += 1;
                    }
                }
            }
        }
        report
    }
}
