//! fwdtrack: combinatorial track finding for forward tracking detectors.
//!
//! Hits on a stack of detector layers are turned into track candidates by a
//! cellular automaton and disambiguated by a Hopfield network. The stages
//! are:
//!
//! 1. **Segments** – hit pairs between nearby layers that pass all 2-hit
//!    criteria.
//! 2. **Automaton** – lengthening to 3-hit segments, state propagation,
//!    pruning, and exhaustive chain enumeration.
//! 3. **Subset selection** – annealed relaxation that keeps a hit-disjoint
//!    set of chains.
//! 4. **Iterations** – optional phi slicing, hit removal, and repeated
//!    finding on the residual hits with per-iteration settings.
//! 5. **Fit and extension** – accepted seeds are handed to a
//!    [`TrackFitter`], and converged tracks are extended with unique nearby
//!    hits from a separate population.
//!
//! # Public API
//! - [`Tracker`] as the primary entry point
//! - [`TrackerConfig`] for tuning, loadable from JSON
//! - [`CriterionRegistry`] and [`CriterionObserver`] for criteria
//! - [`TrackFitter`] for plugging in a trajectory fitter
//! - [`DiagnosticsSink`] for per-event counters
//!
//! The stage modules are public for direct use and benchmarking.

pub mod associate;
pub mod automaton;
mod config;
pub mod criteria;
mod diagnostics;
mod error;
mod fitter;
pub mod geometry;
mod hit;
mod pipeline;
pub mod segment_builder;
pub mod subset;
mod tracker;
mod truth;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{
    AssociatorConfig, ConnectorConfig, CriterionSpec, FieldConfig, FitterConfig,
    HitRemoverConfig, IterationConfig, IterationOverrides, SegmentBuilderConfig, SubsetConfig,
    ThreeHitConfig, TrackFinderConfig, TrackerConfig, MAX_PHI_SLICES,
};
pub use criteria::{
    Arity, CriteriaSet, Criterion, CriterionObserver, CriterionRegistry, CriterionValueRecorder,
    RecordedValues,
};
pub use diagnostics::{
    DiagnosticsSink, EventSummary, FitStats, IterationStats, NullSink, GOOD_FIT_MIN_PT,
};
pub use error::{ConfigError, FitError};
pub use fitter::{
    layer_planes, FitRecord, LineFitter, LineFitterConfig, ProjectedState, TrackFitter,
};
pub use hit::{Hit, HitPopulation, HitRef, LayerKey, RemovalReport, Seed, TruthLabel};
pub use pipeline::{
    phi_slice_bounds, EventResult, FoundTrack, IterationPlan, SeedSource, TrackSummary,
    MIN_SLICE_HITS,
};
pub use tracker::Tracker;
pub use truth::{dominant_truth, seeds_from_truth, MIN_TRUTH_SEED_HITS};
