//! Per-event finding pipeline.
//!
//! This module wires the finder stages together:
//! phi slicing -> segment building -> automaton -> subset selection ->
//! hit removal, repeated per iteration, followed by fitting and the
//! extension pass.
//!
//! The algorithmic pieces live in `crate::segment_builder`,
//! `crate::automaton`, `crate::subset` and `crate::associate`. The pipeline
//! layer owns stage order, the residual hit population and bookkeeping.

mod extend;
mod fit;
mod iteration;
mod result;

pub use iteration::{phi_slice_bounds, IterationPlan, MIN_SLICE_HITS};
pub use result::{EventResult, FoundTrack, SeedSource, TrackSummary};

pub(crate) use extend::extend_tracks;
pub(crate) use fit::fit_seeds;
pub(crate) use iteration::{find_in_population, run_iteration, Scoring};
