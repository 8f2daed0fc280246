//! Per-iteration and per-event counters.
//!
//! Counters are pushed into a [`DiagnosticsSink`]. No decision of the finder
//! depends on the sink.

use std::collections::BTreeMap;
use std::time::Duration;

/// Counters of one finding iteration, summed over its phi slices.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IterationStats {
    pub iteration: usize,
    /// Residual hits available at the start of the iteration.
    pub n_hits: usize,
    pub n_slices: usize,
    /// Slices skipped for holding too few hits.
    pub n_slices_skipped: usize,
    /// 2-hit segments built.
    pub n_segments: usize,
    /// Links between 2-hit segments.
    pub n_connections: usize,
    /// Segments after lengthening.
    pub n_three_hit_segments: usize,
    /// Candidate seeds handed to subset selection.
    pub n_seeds: usize,
    pub n_accepted: usize,
    pub n_rejected: usize,
    pub n_hits_removed: usize,
    /// Accepted hits that were no longer in the residual population.
    pub n_hits_missing: usize,
}

impl IterationStats {
    /// Add the counters of one slice.
    pub fn absorb(&mut self, slice: &IterationStats) {
        self.n_segments += slice.n_segments;
        self.n_connections += slice.n_connections;
        self.n_three_hit_segments += slice.n_three_hit_segments;
        self.n_seeds += slice.n_seeds;
        self.n_accepted += slice.n_accepted;
        self.n_rejected += slice.n_rejected;
    }
}

/// Fit and refit outcome counters of one event.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FitStats {
    pub n_seeds: usize,
    pub n_attempted: usize,
    /// Fits with a transverse momentum above [`GOOD_FIT_MIN_PT`].
    pub n_good: usize,
    pub n_bad: usize,
    pub n_converged: usize,
    /// Seeds skipped by the truth-purity filter.
    pub n_low_purity: usize,
    pub n_possible_refits: usize,
    pub n_attempted_refits: usize,
    pub n_good_refits: usize,
    /// Failed refits and refits that left the momentum unchanged.
    pub n_bad_refits: usize,
    /// Number of tracks keyed by how many extension hits they received.
    pub n_extended_by: BTreeMap<usize, usize>,
    /// Wall time spent inside the fitter, in milliseconds.
    pub fit_duration_ms: f64,
}

/// Smallest transverse momentum (GeV/c) of a good fit.
pub const GOOD_FIT_MIN_PT: f64 = 1e-3;

impl FitStats {
    pub fn add_duration(&mut self, elapsed: Duration) {
        self.fit_duration_ms += elapsed.as_secs_f64() * 1e3;
    }
}

/// Write-only receiver of diagnostics.
pub trait DiagnosticsSink {
    fn record_iteration(&mut self, stats: &IterationStats);

    fn record_fits(&mut self, stats: &FitStats);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn record_iteration(&mut self, _stats: &IterationStats) {}

    fn record_fits(&mut self, _stats: &FitStats) {}
}

/// Keeps the counters of one event for reporting.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EventSummary {
    pub iterations: Vec<IterationStats>,
    pub fits: FitStats,
}

impl EventSummary {
    pub fn total_accepted(&self) -> usize {
        self.iterations.iter().map(|it| it.n_accepted).sum()
    }
}

impl DiagnosticsSink for EventSummary {
    fn record_iteration(&mut self, stats: &IterationStats) {
        self.iterations.push(stats.clone());
    }

    fn record_fits(&mut self, stats: &FitStats) {
        self.fits = stats.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_accumulate_into_iteration() {
        let mut total = IterationStats {
            iteration: 2,
            n_hits: 40,
            ..IterationStats::default()
        };
        let slice = IterationStats {
            n_segments: 5,
            n_seeds: 2,
            n_accepted: 1,
            n_rejected: 1,
            ..IterationStats::default()
        };
        total.absorb(&slice);
        total.absorb(&slice);
        assert_eq!(total.n_segments, 10);
        assert_eq!(total.n_accepted, 2);
        assert_eq!(total.n_hits, 40);
    }

    #[test]
    fn summary_serializes_counters() {
        let mut summary = EventSummary::default();
        summary.record_iteration(&IterationStats {
            n_accepted: 3,
            ..IterationStats::default()
        });
        let mut fits = FitStats::default();
        fits.add_duration(Duration::from_millis(4));
        fits.n_extended_by.insert(1, 2);
        summary.record_fits(&fits);
        assert_eq!(summary.total_accepted(), 3);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["iterations"][0]["n_accepted"], 3);
        assert_eq!(json["fits"]["n_extended_by"]["1"], 2);
        assert!((summary.fits.fit_duration_ms - 4.0).abs() < 1e-9);
    }
}
