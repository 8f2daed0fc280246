//! One finding iteration: slice, build, chain, select, remove.

use std::f64::consts::PI;
use std::sync::Arc;

use crate::automaton::Automaton;
use crate::config::{CriterionSpec, IterationConfig};
use crate::criteria::{Arity, CriteriaSet, CriterionObserver, CriterionRegistry};
use crate::diagnostics::{DiagnosticsSink, IterationStats};
use crate::error::ConfigError;
use crate::hit::{HitPopulation, Seed};
use crate::segment_builder::SegmentBuilder;
use crate::subset::{Compatibility, HitCountQuality, SeedQuality, SubsetSelector};

/// Slices (and iterations) with fewer hits are skipped.
pub const MIN_SLICE_HITS: usize = 4;

/// Resolved configuration plus the criteria built for it.
#[derive(Debug)]
pub struct IterationPlan {
    pub config: IterationConfig,
    pub two_hit: CriteriaSet,
    pub three_hit: CriteriaSet,
}

fn criteria_set(
    arity: Arity,
    specs: &[CriterionSpec],
    registry: &CriterionRegistry,
) -> Result<CriteriaSet, ConfigError> {
    let mut set = CriteriaSet::new(arity);
    for spec in specs {
        if !spec.active {
            tracing::info!(criterion = %spec.name, "inactive criterion skipped");
            continue;
        }
        set.push(registry.create(&spec.name, spec.min, spec.max)?)?;
    }
    if set.is_empty() {
        tracing::warn!(%arity, "no active criteria, every hit combination is accepted");
    }
    Ok(set)
}

impl IterationPlan {
    /// Build the criteria of `config`; fails on unknown names, invalid
    /// ranges, or criteria configured in the wrong section.
    pub fn compile(
        config: IterationConfig,
        registry: &CriterionRegistry,
    ) -> Result<Self, ConfigError> {
        let two_hit = criteria_set(Arity::Two, &config.segment_builder.criteria, registry)?;
        let three_hit =
            criteria_set(Arity::Three, &config.three_hit_segments.criteria, registry)?;
        Ok(Self {
            config,
            two_hit,
            three_hit,
        })
    }

    pub(crate) fn set_observer(&mut self, observer: Option<Arc<dyn CriterionObserver>>) {
        self.two_hit.set_observer(observer.clone());
        self.three_hit.set_observer(observer);
    }
}

/// Seed scoring used by subset selection.
///
/// Without a quality override each iteration scores seeds with
/// [`HitCountQuality`] at its configured reference length.
#[derive(Clone, Copy)]
pub(crate) struct Scoring<'a> {
    pub compatibility: &'a dyn Compatibility,
    pub quality: Option<&'a dyn SeedQuality>,
}

/// `[lo, hi)` bounds of wedge `index` out of `n` over `[-π, π)`.
///
/// The last wedge ends exactly at `π`.
pub fn phi_slice_bounds(index: usize, n: usize) -> (f64, f64) {
    let width = 2.0 * PI / n as f64;
    let lo = -PI + width * index as f64;
    let hi = if index + 1 == n {
        PI
    } else {
        -PI + width * (index + 1) as f64
    };
    (lo, hi)
}

/// Segment building, automaton, and subset selection on one population.
///
/// Counters are added to `stats`. The population is not modified.
pub(crate) fn find_in_population(
    plan: &IterationPlan,
    population: &HitPopulation,
    scoring: Scoring<'_>,
    stats: &mut IterationStats,
) -> Vec<Seed> {
    let cfg = &plan.config;
    let mut automaton: Automaton =
        SegmentBuilder::new(&plan.two_hit, cfg.connector.distance).build(population);
    stats.n_segments += automaton.len();
    stats.n_connections += automaton.n_connections();

    automaton.lengthen_segments(&plan.three_hit);
    stats.n_three_hit_segments += automaton.len();

    let three_hit = &cfg.three_hit_segments;
    let min_hits = cfg.subset_nn.min_hits_on_track;
    if three_hit.do_automaton {
        let outcome = automaton.do_automaton(three_hit.max_sweeps);
        if three_hit.clean_bad_states {
            let removed = automaton.clean_bad_states(min_hits);
            tracing::trace!(removed, sweeps = outcome.sweeps, "bad states cleaned");
        }
    }
    let seeds = automaton.get_tracks(min_hits);
    stats.n_seeds += seeds.len();

    let accepted = if cfg.subset_nn.active {
        let fallback = HitCountQuality::new(cfg.subset_nn.quality_reference_hits);
        let quality: &dyn SeedQuality = match scoring.quality {
            Some(quality) => quality,
            None => &fallback,
        };
        let result = SubsetSelector::new(&cfg.subset_nn).calculate_best_set(
            seeds,
            scoring.compatibility,
            quality,
        );
        stats.n_rejected += result.rejected.len();
        result.accepted
    } else {
        seeds
    };
    stats.n_accepted += accepted.len();
    accepted
}

/// Run one iteration over the residual population and remove the hits of
/// accepted seeds from it.
///
/// Seeds of all slices are concatenated in slice order before removal.
pub(crate) fn run_iteration(
    plan: &IterationPlan,
    residual: &mut HitPopulation,
    scoring: Scoring<'_>,
    sink: &mut dyn DiagnosticsSink,
) -> Vec<Seed> {
    let cfg = &plan.config;
    let n_slices = cfg.n_phi_slices;
    let mut stats = IterationStats {
        iteration: cfg.index,
        n_hits: residual.len(),
        n_slices,
        ..IterationStats::default()
    };

    let mut accepted = Vec::new();
    if residual.len() < MIN_SLICE_HITS {
        tracing::info!(
            iteration = cfg.index,
            n_hits = residual.len(),
            "too few hits, iteration skipped"
        );
        stats.n_slices_skipped = n_slices;
        sink.record_iteration(&stats);
        return accepted;
    }

    for index in 0..n_slices {
        let sliced;
        let population: &HitPopulation = if n_slices == 1 {
            &*residual
        } else {
            let (lo, hi) = phi_slice_bounds(index, n_slices);
            sliced = residual.slice_phi(lo, hi, index + 1 == n_slices);
            &sliced
        };
        if population.len() < MIN_SLICE_HITS {
            stats.n_slices_skipped += 1;
            continue;
        }
        let mut slice_stats = IterationStats::default();
        accepted.extend(find_in_population(plan, population, scoring, &mut slice_stats));
        stats.absorb(&slice_stats);
    }

    if cfg.hit_remover.active {
        let report = residual.remove_seed_hits(&accepted);
        stats.n_hits_removed = report.removed;
        stats.n_hits_missing = report.missing;
    }

    tracing::info!(
        iteration = cfg.index,
        n_hits = stats.n_hits,
        n_segments = stats.n_segments,
        n_seeds = stats.n_seeds,
        n_accepted = stats.n_accepted,
        n_removed = stats.n_hits_removed,
        "iteration finished"
    );
    sink.record_iteration(&stats);
    accepted
}
