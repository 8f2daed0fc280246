//! High-level tracking API.
//!
//! [`Tracker`] is the primary entry point. It validates a [`TrackerConfig`],
//! builds the criteria of every iteration once, and then processes any
//! number of events.

use std::sync::Arc;

use crate::config::TrackerConfig;
use crate::criteria::{CriterionObserver, CriterionRegistry};
use crate::diagnostics::{DiagnosticsSink, FitStats, IterationStats};
use crate::error::ConfigError;
use crate::fitter::TrackFitter;
use crate::hit::{HitPopulation, Seed};
use crate::pipeline::{
    extend_tracks, find_in_population, fit_seeds, run_iteration, EventResult, FoundTrack,
    IterationPlan, Scoring, SeedSource,
};
use crate::subset::{Compatibility, SeedQuality, SharedHitCompatibility};
use crate::truth::seeds_from_truth;

/// Primary tracking interface.
///
/// Create once, process many events. All configuration problems surface
/// from the constructors; event processing never fails.
///
/// # Examples
///
/// ```no_run
/// use fwdtrack::{HitPopulation, LineFitter, NullSink, Tracker, TrackerConfig};
///
/// let tracker = Tracker::from_config(TrackerConfig::default()).unwrap();
/// let mut fitter = LineFitter::default();
/// let result = tracker.process_event(HitPopulation::new(), None, &mut fitter, &mut NullSink);
/// println!("found {} tracks", result.tracks.len());
/// ```
pub struct Tracker {
    config: TrackerConfig,
    plans: Vec<IterationPlan>,
    compatibility: Box<dyn Compatibility + Send + Sync>,
    quality: Option<Box<dyn SeedQuality + Send + Sync>>,
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("config", &self.config)
            .field("plans", &self.plans)
            .finish_non_exhaustive()
    }
}

impl Tracker {
    /// Validate `config` and build every iteration's criteria from
    /// `registry`.
    pub fn new(config: TrackerConfig, registry: &CriterionRegistry) -> Result<Self, ConfigError> {
        config.validate()?;
        if registry.bz_tesla() != config.field.bz_tesla {
            tracing::warn!(
                registry_bz = registry.bz_tesla(),
                config_bz = config.field.bz_tesla,
                "criterion registry uses a different field than the configuration"
            );
        }
        let plans = (0..config.finder.n_iterations)
            .map(|index| IterationPlan::compile(config.finder.iteration(index), registry))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(n_iterations = plans.len(), "tracker configured");
        Ok(Self {
            config,
            plans,
            compatibility: Box::new(SharedHitCompatibility),
            quality: None,
        })
    }

    /// Use the built-in criteria with the configured magnetic field.
    pub fn from_config(config: TrackerConfig) -> Result<Self, ConfigError> {
        let registry = CriterionRegistry::with_builtin(config.field.bz_tesla);
        Self::new(config, &registry)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Resolved iteration plans.
    pub fn plans(&self) -> &[IterationPlan] {
        &self.plans
    }

    /// Attach (or detach) an observer to every criterion evaluation.
    pub fn set_observer(&mut self, observer: Option<Arc<dyn CriterionObserver>>) {
        for plan in &mut self.plans {
            plan.set_observer(observer.clone());
        }
    }

    /// Replace the pairwise seed compatibility used by subset selection.
    pub fn with_compatibility(
        mut self,
        compatibility: impl Compatibility + Send + Sync + 'static,
    ) -> Self {
        self.compatibility = Box::new(compatibility);
        self
    }

    /// Replace the seed quality used by subset selection in every iteration.
    pub fn with_quality(mut self, quality: impl SeedQuality + Send + Sync + 'static) -> Self {
        self.quality = Some(Box::new(quality));
        self
    }

    fn scoring(&self) -> Scoring<'_> {
        Scoring {
            compatibility: &*self.compatibility,
            quality: self.quality.as_deref().map(|q| q as &dyn SeedQuality),
        }
    }

    /// Run segment building, the automaton and subset selection of
    /// iteration `iteration` on `population` without removing hits.
    ///
    /// Returns an empty set for an unknown iteration.
    pub fn find_in_population(&self, iteration: usize, population: &HitPopulation) -> Vec<Seed> {
        match self.plans.get(iteration) {
            Some(plan) => find_in_population(
                plan,
                population,
                self.scoring(),
                &mut IterationStats::default(),
            ),
            None => Vec::new(),
        }
    }

    /// Find, fit and extend the tracks of one event.
    ///
    /// `population` becomes the residual hit population. When `extension`
    /// is given, converged tracks are extended with its hits.
    pub fn process_event<F: TrackFitter + ?Sized>(
        &self,
        population: HitPopulation,
        extension: Option<&HitPopulation>,
        fitter: &mut F,
        sink: &mut dyn DiagnosticsSink,
    ) -> EventResult {
        let mut residual = population;
        let mut fit_stats = FitStats::default();
        let mut tracks = Vec::new();

        if self.config.finder.truth_seeding {
            let seeds = seeds_from_truth(&residual);
            let fits = fit_seeds(&seeds, fitter, &self.config.fitter, &mut fit_stats);
            tracks.extend(
                seeds
                    .into_iter()
                    .zip(fits)
                    .map(|(seed, fit)| FoundTrack::new(seed, SeedSource::Truth, fit)),
            );
        } else {
            for plan in &self.plans {
                let accepted = run_iteration(plan, &mut residual, self.scoring(), sink);
                let fits = fit_seeds(&accepted, fitter, &self.config.fitter, &mut fit_stats);
                let source = SeedSource::Automaton {
                    iteration: plan.config.index,
                };
                tracks.extend(
                    accepted
                        .into_iter()
                        .zip(fits)
                        .map(|(seed, fit)| FoundTrack::new(seed, source, fit)),
                );
            }
        }

        match extension {
            Some(extra) if self.config.fitter.refit_with_extension => {
                extend_tracks(
                    &mut tracks,
                    extra,
                    fitter,
                    &self.config.associator,
                    &mut fit_stats,
                );
            }
            Some(_) => tracing::info!("extension population given but refit disabled"),
            None => {}
        }

        tracing::info!(
            n_tracks = tracks.len(),
            n_residual = residual.len(),
            n_fitted = fit_stats.n_attempted,
            n_refitted = fit_stats.n_good_refits,
            "event finished"
        );
        sink.record_fits(&fit_stats);
        EventResult { tracks, residual }
    }
}
