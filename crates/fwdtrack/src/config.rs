//! Tracker configuration.
//!
//! Every section carries the defaults of the forward tracker it was tuned
//! for and can be loaded partially from JSON. Per-iteration sections in
//! [`TrackFinderConfig::iterations`] override the global section of the same
//! name; a missing override falls back to the global one.

use std::path::Path;

use crate::error::ConfigError;

/// Largest accepted number of phi slices.
pub const MAX_PHI_SLICES: usize = 100;

/// One configured criterion.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CriterionSpec {
    /// Registry name, e.g. `Crit2_RZRatio`.
    pub name: String,
    /// Lower bound of the accepted range.
    pub min: f64,
    /// Upper bound of the accepted range.
    pub max: f64,
    /// Inactive criteria are skipped.
    pub active: bool,
}

impl CriterionSpec {
    pub fn new(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            active: true,
        }
    }
}

impl Default for CriterionSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            min: 0.0,
            max: 1.0,
            active: true,
        }
    }
}

/// 2-hit segment construction.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SegmentBuilderConfig {
    /// 2-hit criteria; empty accepts every pair.
    pub criteria: Vec<CriterionSpec>,
}

/// Which layer pairs may be connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Maximum layer-key distance between the two hits of a segment.
    pub distance: u32,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self { distance: 1 }
    }
}

/// 3-hit lengthening and automaton controls.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ThreeHitConfig {
    /// 3-hit criteria; empty accepts every triple.
    pub criteria: Vec<CriterionSpec>,
    /// Run state propagation.
    pub do_automaton: bool,
    /// Prune segments that cannot reach the minimum chain length.
    /// Only applied when `do_automaton` is set.
    pub clean_bad_states: bool,
    /// Upper bound on propagation sweeps.
    pub max_sweeps: usize,
}

impl Default for ThreeHitConfig {
    fn default() -> Self {
        Self {
            criteria: Vec::new(),
            do_automaton: true,
            clean_bad_states: true,
            max_sweeps: 100,
        }
    }
}

/// Hopfield subset selection.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SubsetConfig {
    /// When disabled every chain passing `min_hits_on_track` is accepted and
    /// accepted chains may share hits.
    pub active: bool,
    /// Minimum number of hits of an enumerated chain.
    pub min_hits_on_track: usize,
    /// Geometric temperature decay factor, in `(0, 1)`.
    pub omega: f64,
    /// Largest per-sweep activation change considered stable.
    pub stable_threshold: f64,
    /// Initial temperature.
    pub initial_temp: f64,
    /// Temperature floor.
    pub inf_temp: f64,
    /// Weight of a chain's own quality in its input.
    pub quality_weight: f64,
    /// Chain length at which the default quality saturates at 1.
    pub quality_reference_hits: usize,
    /// Starting activation of every neuron before jitter.
    pub initial_activation: f64,
    /// Activation above which a chain is accepted.
    pub activation_threshold: f64,
    /// Upper bound on relaxation sweeps.
    pub max_sweeps: usize,
    /// Seed for update order and activation jitter.
    pub seed: u64,
}

impl Default for SubsetConfig {
    fn default() -> Self {
        Self {
            active: true,
            min_hits_on_track: 7,
            omega: 0.75,
            stable_threshold: 0.1,
            initial_temp: 2.1,
            inf_temp: 0.1,
            quality_weight: 0.5,
            quality_reference_hits: 7,
            initial_activation: 0.5,
            activation_threshold: 0.5,
            max_sweeps: 1000,
            seed: 1,
        }
    }
}

/// Removal of accepted hits between iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HitRemoverConfig {
    pub active: bool,
}

impl Default for HitRemoverConfig {
    fn default() -> Self {
        Self { active: true }
    }
}

/// Per-iteration overrides; `None` falls back to the global section.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct IterationOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_builder: Option<SegmentBuilderConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector: Option<ConnectorConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub three_hit_segments: Option<ThreeHitConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subset_nn: Option<SubsetConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_remover: Option<HitRemoverConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_phi_slices: Option<usize>,
}

/// Track finding controls.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrackFinderConfig {
    /// Number of find/remove iterations.
    pub n_iterations: usize,
    /// Build seeds from truth labels instead of running the automaton.
    pub truth_seeding: bool,
    pub segment_builder: SegmentBuilderConfig,
    pub connector: ConnectorConfig,
    pub three_hit_segments: ThreeHitConfig,
    pub subset_nn: SubsetConfig,
    pub hit_remover: HitRemoverConfig,
    /// Number of equal-width azimuthal wedges, `1..=100`.
    pub n_phi_slices: usize,
    /// Overrides indexed by iteration number.
    pub iterations: Vec<IterationOverrides>,
}

impl Default for TrackFinderConfig {
    fn default() -> Self {
        Self {
            n_iterations: 1,
            truth_seeding: false,
            segment_builder: SegmentBuilderConfig::default(),
            connector: ConnectorConfig::default(),
            three_hit_segments: ThreeHitConfig::default(),
            subset_nn: SubsetConfig::default(),
            hit_remover: HitRemoverConfig::default(),
            n_phi_slices: 1,
            iterations: Vec::new(),
        }
    }
}

/// Fully resolved settings of one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationConfig {
    pub index: usize,
    pub segment_builder: SegmentBuilderConfig,
    pub connector: ConnectorConfig,
    pub three_hit_segments: ThreeHitConfig,
    pub subset_nn: SubsetConfig,
    pub hit_remover: HitRemoverConfig,
    /// Always within `1..=MAX_PHI_SLICES`.
    pub n_phi_slices: usize,
}

impl TrackFinderConfig {
    /// Resolve iteration `index` against the global sections.
    ///
    /// An out-of-range slice count is reset to 1 with a warning.
    pub fn iteration(&self, index: usize) -> IterationConfig {
        let overrides = self.iterations.get(index).cloned().unwrap_or_default();
        let mut n_phi_slices = overrides.n_phi_slices.unwrap_or(self.n_phi_slices);
        if n_phi_slices == 0 || n_phi_slices > MAX_PHI_SLICES {
            tracing::warn!(
                iteration = index,
                n_phi_slices,
                "invalid phi slice count, resetting to 1"
            );
            n_phi_slices = 1;
        }
        IterationConfig {
            index,
            segment_builder: overrides
                .segment_builder
                .unwrap_or_else(|| self.segment_builder.clone()),
            connector: overrides.connector.unwrap_or(self.connector),
            three_hit_segments: overrides
                .three_hit_segments
                .unwrap_or_else(|| self.three_hit_segments.clone()),
            subset_nn: overrides
                .subset_nn
                .unwrap_or_else(|| self.subset_nn.clone()),
            hit_remover: overrides.hit_remover.unwrap_or(self.hit_remover),
            n_phi_slices,
        }
    }
}

/// Fitter collaborator usage.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FitterConfig {
    /// Fit accepted seeds.
    pub enable: bool,
    /// Extend converged fits with hits from the extension population.
    pub refit_with_extension: bool,
    /// Seeds with a truth purity below this are not fitted.
    pub truth_quality_min: f64,
}

impl Default for FitterConfig {
    fn default() -> Self {
        Self {
            enable: true,
            refit_with_extension: true,
            truth_quality_min: 0.0,
        }
    }
}

/// Nearest-hit association window.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AssociatorConfig {
    /// Azimuthal tolerance in radians.
    pub delta_phi: f64,
    /// Radial tolerance in position units.
    pub delta_r: f64,
}

impl Default for AssociatorConfig {
    fn default() -> Self {
        Self {
            delta_phi: 0.004 * 15.5,
            delta_r: 0.75,
        }
    }
}

/// Magnetic field description injected into field-dependent criteria.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub bz_tesla: f64,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self { bz_tesla: 0.5 }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub finder: TrackFinderConfig,
    pub fitter: FitterConfig,
    pub associator: AssociatorConfig,
    pub field: FieldConfig,
}

fn invalid(key: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.into(),
        reason: reason.into(),
    }
}

impl SubsetConfig {
    fn validate(&self, prefix: &str) -> Result<(), ConfigError> {
        if !(self.omega > 0.0 && self.omega < 1.0) {
            return Err(invalid(format!("{prefix}.omega"), "must lie in (0, 1)"));
        }
        if !(self.inf_temp > 0.0 && self.inf_temp.is_finite()) {
            return Err(invalid(format!("{prefix}.inf_temp"), "must be positive"));
        }
        if !(self.initial_temp >= self.inf_temp && self.initial_temp.is_finite()) {
            return Err(invalid(
                format!("{prefix}.initial_temp"),
                "must be finite and not below inf_temp",
            ));
        }
        if !(self.stable_threshold > 0.0) {
            return Err(invalid(format!("{prefix}.stable_threshold"), "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.initial_activation) {
            return Err(invalid(format!("{prefix}.initial_activation"), "must lie in [0, 1]"));
        }
        if !(self.activation_threshold > 0.0 && self.activation_threshold < 1.0) {
            return Err(invalid(
                format!("{prefix}.activation_threshold"),
                "must lie in (0, 1)",
            ));
        }
        if !self.quality_weight.is_finite() {
            return Err(invalid(format!("{prefix}.quality_weight"), "must be finite"));
        }
        if self.quality_reference_hits == 0 {
            return Err(invalid(format!("{prefix}.quality_reference_hits"), "must be positive"));
        }
        // lengthening turns every chain into at least one 3-hit segment
        if self.min_hits_on_track < 3 {
            return Err(invalid(format!("{prefix}.min_hits_on_track"), "must be at least 3"));
        }
        Ok(())
    }
}

impl TrackerConfig {
    /// Parse a (possibly partial) JSON configuration.
    pub fn from_json_str(data: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a (possibly partial) JSON configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    /// Check numeric parameters of every iteration.
    ///
    /// Criterion names are checked separately, against a registry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for index in 0..self.finder.n_iterations.max(self.finder.iterations.len()) {
            let it = self.finder.iteration(index);
            let prefix = format!("finder.iterations[{index}]");
            if it.connector.distance == 0 {
                return Err(invalid(format!("{prefix}.connector.distance"), "must be at least 1"));
            }
            it.subset_nn.validate(&format!("{prefix}.subset_nn"))?;
        }
        let a = &self.associator;
        if !(a.delta_phi >= 0.0 && a.delta_r >= 0.0) {
            return Err(invalid("associator", "tolerances must be non-negative"));
        }
        if !self.field.bz_tesla.is_finite() {
            return Err(invalid("field.bz_tesla", "must be finite"));
        }
        Ok(())
    }
}
