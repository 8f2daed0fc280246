//! Error types.
//!
//! Only configuration problems are fatal, and they are raised before any
//! event is processed. Everything that can go wrong while an event is being
//! processed is recovered locally and reported through `tracing` and the
//! diagnostics sink.

use thiserror::Error;

use crate::criteria::Arity;

/// Invalid tracker configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A criterion name that is not present in the registry.
    #[error("unknown criterion '{name}'")]
    UnknownCriterion {
        /// Name requested by the configuration.
        name: String,
    },
    /// A criterion configured in a section that evaluates a different
    /// number of hits.
    #[error("criterion '{name}' evaluates {actual} hits, configured for {expected}")]
    ArityMismatch {
        /// Criterion name.
        name: String,
        /// Arity required by the section.
        expected: Arity,
        /// Arity of the criterion.
        actual: Arity,
    },
    /// A criterion range with `min > max` or non-finite bounds.
    #[error("criterion '{name}' has an invalid range [{min}, {max}]")]
    InvalidRange {
        /// Criterion name.
        name: String,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
    /// A numeric parameter outside its valid domain.
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue {
        /// Configuration key path.
        key: String,
        /// Human-readable explanation.
        reason: String,
    },
    /// Malformed JSON.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    /// Configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by a track fitter collaborator.
///
/// Always recoverable: the affected track keeps its previous state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// The fit ran but did not converge.
    #[error("fit did not converge")]
    NotConverged,
    /// The trajectory could not be extrapolated to the requested layer.
    #[error("cannot project onto layer {layer}: {reason}")]
    Projection {
        /// Target layer key.
        layer: i32,
        /// Fitter-specific explanation.
        reason: String,
    },
    /// Any other fitter failure.
    #[error("fit failed: {0}")]
    Failed(String),
}
