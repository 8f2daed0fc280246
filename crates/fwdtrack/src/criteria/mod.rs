//! Geometric accept/reject predicates over 2 or 3 hits.
//!
//! A [`Criterion`] computes one scalar from hits given in chain order (inner
//! layer first) and accepts it when it falls inside `[min, max]`. A
//! [`CriteriaSet`] combines the criteria of one finding stage with logical
//! AND; an empty set accepts everything.

mod measure;
mod observer;
mod registry;

use std::fmt;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::hit::Hit;

pub use measure::{Measure, MeasureCriterion, PT_STRAIGHT_LINE};
pub use observer::{CriterionObserver, CriterionValueRecorder, RecordedValues};
pub use registry::{CriterionParams, CriterionRegistry};

/// Number of hits a criterion evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Arity {
    Two,
    Three,
}

impl Arity {
    pub fn hits(self) -> usize {
        match self {
            Self::Two => 2,
            Self::Three => 3,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hits())
    }
}

/// A named, parameterised geometric predicate.
///
/// Implementations are stateless; value recording is done by an attached
/// [`CriterionObserver`], never by the criterion itself.
pub trait Criterion: fmt::Debug + Send + Sync {
    /// Registry name.
    fn name(&self) -> &str;

    fn arity(&self) -> Arity;

    /// Accepted value range `[min, max]`, inclusive.
    fn range(&self) -> (f64, f64);

    /// Criterion value for `hits` (length equals [`Criterion::arity`]).
    fn value(&self, hits: &[&Hit]) -> f64;

    /// Range check; non-finite values are rejected.
    fn accepts_value(&self, value: f64) -> bool {
        let (min, max) = self.range();
        !value.is_nan() && value >= min && value <= max
    }
}

/// The AND-combination of all active criteria of one stage.
#[derive(Debug)]
pub struct CriteriaSet {
    arity: Arity,
    criteria: Vec<Box<dyn Criterion>>,
    observer: Option<Arc<dyn CriterionObserver>>,
}

impl CriteriaSet {
    /// An empty set; accepts every hit combination.
    pub fn new(arity: Arity) -> Self {
        Self {
            arity,
            criteria: Vec::new(),
            observer: None,
        }
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Add a criterion, rejecting one of the wrong arity.
    pub fn push(&mut self, criterion: Box<dyn Criterion>) -> Result<(), ConfigError> {
        if criterion.arity() != self.arity {
            return Err(ConfigError::ArityMismatch {
                name: criterion.name().to_string(),
                expected: self.arity,
                actual: criterion.arity(),
            });
        }
        self.criteria.push(criterion);
        Ok(())
    }

    /// Attach an observer that sees every evaluation.
    pub fn set_observer(&mut self, observer: Option<Arc<dyn CriterionObserver>>) {
        self.observer = observer;
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.criteria.iter().map(|c| c.name())
    }

    /// `true` iff every criterion accepts `hits`.
    ///
    /// Without an observer evaluation stops at the first rejection; with one,
    /// every criterion is evaluated so that recorded value streams stay
    /// aligned across criteria.
    pub fn accepts(&self, hits: &[&Hit]) -> bool {
        debug_assert_eq!(hits.len(), self.arity.hits());
        match &self.observer {
            None => self
                .criteria
                .iter()
                .all(|c| c.accepts_value(c.value(hits))),
            Some(observer) => {
                let mut all = true;
                for c in &self.criteria {
                    let value = c.value(hits);
                    let accepted = c.accepts_value(value);
                    observer.observe(c.name(), value, accepted, hits);
                    all &= accepted;
                }
                all
            }
        }
    }
}
