//! Name → constructor registry for criteria.

use std::collections::BTreeMap;
use std::fmt;

use super::{Criterion, Measure, MeasureCriterion};
use crate::error::ConfigError;

/// Parameters handed to a criterion constructor.
#[derive(Debug, Clone, PartialEq)]
pub struct CriterionParams {
    pub name: String,
    pub min: f64,
    pub max: f64,
    /// Solenoid field along z in tesla.
    pub bz_tesla: f64,
}

type Constructor = Box<dyn Fn(&CriterionParams) -> Box<dyn Criterion> + Send + Sync>;

const BUILTIN: [(&str, Measure); 9] = [
    ("Crit2_RZRatio", Measure::RzRatio),
    ("Crit2_DeltaRho", Measure::DeltaRho),
    ("Crit2_DeltaPhi", Measure::DeltaPhi),
    ("Crit2_StraightTrackRatio", Measure::StraightTrackRatio),
    ("Crit2_DeltaTheta", Measure::DeltaTheta),
    ("Crit3_3DAngle", Measure::Angle3d),
    ("Crit3_2DAngle", Measure::Angle2d),
    ("Crit3_ChangeRZRatio", Measure::ChangeRzRatio),
    ("Crit3_PT", Measure::Pt),
];

/// Maps criterion names to constructors.
///
/// The magnetic field is owned by the registry and injected into every
/// constructed criterion.
pub struct CriterionRegistry {
    bz_tesla: f64,
    constructors: BTreeMap<String, Constructor>,
}

impl CriterionRegistry {
    /// Registry without any constructors.
    pub fn empty(bz_tesla: f64) -> Self {
        Self {
            bz_tesla,
            constructors: BTreeMap::new(),
        }
    }

    /// Registry with all built-in criteria.
    pub fn with_builtin(bz_tesla: f64) -> Self {
        let mut registry = Self::empty(bz_tesla);
        for (name, measure) in BUILTIN {
            registry.register(name, move |p: &CriterionParams| {
                Box::new(MeasureCriterion::new(
                    p.name.clone(),
                    measure,
                    p.min,
                    p.max,
                    p.bz_tesla,
                )) as Box<dyn Criterion>
            });
        }
        registry
    }

    pub fn bz_tesla(&self) -> f64 {
        self.bz_tesla
    }

    /// Register (or replace) a constructor.
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&CriterionParams) -> Box<dyn Criterion> + Send + Sync + 'static,
    {
        self.constructors
            .insert(name.to_string(), Box::new(constructor));
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.constructors.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Construct criterion `name` accepting values in `[min, max]`.
    pub fn create(
        &self,
        name: &str,
        min: f64,
        max: f64,
    ) -> Result<Box<dyn Criterion>, ConfigError> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| ConfigError::UnknownCriterion {
                name: name.to_string(),
            })?;
        if !(min.is_finite() && max.is_finite()) || min > max {
            return Err(ConfigError::InvalidRange {
                name: name.to_string(),
                min,
                max,
            });
        }
        Ok(constructor(&CriterionParams {
            name: name.to_string(),
            min,
            max,
            bz_tesla: self.bz_tesla,
        }))
    }
}

impl Default for CriterionRegistry {
    fn default() -> Self {
        Self::with_builtin(0.5)
    }
}

impl fmt::Debug for CriterionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CriterionRegistry")
            .field("bz_tesla", &self.bz_tesla)
            .field("names", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}
