//! Built-in geometric measures.

use nalgebra::{Vector2, Vector3};

use super::{Arity, Criterion};
use crate::geometry;
use crate::hit::Hit;

/// Value reported by [`Measure::Pt`] when the three hits are collinear in xy
/// or the field is zero.
pub const PT_STRAIGHT_LINE: f64 = 1.0e6;

/// Geometric quantity computed from a hit pair or triple (inner hit first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    /// 3D distance over |Δz|.
    RzRatio,
    /// ρ(outer) − ρ(inner).
    DeltaRho,
    /// |Δφ| in degrees.
    DeltaPhi,
    /// (ρ/z) of the inner hit over (ρ/z) of the outer hit.
    StraightTrackRatio,
    /// |Δθ| in degrees.
    DeltaTheta,
    /// Angle between consecutive difference vectors, degrees.
    Angle3d,
    /// Same as [`Measure::Angle3d`] projected on the xy plane.
    Angle2d,
    /// RZ ratio of the outer pair over that of the inner pair.
    ChangeRzRatio,
    /// Transverse momentum (GeV/c) of the xy circle through three hits.
    Pt,
}

impl Measure {
    pub fn arity(self) -> Arity {
        match self {
            Self::RzRatio
            | Self::DeltaRho
            | Self::DeltaPhi
            | Self::StraightTrackRatio
            | Self::DeltaTheta => Arity::Two,
            Self::Angle3d | Self::Angle2d | Self::ChangeRzRatio | Self::Pt => Arity::Three,
        }
    }

    /// Evaluate the measure. `bz_tesla` is only read by [`Measure::Pt`].
    pub fn evaluate(self, hits: &[&Hit], bz_tesla: f64) -> f64 {
        match self {
            Self::RzRatio => rz_ratio(hits[0], hits[1]),
            Self::DeltaRho => hits[1].rho() - hits[0].rho(),
            Self::DeltaPhi => geometry::delta_phi(hits[0].phi(), hits[1].phi()).to_degrees(),
            Self::StraightTrackRatio => {
                let inner = hits[0].rho() / hits[0].z();
                let outer = hits[1].rho() / hits[1].z();
                inner / outer
            }
            Self::DeltaTheta => {
                (geometry::theta(hits[0].position) - geometry::theta(hits[1].position))
                    .abs()
                    .to_degrees()
            }
            Self::Angle3d => {
                let v1 = Vector3::from(geometry::sub(hits[1].position, hits[0].position));
                let v2 = Vector3::from(geometry::sub(hits[2].position, hits[1].position));
                v1.angle(&v2).to_degrees()
            }
            Self::Angle2d => {
                let v1 = Vector2::new(hits[1].x() - hits[0].x(), hits[1].y() - hits[0].y());
                let v2 = Vector2::new(hits[2].x() - hits[1].x(), hits[2].y() - hits[1].y());
                v1.angle(&v2).to_degrees()
            }
            Self::ChangeRzRatio => rz_ratio(hits[1], hits[2]) / rz_ratio(hits[0], hits[1]),
            Self::Pt => {
                if bz_tesla == 0.0 {
                    return PT_STRAIGHT_LINE;
                }
                match geometry::circle_radius_xy(
                    hits[0].position,
                    hits[1].position,
                    hits[2].position,
                ) {
                    // positions in cm, radius in m
                    Some(radius_cm) => {
                        (0.3 * bz_tesla.abs() * radius_cm / 100.0).min(PT_STRAIGHT_LINE)
                    }
                    None => PT_STRAIGHT_LINE,
                }
            }
        }
    }
}

fn rz_ratio(a: &Hit, b: &Hit) -> f64 {
    let d = Vector3::from(geometry::sub(b.position, a.position));
    d.norm() / d.z.abs()
}

/// A [`Measure`] with an accepted range.
#[derive(Debug, Clone)]
pub struct MeasureCriterion {
    name: String,
    measure: Measure,
    min: f64,
    max: f64,
    bz_tesla: f64,
}

impl MeasureCriterion {
    pub fn new(
        name: impl Into<String>,
        measure: Measure,
        min: f64,
        max: f64,
        bz_tesla: f64,
    ) -> Self {
        Self {
            name: name.into(),
            measure,
            min,
            max,
            bz_tesla,
        }
    }

    pub fn measure(&self) -> Measure {
        self.measure
    }
}

impl Criterion for MeasureCriterion {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> Arity {
        self.measure.arity()
    }

    fn range(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    fn value(&self, hits: &[&Hit]) -> f64 {
        self.measure.evaluate(hits, self.bz_tesla)
    }
}
