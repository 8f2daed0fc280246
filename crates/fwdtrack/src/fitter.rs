//! Trajectory fitter collaborator.
//!
//! The finder never fits tracks itself. It hands accepted seeds to a
//! [`TrackFitter`] and tolerates every failure the fitter reports.

use std::collections::BTreeMap;

use nalgebra::{Matrix3, SymmetricEigen, Vector3};

use crate::error::FitError;
use crate::hit::{HitPopulation, HitRef, LayerKey, Seed};

/// Fitted trajectory state.
#[derive(Debug, Clone, PartialEq)]
pub struct FitRecord {
    /// Reference point of the trajectory (cm).
    pub position: Vector3<f64>,
    /// Momentum at the reference point (GeV/c).
    pub momentum: Vector3<f64>,
    pub converged: bool,
}

impl FitRecord {
    /// Momentum component perpendicular to the beam axis.
    pub fn pt(&self) -> f64 {
        self.momentum.x.hypot(self.momentum.y)
    }
}

/// Trajectory position extrapolated onto a detector layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedState {
    pub layer: LayerKey,
    pub position: Vector3<f64>,
}

impl ProjectedState {
    pub fn rho(&self) -> f64 {
        self.position.x.hypot(self.position.y)
    }

    pub fn phi(&self) -> f64 {
        self.position.y.atan2(self.position.x)
    }
}

/// External fitter contract.
///
/// Every method may fail; callers log the failure and keep the last good
/// state.
pub trait TrackFitter {
    fn fit(&mut self, seed: &Seed) -> Result<FitRecord, FitError>;

    /// Refit `seed` with one optional extra hit per extension layer and
    /// return the new momentum.
    fn refit(
        &mut self,
        fit: &FitRecord,
        seed: &Seed,
        extension: &[Option<HitRef>],
    ) -> Result<Vector3<f64>, FitError>;

    fn project(&mut self, fit: &FitRecord, layer: LayerKey) -> Result<ProjectedState, FitError>;
}

impl<F: TrackFitter + ?Sized> TrackFitter for &mut F {
    fn fit(&mut self, seed: &Seed) -> Result<FitRecord, FitError> {
        (**self).fit(seed)
    }

    fn refit(
        &mut self,
        fit: &FitRecord,
        seed: &Seed,
        extension: &[Option<HitRef>],
    ) -> Result<Vector3<f64>, FitError> {
        (**self).refit(fit, seed, extension)
    }

    fn project(&mut self, fit: &FitRecord, layer: LayerKey) -> Result<ProjectedState, FitError> {
        (**self).project(fit, layer)
    }
}

/// Configuration of [`LineFitter`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LineFitterConfig {
    /// Momentum magnitude assigned to every fitted line (GeV/c).
    pub nominal_momentum: f64,
    /// Largest RMS distance of hits from the line for a converged fit (cm).
    pub max_rms: f64,
}

impl Default for LineFitterConfig {
    fn default() -> Self {
        Self {
            nominal_momentum: 1.0,
            max_rms: 0.5,
        }
    }
}

/// Mean z of every non-empty layer of `population`.
pub fn layer_planes(population: &HitPopulation) -> BTreeMap<LayerKey, f64> {
    population
        .layers()
        .filter(|(_, hits)| !hits.is_empty())
        .map(|(key, hits)| {
            let z = hits.iter().map(|h| h.z()).sum::<f64>() / hits.len() as f64;
            (key, z)
        })
        .collect()
}

/// Straight-line least-squares fitter for field-free tracks.
///
/// Layers are planes of constant z; projection onto an unknown layer fails.
#[derive(Debug, Clone, Default)]
pub struct LineFitter {
    config: LineFitterConfig,
    planes: BTreeMap<LayerKey, f64>,
}

/// Principal axis of a point cloud: (centroid, unit direction, rms distance).
fn principal_axis(points: &[Vector3<f64>]) -> Option<(Vector3<f64>, Vector3<f64>, f64)> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let centroid = points.iter().sum::<Vector3<f64>>() / n;
    let scatter: Matrix3<f64> = points
        .iter()
        .map(|p| {
            let d = p - centroid;
            d * d.transpose()
        })
        .sum();
    let eig = SymmetricEigen::new(scatter);
    let (major, &largest) = eig
        .eigenvalues
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    if largest <= f64::EPSILON {
        return None;
    }
    let mut direction: Vector3<f64> = eig.eigenvectors.column(major).into_owned();
    if direction.z < 0.0 {
        direction = -direction;
    }
    let residual: f64 = eig.eigenvalues.iter().sum::<f64>() - largest;
    let rms = (residual.max(0.0) / n).sqrt();
    Some((centroid, direction, rms))
}

impl LineFitter {
    pub fn new(config: LineFitterConfig) -> Self {
        Self {
            config,
            planes: BTreeMap::new(),
        }
    }

    /// Register layer planes for [`TrackFitter::project`].
    pub fn with_planes(mut self, planes: BTreeMap<LayerKey, f64>) -> Self {
        self.planes.extend(planes);
        self
    }

    pub fn config(&self) -> &LineFitterConfig {
        &self.config
    }

    fn fit_points(&self, points: &[Vector3<f64>]) -> Result<FitRecord, FitError> {
        let (centroid, direction, rms) = principal_axis(points)
            .ok_or_else(|| FitError::Failed(format!("degenerate point set of {}", points.len())))?;
        // reference point: closest point of the line to the innermost hit
        let first = points[0];
        let position = centroid + direction * (first - centroid).dot(&direction);
        Ok(FitRecord {
            position,
            momentum: direction * self.config.nominal_momentum,
            converged: rms <= self.config.max_rms,
        })
    }
}

fn positions<'a>(hits: impl IntoIterator<Item = &'a HitRef>) -> Vec<Vector3<f64>> {
    hits.into_iter()
        .map(|h| Vector3::from(h.position))
        .collect()
}

impl TrackFitter for LineFitter {
    fn fit(&mut self, seed: &Seed) -> Result<FitRecord, FitError> {
        let record = self.fit_points(&positions(seed.hits()))?;
        if !record.converged {
            tracing::debug!(hits = ?seed.hit_ids(), "line fit above rms tolerance");
        }
        Ok(record)
    }

    fn refit(
        &mut self,
        _fit: &FitRecord,
        seed: &Seed,
        extension: &[Option<HitRef>],
    ) -> Result<Vector3<f64>, FitError> {
        let points = positions(seed.hits().iter().chain(extension.iter().flatten()));
        let record = self.fit_points(&points)?;
        if !record.converged {
            return Err(FitError::NotConverged);
        }
        Ok(record.momentum)
    }

    fn project(&mut self, fit: &FitRecord, layer: LayerKey) -> Result<ProjectedState, FitError> {
        let z = *self.planes.get(&layer).ok_or_else(|| FitError::Projection {
            layer,
            reason: "no plane registered".to_string(),
        })?;
        let direction = fit.momentum;
        if direction.z.abs() < 1e-12 {
            return Err(FitError::Projection {
                layer,
                reason: "trajectory parallel to layer plane".to_string(),
            });
        }
        let t = (z - fit.position.z) / direction.z;
        Ok(ProjectedState {
            layer,
            position: fit.position + direction * t,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hit::Hit;
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    fn line_seed(n: usize) -> Seed {
        Seed::new(
            (0..n)
                .map(|k| {
                    let t = (k + 1) as f64;
                    Arc::new(Hit::new(k as u32, k as LayerKey, [t, 2.0 * t, 10.0 * t]))
                })
                .collect(),
        )
    }

    #[test]
    fn fits_exact_line() {
        let mut fitter = LineFitter::new(LineFitterConfig {
            nominal_momentum: 2.0,
            ..LineFitterConfig::default()
        });
        let fit = fitter.fit(&line_seed(5)).unwrap();
        assert!(fit.converged);
        let expected = Vector3::new(1.0, 2.0, 10.0).normalize() * 2.0;
        assert_abs_diff_eq!(fit.momentum, expected, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.position, Vector3::new(1.0, 2.0, 10.0), epsilon = 1e-9);
        assert_abs_diff_eq!(fit.pt(), expected.x.hypot(expected.y), epsilon = 1e-12);
    }

    #[test]
    fn single_hit_fails() {
        let mut fitter = LineFitter::default();
        assert!(matches!(fitter.fit(&line_seed(1)), Err(FitError::Failed(_))));
    }

    #[test]
    fn scattered_hits_do_not_converge() {
        let mut fitter = LineFitter::new(LineFitterConfig {
            max_rms: 0.01,
            ..LineFitterConfig::default()
        });
        let seed = Seed::new(vec![
            Arc::new(Hit::new(0, 0, [0.0, 0.0, 10.0])),
            Arc::new(Hit::new(1, 1, [1.0, 0.0, 20.0])),
            Arc::new(Hit::new(2, 2, [0.0, 0.0, 30.0])),
        ]);
        let fit = fitter.fit(&seed).unwrap();
        assert!(!fit.converged);
        assert_eq!(
            fitter.refit(&fit, &seed, &[]),
            Err(FitError::NotConverged)
        );
    }

    #[test]
    fn projects_onto_registered_planes_only() {
        let seed = line_seed(4);
        let planes = BTreeMap::from([(10, 80.0)]);
        let mut fitter = LineFitter::default().with_planes(planes);
        let fit = fitter.fit(&seed).unwrap();
        let state = fitter.project(&fit, 10).unwrap();
        assert_abs_diff_eq!(state.position, Vector3::new(8.0, 16.0, 80.0), epsilon = 1e-9);
        assert_abs_diff_eq!(state.rho(), 8.0f64.hypot(16.0), epsilon = 1e-9);
        assert!(matches!(
            fitter.project(&fit, 11),
            Err(FitError::Projection { layer: 11, .. })
        ));
    }

    #[test]
    fn refit_includes_extension_hits() {
        let seed = line_seed(3);
        let mut fitter = LineFitter::default();
        let fit = fitter.fit(&seed).unwrap();
        let extra = Arc::new(Hit::new(9, 9, [8.0, 16.0, 80.0]));
        let momentum = fitter.refit(&fit, &seed, &[None, Some(extra)]).unwrap();
        assert_abs_diff_eq!(momentum, fit.momentum, epsilon = 1e-9);
    }

    #[test]
    fn layer_planes_use_mean_z() {
        let pop = HitPopulation::from_hits([
            Hit::new(0, 3, [0.0, 0.0, 10.0]),
            Hit::new(1, 3, [0.0, 0.0, 12.0]),
            Hit::new(2, 4, [0.0, 0.0, 20.0]),
        ]);
        let planes = layer_planes(&pop);
        assert_eq!(planes.len(), 2);
        assert_abs_diff_eq!(planes[&3], 11.0, epsilon = 1e-12);
    }
}
