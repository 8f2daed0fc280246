//! Synthetic events for unit tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::hit::{Hit, HitPopulation, LayerKey};

/// Spacing of the synthetic disks along z.
pub(crate) const LAYER_SPACING_Z: f64 = 10.0;

/// One hit per layer `0..n_layers`, all on the line `t * (1, 1, 10)`.
///
/// Hit ids equal the layer key.
pub(crate) fn collinear_event(n_layers: usize) -> HitPopulation {
    HitPopulation::from_hits((0..n_layers).map(|k| {
        let t = (k + 1) as f64;
        Hit::new(k as u32, k as LayerKey, [t, t, LAYER_SPACING_Z * t]).with_truth(0)
    }))
}

/// Parameters of [`synthetic_event`].
#[derive(Debug, Clone)]
pub(crate) struct EventSpec {
    pub n_tracks: usize,
    pub n_layers: usize,
    pub n_noise: usize,
    /// Range of `rho / z` for generated tracks.
    pub slope: (f64, f64),
    pub seed: u64,
}

impl Default for EventSpec {
    fn default() -> Self {
        Self {
            n_tracks: 3,
            n_layers: 7,
            n_noise: 0,
            slope: (0.05, 0.3),
            seed: 7,
        }
    }
}

/// Straight tracks from the origin plus uniform noise.
///
/// Track `t` carries truth id `t`; its hits get consecutive ids starting at
/// `t * n_layers`. Noise hits follow and carry no truth.
pub(crate) fn synthetic_event(spec: &EventSpec) -> HitPopulation {
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let mut hits = Vec::new();
    let mut next_id = 0u32;
    for track in 0..spec.n_tracks {
        let phi = rng.gen_range(-std::f64::consts::PI..std::f64::consts::PI);
        let slope = rng.gen_range(spec.slope.0..spec.slope.1);
        for layer in 0..spec.n_layers {
            let z = LAYER_SPACING_Z * (layer + 1) as f64;
            let rho = slope * z;
            hits.push(
                Hit::new(
                    next_id,
                    layer as LayerKey,
                    [rho * phi.cos(), rho * phi.sin(), z],
                )
                .with_truth(track as i32),
            );
            next_id += 1;
        }
    }
    for _ in 0..spec.n_noise {
        let layer = rng.gen_range(0..spec.n_layers.max(1));
        let z = LAYER_SPACING_Z * (layer + 1) as f64;
        let phi = rng.gen_range(-std::f64::consts::PI..std::f64::consts::PI);
        let rho = rng.gen_range(0.0..spec.slope.1 * z);
        hits.push(Hit::new(
            next_id,
            layer as LayerKey,
            [rho * phi.cos(), rho * phi.sin(), z],
        ));
        next_id += 1;
    }
    HitPopulation::from_hits(hits)
}
