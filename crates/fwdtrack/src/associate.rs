//! Nearest-hit association for track extension.

use crate::config::AssociatorConfig;
use crate::fitter::ProjectedState;
use crate::geometry;
use crate::hit::HitRef;

/// Every candidate within `window.delta_phi` in azimuth OR `window.delta_r`
/// in transverse radius of the projected position (strict bounds).
///
/// Azimuth differences wrap at ±π. Candidates are returned in input order.
pub fn find_near_hits(
    candidates: &[HitRef],
    projected: &ProjectedState,
    window: &AssociatorConfig,
) -> Vec<HitRef> {
    let target_phi = projected.phi();
    let target_rho = projected.rho();
    candidates
        .iter()
        .filter(|h| {
            geometry::delta_phi(h.phi(), target_phi) < window.delta_phi
                || (h.rho() - target_rho).abs() < window.delta_r
        })
        .cloned()
        .collect()
}

/// The single near hit, or `None` when zero or several candidates match.
pub fn unique_near_hit(
    candidates: &[HitRef],
    projected: &ProjectedState,
    window: &AssociatorConfig,
) -> Option<HitRef> {
    let mut near = find_near_hits(candidates, projected, window);
    if near.len() == 1 {
        near.pop()
    } else {
        if near.len() > 1 {
            tracing::debug!(
                layer = projected.layer,
                n_candidates = near.len(),
                "ambiguous extension layer left unmatched"
            );
        }
        None
    }
}
