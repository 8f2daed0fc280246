//! Simulation-truth helpers.

use std::collections::BTreeMap;

use crate::hit::{Hit, HitPopulation, HitRef, Seed};

/// Smallest truth track that becomes a truth seed.
pub const MIN_TRUTH_SEED_HITS: usize = 4;

/// Dominant truth label of `hits` and its purity.
///
/// Purity is the share of labelled hits carrying the dominant id. Ties go
/// to the smaller id. `None` when no hit is labelled.
pub fn dominant_truth<'a, I>(hits: I) -> Option<(i32, f64)>
where
    I: IntoIterator<Item = &'a Hit>,
{
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    let mut total = 0usize;
    for id in hits.into_iter().filter_map(Hit::truth_track_id) {
        *counts.entry(id).or_default() += 1;
        total += 1;
    }
    let mut best: Option<(i32, usize)> = None;
    for (id, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((id, count));
        }
    }
    best.map(|(id, count)| (id, count as f64 / total as f64))
}

/// One seed per truth track with at least [`MIN_TRUTH_SEED_HITS`] hits and
/// one hit per layer, ordered by truth id.
pub fn seeds_from_truth(population: &HitPopulation) -> Vec<Seed> {
    let mut by_track: BTreeMap<i32, Vec<HitRef>> = BTreeMap::new();
    for hit in population.iter() {
        if let Some(id) = hit.truth_track_id() {
            by_track.entry(id).or_default().push(HitRef::clone(hit));
        }
    }
    let seeds: Vec<Seed> = by_track
        .into_values()
        .filter(|hits| hits.len() >= MIN_TRUTH_SEED_HITS)
        .map(Seed::new)
        .filter(Seed::has_unique_layers)
        .collect();
    tracing::info!(n_seeds = seeds.len(), "seeds built from truth tracks");
    seeds
}
