//! 2-hit segment construction between nearby layers.

use crate::automaton::Automaton;
use crate::criteria::{Arity, CriteriaSet};
use crate::hit::{Hit, HitPopulation, HitRef, LayerKey};

/// Builds the initial segment graph of a hit population.
///
/// Segments always point from a lower to a higher layer key, which keeps the
/// resulting graph acyclic.
#[derive(Debug)]
pub struct SegmentBuilder<'a> {
    criteria: &'a CriteriaSet,
    distance: u32,
}

impl<'a> SegmentBuilder<'a> {
    /// `distance` is the largest layer-key gap a segment may span.
    pub fn new(criteria: &'a CriteriaSet, distance: u32) -> Self {
        debug_assert_eq!(criteria.arity(), Arity::Two);
        Self { criteria, distance }
    }

    /// Layers reachable from `layer`.
    fn targets(&self, layer: LayerKey) -> impl Iterator<Item = LayerKey> {
        let first = i64::from(layer) + 1;
        let last = i64::from(layer) + i64::from(self.distance);
        (first..=last).filter_map(|k| LayerKey::try_from(k).ok())
    }

    /// Every accepted hit pair becomes a segment.
    pub fn build(&self, population: &HitPopulation) -> Automaton {
        let mut pairs: Vec<Vec<HitRef>> = Vec::new();
        for (layer, inner_hits) in population.layers() {
            let inner = sorted_by_id(inner_hits);
            for target in self.targets(layer) {
                let outer_hits = population.layer(target);
                if outer_hits.is_empty() {
                    continue;
                }
                let outer = sorted_by_id(outer_hits);
                for &a in &inner {
                    for &b in &outer {
                        let pair: [&Hit; 2] = [a, b];
                        if self.criteria.accepts(&pair) {
                            pairs.push(vec![HitRef::clone(a), HitRef::clone(b)]);
                        }
                    }
                }
            }
        }
        tracing::trace!(n_pairs = pairs.len(), "2-hit segments built");
        Automaton::from_segments(pairs)
    }
}

fn sorted_by_id(hits: &[HitRef]) -> Vec<&HitRef> {
    let mut out: Vec<&HitRef> = hits.iter().collect();
    out.sort_by_key(|h| h.id);
    out
}
