//! Segment graph and cellular-automaton state propagation.
//!
//! Segments are stored in an arena (`Vec<Segment>`) and reference each other
//! by index. A child follows a parent when the child's leading `k - 1` hits
//! equal the parent's trailing `k - 1` hits, where `k` is the segment length
//! (2 after building, 3 after lengthening). Segments are kept sorted by their
//! hit ids so that every traversal is deterministic.
//!
//! The graph must be acyclic. [`crate::segment_builder::SegmentBuilder`]
//! guarantees this by only connecting increasing layer keys.

use std::collections::BTreeMap;

use crate::criteria::CriteriaSet;
use crate::hit::{Hit, HitRef, Seed};

/// A 2- or 3-hit sub-chain with its propagation state and adjacency.
#[derive(Debug, Clone)]
pub struct Segment {
    hits: Vec<HitRef>,
    state: u32,
    parents: Vec<usize>,
    children: Vec<usize>,
}

impl Segment {
    fn new(hits: Vec<HitRef>) -> Self {
        Self {
            hits,
            state: 0,
            parents: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn hits(&self) -> &[HitRef] {
        &self.hits
    }

    /// Length of the longest forward segment path starting here.
    pub fn state(&self) -> u32 {
        self.state
    }

    pub fn parents(&self) -> &[usize] {
        &self.parents
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }

    fn ids(&self) -> Vec<u32> {
        self.hits.iter().map(|h| h.id).collect()
    }
}

/// Result of [`Automaton::do_automaton`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagationOutcome {
    /// Sweeps executed, including the final unchanged one.
    pub sweeps: usize,
    /// `false` when the sweep cap was hit before a fixed point.
    pub converged: bool,
}

/// The segment graph of one finding pass.
#[derive(Debug, Clone, Default)]
pub struct Automaton {
    segments: Vec<Segment>,
    /// States are exact longest-path lengths (propagation converged).
    states_exact: bool,
}

impl Automaton {
    /// Build a graph from hit chains of equal length and link adjacency.
    pub fn from_segments(hit_lists: Vec<Vec<HitRef>>) -> Self {
        let mut segments: Vec<Segment> = hit_lists.into_iter().map(Segment::new).collect();
        segments.sort_by_cached_key(Segment::ids);
        let mut automaton = Self {
            segments,
            states_exact: false,
        };
        automaton.link();
        automaton
    }

    fn link(&mut self) {
        let mut by_prefix: BTreeMap<Vec<u32>, Vec<usize>> = BTreeMap::new();
        for (index, segment) in self.segments.iter().enumerate() {
            let ids = segment.ids();
            let prefix = ids[..ids.len().saturating_sub(1)].to_vec();
            by_prefix.entry(prefix).or_default().push(index);
        }
        for parent in 0..self.segments.len() {
            let ids = self.segments[parent].ids();
            let suffix = ids[1.min(ids.len())..].to_vec();
            let Some(children) = by_prefix.get(&suffix) else {
                continue;
            };
            for &child in children {
                self.segments[parent].children.push(child);
                self.segments[child].parents.push(parent);
            }
        }
        for segment in &mut self.segments {
            segment.parents.sort_unstable();
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of hits per segment (0 for an empty graph).
    pub fn segment_length(&self) -> usize {
        self.segments.first().map_or(0, |s| s.hits.len())
    }

    /// Number of parent → child links.
    pub fn n_connections(&self) -> usize {
        self.segments.iter().map(|s| s.children.len()).sum()
    }

    pub fn reset_states(&mut self) {
        for segment in &mut self.segments {
            segment.state = 0;
        }
        self.states_exact = false;
    }

    /// Merge every linked (parent, child) pair into one longer segment when
    /// `criteria` accepts the merged hits, replacing the graph.
    ///
    /// Adjacency carries forward: two merged segments are linked when they
    /// came from consecutive links of the old graph.
    pub fn lengthen_segments(&mut self, criteria: &CriteriaSet) {
        let mut merged: Vec<Vec<HitRef>> = Vec::new();
        for parent in &self.segments {
            for &child in &parent.children {
                let mut hits = Vec::with_capacity(parent.hits.len() + 1);
                hits.push(HitRef::clone(&parent.hits[0]));
                hits.extend(self.segments[child].hits.iter().cloned());
                let refs: Vec<&Hit> = hits.iter().map(|h| h.as_ref()).collect();
                if criteria.accepts(&refs) {
                    merged.push(hits);
                }
            }
        }
        tracing::trace!(
            before = self.segments.len(),
            after = merged.len(),
            "segments lengthened"
        );
        *self = Self::from_segments(merged);
    }

    /// Propagate states to a fixed point: `state = 1 + max(child states)`,
    /// 0 for segments without children.
    ///
    /// Each sweep reads only the previous sweep's states.
    pub fn do_automaton(&mut self, max_sweeps: usize) -> PropagationOutcome {
        let mut current: Vec<u32> = self.segments.iter().map(|s| s.state).collect();
        let mut sweeps = 0;
        let mut converged = false;
        while sweeps < max_sweeps {
            sweeps += 1;
            let next: Vec<u32> = self
                .segments
                .iter()
                .map(|s| {
                    s.children
                        .iter()
                        .map(|&c| current[c] + 1)
                        .max()
                        .unwrap_or(0)
                })
                .collect();
            if next == current {
                converged = true;
                break;
            }
            current = next;
        }
        for (segment, state) in self.segments.iter_mut().zip(current) {
            segment.state = state;
        }
        self.states_exact = converged;
        if !converged {
            tracing::warn!(sweeps, "automaton did not reach a fixed point");
        }
        PropagationOutcome { sweeps, converged }
    }

    /// Longest backward segment path ending at each segment.
    fn backward_depths(&self) -> Vec<u32> {
        let mut depth = vec![0u32; self.segments.len()];
        // acyclic: at most len() relaxations
        for _ in 0..=self.segments.len() {
            let next: Vec<u32> = self
                .segments
                .iter()
                .map(|s| s.parents.iter().map(|&p| depth[p] + 1).max().unwrap_or(0))
                .collect();
            if next == depth {
                break;
            }
            depth = next;
        }
        depth
    }

    /// Drop segments that lie on no chain of at least `min_hits` hits.
    ///
    /// Requires converged states; otherwise nothing is removed. Returns the
    /// number of removed segments.
    pub fn clean_bad_states(&mut self, min_hits: usize) -> usize {
        if !self.states_exact {
            tracing::warn!("skipping state cleaning: automaton states are not converged");
            return 0;
        }
        let k = self.segment_length();
        let backward = self.backward_depths();
        let keep: Vec<bool> = self
            .segments
            .iter()
            .zip(&backward)
            .map(|(s, &b)| k + s.state as usize + b as usize >= min_hits)
            .collect();
        let removed = keep.iter().filter(|&&k| !k).count();
        if removed == 0 {
            return 0;
        }

        let mut remap = vec![usize::MAX; self.segments.len()];
        let mut next = 0;
        for (old, &kept) in keep.iter().enumerate() {
            if kept {
                remap[old] = next;
                next += 1;
            }
        }
        let segments = std::mem::take(&mut self.segments);
        self.segments = segments
            .into_iter()
            .zip(&keep)
            .filter(|(_, &kept)| kept)
            .map(|(mut s, _)| {
                s.parents = s
                    .parents
                    .iter()
                    .filter_map(|&p| keep[p].then_some(remap[p]))
                    .collect();
                s.children = s
                    .children
                    .iter()
                    .filter_map(|&c| keep[c].then_some(remap[c]))
                    .collect();
                s
            })
            .collect();
        removed
    }

    /// Enumerate every root-to-leaf chain with at least `min_hits` hits.
    ///
    /// Roots are segments without parents. Chains are emitted in segment
    /// order, i.e. ordered by hit ids, and may overlap.
    pub fn get_tracks(&self, min_hits: usize) -> Vec<Seed> {
        let k = self.segment_length();
        let mut out = Vec::new();
        let mut path = Vec::new();
        for (root, segment) in self.segments.iter().enumerate() {
            if !segment.parents.is_empty() {
                continue;
            }
            if self.states_exact && k + (segment.state as usize) < min_hits {
                continue;
            }
            self.walk(root, k, min_hits, &mut path, &mut out);
        }
        out
    }

    fn walk(
        &self,
        index: usize,
        k: usize,
        min_hits: usize,
        path: &mut Vec<usize>,
        out: &mut Vec<Seed>,
    ) {
        path.push(index);
        let segment = &self.segments[index];
        if segment.children.is_empty() {
            if k + path.len() - 1 >= min_hits {
                let seed = self.chain(path);
                if seed.has_unique_layers() {
                    out.push(seed);
                } else {
                    tracing::warn!(hits = ?seed.hit_ids(), "dropping chain with repeated layer");
                }
            }
        } else {
            for &child in &segment.children {
                let reachable = k + path.len() + self.segments[child].state as usize;
                if self.states_exact && reachable < min_hits {
                    continue;
                }
                self.walk(child, k, min_hits, path, out);
            }
        }
        path.pop();
    }

    fn chain(&self, path: &[usize]) -> Seed {
        let mut hits: Vec<HitRef> = self.segments[path[0]].hits.clone();
        for &index in &path[1..] {
            if let Some(last) = self.segments[index].hits.last() {
                hits.push(HitRef::clone(last));
            }
        }
        Seed::new(hits)
    }
}
