//! The subset ladder: disjoint, geometrically growing index subsets used
//! for cascaded candidate-score refinement.
//!
//! `K = max(2, ⌊log₂ N⌋ − 9)` subsets together cover the whole store.
//! Subset 0 is the smallest; subset `s` holds roughly `N / 2^(K−s)`
//! points. Construction repeatedly moves a uniformly chosen half of the
//! still-unpicked points to the array tail (a partial Fisher–Yates
//! shuffle), so each subset ends up contiguous in the store and gets its
//! own direct octree.

use rand::Rng;

use crate::octree::Octree;
use crate::store::PointStore;

#[derive(Debug)]
pub(crate) struct Subset {
    pub offset: usize,
    pub len: usize,
    /// How many of this subset's points are still unassigned. Owned by the
    /// detection driver; the octree itself is immutable after construction.
    pub available: usize,
    pub octree: Octree,
}

#[derive(Debug)]
pub(crate) struct SubsetLadder {
    /// Ascending by size: `subsets[0]` is the smallest.
    subsets: Vec<Subset>,
}

pub(crate) fn num_subsets(n: usize) -> usize {
    ((n as f64).log2().floor() as isize - 9).max(2) as usize
}

impl SubsetLadder {
    /// Permutes the store into contiguous subset runs and builds one direct
    /// octree per subset. Must run before the global octree is built.
    pub fn build<R: Rng>(store: &mut PointStore, rng: &mut R) -> Self {
        let n = store.len();
        let k = num_subsets(n);

        // (offset, len) per subset, filled from the largest down.
        let mut extents = vec![(0usize, 0usize); k];
        let mut remaining = n;
        for s in (1..k).rev() {
            let half = remaining / 2;
            for i in 0..half {
                let j = rng.gen_range(0..remaining - i);
                store.swap(j, remaining - 1 - i);
            }
            remaining -= half;
            extents[s] = (remaining, half);
        }
        extents[0] = (0, remaining);

        let subsets = extents
            .into_iter()
            .map(|(offset, len)| Subset {
                offset,
                len,
                available: len,
                octree: Octree::build(store, offset..offset + len),
            })
            .collect();
        Self { subsets }
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.subsets.len()
    }

    #[inline]
    pub fn subset(&self, s: usize) -> &Subset {
        &self.subsets[s]
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.subsets.iter().map(|s| s.len).collect()
    }

    /// Sum of still-available points over subsets `0..=s`; the sample size
    /// a candidate has been scored against after inspecting those subsets.
    pub fn available_through(&self, s: usize) -> usize {
        self.subsets[..=s].iter().map(|sub| sub.available).sum()
    }

    /// Records that the point at `index` was assigned to a shape,
    /// decrementing the availability of the one subset that owns it.
    pub fn mark_assigned(&mut self, index: u32) {
        let idx = index as usize;
        for sub in &mut self.subsets {
            if idx >= sub.offset && idx < sub.offset + sub.len {
                debug_assert!(sub.available > 0, "subset availability underflow");
                sub.available -= 1;
                return;
            }
        }
        debug_assert!(false, "point {index} belongs to no subset");
    }
}
