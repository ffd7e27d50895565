//! Octree over a contiguous index range of the point store.
//!
//! One implementation serves both roles the detector needs: the *global*
//! tree over the whole store (final verification, seed-cell sampling) and
//! the per-subset *direct* trees over each subset's contiguous slice
//! (incremental candidate scoring).
//!
//! Cells are cubes. Children partition their parent's slice of `ids` in
//! place, so the range stored on an interior node always spans its whole
//! subtree; drawing a sample "from the cell at level ℓ" is a range lookup
//! at any depth.

use glam::Vec3;
use rand::Rng;

use crate::shapes::Primitive;
use crate::store::{PointStore, UNASSIGNED};

/// Leaves hold at most this many points.
const BUCKET_SIZE: usize = 10;
/// Hard depth cap; duplicated points would otherwise recurse forever.
const MAX_DEPTH: u32 = 12;
/// Rejection-sampling attempts per requested sample point.
const DRAW_ATTEMPTS_PER_POINT: usize = 32;

const SQRT_3: f32 = 1.732_050_8;
const NO_CHILD: u32 = u32::MAX;

#[derive(Debug, Clone)]
struct Node {
    center: Vec3,
    half: f32,
    start: u32,
    end: u32,
    level: u32,
    children: [u32; 8],
}

impl Node {
    #[inline]
    fn is_leaf(&self) -> bool {
        self.children.iter().all(|&c| c == NO_CHILD)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Octree {
    nodes: Vec<Node>,
    ids: Vec<u32>,
    max_level: u32,
}

/// Octant of `p` relative to `center`; points on a split plane go to the
/// lower octant.
#[inline]
fn octant(p: Vec3, center: Vec3) -> usize {
    (usize::from(p.x > center.x)) | (usize::from(p.y > center.y) << 1) | (usize::from(p.z > center.z) << 2)
}

#[inline]
fn octant_offset(oct: usize) -> Vec3 {
    Vec3::new(
        if oct & 1 != 0 { 1.0 } else { -1.0 },
        if oct & 2 != 0 { 1.0 } else { -1.0 },
        if oct & 4 != 0 { 1.0 } else { -1.0 },
    )
}

impl Octree {
    /// Builds a tree over the store indices `range.start..range.end`.
    pub fn build(store: &PointStore, range: std::ops::Range<usize>) -> Self {
        let ids: Vec<u32> = (range.start as u32..range.end as u32).collect();
        if ids.is_empty() {
            return Self {
                nodes: Vec::new(),
                ids,
                max_level: 0,
            };
        }

        let mut min = store.position(range.start);
        let mut max = min;
        for &id in &ids {
            let p = store.position(id as usize);
            min = min.min(p);
            max = max.max(p);
        }
        let center = 0.5 * (min + max);
        let extent = max - min;
        // Cubic root cell, slightly inflated so boundary points are interior.
        let half = (0.5 * extent.max_element()).max(1e-6) * (1.0 + 1e-5);

        let mut tree = Self {
            nodes: vec![Node {
                center,
                half,
                start: 0,
                end: ids.len() as u32,
                level: 0,
                children: [NO_CHILD; 8],
            }],
            ids,
            max_level: 0,
        };
        let mut scratch = Vec::new();
        tree.subdivide(store, 0, &mut scratch);
        tree
    }

    fn subdivide(&mut self, store: &PointStore, node: u32, scratch: &mut Vec<u32>) {
        let (start, end, center, half, level) = {
            let n = &self.nodes[node as usize];
            (n.start as usize, n.end as usize, n.center, n.half, n.level)
        };
        let len = end - start;
        if len <= BUCKET_SIZE || level >= MAX_DEPTH {
            self.max_level = self.max_level.max(level);
            return;
        }

        // Partition ids[start..end] into eight contiguous octant runs.
        let mut counts = [0usize; 8];
        for &id in &self.ids[start..end] {
            counts[octant(store.position(id as usize), center)] += 1;
        }
        let mut offsets = [0usize; 8];
        let mut acc = 0;
        for oct in 0..8 {
            offsets[oct] = acc;
            acc += counts[oct];
        }
        scratch.clear();
        scratch.resize(len, 0);
        let mut cursor = offsets;
        for &id in &self.ids[start..end] {
            let oct = octant(store.position(id as usize), center);
            scratch[cursor[oct]] = id;
            cursor[oct] += 1;
        }
        self.ids[start..end].copy_from_slice(scratch);

        let quarter = 0.5 * half;
        for oct in 0..8 {
            if counts[oct] == 0 {
                continue;
            }
            let child = self.nodes.len() as u32;
            self.nodes.push(Node {
                center: center + quarter * octant_offset(oct),
                half: quarter,
                start: (start + offsets[oct]) as u32,
                end: (start + offsets[oct] + counts[oct]) as u32,
                level: level + 1,
                children: [NO_CHILD; 8],
            });
            self.nodes[node as usize].children[oct] = child;
            self.subdivide(store, child, scratch);
        }
    }

    /// Depth of the deepest leaf.
    #[inline]
    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    /// Root cell center (the whole tree's bounding cube).
    #[inline]
    pub fn center(&self) -> Vec3 {
        self.nodes.first().map_or(Vec3::ZERO, |n| n.center)
    }

    /// Root cell edge length.
    #[inline]
    pub fn width(&self) -> f32 {
        self.nodes.first().map_or(0.0, |n| 2.0 * n.half)
    }

    /// Descends toward `p`, returning the node at `level` (or the deepest
    /// ancestor on that path if the tree bottoms out earlier).
    fn node_at_level(&self, p: Vec3, level: u32) -> Option<usize> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut node = 0usize;
        for _ in 0..level {
            let child = self.nodes[node].children[octant(p, self.nodes[node].center)];
            if child == NO_CHILD {
                break;
            }
            node = child as usize;
        }
        Some(node)
    }

    /// Draws `k` distinct unassigned point indices uniformly from the cell
    /// at `level` on the path toward `seed`. Fails if the cell cannot
    /// supply them.
    pub fn draw_from_cell<R: Rng>(
        &self,
        seed: Vec3,
        level: u32,
        k: usize,
        assignment: &[u32],
        rng: &mut R,
    ) -> Option<Vec<u32>> {
        let node = self.node_at_level(seed, level)?;
        let (start, end) = {
            let n = &self.nodes[node];
            (n.start as usize, n.end as usize)
        };
        if end - start < k {
            return None;
        }
        let mut picked = Vec::with_capacity(k);
        for _ in 0..DRAW_ATTEMPTS_PER_POINT * k {
            let id = self.ids[rng.gen_range(start..end)];
            if assignment[id as usize] != UNASSIGNED || picked.contains(&id) {
                continue;
            }
            picked.push(id);
            if picked.len() == k {
                return Some(picked);
            }
        }
        None
    }

    /// Walks the tree collecting every unassigned point within `epsilon` of
    /// the shape surface whose normal deviates by at most
    /// `normal_threshold`. Matches are appended to `out`; returns how many
    /// were appended.
    ///
    /// A cell is skipped when even its corners cannot reach the surface:
    /// the cell center is farther from the surface than `epsilon` plus the
    /// center-to-corner distance.
    pub fn score(
        &self,
        store: &PointStore,
        shape: &dyn Primitive,
        assignment: &[u32],
        epsilon: f32,
        normal_threshold: f32,
        out: &mut Vec<u32>,
    ) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        let before = out.len();
        let mut stack = vec![0u32];
        while let Some(node) = stack.pop() {
            let n = &self.nodes[node as usize];
            if shape.signed_distance(n.center).abs() > epsilon + n.half * SQRT_3 {
                continue;
            }
            if n.is_leaf() {
                for &id in &self.ids[n.start as usize..n.end as usize] {
                    if assignment[id as usize] != UNASSIGNED {
                        continue;
                    }
                    let p = store.position(id as usize);
                    if shape.signed_distance(p).abs() <= epsilon
                        && shape.normal_deviation(p, store.normal(id as usize)) <= normal_threshold
                    {
                        out.push(id);
                    }
                }
            } else {
                for &child in &n.children {
                    if child != NO_CHILD {
                        stack.push(child);
                    }
                }
            }
        }
        out.len() - before
    }
}
