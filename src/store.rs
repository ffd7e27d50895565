//! Owning storage for the input point/normal sequence.
//!
//! Every point gets a stable zero-based index. The subset ladder permutes
//! the sequence once during construction; all indices handed out afterwards
//! (candidate matches, shape claims, the assignment map) refer to the
//! permuted order. `source_indices` maps each slot back to the caller's
//! original ordering.

use glam::Vec3;

use crate::error::DetectError;

/// Assignment-map sentinel for a point no shape has claimed.
pub(crate) const UNASSIGNED: u32 = u32::MAX;

/// The engine's view of the input cloud: positions, unit normals, and the
/// permutation back to the caller's order.
#[derive(Debug, Clone)]
pub struct PointStore {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    source: Vec<u32>,
}

impl PointStore {
    /// Takes ownership of the input sequences. Normals are normalized on
    /// ingest; a zero normal is kept as zero and will simply never pass a
    /// normal-deviation test.
    pub(crate) fn new(positions: Vec<Vec3>, normals: Vec<Vec3>) -> Result<Self, DetectError> {
        if positions.is_empty() {
            return Err(DetectError::EmptyInput);
        }
        if positions.len() != normals.len() {
            return Err(DetectError::LengthMismatch {
                positions: positions.len(),
                normals: normals.len(),
            });
        }
        let normals = normals.into_iter().map(|n| n.normalize_or_zero()).collect();
        let source = (0..positions.len() as u32).collect();
        Ok(Self {
            positions,
            normals,
            source,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[inline]
    pub fn position(&self, index: usize) -> Vec3 {
        self.positions[index]
    }

    #[inline]
    pub fn normal(&self, index: usize) -> Vec3 {
        self.normals[index]
    }

    #[inline]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    #[inline]
    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    /// For each slot, the index this point had in the caller's input.
    #[inline]
    pub fn source_indices(&self) -> &[u32] {
        &self.source
    }

    /// Swaps two slots. Only the subset ladder does this, and only before
    /// any octree is built over the affected range.
    pub(crate) fn swap(&mut self, a: usize, b: usize) {
        self.positions.swap(a, b);
        self.normals.swap(a, b);
        self.source.swap(a, b);
    }
}
