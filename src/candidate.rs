//! Candidates under evaluation, and the score-bound engine that turns a
//! partial (subset-sampled) score into a confidence interval on the true
//! support over the whole available set.

use crate::shapes::Primitive;
use crate::store::UNASSIGNED;

/// A tentatively fitted shape: its fit, the point indices it has matched
/// over the subsets inspected so far, and the current support interval.
#[derive(Debug)]
pub(crate) struct Candidate {
    pub shape: Box<dyn Primitive>,
    /// Cumulative matches over subsets `0..subsets_used`.
    pub indices: Vec<u32>,
    pub subsets_used: usize,
    pub min_bound: f32,
    pub max_bound: f32,
}

impl Candidate {
    pub fn new(shape: Box<dyn Primitive>) -> Self {
        Self {
            shape,
            indices: Vec::new(),
            subsets_used: 0,
            min_bound: 0.0,
            max_bound: 0.0,
        }
    }

    /// Cumulative score: matched points across all inspected subsets.
    #[inline]
    pub fn score(&self) -> usize {
        self.indices.len()
    }

    /// Point estimate of the true support: the interval midpoint.
    #[inline]
    pub fn expected(&self) -> f32 {
        0.5 * (self.min_bound + self.max_bound)
    }

    /// Replaces the interval from scratch (used when the available set
    /// itself changed after a commit).
    pub fn set_bounds(&mut self, sampled: usize, available: usize) {
        let (lo, hi) = support_bounds(self.score(), sampled, available);
        self.min_bound = lo;
        self.max_bound = hi;
    }

    /// Tightens the interval after more subsets were inspected. Bounds
    /// never widen: the fresh interval is intersected with the previous
    /// one, collapsing to the midpoint in the (pathological) empty case.
    pub fn tighten_bounds(&mut self, sampled: usize, available: usize) {
        let (mut lo, mut hi) = support_bounds(self.score(), sampled, available);
        if self.max_bound > 0.0 {
            lo = lo.max(self.min_bound);
            hi = hi.min(self.max_bound);
            if lo > hi {
                let mid = 0.5 * (lo + hi);
                lo = mid;
                hi = mid;
            }
        }
        self.min_bound = lo;
        self.max_bound = hi;
    }

    /// Pins the interval onto an exact, fully verified score.
    pub fn collapse_to_score(&mut self) {
        let s = self.score() as f32;
        self.min_bound = s;
        self.max_bound = s;
    }

    /// Drops matches that a committed shape claimed in the meantime.
    pub fn drop_assigned(&mut self, assignment: &[u32]) {
        self.indices
            .retain(|&i| assignment[i as usize] == UNASSIGNED);
    }
}

/// 95%-style hypergeometric confidence interval for the true support of a
/// candidate that matched `score` points among `sampled` inspected ones,
/// extrapolated to `available` points.
///
/// The interval is centered on `score · available / sampled` and its
/// relative width shrinks like `1/√sampled`, so cascading through the
/// subset ladder tightens it monotonically; once every point has been
/// inspected it collapses onto the exact score.
pub(crate) fn support_bounds(score: usize, sampled: usize, available: usize) -> (f32, f32) {
    if available == 0 {
        return (0.0, 0.0);
    }
    if sampled == 0 {
        return (0.0, available as f32);
    }
    if sampled >= available {
        return (score as f32, score as f32);
    }

    let un = -2.0 - sampled as f64;
    let x = -2.0 - available as f64;
    let n = -1.0 - score as f64;
    let sq = (x * n * (un - x) * (un - n) / (un - 1.0)).max(0.0).sqrt();
    let a = -1.0 - (x * n + sq) / un;
    let b = -1.0 - (x * n - sq) / un;
    let lo = a.min(b).max(0.0) as f32;
    let hi = a.max(b).min(available as f64) as f32;
    (lo, hi.max(lo))
}
