//! The detection driver.
//!
//! One outer iteration makes one shape decision: generate candidates until
//! the overlook probability is small enough, pick the best by cascaded
//! bound refinement, verify it on the global octree, restrict it to its
//! largest connected component, and commit it if it is still unlikely that
//! a better shape went unsampled. Detection ends when any remaining shape
//! of `min_points` support would almost surely have been sampled already.

use glam::Vec3;
use ordered_float::OrderedFloat;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::candidate::Candidate;
use crate::cluster::largest_component;
use crate::error::DetectError;
use crate::octree::Octree;
use crate::shapes::{all_kinds, KindTag, Primitive, ShapeKind};
use crate::store::{PointStore, UNASSIGNED};
use crate::subsets::SubsetLadder;
use crate::DetectParams;

/// Consecutive fruitless candidates (failed draws, degenerate fits,
/// hopeless bounds) before a detection run gives up.
const FAILURE_CEILING: usize = 10_000;
/// Attempts at drawing an unassigned seed point before counting a failure.
const SEED_ATTEMPTS: usize = 1_024;
/// Points a freshly generated candidate is scored against before its first
/// bound is trusted.
const GENERATION_SPAN: usize = 500;

/// An extracted shape: its fitted primitive and the point indices it
/// claimed, in extraction order.
#[derive(Debug)]
pub struct DetectedShape {
    tag: KindTag,
    shape: Box<dyn Primitive>,
    indices: Vec<u32>,
}

impl DetectedShape {
    #[inline]
    pub fn tag(&self) -> KindTag {
        self.tag
    }

    #[inline]
    pub fn primitive(&self) -> &dyn Primitive {
        self.shape.as_ref()
    }

    /// Indices (into the detector's point order) this shape claimed.
    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn support(&self) -> usize {
        self.indices.len()
    }
}

/// Shape detection engine over one point cloud.
///
/// Construction builds the spatial indexes (`O(N log N)`); [`detect`]
/// may then be run one or more times — every run continues on whatever
/// points previous runs left unassigned.
///
/// [`detect`]: Detector::detect
pub struct Detector {
    store: PointStore,
    global: Octree,
    ladder: SubsetLadder,
    kinds: Vec<Box<dyn ShapeKind>>,
    rng: ChaCha8Rng,
    /// `index → shape id`, `UNASSIGNED` until a shape claims the point.
    assignment: Vec<u32>,
    shapes: Vec<DetectedShape>,
    available: usize,
}

impl Detector {
    /// Builds the engine with a nondeterministic seed.
    pub fn new(positions: &[Vec3], normals: &[Vec3]) -> Result<Self, DetectError> {
        Self::with_seed(positions, normals, rand::random())
    }

    /// Builds the engine with an explicit seed; identical inputs, kinds,
    /// parameters and seed reproduce identical detection results.
    pub fn with_seed(positions: &[Vec3], normals: &[Vec3], seed: u64) -> Result<Self, DetectError> {
        let mut store = PointStore::new(positions.to_vec(), normals.to_vec())?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let ladder = SubsetLadder::build(&mut store, &mut rng);
        let global = Octree::build(&store, 0..store.len());
        log::debug!(
            "indexed {} points: octree depth {}, root cell {:?} width {:.3}, subset sizes {:?}",
            store.len(),
            global.max_level(),
            global.center(),
            global.width(),
            ladder.sizes()
        );
        let n = store.len();
        Ok(Self {
            store,
            global,
            ladder,
            kinds: Vec::new(),
            rng,
            assignment: vec![UNASSIGNED; n],
            shapes: Vec::new(),
            available: n,
        })
    }

    /// Registers a shape kind for detection.
    pub fn register(&mut self, kind: Box<dyn ShapeKind>) {
        self.kinds.push(kind);
    }

    /// Registers all five built-in kinds.
    pub fn register_default_kinds(&mut self) {
        for kind in all_kinds() {
            self.register(kind);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Point positions in the detector's (permuted) order; all indices in
    /// shape claims refer to this order.
    #[inline]
    pub fn positions(&self) -> &[Vec3] {
        self.store.positions()
    }

    #[inline]
    pub fn normals(&self) -> &[Vec3] {
        self.store.normals()
    }

    /// Maps the detector's order back to the caller's input order.
    #[inline]
    pub fn source_indices(&self) -> &[u32] {
        self.store.source_indices()
    }

    /// Extracted shapes, in extraction order.
    #[inline]
    pub fn shapes(&self) -> &[DetectedShape] {
        &self.shapes
    }

    /// The shape id claiming `index`, if any.
    pub fn assignment(&self, index: usize) -> Option<usize> {
        match self.assignment[index] {
            UNASSIGNED => None,
            id => Some(id as usize),
        }
    }

    /// Indices no shape has claimed.
    pub fn unassigned_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.assignment
            .iter()
            .enumerate()
            .filter(|(_, &a)| a == UNASSIGNED)
            .map(|(i, _)| i)
    }

    #[inline]
    pub fn unassigned_count(&self) -> usize {
        self.available
    }

    /// Runs shape detection, returning how many shapes this run extracted.
    /// With no registered kinds this is a no-op returning 0.
    pub fn detect(&mut self, params: &DetectParams) -> Result<usize, DetectError> {
        params.validate()?;
        if self.kinds.is_empty() {
            log::debug!("detect called with no registered shape kinds");
            return Ok(0);
        }
        let found_before = self.shapes.len();
        if self.available < params.min_points {
            return Ok(0);
        }

        let sample_size = self
            .kinds
            .iter()
            .map(|k| k.minimal_sample_size())
            .max()
            .expect("at least one kind");
        let levels = self.global.max_level().max(1);

        let mut pool: Vec<Candidate> = Vec::new();
        let mut drawn: usize = 0;
        let mut failures: usize = 0;
        let mut force_exit = false;

        loop {
            // Candidate generation.
            let mut best_expected: f32 = 0.0;
            loop {
                match self.draw_minimal_sample(sample_size) {
                    Some((positions, normals)) => {
                        drawn += 1;
                        for kind in &self.kinds {
                            let k = kind.minimal_sample_size();
                            let Some(shape) = kind.fit(
                                &positions[..k],
                                &normals[..k],
                                params.epsilon,
                                params.normal_threshold,
                            ) else {
                                failures += 1;
                                continue;
                            };
                            let mut candidate = Candidate::new(shape);
                            improve_bound(
                                &self.store,
                                &self.ladder,
                                &self.assignment,
                                self.available,
                                &mut candidate,
                                1,
                                GENERATION_SPAN,
                                params,
                            );
                            if candidate.max_bound >= params.min_points as f32 {
                                best_expected = best_expected.max(candidate.expected());
                                pool.push(candidate);
                            } else {
                                failures += 1;
                            }
                        }
                    }
                    None => failures += 1,
                }

                if failures >= FAILURE_CEILING {
                    force_exit = true;
                    break;
                }
                let sure_of_best =
                    overlook_probability(best_expected, self.available, drawn, levels)
                        <= params.probability;
                let sure_of_any = overlook_probability(
                    params.min_points as f32,
                    self.available,
                    drawn,
                    levels,
                ) <= params.probability;
                if sure_of_best || sure_of_any {
                    break;
                }
            }

            if force_exit {
                log::debug!(
                    "stopping: {FAILURE_CEILING} consecutive candidates failed ({} shapes so far)",
                    self.shapes.len()
                );
                break;
            }

            if !pool.is_empty() {
                select_best(
                    &self.store,
                    &self.ladder,
                    &self.assignment,
                    self.available,
                    &mut pool,
                    params,
                );

                // Verify the winner against every point, with the widened
                // border tolerance, then cut it down to one spatial patch.
                let best = pool.last_mut().expect("pool is non-empty");
                best.indices.clear();
                self.global.score(
                    &self.store,
                    best.shape.as_ref(),
                    &self.assignment,
                    params.epsilon * params.verification_epsilon_factor,
                    params.normal_threshold,
                    &mut best.indices,
                );
                best.indices = largest_component(
                    best.shape.as_ref(),
                    &self.store,
                    &best.indices,
                    params.cluster_epsilon,
                );
                best.collapse_to_score();

                let certain = overlook_probability(best.expected(), self.available, drawn, levels)
                    <= params.probability;
                if certain {
                    if best.score() >= params.min_points {
                        let winner = pool.pop().expect("pool is non-empty");
                        self.commit(winner);
                        drawn = drawn.saturating_sub(1);
                        failures = 0;

                        // Surviving candidates lose the committed points
                        // and get re-bounded against the shrunken set.
                        let assignment = &self.assignment;
                        let ladder = &self.ladder;
                        let available = self.available;
                        pool.retain_mut(|candidate| {
                            candidate.drop_assigned(assignment);
                            if candidate.score() < params.min_points {
                                return false;
                            }
                            let sampled = ladder.available_through(candidate.subsets_used - 1);
                            candidate.set_bounds(sampled, available);
                            true
                        });
                    } else {
                        // Confidently verified, but its one connected patch
                        // is too small to ever become a shape.
                        pool.pop();
                    }
                }
            }

            if self.available < params.min_points {
                break;
            }
            if overlook_probability(params.min_points as f32, self.available, drawn, levels)
                <= params.probability
            {
                break;
            }
        }

        Ok(self.shapes.len() - found_before)
    }

    /// Picks an unassigned seed point and draws a minimal sample from the
    /// octree cell containing it at a uniformly random level.
    fn draw_minimal_sample(&mut self, sample_size: usize) -> Option<(Vec<Vec3>, Vec<Vec3>)> {
        let n = self.store.len();
        let mut seed = None;
        for _ in 0..SEED_ATTEMPTS {
            let i = self.rng.gen_range(0..n);
            if self.assignment[i] == UNASSIGNED {
                seed = Some(i);
                break;
            }
        }
        let seed = seed?;
        let level = self.rng.gen_range(0..=self.global.max_level());
        let ids = self.global.draw_from_cell(
            self.store.position(seed),
            level,
            sample_size,
            &self.assignment,
            &mut self.rng,
        )?;
        let positions = ids
            .iter()
            .map(|&i| self.store.position(i as usize))
            .collect();
        let normals = ids.iter().map(|&i| self.store.normal(i as usize)).collect();
        Some((positions, normals))
    }

    /// Promotes a candidate into an extracted shape and claims its points.
    fn commit(&mut self, winner: Candidate) {
        let shape_id = self.shapes.len() as u32;
        for &index in &winner.indices {
            debug_assert_eq!(
                self.assignment[index as usize],
                UNASSIGNED,
                "point {index} claimed twice"
            );
            self.assignment[index as usize] = shape_id;
            self.ladder.mark_assigned(index);
        }
        self.available -= winner.indices.len();
        log::info!(
            "extracted {} #{shape_id} with {} points, {} still unassigned",
            winner.shape.tag(),
            winner.indices.len(),
            self.available
        );
        self.shapes.push(DetectedShape {
            tag: winner.shape.tag(),
            shape: winner.shape,
            indices: winner.indices,
        });
    }
}

/// Probability that `drawn` independent draws all missed a shape of
/// support `size` among `available` points, with samples spread uniformly
/// over `levels` octree levels and a three-point minimal sample.
fn overlook_probability(size: f32, available: usize, drawn: usize, levels: u32) -> f32 {
    if available == 0 {
        return 0.0;
    }
    let success = (size / (3.0 * available as f32 * levels as f32)).clamp(0.0, 1.0);
    (1.0 - success).powi(drawn.min(i32::MAX as usize) as i32).min(1.0)
}

/// Scores `candidate` against further subsets (at least `min_sampled`
/// fresh points, subject to `max_subset`) and tightens its support
/// interval. Returns whether anything changed.
#[allow(clippy::too_many_arguments)]
fn improve_bound(
    store: &PointStore,
    ladder: &SubsetLadder,
    assignment: &[u32],
    available: usize,
    candidate: &mut Candidate,
    max_subset: usize,
    min_sampled: usize,
    params: &DetectParams,
) -> bool {
    let count = ladder.count();
    if candidate.subsets_used >= max_subset.min(count) {
        return false;
    }

    let mut newly_sampled = 0;
    loop {
        let subset = ladder.subset(candidate.subsets_used);
        subset.octree.score(
            store,
            candidate.shape.as_ref(),
            assignment,
            params.epsilon,
            params.normal_threshold,
            &mut candidate.indices,
        );
        newly_sampled += subset.available;
        candidate.subsets_used += 1;
        if newly_sampled >= min_sampled || candidate.subsets_used >= count {
            break;
        }
    }

    let sampled = ladder.available_through(candidate.subsets_used - 1);
    candidate.tighten_bounds(sampled, available);
    true
}

/// Sorts the pool ascending by `max_bound` (best last) and refines bounds
/// until the best candidate's interval no longer overlaps any rival's.
fn select_best(
    store: &PointStore,
    ladder: &SubsetLadder,
    assignment: &[u32],
    available: usize,
    pool: &mut Vec<Candidate>,
    params: &DetectParams,
) {
    if pool.len() < 2 {
        return;
    }
    let count = ladder.count();
    let mut worst: isize = 0;
    let mut improved = true;
    while (worst as usize) + 1 < pool.len() && improved {
        improved = false;
        pool[worst as usize..].sort_by_key(|c| OrderedFloat(c.max_bound));

        let last = pool.len() - 1;
        improve_bound(
            store,
            ladder,
            assignment,
            available,
            &mut pool[last],
            count,
            params.min_points,
            params,
        );

        let mut position = last as isize - 1;
        while position >= worst {
            let i = position as usize;
            if pool[last].min_bound > pool[i].max_bound {
                break;
            }
            if pool[i].max_bound <= params.min_points as f32 {
                break;
            }
            improved |= improve_bound(
                store,
                ladder,
                assignment,
                available,
                &mut pool[i],
                count,
                params.min_points,
                params,
            );
            if pool[last].min_bound > pool[i].max_bound {
                break;
            }
            position -= 1;
        }
        worst = position.max(0);
    }
}
