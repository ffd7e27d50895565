//! Efficient RANSAC detection of primitive shapes in oriented point clouds.
//!
//! Given points with (possibly unoriented) surface normals, the detector
//! extracts planes, spheres, cylinders, cones and tori, each claiming a
//! disjoint subset of the input. Detection follows the randomized scheme
//! of Schnabel, Wahl and Klein: candidates are fit from minimal samples
//! drawn out of octree cells, scored incrementally against a ladder of
//! geometrically growing point subsets, and committed once the probability
//! of having overlooked a better shape drops below a user threshold.
//!
//! # Example
//!
//! ```no_run
//! use glam::Vec3;
//! use shape_ransac::{DetectParams, Detector};
//!
//! # fn cloud() -> (Vec<Vec3>, Vec<Vec3>) { (vec![], vec![]) }
//! let (positions, normals) = cloud();
//! let mut detector = Detector::with_seed(&positions, &normals, 42)?;
//! detector.register_default_kinds();
//!
//! let params = DetectParams {
//!     min_points: 200,
//!     epsilon: 0.01,
//!     ..DetectParams::default()
//! };
//! detector.detect(&params)?;
//!
//! for shape in detector.shapes() {
//!     println!("{} with {} points", shape.tag(), shape.support());
//! }
//! # Ok::<(), shape_ransac::DetectError>(())
//! ```

mod candidate;
mod cluster;
mod engine;
mod error;
mod octree;
mod store;
mod subsets;

pub mod shapes;

pub use engine::{DetectedShape, Detector};
pub use error::DetectError;
pub use shapes::{
    Cone, ConeKind, Cylinder, CylinderKind, KindTag, Plane, PlaneKind, Primitive, ShapeKind,
    Sphere, SphereKind, Torus, TorusKind,
};

use glam::Vec3;

/// Detection parameters.
#[derive(Debug, Clone)]
pub struct DetectParams {
    /// Maximum tolerated probability of overlooking a shape of
    /// `min_points` support, in `(0, 1]`. Smaller means a more thorough
    /// (and slower) search.
    pub probability: f32,
    /// Minimum number of points a shape must claim to be returned.
    pub min_points: usize,
    /// Maximum distance of a matched point to the fitted surface.
    pub epsilon: f32,
    /// Maximum normal deviation `1 − |cos θ|` of a matched point, in
    /// `[0, 1]`.
    pub normal_threshold: f32,
    /// Maximum gap between matched points still considered connected.
    pub cluster_epsilon: f32,
    /// Multiplier on `epsilon` for the final verification pass over the
    /// whole cloud. The reference policy is 3, which lets near-border
    /// points attach to a committed shape; set 1.0 for a strict claim.
    pub verification_epsilon_factor: f32,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            probability: 0.05,
            min_points: 100,
            epsilon: 0.01,
            normal_threshold: 0.1,
            cluster_epsilon: 0.1,
            verification_epsilon_factor: 3.0,
        }
    }
}

impl DetectParams {
    pub(crate) fn validate(&self) -> Result<(), DetectError> {
        if !(self.probability > 0.0 && self.probability <= 1.0) {
            return Err(DetectError::InvalidParameter {
                name: "probability",
                reason: "must lie in (0, 1]",
            });
        }
        if self.min_points == 0 {
            return Err(DetectError::InvalidParameter {
                name: "min_points",
                reason: "must be at least 1",
            });
        }
        if !(self.epsilon > 0.0) {
            return Err(DetectError::InvalidParameter {
                name: "epsilon",
                reason: "must be positive",
            });
        }
        if !(0.0..=1.0).contains(&self.normal_threshold) {
            return Err(DetectError::InvalidParameter {
                name: "normal_threshold",
                reason: "must lie in [0, 1]",
            });
        }
        if !(self.cluster_epsilon > 0.0) {
            return Err(DetectError::InvalidParameter {
                name: "cluster_epsilon",
                reason: "must be positive",
            });
        }
        if !(self.verification_epsilon_factor >= 1.0) {
            return Err(DetectError::InvalidParameter {
                name: "verification_epsilon_factor",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}

/// One-shot detection with all five built-in kinds and a nondeterministic
/// seed. Returns the detector for access to shapes and assignments.
pub fn detect(
    positions: &[Vec3],
    normals: &[Vec3],
    params: &DetectParams,
) -> Result<Detector, DetectError> {
    detect_with_seed(positions, normals, params, rand::random())
}

/// One-shot detection with all five built-in kinds and a fixed seed.
pub fn detect_with_seed(
    positions: &[Vec3],
    normals: &[Vec3],
    params: &DetectParams,
    seed: u64,
) -> Result<Detector, DetectError> {
    let mut detector = Detector::with_seed(positions, normals, seed)?;
    detector.register_default_kinds();
    detector.detect(params)?;
    Ok(detector)
}
