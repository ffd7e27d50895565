//! Primitive shape kinds.
//!
//! The detection engine is generic over the shapes it searches for; each
//! family (plane, sphere, cylinder, cone, torus) plugs in through two small
//! traits. [`ShapeKind`] builds a candidate from a minimal oriented sample,
//! [`Primitive`] answers the per-point queries the engine needs: signed
//! distance to the surface, normal deviation, and a 2-D parametric
//! embedding for the connected-component filter.

mod cone;
mod cylinder;
mod plane;
mod sphere;
mod torus;

pub use cone::{Cone, ConeKind};
pub use cylinder::{Cylinder, CylinderKind};
pub use plane::{Plane, PlaneKind};
pub use sphere::{Sphere, SphereKind};
pub use torus::{Torus, TorusKind};

use std::any::Any;
use std::fmt;

use glam::{Vec2, Vec3};

/// Discriminates the primitive family of a candidate or detected shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindTag {
    Plane,
    Sphere,
    Cylinder,
    Cone,
    Torus,
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KindTag::Plane => "plane",
            KindTag::Sphere => "sphere",
            KindTag::Cylinder => "cylinder",
            KindTag::Cone => "cone",
            KindTag::Torus => "torus",
        };
        f.write_str(name)
    }
}

/// A fitted shape instance under evaluation or already extracted.
pub trait Primitive: fmt::Debug {
    fn tag(&self) -> KindTag;

    /// Signed distance from `p` to the surface; positive outside where the
    /// family has an inside.
    fn signed_distance(&self, p: Vec3) -> f32;

    /// `1 − |cos θ|` between `n` and the surface normal at the projection
    /// of `p`. Returns 1 when the surface normal is undefined there.
    fn normal_deviation(&self, p: Vec3, n: Vec3) -> f32;

    /// 2-D embedding of `p` used by the connected-component filter. Not
    /// conformal, only locally metric at the `cluster_epsilon` scale.
    fn parametric(&self, p: Vec3) -> Vec2;

    /// Periods of the parametric axes, for surfaces that close on
    /// themselves (cylinder seam, sphere longitude, both torus angles).
    fn periods(&self) -> (Option<f32>, Option<f32>) {
        (None, None)
    }

    /// Concrete-type access for callers that need fitted parameters.
    fn as_any(&self) -> &dyn Any;
}

/// A registered primitive family: turns minimal oriented samples into
/// candidate [`Primitive`]s.
pub trait ShapeKind {
    fn tag(&self) -> KindTag;

    /// Number of oriented points a fit needs (≥ 3).
    fn minimal_sample_size(&self) -> usize;

    /// Attempts a fit. Returns `None` for degenerate samples and for fits
    /// the sample itself contradicts (a sample point farther than
    /// `epsilon` from the surface, or a sample normal deviating by more
    /// than `normal_threshold`).
    fn fit(
        &self,
        positions: &[Vec3],
        normals: &[Vec3],
        epsilon: f32,
        normal_threshold: f32,
    ) -> Option<Box<dyn Primitive>>;
}

/// All five built-in kinds.
pub fn all_kinds() -> Vec<Box<dyn ShapeKind>> {
    vec![
        Box::new(PlaneKind),
        Box::new(SphereKind),
        Box::new(CylinderKind),
        Box::new(ConeKind),
        Box::new(TorusKind),
    ]
}

/// `1 − |cos|`, clamped against rounding drift outside [-1, 1].
#[inline]
pub(crate) fn deviation_from_cos(cos: f32) -> f32 {
    1.0 - cos.abs().min(1.0)
}

/// Deterministic orthonormal frame perpendicular to a unit `axis`.
pub(crate) fn orthonormal_basis(axis: Vec3) -> (Vec3, Vec3) {
    let up = if axis.y.abs() < 0.9 { Vec3::Y } else { Vec3::X };
    let b1 = axis.cross(up).normalize();
    let b2 = axis.cross(b1);
    (b1, b2)
}

/// Checks a fitted shape against its own minimal sample.
pub(crate) fn sample_fits(
    shape: &dyn Primitive,
    positions: &[Vec3],
    normals: &[Vec3],
    epsilon: f32,
    normal_threshold: f32,
) -> bool {
    positions.iter().zip(normals).all(|(&p, &n)| {
        shape.signed_distance(p).abs() <= epsilon && shape.normal_deviation(p, n) <= normal_threshold
    })
}
