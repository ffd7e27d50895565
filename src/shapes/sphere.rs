//! Sphere, fit from four oriented points.
//!
//! The center is estimated from the first two normal lines (the midpoint
//! of their closest approach); all four sample points then validate the
//! fit.

use std::any::Any;

use glam::{Vec2, Vec3};

use super::{deviation_from_cos, sample_fits, KindTag, Primitive, ShapeKind};

#[derive(Debug, Clone, Copy)]
pub struct Sphere {
    center: Vec3,
    radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        self.center
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }
}

impl Primitive for Sphere {
    fn tag(&self) -> KindTag {
        KindTag::Sphere
    }

    #[inline]
    fn signed_distance(&self, p: Vec3) -> f32 {
        (p - self.center).length() - self.radius
    }

    fn normal_deviation(&self, p: Vec3, n: Vec3) -> f32 {
        let radial = p - self.center;
        let len = radial.length();
        if len < 1e-9 {
            return 1.0;
        }
        deviation_from_cos(radial.dot(n) / len)
    }

    /// Longitude/colatitude scaled by the radius. Compressed near the
    /// poles, which at worst splits a polar cluster, never merges distant
    /// ones.
    fn parametric(&self, p: Vec3) -> Vec2 {
        let q = (p - self.center).normalize_or_zero();
        let u = q.y.atan2(q.x) * self.radius;
        let v = q.z.clamp(-1.0, 1.0).acos() * self.radius;
        Vec2::new(u, v)
    }

    fn periods(&self) -> (Option<f32>, Option<f32>) {
        (Some(std::f32::consts::TAU * self.radius), None)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Closest-approach parameters of the lines `a0 + s·d0` and `a1 + t·d1`,
/// for unit directions. `None` when the lines are near parallel.
fn line_line_closest(a0: Vec3, d0: Vec3, a1: Vec3, d1: Vec3) -> Option<(f32, f32)> {
    let w = a0 - a1;
    let b = d0.dot(d1);
    let denom = 1.0 - b * b;
    if denom < 1e-6 {
        return None;
    }
    let d = d0.dot(w);
    let e = d1.dot(w);
    let s = (b * e - d) / denom;
    let t = (e - b * d) / denom;
    Some((s, t))
}

pub struct SphereKind;

impl ShapeKind for SphereKind {
    fn tag(&self) -> KindTag {
        KindTag::Sphere
    }

    fn minimal_sample_size(&self) -> usize {
        4
    }

    fn fit(
        &self,
        positions: &[Vec3],
        normals: &[Vec3],
        epsilon: f32,
        normal_threshold: f32,
    ) -> Option<Box<dyn Primitive>> {
        let (s, t) = line_line_closest(positions[0], normals[0], positions[1], normals[1])?;
        let c0 = positions[0] + s * normals[0];
        let c1 = positions[1] + t * normals[1];
        let center = 0.5 * (c0 + c1);
        let radius = 0.5 * ((positions[0] - center).length() + (positions[1] - center).length());
        if radius < 1e-6 {
            return None;
        }
        let sphere = Sphere::new(center, radius);
        sample_fits(&sphere, positions, normals, epsilon, normal_threshold)
            .then(|| Box::new(sphere) as Box<dyn Primitive>)
    }
}
