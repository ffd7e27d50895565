//! Infinite plane, fit from three oriented points.

use std::any::Any;

use glam::{Vec2, Vec3};

use super::{deviation_from_cos, orthonormal_basis, sample_fits, KindTag, Primitive, ShapeKind};

#[derive(Debug, Clone, Copy)]
pub struct Plane {
    normal: Vec3,
    offset: f32,
    u_axis: Vec3,
    v_axis: Vec3,
}

impl Plane {
    /// Plane through `point` with unit `normal`.
    pub fn new(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize();
        let (u_axis, v_axis) = orthonormal_basis(normal);
        Self {
            normal,
            offset: normal.dot(point),
            u_axis,
            v_axis,
        }
    }

    #[inline]
    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    /// Signed distance of the origin-anchored plane equation `n·p = offset`.
    #[inline]
    pub fn offset(&self) -> f32 {
        self.offset
    }
}

impl Primitive for Plane {
    fn tag(&self) -> KindTag {
        KindTag::Plane
    }

    #[inline]
    fn signed_distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) - self.offset
    }

    #[inline]
    fn normal_deviation(&self, _p: Vec3, n: Vec3) -> f32 {
        deviation_from_cos(self.normal.dot(n))
    }

    #[inline]
    fn parametric(&self, p: Vec3) -> Vec2 {
        Vec2::new(self.u_axis.dot(p), self.v_axis.dot(p))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct PlaneKind;

impl ShapeKind for PlaneKind {
    fn tag(&self) -> KindTag {
        KindTag::Plane
    }

    fn minimal_sample_size(&self) -> usize {
        3
    }

    fn fit(
        &self,
        positions: &[Vec3],
        normals: &[Vec3],
        epsilon: f32,
        normal_threshold: f32,
    ) -> Option<Box<dyn Primitive>> {
        let [p0, p1, p2] = [positions[0], positions[1], positions[2]];
        let cross = (p1 - p0).cross(p2 - p0);
        if cross.length_squared() < 1e-12 {
            return None;
        }
        let mut normal = cross.normalize();
        // Orient with the sample's normals so signed distances are stable.
        if normal.dot(normals[0] + normals[1] + normals[2]) < 0.0 {
            normal = -normal;
        }
        let plane = Plane::new(p0, normal);
        sample_fits(&plane, positions, normals, epsilon, normal_threshold)
            .then(|| Box::new(plane) as Box<dyn Primitive>)
    }
}
