//! Infinite cylinder, fit from three oriented points.
//!
//! The axis direction is the cross product of the first two normals; the
//! axis position and radius come from intersecting those normals projected
//! into the plane perpendicular to the axis. The third point validates.

use std::any::Any;

use glam::{Vec2, Vec3};

use super::{deviation_from_cos, orthonormal_basis, sample_fits, KindTag, Primitive, ShapeKind};

#[derive(Debug, Clone, Copy)]
pub struct Cylinder {
    point: Vec3,
    axis: Vec3,
    radius: f32,
    u_axis: Vec3,
    v_axis: Vec3,
}

impl Cylinder {
    /// Cylinder of `radius` around the line through `point` along unit
    /// `axis`.
    pub fn new(point: Vec3, axis: Vec3, radius: f32) -> Self {
        let axis = axis.normalize();
        let (u_axis, v_axis) = orthonormal_basis(axis);
        Self {
            point,
            axis,
            radius,
            u_axis,
            v_axis,
        }
    }

    #[inline]
    pub fn axis(&self) -> Vec3 {
        self.axis
    }

    #[inline]
    pub fn point(&self) -> Vec3 {
        self.point
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[inline]
    fn radial(&self, p: Vec3) -> Vec3 {
        let v = p - self.point;
        v - self.axis * v.dot(self.axis)
    }
}

impl Primitive for Cylinder {
    fn tag(&self) -> KindTag {
        KindTag::Cylinder
    }

    #[inline]
    fn signed_distance(&self, p: Vec3) -> f32 {
        self.radial(p).length() - self.radius
    }

    fn normal_deviation(&self, p: Vec3, n: Vec3) -> f32 {
        let radial = self.radial(p);
        let len = radial.length();
        if len < 1e-9 {
            return 1.0;
        }
        deviation_from_cos(radial.dot(n) / len)
    }

    /// Unrolled surface: arc length around the seam by height along the
    /// axis.
    fn parametric(&self, p: Vec3) -> Vec2 {
        let radial = self.radial(p);
        let angle = radial.dot(self.v_axis).atan2(radial.dot(self.u_axis));
        let height = (p - self.point).dot(self.axis);
        Vec2::new(angle * self.radius, height)
    }

    fn periods(&self) -> (Option<f32>, Option<f32>) {
        (Some(std::f32::consts::TAU * self.radius), None)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct CylinderKind;

impl ShapeKind for CylinderKind {
    fn tag(&self) -> KindTag {
        KindTag::Cylinder
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
        let axis = normals[0].cross(normals[1]);
        if axis.length_squared() < 1e-8 {
            return None;
        }
        let axis = axis.normalize();
        let (bu, bv) = orthonormal_basis(axis);

        // Work in the plane perpendicular to the axis.
        let flat = |v: Vec3| Vec2::new(v.dot(bu), v.dot(bv));
        let q0 = flat(positions[0]);
        let q1 = flat(positions[1]);
        let m0 = flat(normals[0]);
        let m1 = flat(normals[1]);
        if m0.length_squared() < 1e-8 || m1.length_squared() < 1e-8 {
            return None;
        }
        let denom = m0.perp_dot(m1);
        if denom.abs() < 1e-8 {
            return None;
        }
        let s = (q1 - q0).perp_dot(m1) / denom;
        let center2 = q0 + s * m0;
        let radius = 0.5 * ((q0 - center2).length() + (q1 - center2).length());
        if radius < 1e-6 {
            return None;
        }

        let point = center2.x * bu + center2.y * bv;
        let cylinder = Cylinder::new(point, axis, radius);
        sample_fits(&cylinder, positions, normals, epsilon, normal_threshold)
            .then(|| Box::new(cylinder) as Box<dyn Primitive>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on_cylinder(angle: f32, height: f32) -> (Vec3, Vec3) {
        let radial = Vec3::new(angle.cos(), angle.sin(), 0.0);
        (radial * 2.0 + Vec3::Z * height, radial)
    }

    #[test]
    fn fit_recovers_cylinder() {
        let samples = [
            on_cylinder(0.2, 0.0),
            on_cylinder(1.9, 1.0),
            on_cylinder(4.0, -0.5),
        ];
        let positions: Vec<Vec3> = samples.iter().map(|s| s.0).collect();
        let normals: Vec<Vec3> = samples.iter().map(|s| s.1).collect();
        let shape = CylinderKind.fit(&positions, &normals, 0.01, 0.05).unwrap();
        let cyl = shape.as_any().downcast_ref::<Cylinder>().unwrap();
        assert!((cyl.radius() - 2.0).abs() < 1e-4);
        assert!(cyl.axis().dot(Vec3::Z).abs() > 1.0 - 1e-5);
        assert!(cyl.radial(Vec3::ZERO).length() < 1e-4);
    }

    #[test]
    fn parallel_normals_rejected() {
        let positions = [Vec3::X, Vec3::Y, Vec3::Z];
        let normals = [Vec3::X, Vec3::X, Vec3::Y];
        assert!(CylinderKind.fit(&positions, &normals, 0.01, 0.1).is_none());
    }

    #[test]
    fn third_point_validates() {
        let samples = [on_cylinder(0.2, 0.0), on_cylinder(1.9, 1.0)];
        let mut positions: Vec<Vec3> = samples.iter().map(|s| s.0).collect();
        let mut normals: Vec<Vec3> = samples.iter().map(|s| s.1).collect();
        positions.push(Vec3::new(10.0, 0.0, 0.0));
        normals.push(Vec3::X);
        assert!(CylinderKind.fit(&positions, &normals, 0.01, 0.1).is_none());
    }

    #[test]
    fn parametric_wraps_with_period() {
        let cyl = Cylinder::new(Vec3::ZERO, Vec3::Z, 2.0);
        let (period_u, period_v) = cyl.periods();
        assert!((period_u.unwrap() - std::f32::consts::TAU * 2.0).abs() < 1e-5);
        assert!(period_v.is_none());
    }
}
