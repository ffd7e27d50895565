//! Infinite cone, fit from three oriented points.
//!
//! The apex is the intersection of the three tangent planes; the axis is
//! the normal of the plane through the three unit directions from the apex
//! to the sample points; the half-angle is their mean angle to the axis.

use std::any::Any;

use glam::{Mat3, Vec2, Vec3};

use super::{deviation_from_cos, orthonormal_basis, sample_fits, KindTag, Primitive, ShapeKind};

const MIN_HALF_ANGLE: f32 = 0.01;
const MAX_HALF_ANGLE: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

#[derive(Debug, Clone, Copy)]
pub struct Cone {
    apex: Vec3,
    axis: Vec3,
    half_angle: f32,
    sin_a: f32,
    cos_a: f32,
    u_axis: Vec3,
    v_axis: Vec3,
}

impl Cone {
    /// Cone with the given `apex`, unit `axis` pointing into the opening,
    /// and `half_angle` between axis and surface in `(0, π/2)`.
    pub fn new(apex: Vec3, axis: Vec3, half_angle: f32) -> Self {
        let axis = axis.normalize();
        let (u_axis, v_axis) = orthonormal_basis(axis);
        Self {
            apex,
            axis,
            half_angle,
            sin_a: half_angle.sin(),
            cos_a: half_angle.cos(),
            u_axis,
            v_axis,
        }
    }

    #[inline]
    pub fn apex(&self) -> Vec3 {
        self.apex
    }

    #[inline]
    pub fn axis(&self) -> Vec3 {
        self.axis
    }

    #[inline]
    pub fn half_angle(&self) -> f32 {
        self.half_angle
    }
}

impl Primitive for Cone {
    fn tag(&self) -> KindTag {
        KindTag::Cone
    }

    /// Distance to the surface line in the axial half-plane through `p`;
    /// positive outside the cone.
    fn signed_distance(&self, p: Vec3) -> f32 {
        let v = p - self.apex;
        let h = v.dot(self.axis);
        let rho = (v - self.axis * h).length();
        rho * self.cos_a - h * self.sin_a
    }

    fn normal_deviation(&self, p: Vec3, n: Vec3) -> f32 {
        let v = p - self.apex;
        let h = v.dot(self.axis);
        let radial = v - self.axis * h;
        let len = radial.length();
        if len < 1e-9 {
            return 1.0;
        }
        let surface_normal = (radial / len) * self.cos_a - self.axis * self.sin_a;
        deviation_from_cos(surface_normal.dot(n))
    }

    /// Development of the cone into the plane: polar coordinates with the
    /// slant distance as radius and the azimuth shrunk by `sin α`. Locally
    /// isometric away from the apex.
    fn parametric(&self, p: Vec3) -> Vec2 {
        let v = p - self.apex;
        let slant = v.length();
        let angle = v.dot(self.v_axis).atan2(v.dot(self.u_axis));
        let developed = angle * self.sin_a;
        Vec2::new(slant * developed.cos(), slant * developed.sin())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct ConeKind;

impl ShapeKind for ConeKind {
    fn tag(&self) -> KindTag {
        KindTag::Cone
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
        // Apex: common point of the three tangent planes n_i · x = n_i · p_i.
        let m = Mat3::from_cols(normals[0], normals[1], normals[2]).transpose();
        if m.determinant().abs() < 1e-6 {
            return None;
        }
        let rhs = Vec3::new(
            normals[0].dot(positions[0]),
            normals[1].dot(positions[1]),
            normals[2].dot(positions[2]),
        );
        let apex = m.inverse() * rhs;

        let d0 = (positions[0] - apex).normalize_or_zero();
        let d1 = (positions[1] - apex).normalize_or_zero();
        let d2 = (positions[2] - apex).normalize_or_zero();
        if d0 == Vec3::ZERO || d1 == Vec3::ZERO || d2 == Vec3::ZERO {
            return None;
        }
        let mut axis = (d1 - d0).cross(d2 - d0);
        if axis.length_squared() < 1e-10 {
            return None;
        }
        axis = axis.normalize();
        let mean_dir = d0 + d1 + d2;
        if axis.dot(mean_dir) < 0.0 {
            axis = -axis;
        }

        let half_angle = (d0.dot(axis).clamp(-1.0, 1.0).acos()
            + d1.dot(axis).clamp(-1.0, 1.0).acos()
            + d2.dot(axis).clamp(-1.0, 1.0).acos())
            / 3.0;
        if !(MIN_HALF_ANGLE..=MAX_HALF_ANGLE).contains(&half_angle) {
            return None;
        }

        let cone = Cone::new(apex, axis, half_angle);
        sample_fits(&cone, positions, normals, epsilon, normal_threshold)
            .then(|| Box::new(cone) as Box<dyn Primitive>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Point and outward normal on the cone z = ρ (half-angle 45°) opening
    /// along +Z from an apex.
    fn on_cone(apex: Vec3, angle: f32, height: f32) -> (Vec3, Vec3) {
        let radial = Vec3::new(angle.cos(), angle.sin(), 0.0);
        let p = apex + radial * height + Vec3::Z * height;
        (p, (radial - Vec3::Z).normalize())
    }

    #[test]
    fn fit_recovers_cone() {
        let apex = Vec3::new(1.0, 2.0, -1.0);
        let samples = [
            on_cone(apex, 0.3, 1.0),
            on_cone(apex, 2.5, 1.5),
            on_cone(apex, 4.6, 0.8),
        ];
        let positions: Vec<Vec3> = samples.iter().map(|s| s.0).collect();
        let normals: Vec<Vec3> = samples.iter().map(|s| s.1).collect();
        let shape = ConeKind.fit(&positions, &normals, 0.01, 0.05).unwrap();
        let cone = shape.as_any().downcast_ref::<Cone>().unwrap();
        assert!(cone.apex().distance(apex) < 1e-3);
        assert!(cone.axis().dot(Vec3::Z) > 1.0 - 1e-4);
        assert!((cone.half_angle() - std::f32::consts::FRAC_PI_4).abs() < 1e-3);
    }

    #[test]
    fn coplanar_normals_rejected() {
        // All normals equal: tangent planes never meet in one point.
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y];
        let normals = [Vec3::Z; 3];
        assert!(ConeKind.fit(&positions, &normals, 0.01, 0.1).is_none());
    }

    #[test]
    fn distance_sign_and_magnitude() {
        let cone = Cone::new(Vec3::ZERO, Vec3::Z, std::f32::consts::FRAC_PI_4);
        // On the surface.
        assert!(cone.signed_distance(Vec3::new(1.0, 0.0, 1.0)).abs() < 1e-5);
        // On the axis, inside.
        assert!(cone.signed_distance(Vec3::new(0.0, 0.0, 2.0)) < 0.0);
        // Outside, in the apex plane.
        assert!(cone.signed_distance(Vec3::new(2.0, 0.0, 0.0)) > 0.0);
    }
}
