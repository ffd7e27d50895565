//! Torus, fit from four oriented points.
//!
//! Offsetting each sample point by the (unknown) minor radius along its
//! normal must land on the spine circle, so the four offset points are
//! coplanar exactly when the offset equals the minor radius. That
//! coplanarity condition is a cubic in the offset; each real root yields a
//! spine-circle fit (plane normal = axis, circumcircle = center and major
//! radius) which the full sample then validates.

use std::any::Any;

use glam::{DVec3, Vec2, Vec3};

use super::{deviation_from_cos, orthonormal_basis, sample_fits, KindTag, Primitive, ShapeKind};

#[derive(Debug, Clone, Copy)]
pub struct Torus {
    center: Vec3,
    axis: Vec3,
    major: f32,
    minor: f32,
    u_axis: Vec3,
    v_axis: Vec3,
}

impl Torus {
    /// Torus around the line through `center` along unit `axis`, with
    /// spine radius `major` and tube radius `minor`.
    pub fn new(center: Vec3, axis: Vec3, major: f32, minor: f32) -> Self {
        let axis = axis.normalize();
        let (u_axis, v_axis) = orthonormal_basis(axis);
        Self {
            center,
            axis,
            major,
            minor,
            u_axis,
            v_axis,
        }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        self.center
    }

    #[inline]
    pub fn axis(&self) -> Vec3 {
        self.axis
    }

    #[inline]
    pub fn major_radius(&self) -> f32 {
        self.major
    }

    #[inline]
    pub fn minor_radius(&self) -> f32 {
        self.minor
    }

    /// (height along axis, distance from axis) of `p`.
    #[inline]
    fn axial_coords(&self, p: Vec3) -> (f32, Vec3) {
        let v = p - self.center;
        let h = v.dot(self.axis);
        (h, v - self.axis * h)
    }
}

impl Primitive for Torus {
    fn tag(&self) -> KindTag {
        KindTag::Torus
    }

    fn signed_distance(&self, p: Vec3) -> f32 {
        let (h, radial) = self.axial_coords(p);
        let rho = radial.length();
        ((rho - self.major) * (rho - self.major) + h * h).sqrt() - self.minor
    }

    fn normal_deviation(&self, p: Vec3, n: Vec3) -> f32 {
        let (_, radial) = self.axial_coords(p);
        let rho = radial.length();
        if rho < 1e-9 {
            return 1.0;
        }
        let spine = self.center + radial * (self.major / rho);
        let tube = p - spine;
        let len = tube.length();
        if len < 1e-9 {
            return 1.0;
        }
        deviation_from_cos(tube.dot(n) / len)
    }

    /// Spine angle × major radius by tube angle × minor radius; periodic
    /// in both axes.
    fn parametric(&self, p: Vec3) -> Vec2 {
        let (h, radial) = self.axial_coords(p);
        let rho = radial.length();
        let u = radial.dot(self.v_axis).atan2(radial.dot(self.u_axis)) * self.major;
        let v = h.atan2(rho - self.major) * self.minor;
        Vec2::new(u, v)
    }

    fn periods(&self) -> (Option<f32>, Option<f32>) {
        (
            Some(std::f32::consts::TAU * self.major),
            Some(std::f32::consts::TAU * self.minor),
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Real roots of `c3·t³ + c2·t² + c1·t + c0 = 0`.
fn solve_cubic(c3: f64, c2: f64, c1: f64, c0: f64) -> Vec<f64> {
    const EPS: f64 = 1e-12;
    if c3.abs() < EPS {
        if c2.abs() < EPS {
            if c1.abs() < EPS {
                return Vec::new();
            }
            return vec![-c0 / c1];
        }
        let disc = c1 * c1 - 4.0 * c2 * c0;
        if disc < 0.0 {
            return Vec::new();
        }
        let s = disc.sqrt();
        return vec![(-c1 + s) / (2.0 * c2), (-c1 - s) / (2.0 * c2)];
    }

    // Depress: t = x − a/3 turns x³ + a·x² + b·x + c into x³ + p·x + q.
    let a = c2 / c3;
    let b = c1 / c3;
    let c = c0 / c3;
    let p = b - a * a / 3.0;
    let q = 2.0 * a * a * a / 27.0 - a * b / 3.0 + c;
    let shift = -a / 3.0;

    let disc = (q / 2.0) * (q / 2.0) + (p / 3.0) * (p / 3.0) * (p / 3.0);
    if disc > EPS {
        let s = disc.sqrt();
        vec![shift + (-q / 2.0 + s).cbrt() + (-q / 2.0 - s).cbrt()]
    } else if disc < -EPS {
        // Three distinct real roots.
        let m = 2.0 * (-p / 3.0).sqrt();
        let arg = (3.0 * q / (2.0 * p)) * (-3.0 / p).sqrt();
        let phi = arg.clamp(-1.0, 1.0).acos() / 3.0;
        (0..3)
            .map(|k| shift + m * (phi - std::f64::consts::TAU * k as f64 / 3.0).cos())
            .collect()
    } else if p.abs() < EPS {
        vec![shift]
    } else {
        vec![shift + 3.0 * q / p, shift - 3.0 * q / (2.0 * p)]
    }
}

/// Circumcenter of three points (assumed non-collinear).
fn circumcenter(a: DVec3, b: DVec3, c: DVec3) -> Option<DVec3> {
    let u = b - a;
    let v = c - a;
    let n = u.cross(v);
    let n2 = n.length_squared();
    if n2 < 1e-18 {
        return None;
    }
    Some(a + (u.length_squared() * v.cross(n) + v.length_squared() * n.cross(u)) / (2.0 * n2))
}

pub struct TorusKind;

impl ShapeKind for TorusKind {
    fn tag(&self) -> KindTag {
        KindTag::Torus
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
        let p: Vec<DVec3> = positions.iter().take(4).map(|v| v.as_dvec3()).collect();
        let n: Vec<DVec3> = normals.iter().take(4).map(|v| v.as_dvec3()).collect();

        let det = |x: DVec3, y: DVec3, z: DVec3| x.cross(y).dot(z);
        let a = [p[1] - p[0], p[2] - p[0], p[3] - p[0]];
        let b = [n[1] - n[0], n[2] - n[0], n[3] - n[0]];

        let c0 = det(a[0], a[1], a[2]);
        let c1 = -(det(b[0], a[1], a[2]) + det(a[0], b[1], a[2]) + det(a[0], a[1], b[2]));
        let c2 = det(b[0], b[1], a[2]) + det(b[0], a[1], b[2]) + det(a[0], b[1], b[2]);
        let c3 = -det(b[0], b[1], b[2]);

        for t in solve_cubic(c3, c2, c1, c0) {
            let minor = t.abs();
            if minor < 1e-6 || !t.is_finite() {
                continue;
            }
            let spine: Vec<DVec3> = (0..4).map(|i| p[i] - t * n[i]).collect();
            let Some(center) = circumcenter(spine[0], spine[1], spine[2]) else {
                continue;
            };
            let axis = (spine[1] - spine[0]).cross(spine[2] - spine[0]);
            if axis.length_squared() < 1e-18 {
                continue;
            }
            let axis = axis.normalize();
            let major = spine
                .iter()
                .map(|&s| {
                    let v = s - center;
                    (v - axis * v.dot(axis)).length()
                })
                .sum::<f64>()
                / 4.0;
            if major < 1e-6 {
                continue;
            }

            let torus = Torus::new(
                center.as_vec3(),
                axis.as_vec3(),
                major as f32,
                minor as f32,
            );
            if sample_fits(&torus, positions, normals, epsilon, normal_threshold) {
                return Some(Box::new(torus));
            }
        }
        None
    }
}
