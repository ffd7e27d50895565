//! End-to-end detection scenarios on synthetic scenes.

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use shape_ransac::{
    Cylinder, CylinderKind, DetectParams, Detector, KindTag, PlaneKind, Sphere, SphereKind,
};

fn gaussian<R: Rng>(rng: &mut R, sigma: f32) -> f32 {
    let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
    let u2: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
    sigma * (-2.0 * u1.ln()).sqrt() * u2.cos()
}

fn unit_dir<R: Rng>(rng: &mut R) -> Vec3 {
    let z: f32 = rng.gen_range(-1.0..1.0);
    let theta: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
    let r = (1.0 - z * z).sqrt();
    Vec3::new(r * theta.cos(), r * theta.sin(), z)
}

/// Points on a unit sphere around `center`, radial noise `sigma`.
fn sphere_cloud<R: Rng>(
    n: usize,
    center: Vec3,
    sigma: f32,
    rng: &mut R,
) -> (Vec<Vec3>, Vec<Vec3>) {
    let mut positions = Vec::with_capacity(n);
    let mut normals = Vec::with_capacity(n);
    for _ in 0..n {
        let dir = unit_dir(rng);
        positions.push(center + dir * (1.0 + gaussian(rng, sigma)));
        normals.push(dir);
    }
    (positions, normals)
}

/// Axis-aligned rectangular patch on the plane z = `z`.
fn plane_patch<R: Rng>(
    n: usize,
    x_range: std::ops::Range<f32>,
    y_range: std::ops::Range<f32>,
    z: f32,
    sigma: f32,
    rng: &mut R,
) -> (Vec<Vec3>, Vec<Vec3>) {
    let mut positions = Vec::with_capacity(n);
    for _ in 0..n {
        positions.push(Vec3::new(
            rng.gen_range(x_range.clone()),
            rng.gen_range(y_range.clone()),
            z + gaussian(rng, sigma),
        ));
    }
    (positions, vec![Vec3::Z; n])
}

fn merge(clouds: Vec<(Vec<Vec3>, Vec<Vec3>)>) -> (Vec<Vec3>, Vec<Vec3>) {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    for (mut p, mut n) in clouds {
        positions.append(&mut p);
        normals.append(&mut n);
    }
    (positions, normals)
}

#[test]
fn single_noisy_sphere() {
    let mut rng = ChaCha8Rng::seed_from_u64(101);
    let center = Vec3::new(0.2, -0.4, 1.0);
    let (positions, normals) = sphere_cloud(6_000, center, 0.005, &mut rng);

    let params = DetectParams {
        probability: 0.01,
        min_points: 1_000,
        epsilon: 0.02,
        normal_threshold: 0.2,
        cluster_epsilon: 0.1,
        ..DetectParams::default()
    };
    let mut detector = Detector::with_seed(&positions, &normals, 11).unwrap();
    detector.register(Box::new(SphereKind));
    let found = detector.detect(&params).unwrap();

    assert_eq!(found, 1, "expected exactly one sphere");
    let shape = &detector.shapes()[0];
    assert_eq!(shape.tag(), KindTag::Sphere);
    assert!(shape.support() >= 5_500, "support {}", shape.support());

    let sphere = shape.primitive().as_any().downcast_ref::<Sphere>().unwrap();
    assert!((sphere.radius() - 1.0).abs() < 0.03, "radius {}", sphere.radius());
    assert!(sphere.center().distance(center) < 0.03);

    // Every claimed point respects the widened verification tolerance.
    for &index in shape.indices() {
        let p = detector.positions()[index as usize];
        let n = detector.normals()[index as usize];
        assert!(shape.primitive().signed_distance(p).abs() <= 3.0 * params.epsilon);
        assert!(shape.primitive().normal_deviation(p, n) <= params.normal_threshold);
    }
}

#[test]
fn two_parallel_planes_are_separated() {
    let mut rng = ChaCha8Rng::seed_from_u64(202);
    let (positions, normals) = merge(vec![
        plane_patch(3_000, -1.0..1.0, -1.0..1.0, 0.0, 0.002, &mut rng),
        plane_patch(3_000, -1.0..1.0, -1.0..1.0, 1.0, 0.002, &mut rng),
    ]);

    let params = DetectParams {
        probability: 0.01,
        min_points: 500,
        epsilon: 0.01,
        normal_threshold: 0.1,
        cluster_epsilon: 0.1,
        ..DetectParams::default()
    };
    let mut detector = Detector::with_seed(&positions, &normals, 22).unwrap();
    detector.register(Box::new(PlaneKind));
    let found = detector.detect(&params).unwrap();

    assert_eq!(found, 2, "expected both planes");
    let total: usize = detector.shapes().iter().map(|s| s.support()).sum();
    assert!(total >= 5_700, "claimed only {total}");

    // One shape per plane: every claim is z-coherent.
    for shape in detector.shapes() {
        let zs: Vec<f32> = shape
            .indices()
            .iter()
            .map(|&i| detector.positions()[i as usize].z)
            .collect();
        let near_zero = zs.iter().filter(|z| z.abs() < 0.5).count();
        assert!(near_zero == 0 || near_zero == zs.len());
    }
}

#[test]
fn pure_noise_yields_nothing() {
    let mut rng = ChaCha8Rng::seed_from_u64(303);
    let n = 5_000;
    let positions: Vec<Vec3> = (0..n)
        .map(|_| {
            Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            )
        })
        .collect();
    let normals: Vec<Vec3> = (0..n).map(|_| unit_dir(&mut rng)).collect();

    let params = DetectParams {
        probability: 0.01,
        min_points: 400,
        epsilon: 0.01,
        normal_threshold: 0.2,
        cluster_epsilon: 0.1,
        ..DetectParams::default()
    };
    let mut detector = Detector::with_seed(&positions, &normals, 33).unwrap();
    detector.register(Box::new(PlaneKind));
    detector.register(Box::new(SphereKind));
    let found = detector.detect(&params).unwrap();

    assert_eq!(found, 0);
    assert_eq!(detector.unassigned_indices().count(), n);
}

/// Two coplanar patches separated by three times the cluster gap must come
/// back as two shapes, not one.
#[test]
fn coplanar_patches_split_across_gap() {
    let mut rng = ChaCha8Rng::seed_from_u64(404);
    let (positions, normals) = merge(vec![
        plane_patch(2_500, -1.0..-0.2, -0.5..0.5, 0.0, 0.001, &mut rng),
        plane_patch(2_500, 0.1..0.9, -0.5..0.5, 0.0, 0.001, &mut rng),
    ]);

    let params = DetectParams {
        probability: 0.01,
        min_points: 1_000,
        epsilon: 0.01,
        normal_threshold: 0.1,
        cluster_epsilon: 0.1,
        ..DetectParams::default()
    };
    let mut detector = Detector::with_seed(&positions, &normals, 44).unwrap();
    detector.register(Box::new(PlaneKind));
    let found = detector.detect(&params).unwrap();

    assert_eq!(found, 2, "the gap must split the claim");
    for shape in detector.shapes() {
        assert!(shape.support() >= 2_000);
        let xs: Vec<f32> = shape
            .indices()
            .iter()
            .map(|&i| detector.positions()[i as usize].x)
            .collect();
        let left = xs.iter().filter(|&&x| x < -0.1).count();
        assert!(
            left == 0 || left == xs.len(),
            "claim spans the gap ({left} of {})",
            xs.len()
        );
    }
}

#[test]
fn sphere_and_plane_coexist() {
    let mut rng = ChaCha8Rng::seed_from_u64(505);
    let (sphere_p, sphere_n) = sphere_cloud(4_000, Vec3::ZERO, 0.003, &mut rng);
    let (plane_p, plane_n) = plane_patch(4_000, -2.0..2.0, -2.0..2.0, 0.0, 0.002, &mut rng);
    let (positions, normals) = merge(vec![(sphere_p, sphere_n), (plane_p, plane_n)]);

    let params = DetectParams {
        probability: 0.01,
        min_points: 800,
        epsilon: 0.01,
        normal_threshold: 0.1,
        cluster_epsilon: 0.15,
        ..DetectParams::default()
    };
    let mut detector = Detector::with_seed(&positions, &normals, 55).unwrap();
    detector.register(Box::new(PlaneKind));
    detector.register(Box::new(SphereKind));
    let found = detector.detect(&params).unwrap();

    assert!(found >= 2, "found {found}");
    let spheres = detector
        .shapes()
        .iter()
        .filter(|s| s.tag() == KindTag::Sphere)
        .count();
    let planes = detector
        .shapes()
        .iter()
        .filter(|s| s.tag() == KindTag::Plane)
        .count();
    assert!(spheres >= 1, "no sphere among {found} shapes");
    assert!(planes >= 1, "no plane among {found} shapes");

    // Claims stay disjoint even along the intersection curve.
    let mut owner = vec![false; detector.len()];
    for shape in detector.shapes() {
        for &index in shape.indices() {
            assert!(!owner[index as usize]);
            owner[index as usize] = true;
        }
    }
}

#[test]
fn cylinder_survives_outliers() {
    let mut rng = ChaCha8Rng::seed_from_u64(606);
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    for _ in 0..5_000 {
        let a: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
        let radial = Vec3::new(a.cos(), a.sin(), 0.0);
        positions.push(radial * (0.5 + gaussian(&mut rng, 0.003)) + Vec3::Z * rng.gen_range(-1.0..1.0));
        normals.push(radial);
    }
    for _ in 0..1_000 {
        positions.push(Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        ));
        normals.push(unit_dir(&mut rng));
    }

    let params = DetectParams {
        probability: 0.01,
        min_points: 1_200,
        epsilon: 0.015,
        normal_threshold: 0.1,
        cluster_epsilon: 0.1,
        ..DetectParams::default()
    };
    let mut detector = Detector::with_seed(&positions, &normals, 66).unwrap();
    detector.register(Box::new(CylinderKind));
    let found = detector.detect(&params).unwrap();

    assert_eq!(found, 1, "expected just the cylinder");
    let shape = &detector.shapes()[0];
    assert_eq!(shape.tag(), KindTag::Cylinder);
    assert!(shape.support() >= 4_200, "support {}", shape.support());

    let cylinder = shape
        .primitive()
        .as_any()
        .downcast_ref::<Cylinder>()
        .unwrap();
    assert!(cylinder.axis().z.abs() > 0.99, "axis {:?}", cylinder.axis());
    assert!((cylinder.radius() - 0.5).abs() < 0.03, "radius {}", cylinder.radius());
}

#[test]
fn exact_plane_claims_everything() {
    let mut positions = Vec::new();
    for i in 0..50 {
        for j in 0..50 {
            positions.push(Vec3::new(i as f32 * 0.04, j as f32 * 0.04, 0.3));
        }
    }
    let normals = vec![Vec3::Z; positions.len()];

    let params = DetectParams {
        probability: 0.01,
        min_points: 500,
        epsilon: 0.005,
        normal_threshold: 0.05,
        cluster_epsilon: 0.1,
        ..DetectParams::default()
    };
    let mut detector = Detector::with_seed(&positions, &normals, 77).unwrap();
    detector.register(Box::new(PlaneKind));
    let found = detector.detect(&params).unwrap();

    assert_eq!(found, 1);
    assert_eq!(detector.shapes()[0].support(), 2_500);
    assert_eq!(detector.unassigned_count(), 0);
}
