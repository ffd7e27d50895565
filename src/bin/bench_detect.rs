//! Benchmark shape detection on synthetic scenes.
//!
//! Run with: cargo run --release --bin bench_detect
//!
//! Usage:
//!   bench_detect                 Default scene (sphere, 50k points)
//!   bench_detect -s planes 100k  Two-plane scene at 100k points
//!   bench_detect -n 5            Repeat 5 times (for profiling)

use clap::Parser;
use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use shape_ransac::{DetectParams, Detector};
use std::time::Instant;

fn parse_count(s: &str) -> Result<usize, String> {
    let s = s.to_lowercase();
    let (num_str, multiplier) = if s.ends_with('m') {
        (&s[..s.len() - 1], 1_000_000)
    } else if s.ends_with('k') {
        (&s[..s.len() - 1], 1_000)
    } else {
        (s.as_str(), 1)
    };

    num_str
        .parse::<f64>()
        .map(|n| (n * multiplier as f64) as usize)
        .map_err(|e| format!("Invalid number '{}': {}", s, e))
}

#[derive(Parser)]
#[command(name = "bench_detect")]
#[command(about = "Benchmark primitive-shape detection on synthetic scenes")]
struct Args {
    /// Point counts to benchmark (e.g., 50k, 200k, 1m)
    #[arg(value_parser = parse_count)]
    sizes: Vec<usize>,

    /// Scene: sphere, planes, cylinder, mixed, noise
    #[arg(short, long, default_value = "sphere")]
    scene: String,

    /// Random seed (drives both scene generation and detection)
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Positional noise sigma
    #[arg(long, default_value_t = 0.005)]
    noise: f32,

    /// Minimum shape support, as a fraction of the point count
    #[arg(long, default_value_t = 0.05)]
    min_fraction: f64,

    /// Number of iterations to run (useful for profiling)
    #[arg(short = 'n', long, default_value_t = 1)]
    repeat: usize,
}

fn gaussian<R: Rng>(rng: &mut R, sigma: f32) -> f32 {
    // Box-Muller; one draw per call is plenty here.
    let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
    let u2: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
    sigma * (-2.0 * u1.ln()).sqrt() * u2.cos()
}

fn sphere_scene<R: Rng>(n: usize, noise: f32, rng: &mut R) -> (Vec<Vec3>, Vec<Vec3>) {
    let mut positions = Vec::with_capacity(n);
    let mut normals = Vec::with_capacity(n);
    for _ in 0..n {
        let z: f32 = rng.gen_range(-1.0..1.0);
        let theta: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
        let r = (1.0 - z * z).sqrt();
        let dir = Vec3::new(r * theta.cos(), r * theta.sin(), z);
        positions.push(dir * (1.0 + gaussian(rng, noise)));
        normals.push(dir);
    }
    (positions, normals)
}

fn planes_scene<R: Rng>(n: usize, noise: f32, rng: &mut R) -> (Vec<Vec3>, Vec<Vec3>) {
    let mut positions = Vec::with_capacity(n);
    let mut normals = Vec::with_capacity(n);
    for i in 0..n {
        let z = if i % 2 == 0 { 0.0 } else { 1.0 };
        positions.push(Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            z + gaussian(rng, noise),
        ));
        normals.push(Vec3::Z);
    }
    (positions, normals)
}

fn cylinder_scene<R: Rng>(n: usize, noise: f32, rng: &mut R) -> (Vec<Vec3>, Vec<Vec3>) {
    let mut positions = Vec::with_capacity(n);
    let mut normals = Vec::with_capacity(n);
    for _ in 0..n {
        let a: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
        let h: f32 = rng.gen_range(-1.0..1.0);
        let radial = Vec3::new(a.cos(), a.sin(), 0.0);
        positions.push(radial * (0.5 + gaussian(rng, noise)) + Vec3::Z * h);
        normals.push(radial);
    }
    (positions, normals)
}

fn noise_scene<R: Rng>(n: usize, rng: &mut R) -> (Vec<Vec3>, Vec<Vec3>) {
    let mut positions = Vec::with_capacity(n);
    let mut normals = Vec::with_capacity(n);
    for _ in 0..n {
        positions.push(Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        ));
        let z: f32 = rng.gen_range(-1.0..1.0);
        let theta: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
        let r = (1.0 - z * z).sqrt();
        normals.push(Vec3::new(r * theta.cos(), r * theta.sin(), z));
    }
    (positions, normals)
}

fn mixed_scene<R: Rng>(n: usize, noise: f32, rng: &mut R) -> (Vec<Vec3>, Vec<Vec3>) {
    let (mut positions, mut normals) = sphere_scene(n / 2, noise, rng);
    let (mut plane_p, mut plane_n) = planes_scene(n - n / 2, noise, rng);
    positions.append(&mut plane_p);
    normals.append(&mut plane_n);
    (positions, normals)
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let sizes = if args.sizes.is_empty() {
        vec![50_000]
    } else {
        args.sizes.clone()
    };

    for &n in &sizes {
        let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
        let (positions, normals) = match args.scene.as_str() {
            "sphere" => sphere_scene(n, args.noise, &mut rng),
            "planes" => planes_scene(n, args.noise, &mut rng),
            "cylinder" => cylinder_scene(n, args.noise, &mut rng),
            "mixed" => mixed_scene(n, args.noise, &mut rng),
            "noise" => noise_scene(n, &mut rng),
            other => {
                eprintln!("unknown scene '{other}'");
                std::process::exit(1);
            }
        };

        let params = DetectParams {
            probability: 0.01,
            min_points: ((n as f64 * args.min_fraction) as usize).max(10),
            epsilon: 0.01,
            normal_threshold: 0.1,
            cluster_epsilon: 0.1,
            ..DetectParams::default()
        };

        println!("== {} scene, {} points ==", args.scene, n);
        for run in 0..args.repeat {
            let build_start = Instant::now();
            let mut detector =
                Detector::with_seed(&positions, &normals, args.seed.wrapping_add(run as u64))
                    .expect("non-empty scene");
            detector.register_default_kinds();
            let build_time = build_start.elapsed();

            let detect_start = Instant::now();
            let found = detector.detect(&params).expect("valid parameters");
            let detect_time = detect_start.elapsed();

            println!(
                "  build {:>9.3?}  detect {:>9.3?}  {} shapes, {} points unassigned",
                build_time,
                detect_time,
                found,
                detector.unassigned_count()
            );
            for shape in detector.shapes() {
                println!("    {} with {} points", shape.tag(), shape.support());
            }
        }
    }
}
