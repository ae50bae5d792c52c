//! A small CLI demonstrating `tracer_core`'s public surface: build a scene,
//! fan out a camera's primary rays over an image grid, and report what was
//! hit. Grounded on the teacher's original `main.rs` (`clap`-derived `Cli`,
//! a header print, scene-preset dispatch) with the path-tracing renderer
//! replaced by a direct call into the new library's `Scene::trace`.

use clap::{Parser, ValueEnum};
use tracer_core::math::{Point3, Ray, Vec3};
use tracer_core::primitive::quadric::{Plane, Sphere};
use tracer_core::{build_scene, BspOptions, Camera, CameraKind, Primitive, Scene, ThreadState};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preset {
    /// Three spheres over a ground plane.
    Spheres,
    /// A single centered sphere, for a minimal smoke test.
    Single,
}

#[derive(Debug, Parser)]
#[command(name = "tracer-demo", about = "Exercises the tracer_core intersection kernel over a built-in scene")]
struct Cli {
    /// Built-in scene to trace.
    #[arg(long, value_enum, default_value_t = Preset::Spheres)]
    scene: Preset,

    /// Image width in pixels.
    #[arg(long, default_value_t = 160)]
    width: u32,

    /// Image height in pixels.
    #[arg(long, default_value_t = 90)]
    height: u32,
}

fn build_preset(preset: Preset) -> Scene {
    let primitives: Vec<Box<dyn Primitive>> = match preset {
        Preset::Single => vec![Box::new(Sphere::new(Vec3::new(0.0, 0.0, 0.0), 1.0))],
        Preset::Spheres => vec![
            Box::new(Sphere::new(Vec3::new(-2.2, 0.0, 0.0), 1.0)),
            Box::new(Sphere::new(Vec3::new(0.0, 0.0, 0.0), 1.0)),
            Box::new(Sphere::new(Vec3::new(2.2, 0.0, 0.0), 1.0)),
            Box::new(Plane::new(Vec3::unit_y(), -1.0)),
        ],
    };
    build_scene(primitives, BspOptions::default())
}

fn print_header(cli: &Cli) {
    println!("tracer-demo: {:?} scene, {}x{} image", cli.scene, cli.width, cli.height);
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    print_header(&cli);

    let scene = build_preset(cli.scene);
    let camera = Camera::new(
        CameraKind::Perspective,
        Point3::new(0.0, 1.5, 8.0),
        Vec3::new(0.0, -0.15, -1.0),
        Vec3::new(1.33, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
    );

    let mut thread = ThreadState::new(scene.primitive_count());
    let (width, height) = (cli.width as f64, cli.height as f64);

    let mut hit_count = 0u64;
    let mut miss_count = 0u64;
    let mut closest: Option<(f64, u32)> = None;

    for y in 0..cli.height {
        for x in 0..cli.width {
            let Some(ray): Option<Ray> = camera.primary_ray(x as f64 + 0.5, y as f64 + 0.5, width, height, 0) else {
                continue;
            };
            match scene.trace(&ray, &mut thread) {
                Some(hit) => {
                    hit_count += 1;
                    if closest.map_or(true, |(t, _)| hit.t < t) {
                        closest = Some((hit.t, hit.primitive_id));
                    }
                }
                None => miss_count += 1,
            }
        }
    }

    println!("rays traced: {}", hit_count + miss_count);
    println!("hits: {hit_count}, misses: {miss_count}");
    if let Some((t, id)) = closest {
        println!("closest hit: primitive {id} at depth {t:.4}");
    }

    let stats = scene.bsp().stats();
    println!(
        "bsp: {} nodes, {} leaves, avg {:.2} objects/leaf, max depth {}",
        stats.node_count,
        stats.leaf_count,
        stats.average_objects_per_leaf(),
        stats.max_depth_reached
    );
}
