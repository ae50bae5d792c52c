//! `tracer_core`: the geometric intersection core of an offline ray tracer
//! — analytic primitives, a Sturm/closed-form polynomial root solver, and a
//! Surface Area Heuristic BSP acceleration structure.
//!
//! This crate deliberately stops at the geometric contract: it hands back
//! intersection points, normals, and UV coordinates, and leaves shading,
//! scene parsing, and image output to its caller.

pub mod bsp;
pub mod camera;
pub mod constants;
pub mod error;
pub mod math;
pub mod primitive;
pub mod scene;
pub mod solver;
pub mod stats;
pub mod thread_state;

pub use bsp::{BspOptions, BspTree};
pub use camera::{Camera, CameraKind, CylinderAxis, FocalBlur, MeshDistribution, UserDefinedRays};
pub use error::{SceneError, SceneResult};
pub use primitive::{Intersection, Primitive, PrimitiveKind};
pub use scene::{build_scene, Scene};
pub use solver::{solve, solve_with_stats, RootSet, SolverStats};
pub use stats::{BspStats, ThreadStats};
pub use thread_state::ThreadState;
