//! The `Primitive` trait and the shared `Intersection` record every shape
//! in the kernel produces.
//!
//! Dispatch is through `dyn Primitive` almost everywhere; the one place a
//! closed tag is needed is CSG child-flattening, which wants to know
//! "is this child itself a CSG node" without downcasting — `PrimitiveKind`
//! exists purely for that.

pub mod bicubic_patch;
pub mod blob;
pub mod csg;
pub mod heightfield;
pub mod mesh;
pub mod ovus_lemon;
pub mod polynomial_surface;
pub mod quadric;
pub mod swept;
pub mod torus;

use crate::math::{Ray, Vec2, Vec3};
use crate::thread_state::ThreadState;

/// Small closed tag used only for CSG-specific dispatch shortcuts (spec
/// design note: "acceleration-specific super-types become marker tags").
/// Never used for general intersection dispatch — that goes through the
/// trait object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Sphere,
    Plane,
    Box,
    Cylinder,
    Cone,
    Quadric,
    Torus,
    Ovus,
    Lemon,
    Polygon,
    BicubicPatch,
    Prism,
    Lathe,
    Sor,
    Mesh,
    HeightField,
    Blob,
    Polynomial,
    Csg,
}

/// A single ray/primitive hit. `i1`, `i2`, `d1`, `b1` and `local_point` are
/// opaque per-hit scratch the primitive that produced the hit may use
/// during `normal`/`uv` evaluation to avoid recomputing state (spec §3):
/// e.g. a cylinder stores which cap was hit in `b1`, a mesh stores the
/// triangle index in `i1`, a blob stores the winning element index in `i1`.
#[derive(Debug, Clone, Copy)]
pub struct Intersection {
    pub t: f64,
    pub point: Vec3,
    pub normal: Vec3,
    pub uv: Option<Vec2>,
    pub local_point: Vec3,
    pub i1: i64,
    pub i2: i64,
    pub d1: f64,
    pub b1: bool,
    /// Index of the owning primitive within the scene's flat object list;
    /// filled in by the BSP/CSG traversal, not by the primitive itself.
    pub primitive_id: u32,
}

impl Intersection {
    pub fn new(t: f64, point: Vec3, normal: Vec3) -> Self {
        Self {
            t,
            point,
            normal,
            uv: None,
            local_point: point,
            i1: -1,
            i2: -1,
            d1: 0.0,
            b1: false,
            primitive_id: u32::MAX,
        }
    }
}

/// The capability set every shape exposes (spec §4.2). Trait objects are
/// `Send + Sync`: the scene is built once and shared by reference across
/// worker threads (spec §5).
pub trait Primitive: Send + Sync {
    /// Appends every valid hit along `ray` to `stack`; returns whether any
    /// were appended. A "valid" hit has depth in
    /// `(DEPTH_TOLERANCE, MAX_DISTANCE)` and, if the primitive carries a
    /// clip list, lies inside every clip primitive.
    fn all_intersections(&self, ray: &Ray, stack: &mut Vec<Intersection>, thread: &mut ThreadState) -> bool;

    /// Whether `point` is interior to the primitive, respecting the
    /// invert flag.
    fn inside(&self, point: Vec3, thread: &mut ThreadState) -> bool;

    /// Outward surface normal at a previously-produced intersection.
    fn normal(&self, inter: &Intersection, thread: &mut ThreadState) -> Vec3;

    /// Surface parameterization at a hit; default is unsupported (`None`)
    /// for primitives that never define one.
    fn uv(&self, inter: &Intersection) -> Option<Vec2> {
        let _ = inter;
        None
    }

    fn bbox(&self) -> crate::math::BoundingBox;

    /// Flips inside/outside. Most primitives flip a stored bool; CSG
    /// rewrites itself (see `csg.rs`).
    fn invert(&mut self);

    /// Whether every texture binding on this primitive (outer and, for
    /// CSG, inner) is guaranteed opaque, letting shadow tests short-circuit.
    fn opaque(&self) -> bool {
        true
    }

    fn kind(&self) -> PrimitiveKind;
}

pub use bicubic_patch::BicubicPatch;
pub use blob::Blob;
pub use csg::{Csg, CsgOp};
pub use heightfield::HeightField;
pub use mesh::Mesh;
pub use ovus_lemon::{Lemon, Ovus};
pub use polynomial_surface::PolynomialSurface;
pub use quadric::{Box3, Cone, Cylinder, Plane, Quadric, Sphere};
pub use swept::{Lathe, Polygon, Prism, Sor};
pub use torus::{SpindleTorus, SpindleVisibility, Torus};
