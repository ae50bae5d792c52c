//! Numerical constants shared across the intersection kernel.
//!
//! These mirror the POV-Ray core's tuning constants bit-for-bit where the
//! value is user-visible (e.g. intersection depths); see the module-level
//! notes in [`crate::solver`] for where the fudge factors are used.

/// A coefficient smaller than this is treated as exactly zero.
pub const EPSILON: f64 = 1.0e-10;

/// Tolerance used when testing whether an object's bound overlaps a BSP cell.
pub const BSP_TOLERANCE: f64 = 1.0e-5;

/// Minimum valid intersection depth; anything shallower is self-intersection
/// "acne" and is discarded.
pub const DEPTH_TOLERANCE: f64 = 1.0e-4;

/// Final precision demanded of a polynomial solver root.
pub const ROOT_TOLERANCE: f64 = 1.0e-4;

/// A coefficient magnitude below this is considered zero during Sturm
/// sequence construction and quadratic discriminant tests.
pub const SMALL_ENOUGH: f64 = 1.0e-10;

/// Effective "infinity" for ray parameter values.
pub const MAX_DISTANCE: f64 = 1.0e7;

/// Largest polynomial degree the solver will accept.
pub const MAX_ORDER: usize = 35;

/// Maximum depth of a BSP tree (and the fixed size of a traversal stack).
pub const MAX_BSP_TREE_LEVEL: usize = 128;

/// Magnitude span across quartic coefficients beyond which the Sturm path
/// is forced regardless of the `sturm` flag (`FUDGE_FACTOR1` upstream).
pub const FUDGE_FACTOR1: f64 = 1.0e12;

/// Maximum bisection/regula-falsi iterations before returning a best-effort root.
pub const MAX_ITERATIONS: usize = 50;

/// Smallest relative error demanded of regula-falsi / bisection refinement.
pub const RELERROR: f64 = 1.0e-12;

/// CSG bounding boxes are clamped to this magnitude to avoid exploding
/// after repeated transforms.
pub const CRITICAL_LENGTH: f64 = 1.0e15;
