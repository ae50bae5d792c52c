//! Error types surfaced by scene construction.
//!
//! Per the error-handling contract: domain errors are raised only at
//! construction time (a malformed primitive, too few spline control
//! points, a degenerate torus). Intersection-time numerical issues are
//! absorbed silently by design — they never reach this type.

use thiserror::Error;

/// A construction-time error. The scene (or primitive) that produced it
/// must be discarded; there is no partial-construction recovery.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SceneError {
    /// A shape was given a zero-length axis, a zero radius, or otherwise
    /// cannot represent a non-degenerate surface.
    #[error("degenerate geometry in {shape}: {reason}")]
    DegenerateGeometry {
        /// Name of the primitive variant that failed to build.
        shape: &'static str,
        /// Human-readable description of what made it degenerate.
        reason: String,
    },

    /// A prism, lathe, or bicubic patch was given fewer control points
    /// than its spline type requires.
    #[error("{shape} requires at least {required} control points, got {got}")]
    TooFewControlPoints {
        /// Name of the primitive variant.
        shape: &'static str,
        /// Minimum control points required by the spline type.
        required: usize,
        /// Control points actually supplied.
        got: usize,
    },

    /// An out-of-range parameter was clamped rather than rejected; this
    /// variant carries the warning text surfaced through the messenger
    /// interface rather than aborting construction.
    #[error("{shape}: {message}")]
    ClampedWarning {
        /// Name of the primitive variant.
        shape: &'static str,
        /// Description of what was clamped and to what.
        message: String,
    },

    /// I/O failure while reading or writing a serialized BSP tree dump.
    #[error("BSP tree I/O error: {0}")]
    Io(String),
}

/// Result alias used throughout scene/primitive construction.
pub type SceneResult<T> = Result<T, SceneError>;
