use super::vec3::{Point3, Vec3};
use bitflags::bitflags;

bitflags! {
    /// Classifies a ray's role in the light-transport recursion. These
    /// never affect intersection math directly, but primitives consult
    /// `RayFlags::SHADOW` to short-circuit on opaque objects, and the
    /// BSP traversal mailbox is keyed independently of flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RayFlags: u8 {
        const PRIMARY    = 0b0000_0001;
        const REFLECTION = 0b0000_0010;
        const REFRACTION = 0b0000_0100;
        const SUBSURFACE = 0b0000_1000;
        const SHADOW     = 0b0001_0000;
    }
}

/// A parametric ray `R(t) = origin + t * direction`, the fundamental query
/// primitive for every intersection test in the kernel.
///
/// `direction` is expected to be a unit vector; primitives that transform
/// the ray into local space rescale roots by the transformed direction's
/// original length rather than re-normalizing results (see
/// [`crate::math::transform::Transform::to_local`]).
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Point3,
    pub direction: Vec3,
    pub flags: RayFlags,
    /// Monotonically increasing recursion depth; the caller enforces the
    /// configured maximum trace level, the kernel itself never recurses.
    pub trace_level: u32,
}

impl Ray {
    #[inline]
    pub fn new(origin: Point3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            flags: RayFlags::PRIMARY,
            trace_level: 0,
        }
    }

    #[inline]
    pub fn with_flags(mut self, flags: RayFlags) -> Self {
        self.flags = flags;
        self
    }

    #[inline]
    pub fn child(&self, origin: Point3, direction: Vec3, flags: RayFlags) -> Self {
        Self {
            origin,
            direction,
            flags,
            trace_level: self.trace_level + 1,
        }
    }

    /// Evaluates the ray at parameter `t`.
    #[inline(always)]
    pub fn at(&self, t: f64) -> Point3 {
        self.origin + self.direction * t
    }

    #[inline]
    pub fn is_shadow_test(&self) -> bool {
        self.flags.contains(RayFlags::SHADOW)
    }

    #[inline]
    pub fn is_subsurface(&self) -> bool {
        self.flags.contains(RayFlags::SUBSURFACE)
    }
}
