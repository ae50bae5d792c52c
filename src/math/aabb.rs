use super::ray::Ray;
use super::vec3::Point3;

/// Axis-aligned bounding box stored as `lower_left + size`, per the data
/// model's invariant that `size` has no negative component and
/// `lower_left + size` is the upper-right corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lower_left: Point3,
    pub size: Point3,
}

impl BoundingBox {
    pub fn new(lower_left: Point3, size: Point3) -> Self {
        debug_assert!(size.x >= 0.0 && size.y >= 0.0 && size.z >= 0.0);
        Self { lower_left, size }
    }

    /// Builds a box from its min/max corners, ordering components so the
    /// invariant `size >= 0` always holds regardless of input order.
    pub fn from_corners(a: Point3, b: Point3) -> Self {
        let lo = a.min(b);
        let hi = a.max(b);
        Self {
            lower_left: lo,
            size: hi - lo,
        }
    }

    #[inline]
    pub fn min(&self) -> Point3 {
        self.lower_left
    }

    #[inline]
    pub fn max(&self) -> Point3 {
        self.lower_left + self.size
    }

    pub fn empty() -> Self {
        Self {
            lower_left: Point3::splat(f64::INFINITY),
            size: Point3::splat(-f64::INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size.x < 0.0 || self.size.y < 0.0 || self.size.z < 0.0
    }

    /// Union of two boxes — the bounding volume containing both.
    pub fn surrounding(a: &BoundingBox, b: &BoundingBox) -> BoundingBox {
        if a.is_empty() {
            return *b;
        }
        if b.is_empty() {
            return *a;
        }
        BoundingBox::from_corners(a.min().min(b.min()), a.max().max(b.max()))
    }

    pub fn union_with(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::surrounding(self, other)
    }

    /// Clamps the box's extent to `CRITICAL_LENGTH` about its own center,
    /// so a CSG bbox can't explode after a chain of transforms.
    pub fn clamp_extent(&self, max_extent: f64) -> BoundingBox {
        let center = self.lower_left + self.size * 0.5;
        let half = (self.size * 0.5).min(Point3::splat(max_extent));
        BoundingBox::from_corners(center - half, center + half)
    }

    pub fn longest_axis(&self) -> usize {
        if self.size.x > self.size.y && self.size.x > self.size.z {
            0
        } else if self.size.y > self.size.z {
            1
        } else {
            2
        }
    }

    pub fn surface_area(&self) -> f64 {
        let s = self.size;
        2.0 * (s.x * s.y + s.x * s.z + s.y * s.z)
    }

    pub fn contains_point(&self, p: Point3) -> bool {
        let lo = self.min();
        let hi = self.max();
        p.x >= lo.x && p.x <= hi.x && p.y >= lo.y && p.y <= hi.y && p.z >= lo.z && p.z <= hi.z
    }

    /// Slab-method ray/box intersection test against `[t_min, t_max]`.
    /// Per-axis direction sign selects which slab edge is near vs. far;
    /// the reciprocal-direction formulation naturally produces the correct
    /// answer for axis-aligned rays (division by zero yields `+-inf`,
    /// which compares correctly against a finite slab bound).
    pub fn hit(&self, ray: &Ray, mut t_min: f64, mut t_max: f64) -> bool {
        let lo = self.min();
        let hi = self.max();
        for axis in 0..3 {
            let inv_d = 1.0 / ray.direction[axis];
            let mut t0 = (lo[axis] - ray.origin[axis]) * inv_d;
            let mut t1 = (hi[axis] - ray.origin[axis]) * inv_d;
            if inv_d < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t0.max(t_min);
            t_max = t1.min(t_max);
            if t_max <= t_min {
                return false;
            }
        }
        true
    }

    /// `t_min, t_max` of the intersection interval, or `None` if the ray
    /// misses. Used by height field and blob traversal, which need the
    /// entry depth rather than a boolean.
    pub fn intersect_interval(&self, ray: &Ray, mut t_min: f64, mut t_max: f64) -> Option<(f64, f64)> {
        let lo = self.min();
        let hi = self.max();
        for axis in 0..3 {
            let inv_d = 1.0 / ray.direction[axis];
            let mut t0 = (lo[axis] - ray.origin[axis]) * inv_d;
            let mut t1 = (hi[axis] - ray.origin[axis]) * inv_d;
            if inv_d < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t0.max(t_min);
            t_max = t1.min(t_max);
            if t_max <= t_min {
                return None;
            }
        }
        Some((t_min, t_max))
    }
}

/// `Ray_In_Bound`: true if `ray` intersects every box in `bounds`, or
/// originates inside all of them. Used both for per-primitive clip lists
/// and (conceptually) for the BSP's root-level reject test.
pub fn ray_in_bound(ray: &Ray, bounds: &[BoundingBox]) -> bool {
    bounds.iter().all(|b| {
        b.contains_point(ray.origin) || b.hit(ray, crate::constants::DEPTH_TOLERANCE, crate::constants::MAX_DISTANCE)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::vec3::Vec3;

    #[test]
    fn unit_box_hit_from_outside() {
        let b = BoundingBox::from_corners(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let ray = Ray::new(Point3::new(2.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
        assert!(b.hit(&ray, 0.0, f64::INFINITY));
        let (t0, t1) = b.intersect_interval(&ray, 0.0, f64::INFINITY).unwrap();
        assert!((t0 - 1.0).abs() < 1e-9);
        assert!((t1 - 3.0).abs() < 1e-9);
    }

    #[test]
    fn miss_reports_false() {
        let b = BoundingBox::from_corners(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let ray = Ray::new(Point3::new(2.0, 5.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
        assert!(!b.hit(&ray, 0.0, f64::INFINITY));
    }

    #[test]
    fn origin_inside_counts_as_hit() {
        let b = BoundingBox::from_corners(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let ray = Ray::new(Point3::zero(), Vec3::new(0.0, 1.0, 0.0));
        assert!(ray_in_bound(&ray, &[b]));
    }
}
