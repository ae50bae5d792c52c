//! Torus and its spindle-torus specialization.
//!
//! Grounded directly on `Torus::All_Intersections` /
//! `Torus::Test_Thick_Cylinder` in the original C++ core: the ray is
//! transformed into the torus's local frame (major radius about the local
//! Y axis), a cheap thick-cylinder slab test rejects rays that provably
//! cannot touch the donut, and the surviving rays are solved against the
//! exact quartic.

use crate::constants::{DEPTH_TOLERANCE, EPSILON, MAX_DISTANCE};
use crate::math::{BoundingBox, Ray, Transform, Vec2, Vec3};
use crate::solver;
use crate::thread_state::ThreadState;

use super::{Intersection, Primitive, PrimitiveKind};

/// Visibility filter for a spindle torus's self-intersecting inner lobe
/// (spec §3/§9, preserved as the authoritative 4-valued enum).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpindleVisibility {
    /// Only the outer surface is a valid hit.
    SpindleVisible,
    /// Only the spindle (inner lobe) surface is a valid hit.
    NonSpindleVisible,
    /// The spindle lobe is treated as solid interior (default).
    SpindleInside,
    /// Like `SpindleInside`, but only affects the `inside()` predicate,
    /// not which surface hits are reported.
    SpindleRelevantForInside,
}

impl Default for SpindleVisibility {
    fn default() -> Self {
        SpindleVisibility::SpindleInside
    }
}

pub struct Torus {
    pub major_radius: f64,
    pub minor_radius: f64,
    transform: Transform,
    inverted: bool,
}

impl Torus {
    /// `transform` carries the torus from its canonical frame (centered
    /// at the origin, axis along local Y) into world space.
    pub fn new(major_radius: f64, minor_radius: f64, transform: Transform) -> Option<Self> {
        if major_radius <= 0.0 || minor_radius <= 0.0 {
            return None;
        }
        Some(Self { major_radius, minor_radius, transform, inverted: false })
    }

    /// `Test_Thick_Cylinder`: a cap-plane + cylindrical-shell test that
    /// rejects rays which cannot possibly reach the torus's solid of
    /// revolution, before paying for the quartic solve.
    fn test_thick_cylinder(&self, p: Vec3, d: Vec3) -> bool {
        let (h1, h2) = (-self.minor_radius, self.minor_radius);
        let r1 = if self.major_radius < self.minor_radius {
            0.0
        } else {
            (self.major_radius - self.minor_radius).powi(2)
        };
        let r2 = (self.major_radius + self.minor_radius).powi(2);

        if d.y.abs() < EPSILON {
            return p.y >= h1 && p.y <= h2;
        }

        for h in [h2, h1] {
            let k = (h - p.y) / d.y;
            if k > EPSILON && k < MAX_DISTANCE {
                let u = p.x + k * d.x;
                let v = p.z + k * d.z;
                let r = u * u + v * v;
                if r >= r1 && r <= r2 {
                    return true;
                }
            }
        }

        let a = d.x * d.x + d.z * d.z;
        if a > EPSILON {
            let b = p.x * d.x + p.z * d.z;
            for radius_sq in [r2, r1] {
                let c = p.x * p.x + p.z * p.z - radius_sq;
                let disc = b * b - a * c;
                if disc >= 0.0 {
                    let sd = disc.sqrt();
                    for k in [(-b + sd) / a, (-b - sd) / a] {
                        if k > EPSILON && k < MAX_DISTANCE {
                            let h = p.y + k * d.y;
                            if h >= h1 && h <= h2 {
                                return true;
                            }
                        }
                    }
                }
            }
        }
        false
    }

    /// Returns `(t, local_point)` pairs solving the exact quartic, already
    /// filtered to `(DEPTH_TOLERANCE, MAX_DISTANCE)`.
    fn solve_quartic_hits(&self, local_o: Vec3, local_d: Vec3, thread: &mut ThreadState) -> Vec<(f64, Vec3)> {
        let len = local_d.length();
        let d = local_d / len;
        let mut p = local_o;

        if !self.test_thick_cylinder(p, d) {
            return Vec::new();
        }

        // Re-center P near the bounding sphere for precision, as upstream
        // does, then undo the shift (`closer`) after solving.
        let bounding_sphere_radius = self.major_radius + 2.0 * self.minor_radius;
        let mut closer = 0.0;
        let dist_sq = p.length_squared();
        if dist_sq > bounding_sphere_radius * bounding_sphere_radius {
            let dist = dist_sq.sqrt();
            closer = dist - bounding_sphere_radius;
            p += d * closer;
        }

        let r2 = self.major_radius * self.major_radius;
        let minor2 = self.minor_radius * self.minor_radius;
        let py2 = p.y * p.y;
        let dy2 = d.y * d.y;
        let pdy2 = p.y * d.y;

        let k1 = p.x * p.x + p.z * p.z + py2 - r2 - minor2;
        let k2 = p.x * d.x + p.z * d.z + pdy2;

        let c = [
            1.0,
            4.0 * k2,
            2.0 * (k1 + 2.0 * (k2 * k2 + r2 * dy2)),
            4.0 * (k2 * k1 + 2.0 * r2 * pdy2),
            k1 * k1 + 4.0 * r2 * (py2 - minor2),
        ];

        let roots = solver::solve_with_stats(4, &c, DEPTH_TOLERANCE, false, &mut thread.stats.solver);
        roots
            .into_iter()
            .map(|r| (r + closer) / len)
            .filter(|&t| t > DEPTH_TOLERANCE && t < MAX_DISTANCE)
            .map(|t| (t, local_o + local_d * t))
            .collect()
    }

    fn local_normal(&self, local_p: Vec3) -> Vec3 {
        let dist_from_axis = (local_p.x * local_p.x + local_p.z * local_p.z).sqrt();
        let ring = Vec3::new(
            local_p.x * self.major_radius / dist_from_axis.max(EPSILON),
            0.0,
            local_p.z * self.major_radius / dist_from_axis.max(EPSILON),
        );
        (local_p - ring).normalized()
    }
}

impl Primitive for Torus {
    fn all_intersections(&self, ray: &Ray, stack: &mut Vec<Intersection>, thread: &mut ThreadState) -> bool {
        let local_o = self.transform.inverse_transform_point(ray.origin);
        let local_d = self.transform.inverse_transform_vector(ray.direction);
        let mut found = false;
        for (t, local_p) in self.solve_quartic_hits(local_o, local_d, thread) {
            let point = ray.at(t);
            let mut n = self.transform.transform_normal(self.local_normal(local_p));
            if self.inverted {
                n = -n;
            }
            stack.push(Intersection::new(t, point, n));
            found = true;
        }
        found
    }

    fn inside(&self, point: Vec3, _thread: &mut ThreadState) -> bool {
        let p = self.transform.inverse_transform_point(point);
        let dist_from_axis = (p.x * p.x + p.z * p.z).sqrt();
        let to_ring = ((dist_from_axis - self.major_radius).powi(2) + p.y * p.y).sqrt();
        let inside = to_ring < self.minor_radius;
        inside ^ self.inverted
    }

    fn normal(&self, inter: &Intersection, _thread: &mut ThreadState) -> Vec3 {
        inter.normal
    }

    fn uv(&self, inter: &Intersection) -> Option<Vec2> {
        let p = self.transform.inverse_transform_point(inter.point);
        let u = 0.5 + p.z.atan2(p.x) / std::f64::consts::TAU;
        let dist_from_axis = (p.x * p.x + p.z * p.z).sqrt() - self.major_radius;
        let v = 0.5 + p.y.atan2(dist_from_axis) / std::f64::consts::TAU;
        Some(Vec2::new(u, v))
    }

    fn bbox(&self) -> BoundingBox {
        let r = self.major_radius + self.minor_radius;
        let local = BoundingBox::new(
            Vec3::new(-r, -self.minor_radius, -r),
            Vec3::new(2.0 * r, 2.0 * self.minor_radius, 2.0 * r),
        );
        let mut bb = BoundingBox::empty();
        let lo = local.min();
        let hi = local.max();
        for x in [lo.x, hi.x] {
            for y in [lo.y, hi.y] {
                for z in [lo.z, hi.z] {
                    let w = self.transform.transform_point(Vec3::new(x, y, z));
                    bb = BoundingBox::surrounding(&bb, &BoundingBox::new(w, Vec3::zero()));
                }
            }
        }
        bb
    }

    fn invert(&mut self) {
        self.inverted = !self.inverted;
    }

    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::Torus
    }
}

/// A torus where `major_radius < minor_radius`, forming a self-intersecting
/// inner "spindle" lobe (spec §4.2.2/§9).
pub struct SpindleTorus {
    torus: Torus,
    pub visibility: SpindleVisibility,
}

impl SpindleTorus {
    pub fn new(major_radius: f64, minor_radius: f64, transform: Transform, visibility: SpindleVisibility) -> Option<Self> {
        if major_radius >= minor_radius {
            return None;
        }
        Some(Self { torus: Torus::new(major_radius, minor_radius, transform)?, visibility })
    }

    /// `mSpindleTipYSqr = r^2 - R^2`: a transformed hit point lies on the
    /// spindle lobe iff its squared distance from the torus center is
    /// below this tip value.
    fn on_spindle(&self, local_p: Vec3) -> bool {
        let tip_sq = self.torus.minor_radius * self.torus.minor_radius - self.torus.major_radius * self.torus.major_radius;
        local_p.length_squared() < tip_sq
    }
}

impl Primitive for SpindleTorus {
    fn all_intersections(&self, ray: &Ray, stack: &mut Vec<Intersection>, thread: &mut ThreadState) -> bool {
        let local_o = self.torus.transform.inverse_transform_point(ray.origin);
        let local_d = self.torus.transform.inverse_transform_vector(ray.direction);
        let mut found = false;
        for (t, local_p) in self.torus.solve_quartic_hits(local_o, local_d, thread) {
            let on_spindle = self.on_spindle(local_p);
            let visible = match self.visibility {
                SpindleVisibility::SpindleVisible => !on_spindle,
                SpindleVisibility::NonSpindleVisible => on_spindle,
                SpindleVisibility::SpindleInside | SpindleVisibility::SpindleRelevantForInside => true,
            };
            if !visible {
                continue;
            }
            let point = ray.at(t);
            let mut n = self.torus.transform.transform_normal(self.torus.local_normal(local_p));
            if on_spindle {
                n = -n;
            }
            if self.torus.inverted {
                n = -n;
            }
            let mut inter = Intersection::new(t, point, n);
            inter.b1 = on_spindle;
            stack.push(inter);
            found = true;
        }
        found
    }

    fn inside(&self, point: Vec3, thread: &mut ThreadState) -> bool {
        self.torus.inside(point, thread)
    }

    fn normal(&self, inter: &Intersection, _thread: &mut ThreadState) -> Vec3 {
        inter.normal
    }

    fn uv(&self, inter: &Intersection) -> Option<Vec2> {
        self.torus.uv(inter)
    }

    fn bbox(&self) -> BoundingBox {
        self.torus.bbox()
    }

    fn invert(&mut self) {
        self.torus.invert();
    }

    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::Torus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn torus_hits_match_scenario_three() {
        let t = Torus::new(2.0, 0.5, Transform::identity()).unwrap();
        let mut thread = ThreadState::new(1);
        let mut stack = Vec::new();
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(t.all_intersections(&ray, &mut stack, &mut thread));
        let mut ts: Vec<f64> = stack.iter().map(|i| i.t).collect();
        ts.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(ts.len(), 4);
        let want = [3.5, 4.5, 5.5, 6.5];
        for (g, w) in ts.iter().zip(want.iter()) {
            assert!((g - w).abs() < 1e-5, "{g} vs {w}");
        }
    }

    #[test]
    fn degenerate_major_radius_rejected() {
        assert!(Torus::new(0.0, 1.0, Transform::identity()).is_none());
    }

    #[test]
    fn spindle_torus_requires_minor_greater_than_major() {
        assert!(SpindleTorus::new(1.0, 0.5, Transform::identity(), SpindleVisibility::default()).is_none());
        assert!(SpindleTorus::new(0.5, 1.0, Transform::identity(), SpindleVisibility::default()).is_some());
    }
}
