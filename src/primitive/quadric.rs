//! Sphere, plane, box, cylinder, cone and the general second-degree
//! quadric. Each reduces ray intersection to a degree-1 or degree-2
//! polynomial, so none of them touch [`crate::solver`] — the closed forms
//! below are cheaper and more accurate than routing through the general
//! solver for a shape this simple.

use crate::constants::{DEPTH_TOLERANCE, EPSILON, MAX_DISTANCE};
use crate::math::{BoundingBox, Ray, Transform, Vec2, Vec3};
use crate::thread_state::ThreadState;

use super::{Intersection, Primitive, PrimitiveKind};

// ─── Sphere ─────────────────────────────────────────────────────────────────

pub struct Sphere {
    pub center: Vec3,
    pub radius: f64,
    inverted: bool,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f64) -> Self {
        Self { center, radius, inverted: false }
    }
}

impl Primitive for Sphere {
    fn all_intersections(&self, ray: &Ray, stack: &mut Vec<Intersection>, _thread: &mut ThreadState) -> bool {
        // Geometric form (Shirley's formulation) avoids the catastrophic
        // cancellation of expanding |O + tD - C|^2 - r^2 directly.
        let oc = ray.origin - self.center;
        let a = ray.direction.length_squared();
        let half_b = oc.dot(ray.direction);
        let c = oc.length_squared() - self.radius * self.radius;
        let disc = half_b * half_b - a * c;
        if disc < 0.0 {
            return false;
        }
        let sqrt_d = disc.sqrt();
        let mut found = false;
        for t in [(-half_b - sqrt_d) / a, (-half_b + sqrt_d) / a] {
            if t > DEPTH_TOLERANCE && t < MAX_DISTANCE {
                let point = ray.at(t);
                let normal = (point - self.center) / self.radius;
                let normal = if self.inverted { -normal } else { normal };
                stack.push(Intersection::new(t, point, normal));
                found = true;
            }
        }
        found
    }

    fn inside(&self, point: Vec3, _thread: &mut ThreadState) -> bool {
        let inside = (point - self.center).length_squared() < self.radius * self.radius;
        inside ^ self.inverted
    }

    fn normal(&self, inter: &Intersection, _thread: &mut ThreadState) -> Vec3 {
        let n = (inter.point - self.center) / self.radius;
        if self.inverted { -n } else { n }
    }

    fn uv(&self, inter: &Intersection) -> Option<Vec2> {
        let p = (inter.point - self.center) / self.radius;
        let u = 0.5 + p.z.atan2(p.x) / std::f64::consts::TAU;
        let v = 0.5 + p.y.asin() / std::f64::consts::PI;
        Some(Vec2::new(u, v))
    }

    fn bbox(&self) -> BoundingBox {
        let r = Vec3::splat(self.radius);
        BoundingBox::from_corners(self.center - r, self.center + r)
    }

    fn invert(&mut self) {
        self.inverted = !self.inverted;
    }

    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::Sphere
    }
}

// ─── Axis-aligned box ───────────────────────────────────────────────────────

pub struct Box3 {
    pub bounds: BoundingBox,
    inverted: bool,
}

impl Box3 {
    pub fn new(corner_a: Vec3, corner_b: Vec3) -> Self {
        Self { bounds: BoundingBox::from_corners(corner_a, corner_b), inverted: false }
    }
}

impl Primitive for Box3 {
    fn all_intersections(&self, ray: &Ray, stack: &mut Vec<Intersection>, _thread: &mut ThreadState) -> bool {
        let lo = self.bounds.min();
        let hi = self.bounds.max();
        let mut t_near = f64::NEG_INFINITY;
        let mut t_far = f64::INFINITY;
        let mut near_axis = 0usize;
        let mut far_axis = 0usize;
        let mut near_sign = 1.0;
        let mut far_sign = 1.0;

        for axis in 0..3 {
            let inv_d = 1.0 / ray.direction[axis];
            let mut t0 = (lo[axis] - ray.origin[axis]) * inv_d;
            let mut t1 = (hi[axis] - ray.origin[axis]) * inv_d;
            let mut s0 = -1.0;
            let mut s1 = 1.0;
            if inv_d < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
                std::mem::swap(&mut s0, &mut s1);
            }
            if t0 > t_near {
                t_near = t0;
                near_axis = axis;
                near_sign = s0;
            }
            if t1 < t_far {
                t_far = t1;
                far_axis = axis;
                far_sign = s1;
            }
            if t_far <= t_near {
                return false;
            }
        }

        let mut found = false;
        for (t, axis, sign) in [(t_near, near_axis, near_sign), (t_far, far_axis, far_sign)] {
            if t > DEPTH_TOLERANCE && t < MAX_DISTANCE {
                let point = ray.at(t);
                let mut n = Vec3::zero();
                n[axis] = sign;
                let n = if self.inverted { -n } else { n };
                stack.push(Intersection::new(t, point, n));
                found = true;
            }
        }
        found
    }

    fn inside(&self, point: Vec3, _thread: &mut ThreadState) -> bool {
        self.bounds.contains_point(point) ^ self.inverted
    }

    fn normal(&self, inter: &Intersection, _thread: &mut ThreadState) -> Vec3 {
        // Recompute which face is closest — cheap for a box and avoids
        // needing a cached axis field for this primitive.
        let lo = self.bounds.min();
        let hi = self.bounds.max();
        let p = inter.point;
        let dists = [
            (p.x - lo.x).abs(), (hi.x - p.x).abs(),
            (p.y - lo.y).abs(), (hi.y - p.y).abs(),
            (p.z - lo.z).abs(), (hi.z - p.z).abs(),
        ];
        let mut best = 0;
        for i in 1..6 {
            if dists[i] < dists[best] {
                best = i;
            }
        }
        let n = match best {
            0 => Vec3::new(-1.0, 0.0, 0.0),
            1 => Vec3::new(1.0, 0.0, 0.0),
            2 => Vec3::new(0.0, -1.0, 0.0),
            3 => Vec3::new(0.0, 1.0, 0.0),
            4 => Vec3::new(0.0, 0.0, -1.0),
            _ => Vec3::new(0.0, 0.0, 1.0),
        };
        if self.inverted { -n } else { n }
    }

    fn bbox(&self) -> BoundingBox {
        self.bounds
    }

    fn invert(&mut self) {
        self.inverted = !self.inverted;
    }

    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::Box
    }
}

// ─── Plane ──────────────────────────────────────────────────────────────────

pub struct Plane {
    pub normal: Vec3,
    pub distance: f64,
    inverted: bool,
}

impl Plane {
    pub fn new(normal: Vec3, distance: f64) -> Self {
        Self { normal: normal.normalized(), distance, inverted: false }
    }
}

impl Primitive for Plane {
    fn all_intersections(&self, ray: &Ray, stack: &mut Vec<Intersection>, _thread: &mut ThreadState) -> bool {
        let denom = self.normal.dot(ray.direction);
        if denom.abs() < EPSILON {
            return false;
        }
        let t = (self.distance - self.normal.dot(ray.origin)) / denom;
        if t > DEPTH_TOLERANCE && t < MAX_DISTANCE {
            let point = ray.at(t);
            let n = if self.inverted { -self.normal } else { self.normal };
            stack.push(Intersection::new(t, point, n));
            true
        } else {
            false
        }
    }

    fn inside(&self, point: Vec3, _thread: &mut ThreadState) -> bool {
        let inside = self.normal.dot(point) - self.distance < 0.0;
        inside ^ self.inverted
    }

    fn normal(&self, _inter: &Intersection, _thread: &mut ThreadState) -> Vec3 {
        if self.inverted { -self.normal } else { self.normal }
    }

    fn bbox(&self) -> BoundingBox {
        // An infinite plane has no finite bound; callers that need one
        // (the BSP root AABB) must special-case planes, same as POV-Ray's
        // own "infinite bound" object category.
        BoundingBox::new(Vec3::splat(-MAX_DISTANCE), Vec3::splat(2.0 * MAX_DISTANCE))
    }

    fn invert(&mut self) {
        self.inverted = !self.inverted;
    }

    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::Plane
    }
}

// ─── Cylinder & Cone ────────────────────────────────────────────────────────

/// Shared finite-cylinder/cone solve: the lateral surface is
/// `x^2 + z^2 = (base_radius + t_axis*(cap_radius-base_radius))^2` in the
/// shape's local frame (equal radii = cylinder, cap_radius = 0 = cone).
struct ClippedQuadricSurface {
    transform: Transform,
    base_radius: f64,
    cap_radius: f64,
    open: bool,
    inverted: bool,
}

impl ClippedQuadricSurface {
    fn local_intersections(&self, local_o: Vec3, local_d: Vec3) -> Vec<(f64, Vec3, bool)> {
        // b1 flag in the returned tuple marks a cap hit (true) vs lateral (false).
        let mut hits = Vec::with_capacity(4);
        let dr = self.cap_radius - self.base_radius;

        let a = local_d.x * local_d.x + local_d.z * local_d.z - dr * dr * local_d.y * local_d.y;
        let b = local_o.x * local_d.x + local_o.z * local_d.z
            - dr * local_d.y * (self.base_radius + dr * local_o.y);
        let c = local_o.x * local_o.x + local_o.z * local_o.z
            - (self.base_radius + dr * local_o.y).powi(2);

        if a.abs() > EPSILON {
            let disc = b * b - a * c;
            if disc >= 0.0 {
                let sd = disc.sqrt();
                for t in [(-b - sd) / a, (-b + sd) / a] {
                    let y = local_o.y + t * local_d.y;
                    if (0.0..=1.0).contains(&y) {
                        let p = local_o + local_d * t;
                        let radius_here = self.base_radius + dr * y;
                        let mut n = Vec3::new(p.x, 0.0, p.z);
                        if radius_here.abs() > EPSILON {
                            // Slant contribution for a true cone/frustum.
                            n.y = -dr * radius_here;
                        }
                        hits.push((t, n.normalized(), false));
                    }
                }
            }
        } else if b.abs() > EPSILON {
            let t = -c / (2.0 * b);
            let y = local_o.y + t * local_d.y;
            if (0.0..=1.0).contains(&y) {
                let p = local_o + local_d * t;
                hits.push((t, Vec3::new(p.x, 0.0, p.z).normalized(), false));
            }
        }

        if !self.open {
            for (y0, n) in [(0.0, Vec3::new(0.0, -1.0, 0.0)), (1.0, Vec3::new(0.0, 1.0, 0.0))] {
                if local_d.y.abs() > EPSILON {
                    let t = (y0 - local_o.y) / local_d.y;
                    let p = local_o + local_d * t;
                    let radius_here = if y0 == 0.0 { self.base_radius } else { self.cap_radius };
                    if p.x * p.x + p.z * p.z <= radius_here * radius_here {
                        hits.push((t, n, true));
                    }
                }
            }
        }

        hits
    }
}

pub struct Cylinder {
    surface: ClippedQuadricSurface,
}

impl Cylinder {
    /// `base`/`cap` are world-space centers of the two end discs, `radius`
    /// is constant along the axis.
    pub fn new(base: Vec3, cap: Vec3, radius: f64, open: bool) -> Option<Self> {
        let axis = cap - base;
        let height = axis.length();
        if height < EPSILON || radius < EPSILON {
            return None;
        }
        let transform = frame_from_axis(base, axis, height)?;
        Some(Self {
            surface: ClippedQuadricSurface { transform, base_radius: radius, cap_radius: radius, open, inverted: false },
        })
    }
}

pub struct Cone {
    surface: ClippedQuadricSurface,
}

impl Cone {
    /// `base`/`cap` centers with independent radii; `cap_radius = 0.0`
    /// gives a true cone apex.
    pub fn new(base: Vec3, base_radius: f64, cap: Vec3, cap_radius: f64, open: bool) -> Option<Self> {
        let axis = cap - base;
        let height = axis.length();
        if height < EPSILON || (base_radius < EPSILON && cap_radius < EPSILON) {
            return None;
        }
        let transform = frame_from_axis(base, axis, height)?;
        Some(Self {
            surface: ClippedQuadricSurface { transform, base_radius, cap_radius, open, inverted: false },
        })
    }
}

/// Builds the transform taking the unit Y-axis segment `[0,1]` onto the
/// world-space segment `base..base+axis`, scaled so local Y spans exactly
/// that segment.
fn frame_from_axis(base: Vec3, axis: Vec3, height: f64) -> Option<Transform> {
    let y = axis / height;
    let helper = if y.x.abs() < 0.9 { Vec3::unit_x() } else { Vec3::unit_y() };
    let x = helper.cross(y).normalized();
    let z = y.cross(x);
    let m = crate::math::Mat4 {
        m: [
            [x.x, y.x, z.x, base.x],
            [x.y, y.y, z.y, base.y],
            [x.z, y.z, z.z, base.z],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };
    let scaled = m * crate::math::Mat4::scaling(Vec3::new(1.0, height, 1.0));
    Transform::from_forward(scaled)
}

macro_rules! impl_clipped_quadric_primitive {
    ($ty:ident, $kind:expr) => {
        impl Primitive for $ty {
            fn all_intersections(&self, ray: &Ray, stack: &mut Vec<Intersection>, _thread: &mut ThreadState) -> bool {
                let local_o = self.surface.transform.inverse_transform_point(ray.origin);
                let local_d = self.surface.transform.inverse_transform_vector(ray.direction);
                let scale = local_d.length();
                if scale < EPSILON {
                    return false;
                }
                let mut found = false;
                for (t_local, n_local, is_cap) in self.surface.local_intersections(local_o, local_d) {
                    let t = t_local;
                    if t > DEPTH_TOLERANCE && t < MAX_DISTANCE {
                        let point = ray.at(t);
                        let mut n = self.surface.transform.transform_normal(n_local);
                        if self.surface.inverted {
                            n = -n;
                        }
                        let mut inter = Intersection::new(t, point, n);
                        inter.b1 = is_cap;
                        stack.push(inter);
                        found = true;
                    }
                }
                found
            }

            fn inside(&self, point: Vec3, _thread: &mut ThreadState) -> bool {
                let p = self.surface.transform.inverse_transform_point(point);
                let dr = self.surface.cap_radius - self.surface.base_radius;
                let radius_here = self.surface.base_radius + dr * p.y;
                let inside = p.y >= 0.0 && p.y <= 1.0 && (p.x * p.x + p.z * p.z) <= radius_here * radius_here;
                inside ^ self.surface.inverted
            }

            fn normal(&self, inter: &Intersection, _thread: &mut ThreadState) -> Vec3 {
                inter.normal
            }

            fn bbox(&self) -> BoundingBox {
                let r = self.surface.base_radius.max(self.surface.cap_radius);
                let corners = [
                    Vec3::new(-r, 0.0, -r), Vec3::new(r, 0.0, -r),
                    Vec3::new(-r, 0.0, r), Vec3::new(r, 0.0, r),
                    Vec3::new(-r, 1.0, -r), Vec3::new(r, 1.0, -r),
                    Vec3::new(-r, 1.0, r), Vec3::new(r, 1.0, r),
                ];
                let mut bb = BoundingBox::empty();
                for c in corners {
                    let w = self.surface.transform.transform_point(c);
                    bb = BoundingBox::surrounding(&bb, &BoundingBox::new(w, Vec3::zero()));
                }
                bb
            }

            fn invert(&mut self) {
                self.surface.inverted = !self.surface.inverted;
            }

            fn kind(&self) -> PrimitiveKind {
                $kind
            }
        }
    };
}

impl_clipped_quadric_primitive!(Cylinder, PrimitiveKind::Cylinder);
impl_clipped_quadric_primitive!(Cone, PrimitiveKind::Cone);

// ─── General quadric ────────────────────────────────────────────────────────

/// The dense second-degree surface `Ax^2+By^2+Cz^2+Dxy+Exz+Fyz+Gx+Hy+Iz+J=0`.
pub struct Quadric {
    pub coeffs: [f64; 10],
    transform: Option<Transform>,
    inverted: bool,
}

impl Quadric {
    pub fn new(coeffs: [f64; 10]) -> Self {
        Self { coeffs, transform: None, inverted: false }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    fn eval(&self, p: Vec3) -> f64 {
        let [a, b, c, d, e, f, g, h, i, j] = self.coeffs;
        a * p.x * p.x + b * p.y * p.y + c * p.z * p.z
            + d * p.x * p.y + e * p.x * p.z + f * p.y * p.z
            + g * p.x + h * p.y + i * p.z + j
    }

    fn gradient(&self, p: Vec3) -> Vec3 {
        let [a, b, c, d, e, f, g, h, i, _] = self.coeffs;
        Vec3::new(
            2.0 * a * p.x + d * p.y + e * p.z + g,
            2.0 * b * p.y + d * p.x + f * p.z + h,
            2.0 * c * p.z + e * p.x + f * p.y + i,
        )
    }

    fn local_ray(&self, ray: &Ray) -> (Vec3, Vec3) {
        match &self.transform {
            Some(t) => (t.inverse_transform_point(ray.origin), t.inverse_transform_vector(ray.direction)),
            None => (ray.origin, ray.direction),
        }
    }
}

impl Primitive for Quadric {
    fn all_intersections(&self, ray: &Ray, stack: &mut Vec<Intersection>, _thread: &mut ThreadState) -> bool {
        let (o, d) = self.local_ray(ray);
        let [a, b, c, dd, e, f, g, h, i, _] = self.coeffs;

        let aq = a * d.x * d.x + b * d.y * d.y + c * d.z * d.z
            + dd * d.x * d.y + e * d.x * d.z + f * d.y * d.z;
        let bq = 2.0 * (a * o.x * d.x + b * o.y * d.y + c * o.z * d.z)
            + dd * (o.x * d.y + o.y * d.x) + e * (o.x * d.z + o.z * d.x) + f * (o.y * d.z + o.z * d.y)
            + g * d.x + h * d.y + i * d.z;
        let cq = self.eval(o);

        let mut found = false;
        let mut push_hit = |t: f64, stack: &mut Vec<Intersection>| {
            if t > DEPTH_TOLERANCE && t < MAX_DISTANCE {
                let point = ray.at(t);
                let local_p = o + d * t;
                let mut n = self.gradient(local_p).normalized();
                if let Some(tr) = &self.transform {
                    n = tr.transform_normal(n);
                }
                if self.inverted {
                    n = -n;
                }
                stack.push(Intersection::new(t, point, n));
                found = true;
            }
        };

        if aq.abs() < EPSILON {
            if bq.abs() > EPSILON {
                push_hit(-cq / bq, stack);
            }
        } else {
            let disc = bq * bq - 4.0 * aq * cq;
            if disc >= 0.0 {
                let sd = disc.sqrt();
                push_hit((-bq - sd) / (2.0 * aq), stack);
                push_hit((-bq + sd) / (2.0 * aq), stack);
            }
        }
        found
    }

    fn inside(&self, point: Vec3, _thread: &mut ThreadState) -> bool {
        let p = match &self.transform {
            Some(t) => t.inverse_transform_point(point),
            None => point,
        };
        (self.eval(p) < 0.0) ^ self.inverted
    }

    fn normal(&self, inter: &Intersection, _thread: &mut ThreadState) -> Vec3 {
        inter.normal
    }

    fn bbox(&self) -> BoundingBox {
        // The general quadric has no universally finite bound (it may be
        // a hyperboloid/paraboloid); conservatively report the "infinite"
        // bound, matching `Plane`.
        BoundingBox::new(Vec3::splat(-MAX_DISTANCE), Vec3::splat(2.0 * MAX_DISTANCE))
    }

    fn invert(&mut self) {
        self.inverted = !self.inverted;
    }

    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::Quadric
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_hits_match_scenario_one() {
        let s = Sphere::new(Vec3::zero(), 1.0);
        let mut thread = ThreadState::new(1);
        let mut stack = Vec::new();
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(s.all_intersections(&ray, &mut stack, &mut thread));
        let mut ts: Vec<f64> = stack.iter().map(|i| i.t).collect();
        ts.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(ts.len(), 2);
        assert!((ts[0] - 4.0).abs() < 1e-9);
        assert!((ts[1] - 6.0).abs() < 1e-9);
    }

    #[test]
    fn box_hits_match_scenario_two() {
        let b = Box3::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let mut thread = ThreadState::new(1);
        let mut stack = Vec::new();
        let ray = Ray::new(Vec3::new(2.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
        assert!(b.all_intersections(&ray, &mut stack, &mut thread));
        let mut ts: Vec<f64> = stack.iter().map(|i| i.t).collect();
        ts.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(ts.len(), 2);
        assert!((ts[0] - 1.0).abs() < 1e-9);
        assert!((ts[1] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn sphere_inside_matches_hit_crossing() {
        let s = Sphere::new(Vec3::zero(), 1.0);
        let mut thread = ThreadState::new(1);
        assert!(!s.inside(Vec3::new(0.0, 0.0, -5.0 + 4.0 - 0.01), &mut thread));
        assert!(s.inside(Vec3::new(0.0, 0.0, -5.0 + 4.0 + 0.01), &mut thread));
    }

    #[test]
    fn plane_normal_flips_when_inverted() {
        let mut p = Plane::new(Vec3::new(0.0, 1.0, 0.0), 0.0);
        let n0 = p.normal(&Intersection::new(0.0, Vec3::zero(), Vec3::zero()), &mut ThreadState::new(1));
        p.invert();
        let n1 = p.normal(&Intersection::new(0.0, Vec3::zero(), Vec3::zero()), &mut ThreadState::new(1));
        assert_eq!(n0, -n1);
    }
}
