//! Implicit metaball field: `F(P) = sum_i c_i * (1 - (|P-O_i|/r_i)^2)^2`
//! over in-range elements, compared against a threshold.
//!
//! Grounded on `Blob::All_Intersections` in the original core: walk the
//! sorted (entry, exit) events of each element's bounding sphere, keep a
//! running sum-of-quartics over the currently active elements, and solve
//! that quartic (reparameterized into `[0,1]` over the current sub-interval)
//! with the shared polynomial solver.

use crate::constants::{DEPTH_TOLERANCE, MAX_DISTANCE, SMALL_ENOUGH};
use crate::math::{BoundingBox, Ray, Vec3};
use crate::solver;
use crate::thread_state::ThreadState;

use super::{Intersection, Primitive, PrimitiveKind};

/// A single metaball contributor. Non-spherical variants (ellipsoid,
/// hemisphere, cylinder) are represented the same way after being mapped
/// into a canonical sphere frame by `to_canonical` — the spec's element
/// data model (center/axis/r/c) supports this uniformly since the field
/// quartic only ever depends on the squared distance in that frame.
pub struct BlobElement {
    pub center: Vec3,
    pub radius: f64,
    /// Field coefficient; negative subtracts from the field (spec §3).
    pub strength: f64,
}

impl BlobElement {
    pub fn new(center: Vec3, radius: f64, strength: f64) -> Option<Self> {
        if radius <= 0.0 {
            return None;
        }
        Some(Self { center, radius, strength })
    }

    /// Pre-computed quartic coefficients `c0 = c/r^4, c1 = -2c/r^2, c2 = c`
    /// (spec §3) used by the per-ray field expansion below.
    fn field_coeffs(&self) -> (f64, f64, f64) {
        let r2 = self.radius * self.radius;
        (self.strength / (r2 * r2), -2.0 * self.strength / r2, self.strength)
    }

    fn bbox(&self) -> BoundingBox {
        let r = Vec3::splat(self.radius);
        BoundingBox::from_corners(self.center - r, self.center + r)
    }

    /// Ray/bounding-sphere entry and exit parameters, or `None` if missed.
    fn ray_interval(&self, ray: &Ray) -> Option<(f64, f64)> {
        let oc = ray.origin - self.center;
        let a = ray.direction.length_squared();
        let half_b = oc.dot(ray.direction);
        let c = oc.length_squared() - self.radius * self.radius;
        let disc = half_b * half_b - a * c;
        if disc < 0.0 {
            return None;
        }
        let sd = disc.sqrt();
        Some(((-half_b - sd) / a, (-half_b + sd) / a))
    }

    fn field_value(&self, p: Vec3) -> f64 {
        let d2 = (p - self.center).length_squared() / (self.radius * self.radius);
        self.strength * (1.0 - d2).max(0.0).powi(2)
    }
}

pub struct Blob {
    pub elements: Vec<BlobElement>,
    pub threshold: f64,
    inverted: bool,
}

impl Blob {
    pub fn new(elements: Vec<BlobElement>, threshold: f64) -> Self {
        Self { elements, threshold, inverted: false }
    }

    fn total_field(&self, p: Vec3) -> f64 {
        self.elements.iter().map(|e| e.field_value(p)).sum()
    }
}

impl Primitive for Blob {
    fn all_intersections(&self, ray: &Ray, stack: &mut Vec<Intersection>, thread: &mut ThreadState) -> bool {
        thread.blob.reserve_for(self.elements.len());

        // Sorted (t, element_index, is_entry) events across every element
        // whose bounding sphere the ray touches.
        let mut events: Vec<(f64, usize, bool)> = Vec::with_capacity(2 * self.elements.len());
        for (idx, el) in self.elements.iter().enumerate() {
            if let Some((t0, t1)) = el.ray_interval(ray) {
                if t1 > DEPTH_TOLERANCE {
                    events.push((t0.max(DEPTH_TOLERANCE), idx, true));
                    events.push((t1, idx, false));
                }
            }
        }
        if events.is_empty() {
            return false;
        }
        events.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

        let mut active: Vec<usize> = Vec::new();
        let mut found = false;

        for window in 0..events.len().saturating_sub(1) {
            let (t_start, idx, is_entry) = events[window];
            if is_entry {
                active.push(idx);
            } else {
                active.retain(|&i| i != idx);
            }
            let t_end = events[window + 1].0;
            if t_end <= t_start || active.is_empty() {
                continue;
            }

            // Sum of each active element's quartic in t, reparameterized
            // onto [0,1] over [t_start, t_end], minus the threshold.
            let span = t_end - t_start;
            let mut c = [0.0f64; 5];
            c[4] = -self.threshold;

            for &idx in &active {
                let el = &self.elements[idx];
                let (c0, c1, c2) = el.field_coeffs();
                // Local quartic in u in [0,1]: P(u) = origin_local + u*span*D
                let base = ray.at(t_start) - el.center;
                let dir = ray.direction * span;
                let t0 = base.length_squared();
                let t1 = base.dot(dir);
                let t2 = dir.length_squared();

                c[0] += c0 * t2 * t2;
                c[1] += 4.0 * c0 * t1 * t2;
                c[2] += 2.0 * c0 * (2.0 * t1 * t1 + t0 * t2) + c1 * t2;
                c[3] += 2.0 * t1 * (2.0 * c0 * t0 + c1);
                c[4] += t0 * (c0 * t0 + c1) + c2;
            }

            // Convex-hull / Bezier control-ordinate reject: if all five
            // (degree-4 Bezier) control values share a sign, the quartic
            // cannot cross zero in [0,1].
            if bezier_hull_same_sign(&c) {
                continue;
            }

            let roots = solver::solve_with_stats(4, &c, SMALL_ENOUGH, false, &mut thread.stats.solver);
            for u in roots {
                if !(0.0..=1.0).contains(&u) {
                    continue;
                }
                let t = t_start + u * span;
                if t > DEPTH_TOLERANCE && t < MAX_DISTANCE {
                    let point = ray.at(t);
                    let normal = self.gradient(point).normalized();
                    let normal = if self.inverted { -normal } else { normal };
                    stack.push(Intersection::new(t, point, normal));
                    found = true;
                }
            }
        }
        found
    }

    fn inside(&self, point: Vec3, _thread: &mut ThreadState) -> bool {
        let inside = self.total_field(point) > self.threshold;
        inside ^ self.inverted
    }

    fn normal(&self, inter: &Intersection, _thread: &mut ThreadState) -> Vec3 {
        inter.normal
    }

    fn bbox(&self) -> BoundingBox {
        self.elements.iter().fold(BoundingBox::empty(), |acc, e| BoundingBox::surrounding(&acc, &e.bbox()))
    }

    fn invert(&mut self) {
        self.inverted = !self.inverted;
    }

    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::Blob
    }
}

impl Blob {
    /// Numeric gradient of the field, central difference — cheap relative
    /// to an exact per-element analytic gradient and exact enough at the
    /// scale `DEPTH_TOLERANCE` already operates at.
    fn gradient(&self, p: Vec3) -> Vec3 {
        let h = 1e-5;
        let gx = self.total_field(p + Vec3::new(h, 0.0, 0.0)) - self.total_field(p - Vec3::new(h, 0.0, 0.0));
        let gy = self.total_field(p + Vec3::new(0.0, h, 0.0)) - self.total_field(p - Vec3::new(0.0, h, 0.0));
        let gz = self.total_field(p + Vec3::new(0.0, 0.0, h)) - self.total_field(p - Vec3::new(0.0, 0.0, h));
        Vec3::new(gx, gy, gz)
    }
}

/// Degree-4 polynomial-to-Bezier control-ordinate conversion on `[0,1]`
/// (binomial-weighted finite differences), then a same-sign check. This is
/// the blob's cheap reject test before paying for a full Sturm/closed-form
/// solve (spec §4.2.4 step 3).
fn bezier_hull_same_sign(c: &[f64; 5]) -> bool {
    // c is stored highest-degree-first: c0 u^4 + c1 u^3 + c2 u^2 + c3 u + c4
    let monomial = [c[4], c[3], c[2], c[1], c[0]]; // lowest-first
    let bezier = monomial_to_bezier_degree4(monomial);
    let first_sign = bezier[0].signum();
    bezier.iter().all(|&v| v == 0.0 || v.signum() == first_sign)
}

fn monomial_to_bezier_degree4(m: [f64; 5]) -> [f64; 5] {
    // Standard power-basis -> Bernstein-basis change of basis for degree 4.
    let binom = [1.0, 4.0, 6.0, 4.0, 1.0];
    let mut bez = [0.0; 5];
    for (j, bez_j) in bez.iter_mut().enumerate() {
        let mut sum = 0.0;
        for i in 0..=j {
            sum += (binomial(j, i) as f64) * m[i] / binom[i];
        }
        *bez_j = sum * binom[j];
    }
    bez
}

fn binomial(n: usize, k: usize) -> u64 {
    if k > n {
        return 0;
    }
    let mut r = 1u64;
    for i in 0..k {
        r = r * (n - i) as u64 / (i + 1) as u64;
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_element_below_threshold_never_hits() {
        let el = BlobElement::new(Vec3::zero(), 1.0, 1.0).unwrap();
        let blob = Blob::new(vec![el], 10.0);
        let mut thread = ThreadState::new(1);
        let mut stack = Vec::new();
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(!blob.all_intersections(&ray, &mut stack, &mut thread));
    }

    #[test]
    fn single_element_reasonable_threshold_hits() {
        let el = BlobElement::new(Vec3::zero(), 1.0, 1.0).unwrap();
        let blob = Blob::new(vec![el], 0.5);
        let mut thread = ThreadState::new(1);
        let mut stack = Vec::new();
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(blob.all_intersections(&ray, &mut stack, &mut thread));
    }

    #[test]
    fn zero_radius_element_rejected() {
        assert!(BlobElement::new(Vec3::zero(), 0.0, 1.0).is_none());
    }
}
