//! Generic implicit algebraic surface `sum a_ijk * x^i * y^j * z^k = 0`,
//! order `n <= MAX_ORDER`. Grounded on `polynomial.cpp`'s `Poly` object:
//! the original stores coefficients in a flattened Pascal-triangle index;
//! this keeps the same sparse (i, j, k, coefficient) term list the parser
//! builds from `Set_Coeff` calls; the ray-substitution and solve are
//! equivalent.
//!
//! Intersection substitutes the ray's parametric point into every term,
//! expanding `(o + t*d)^p` via the binomial theorem and convolving the
//! three per-axis expansions together, producing one univariate
//! polynomial in `t` handed to [`crate::solver`].

use crate::constants::{DEPTH_TOLERANCE, MAX_ORDER, ROOT_TOLERANCE};
use crate::math::{BoundingBox, Ray, Transform, Vec3};
use crate::solver;
use crate::thread_state::ThreadState;

use super::{Intersection, Primitive, PrimitiveKind};

pub struct PolynomialSurface {
    order: usize,
    /// Sparse terms: (power_x, power_y, power_z, coefficient).
    terms: Vec<(u8, u8, u8, f64)>,
    transform: Option<Transform>,
    sturm: bool,
    inverted: bool,
}

impl PolynomialSurface {
    pub fn new(order: usize, terms: Vec<(u8, u8, u8, f64)>, transform: Option<Transform>, sturm: bool) -> Option<Self> {
        if order == 0 || order > MAX_ORDER {
            return None;
        }
        if terms.iter().any(|&(i, j, k, _)| (i as usize) + (j as usize) + (k as usize) > order) {
            return None;
        }
        Some(Self { order, terms, transform, sturm, inverted: false })
    }

    fn local_ray(&self, ray: &Ray) -> (Vec3, Vec3) {
        match &self.transform {
            Some(t) => (t.inverse_transform_point(ray.origin), t.inverse_transform_vector(ray.direction)),
            None => (ray.origin, ray.direction),
        }
    }

    fn binomial_row(n: u8, a: f64, b: f64) -> Vec<f64> {
        // expand[p] = C(n,p) * a^(n-p) * b^p, ascending in p.
        let n = n as usize;
        let mut row = vec![0.0; n + 1];
        let mut c = 1.0f64;
        for p in 0..=n {
            row[p] = c * a.powi((n - p) as i32) * b.powi(p as i32);
            c = c * (n - p) as f64 / (p + 1) as f64;
        }
        row
    }

    fn convolve(a: &[f64], b: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; a.len() + b.len() - 1];
        for (i, &ai) in a.iter().enumerate() {
            if ai == 0.0 {
                continue;
            }
            for (j, &bj) in b.iter().enumerate() {
                out[i + j] += ai * bj;
            }
        }
        out
    }

    /// Coefficients of the univariate polynomial in `t` along the local
    /// ray, highest-degree-first, as the solver expects.
    fn coefficients_along_ray(&self, local_o: Vec3, local_d: Vec3) -> Vec<f64> {
        let mut acc = vec![0.0f64; self.order + 1]; // ascending in t
        for &(i, j, k, coeff) in &self.terms {
            let ex = Self::binomial_row(i, local_o.x, local_d.x);
            let ey = Self::binomial_row(j, local_o.y, local_d.y);
            let ez = Self::binomial_row(k, local_o.z, local_d.z);
            let exy = Self::convolve(&ex, &ey);
            let exyz = Self::convolve(&exy, &ez);
            for (p, &v) in exyz.iter().enumerate() {
                acc[p] += coeff * v;
            }
        }
        acc.into_iter().rev().collect() // descending (highest degree first)
    }

    fn eval(&self, p: Vec3) -> f64 {
        self.terms
            .iter()
            .map(|&(i, j, k, c)| c * p.x.powi(i as i32) * p.y.powi(j as i32) * p.z.powi(k as i32))
            .sum()
    }

    fn gradient(&self, p: Vec3) -> Vec3 {
        let mut g = Vec3::zero();
        for &(i, j, k, c) in &self.terms {
            if i > 0 {
                g.x += c * i as f64 * p.x.powi(i as i32 - 1) * p.y.powi(j as i32) * p.z.powi(k as i32);
            }
            if j > 0 {
                g.y += c * j as f64 * p.x.powi(i as i32) * p.y.powi(j as i32 - 1) * p.z.powi(k as i32);
            }
            if k > 0 {
                g.z += c * k as f64 * p.x.powi(i as i32) * p.y.powi(j as i32) * p.z.powi(k as i32 - 1);
            }
        }
        g
    }
}

impl Primitive for PolynomialSurface {
    fn all_intersections(&self, ray: &Ray, stack: &mut Vec<Intersection>, thread: &mut ThreadState) -> bool {
        let (local_o, local_d) = self.local_ray(ray);
        let coeffs = self.coefficients_along_ray(local_o, local_d);
        let roots = solver::solve_with_stats(self.order, &coeffs, ROOT_TOLERANCE, self.sturm, &mut thread.stats.solver);

        let mut found = false;
        for t in roots {
            if t > DEPTH_TOLERANCE && t < crate::constants::MAX_DISTANCE {
                let local_point = local_o + local_d * t;
                let world_point = ray.at(t);
                let local_normal = self.gradient(local_point).normalized();
                let normal = match &self.transform {
                    Some(tr) => tr.transform_normal(local_normal),
                    None => local_normal,
                };
                let normal = if self.inverted { -normal } else { normal };
                let mut inter = Intersection::new(t, world_point, normal);
                inter.local_point = local_point;
                stack.push(inter);
                found = true;
            }
        }
        found
    }

    fn inside(&self, point: Vec3, _thread: &mut ThreadState) -> bool {
        let local = match &self.transform {
            Some(t) => t.inverse_transform_point(point),
            None => point,
        };
        (self.eval(local) < 0.0) ^ self.inverted
    }

    fn normal(&self, inter: &Intersection, _thread: &mut ThreadState) -> Vec3 {
        inter.normal
    }

    fn bbox(&self) -> BoundingBox {
        // No closed-form bound for an arbitrary algebraic surface; the
        // caller is expected to supply an explicit clip region (spec
        // §4.2.8's "algebraic primitives commonly ship pre-clipped").
        BoundingBox::from_corners(Vec3::splat(-crate::constants::CRITICAL_LENGTH), Vec3::splat(crate::constants::CRITICAL_LENGTH))
    }

    fn invert(&mut self) {
        self.inverted = !self.inverted;
    }

    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::Polynomial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_as_quadric_polynomial_hits_expected_depths() {
        // x^2 + y^2 + z^2 - 4 = 0, a radius-2 sphere at the origin.
        let terms = vec![(2, 0, 0, 1.0), (0, 2, 0, 1.0), (0, 0, 2, 1.0), (0, 0, 0, -4.0)];
        let surf = PolynomialSurface::new(2, terms, None, false).unwrap();
        let mut thread = ThreadState::new(1);
        let mut stack = Vec::new();
        let ray = Ray::new(Vec3::new(0.0, 0.0, -10.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(surf.all_intersections(&ray, &mut stack, &mut thread));
        let mut ts: Vec<f64> = stack.iter().map(|i| i.t).collect();
        ts.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((ts[0] - 8.0).abs() < 1e-6);
        assert!((ts[1] - 12.0).abs() < 1e-6);
    }

    #[test]
    fn order_exceeding_max_order_rejected() {
        assert!(PolynomialSurface::new(MAX_ORDER + 1, vec![], None, false).is_none());
    }

    #[test]
    fn term_degree_exceeding_order_rejected() {
        assert!(PolynomialSurface::new(2, vec![(3, 0, 0, 1.0)], None, false).is_none());
    }
}
