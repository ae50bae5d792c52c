//! Bicubic Bezier patch, grounded on `bezier.h`'s `BicubicPatch` (a 4x4
//! grid of control points, `U_Steps`/`V_Steps` tessellation density, `ST`
//! corner texture coordinates).
//!
//! The original adaptively subdivides each patch into flat subpatches via
//! `bezier_subdivider`'s recursive flatness test, caching the resulting
//! tree (`Node_Tree`) for reuse across rays. This kernel instead tessellates
//! once at construction time into a fixed `U_Steps x V_Steps` triangle grid
//! — every patch this kernel receives is queried by many rays over its
//! lifetime, so a fixed up-front cost in exchange for a flat triangle list
//! (tested the same way [`super::mesh::Mesh`] tests its triangles) is the
//! simpler tradeoff, at the cost of not adapting finer near high-curvature
//! regions the way the recursive split does.

use crate::constants::{DEPTH_TOLERANCE, EPSILON, MAX_DISTANCE};
use crate::error::SceneError;
use crate::math::{BoundingBox, Ray, Vec2, Vec3};
use crate::thread_state::ThreadState;

use super::{Intersection, Primitive, PrimitiveKind};

pub type ControlPoints = [[Vec3; 4]; 4];

struct PatchVertex {
    point: Vec3,
    normal: Vec3,
    uv: Vec2,
}

pub struct BicubicPatch {
    control_points: ControlPoints,
    st: [Vec2; 4],
    u_steps: usize,
    v_steps: usize,
    grid: Vec<PatchVertex>, // (u_steps+1) * (v_steps+1), row-major in u
    bbox: BoundingBox,
    inverted: bool,
}

fn bernstein(t: f64) -> [f64; 4] {
    let mt = 1.0 - t;
    [mt * mt * mt, 3.0 * t * mt * mt, 3.0 * t * t * mt, t * t * t]
}

fn bernstein_derivative(t: f64) -> [f64; 4] {
    let mt = 1.0 - t;
    [-3.0 * mt * mt, 3.0 * mt * mt - 6.0 * t * mt, 6.0 * t * mt - 3.0 * t * t, 3.0 * t * t]
}

/// Evaluates the patch surface point and (unnormalized) normal at `(u, v)`,
/// the analytic equivalent of `bezier_value`'s de Casteljau evaluation.
fn bezier_value(cp: &ControlPoints, u: f64, v: f64) -> (Vec3, Vec3) {
    let bu = bernstein(u);
    let bv = bernstein(v);
    let dbu = bernstein_derivative(u);
    let dbv = bernstein_derivative(v);

    let mut point = Vec3::zero();
    let mut du = Vec3::zero();
    let mut dv = Vec3::zero();
    for i in 0..4 {
        for j in 0..4 {
            let p = cp[i][j];
            point += p * (bu[i] * bv[j]);
            du += p * (dbu[i] * bv[j]);
            dv += p * (bu[i] * dbv[j]);
        }
    }
    let normal = dv.cross(du);
    (point, normal)
}

/// Bilinear interpolation of the four corner `ST` texture coordinates,
/// `Compute_Texture_UV`'s mapping.
fn interpolate_st(st: &[Vec2; 4], u: f64, v: f64) -> Vec2 {
    let top = Vec2::new(st[0].u + (st[1].u - st[0].u) * u, st[0].v + (st[1].v - st[0].v) * u);
    let bottom = Vec2::new(st[3].u + (st[2].u - st[3].u) * u, st[3].v + (st[2].v - st[3].v) * u);
    Vec2::new(top.u + (bottom.u - top.u) * v, top.v + (bottom.v - top.v) * v)
}

impl BicubicPatch {
    pub fn new(control_points: ControlPoints, st: [Vec2; 4], u_steps: usize, v_steps: usize) -> Result<Self, SceneError> {
        if u_steps < 1 || v_steps < 1 {
            return Err(SceneError::DegenerateGeometry {
                shape: "BicubicPatch",
                reason: format!("u_steps/v_steps must each be at least 1, got ({u_steps}, {v_steps})"),
            });
        }

        let mut grid = Vec::with_capacity((u_steps + 1) * (v_steps + 1));
        let mut bbox = BoundingBox::empty();
        for iv in 0..=v_steps {
            let v = iv as f64 / v_steps as f64;
            for iu in 0..=u_steps {
                let u = iu as f64 / u_steps as f64;
                let (point, raw_normal) = bezier_value(&control_points, u, v);
                let normal = if raw_normal.length_squared() > EPSILON {
                    raw_normal.normalized()
                } else {
                    Vec3::unit_y()
                };
                bbox = BoundingBox::surrounding(&bbox, &BoundingBox::from_corners(point, point));
                grid.push(PatchVertex { point, normal, uv: interpolate_st(&st, u, v) });
            }
        }

        Ok(Self { control_points, st, u_steps, v_steps, grid, bbox, inverted: false })
    }

    #[inline]
    fn vertex(&self, iu: usize, iv: usize) -> &PatchVertex {
        &self.grid[iv * (self.u_steps + 1) + iu]
    }

    /// The two triangles tessellating cell `(iu, iv)`, matching the
    /// diagonal split `heightfield.rs` uses for its own grid cells.
    fn cell_triangles(&self, iu: usize, iv: usize) -> [[&PatchVertex; 3]; 2] {
        let v00 = self.vertex(iu, iv);
        let v10 = self.vertex(iu + 1, iv);
        let v01 = self.vertex(iu, iv + 1);
        let v11 = self.vertex(iu + 1, iv + 1);
        [[v00, v10, v11], [v00, v11, v01]]
    }

    fn moller_trumbore(ray: &Ray, a: Vec3, b: Vec3, c: Vec3) -> Option<(f64, f64, f64)> {
        let e1 = b - a;
        let e2 = c - a;
        let pvec = ray.direction.cross(e2);
        let det = e1.dot(pvec);
        if det.abs() < EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let tvec = ray.origin - a;
        let u = tvec.dot(pvec) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let qvec = tvec.cross(e1);
        let w = ray.direction.dot(qvec) * inv_det;
        if w < 0.0 || u + w > 1.0 {
            return None;
        }
        let t = e2.dot(qvec) * inv_det;
        Some((t, u, w))
    }

    pub fn control_points(&self) -> &ControlPoints {
        &self.control_points
    }
}

impl Primitive for BicubicPatch {
    fn all_intersections(&self, ray: &Ray, stack: &mut Vec<Intersection>, _thread: &mut ThreadState) -> bool {
        if !self.bbox.hit(ray, DEPTH_TOLERANCE, MAX_DISTANCE) {
            return false;
        }
        let mut found = false;
        for iv in 0..self.v_steps {
            for iu in 0..self.u_steps {
                for tri in self.cell_triangles(iu, iv) {
                    let (a, b, c) = (tri[0].point, tri[1].point, tri[2].point);
                    if let Some((t, bu, bv)) = Self::moller_trumbore(ray, a, b, c) {
                        if t > DEPTH_TOLERANCE && t < MAX_DISTANCE {
                            let w = 1.0 - bu - bv;
                            let normal = (tri[0].normal * w + tri[1].normal * bu + tri[2].normal * bv).normalized();
                            let normal = if self.inverted { -normal } else { normal };
                            let uv = Vec2::new(
                                tri[0].uv.u * w + tri[1].uv.u * bu + tri[2].uv.u * bv,
                                tri[0].uv.v * w + tri[1].uv.v * bu + tri[2].uv.v * bv,
                            );
                            let mut inter = Intersection::new(t, ray.at(t), normal);
                            inter.uv = Some(uv);
                            stack.push(inter);
                            found = true;
                        }
                    }
                }
            }
        }
        found
    }

    fn inside(&self, _point: Vec3, _thread: &mut ThreadState) -> bool {
        // A Bezier patch is a non-solid surface (`NonsolidObject` upstream):
        // it bounds no interior, so containment is always false.
        false
    }

    fn normal(&self, inter: &Intersection, _thread: &mut ThreadState) -> Vec3 {
        inter.normal
    }

    fn uv(&self, inter: &Intersection) -> Option<Vec2> {
        inter.uv
    }

    fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    fn invert(&mut self) {
        self.inverted = !self.inverted;
    }

    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::BicubicPatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_patch(y: f64) -> ControlPoints {
        let mut cp = [[Vec3::zero(); 4]; 4];
        for i in 0..4 {
            for j in 0..4 {
                cp[i][j] = Vec3::new(i as f64 / 3.0, y, j as f64 / 3.0);
            }
        }
        cp
    }

    fn default_st() -> [Vec2; 4] {
        [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)]
    }

    #[test]
    fn flat_patch_hit_from_above_lands_at_expected_height() {
        let patch = BicubicPatch::new(flat_patch(2.0), default_st(), 4, 4).unwrap();
        let mut thread = ThreadState::new(1);
        let mut stack = Vec::new();
        let ray = Ray::new(Vec3::new(0.5, 10.0, 0.5), Vec3::new(0.0, -1.0, 0.0));
        assert!(patch.all_intersections(&ray, &mut stack, &mut thread));
        assert!(stack.iter().any(|i| (i.t - 8.0).abs() < 1e-6));
    }

    #[test]
    fn flat_patch_normal_points_up() {
        let patch = BicubicPatch::new(flat_patch(0.0), default_st(), 2, 2).unwrap();
        let mut thread = ThreadState::new(1);
        let mut stack = Vec::new();
        let ray = Ray::new(Vec3::new(0.5, 5.0, 0.5), Vec3::new(0.0, -1.0, 0.0));
        patch.all_intersections(&ray, &mut stack, &mut thread);
        let hit = stack[0];
        assert!(hit.normal.dot(Vec3::unit_y()) > 0.9);
    }

    #[test]
    fn zero_steps_rejected() {
        assert!(BicubicPatch::new(flat_patch(0.0), default_st(), 0, 4).is_err());
    }

    #[test]
    fn a_patch_has_no_interior() {
        let patch = BicubicPatch::new(flat_patch(0.0), default_st(), 2, 2).unwrap();
        let mut thread = ThreadState::new(1);
        assert!(!patch.inside(Vec3::zero(), &mut thread));
    }
}
