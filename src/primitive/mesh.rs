//! Indexed triangle mesh, grounded on `mesh.h`'s `Mesh_Data_Struct`
//! (deduplicated vertex/normal/UV tables plus one record per triangle)
//! and `triangle.h`'s flat/smooth triangle split.
//!
//! The original's `BBOX_TREE` per-mesh hierarchy is reproduced here as a
//! small recursive BVH over triangle indices, built once at construction
//! and walked front-to-back per ray — the same shape as the top-level
//! [`crate::bsp`] tree, just scoped to one mesh's triangles.

use crate::constants::{DEPTH_TOLERANCE, EPSILON, MAX_DISTANCE};
use crate::math::{BoundingBox, Ray, Vec2, Vec3};
use crate::thread_state::ThreadState;

use super::{Intersection, Primitive, PrimitiveKind};

#[derive(Debug, Clone, Copy)]
pub struct MeshTriangle {
    pub p1: usize,
    pub p2: usize,
    pub p3: usize,
    /// Per-vertex normal indices; `None` for a flat (unsmoothed) triangle.
    pub smooth_normals: Option<(usize, usize, usize)>,
    pub uv: Option<(usize, usize, usize)>,
}

enum BvhNode {
    Leaf { bbox: BoundingBox, tris: Vec<u32> },
    Split { bbox: BoundingBox, left: Box<BvhNode>, right: Box<BvhNode> },
}

pub struct Mesh {
    vertices: Vec<Vec3>,
    normals: Vec<Vec3>,
    uvs: Vec<Vec2>,
    triangles: Vec<MeshTriangle>,
    root: BvhNode,
    inverted: bool,
}

const LEAF_SIZE: usize = 4;

impl Mesh {
    pub fn new(
        vertices: Vec<Vec3>,
        normals: Vec<Vec3>,
        uvs: Vec<Vec2>,
        triangles: Vec<MeshTriangle>,
    ) -> Option<Self> {
        if triangles.is_empty() || vertices.len() < 3 {
            return None;
        }
        let tri_bounds: Vec<BoundingBox> =
            triangles.iter().map(|t| Self::triangle_bbox(&vertices, t)).collect();
        let indices: Vec<u32> = (0..triangles.len() as u32).collect();
        let root = Self::build_bvh(&tri_bounds, indices);
        Some(Self { vertices, normals, uvs, triangles, root, inverted: false })
    }

    fn triangle_bbox(vertices: &[Vec3], t: &MeshTriangle) -> BoundingBox {
        let (a, b, c) = (vertices[t.p1], vertices[t.p2], vertices[t.p3]);
        BoundingBox::surrounding(
            &BoundingBox::from_corners(a, b),
            &BoundingBox::from_corners(c, c),
        )
    }

    fn build_bvh(tri_bounds: &[BoundingBox], indices: Vec<u32>) -> BvhNode {
        let bbox = indices
            .iter()
            .fold(BoundingBox::empty(), |acc, &i| BoundingBox::surrounding(&acc, &tri_bounds[i as usize]));
        if indices.len() <= LEAF_SIZE {
            return BvhNode::Leaf { bbox, tris: indices };
        }
        let axis = bbox.longest_axis();
        let mut sorted = indices;
        sorted.sort_by(|&a, &b| {
            let ca = tri_bounds[a as usize].min()[axis] + tri_bounds[a as usize].max()[axis];
            let cb = tri_bounds[b as usize].min()[axis] + tri_bounds[b as usize].max()[axis];
            ca.partial_cmp(&cb).unwrap()
        });
        let mid = sorted.len() / 2;
        let right_half = sorted.split_off(mid);
        BvhNode::Split {
            bbox,
            left: Box::new(Self::build_bvh(tri_bounds, sorted)),
            right: Box::new(Self::build_bvh(tri_bounds, right_half)),
        }
    }

    fn triangle_vertices(&self, t: &MeshTriangle) -> (Vec3, Vec3, Vec3) {
        (self.vertices[t.p1], self.vertices[t.p2], self.vertices[t.p3])
    }

    /// Möller-Trumbore test, dominant-axis-free: works directly in world
    /// space rather than the original's projection onto the triangle's
    /// dominant axis plane.
    fn intersect_triangle(ray: &Ray, a: Vec3, b: Vec3, c: Vec3) -> Option<(f64, f64, f64)> {
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
        let v = ray.direction.dot(qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = e2.dot(qvec) * inv_det;
        Some((t, u, v))
    }

    fn walk(&self, node: &BvhNode, ray: &Ray, stack: &mut Vec<Intersection>, found: &mut bool) {
        let bbox = match node {
            BvhNode::Leaf { bbox, .. } => bbox,
            BvhNode::Split { bbox, .. } => bbox,
        };
        if !bbox.hit(ray, DEPTH_TOLERANCE, MAX_DISTANCE) {
            return;
        }
        match node {
            BvhNode::Leaf { tris, .. } => {
                for &idx in tris {
                    let tri = &self.triangles[idx as usize];
                    let (a, b, c) = self.triangle_vertices(tri);
                    if let Some((t, u, v)) = Self::intersect_triangle(ray, a, b, c) {
                        if t > DEPTH_TOLERANCE && t < MAX_DISTANCE {
                            let point = ray.at(t);
                            let normal = self.triangle_normal(tri, a, b, c, u, v);
                            let normal = if self.inverted { -normal } else { normal };
                            let mut inter = Intersection::new(t, point, normal);
                            inter.i1 = idx as i64;
                            inter.d1 = u;
                            inter.local_point = Vec3::new(u, v, 1.0 - u - v);
                            stack.push(inter);
                            *found = true;
                        }
                    }
                }
            }
            BvhNode::Split { left, right, .. } => {
                self.walk(left, ray, stack, found);
                self.walk(right, ray, stack, found);
            }
        }
    }

    fn triangle_normal(&self, tri: &MeshTriangle, a: Vec3, b: Vec3, c: Vec3, u: f64, v: f64) -> Vec3 {
        match tri.smooth_normals {
            Some((n1, n2, n3)) => {
                let w = 1.0 - u - v;
                (self.normals[n1] * w + self.normals[n2] * u + self.normals[n3] * v).normalized()
            }
            None => (b - a).cross(c - a).normalized(),
        }
    }
}

impl Primitive for Mesh {
    fn all_intersections(&self, ray: &Ray, stack: &mut Vec<Intersection>, _thread: &mut ThreadState) -> bool {
        let mut found = false;
        self.walk(&self.root, ray, stack, &mut found);
        found
    }

    fn inside(&self, point: Vec3, _thread: &mut ThreadState) -> bool {
        // Parity test along an arbitrary fixed direction, counting crossings
        // through every triangle — the approach `mesh.cpp`'s `Inside` takes
        // when no explicit `inside_vector` is supplied.
        let dir = Vec3::new(0.6602, 0.5504, 0.5101); // arbitrary, non-axis-aligned
        let probe = Ray::new(point, dir);
        let mut crossings = 0usize;
        for tri in &self.triangles {
            let (a, b, c) = self.triangle_vertices(tri);
            if let Some((t, _, _)) = Self::intersect_triangle(&probe, a, b, c) {
                if t > 0.0 {
                    crossings += 1;
                }
            }
        }
        (crossings % 2 == 1) ^ self.inverted
    }

    fn normal(&self, inter: &Intersection, _thread: &mut ThreadState) -> Vec3 {
        inter.normal
    }

    fn uv(&self, inter: &Intersection) -> Option<Vec2> {
        if inter.i1 < 0 {
            return None;
        }
        let tri = &self.triangles[inter.i1 as usize];
        let (uv1, uv2, uv3) = tri.uv?;
        let u = inter.local_point.x;
        let v = inter.local_point.y;
        let w = inter.local_point.z;
        let (a, b, c) = (self.uvs[uv1], self.uvs[uv2], self.uvs[uv3]);
        Some(Vec2::new(a.u * w + b.u * u + c.u * v, a.v * w + b.v * u + c.v * v))
    }

    fn bbox(&self) -> BoundingBox {
        match &self.root {
            BvhNode::Leaf { bbox, .. } => *bbox,
            BvhNode::Split { bbox, .. } => *bbox,
        }
    }

    fn invert(&mut self) {
        self.inverted = !self.inverted;
    }

    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::Mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle_mesh() -> Mesh {
        let vertices = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let triangles = vec![MeshTriangle { p1: 0, p2: 1, p3: 2, smooth_normals: None, uv: None }];
        Mesh::new(vertices, Vec::new(), Vec::new(), triangles).unwrap()
    }

    #[test]
    fn ray_hits_single_triangle() {
        let mesh = unit_triangle_mesh();
        let mut thread = ThreadState::new(1);
        let mut stack = Vec::new();
        let ray = Ray::new(Vec3::new(0.2, 0.2, -5.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(mesh.all_intersections(&ray, &mut stack, &mut thread));
        assert_eq!(stack.len(), 1);
        assert!((stack[0].t - 5.0).abs() < 1e-9);
    }

    #[test]
    fn ray_misses_outside_triangle() {
        let mesh = unit_triangle_mesh();
        let mut thread = ThreadState::new(1);
        let mut stack = Vec::new();
        let ray = Ray::new(Vec3::new(5.0, 5.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(!mesh.all_intersections(&ray, &mut stack, &mut thread));
    }

    #[test]
    fn too_few_vertices_rejected() {
        let triangles = vec![MeshTriangle { p1: 0, p2: 1, p3: 0, smooth_normals: None, uv: None }];
        assert!(Mesh::new(vec![Vec3::zero(), Vec3::unit_x()], Vec::new(), Vec::new(), triangles).is_none());
    }

    #[test]
    fn smooth_normal_interpolates_between_vertex_normals() {
        let vertices = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let normals = vec![Vec3::unit_z(), Vec3::unit_z(), Vec3::new(0.2, 0.2, 0.96).normalized()];
        let triangles =
            vec![MeshTriangle { p1: 0, p2: 1, p3: 2, smooth_normals: Some((0, 1, 2)), uv: None }];
        let mesh = Mesh::new(vertices, normals, Vec::new(), triangles).unwrap();
        let mut thread = ThreadState::new(1);
        let mut stack = Vec::new();
        let ray = Ray::new(Vec3::new(0.05, 0.05, -5.0), Vec3::new(0.0, 0.0, 1.0));
        mesh.all_intersections(&ray, &mut stack, &mut thread);
        assert!((stack[0].normal.length() - 1.0).abs() < 1e-9);
    }
}
