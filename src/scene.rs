//! The scene: an immutable primitive list plus its [`BspTree`] accelerator,
//! exposing the public query surface (spec §6) on top of [`crate::bsp`] and
//! [`crate::primitive`]. Grounded on the teacher's `scene.rs` in shape only
//! (a flat object list walked per ray) — the teacher's own `Hittable`/
//! `BvhNode`/material content is superseded entirely, since this kernel's
//! accelerator and primitive contract are the richer spec §4 ones.

use crate::bsp::{BspOptions, BspTree};
use crate::constants::{DEPTH_TOLERANCE, MAX_DISTANCE};
use crate::math::{Ray, Vec3};
use crate::primitive::{Intersection, Primitive};
use crate::thread_state::ThreadState;

/// An immutable scene: a flat primitive list plus the SAH BSP tree built
/// over their bounding boxes. Built once by [`build_scene`] and shared by
/// reference across worker threads (spec §5).
pub struct Scene {
    primitives: Vec<Box<dyn Primitive>>,
    bsp: BspTree,
}

/// Builds a [`Scene`] from a flat primitive list, constructing the SAH BSP
/// tree over their bounding boxes with `options`.
pub fn build_scene(primitives: Vec<Box<dyn Primitive>>, options: BspOptions) -> Scene {
    let bounds: Vec<_> = primitives.iter().map(|p| p.bbox()).collect();
    let bsp = BspTree::build(&bounds, options);
    Scene { primitives, bsp }
}

impl Scene {
    pub fn primitive_count(&self) -> usize {
        self.primitives.len()
    }

    pub fn primitives(&self) -> &[Box<dyn Primitive>] {
        &self.primitives
    }

    pub fn bsp(&self) -> &BspTree {
        &self.bsp
    }

    /// Returns the closest intersection along `ray`, or `None` if it hits
    /// nothing. Every candidate the BSP traversal reaches is fully tested
    /// (front-to-back node order does not by itself guarantee the first
    /// object visited is the closest, since a leaf may pack more than one
    /// object); the minimum is taken across all candidates.
    pub fn trace(&self, ray: &Ray, thread: &mut ThreadState) -> Option<Intersection> {
        let mut best: Option<Intersection> = None;
        let mut scratch = Vec::new();
        self.bsp.traverse(ray, MAX_DISTANCE, thread, |id| {
            scratch.clear();
            let prim = &self.primitives[id as usize];
            if prim.all_intersections(ray, &mut scratch, thread) {
                for mut hit in scratch.drain(..) {
                    if hit.t <= DEPTH_TOLERANCE || hit.t >= MAX_DISTANCE {
                        continue;
                    }
                    hit.primitive_id = id;
                    if best.map_or(true, |b| hit.t < b.t) {
                        best = Some(hit);
                    }
                }
            }
            false
        });
        best
    }

    /// Appends every valid intersection along `ray` to `out` (cleared
    /// first), sorted nearest-first. Returns the number appended.
    pub fn all_hits(&self, ray: &Ray, thread: &mut ThreadState, out: &mut Vec<Intersection>) -> usize {
        out.clear();
        let mut scratch = Vec::new();
        self.bsp.traverse(ray, MAX_DISTANCE, thread, |id| {
            scratch.clear();
            let prim = &self.primitives[id as usize];
            if prim.all_intersections(ray, &mut scratch, thread) {
                for mut hit in scratch.drain(..) {
                    if hit.t <= DEPTH_TOLERANCE || hit.t >= MAX_DISTANCE {
                        continue;
                    }
                    hit.primitive_id = id;
                    out.push(hit);
                }
            }
            false
        });
        out.sort_by(|a, b| a.t.partial_cmp(&b.t).unwrap());
        out.len()
    }

    /// Returns every primitive that contains `point` and satisfies
    /// `predicate` (e.g. "has an interior the media shader cares about").
    /// Walks the BSP's point-containment query rather than every primitive
    /// in the scene, per spec §4.5's "Ray containing-interior initialization".
    pub fn inside(&self, point: Vec3, thread: &mut ThreadState, predicate: impl Fn(&dyn Primitive) -> bool) -> Vec<&dyn Primitive> {
        let mut ids = Vec::new();
        self.bsp.contains_candidates(point, |id| ids.push(id));
        ids.sort_unstable();
        ids.dedup();

        let mut out = Vec::new();
        for id in ids {
            let prim = self.primitives[id as usize].as_ref();
            if prim.inside(point, thread) && predicate(prim) {
                out.push(prim);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::quadric::Sphere;

    fn two_sphere_scene() -> Scene {
        let primitives: Vec<Box<dyn Primitive>> = vec![
            Box::new(Sphere::new(Vec3::new(-5.0, 0.0, 0.0), 1.0)),
            Box::new(Sphere::new(Vec3::new(5.0, 0.0, 0.0), 1.0)),
        ];
        build_scene(primitives, BspOptions::default())
    }

    #[test]
    fn trace_finds_the_nearer_of_two_spheres() {
        let scene = two_sphere_scene();
        let mut thread = ThreadState::new(scene.primitive_count());
        let ray = Ray::new(Vec3::new(-20.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let hit = scene.trace(&ray, &mut thread).unwrap();
        assert!((hit.t - 14.0).abs() < 1e-6);
        assert_eq!(hit.primitive_id, 0);
    }

    #[test]
    fn trace_misses_when_nothing_is_in_the_way() {
        let scene = two_sphere_scene();
        let mut thread = ThreadState::new(scene.primitive_count());
        let ray = Ray::new(Vec3::new(0.0, 20.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        assert!(scene.trace(&ray, &mut thread).is_none());
    }

    #[test]
    fn all_hits_reports_both_spheres_sorted_nearest_first() {
        let scene = two_sphere_scene();
        let mut thread = ThreadState::new(scene.primitive_count());
        let ray = Ray::new(Vec3::new(-20.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let mut out = Vec::new();
        let count = scene.all_hits(&ray, &mut thread, &mut out);
        assert_eq!(count, 4);
        assert!(out.windows(2).all(|w| w[0].t <= w[1].t));
    }

    #[test]
    fn inside_finds_the_sphere_containing_the_point() {
        let scene = two_sphere_scene();
        let mut thread = ThreadState::new(scene.primitive_count());
        let hits = scene.inside(Vec3::new(-5.0, 0.0, 0.0), &mut thread, |_| true);
        assert_eq!(hits.len(), 1);
    }

    /// Scenario 6: unit spheres at `(-3,0,0)`, `(3,0,0)`, `(0,3,0)`. The
    /// origin is outside all three; `(3,0,0)` lies in exactly the second.
    #[test]
    fn inside_query_matches_the_three_sphere_scenario() {
        let primitives: Vec<Box<dyn Primitive>> = vec![
            Box::new(Sphere::new(Vec3::new(-3.0, 0.0, 0.0), 1.0)),
            Box::new(Sphere::new(Vec3::new(3.0, 0.0, 0.0), 1.0)),
            Box::new(Sphere::new(Vec3::new(0.0, 3.0, 0.0), 1.0)),
        ];
        let scene = build_scene(primitives, BspOptions::default());
        let mut thread = ThreadState::new(scene.primitive_count());

        let none = scene.inside(Vec3::new(0.0, 0.0, 0.0), &mut thread, |_| true);
        assert_eq!(none.len(), 0);

        let one = scene.inside(Vec3::new(3.0, 0.0, 0.0), &mut thread, |_| true);
        assert_eq!(one.len(), 1);
    }
}
