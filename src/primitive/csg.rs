//! Constructive solid geometry, grounded on `csg.h`'s `CSGUnion` /
//! `CSGIntersection` (shared by difference, which is an intersection with
//! its second operand inverted) / `CSGMerge`, plus `gsd.h`'s bitmap-indexed
//! generalised symmetric difference.
//!
//! All five operators share one intersection-filtering shape: gather every
//! child hit, then keep only the ones that satisfy each sibling's
//! inside/outside predicate for the operator in question. `Merge` differs
//! from `Union` only in suppressing hits that lie inside another child
//! (used so overlapping transparent children don't double-shade a seam).
//! `Gsd` keeps a hit only where crossing it flips the containment-count
//! selection predicate.

use crate::math::{BoundingBox, Ray, Vec3};
use crate::thread_state::ThreadState;

use super::{Intersection, Primitive, PrimitiveKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsgOp {
    Union,
    Merge,
    Intersection,
    Difference,
    /// Generalised symmetric difference: `selected[k]` says whether a point
    /// contained by exactly `k` children belongs to the result (spec
    /// §4.2.7). A plain symmetric difference of two shapes is
    /// `selected = [false, true, false]`.
    Gsd,
}

pub struct Csg {
    op: CsgOp,
    children: Vec<Box<dyn Primitive>>,
    /// Indexed by containment count, only meaningful for `CsgOp::Gsd`.
    gsd_selected: Vec<bool>,
    inverted: bool,
}

impl Csg {
    pub fn new(op: CsgOp, children: Vec<Box<dyn Primitive>>) -> Option<Self> {
        if children.is_empty() {
            return None;
        }
        if op == CsgOp::Difference && children.len() < 2 {
            return None;
        }
        if op == CsgOp::Gsd {
            return None;
        }
        Some(Self { op, children, gsd_selected: Vec::new(), inverted: false })
    }

    /// Builds a GSD node. `selected[k]` is consulted for `k` in
    /// `0..=children.len()`; a shorter vector is zero-extended (those point
    /// counts are never "inside").
    pub fn new_gsd(children: Vec<Box<dyn Primitive>>, selected: Vec<bool>) -> Option<Self> {
        if children.is_empty() {
            return None;
        }
        Some(Self { op: CsgOp::Gsd, children, gsd_selected: selected, inverted: false })
    }

    fn gsd_selected_at(&self, count: usize) -> bool {
        self.gsd_selected.get(count).copied().unwrap_or(false)
    }

    fn containment_count(&self, point: Vec3, thread: &mut ThreadState) -> usize {
        self.children.iter().filter(|c| c.inside(point, thread)).count()
    }

    fn point_satisfies(&self, idx: usize, point: Vec3, thread: &mut ThreadState) -> bool {
        match self.op {
            CsgOp::Union | CsgOp::Merge => true,
            CsgOp::Intersection => {
                self.children.iter().enumerate().all(|(j, c)| j == idx || c.inside(point, thread))
            }
            CsgOp::Difference => {
                // Inside the first child and outside every subtractive one.
                if idx == 0 {
                    self.children[1..].iter().all(|c| !c.inside(point, thread))
                } else {
                    self.children[0].inside(point, thread)
                        && self.children[1..].iter().enumerate().all(|(j, c)| j + 1 == idx || !c.inside(point, thread))
                }
            }
            CsgOp::Gsd => {
                // A hit belongs to the surface where crossing it flips the
                // selection predicate: compare the count with and without
                // the owning child's own containment contribution.
                let count_with = self.containment_count(point, thread);
                let count_without = count_with.saturating_sub(1);
                self.gsd_selected_at(count_with) != self.gsd_selected_at(count_without)
            }
        }
    }
}

impl Primitive for Csg {
    fn all_intersections(&self, ray: &Ray, stack: &mut Vec<Intersection>, thread: &mut ThreadState) -> bool {
        let mut raw: Vec<(usize, Intersection)> = Vec::new();
        for (idx, child) in self.children.iter().enumerate() {
            let mut child_stack = Vec::new();
            if child.all_intersections(ray, &mut child_stack, thread) {
                for hit in child_stack {
                    raw.push((idx, hit));
                }
            }
        }
        if raw.is_empty() {
            return false;
        }

        let mut found = false;
        for (idx, hit) in raw {
            if self.op == CsgOp::Merge {
                let shadowed = self
                    .children
                    .iter()
                    .enumerate()
                    .any(|(j, c)| j != idx && c.inside(hit.point, thread));
                if shadowed {
                    continue;
                }
            } else if !self.point_satisfies(idx, hit.point, thread) {
                continue;
            }
            let mut hit = hit;
            if self.inverted {
                hit.normal = -hit.normal;
            }
            stack.push(hit);
            found = true;
        }
        found
    }

    fn inside(&self, point: Vec3, thread: &mut ThreadState) -> bool {
        let inside = match self.op {
            CsgOp::Union | CsgOp::Merge => self.children.iter().any(|c| c.inside(point, thread)),
            CsgOp::Intersection => self.children.iter().all(|c| c.inside(point, thread)),
            CsgOp::Difference => {
                self.children[0].inside(point, thread)
                    && self.children[1..].iter().all(|c| !c.inside(point, thread))
            }
            CsgOp::Gsd => self.gsd_selected_at(self.containment_count(point, thread)),
        };
        inside ^ self.inverted
    }

    fn normal(&self, inter: &Intersection, _thread: &mut ThreadState) -> Vec3 {
        inter.normal
    }

    fn bbox(&self) -> BoundingBox {
        let boxes: Vec<BoundingBox> = self.children.iter().map(|c| c.bbox()).collect();
        let raw = match self.op {
            CsgOp::Union | CsgOp::Merge | CsgOp::Gsd => {
                boxes.into_iter().fold(BoundingBox::empty(), |acc, b| BoundingBox::surrounding(&acc, &b))
            }
            CsgOp::Intersection | CsgOp::Difference => {
                boxes.first().copied().unwrap_or_else(BoundingBox::empty)
            }
        };
        raw.clamp_extent(crate::constants::CRITICAL_LENGTH)
    }

    fn invert(&mut self) {
        // CSG inversion rewrites the node rather than flipping a bool on
        // its own hits (spec §4.2.7): De Morgan's laws turn a union of
        // inverted children into an intersection and vice versa, and a
        // difference A-B into an intersection of A and inverted-B.
        match self.op {
            CsgOp::Union => {
                self.op = CsgOp::Intersection;
                for c in &mut self.children {
                    c.invert();
                }
            }
            CsgOp::Intersection => {
                self.op = CsgOp::Union;
                for c in &mut self.children {
                    c.invert();
                }
            }
            CsgOp::Difference => {
                self.children[0].invert();
                self.op = CsgOp::Intersection;
            }
            CsgOp::Merge | CsgOp::Gsd => {
                self.inverted = !self.inverted;
            }
        }
    }

    fn opaque(&self) -> bool {
        self.children.iter().all(|c| c.opaque())
    }

    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::Csg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::quadric::Sphere;

    fn sphere_at(x: f64, r: f64) -> Box<dyn Primitive> {
        Box::new(Sphere::new(Vec3::new(x, 0.0, 0.0), r))
    }

    #[test]
    fn union_of_disjoint_spheres_hits_both() {
        let csg = Csg::new(CsgOp::Union, vec![sphere_at(-5.0, 1.0), sphere_at(5.0, 1.0)]).unwrap();
        let mut thread = ThreadState::new(2);
        let mut stack = Vec::new();
        let ray = Ray::new(Vec3::new(-20.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(csg.all_intersections(&ray, &mut stack, &mut thread));
        assert_eq!(stack.len(), 4);
    }

    #[test]
    fn difference_requires_two_operands() {
        assert!(Csg::new(CsgOp::Difference, vec![sphere_at(0.0, 1.0)]).is_none());
    }

    #[test]
    fn difference_removes_overlap() {
        let csg = Csg::new(CsgOp::Difference, vec![sphere_at(0.0, 2.0), sphere_at(1.0, 2.0)]).unwrap();
        let mut thread = ThreadState::new(2);
        assert!(!csg.inside(Vec3::new(1.5, 0.0, 0.0), &mut thread));
        assert!(csg.inside(Vec3::new(-1.5, 0.0, 0.0), &mut thread));
    }

    #[test]
    fn intersection_of_disjoint_spheres_is_empty() {
        let csg = Csg::new(CsgOp::Intersection, vec![sphere_at(-5.0, 1.0), sphere_at(5.0, 1.0)]).unwrap();
        let mut thread = ThreadState::new(2);
        let mut stack = Vec::new();
        let ray = Ray::new(Vec3::new(-20.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(!csg.all_intersections(&ray, &mut stack, &mut thread));
    }

    #[test]
    fn gsd_symmetric_difference_excludes_the_overlap() {
        // selected = [false, true, false]: in exactly one child, not zero or both.
        let csg = Csg::new_gsd(vec![sphere_at(0.0, 2.0), sphere_at(1.0, 2.0)], vec![false, true, false]).unwrap();
        let mut thread = ThreadState::new(2);
        assert!(csg.inside(Vec3::new(-1.5, 0.0, 0.0), &mut thread));
        assert!(!csg.inside(Vec3::new(0.5, 0.0, 0.0), &mut thread));
        assert!(csg.inside(Vec3::new(2.5, 0.0, 0.0), &mut thread));
    }

    #[test]
    fn gsd_unselected_counts_default_to_outside() {
        let csg = Csg::new_gsd(vec![sphere_at(0.0, 2.0), sphere_at(1.0, 2.0)], vec![false]).unwrap();
        let mut thread = ThreadState::new(2);
        assert!(!csg.inside(Vec3::new(-1.5, 0.0, 0.0), &mut thread));
    }

    /// Scenario 4: unit sphere at the origin minus a unit sphere at
    /// `(1.5,0,0)`, ray origin `(-2,0,0)` direction `(1,0,0)`. The ray
    /// enters sphere A at `t = 1.0` (x = -1) and the difference surface
    /// ends where the ray crosses into sphere B's near boundary at
    /// `x = 0.5`, i.e. `t = 2.5` given this ray's parameterization.
    #[test]
    fn difference_matches_the_two_sphere_scenario() {
        let a: Box<dyn Primitive> = Box::new(Sphere::new(Vec3::new(0.0, 0.0, 0.0), 1.0));
        let b: Box<dyn Primitive> = Box::new(Sphere::new(Vec3::new(1.5, 0.0, 0.0), 1.0));
        let csg = Csg::new(CsgOp::Difference, vec![a, b]).unwrap();
        let mut thread = ThreadState::new(2);
        let mut stack = Vec::new();
        let ray = Ray::new(Vec3::new(-2.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(csg.all_intersections(&ray, &mut stack, &mut thread));
        let mut ts: Vec<f64> = stack.iter().map(|i| i.t).collect();
        ts.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(ts.len(), 2);
        assert!((ts[0] - 1.0).abs() < 1e-9);
        assert!((ts[1] - 2.5).abs() < 1e-9);
    }
}
