//! Surface Area Heuristic BSP tree, grounded on `bsptree.cpp`'s
//! `BSPTree::build` (cost model, per-axis candidate-plane sweep) and its
//! `operator()` traversal (front-to-back descent with a per-thread stack
//! of deferred far children).
//!
//! The object-node packing (`Empty` / `SingleObject` / `DoubleObject` /
//! `ObjectList`) mirrors the original's `Node::Object` variants, trading
//! its hand-rolled tagged union for a Rust enum.

use tracing::info;

use crate::constants::{BSP_TOLERANCE, MAX_BSP_TREE_LEVEL};
use crate::math::{BoundingBox, Ray};
use crate::stats::BspStats;
use crate::thread_state::ThreadState;

/// Mirrors `BSPTree`'s constructor parameters — all tunable, all default
/// to the original's compiled-in constants when left at `Default::default()`.
#[derive(Debug, Clone, Copy)]
pub struct BspOptions {
    pub max_depth: usize,
    pub object_isect_cost: f64,
    pub base_access_cost: f64,
    pub child_access_cost: f64,
    pub miss_chance: f64,
    /// Below this object count a node always becomes a leaf rather than
    /// being considered for further splitting.
    pub leaf_object_threshold: usize,
}

impl Default for BspOptions {
    fn default() -> Self {
        Self {
            max_depth: MAX_BSP_TREE_LEVEL,
            object_isect_cost: 150.0,
            base_access_cost: 1.0,
            child_access_cost: 5.0,
            miss_chance: 1.2, // 0.2 + 1.0, per the original's pre-added convention
            leaf_object_threshold: 1,
        }
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Split { axis: u8, plane: f64, left: u32 }, // right = left + 1
    Empty,
    Single(u32),
    Double(u32, u32),
    List(Vec<u32>),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
}

pub struct BspTree {
    nodes: Vec<Node>,
    bounds: BoundingBox,
    stats: BspStats,
}

struct BuildCtx<'a> {
    object_bounds: &'a [BoundingBox],
    options: BspOptions,
    stats: BspStats,
}

#[derive(Clone, Copy, PartialEq)]
enum Edge {
    Min,
    Max,
}

impl BspTree {
    pub fn build(object_bounds: &[BoundingBox], options: BspOptions) -> Self {
        let bounds = object_bounds.iter().fold(BoundingBox::empty(), |acc, b| BoundingBox::surrounding(&acc, b));
        let mut ctx = BuildCtx { object_bounds, options, stats: BspStats::default() };
        let mut nodes = vec![Node { kind: NodeKind::Empty }];
        let indices: Vec<u32> = (0..object_bounds.len() as u32).collect();
        build_node_into(&mut ctx, &mut nodes, indices, &bounds, options.max_depth, 0);

        info!(
            node_count = nodes.len(),
            leaf_count = ctx.stats.leaf_count,
            split_count = ctx.stats.split_count,
            max_depth_reached = ctx.stats.max_depth_reached,
            "BSP tree build complete"
        );

        Self { nodes, bounds, stats: ctx.stats }
    }

    pub fn stats(&self) -> BspStats {
        self.stats
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Front-to-back traversal calling `visit(object_id)` for every
    /// candidate object whose leaf the ray passes through, stopping early
    /// if `visit` returns `true` (a hit has been accepted and nothing
    /// closer can matter — the caller's job to decide that).
    pub fn traverse(&self, ray: &Ray, max_dist: f64, thread: &mut ThreadState, mut visit: impl FnMut(u32) -> bool) {
        let Some((mut rentry, mut rexit)) = self.bounds.intersect_interval(ray, 0.0, max_dist) else {
            return;
        };
        thread.mailbox.next_ray();
        thread.bsp_stack_top = 0;

        let mut inode = 0usize;
        loop {
            if rentry >= max_dist {
                break;
            }
            match &self.nodes[inode].kind {
                NodeKind::Split { axis, plane, left } => {
                    let axis = *axis as usize;
                    let inv_dir = 1.0 / ray.direction[axis];
                    let rdist = (*plane - ray.origin[axis]) * inv_dir;
                    let (mut ileft, mut iright) = (*left as usize, *left as usize + 1);
                    if (ray.origin[axis] > *plane) || (rdist == 0.0 && ray.direction[axis] < 0.0) {
                        std::mem::swap(&mut ileft, &mut iright);
                    }
                    if rdist < 0.0 || rdist > rexit {
                        inode = ileft;
                    } else if rdist < rentry {
                        inode = iright;
                    } else {
                        thread.push_bsp(iright as u32, rdist, rexit);
                        inode = ileft;
                        rexit = rdist;
                    }
                }
                NodeKind::Empty => {
                    if !self.pop_next(thread, &mut inode, &mut rentry, &mut rexit) {
                        break;
                    }
                }
                NodeKind::Single(a) => {
                    let stop = !thread.mailbox.visit(*a as usize) && visit(*a);
                    if stop || !self.pop_next(thread, &mut inode, &mut rentry, &mut rexit) {
                        break;
                    }
                }
                NodeKind::Double(a, b) => {
                    let mut stop = false;
                    for &id in [a, b].iter() {
                        if !thread.mailbox.visit(*id as usize) && visit(*id) {
                            stop = true;
                        }
                    }
                    if stop || !self.pop_next(thread, &mut inode, &mut rentry, &mut rexit) {
                        break;
                    }
                }
                NodeKind::List(ids) => {
                    let mut stop = false;
                    for &id in ids {
                        if !thread.mailbox.visit(id as usize) && visit(id) {
                            stop = true;
                        }
                    }
                    if stop || !self.pop_next(thread, &mut inode, &mut rentry, &mut rexit) {
                        break;
                    }
                }
            }
        }
    }

    fn pop_next(&self, thread: &mut ThreadState, inode: &mut usize, rentry: &mut f64, rexit: &mut f64) -> bool {
        match thread.pop_bsp() {
            Some(entry) => {
                *inode = entry.node as usize;
                *rentry = entry.t_entry;
                *rexit = entry.t_exit;
                true
            }
            None => false,
        }
    }

    /// Containment query: walk every leaf the point's cell touches. Since
    /// the tree has no notion of "point location" shortcut beyond the
    /// split planes, this descends the same way a degenerate zero-length
    /// ray would.
    pub fn contains_candidates(&self, point: crate::math::Vec3, mut visit: impl FnMut(u32)) {
        if !self.bounds.contains_point(point) {
            return;
        }
        let mut stack = vec![0usize];
        while let Some(inode) = stack.pop() {
            match &self.nodes[inode].kind {
                NodeKind::Split { axis, plane, left } => {
                    if point[*axis as usize] <= *plane {
                        stack.push(*left as usize);
                    } else {
                        stack.push(*left as usize + 1);
                    }
                }
                NodeKind::Empty => {}
                NodeKind::Single(a) => visit(*a),
                NodeKind::Double(a, b) => {
                    visit(*a);
                    visit(*b);
                }
                NodeKind::List(ids) => {
                    for &id in ids {
                        visit(id);
                    }
                }
            }
        }
    }
}

fn set_leaf(nodes: &mut Vec<Node>, inode: usize, indices: &[u32], stats: &mut BspStats) {
    stats.leaf_count += 1;
    stats.total_objects_in_leaves += indices.len() as u64;
    stats.max_objects_per_leaf = stats.max_objects_per_leaf.max(indices.len() as u64);
    let kind = match indices {
        [] => {
            stats.empty_leaf_count += 1;
            NodeKind::Empty
        }
        [a] => NodeKind::Single(*a),
        [a, b] => NodeKind::Double(*a, *b),
        rest => NodeKind::List(rest.to_vec()),
    };
    nodes[inode].kind = kind;
}

/// Builds a subtree directly into a pre-reserved slot rather than
/// appending a fresh node, so sibling pairs stay contiguous.
fn build_node_into(ctx: &mut BuildCtx, nodes: &mut Vec<Node>, indices: Vec<u32>, cell: &BoundingBox, levels_remaining: usize, slot: usize) {
    ctx.stats.node_count += 1;
    ctx.stats.max_depth_reached = ctx.stats.max_depth_reached.max((ctx.options.max_depth - levels_remaining) as u64);
    if indices.is_empty() {
        set_leaf(nodes, slot, &indices, &mut ctx.stats);
        return;
    }
    if levels_remaining == 0 || indices.len() <= ctx.options.leaf_object_threshold {
        if levels_remaining == 0 {
            ctx.stats.max_depth_aborts += 1;
        }
        set_leaf(nodes, slot, &indices, &mut ctx.stats);
        return;
    }
    match best_split(ctx, &indices, cell) {
        None => set_leaf(nodes, slot, &indices, &mut ctx.stats),
        Some((axis, plane)) => {
            ctx.stats.split_count += 1;
            let mut lo = cell.max();
            lo[axis] = plane;
            let left_cell = BoundingBox::from_corners(cell.min(), lo);
            let mut hi = cell.min();
            hi[axis] = plane;
            let right_cell = BoundingBox::from_corners(hi, cell.max());

            let (left_idx, right_idx): (Vec<u32>, Vec<u32>) = indices
                .iter()
                .copied()
                .fold((Vec::new(), Vec::new()), |(mut l, mut r), id| {
                    let b = ctx.object_bounds[id as usize];
                    if b.min()[axis] - BSP_TOLERANCE < plane {
                        l.push(id);
                    }
                    if b.max()[axis] + BSP_TOLERANCE > plane {
                        r.push(id);
                    }
                    (l, r)
                });

            let left_slot = nodes.len();
            nodes.push(Node { kind: NodeKind::Empty });
            nodes.push(Node { kind: NodeKind::Empty });
            build_node_into(ctx, nodes, left_idx, &left_cell, levels_remaining - 1, left_slot);
            build_node_into(ctx, nodes, right_idx, &right_cell, levels_remaining - 1, left_slot + 1);
            nodes[slot].kind = NodeKind::Split { axis: axis as u8, plane, left: left_slot as u32 };
        }
    }
}

/// Candidate-plane sweep over object bound edges on each axis, cost
/// model straight out of `bsptree.cpp`'s `build` (Eric Haines' Ray
/// Tracing News Vol. 17 No. 1 formula).
fn best_split(ctx: &BuildCtx, indices: &[u32], cell: &BoundingBox) -> Option<(usize, f64)> {
    let cnt = indices.len() as f64;
    let opts = &ctx.options;
    let mut best_cost = opts.base_access_cost + cnt * opts.object_isect_cost;
    let mut best: Option<(usize, f64)> = None;

    let size = cell.max() - cell.min();
    let sizes = [size.x, size.y, size.z];
    let enh = sizes[0] * sizes[1] + sizes[0] * sizes[2] + sizes[1] * sizes[2];
    if enh <= 0.0 {
        return None;
    }
    let enh_inv = 1.0 / enh;

    for axis in 0..3 {
        let other_a = (axis + 1) % 3;
        let other_b = (axis + 2) % 3;
        let eph = sizes[other_a] * sizes[other_b];
        let cph_full = eph * enh_inv;
        let cph = cph_full * 0.5;
        let bmin = cell.min()[axis];
        let bmax = cell.max()[axis];
        let relmul = 1.0 / sizes[axis].max(1e-12);
        let const_cost = opts.base_access_cost + (1.0 + cph_full) * opts.child_access_cost;

        let mut events: Vec<(f64, Edge, u32)> = Vec::with_capacity(indices.len() * 2);
        let mut pab = 0i64;
        let mut pb = indices.len() as i64;
        for &id in indices {
            let b = ctx.object_bounds[id as usize];
            let smin = b.min()[axis] - BSP_TOLERANCE;
            let smax = b.max()[axis] + BSP_TOLERANCE;
            if smin >= bmax || smax <= bmin {
                continue;
            }
            if smin < bmin {
                pab += 1;
                pb -= 1;
            }
            events.push((smin, Edge::Min, id));
            events.push((smax, Edge::Max, id));
        }
        events.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

        let mut pa = 0i64;
        for (plane, edge, _id) in &events {
            if *edge == Edge::Max {
                pa += 1;
                pab -= 1;
            }
            if *plane > bmin && *plane < bmax {
                let r = (*plane - bmin) * relmul;
                let cah = r * sizes[axis] * (sizes[other_a] + sizes[other_b]) * enh_inv;
                let cbh = (1.0 - r) * sizes[axis] * (sizes[other_a] + sizes[other_b]) * enh_inv;
                let cost = const_cost
                    + opts.object_isect_cost
                        * (pab as f64 + cph * (opts.miss_chance * pa as f64 + opts.miss_chance * pb as f64) + cah * pa as f64 + cbh * pb as f64);
                if cost < best_cost {
                    best_cost = cost;
                    best = Some((axis, *plane));
                }
            }
            if *edge == Edge::Min {
                pab += 1;
                pb -= 1;
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;

    fn boxes() -> Vec<BoundingBox> {
        vec![
            BoundingBox::from_corners(Vec3::new(-5.0, -1.0, -1.0), Vec3::new(-3.0, 1.0, 1.0)),
            BoundingBox::from_corners(Vec3::new(3.0, -1.0, -1.0), Vec3::new(5.0, 1.0, 1.0)),
        ]
    }

    #[test]
    fn traversal_visits_both_disjoint_objects() {
        let tree = BspTree::build(&boxes(), BspOptions::default());
        let mut thread = ThreadState::new(2);
        let ray = Ray::new(Vec3::new(-20.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let mut visited = Vec::new();
        tree.traverse(&ray, 1e6, &mut thread, |id| {
            visited.push(id);
            false
        });
        visited.sort();
        assert_eq!(visited, vec![0, 1]);
    }

    #[test]
    fn traversal_skips_object_outside_ray_path() {
        let tree = BspTree::build(&boxes(), BspOptions::default());
        let mut thread = ThreadState::new(2);
        let ray = Ray::new(Vec3::new(0.0, 20.0, 0.0), Vec3::new(0.0, -1.0, 0.0));
        let mut visited = Vec::new();
        tree.traverse(&ray, 1e6, &mut thread, |id| {
            visited.push(id);
            false
        });
        assert!(visited.is_empty());
    }

    #[test]
    fn empty_scene_builds_empty_tree() {
        let tree = BspTree::build(&[], BspOptions::default());
        assert_eq!(tree.stats().node_count, 1);
    }
}
