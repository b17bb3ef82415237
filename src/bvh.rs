// src/bvh.rs
//! Bounding-volume hierarchy over spheres, stored as a flat node array.
//!
//! Interior nodes keep their children side by side: the left child lives at
//! `left_child` and the right child at `left_child + 1`. Leaves point at a
//! contiguous run of `sphere_count` spheres in the reordered sphere array.

use bytemuck::{Pod, Zeroable};
use log::debug;

use crate::aabb::Aabb;
use crate::hittable_list::{HIT_EPSILON, HitRecord};
use crate::ray::Ray;
use crate::sphere::Sphere;
use crate::vec3::Vec3;

/// Spans of this many spheres or fewer become leaves.
pub const LEAF_SIZE: usize = 2;

/// Traversal stack depth. Median splits keep the tree well below this.
pub const MAX_STACK: usize = 64;

/// GPU-friendly BVH node (32 bytes, matches the WGSL `Node` struct).
///
/// Interior: `left_child` = index of the left child node, `sphere_count` = 0.
/// Leaf: `left_child` = first sphere index, `sphere_count` > 0.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct BvhNode {
    pub min_corner: Vec3,
    pub left_child: u32,
    pub max_corner: Vec3,
    pub sphere_count: u32,
}

impl BvhNode {
    fn leaf(bounds: Aabb, first: usize, count: usize) -> Self {
        Self {
            min_corner: bounds.min,
            left_child: first as u32,
            max_corner: bounds.max,
            sphere_count: count as u32,
        }
    }

    fn interior(bounds: Aabb, left_child: usize) -> Self {
        Self {
            min_corner: bounds.min,
            left_child: left_child as u32,
            max_corner: bounds.max,
            sphere_count: 0,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.sphere_count > 0
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.min_corner, self.max_corner)
    }
}

/// Built hierarchy. Node 0 is the root.
#[derive(Clone, Debug)]
pub struct Bvh {
    pub nodes: Vec<BvhNode>,
    /// `order[i]` is the pre-build index of the sphere now stored at slot `i`.
    pub order: Vec<u32>,
}

impl Bvh {
    /// Build over `spheres`, reordering them in place so every leaf covers a
    /// contiguous range.
    pub fn build(spheres: &mut [Sphere]) -> Bvh {
        let n = spheres.len();
        if n == 0 {
            // A lone empty root: traversal sees no spheres and returns no hit.
            return Bvh {
                nodes: vec![BvhNode::default()],
                order: Vec::new(),
            };
        }

        let mut builder = Builder {
            nodes: Vec::with_capacity(2 * n),
            bounds: spheres.iter().map(Sphere::bounds).collect(),
            centers: spheres.iter().map(|s| s.center).collect(),
            indices: (0..n).collect(),
        };
        builder.nodes.push(BvhNode::default());
        builder.subdivide(0, 0, n);

        let reordered: Vec<Sphere> = builder.indices.iter().map(|&i| spheres[i]).collect();
        spheres.copy_from_slice(&reordered);

        let bvh = Bvh {
            nodes: builder.nodes,
            order: builder.indices.into_iter().map(|i| i as u32).collect(),
        };
        debug!(
            "built bvh: {} spheres, {} nodes, depth {}",
            n,
            bvh.nodes.len(),
            bvh.depth()
        );
        bvh
    }

    /// Number of nodes on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 1usize)];
        while let Some((index, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            let node = &self.nodes[index];
            if !node.is_leaf() && self.nodes.len() > 1 {
                let left = node.left_child as usize;
                stack.push((left, depth + 1));
                stack.push((left + 1, depth + 1));
            }
        }
        deepest
    }

    /// Closest hit against `spheres`, which must be the slice this BVH was built over.
    pub fn closest_hit(&self, ray: &Ray, spheres: &[Sphere]) -> Option<HitRecord> {
        traverse(&self.nodes, spheres, ray)
    }
}

struct Builder {
    nodes: Vec<BvhNode>,
    bounds: Vec<Aabb>,
    centers: Vec<Vec3>,
    /// Working permutation of sphere indices; leaves reference ranges of it.
    indices: Vec<usize>,
}

impl Builder {
    fn subdivide(&mut self, node_idx: usize, first: usize, count: usize) {
        let span = first..first + count;
        let mut bounds = Aabb::EMPTY;
        for &i in &self.indices[span.clone()] {
            bounds.grow(&self.bounds[i]);
        }

        if count <= LEAF_SIZE {
            self.nodes[node_idx] = BvhNode::leaf(bounds, first, count);
            return;
        }

        // Median split along the longest axis: both halves are non-empty, so
        // every level strictly shrinks even when all centers coincide.
        let axis = bounds.longest_axis();
        let half = count / 2;
        let centers = &self.centers;
        self.indices[span].select_nth_unstable_by(half, |&a, &b| {
            centers[a][axis].total_cmp(&centers[b][axis])
        });

        let left_idx = self.nodes.len();
        self.nodes.push(BvhNode::default());
        self.nodes.push(BvhNode::default());
        self.nodes[node_idx] = BvhNode::interior(bounds, left_idx);

        self.subdivide(left_idx, first, half);
        self.subdivide(left_idx + 1, first + half, count - half);
    }
}

/// Stack-based closest-hit traversal, visiting the nearer child first.
///
/// Trees deeper than `MAX_STACK` never panic; far subtrees that do not fit
/// on the stack are skipped. `Bvh::build` never produces such trees.
///
/// This is the CPU twin of `trace` in `shader.wgsl`; keep the two in step.
pub fn traverse(nodes: &[BvhNode], spheres: &[Sphere], ray: &Ray) -> Option<HitRecord> {
    if spheres.is_empty() || nodes.is_empty() {
        return None;
    }

    let mut closest = f32::INFINITY;
    let mut hit: Option<HitRecord> = None;

    nodes[0].bounds().intersect(ray, closest)?;

    let mut stack = [0u32; MAX_STACK];
    let mut stack_len = 0usize;
    let mut node = nodes[0];

    loop {
        if node.is_leaf() {
            let first = node.left_child as usize;
            let last = (first + node.sphere_count as usize).min(spheres.len());
            for index in first..last {
                if let Some(t) = spheres[index].intersect(ray, HIT_EPSILON, closest) {
                    closest = t;
                    hit = Some(HitRecord { t, sphere: index });
                }
            }
        } else {
            let left_idx = node.left_child as usize;
            let left = nodes[left_idx];
            let right = nodes[left_idx + 1];
            let near_left = left.bounds().intersect(ray, closest);
            let near_right = right.bounds().intersect(ray, closest);

            let next = match (near_left, near_right) {
                (Some(dl), Some(dr)) => {
                    let (near, far) = if dl <= dr {
                        (left_idx, left_idx + 1)
                    } else {
                        (left_idx + 1, left_idx)
                    };
                    // A full stack drops the far subtree, as the WGSL kernel does.
                    if stack_len < MAX_STACK {
                        stack[stack_len] = far as u32;
                        stack_len += 1;
                    }
                    Some(near)
                }
                (Some(_), None) => Some(left_idx),
                (None, Some(_)) => Some(left_idx + 1),
                (None, None) => None,
            };

            if let Some(next) = next {
                node = nodes[next];
                continue;
            }
        }

        if stack_len == 0 {
            break;
        }
        stack_len -= 1;
        node = nodes[stack[stack_len] as usize];
    }

    hit
}
