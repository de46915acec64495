//! Bounding-volume hierarchy over triangles.
//!
//! Built once per mesh at construction time and queried by the picker with
//! rays already transformed into the mesh's model space. The tree is a flat
//! node array split at the median along the widest centroid axis; leaves
//! hold contiguous ranges of reordered triangle indices. Traversal prunes
//! with a slab test and only runs Möller–Trumbore at the leaves.

use glam::Vec3;

const LEAF_THRESHOLD: usize = 4;
const TRIANGLE_EPSILON: f32 = 1e-8;
const RAY_T_MIN: f32 = 1e-6;

/// A single ray-triangle intersection in the BVH's local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Intersection point in model space.
    pub point: Vec3,
    /// Euclidean distance from the ray origin.
    pub distance: f32,
    /// Index of the hit triangle in the source index buffer.
    pub triangle: usize,
}

#[derive(Debug, Clone, Copy)]
struct Aabb {
    min: Vec3,
    max: Vec3,
}

impl Aabb {
    const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    fn from_triangle(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self {
            min: v0.min(v1).min(v2),
            max: v0.max(v1).max(v2),
        }
    }

    fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    fn centroid(self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Slab test with a precomputed inverse direction. Returns false only
    /// when the ray provably misses; NaN lanes from axis-parallel rays fall
    /// through as conservative passes.
    fn hit(&self, origin: Vec3, inv_dir: Vec3, mut t_min: f32, mut t_max: f32) -> bool {
        for axis in 0..3 {
            let t1 = (self.min[axis] - origin[axis]) * inv_dir[axis];
            let t2 = (self.max[axis] - origin[axis]) * inv_dir[axis];
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
            if t_min > t_max {
                return false;
            }
        }
        true
    }
}

/// Triangle with precomputed edges for the intersection inner loop.
#[derive(Debug, Clone, Copy)]
struct Triangle {
    v0: Vec3,
    e1: Vec3,
    e2: Vec3,
    source_index: u32,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    bounds: Aabb,
    /// Child node indices; negative marks a leaf.
    left: i32,
    right: i32,
    /// Leaf range into the reordered triangle array.
    start: u32,
    count: u32,
}

/// Axis-aligned bounding-box tree answering nearest-intersection queries.
pub struct Bvh {
    nodes: Vec<Node>,
    triangles: Vec<Triangle>,
    root: usize,
}

impl Bvh {
    /// Builds the tree over indexed triangles. Degenerate inputs (no
    /// triangles) produce an empty tree whose queries always miss.
    pub fn build(vertices: &[[f32; 3]], indices: &[[u32; 3]]) -> Self {
        let mut triangles: Vec<Triangle> = indices
            .iter()
            .enumerate()
            .map(|(i, tri)| {
                let v0 = Vec3::from(vertices[tri[0] as usize]);
                let v1 = Vec3::from(vertices[tri[1] as usize]);
                let v2 = Vec3::from(vertices[tri[2] as usize]);
                Triangle {
                    v0,
                    e1: v1 - v0,
                    e2: v2 - v0,
                    source_index: i as u32,
                }
            })
            .collect();

        if triangles.is_empty() {
            return Self {
                nodes: Vec::new(),
                triangles,
                root: 0,
            };
        }

        let bounds: Vec<Aabb> = triangles
            .iter()
            .map(|t| Aabb::from_triangle(t.v0, t.v0 + t.e1, t.v0 + t.e2))
            .collect();
        let mut order: Vec<u32> = (0..triangles.len() as u32).collect();
        let mut nodes = Vec::new();
        let root = build_range(&mut nodes, &mut order, &bounds, 0, triangles.len());

        // Store triangles in leaf order so leaves index contiguous slices.
        let reordered: Vec<Triangle> = order.iter().map(|&i| triangles[i as usize]).collect();
        triangles = reordered;

        Self {
            nodes,
            triangles,
            root,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Nearest intersection along `direction` from `origin`, or `None` when
    /// the ray misses every triangle. Hits behind the origin are ignored.
    pub fn nearest_hit(&self, origin: Vec3, direction: Vec3) -> Option<RayHit> {
        if self.nodes.is_empty() {
            return None;
        }

        let inv_dir = direction.recip();
        let mut best_t = f32::INFINITY;
        let mut best: Option<RayHit> = None;
        let mut stack = vec![self.root];

        while let Some(node_index) = stack.pop() {
            let node = self.nodes[node_index];
            if !node.bounds.hit(origin, inv_dir, RAY_T_MIN, best_t) {
                continue;
            }
            if node.left < 0 {
                let start = node.start as usize;
                let end = start + node.count as usize;
                for triangle in &self.triangles[start..end] {
                    if let Some(t) = intersect_triangle(origin, direction, triangle, best_t) {
                        best_t = t;
                        best = Some(RayHit {
                            point: origin + direction * t,
                            distance: t * direction.length(),
                            triangle: triangle.source_index as usize,
                        });
                    }
                }
            } else {
                stack.push(node.left as usize);
                stack.push(node.right as usize);
            }
        }

        best
    }
}

fn build_range(
    nodes: &mut Vec<Node>,
    order: &mut [u32],
    bounds: &[Aabb],
    start: usize,
    end: usize,
) -> usize {
    let mut node_bounds = Aabb::EMPTY;
    for &i in &order[start..end] {
        node_bounds = node_bounds.union(bounds[i as usize]);
    }

    let count = end - start;
    if count <= LEAF_THRESHOLD {
        nodes.push(Node {
            bounds: node_bounds,
            left: -1,
            right: -1,
            start: start as u32,
            count: count as u32,
        });
        return nodes.len() - 1;
    }

    // Median split on the widest centroid axis.
    let mut centroid_min = Vec3::splat(f32::INFINITY);
    let mut centroid_max = Vec3::splat(f32::NEG_INFINITY);
    for &i in &order[start..end] {
        let c = bounds[i as usize].centroid();
        centroid_min = centroid_min.min(c);
        centroid_max = centroid_max.max(c);
    }
    let extent = centroid_max - centroid_min;
    let mut axis = 0;
    if extent.y > extent.x {
        axis = 1;
    }
    if extent.z > extent[axis] {
        axis = 2;
    }

    order[start..end].sort_by(|&a, &b| {
        let ca = bounds[a as usize].centroid()[axis];
        let cb = bounds[b as usize].centroid()[axis];
        ca.partial_cmp(&cb).unwrap_or(std::cmp::Ordering::Equal)
    });

    let mid = (start + end) / 2;
    let left = build_range(nodes, order, bounds, start, mid);
    let right = build_range(nodes, order, bounds, mid, end);
    nodes.push(Node {
        bounds: node_bounds,
        left: left as i32,
        right: right as i32,
        start: start as u32,
        count: count as u32,
    });
    nodes.len() - 1
}

/// Möller–Trumbore, accepting hits with `t` in `(RAY_T_MIN, t_max)`.
fn intersect_triangle(origin: Vec3, direction: Vec3, tri: &Triangle, t_max: f32) -> Option<f32> {
    let pvec = direction.cross(tri.e2);
    let det = tri.e1.dot(pvec);
    if det.abs() < TRIANGLE_EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = origin - tri.v0;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(tri.e1);
    let v = direction.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = tri.e2.dot(qvec) * inv_det;
    if t <= RAY_T_MIN || t >= t_max {
        return None;
    }
    Some(t)
}
