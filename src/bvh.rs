use arrayvec::ArrayVec;

use crate::aabb::Aabb;
use crate::geometry::{intersect_triangle, Fp, Ray, TriangleHit};
use crate::scene::Triangle;

/// Capacity of the explicit traversal stack.
pub const BV_MAX_STACK_DEPTH: usize = 16;
/// Deepest level the builder creates. Depth-first traversal that pushes both
/// children holds at most `depth + 1` entries, so this keeps every
/// hierarchy within the stack.
pub const MAX_BVH_DEPTH: usize = BV_MAX_STACK_DEPTH - 1;
pub const MAX_LEAF_FACES: usize = 4;

/// One node of the flat hierarchy. Child and face indices are absolute
/// indices into the scene-wide node and face arrays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BvhNode {
    pub aabb: Aabb,
    pub left_child_index: usize,
    pub right_child_index: usize,
    pub content_start: usize,
    pub content_length: usize,
    pub split_axis: usize,
}

impl BvhNode {
    pub fn is_leaf(&self) -> bool {
        self.left_child_index == usize::MAX
    }
}

#[derive(Debug, Default)]
pub struct BvhTree {
    pub nodes: Vec<BvhNode>,
    pub max_depth: usize,
}

/// Builds the hierarchy of one mesh, reordering `faces` so every leaf covers
/// a contiguous range. The root is written at `node_offset`, face ranges
/// start at `face_offset`.
pub fn create_bvh_tree(faces: &mut [Triangle], face_offset: usize, node_offset: usize) -> BvhTree {
    let mut tree = BvhTree::default();
    if faces.is_empty() {
        return tree;
    }
    let length = faces.len();
    create_bvh_node(&mut tree, faces, 0, length, 0, face_offset, node_offset);
    tree
}

fn create_bvh_node(
    tree: &mut BvhTree,
    faces: &mut [Triangle],
    start: usize,
    length: usize,
    depth: usize,
    face_offset: usize,
    node_offset: usize,
) -> usize {
    tree.max_depth = tree.max_depth.max(depth);
    let slice = &mut faces[start..start + length];
    let aabb = slice
        .iter()
        .fold(Aabb::default(), |acc, face| acc.extend_aabb(&face.bounds()));

    let index = tree.nodes.len();
    tree.nodes.push(BvhNode {
        aabb,
        left_child_index: usize::MAX,
        right_child_index: usize::MAX,
        content_start: face_offset + start,
        content_length: length,
        split_axis: 0,
    });

    if length <= MAX_LEAF_FACES || depth >= MAX_BVH_DEPTH {
        return node_offset + index;
    }

    let (axis, first_part_len) = split(slice);
    let left = create_bvh_node(
        tree,
        faces,
        start,
        first_part_len,
        depth + 1,
        face_offset,
        node_offset,
    );
    let right = create_bvh_node(
        tree,
        faces,
        start + first_part_len,
        length - first_part_len,
        depth + 1,
        face_offset,
        node_offset,
    );
    let node = &mut tree.nodes[index];
    node.left_child_index = left;
    node.right_child_index = right;
    node.split_axis = axis;
    node.content_length = 0;
    node_offset + index
}

// Sorts along the longest centroid axis and splits at the spatial midpoint,
// falling back to the median when the midpoint leaves one side empty.
fn split(faces: &mut [Triangle]) -> (usize, usize) {
    let centroid_bounds = faces
        .iter()
        .fold(Aabb::default(), |acc, face| acc.extend_point(&face.centroid()));
    let axis = centroid_bounds.longest_axis();
    faces.sort_unstable_by(|a, b| a.centroid()[axis].total_cmp(&b.centroid()[axis]));
    let mid = centroid_bounds.centroid()[axis];
    let first_part = faces.partition_point(|face| face.centroid()[axis] <= mid);
    if 0 < first_part && first_part < faces.len() {
        (axis, first_part)
    } else {
        (axis, faces.len() / 2)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraversalStats {
    pub nodes_visited: usize,
    pub faces_tested: usize,
    pub max_stack_depth: usize,
}

/// Closest face hit within `(t_min, t_max)` under the hierarchy rooted at
/// `root`, as `(face index, hit)`.
pub fn intersect_bvh(
    ray: &Ray,
    nodes: &[BvhNode],
    faces: &[Triangle],
    root: usize,
    t_min: Fp,
    t_max: Fp,
    stats: &mut TraversalStats,
) -> Option<(usize, TriangleHit)> {
    let mut stack = ArrayVec::<usize, BV_MAX_STACK_DEPTH>::new();
    let mut closest = t_max;
    let mut result = None;
    stack.push(root);

    while let Some(node_index) = stack.pop() {
        let Some(node) = nodes.get(node_index) else {
            continue;
        };
        stats.nodes_visited += 1;
        if node.aabb.hit(ray, t_min, closest).is_none() {
            continue;
        }
        if node.is_leaf() {
            let range = node.content_start..node.content_start + node.content_length;
            for (face_index, face) in faces[range.clone()].iter().enumerate() {
                stats.faces_tested += 1;
                if let Some(hit) = intersect_triangle(ray, &face.vertices, t_min, closest) {
                    closest = hit.t;
                    result = Some((range.start + face_index, hit));
                }
            }
        } else {
            // Near child is pushed last so it pops first.
            let (near, far) = if ray.direction[node.split_axis] >= 0.0 {
                (node.left_child_index, node.right_child_index)
            } else {
                (node.right_child_index, node.left_child_index)
            };
            for child in [far, near] {
                if stack.try_push(child).is_err() {
                    debug_assert!(false, "bvh deeper than the traversal stack");
                    log::error!("bvh traversal stack overflow at node {node_index}");
                }
            }
            stats.max_stack_depth = stats.max_stack_depth.max(stack.len());
        }
    }
    result
}
