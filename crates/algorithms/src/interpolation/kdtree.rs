//! k-d tree over points in `D` dimensions
//!
//! Used to pick the local centre set for each query when the RBF engine
//! runs in neighbourhood mode.
//!
//! Reference:
//! Bentley, J.L. (1975). Multidimensional binary search trees used
//! for associative searching. CACM, 18(9).

/// A k-d tree storing indices into the caller's point slice.
#[derive(Debug)]
pub struct KdTree<const D: usize> {
    nodes: Vec<KdNode>,
    points: Vec<[f64; D]>,
}

#[derive(Debug)]
struct KdNode {
    /// Index into `points`
    point_idx: usize,
    split_dim: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// Result of a nearest-neighbour query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index of the point in the slice the tree was built from
    pub index: usize,
    pub distance_sq: f64,
}

impl<const D: usize> KdTree<D> {
    /// Build a tree; O(n log n) median splitting.
    pub fn build(points: &[[f64; D]]) -> Self {
        let points = points.to_vec();
        let mut nodes = Vec::with_capacity(points.len());
        if !points.is_empty() {
            let mut indices: Vec<usize> = (0..points.len()).collect();
            build_recursive(&points, &mut indices, 0, &mut nodes);
        }
        Self { nodes, points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Closest point to `query`, or `None` for an empty tree.
    pub fn nearest(&self, query: &[f64; D]) -> Option<Neighbor> {
        self.k_nearest(query, 1).into_iter().next()
    }

    /// Up to `k` closest points, sorted by ascending distance.
    pub fn k_nearest(&self, query: &[f64; D], k: usize) -> Vec<Neighbor> {
        if self.nodes.is_empty() || k == 0 {
            return Vec::new();
        }

        // Sorted descending by distance: heap[0] is the current k-th best
        let mut heap: Vec<(f64, usize)> = Vec::with_capacity(k + 1);
        self.knn_recursive(0, query, k, &mut heap);

        heap.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        heap.into_iter()
            .map(|(distance_sq, index)| Neighbor { index, distance_sq })
            .collect()
    }

    fn knn_recursive(&self, node_idx: usize, query: &[f64; D], k: usize, heap: &mut Vec<(f64, usize)>) {
        let node = &self.nodes[node_idx];
        let p = &self.points[node.point_idx];
        let dist_sq = distance_sq(p, query);

        if heap.len() < k || dist_sq < heap[0].0 {
            if heap.len() >= k {
                heap.remove(0);
            }
            let pos = heap
                .binary_search_by(|probe| probe.0.total_cmp(&dist_sq).reverse())
                .unwrap_or_else(|e| e);
            heap.insert(pos, (dist_sq, node.point_idx));
        }

        let diff = query[node.split_dim] - p[node.split_dim];
        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = first {
            self.knn_recursive(child, query, k, heap);
        }

        let threshold = if heap.len() >= k { heap[0].0 } else { f64::MAX };
        if diff * diff < threshold
            && let Some(child) = second
        {
            self.knn_recursive(child, query, k, heap);
        }
    }
}

#[inline]
pub(crate) fn distance_sq<const D: usize>(a: &[f64; D], b: &[f64; D]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn build_recursive<const D: usize>(
    points: &[[f64; D]],
    indices: &mut [usize],
    depth: usize,
    nodes: &mut Vec<KdNode>,
) -> usize {
    let n = indices.len();
    let split_dim = if D == 0 { 0 } else { depth % D };

    indices.sort_by(|&a, &b| points[a][split_dim].total_cmp(&points[b][split_dim]));

    let median = n / 2;
    let node_idx = nodes.len();
    nodes.push(KdNode {
        point_idx: indices[median],
        split_dim,
        left: None,
        right: None,
    });

    if median > 0 {
        let left = build_recursive(points, &mut indices[..median], depth + 1, nodes);
        nodes[node_idx].left = Some(left);
    }
    if median + 1 < n {
        let right = build_recursive(points, &mut indices[median + 1..], depth + 1, nodes);
        nodes[node_idx].right = Some(right);
    }

    node_idx
}
