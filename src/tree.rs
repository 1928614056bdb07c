use rand::distributions::Uniform;
use rand::rngs::ThreadRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::features::FeatureVector;

/// Euler-Mascheroni constant, used by the harmonic-number approximation.
const EULER_GAMMA: f64 = 0.5772156649015329;

/// Number of fresh thresholds tried before giving up on a split that
/// leaves one side empty.
const MAX_SPLIT_RETRIES: usize = 5;

#[derive(Clone, Serialize, Deserialize)]
pub(crate) enum Node {
    Ex(ExNode),
    In(InNode),
}

#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct InNode {
    /// Left child node, holding the rows strictly below the split value.
    left: Box<Node>,

    /// Right child node.
    right: Box<Node>,

    /// Column index of the feature this node splits on.
    feature: usize,

    /// Split threshold, drawn uniformly from the column's range over the
    /// rows that reached this node during training.
    split: f64,
}

#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct ExNode {
    /// Number of training rows terminated at this node.
    num_samples: usize,
}

/// A single isolation tree, grown over a subsample of the training matrix
/// by recursive random axis-aligned partitioning.
#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct Tree {
    root: Node,
}

impl Tree {
    pub fn grow(
        matrix: &[FeatureVector],
        indices: Vec<usize>,
        rng: &mut ThreadRng,
        height_limit: usize,
    ) -> Self {
        Self {
            root: Self::make_node(matrix, indices, rng, 0, height_limit),
        }
    }

    fn make_node(
        matrix: &[FeatureVector],
        indices: Vec<usize>,
        rng: &mut ThreadRng,
        depth: usize,
        height_limit: usize,
    ) -> Node {
        if depth >= height_limit || indices.len() <= 1 {
            return Node::Ex(ExNode {
                num_samples: indices.len(),
            });
        }

        // Only columns with a non-degenerate range over the rows that
        // reached this node are eligible for splitting. Bounds are
        // re-derived per subset so splits adapt to local density.
        let num_features = matrix.first().map(|row| row.len()).unwrap_or(0);
        let candidates: Vec<(usize, (f64, f64))> = (0..num_features)
            .filter_map(|col| column_bounds(matrix, &indices, col).map(|bounds| (col, bounds)))
            .collect();
        if candidates.is_empty() {
            return Node::Ex(ExNode {
                num_samples: indices.len(),
            });
        }

        let (feature, (min, max)) = candidates[rng.gen_range(0..candidates.len())];
        let threshold_range = Uniform::new(min, max);

        let mut split = rng.sample(threshold_range);
        let (mut left, mut right) = partition(matrix, &indices, feature, split);
        let mut retries = 0;
        while (left.is_empty() || right.is_empty()) && retries < MAX_SPLIT_RETRIES {
            split = rng.sample(threshold_range);
            (left, right) = partition(matrix, &indices, feature, split);
            retries += 1;
        }
        if left.is_empty() || right.is_empty() {
            // The column's finite values coincide so tightly that no
            // threshold separates them; terminate the whole subset here.
            return Node::Ex(ExNode {
                num_samples: indices.len(),
            });
        }

        Node::In(InNode {
            left: Box::new(Self::make_node(matrix, left, rng, depth + 1, height_limit)),
            right: Box::new(Self::make_node(matrix, right, rng, depth + 1, height_limit)),
            feature,
            split,
        })
    }

    /// Number of edges traversed from the root to the external node reached
    /// by `vector`, plus the normalization term for the rows terminated
    /// there.
    pub fn path_length(&self, vector: &[f64]) -> f64 {
        Self::descend(&self.root, vector, 0.0)
    }

    fn descend(node: &Node, vector: &[f64], edges: f64) -> f64 {
        match node {
            Node::Ex(ex_node) => edges + c_factor(ex_node.num_samples),
            Node::In(in_node) => {
                let child = if go_left(vector[in_node.feature], in_node.split) {
                    in_node.left.as_ref()
                } else {
                    in_node.right.as_ref()
                };
                Self::descend(child, vector, edges + 1.0)
            }
        }
    }
}

/// Strictly-less descends left; a non-finite value is routed left
/// deterministically by treating it as `split - 1`. Imputation normally
/// runs before training or scoring, so the non-finite arm is a safety net.
fn go_left(value: f64, split: f64) -> bool {
    let value = if value.is_finite() { value } else { split - 1.0 };
    value < split
}

fn partition(
    matrix: &[FeatureVector],
    indices: &[usize],
    feature: usize,
    split: f64,
) -> (Vec<usize>, Vec<usize>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    for &i in indices {
        if go_left(matrix[i][feature], split) {
            left.push(i);
        } else {
            right.push(i);
        }
    }
    (left, right)
}

/// Min and max of a column over the given rows, ignoring non-finite cells.
/// `None` when the column has no finite values or a degenerate range.
fn column_bounds(matrix: &[FeatureVector], indices: &[usize], col: usize) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &i in indices {
        let v = matrix[i][col];
        if !v.is_finite() {
            continue;
        }
        min = min.min(v);
        max = max.max(v);
    }
    if min.is_finite() && max.is_finite() && min < max {
        Some((min, max))
    } else {
        None
    }
}

/// Approximation of the n-th harmonic number:
/// `H(n) ~ ln(n) + gamma + 1/(2n) - 1/(12n^2)`.
fn harmonic(n: f64) -> f64 {
    n.ln() + EULER_GAMMA + 1.0 / (2.0 * n) - 1.0 / (12.0 * n * n)
}

/// Average path length of an unsuccessful search in a binary search tree
/// holding `n` points.
pub(crate) fn c_factor(n: usize) -> f64 {
    if n <= 1 {
        return 1.0;
    }
    let n = n as f64;
    2.0 * harmonic(n - 1.0) - 2.0 * (n - 1.0) / n
}
