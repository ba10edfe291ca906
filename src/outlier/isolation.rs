//! Isolation forest anomaly scores.
//!
//! Each tree recursively partitions a bootstrap sub-sample with random
//! axis-aligned splits until points are isolated or the height limit is hit.
//! Anomalies need few splits to isolate, so their average path length is short.
//!
//! Trees are built in parallel. Every tree derives its own RNG from the base
//! seed and its index, so the forest is identical regardless of scheduling.

use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;

/// Euler–Mascheroni constant used by the harmonic-number approximation.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Largest bootstrap sub-sample per tree.
const MAX_SAMPLES: usize = 256;

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Anomaly score `s(x) = 2^(-E[h(x)] / c(psi))` for every point.
///
/// Scores lie in `(0, 1]`; higher means more anomalous.
pub fn anomaly_scores(points: &[Vec<f64>], n_estimators: usize, seed: u64) -> Vec<f64> {
    let n = points.len();
    if n == 0 || n_estimators == 0 {
        return vec![0.0; n];
    }
    let psi = n.min(MAX_SAMPLES);
    let height_limit = (psi as f64).log2().ceil().max(1.0) as usize;

    let trees: Vec<Node> = (0..n_estimators)
        .into_par_iter()
        .map(|t| {
            let mut rng = StdRng::seed_from_u64(tree_seed(seed, t));
            let sample: Vec<usize> = (0..psi).map(|_| rng.gen_range(0..n)).collect();
            build(points, sample, 0, height_limit, &mut rng)
        })
        .collect();

    let norm = average_path_length(psi).max(1e-12);
    points
        .iter()
        .map(|x| {
            // Fixed summation order keeps scores bit-identical across runs.
            let total: f64 = trees.iter().map(|tree| path_length(tree, x, 0)).sum();
            let mean_h = total / trees.len() as f64;
            2f64.powf(-mean_h / norm)
        })
        .collect()
}

fn tree_seed(seed: u64, tree: usize) -> u64 {
    seed ^ (tree as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn build(points: &[Vec<f64>], idx: Vec<usize>, depth: usize, limit: usize, rng: &mut StdRng) -> Node {
    if depth >= limit || idx.len() <= 1 {
        return Node::Leaf { size: idx.len() };
    }

    let width = points[idx[0]].len();
    let mut splittable = Vec::with_capacity(width);
    for j in 0..width {
        let (lo, hi) = column_range(points, &idx, j);
        if hi > lo {
            splittable.push((j, lo, hi));
        }
    }
    let Some(&(feature, lo, hi)) = splittable.choose(rng) else {
        return Node::Leaf { size: idx.len() };
    };

    let threshold = rng.gen_range(lo..hi);
    let (left, right): (Vec<usize>, Vec<usize>) = idx.iter().partition(|&&i| points[i][feature] < threshold);
    if left.is_empty() || right.is_empty() {
        return Node::Leaf {
            size: left.len() + right.len(),
        };
    }

    Node::Split {
        feature,
        threshold,
        left: Box::new(build(points, left, depth + 1, limit, rng)),
        right: Box::new(build(points, right, depth + 1, limit, rng)),
    }
}

fn column_range(points: &[Vec<f64>], idx: &[usize], j: usize) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &i in idx {
        let v = points[i][j];
        lo = lo.min(v);
        hi = hi.max(v);
    }
    (lo, hi)
}

fn path_length(node: &Node, x: &[f64], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if x[*feature] < *threshold {
                path_length(left, x, depth + 1)
            } else {
                path_length(right, x, depth + 1)
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}
