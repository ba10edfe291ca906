//! Local outlier factor.
//!
//! A point's local reachability density (`lrd`) is the inverse mean
//! reachability distance to its `k` nearest neighbours. The outlier factor is
//! the neighbours' mean `lrd` divided by the point's own; values well above 1
//! mean the point sits in a sparser region than its neighbours.

use std::cmp::Ordering;

/// Guards the density against duplicated points (zero reachability distance).
const LRD_EPS: f64 = 1e-10;

/// Local outlier factor of each point with neighbourhood size `k`.
///
/// `k` is clamped to `n - 1`. Fewer than two points yield factors of `1.0`.
pub fn local_outlier_factors(points: &[Vec<f64>], k: usize) -> Vec<f64> {
    let n = points.len();
    if n < 2 {
        return vec![1.0; n];
    }
    let k = k.clamp(1, n - 1);

    let dist: Vec<Vec<f64>> = points
        .iter()
        .map(|a| points.iter().map(|b| euclidean(a, b)).collect())
        .collect();

    let neighbours: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            let mut others: Vec<usize> = (0..n).filter(|&j| j != i).collect();
            others.sort_by(|&a, &b| {
                dist[i][a]
                    .partial_cmp(&dist[i][b])
                    .unwrap_or(Ordering::Equal)
                    .then(a.cmp(&b))
            });
            others.truncate(k);
            others
        })
        .collect();

    let k_distance: Vec<f64> = (0..n).map(|i| dist[i][neighbours[i][k - 1]]).collect();

    let lrd: Vec<f64> = (0..n)
        .map(|i| {
            let reach: f64 = neighbours[i]
                .iter()
                .map(|&o| k_distance[o].max(dist[i][o]))
                .sum::<f64>()
                / k as f64;
            1.0 / (reach + LRD_EPS)
        })
        .collect();

    (0..n)
        .map(|i| {
            let neighbour_lrd: f64 = neighbours[i].iter().map(|&o| lrd[o]).sum::<f64>() / k as f64;
            neighbour_lrd / lrd[i]
        })
        .collect()
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
}
