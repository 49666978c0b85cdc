use nalgebra::DMatrix;

/// Inverse-variance portfolio weights within one cluster, using diagonal
/// variances only. Covariance terms are deliberately ignored here; this is
/// the cheap stand-in for minimum variance inside a small cluster.
///
/// A non-positive variance is the limit case of an infinite inverse weight:
/// the riskless members take the whole cluster, split equally among them, so
/// the computation stays finite without a division by zero.
pub fn inverse_variance_weights(cov: &DMatrix<f64>, indices: &[usize]) -> Vec<f64> {
    let vars: Vec<f64> = indices.iter().map(|&i| cov[(i, i)]).collect();
    let riskless = vars.iter().filter(|&&v| v <= 0.0).count();
    if riskless > 0 {
        let w = 1.0 / riskless as f64;
        return vars.iter().map(|&v| if v <= 0.0 { w } else { 0.0 }).collect();
    }
    let inv: Vec<f64> = vars.iter().map(|&v| 1.0 / v).collect();
    let sum: f64 = inv.iter().sum();
    inv.into_iter().map(|x| x / sum).collect()
}

/// Scalar variance of a cluster: `w' Σ w` with inverse-variance weights over
/// the sub-covariance restricted to `indices`. Clamped at zero in case a
/// non-positive-semidefinite sample estimate pushes the quadratic form
/// slightly negative.
pub fn cluster_variance(cov: &DMatrix<f64>, indices: &[usize]) -> f64 {
    let w = inverse_variance_weights(cov, indices);
    let mut v = 0.0;
    for (ii, &i) in indices.iter().enumerate() {
        for (jj, &j) in indices.iter().enumerate() {
            v += w[ii] * cov[(i, j)] * w[jj];
        }
    }
    v.max(0.0)
}

/// Top-down recursive bisection over the quasi-diagonal asset order.
///
/// Every group larger than one splits into contiguous halves (floor/ceil for
/// odd sizes). Adjacent halves share a parent; capital flows to the half with
/// the lower cluster variance via `alpha = 1 - v1 / (v1 + v2)`. When both
/// halves carry zero variance the ratio is undefined and the split falls back
/// to 50/50. Weights are normalized to sum to one at the end, which also
/// absorbs floating-point drift accumulated over the splits.
pub fn recursive_bisection(cov: &DMatrix<f64>, order: &[usize]) -> Vec<f64> {
    let n = cov.nrows();
    let mut weights = vec![1.0; n];
    let mut groups = vec![order.to_vec()];
    while !groups.is_empty() {
        let mut halves = Vec::new();
        for group in groups {
            if group.len() > 1 {
                let mid = group.len() / 2;
                halves.push(group[..mid].to_vec());
                halves.push(group[mid..].to_vec());
            }
        }
        if halves.is_empty() {
            break;
        }
        for pair in halves.chunks_exact(2) {
            let (left, right) = (&pair[0], &pair[1]);
            let lv = cluster_variance(cov, left);
            let rv = cluster_variance(cov, right);
            let alpha = if lv + rv > 0.0 { 1.0 - lv / (lv + rv) } else { 0.5 };
            for &idx in left {
                weights[idx] *= alpha;
            }
            for &idx in right {
                weights[idx] *= 1.0 - alpha;
            }
        }
        groups = halves;
    }
    let sum: f64 = weights.iter().sum();
    if sum > 0.0 {
        for w in &mut weights {
            *w /= sum;
        }
    }
    weights
}
