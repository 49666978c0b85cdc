use nalgebra::DMatrix;

/// Maps a correlation matrix onto the metric `d(i, j) = sqrt((1 - corr) / 2)`.
///
/// Correlations are clamped to [-1, 1] first so that finite-sample estimates
/// sitting marginally outside the bound cannot produce a NaN distance. The
/// result is symmetric with a zero diagonal and values in [0, 1].
pub fn correlation_distance(corr: &DMatrix<f64>) -> DMatrix<f64> {
    let n = corr.nrows();
    let mut d = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            let c = corr[(i, j)].clamp(-1.0, 1.0);
            d[(i, j)] = ((1.0 - c).max(0.0) / 2.0).sqrt();
        }
    }
    d
}

/// Permutes the rows and columns of a square matrix by `order`.
///
/// Applied with the quasi-diagonal leaf order this moves correlated assets
/// next to each other, so cluster blocks line up along the diagonal.
pub fn seriate(mat: &DMatrix<f64>, order: &[usize]) -> DMatrix<f64> {
    let n = order.len();
    let mut out = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            out[(i, j)] = mat[(order[i], order[j])];
        }
    }
    out
}
