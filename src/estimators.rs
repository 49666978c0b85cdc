use nalgebra::DMatrix;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum EstimatorError {
    InsufficientObservations { observations: usize },
    NonPositiveVariance { asset: usize },
    NonSquare { rows: usize, cols: usize },
}

impl fmt::Display for EstimatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimatorError::InsufficientObservations { observations } => {
                write!(f, "need at least 2 return observations, got {observations}")
            }
            EstimatorError::NonPositiveVariance { asset } => {
                write!(f, "asset {asset} has non-positive sample variance")
            }
            EstimatorError::NonSquare { rows, cols } => {
                write!(f, "covariance matrix must be square, got {rows}x{cols}")
            }
        }
    }
}

impl std::error::Error for EstimatorError {}

/// Unbiased (n-1) sample covariance of a column-per-asset return matrix.
pub fn covariance(returns: &DMatrix<f64>) -> Result<DMatrix<f64>, EstimatorError> {
    let rows = returns.nrows();
    if rows < 2 {
        return Err(EstimatorError::InsufficientObservations { observations: rows });
    }
    let cols = returns.ncols();
    let means: Vec<f64> = (0..cols).map(|c| returns.column(c).sum() / rows as f64).collect();
    let mut cov = DMatrix::zeros(cols, cols);
    for i in 0..cols {
        for j in i..cols {
            let mut s = 0.0;
            for r in 0..rows {
                s += (returns[(r, i)] - means[i]) * (returns[(r, j)] - means[j]);
            }
            s /= (rows - 1) as f64;
            cov[(i, j)] = s;
            cov[(j, i)] = s;
        }
    }
    Ok(cov)
}

/// Correlation matrix from a covariance matrix.
///
/// A non-positive diagonal variance means the underlying series carried no
/// information (constant returns or a degenerate estimate) and is rejected so
/// the caller can skip the rebalance.
pub fn cov_to_corr(cov: &DMatrix<f64>) -> Result<DMatrix<f64>, EstimatorError> {
    let n = cov.nrows();
    if cov.ncols() != n {
        return Err(EstimatorError::NonSquare { rows: n, cols: cov.ncols() });
    }
    let mut std = vec![0.0; n];
    for i in 0..n {
        let v = cov[(i, i)];
        if v <= 0.0 {
            return Err(EstimatorError::NonPositiveVariance { asset: i });
        }
        std[i] = v.sqrt();
    }
    let mut corr = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            corr[(i, j)] = cov[(i, j)] / (std[i] * std[j]);
        }
    }
    Ok(corr)
}

/// Shrinks off-diagonal covariance entries toward zero by factor `alpha`.
///
/// Crude linear shrinkage; enough to tame noisy finite-sample estimates
/// before clustering without a full shrinkage-target model.
pub fn shrink_covariance(cov: &DMatrix<f64>, alpha: f64) -> DMatrix<f64> {
    let a = alpha.clamp(0.0, 1.0);
    let n = cov.nrows();
    let mut out = cov.clone_owned();
    for i in 0..n {
        for j in 0..n {
            if i != j {
                out[(i, j)] *= 1.0 - a;
            }
        }
    }
    out
}
