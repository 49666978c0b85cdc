use nalgebra::DMatrix;
use std::collections::HashMap;
use std::fmt;

use crate::bisection::recursive_bisection;
use crate::distance::{correlation_distance, seriate};
use crate::estimators::{cov_to_corr, covariance, shrink_covariance, EstimatorError};
use crate::linkage::{single_linkage, LinkageError, Merge};
use crate::quasi_diag::quasi_diagonal_order;
use crate::returns::{freq_step, returns_from_prices, ReturnSeries, ReturnsError};

#[derive(Debug, Clone, PartialEq)]
pub enum HrpError {
    /// No prices, returns, or covariance matrix were supplied.
    NoData,
    DimensionMismatch(&'static str),
    /// Too few observations for a stable covariance estimate. Recoverable:
    /// the caller should skip this rebalance cycle and keep prior weights.
    InsufficientHistory { observations: usize },
    /// A sample variance came out non-positive (constant or degenerate
    /// series); treated the same way as insufficient history.
    NonPositiveVariance { asset: usize },
    MissingClusters,
}

impl fmt::Display for HrpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HrpError::NoData => write!(f, "no price, return, or covariance input supplied"),
            HrpError::DimensionMismatch(what) => write!(f, "dimension mismatch: {what}"),
            HrpError::InsufficientHistory { observations } => {
                write!(f, "insufficient history: {observations} observations")
            }
            HrpError::NonPositiveVariance { asset } => {
                write!(f, "non-positive variance for asset {asset}")
            }
            HrpError::MissingClusters => {
                write!(f, "no clusters available; run allocate first")
            }
        }
    }
}

impl std::error::Error for HrpError {}

impl From<EstimatorError> for HrpError {
    fn from(err: EstimatorError) -> Self {
        match err {
            EstimatorError::InsufficientObservations { observations } => {
                HrpError::InsufficientHistory { observations }
            }
            EstimatorError::NonPositiveVariance { asset } => {
                HrpError::NonPositiveVariance { asset }
            }
            EstimatorError::NonSquare { .. } => {
                HrpError::DimensionMismatch("covariance matrix must be square")
            }
        }
    }
}

/// Dendrogram plotting coordinates in the four-point-per-merge format most
/// plotting frontends expect: for merge `k`, `icoord[k]` holds the x
/// positions of the bracket and `dcoord[k]` its heights (child height, merge
/// distance, merge distance, child height).
#[derive(Debug, Clone)]
pub struct HrpDendrogram {
    pub icoord: Vec<[f64; 4]>,
    pub dcoord: Vec<[f64; 4]>,
    pub ivl: Vec<String>,
    pub leaves: Vec<usize>,
    pub color_list: Vec<String>,
}

/// Hierarchical Risk Parity allocator.
///
/// One `allocate` call runs the whole pipeline on a snapshot of inputs:
/// correlation distances, single-linkage clustering, quasi-diagonal ordering,
/// recursive bisection. All intermediate products of the last successful call
/// are kept on the struct for inspection; a failed call leaves the previous
/// results untouched.
#[derive(Debug, Clone, Default)]
pub struct HrpAllocator {
    pub weights: Vec<f64>,
    pub ordered_indices: Vec<usize>,
    pub merges: Vec<Merge>,
    pub seriated_correlations: Option<DMatrix<f64>>,
    pub seriated_distances: Option<DMatrix<f64>>,
}

impl HrpAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates over `asset_names` from whichever input is supplied: close
    /// prices (optionally resampled before differencing), a return matrix,
    /// or a precomputed covariance matrix.
    ///
    /// Universes smaller than two assets short-circuit without clustering:
    /// zero assets yield an empty allocation, one asset gets weight 1.0.
    pub fn allocate(
        &mut self,
        asset_names: &[String],
        asset_prices: Option<&DMatrix<f64>>,
        asset_returns: Option<&DMatrix<f64>>,
        covariance_matrix: Option<&DMatrix<f64>>,
        resample_by: Option<&str>,
        use_shrinkage: bool,
    ) -> Result<(), HrpError> {
        let n_assets = asset_names.len();
        if n_assets < 2 {
            self.weights = vec![1.0; n_assets];
            self.ordered_indices = (0..n_assets).collect();
            self.merges = Vec::new();
            self.seriated_correlations = None;
            self.seriated_distances = None;
            return Ok(());
        }
        if asset_prices.is_none() && asset_returns.is_none() && covariance_matrix.is_none() {
            return Err(HrpError::NoData);
        }

        let covariance_owned = if let Some(cov) = covariance_matrix {
            cov.clone_owned()
        } else {
            let returns_owned = if let Some(r) = asset_returns {
                if r.ncols() != n_assets {
                    return Err(HrpError::DimensionMismatch(
                        "asset_returns columns != asset_names length",
                    ));
                }
                r.clone_owned()
            } else {
                let prices = asset_prices.ok_or(HrpError::NoData)?;
                if prices.ncols() != n_assets {
                    return Err(HrpError::DimensionMismatch(
                        "asset_prices columns != asset_names length",
                    ));
                }
                let sampled = resample_rows(prices, freq_step(resample_by));
                returns_from_prices(&sampled).map_err(price_error)?
            };
            let raw = covariance(&returns_owned)?;
            if use_shrinkage {
                shrink_covariance(&raw, 0.1)
            } else {
                raw
            }
        };

        if covariance_owned.nrows() != n_assets || covariance_owned.ncols() != n_assets {
            return Err(HrpError::DimensionMismatch(
                "covariance matrix dimensions must equal number of assets",
            ));
        }

        let corr = cov_to_corr(&covariance_owned)?;
        let distances = correlation_distance(&corr);
        let merges = single_linkage(&distances).map_err(|err| match err {
            LinkageError::TooFewAssets { .. } | LinkageError::NonSquare { .. } => {
                HrpError::DimensionMismatch("distance matrix shape invalid for linkage")
            }
        })?;
        let ordered = quasi_diagonal_order(n_assets, &merges);
        let weights = recursive_bisection(&covariance_owned, &ordered);

        self.seriated_distances = Some(seriate(&distances, &ordered));
        self.seriated_correlations = Some(seriate(&corr, &ordered));
        self.merges = merges;
        self.ordered_indices = ordered;
        self.weights = weights;
        Ok(())
    }

    /// Allocates from an aligned [`ReturnSeries`], the usual entry point when
    /// the caller has already prepared lookback-trimmed return data.
    pub fn allocate_series(&mut self, series: &ReturnSeries) -> Result<(), HrpError> {
        if series.n_assets() >= 2 && series.observations() < 2 {
            return Err(HrpError::InsufficientHistory { observations: series.observations() });
        }
        self.allocate(&series.assets, None, Some(&series.values), None, None, false)
    }

    /// Weights keyed by asset name, in caller-supplied column order.
    pub fn weight_map(&self, asset_names: &[String]) -> HashMap<String, f64> {
        asset_names.iter().cloned().zip(self.weights.iter().copied()).collect()
    }

    /// Weights scaled by a capital exposure factor in [0, 1], e.g. 0.9 to
    /// keep a 10% cash buffer. These are the target percentages handed to an
    /// execution layer.
    pub fn target_allocations(&self, asset_names: &[String], exposure: f64) -> HashMap<String, f64> {
        let e = exposure.clamp(0.0, 1.0);
        asset_names.iter().cloned().zip(self.weights.iter().map(|w| w * e)).collect()
    }

    /// Plotting coordinates for the fitted dendrogram, with bracket heights
    /// taken from the recorded merge distances.
    pub fn dendrogram(&self, assets: &[String]) -> Result<HrpDendrogram, HrpError> {
        if self.merges.is_empty() || self.ordered_indices.is_empty() {
            return Err(HrpError::MissingClusters);
        }
        let n_assets = self.ordered_indices.len();
        let mut leaf_x = vec![0.0; n_assets];
        for (pos, &asset) in self.ordered_indices.iter().enumerate() {
            leaf_x[asset] = 5.0 + 10.0 * pos as f64;
        }

        // (center x, height) per cluster id as merges stack up
        let coord = |id: usize, merged: &[(f64, f64)]| -> (f64, f64) {
            if id < n_assets {
                (leaf_x[id], 0.0)
            } else {
                merged[id - n_assets]
            }
        };
        let mut merged: Vec<(f64, f64)> = Vec::with_capacity(self.merges.len());
        let mut icoord = Vec::with_capacity(self.merges.len());
        let mut dcoord = Vec::with_capacity(self.merges.len());
        let mut color_list = Vec::with_capacity(self.merges.len());
        for merge in &self.merges {
            let (xl, hl) = coord(merge.left, &merged);
            let (xr, hr) = coord(merge.right, &merged);
            icoord.push([xl, xl, xr, xr]);
            dcoord.push([hl, merge.distance, merge.distance, hr]);
            color_list.push("C0".to_string());
            merged.push(((xl + xr) / 2.0, merge.distance));
        }
        let leaves = self.ordered_indices.clone();
        let ivl = leaves.iter().map(|i| assets[*i].clone()).collect();
        Ok(HrpDendrogram { icoord, dcoord, ivl, leaves, color_list })
    }
}

fn resample_rows(prices: &DMatrix<f64>, step: usize) -> DMatrix<f64> {
    if step <= 1 {
        return prices.clone_owned();
    }
    let kept: Vec<usize> = (step - 1..prices.nrows()).step_by(step).collect();
    if kept.is_empty() {
        return prices.clone_owned();
    }
    let mut flat = Vec::with_capacity(kept.len() * prices.ncols());
    for &r in &kept {
        for c in 0..prices.ncols() {
            flat.push(prices[(r, c)]);
        }
    }
    DMatrix::from_row_slice(kept.len(), prices.ncols(), &flat)
}

fn price_error(err: ReturnsError) -> HrpError {
    match err {
        ReturnsError::TooFewRows { rows } => HrpError::InsufficientHistory { observations: rows },
        ReturnsError::NonPositivePrice { .. } => HrpError::NoData,
        ReturnsError::DateCountMismatch { .. } | ReturnsError::AssetCountMismatch { .. } => {
            HrpError::DimensionMismatch("price history shape invalid")
        }
    }
}
