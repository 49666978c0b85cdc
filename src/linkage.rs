use itertools::Itertools;
use nalgebra::DMatrix;
use std::fmt;

/// One agglomeration step. `left` and `right` are cluster ids: ids below the
/// asset count refer to original assets, ids at or above it refer to the
/// merge that formed the cluster (`id - n_assets` indexes the merge list).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkageError {
    TooFewAssets { n_assets: usize },
    NonSquare { rows: usize, cols: usize },
}

impl fmt::Display for LinkageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkageError::TooFewAssets { n_assets } => {
                write!(f, "single linkage needs at least 2 assets, got {n_assets}")
            }
            LinkageError::NonSquare { rows, cols } => {
                write!(f, "distance matrix must be square, got {rows}x{cols}")
            }
        }
    }
}

impl std::error::Error for LinkageError {}

#[derive(Clone)]
struct Cluster {
    id: usize,
    members: Vec<usize>,
}

/// Single-linkage agglomerative clustering over a distance matrix.
///
/// Produces exactly `n - 1` merges; the last one contains every asset. At each
/// step the two clusters with the smallest minimum pairwise member distance
/// merge. Ties within a 1e-12 band go to the pair with the lexicographically
/// smallest `(min_id, max_id)`, which keeps the output deterministic for
/// identical input.
pub fn single_linkage(distance: &DMatrix<f64>) -> Result<Vec<Merge>, LinkageError> {
    let n = distance.nrows();
    if distance.ncols() != n {
        return Err(LinkageError::NonSquare { rows: n, cols: distance.ncols() });
    }
    if n < 2 {
        return Err(LinkageError::TooFewAssets { n_assets: n });
    }

    let mut clusters: Vec<Cluster> = (0..n).map(|i| Cluster { id: i, members: vec![i] }).collect();
    let mut next_id = n;
    let mut merges = Vec::with_capacity(n - 1);
    let eps = 1e-12;

    while clusters.len() > 1 {
        let mut best: Option<(usize, usize, f64, (usize, usize))> = None;
        for (i, j) in (0..clusters.len()).tuple_combinations() {
            let mut d = f64::INFINITY;
            for &a in &clusters[i].members {
                for &b in &clusters[j].members {
                    d = d.min(distance[(a, b)]);
                }
            }
            let ids = (
                clusters[i].id.min(clusters[j].id),
                clusters[i].id.max(clusters[j].id),
            );
            let better = match best {
                None => true,
                Some((_, _, bd, bids)) => d + eps < bd || ((d - bd).abs() <= eps && ids < bids),
            };
            if better {
                best = Some((i, j, d, ids));
            }
        }
        // clusters.len() > 1, so a best pair always exists
        let (i, j, d, (left_id, right_id)) = best.ok_or(LinkageError::TooFewAssets { n_assets: n })?;
        let (lo, hi) = if i < j { (i, j) } else { (j, i) };
        let second = clusters.remove(hi);
        let first = clusters.remove(lo);
        let mut members = first.members;
        members.extend(second.members);
        merges.push(Merge { left: left_id, right: right_id, distance: d, size: members.len() });
        clusters.push(Cluster { id: next_id, members });
        next_id += 1;
    }
    Ok(merges)
}
