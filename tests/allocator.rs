use csv::ReaderBuilder;
use hrparity::allocator::{HrpAllocator, HrpError};
use hrparity::returns::ReturnSeries;
use nalgebra::DMatrix;
use std::path::Path;

fn load_prices_and_names() -> (DMatrix<f64>, Vec<String>) {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/crypto_prices.csv");
    let mut rdr = ReaderBuilder::new().has_headers(true).from_path(path).unwrap();
    let headers = rdr.headers().unwrap().clone();
    let names: Vec<String> = headers.iter().skip(1).map(|s| s.to_string()).collect();
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for rec in rdr.records() {
        let row = rec.unwrap();
        rows.push(row.iter().skip(1).map(|x| x.parse::<f64>().unwrap()).collect::<Vec<f64>>());
    }
    let nrows = rows.len();
    let ncols = rows[0].len();
    let flat = rows.into_iter().flatten().collect::<Vec<f64>>();
    (DMatrix::from_row_slice(nrows, ncols, &flat), names)
}

fn returns_from_prices(prices: &DMatrix<f64>) -> DMatrix<f64> {
    let mut out = DMatrix::zeros(prices.nrows() - 1, prices.ncols());
    for r in 1..prices.nrows() {
        for c in 0..prices.ncols() {
            out[(r - 1, c)] = prices[(r, c)] / prices[(r - 1, c)] - 1.0;
        }
    }
    out
}

fn assert_weights(weights: &[f64], n_assets: usize) {
    assert_eq!(weights.len(), n_assets);
    assert!(weights.iter().all(|w| *w >= 0.0));
    let sum: f64 = weights.iter().sum();
    assert!((sum - 1.0).abs() < 1e-9, "sum={sum}");
}

#[test]
fn test_allocate_from_prices() {
    let (prices, names) = load_prices_and_names();
    let mut hrp = HrpAllocator::new();
    hrp.allocate(&names, Some(&prices), None, None, None, false).unwrap();
    assert_weights(&hrp.weights, names.len());
    assert_eq!(hrp.merges.len(), names.len() - 1);
    assert_eq!(hrp.merges.last().unwrap().size, names.len());
}

#[test]
fn test_allocate_with_shrinkage() {
    let (prices, names) = load_prices_and_names();
    let mut hrp = HrpAllocator::new();
    hrp.allocate(&names, Some(&prices), None, None, None, true).unwrap();
    assert_weights(&hrp.weights, names.len());
}

#[test]
fn test_allocate_with_weekly_resampling() {
    let (prices, names) = load_prices_and_names();
    let mut hrp = HrpAllocator::new();
    hrp.allocate(&names, Some(&prices), None, None, Some("W"), false).unwrap();
    assert_weights(&hrp.weights, names.len());
}

#[test]
fn test_allocate_with_returns_input() {
    let (prices, names) = load_prices_and_names();
    let returns = returns_from_prices(&prices);
    let mut hrp = HrpAllocator::new();
    hrp.allocate(&names, None, Some(&returns), None, None, false).unwrap();
    assert_weights(&hrp.weights, names.len());
}

#[test]
fn test_allocate_with_covariance_input() {
    let cov = DMatrix::from_row_slice(
        3,
        3,
        &[0.04, 0.036, 0.0, 0.036, 0.04, 0.0, 0.0, 0.0, 0.04],
    );
    let names: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
    let mut hrp = HrpAllocator::new();
    hrp.allocate(&names, None, None, Some(&cov), None, false).unwrap();
    assert_weights(&hrp.weights, 3);
    // A and B cluster first and stay adjacent in the quasi-diagonal order
    assert_eq!(hrp.ordered_indices, vec![2, 0, 1]);
    assert!((hrp.weights[2] - 19.0 / 39.0).abs() < 1e-9);
    assert!((hrp.weights[0] - 10.0 / 39.0).abs() < 1e-9);
}

#[test]
fn test_perfectly_correlated_pair_splits_evenly() {
    let cov = DMatrix::from_row_slice(2, 2, &[0.04, 0.04, 0.04, 0.04]);
    let names: Vec<String> = ["A", "B"].iter().map(|s| s.to_string()).collect();
    let mut hrp = HrpAllocator::new();
    hrp.allocate(&names, None, None, Some(&cov), None, false).unwrap();
    assert!((hrp.weights[0] - 0.5).abs() < 1e-9);
    assert!((hrp.weights[1] - 0.5).abs() < 1e-9);
}

#[test]
fn test_allocation_is_idempotent() {
    let (prices, names) = load_prices_and_names();
    let mut a = HrpAllocator::new();
    let mut b = HrpAllocator::new();
    a.allocate(&names, Some(&prices), None, None, None, false).unwrap();
    b.allocate(&names, Some(&prices), None, None, None, false).unwrap();
    assert_eq!(a.weights, b.weights);
    assert_eq!(a.ordered_indices, b.ordered_indices);
}

#[test]
fn test_single_asset_short_circuits() {
    let names = vec!["BTCUSD".to_string()];
    let mut hrp = HrpAllocator::new();
    hrp.allocate(&names, None, None, None, None, false).unwrap();
    assert_eq!(hrp.weights, vec![1.0]);
    assert!(hrp.merges.is_empty());
    let map = hrp.weight_map(&names);
    assert_eq!(map.get("BTCUSD"), Some(&1.0));
}

#[test]
fn test_empty_universe_yields_empty_allocation() {
    let mut hrp = HrpAllocator::new();
    hrp.allocate(&[], None, None, None, None, false).unwrap();
    assert!(hrp.weights.is_empty());
}

#[test]
fn test_all_inputs_none_is_an_error() {
    let (_, names) = load_prices_and_names();
    let mut hrp = HrpAllocator::new();
    let err = hrp.allocate(&names, None, None, None, None, false).unwrap_err();
    assert_eq!(err, HrpError::NoData);
}

#[test]
fn test_dimension_mismatch_is_an_error() {
    let (prices, names) = load_prices_and_names();
    let bad_names = names[..names.len() - 1].to_vec();
    let mut hrp = HrpAllocator::new();
    let err = hrp.allocate(&bad_names, Some(&prices), None, None, None, false).unwrap_err();
    assert!(matches!(err, HrpError::DimensionMismatch(_)));
}

#[test]
fn test_constant_series_is_rejected() {
    let names: Vec<String> = ["A", "B"].iter().map(|s| s.to_string()).collect();
    let returns = DMatrix::from_row_slice(4, 2, &[0.01, 0.0, -0.02, 0.0, 0.01, 0.0, 0.0, 0.0]);
    let mut hrp = HrpAllocator::new();
    let err = hrp.allocate(&names, None, Some(&returns), None, None, false).unwrap_err();
    assert_eq!(err, HrpError::NonPositiveVariance { asset: 1 });
}

#[test]
fn test_failed_call_leaves_previous_allocation_intact() {
    let (prices, names) = load_prices_and_names();
    let mut hrp = HrpAllocator::new();
    hrp.allocate(&names, Some(&prices), None, None, None, false).unwrap();
    let before = hrp.weights.clone();
    let err = hrp.allocate(&names, None, None, None, None, false).unwrap_err();
    assert_eq!(err, HrpError::NoData);
    assert_eq!(hrp.weights, before);
}

#[test]
fn test_allocate_series() {
    let (prices, names) = load_prices_and_names();
    let series = ReturnSeries {
        dates: (1..prices.nrows())
            .map(|i| chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                + chrono::Duration::days(i as i64))
            .collect(),
        assets: names.clone(),
        values: returns_from_prices(&prices),
    };
    let mut hrp = HrpAllocator::new();
    hrp.allocate_series(&series).unwrap();
    assert_weights(&hrp.weights, names.len());
}

#[test]
fn test_target_allocations_apply_exposure_cap() {
    let (prices, names) = load_prices_and_names();
    let mut hrp = HrpAllocator::new();
    hrp.allocate(&names, Some(&prices), None, None, None, false).unwrap();
    let targets = hrp.target_allocations(&names, 0.9);
    let total: f64 = targets.values().sum();
    assert!((total - 0.9).abs() < 1e-9);
    for name in &names {
        assert!((targets[name] - 0.9 * hrp.weight_map(&names)[name]).abs() < 1e-12);
    }
}

#[test]
fn test_dendrogram_uses_merge_distances() {
    let (prices, names) = load_prices_and_names();
    let mut hrp = HrpAllocator::new();
    hrp.allocate(&names, Some(&prices), None, None, None, false).unwrap();
    let dendrogram = hrp.dendrogram(&names).unwrap();
    assert_eq!(dendrogram.icoord.len(), names.len() - 1);
    assert_eq!(dendrogram.ivl.len(), names.len());
    assert_eq!(dendrogram.leaves, hrp.ordered_indices);
    for (coords, merge) in dendrogram.dcoord.iter().zip(&hrp.merges) {
        assert_eq!(coords[1], merge.distance);
        assert_eq!(coords[2], merge.distance);
        assert!(coords[0] <= coords[1] + 1e-12);
        assert!(coords[3] <= coords[2] + 1e-12);
    }
}

#[test]
fn test_dendrogram_before_allocate_is_an_error() {
    let hrp = HrpAllocator::new();
    let err = hrp.dendrogram(&["A".to_string()]).unwrap_err();
    assert_eq!(err, HrpError::MissingClusters);
}
