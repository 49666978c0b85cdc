use chrono::{Duration, NaiveDate};
use nalgebra::DMatrix;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ReturnsError {
    TooFewRows { rows: usize },
    NonPositivePrice { row: usize, asset: usize },
    DateCountMismatch { rows: usize, dates: usize },
    AssetCountMismatch { cols: usize, assets: usize },
}

impl fmt::Display for ReturnsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnsError::TooFewRows { rows } => {
                write!(f, "need at least 2 price rows to difference, got {rows}")
            }
            ReturnsError::NonPositivePrice { row, asset } => {
                write!(f, "non-positive close at row {row} for asset {asset}")
            }
            ReturnsError::DateCountMismatch { rows, dates } => {
                write!(f, "{rows} price rows but {dates} dates")
            }
            ReturnsError::AssetCountMismatch { cols, assets } => {
                write!(f, "{cols} price columns but {assets} asset names")
            }
        }
    }
}

impl std::error::Error for ReturnsError {}

/// Lookback window for an allocation call, either a bar count or a calendar
/// span ending at the most recent observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookback {
    Periods(usize),
    Days(i64),
}

/// Aligned daily close prices, one column per asset. Missing observations are
/// represented as NaN cells; they survive until return rows are built and are
/// dropped there.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceHistory {
    pub dates: Vec<NaiveDate>,
    pub assets: Vec<String>,
    pub closes: DMatrix<f64>,
}

impl PriceHistory {
    pub fn new(
        dates: Vec<NaiveDate>,
        assets: Vec<String>,
        closes: DMatrix<f64>,
    ) -> Result<Self, ReturnsError> {
        if dates.len() != closes.nrows() {
            return Err(ReturnsError::DateCountMismatch {
                rows: closes.nrows(),
                dates: dates.len(),
            });
        }
        if assets.len() != closes.ncols() {
            return Err(ReturnsError::AssetCountMismatch {
                cols: closes.ncols(),
                assets: assets.len(),
            });
        }
        Ok(Self { dates, assets, closes })
    }

    /// Keeps the most recent window of rows.
    pub fn truncate(&self, lookback: Lookback) -> PriceHistory {
        let keep_from = match lookback {
            Lookback::Periods(n) => self.dates.len().saturating_sub(n),
            Lookback::Days(days) => match self.dates.last() {
                Some(&end) => {
                    let cutoff = end - Duration::days(days);
                    self.dates.iter().position(|d| *d > cutoff).unwrap_or(self.dates.len())
                }
                None => 0,
            },
        };
        PriceHistory {
            dates: self.dates[keep_from..].to_vec(),
            assets: self.assets.clone(),
            closes: self.closes.rows(keep_from, self.dates.len() - keep_from).into_owned(),
        }
    }

    /// Downsamples daily rows to the requested frequency, keeping the last
    /// bar of each step window.
    pub fn resample(&self, resample_by: Option<&str>) -> PriceHistory {
        let step = freq_step(resample_by);
        if step <= 1 {
            return self.clone();
        }
        let kept: Vec<usize> = (step - 1..self.closes.nrows()).step_by(step).collect();
        if kept.is_empty() {
            return self.clone();
        }
        let mut flat = Vec::with_capacity(kept.len() * self.closes.ncols());
        for &r in &kept {
            for c in 0..self.closes.ncols() {
                flat.push(self.closes[(r, c)]);
            }
        }
        PriceHistory {
            dates: kept.iter().map(|&r| self.dates[r]).collect(),
            assets: self.assets.clone(),
            closes: DMatrix::from_row_slice(kept.len(), self.closes.ncols(), &flat),
        }
    }

    /// Simple fractional returns, with rows carrying any missing observation
    /// dropped afterwards. Each return row is stamped with the later of the
    /// two dates it spans.
    pub fn to_returns(&self) -> Result<ReturnSeries, ReturnsError> {
        let values = returns_from_prices(&self.closes)?;
        let series = ReturnSeries {
            dates: self.dates[1..].to_vec(),
            assets: self.assets.clone(),
            values,
        };
        Ok(series.drop_incomplete_rows())
    }
}

/// Aligned daily fractional returns, one column per asset.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    pub dates: Vec<NaiveDate>,
    pub assets: Vec<String>,
    pub values: DMatrix<f64>,
}

impl ReturnSeries {
    pub fn observations(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_assets(&self) -> usize {
        self.values.ncols()
    }

    /// Drops every row in which any asset is missing (NaN), keeping the time
    /// index aligned across all assets.
    pub fn drop_incomplete_rows(self) -> ReturnSeries {
        let complete: Vec<usize> = (0..self.values.nrows())
            .filter(|&r| (0..self.values.ncols()).all(|c| self.values[(r, c)].is_finite()))
            .collect();
        if complete.len() == self.values.nrows() {
            return self;
        }
        let cols = self.values.ncols();
        let mut flat = Vec::with_capacity(complete.len() * cols);
        for &r in &complete {
            for c in 0..cols {
                flat.push(self.values[(r, c)]);
            }
        }
        ReturnSeries {
            dates: complete.iter().map(|&r| self.dates[r]).collect(),
            assets: self.assets,
            values: DMatrix::from_row_slice(complete.len(), cols, &flat),
        }
    }
}

/// Resample step in daily bars for a pandas-style frequency string.
pub fn freq_step(resample_by: Option<&str>) -> usize {
    resample_by
        .map(|f| f.to_ascii_lowercase())
        .as_deref()
        .map(|freq| match freq {
            "w" | "week" | "weekly" => 5,
            "m" | "month" | "monthly" => 21,
            "b" | "d" | "day" | "daily" => 1,
            _ => 1,
        })
        .unwrap_or(1)
}

/// Row-over-row fractional returns from a close-price matrix. NaN closes pass
/// through as NaN returns; a zero or negative close is rejected.
pub fn returns_from_prices(prices: &DMatrix<f64>) -> Result<DMatrix<f64>, ReturnsError> {
    if prices.nrows() < 2 {
        return Err(ReturnsError::TooFewRows { rows: prices.nrows() });
    }
    let mut out = DMatrix::zeros(prices.nrows() - 1, prices.ncols());
    for r in 1..prices.nrows() {
        for c in 0..prices.ncols() {
            let prev = prices[(r - 1, c)];
            if prev <= 0.0 {
                return Err(ReturnsError::NonPositivePrice { row: r - 1, asset: c });
            }
            out[(r - 1, c)] = prices[(r, c)] / prev - 1.0;
        }
    }
    Ok(out)
}
