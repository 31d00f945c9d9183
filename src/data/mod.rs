pub mod loader;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Missing required column: {column}")]
    Schema { column: String },
    #[error("Row {row}: cannot parse {field} value {value:?}: {reason}")]
    Parse {
        row: usize,
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("Row {row}: date {date} appears more than once with different prices")]
    Ordering { row: usize, date: NaiveDate },
    #[error("Insufficient data: need at least {required} rows, got {got}")]
    InsufficientData { required: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, DataError>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservedPoint {
    pub date: NaiveDate,
    pub price: f64,
}

impl ObservedPoint {
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self { date, price }
    }
}

/// A validated price history: ascending by date, one price per date, and long
/// enough to be split into the configured number of cross-validation folds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservedSeries {
    points: Vec<ObservedPoint>,
}

impl ObservedSeries {
    /// Validate and normalise a set of points.
    ///
    /// Rows are sorted by date. Exact duplicate rows collapse into one; the
    /// same date carrying two different prices is an ordering error. Row
    /// indices in errors refer to positions in `points` as given.
    pub fn new(points: Vec<ObservedPoint>, fold_count: usize) -> Result<Self> {
        let rows: Vec<(usize, ObservedPoint)> = points.into_iter().enumerate().collect();
        Self::from_rows(rows, fold_count)
    }

    pub(crate) fn from_rows(mut rows: Vec<(usize, ObservedPoint)>, fold_count: usize) -> Result<Self> {
        for (row, point) in &rows {
            validate_price(*row, point.price)?;
        }

        // Stable sort keeps input order among equal dates for error reporting
        rows.sort_by_key(|(_, point)| point.date);

        let mut points: Vec<ObservedPoint> = Vec::with_capacity(rows.len());
        for (row, point) in rows {
            match points.last() {
                Some(last) if last.date == point.date => {
                    if last.price != point.price {
                        return Err(DataError::Ordering {
                            row,
                            date: point.date,
                        });
                    }
                }
                _ => points.push(point),
            }
        }

        let required = fold_count + 1;
        if points.len() < required {
            return Err(DataError::InsufficientData {
                required,
                got: points.len(),
            });
        }

        Ok(Self { points })
    }

    pub fn points(&self) -> &[ObservedPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ObservedPoint> {
        self.points.iter()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.points[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.points[self.points.len() - 1].date
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    /// The most recent `n` observations, oldest first.
    pub fn tail(&self, n: usize) -> &[ObservedPoint] {
        let start = self.points.len().saturating_sub(n);
        &self.points[start..]
    }
}

fn validate_price(row: usize, price: f64) -> Result<()> {
    if !price.is_finite() {
        return Err(DataError::Parse {
            row,
            field: "price",
            value: price.to_string(),
            reason: "price must be finite".to_string(),
        });
    }
    if price <= 0.0 {
        return Err(DataError::Parse {
            row,
            field: "price",
            value: price.to_string(),
            reason: "price must be positive".to_string(),
        });
    }
    Ok(())
}
