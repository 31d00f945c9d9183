use crate::features::date_for_ordinal;
use crate::model::TrainedModel;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Forecast horizon must be positive, got {0}")]
    InvalidHorizon(i64),
    #[error("Forecast horizon of {horizon} days runs past the last representable date")]
    OutOfRange { horizon: i64 },
}

pub type Result<T> = std::result::Result<T, ForecastError>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub ordinal: i64,
    pub predicted_price: f64,
}

/// Project the model over the `horizon` days following `last_ordinal`.
///
/// Predictions are returned exactly as the model produces them. Negative or
/// jumpy values are left for the caller to handle.
pub fn forecast(
    model: &TrainedModel,
    base_date: NaiveDate,
    last_ordinal: i64,
    horizon: i64,
) -> Result<Vec<ForecastPoint>> {
    if horizon <= 0 {
        return Err(ForecastError::InvalidHorizon(horizon));
    }

    // Checking the final day first rejects the whole horizon before any prediction
    let out_of_range = || ForecastError::OutOfRange { horizon };
    let end = last_ordinal.checked_add(horizon).ok_or_else(out_of_range)?;
    date_for_ordinal(base_date, end).ok_or_else(out_of_range)?;

    (last_ordinal + 1..=end)
        .map(|ordinal| -> Result<ForecastPoint> {
            let date = date_for_ordinal(base_date, ordinal).ok_or_else(out_of_range)?;
            Ok(ForecastPoint {
                date,
                ordinal,
                predicted_price: model.predict(ordinal),
            })
        })
        .collect()
}
