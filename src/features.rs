use crate::data::ObservedSeries;
use chrono::{Days, NaiveDate};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EncodedSample {
    pub ordinal: i64,
    pub target: f64,
}

/// Observations mapped onto a day-offset axis anchored at `base_date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedSeries {
    pub base_date: NaiveDate,
    pub samples: Vec<EncodedSample>,
}

impl EncodedSeries {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last_ordinal(&self) -> i64 {
        self.samples.last().map(|s| s.ordinal).unwrap_or(0)
    }

    pub fn date_for_ordinal(&self, ordinal: i64) -> Option<NaiveDate> {
        date_for_ordinal(self.base_date, ordinal)
    }

    pub fn ordinal_for_date(&self, date: NaiveDate) -> i64 {
        ordinal_for_date(self.base_date, date)
    }
}

pub fn encode(series: &ObservedSeries) -> EncodedSeries {
    let base_date = series.first_date();
    let samples = series
        .iter()
        .map(|point| EncodedSample {
            ordinal: ordinal_for_date(base_date, point.date),
            target: point.price,
        })
        .collect();

    EncodedSeries { base_date, samples }
}

pub fn ordinal_for_date(base_date: NaiveDate, date: NaiveDate) -> i64 {
    (date - base_date).num_days()
}

/// `None` when the offset lands outside the calendar chrono can represent.
pub fn date_for_ordinal(base_date: NaiveDate, ordinal: i64) -> Option<NaiveDate> {
    let days = Days::new(ordinal.unsigned_abs());
    if ordinal >= 0 {
        base_date.checked_add_days(days)
    } else {
        base_date.checked_sub_days(days)
    }
}

/// Split encoded samples into feature and target vectors.
pub fn to_arrays(samples: &[EncodedSample]) -> (Array1<f64>, Array1<f64>) {
    let features = samples.iter().map(|s| s.ordinal as f64).collect();
    let targets = samples.iter().map(|s| s.target).collect();
    (features, targets)
}
