use serde::Serialize;
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Fold count must be at least 2, got {0}")]
    InvalidFoldCount(usize),
    #[error("Insufficient data for {folds} folds: need at least {required} samples, got {got}")]
    InsufficientData {
        folds: usize,
        required: usize,
        got: usize,
    },
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// An expanding-window split: everything before `validation.start` trains,
/// the following block validates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FoldSplit {
    pub train: Range<usize>,
    pub validation: Range<usize>,
}

impl FoldSplit {
    pub fn train_len(&self) -> usize {
        self.train.len()
    }
}

/// Time-ordered cross-validation splits over `n_samples` observations.
///
/// The series is cut into `folds + 1` equal blocks (the remainder goes to the
/// first training window). Fold `i` validates on block `i + 1` and trains on
/// every sample before it, so no fold ever sees the future.
pub fn time_series_splits(n_samples: usize, folds: usize) -> Result<Vec<FoldSplit>> {
    if folds < 2 {
        return Err(ValidationError::InvalidFoldCount(folds));
    }

    let test_size = n_samples / (folds + 1);
    if test_size == 0 {
        return Err(ValidationError::InsufficientData {
            folds,
            required: folds + 1,
            got: n_samples,
        });
    }

    let first_test_start = n_samples - folds * test_size;
    let splits = (0..folds)
        .map(|i| {
            let start = first_test_start + i * test_size;
            FoldSplit {
                train: 0..start,
                validation: start..start + test_size,
            }
        })
        .collect();

    Ok(splits)
}
