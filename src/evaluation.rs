use crate::features::{to_arrays, EncodedSample};
use crate::model::{Hyperparameters, TrainedModel};
use ndarray::ArrayView1;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("Shape mismatch: {predicted} predictions vs {actual} actual values")]
    Shape { predicted: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, EvaluationError>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub hyperparameters: Hyperparameters,
    /// Error of the refit model on the evaluated samples.
    pub rmse: f64,
    /// Cross-validated error of the chosen grid point.
    pub cv_rmse: f64,
    pub mae: f64,
}

fn check_shape(predicted: ArrayView1<f64>, actual: ArrayView1<f64>) -> Result<()> {
    if predicted.len() != actual.len() || predicted.is_empty() {
        return Err(EvaluationError::Shape {
            predicted: predicted.len(),
            actual: actual.len(),
        });
    }
    Ok(())
}

pub fn rmse(predicted: ArrayView1<f64>, actual: ArrayView1<f64>) -> Result<f64> {
    check_shape(predicted, actual)?;
    let mse = predicted
        .iter()
        .zip(actual.iter())
        .map(|(p, a)| (p - a).powi(2))
        .sum::<f64>()
        / predicted.len() as f64;
    Ok(mse.sqrt())
}

pub fn mae(predicted: ArrayView1<f64>, actual: ArrayView1<f64>) -> Result<f64> {
    check_shape(predicted, actual)?;
    let total = predicted
        .iter()
        .zip(actual.iter())
        .map(|(p, a)| (p - a).abs())
        .sum::<f64>();
    Ok(total / predicted.len() as f64)
}

/// Score a trained model against `samples`, typically the set it was fit on
/// or a held-out tail.
pub fn evaluate(model: &TrainedModel, samples: &[EncodedSample]) -> Result<EvaluationResult> {
    let (_, actual) = to_arrays(samples);
    let predicted = model.predict_samples(samples);

    Ok(EvaluationResult {
        hyperparameters: model.hyperparameters(),
        rmse: rmse(predicted.view(), actual.view())?,
        cv_rmse: model.cv_rmse(),
        mae: mae(predicted.view(), actual.view())?,
    })
}
