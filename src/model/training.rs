use super::grid::HyperparameterGrid;
use super::svr::{Hyperparameters, SolverSettings, SupportVectorRegressor, SvrError, SvrModel};
use super::validation::{time_series_splits, FoldSplit, ValidationError};
use crate::features::{to_arrays, EncodedSample};
use ndarray::{s, Array1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("Solver error: {0}")]
    Solver(#[from] SvrError),
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Hyperparameter grid has no candidates")]
    EmptyGrid,
    #[error("Fold {fold} has only {train_len} training samples, need at least 2")]
    InsufficientData { fold: usize, train_len: usize },
}

pub type Result<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub grid: HyperparameterGrid,
    pub fold_count: usize,
    pub solver: SolverSettings,
    pub parallel: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            grid: HyperparameterGrid::default(),
            fold_count: 5,
            solver: SolverSettings::default(),
            parallel: true,
        }
    }
}

/// Cross-validation outcome for one grid point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateScore {
    pub hyperparameters: Hyperparameters,
    pub fold_mse: Vec<f64>,
    pub mean_mse: f64,
}

/// A model refit on the full sample set with the selected hyperparameters.
#[derive(Debug, Clone, Serialize)]
pub struct TrainedModel {
    model: SvrModel,
    hyperparameters: Hyperparameters,
    cv_rmse: f64,
    candidates: Vec<CandidateScore>,
}

impl TrainedModel {
    pub fn predict(&self, ordinal: i64) -> f64 {
        self.model.predict(ordinal as f64)
    }

    pub fn predict_samples(&self, samples: &[EncodedSample]) -> Array1<f64> {
        samples.iter().map(|s| self.predict(s.ordinal)).collect()
    }

    pub fn hyperparameters(&self) -> Hyperparameters {
        self.hyperparameters
    }

    /// Root of the best mean validation MSE found during the search.
    pub fn cv_rmse(&self) -> f64 {
        self.cv_rmse
    }

    pub fn candidates(&self) -> &[CandidateScore] {
        &self.candidates
    }
}

pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    /// Grid search over time-ordered folds, then refit on all samples.
    pub fn train(&self, samples: &[EncodedSample]) -> Result<TrainedModel> {
        let candidates = self.config.grid.points();
        if candidates.is_empty() {
            return Err(TrainingError::EmptyGrid);
        }
        self.config.grid.validate()?;

        let splits = time_series_splits(samples.len(), self.config.fold_count)?;
        if let Some((fold, split)) = splits
            .iter()
            .enumerate()
            .find(|(_, split)| split.train_len() < 2)
        {
            return Err(TrainingError::InsufficientData {
                fold,
                train_len: split.train_len(),
            });
        }

        info!(
            candidates = candidates.len(),
            folds = splits.len(),
            samples = samples.len(),
            "starting hyperparameter search"
        );

        let scores = self.score_candidates(samples, &candidates, &splits)?;
        let best = best_candidate(&scores)?;
        let chosen = scores[best].hyperparameters;
        let cv_rmse = scores[best].mean_mse.sqrt();

        info!(
            gamma = chosen.gamma,
            c = chosen.c,
            epsilon = chosen.epsilon,
            cv_rmse,
            "selected hyperparameters"
        );

        let (features, targets) = to_arrays(samples);
        let model = SupportVectorRegressor::new(chosen, self.config.solver)
            .fit(features.view(), targets.view())?;
        debug!(
            support_vectors = model.n_support(),
            iterations = model.iterations(),
            "refit on full sample set"
        );

        Ok(TrainedModel {
            model,
            hyperparameters: chosen,
            cv_rmse,
            candidates: scores,
        })
    }

    fn score_candidates(
        &self,
        samples: &[EncodedSample],
        candidates: &[Hyperparameters],
        splits: &[FoldSplit],
    ) -> Result<Vec<CandidateScore>> {
        let (features, targets) = to_arrays(samples);
        let jobs: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..splits.len()).map(move |f| (c, f)))
            .collect();

        let evaluate = |&(c, f): &(usize, usize)| -> std::result::Result<f64, SvrError> {
            let split = &splits[f];
            let train_x = features.slice(s![split.train.clone()]);
            let train_y = targets.slice(s![split.train.clone()]);
            let valid_x = features.slice(s![split.validation.clone()]);
            let valid_y = targets.slice(s![split.validation.clone()]);

            let model = SupportVectorRegressor::new(candidates[c], self.config.solver)
                .fit(train_x, train_y)?;
            let predicted = model.predict_batch(valid_x);
            let mse = (&predicted - &valid_y).mapv(|e| e * e).mean().unwrap_or(f64::NAN);
            Ok(mse)
        };

        // Collecting keeps job order, so the reduction below does not depend on scheduling
        let fold_errors: Vec<f64> = if self.config.parallel {
            jobs.par_iter().map(evaluate).collect::<std::result::Result<_, _>>()?
        } else {
            jobs.iter().map(evaluate).collect::<std::result::Result<_, _>>()?
        };

        let scores = fold_errors
            .chunks(splits.len())
            .zip(candidates.iter())
            .map(|(fold_mse, &hyperparameters)| {
                let mean_mse = fold_mse.iter().sum::<f64>() / fold_mse.len() as f64;
                debug!(
                    gamma = hyperparameters.gamma,
                    c = hyperparameters.c,
                    epsilon = hyperparameters.epsilon,
                    mean_mse,
                    "scored candidate"
                );
                CandidateScore {
                    hyperparameters,
                    fold_mse: fold_mse.to_vec(),
                    mean_mse,
                }
            })
            .collect();

        Ok(scores)
    }
}

/// Index of the lowest mean error; the earliest candidate wins ties and
/// non-finite scores never win.
pub fn select_best(scores: &[CandidateScore]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .filter(|(_, score)| score.mean_mse.is_finite())
        .fold(None, |best: Option<(usize, f64)>, (idx, score)| match best {
            Some((_, best_mse)) if best_mse <= score.mean_mse => best,
            _ => Some((idx, score.mean_mse)),
        })
        .map(|(idx, _)| idx)
}

fn best_candidate(scores: &[CandidateScore]) -> Result<usize> {
    select_best(scores).ok_or_else(|| {
        SvrError::Convergence {
            iterations: 0,
            reason: "no candidate produced a finite validation error".to_string(),
        }
        .into()
    })
}
