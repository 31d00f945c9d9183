use crate::config::{Config, ConfigError};
use crate::data::loader::SeriesLoader;
use crate::data::{DataError, ObservedSeries};
use crate::evaluation::{self, EvaluationError, EvaluationResult};
use crate::features;
use crate::forecast::{self, ForecastError, ForecastPoint};
use crate::model::svr::SvrError;
use crate::model::training::TrainingError;
use crate::model::validation::ValidationError;
use crate::model::Trainer;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tracing::{info, info_span};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),
    #[error("Training error: {0}")]
    Training(#[from] TrainingError),
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),
    #[error("Forecast error: {0}")]
    Forecast(#[from] ForecastError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Flat classification of pipeline failures for callers that only need to
/// decide what to tell the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Schema,
    Parse,
    Ordering,
    InsufficientData,
    Shape,
    Convergence,
    InvalidHorizon,
    Config,
    Io,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Data(e) => match e {
                DataError::Csv(_) => ErrorKind::Parse,
                DataError::Io(_) => ErrorKind::Io,
                DataError::Schema { .. } => ErrorKind::Schema,
                DataError::Parse { .. } => ErrorKind::Parse,
                DataError::Ordering { .. } => ErrorKind::Ordering,
                DataError::InsufficientData { .. } => ErrorKind::InsufficientData,
            },
            PipelineError::Training(e) => match e {
                TrainingError::Solver(SvrError::Convergence { .. }) => ErrorKind::Convergence,
                TrainingError::Solver(SvrError::InvalidHyperparameter { .. }) => ErrorKind::Config,
                TrainingError::Solver(SvrError::Shape { .. }) => ErrorKind::Shape,
                TrainingError::Validation(ValidationError::InvalidFoldCount(_)) => ErrorKind::Config,
                TrainingError::Validation(ValidationError::InsufficientData { .. }) => {
                    ErrorKind::InsufficientData
                }
                TrainingError::EmptyGrid => ErrorKind::Config,
                TrainingError::InsufficientData { .. } => ErrorKind::InsufficientData,
            },
            PipelineError::Evaluation(EvaluationError::Shape { .. }) => ErrorKind::Shape,
            PipelineError::Forecast(ForecastError::InvalidHorizon(_))
            | PipelineError::Forecast(ForecastError::OutOfRange { .. }) => ErrorKind::InvalidHorizon,
            PipelineError::Config(ConfigError::Io(_)) => ErrorKind::Io,
            PipelineError::Config(_) => ErrorKind::Config,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub evaluation: EvaluationResult,
    pub forecast: Vec<ForecastPoint>,
    pub historical: ObservedSeries,
}

/// Load → encode → train → evaluate and forecast, all or nothing.
pub struct ForecastPipeline {
    config: Config,
}

impl ForecastPipeline {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn run_csv<P: AsRef<Path>>(&self, path: P) -> Result<PipelineOutput> {
        let series = SeriesLoader::from_path(path, self.config.fold_count)?;
        self.run(series)
    }

    pub fn run(&self, series: ObservedSeries) -> Result<PipelineOutput> {
        self.run_with_horizon(series, self.config.horizon_days)
    }

    pub fn run_with_horizon(&self, series: ObservedSeries, horizon: i64) -> Result<PipelineOutput> {
        let span = info_span!("forecast_pipeline", rows = series.len(), horizon);
        let _guard = span.enter();

        // Checked up front so a bad horizon never costs a grid search
        if horizon <= 0 {
            return Err(ForecastError::InvalidHorizon(horizon).into());
        }

        let encoded = features::encode(&series);
        info!(
            base_date = %encoded.base_date,
            last_ordinal = encoded.last_ordinal(),
            "encoded series"
        );

        let trainer = Trainer::new(self.config.trainer_config());
        let model = trainer.train(&encoded.samples)?;

        let evaluation = evaluation::evaluate(&model, &encoded.samples)?;
        info!(
            rmse = evaluation.rmse,
            cv_rmse = evaluation.cv_rmse,
            "evaluated model"
        );

        let forecast = forecast::forecast(&model, encoded.base_date, encoded.last_ordinal(), horizon)?;
        info!(points = forecast.len(), "forecast complete");

        Ok(PipelineOutput {
            evaluation,
            forecast,
            historical: series,
        })
    }
}
