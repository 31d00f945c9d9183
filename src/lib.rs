//! Price forecasting from a single date/price series with support-vector
//! regression, time-ordered cross-validation and day-by-day projection.

pub mod config;
pub mod data;
pub mod evaluation;
pub mod features;
pub mod forecast;
pub mod model;
pub mod pipeline;

pub use config::Config;
pub use data::loader::SeriesLoader;
pub use data::{ObservedPoint, ObservedSeries};
pub use evaluation::EvaluationResult;
pub use forecast::ForecastPoint;
pub use model::{HyperparameterGrid, Hyperparameters, TrainedModel};
pub use pipeline::{ErrorKind, ForecastPipeline, PipelineError, PipelineOutput};
