use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::model::{HyperparameterGrid, SolverSettings, TrainerConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Everything one forecasting run needs. Callers pass this explicitly; nothing
/// is read from process-wide state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub horizon_days: i64,
    /// Upper bound the presentation layer puts on `horizon_days`. The core
    /// itself accepts any positive horizon.
    pub max_horizon_days: i64,
    pub fold_count: usize,
    pub parallel: bool,
    pub hyperparameter_grid: HyperparameterGrid,
    pub solver: SolverSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            horizon_days: 7,
            max_horizon_days: 30,
            fold_count: 5,
            parallel: true,
            hyperparameter_grid: HyperparameterGrid::default(),
            solver: SolverSettings::default(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fold_count < 2 {
            return Err(ConfigError::Invalid(format!(
                "fold_count must be at least 2, got {}",
                self.fold_count
            )));
        }
        if self.hyperparameter_grid.is_empty() {
            return Err(ConfigError::Invalid(
                "hyperparameter_grid needs at least one value for gamma, c and epsilon".to_string(),
            ));
        }
        self.hyperparameter_grid
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.solver.tolerance.is_nan() || self.solver.tolerance <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "solver.tolerance must be positive, got {}",
                self.solver.tolerance
            )));
        }
        if self.max_horizon_days < 1 {
            return Err(ConfigError::Invalid(format!(
                "max_horizon_days must be at least 1, got {}",
                self.max_horizon_days
            )));
        }
        Ok(())
    }

    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig {
            grid: self.hyperparameter_grid.clone(),
            fold_count: self.fold_count,
            solver: self.solver,
            parallel: self.parallel,
        }
    }
}
