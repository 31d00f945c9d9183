use super::svr::{Hyperparameters, SvrError};
use serde::{Deserialize, Serialize};

/// Candidate values for each SVR hyperparameter.
///
/// Points are enumerated with `c` outermost and `gamma` innermost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HyperparameterGrid {
    pub gamma: Vec<f64>,
    pub c: Vec<f64>,
    pub epsilon: Vec<f64>,
}

impl Default for HyperparameterGrid {
    fn default() -> Self {
        Self {
            gamma: vec![0.001, 0.01, 0.1],
            c: vec![1.0, 10.0, 100.0],
            epsilon: vec![0.1],
        }
    }
}

impl HyperparameterGrid {
    pub fn new(gamma: Vec<f64>, c: Vec<f64>, epsilon: Vec<f64>) -> Self {
        Self { gamma, c, epsilon }
    }

    pub fn len(&self) -> usize {
        self.gamma.len() * self.c.len() * self.epsilon.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn points(&self) -> Vec<Hyperparameters> {
        self.c
            .iter()
            .flat_map(|&c| {
                self.epsilon.iter().flat_map(move |&epsilon| {
                    self.gamma
                        .iter()
                        .map(move |&gamma| Hyperparameters::new(gamma, c, epsilon))
                })
            })
            .collect()
    }

    /// Check every candidate value without fitting anything.
    pub fn validate(&self) -> Result<(), SvrError> {
        self.points().iter().try_for_each(Hyperparameters::validate)
    }
}
