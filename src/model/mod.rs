pub mod grid;
pub mod svr;
pub mod training;
pub mod validation;

pub use grid::HyperparameterGrid;
pub use svr::{Hyperparameters, SolverSettings, SvrModel};
pub use training::{CandidateScore, TrainedModel, Trainer, TrainerConfig};
