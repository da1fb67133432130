//! Lightweight ML utilities: dense model container and deterministic trainers.
//!
//! CPU-only and dependency-light; trained parameters are plain JSON.

pub mod dense;
pub mod train;

pub use dense::{Activation, DenseLayer, DenseNetwork};
pub use train::{train_poisson, train_softmax, TrainOptions, TrainingMetrics};
