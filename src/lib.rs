pub mod adapters;
pub mod cli;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod ml;
pub mod persistence;
pub mod predictors;
pub mod services;
pub mod strategy;
pub mod supervisor;

pub use config::AppConfig;
pub use context::{AppContext, Boundaries};
pub use error::{BetSignalError, Result};
pub use persistence::{InMemoryStore, MatchStore};
pub use predictors::PredictorRegistry;
pub use services::RuntimeMetrics;
pub use strategy::SignalPipeline;
pub use supervisor::{AlertEngine, Worker, WorkerManager};
