//! Persistence boundary.
//!
//! - `MatchStore`: snapshots, signals and predictor parameters
//! - `ModelRegistry`: versioned trained models
//!
//! Both are traits; the in-process implementations back the binary and tests.

pub mod memory;
pub mod model_registry;
pub mod store;

pub use memory::InMemoryStore;
pub use model_registry::{LocalModelRegistry, ModelRef, ModelRegistry};
pub use store::{MatchStore, TrackRecord};
