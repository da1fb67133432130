pub mod market;
pub mod prediction;
pub mod signal;
pub mod snapshot;
pub mod value;

pub use market::*;
pub use prediction::*;
pub use signal::*;
pub use snapshot::*;
pub use value::*;
