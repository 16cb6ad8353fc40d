//! Schema module - Configuration, naming and snapshot types.

mod config;
mod snapshot;
mod timestamp;

pub use config::*;
pub use snapshot::*;
pub use timestamp::*;
