//! Backup Runner Library
//!
//! One invocation per timer tick: select recent changes, archive them into
//! a deduplicating repository, then prune by a five-tier retention policy.

pub mod config;
pub mod executor;
pub mod fs;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use executor::{Executor, RunOptions, RunOutcome};
pub use utils::errors::BackupError;
pub type Result<T> = std::result::Result<T, BackupError>;
