//! File system scanning.

pub mod change_set;
pub mod walker;

pub use change_set::{select, ChangeSet};
