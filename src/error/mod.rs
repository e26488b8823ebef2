//! Error module orchestrator following the module orchestrator pattern.
//!
//! Downstream code imports error types from here while the implementation
//! details live in the private `types` module.

mod types;

pub use types::{ShellError, ShellResult};
