//! Runtime drivers.
//!
//! A driver owns a `ShellRuntime` and adapts an input source to shell
//! events. The CLI driver maps terminal resizes and keystrokes, which is
//! enough to exercise every responsive transition interactively.

pub mod cli;

pub use cli::{CliDriver, CliDriverError, DriverResult};
