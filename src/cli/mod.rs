//! Command line interface module
//!
//! Argument parsing and the runner that wires the registry clients into
//! [`ImageSync`](crate::sync::ImageSync).

pub mod args;
pub mod runner;

pub use args::Args;
pub use runner::Runner;
