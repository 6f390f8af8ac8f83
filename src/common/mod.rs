//! Common module - shared utilities
//!
//! Validation and timing helpers used by both the registry client and the
//! sync pipeline.

pub mod utils;

pub use utils::{Timer, ValidationUtils};
