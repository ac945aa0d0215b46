//! # Medley Common Library
//!
//! Shared code for Medley services including:
//! - Error taxonomy surfaced to API callers
//! - Configuration loading (TOML + environment overrides)

pub mod config;
pub mod error;

pub use error::{Error, Result};
