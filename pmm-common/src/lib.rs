//! # pmm Common Library
//!
//! Shared code for the pmm crates:
//! - Error and Result types
//! - Configuration models, lookup and validation

pub mod config;
pub mod error;

pub use config::AppConfig;
pub use error::{Error, Result};
