//! Core types and utilities for the NAIP land-cover pipeline.
//!
//! This crate provides the error taxonomy, configuration and imagery
//! constants shared by the dataset crate and the workspace tools.

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use cli::*;
pub use config::*;
pub use constants::*;
pub use error::{Error, Result};
pub use types::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::*;
    pub use crate::constants::*;
    pub use crate::error::{Error, Result};
    pub use crate::types::*;
}
