//! # np-core
//!
//! Core types, traits, and error handling for npimpact.
//!
//! This crate provides:
//! - Common error types
//! - Model traits (`LogDensityModel`, `PoiModel`)
//! - Fit results and parameter state (values, constant flags, snapshots)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod state;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use state::{ParameterState, ParameterValue, Snapshot};
pub use traits::{LogDensityModel, PoiModel};
pub use types::FitResult;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
