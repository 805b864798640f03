//! Error types for npimpact

use thiserror::Error;

/// npimpact error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing model file, workspace, measurement, dataset or POI.
    ///
    /// Always raised before any fitting starts.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A fit failed or did not reach a valid minimum.
    #[error("Fit did not converge: {0}")]
    Convergence(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),
}

impl Error {
    /// `true` for errors that must abort a run before fitting.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::Io(_) | Error::Json(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
