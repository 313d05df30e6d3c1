//! Error types for the mockup renderer

use thiserror::Error;

/// Result type alias for renderer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering, encoding or storing a mockup
#[derive(Error, Debug)]
pub enum Error {
    /// A required request field was missing or empty
    #[error("Validation failed: {0}")]
    ValidationError(String),

    /// An avatar or decorative asset could not be loaded.
    ///
    /// Loaders return this, the pipeline recovers from it with a placeholder.
    #[error("Failed to load asset: {0}")]
    AssetLoadError(String),

    /// Failed to encode the raster surface
    #[error("Encoding failed: {0}")]
    EncodeError(String),

    /// Failed to set up or draw the raster surface
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Output directory failure
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error was caused by the caller's input rather than the service
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::ValidationError(_))
    }
}

impl From<png::EncodingError> for Error {
    fn from(err: png::EncodingError) -> Self {
        Error::EncodeError(err.to_string())
    }
}
