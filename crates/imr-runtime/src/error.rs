//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;
use imr_framework::RegisterError;

/// Errors that can occur while building or running a client.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// `build` was called without an order factory.
    #[error("No order factory configured")]
    MissingOrderFactory,

    /// Registering a handler owner failed.
    #[error("Failed to register handler owner: {0}")]
    Register(#[from] RegisterError),

    /// Loading or validating configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
