//! Error types for the risk classification service

/// Result type alias using this crate's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Public error taxonomy.
///
/// Per-model failures never surface here: an unusable model is an internal
/// signal, logged and excluded for the call that produced it. Only total
/// failure propagates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Zero models could be loaded; fatal at startup, the process must not
    /// enter serving state.
    #[error("no models could be loaded into the registry")]
    RegistryEmpty,

    /// Every registered model was unusable for one prediction call. Callers
    /// should treat this as "try again later", not as invalid input.
    #[error("all models failed for this prediction call")]
    AllModelsFailed,

    /// Input rejected before inference (empty batch, failed validation).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a new invalid-input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
