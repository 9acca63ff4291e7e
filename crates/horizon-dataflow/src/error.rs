//! Error types for the data layer.

/// Result type alias for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while querying providers or synchronizing data.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// An argument was structurally invalid for the operation.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation cannot apply in the current state.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// A back end callback failed.
    #[error("Back end failure: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Communicator configuration could not be parsed.
    #[error("Invalid communicator configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl DataError {
    /// Create an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create an illegal-state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState(message.into())
    }

    /// Wrap a back end failure.
    pub fn backend(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Backend {
            source: source.into(),
        }
    }

    /// Returns `true` for [`DataError::InvalidArgument`].
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Returns `true` for [`DataError::IllegalState`].
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Self::IllegalState(_))
    }
}
