use thiserror::Error;

/// Unified error type for the fanin library
///
/// Operation failures are not part of this enum: they are plain data of the
/// caller's choosing and are relayed to observers untouched.
#[derive(Debug, Error)]
pub enum FaninError {
    /// A dynamically supplied value did not have the expected callable type
    #[error("Invalid argument `{argument}`: expected {expected}")]
    InvalidArgument {
        argument: String,
        expected: String,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// Serialization errors
    #[error("Serialization failed: {format}")]
    Serialization {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl FaninError {
    /// Create an invalid argument error
    pub fn invalid_argument<A: Into<String>, T: Into<String>>(argument: A, expected: T) -> Self {
        Self::InvalidArgument {
            argument: argument.into(),
            expected: expected.into(),
        }
    }

    /// Create a configuration error pointing at a field
    pub fn configuration_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Configuration {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        format: S,
        source: E,
    ) -> Self {
        Self::Serialization {
            format: format.into(),
            source: Box::new(source),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::Configuration { .. } => "configuration",
            Self::Serialization { .. } => "serialization",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, FaninError>;

impl From<serde_json::Error> for FaninError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization("json", err)
    }
}

impl From<serde_yaml::Error> for FaninError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::serialization("yaml", err)
    }
}

impl From<anyhow::Error> for FaninError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}
