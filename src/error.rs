//! Error types for the PackageInstall controller

use thiserror::Error;

/// Main error type for pkgi operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// The desired App cannot be tied to its PackageInstall
    ///
    /// This is the only error App synthesis can produce.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No Package satisfies the PackageInstall's reference and constraints
    #[error("package resolution error: {0}")]
    PackageResolution(String),

    /// PackageInstall spec cannot be acted on
    #[error("validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create a configuration error with the given message
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a package resolution error with the given message
    pub fn package_resolution(msg: impl Into<String>) -> Self {
        Self::PackageResolution(msg.into())
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// CamelCase reason recorded on failed status conditions
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Kube(_) => "KubernetesError",
            Self::Configuration(_) => "OwnershipConflict",
            Self::PackageResolution(_) => "PackageNotFound",
            Self::Validation(_) => "InvalidSpec",
            Self::Serialization(_) => "SerializationError",
        }
    }

    /// Whether retrying the same reconcile can succeed without a spec change
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Kube(_) | Self::PackageResolution(_))
    }
}
