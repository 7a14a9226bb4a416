//! Error types.

use thiserror::Error;

/// Result alias for DNS engine operations.
pub type Result<T> = std::result::Result<T, DnsError>;

/// Errors returned by planning and configuration loading.
///
/// Detection never fails and `apply`/`cleanup` fold failures into an
/// [`OperationReport`](crate::OperationReport), so this enum only surfaces
/// from the pure planning step and from config parsing.
#[derive(Debug, Error)]
pub enum DnsError {
    /// Filesystem I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested provider has no known configuration location on this OS.
    #[error("unsupported platform for this provider: {os}")]
    UnsupportedPlatform {
        /// The OS name reported by the platform descriptor.
        os: String,
    },

    /// Invalid configuration values (bad project name, unknown provider, ...).
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A project file could not be parsed.
    #[error("invalid project file: {0}")]
    Toml(#[from] toml::de::Error),
}

impl DnsError {
    /// Returns `true` if the underlying I/O error is `PermissionDenied`.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_detection() {
        let err = DnsError::from(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert!(err.is_permission_denied());

        let err = DnsError::InvalidConfig("x".into());
        assert!(!err.is_permission_denied());
    }

    #[test]
    fn unsupported_platform_message() {
        let err = DnsError::UnsupportedPlatform {
            os: "windows".into(),
        };
        assert_eq!(
            err.to_string(),
            "unsupported platform for this provider: windows"
        );
    }
}
