//! Platform descriptor.
//!
//! Everything OS-dependent takes a [`Platform`] instead of checking
//! `cfg!(target_os)` directly, so tests can simulate macOS on Linux and
//! vice versa.

use std::fmt;

/// The operating system the engine is configuring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    /// Any other OS, carrying its `std::env::consts::OS` name.
    Other(String),
}

impl Platform {
    /// Descriptor for the OS this binary runs on.
    #[must_use]
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Maps a `std::env::consts::OS` value to a descriptor.
    #[must_use]
    pub fn from_os(os: &str) -> Self {
        match os {
            "linux" => Self::Linux,
            "macos" => Self::MacOs,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub const fn is_macos(&self) -> bool {
        matches!(self, Self::MacOs)
    }

    #[must_use]
    pub const fn is_linux(&self) -> bool {
        matches!(self, Self::Linux)
    }

    /// OS name as reported by `std::env::consts::OS`.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Linux => "linux",
            Self::MacOs => "macos",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_os_maps_known_names() {
        assert_eq!(Platform::from_os("linux"), Platform::Linux);
        assert_eq!(Platform::from_os("macos"), Platform::MacOs);
        assert_eq!(
            Platform::from_os("freebsd"),
            Platform::Other("freebsd".into())
        );
        assert_eq!(Platform::from_os("freebsd").name(), "freebsd");
    }

    #[test]
    fn current_matches_build_target() {
        assert_eq!(Platform::current().name(), std::env::consts::OS);
    }
}
