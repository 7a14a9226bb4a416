//! DNS provider kinds and their static properties.

use crate::config::EngineConfig;
use crate::error::{DnsError, Result};
use crate::platform::Platform;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A mechanism that can route `*.<project>.local` to the loopback address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DnsProviderKind {
    /// `/etc/resolver/<project>.local` (macOS only).
    MacOsResolver,
    Dnsmasq,
    /// NetworkManager with its dnsmasq plugin enabled.
    NetworkManager,
    SystemdResolved,
    /// Managed block in `/etc/hosts`. Always available.
    HostsFile,
    /// Nothing automatic; the user follows printed instructions.
    Manual,
}

impl DnsProviderKind {
    /// Every kind, in priority order.
    pub const ALL: [Self; 6] = [
        Self::MacOsResolver,
        Self::Dnsmasq,
        Self::NetworkManager,
        Self::SystemdResolved,
        Self::HostsFile,
        Self::Manual,
    ];

    /// Static preference, lower is better.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::MacOsResolver => 1,
            Self::Dnsmasq => 2,
            Self::NetworkManager => 3,
            Self::SystemdResolved => 4,
            Self::HostsFile => 5,
            Self::Manual => 99,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MacOsResolver => "macos-resolver",
            Self::Dnsmasq => "dnsmasq",
            Self::NetworkManager => "network-manager",
            Self::SystemdResolved => "systemd-resolved",
            Self::HostsFile => "hosts",
            Self::Manual => "manual",
        }
    }

    /// Whether applying this provider writes system-owned files.
    #[must_use]
    pub const fn requires_elevated_privileges(self) -> bool {
        !matches!(self, Self::Manual)
    }

    /// Where this provider's configuration for `project` lives.
    ///
    /// Returns `Ok(None)` for [`Manual`](Self::Manual).
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::UnsupportedPlatform`] for dnsmasq on an OS that is
    /// neither Linux nor macOS.
    pub fn config_path(
        self,
        config: &EngineConfig,
        platform: &Platform,
        project: &str,
    ) -> Result<Option<PathBuf>> {
        let file = config.config_file_name(project);
        let path = match self {
            Self::MacOsResolver => config.system_path(&format!("/etc/resolver/{project}.local")),
            Self::Dnsmasq => match platform {
                Platform::Linux => config.system_path("/etc/dnsmasq.d").join(file),
                Platform::MacOs => config.system_path("/usr/local/etc/dnsmasq.d").join(file),
                Platform::Other(os) => {
                    return Err(DnsError::UnsupportedPlatform { os: os.clone() });
                }
            },
            Self::NetworkManager => config
                .system_path("/etc/NetworkManager/dnsmasq.d")
                .join(file),
            Self::SystemdResolved => config
                .system_path("/etc/systemd/resolved.conf.d")
                .join(file),
            Self::HostsFile => config.hosts_path(),
            Self::Manual => return Ok(None),
        };
        Ok(Some(path))
    }

    /// Command restarting the service that owns this provider's config.
    #[must_use]
    pub fn restart_command(self, platform: &Platform) -> Option<&'static [&'static str]> {
        match self {
            Self::Dnsmasq if platform.is_macos() => Some(&["brew", "services", "restart", "dnsmasq"]),
            Self::Dnsmasq => Some(&["systemctl", "restart", "dnsmasq"]),
            Self::NetworkManager => Some(&["systemctl", "restart", "NetworkManager"]),
            Self::SystemdResolved => Some(&["systemctl", "restart", "systemd-resolved"]),
            Self::MacOsResolver | Self::HostsFile | Self::Manual => None,
        }
    }
}

impl fmt::Display for DnsProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DnsProviderKind {
    type Err = DnsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DnsError::InvalidConfig(format!("unknown provider: {s}")))
    }
}

/// A provider usable on this machine right now.
///
/// Produced by [`ProviderDetector`](crate::ProviderDetector); says nothing
/// about whether the provider is already configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedProvider {
    pub kind: DnsProviderKind,
    pub config_path: PathBuf,
    pub requires_elevated_privileges: bool,
}
