//! Engine and project configuration.

use crate::error::{DnsError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Tool name embedded in hosts markers and config file names.
pub const DEFAULT_TOOL: &str = "devstack";

/// Address every project domain resolves to.
pub const DEFAULT_LOOPBACK: &str = "127.0.0.1";

/// Engine-wide settings shared by detection, planning and application.
///
/// # Example
///
/// ```
/// use devstack_dns::EngineConfig;
///
/// let config = EngineConfig::new("devstack").with_root("/tmp/sandbox");
///
/// assert_eq!(config.tool, "devstack");
/// assert_eq!(config.config_file_name("demo"), "devstack-demo.conf");
/// assert_eq!(
///     config.hosts_path(),
///     std::path::PathBuf::from("/tmp/sandbox/etc/hosts")
/// );
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Tool name (e.g., `"devstack"`). Appears in `# BEGIN <tool> - <project>`
    /// markers and in `<tool>-<project>.conf` file names.
    pub tool: String,

    /// Filesystem root every system path is resolved against. Defaults to
    /// `/`; tests point it at a temporary directory.
    pub root: PathBuf,

    /// Address written into every generated rule.
    pub loopback: String,
}

impl EngineConfig {
    /// Creates a config rooted at `/` resolving to `127.0.0.1`.
    #[must_use]
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            root: PathBuf::from("/"),
            loopback: DEFAULT_LOOPBACK.to_string(),
        }
    }

    /// Overrides the filesystem root.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Overrides the loopback address.
    #[must_use]
    pub fn with_loopback(mut self, loopback: impl Into<String>) -> Self {
        self.loopback = loopback.into();
        self
    }

    /// Resolves an absolute system path (e.g. `/etc/hosts`) under [`root`](Self::root).
    #[must_use]
    pub fn system_path(&self, absolute: &str) -> PathBuf {
        self.root.join(absolute.trim_start_matches('/'))
    }

    /// Path of the shared hosts file.
    #[must_use]
    pub fn hosts_path(&self) -> PathBuf {
        self.system_path("/etc/hosts")
    }

    /// `<tool>-<project>.conf`.
    #[must_use]
    pub fn config_file_name(&self, project: &str) -> String {
        format!("{}-{project}.conf", self.tool)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL)
    }
}

/// Checks that a project name is safe to embed in paths, markers and domains.
///
/// # Errors
///
/// Returns [`DnsError::InvalidConfig`] for empty names or names containing
/// anything besides ASCII alphanumerics, `-` and `_`.
pub fn validate_project_name(project: &str) -> Result<()> {
    if project.is_empty() {
        return Err(DnsError::InvalidConfig("project name is empty".into()));
    }
    if let Some(c) = project
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(DnsError::InvalidConfig(format!(
            "project name {project:?} contains invalid character {c:?}"
        )));
    }
    Ok(())
}

/// How a service is reachable from the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exposure {
    /// Routed through the reverse proxy under `<service>.<project>.local`.
    #[default]
    Proxy,
    /// Published on a host port; gets no hostname.
    Port,
}

/// A service enabled in the project's stack.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnabledService {
    /// Service name, used as the leftmost hostname label.
    pub name: String,

    /// How the service is exposed.
    #[serde(default)]
    pub exposure: Exposure,
}

impl EnabledService {
    /// A proxy-routed service.
    #[must_use]
    pub fn proxied(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exposure: Exposure::Proxy,
        }
    }

    /// A service published on a host port.
    #[must_use]
    pub fn port(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exposure: Exposure::Port,
        }
    }
}

/// Per-project TOML file.
///
/// ```toml
/// project = "demo"
///
/// [[services]]
/// name = "mailpit"
/// exposure = "proxy"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectFile {
    /// Project name.
    pub project: String,

    /// Tool name override.
    #[serde(default)]
    pub tool: Option<String>,

    /// Enabled services.
    #[serde(default)]
    pub services: Vec<EnabledService>,
}

impl ProjectFile {
    /// Parses a project file from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::Toml`] on malformed input, or
    /// [`DnsError::InvalidConfig`] if the project name is invalid.
    pub fn parse(text: &str) -> Result<Self> {
        let file: Self = toml::from_str(text)?;
        validate_project_name(&file.project)?;
        Ok(file)
    }

    /// Reads and parses a project file.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::Io`] if the file cannot be read, otherwise the
    /// errors of [`parse`](Self::parse).
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sets_defaults() {
        let c = EngineConfig::new("devstack");
        assert_eq!(c.tool, "devstack");
        assert_eq!(c.root, PathBuf::from("/"));
        assert_eq!(c.loopback, "127.0.0.1");
        assert_eq!(c.hosts_path(), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn with_root_relocates_system_paths() {
        let c = EngineConfig::default().with_root("/sandbox");
        assert_eq!(
            c.system_path("/etc/dnsmasq.d/x.conf"),
            PathBuf::from("/sandbox/etc/dnsmasq.d/x.conf")
        );
    }

    #[test]
    fn project_name_validation() {
        assert!(validate_project_name("demo-app_2").is_ok());
        assert!(validate_project_name("").is_err());
        assert!(validate_project_name("../etc").is_err());
        assert!(validate_project_name("a b").is_err());
    }

    #[test]
    fn parse_project_file() {
        let file = ProjectFile::parse(
            r#"
project = "shop"

[[services]]
name = "mailpit"

[[services]]
name = "postgres"
exposure = "port"
"#,
        )
        .unwrap();

        assert_eq!(file.project, "shop");
        assert!(file.tool.is_none());
        assert_eq!(
            file.services,
            vec![EnabledService::proxied("mailpit"), EnabledService::port("postgres")]
        );
    }

    #[test]
    fn parse_rejects_bad_project() {
        assert!(matches!(
            ProjectFile::parse("project = \"a/b\""),
            Err(DnsError::InvalidConfig(_))
        ));
        assert!(matches!(
            ProjectFile::parse("project = 3"),
            Err(DnsError::Toml(_))
        ));
    }
}
