//! Applying and removing DNS configuration.
//!
//! Every write to a system path goes through the [`PrivilegedExecutor`]:
//! content is written to a private temporary file first and then installed
//! (or, for the hosts file, appended) into place by an escalated
//! `install`/`sh`. Rewriting the hosts file, on cleanup or when a project's
//! block grows, uses `cp` so the existing file keeps its owner and mode.
//!
//! # Concurrency
//!
//! Hosts-file edits are read-modify-write without locking. Two concurrent
//! runs for the same project can duplicate or lose entries; callers are
//! expected to run one invocation at a time.

use crate::config::{EngineConfig, EnabledService, validate_project_name};
use crate::error::Result;
use crate::executor::{CommandExecutor, ProcessResult};
use crate::hosts;
use crate::plan::{DnsConfigurationResult, Planner};
use crate::platform::Platform;
use crate::privilege::PrivilegedExecutor;
use crate::provider::DnsProviderKind;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Mode of newly installed config files; resolver daemons may not run as root.
const CONFIG_FILE_MODE: &str = "0644";

/// Appends file `$1` to file `$2`.
const APPEND_SCRIPT: &str = r#"cat "$1" >> "$2""#;

/// How `apply` puts the staged file in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// New or replaced config file.
    Install,
    /// First block for the project in the hosts file.
    Append,
    /// Hosts file rewritten with the project's block swapped for a larger one.
    Replace,
}

impl Placement {
    const fn verb(self) -> &'static str {
        match self {
            Self::Install => "write",
            Self::Append => "append to",
            Self::Replace => "rewrite",
        }
    }
}

/// Outcome of [`DnsManager::apply`] or [`DnsManager::cleanup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReport {
    pub success: bool,
    pub messages: Vec<String>,
}

impl OperationReport {
    fn ok(messages: Vec<String>) -> Self {
        Self {
            success: true,
            messages,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            messages: vec![message.into()],
        }
    }
}

/// Plans, applies and removes per-project DNS configuration.
///
/// # Example
///
/// ```rust,ignore
/// use devstack_dns::{DnsManager, DnsProviderKind, EngineConfig, Platform,
///                    PrivilegedExecutor, SystemExecutor};
///
/// let manager = DnsManager::new(EngineConfig::default(), Platform::current())
///     .with_privileged(PrivilegedExecutor::new(SystemExecutor));
///
/// let report = manager.apply("shop", DnsProviderKind::HostsFile);
/// // ...
/// let report = manager.cleanup("shop", DnsProviderKind::HostsFile);
/// ```
pub struct DnsManager<E> {
    config: EngineConfig,
    platform: Platform,
    privileged: Option<PrivilegedExecutor<E>>,
    services: Vec<EnabledService>,
}

impl<E: CommandExecutor> DnsManager<E> {
    /// Creates a manager without a privileged executor. Planning works;
    /// `apply` and `cleanup` fail until one is set.
    #[must_use]
    pub const fn new(config: EngineConfig, platform: Platform) -> Self {
        Self {
            config,
            platform,
            privileged: None,
            services: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_privileged(mut self, privileged: PrivilegedExecutor<E>) -> Self {
        self.privileged = Some(privileged);
        self
    }

    /// Services used by `apply`/`cleanup` when computing hostnames.
    #[must_use]
    pub fn with_services(mut self, services: Vec<EnabledService>) -> Self {
        self.services = services;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Computes what `apply` would do. Reads the hosts file; writes nothing.
    ///
    /// `services` overrides the services set with
    /// [`with_services`](Self::with_services).
    ///
    /// # Errors
    ///
    /// See [`Planner::plan`].
    pub fn plan_configuration(
        &self,
        project: &str,
        kind: DnsProviderKind,
        services: Option<&[EnabledService]>,
    ) -> Result<DnsConfigurationResult> {
        let fallback = ["sudo".to_string()];
        let escalation = self
            .privileged
            .as_ref()
            .map_or(&fallback[..], PrivilegedExecutor::escalation_prefix);
        let current_hosts = if kind == DnsProviderKind::HostsFile {
            self.read_hosts()
        } else {
            String::new()
        };

        Planner {
            config: &self.config,
            platform: &self.platform,
            escalation,
        }
        .plan(
            project,
            kind,
            services.unwrap_or(&self.services),
            &current_hosts,
        )
    }

    /// Writes the planned configuration and restarts the owning service.
    ///
    /// Stops at the first failing step. A failed restart is logged but does
    /// not fail the operation.
    pub fn apply(&self, project: &str, kind: DnsProviderKind) -> OperationReport {
        let Some(privileged) = &self.privileged else {
            return no_privileged_executor();
        };

        let plan = match self.plan_configuration(project, kind, None) {
            Ok(plan) => plan,
            Err(e) => return OperationReport::failed(format!("Cannot plan {kind} configuration: {e}")),
        };

        if !plan.automatic {
            return OperationReport::ok(plan.instructions);
        }
        let (Some(path), Some(content)) = (&plan.config_path, &plan.config_content) else {
            tracing::debug!(project = %project, provider = %kind, "DNS configuration already present");
            return OperationReport::ok(plan.instructions);
        };

        let elevated = plan.requires_elevated_privileges;
        let (placement, payload) = if kind == DnsProviderKind::HostsFile {
            let current = self.read_hosts();
            match hosts::remove_block(&current, &self.config.tool, project) {
                Some(rest) => (Placement::Replace, hosts::append_block(&rest, content)),
                None => (Placement::Append, hosts::append_payload(content)),
            }
        } else {
            (Placement::Install, content.clone())
        };

        // The hosts file always has a parent; config directories may not.
        if let (Placement::Install, Some(dir)) = (placement, path.parent()) {
            let dir_str = dir.to_string_lossy();
            if !self.run(privileged, elevated, &["mkdir", "-p", &dir_str]).success() {
                return OperationReport::failed(format!("Failed to create directory {}", dir.display()));
            }
        }

        let temp = match write_temp(&payload) {
            Ok(temp) => temp,
            Err(e) => return OperationReport::failed(format!("Failed to write temporary file: {e}")),
        };

        let temp_str = temp.path().to_string_lossy();
        let target = path.to_string_lossy();
        let result = match placement {
            Placement::Install => self.run(
                privileged,
                elevated,
                &["install", "-m", CONFIG_FILE_MODE, &temp_str, &target],
            ),
            Placement::Append => {
                self.run(privileged, elevated, &["sh", "-c", APPEND_SCRIPT, "sh", &temp_str, &target])
            }
            Placement::Replace => self.run(privileged, elevated, &["cp", &temp_str, &target]),
        };
        if !result.success() {
            return OperationReport::failed(format!(
                "Failed to {} {}: {}",
                placement.verb(),
                path.display(),
                result.stderr.trim()
            ));
        }

        tracing::info!(
            project = %project,
            provider = %kind,
            path = %path.display(),
            "Applied DNS configuration"
        );
        let restarted = self.restart_service(privileged, kind);

        let mut messages = vec![format!("DNS configuration written to {}", path.display())];
        if let (true, Some(restart)) = (restarted, plan.restart_command) {
            messages.push(format!("Restarted service: {restart}"));
        }
        OperationReport::ok(messages)
    }

    /// Removes what [`apply`](Self::apply) wrote.
    ///
    /// For the hosts file only the project's managed block is removed.
    /// Missing configuration is reported as success.
    pub fn cleanup(&self, project: &str, kind: DnsProviderKind) -> OperationReport {
        let Some(privileged) = &self.privileged else {
            return no_privileged_executor();
        };
        if let Err(e) = validate_project_name(project) {
            return OperationReport::failed(e.to_string());
        }

        let path = match kind.config_path(&self.config, &self.platform, project) {
            Ok(Some(path)) => path,
            Ok(None) => {
                return OperationReport::ok(vec![format!(
                    "Manual DNS configuration for {project}.local has to be removed by hand"
                )]);
            }
            Err(e) => return OperationReport::failed(format!("Cannot locate {kind} configuration: {e}")),
        };

        if kind == DnsProviderKind::HostsFile {
            return self.cleanup_hosts(privileged, project, &path);
        }

        if !path.exists() {
            tracing::debug!(project = %project, path = %path.display(), "DNS config absent, skipping");
            return OperationReport::ok(vec![format!(
                "Nothing to clean: {} does not exist",
                path.display()
            )]);
        }

        let target = path.to_string_lossy();
        let result = self.run(privileged, kind.requires_elevated_privileges(), &["rm", "-f", &target]);
        if !result.success() {
            return OperationReport::failed(format!(
                "Failed to remove {}: {}",
                path.display(),
                result.stderr.trim()
            ));
        }

        tracing::info!(project = %project, provider = %kind, path = %path.display(), "Removed DNS configuration");
        self.restart_service(privileged, kind);
        OperationReport::ok(vec![format!("Removed {}", path.display())])
    }

    /// Whether `kind` currently holds configuration for `project`.
    #[must_use]
    pub fn is_configured(&self, project: &str, kind: DnsProviderKind) -> bool {
        match kind.config_path(&self.config, &self.platform, project) {
            Ok(Some(_)) if kind == DnsProviderKind::HostsFile => {
                hosts::has_block(&self.read_hosts(), &self.config.tool, project)
            }
            Ok(Some(path)) => path.exists(),
            Ok(None) | Err(_) => false,
        }
    }

    /// Projects with a managed block in the hosts file.
    #[must_use]
    pub fn list_hosts_projects(&self) -> Vec<String> {
        hosts::managed_projects(&self.read_hosts(), &self.config.tool)
    }

    fn cleanup_hosts(
        &self,
        privileged: &PrivilegedExecutor<E>,
        project: &str,
        path: &Path,
    ) -> OperationReport {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return OperationReport::failed(format!("Failed to read {}: {e}", path.display()));
            }
        };

        let Some(updated) = hosts::remove_block(&content, &self.config.tool, project) else {
            return OperationReport::ok(vec![format!(
                "Nothing to clean: no entries for {project} in {}",
                path.display()
            )]);
        };

        let temp = match write_temp(&updated) {
            Ok(temp) => temp,
            Err(e) => return OperationReport::failed(format!("Failed to write temporary file: {e}")),
        };
        let temp_str = temp.path().to_string_lossy();
        let target = path.to_string_lossy();
        let result = self.run(privileged, true, &["cp", &temp_str, &target]);
        if !result.success() {
            return OperationReport::failed(format!(
                "Failed to rewrite {}: {}",
                path.display(),
                result.stderr.trim()
            ));
        }

        tracing::info!(project = %project, path = %path.display(), "Removed managed hosts block");
        OperationReport::ok(vec![format!(
            "Removed entries for {project} from {}",
            path.display()
        )])
    }

    /// Best-effort restart; returns whether a restart ran and succeeded.
    fn restart_service(&self, privileged: &PrivilegedExecutor<E>, kind: DnsProviderKind) -> bool {
        let Some(argv) = kind.restart_command(&self.platform) else {
            return false;
        };
        let result = privileged.execute(argv);
        if !result.success() {
            tracing::warn!(
                provider = %kind,
                exit_code = result.exit_code,
                stderr = %result.stderr.trim(),
                "Service restart failed"
            );
        }
        result.success()
    }

    fn run(&self, privileged: &PrivilegedExecutor<E>, elevated: bool, argv: &[&str]) -> ProcessResult {
        if elevated {
            privileged.execute(argv)
        } else {
            privileged.inner().execute(argv)
        }
    }

    fn read_hosts(&self) -> String {
        let path = self.config.hosts_path();
        std::fs::read_to_string(&path).unwrap_or_else(|e| {
            tracing::debug!(path = %path.display(), error = %e, "Hosts file unreadable, treating as empty");
            String::new()
        })
    }
}

fn no_privileged_executor() -> OperationReport {
    OperationReport::failed("No privileged executor configured; cannot modify system DNS configuration")
}

/// Writes `content` to a fresh private temporary file.
fn write_temp(content: &str) -> std::io::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    Ok(file)
}
