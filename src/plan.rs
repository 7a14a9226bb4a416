//! Side-effect-free configuration plans.

use crate::config::{EngineConfig, EnabledService, Exposure, validate_project_name};
use crate::error::Result;
use crate::hosts;
use crate::platform::Platform;
use crate::provider::DnsProviderKind;
use std::path::PathBuf;

/// What applying a provider for a project would do.
///
/// A plan, not a record: nothing has been written when this exists.
///
/// - `automatic == false`: the user must follow `instructions`.
/// - `automatic == true` and `config_content == None`: nothing to do, the
///   configuration is already in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsConfigurationResult {
    pub kind: DnsProviderKind,
    pub automatic: bool,
    pub requires_elevated_privileges: bool,
    pub config_path: Option<PathBuf>,
    pub config_content: Option<String>,
    pub instructions: Vec<String>,
    /// Display form of the service restart, escalation prefix included.
    pub restart_command: Option<String>,
}

impl DnsConfigurationResult {
    /// `true` when there is nothing left to write.
    #[must_use]
    pub const fn is_satisfied(&self) -> bool {
        self.automatic && self.config_content.is_none()
    }
}

/// Hostnames a project needs: `app`, `traefik`, and every proxy-routed service.
#[must_use]
pub fn required_hostnames(project: &str, services: &[EnabledService]) -> Vec<String> {
    let mut names = vec![
        format!("app.{project}.local"),
        format!("traefik.{project}.local"),
    ];
    for service in services.iter().filter(|s| s.exposure == Exposure::Proxy) {
        let name = format!("{}.{project}.local", service.name);
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Computes plans from static inputs; performs no I/O.
pub struct Planner<'a> {
    pub config: &'a EngineConfig,
    pub platform: &'a Platform,
    /// Escalation command shown in front of restart commands.
    pub escalation: &'a [String],
}

impl Planner<'_> {
    /// Plans `kind` for `project` against the current hosts file content.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::InvalidConfig`](crate::DnsError::InvalidConfig)
    /// for bad project names and
    /// [`DnsError::UnsupportedPlatform`](crate::DnsError::UnsupportedPlatform)
    /// for dnsmasq outside Linux and macOS.
    pub fn plan(
        &self,
        project: &str,
        kind: DnsProviderKind,
        services: &[EnabledService],
        current_hosts: &str,
    ) -> Result<DnsConfigurationResult> {
        validate_project_name(project)?;
        let config_path = kind.config_path(self.config, self.platform, project)?;
        let ip = &self.config.loopback;
        let domain = format!("{project}.local");

        let mut result = DnsConfigurationResult {
            kind,
            automatic: true,
            requires_elevated_privileges: kind.requires_elevated_privileges(),
            config_path,
            config_content: None,
            instructions: Vec::new(),
            restart_command: kind
                .restart_command(self.platform)
                .map(|argv| self.display(argv)),
        };

        match kind {
            DnsProviderKind::Dnsmasq | DnsProviderKind::NetworkManager => {
                result.config_content = Some(format!("address=/.{domain}/{ip}\n"));
                result
                    .instructions
                    .push(format!("Route *.{domain} to {ip} via {kind}"));
            }
            DnsProviderKind::SystemdResolved => {
                result.config_content =
                    Some(format!("[Resolve]\nDNS={ip}\nDomains=~{domain}\n"));
                result
                    .instructions
                    .push(format!("Send *.{domain} lookups to {ip} via systemd-resolved"));
            }
            DnsProviderKind::MacOsResolver => {
                result.config_content = Some(format!("nameserver {ip}\n"));
                result.instructions.push(format!(
                    "macOS picks up /etc/resolver/{domain} immediately; verify with `scutil --dns`"
                ));
            }
            DnsProviderKind::HostsFile => {
                let required = required_hostnames(project, services);
                let missing = hosts::missing_hostnames(current_hosts, &required);
                if missing.is_empty() {
                    result
                        .instructions
                        .push("All required host entries already exist in /etc/hosts".into());
                } else {
                    let tool = &self.config.tool;
                    let mut entries = hosts::block_hostnames(current_hosts, tool, project);
                    if hosts::has_block(current_hosts, tool, project) {
                        result.instructions.push(format!(
                            "Replace the existing {tool} block for {project} in /etc/hosts"
                        ));
                    }
                    entries.extend(missing.iter().cloned());
                    result.config_content =
                        Some(hosts::render_block(tool, project, ip, &entries));
                    result.instructions.extend(
                        missing
                            .iter()
                            .map(|host| format!("Add {ip} {host} to /etc/hosts")),
                    );
                }
            }
            DnsProviderKind::Manual => {
                result.automatic = false;
                result.instructions = self.manual_instructions(project, services);
            }
        }

        if let (Some(path), Some(restart)) = (&result.config_path, &result.restart_command) {
            result.instructions.push(format!(
                "Write {} and restart with: {restart}",
                path.display()
            ));
        }
        Ok(result)
    }

    fn display(&self, argv: &[&str]) -> String {
        self.escalation
            .iter()
            .map(String::as_str)
            .chain(argv.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn manual_instructions(&self, project: &str, services: &[EnabledService]) -> Vec<String> {
        let ip = &self.config.loopback;
        let domain = format!("{project}.local");
        let conf = self.config.config_file_name(project);

        let mut steps = vec![format!(
            "Add these lines to /etc/hosts:\n{}",
            required_hostnames(project, services)
                .iter()
                .map(|host| format!("   {ip} {host}"))
                .collect::<Vec<_>>()
                .join("\n")
        )];

        if self.platform.is_macos() {
            steps.push(format!(
                "Or, for wildcard domains, create /etc/resolver/{domain} containing `nameserver {ip}`"
            ));
            steps.push(format!(
                "Or install dnsmasq (`brew install dnsmasq`), write `address=/.{domain}/{ip}` \
                 to /usr/local/etc/dnsmasq.d/{conf} and run `sudo brew services restart dnsmasq`"
            ));
        } else {
            steps.push(format!(
                "Or install dnsmasq, write `address=/.{domain}/{ip}` to /etc/dnsmasq.d/{conf} \
                 and run `sudo systemctl restart dnsmasq`"
            ));
            steps.push(format!(
                "Or, with NetworkManager, set `dns=dnsmasq` in /etc/NetworkManager/NetworkManager.conf, \
                 write `address=/.{domain}/{ip}` to /etc/NetworkManager/dnsmasq.d/{conf} \
                 and run `sudo systemctl restart NetworkManager`"
            ));
            steps.push(format!(
                "Or, with systemd-resolved, write `[Resolve]`, `DNS={ip}` and `Domains=~{domain}` \
                 to /etc/systemd/resolved.conf.d/{conf} and run `sudo systemctl restart systemd-resolved`"
            ));
        }

        steps
            .into_iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {step}", i + 1))
            .collect()
    }
}
