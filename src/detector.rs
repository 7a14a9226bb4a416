//! Live detection of usable DNS providers.
//!
//! Every check shells out through the [`CommandExecutor`] on each call and
//! keeps no state, so results always reflect the machine as it is now. A
//! probe command that fails counts as "capability absent"; nothing here
//! returns an error.

use crate::config::EngineConfig;
use crate::executor::CommandExecutor;
use crate::platform::Platform;
use crate::provider::{DetectedProvider, DnsProviderKind};

/// systemd-resolved's stub listener address.
const STUB_LISTENER_ADDR: &str = "127.0.0.53";

/// Addresses whose `:53` binding blocks a standalone dnsmasq.
const PORT_53_ADDRS: [&str; 2] = [STUB_LISTENER_ADDR, "127.0.0.1"];

const NETWORK_MANAGER_CONF: &str = "/etc/NetworkManager/NetworkManager.conf";

type Probe<E> = fn(&ProviderDetector<E>) -> bool;

/// Ranks the DNS mechanisms available on this machine.
pub struct ProviderDetector<E> {
    executor: E,
    config: EngineConfig,
    platform: Platform,
}

impl<E: CommandExecutor> ProviderDetector<E> {
    #[must_use]
    pub const fn new(executor: E, config: EngineConfig, platform: Platform) -> Self {
        Self {
            executor,
            config,
            platform,
        }
    }

    /// Every provider usable for `project`, best first.
    ///
    /// The hosts file is always included.
    pub fn detect_available(&self, project: &str) -> Vec<DetectedProvider> {
        let probes: [(Probe<E>, DnsProviderKind); 5] = [
            (|d| d.platform.is_macos(), DnsProviderKind::MacOsResolver),
            (|d| d.has_dnsmasq() && d.can_use_dnsmasq(), DnsProviderKind::Dnsmasq),
            (
                |d| d.has_network_manager() && d.has_network_manager_dnsmasq(),
                DnsProviderKind::NetworkManager,
            ),
            (
                |d| d.has_systemd_resolved() && !d.has_stub_listener_active(),
                DnsProviderKind::SystemdResolved,
            ),
            (|_| true, DnsProviderKind::HostsFile),
        ];

        let mut available: Vec<DetectedProvider> = probes
            .iter()
            .filter(|(probe, kind)| {
                let usable = probe(self);
                tracing::debug!(provider = %kind, usable, "Probed DNS provider");
                usable
            })
            .filter_map(|(_, kind)| self.detected(*kind, project))
            .collect();

        available.sort_by_key(|p| p.kind.priority());
        available
    }

    /// The highest-priority usable provider, if any.
    pub fn recommend(&self, project: &str) -> Option<DetectedProvider> {
        self.detect_available(project).into_iter().next()
    }

    /// `dnsmasq` is on `PATH`.
    pub fn has_dnsmasq(&self) -> bool {
        self.succeeds(&["which", "dnsmasq"])
    }

    /// dnsmasq is running as a managed service.
    pub fn is_dnsmasq_running(&self) -> bool {
        if self.platform.is_macos() {
            let result = self.executor.execute(&["brew", "services", "list"]);
            return result.success()
                && result.stdout.lines().any(|line| {
                    let mut cols = line.split_whitespace();
                    cols.next() == Some("dnsmasq") && cols.next() == Some("started")
                });
        }
        self.succeeds(&["systemctl", "is-active", "--quiet", "dnsmasq"])
    }

    /// Something already listens on `127.0.0.53:53` or `127.0.0.1:53`.
    pub fn is_port_53_occupied(&self) -> bool {
        self.listening_on_53(&PORT_53_ADDRS)
    }

    /// dnsmasq either already runs or could bind port 53.
    pub fn can_use_dnsmasq(&self) -> bool {
        self.is_dnsmasq_running() || !self.is_port_53_occupied()
    }

    pub fn has_systemd_resolved(&self) -> bool {
        self.succeeds(&["systemctl", "is-active", "--quiet", "systemd-resolved"])
    }

    pub fn has_network_manager(&self) -> bool {
        self.succeeds(&["systemctl", "is-active", "--quiet", "NetworkManager"])
    }

    /// `NetworkManager.conf` enables the dnsmasq plugin (`dns=dnsmasq`).
    pub fn has_network_manager_dnsmasq(&self) -> bool {
        let path = self.config.system_path(NETWORK_MANAGER_CONF);
        let path = path.to_string_lossy();
        let result = self.executor.execute(&["cat", &path]);
        result.success()
            && result.stdout.lines().any(|line| {
                let line = line.trim();
                !line.starts_with('#')
                    && line
                        .split_once('=')
                        .is_some_and(|(k, v)| k.trim() == "dns" && v.trim() == "dnsmasq")
            })
    }

    /// systemd-resolved's stub listener is bound to `127.0.0.53:53`.
    pub fn has_stub_listener_active(&self) -> bool {
        self.listening_on_53(&[STUB_LISTENER_ADDR])
    }

    fn listening_on_53(&self, addrs: &[&str]) -> bool {
        let result = self.executor.execute(&["ss", "-tlnp"]);
        result.success()
            && result
                .stdout
                .split_whitespace()
                .filter_map(parse_socket)
                .any(|(host, port)| port == "53" && addrs.contains(&host))
    }

    fn succeeds(&self, argv: &[&str]) -> bool {
        self.executor.execute(argv).success()
    }

    fn detected(&self, kind: DnsProviderKind, project: &str) -> Option<DetectedProvider> {
        match kind.config_path(&self.config, &self.platform, project) {
            Ok(Some(config_path)) => Some(DetectedProvider {
                kind,
                config_path,
                requires_elevated_privileges: kind.requires_elevated_privileges(),
            }),
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(provider = %kind, error = %e, "Provider has no config path here");
                None
            }
        }
    }
}

/// Splits an `ss` address column (`127.0.0.53%lo:53`) into host and port.
fn parse_socket(token: &str) -> Option<(&str, &str)> {
    let (host, port) = token.rsplit_once(':')?;
    let host = host.split_once('%').map_or(host, |(h, _)| h);
    Some((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ProcessResult;
    use crate::testing::ScriptedExecutor;
    use std::path::PathBuf;

    const SS_RESOLVED: &str = "State  Recv-Q Send-Q Local Address:Port Peer Address:Port\n\
        LISTEN 0      4096   127.0.0.53%lo:53        0.0.0.0:*\n";

    fn detector(fake: &ScriptedExecutor, platform: Platform) -> ProviderDetector<&ScriptedExecutor> {
        ProviderDetector::new(fake, EngineConfig::default(), platform)
    }

    fn kinds(providers: &[DetectedProvider]) -> Vec<DnsProviderKind> {
        providers.iter().map(|p| p.kind).collect()
    }

    #[test]
    fn hosts_file_is_always_available() {
        let fake = ScriptedExecutor::new();
        let d = detector(&fake, Platform::Linux);
        let available = d.detect_available("demo");

        assert_eq!(kinds(&available), vec![DnsProviderKind::HostsFile]);
        assert_eq!(available[0].config_path, PathBuf::from("/etc/hosts"));
        assert!(available[0].requires_elevated_privileges);
    }

    #[test]
    fn stub_listener_blocks_dnsmasq_and_resolved() {
        let fake = ScriptedExecutor::new()
            .on("ss -tlnp", ProcessResult::ok("LISTEN 0 4096 127.0.0.53:53 0.0.0.0:*\n"))
            .on("which dnsmasq", ProcessResult::ok("/usr/sbin/dnsmasq\n"))
            .on("systemctl is-active --quiet systemd-resolved", ProcessResult::ok(""));
        let d = detector(&fake, Platform::Linux);

        assert!(d.is_port_53_occupied());
        assert!(d.has_stub_listener_active());
        assert!(!d.can_use_dnsmasq());
        assert_eq!(kinds(&d.detect_available("demo")), vec![DnsProviderKind::HostsFile]);
    }

    #[test]
    fn interface_suffix_is_ignored() {
        let fake = ScriptedExecutor::new().on("ss -tlnp", ProcessResult::ok(SS_RESOLVED));
        assert!(detector(&fake, Platform::Linux).has_stub_listener_active());
    }

    #[test]
    fn port_5353_is_not_53() {
        let fake = ScriptedExecutor::new().on(
            "ss -tlnp",
            ProcessResult::ok("LISTEN 0 4096 127.0.0.1:5353 0.0.0.0:*\n"),
        );
        assert!(!detector(&fake, Platform::Linux).is_port_53_occupied());
    }

    #[test]
    fn failed_ss_means_port_free() {
        let fake = ScriptedExecutor::new().on("ss -tlnp", ProcessResult::failed(127, "not found"));
        assert!(!detector(&fake, Platform::Linux).is_port_53_occupied());
    }

    #[test]
    fn running_dnsmasq_is_usable_even_on_port_53() {
        let fake = ScriptedExecutor::new()
            .on("ss -tlnp", ProcessResult::ok("LISTEN 0 32 127.0.0.1:53 0.0.0.0:*\n"))
            .on("which dnsmasq", ProcessResult::ok("/usr/sbin/dnsmasq\n"))
            .on("systemctl is-active --quiet dnsmasq", ProcessResult::ok(""));
        let d = detector(&fake, Platform::Linux);

        assert!(d.is_port_53_occupied());
        assert!(d.can_use_dnsmasq());
        assert_eq!(
            kinds(&d.detect_available("demo")),
            vec![DnsProviderKind::Dnsmasq, DnsProviderKind::HostsFile]
        );
    }

    #[test]
    fn network_manager_requires_dnsmasq_plugin() {
        let conf = "[main]\n#dns=dnsmasq\nplugins=ifupdown\n";
        let fake = ScriptedExecutor::new()
            .on("systemctl is-active --quiet NetworkManager", ProcessResult::ok(""))
            .on("cat /etc/NetworkManager/NetworkManager.conf", ProcessResult::ok(conf));
        let d = detector(&fake, Platform::Linux);
        assert!(d.has_network_manager());
        assert!(!d.has_network_manager_dnsmasq());

        let fake = ScriptedExecutor::new()
            .on("systemctl is-active --quiet NetworkManager", ProcessResult::ok(""))
            .on(
                "cat /etc/NetworkManager/NetworkManager.conf",
                ProcessResult::ok("[main]\ndns = dnsmasq\n"),
            );
        assert_eq!(
            kinds(&detector(&fake, Platform::Linux).detect_available("demo")),
            vec![DnsProviderKind::NetworkManager, DnsProviderKind::HostsFile]
        );
    }

    #[test]
    fn everything_available_is_sorted_by_priority() {
        let fake = ScriptedExecutor::new()
            .on("which dnsmasq", ProcessResult::ok("/usr/local/bin/dnsmasq\n"))
            .on("systemctl is-active --quiet systemd-resolved", ProcessResult::ok(""))
            .on("systemctl is-active --quiet NetworkManager", ProcessResult::ok(""))
            .on(
                "cat /etc/NetworkManager/NetworkManager.conf",
                ProcessResult::ok("[main]\ndns=dnsmasq\n"),
            );
        let available = detector(&fake, Platform::Linux).detect_available("demo");

        assert_eq!(
            kinds(&available),
            vec![
                DnsProviderKind::Dnsmasq,
                DnsProviderKind::NetworkManager,
                DnsProviderKind::SystemdResolved,
                DnsProviderKind::HostsFile,
            ]
        );
        assert!(available.windows(2).all(|w| w[0].kind.priority() <= w[1].kind.priority()));
    }

    #[test]
    fn macos_prefers_resolver() {
        let fake = ScriptedExecutor::new()
            .on("which dnsmasq", ProcessResult::ok("/usr/local/bin/dnsmasq\n"))
            .on(
                "brew services list",
                ProcessResult::ok("Name    Status  User File\ndnsmasq started root ~/x.plist\n"),
            );
        let d = detector(&fake, Platform::MacOs);

        assert!(d.is_dnsmasq_running());
        let best = d.recommend("demo").unwrap();
        assert_eq!(best.kind, DnsProviderKind::MacOsResolver);
        assert_eq!(best.config_path, PathBuf::from("/etc/resolver/demo.local"));
        assert_eq!(
            kinds(&d.detect_available("demo")),
            vec![
                DnsProviderKind::MacOsResolver,
                DnsProviderKind::Dnsmasq,
                DnsProviderKind::HostsFile
            ]
        );
    }

    #[test]
    fn unsupported_platform_skips_dnsmasq() {
        let fake = ScriptedExecutor::new().on("which dnsmasq", ProcessResult::ok("/bin/dnsmasq\n"));
        let d = detector(&fake, Platform::from_os("freebsd"));
        assert_eq!(kinds(&d.detect_available("demo")), vec![DnsProviderKind::HostsFile]);
    }

    #[test]
    fn probes_are_not_cached() {
        let fake = ScriptedExecutor::new();
        let d = detector(&fake, Platform::Linux);
        d.has_dnsmasq();
        d.has_dnsmasq();
        assert_eq!(fake.calls_to("which dnsmasq"), 2);
    }
}
