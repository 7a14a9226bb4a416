//! # devstack-dns
//!
//! Make a local Docker development stack reachable under
//! `*.<project>.local` by configuring one of the DNS mechanisms the host
//! already has.
//!
//! The engine works in three steps:
//!
//! 1. [`ProviderDetector`] probes the live system (installed tools, active
//!    services, listening sockets) and ranks the usable providers.
//! 2. [`DnsManager::plan_configuration`] computes a side-effect-free
//!    [`DnsConfigurationResult`]: file path, content, restart command.
//! 3. [`DnsManager::apply`] writes it through a [`PrivilegedExecutor`];
//!    [`DnsManager::cleanup`] reverses it.
//!
//! Nothing is persisted between runs. Every call re-derives the state from
//! the system, so applying or cleaning up twice is a no-op the second time.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use devstack_dns::{DnsManager, EngineConfig, Platform, PrivilegedExecutor,
//!                    ProviderDetector, SystemExecutor};
//!
//! let config = EngineConfig::default();
//! let platform = Platform::current();
//!
//! let detector = ProviderDetector::new(SystemExecutor, config.clone(), platform.clone());
//! let provider = detector.recommend("shop").expect("hosts file is always available");
//!
//! let manager = DnsManager::new(config, platform)
//!     .with_privileged(PrivilegedExecutor::new(SystemExecutor));
//! let report = manager.apply("shop", provider.kind);
//! for message in &report.messages {
//!     println!("{message}");
//! }
//! ```
//!
//! ## Shared hosts file
//!
//! The hosts-file provider only appends a `# BEGIN <tool> - <project>` ...
//! `# END <tool> - <project>` block holding the missing entries, and cleanup
//! removes exactly that block. See [`hosts`].
//!
//! ## Permissions
//!
//! Every write to a system path is run through `pkexec` (if installed) or
//! `sudo`.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod detector;
pub mod error;
pub mod executor;
pub mod hosts;
pub mod manager;
pub mod plan;
pub mod platform;
pub mod privilege;
pub mod provider;
pub mod util;

#[cfg(test)]
mod testing;

pub use config::{EnabledService, EngineConfig, Exposure, ProjectFile};
pub use detector::ProviderDetector;
pub use error::{DnsError, Result};
pub use executor::{CommandExecutor, ProcessResult, SystemExecutor};
pub use manager::{DnsManager, OperationReport};
pub use plan::{DnsConfigurationResult, required_hostnames};
pub use platform::Platform;
pub use privilege::PrivilegedExecutor;
pub use provider::{DetectedProvider, DnsProviderKind};
