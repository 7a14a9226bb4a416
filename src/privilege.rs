//! Privilege escalation for commands that touch system paths.

use crate::executor::{CommandExecutor, ProcessResult};
use std::cell::OnceCell;

/// Wraps a [`CommandExecutor`] and prefixes every command with `pkexec`
/// (when installed) or `sudo`.
///
/// The escalation tool is probed once with `which pkexec` and cached for
/// the lifetime of the value.
pub struct PrivilegedExecutor<E> {
    executor: E,
    prefix: OnceCell<Vec<String>>,
}

impl<E: CommandExecutor> PrivilegedExecutor<E> {
    #[must_use]
    pub const fn new(executor: E) -> Self {
        Self {
            executor,
            prefix: OnceCell::new(),
        }
    }

    /// The unprivileged executor underneath.
    pub const fn inner(&self) -> &E {
        &self.executor
    }

    /// `["pkexec"]` if `pkexec` is on `PATH`, otherwise `["sudo"]`.
    pub fn escalation_prefix(&self) -> &[String] {
        self.prefix.get_or_init(|| {
            let tool = if self.executor.execute(&["which", "pkexec"]).success() {
                "pkexec"
            } else {
                "sudo"
            };
            tracing::debug!(tool, "Selected privilege escalation tool");
            vec![tool.to_string()]
        })
    }

    /// Forgets the cached escalation tool so the next call probes again.
    pub fn reset_cache(&mut self) {
        self.prefix.take();
    }

    /// Runs `command` with the escalation prefix.
    pub fn execute(&self, command: &[&str]) -> ProcessResult {
        let prefix = self.escalation_prefix();
        let argv: Vec<&str> = prefix
            .iter()
            .map(String::as_str)
            .chain(command.iter().copied())
            .collect();
        self.executor.execute(&argv)
    }

    /// What [`execute`](Self::execute) would run, for display.
    pub fn as_display_string(&self, command: &[&str]) -> String {
        let mut parts = self.escalation_prefix().to_vec();
        parts.extend(command.iter().map(|s| (*s).to_string()));
        parts.join(" ")
    }
}
