//! External command execution.

use std::process::Command;
use std::sync::Arc;

/// Outcome of a finished external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessResult {
    /// A zero-exit result with the given stdout.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed result with the given exit code and stderr.
    #[must_use]
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs argv-style commands.
///
/// Implementations must not panic or error on a nonzero exit: a nonzero
/// exit code is how probes report "no".
pub trait CommandExecutor {
    fn execute(&self, argv: &[&str]) -> ProcessResult;
}

impl<E: CommandExecutor + ?Sized> CommandExecutor for &E {
    fn execute(&self, argv: &[&str]) -> ProcessResult {
        (**self).execute(argv)
    }
}

impl<E: CommandExecutor + ?Sized> CommandExecutor for Box<E> {
    fn execute(&self, argv: &[&str]) -> ProcessResult {
        (**self).execute(argv)
    }
}

impl<E: CommandExecutor + ?Sized> CommandExecutor for Arc<E> {
    fn execute(&self, argv: &[&str]) -> ProcessResult {
        (**self).execute(argv)
    }
}

/// Exit code reported when a command cannot be spawned at all.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

/// Executes commands with [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl CommandExecutor for SystemExecutor {
    fn execute(&self, argv: &[&str]) -> ProcessResult {
        let Some((program, args)) = argv.split_first() else {
            return ProcessResult::failed(SPAWN_FAILURE_EXIT_CODE, "empty command");
        };

        match Command::new(program).args(args).output() {
            Ok(output) => ProcessResult {
                // Killed by a signal: no code, report as generic failure.
                exit_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
            Err(e) => {
                tracing::debug!(program = %program, error = %e, "Failed to spawn command");
                ProcessResult::failed(SPAWN_FAILURE_EXIT_CODE, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_argv_fails() {
        let r = SystemExecutor.execute(&[]);
        assert_eq!(r.exit_code, SPAWN_FAILURE_EXIT_CODE);
        assert!(!r.success());
    }

    #[test]
    fn missing_binary_is_not_a_panic() {
        let r = SystemExecutor.execute(&["definitely-not-a-real-binary-4711"]);
        assert_eq!(r.exit_code, SPAWN_FAILURE_EXIT_CODE);
        assert!(!r.stderr.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout_and_exit_code() {
        let r = SystemExecutor.execute(&["sh", "-c", "echo hello; exit 3"]);
        assert_eq!(r.exit_code, 3);
        assert_eq!(r.stdout, "hello\n");
    }

    #[test]
    fn references_forward() {
        struct Fixed;
        impl CommandExecutor for Fixed {
            fn execute(&self, _argv: &[&str]) -> ProcessResult {
                ProcessResult::ok("x")
            }
        }

        let fixed = Fixed;
        let by_ref: &dyn CommandExecutor = &fixed;
        assert_eq!((&by_ref).execute(&["a"]).stdout, "x");
        assert_eq!(Arc::new(Fixed).execute(&["a"]).stdout, "x");
    }
}
