//! Scripted executor shared by unit tests.

use crate::executor::{CommandExecutor, ProcessResult};
use std::cell::RefCell;
use std::collections::HashMap;

/// Answers commands from a table keyed by the space-joined argv.
/// Unknown commands exit with status 1.
#[derive(Default)]
pub struct ScriptedExecutor {
    responses: HashMap<String, ProcessResult>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, command: &str, result: ProcessResult) -> Self {
        self.responses.insert(command.to_string(), result);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn calls_to(&self, command: &str) -> usize {
        self.calls.borrow().iter().filter(|c| *c == command).count()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(&self, argv: &[&str]) -> ProcessResult {
        let joined = argv.join(" ");
        self.calls.borrow_mut().push(joined.clone());
        self.responses
            .get(&joined)
            .cloned()
            .unwrap_or_else(|| ProcessResult::failed(1, ""))
    }
}
