//! Recording command runner for testing
//!
//! Every invocation is recorded as a single space-joined string. Responses
//! are chosen by the longest matching prefix; a rule with several outputs
//! hands them out in order and then repeats the last one. Anything without
//! a rule succeeds with empty output.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{CommandOutput, CommandRunner};
use crate::ProvisionError;

struct Rule {
    prefix: String,
    outputs: VecDeque<CommandOutput>,
}

/// Command runner that records calls instead of executing them
#[derive(Default)]
pub struct RecordingRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<String>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix` with `output`
    pub fn with_response(self, prefix: &str, output: CommandOutput) -> Self {
        self.with_sequence(prefix, vec![output])
    }

    /// Answer commands starting with `prefix` with `outputs` in turn
    pub fn with_sequence(self, prefix: &str, outputs: Vec<CommandOutput>) -> Self {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(Rule {
                prefix: prefix.to_string(),
                outputs: outputs.into(),
            });
        }
        self
    }

    /// All recorded invocations, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of invocations exactly equal to `command`
    pub fn count(&self, command: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == command).count()
    }

    /// Whether any invocation starts with `prefix`
    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    fn respond(&self, command: &str) -> CommandOutput {
        let Ok(mut rules) = self.rules.lock() else {
            return CommandOutput::ok("");
        };

        let rule = rules
            .iter_mut()
            .filter(|r| command.starts_with(&r.prefix))
            .max_by_key(|r| r.prefix.len());

        match rule {
            Some(rule) if rule.outputs.len() > 1 => rule.outputs.pop_front().unwrap_or_default(),
            Some(rule) => rule.outputs.front().cloned().unwrap_or_default(),
            None => CommandOutput::ok(""),
        }
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ProvisionError> {
        let command = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");

        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.clone());
        }

        Ok(self.respond(&command))
    }
}
