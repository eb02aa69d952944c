//! Template execution.
//!
//! Commands run one at a time in source order. Before a command runs, its
//! parameters are resolved against the values produced so far; a command whose
//! parameters cannot be resolved is marked failed without reaching the runner.
//! Outcomes are written onto the command nodes themselves.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info, warn};

use runbook_types::{Ast, Literal};

use crate::record::TemplateExecution;
use crate::resolve::{RunContext, resolve_parameters};
use crate::tracker::{OutcomeTally, tally};

/// Performs one action against the target system.
///
/// Implementations call cloud APIs, shell out, or fake results. The returned
/// value is captured on the command, typically the identifier of the resource
/// acted upon.
pub trait CommandRunner {
    fn run(&self, action: &str, entity: &str, params: &IndexMap<String, Literal>) -> Result<Value>;
}

/// Knobs for [`execute_template`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Leave the remaining commands unrun after the first failure.
    pub stop_on_error: bool,
}

/// Runs every command of `ast`, recording outcomes on the nodes.
///
/// Declarations are bound once their command ran, so later commands can
/// reference their results. Previous outcomes are discarded.
pub fn execute_template(
    ast: &mut Ast,
    fillers: &IndexMap<String, Literal>,
    runner: &dyn CommandRunner,
    options: ExecutionOptions,
) -> OutcomeTally {
    info!(command_count = ast.command_count(), "template execution started");
    let mut context = RunContext::with_fillers(fillers.clone());

    for statement in &mut ast.statements {
        let identifier = statement.declared_identifier().map(str::to_string);
        let command = statement.command_node_mut();
        command.clear_outcome();
        debug!(command = %command, "command execution started");

        match resolve_parameters(command, &context) {
            Ok(params) => match runner.run(&command.action, &command.entity, &params) {
                Ok(result) => {
                    debug!(action = %command.action, entity = %command.entity, "command execution succeeded");
                    command.record_success(result);
                }
                Err(error) => {
                    warn!(action = %command.action, entity = %command.entity, error = %error, "command execution failed");
                    command.record_failure(format!("{error:#}"));
                }
            },
            Err(error) => {
                warn!(action = %command.action, entity = %command.entity, error = %error, "command parameters unresolved");
                command.record_failure(error.to_string());
            }
        }

        let failed = command.error.is_some();
        if let Some(identifier) = identifier {
            context.bind(identifier, command);
        }
        if failed && options.stop_on_error {
            info!("stopping template execution after failure");
            break;
        }
    }

    let summary = tally(ast);
    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        "template execution finished"
    );
    summary
}

/// Runs a recorded execution's template with its own fillers.
pub fn run_execution(execution: &mut TemplateExecution, runner: &dyn CommandRunner, options: ExecutionOptions) -> OutcomeTally {
    let TemplateExecution { template, fillers, .. } = execution;
    execute_template(&mut template.ast, fillers, runner, options)
}

/// Dry-run runner that touches nothing.
///
/// `create` returns a synthetic identifier such as `vpc-sim-0001`; other
/// actions echo their `id` parameter when present. Failures can be scripted
/// per `"<action> <entity>"`.
#[derive(Debug, Default)]
pub struct SimulatedRunner {
    counter: AtomicUsize,
    failures: IndexMap<String, String>,
}

impl SimulatedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `action entity` command fail with `message`.
    pub fn failing_on(mut self, action_entity: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.insert(action_entity.into(), message.into());
        self
    }
}

impl CommandRunner for SimulatedRunner {
    fn run(&self, action: &str, entity: &str, params: &IndexMap<String, Literal>) -> Result<Value> {
        if let Some(message) = self.failures.get(&format!("{action} {entity}")) {
            return Err(anyhow!("{message}"));
        }

        if action == "create" {
            let sequence = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
            return Ok(Value::String(format!("{entity}-sim-{sequence:04}")));
        }

        Ok(params.get("id").map(Literal::to_json).unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_template;
    use runbook_types::TemplateError;
    use serde_json::json;
    use std::cell::RefCell;

    struct RecordingRunner {
        calls: RefCell<Vec<String>>,
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, action: &str, entity: &str, params: &IndexMap<String, Literal>) -> Result<Value> {
            let rendered: Vec<String> = params.iter().map(|(key, value)| format!("{key}={value}")).collect();
            self.calls.borrow_mut().push(format!("{action} {entity} {}", rendered.join(" ")));
            Ok(json!(format!("{entity}-1")))
        }
    }

    #[test]
    fn references_see_earlier_results() {
        let mut ast = parse_template("myvpc = create vpc cidr=10.0.0.0/16\ncreate subnet vpc=$myvpc\n").unwrap();
        let runner = RecordingRunner { calls: RefCell::new(Vec::new()) };
        let summary = execute_template(&mut ast, &IndexMap::new(), &runner, ExecutionOptions::default());

        assert_eq!(summary, OutcomeTally { succeeded: 2, failed: 0 });
        assert_eq!(*runner.calls.borrow(), ["create vpc cidr=10.0.0.0/16", "create subnet vpc=vpc-1"]);
    }

    #[test]
    fn missing_filler_fails_command_without_running_it() {
        let mut ast = parse_template("create vpc name={vpc.name}\ncreate keypair name=k\n").unwrap();
        let runner = RecordingRunner { calls: RefCell::new(Vec::new()) };
        execute_template(&mut ast, &IndexMap::new(), &runner, ExecutionOptions::default());

        let commands: Vec<_> = ast.command_nodes().collect();
        let expected = TemplateError::MissingInput { hole: "vpc.name".into() }.to_string();
        assert_eq!(commands[0].error.as_deref(), Some(expected.as_str()));
        assert!(commands[1].succeeded());
        assert_eq!(*runner.calls.borrow(), ["create keypair name=k"]);
    }

    #[test]
    fn failed_declaration_fails_dependents() {
        let mut ast = parse_template("myvpc = create vpc cidr=10.0.0.0/16\ncreate subnet vpc=$myvpc\n").unwrap();
        let runner = SimulatedRunner::new().failing_on("create vpc", "quota exceeded");
        let summary = execute_template(&mut ast, &IndexMap::new(), &runner, ExecutionOptions::default());

        assert_eq!(summary, OutcomeTally { succeeded: 0, failed: 2 });
        let commands: Vec<_> = ast.command_nodes().collect();
        assert_eq!(commands[0].error.as_deref(), Some("quota exceeded"));
        assert!(commands[1].error.as_deref().unwrap().contains("$myvpc"));
    }

    #[test]
    fn stop_on_error_leaves_rest_unrun() {
        let mut ast = parse_template("create vpc cidr=10.0.0.0/16\ncreate subnet cidr=10.0.1.0/24\n").unwrap();
        let runner = SimulatedRunner::new().failing_on("create vpc", "boom");
        execute_template(&mut ast, &IndexMap::new(), &runner, ExecutionOptions { stop_on_error: true });

        let commands: Vec<_> = ast.command_nodes().collect();
        assert!(commands[0].error.is_some());
        assert!(!commands[1].has_run());
    }

    #[test]
    fn simulated_runner_synthesizes_identifiers() {
        let runner = SimulatedRunner::new();
        let mut params = IndexMap::new();
        assert_eq!(runner.run("create", "vpc", &params).unwrap(), json!("vpc-sim-0001"));
        assert_eq!(runner.run("create", "subnet", &params).unwrap(), json!("subnet-sim-0002"));

        params.insert("id".to_string(), Literal::from("i-1"));
        assert_eq!(runner.run("stop", "instance", &params).unwrap(), json!("i-1"));
    }
}
