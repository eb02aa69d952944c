//! # Execution Records
//!
//! A [`TemplateExecution`] is one run of a template: the executed tree with
//! every command's outcome, who ran it and where, and the fillers supplied
//! for its holes. Records are persisted as JSON keyed by their identity:
//!
//! ```json
//! {
//!   "id": "01BX5ZZKBKACTAV9WEVGEMMVRZ",
//!   "author": "ops",
//!   "source": "create vpc cidr=10.0.0.0/16",
//!   "locale": "eu-west-1",
//!   "profile": "prod",
//!   "fillers": {},
//!   "commands": [{ "line": "create vpc cidr=10.0.0.0/16", "results": ["vpc-1"] }]
//! }
//! ```
//!
//! Each command is stored as its canonical line, with references and holes
//! replaced by the values they had during the run. Reloading a record yields a
//! flat list of bare commands; declaration identifiers are not kept.
//! Commands the run never reached are stored with `"pending": true`.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use runbook_types::{Ast, CommandNode, CompositeValue, Literal, Node, Template, TemplateError};

use crate::identity::{ExecutionId, date_of};
use crate::parser::parse_statement;
use crate::revert::ReversibilityPolicy;
use crate::tracker::{self, OutcomeTally};

/// Who runs a new execution, and against what.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunMetadata {
    pub author: String,
    /// Template text the execution was created from.
    pub source: String,
    pub locale: String,
    pub profile: String,
}

/// One run of a template, as recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "StoredExecution", try_from = "StoredExecution")]
pub struct TemplateExecution {
    pub template: Template,
    pub author: String,
    pub source: String,
    pub locale: String,
    pub profile: String,
    /// Values supplied for holes, keyed by hole name.
    pub fillers: IndexMap<String, Literal>,
}

impl TemplateExecution {
    /// New execution of `ast` under a freshly allocated identity.
    pub fn start(ast: Ast, metadata: RunMetadata) -> Self {
        Self {
            template: Template::new(ExecutionId::new().to_string(), ast),
            author: metadata.author,
            source: metadata.source,
            locale: metadata.locale,
            profile: metadata.profile,
            fillers: IndexMap::new(),
        }
    }

    pub fn with_fillers(mut self, fillers: IndexMap<String, Literal>) -> Self {
        self.fillers = fillers;
        self
    }

    pub fn id(&self) -> &str {
        &self.template.id
    }

    /// Creation time, read back from the identity.
    pub fn date(&self) -> Result<DateTime<Utc>, TemplateError> {
        date_of(&self.template.id)
    }

    /// Command counts per `"<action> <entity>"`.
    pub fn stats(&self) -> IndexMap<String, usize> {
        tracker::stats(&self.template.ast)
    }

    pub fn tally(&self) -> OutcomeTally {
        tracker::tally(&self.template.ast)
    }

    pub fn is_revertible(&self, policy: &ReversibilityPolicy) -> bool {
        tracker::is_revertible(&self.template.ast, policy)
    }

    /// Serialized JSON record.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).with_context(|| format!("failed to encode template execution {}", self.id()))
    }

    /// Decodes a stored record.
    ///
    /// # Errors
    ///
    /// [`TemplateError::Decode`] when the bytes are not a record, a command
    /// line does not parse, or the identity is malformed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TemplateError> {
        let stored: StoredExecution = serde_json::from_slice(bytes).map_err(|error| TemplateError::decode(error.to_string()))?;
        Self::try_from(stored)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct StoredExecution {
    id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    author: String,
    source: String,
    locale: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    profile: String,
    fillers: IndexMap<String, Literal>,
    commands: Vec<StoredCommand>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct StoredCommand {
    line: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    results: Vec<String>,
    /// Set on commands the run never reached.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pending: bool,
}

impl From<TemplateExecution> for StoredExecution {
    fn from(execution: TemplateExecution) -> Self {
        let captured = captured_results(&execution.template.ast);
        let commands = execution
            .template
            .ast
            .command_nodes()
            .map(|command| StoredCommand {
                line: executed_line(command, &captured, &execution.fillers),
                errors: command.error.iter().cloned().collect(),
                results: command.result_text().map(str::to_string).into_iter().collect(),
                pending: !command.has_run(),
            })
            .collect();

        Self {
            id: execution.template.id,
            author: execution.author,
            source: execution.source,
            locale: execution.locale,
            profile: execution.profile,
            fillers: execution.fillers,
            commands,
        }
    }
}

impl TryFrom<StoredExecution> for TemplateExecution {
    type Error = TemplateError;

    fn try_from(stored: StoredExecution) -> Result<Self, Self::Error> {
        date_of(&stored.id)?;

        let mut commands = Vec::with_capacity(stored.commands.len());
        for (index, stored_command) in stored.commands.into_iter().enumerate() {
            let mut command = match parse_statement(&stored_command.line) {
                Ok(Node::Command(command)) => command,
                Ok(Node::Declaration(declaration)) => declaration.expr,
                Err(error) => return Err(TemplateError::decode(format!("command {}: {error}", index + 1))),
            };
            command.result = stored_command.results.into_iter().next().map(Value::String);
            command.error = stored_command.errors.into_iter().next();
            // Non-text results are not stored; the command still ran.
            if !stored_command.pending && !command.has_run() {
                command.result = Some(Value::Null);
            }
            commands.push(command);
        }

        Ok(Self {
            template: Template::new(stored.id, Ast::from_commands(commands)),
            author: stored.author,
            source: stored.source,
            locale: stored.locale,
            profile: stored.profile,
            fillers: stored.fillers,
        })
    }
}

fn captured_results(ast: &Ast) -> HashMap<&str, Literal> {
    ast.statements
        .iter()
        .filter_map(|statement| {
            let identifier = statement.declared_identifier()?;
            let command = statement.command_node();
            if command.error.is_some() {
                return None;
            }
            let literal = command.result.as_ref().and_then(Literal::from_json)?;
            Some((identifier, literal))
        })
        .collect()
}

/// Canonical line with references and holes replaced by the values they had
/// during the run. Values that were never available stay symbolic.
fn executed_line(command: &CommandNode, captured: &HashMap<&str, Literal>, fillers: &IndexMap<String, Literal>) -> String {
    let mut frozen = CommandNode::new(command.action.clone(), command.entity.clone());
    for (key, value) in &command.params {
        let concrete = match value {
            CompositeValue::Reference(identifier) => captured.get(identifier.as_str()).cloned(),
            CompositeValue::Hole(name) => fillers.get(name).cloned(),
            CompositeValue::Interface(_) => None,
        }
        .filter(Literal::is_representable);
        let value = concrete.map(CompositeValue::Interface).unwrap_or_else(|| value.clone());
        frozen.params.insert(key.clone(), value);
    }
    frozen.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_template;
    use serde_json::json;

    fn sample_execution() -> TemplateExecution {
        let mut ast = parse_template("myvpc = create vpc cidr=10.0.0.0/16\ncreate subnet vpc=$myvpc name={subnet.name}\n").unwrap();
        let mut commands = ast.command_nodes_mut();
        commands.next().unwrap().record_success(json!("vpc-1"));
        commands.next().unwrap().record_failure("quota exceeded");
        drop(commands);

        let mut fillers = IndexMap::new();
        fillers.insert("subnet.name".to_string(), Literal::from("front"));

        TemplateExecution::start(
            ast,
            RunMetadata {
                author: "ops".into(),
                source: "create vpc".into(),
                locale: "eu-west-1".into(),
                profile: String::new(),
            },
        )
        .with_fillers(fillers)
    }

    #[test]
    fn serializes_wire_format() {
        let execution = sample_execution();
        let value: Value = serde_json::from_slice(&execution.to_bytes().unwrap()).unwrap();

        assert_eq!(value["id"], json!(execution.id()));
        assert_eq!(value["author"], json!("ops"));
        assert!(value.get("profile").is_none());
        assert_eq!(value["fillers"], json!({"subnet.name": "front"}));
        assert_eq!(
            value["commands"],
            json!([
                {"line": "create vpc cidr=10.0.0.0/16", "results": ["vpc-1"]},
                {"line": "create subnet vpc=vpc-1 name=front", "errors": ["quota exceeded"]},
            ])
        );
    }

    #[test]
    fn empty_fillers_serialize_as_empty_object() {
        let execution = TemplateExecution::start(Ast::default(), RunMetadata::default());
        let value: Value = serde_json::from_slice(&execution.to_bytes().unwrap()).unwrap();
        assert_eq!(value["fillers"], json!({}));
        assert_eq!(value["commands"], json!([]));
    }

    #[test]
    fn reload_flattens_declarations() {
        let execution = sample_execution();
        let reloaded = TemplateExecution::from_bytes(&execution.to_bytes().unwrap()).unwrap();

        assert_eq!(reloaded.id(), execution.id());
        assert_eq!(reloaded.fillers, execution.fillers);
        assert!(reloaded.template.ast.statements.iter().all(|statement| statement.declared_identifier().is_none()));

        let commands: Vec<_> = reloaded.template.ast.command_nodes().collect();
        assert_eq!(commands[0].result, Some(json!("vpc-1")));
        assert_eq!(commands[1].error.as_deref(), Some("quota exceeded"));
        assert_eq!(commands[1].to_string(), "create subnet vpc=vpc-1 name=front");
        assert_eq!(reloaded.stats(), execution.stats());
    }

    #[test]
    fn non_string_results_are_not_stored() {
        let mut command = CommandNode::new("create", "vpc");
        command.record_success(json!({"id": "vpc-1"}));
        let execution = TemplateExecution::start(Ast::from_commands([command]), RunMetadata::default());
        let value: Value = serde_json::from_slice(&execution.to_bytes().unwrap()).unwrap();
        assert!(value["commands"][0].get("results").is_none());
    }

    #[test]
    fn date_comes_from_identity() {
        let execution = sample_execution();
        let stamp = execution.date().unwrap().timestamp_millis();
        assert!((Utc::now().timestamp_millis() - stamp).abs() < 60_000);
    }

    #[test]
    fn decode_failures_are_reported() {
        assert!(matches!(TemplateExecution::from_bytes(b"not json"), Err(TemplateError::Decode { .. })));

        let bad_line = json!({"id": ExecutionId::new().to_string(), "commands": [{"line": "Create vpc"}]});
        let error = TemplateExecution::from_bytes(bad_line.to_string().as_bytes()).unwrap_err();
        assert!(matches!(error, TemplateError::Decode { reason } if reason.starts_with("command 1")));

        let bad_id = json!({"id": "nope", "commands": []});
        assert!(matches!(TemplateExecution::from_bytes(bad_id.to_string().as_bytes()), Err(TemplateError::Decode { .. })));
    }

    #[test]
    fn nested_list_results_stay_symbolic() {
        let mut ast = parse_template("zones = create vpc cidr=10.0.0.0/16
create subnet zones=$zones
").unwrap();
        let mut commands = ast.command_nodes_mut();
        commands.next().unwrap().record_success(json!([["a", "b"]]));
        commands.next().unwrap().record_success(json!("subnet-1"));
        drop(commands);
        let execution = TemplateExecution::start(ast, RunMetadata::default());

        let bytes = execution.to_bytes().unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["commands"][1]["line"], json!("create subnet zones=$zones"));

        let reloaded = TemplateExecution::from_bytes(&bytes).unwrap();
        let commands: Vec<_> = reloaded.template.ast.command_nodes().collect();
        assert_eq!(commands[1].to_string(), "create subnet zones=$zones");
        assert_eq!(commands[1].result, Some(json!("subnet-1")));
    }

    #[test]
    fn decode_keeps_both_error_and_result() {
        let stored = json!({
            "id": ExecutionId::new().to_string(),
            "commands": [{"line": "create vpc cidr=10.0.0.0/16", "errors": ["partial failure"], "results": ["vpc-1"]}],
        });
        let execution = TemplateExecution::from_bytes(stored.to_string().as_bytes()).unwrap();
        let command = execution.template.ast.command_nodes().next().unwrap();
        assert_eq!(command.result, Some(json!("vpc-1")));
        assert_eq!(command.error.as_deref(), Some("partial failure"));
    }

    #[test]
    fn unreached_commands_reload_as_not_run() {
        let mut ast = parse_template("create vpc cidr=10.0.0.0/16
start instance id=i-1
").unwrap();
        ast.command_nodes_mut().next().unwrap().record_failure("boom");
        let execution = TemplateExecution::start(ast, RunMetadata::default());

        let bytes = execution.to_bytes().unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(value["commands"][0].get("pending").is_none());
        assert_eq!(value["commands"][1]["pending"], json!(true));

        let reloaded = TemplateExecution::from_bytes(&bytes).unwrap();
        let commands: Vec<_> = reloaded.template.ast.command_nodes().collect();
        assert_eq!(commands[0].error.as_deref(), Some("boom"));
        assert!(!commands[1].has_run());
    }

    #[test]
    fn lines_without_outcome_reload_as_run() {
        let stored = json!({"id": ExecutionId::new().to_string(), "commands": [{"line": "start instance id=i-1"}]});
        let execution = TemplateExecution::from_bytes(stored.to_string().as_bytes()).unwrap();
        let command = execution.template.ast.command_nodes().next().unwrap();
        assert!(command.succeeded());
        assert_eq!(command.result, Some(Value::Null));
    }
}
