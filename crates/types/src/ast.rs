//! Abstract syntax tree of a template.
//!
//! A template is an ordered list of statements. Each statement holds either a
//! bare command (`create instance subnet=$mysubnet`) or a declaration binding
//! an identifier to a command (`mysubnet = create subnet vpc=$myvpc`).
//!
//! The tree owns every node and value outright, so the derived `Clone` is a
//! full structural copy: nothing is shared between a template and its clone.

use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;

use crate::value::CompositeValue;

/// Ordered statements of one template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ast {
    /// Statements in source order; this is also execution order.
    pub statements: Vec<Statement>,
}

/// One line of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub node: Node,
}

/// Closed set of statement kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Declaration(DeclarationNode),
    Command(CommandNode),
}

/// Binds `identifier` to the outcome of `expr`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationNode {
    /// Case-sensitive name, unique within the template.
    pub identifier: String,
    pub expr: CommandNode,
}

/// An action applied to an entity, with named parameters.
///
/// `result` and `error` stay empty until an executor runs the command; after a
/// run, `error` is present exactly when the action failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandNode {
    /// Verb such as `create`, `delete`, `start`.
    pub action: String,
    /// Noun such as `vpc`, `subnet`, `instance`.
    pub entity: String,
    /// Parameters in authoring order.
    pub params: IndexMap<String, CompositeValue>,
    /// Opaque value returned by the acted-upon system, typically an identifier.
    pub result: Option<Value>,
    /// Failure message captured when the action did not succeed.
    pub error: Option<String>,
}

impl CommandNode {
    pub fn new(action: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            entity: entity.into(),
            ..Self::default()
        }
    }

    /// Adds or replaces a parameter, keeping the original position on replace.
    pub fn with_param(mut self, key: impl Into<String>, value: CompositeValue) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// `"<action> <entity>"`, the key used by statistics and policies.
    pub fn action_entity(&self) -> String {
        format!("{} {}", self.action, self.entity)
    }

    /// Records a successful run.
    pub fn record_success(&mut self, result: Value) {
        self.result = Some(result);
        self.error = None;
    }

    /// Records a failed run.
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.result = None;
        self.error = Some(message.into());
    }

    /// Forgets any previous outcome.
    pub fn clear_outcome(&mut self) {
        self.result = None;
        self.error = None;
    }

    /// True once an executor attached an outcome.
    pub fn has_run(&self) -> bool {
        self.result.is_some() || self.error.is_some()
    }

    /// True when the command ran without error.
    pub fn succeeded(&self) -> bool {
        self.has_run() && self.error.is_none()
    }

    /// Captured result when it is a non-empty string.
    pub fn result_text(&self) -> Option<&str> {
        match &self.result {
            Some(Value::String(text)) if !text.is_empty() => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for CommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.entity)?;
        for (key, value) in &self.params {
            write!(f, " {key}={value}")?;
        }
        Ok(())
    }
}

impl Statement {
    pub fn command(command: CommandNode) -> Self {
        Self {
            node: Node::Command(command),
        }
    }

    pub fn declaration(identifier: impl Into<String>, expr: CommandNode) -> Self {
        Self {
            node: Node::Declaration(DeclarationNode {
                identifier: identifier.into(),
                expr,
            }),
        }
    }

    /// The command carried by this statement, whatever its kind.
    pub fn command_node(&self) -> &CommandNode {
        match &self.node {
            Node::Declaration(declaration) => &declaration.expr,
            Node::Command(command) => command,
        }
    }

    pub fn command_node_mut(&mut self) -> &mut CommandNode {
        match &mut self.node {
            Node::Declaration(declaration) => &mut declaration.expr,
            Node::Command(command) => command,
        }
    }

    /// Identifier bound by this statement, if it is a declaration.
    pub fn declared_identifier(&self) -> Option<&str> {
        match &self.node {
            Node::Declaration(declaration) => Some(&declaration.identifier),
            Node::Command(_) => None,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Node::Declaration(declaration) => write!(f, "{} = {}", declaration.identifier, declaration.expr),
            Node::Command(command) => write!(f, "{command}"),
        }
    }
}

impl Ast {
    /// Builds a flat template of bare command statements.
    pub fn from_commands(commands: impl IntoIterator<Item = CommandNode>) -> Self {
        Self {
            statements: commands.into_iter().map(Statement::command).collect(),
        }
    }

    /// Every command in source order, looking through declarations.
    ///
    /// Execution, printing and statistics all walk the template through this
    /// iterator, so they observe the same ordering.
    pub fn command_nodes(&self) -> impl Iterator<Item = &CommandNode> + '_ {
        self.statements.iter().map(Statement::command_node)
    }

    /// Mutable counterpart of [`Ast::command_nodes`].
    pub fn command_nodes_mut(&mut self) -> impl Iterator<Item = &mut CommandNode> + '_ {
        self.statements.iter_mut().map(Statement::command_node_mut)
    }

    /// Number of commands in the template.
    pub fn command_count(&self) -> usize {
        self.statements.len()
    }

    /// Command bound to `identifier`, if declared.
    pub fn declaration(&self, identifier: &str) -> Option<&CommandNode> {
        self.statements.iter().find_map(|statement| match &statement.node {
            Node::Declaration(declaration) if declaration.identifier == identifier => Some(&declaration.expr),
            _ => None,
        })
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            writeln!(f, "{statement}")?;
        }
        Ok(())
    }
}

/// A template: an identity plus its tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    pub id: String,
    pub ast: Ast,
}

impl Template {
    pub fn new(id: impl Into<String>, ast: Ast) -> Self {
        Self { id: id.into(), ast }
    }
}
