//! # Revert Generation
//!
//! Builds the template that undoes an executed template.
//!
//! Each command is mapped to its inverse through a [`ReversibilityPolicy`].
//! The generated template runs the inverses in reverse order of the original
//! commands, skips commands that failed or never ran, and no longer depends on
//! the original run: references and holes are replaced by the concrete values
//! captured during that run.
//!
//! ```text
//! myvpc = create vpc cidr=10.0.0.0/16        -> [vpc-1]
//! create subnet vpc=$myvpc cidr=10.0.1.0/24  -> [subnet-1]
//! start instance id=i-1
//!
//! stop instance id=i-1
//! delete subnet id=subnet-1
//! delete vpc id=vpc-1
//! ```

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;

use runbook_types::{Ast, CommandNode, CompositeValue, Literal, Template, TemplateError};

use crate::identity::ExecutionId;
use crate::record::TemplateExecution;

/// How the parameters of a command carry over to its inverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRewrite {
    /// Parameters are replaced by `id=<captured result>` of the original command.
    TargetResult,
    /// Parameters are kept as they are.
    Keep,
}

/// Inverse of one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inverse {
    pub action: String,
    pub params: ParamRewrite,
}

impl Inverse {
    pub fn new(action: impl Into<String>, params: ParamRewrite) -> Self {
        Self {
            action: action.into(),
            params,
        }
    }
}

/// Table of inverse actions.
///
/// Lookups check `(action, entity)` overrides first, then the per-action
/// table. Actions absent from both have no inverse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReversibilityPolicy {
    actions: HashMap<String, Inverse>,
    overrides: HashMap<(String, String), Inverse>,
}

impl ReversibilityPolicy {
    /// Policy without any inverse.
    pub fn empty() -> Self {
        Self {
            actions: HashMap::new(),
            overrides: HashMap::new(),
        }
    }

    /// Registers the inverse of `action` for every entity.
    pub fn with_action(mut self, action: impl Into<String>, inverse: Inverse) -> Self {
        self.actions.insert(action.into(), inverse);
        self
    }

    /// Registers the inverse of `action` for `entity` only.
    pub fn with_override(mut self, action: impl Into<String>, entity: impl Into<String>, inverse: Inverse) -> Self {
        self.overrides.insert((action.into(), entity.into()), inverse);
        self
    }

    /// Inverse of `action` applied to `entity`, if any.
    pub fn lookup(&self, action: &str, entity: &str) -> Option<&Inverse> {
        self.overrides
            .get(&(action.to_string(), entity.to_string()))
            .or_else(|| self.actions.get(action))
    }
}

impl Default for ReversibilityPolicy {
    /// `create` becomes `delete id=<result>`; `start`/`stop` and
    /// `attach`/`detach` swap with their parameters kept; `create tag` becomes
    /// `delete tag` with its parameters kept.
    fn default() -> Self {
        Self::empty()
            .with_action("create", Inverse::new("delete", ParamRewrite::TargetResult))
            .with_action("start", Inverse::new("stop", ParamRewrite::Keep))
            .with_action("stop", Inverse::new("start", ParamRewrite::Keep))
            .with_action("attach", Inverse::new("detach", ParamRewrite::Keep))
            .with_action("detach", Inverse::new("attach", ParamRewrite::Keep))
            .with_override("create", "tag", Inverse::new("delete", ParamRewrite::Keep))
    }
}

/// Generates the revert of an executed template.
///
/// Holes are left in place; use [`generate_revert_for_execution`] to freeze
/// them to recorded fillers.
///
/// # Errors
///
/// [`TemplateError::NotRevertible`] when a command has no inverse, or when a
/// value the inverse needs was never captured. Nothing is generated in that
/// case.
pub fn generate_revert(template: &Template, policy: &ReversibilityPolicy) -> Result<Template, TemplateError> {
    let ast = revert_ast(&template.ast, policy, None)?;
    Ok(Template::new(ExecutionId::new().to_string(), ast))
}

/// Generates the revert of a recorded execution, freezing holes to the fillers
/// the execution used.
pub fn generate_revert_for_execution(execution: &TemplateExecution, policy: &ReversibilityPolicy) -> Result<Template, TemplateError> {
    let ast = revert_ast(&execution.template.ast, policy, Some(&execution.fillers))?;
    Ok(Template::new(ExecutionId::new().to_string(), ast))
}

fn revert_ast(ast: &Ast, policy: &ReversibilityPolicy, fillers: Option<&IndexMap<String, Literal>>) -> Result<Ast, TemplateError> {
    if let Some(command) = ast
        .command_nodes()
        .find(|command| policy.lookup(&command.action, &command.entity).is_none())
    {
        return Err(not_revertible(command, "action has no inverse"));
    }

    let commands: Vec<&CommandNode> = ast.command_nodes().collect();
    let mut reverted = Vec::with_capacity(commands.len());
    let mut skipped = 0usize;

    for command in commands.into_iter().rev() {
        if !command.succeeded() {
            skipped += 1;
            continue;
        }
        let Some(inverse) = policy.lookup(&command.action, &command.entity) else {
            return Err(not_revertible(command, "action has no inverse"));
        };
        reverted.push(invert_command(command, inverse, ast, fillers)?);
    }

    debug!(reverted = reverted.len(), skipped, "revert template generated");
    Ok(Ast::from_commands(reverted))
}

fn invert_command(
    command: &CommandNode,
    inverse: &Inverse,
    original: &Ast,
    fillers: Option<&IndexMap<String, Literal>>,
) -> Result<CommandNode, TemplateError> {
    let mut reverted = CommandNode::new(inverse.action.clone(), command.entity.clone());

    match inverse.params {
        ParamRewrite::TargetResult => {
            let target = command
                .result
                .as_ref()
                .and_then(Literal::from_json)
                .ok_or_else(|| not_revertible(command, "no captured result identifies the created resource"))?;
            reverted.params.insert("id".to_string(), CompositeValue::Interface(target));
        }
        ParamRewrite::Keep => {
            for (key, value) in &command.params {
                let frozen = freeze_value(value, command, original, fillers)?;
                reverted.params.insert(key.clone(), frozen);
            }
        }
    }

    Ok(reverted)
}

fn freeze_value(
    value: &CompositeValue,
    command: &CommandNode,
    original: &Ast,
    fillers: Option<&IndexMap<String, Literal>>,
) -> Result<CompositeValue, TemplateError> {
    match value {
        CompositeValue::Interface(_) => Ok(value.clone()),
        CompositeValue::Reference(identifier) => original
            .declaration(identifier)
            .and_then(|declared| declared.result.as_ref())
            .and_then(Literal::from_json)
            .map(CompositeValue::Interface)
            .ok_or_else(|| not_revertible(command, &format!("reference ${identifier} has no captured result"))),
        CompositeValue::Hole(name) => Ok(fillers
            .and_then(|fillers| fillers.get(name))
            .filter(|filler| filler.is_representable())
            .map(|filler| CompositeValue::Interface(filler.clone()))
            .unwrap_or_else(|| value.clone())),
    }
}

fn not_revertible(command: &CommandNode, reason: &str) -> TemplateError {
    TemplateError::NotRevertible {
        action: command.action.clone(),
        entity: command.entity.clone(),
        reason: reason.to_string(),
    }
}
