//! # Value Resolution
//!
//! Turns parameter values into concrete literals at execution time.
//!
//! - `count=3` resolves to itself
//! - `vpc=$myvpc` resolves to the result captured on the command bound to
//!   `myvpc`, once that command has run successfully
//! - `name={vpc.name}` resolves to the filler supplied for the hole
//!
//! Resolution is a pure function of the value and the [`RunContext`]; it never
//! mutates either.
//!
//! ## Usage
//!
//! ```rust
//! use runbook_engine::resolve::{RunContext, resolve};
//! use runbook_types::{CommandNode, CompositeValue, Literal};
//! use serde_json::json;
//!
//! let mut vpc = CommandNode::new("create", "vpc");
//! vpc.record_success(json!("vpc-123"));
//!
//! let mut context = RunContext::default();
//! context.bind("myvpc", &vpc);
//! context.fillers.insert("subnet.name".into(), Literal::from("frontend"));
//!
//! assert_eq!(resolve(&CompositeValue::reference("myvpc"), &context).unwrap(), Literal::from("vpc-123"));
//! assert_eq!(resolve(&CompositeValue::hole("subnet.name"), &context).unwrap(), Literal::from("frontend"));
//! ```

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;

use runbook_types::{Ast, CommandNode, CompositeValue, Literal, TemplateError};

/// Execution context for resolving parameter values.
#[derive(Debug, Default, Clone)]
pub struct RunContext {
    /// Command most recently bound to each declared identifier.
    ///
    /// Entries are snapshots taken after the declaring command ran, so they
    /// carry its result or error.
    pub declarations: HashMap<String, CommandNode>,

    /// Values supplied for holes, keyed by hole name.
    pub fillers: IndexMap<String, Literal>,
}

impl RunContext {
    /// Creates a context with the provided fillers and no bindings.
    pub fn with_fillers(fillers: IndexMap<String, Literal>) -> Self {
        Self {
            declarations: HashMap::new(),
            fillers,
        }
    }

    /// Binds `identifier` to a snapshot of `command`, replacing earlier bindings.
    pub fn bind(&mut self, identifier: impl Into<String>, command: &CommandNode) {
        self.declarations.insert(identifier.into(), command.clone());
    }
}

/// Resolves a single value.
///
/// # Errors
///
/// - [`TemplateError::UnresolvedReference`] when the referenced declaration is
///   unknown, has not run, ran with an error, or produced a result that is not
///   a literal (null or an object)
/// - [`TemplateError::MissingInput`] when a hole has no filler; there is no
///   default value
pub fn resolve(value: &CompositeValue, context: &RunContext) -> Result<Literal, TemplateError> {
    match value {
        CompositeValue::Interface(literal) => Ok(literal.clone()),
        CompositeValue::Reference(identifier) => resolve_reference(identifier, context),
        CompositeValue::Hole(name) => context
            .fillers
            .get(name)
            .cloned()
            .ok_or_else(|| TemplateError::MissingInput { hole: name.clone() }),
    }
}

fn resolve_reference(identifier: &str, context: &RunContext) -> Result<Literal, TemplateError> {
    let unresolved = |reason: &str| TemplateError::UnresolvedReference {
        identifier: identifier.to_string(),
        reason: reason.to_string(),
    };

    let command = context
        .declarations
        .get(identifier)
        .ok_or_else(|| unresolved("identifier is not bound"))?;

    if command.error.is_some() {
        return Err(unresolved("declaration ran with an error"));
    }
    let result = command.result.as_ref().ok_or_else(|| unresolved("declaration has not produced a result"))?;
    Literal::from_json(result).ok_or_else(|| unresolved("declaration result is not a literal value"))
}

/// Resolves every parameter of `command`, keeping parameter order.
///
/// Stops at the first parameter that cannot be resolved.
pub fn resolve_parameters(command: &CommandNode, context: &RunContext) -> Result<IndexMap<String, Literal>, TemplateError> {
    command
        .params
        .iter()
        .map(|(key, value)| resolve(value, context).map(|literal| (key.clone(), literal)))
        .collect()
}

/// Hole names used anywhere in the template that have no filler yet.
///
/// Callers use this to prompt for input before running a template.
pub fn missing_fillers(ast: &Ast, fillers: &IndexMap<String, Literal>) -> Vec<String> {
    let holes: BTreeSet<&str> = ast
        .command_nodes()
        .flat_map(|command| command.params.values())
        .filter_map(CompositeValue::as_hole)
        .filter(|name| !fillers.contains_key(*name))
        .collect();
    holes.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use runbook_types::Statement;
    use serde_json::json;

    #[test]
    fn literal_resolves_to_itself() {
        let value = CompositeValue::literal(vec![Literal::from("a"), Literal::from(1i64)]);
        let resolved = resolve(&value, &RunContext::default()).unwrap();
        assert_eq!(resolved, Literal::List(vec![Literal::from("a"), Literal::from(1i64)]));
    }

    #[test]
    fn missing_hole_fails_without_default() {
        let error = resolve(&CompositeValue::hole("vpc.name"), &RunContext::default()).unwrap_err();
        assert_eq!(error, TemplateError::MissingInput { hole: "vpc.name".into() });
    }

    #[test]
    fn reference_requires_successful_run() {
        let mut context = RunContext::default();
        let value = CompositeValue::reference("myvpc");

        assert!(matches!(resolve(&value, &context), Err(TemplateError::UnresolvedReference { .. })));

        context.bind("myvpc", &CommandNode::new("create", "vpc"));
        assert!(matches!(resolve(&value, &context), Err(TemplateError::UnresolvedReference { .. })));

        let mut failed = CommandNode::new("create", "vpc");
        failed.record_failure("limit exceeded");
        context.bind("myvpc", &failed);
        assert!(matches!(resolve(&value, &context), Err(TemplateError::UnresolvedReference { .. })));

        let mut object_result = CommandNode::new("create", "vpc");
        object_result.record_success(json!({"id": "vpc-1"}));
        context.bind("myvpc", &object_result);
        assert!(matches!(resolve(&value, &context), Err(TemplateError::UnresolvedReference { .. })));

        let mut succeeded = CommandNode::new("create", "vpc");
        succeeded.record_success(json!("vpc-1"));
        context.bind("myvpc", &succeeded);
        assert_eq!(resolve(&value, &context).unwrap(), Literal::from("vpc-1"));
    }

    #[test]
    fn resolution_does_not_mutate_inputs() {
        let value = CompositeValue::hole("name");
        let mut context = RunContext::default();
        context.fillers.insert("name".into(), Literal::from("web"));
        let before = (value.clone(), context.fillers.clone());
        let _ = resolve(&value, &context);
        assert_eq!((value, context.fillers), before);
    }

    #[test]
    fn parameters_resolve_in_order() {
        let command = CommandNode::new("create", "subnet")
            .with_param("cidr", CompositeValue::literal("10.0.1.0/24"))
            .with_param("name", CompositeValue::hole("subnet.name"));
        let mut context = RunContext::default();
        assert!(matches!(resolve_parameters(&command, &context), Err(TemplateError::MissingInput { .. })));

        context.fillers.insert("subnet.name".into(), Literal::from("front"));
        let resolved = resolve_parameters(&command, &context).unwrap();
        assert_eq!(resolved.keys().collect::<Vec<_>>(), ["cidr", "name"]);
    }

    #[test]
    fn lists_missing_fillers_once() {
        let ast = Ast {
            statements: vec![
                Statement::command(CommandNode::new("create", "vpc").with_param("name", CompositeValue::hole("vpc.name"))),
                Statement::command(
                    CommandNode::new("create", "subnet")
                        .with_param("name", CompositeValue::hole("vpc.name"))
                        .with_param("zone", CompositeValue::hole("zone")),
                ),
            ],
        };
        let mut fillers = IndexMap::new();
        fillers.insert("zone".to_string(), Literal::from("a"));
        assert_eq!(missing_fillers(&ast, &fillers), ["vpc.name"]);
    }
}
