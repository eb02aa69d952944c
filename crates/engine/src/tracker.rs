//! Execution reporting over a template's command nodes.
//!
//! Reports never fail on a node that errored: failed commands are data.

use indexmap::IndexMap;

use runbook_types::Ast;

use crate::revert::ReversibilityPolicy;

/// Succeeded and failed command counts of one execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeTally {
    pub succeeded: usize,
    pub failed: usize,
}

impl OutcomeTally {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Counts commands per `"<action> <entity>"`, ordered by first occurrence.
///
/// Every command is counted, whether it succeeded, failed or never ran.
///
/// # Example
/// ```rust
/// use runbook_engine::{parser::parse_template, tracker::stats};
///
/// let ast = parse_template("create vpc cidr=10.0.0.0/16\ndelete vpc id=vpc-1\ncreate vpc cidr=10.1.0.0/16\n").unwrap();
/// let counts = stats(&ast);
/// assert_eq!(counts["create vpc"], 2);
/// assert_eq!(counts["delete vpc"], 1);
/// ```
pub fn stats(ast: &Ast) -> IndexMap<String, usize> {
    let mut counts = IndexMap::new();
    for command in ast.command_nodes() {
        *counts.entry(command.action_entity()).or_insert(0) += 1;
    }
    counts
}

/// Splits commands into succeeded and failed; a command failed when it carries an error.
pub fn tally(ast: &Ast) -> OutcomeTally {
    ast.command_nodes().fold(OutcomeTally::default(), |mut tally, command| {
        if command.error.is_some() {
            tally.failed += 1;
        } else {
            tally.succeeded += 1;
        }
        tally
    })
}

/// True when every command of the template has an inverse under `policy`.
///
/// An empty template is revertible.
pub fn is_revertible(ast: &Ast, policy: &ReversibilityPolicy) -> bool {
    ast.command_nodes()
        .all(|command| policy.lookup(&command.action, &command.entity).is_some())
}
