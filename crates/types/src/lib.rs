//! Shared definitions for the runbook template language: the syntax tree,
//! the three-kind parameter value model and the engine error type.
//!
//! The engine crate parses text into these types, executes and reverts them,
//! and persists them as execution records.

pub mod ast;
pub mod error;
pub mod value;

pub use ast::{Ast, CommandNode, DeclarationNode, Node, Statement, Template};
pub use error::TemplateError;
pub use value::{CompositeValue, Literal};
