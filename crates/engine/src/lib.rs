//! # Runbook Engine
//!
//! Parses, executes, reverts and records runbook templates: line-oriented
//! sequences of infrastructure actions such as
//!
//! ```text
//! myvpc = create vpc cidr=10.0.0.0/16
//! create subnet vpc=$myvpc cidr=10.0.1.0/24 name={subnet.name}
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use indexmap::IndexMap;
//! use runbook_engine::{
//!     ExecutionOptions, ReversibilityPolicy, RunMetadata, SimulatedRunner, TemplateExecution, execute_template,
//!     generate_revert_for_execution, parse_template,
//! };
//! use runbook_types::Literal;
//!
//! let ast = parse_template("myvpc = create vpc cidr=10.0.0.0/16\ncreate subnet vpc=$myvpc name={subnet.name}\n")?;
//! let mut fillers = IndexMap::new();
//! fillers.insert("subnet.name".to_string(), Literal::from("front"));
//!
//! let mut execution = TemplateExecution::start(ast, RunMetadata::default()).with_fillers(fillers);
//! let summary = execute_template(&mut execution.template.ast, &execution.fillers, &SimulatedRunner::new(), ExecutionOptions::default());
//! assert_eq!(summary.failed, 0);
//!
//! let revert = generate_revert_for_execution(&execution, &ReversibilityPolicy::default())?;
//! assert_eq!(revert.ast.to_string(), "delete subnet id=subnet-sim-0002\ndelete vpc id=vpc-sim-0001\n");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`lexer`** / **`parser`**: text to syntax tree; the reverse direction is
//!   the `Display` implementations in `runbook-types`
//! - **`resolve`**: parameter values to concrete literals during a run
//! - **`executor`**: runs commands through a [`CommandRunner`]
//! - **`tracker`**: statistics, outcome tally and revertibility
//! - **`revert`**: inverse templates
//! - **`identity`** / **`record`**: execution identity and the stored record
//! - **`render`** / **`listing`**: log printers and queries over a store

pub mod executor;
pub mod identity;
pub mod lexer;
pub mod listing;
pub mod parser;
pub mod record;
pub mod render;
pub mod resolve;
pub mod revert;
pub mod tracker;

pub use executor::{CommandRunner, ExecutionOptions, SimulatedRunner, execute_template, run_execution};
pub use identity::{ExecutionId, date_of};
pub use listing::{DegradedRecord, LoadedTemplate, LogFormat, LogQuery, load_all, load_one, run_log_query, save_execution};
pub use parser::{parse_statement, parse_template};
pub use record::{RunMetadata, TemplateExecution};
pub use render::{FullPrinter, IdOnlyPrinter, JsonPrinter, Printer, ShortPrinter};
pub use resolve::{RunContext, missing_fillers, resolve, resolve_parameters};
pub use revert::{Inverse, ParamRewrite, ReversibilityPolicy, generate_revert, generate_revert_for_execution};
pub use tracker::{OutcomeTally, is_revertible, stats, tally};
