//! Helpers shared by the runbook engine and CLI: the execution log store and
//! timestamp formatting.

pub mod date_handling;
pub mod log_store;

pub use log_store::{DirectoryTemplateStore, InMemoryTemplateStore, StoreError, TemplateStore};
