//! # Execution Log Queries
//!
//! Reads, deletes and renders stored execution records.
//!
//! A listing never stops on a bad record: records that fail to decode are
//! reported as one error line each and the rest of the log is still printed.

use std::io::Write;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use runbook_types::TemplateError;
use runbook_util::{StoreError, TemplateStore};

use crate::record::TemplateExecution;
use crate::render::{FullPrinter, IdOnlyPrinter, JsonPrinter, Printer, ShortPrinter};

/// Rendering used when listing records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    Full,
    #[default]
    Short,
    IdOnly,
    Json,
}

/// What a log query does, checked in field order: a single lookup, then
/// deletions, then a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    pub format: LogFormat,
    /// Keep only the last `limit` records of a listing; 0 keeps all.
    pub limit: usize,
    /// Print only this record, in full.
    pub filter_id: Option<String>,
    pub delete_all: bool,
    pub delete_id: Option<String>,
}

/// A record that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegradedRecord {
    pub error: TemplateError,
    pub raw: Vec<u8>,
}

/// One entry of a listing: the decoded execution, or why it failed to decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedTemplate {
    pub key: String,
    pub outcome: Result<TemplateExecution, DegradedRecord>,
}

impl LoadedTemplate {
    fn decode(key: String, raw: Vec<u8>) -> Self {
        let outcome = match TemplateExecution::from_bytes(&raw) {
            Ok(execution) => Ok(execution),
            Err(error) => Err(DegradedRecord { error, raw }),
        };
        Self { key, outcome }
    }
}

/// Persists `execution` under its identity.
pub fn save_execution(store: &dyn TemplateStore, execution: &TemplateExecution) -> Result<()> {
    let bytes = execution.to_bytes()?;
    store
        .put(execution.id(), bytes)
        .with_context(|| format!("failed to store template execution {}", execution.id()))?;
    debug!(id = %execution.id(), "template execution saved");
    Ok(())
}

/// Every stored record in identity order.
pub fn load_all(store: &dyn TemplateStore) -> Result<Vec<LoadedTemplate>> {
    let records = store.list_all().context("failed to list template executions")?;
    Ok(records
        .into_iter()
        .map(|(key, raw)| LoadedTemplate::decode(key, raw))
        .collect())
}

/// The record stored under `id`.
///
/// # Errors
///
/// [`TemplateError::NotFound`] when nothing is stored under `id`, and
/// [`TemplateError::Decode`] when the stored bytes are not a valid record.
pub fn load_one(store: &dyn TemplateStore, id: &str) -> Result<TemplateExecution> {
    let raw = store.get(id).map_err(|error| not_found_or(error, id))?;
    let execution = TemplateExecution::from_bytes(&raw)?;
    Ok(execution)
}

/// Runs `query` against `store`, writing rendered output to `out`.
pub fn run_log_query(store: &dyn TemplateStore, query: &LogQuery, out: &mut dyn Write) -> Result<()> {
    if let Some(id) = &query.filter_id {
        let execution = load_one(store, id)?;
        FullPrinter::new(&mut *out).print(&execution)?;
        writeln!(out)?;
        return Ok(());
    }

    if query.delete_all {
        let deleted = store.delete_all().context("failed to delete template executions")?;
        info!(deleted, "deleted all template executions");
        return Ok(());
    }

    if let Some(id) = &query.delete_id {
        store.delete(id).map_err(|error| not_found_or(error, id))?;
        info!(id = %id, "deleted template execution");
        return Ok(());
    }

    let mut loaded = load_all(store)?;
    if query.limit > 0 && query.limit < loaded.len() {
        let skipped = loaded.len() - query.limit;
        loaded.drain(..skipped);
    }
    print_all(&loaded, query.format, out)
}

fn print_all(loaded: &[LoadedTemplate], format: LogFormat, out: &mut dyn Write) -> Result<()> {
    for entry in loaded {
        match &entry.outcome {
            Ok(execution) => {
                let printed = match format {
                    LogFormat::Full => FullPrinter::new(&mut *out).print(execution),
                    LogFormat::Short => ShortPrinter::new(&mut *out).print(execution),
                    LogFormat::IdOnly => IdOnlyPrinter::new(&mut *out).print(execution),
                    LogFormat::Json => JsonPrinter::new(&mut *out).print(execution),
                };
                if let Err(error) = printed {
                    warn!(key = %entry.key, error = %error, "failed to print template execution");
                }
            }
            Err(degraded) => {
                warn!(key = %entry.key, error = %degraded.error, "template execution in error");
                debug!(key = %entry.key, raw = %String::from_utf8_lossy(&degraded.raw), "template raw content");
                write!(out, "Template '{}' in error: {}", entry.key, degraded.error)?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

fn not_found_or(error: StoreError, id: &str) -> anyhow::Error {
    match error {
        StoreError::NotFound(_) => TemplateError::NotFound { id: id.to_string() }.into(),
        other => anyhow::Error::new(other).context(format!("failed to access template execution {id}")),
    }
}
