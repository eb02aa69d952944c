use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};
use runbook_engine::LogFormat;
use runbook_types::Literal;
use runbook_types::value::classify_bare_word;

/// Runbook - write, simulate and revert infrastructure templates
#[derive(Parser)]
#[command(name = "runbook")]
#[command(about = "Parse, simulate, revert and log infrastructure templates")]
#[command(version)]
pub struct Cli {
    /// Directory holding execution records (defaults to $RUNBOOK_LOG_DIR, then the user config dir)
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show recorded template executions
    Log(LogArgs),
    /// Parse a template and report its canonical form, statistics and revertibility
    Check {
        /// Template file to check
        file: PathBuf,
    },
    /// Run a template against a simulated backend and record the execution
    Simulate(SimulateArgs),
    /// Print the template that undoes a recorded execution
    Revert {
        /// Identity of the recorded execution
        id: String,
    },
}

#[derive(Args)]
#[command(group(ArgGroup::new("format").args(["raw_json", "short", "id_only", "full"])))]
pub struct LogArgs {
    /// Show only this execution, in full
    pub id: Option<String>,

    /// Delete every recorded execution
    #[arg(long)]
    pub delete_all: bool,

    /// Delete one recorded execution
    #[arg(long, value_name = "ID")]
    pub delete: Option<String>,

    /// Display records as raw JSON
    #[arg(long)]
    pub raw_json: bool,

    /// One line per record (default)
    #[arg(long)]
    pub short: bool,

    /// Show only record identities (i.e. revert ids)
    #[arg(long)]
    pub id_only: bool,

    /// Show every command of every record
    #[arg(long)]
    pub full: bool,

    /// Limit output to the last N records
    #[arg(short = 'n', long = "number", default_value_t = 0)]
    pub limit: usize,
}

impl LogArgs {
    pub fn format(&self) -> LogFormat {
        if self.raw_json {
            LogFormat::Json
        } else if self.id_only {
            LogFormat::IdOnly
        } else if self.full {
            LogFormat::Full
        } else {
            LogFormat::Short
        }
    }
}

#[derive(Args)]
pub struct SimulateArgs {
    /// Template file to run
    pub file: PathBuf,

    /// Value for a hole, as name=value (repeatable)
    #[arg(long = "fill", value_name = "NAME=VALUE", value_parser = parse_filler)]
    pub fillers: Vec<(String, Literal)>,

    /// Author recorded on the execution (defaults to $USER)
    #[arg(long)]
    pub author: Option<String>,

    /// Profile recorded on the execution
    #[arg(long, default_value = "")]
    pub profile: String,

    /// Locale (region) recorded on the execution
    #[arg(long, default_value = "")]
    pub locale: String,

    /// Stop at the first failing command
    #[arg(long)]
    pub stop_on_error: bool,
}

fn parse_filler(input: &str) -> Result<(String, Literal), String> {
    let (name, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{input}'"))?;
    if name.is_empty() {
        return Err(format!("missing hole name in '{input}'"));
    }
    Ok((name.to_string(), classify_bare_word(value)))
}
