use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use indexmap::IndexMap;
use tracing::{debug, info};

use runbook_engine::{
    ExecutionOptions, FullPrinter, LogQuery, Printer, ReversibilityPolicy, RunMetadata, SimulatedRunner, TemplateExecution,
    execute_template, generate_revert_for_execution, is_revertible, load_one, missing_fillers, parse_template, run_log_query,
    save_execution, stats,
};
use runbook_util::{DirectoryTemplateStore, TemplateStore};

mod cli;

use cli::{Cli, Commands, LogArgs, SimulateArgs};

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let store = DirectoryTemplateStore::new(cli.log_dir.clone());
    debug!(log_dir = %store.root().display(), "using execution log directory");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Commands::Log(args) => run_log(&store, &args, &mut out),
        Commands::Check { file } => run_check(&file, &mut out),
        Commands::Simulate(args) => run_simulate(&store, args, &mut out),
        Commands::Revert { id } => run_revert(&store, &id, &mut out),
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run_log(store: &dyn TemplateStore, args: &LogArgs, out: &mut dyn Write) -> Result<()> {
    let query = LogQuery {
        format: args.format(),
        limit: args.limit,
        filter_id: args.id.clone(),
        delete_all: args.delete_all,
        delete_id: args.delete.clone(),
    };
    run_log_query(store, &query, out)
}

fn read_template(file: &Path) -> Result<String> {
    fs::read_to_string(file).with_context(|| format!("failed to read template {}", file.display()))
}

fn run_check(file: &Path, out: &mut dyn Write) -> Result<()> {
    let source = read_template(file)?;
    let ast = parse_template(&source).with_context(|| format!("invalid template {}", file.display()))?;

    write!(out, "{ast}")?;
    writeln!(out)?;
    for (action_entity, count) in stats(&ast) {
        writeln!(out, "{count}\t{action_entity}")?;
    }
    if is_revertible(&ast, &ReversibilityPolicy::default()) {
        writeln!(out, "revertible")?;
    } else {
        writeln!(out, "not revertible")?;
    }
    Ok(())
}

fn run_simulate(store: &dyn TemplateStore, args: SimulateArgs, out: &mut dyn Write) -> Result<()> {
    let source = read_template(&args.file)?;
    let ast = parse_template(&source).with_context(|| format!("invalid template {}", args.file.display()))?;

    let fillers: IndexMap<_, _> = args.fillers.into_iter().collect();
    let missing = missing_fillers(&ast, &fillers);
    if !missing.is_empty() {
        bail!("missing --fill for: {}", missing.join(", "));
    }

    let metadata = RunMetadata {
        author: args.author.unwrap_or_else(|| std::env::var("USER").unwrap_or_default()),
        source,
        locale: args.locale,
        profile: args.profile,
    };
    let mut execution = TemplateExecution::start(ast, metadata).with_fillers(fillers);
    let options = ExecutionOptions {
        stop_on_error: args.stop_on_error,
    };
    execute_template(&mut execution.template.ast, &execution.fillers, &SimulatedRunner::new(), options);

    save_execution(store, &execution)?;
    info!(id = %execution.id(), "simulated execution recorded");
    FullPrinter::new(&mut *out).print(&execution)
}

fn run_revert(store: &dyn TemplateStore, id: &str, out: &mut dyn Write) -> Result<()> {
    let execution: TemplateExecution = load_one(store, id)?;
    let revert = generate_revert_for_execution(&execution, &ReversibilityPolicy::default())
        .with_context(|| format!("cannot revert execution {id}"))?;
    write!(out, "{}", revert.ast)?;
    Ok(())
}
