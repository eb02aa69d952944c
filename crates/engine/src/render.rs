//! # Execution Printers
//!
//! Text renderings of recorded executions for the log command.
//!
//! - [`FullPrinter`]: metadata header, then one `OK`/`KO` line per command
//! - [`ShortPrinter`]: a single summary line
//! - [`IdOnlyPrinter`]: the identity alone
//! - [`JsonPrinter`]: the stored JSON record, indented
//!
//! Printers write no trailing separator; callers decide how entries are
//! delimited.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use runbook_util::date_handling::{format_stamp, humanize_age};

use crate::record::TemplateExecution;
use crate::revert::ReversibilityPolicy;

/// Renders one execution.
pub trait Printer {
    fn print(&mut self, execution: &TemplateExecution) -> Result<()>;
}

/// Detailed rendering: header plus per-command status.
///
/// ```text
/// ID: 01H...\tDate: Mar  4 15:04:05\tAuthor: ops\tLocale: eu-west-1
///     OK\tcreate vpc cidr=10.0.0.0/16\t[vpc-1]
///     KO\tcreate subnet vpc=vpc-1
/// \t    quota exceeded
/// ```
pub struct FullPrinter<W: Write> {
    out: W,
    policy: ReversibilityPolicy,
}

impl<W: Write> FullPrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            policy: ReversibilityPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReversibilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn write_metadata(&mut self, execution: &TemplateExecution) -> Result<()> {
        let date = execution.date()?;
        write!(self.out, "ID: {}\tDate: {}", execution.id(), format_stamp(&date))?;
        if !execution.author.is_empty() {
            write!(self.out, "\tAuthor: {}", execution.author)?;
        }
        if !execution.locale.is_empty() {
            write!(self.out, "\tLocale: {}", execution.locale)?;
        }
        if !execution.profile.is_empty() {
            write!(self.out, "\tProfile: {}", execution.profile)?;
        }
        if !execution.is_revertible(&self.policy) {
            write!(self.out, " (not revertible)")?;
        }
        writeln!(self.out)?;
        Ok(())
    }
}

impl<W: Write> Printer for FullPrinter<W> {
    fn print(&mut self, execution: &TemplateExecution) -> Result<()> {
        self.write_metadata(execution)?;

        for command in execution.template.ast.command_nodes() {
            let status = if command.error.is_some() { "KO" } else { "OK" };
            match command.result_text() {
                Some(result) => writeln!(self.out, "    {status}\t{command}\t[{result}]")?,
                None => writeln!(self.out, "    {status}\t{command}")?,
            }
            if let Some(error) = &command.error {
                for line in error.replace('\t', "").lines() {
                    writeln!(self.out, "\t    {line}")?;
                }
            }
        }
        Ok(())
    }
}

/// One-line summary:
/// `01H... OK - create vpc (3 minutes ago) <prod:ops> [eu-west-1]`.
pub struct ShortPrinter<W: Write> {
    out: W,
    policy: ReversibilityPolicy,
    now: Option<DateTime<Utc>>,
}

impl<W: Write> ShortPrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            policy: ReversibilityPolicy::default(),
            now: None,
        }
    }

    pub fn with_policy(mut self, policy: ReversibilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Computes ages against a fixed instant instead of the current time.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }
}

impl<W: Write> Printer for ShortPrinter<W> {
    fn print(&mut self, execution: &TemplateExecution) -> Result<()> {
        let tally = execution.tally();
        let status = if tally.all_succeeded() { "OK" } else { "KO" };
        write!(self.out, "{} {status} - ", execution.id())?;

        match execution.template.ast.command_nodes().last() {
            Some(command) if tally.total() == 1 => write!(self.out, "{} {}", command.action, command.entity)?,
            _ => write!(self.out, "{} commands", tally.total())?,
        }

        let now = self.now.unwrap_or_else(Utc::now);
        write!(self.out, " ({} ago)", humanize_age(execution.date()?, now))?;

        if !execution.author.is_empty() {
            if execution.profile.is_empty() {
                write!(self.out, " <{}>", execution.author)?;
            } else {
                write!(self.out, " <{}:{}>", execution.profile, execution.author)?;
            }
        }
        if !execution.locale.is_empty() {
            write!(self.out, " [{}]", execution.locale)?;
        }
        if !execution.is_revertible(&self.policy) {
            write!(self.out, " (not revertible)")?;
        }
        Ok(())
    }
}

/// Prints the identity only, the value `runbook revert` expects.
pub struct IdOnlyPrinter<W: Write> {
    out: W,
}

impl<W: Write> IdOnlyPrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Printer for IdOnlyPrinter<W> {
    fn print(&mut self, execution: &TemplateExecution) -> Result<()> {
        write!(self.out, "{}", execution.id())?;
        Ok(())
    }
}

/// Prints the stored JSON record.
pub struct JsonPrinter<W: Write> {
    out: W,
}

impl<W: Write> JsonPrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Printer for JsonPrinter<W> {
    fn print(&mut self, execution: &TemplateExecution) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.out, execution).context("json printer")?;
        writeln!(self.out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ExecutionId;
    use crate::parser::parse_template;
    use crate::record::RunMetadata;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn execution_at(date_time: DateTime<Utc>, text: &str, results: &[Result<&str, &str>]) -> TemplateExecution {
        let mut ast = parse_template(text).unwrap();
        for (command, outcome) in ast.command_nodes_mut().zip(results) {
            match outcome {
                Ok(result) => command.record_success(json!(result)),
                Err(message) => command.record_failure(*message),
            }
        }
        let mut execution = TemplateExecution::start(
            ast,
            RunMetadata {
                author: "ops".into(),
                locale: "eu-west-1".into(),
                ..RunMetadata::default()
            },
        );
        execution.template.id = ExecutionId::at(date_time).to_string();
        execution
    }

    fn rendered(printer: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut out = Vec::new();
        printer(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn full_printer_lists_commands_and_errors() {
        let date_time = Utc.with_ymd_and_hms(2024, 3, 4, 15, 4, 5).unwrap();
        let execution = execution_at(
            date_time,
            "create vpc cidr=10.0.0.0/16\ncreate subnet vpc=vpc-1\n",
            &[Ok("vpc-1"), Err("quota exceeded\n\tretry later")],
        );

        let output = rendered(|out| FullPrinter::new(out).print(&execution));
        let expected = format!(
            "ID: {}\tDate: Mar  4 15:04:05\tAuthor: ops\tLocale: eu-west-1\n    OK\tcreate vpc cidr=10.0.0.0/16\t[vpc-1]\n    KO\tcreate subnet vpc=vpc-1\n\t    quota exceeded\n\t    retry later\n",
            execution.id()
        );
        assert_eq!(output, expected);
    }

    #[test]
    fn short_printer_summarizes_single_command() {
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 15, 10, 0).unwrap();
        let execution = execution_at(now - Duration::minutes(3), "create vpc cidr=10.0.0.0/16\n", &[Ok("vpc-1")]);

        let output = rendered(|out| ShortPrinter::new(out).with_now(now).print(&execution));
        assert_eq!(output, format!("{} OK - create vpc (3 minutes ago) <ops> [eu-west-1]", execution.id()));
    }

    #[test]
    fn short_printer_flags_failures_and_irreversibility() {
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 15, 10, 0).unwrap();
        let mut execution = execution_at(
            now - Duration::hours(2),
            "create vpc cidr=10.0.0.0/16\ndelete subnet id=subnet-1\n",
            &[Ok("vpc-1"), Err("denied")],
        );
        execution.profile = "prod".into();

        let output = rendered(|out| ShortPrinter::new(out).with_now(now).print(&execution));
        assert_eq!(
            output,
            format!("{} KO - 2 commands (2 hours ago) <prod:ops> [eu-west-1] (not revertible)", execution.id())
        );
    }

    #[test]
    fn id_only_and_json_printers() {
        let execution = execution_at(Utc::now(), "create vpc cidr=10.0.0.0/16\n", &[Ok("vpc-1")]);
        assert_eq!(rendered(|out| IdOnlyPrinter::new(out).print(&execution)), execution.id());

        let output = rendered(|out| JsonPrinter::new(out).print(&execution));
        let reloaded = TemplateExecution::from_bytes(output.as_bytes()).unwrap();
        assert_eq!(reloaded.id(), execution.id());
        assert!(output.ends_with("}\n"));
    }
}
