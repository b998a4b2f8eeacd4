// report.rs: Console rendering of reconcile events and run summaries.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use op_reconcile::{ApplyMode, EntryOutcome, PolicyAction, ReportEvent, Reporter, RunSummary};

/// How the final summary is printed on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "text" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{}' (expected table or json)", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Writes one status line per event.
pub struct ConsoleReporter<W: Write> {
    out: W,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn report(&mut self, event: ReportEvent) {
        if let Err(e) = writeln!(self.out, "{}", render_event(&event)) {
            tracing::debug!(error = %e, "failed to write report line");
        }
    }
}

fn verb(mode: ApplyMode, live: &str, dry: &str) -> String {
    if mode.is_live() {
        live.to_string()
    } else {
        format!("would {}", dry)
    }
}

/// One human-readable line for an event.
pub fn render_event(event: &ReportEvent) -> String {
    match event {
        ReportEvent::DocumentValidated {
            policy,
            size,
            limit,
        } => format!("  {}: document ok ({}/{} bytes)", policy, size, limit),
        ReportEvent::PolicyCreated { policy, id, mode } => match id {
            Some(id) => format!("+ {}: {} ({})", policy, verb(*mode, "created", "create"), id),
            None => format!("+ {}: {}", policy, verb(*mode, "created", "create")),
        },
        ReportEvent::PolicyUpdated { policy, id, mode } => {
            format!("~ {}: {} ({})", policy, verb(*mode, "updated", "update"), id)
        }
        ReportEvent::TargetAttached {
            policy,
            target,
            mode,
        } => format!("  {}: {} {}", policy, verb(*mode, "attached", "attach"), target),
        ReportEvent::TargetDetached {
            policy,
            target,
            mode,
        } => format!("  {}: {} {}", policy, verb(*mode, "detached", "detach"), target),
        ReportEvent::AttachmentsInSync { policy } => {
            format!("  {}: attachments already in sync", policy)
        }
        ReportEvent::EntrySkipped {
            policy,
            step,
            reason,
        } => format!("! {}: skipped at {}: {}", policy, step, reason),
    }
}

/// Print the summary in the requested format.
pub fn write_summary(
    out: &mut dyn Write,
    summary: &RunSummary,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(summary)?)?,
        OutputFormat::Table => write!(out, "{}", render_summary(summary))?,
    }
    Ok(())
}

/// Fixed-width table of entry outcomes.
pub fn render_summary(summary: &RunSummary) -> String {
    let mut text = String::new();
    text.push('\n');
    text.push_str(&format!(
        "Run {} ({}): {} entr{}, {} applied, {} skipped\n\n",
        summary.run_id,
        summary.mode,
        summary.entries.len(),
        if summary.entries.len() == 1 { "y" } else { "ies" },
        summary.applied(),
        summary.skipped(),
    ));
    text.push_str(&format!(
        "{:<32} {:<10} {:>6} {:>6}  {}\n",
        "POLICY", "STATUS", "ATTACH", "DETACH", "DETAIL"
    ));
    text.push_str(&format!("{}\n", "-".repeat(80)));

    for entry in &summary.entries {
        let line = match &entry.outcome {
            EntryOutcome::Applied {
                policy_id,
                action,
                diff,
                ..
            } => {
                let status = match action {
                    PolicyAction::Created => "created",
                    PolicyAction::Updated => "updated",
                };
                format!(
                    "{:<32} {:<10} {:>6} {:>6}  {}",
                    entry.policy,
                    status,
                    diff.to_add.len(),
                    diff.to_remove.len(),
                    policy_id.as_deref().unwrap_or("(not yet assigned)"),
                )
            }
            EntryOutcome::Skipped { step, reason } => format!(
                "{:<32} {:<10} {:>6} {:>6}  {}: {}",
                entry.policy, "skipped", "-", "-", step, reason
            ),
        };
        text.push_str(&line);
        text.push('\n');
    }
    text
}
