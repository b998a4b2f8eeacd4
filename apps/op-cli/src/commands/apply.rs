// apply.rs: `orgpolicy apply`: reconcile the manifest against AWS.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use op_aws::AwsCliDirectory;
use op_manifest::Manifest;
use op_reconcile::{ApplyMode, OrgDirectory, Reconciler, RunSummary};

use crate::config::OrgPolicyConfig;
use crate::report::{write_summary, ConsoleReporter, OutputFormat};

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Report every create/update/attach/detach without issuing it.
    #[arg(long)]
    pub dry_run: bool,

    /// Exit non-zero if any manifest entry was skipped.
    #[arg(long)]
    pub fail_on_skip: bool,

    /// Summary format on stdout (table or json).
    #[arg(long, default_value = "table")]
    pub output: OutputFormat,

    /// AWS CLI profile (overrides orgpolicy.toml).
    #[arg(long)]
    pub profile: Option<String>,

    /// AWS region (overrides orgpolicy.toml).
    #[arg(long)]
    pub region: Option<String>,

    /// Manifest path relative to the config directory (overrides orgpolicy.toml).
    #[arg(long)]
    pub manifest: Option<PathBuf>,
}

pub fn execute(args: &ApplyArgs, config_dir: &Path) -> anyhow::Result<()> {
    let mut config = OrgPolicyConfig::load_from_dir(config_dir)?;
    if let Some(profile) = &args.profile {
        config.backend.profile = Some(profile.clone());
    }
    if let Some(region) = &args.region {
        config.backend.region = Some(region.clone());
    }

    let manifest = super::load_manifest(config_dir, &config, args.manifest.as_deref())?;

    let mut directory = AwsCliDirectory::locate(config.backend.clone(), config.retry)?;
    directory.verify_session()?;

    let mode = ApplyMode::from_dry_run(args.dry_run);
    let mut out = io::stdout();
    let summary = match args.output {
        // Keep stdout pure JSON; progress lines move to stderr.
        OutputFormat::Json => reconcile(
            &mut directory,
            &manifest,
            mode,
            args.output,
            &mut io::stderr(),
            &mut out,
        )?,
        OutputFormat::Table => reconcile(
            &mut directory,
            &manifest,
            mode,
            args.output,
            &mut io::stdout(),
            &mut out,
        )?,
    };

    check_skips(&summary, args.fail_on_skip)
}

/// Run one reconciliation, streaming progress lines to `progress` and the
/// final summary to `out`.
pub fn reconcile<D: OrgDirectory + ?Sized>(
    directory: &mut D,
    manifest: &Manifest,
    mode: ApplyMode,
    format: OutputFormat,
    progress: &mut dyn Write,
    out: &mut dyn Write,
) -> anyhow::Result<RunSummary> {
    let backend = directory.name().to_string();
    let mut reconciler = Reconciler::prepare(directory, mode)
        .with_context(|| format!("failed to snapshot {} state", backend))?;

    let mut reporter = ConsoleReporter::new(progress);
    let summary = reconciler.run(manifest, &mut reporter);
    write_summary(out, &summary, format)?;
    Ok(summary)
}

fn check_skips(summary: &RunSummary, fail_on_skip: bool) -> anyhow::Result<()> {
    let skipped = summary.skipped();
    if skipped > 0 {
        tracing::warn!(
            skipped,
            total = summary.entries.len(),
            "some manifest entries were skipped"
        );
        if fail_on_skip {
            anyhow::bail!(
                "{} of {} manifest entries skipped",
                skipped,
                summary.entries.len()
            );
        }
    }
    Ok(())
}
