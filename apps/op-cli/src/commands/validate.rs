// validate.rs: `orgpolicy validate`: offline manifest and document checks.
//
// Runs exactly the checks `apply` runs before it talks to AWS: manifest
// structure, then per document readability, JSON well-formedness, and the
// canonical size limit. OU names cannot be checked without the backend.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::Args;
use op_manifest::Manifest;
use op_reconcile::ContentValidator;
use serde::Serialize;

use crate::config::OrgPolicyConfig;
use crate::report::OutputFormat;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Manifest path relative to the config directory (overrides orgpolicy.toml).
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Result format on stdout (table or json).
    #[arg(long, default_value = "table")]
    pub output: OutputFormat,
}

/// Validation result for one manifest entry.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentCheck {
    pub policy: String,
    pub document: PathBuf,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// No OU or account declared: apply would detach it everywhere.
    pub untargeted: bool,
}

pub fn execute(args: &ValidateArgs, config_dir: &Path) -> anyhow::Result<()> {
    let config = OrgPolicyConfig::load_from_dir(config_dir)?;
    let manifest = super::load_manifest(config_dir, &config, args.manifest.as_deref())?;

    let checks = check_documents(&manifest, &ContentValidator::default());
    write_checks(&mut io::stdout(), &checks, args.output)?;

    let failed = checks.iter().filter(|c| !c.valid).count();
    if failed > 0 {
        anyhow::bail!("{} of {} policy documents invalid", failed, checks.len());
    }
    Ok(())
}

/// Validate every entry's document. Never stops at the first failure.
pub fn check_documents(manifest: &Manifest, validator: &ContentValidator) -> Vec<DocumentCheck> {
    manifest
        .policies
        .iter()
        .map(|decl| {
            let document = decl.document_path(&manifest.base_dir);
            let untargeted = decl.deployment_targets.is_empty();
            match validator.read(&document) {
                Ok(doc) => DocumentCheck {
                    policy: decl.name.clone(),
                    document,
                    valid: true,
                    size: Some(doc.size()),
                    content_sha256: Some(doc.sha256()),
                    error: None,
                    untargeted,
                },
                Err(e) => {
                    tracing::warn!(policy = %decl.name, error = %e, "invalid policy document");
                    DocumentCheck {
                        policy: decl.name.clone(),
                        document,
                        valid: false,
                        size: None,
                        content_sha256: None,
                        error: Some(e.to_string()),
                        untargeted,
                    }
                }
            }
        })
        .collect()
}

fn write_checks(
    out: &mut dyn Write,
    checks: &[DocumentCheck],
    format: OutputFormat,
) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        writeln!(out, "{}", serde_json::to_string_pretty(checks)?)?;
        return Ok(());
    }

    if checks.is_empty() {
        writeln!(out, "Manifest declares no policies.")?;
        return Ok(());
    }

    writeln!(out, "{:<32} {:<8} {:>6}  DETAIL", "POLICY", "RESULT", "BYTES")?;
    writeln!(out, "{}", "-".repeat(80))?;
    for check in checks {
        let size = check
            .size
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let detail = match (&check.error, check.untargeted) {
            (Some(error), _) => error.clone(),
            (None, true) => "no targets declared (would detach everywhere)".to_string(),
            (None, false) => check.document.display().to_string(),
        };
        let result = if check.valid { "ok" } else { "INVALID" };
        writeln!(out, "{:<32} {:<8} {:>6}  {}", check.policy, result, size, detail)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use op_manifest::parse_manifest;
    use op_reconcile::MAX_POLICY_CONTENT_BYTES;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Manifest) {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("ok.json"),
            "{\n  \"Statement\": [],\n  \"Version\": \"2012-10-17\"\n}\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ \"Version\": ").unwrap();
        let padding = "x".repeat(MAX_POLICY_CONTENT_BYTES);
        std::fs::write(
            dir.path().join("big.json"),
            format!("{{\"Sid\":\"{}\"}}", padding),
        )
        .unwrap();

        let manifest = parse_manifest(
            "\
- name: Good
  resource_file: ok.json
  deployment_targets:
    accounts: ['111122223333']
- name: Broken
  resource_file: broken.json
- name: Big
  resource_file: big.json
- name: Untargeted
  resource_file: ok.json
",
            dir.path(),
        )
        .unwrap();
        (dir, manifest)
    }

    #[test]
    fn checks_every_document() {
        let (_dir, manifest) = setup();
        let checks = check_documents(&manifest, &ContentValidator::default());

        let valid: Vec<&str> = checks
            .iter()
            .filter(|c| c.valid)
            .map(|c| c.policy.as_str())
            .collect();
        assert_eq!(valid, vec!["Good", "Untargeted"]);

        let good = &checks[0];
        assert_eq!(good.size, Some(r#"{"Statement":[],"Version":"2012-10-17"}"#.len()));
        assert!(!good.untargeted);
        assert!(checks[3].untargeted);
        assert!(checks[1].error.is_some());
        assert!(checks[2].error.is_some());
    }

    #[test]
    fn table_flags_invalid_and_untargeted_entries() {
        let (_dir, manifest) = setup();
        let checks = check_documents(&manifest, &ContentValidator::default());
        let mut out = Vec::new();
        write_checks(&mut out, &checks, OutputFormat::Table).unwrap();
        let text = String::from_utf8(out).unwrap();

        let row = |name: &str| {
            text.lines()
                .find(|l| l.starts_with(name))
                .unwrap()
                .to_string()
        };
        assert!(row("Good").contains(" ok "));
        assert!(row("Broken").contains("INVALID"));
        assert!(row("Big").contains("INVALID"));
        assert!(row("Untargeted").contains("would detach everywhere"));
    }

    #[test]
    fn json_omits_absent_fields() {
        let (_dir, manifest) = setup();
        let checks = check_documents(&manifest, &ContentValidator::default());
        let mut out = Vec::new();
        write_checks(&mut out, &checks, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(value[0]["valid"], true);
        assert!(value[0].get("error").is_none());
        assert_eq!(value[1]["valid"], false);
        assert!(value[1].get("size").is_none());
    }
}
