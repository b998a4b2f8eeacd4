// cli.rs: Runs the orgpolicy binary end to end.
//
// A throwaway shell script stands in for the aws CLI (configured through
// `[backend] aws_bin`), answering the read-only calls a dry run makes.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const DENY_LEAVE: &str = r#"{
  "Version": "2012-10-17",
  "Statement": [
    { "Effect": "Deny", "Action": "organizations:LeaveOrganization", "Resource": "*" }
  ]
}"#;

const MANIFEST: &str = "\
- name: DenyLeave
  description: Accounts may not leave
  resource_file: policies/deny.json
  deployment_targets:
    organizational_units: [Sandbox]
";

fn orgpolicy(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_orgpolicy"))
        .arg("--config-dir")
        .arg(config_dir)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn config_dir(manifest: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("policies")).unwrap();
    fs::write(dir.path().join("policies/deny.json"), DENY_LEAVE).unwrap();
    fs::write(dir.path().join("manifest.yaml"), manifest).unwrap();
    dir
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn validate_accepts_a_good_manifest() {
    let dir = config_dir(MANIFEST);
    let output = orgpolicy(dir.path(), &["validate"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("DenyLeave"));
}

#[test]
fn validate_fails_on_a_bad_document() {
    let dir = config_dir(
        "\
- name: DenyLeave
  resource_file: policies/deny.json
- name: Broken
  resource_file: policies/broken.json
",
    );
    fs::write(dir.path().join("policies/broken.json"), "{ nope").unwrap();

    let output = orgpolicy(dir.path(), &["validate", "--output", "json"]);
    assert!(!output.status.success());
    let checks: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(checks[0]["valid"], true);
    assert_eq!(checks[1]["valid"], false);
    assert!(stderr(&output).contains("1 of 2 policy documents invalid"));
}

#[test]
fn duplicate_policy_names_are_fatal() {
    let dir = config_dir(
        "\
- name: DenyLeave
  resource_file: policies/deny.json
- name: DenyLeave
  resource_file: policies/deny.json
",
    );
    let output = orgpolicy(dir.path(), &["validate"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("failed to load manifest"));
}

#[test]
fn malformed_config_is_fatal() {
    let dir = config_dir(MANIFEST);
    fs::write(dir.path().join("orgpolicy.toml"), "[backend\n").unwrap();
    let output = orgpolicy(dir.path(), &["validate"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("orgpolicy.toml"));
}

#[test]
fn apply_without_aws_cli_is_fatal() {
    let dir = config_dir(MANIFEST);
    fs::write(
        dir.path().join("orgpolicy.toml"),
        "[backend]\naws_bin = \"definitely-not-an-aws-cli-binary\"\n",
    )
    .unwrap();
    let output = orgpolicy(dir.path(), &["apply", "--dry-run"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("not found"));
}

#[cfg(unix)]
mod with_fake_aws {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Answers sts and the read-only organizations listings.
    const FAKE_AWS: &str = r#"#!/bin/sh
case "$1 $2" in
  "sts get-caller-identity")
    echo '{"Account":"111122223333","Arn":"arn:aws:iam::111122223333:user/ci","UserId":"AIDA"}' ;;
  "organizations list-policies")
    echo '{"Policies":[]}' ;;
  "organizations list-roots")
    echo '{"Roots":[{"Id":"r-root"}]}' ;;
  "organizations list-organizational-units-for-parent")
    case "$*" in
      *"--parent-id r-root"*) echo '{"OrganizationalUnits":[{"Id":"ou-sandbox","Name":"Sandbox"}]}' ;;
      *) echo '{"OrganizationalUnits":[]}' ;;
    esac ;;
  *)
    echo "An error occurred (AccessDeniedException) when calling the $2 operation: denied" >&2
    exit 254 ;;
esac
"#;

    const NO_CREDENTIALS: &str = r#"#!/bin/sh
echo "Unable to locate credentials. You can configure credentials by running \"aws configure\"." >&2
exit 253
"#;

    fn install(dir: &Path, script: &str) {
        let path = dir.join("fake-aws");
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        fs::write(
            dir.join("orgpolicy.toml"),
            format!(
                "[backend]\naws_bin = \"{}\"\n\n[retry]\nbase_delay_ms = 0\n",
                path.display()
            ),
        )
        .unwrap();
    }

    #[test]
    fn dry_run_previews_create_and_attach() {
        let dir = config_dir(MANIFEST);
        install(dir.path(), FAKE_AWS);

        let output = orgpolicy(dir.path(), &["apply", "--dry-run"]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));
        let out = stdout(&output);
        assert!(out.contains("+ DenyLeave: would create"));
        assert!(out.contains("would attach OU 'Sandbox' (ou-sandbox)"));
        assert!(out.contains("(dry-run): 1 entry, 1 applied, 0 skipped"));
    }

    #[test]
    fn unknown_unit_is_skipped_and_fail_on_skip_exits_non_zero() {
        let dir = config_dir(
            "\
- name: DenyLeave
  resource_file: policies/deny.json
  deployment_targets:
    organizational_units: [Nowhere]
",
        );
        install(dir.path(), FAKE_AWS);

        let lenient = orgpolicy(dir.path(), &["apply", "--dry-run", "--output", "json"]);
        assert!(lenient.status.success(), "stderr: {}", stderr(&lenient));
        let summary: serde_json::Value = serde_json::from_slice(&lenient.stdout).unwrap();
        assert_eq!(summary["entries"][0]["status"], "skipped");
        assert_eq!(summary["entries"][0]["step"], "resolve_targets");

        let strict = orgpolicy(dir.path(), &["apply", "--dry-run", "--fail-on-skip"]);
        assert!(!strict.status.success());
        assert!(stderr(&strict).contains("1 of 1 manifest entries skipped"));
    }

    #[test]
    fn missing_session_is_fatal() {
        let dir = config_dir(MANIFEST);
        install(dir.path(), NO_CREDENTIALS);

        let output = orgpolicy(dir.path(), &["apply", "--dry-run"]);
        assert!(!output.status.success());
        assert!(stderr(&output).contains("no valid AWS session"));
        assert!(stdout(&output).is_empty());
    }
}
