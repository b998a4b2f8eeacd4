//! AWS Organizations directory backed by the aws CLI

use std::path::PathBuf;

use op_reconcile::{DirectoryError, OrgDirectory, OrgUnit, Page, PolicySummary};
use serde::de::DeserializeOwned;

use crate::config::{AwsCliConfig, RetryConfig};
use crate::error::AwsError;
use crate::responses::{
    CallerIdentity, CreatePolicyResponse, ListPoliciesResponse, ListRootsResponse,
    ListTargetsResponse, ListUnitsResponse,
};
use crate::retry::{classify, with_retry};
use crate::runner::{CommandRunner, ProcessRunner};

/// OrgDirectory implementation that shells out to `aws organizations`
///
/// Every call is one blocking CLI invocation with `--output json`.
/// Listings are paged with `--max-items` / `--starting-token`; throttled
/// calls are retried per [`RetryConfig`].
pub struct AwsCliDirectory<R: CommandRunner = ProcessRunner> {
    program: PathBuf,
    config: AwsCliConfig,
    retry: RetryConfig,
    runner: R,
}

impl AwsCliDirectory<ProcessRunner> {
    /// Find the configured aws CLI on PATH and build a directory around it
    pub fn locate(config: AwsCliConfig, retry: RetryConfig) -> Result<Self, AwsError> {
        let program = which::which(&config.aws_bin).map_err(|source| AwsError::CliNotFound {
            bin: config.aws_bin.clone(),
            source,
        })?;
        tracing::debug!(program = %program.display(), "using aws CLI");
        Ok(Self::with_runner(program, config, retry, ProcessRunner))
    }
}

impl<R: CommandRunner> AwsCliDirectory<R> {
    pub fn with_runner(
        program: impl Into<PathBuf>,
        config: AwsCliConfig,
        retry: RetryConfig,
        runner: R,
    ) -> Self {
        Self {
            program: program.into(),
            config,
            retry,
            runner,
        }
    }

    /// Check that the configured credentials are usable
    pub fn verify_session(&self) -> Result<CallerIdentity, AwsError> {
        let stdout = self
            .invoke("sts", "get-caller-identity", Vec::new())
            .map_err(AwsError::NoSession)?;
        let identity: CallerIdentity =
            parse("get-caller-identity", &stdout).map_err(AwsError::NoSession)?;
        tracing::info!(account = %identity.account, arn = %identity.arn, "session verified");
        Ok(identity)
    }

    /// Build the full argument list for one invocation
    fn args(&self, service: &str, command: &str, params: Vec<String>) -> Vec<String> {
        let mut args = vec![service.to_string(), command.to_string()];
        args.extend(params);
        args.push("--output".to_string());
        args.push("json".to_string());
        if let Some(profile) = &self.config.profile {
            args.push("--profile".to_string());
            args.push(profile.clone());
        }
        if let Some(region) = &self.config.region {
            args.push("--region".to_string());
            args.push(region.clone());
        }
        args
    }

    /// Paging parameters for a listing call
    fn paging(&self, page_token: Option<&str>) -> Vec<String> {
        let mut params = vec!["--max-items".to_string(), self.config.page_size.to_string()];
        if let Some(token) = page_token {
            params.push("--starting-token".to_string());
            params.push(token.to_string());
        }
        params
    }

    /// Run one CLI command with retry, returning stdout
    fn invoke(
        &self,
        service: &str,
        command: &str,
        params: Vec<String>,
    ) -> Result<String, DirectoryError> {
        let args = self.args(service, command, params);
        with_retry(&self.retry, command, || {
            tracing::debug!(command, "aws {} {}", service, command);
            let output = self.runner.run(&self.program, &args)?;
            if output.success {
                Ok(output.stdout)
            } else {
                Err(classify(command, &output.stderr))
            }
        })
    }

    fn organizations(&self, command: &str, params: Vec<String>) -> Result<String, DirectoryError> {
        self.invoke("organizations", command, params)
    }
}

fn parse<T: DeserializeOwned>(operation: &str, stdout: &str) -> Result<T, DirectoryError> {
    serde_json::from_str(stdout).map_err(|e| DirectoryError::InvalidResponse {
        operation: operation.to_string(),
        reason: e.to_string(),
    })
}

fn owned(pairs: &[(&str, &str)]) -> Vec<String> {
    pairs
        .iter()
        .flat_map(|(flag, value)| [flag.to_string(), value.to_string()])
        .collect()
}

impl<R: CommandRunner> OrgDirectory for AwsCliDirectory<R> {
    fn list_policies(&self, page_token: Option<&str>) -> Result<Page<PolicySummary>, DirectoryError> {
        let mut params = owned(&[("--filter", self.config.policy_type.as_str())]);
        params.extend(self.paging(page_token));
        let stdout = self.organizations("list-policies", params)?;
        let response: ListPoliciesResponse = parse("list-policies", &stdout)?;
        Ok(Page {
            items: response
                .policies
                .into_iter()
                .map(|p| PolicySummary {
                    id: p.id,
                    name: p.name,
                })
                .collect(),
            next_token: response.next_token,
        })
    }

    fn root_id(&self) -> Result<Option<String>, DirectoryError> {
        let stdout = self.organizations("list-roots", Vec::new())?;
        let response: ListRootsResponse = parse("list-roots", &stdout)?;
        Ok(response.roots.into_iter().next().map(|r| r.id))
    }

    fn list_child_units(
        &self,
        parent_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<OrgUnit>, DirectoryError> {
        let mut params = owned(&[("--parent-id", parent_id)]);
        params.extend(self.paging(page_token));
        let stdout = self.organizations("list-organizational-units-for-parent", params)?;
        let response: ListUnitsResponse = parse("list-organizational-units-for-parent", &stdout)?;
        Ok(Page {
            items: response
                .organizational_units
                .into_iter()
                .map(|u| OrgUnit {
                    id: u.id,
                    name: u.name,
                })
                .collect(),
            next_token: response.next_token,
        })
    }

    fn list_targets_for_policy(
        &self,
        policy_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<String>, DirectoryError> {
        let mut params = owned(&[("--policy-id", policy_id)]);
        params.extend(self.paging(page_token));
        let stdout = self.organizations("list-targets-for-policy", params)?;
        let response: ListTargetsResponse = parse("list-targets-for-policy", &stdout)?;
        Ok(Page {
            items: response.targets.into_iter().map(|t| t.target_id).collect(),
            next_token: response.next_token,
        })
    }

    fn create_policy(
        &mut self,
        name: &str,
        description: &str,
        content: &str,
    ) -> Result<String, DirectoryError> {
        let params = owned(&[
            ("--name", name),
            ("--description", description),
            ("--content", content),
            ("--type", self.config.policy_type.as_str()),
        ]);
        let stdout = self.organizations("create-policy", params)?;
        let response: CreatePolicyResponse = parse("create-policy", &stdout)?;
        Ok(response.policy.policy_summary.id)
    }

    fn update_policy(
        &mut self,
        policy_id: &str,
        name: &str,
        description: &str,
        content: &str,
    ) -> Result<(), DirectoryError> {
        let params = owned(&[
            ("--policy-id", policy_id),
            ("--name", name),
            ("--description", description),
            ("--content", content),
        ]);
        self.organizations("update-policy", params)?;
        Ok(())
    }

    fn attach_policy(&mut self, policy_id: &str, target_id: &str) -> Result<(), DirectoryError> {
        let params = owned(&[("--policy-id", policy_id), ("--target-id", target_id)]);
        self.organizations("attach-policy", params)?;
        Ok(())
    }

    fn detach_policy(&mut self, policy_id: &str, target_id: &str) -> Result<(), DirectoryError> {
        let params = owned(&[("--policy-id", policy_id), ("--target-id", target_id)]);
        self.organizations("detach-policy", params)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "aws-organizations"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::CommandOutput;
    use op_reconcile::{collect_pages, OrgUnitIndex, PolicyIndex, ReconcileError};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::path::Path;

    /// Replays canned outputs in order and records every argument list.
    #[derive(Default)]
    struct ScriptedRunner {
        outputs: RefCell<VecDeque<CommandOutput>>,
        calls: RefCell<Vec<Vec<String>>>,
    }

    impl ScriptedRunner {
        fn new(outputs: Vec<CommandOutput>) -> Self {
            Self {
                outputs: RefCell::new(outputs.into()),
                calls: RefCell::default(),
            }
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, _program: &Path, args: &[String]) -> std::io::Result<CommandOutput> {
            self.calls.borrow_mut().push(args.to_vec());
            Ok(self
                .outputs
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| CommandOutput::failed("script exhausted")))
        }
    }

    fn directory(outputs: Vec<CommandOutput>) -> AwsCliDirectory<ScriptedRunner> {
        let config = AwsCliConfig {
            profile: Some("org-admin".to_string()),
            page_size: 2,
            ..AwsCliConfig::default()
        };
        let retry = RetryConfig {
            max_retries: 2,
            base_delay_ms: 0,
        };
        AwsCliDirectory::with_runner("aws", config, retry, ScriptedRunner::new(outputs))
    }

    fn calls(dir: &AwsCliDirectory<ScriptedRunner>) -> Vec<Vec<String>> {
        dir.runner.calls.borrow().clone()
    }

    #[test]
    fn list_policies_pages_with_starting_token() {
        let dir = directory(vec![
            CommandOutput::ok(
                r#"{"Policies":[{"Id":"p-FullAWSAccess","Name":"FullAWSAccess","Type":"SERVICE_CONTROL_POLICY","AwsManaged":true},
                               {"Id":"p-123","Name":"P2"}],"NextToken":"tok-1"}"#,
            ),
            CommandOutput::ok(r#"{"Policies":[{"Id":"p-456","Name":"P3"}]}"#),
        ]);

        let index = PolicyIndex::build(&dir).unwrap();
        assert_eq!(index.resolve("P2"), Some("p-123"));
        assert_eq!(index.resolve("P3"), Some("p-456"));

        let calls = calls(&dir);
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0],
            [
                "organizations",
                "list-policies",
                "--filter",
                "SERVICE_CONTROL_POLICY",
                "--max-items",
                "2",
                "--output",
                "json",
                "--profile",
                "org-admin"
            ]
        );
        assert!(calls[1].windows(2).any(|w| w == ["--starting-token", "tok-1"]));
    }

    #[test]
    fn walks_units_from_root() {
        let dir = directory(vec![
            CommandOutput::ok(r#"{"Roots":[{"Id":"r-ab12","Arn":"arn:aws:organizations::1:root/o-1/r-ab12","Name":"Root"}]}"#),
            CommandOutput::ok(r#"{"OrganizationalUnits":[{"Id":"ou-ab12-sand","Name":"Sandbox"}]}"#),
            CommandOutput::ok(r#"{"OrganizationalUnits":[]}"#),
        ]);

        let index = OrgUnitIndex::build(&dir).unwrap();
        assert_eq!(index.root_id(), "r-ab12");
        assert_eq!(index.resolve("Sandbox").unwrap(), "ou-ab12-sand");

        let calls = calls(&dir);
        assert!(calls[1].windows(2).any(|w| w == ["--parent-id", "r-ab12"]));
        assert!(calls[2].windows(2).any(|w| w == ["--parent-id", "ou-ab12-sand"]));
    }

    #[test]
    fn empty_roots_means_no_root() {
        let dir = directory(vec![CommandOutput::ok(r#"{"Roots":[]}"#)]);
        assert!(matches!(
            OrgUnitIndex::build(&dir),
            Err(ReconcileError::NoRoot)
        ));
    }

    #[test]
    fn create_policy_returns_assigned_id() {
        let mut dir = directory(vec![CommandOutput::ok(
            r#"{"Policy":{"PolicySummary":{"Id":"p-new1","Name":"P1","Type":"SERVICE_CONTROL_POLICY"},"Content":"{}"}}"#,
        )]);

        let id = dir.create_policy("P1", "desc", "{\"a\":1}").unwrap();
        assert_eq!(id, "p-new1");

        let call = &calls(&dir)[0];
        assert!(call.windows(2).any(|w| w == ["--content", "{\"a\":1}"]));
        assert!(call.windows(2).any(|w| w == ["--type", "SERVICE_CONTROL_POLICY"]));
    }

    #[test]
    fn list_targets_extracts_target_ids() {
        let dir = directory(vec![CommandOutput::ok(
            r#"{"Targets":[{"TargetId":"111122223333","Type":"ACCOUNT","Name":"dev"},
                           {"TargetId":"ou-ab12-sand","Type":"ORGANIZATIONAL_UNIT","Name":"Sandbox"}]}"#,
        )]);
        let targets = collect_pages(|t| dir.list_targets_for_policy("p-123", t)).unwrap();
        assert_eq!(targets, vec!["111122223333", "ou-ab12-sand"]);
    }

    #[test]
    fn throttled_attach_is_retried() {
        let throttled = CommandOutput::failed(
            "An error occurred (TooManyRequestsException) when calling the AttachPolicy operation: Rate exceeded",
        );
        let mut dir = directory(vec![throttled.clone(), throttled, CommandOutput::ok("")]);

        dir.attach_policy("p-123", "ou-ab12-sand").unwrap();
        assert_eq!(calls(&dir).len(), 3);
    }

    #[test]
    fn permanent_failure_is_backend_error() {
        let mut dir = directory(vec![CommandOutput::failed(
            "An error occurred (DuplicatePolicyAttachmentException) when calling the AttachPolicy operation: already attached",
        )]);
        match dir.attach_policy("p-123", "ou-1").unwrap_err() {
            DirectoryError::Backend { operation, message } => {
                assert_eq!(operation, "attach-policy");
                assert!(message.contains("DuplicatePolicyAttachmentException"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(calls(&dir).len(), 1);
    }

    #[test]
    fn garbage_output_is_invalid_response() {
        let dir = directory(vec![CommandOutput::ok("not json")]);
        assert!(matches!(
            dir.list_policies(None),
            Err(DirectoryError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn verify_session_parses_identity() {
        let dir = directory(vec![CommandOutput::ok(
            r#"{"UserId":"AIDAEXAMPLE","Account":"111122223333","Arn":"arn:aws:iam::111122223333:user/ops"}"#,
        )]);
        let identity = dir.verify_session().unwrap();
        assert_eq!(identity.account, "111122223333");
        assert_eq!(calls(&dir)[0][..2], ["sts", "get-caller-identity"]);
    }

    #[test]
    fn missing_credentials_is_no_session() {
        let dir = directory(vec![CommandOutput::failed(
            "Unable to locate credentials. You can configure credentials by running \"aws configure\".",
        )]);
        assert!(matches!(dir.verify_session(), Err(AwsError::NoSession(_))));
    }
}
