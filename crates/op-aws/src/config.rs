//! Backend and retry configuration structures

use serde::{Deserialize, Serialize};

/// How to reach AWS Organizations through the aws CLI.
///
/// Loaded from the `[backend]` table of `orgpolicy.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsCliConfig {
    /// aws CLI executable (name on PATH or absolute path)
    #[serde(default = "default_aws_bin")]
    pub aws_bin: String,

    /// Named profile passed as `--profile`
    #[serde(default)]
    pub profile: Option<String>,

    /// Region passed as `--region`
    #[serde(default)]
    pub region: Option<String>,

    /// Policy type managed by this run, used as the `list-policies` filter
    /// and the `create-policy` type
    #[serde(default = "default_policy_type")]
    pub policy_type: String,

    /// Items requested per listing page (`--max-items`)
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for AwsCliConfig {
    fn default() -> Self {
        Self {
            aws_bin: default_aws_bin(),
            profile: None,
            region: None,
            policy_type: default_policy_type(),
            page_size: default_page_size(),
        }
    }
}

/// Retry behaviour for throttled calls.
///
/// Loaded from the `[retry]` table of `orgpolicy.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 disables retry)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry; doubles for each further retry
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

// Serde default functions
fn default_aws_bin() -> String {
    "aws".to_string()
}

fn default_policy_type() -> String {
    "SERVICE_CONTROL_POLICY".to_string()
}

fn default_page_size() -> u32 {
    20
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    200
}
