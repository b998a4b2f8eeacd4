// config.rs: orgpolicy.toml loading.
//
// The config file is optional. When it is absent every value takes its
// default. When it is present but malformed the run stops.

use std::path::{Path, PathBuf};

use anyhow::Context;
use op_aws::{AwsCliConfig, RetryConfig};
use serde::{Deserialize, Serialize};

/// Name of the optional config file inside the config directory.
pub const CONFIG_FILE: &str = "orgpolicy.toml";

/// Top-level configuration from `<config-dir>/orgpolicy.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrgPolicyConfig {
    /// Manifest path, relative to the config directory.
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,

    #[serde(default)]
    pub backend: AwsCliConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for OrgPolicyConfig {
    fn default() -> Self {
        Self {
            manifest: default_manifest(),
            backend: AwsCliConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_manifest() -> PathBuf {
    PathBuf::from("manifest.yaml")
}

impl OrgPolicyConfig {
    /// Load `orgpolicy.toml` from the config directory, or defaults if absent.
    pub fn load_from_dir(config_dir: &Path) -> anyhow::Result<Self> {
        let path = config_dir.join(CONFIG_FILE);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config =
            toml::from_str(&content).with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// The manifest path resolved against the config directory.
    pub fn manifest_path(&self, config_dir: &Path) -> PathBuf {
        config_dir.join(&self.manifest)
    }
}
