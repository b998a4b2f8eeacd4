pub mod apply;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::Context;
use op_manifest::Manifest;

use crate::config::OrgPolicyConfig;

/// Load the manifest named by `--manifest` or by the config file.
///
/// Document paths resolve against the config directory regardless of where
/// the manifest itself lives.
pub(crate) fn load_manifest(
    config_dir: &Path,
    config: &OrgPolicyConfig,
    manifest_override: Option<&Path>,
) -> anyhow::Result<Manifest> {
    let path: PathBuf = match manifest_override {
        Some(path) => config_dir.join(path),
        None => config.manifest_path(config_dir),
    };
    let manifest = op_manifest::load_manifest(&path)
        .with_context(|| format!("failed to load manifest {}", path.display()))?;
    tracing::info!(
        manifest = %path.display(),
        policies = manifest.len(),
        "manifest loaded"
    );
    Ok(Manifest::new(config_dir, manifest.policies))
}
