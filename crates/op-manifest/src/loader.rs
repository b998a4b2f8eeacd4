// loader.rs: Read, parse, and validate a manifest file.
//
// Validation here covers only what can be checked without the backend:
// non-empty names and document paths, and name uniqueness. Whether the
// documents exist and fit the size limit is checked per entry during
// reconciliation so one bad document never blocks the others.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::declaration::{Manifest, PolicyDeclaration};
use crate::error::ManifestError;

/// Load a manifest from disk.
///
/// Document paths in the manifest are resolved relative to the directory
/// containing the manifest file.
pub fn load_manifest(path: impl AsRef<Path>) -> Result<Manifest, ManifestError> {
    let path = path.as_ref();
    let yaml = fs::read_to_string(path).map_err(|source| ManifestError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let manifest = parse_manifest(&yaml, base_dir)?;
    tracing::debug!(
        path = %path.display(),
        policies = manifest.len(),
        "loaded manifest"
    );
    Ok(manifest)
}

/// Parse manifest YAML and validate the declarations.
pub fn parse_manifest(yaml: &str, base_dir: &Path) -> Result<Manifest, ManifestError> {
    // An empty file is an empty manifest, not a parse error.
    let policies: Vec<PolicyDeclaration> = if yaml.trim().is_empty() {
        Vec::new()
    } else {
        serde_yaml::from_str(yaml)?
    };
    validate(&policies)?;
    Ok(Manifest::new(base_dir, policies))
}

fn validate(policies: &[PolicyDeclaration]) -> Result<(), ManifestError> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (index, decl) in policies.iter().enumerate() {
        if decl.name.trim().is_empty() {
            return Err(ManifestError::EmptyField {
                index,
                field: "name",
            });
        }
        if decl.resource_file.as_os_str().is_empty() {
            return Err(ManifestError::EmptyField {
                index,
                field: "resource_file",
            });
        }
        if let Some(first) = seen.insert(decl.name.as_str(), index) {
            return Err(ManifestError::DuplicatePolicy {
                name: decl.name.clone(),
                first,
                second: index,
            });
        }
    }
    Ok(())
}
