// declaration.rs: Manifest entry types.
//
// The field names mirror the YAML the operator writes, so the structs are
// deserialized directly with no renaming layer in between.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

/// Where a policy should be attached.
///
/// Both lists are optional in YAML; an absent key is an empty set. Sets are
/// used because attachment has no ordering or multiplicity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentTargets {
    /// Organizational unit names (resolved to ids at reconcile time).
    /// The reserved name `Root` refers to the organization root.
    #[serde(default)]
    pub organizational_units: BTreeSet<String>,

    /// Literal account ids.
    #[serde(default, deserialize_with = "account_ids")]
    pub accounts: BTreeSet<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AccountId {
    Text(String),
    Number(u64),
}

/// Accept quoted or bare account ids.
fn account_ids<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeSet<String>, D::Error> {
    let ids = Vec::<AccountId>::deserialize(deserializer)?;
    Ok(ids
        .into_iter()
        .map(|id| match id {
            AccountId::Text(id) => id,
            // A bare YAML integer has lost its leading zeros; ids are 12 digits.
            AccountId::Number(n) => format!("{:012}", n),
        })
        .collect())
}

impl DeploymentTargets {
    /// True when the policy should end up attached to nothing.
    pub fn is_empty(&self) -> bool {
        self.organizational_units.is_empty() && self.accounts.is_empty()
    }
}

/// A single named policy in the manifest.
///
/// ```yaml
/// - name: DenyLeaveOrganization
///   description: Accounts may not leave the organization
///   resource_file: policies/deny-leave.json
///   deployment_targets:
///     organizational_units: [Sandbox]
///     accounts: ["111122223333"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyDeclaration {
    /// Policy name, unique within the manifest and the backend.
    pub name: String,

    /// Free-text description submitted with the policy.
    #[serde(default)]
    pub description: String,

    /// Path to the JSON policy document, relative to the config directory.
    pub resource_file: PathBuf,

    #[serde(default)]
    pub deployment_targets: DeploymentTargets,
}

impl PolicyDeclaration {
    /// Resolve the document path against the config directory.
    ///
    /// Absolute `resource_file` values are used as-is.
    pub fn document_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.resource_file)
    }
}

/// A loaded manifest: the declarations plus the directory their document
/// paths are relative to.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub base_dir: PathBuf,
    pub policies: Vec<PolicyDeclaration>,
}

impl Manifest {
    pub fn new(base_dir: impl Into<PathBuf>, policies: Vec<PolicyDeclaration>) -> Self {
        Self {
            base_dir: base_dir.into(),
            policies,
        }
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
