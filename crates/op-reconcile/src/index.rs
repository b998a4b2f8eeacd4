// index.rs: Run-scoped name → id snapshots of the backend.
//
// Both indices are built once at the start of a run by a full paginated
// enumeration and never refreshed. The OU index walks the hierarchy with an
// explicit worklist, so depth is bounded only by memory.
//
// OU names are not unique in the backend. Instead of letting the last unit
// discovered win, the index keeps every id seen for a name and refuses to
// resolve a name that maps to more than one unit.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::directory::{collect_pages, OrgDirectory, PolicySummary};
use crate::error::{EntryError, ReconcileError};

/// Reserved unit name for the organization root.
pub const ROOT_UNIT_NAME: &str = "Root";

/// Existing policies by name.
#[derive(Debug, Clone, Default)]
pub struct PolicyIndex {
    ids_by_name: HashMap<String, String>,
}

impl PolicyIndex {
    /// Enumerate every policy in the backend.
    pub fn build<D: OrgDirectory + ?Sized>(directory: &D) -> Result<Self, ReconcileError> {
        let policies = collect_pages(|token| directory.list_policies(token)).map_err(
            |source| ReconcileError::Enumeration {
                what: "policies",
                source,
            },
        )?;
        Ok(Self::from_policies(policies))
    }

    pub fn from_policies(policies: impl IntoIterator<Item = PolicySummary>) -> Self {
        let mut ids_by_name = HashMap::new();
        for policy in policies {
            if let Some(previous) = ids_by_name.insert(policy.name.clone(), policy.id.clone()) {
                tracing::warn!(
                    name = %policy.name,
                    previous = %previous,
                    id = %policy.id,
                    "backend reported duplicate policy name"
                );
            }
        }
        Self { ids_by_name }
    }

    /// Look up an existing policy id by name.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.ids_by_name.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids_by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids_by_name.is_empty()
    }
}

/// How a target id reads in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetLabel {
    Root { id: String },
    Unit { name: String, id: String },
    Account { id: String },
}

impl TargetLabel {
    pub fn id(&self) -> &str {
        match self {
            TargetLabel::Root { id }
            | TargetLabel::Unit { id, .. }
            | TargetLabel::Account { id } => id,
        }
    }
}

impl fmt::Display for TargetLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetLabel::Root { id } => write!(f, "Root ({})", id),
            TargetLabel::Unit { name, id } => write!(f, "OU '{}' ({})", name, id),
            TargetLabel::Account { id } => write!(f, "account {}", id),
        }
    }
}

/// The flattened organizational hierarchy.
#[derive(Debug, Clone)]
pub struct OrgUnitIndex {
    root_id: String,
    ids_by_name: HashMap<String, Vec<String>>,
    names_by_id: HashMap<String, String>,
}

impl OrgUnitIndex {
    /// Resolve the root and walk every unit beneath it.
    pub fn build<D: OrgDirectory + ?Sized>(directory: &D) -> Result<Self, ReconcileError> {
        let enumeration = |source| ReconcileError::Enumeration {
            what: "organizational units",
            source,
        };
        let root_id = directory
            .root_id()
            .map_err(enumeration)?
            .ok_or(ReconcileError::NoRoot)?;

        let mut index = Self::with_root(root_id.clone());
        let mut visited: HashSet<String> = HashSet::from([root_id.clone()]);
        let mut worklist = vec![root_id];

        while let Some(parent_id) = worklist.pop() {
            let children = collect_pages(|token| directory.list_child_units(&parent_id, token))
                .map_err(enumeration)?;
            for unit in children {
                if !visited.insert(unit.id.clone()) {
                    tracing::warn!(id = %unit.id, "unit reached twice during walk, skipping");
                    continue;
                }
                index.insert(unit.name, unit.id.clone());
                worklist.push(unit.id);
            }
        }

        tracing::debug!(
            units = index.names_by_id.len(),
            ambiguous = index.ambiguous_names().len(),
            "organizational unit index built"
        );
        Ok(index)
    }

    /// An index containing only the root.
    pub fn with_root(root_id: impl Into<String>) -> Self {
        let root_id = root_id.into();
        let mut index = Self {
            root_id: root_id.clone(),
            ids_by_name: HashMap::new(),
            names_by_id: HashMap::new(),
        };
        index.insert(ROOT_UNIT_NAME.to_string(), root_id);
        index
    }

    /// Record a unit. A repeated name makes that name ambiguous.
    pub fn insert(&mut self, name: String, id: String) {
        self.names_by_id.insert(id.clone(), name.clone());
        let ids = self.ids_by_name.entry(name).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// Resolve a unit name to its single id.
    pub fn resolve(&self, name: &str) -> Result<&str, EntryError> {
        match self.ids_by_name.get(name).map(Vec::as_slice) {
            Some([id]) => Ok(id.as_str()),
            Some(ids) if ids.len() > 1 => Err(EntryError::AmbiguousTarget {
                name: name.to_string(),
                ids: ids.to_vec(),
            }),
            _ => Err(EntryError::UnknownTarget {
                name: name.to_string(),
            }),
        }
    }

    /// Names that map to more than one unit, sorted.
    pub fn ambiguous_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .ids_by_name
            .iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Number of units, including the root.
    pub fn len(&self) -> usize {
        self.names_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names_by_id.is_empty()
    }

    /// Describe a target id for reporting. Ids that are not units are accounts.
    pub fn label(&self, target_id: &str) -> TargetLabel {
        if target_id == self.root_id {
            return TargetLabel::Root {
                id: target_id.to_string(),
            };
        }
        match self.names_by_id.get(target_id) {
            Some(name) => TargetLabel::Unit {
                name: name.clone(),
                id: target_id.to_string(),
            },
            None => TargetLabel::Account {
                id: target_id.to_string(),
            },
        }
    }
}
