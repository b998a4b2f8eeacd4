// memory.rs: In-memory OrgDirectory.
//
// Behaves like the real backend where reconciliation can observe it:
// paginated listings, backend-assigned ids, duplicate-name and
// duplicate-attachment rejections. Every mutation is recorded so callers can
// assert exactly what was issued, and failures can be injected per
// operation and key.

use std::collections::{BTreeMap, BTreeSet};

use crate::directory::{OrgDirectory, OrgUnit, Page, PolicySummary};
use crate::error::DirectoryError;

/// A policy as stored by the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPolicy {
    pub name: String,
    pub description: String,
    pub content: String,
}

/// A mutating call that reached the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create { name: String },
    Update { policy_id: String },
    Attach { policy_id: String, target_id: String },
    Detach { policy_id: String, target_id: String },
}

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListPolicies,
    ListChildren,
    ListTargets,
    CreatePolicy,
    UpdatePolicy,
    Attach,
    Detach,
}

/// Backend state held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryDirectory {
    root_id: Option<String>,
    children: BTreeMap<String, Vec<OrgUnit>>,
    policies: BTreeMap<String, StoredPolicy>,
    attachments: BTreeMap<String, BTreeSet<String>>,
    page_size: usize,
    next_id: u64,
    mutations: Vec<Mutation>,
    failures: Vec<(Operation, String)>,
}

impl InMemoryDirectory {
    /// An organization with only a root.
    pub fn new(root_id: impl Into<String>) -> Self {
        Self {
            root_id: Some(root_id.into()),
            children: BTreeMap::new(),
            policies: BTreeMap::new(),
            attachments: BTreeMap::new(),
            page_size: 20,
            next_id: 1,
            mutations: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// A backend that reports no root at all.
    pub fn without_root() -> Self {
        let mut dir = Self::new("");
        dir.root_id = None;
        dir
    }

    /// Items per listing page (minimum 1).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Add a unit under `parent_id` (the root id or another unit's id).
    pub fn with_unit(mut self, parent_id: &str, id: &str, name: &str) -> Self {
        self.children
            .entry(parent_id.to_string())
            .or_default()
            .push(OrgUnit {
                id: id.to_string(),
                name: name.to_string(),
            });
        self
    }

    /// Seed an existing policy.
    pub fn with_policy(mut self, id: &str, name: &str, content: &str) -> Self {
        self.policies.insert(
            id.to_string(),
            StoredPolicy {
                name: name.to_string(),
                description: String::new(),
                content: content.to_string(),
            },
        );
        self
    }

    /// Seed an existing attachment.
    pub fn with_attachment(mut self, policy_id: &str, target_id: &str) -> Self {
        self.attachments
            .entry(policy_id.to_string())
            .or_default()
            .insert(target_id.to_string());
        self
    }

    /// Make `operation` fail whenever its key matches.
    ///
    /// Keys: policy name for create, policy id for update and list-targets,
    /// target id for attach and detach, parent id for list-children, and
    /// anything for list-policies.
    pub fn fail_on(mut self, operation: Operation, key: &str) -> Self {
        self.failures.push((operation, key.to_string()));
        self
    }

    /// Every mutation issued so far, in order.
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn policy(&self, id: &str) -> Option<&StoredPolicy> {
        self.policies.get(id)
    }

    /// Id of the policy with the given name.
    pub fn policy_id(&self, name: &str) -> Option<&str> {
        self.policies
            .iter()
            .find(|(_, p)| p.name == name)
            .map(|(id, _)| id.as_str())
    }

    /// Current targets of a policy.
    pub fn targets_of(&self, policy_id: &str) -> BTreeSet<String> {
        self.attachments.get(policy_id).cloned().unwrap_or_default()
    }

    fn check(&self, operation: Operation, key: &str) -> Result<(), DirectoryError> {
        let injected = self
            .failures
            .iter()
            .any(|(op, k)| *op == operation && (operation == Operation::ListPolicies || k == key));
        if injected {
            return Err(DirectoryError::Backend {
                operation: format!("{:?}", operation),
                message: format!("injected failure for '{}'", key),
            });
        }
        Ok(())
    }

    fn require_policy(&self, policy_id: &str) -> Result<(), DirectoryError> {
        if self.policies.contains_key(policy_id) {
            Ok(())
        } else {
            Err(DirectoryError::NotFound(format!("policy {}", policy_id)))
        }
    }

    fn paginate<T: Clone>(&self, items: &[T], token: Option<&str>) -> Result<Page<T>, DirectoryError> {
        let start = match token {
            None => 0,
            Some(t) => t.parse::<usize>().map_err(|_| DirectoryError::InvalidResponse {
                operation: "paginate".to_string(),
                reason: format!("bad page token '{}'", t),
            })?,
        };
        let end = (start + self.page_size).min(items.len());
        let page = items.get(start..end).unwrap_or_default().to_vec();
        let next_token = (end < items.len()).then(|| end.to_string());
        Ok(Page {
            items: page,
            next_token,
        })
    }
}

impl OrgDirectory for InMemoryDirectory {
    fn list_policies(&self, page_token: Option<&str>) -> Result<Page<PolicySummary>, DirectoryError> {
        self.check(Operation::ListPolicies, "")?;
        let all: Vec<PolicySummary> = self
            .policies
            .iter()
            .map(|(id, p)| PolicySummary {
                id: id.clone(),
                name: p.name.clone(),
            })
            .collect();
        self.paginate(&all, page_token)
    }

    fn root_id(&self) -> Result<Option<String>, DirectoryError> {
        Ok(self.root_id.clone())
    }

    fn list_child_units(
        &self,
        parent_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<OrgUnit>, DirectoryError> {
        self.check(Operation::ListChildren, parent_id)?;
        let children = self.children.get(parent_id).map(Vec::as_slice).unwrap_or_default();
        self.paginate(children, page_token)
    }

    fn list_targets_for_policy(
        &self,
        policy_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<String>, DirectoryError> {
        self.check(Operation::ListTargets, policy_id)?;
        self.require_policy(policy_id)?;
        let targets: Vec<String> = self.targets_of(policy_id).into_iter().collect();
        self.paginate(&targets, page_token)
    }

    fn create_policy(
        &mut self,
        name: &str,
        description: &str,
        content: &str,
    ) -> Result<String, DirectoryError> {
        self.check(Operation::CreatePolicy, name)?;
        if self.policy_id(name).is_some() {
            return Err(DirectoryError::Backend {
                operation: "create-policy".to_string(),
                message: format!("DuplicatePolicyException: {}", name),
            });
        }
        let mut id = format!("p-mem{:04}", self.next_id);
        while self.policies.contains_key(&id) {
            self.next_id += 1;
            id = format!("p-mem{:04}", self.next_id);
        }
        self.next_id += 1;
        self.policies.insert(
            id.clone(),
            StoredPolicy {
                name: name.to_string(),
                description: description.to_string(),
                content: content.to_string(),
            },
        );
        self.mutations.push(Mutation::Create {
            name: name.to_string(),
        });
        Ok(id)
    }

    fn update_policy(
        &mut self,
        policy_id: &str,
        name: &str,
        description: &str,
        content: &str,
    ) -> Result<(), DirectoryError> {
        self.check(Operation::UpdatePolicy, policy_id)?;
        let policy = self
            .policies
            .get_mut(policy_id)
            .ok_or_else(|| DirectoryError::NotFound(format!("policy {}", policy_id)))?;
        policy.name = name.to_string();
        policy.description = description.to_string();
        policy.content = content.to_string();
        self.mutations.push(Mutation::Update {
            policy_id: policy_id.to_string(),
        });
        Ok(())
    }

    fn attach_policy(&mut self, policy_id: &str, target_id: &str) -> Result<(), DirectoryError> {
        self.check(Operation::Attach, target_id)?;
        self.require_policy(policy_id)?;
        let targets = self.attachments.entry(policy_id.to_string()).or_default();
        if !targets.insert(target_id.to_string()) {
            return Err(DirectoryError::Backend {
                operation: "attach-policy".to_string(),
                message: format!("DuplicatePolicyAttachmentException: {}", target_id),
            });
        }
        self.mutations.push(Mutation::Attach {
            policy_id: policy_id.to_string(),
            target_id: target_id.to_string(),
        });
        Ok(())
    }

    fn detach_policy(&mut self, policy_id: &str, target_id: &str) -> Result<(), DirectoryError> {
        self.check(Operation::Detach, target_id)?;
        self.require_policy(policy_id)?;
        let removed = self
            .attachments
            .get_mut(policy_id)
            .map(|targets| targets.remove(target_id))
            .unwrap_or(false);
        if !removed {
            return Err(DirectoryError::Backend {
                operation: "detach-policy".to_string(),
                message: format!("PolicyNotAttachedException: {}", target_id),
            });
        }
        self.mutations.push(Mutation::Detach {
            policy_id: policy_id.to_string(),
            target_id: target_id.to_string(),
        });
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::collect_pages;

    #[test]
    fn listings_are_paginated() {
        let dir = InMemoryDirectory::new("r-1")
            .with_page_size(2)
            .with_policy("p-1", "A", "{}")
            .with_policy("p-2", "B", "{}")
            .with_policy("p-3", "C", "{}");

        let first = dir.list_policies(None).unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.next_token.as_deref(), Some("2"));

        let all = collect_pages(|t| dir.list_policies(t)).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn create_assigns_fresh_ids_and_rejects_duplicates() {
        let mut dir = InMemoryDirectory::new("r-1").with_policy("p-mem0001", "Seeded", "{}");
        let id = dir.create_policy("P1", "desc", "{}").unwrap();
        assert_ne!(id, "p-mem0001");
        assert_eq!(dir.policy(&id).unwrap().description, "desc");
        assert!(dir.create_policy("P1", "", "{}").is_err());
        assert_eq!(dir.mutations().len(), 1);
    }

    #[test]
    fn attach_twice_and_detach_unattached_fail() {
        let mut dir = InMemoryDirectory::new("r-1").with_policy("p-1", "A", "{}");
        dir.attach_policy("p-1", "ou-1").unwrap();
        assert!(dir.attach_policy("p-1", "ou-1").is_err());
        assert!(dir.detach_policy("p-1", "ou-2").is_err());
        dir.detach_policy("p-1", "ou-1").unwrap();
        assert!(dir.targets_of("p-1").is_empty());
    }

    #[test]
    fn injected_failure_matches_key() {
        let mut dir = InMemoryDirectory::new("r-1")
            .with_policy("p-1", "A", "{}")
            .fail_on(Operation::Attach, "acct-bad");
        assert!(dir.attach_policy("p-1", "acct-ok").is_ok());
        assert!(matches!(
            dir.attach_policy("p-1", "acct-bad"),
            Err(DirectoryError::Backend { .. })
        ));
    }
}
