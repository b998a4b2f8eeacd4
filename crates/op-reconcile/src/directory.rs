// directory.rs: The OrgDirectory trait, covering everything reconciliation needs
// from the policy backend.
//
// The reconciler never talks to a concrete wire protocol. It enumerates and
// mutates through this trait, and the CLI plugs in a real transport
// (op-aws) while tests plug in the in-memory directory.
//
// Enumeration methods are page-at-a-time. Callers walk pages with
// `collect_pages()` so pagination lives in one place.

use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;

/// One page of an enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Token for the next page; `None` on the last page.
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// A single page with nothing after it.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }
}

/// An existing policy as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySummary {
    pub id: String,
    pub name: String,
}

/// An organizational unit as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgUnit {
    pub id: String,
    pub name: String,
}

/// Enumeration and mutation primitives over a hierarchical policy backend.
///
/// Read methods take `&self`; mutations take `&mut self` so an
/// implementation can keep plain owned state.
pub trait OrgDirectory {
    /// List one page of all policies of the managed type.
    fn list_policies(&self, page_token: Option<&str>)
        -> Result<Page<PolicySummary>, DirectoryError>;

    /// The organization root id, or `None` if the backend reports no root.
    fn root_id(&self) -> Result<Option<String>, DirectoryError>;

    /// List one page of the direct children of a unit (or of the root).
    fn list_child_units(
        &self,
        parent_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<OrgUnit>, DirectoryError>;

    /// List one page of target ids (units, accounts, root) a policy is attached to.
    fn list_targets_for_policy(
        &self,
        policy_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<String>, DirectoryError>;

    /// Create a policy and return its backend-assigned id.
    fn create_policy(
        &mut self,
        name: &str,
        description: &str,
        content: &str,
    ) -> Result<String, DirectoryError>;

    /// Replace a policy's name, description, and content.
    fn update_policy(
        &mut self,
        policy_id: &str,
        name: &str,
        description: &str,
        content: &str,
    ) -> Result<(), DirectoryError>;

    fn attach_policy(&mut self, policy_id: &str, target_id: &str) -> Result<(), DirectoryError>;

    fn detach_policy(&mut self, policy_id: &str, target_id: &str) -> Result<(), DirectoryError>;

    /// Directory display name (for logging).
    fn name(&self) -> &str;
}

/// Walk an enumeration to the end, one page at a time.
///
/// An empty-string token is treated as "no more pages".
pub fn collect_pages<T, F>(mut fetch: F) -> Result<Vec<T>, DirectoryError>
where
    F: FnMut(Option<&str>) -> Result<Page<T>, DirectoryError>,
{
    let mut items = Vec::new();
    let mut token: Option<String> = None;
    let mut pages = 0usize;
    loop {
        let page = fetch(token.as_deref())?;
        pages += 1;
        items.extend(page.items);
        match page.next_token {
            Some(next) if !next.is_empty() => token = Some(next),
            _ => break,
        }
    }
    tracing::trace!(pages, items = items.len(), "enumeration complete");
    Ok(items)
}
