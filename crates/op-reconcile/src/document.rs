// document.rs: Policy document canonicalization and size validation.
//
// The backend limits policy content to 5120 bytes. Authors keep documents
// pretty-printed on disk, so we measure (and submit) the minified form:
// parse as JSON, re-serialize compactly, count bytes. Key order is not
// preserved; only compactness matters.

use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::EntryError;

/// Maximum canonical policy content size accepted by the backend, in bytes.
pub const MAX_POLICY_CONTENT_BYTES: usize = 5120;

/// A validated, minified policy document ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalDocument {
    content: String,
}

impl CanonicalDocument {
    /// The minified JSON text.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Canonical length in bytes.
    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Lowercase hex SHA-256 of the canonical content.
    pub fn sha256(&self) -> String {
        format!("{:x}", Sha256::digest(self.content.as_bytes()))
    }
}

/// Normalizes policy documents and enforces the size ceiling.
#[derive(Debug, Clone, Copy)]
pub struct ContentValidator {
    limit: usize,
}

impl Default for ContentValidator {
    fn default() -> Self {
        Self {
            limit: MAX_POLICY_CONTENT_BYTES,
        }
    }
}

impl ContentValidator {
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Read a document from disk and validate it.
    pub fn read(&self, path: &Path) -> Result<CanonicalDocument, EntryError> {
        let raw = fs::read(path).map_err(|source| EntryError::DocumentUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        self.validate(&raw, path)
    }

    /// Canonicalize raw document bytes and check the size limit.
    ///
    /// `origin` is only used for error context.
    pub fn validate(&self, raw: &[u8], origin: &Path) -> Result<CanonicalDocument, EntryError> {
        let value: serde_json::Value =
            serde_json::from_slice(raw).map_err(|source| EntryError::MalformedDocument {
                path: origin.to_path_buf(),
                source,
            })?;
        // Serializing a Value cannot fail: every key is already a string.
        let content = value.to_string();
        let size = content.len();
        if size > self.limit {
            return Err(EntryError::SizeExceeded {
                size,
                limit: self.limit,
            });
        }
        Ok(CanonicalDocument { content })
    }
}
