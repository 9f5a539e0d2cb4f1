//! Version storage contract and the in-memory reference store.
//!
//! Versions are immutable: every save appends a new snapshot with a
//! server-assigned, monotonically increasing version number, and the only
//! thing that ever mutates is the document's current-version pointer.
//! Optimistic concurrency lives here: a commit declares the version number
//! it was based on, and the store rejects it if the document has moved on.

use chrono::Utc;
use labdoc_schema::Version;
use labdoc_types::NonEmptyText;
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document '{0}' not found")]
    DocumentNotFound(String),
    #[error("version '{0}' not found")]
    VersionNotFound(String),
    /// The commit was based on a version that is no longer current.
    #[error("stale base version: document is now at version {current_version}")]
    Conflict { current_version: u64 },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A new snapshot to be committed.
#[derive(Clone, Debug)]
pub struct NewVersion {
    pub title: Option<String>,
    /// Wire-shape document content.
    pub content: Value,
    pub commit_message: NonEmptyText,
    /// The version number this snapshot was edited from.
    pub base_version: u64,
}

/// The persistence seam for versioned documents.
///
/// Implementations must treat versions as append-only and assign version
/// numbers themselves; clients only ever state which version they started
/// from.
pub trait VersionStore {
    /// The current wire-format document: the content of the version the
    /// current-version pointer designates, plus document identity.
    fn load_document(&self, document_id: &str) -> StoreResult<Value>;

    /// Full history, ascending by version number.
    fn list_versions(&self, document_id: &str) -> StoreResult<Vec<Version>>;

    /// Appends a snapshot and moves the current-version pointer to it.
    ///
    /// # Errors
    ///
    /// [`StoreError::Conflict`] if `new_version.base_version` is not the
    /// document's current version number.
    fn commit_version(&mut self, document_id: &str, new_version: NewVersion)
        -> StoreResult<Version>;

    /// Moves the current-version pointer to an existing version without
    /// touching history.
    fn checkout_version(&mut self, document_id: &str, version_id: &str) -> StoreResult<Version>;
}

#[derive(Clone, Debug)]
struct StoredDocument {
    versions: Vec<Version>,
    current_version_id: String,
}

impl StoredDocument {
    fn current(&self) -> &Version {
        // The pointer always designates an existing version.
        self.versions
            .iter()
            .find(|version| version.id == self.current_version_id)
            .unwrap_or_else(|| &self.versions[0])
    }

    fn latest_number(&self) -> u64 {
        self.versions
            .iter()
            .map(|version| version.version_number)
            .max()
            .unwrap_or(0)
    }
}

/// In-memory [`VersionStore`], used by tests and the command-line tools.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: HashMap<String, StoredDocument>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a document with its initial version and returns the new
    /// document id.
    pub fn create_document(&mut self, title: Option<String>, content: Value) -> String {
        let document_id = Uuid::new_v4().to_string();
        let version = Version {
            id: Uuid::new_v4().to_string(),
            version_number: 1,
            title,
            content,
            commit_message: None,
            created_at: Utc::now(),
            base_version: None,
        };
        self.documents.insert(
            document_id.clone(),
            StoredDocument {
                current_version_id: version.id.clone(),
                versions: vec![version],
            },
        );
        document_id
    }

    fn document(&self, document_id: &str) -> StoreResult<&StoredDocument> {
        self.documents
            .get(document_id)
            .ok_or_else(|| StoreError::DocumentNotFound(document_id.to_owned()))
    }

    fn document_mut(&mut self, document_id: &str) -> StoreResult<&mut StoredDocument> {
        self.documents
            .get_mut(document_id)
            .ok_or_else(|| StoreError::DocumentNotFound(document_id.to_owned()))
    }
}

impl VersionStore for MemoryStore {
    fn load_document(&self, document_id: &str) -> StoreResult<Value> {
        let stored = self.document(document_id)?;
        let current = stored.current();
        let mut doc = json!({
            "id": document_id,
            "content": current.content,
            "current_version_id": current.id,
        });
        if let Some(title) = &current.title {
            doc["title"] = Value::String(title.clone());
        }
        Ok(doc)
    }

    fn list_versions(&self, document_id: &str) -> StoreResult<Vec<Version>> {
        let mut versions = self.document(document_id)?.versions.clone();
        versions.sort_by_key(|version| version.version_number);
        Ok(versions)
    }

    fn commit_version(
        &mut self,
        document_id: &str,
        new_version: NewVersion,
    ) -> StoreResult<Version> {
        let stored = self.document_mut(document_id)?;

        let current_version = stored.latest_number();
        if new_version.base_version != current_version {
            tracing::info!(
                document_id,
                base = new_version.base_version,
                current = current_version,
                "rejected stale commit"
            );
            return Err(StoreError::Conflict { current_version });
        }

        let version = Version {
            id: Uuid::new_v4().to_string(),
            version_number: current_version + 1,
            title: new_version.title,
            content: new_version.content,
            commit_message: Some(new_version.commit_message.as_str().to_owned()),
            created_at: Utc::now(),
            base_version: Some(new_version.base_version),
        };
        stored.current_version_id = version.id.clone();
        stored.versions.push(version.clone());
        Ok(version)
    }

    fn checkout_version(&mut self, document_id: &str, version_id: &str) -> StoreResult<Version> {
        let stored = self.document_mut(document_id)?;
        let version = stored
            .versions
            .iter()
            .find(|version| version.id == version_id)
            .cloned()
            .ok_or_else(|| StoreError::VersionNotFound(version_id.to_owned()))?;
        stored.current_version_id = version.id.clone();
        Ok(version)
    }
}
