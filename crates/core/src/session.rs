//! Edit sessions and optimistic-concurrency reconciliation.
//!
//! An edit session is the client side of the version protocol: it loads a
//! document at a known base version, accumulates edits in a canonical
//! buffer, and tries to commit them. A commit based on a version that is no
//! longer current puts the session into conflict, and the session then
//! offers the three reconciliation paths: reload the server's latest,
//! extract the pending changes as JSON, or stash them for a new context.

use labdoc_schema::{Document, SectionRegistry};
use labdoc_types::NonEmptyText;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{DocumentError, DocumentResult};
use crate::normalize::{to_canonical, to_wire};
use crate::store::{NewVersion, StoreError, VersionStore};

/// Where a session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditState {
    /// Buffer matches the loaded version.
    Clean,
    /// Buffer has uncommitted edits.
    Dirty,
    /// A commit is in flight.
    Saving,
    /// The last commit was rejected; the document has moved on.
    Conflict { server_version: u64 },
}

impl EditState {
    fn name(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Dirty => "dirty",
            Self::Saving => "saving",
            Self::Conflict { .. } => "in conflict",
        }
    }
}

/// The outcome of a save attempt.
#[derive(Clone, Debug)]
pub enum SaveOutcome {
    Committed(labdoc_schema::Version),
    /// The store rejected the commit; the session is now in conflict.
    Conflict { server_version: u64 },
}

/// One user's editing of one document.
#[derive(Clone, Debug)]
pub struct EditSession {
    document_id: String,
    base_version: u64,
    buffer: Document,
    state: EditState,
}

impl EditSession {
    /// Opens a session on the document's current version. The raw stored
    /// document is normalised on the way in, so the buffer is canonical
    /// regardless of how old the stored shape is.
    pub fn open<S: VersionStore>(
        store: &S,
        document_id: &str,
        registry: &SectionRegistry,
    ) -> DocumentResult<Self> {
        let raw = store.load_document(document_id)?;
        let base_version = latest_version_number(store, document_id)?;
        let buffer = to_canonical(&raw, registry).value;
        tracing::debug!(document_id, base_version, "opened edit session");
        Ok(Self {
            document_id: document_id.to_owned(),
            base_version,
            buffer,
            state: EditState::Clean,
        })
    }

    pub fn state(&self) -> EditState {
        self.state
    }

    pub fn base_version(&self) -> u64 {
        self.base_version
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// The current edit buffer.
    pub fn buffer(&self) -> &Document {
        &self.buffer
    }

    /// Applies an edit to the buffer and marks the session dirty.
    ///
    /// # Errors
    ///
    /// [`DocumentError::InvalidSessionState`] while saving or in conflict;
    /// conflicted sessions must reconcile before editing again.
    pub fn edit<F>(&mut self, apply: F) -> DocumentResult<()>
    where
        F: FnOnce(&mut Document),
    {
        match self.state {
            EditState::Clean | EditState::Dirty => {
                apply(&mut self.buffer);
                self.state = EditState::Dirty;
                Ok(())
            }
            other => Err(DocumentError::InvalidSessionState(other.name())),
        }
    }

    /// Attempts to commit the buffer as a new version.
    ///
    /// A rejected commit is not an error at this level: the session moves to
    /// conflict and the caller chooses a reconciliation. Genuine storage
    /// failures still propagate.
    pub fn save<S: VersionStore>(
        &mut self,
        store: &mut S,
        commit_message: NonEmptyText,
    ) -> DocumentResult<SaveOutcome> {
        if self.state != EditState::Dirty {
            return Err(DocumentError::InvalidSessionState(self.state.name()));
        }
        let new_version = NewVersion {
            title: self.buffer.title.clone(),
            content: serde_json::to_value(&self.buffer.content)
                .map_err(DocumentError::Serialization)?,
            commit_message,
            base_version: self.base_version,
        };
        self.state = EditState::Saving;

        match store.commit_version(&self.document_id, new_version) {
            Ok(version) => {
                self.base_version = version.version_number;
                self.state = EditState::Clean;
                tracing::debug!(
                    document_id = %self.document_id,
                    version = version.version_number,
                    "committed"
                );
                Ok(SaveOutcome::Committed(version))
            }
            Err(StoreError::Conflict { current_version }) => {
                self.state = EditState::Conflict {
                    server_version: current_version,
                };
                tracing::info!(
                    document_id = %self.document_id,
                    base = self.base_version,
                    server = current_version,
                    "save conflicted"
                );
                Ok(SaveOutcome::Conflict {
                    server_version: current_version,
                })
            }
            Err(other) => {
                self.state = EditState::Dirty;
                Err(other.into())
            }
        }
    }

    /// Conflict reconciliation: discard the local buffer and reload the
    /// server's latest version. The session comes back clean.
    pub fn reload_latest<S: VersionStore>(
        &mut self,
        store: &S,
        registry: &SectionRegistry,
    ) -> DocumentResult<()> {
        let raw = store.load_document(&self.document_id)?;
        self.buffer = to_canonical(&raw, registry).value;
        self.base_version = latest_version_number(store, &self.document_id)?;
        self.state = EditState::Clean;
        Ok(())
    }

    /// Conflict reconciliation: hand back the pending buffer as wire-format
    /// JSON for the user to carry elsewhere, then reload the latest. The
    /// returned JSON is exactly what would have been committed.
    pub fn copy_changes<S: VersionStore>(
        &mut self,
        store: &S,
        registry: &SectionRegistry,
    ) -> DocumentResult<Value> {
        let pending = to_wire(&self.buffer)?;
        self.reload_latest(store, registry)?;
        Ok(pending)
    }

    /// Conflict reconciliation: stash the pending buffer under a fresh key
    /// so a new context can pick it up. The session itself stays in
    /// conflict; the stash does not resolve anything.
    pub fn stash_for_new_context(&self, handoff: &mut HandoffStore) -> DocumentResult<String> {
        let pending = to_wire(&self.buffer)?;
        Ok(handoff.stash(pending))
    }
}

fn latest_version_number<S: VersionStore>(store: &S, document_id: &str) -> DocumentResult<u64> {
    let versions = store.list_versions(document_id)?;
    Ok(versions
        .last()
        .map(|version| version.version_number)
        .unwrap_or(0))
}

/// Keyed holding area for stashed pending changes.
#[derive(Debug, Default)]
pub struct HandoffStore {
    stashed: HashMap<String, Value>,
}

impl HandoffStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores pending changes and returns the retrieval key.
    pub fn stash(&mut self, pending: Value) -> String {
        let key = Uuid::new_v4().to_string();
        self.stashed.insert(key.clone(), pending);
        key
    }

    /// Removes and returns stashed changes.
    pub fn retrieve(&mut self, key: &str) -> DocumentResult<Value> {
        self.stashed
            .remove(key)
            .ok_or_else(|| DocumentError::HandoffNotFound(key.to_owned()))
    }
}
