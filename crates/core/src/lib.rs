//! Document canonicalisation, comparison and versioning.
//!
//! This crate holds the behaviour behind the experiment editor's history
//! view: normalising whatever shape a stored document arrives in into one
//! canonical model, mapping canonical sections to and from wizard form
//! state, comparing snapshots semantically, and the optimistic-concurrency
//! edit session over a version store.

pub mod diff;
pub mod error;
pub mod normalize;
pub mod session;
pub mod store;
pub mod wizard;

pub use diff::{compare_documents, compare_snapshots, compare_versions, DiffPolicy, DocumentDiff};
pub use error::{DocumentError, DocumentResult};
pub use normalize::{to_canonical, to_wire, Normalized, ShapeWarning};
pub use session::{EditSession, EditState, HandoffStore, SaveOutcome};
pub use store::{MemoryStore, NewVersion, StoreError, StoreResult, VersionStore};
pub use wizard::{defs_of, from_wizard_state, to_wizard_state, WizardState};
