//! Canonical schema for experiment documents.
//!
//! This crate owns the typed data model the rest of the system works
//! against: the section content union, the document and version shapes, the
//! section kind registry and the pure invariant validators. It is a boundary
//! crate: data declarations and checks only, no I/O and no normalisation
//! logic (that lives in `labdoc-core`).

pub mod model;
pub mod registry;
pub mod validate;

pub use model::{
    Document, DocumentContent, ExperimentConfig, MaterialItem, MediaItem, ProcedureStep, Section,
    SectionContent, SectionType, Version,
};
pub use registry::{base_id, MediaPolicy, SectionDef, SectionKind, SectionRegistry};
pub use validate::{validate_media_item, validate_section};
