//! Semantic comparison of document snapshots.
//!
//! The pipeline runs in four stages: clean both snapshots down to their
//! comparable content, walk them structurally, filter the raw changes for
//! significance, then group what is left for presentation. Two snapshots
//! that differ only in storage shape compare as unchanged.

mod clean;
mod filter;
mod format;
mod group;
mod structural;

pub use clean::{clean_document, is_effectively_empty, DiffPolicy};
pub use filter::significant_changes;
pub use format::{format_value, plain_text};
pub use group::{group_changes, ChangeGroup};
pub use structural::{diff_values, Change, ChangeKind, PathSeg};

use labdoc_schema::{Document, SectionRegistry, Version};
use serde_json::{json, Value};

use crate::error::{DocumentError, DocumentResult};
use crate::normalize::to_canonical;

/// The result of comparing two snapshots.
#[derive(Clone, Debug)]
pub struct DocumentDiff {
    /// Significant changes, in walk order.
    pub differences: Vec<Change>,
    /// The same changes bucketed for presentation.
    pub groups: Vec<ChangeGroup>,
}

impl DocumentDiff {
    pub fn has_changes(&self) -> bool {
        !self.differences.is_empty()
    }
}

/// Compares two wire-format document snapshots.
///
/// Tolerant by construction: missing or malformed `content` compares as
/// empty rather than failing, so the history view can always render.
pub fn compare_snapshots(
    older: &Value,
    newer: &Value,
    policy: &DiffPolicy,
    registry: &SectionRegistry,
) -> DocumentDiff {
    let left = clean_document(older, policy);
    let right = clean_document(newer, policy);

    let raw = diff_values(&left, &right);
    let raw_count = raw.len();
    let differences = significant_changes(raw, policy);
    let groups = group_changes(&differences, older, newer, registry, policy);

    tracing::debug!(
        raw = raw_count,
        significant = differences.len(),
        groups = groups.len(),
        "compared document snapshots"
    );

    DocumentDiff {
        differences,
        groups,
    }
}

/// Compares two canonical documents.
pub fn compare_documents(
    older: &Document,
    newer: &Document,
    policy: &DiffPolicy,
    registry: &SectionRegistry,
) -> DocumentDiff {
    let older = serde_json::to_value(older).unwrap_or_default();
    let newer = serde_json::to_value(newer).unwrap_or_default();
    compare_snapshots(&older, &newer, policy, registry)
}

/// Compares two versions out of a loaded history, selected by version id.
///
/// The sides are ordered by version number before comparison, so callers
/// may pass the ids either way round. Each snapshot is normalised first;
/// legacy storage shapes compare on equal terms with current ones.
///
/// # Errors
///
/// Returns [`DocumentError::ComparisonUnavailable`] if either id is not in
/// `versions`.
pub fn compare_versions(
    versions: &[Version],
    older_id: &str,
    newer_id: &str,
    policy: &DiffPolicy,
    registry: &SectionRegistry,
) -> DocumentResult<DocumentDiff> {
    let find = |id: &str| -> DocumentResult<&Version> {
        versions
            .iter()
            .find(|version| version.id == id)
            .ok_or_else(|| DocumentError::ComparisonUnavailable(id.to_owned()))
    };

    let mut older = find(older_id)?;
    let mut newer = find(newer_id)?;
    if older.version_number > newer.version_number {
        std::mem::swap(&mut older, &mut newer);
    }

    let older_doc = canonical_snapshot(older, registry);
    let newer_doc = canonical_snapshot(newer, registry);
    Ok(compare_documents(&older_doc, &newer_doc, policy, registry))
}

fn canonical_snapshot(version: &Version, registry: &SectionRegistry) -> Document {
    let mut wire = json!({ "content": version.content });
    if let Some(title) = &version.title {
        wire["title"] = Value::String(title.clone());
    }
    to_canonical(&wire, registry).value
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn registry() -> SectionRegistry {
        SectionRegistry::standard()
    }

    fn version(id: &str, number: u64, title: Option<&str>, content: Value) -> Version {
        Version {
            id: id.to_owned(),
            version_number: number,
            title: title.map(str::to_owned),
            content,
            commit_message: None,
            created_at: Utc::now(),
            base_version: None,
        }
    }

    #[test]
    fn identical_snapshots_have_no_changes() {
        let doc = json!({"title": "Osmosis", "content": {"sections": [
            {"id": "overview", "type": "rich-text", "content": "<p>Intro</p>"}
        ]}});
        let diff = compare_snapshots(&doc, &doc, &DiffPolicy::standard(), &registry());
        assert!(!diff.has_changes());
        assert!(diff.groups.is_empty());
    }

    #[test]
    fn storage_shape_differences_compare_as_unchanged() {
        let flat = json!({"content": {"sections": [], "config": {"duration": "30 min"}}});
        let legacy = json!({"content": {"estimated_duration": "30 min", "sections": []}});
        let older = to_canonical(&flat, &registry()).value;
        let newer = to_canonical(&legacy, &registry()).value;
        let diff = compare_documents(&older, &newer, &DiffPolicy::standard(), &registry());
        assert!(!diff.has_changes());
    }

    #[test]
    fn material_addition_is_one_grouped_change() {
        let older = json!({"content": {"sections": [
            {"id": "materials", "name": "Materials", "type": "materials_with_media",
             "content": {"items": [{"name": "Beaker"}]}}
        ]}});
        let newer = json!({"content": {"sections": [
            {"id": "materials", "name": "Materials", "type": "materials_with_media",
             "content": {"items": [{"name": "Beaker"}, {"name": "Gloves"}]}}
        ]}});

        let diff = compare_snapshots(&older, &newer, &DiffPolicy::standard(), &registry());
        assert_eq!(diff.differences.len(), 1);

        let change = &diff.differences[0];
        assert_eq!(change.kind, ChangeKind::ArrayChange);
        assert_eq!(change.effective_kind(), ChangeKind::New);
        let item = change.item.as_ref().unwrap();
        assert_eq!(item.rhs, Some(json!({"name": "Gloves"})));

        assert_eq!(diff.groups.len(), 1);
        assert_eq!(diff.groups[0].label, "Materials");
    }

    #[test]
    fn edits_in_different_sections_are_both_reported() {
        let older = json!({"content": {"sections": [
            {"id": "overview", "name": "Overview", "type": "rich-text", "content": "<p>one</p>"},
            {"id": "theory", "name": "Theory", "type": "rich-text", "content": "<p>two</p>"},
        ]}});
        let newer = json!({"content": {"sections": [
            {"id": "overview", "name": "Overview", "type": "rich-text", "content": "<p>ONE</p>"},
            {"id": "theory", "name": "Theory", "type": "rich-text", "content": "<p>TWO</p>"},
        ]}});

        let diff = compare_snapshots(&older, &newer, &DiffPolicy::standard(), &registry());
        assert_eq!(diff.differences.len(), 2);
        assert_eq!(diff.groups.len(), 1);
        assert_eq!(diff.groups[0].changes.len(), 2);
        assert_eq!(diff.groups[0].label, "Overview, Theory");
    }

    #[test]
    fn metadata_add_is_suppressed_but_section_add_is_reported() {
        let older = json!({"content": {"sections": []}});
        let newer = json!({"content": {
            "config": {"duration": "45 min"},
            "sections": [
                {"id": "procedure", "type": "procedure-steps",
                 "content": {"steps": [{"text": "Pour the solution"}]}}
            ]
        }});

        let diff = compare_snapshots(&older, &newer, &DiffPolicy::standard(), &registry());
        // The duration addition is metadata churn; only the section add
        // survives.
        assert_eq!(diff.differences.len(), 1);
        assert_eq!(diff.differences[0].effective_kind(), ChangeKind::New);
        assert_eq!(diff.groups.len(), 1);
        assert_eq!(diff.groups[0].key, "sections");
        assert_eq!(diff.groups[0].label, "Procedure");
    }

    #[test]
    fn document_name_edit_forms_its_own_group() {
        let older = json!({"content": {"name": "Osmosis", "sections": []}});
        let newer = json!({"content": {"name": "Osmosis study", "sections": []}});
        let diff = compare_snapshots(&older, &newer, &DiffPolicy::standard(), &registry());
        assert_eq!(diff.differences.len(), 1);
        assert_eq!(diff.groups.len(), 1);
        assert_eq!(diff.groups[0].key, "name");
        assert_eq!(diff.groups[0].label, "Name");
    }

    #[test]
    fn whitespace_and_empty_media_differences_are_not_changes() {
        let older = json!({"title": "Osmosis", "content": {"sections": [
            {"id": "overview", "type": "rich-text", "content": "<p>Intro</p>", "media": []}
        ]}});
        let newer = json!({"title": " Osmosis ", "content": {"sections": [
            {"id": "overview", "type": "rich-text", "content": "<p>Intro</p>"}
        ]}});
        let diff = compare_snapshots(&older, &newer, &DiffPolicy::standard(), &registry());
        assert!(!diff.has_changes());
    }

    #[test]
    fn compare_versions_orders_by_version_number() {
        let versions = vec![
            version("v1", 1, Some("A"), json!({"sections": []})),
            version("v2", 2, Some("B"), json!({"sections": []})),
        ];
        // Passed newer-first; title must still read as edited A -> B.
        let diff = compare_versions(
            &versions,
            "v2",
            "v1",
            &DiffPolicy::standard(),
            &registry(),
        )
        .unwrap();
        assert_eq!(diff.differences.len(), 1);
        assert_eq!(diff.differences[0].lhs, Some(json!("A")));
        assert_eq!(diff.differences[0].rhs, Some(json!("B")));
    }

    #[test]
    fn compare_versions_reports_missing_ids() {
        let versions = vec![version("v1", 1, None, json!({"sections": []}))];
        let err = compare_versions(
            &versions,
            "v1",
            "missing",
            &DiffPolicy::standard(),
            &registry(),
        )
        .unwrap_err();
        assert!(matches!(err, DocumentError::ComparisonUnavailable(id) if id == "missing"));
    }
}
