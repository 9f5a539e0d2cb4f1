//! Presentation grouping of significant changes.
//!
//! Filtered changes are bucketed the way the history view presents them:
//! top-level scalar fields each form their own group, everything under
//! `sections` collects into one group labelled with the affected section
//! names, and anything else groups by its key path. Section labels come
//! from the newer snapshot first, then the kind registry, then the older
//! snapshot, so renames and deletions still read sensibly.

use labdoc_schema::SectionRegistry;
use serde_json::Value;
use std::collections::HashSet;

use super::clean::DiffPolicy;
use super::structural::{Change, ChangeKind, PathSeg};

/// One presentation bucket of related changes.
#[derive(Clone, Debug)]
pub struct ChangeGroup {
    /// Stable grouping key (`title`, `sections`, ...).
    pub key: String,
    /// Human-readable label for the bucket.
    pub label: String,
    pub changes: Vec<Change>,
}

/// Groups filtered changes for presentation, de-duplicating changes that
/// collapse to the same (kind, path, index) triple. The path keeps its
/// array indices: only a whole-object array diff surfacing alongside its
/// own interior diff collapses, never edits in different elements.
///
/// `older` and `newer` are the raw document snapshots the diff was built
/// from; section display names were stripped before diffing, so labels are
/// looked up here.
pub fn group_changes(
    changes: &[Change],
    older: &Value,
    newer: &Value,
    registry: &SectionRegistry,
    policy: &DiffPolicy,
) -> Vec<ChangeGroup> {
    let mut groups: Vec<ChangeGroup> = Vec::new();
    let mut seen: HashSet<(ChangeKind, String, Option<usize>)> = HashSet::new();
    let mut section_labels: Vec<String> = Vec::new();

    for change in changes {
        if !seen.insert((change.effective_kind(), change.path_string(), change.index)) {
            continue;
        }

        let (key, label) = match bucket_of(change, policy) {
            Bucket::Scalar(field) => (field.to_owned(), field_label(field)),
            Bucket::Sections => {
                for index in section_indices(change) {
                    let label = section_label(index, older, newer, registry);
                    if !section_labels.contains(&label) {
                        section_labels.push(label);
                    }
                }
                ("sections".to_owned(), String::new())
            }
            Bucket::Other => {
                let key = change.keys_path();
                let label = change
                    .last_key()
                    .map(field_label)
                    .unwrap_or_else(|| key.clone());
                (key, label)
            }
        };

        match groups.iter_mut().find(|group| group.key == key) {
            Some(group) => group.changes.push(change.clone()),
            None => groups.push(ChangeGroup {
                key,
                label,
                changes: vec![change.clone()],
            }),
        }
    }

    // The sections label is only known once every affected section has
    // been seen.
    if let Some(group) = groups.iter_mut().find(|group| group.key == "sections") {
        group.label = if section_labels.is_empty() {
            "Sections".to_owned()
        } else {
            section_labels.join(", ")
        };
    }

    groups
}

enum Bucket<'a> {
    Scalar(&'a str),
    Sections,
    Other,
}

fn bucket_of<'a>(change: &'a Change, policy: &DiffPolicy) -> Bucket<'a> {
    match change.path.first() {
        Some(PathSeg::Key(key)) if key == "sections" => Bucket::Sections,
        Some(PathSeg::Key(key)) if change.path.len() == 1 && policy.is_scalar_group(key) => {
            Bucket::Scalar(key.as_str())
        }
        _ => Bucket::Other,
    }
}

/// The section array indices a change touches: the segment after
/// `sections` for interior changes, the element index for whole-section
/// inserts and deletions, or every element when the sections array itself
/// appeared or disappeared.
fn section_indices(change: &Change) -> Vec<usize> {
    if let Some(PathSeg::Index(index)) = change.path.get(1) {
        return vec![*index];
    }
    if let Some(index) = change.index {
        return vec![index];
    }
    let payload = change.rhs.as_ref().or(change.lhs.as_ref());
    match payload {
        Some(Value::Array(sections)) => (0..sections.len()).collect(),
        _ => Vec::new(),
    }
}

/// Resolves a display label for the section at `index`, trying the newer
/// snapshot's name, then the kind registry via the section id, then the
/// older snapshot, then a positional fallback.
fn section_label(
    index: usize,
    older: &Value,
    newer: &Value,
    registry: &SectionRegistry,
) -> String {
    for snapshot in [newer, older] {
        let Some(section) = snapshot
            .get("content")
            .and_then(|c| c.get("sections"))
            .and_then(|s| s.get(index))
        else {
            continue;
        };
        if let Some(name) = section
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
        {
            return name.to_owned();
        }
        if let Some(kind) = section
            .get("id")
            .and_then(Value::as_str)
            .and_then(|id| registry.resolve(id))
        {
            return kind.name.to_owned();
        }
    }
    format!("Section {}", index + 1)
}

/// Turns a field key into a display label: `gradeLevel` → `Grade Level`.
fn field_label(field: &str) -> String {
    let mut label = String::with_capacity(field.len() + 4);
    for (i, ch) in field.replace('_', " ").chars().enumerate() {
        if i == 0 {
            label.extend(ch.to_uppercase());
        } else if ch.is_uppercase() {
            label.push(' ');
            label.push(ch);
        } else {
            label.push(ch);
        }
    }
    label
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn change(kind: ChangeKind, path: Vec<PathSeg>) -> Change {
        Change {
            kind,
            path,
            lhs: None,
            rhs: Some(json!("x")),
            index: None,
            item: None,
        }
    }

    #[test]
    fn scalar_fields_form_their_own_groups() {
        let changes = vec![
            change(ChangeKind::Edited, vec![PathSeg::Key("title".into())]),
            change(ChangeKind::Edited, vec![PathSeg::Key("gradeLevel".into())]),
        ];
        let groups = group_changes(
            &changes,
            &json!({}),
            &json!({}),
            &SectionRegistry::standard(),
            &DiffPolicy::standard(),
        );
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, "title");
        assert_eq!(groups[0].label, "Title");
        assert_eq!(groups[1].label, "Grade Level");
    }

    #[test]
    fn section_changes_collect_under_one_group() {
        let newer = json!({"content": {"sections": [
            {"id": "materials", "name": "Materials"},
            {"id": "procedure_17", "name": ""},
        ]}});
        let changes = vec![
            change(
                ChangeKind::Edited,
                vec![
                    PathSeg::Key("sections".into()),
                    PathSeg::Index(0),
                    PathSeg::Key("content".into()),
                ],
            ),
            change(
                ChangeKind::Edited,
                vec![
                    PathSeg::Key("sections".into()),
                    PathSeg::Index(1),
                    PathSeg::Key("content".into()),
                ],
            ),
        ];
        let groups = group_changes(
            &changes,
            &json!({}),
            &newer,
            &SectionRegistry::standard(),
            &DiffPolicy::standard(),
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, "sections");
        // Second section falls back to the registry kind name.
        assert_eq!(groups[0].label, "Materials, Procedure");
        assert_eq!(groups[0].changes.len(), 2);
    }

    #[test]
    fn deleted_section_is_labelled_from_the_older_snapshot() {
        let older = json!({"content": {"sections": [{"id": "safety", "name": "Safety First"}]}});
        let deletion = Change {
            kind: ChangeKind::ArrayChange,
            path: vec![PathSeg::Key("sections".into())],
            lhs: None,
            rhs: None,
            index: Some(0),
            item: Some(Box::new(Change {
                kind: ChangeKind::Deleted,
                path: Vec::new(),
                lhs: Some(json!({"content": {"items": ["Goggles"]}})),
                rhs: None,
                index: None,
                item: None,
            })),
        };
        let groups = group_changes(
            &[deletion],
            &older,
            &json!({"content": {"sections": []}}),
            &SectionRegistry::standard(),
            &DiffPolicy::standard(),
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].label, "Safety First");
    }

    #[test]
    fn identical_paths_are_deduplicated_but_sibling_elements_are_not() {
        let section_edit = |index: usize| {
            change(
                ChangeKind::Edited,
                vec![
                    PathSeg::Key("sections".into()),
                    PathSeg::Index(index),
                    PathSeg::Key("content".into()),
                ],
            )
        };
        let changes = vec![section_edit(0), section_edit(0), section_edit(1)];
        let groups = group_changes(
            &changes,
            &json!({}),
            &json!({}),
            &SectionRegistry::standard(),
            &DiffPolicy::standard(),
        );
        // The repeated path collapses; the edit in the other section stays.
        assert_eq!(groups[0].changes.len(), 2);
    }

    #[test]
    fn unrecognised_paths_group_by_key_path() {
        let changes = vec![change(
            ChangeKind::New,
            vec![PathSeg::Key("learningObjectives".into())],
        )];
        let groups = group_changes(
            &changes,
            &json!({}),
            &json!({}),
            &SectionRegistry::standard(),
            &DiffPolicy::standard(),
        );
        assert_eq!(groups[0].key, "learningObjectives");
        assert_eq!(groups[0].label, "Learning Objectives");
    }
}
