//! Pre-diff cleaning of document snapshots.
//!
//! Before two snapshots are compared, everything the UI treats as structural
//! rather than content is removed so the diff only ever sees material a user
//! actually edited: identifiers, timestamps, authorship, display metadata on
//! sections, permission flags. The experiment `config` object is flattened
//! up one level so config values compare consistently regardless of nesting
//! depth, and empty containers left behind by the stripping are pruned.
//!
//! The interior of a section's `content` value is never stripped; a
//! material's `name` is content there, not display metadata.

use serde_json::{Map, Value};

/// The field lists steering cleaning and significance filtering.
///
/// Built once (usually via [`DiffPolicy::standard`]) and passed by
/// reference, so tests can substitute alternates.
#[derive(Clone, Debug)]
pub struct DiffPolicy {
    /// Structural fields stripped before diffing and suppressed if they
    /// still surface at nested paths.
    pub excluded_fields: Vec<&'static str>,
    /// Metadata fields whose pure additions/deletions are noise; only
    /// genuine edits are kept.
    pub metadata_fields: Vec<&'static str>,
    /// Top-level scalar fields that form their own presentation groups.
    pub scalar_groups: Vec<&'static str>,
}

impl DiffPolicy {
    pub fn standard() -> Self {
        Self {
            excluded_fields: vec![
                // identifiers and timestamps
                "id",
                "_id",
                "current_version_id",
                "currentVersionId",
                "created_at",
                "createdAt",
                "updated_at",
                "updatedAt",
                // authorship
                "author",
                "author_id",
                "authorId",
                "created_by",
                "createdBy",
                "owner",
                // structural section metadata
                "icon",
                "emoji",
                "type",
                "fields",
                "isCustom",
                "name",
                "description",
                "required",
                "mediaLocation",
                "mediaPosition",
                // permission and visibility flags
                "permissions",
                "visibility",
                "isPublic",
                "shared",
            ],
            metadata_fields: vec!["duration", "estimated_duration", "course", "program"],
            scalar_groups: vec!["title", "duration", "subject", "gradeLevel", "name"],
        }
    }

    pub fn is_excluded(&self, field: &str) -> bool {
        self.excluded_fields.contains(&field)
    }

    pub fn is_metadata(&self, field: &str) -> bool {
        self.metadata_fields.contains(&field)
    }

    pub fn is_scalar_group(&self, field: &str) -> bool {
        self.scalar_groups.contains(&field)
    }
}

impl Default for DiffPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Builds the comparison tree for one document snapshot: the document's
/// `content` keys merged up to the root alongside `title`, with `config`
/// flattened and dropped. Paths in the resulting diff therefore read
/// `title`, `duration`, `sections.0.content.items` and so on.
///
/// Tolerates a missing or non-object `content` (treated as empty) so the
/// engine always runs. A legacy nested `content` key (the double-nesting
/// storage artifact) is carried through; the significance filter knows how
/// to recognise and suppress it.
pub fn clean_document(doc: &Value, policy: &DiffPolicy) -> Value {
    let mut root = Map::new();

    if let Some(title) = doc.get("title").filter(|t| !t.is_null()) {
        root.insert("title".to_owned(), title.clone());
    }

    if let Some(content) = doc.get("content").and_then(Value::as_object) {
        for (key, value) in content {
            // Scalar-group fields (`name` among them) are document content
            // at this level even though the same key is structural on a
            // section, so exclusion does not apply to them here.
            if key == "config" || (policy.is_excluded(key) && !policy.is_scalar_group(key)) {
                continue;
            }
            if key == "sections" {
                if let Some(sections) = value.as_array() {
                    let cleaned_sections: Vec<Value> = sections
                        .iter()
                        .map(|section| clean_section(section, policy))
                        .collect();
                    root.insert("sections".to_owned(), Value::Array(cleaned_sections));
                }
                continue;
            }
            root.insert(key.clone(), strip_excluded(value, policy));
        }

        // Flatten config keys up one level, without clobbering keys that
        // already exist at that level, then drop config itself.
        if let Some(config) = content.get("config").and_then(Value::as_object) {
            for (key, value) in config {
                if policy.is_excluded(key) || root.contains_key(key) {
                    continue;
                }
                root.insert(key.clone(), value.clone());
            }
        }
    }

    let mut tree = Value::Object(root);
    prune_empty(&mut tree);
    tree
}

/// Removes structural keys from a section object. The `content` value is
/// carried through verbatim; only exclusion stops at that boundary (empty
/// pruning still applies later).
fn clean_section(section: &Value, policy: &DiffPolicy) -> Value {
    let Some(obj) = section.as_object() else {
        return section.clone();
    };
    let mut cleaned = Map::new();
    for (key, value) in obj {
        if policy.is_excluded(key) {
            continue;
        }
        if key == "content" {
            cleaned.insert(key.clone(), value.clone());
        } else {
            cleaned.insert(key.clone(), strip_excluded(value, policy));
        }
    }
    Value::Object(cleaned)
}

/// Recursively removes excluded keys from a subtree.
fn strip_excluded(value: &Value, policy: &DiffPolicy) -> Value {
    match value {
        Value::Object(obj) => Value::Object(
            obj.iter()
                .filter(|(key, _)| !policy.is_excluded(key))
                .map(|(key, v)| (key.clone(), strip_excluded(v, policy)))
                .collect(),
        ),
        Value::Array(entries) => Value::Array(
            entries
                .iter()
                .map(|entry| strip_excluded(entry, policy))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Whether a value counts as carrying nothing: null, blank string, empty
/// array or empty object.
pub fn is_effectively_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(entries) => entries.is_empty(),
        Value::Object(obj) => obj.is_empty(),
        _ => false,
    }
}

/// Post-order removal of object keys whose values end up as empty objects
/// or arrays (a now-empty `media: []` included). Array elements are left in
/// place so sibling indices stay comparable across both snapshots.
fn prune_empty(value: &mut Value) {
    match value {
        Value::Object(obj) => {
            for child in obj.values_mut() {
                prune_empty(child);
            }
            obj.retain(|_, child| match child {
                Value::Object(o) => !o.is_empty(),
                Value::Array(a) => !a.is_empty(),
                _ => true,
            });
        }
        Value::Array(entries) => {
            for entry in entries {
                prune_empty(entry);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn structural_section_fields_are_stripped() {
        let doc = json!({
            "title": "T",
            "content": {"sections": [
                {"id": "materials", "name": "Materials", "icon": "🧪",
                 "type": "materials_with_media",
                 "content": {"items": [{"name": "Beaker"}]}}
            ]}
        });
        let cleaned = clean_document(&doc, &DiffPolicy::standard());
        let section = &cleaned["sections"][0];
        assert!(section.get("id").is_none());
        assert!(section.get("name").is_none());
        assert!(section.get("type").is_none());
        // content interior is preserved, material names included
        assert_eq!(section["content"]["items"][0]["name"], json!("Beaker"));
    }

    #[test]
    fn config_is_flattened_and_dropped() {
        let doc = json!({"content": {"config": {"duration": "30 min", "subject": "Chem"},
                                     "sections": []}});
        let cleaned = clean_document(&doc, &DiffPolicy::standard());
        assert_eq!(cleaned["duration"], json!("30 min"));
        assert!(cleaned.get("config").is_none());
    }

    #[test]
    fn existing_content_level_key_wins_over_config() {
        let doc = json!({"content": {"duration": "1 h",
                                     "config": {"duration": "30 min"}}});
        let cleaned = clean_document(&doc, &DiffPolicy::standard());
        assert_eq!(cleaned["duration"], json!("1 h"));
    }

    #[test]
    fn empty_media_arrays_are_pruned() {
        let doc = json!({"content": {"sections": [
            {"id": "overview", "type": "rich-text", "content": "x", "media": []}
        ]}});
        let cleaned = clean_document(&doc, &DiffPolicy::standard());
        assert!(cleaned["sections"][0].get("media").is_none());
    }

    #[test]
    fn document_level_name_survives_while_section_name_is_stripped() {
        let doc = json!({"content": {
            "name": "Osmosis study",
            "sections": [{"id": "overview", "name": "Overview", "content": "x"}]
        }});
        let cleaned = clean_document(&doc, &DiffPolicy::standard());
        assert_eq!(cleaned["name"], json!("Osmosis study"));
        assert!(cleaned["sections"][0].get("name").is_none());
    }

    #[test]
    fn missing_content_still_produces_a_tree() {
        let cleaned = clean_document(&json!({"title": "Bare"}), &DiffPolicy::standard());
        assert_eq!(cleaned, json!({"title": "Bare"}));
    }

    #[test]
    fn effectively_empty_covers_the_usual_suspects() {
        for value in [json!(null), json!(""), json!("  "), json!([]), json!({})] {
            assert!(is_effectively_empty(&value), "{value}");
        }
        assert!(!is_effectively_empty(&json!(0)));
        assert!(!is_effectively_empty(&json!("x")));
    }
}
