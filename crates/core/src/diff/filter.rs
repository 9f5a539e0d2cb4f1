//! Significance filtering of raw structural changes.
//!
//! The structural walk is deliberately literal; this pass decides which of
//! its findings a user would actually call an edit. Everything that only
//! reflects storage shape (empty-to-missing transitions, whitespace churn,
//! structural fields surfacing at nested paths, payload-less media stubs)
//! is dropped here.

use serde_json::Value;

use super::clean::{is_effectively_empty, DiffPolicy};
use super::structural::{Change, ChangeKind};

/// Retains only the changes that represent real edits.
pub fn significant_changes(changes: Vec<Change>, policy: &DiffPolicy) -> Vec<Change> {
    changes
        .into_iter()
        .filter(|change| is_significant(change, policy))
        .collect()
}

fn is_significant(change: &Change, policy: &DiffPolicy) -> bool {
    // Array changes are judged by the element-level change they carry.
    if let (ChangeKind::ArrayChange, Some(item)) = (&change.kind, &change.item) {
        return element_is_significant(change, item, policy);
    }

    let lhs = change.lhs.as_ref();
    let rhs = change.rhs.as_ref();

    if both_sides_empty(lhs, rhs) {
        return false;
    }

    if change.kind == ChangeKind::Edited && equivalent_values(lhs, rhs) {
        return false;
    }

    if is_metadata_churn(change.kind, change.last_key(), policy) {
        return false;
    }

    if is_structural_survivor(change, policy) {
        return false;
    }

    if is_payloadless_media(change.kind, change.last_key(), lhs, rhs) {
        return false;
    }

    if is_hollow_content_shell(change) {
        return false;
    }

    true
}

fn element_is_significant(outer: &Change, item: &Change, policy: &DiffPolicy) -> bool {
    let lhs = item.lhs.as_ref();
    let rhs = item.rhs.as_ref();

    if both_sides_empty(lhs, rhs) {
        return false;
    }

    if is_metadata_churn(item.kind, outer.last_key(), policy) {
        return false;
    }

    if is_structural_survivor(outer, policy) {
        return false;
    }

    if is_payloadless_media(item.kind, outer.last_key(), lhs, rhs) {
        return false;
    }

    true
}

fn both_sides_empty(lhs: Option<&Value>, rhs: Option<&Value>) -> bool {
    side_is_empty(lhs) && side_is_empty(rhs)
}

fn side_is_empty(side: Option<&Value>) -> bool {
    side.map_or(true, is_effectively_empty)
}

/// Edits where both sides are the same after trimming (strings) or are
/// structurally equal (arrays) carry no information.
fn equivalent_values(lhs: Option<&Value>, rhs: Option<&Value>) -> bool {
    match (lhs, rhs) {
        (Some(Value::String(left)), Some(Value::String(right))) => left.trim() == right.trim(),
        (Some(Value::Array(left)), Some(Value::Array(right))) => left == right,
        _ => false,
    }
}

/// Pure additions or deletions of workflow metadata (duration, course and
/// friends) track administrative churn, not editing. Edits to these fields
/// stay visible.
fn is_metadata_churn(kind: ChangeKind, last_key: Option<&str>, policy: &DiffPolicy) -> bool {
    matches!(kind, ChangeKind::New | ChangeKind::Deleted)
        && last_key.is_some_and(|key| policy.is_metadata(key))
}

/// A structural field that survived cleaning because it sits inside a
/// section's `content` interior. At the document's top level these fields
/// never survive cleaning in the first place, so only single-segment paths
/// are exempt.
fn is_structural_survivor(change: &Change, policy: &DiffPolicy) -> bool {
    if change.path.len() <= 1 {
        return false;
    }
    change.last_key().is_some_and(|key| policy.is_excluded(key))
}

/// Media additions or deletions whose every item lacks an inline payload
/// and a URL describe placeholder rows, not attachments.
fn is_payloadless_media(
    kind: ChangeKind,
    last_key: Option<&str>,
    lhs: Option<&Value>,
    rhs: Option<&Value>,
) -> bool {
    if !matches!(kind, ChangeKind::New | ChangeKind::Deleted) || last_key != Some("media") {
        return false;
    }
    let present = match kind {
        ChangeKind::New => rhs,
        _ => lhs,
    };
    match present {
        Some(Value::Array(items)) => items.iter().all(|item| !has_payload(item)),
        Some(Value::Object(item)) => !has_payload(&Value::Object(item.clone())),
        _ => false,
    }
}

fn has_payload(item: &Value) -> bool {
    let field_present = |field: &str| {
        item.get(field)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.trim().is_empty())
    };
    field_present("data") || field_present("url")
}

/// An added or deleted nested `content` object that holds nothing beyond
/// `config` and `sections` wrappers is the double-nesting storage artifact,
/// not an edit.
fn is_hollow_content_shell(change: &Change) -> bool {
    if !matches!(change.kind, ChangeKind::New | ChangeKind::Deleted) {
        return false;
    }
    if change.path_string() != "content" {
        return false;
    }
    let payload = match change.kind {
        ChangeKind::New => change.rhs.as_ref(),
        _ => change.lhs.as_ref(),
    };
    match payload {
        Some(Value::Object(obj)) => obj.keys().all(|key| key == "config" || key == "sections"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::structural::{diff_values, PathSeg};
    use serde_json::json;

    fn filtered(lhs: serde_json::Value, rhs: serde_json::Value) -> Vec<Change> {
        significant_changes(diff_values(&lhs, &rhs), &DiffPolicy::standard())
    }

    #[test]
    fn empty_to_missing_transitions_are_dropped() {
        assert!(filtered(json!({"notes": ""}), json!({})).is_empty());
        assert!(filtered(json!({}), json!({"media": []})).is_empty());
        assert!(filtered(json!({"t": null}), json!({"t": "  "})).is_empty());
    }

    #[test]
    fn whitespace_only_string_edits_are_dropped() {
        assert!(filtered(json!({"title": "Osmosis"}), json!({"title": " Osmosis "})).is_empty());
        assert_eq!(filtered(json!({"title": "A"}), json!({"title": "B"})).len(), 1);
    }

    #[test]
    fn metadata_additions_are_dropped_but_edits_kept() {
        assert!(filtered(json!({}), json!({"duration": "30 min"})).is_empty());
        assert!(filtered(json!({"course": "Bio"}), json!({})).is_empty());
        let edits = filtered(json!({"duration": "30 min"}), json!({"duration": "45 min"}));
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].kind, ChangeKind::Edited);
    }

    #[test]
    fn nested_structural_fields_are_dropped_but_top_level_kept() {
        // `name` nested under a section survives cleaning only inside the
        // content interior; a bare material rename there is real content,
        // judged by the element change, not the field name.
        let change = Change {
            kind: ChangeKind::New,
            path: vec![
                PathSeg::Key("sections".into()),
                PathSeg::Index(0),
                PathSeg::Key("icon".into()),
            ],
            lhs: None,
            rhs: Some(json!("🧪")),
            index: None,
            item: None,
        };
        assert!(significant_changes(vec![change], &DiffPolicy::standard()).is_empty());

        // Document-level `name` is a real field.
        assert_eq!(filtered(json!({"name": "A"}), json!({"name": "B"})).len(), 1);
    }

    #[test]
    fn payloadless_media_rows_are_dropped() {
        let noise = filtered(
            json!({"sections": [{"content": "x"}]}),
            json!({"sections": [{"content": "x",
                                 "media": [{"name": "pending.png", "type": "image/png"}]}]}),
        );
        assert!(noise.is_empty());

        let real = filtered(
            json!({"sections": [{"content": "x"}]}),
            json!({"sections": [{"content": "x",
                                 "media": [{"url": "https://a/b.png", "type": "image/png"}]}]}),
        );
        assert_eq!(real.len(), 1);
    }

    #[test]
    fn hollow_content_shells_are_dropped() {
        assert!(filtered(json!({}), json!({"content": {"config": {}, "sections": []}})).is_empty());
        let real = filtered(json!({}), json!({"content": {"intro": "hello"}}));
        assert_eq!(real.len(), 1);
    }

    #[test]
    fn array_growth_is_judged_by_the_element() {
        let changes = filtered(
            json!({"sections": [{"content": {"items": [{"name": "Beaker"}]}}]}),
            json!({"sections": [{"content": {"items": [{"name": "Beaker"}, {"name": "Gloves"}]}}]}),
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::ArrayChange);

        // A surplus element that is itself empty carries nothing.
        let noise = filtered(
            json!({"sections": [{"content": {"items": []}}]}),
            json!({"sections": [{"content": {"items": [{}]}}]}),
        );
        assert!(noise.is_empty());
    }
}
