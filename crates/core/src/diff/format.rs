//! Human-readable rendering of change values.
//!
//! Diff sides are raw JSON fragments; the history view wants short plain
//! text. Rich-text values lose their markup, step and material arrays are
//! summarised line by line, media rows render as their caption or file
//! name, and anything too large collapses to a field count.

use serde_json::{Map, Value};

use super::clean::is_effectively_empty;

const EMPTY: &str = "(empty)";
const MAX_OBJECT_FIELDS: usize = 5;

/// Keys skipped when summarising an object: display metadata says nothing
/// about what changed.
const DISPLAY_KEYS: &[&str] = &["icon", "emoji", "type", "id", "displaySize", "mediaPosition"];

/// Renders one side of a change as display text.
pub fn format_value(value: Option<&Value>) -> String {
    let Some(value) = value else {
        return EMPTY.to_owned();
    };
    if is_effectively_empty(value) {
        return EMPTY.to_owned();
    }

    match value {
        Value::String(text) => plain_text(text),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => format_array(items),
        Value::Object(obj) => format_object(obj),
        Value::Null => EMPTY.to_owned(),
    }
}

fn format_array(items: &[Value]) -> String {
    if items.iter().all(|item| item.get("text").is_some()) {
        // Procedure steps read as a numbered list.
        return items
            .iter()
            .enumerate()
            .map(|(i, step)| {
                format!(
                    "{}. {}",
                    i + 1,
                    plain_text(step.get("text").and_then(Value::as_str).unwrap_or_default())
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
    }

    if items.iter().all(is_media_like) {
        return items
            .iter()
            .map(media_label)
            .collect::<Vec<_>>()
            .join(", ");
    }

    if items.iter().all(|item| item.get("name").is_some()) {
        return items
            .iter()
            .filter_map(|item| item.get("name").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(", ");
    }

    items
        .iter()
        .map(|item| format_value(Some(item)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_object(obj: &Map<String, Value>) -> String {
    if is_media_like(&Value::Object(obj.clone())) {
        return media_label(&Value::Object(obj.clone()));
    }

    let entries: Vec<(&String, &Value)> = obj
        .iter()
        .filter(|(key, _)| !DISPLAY_KEYS.contains(&key.as_str()))
        .collect();

    if entries.len() > MAX_OBJECT_FIELDS {
        return format!("object with {} fields", entries.len());
    }

    entries
        .iter()
        .map(|(key, value)| format!("{key}: {}", format_value(Some(value))))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_media_like(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    (obj.contains_key("data") || obj.contains_key("url"))
        && (obj.contains_key("type") || obj.contains_key("name"))
}

fn media_label(item: &Value) -> String {
    item.get("caption")
        .and_then(Value::as_str)
        .filter(|caption| !caption.trim().is_empty())
        .or_else(|| item.get("name").and_then(Value::as_str))
        .unwrap_or("attachment")
        .to_owned()
}

/// Strips markup from a rich-text string: tags removed, the common HTML
/// entities decoded, whitespace collapsed.
pub fn plain_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                // Keep adjacent elements from running together; the
                // whitespace collapse below removes the surplus.
                out.push(' ');
            }
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }

    let decoded = out
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
