//! Pure invariant checks for candidate sections and media items.
//!
//! These run over raw, pre-normalisation JSON and return a list of violated
//! invariants as human-readable strings. They never fail, never panic and
//! never mutate their input: callers decide whether a violation is worth
//! surfacing, repairing (via the normaliser) or ignoring.

use crate::model::SectionType;
use crate::registry::SectionRegistry;
use serde_json::Value;

/// Checks a candidate section object against the canonical schema.
///
/// Reported violations:
/// - unknown `type` vocabulary,
/// - content shape that does not match the declared type,
/// - `media` present on a kind that keeps media inline per item/step,
/// - `media` present but not an array.
///
/// # Arguments
///
/// * `section` - The raw section object, in whatever shape the caller holds.
/// * `registry` - Section kind table used to judge media placement.
pub fn validate_section(section: &Value, registry: &SectionRegistry) -> Vec<String> {
    let mut violations = Vec::new();

    let Some(obj) = section.as_object() else {
        violations.push("section must be an object".to_owned());
        return violations;
    };

    let id = obj.get("id").and_then(Value::as_str).unwrap_or("");

    let declared_type = match obj.get("type") {
        Some(Value::String(raw)) => match SectionType::parse(raw) {
            Some(parsed) => Some(parsed),
            None => {
                violations.push(format!("unknown section type '{raw}'"));
                None
            }
        },
        Some(other) => {
            violations.push(format!(
                "section type must be a string, got {}",
                type_name(other)
            ));
            None
        }
        None => None,
    };

    if let Some(section_type) = declared_type {
        if let Some(content) = obj.get("content") {
            if let Some(problem) = content_shape_violation(section_type, content) {
                violations.push(problem);
            }
        }

        if let Some(media) = obj.get("media") {
            if !media.is_null() {
                if !media.is_array() {
                    violations.push(format!(
                        "section media must be an array, got {}",
                        type_name(media)
                    ));
                } else if !registry
                    .media_policy_for(id, section_type)
                    .allows_section_media()
                    && !media.as_array().is_some_and(|m| m.is_empty())
                {
                    violations.push(format!(
                        "section kind '{}' keeps media inline and does not allow section-level media",
                        if id.is_empty() { section_type.as_str() } else { id }
                    ));
                }
            }
        }
    }

    violations
}

/// Checks a candidate media item.
///
/// Reported violations: missing payload (neither `data` nor `url`),
/// missing `type` (MIME type) and missing `name`.
pub fn validate_media_item(item: &Value) -> Vec<String> {
    let mut violations = Vec::new();

    let Some(obj) = item.as_object() else {
        violations.push("media item must be an object".to_owned());
        return violations;
    };

    let has_data = obj
        .get("data")
        .and_then(Value::as_str)
        .is_some_and(|d| !d.is_empty());
    let has_url = obj
        .get("url")
        .and_then(Value::as_str)
        .is_some_and(|u| !u.is_empty());
    if !has_data && !has_url {
        violations.push("media item must have either data or url".to_owned());
    }

    if !obj
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|t| !t.trim().is_empty())
    {
        violations.push("media item must declare a MIME type".to_owned());
    }

    if !obj
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|n| !n.trim().is_empty())
    {
        violations.push("media item must have a name".to_owned());
    }

    violations
}

/// Returns a violation message if `content` does not match the shape the
/// declared type promises, or `None` if it does (or if content is absent).
fn content_shape_violation(section_type: SectionType, content: &Value) -> Option<String> {
    if content.is_null() {
        return None;
    }
    match section_type {
        SectionType::RichText => {
            if content.is_string() {
                None
            } else {
                Some(format!(
                    "rich-text content must be a string, got {}",
                    type_name(content)
                ))
            }
        }
        SectionType::List | SectionType::MaterialsWithMedia => {
            if content.get("items").is_some_and(Value::is_array) {
                None
            } else {
                Some(format!(
                    "{} content must be an object with an items array",
                    section_type
                ))
            }
        }
        SectionType::ProcedureSteps => {
            if content.get("steps").is_some_and(Value::is_array) {
                None
            } else {
                Some("procedure-steps content must be an object with a steps array".to_owned())
            }
        }
        SectionType::Custom => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
