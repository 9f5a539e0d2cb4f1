//! Normalisation of legacy experiment documents into the canonical model.
//!
//! The wire format has been written by several generations of the editor UI
//! and is loosely typed: section content is sometimes a string, sometimes a
//! bare array, sometimes an object with varying key names, and the document
//! `content` object is occasionally double-nested (`content.content`) due to
//! a historical storage artifact. This module is the single place all of
//! that is understood. Everything downstream, from the wizard adapter to
//! the diff engine, works on the canonical shapes produced here.
//!
//! Normalisation never fails for malformed-but-present data. Input that
//! matches no known pattern degrades to `custom` content (deep-equality
//! comparison only) and a [`ShapeWarning`] is recorded instead of an error.
//!
//! The shape-detection rules run in a fixed priority order; later rules are
//! fallbacks for earlier ones, so the order itself is part of the contract
//! and is covered by tests.

use labdoc_schema::{
    Document, DocumentContent, ExperimentConfig, MaterialItem, MediaItem, ProcedureStep, Section,
    SectionContent, SectionRegistry, SectionType,
};
use labdoc_types::non_blank;
use serde_json::{Map, Value};

use crate::error::{DocumentError, DocumentResult};

/// A non-fatal observation made while normalising.
///
/// Warnings describe repairs and fallbacks, not failures: the returned value
/// is always usable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShapeWarning {
    #[error("section '{id}' has no declared type and is not a known kind; treating as custom")]
    UnknownKind { id: String },
    #[error("section '{id}' content does not match {expected} and was kept raw")]
    UnparseableContent { id: String, expected: SectionType },
    #[error("section '{id}' content was reclassified from {from} to {to}")]
    Reclassified {
        id: String,
        from: SectionType,
        to: SectionType,
    },
    #[error("section '{id}' media entry without data or url was dropped")]
    DroppedMediaItem { id: String },
}

/// A normalised value together with the warnings produced along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub value: T,
    pub warnings: Vec<ShapeWarning>,
}

impl<T> Normalized<T> {
    fn clean(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }
}

/// How an array's first element classifies the whole array.
///
/// Precedence matters: step-like beats named-items beats plain, matching the
/// order in which legacy writers are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayShape {
    /// First element is an object with `text`, `notes` or `media` keys.
    StepLike,
    /// First element is an object with a `name` key.
    NamedItems,
    /// Anything else, including an empty array.
    Plain,
}

fn classify_array(entries: &[Value]) -> ArrayShape {
    let Some(first) = entries.first().and_then(Value::as_object) else {
        return ArrayShape::Plain;
    };
    if first.contains_key("text") || first.contains_key("notes") || first.contains_key("media") {
        ArrayShape::StepLike
    } else if first.contains_key("name") {
        ArrayShape::NamedItems
    } else {
        ArrayShape::Plain
    }
}

/// Normalises a single section from any legacy shape into the canonical one.
///
/// Idempotent: canonical sections pass through unchanged (and warning-free).
pub fn normalize_section(raw: &Value, registry: &SectionRegistry) -> Normalized<Section> {
    let mut warnings = Vec::new();

    let Some(obj) = raw.as_object() else {
        // Not even an object: wrap the whole value as an anonymous custom
        // section so nothing is silently lost.
        warnings.push(ShapeWarning::UnknownKind { id: String::new() });
        return Normalized {
            value: Section {
                id: String::new(),
                name: None,
                icon: None,
                section_type: SectionType::Custom,
                content: SectionContent::Custom(raw.clone()),
                media: Vec::new(),
            },
            warnings,
        };
    };

    let id = match obj.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    let name = obj.get("name").and_then(Value::as_str).map(str::to_owned);
    let icon = obj.get("icon").and_then(Value::as_str).map(str::to_owned);

    let declared = obj
        .get("type")
        .and_then(Value::as_str)
        .and_then(SectionType::parse);
    let expected = declared
        .or_else(|| registry.resolve(&id).map(|kind| kind.section_type))
        .unwrap_or_else(|| {
            warnings.push(ShapeWarning::UnknownKind { id: id.clone() });
            SectionType::Custom
        });

    let content = normalize_content(obj.get("content"), expected, &id, &mut warnings);

    let final_type = content.section_type();
    if final_type != expected && expected != SectionType::Custom {
        warnings.push(ShapeWarning::Reclassified {
            id: id.clone(),
            from: expected,
            to: final_type,
        });
    }

    let media = hoist_media(obj, &id, &mut warnings);

    Normalized {
        value: Section {
            id,
            name,
            icon,
            section_type: final_type,
            content,
            media,
        },
        warnings,
    }
}

/// Applies the content shape rules in their fixed priority order.
fn normalize_content(
    raw: Option<&Value>,
    expected: SectionType,
    id: &str,
    warnings: &mut Vec<ShapeWarning>,
) -> SectionContent {
    let Some(raw) = raw else {
        return SectionContent::empty_for(expected);
    };

    match raw {
        // Rule 1: absent content becomes the canonical empty for the kind.
        Value::Null => SectionContent::empty_for(expected),

        // Rule 2: strings are rich text as-is; for any other kind the value
        // is unparseable and kept raw rather than guessed at.
        Value::String(s) => match expected {
            SectionType::RichText => SectionContent::RichText(s.clone()),
            SectionType::Custom => SectionContent::Custom(raw.clone()),
            _ => {
                warnings.push(ShapeWarning::UnparseableContent {
                    id: id.to_owned(),
                    expected,
                });
                SectionContent::Custom(raw.clone())
            }
        },

        Value::Array(entries) => {
            // Rule 3: unwrap the double-wrapping artifact ([{...}]) and
            // continue with the inner object.
            if entries.len() == 1 {
                if let Some(inner) = entries.first().filter(|v| v.is_object()) {
                    return normalize_content(Some(inner), expected, id, warnings);
                }
            }
            match classify_array(entries) {
                // Rule 4: step-like entries mean this is really a procedure.
                ArrayShape::StepLike => SectionContent::Steps {
                    steps: parse_steps(entries, id, warnings),
                },
                // Rule 5: named entries mean materials.
                ArrayShape::NamedItems => SectionContent::Materials {
                    items: parse_materials(entries, id, warnings),
                },
                // Rule 6: a plain array is a list. An empty array keeps the
                // declared kind when that kind is materials, so empty
                // materials sections do not flip-flop to lists.
                ArrayShape::Plain => {
                    if entries.is_empty() && expected == SectionType::MaterialsWithMedia {
                        SectionContent::Materials { items: Vec::new() }
                    } else {
                        SectionContent::List {
                            items: entries.iter().map(value_to_text).collect(),
                        }
                    }
                }
            }
        }

        // Rule 7: objects.
        Value::Object(map) => normalize_content_object(map, expected, id, warnings),

        // Numbers and booleans match no known pattern.
        _ => {
            if expected != SectionType::Custom {
                warnings.push(ShapeWarning::UnparseableContent {
                    id: id.to_owned(),
                    expected,
                });
            }
            SectionContent::Custom(raw.clone())
        }
    }
}

/// Field names legacy writers used for a single rich-text payload, in the
/// order they are checked.
const TEXT_ALIASES: &[&str] = &["text", "theory", "introduction", "content", "purpose", "html"];

fn normalize_content_object(
    map: &Map<String, Value>,
    expected: SectionType,
    id: &str,
    warnings: &mut Vec<ShapeWarning>,
) -> SectionContent {
    // Rule 7a: an existing steps array wins outright.
    if let Some(steps) = map.get("steps").and_then(Value::as_array) {
        return SectionContent::Steps {
            steps: parse_steps(steps, id, warnings),
        };
    }

    // Rule 7b: an existing items array; whether it is materials or a plain
    // list depends on what the entries look like (empty defers to the
    // declared kind).
    if let Some(items) = map.get("items").and_then(Value::as_array) {
        let named = classify_array(items) == ArrayShape::NamedItems
            || (items.is_empty() && expected == SectionType::MaterialsWithMedia);
        return if named {
            SectionContent::Materials {
                items: parse_materials(items, id, warnings),
            }
        } else {
            SectionContent::List {
                items: items.iter().map(value_to_text).collect(),
            }
        };
    }

    // Rule 7c: common single-text aliases flatten to rich text.
    for alias in TEXT_ALIASES {
        if let Some(Value::String(s)) = map.get(*alias) {
            return SectionContent::RichText(s.clone());
        }
    }

    // Rule 7d: any other array-valued fields (media excluded) are flattened
    // into one list- or materials-shaped content.
    let mut flattened: Vec<Value> = Vec::new();
    for (key, value) in map {
        if key == "media" {
            continue;
        }
        if let Some(entries) = value.as_array() {
            flattened.extend(entries.iter().cloned());
        }
    }
    if !flattened.is_empty() {
        return if classify_array(&flattened) == ArrayShape::NamedItems {
            SectionContent::Materials {
                items: parse_materials(&flattened, id, warnings),
            }
        } else {
            SectionContent::List {
                items: flattened.iter().map(value_to_text).collect(),
            }
        };
    }

    // Rule 7e: pass through unchanged.
    SectionContent::Custom(Value::Object(map.clone()))
}

fn parse_steps(entries: &[Value], id: &str, warnings: &mut Vec<ShapeWarning>) -> Vec<ProcedureStep> {
    entries
        .iter()
        .map(|entry| match entry {
            Value::Object(obj) => ProcedureStep {
                text: obj
                    .get("text")
                    .map(value_to_text)
                    .unwrap_or_default(),
                notes: obj
                    .get("notes")
                    .and_then(Value::as_str)
                    .and_then(non_blank),
                media: obj.get("media").and_then(Value::as_array).map(|media| {
                    media
                        .iter()
                        .filter_map(|item| parse_media_item(item, id, warnings))
                        .collect()
                }),
            },
            other => ProcedureStep {
                text: value_to_text(other),
                notes: None,
                media: None,
            },
        })
        .collect()
}

fn parse_materials(
    entries: &[Value],
    id: &str,
    warnings: &mut Vec<ShapeWarning>,
) -> Vec<MaterialItem> {
    entries
        .iter()
        .map(|entry| match entry {
            Value::Object(obj) => MaterialItem {
                name: obj.get("name").map(value_to_text).unwrap_or_default(),
                media: obj
                    .get("media")
                    .filter(|m| !m.is_null())
                    .and_then(|item| parse_media_item(item, id, warnings)),
            },
            other => MaterialItem {
                name: value_to_text(other),
                media: None,
            },
        })
        .collect()
}

fn parse_media_item(
    raw: &Value,
    id: &str,
    warnings: &mut Vec<ShapeWarning>,
) -> Option<MediaItem> {
    match serde_json::from_value::<MediaItem>(raw.clone()) {
        Ok(item) if item.has_payload() => Some(item),
        _ => {
            warnings.push(ShapeWarning::DroppedMediaItem { id: id.to_owned() });
            None
        }
    }
}

/// Rule 8: media is always hoisted to section level. A populated
/// `section.media` wins; otherwise a `content.media` array is promoted.
/// Either way entries without a payload are dropped.
fn hoist_media(
    obj: &Map<String, Value>,
    id: &str,
    warnings: &mut Vec<ShapeWarning>,
) -> Vec<MediaItem> {
    let section_media = obj
        .get("media")
        .and_then(Value::as_array)
        .filter(|m| !m.is_empty());
    let content_media = obj
        .get("content")
        .and_then(|c| c.get("media"))
        .and_then(Value::as_array)
        .filter(|m| !m.is_empty());

    section_media
        .or(content_media)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|item| parse_media_item(item, id, warnings))
                .collect()
        })
        .unwrap_or_default()
}

/// Best-effort text form of a loosely-typed value.
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Normalises a whole raw document into the canonical [`Document`].
///
/// Resolves the historical `content.content` double nesting and the config
/// fallback chain: the double-nested config is preferred, then the nested
/// one, then the flattened legacy top-level fields (`estimated_duration`,
/// `course`, `program`). Strings are trimmed and blank values treated as
/// absent, so a more specific but empty field never shadows a less specific
/// but populated one.
pub fn to_canonical(raw: &Value, registry: &SectionRegistry) -> Normalized<Document> {
    let Some(obj) = raw.as_object() else {
        return Normalized::clean(Document::default());
    };
    let mut warnings = Vec::new();

    let outer = obj.get("content");
    // Historical double nesting: only trust the inner object if it actually
    // looks like a content object.
    let inner = outer
        .and_then(|c| c.get("content"))
        .filter(|c| c.get("sections").is_some() || c.get("config").is_some());

    let config_sources = [
        inner.and_then(|c| c.get("config")),
        outer.and_then(|c| c.get("config")),
    ];
    let config = ExperimentConfig {
        duration: resolve_config_field(&config_sources, "duration", obj.get("estimated_duration")),
        subject: resolve_config_field(&config_sources, "subject", obj.get("course")),
        grade_level: resolve_config_field(&config_sources, "gradeLevel", obj.get("program")),
    };

    let raw_sections = inner
        .and_then(|c| c.get("sections"))
        .or_else(|| outer.and_then(|c| c.get("sections")))
        .and_then(Value::as_array);

    let mut sections = Vec::new();
    if let Some(raw_sections) = raw_sections {
        for raw_section in raw_sections {
            let normalized = normalize_section(raw_section, registry);
            warnings.extend(normalized.warnings);
            sections.push(normalized.value);
        }
    }

    let permissions = inner
        .and_then(|c| c.get("permissions"))
        .or_else(|| outer.and_then(|c| c.get("permissions")))
        .filter(|p| !p.is_null())
        .cloned();

    for warning in &warnings {
        tracing::warn!(%warning, "normalisation fallback");
    }

    Normalized {
        value: Document {
            id: obj.get("id").map(value_to_text).and_then(|s| non_blank(&s)),
            title: obj
                .get("title")
                .and_then(Value::as_str)
                .map(str::to_owned),
            content: DocumentContent {
                config,
                sections,
                permissions,
            },
            current_version_id: obj
                .get("current_version_id")
                .and_then(Value::as_str)
                .map(str::to_owned),
        },
        warnings,
    }
}

/// Picks the first populated value for a config field across the nesting
/// levels, most specific first. Blank strings do not shadow later sources.
fn resolve_config_field(
    config_sources: &[Option<&Value>],
    key: &str,
    legacy: Option<&Value>,
) -> Option<String> {
    config_sources
        .iter()
        .filter_map(|source| source.and_then(|config| config.get(key)))
        .chain(legacy)
        .find_map(|value| match value {
            Value::String(s) => non_blank(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Converts a canonical document back to the on-wire JSON shape.
///
/// The canonical model serialises directly to the current wire format, so
/// this is the only denormalisation step persistence needs.
pub fn to_wire(document: &Document) -> DocumentResult<Value> {
    serde_json::to_value(document).map_err(DocumentError::Serialization)
}
