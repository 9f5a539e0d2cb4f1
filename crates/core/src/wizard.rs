//! Bidirectional mapping between canonical sections and wizard form state.
//!
//! The authoring wizard binds its form fields to a flat structure keyed by
//! section id: one bucket of field values per section. Rich-text kinds place
//! their content under the field id the section kind registry declares for
//! them (`theory`, `purpose`, ...; defaulting to `content`); multi-field
//! kinds carry their `items`/`steps` arrays directly. Media rides alongside
//! in every bucket.
//!
//! Round-trip law: for sections already in canonical form,
//! `from_wizard_state(to_wizard_state(S), defs_of(S))` is structurally
//! equivalent to `S`. Wizard state is transient and never persisted.

use labdoc_schema::{
    MaterialItem, MediaItem, ProcedureStep, Section, SectionContent, SectionDef, SectionRegistry,
    SectionType,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Flat form state: section id → field id → value.
pub type WizardState = BTreeMap<String, Map<String, Value>>;

/// The wizard field id that carries a section's primary content.
fn content_field<'a>(registry: &'a SectionRegistry, section_id: &str) -> &'a str {
    registry
        .resolve(section_id)
        .map(|kind| kind.content_field())
        .unwrap_or("content")
}

/// Converts canonical sections into the flat form state the wizard binds to.
pub fn to_wizard_state(sections: &[Section], registry: &SectionRegistry) -> WizardState {
    let mut state = WizardState::new();

    for section in sections {
        let mut bucket = Map::new();

        match &section.content {
            SectionContent::RichText(text) => {
                bucket.insert(
                    content_field(registry, &section.id).to_owned(),
                    Value::String(text.clone()),
                );
            }
            SectionContent::List { items } => {
                bucket.insert("items".to_owned(), json_array(items));
            }
            SectionContent::Materials { items } => {
                bucket.insert("items".to_owned(), json_array(items));
            }
            SectionContent::Steps { steps } => {
                bucket.insert("steps".to_owned(), json_array(steps));
            }
            SectionContent::Custom(value) => {
                bucket.insert("content".to_owned(), value.clone());
            }
        }

        if !section.media.is_empty() {
            bucket.insert("media".to_owned(), json_array(&section.media));
        }

        state.insert(section.id.clone(), bucket);
    }

    state
}

/// Reassembles canonical sections from wizard state for the selected
/// section definitions.
///
/// Sections are emitted in definition order (which is the order the wizard
/// presents them in). Missing buckets or fields produce the canonical empty
/// content for the definition's type; `media` is reattached only when
/// non-empty.
pub fn from_wizard_state(
    state: &WizardState,
    defs: &[SectionDef],
    registry: &SectionRegistry,
) -> Vec<Section> {
    defs.iter()
        .map(|def| {
            let bucket = state.get(&def.id);

            let content = match def.section_type {
                SectionType::RichText => SectionContent::RichText(
                    bucket
                        .and_then(|b| b.get(content_field(registry, &def.id)))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_owned(),
                ),
                SectionType::List => SectionContent::List {
                    items: field_array(bucket, "items")
                        .map(|items| {
                            items
                                .iter()
                                .filter_map(Value::as_str)
                                .map(str::to_owned)
                                .collect()
                        })
                        .unwrap_or_default(),
                },
                SectionType::MaterialsWithMedia => SectionContent::Materials {
                    items: typed_field_array::<MaterialItem>(bucket, "items"),
                },
                SectionType::ProcedureSteps => SectionContent::Steps {
                    steps: typed_field_array::<ProcedureStep>(bucket, "steps"),
                },
                SectionType::Custom => SectionContent::Custom(
                    bucket
                        .and_then(|b| b.get("content"))
                        .cloned()
                        .unwrap_or(Value::Null),
                ),
            };

            let media: Vec<MediaItem> = typed_field_array(bucket, "media");

            Section {
                id: def.id.clone(),
                name: def.name.clone(),
                icon: def.icon.clone(),
                section_type: def.section_type,
                content,
                media,
            }
        })
        .collect()
}

/// The definitions corresponding to a canonical section list, preserving
/// instance ids and display metadata.
pub fn defs_of(sections: &[Section]) -> Vec<SectionDef> {
    sections
        .iter()
        .map(|section| SectionDef {
            id: section.id.clone(),
            name: section.name.clone(),
            icon: section.icon.clone(),
            section_type: section.section_type,
        })
        .collect()
}

fn json_array<T: serde::Serialize>(items: &[T]) -> Value {
    serde_json::to_value(items).unwrap_or_else(|_| Value::Array(Vec::new()))
}

fn field_array<'a>(bucket: Option<&'a Map<String, Value>>, field: &str) -> Option<&'a Vec<Value>> {
    bucket.and_then(|b| b.get(field)).and_then(Value::as_array)
}

fn typed_field_array<T: serde::de::DeserializeOwned>(
    bucket: Option<&Map<String, Value>>,
    field: &str,
) -> Vec<T> {
    field_array(bucket, field)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> SectionRegistry {
        SectionRegistry::standard()
    }

    fn sample_sections() -> Vec<Section> {
        vec![
            Section {
                id: "theory".into(),
                name: Some("Theory".into()),
                icon: None,
                section_type: SectionType::RichText,
                content: SectionContent::RichText("<p>osmosis</p>".into()),
                media: vec![MediaItem {
                    data: None,
                    url: Some("https://a/cell.png".into()),
                    mime: "image/png".into(),
                    name: "cell.png".into(),
                    size: None,
                    caption: Some("A cell".into()),
                    display_size: None,
                }],
            },
            Section {
                id: "materials".into(),
                name: None,
                icon: None,
                section_type: SectionType::MaterialsWithMedia,
                content: SectionContent::Materials {
                    items: vec![MaterialItem { name: "Beaker".into(), media: None }],
                },
                media: Vec::new(),
            },
            Section {
                id: "procedure_1714516223".into(),
                name: Some("Procedure".into()),
                icon: Some("🔢".into()),
                section_type: SectionType::ProcedureSteps,
                content: SectionContent::Steps {
                    steps: vec![ProcedureStep {
                        text: "Pour".into(),
                        notes: Some("slowly".into()),
                        media: None,
                    }],
                },
                media: Vec::new(),
            },
        ]
    }

    #[test]
    fn rich_text_binds_to_declared_field_id() {
        let state = to_wizard_state(&sample_sections(), &registry());
        assert_eq!(state["theory"]["theory"], json!("<p>osmosis</p>"));
        assert!(state["theory"].contains_key("media"));
    }

    #[test]
    fn multi_field_kinds_copy_content_arrays() {
        let state = to_wizard_state(&sample_sections(), &registry());
        assert_eq!(state["materials"]["items"], json!([{"name": "Beaker"}]));
        assert_eq!(
            state["procedure_1714516223"]["steps"],
            json!([{"text": "Pour", "notes": "slowly"}])
        );
    }

    #[test]
    fn suffixed_ids_resolve_their_kind_fields() {
        // The suffixed procedure instance still maps through the base kind.
        let state = to_wizard_state(&sample_sections(), &registry());
        assert!(state["procedure_1714516223"].contains_key("steps"));
    }

    #[test]
    fn empty_media_is_not_reattached() {
        let sections = sample_sections();
        let state = to_wizard_state(&sections, &registry());
        assert!(!state["materials"].contains_key("media"));

        let rebuilt = from_wizard_state(&state, &defs_of(&sections), &registry());
        assert!(rebuilt[1].media.is_empty());
    }

    #[test]
    fn missing_bucket_yields_canonical_empty_content() {
        let defs = vec![SectionDef {
            id: "safety".into(),
            name: None,
            icon: None,
            section_type: SectionType::List,
        }];
        let rebuilt = from_wizard_state(&WizardState::new(), &defs, &registry());
        assert_eq!(rebuilt[0].content, SectionContent::List { items: vec![] });
    }

    #[test]
    fn round_trip_preserves_canonical_sections() {
        let sections = sample_sections();
        let registry = registry();
        let state = to_wizard_state(&sections, &registry);
        let rebuilt = from_wizard_state(&state, &defs_of(&sections), &registry);
        assert_eq!(rebuilt, sections);
    }
}
