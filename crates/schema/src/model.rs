//! Canonical experiment document model.
//!
//! This module defines the one shape an experiment document takes after
//! normalisation. Historically the wire format was written by several UI
//! generations and is loosely typed (section content is sometimes a string,
//! sometimes an array, sometimes a nested object); the canonical model pins
//! each section's content shape to its declared [`SectionType`].
//!
//! Canonical values serialize straight back to the current wire shape, so
//! persisting a canonical document needs no separate encoding step. The
//! reverse direction (parsing untrusted or legacy input) deliberately does
//! *not* go through serde: loosely-typed input enters the typed model only
//! through the normaliser in `labdoc-core`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// The five content shapes a section can take.
///
/// The string forms (`rich-text`, `list`, `materials_with_media`,
/// `procedure-steps`, `custom`) are the wire vocabulary and are preserved
/// exactly; two of them predate the current naming convention, which is why
/// the separators are inconsistent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SectionType {
    RichText,
    List,
    MaterialsWithMedia,
    ProcedureSteps,
    Custom,
}

impl SectionType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RichText => "rich-text",
            Self::List => "list",
            Self::MaterialsWithMedia => "materials_with_media",
            Self::ProcedureSteps => "procedure-steps",
            Self::Custom => "custom",
        }
    }

    /// Parses a wire type string. Returns `None` for unknown vocabulary so
    /// callers can fall back to shape inference instead of failing.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "rich-text" => Some(Self::RichText),
            "list" => Some(Self::List),
            "materials_with_media" => Some(Self::MaterialsWithMedia),
            "procedure-steps" => Some(Self::ProcedureSteps),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SectionType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SectionType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).ok_or_else(|| {
            serde::de::Error::unknown_variant(
                &s,
                &[
                    "rich-text",
                    "list",
                    "materials_with_media",
                    "procedure-steps",
                    "custom",
                ],
            )
        })
    }
}

/// A media attachment: an uploaded image, video or file.
///
/// Invariant (checked by `validate::validate_media_item`, not by the type):
/// at least one of `data` (inline base64) or `url` must be present.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Inline base64 payload, for media embedded directly in the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// External location, for media stored out of line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// MIME type, e.g. `image/png`.
    #[serde(rename = "type")]
    pub mime: String,
    /// Original file name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(rename = "displaySize", default, skip_serializing_if = "Option::is_none")]
    pub display_size: Option<u64>,
}

impl MediaItem {
    /// Whether this item actually points at something.
    pub fn has_payload(&self) -> bool {
        self.data.as_deref().is_some_and(|d| !d.is_empty())
            || self.url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// One named material, optionally with an attached photo.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaItem>,
}

/// One procedure step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcedureStep {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<MediaItem>>,
}

/// Section content as a discriminated union, one variant per [`SectionType`].
///
/// Serialization is untagged: each variant writes its historical wire shape
/// (a bare HTML string, `{"items": [...]}`, `{"steps": [...]}`, or the opaque
/// custom value). There is intentionally no `Deserialize` implementation:
/// arbitrary input must pass through the normaliser, which is the single
/// place legacy shapes are understood.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SectionContent {
    /// HTML string, as produced by the rich-text editor.
    RichText(String),
    /// Plain bullet list.
    List { items: Vec<String> },
    /// Materials with optional per-item media.
    Materials { items: Vec<MaterialItem> },
    /// Ordered procedure with optional notes and per-step media.
    Steps { steps: Vec<ProcedureStep> },
    /// Opaque value, compared by deep equality only.
    Custom(Value),
}

impl SectionContent {
    /// The section type this content shape corresponds to.
    pub fn section_type(&self) -> SectionType {
        match self {
            Self::RichText(_) => SectionType::RichText,
            Self::List { .. } => SectionType::List,
            Self::Materials { .. } => SectionType::MaterialsWithMedia,
            Self::Steps { .. } => SectionType::ProcedureSteps,
            Self::Custom(_) => SectionType::Custom,
        }
    }

    /// The canonical empty content for a section type.
    pub fn empty_for(section_type: SectionType) -> Self {
        match section_type {
            SectionType::RichText => Self::RichText(String::new()),
            SectionType::List => Self::List { items: Vec::new() },
            SectionType::MaterialsWithMedia => Self::Materials { items: Vec::new() },
            SectionType::ProcedureSteps => Self::Steps { steps: Vec::new() },
            SectionType::Custom => Self::Custom(Value::Null),
        }
    }

    /// Whether this content carries nothing a reader would see.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::RichText(s) => s.trim().is_empty(),
            Self::List { items } => items.is_empty(),
            Self::Materials { items } => items.is_empty(),
            Self::Steps { steps } => steps.is_empty(),
            Self::Custom(v) => v.is_null(),
        }
    }
}

/// One editable unit of an experiment document.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Section {
    /// Stable identifier, unique within a document. The base id may carry a
    /// disambiguation suffix (`procedure_1714516223`); the section kind
    /// registry strips it when resolving the kind.
    pub id: String,
    /// Display title. Not semantically compared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Display icon. Not semantically compared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(rename = "type")]
    pub section_type: SectionType,
    pub content: SectionContent,
    /// Section-level media, for kinds that render media under the section
    /// rather than inline per item or step.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<MediaItem>,
}

/// Experiment-level configuration resolved from whichever of the historical
/// nesting levels actually carried values.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ExperimentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(rename = "gradeLevel", default, skip_serializing_if = "Option::is_none")]
    pub grade_level: Option<String>,
}

impl ExperimentConfig {
    pub fn is_empty(&self) -> bool {
        self.duration.is_none() && self.subject.is_none() && self.grade_level.is_none()
    }
}

/// The `content` object of a canonical document: config plus ordered sections.
///
/// Section order is significant: rendering and procedure order depend on it.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DocumentContent {
    pub config: ExperimentConfig,
    pub sections: Vec<Section>,
    /// Opaque sharing/permission flags; carried through, never interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Value>,
}

/// A canonical experiment document.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: DocumentContent,
    /// The version currently considered authoritative. The only mutable
    /// pointer a document has; every save creates a new immutable version.
    #[serde(
        rename = "current_version_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub current_version_id: Option<String>,
}

/// An immutable snapshot of a document at one point in its history.
///
/// `version_number` is monotonically increasing per document and is assigned
/// by the storage layer, never by the client. `content` is kept in the wire
/// shape; it is normalised on demand when a version is compared or restored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub id: String,
    pub version_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
    pub created_at: DateTime<Utc>,
    /// The version number the edit session that produced this snapshot
    /// started from. Used for optimistic-concurrency checks only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_version: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn section_type_round_trips_wire_strings() {
        for raw in [
            "rich-text",
            "list",
            "materials_with_media",
            "procedure-steps",
            "custom",
        ] {
            let parsed = SectionType::parse(raw).unwrap();
            assert_eq!(parsed.as_str(), raw);
        }
        assert_eq!(SectionType::parse("richtext"), None);
    }

    #[test]
    fn rich_text_content_serialises_as_bare_string() {
        let content = SectionContent::RichText("<p>hi</p>".into());
        assert_eq!(serde_json::to_value(&content).unwrap(), json!("<p>hi</p>"));
    }

    #[test]
    fn steps_content_serialises_with_steps_key() {
        let content = SectionContent::Steps {
            steps: vec![ProcedureStep {
                text: "Pour".into(),
                notes: None,
                media: None,
            }],
        };
        assert_eq!(
            serde_json::to_value(&content).unwrap(),
            json!({"steps": [{"text": "Pour"}]})
        );
    }

    #[test]
    fn media_item_payload_requires_data_or_url() {
        let mut item = MediaItem {
            data: None,
            url: None,
            mime: "image/png".into(),
            name: "beaker.png".into(),
            size: None,
            caption: None,
            display_size: None,
        };
        assert!(!item.has_payload());
        item.url = Some("https://example.org/beaker.png".into());
        assert!(item.has_payload());
    }

    #[test]
    fn empty_content_matches_declared_type() {
        assert_eq!(
            SectionContent::empty_for(SectionType::List).section_type(),
            SectionType::List
        );
        assert!(SectionContent::empty_for(SectionType::ProcedureSteps).is_empty());
    }

    #[test]
    fn section_serialises_type_under_wire_key() {
        let section = Section {
            id: "overview".into(),
            name: None,
            icon: None,
            section_type: SectionType::RichText,
            content: SectionContent::RichText("text".into()),
            media: Vec::new(),
        };
        let value = serde_json::to_value(&section).unwrap();
        assert_eq!(value["type"], json!("rich-text"));
        assert!(value.get("media").is_none());
    }
}
