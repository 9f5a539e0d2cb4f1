//! Section kind registry.
//!
//! A section's *kind* is its base identity (`procedure`, `materials`)
//! independent of any instance-disambiguation suffix the editor appends when
//! the same kind appears twice (`procedure_1714516223`). The registry is the
//! single source of truth for what each kind looks like: its display
//! metadata, its content type, which wizard field holds its content, and
//! where media is allowed to live.
//!
//! Both the normaliser (to classify unknown legacy shapes) and the
//! wizard-state adapter (to know which field id carries rich-text content)
//! consult this table. It is deliberately an injectable value rather than a
//! module-level global so tests can substitute alternate registries.

use crate::model::{SectionContent, SectionType};

/// Where a section kind keeps its media, if anywhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaPolicy {
    /// Media is rendered under the section, from `section.media`.
    SectionLevel,
    /// Media lives inline on each material item; `section.media` is invalid.
    InlinePerItem,
    /// Media lives inline on each procedure step; `section.media` is invalid.
    InlinePerStep,
}

impl MediaPolicy {
    /// Whether `section.media` is a legal place for attachments.
    pub fn allows_section_media(self) -> bool {
        matches!(self, Self::SectionLevel)
    }
}

/// The definition of one section kind.
#[derive(Clone, Debug)]
pub struct SectionKind {
    /// Base id, before any disambiguation suffix.
    pub id: &'static str,
    /// Human-readable name shown in the editor and in diff group labels.
    pub name: &'static str,
    pub icon: &'static str,
    pub section_type: SectionType,
    /// Wizard field ids, primary field first. For rich-text kinds the first
    /// entry is the field the content string binds to.
    pub fields: &'static [&'static str],
    pub media_policy: MediaPolicy,
}

impl SectionKind {
    /// The canonical empty content for this kind.
    pub fn default_content(&self) -> SectionContent {
        SectionContent::empty_for(self.section_type)
    }

    /// The wizard field id that holds this kind's primary content.
    pub fn content_field(&self) -> &'static str {
        self.fields.first().copied().unwrap_or("content")
    }
}

/// An instance-level section definition, as selected in the wizard.
///
/// Unlike [`SectionKind`] this carries the concrete instance id (suffix
/// included) and whatever display metadata the user has customised.
#[derive(Clone, Debug, PartialEq)]
pub struct SectionDef {
    pub id: String,
    pub name: Option<String>,
    pub icon: Option<String>,
    pub section_type: SectionType,
}

/// Strips the instance-disambiguation suffix from a section id.
///
/// Ids of custom sections all resolve to the `custom` kind; other ids may
/// carry a trailing `_<timestamp>` which is removed.
pub fn base_id(id: &str) -> &str {
    if id.starts_with("custom_") || id == "custom" {
        return "custom";
    }
    match id.rsplit_once('_') {
        Some((base, suffix)) if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) => {
            base
        }
        _ => id,
    }
}

/// The immutable table of known section kinds.
#[derive(Clone, Debug)]
pub struct SectionRegistry {
    kinds: Vec<SectionKind>,
}

impl SectionRegistry {
    /// Builds a registry from an explicit kind list.
    pub fn new(kinds: Vec<SectionKind>) -> Self {
        Self { kinds }
    }

    /// The built-in kinds of the experiment editor.
    pub fn standard() -> Self {
        Self::new(vec![
            SectionKind {
                id: "overview",
                name: "Overview",
                icon: "📋",
                section_type: SectionType::RichText,
                fields: &["content"],
                media_policy: MediaPolicy::SectionLevel,
            },
            SectionKind {
                id: "theory",
                name: "Theory",
                icon: "📖",
                section_type: SectionType::RichText,
                fields: &["theory"],
                media_policy: MediaPolicy::SectionLevel,
            },
            SectionKind {
                id: "purpose",
                name: "Purpose",
                icon: "🎯",
                section_type: SectionType::RichText,
                fields: &["purpose"],
                media_policy: MediaPolicy::SectionLevel,
            },
            SectionKind {
                id: "materials",
                name: "Materials",
                icon: "🧪",
                section_type: SectionType::MaterialsWithMedia,
                fields: &["items"],
                media_policy: MediaPolicy::InlinePerItem,
            },
            SectionKind {
                id: "safety",
                name: "Safety",
                icon: "⚠️",
                section_type: SectionType::List,
                fields: &["items"],
                media_policy: MediaPolicy::SectionLevel,
            },
            SectionKind {
                id: "procedure",
                name: "Procedure",
                icon: "🔢",
                section_type: SectionType::ProcedureSteps,
                fields: &["steps"],
                media_policy: MediaPolicy::InlinePerStep,
            },
            SectionKind {
                id: "results",
                name: "Results",
                icon: "📊",
                section_type: SectionType::RichText,
                fields: &["content"],
                media_policy: MediaPolicy::SectionLevel,
            },
            SectionKind {
                id: "notes",
                name: "Notes",
                icon: "📝",
                section_type: SectionType::RichText,
                fields: &["content"],
                media_policy: MediaPolicy::SectionLevel,
            },
            SectionKind {
                id: "custom",
                name: "Custom Section",
                icon: "✏️",
                section_type: SectionType::Custom,
                fields: &["content"],
                media_policy: MediaPolicy::SectionLevel,
            },
        ])
    }

    /// Resolves a section id (suffix included) to its kind, if known.
    pub fn resolve(&self, section_id: &str) -> Option<&SectionKind> {
        let base = base_id(section_id);
        self.kinds.iter().find(|kind| kind.id == base)
    }

    /// All registered kinds, in declaration order.
    pub fn kinds(&self) -> &[SectionKind] {
        &self.kinds
    }

    /// The media policy for a section id, judging unknown ids by their
    /// declared type. Materials and procedure sections keep media inline;
    /// everything else keeps it at section level.
    pub fn media_policy_for(&self, section_id: &str, section_type: SectionType) -> MediaPolicy {
        if let Some(kind) = self.resolve(section_id) {
            return kind.media_policy;
        }
        match section_type {
            SectionType::MaterialsWithMedia => MediaPolicy::InlinePerItem,
            SectionType::ProcedureSteps => MediaPolicy::InlinePerStep,
            _ => MediaPolicy::SectionLevel,
        }
    }
}

impl Default for SectionRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_id_strips_timestamp_suffix() {
        assert_eq!(base_id("procedure_1714516223"), "procedure");
        assert_eq!(base_id("procedure"), "procedure");
    }

    #[test]
    fn base_id_keeps_non_numeric_suffix() {
        assert_eq!(base_id("materials_with"), "materials_with");
    }

    #[test]
    fn custom_ids_resolve_to_custom_kind() {
        assert_eq!(base_id("custom_4f2a"), "custom");
        assert_eq!(base_id("custom_123"), "custom");
    }

    #[test]
    fn resolve_uses_base_id() {
        let registry = SectionRegistry::standard();
        let kind = registry.resolve("materials_1714516223").unwrap();
        assert_eq!(kind.name, "Materials");
        assert_eq!(kind.section_type, SectionType::MaterialsWithMedia);
    }

    #[test]
    fn media_policy_falls_back_to_type_for_unknown_ids() {
        let registry = SectionRegistry::standard();
        assert_eq!(
            registry.media_policy_for("mystery", SectionType::ProcedureSteps),
            MediaPolicy::InlinePerStep
        );
        assert_eq!(
            registry.media_policy_for("mystery", SectionType::RichText),
            MediaPolicy::SectionLevel
        );
    }

    #[test]
    fn content_field_defaults_to_first_declared_field() {
        let registry = SectionRegistry::standard();
        assert_eq!(registry.resolve("theory").unwrap().content_field(), "theory");
        assert_eq!(registry.resolve("notes").unwrap().content_field(), "content");
    }
}
