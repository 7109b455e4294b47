//! Per-type cache invalidation rules.
//!
//! A rule lists key templates for one entity type. Placeholders in braces
//! are filled from the changed entity: `{id}` or a scope field such as
//! `{user_id}`. A template with a placeholder that cannot be filled is
//! skipped, never rendered half-way.

use super::ChangedEntity;

/// Key pattern templates to clear when an entity of one type changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheInvalidationRule {
    pub entity_type: String,
    pub templates: Vec<String>,
}

impl CacheInvalidationRule {
    pub fn new<I, S>(entity_type: impl Into<String>, templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entity_type: entity_type.into(),
            templates: templates.into_iter().map(Into::into).collect(),
        }
    }

    pub fn applies_to(&self, changed: &ChangedEntity) -> bool {
        self.entity_type == changed.entity_type
    }

    /// Renders every template that can be fully resolved for `changed`.
    pub fn render(&self, changed: &ChangedEntity) -> Vec<String> {
        if !self.applies_to(changed) {
            return Vec::new();
        }
        self.templates
            .iter()
            .filter_map(|template| render_template(template, |name| changed.field_value(name)))
            .collect()
    }
}

/// Fills `{name}` placeholders using `lookup`.
///
/// Returns `None` if any placeholder is unknown or a brace is left open.
pub fn render_template<F>(template: &str, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}')?;
        rendered.push_str(&lookup(&after[..close])?);
        rest = &after[close + 1..];
    }

    rendered.push_str(rest);
    Some(rendered)
}
