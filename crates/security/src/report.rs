use std::collections::BTreeMap;

use core_types::TrustTier;

/// What one `sanitize` call removed. Built by the sanitizer, read-only afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurityReport {
    pub tier: TrustTier,
    /// Removed elements, attributes and styles, all counted.
    pub removed_count: usize,
    /// `(tag, count)`, sorted by tag.
    pub removed_tags: Vec<(String, usize)>,
    /// `(tag, attribute, value)`; the value is empty for attributes outside the whitelist.
    pub removed_attributes: Vec<(String, String, String)>,
    /// `(tag, attribute, reason)`; the attribute is empty for `<style>` and `<link>` elements.
    pub removed_styles: Vec<(String, String, String)>,
}

impl SecurityReport {
    pub fn new(tier: TrustTier) -> Self {
        SecurityReport {
            tier,
            removed_count: 0,
            removed_tags: Vec::new(),
            removed_attributes: Vec::new(),
            removed_styles: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.removed_count == 0
    }

    pub fn tag_count(&self, tag: &str) -> usize {
        self.removed_tags
            .iter()
            .find(|(t, _)| t == tag)
            .map_or(0, |(_, n)| *n)
    }
}

/// Accumulates removals while the sanitizer walks the tree.
#[derive(Debug, Default)]
pub(crate) struct ReportBuilder {
    removed_count: usize,
    tags: BTreeMap<String, usize>,
    attributes: Vec<(String, String, String)>,
    styles: Vec<(String, String, String)>,
}

impl ReportBuilder {
    pub(crate) fn tag(&mut self, tag: &str) {
        *self.tags.entry(tag.to_string()).or_insert(0) += 1;
        self.removed_count += 1;
    }

    pub(crate) fn attribute(&mut self, tag: &str, attr: &str, value: &str) {
        self.attributes
            .push((tag.to_string(), attr.to_string(), value.to_string()));
        self.removed_count += 1;
    }

    pub(crate) fn style(&mut self, tag: &str, attr: &str, reason: &str) {
        self.styles
            .push((tag.to_string(), attr.to_string(), reason.to_string()));
        self.removed_count += 1;
    }

    pub(crate) fn finish(self, tier: TrustTier) -> SecurityReport {
        SecurityReport {
            tier,
            removed_count: self.removed_count,
            removed_tags: self.tags.into_iter().collect(),
            removed_attributes: self.attributes,
            removed_styles: self.styles,
        }
    }
}
