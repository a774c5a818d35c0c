//! Tag/attribute whitelists per trust tier.
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use core_types::TrustTier;

/// Attributes almost every tag can use. `style` is handled per tier.
pub const COMMON_ALLOWED: &[&str] = &["class", "dir", "id", "lang", "title"];

/// Tags that may appear in a sanitized page, with their tag-specific attributes.
/// Scripting and form controls are absent: only handlers insert those.
pub const SPECIFIC_ALLOWED: &[(&str, &[&str])] = &[
    ("a", &["charset", "type", "name", "href", "hreflang", "rel"]),
    ("abbr", &[]),
    ("acronym", &[]),
    ("address", &[]),
    ("area", &["name", "shape", "coords", "href", "alt", "nohref"]),
    ("b", &[]),
    ("bdo", &[]),
    ("big", &[]),
    ("blockquote", &["cite"]),
    ("body", &["bgcolor"]),
    ("br", &["clear"]),
    ("canvas", &[]),
    ("caption", &["align"]),
    ("center", &[]),
    ("cite", &[]),
    ("code", &[]),
    ("col", &["span", "width"]),
    ("colgroup", &["span", "width"]),
    ("dd", &[]),
    ("del", &["cite", "datetime"]),
    ("dfn", &[]),
    ("dir", &[]),
    ("div", &["align"]),
    ("dl", &[]),
    ("dt", &[]),
    ("em", &[]),
    ("fieldset", &["align"]),
    ("font", &["size", "color", "face"]),
    ("h1", &["align"]),
    ("h2", &["align"]),
    ("h3", &["align"]),
    ("h4", &["align"]),
    ("h5", &["align"]),
    ("h6", &["align"]),
    ("head", &[]),
    ("hr", &["align", "noshade", "size", "width"]),
    ("html", &[]),
    ("i", &[]),
    (
        "img",
        &[
            "src", "alt", "longdesc", "name", "height", "width", "usemap", "ismap", "border",
        ],
    ),
    ("ins", &["cite", "datetime"]),
    ("kbd", &[]),
    ("label", &["for"]),
    ("legend", &["align"]),
    ("li", &["value"]),
    (
        "link",
        &["charset", "href", "hreflang", "type", "rel", "rev", "media"],
    ),
    ("map", &["shape", "coords", "href", "nohref", "alt"]),
    ("menu", &[]),
    ("meta", &["name", "content"]),
    ("noframes", &[]),
    ("noscript", &[]),
    ("ol", &["start"]),
    ("p", &[]),
    ("pre", &[]),
    ("q", &["cite"]),
    ("s", &[]),
    ("samp", &[]),
    ("small", &[]),
    ("span", &["align"]),
    ("strike", &[]),
    ("strong", &[]),
    ("style", &["type", "media"]),
    ("sub", &[]),
    ("sup", &[]),
    (
        "table",
        &[
            "summary",
            "align",
            "width",
            "bgcolor",
            "frame",
            "rules",
            "border",
            "cellspacing",
            "cellpadding",
        ],
    ),
    ("tbody", &["align", "char", "charoff", "valign"]),
    (
        "td",
        &[
            "abbr", "axis", "headers", "scope", "rowspan", "colspan", "bgcolor", "align", "char",
            "charoff", "valign",
        ],
    ),
    ("tfoot", &["align", "char", "charoff", "valign"]),
    (
        "th",
        &[
            "abbr", "axis", "headers", "scope", "rowspan", "colspan", "bgcolor", "align", "char",
            "charoff", "valign",
        ],
    ),
    ("thead", &["align", "char", "charoff", "valign"]),
    ("title", &[]),
    ("tr", &[]),
    ("tt", &[]),
    ("u", &[]),
    ("ul", &[]),
    ("var", &[]),
];

/// Presentational inline tags that `paranoid` drops on top of the `severe` exclusions.
const PARANOID_EXCLUDED: &[&str] = &[
    "b", "big", "center", "font", "i", "s", "small", "strike", "tt", "u",
];

/// Allowed tags and, per tag, allowed attribute names for one tier.
#[derive(Debug)]
pub struct AllowedSet {
    tier: TrustTier,
    tags: HashMap<&'static str, HashSet<&'static str>>,
}

impl AllowedSet {
    /// Shared, lazily built table for `tier`.
    pub fn for_tier(tier: TrustTier) -> &'static AllowedSet {
        static TABLES: OnceLock<[AllowedSet; 4]> = OnceLock::new();
        let tables = TABLES.get_or_init(|| TrustTier::ALL.map(AllowedSet::build));
        &tables[tier as usize]
    }

    fn build(tier: TrustTier) -> AllowedSet {
        let mut tags = HashMap::new();
        for &(tag, specific) in SPECIFIC_ALLOWED {
            let excluded = match tier {
                TrustTier::Trusted => false,
                TrustTier::Normal => tag == "meta",
                TrustTier::Severe => matches!(tag, "meta" | "link" | "style"),
                TrustTier::Paranoid => {
                    matches!(tag, "meta" | "link" | "style") || PARANOID_EXCLUDED.contains(&tag)
                }
            };
            if excluded {
                continue;
            }
            let attrs: HashSet<&'static str> = match tier {
                TrustTier::Paranoid if tag == "a" => ["href", "id", "title"].into(),
                TrustTier::Paranoid => ["title"].into(),
                TrustTier::Severe => specific.iter().chain(COMMON_ALLOWED).copied().collect(),
                TrustTier::Normal | TrustTier::Trusted => specific
                    .iter()
                    .chain(COMMON_ALLOWED)
                    .chain(&["style"])
                    .copied()
                    .collect(),
            };
            tags.insert(tag, attrs);
        }
        AllowedSet { tier, tags }
    }

    pub fn tier(&self) -> TrustTier {
        self.tier
    }

    pub fn allows_tag(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }

    pub fn allows_attr(&self, tag: &str, attr: &str) -> bool {
        self.tags
            .get(tag)
            .is_some_and(|attrs| attrs.contains(attr.to_ascii_lowercase().as_str()))
    }

    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tags.keys().copied()
    }

    pub fn attrs(&self, tag: &str) -> impl Iterator<Item = &'static str> + '_ {
        self.tags.get(tag).into_iter().flatten().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_monotonic() {
        for pair in TrustTier::ALL.windows(2) {
            let (lower, higher) = (AllowedSet::for_tier(pair[0]), AllowedSet::for_tier(pair[1]));
            for tag in lower.tags() {
                assert!(higher.allows_tag(tag), "{tag} lost from {:?}", pair[1]);
                for attr in lower.attrs(tag) {
                    assert!(
                        higher.allows_attr(tag, attr),
                        "{tag}[{attr}] lost from {:?}",
                        pair[1]
                    );
                }
            }
        }
    }

    #[test]
    fn scripting_tags_are_never_allowed() {
        for tier in TrustTier::ALL {
            let set = AllowedSet::for_tier(tier);
            for tag in ["script", "iframe", "object", "embed", "form", "input", "textarea"] {
                assert!(!set.allows_tag(tag), "{tag} allowed at {tier}");
            }
            assert!(set.allows_tag("html"));
        }
    }

    #[test]
    fn style_attribute_only_from_normal_up() {
        assert!(!AllowedSet::for_tier(TrustTier::Severe).allows_attr("p", "style"));
        assert!(AllowedSet::for_tier(TrustTier::Normal).allows_attr("p", "STYLE"));
        assert!(!AllowedSet::for_tier(TrustTier::Normal).allows_tag("meta"));
        assert!(AllowedSet::for_tier(TrustTier::Trusted).allows_tag("meta"));
    }

    #[test]
    fn paranoid_keeps_navigation_only() {
        let set = AllowedSet::for_tier(TrustTier::Paranoid);
        assert!(set.allows_attr("a", "href"));
        assert!(!set.allows_attr("img", "src"));
        assert!(set.allows_attr("pre", "title"));
        assert!(!set.allows_tag("b"));
    }
}
