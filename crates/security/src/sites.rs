//! Per-site trust tiers.
use std::collections::BTreeMap;

use core_types::TrustTier;
use url::Url;

pub const DEFAULT_TRUSTED_SITES: &[&str] = &["127.0.0.1", "docs.python.org", "python.org"];

/// Maps host names to tiers. Hosts not listed get the default tier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiteAccess {
    default_tier: TrustTier,
    hosts: BTreeMap<String, TrustTier>,
}

impl SiteAccess {
    /// Empty table: every page resolves to `default_tier`.
    pub fn new(default_tier: TrustTier) -> Self {
        SiteAccess {
            default_tier,
            hosts: BTreeMap::new(),
        }
    }

    /// Table seeded with the built-in trusted hosts.
    pub fn with_defaults(default_tier: TrustTier) -> Self {
        let mut access = SiteAccess::new(default_tier);
        for host in DEFAULT_TRUSTED_SITES {
            access.set(host, TrustTier::Trusted);
        }
        access
    }

    pub fn default_tier(&self) -> TrustTier {
        self.default_tier
    }

    /// Records `host` under `tier`, replacing any earlier entry for it. Empty hosts are ignored.
    pub fn set(&mut self, host: &str, tier: TrustTier) {
        let host = host.trim().to_ascii_lowercase();
        if host.is_empty() {
            return;
        }
        log::debug!(target: "security.sites", "{host} -> {tier}");
        self.hosts.insert(host, tier);
    }

    pub fn get(&self, host: &str) -> Option<TrustTier> {
        self.hosts.get(&host.to_ascii_lowercase()).copied()
    }

    /// Tier for a page URL. Only `http`, `https` and `file` URLs are looked up by host;
    /// anything else (local paths included) gets the default tier.
    pub fn resolve(&self, page_url: &str) -> TrustTier {
        let Ok(url) = Url::parse(page_url) else {
            return self.default_tier;
        };
        if !matches!(url.scheme(), "http" | "https" | "file") {
            return self.default_tier;
        }
        url.host_str()
            .and_then(|host| self.get(host))
            .unwrap_or(self.default_tier)
    }

    pub fn hosts(&self) -> impl Iterator<Item = (&str, TrustTier)> {
        self.hosts.iter().map(|(h, t)| (h.as_str(), *t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_hosts_resolve_to_their_tier() {
        let access = SiteAccess::with_defaults(TrustTier::Normal);
        assert_eq!(
            access.resolve("http://docs.python.org/tut/node5.html"),
            TrustTier::Trusted
        );
        assert_eq!(
            access.resolve("https://example.com/x#frag"),
            TrustTier::Normal
        );
        assert_eq!(access.resolve("/local/page.html"), TrustTier::Normal);
        assert_eq!(access.resolve("ftp://python.org/"), TrustTier::Normal);
    }

    #[test]
    fn set_moves_a_host_between_tiers() {
        let mut access = SiteAccess::with_defaults(TrustTier::Severe);
        access.set("Python.org", TrustTier::Paranoid);
        assert_eq!(access.resolve("http://python.org/"), TrustTier::Paranoid);
        assert_eq!(access.hosts().filter(|(h, _)| *h == "python.org").count(), 1);
        access.set("  ", TrustTier::Trusted);
        assert_eq!(access.hosts().count(), DEFAULT_TRUSTED_SITES.len());
    }
}
