//! Whitelist sanitization of parsed documents, tiered by how much a page's origin is trusted.
mod report;
mod sanitize;
mod sites;
mod stylesheet;
mod tables;

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use core_types::TrustTier;
use html::Document;
use net::ResourceReader;

pub use crate::report::SecurityReport;
pub use crate::sanitize::{SanitizeContext, is_javascript_href, sanitize};
pub use crate::sites::{DEFAULT_TRUSTED_SITES, SiteAccess};
pub use crate::stylesheet::{
    DANGEROUS_STRINGS, find_dangerous_line, is_dangerous, resolve_stylesheet, squish,
};
pub use crate::tables::{AllowedSet, COMMON_ALLOWED, SPECIFIC_ALLOWED};

/// Site tiers plus what the sanitizer needs to read linked stylesheets.
pub struct SecurityPolicy {
    sites: RwLock<SiteAccess>,
    server_root: PathBuf,
    reader: Arc<dyn ResourceReader>,
}

impl SecurityPolicy {
    pub fn new(sites: SiteAccess, server_root: PathBuf, reader: Arc<dyn ResourceReader>) -> Self {
        SecurityPolicy {
            sites: RwLock::new(sites),
            server_root,
            reader,
        }
    }

    pub fn server_root(&self) -> &Path {
        &self.server_root
    }

    pub fn reader(&self) -> &Arc<dyn ResourceReader> {
        &self.reader
    }

    /// `trust_override` wins over the tier resolved from `page_url`.
    pub fn tier_for(&self, page_url: &str, trust_override: Option<TrustTier>) -> TrustTier {
        if let Some(tier) = trust_override {
            return tier;
        }
        match self.sites.read() {
            Ok(sites) => sites.resolve(page_url),
            Err(poisoned) => poisoned.into_inner().resolve(page_url),
        }
    }

    pub fn set_site_tier(&self, host: &str, tier: TrustTier) {
        match self.sites.write() {
            Ok(mut sites) => sites.set(host, tier),
            Err(poisoned) => poisoned.into_inner().set(host, tier),
        }
    }

    pub fn sites(&self) -> SiteAccess {
        match self.sites.read() {
            Ok(sites) => sites.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn sanitize(&self, doc: &mut Document, page_url: &str, tier: TrustTier) -> SecurityReport {
        let ctx = SanitizeContext {
            page_url,
            server_root: &self.server_root,
            reader: self.reader.as_ref(),
        };
        sanitize(doc, tier, &ctx)
    }
}
