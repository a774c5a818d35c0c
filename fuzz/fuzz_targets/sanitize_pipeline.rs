#![no_main]

use std::path::Path;

use core_types::TrustTier;
use libfuzzer_sys::fuzz_target;
use net::MemoryReader;
use security::{SanitizeContext, sanitize};

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);
    let reader = MemoryReader::new();
    let ctx = SanitizeContext {
        page_url: "/fuzz.html",
        server_root: Path::new("/nonexistent"),
        reader: &reader,
    };
    for tier in TrustTier::ALL {
        let mut doc = html::parse(&input);
        sanitize(&mut doc, tier, &ctx);
        let clean = doc.clone();
        let second = sanitize(&mut doc, tier, &ctx);
        assert!(second.is_clean(), "{tier}: {second:?}");
        assert_eq!(doc, clean);
    }
});
