#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);
    let doc = html::parse(&input);
    assert_eq!(doc.root().tag, "html");
    let serialized = html::serialize_document(&doc);
    let reparsed = html::parse(&serialized);
    assert_eq!(reparsed.root().tag, "html");
});
