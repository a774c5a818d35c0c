/// Named references recognized in text and attribute values. Tutorials mostly use
/// typographic punctuation besides the markup-significant five.
const NAMED: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("nbsp", '\u{00A0}'),
    ("copy", '\u{00A9}'),
    ("reg", '\u{00AE}'),
    ("deg", '\u{00B0}'),
    ("middot", '\u{00B7}'),
    ("times", '\u{00D7}'),
    ("divide", '\u{00F7}'),
    ("laquo", '\u{00AB}'),
    ("raquo", '\u{00BB}'),
    ("ndash", '\u{2013}'),
    ("mdash", '\u{2014}'),
    ("lsquo", '\u{2018}'),
    ("rsquo", '\u{2019}'),
    ("ldquo", '\u{201C}'),
    ("rdquo", '\u{201D}'),
    ("hellip", '\u{2026}'),
    ("larr", '\u{2190}'),
    ("rarr", '\u{2192}'),
    ("ne", '\u{2260}'),
    ("le", '\u{2264}'),
    ("ge", '\u{2265}'),
];

/// Longest reference body considered, `#x10FFFF` and `#1114111` included.
const MAX_REFERENCE: usize = 8;

/// Character for the text between `&` and `;`, if it names one.
fn reference(body: &str) -> Option<char> {
    let Some(number) = body.strip_prefix('#') else {
        return NAMED.iter().find(|(name, _)| *name == body).map(|(_, ch)| *ch);
    };
    let (digits, radix) = match number.strip_prefix(['x', 'X']) {
        Some(hex) => (hex, 16),
        None => (number, 10),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u32::from_str_radix(digits, radix).ok().and_then(char::from_u32)
}

/// Decodes semicolon-terminated character references. Anything that is not a known
/// name or a valid scalar value is kept as written.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let decoded = after
            .char_indices()
            .take(MAX_REFERENCE + 1)
            .find(|&(_, c)| c == ';')
            .and_then(|(semi, _)| reference(&after[..semi]).map(|ch| (ch, semi)));
        match decoded {
            Some((ch, semi)) => {
                out.push(ch);
                rest = &after[semi + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Escapes `&`, `<` and `>` for element text.
pub fn escape_text(s: &str) -> String {
    escape(s, false)
}

/// Escapes element text plus `"` for double-quoted attribute values.
pub fn escape_attr(s: &str) -> String {
    escape(s, true)
}

fn escape(s: &str, quotes: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if quotes => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
