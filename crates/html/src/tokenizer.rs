//! Tolerant tokenizer for tutorial pages.
//!
//! Tag and attribute names are ASCII `[A-Za-z0-9:_-]` and are lowercased. Malformed
//! markup never fails: a `<` that does not open a tag is text, unterminated tags end
//! at end of input, and `script`/`style` bodies run to their close tag or to the end.
use crate::entities::decode_entities;
use crate::types::Token;
use memchr::memchr;

pub fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn is_name_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'-' | b'_' | b':')
}

/// Position of the `</name` close tag of a rawtext element and the offset just past
/// its `>`. The name must be followed by whitespace, `/` or `>`; anything up to the
/// next `>` belongs to the close tag.
fn rawtext_end(body: &str, name: &str) -> Option<(usize, usize)> {
    let bytes = body.as_bytes();
    let mut from = 0;
    while let Some(rel) = memchr(b'<', &bytes[from..]) {
        let at = from + rel;
        from = at + 1;
        let name_at = at + 2;
        let name_end = name_at + name.len();
        if bytes.get(at + 1) != Some(&b'/')
            || name_end > bytes.len()
            || !bytes[name_at..name_end].eq_ignore_ascii_case(name.as_bytes())
        {
            continue;
        }
        match bytes.get(name_end) {
            Some(b) if b.is_ascii_whitespace() || matches!(b, b'/' | b'>') => {}
            _ => continue,
        }
        let end = memchr(b'>', &bytes[name_end..]).map_or(bytes.len(), |rel| name_end + rel + 1);
        return Some((at, end));
    }
    None
}

/// Byte cursor over the input. Every cut happens at an ASCII byte, so slices stay on
/// char boundaries.
struct Cursor<'a> {
    input: &'a str,
    pos: usize,
    out: Vec<Token>,
}

impl<'a> Cursor<'a> {
    fn bytes(&self) -> &'a [u8] {
        self.input.as_bytes()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes().get(self.pos + offset).copied()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        while self.peek_at(0).is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn take_name(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek_at(0).is_some_and(is_name_byte) {
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    /// Moves past the next `>`, or to the end.
    fn skip_past_gt(&mut self) {
        self.pos = match memchr(b'>', &self.bytes()[self.pos..]) {
            Some(rel) => self.pos + rel + 1,
            None => self.input.len(),
        };
    }

    /// Adjacent text runs merge, so a stray `<` does not split them.
    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.out.last_mut() {
            Some(Token::Text(prev)) => prev.push_str(text),
            _ => self.out.push(Token::Text(text.to_string())),
        }
    }

    fn run(mut self) -> Vec<Token> {
        while self.pos < self.input.len() {
            let step = match self.peek_at(0) {
                Some(b'<') => self.markup(),
                _ => {
                    self.text_run();
                    Step::Continue
                }
            };
            if let Step::Stop = step {
                break;
            }
        }
        self.out
    }

    fn text_run(&mut self) {
        let start = self.pos;
        self.pos = match memchr(b'<', &self.bytes()[start..]) {
            Some(rel) => start + rel,
            None => self.input.len(),
        };
        let decoded = decode_entities(&self.input[start..self.pos]);
        self.text(&decoded);
    }

    fn markup(&mut self) -> Step {
        let rest = self.rest();
        if let Some(body) = rest.strip_prefix("<!--") {
            return self.comment(body);
        }
        if rest.len() >= 9 && rest.as_bytes()[..9].eq_ignore_ascii_case(b"<!doctype") {
            return self.doctype();
        }
        match self.peek_at(1) {
            Some(b'!' | b'?') => {
                self.skip_past_gt();
                Step::Continue
            }
            Some(b'/') => {
                self.end_tag();
                Step::Continue
            }
            _ => self.start_tag(),
        }
    }

    fn comment(&mut self, body: &'a str) -> Step {
        match body.find("-->") {
            Some(end) => {
                self.out.push(Token::Comment(body[..end].to_string()));
                self.pos += 4 + end + 3;
                Step::Continue
            }
            None => {
                self.out.push(Token::Comment(body.to_string()));
                Step::Stop
            }
        }
    }

    /// Unterminated doctypes drop the rest of the input.
    fn doctype(&mut self) -> Step {
        let inner = &self.rest()[2..];
        let Some(end) = inner.find('>') else {
            return Step::Stop;
        };
        self.out.push(Token::Doctype(inner[..end].trim().to_string()));
        self.pos += 2 + end + 1;
        Step::Continue
    }

    fn end_tag(&mut self) {
        self.pos += 2;
        let name = self.take_name().to_ascii_lowercase();
        self.skip_past_gt();
        if !name.is_empty() {
            self.out.push(Token::EndTag(name));
        }
    }

    fn start_tag(&mut self) -> Step {
        self.pos += 1;
        let name = self.take_name().to_ascii_lowercase();
        if name.is_empty() {
            self.text("<");
            return Step::Continue;
        }
        let (attributes, closed) = self.attributes();
        let self_closing = closed || is_void_element(&name);
        let rawtext = !self_closing && (name == "script" || name == "style");
        self.out.push(Token::StartTag {
            name: name.clone(),
            attributes,
            self_closing,
        });
        if rawtext {
            self.rawtext(name)
        } else {
            Step::Continue
        }
    }

    /// Attributes up to and including the tag's `>`; the flag reports a `/>` ending.
    /// Duplicates keep their first value.
    fn attributes(&mut self) -> (Vec<(String, Option<String>)>, bool) {
        let mut attributes: Vec<(String, Option<String>)> = Vec::new();
        loop {
            self.skip_whitespace();
            match (self.peek_at(0), self.peek_at(1)) {
                (None, _) => return (attributes, false),
                (Some(b'>'), _) => {
                    self.pos += 1;
                    return (attributes, false);
                }
                (Some(b'/'), Some(b'>')) => {
                    self.pos += 2;
                    return (attributes, true);
                }
                (Some(b'/'), _) => {
                    self.pos += 1;
                    continue;
                }
                _ => {}
            }
            let name = self.take_name().to_ascii_lowercase();
            if name.is_empty() {
                self.pos += 1;
                continue;
            }
            self.skip_whitespace();
            let value = if self.peek_at(0) == Some(b'=') {
                self.pos += 1;
                self.skip_whitespace();
                Some(decode_entities(self.attribute_value()))
            } else {
                None
            };
            if !attributes.iter().any(|(n, _)| *n == name) {
                attributes.push((name, value));
            }
        }
    }

    fn attribute_value(&mut self) -> &'a str {
        let start = self.pos;
        match self.peek_at(0) {
            Some(quote @ (b'"' | b'\'')) => {
                let body = start + 1;
                let end = memchr(quote, &self.bytes()[body..])
                    .map_or(self.input.len(), |rel| body + rel);
                self.pos = (end + 1).min(self.input.len());
                &self.input[body..end]
            }
            _ => {
                while let Some(b) = self.peek_at(0) {
                    let slash_gt = b == b'/' && self.peek_at(1) == Some(b'>');
                    if b.is_ascii_whitespace() || b == b'>' || slash_gt {
                        break;
                    }
                    self.pos += 1;
                }
                &self.input[start..self.pos]
            }
        }
    }

    /// Body of `script`/`style` is kept verbatim. A missing close tag ends the element
    /// at end of input.
    fn rawtext(&mut self, name: String) -> Step {
        let rest = self.rest();
        let (body, consumed) = match rawtext_end(rest, &name) {
            Some((start, end)) => (&rest[..start], end),
            None => (rest, rest.len()),
        };
        if !body.is_empty() {
            self.out.push(Token::Text(body.to_string()));
        }
        self.out.push(Token::EndTag(name));
        self.pos += consumed;
        Step::Continue
    }
}

enum Step {
    Continue,
    Stop,
}

pub fn tokenize(input: &str) -> Vec<Token> {
    Cursor {
        input,
        pos: 0,
        out: Vec::new(),
    }
    .run()
}
