//! Line-oriented tokenizer with indentation tracking.
use crate::error::{CompileError, ErrorKind};

#[derive(Clone, Debug, PartialEq)]
pub enum Tok {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    /// Operators and punctuation.
    Op(&'static str),
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
}

const OPERATORS: &[&str] = &[
    "**=", "//=", "**", "//", "==", "!=", "<=", ">=", "+=", "-=", "*=", "/=", "%=", "+", "-",
    "*", "/", "%", "<", ">", "=", "(", ")", "[", "]", ",", ":", ".",
];

const TAB_WIDTH: usize = 8;

pub struct Lexed {
    pub tokens: Vec<Token>,
    /// Whether any indented block was opened.
    pub has_blocks: bool,
}

pub fn lex(source: &str) -> Result<Lexed, CompileError> {
    let mut tokens = Vec::new();
    let mut indents: Vec<usize> = vec![0];
    let mut depth = 0usize; // open brackets
    let mut has_blocks = false;
    let mut last_line = 1;

    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        last_line = line;
        let bytes = raw.as_bytes();
        let mut i = 0;

        if depth == 0 {
            let mut width = 0;
            while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
                width = if bytes[i] == b'\t' {
                    (width / TAB_WIDTH + 1) * TAB_WIDTH
                } else {
                    width + 1
                };
                i += 1;
            }
            if i == bytes.len() || bytes[i] == b'#' {
                continue;
            }
            let current = indents.last().copied().unwrap_or(0);
            if width > current {
                if tokens.is_empty() {
                    return Err(CompileError::syntax(line, "unexpected indent")
                        .with_kind(ErrorKind::IndentationError));
                }
                indents.push(width);
                has_blocks = true;
                tokens.push(Token { tok: Tok::Indent, line });
            } else {
                while width < indents.last().copied().unwrap_or(0) {
                    indents.pop();
                    tokens.push(Token { tok: Tok::Dedent, line });
                }
                if width != indents.last().copied().unwrap_or(0) {
                    return Err(CompileError::syntax(
                        line,
                        "unindent does not match any outer indentation level",
                    )
                    .with_kind(ErrorKind::IndentationError));
                }
            }
        }

        while i < bytes.len() {
            let c = bytes[i];
            if c == b' ' || c == b'\t' {
                i += 1;
                continue;
            }
            if c == b'#' {
                break;
            }
            if c.is_ascii_digit() || (c == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
                let start = i;
                let mut is_float = false;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.' || bytes[i] == b'_') {
                    is_float |= bytes[i] == b'.';
                    i += 1;
                }
                if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                    let mut j = i + 1;
                    if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                        j += 1;
                    }
                    if j < bytes.len() && bytes[j].is_ascii_digit() {
                        is_float = true;
                        i = j;
                        while i < bytes.len() && bytes[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = raw[start..i].chars().filter(|&c| c != '_').collect();
                let tok = if is_float {
                    text.parse::<f64>().map(Tok::Float).map_err(|_| {
                        CompileError::syntax(line, format!("invalid number '{text}'"))
                    })?
                } else {
                    text.parse::<i64>().map(Tok::Int).map_err(|_| {
                        CompileError::syntax(line, format!("integer literal too large: {text}"))
                            .with_kind(ErrorKind::ValueError)
                    })?
                };
                tokens.push(Token { tok, line });
                continue;
            }
            if c.is_ascii_alphabetic() || c == b'_' || !c.is_ascii() {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || !bytes[i].is_ascii())
                {
                    i += 1;
                }
                tokens.push(Token {
                    tok: Tok::Name(raw[start..i].to_string()),
                    line,
                });
                continue;
            }
            if c == b'"' || c == b'\'' {
                let (text, next) = lex_string(raw, i, line)?;
                tokens.push(Token { tok: Tok::Str(text), line });
                i = next;
                continue;
            }
            let Some(op) = OPERATORS.iter().find(|op| raw[i..].starts_with(**op)) else {
                return Err(CompileError::syntax(
                    line,
                    format!("invalid character '{}'", raw[i..].chars().next().unwrap_or('?')),
                ));
            };
            match *op {
                "(" | "[" => depth += 1,
                ")" | "]" => {
                    if depth == 0 {
                        return Err(CompileError::syntax(line, format!("unmatched '{op}'")));
                    }
                    depth -= 1;
                }
                _ => {}
            }
            tokens.push(Token { tok: Tok::Op(op), line });
            i += op.len();
        }

        if depth == 0 && tokens.last().is_some_and(|t| t.tok != Tok::Newline) {
            tokens.push(Token { tok: Tok::Newline, line });
        }
    }

    if depth > 0 {
        return Err(CompileError::incomplete(last_line, "unexpected EOF while parsing"));
    }
    while indents.len() > 1 {
        indents.pop();
        tokens.push(Token { tok: Tok::Dedent, line: last_line });
    }
    tokens.push(Token { tok: Tok::Eof, line: last_line });
    Ok(Lexed { tokens, has_blocks })
}

fn lex_string(raw: &str, start: usize, line: usize) -> Result<(String, usize), CompileError> {
    let quote = raw.as_bytes()[start] as char;
    let mut out = String::new();
    let mut chars = raw[start + 1..].char_indices();
    while let Some((off, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, '0')) => out.push('\0'),
                Some((_, e @ ('\\' | '\'' | '"'))) => out.push(e),
                Some((_, other)) => {
                    out.push('\\');
                    out.push(other);
                }
                None => break,
            },
            c if c == quote => return Ok((out, start + 1 + off + 1)),
            c => out.push(c),
        }
    }
    Err(CompileError::syntax(line, "EOL while scanning string literal"))
}
