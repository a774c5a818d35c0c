use std::fmt;

/// Error classes user code can raise, named the way tutorial readers expect to see them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    SyntaxError,
    IndentationError,
    ValueError,
    NameError,
    TypeError,
    ZeroDivisionError,
    IndexError,
    AttributeError,
    OverflowError,
    RecursionError,
    EOFError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::IndentationError => "IndentationError",
            ErrorKind::ValueError => "ValueError",
            ErrorKind::NameError => "NameError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ZeroDivisionError => "ZeroDivisionError",
            ErrorKind::IndexError => "IndexError",
            ErrorKind::AttributeError => "AttributeError",
            ErrorKind::OverflowError => "OverflowError",
            ErrorKind::RecursionError => "RecursionError",
            ErrorKind::EOFError => "EOFError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    pub line: usize,
    /// Input ended where more was expected; console mode waits for further lines.
    pub incomplete: bool,
}

impl CompileError {
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        CompileError {
            kind: ErrorKind::SyntaxError,
            message: message.into(),
            line,
            incomplete: false,
        }
    }

    pub fn incomplete(line: usize, message: impl Into<String>) -> Self {
        CompileError {
            incomplete: true,
            ..CompileError::syntax(line, message)
        }
    }

    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (line {})", self.kind, self.message, self.line)
    }
}

impl std::error::Error for CompileError {}

/// A call frame recorded while a runtime error unwinds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub function: String,
    pub line: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    /// Innermost frame last.
    pub frames: Vec<Frame>,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        RuntimeError {
            kind,
            message: message.into(),
            frames: Vec::new(),
        }
    }

    pub fn line(&self) -> usize {
        self.frames.last().map_or(0, |f| f.line)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RuntimeError {}

fn source_line(source: &str, line: usize) -> Option<&str> {
    line.checked_sub(1)
        .and_then(|i| source.lines().nth(i))
        .map(str::trim)
        .filter(|l| !l.is_empty())
}

/// Short form shown to learners: the line, the code on it, and the error.
pub fn render_compile_error(err: &CompileError, source: &str, friendly: bool) -> String {
    let mut out = String::new();
    if friendly {
        out.push_str(&format!("Error on line {}:\n", err.line));
    } else {
        out.push_str(&format!("  File \"User's code\", line {}\n", err.line));
    }
    if let Some(code) = source_line(source, err.line) {
        out.push_str(&format!("    {code}\n"));
    }
    out.push_str(&format!("{}: {}\n", err.kind, err.message));
    out
}

/// Runtime error as a traceback. The friendly form keeps only the innermost user frame.
pub fn render_runtime_error(err: &RuntimeError, source: &str, friendly: bool) -> String {
    let mut out = String::new();
    if friendly {
        if let Some(frame) = err.frames.last() {
            out.push_str(&format!("Error on line {}:\n", frame.line));
            if let Some(code) = source_line(source, frame.line) {
                out.push_str(&format!("    {code}\n"));
            }
        }
    } else {
        out.push_str("Traceback (most recent call last):\n");
        for frame in &err.frames {
            out.push_str(&format!(
                "  File \"User's code\", line {}, in {}\n",
                frame.line, frame.function
            ));
            if let Some(code) = source_line(source, frame.line) {
                out.push_str(&format!("    {code}\n"));
            }
        }
    }
    out.push_str(&format!("{}: {}\n", err.kind, err.message));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friendly_runtime_error_shows_innermost_line() {
        let err = RuntimeError {
            kind: ErrorKind::ZeroDivisionError,
            message: "division by zero".into(),
            frames: vec![
                Frame { function: "<module>".into(), line: 3 },
                Frame { function: "f".into(), line: 2 },
            ],
        };
        let source = "def f():\n    return 1/0\nf()";
        assert_eq!(
            render_runtime_error(&err, source, true),
            "Error on line 2:\n    return 1/0\nZeroDivisionError: division by zero\n"
        );
        let raw = render_runtime_error(&err, source, false);
        assert!(raw.starts_with("Traceback (most recent call last):\n"));
        assert!(raw.contains("line 3, in <module>\n    f()\n"), "got: {raw}");
    }
}
