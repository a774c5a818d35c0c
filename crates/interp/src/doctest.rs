//! Runs `>>>` examples against a namespace and summarizes the outcome.
use bus::Stream;
use bus::{CaptureIo, Stdio};

use crate::error::{render_compile_error, render_runtime_error};
use crate::eval::Interpreter;
use crate::namespace::Namespace;
use crate::parser::parse;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Example {
    pub source: String,
    pub want: String,
    /// Line of the `>>>` prompt within the test text.
    pub line: usize,
}

/// Splits doctest text into examples. Text outside `>>>` blocks is ignored.
pub fn parse_examples(text: &str) -> Vec<Example> {
    let mut examples = Vec::new();
    let mut lines = text.lines().enumerate().peekable();
    while let Some((idx, line)) = lines.next() {
        let trimmed = line.trim_start();
        let Some(first) = prompt_body(trimmed, ">>>") else {
            continue;
        };
        let indent = line.len() - trimmed.len();
        let mut source = first.to_string();
        while let Some((_, next)) = lines.peek() {
            match prompt_body(next.trim_start(), "...") {
                Some(cont) => {
                    source.push('\n');
                    source.push_str(cont);
                    lines.next();
                }
                None => break,
            }
        }
        let mut want = String::new();
        while let Some((_, next)) = lines.peek() {
            let body = next.trim_start();
            if body.is_empty() || prompt_body(body, ">>>").is_some() {
                break;
            }
            let strip = indent.min(next.len() - body.len());
            want.push_str(&next[strip..]);
            want.push('\n');
            lines.next();
        }
        examples.push(Example {
            source,
            want,
            line: idx + 1,
        });
    }
    examples
}

fn prompt_body<'t>(line: &'t str, prompt: &str) -> Option<&'t str> {
    let rest = line.strip_prefix(prompt)?;
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix(' ')
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub example: Example,
    pub got: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DoctestReport {
    pub attempted: usize,
    pub failures: Vec<Failure>,
}

impl DoctestReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// Message for the learner and whether it belongs on stdout.
    pub fn render(&self, friendly: bool) -> (String, bool) {
        if self.passed() {
            let message = if friendly {
                format!(
                    "Congratulations, your code passed all ({}) tests!\n",
                    self.attempted
                )
            } else {
                format!("{} tests passed.\n", self.attempted)
            };
            return (message, true);
        }
        let mut out = String::new();
        let failures = if friendly {
            &self.failures[..1]
        } else {
            &self.failures[..]
        };
        for failure in failures {
            if !friendly {
                out.push_str(&"*".repeat(70));
                out.push('\n');
                out.push_str(&format!("Line {}, in doctest\n", failure.example.line));
            }
            out.push_str("Failed example:\n");
            push_indented(&mut out, &failure.example.source);
            if failure.example.want.is_empty() {
                out.push_str("Expected nothing\n");
            } else {
                out.push_str("Expected:\n");
                push_indented(&mut out, &failure.example.want);
            }
            if failure.got.is_empty() {
                out.push_str("Got nothing\n");
            } else {
                out.push_str("Got:\n");
                push_indented(&mut out, &failure.got);
            }
        }
        if friendly {
            out.push_str(&format!(
                "{} of {} tests failed.\n",
                self.failures.len(),
                self.attempted
            ));
        } else {
            out.push_str(&"*".repeat(70));
            out.push('\n');
            out.push_str(&format!("***Test Failed*** {} failures.\n", self.failures.len()));
        }
        (out, false)
    }
}

fn push_indented(out: &mut String, text: &str) {
    for line in text.lines() {
        out.push_str("    ");
        out.push_str(line);
        out.push('\n');
    }
}

fn normalize(text: &str) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    lines.join("\n").trim_end_matches('\n').to_string()
}

/// Exception examples match on their final `Kind: message` line.
fn matches(want: &str, got: &str) -> bool {
    let want = normalize(want);
    let got = normalize(got);
    if want.starts_with("Traceback (most recent call last):") {
        return want.lines().last() == got.lines().last();
    }
    want == got
}

/// Runs every example in order against `namespace`; output is captured, never streamed.
pub fn run_examples(examples: &[Example], namespace: &Namespace) -> DoctestReport {
    let mut report = DoctestReport::default();
    for example in examples {
        report.attempted += 1;
        let mut io = CaptureIo::new();
        match parse(&example.source) {
            Ok(program) => {
                let result = Interpreter::new(namespace, &mut io)
                    .echo_expressions(true)
                    .run(&program);
                if let Err(err) = result {
                    let rendered = render_runtime_error(&err, &example.source, false);
                    io.write(Stream::Stderr, &rendered);
                }
            }
            Err(err) => io.write(
                Stream::Stderr,
                &render_compile_error(&err, &example.source, false),
            ),
        }
        let got = io.text();
        if !matches(&example.want, &got) {
            log::trace!(target: "interp.doctest", "example on line {} failed", example.line);
            report.failures.push(Failure {
                example: example.clone(),
                got,
            });
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    const TESTS: &str = "\
Some prose.

    >>> add(1, 2)
    3
    >>> for i in range(2):
    ...     print(i)
    0
    1
    >>> add(1, 'x')
    Traceback (most recent call last):
        ...
    TypeError: unsupported operand type(s) for +: 'int' and 'str'
";

    fn namespace_with_add() -> Namespace {
        let ns = Namespace::new();
        let program = parse("def add(a, b):\n    return a + b\n").expect("parse");
        let mut io = CaptureIo::new();
        Interpreter::new(&ns, &mut io).run(&program).expect("run");
        ns
    }

    #[test]
    fn examples_are_split_with_continuations() {
        let examples = parse_examples(TESTS);
        assert_eq!(examples.len(), 3);
        assert_eq!(examples[0].want, "3\n");
        assert_eq!(examples[1].source, "for i in range(2):\n    print(i)");
        assert_eq!(examples[1].want, "0\n1\n");
        assert_eq!(examples[0].line, 3);
    }

    #[test]
    fn passing_run_renders_congratulations() {
        let report = run_examples(&parse_examples(TESTS), &namespace_with_add());
        assert!(report.passed(), "{report:?}");
        assert_eq!(
            report.render(true),
            ("Congratulations, your code passed all (3) tests!\n".to_string(), true)
        );
    }

    #[test]
    fn failure_shows_expected_and_got() {
        let ns = Namespace::new();
        let report = run_examples(&parse_examples(">>> 1 + 1\n3\n>>> 2\n2\n"), &ns);
        assert_eq!(report.attempted, 2);
        assert_eq!(report.failures.len(), 1);
        let (message, to_stdout) = report.render(true);
        assert!(!to_stdout);
        assert_eq!(
            message,
            "Failed example:\n    1 + 1\nExpected:\n    3\nGot:\n    2\n1 of 2 tests failed.\n"
        );
        let (raw, _) = report.render(false);
        assert!(raw.ends_with("***Test Failed*** 1 failures.\n"));
    }
}
