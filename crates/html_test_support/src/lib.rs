/// Readable report of the first difference between two line lists.
pub fn diff_lines(expected: &[String], actual: &[String]) -> String {
    let max = expected.len().max(actual.len());
    let mut out = String::new();
    use std::fmt::Write;
    let mut mismatch = None;
    let missing = "<missing>";
    for i in 0..max {
        let left = expected.get(i).map(String::as_str).unwrap_or(missing);
        let right = actual.get(i).map(String::as_str).unwrap_or(missing);
        if left != right {
            mismatch = Some(i);
            break;
        }
    }
    if let Some(i) = mismatch {
        let start = i.saturating_sub(2);
        let end = (i + 3).min(max);
        let _ = writeln!(
            &mut out,
            "first mismatch at line {} (showing {}..={}):",
            i + 1,
            start + 1,
            end
        );
        for line_idx in start..end {
            let left = expected
                .get(line_idx)
                .map(String::as_str)
                .unwrap_or(missing);
            let right = actual.get(line_idx).map(String::as_str).unwrap_or(missing);
            let marker = if line_idx == i { ">" } else { " " };
            let _ = writeln!(&mut out, "{marker} {:>4}  expected: {left}", line_idx + 1);
            let _ = writeln!(&mut out, "{marker} {:>4}    actual: {right}", line_idx + 1);
        }
    }
    if expected.len() != actual.len() && mismatch.is_none() {
        let _ = writeln!(
            &mut out,
            "prefix matched but lengths differ (expected {} lines, actual {} lines)",
            expected.len(),
            actual.len()
        );
    }
    let _ = writeln!(
        &mut out,
        "expected {} lines, actual {} lines",
        expected.len(),
        actual.len()
    );
    out
}

/// Pages exercising the sanitizer and dispatcher: nested removals, rawtext, styles,
/// directive-bearing `pre` elements and malformed markup.
pub const SAMPLE_PAGES: &[&str] = &[
    "<div><script>evil()</script>Hello<b>World</b></div>",
    "<a href=\"JAVASCRIPT:alert(1)\">x</a>",
    "<html><head><title>T</title><style>p { color: red }</style></head><body><p style=\"background: url(x)\">a</p></body></html>",
    "<p>1<form>2<button onclick=\"f()\">3</button>4<i>5</i>6</form>7</p>",
    "<body><pre title=\"editor\">x = 1</pre><pre>print(2)</pre><pre title=\"Unknown thing\">y</pre></body>",
    "<ul><li>one<li>two<iframe src=\"x\">hidden</iframe></ul><p>unclosed <em>em",
    "<html><head><link rel=\"stylesheet\" type=\"text/css\" href=\"/a.css\"><meta name=\"menu\" content=\"x\"></head><body><object>o<param name=a></object>t</body></html>",
    "text only &amp; entities &#60;",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_lines_points_at_first_mismatch() {
        let expected = vec!["a".to_string(), "b".to_string()];
        let actual = vec!["a".to_string(), "c".to_string()];
        let out = diff_lines(&expected, &actual);
        assert!(out.contains("first mismatch at line 2"), "got: {out}");
    }
}
