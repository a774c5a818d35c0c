use html::{escape_attr, escape_text};

/// Shown for paths containing `/../` and for files that cannot be opened. The
/// requested path is interpolated as received.
pub fn illegal_path_page(path: &str) -> String {
    format!(
        r#"<html>
<head>
<title>Illegal path, page not found.</title>
</head>
<body>
<h1>Illegal Path, Page not Found</h1>
<p>The page you requested could not be opened. This could be for one of a
number of reasons, including:</p>
<ul>
<li>The page doesn't exist</li>
<li>The path you requested was illegal, for example one containing the .. path modifier.</li>
</ul>
<p>The path you requested was: <b>{path}</b></p>
</body>
</html>
"#
    )
}

/// Listing of `entries`, which are file names with directories suffixed by `/`.
pub fn directory_listing(entries: &[String]) -> String {
    let mut items = String::new();
    for entry in entries {
        items.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            escape_attr(entry),
            escape_text(entry)
        ));
    }
    format!(
        r#"<html>
<head>
<title>Directory Listing</title>
</head>
<body>
<ul>
<li><a href="../">..</a></li>
{items}</ul>
</body>
</html>
"#
    )
}
