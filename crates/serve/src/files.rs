//! Maps request paths onto files under the server root.
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use markup::{AssembleOptions, PageAssembler};

use crate::error::ServeError;
use crate::response::{Response, content_type};
use crate::templates::{directory_listing, illegal_path_page};

/// Served in place of a listing when present, in this order.
pub const DEFAULT_PAGES: &[&str] = &["index.htm", "index.html"];

/// What a request path names.
#[derive(Debug, PartialEq, Eq)]
pub enum Target {
    /// A directory requested without its trailing slash.
    Redirect(String),
    Directory(PathBuf),
    File(PathBuf),
}

/// Resolves `path` (as requested, starting with `/`) under `root`.
pub fn resolve(path: &str, root: &Path) -> Result<Target, ServeError> {
    if path.contains("/../") {
        return Err(ServeError::IllegalPath(path.to_string()));
    }
    let mut full = root.to_path_buf();
    for component in Path::new(path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => full.push(part),
            Component::CurDir => {}
            // A trailing `..` or an absolute part would leave the root.
            _ => return Err(ServeError::IllegalPath(path.to_string())),
        }
    }
    if full.is_dir() {
        if !path.ends_with('/') {
            return Ok(Target::Redirect(format!("{path}/")));
        }
        return Ok(Target::Directory(full));
    }
    if !full.is_file() {
        return Err(ServeError::NotFound(path.to_string()));
    }
    Ok(Target::File(full))
}

fn is_page(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
}

/// Sorted child names, directories suffixed with `/`.
fn list_dir(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() {
            name.push('/');
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

fn serve_file(
    file: &Path,
    url: &str,
    assembler: &PageAssembler,
) -> Result<Response, ServeError> {
    let bytes = fs::read(file).map_err(|err| ServeError::io(url, &err))?;
    if is_page(file) {
        let body = assembler.render(&bytes, url, AssembleOptions::default());
        return Ok(Response::html(body));
    }
    Ok(Response::ok(content_type(&file.to_string_lossy()), bytes))
}

fn serve_directory(
    dir: &Path,
    url: &str,
    assembler: &PageAssembler,
) -> Result<Response, ServeError> {
    let entries = list_dir(dir).map_err(|err| ServeError::io(url, &err))?;
    for default in DEFAULT_PAGES {
        if entries.iter().any(|e| e == default) {
            return serve_file(&dir.join(default), &format!("{url}{default}"), assembler);
        }
    }
    Ok(Response::html(directory_listing(&entries)))
}

fn respond(path: &str, root: &Path, assembler: &PageAssembler) -> Result<Response, ServeError> {
    match resolve(path, root)? {
        Target::Redirect(location) => Ok(Response::redirect(&location)),
        Target::Directory(dir) => serve_directory(&dir, path, assembler),
        Target::File(file) => serve_file(&file, path, assembler),
    }
}

/// Response for a GET of `path`. Every failure looks the same to the client.
pub fn path_to_response(path: &str, root: &Path, assembler: &PageAssembler) -> Response {
    match respond(path, root, assembler) {
        Ok(response) => response,
        Err(err) => {
            log::debug!(target: "serve", "{err}");
            Response::html(illegal_path_page(err.path())).with_status(404)
        }
    }
}
