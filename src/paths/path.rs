use std::{
    borrow::Cow,
    path::{Component, Path, PathBuf},
};

/// Utility function to replace separators and convert to unicode (via to_string_lossy) on os path.
///
/// Root and prefix components are dropped, so the result is always a `/` separated relative string.
pub fn os_path_to_string<P: AsRef<Path>>(os_path_ref: P) -> String {
    let res = os_path_ref
        .as_ref()
        .components()
        .filter_map(|c| match c {
            Component::RootDir | Component::Prefix(_) => None,
            _ => Some(c.as_os_str().to_string_lossy()),
        })
        .collect::<Vec<Cow<'_, str>>>()
        .join("/");
    tracing::trace!(
        "os_path_to_string: turned {:?} into {}",
        os_path_ref.as_ref(),
        res
    );
    res
}

/// Lexically resolve `.` and `..` components of an os path, without touching the file system.
pub fn normalize_os_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.as_ref().components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            _ => normalized.push(component.as_os_str()),
        }
    }
    normalized
}

/// Turn a heading title into a regularized (GitHub flavoured) anchor string
pub fn to_anchor(title: &str) -> String {
    title
        .trim()
        .to_lowercase()
        .replace(char::is_whitespace, "-")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

/// Split `dir/file.md#anchor` into (`dir/file.md`, `Some("anchor")`).
pub fn split_anchor(path: &str) -> (&str, Option<&str>) {
    match path.find('#') {
        Some(idx) => (&path[..idx], Some(&path[idx + 1..])),
        None => (path, None),
    }
}

/// The directory part of a context relative path. Returns "" for files at the root.
pub fn parent_dir(path: &str) -> &str {
    let (filepath, _) = split_anchor(path);
    match filepath.rfind('/') {
        Some(idx) => &filepath[..idx],
        None => "",
    }
}

/// Join a reference onto a context relative directory and resolve `.` and `..`.
///
/// Returns `None` when the result would escape the context root. Anything after the first `#`
/// is carried over untouched.
pub fn join_normalized(dir: &str, reference: &str) -> Option<String> {
    let (filepath, anchor) = split_anchor(reference);
    let mut components: Vec<&str> = Vec::new();
    for part in dir.split('/').chain(filepath.split('/')) {
        match part {
            "" | "." => {}
            ".." => {
                components.pop()?;
            }
            _ => components.push(part),
        }
    }
    let joined = components.join("/");
    Some(match anchor {
        Some(anchor) => format!("{joined}#{anchor}"),
        None => joined,
    })
}

/// Swap the file extension of a context relative path for `.html`.
///
/// Paths without an extension get `.html` appended, matching how rendered sites address them.
pub fn html_alias(path: &str) -> String {
    let file_start = path.rfind('/').map(|idx| idx + 1).unwrap_or(0);
    match path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => format!("{}.html", &path[..file_start + dot]),
        _ => format!("{path}.html"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_anchor() {
        assert_eq!(to_anchor("Title"), "title");
        assert_eq!(to_anchor("  Getting Started  "), "getting-started");
        assert_eq!(to_anchor("What's new? (v2)"), "whats-new-v2");
        assert_eq!(to_anchor("snake_case heading"), "snake_case-heading");
    }

    #[test]
    fn test_split_anchor() {
        assert_eq!(split_anchor("a.md#title"), ("a.md", Some("title")));
        assert_eq!(split_anchor("a.md"), ("a.md", None));
        assert_eq!(split_anchor("#top"), ("", Some("top")));
        assert_eq!(split_anchor("a.md#x#y"), ("a.md", Some("x#y")));
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("docs/guide/a.md"), "docs/guide");
        assert_eq!(parent_dir("a.md"), "");
        assert_eq!(parent_dir("docs/a.md#x/y"), "docs");
    }

    #[test]
    fn test_join_normalized() {
        assert_eq!(join_normalized("docs", "b.md").as_deref(), Some("docs/b.md"));
        assert_eq!(join_normalized("docs", "../b.md").as_deref(), Some("b.md"));
        assert_eq!(
            join_normalized("docs/guide", "./../api/x.md#Intro").as_deref(),
            Some("docs/api/x.md#Intro")
        );
        assert_eq!(join_normalized("", "sub/").as_deref(), Some("sub"));
        assert_eq!(join_normalized("", "../outside.md"), None);
        assert_eq!(join_normalized("docs", "../../outside.md"), None);
    }

    #[test]
    fn test_html_alias() {
        assert_eq!(html_alias("docs/a.md"), "docs/a.html");
        assert_eq!(html_alias("README"), "README.html");
        assert_eq!(html_alias("v1.2/notes"), "v1.2/notes.html");
        assert_eq!(html_alias(".hidden"), ".hidden.html");
    }

    #[test]
    fn test_normalize_os_path() {
        assert_eq!(
            normalize_os_path("/root/docs/./guide/../a.md"),
            PathBuf::from("/root/docs/a.md")
        );
        assert_eq!(os_path_to_string(Path::new("docs/a.md")), "docs/a.md");
    }
}
