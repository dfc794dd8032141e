//! Context relative path handling.
//!
//! Every entity in a validation context is addressed by a `/` separated path relative to the
//! context root (`docs/guide.md`, `docs/guide.md#installation`, `images`). [`PathHelper`] turns
//! the raw destinations found in markdown into those keys, and validates paths handed to the
//! public API.

pub mod path;

pub use path::{
    html_alias, join_normalized, normalize_os_path, os_path_to_string, parent_dir, split_anchor,
    to_anchor,
};

use std::path::{Path, PathBuf};

use crate::error::XrefError;

/// Outcome of resolving a reference found in a markdown file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathProcessingResult {
    /// Context relative key of the referenced entity
    Ok(String),
    /// The path leaves the context root
    NotInContext,
    /// The reference is an absolute url
    IsUrl,
    /// Absolute, home relative or drive letter paths only make sense on one machine
    IsFsSpecific,
}

#[derive(Debug, Clone)]
pub struct PathHelper {
    root: PathBuf,
}

impl PathHelper {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        PathHelper {
            root: normalize_os_path(root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `/` and `~` prefixes as well as windows drive letters (`C:`) are specific to one file system.
    pub fn is_fs_specific(path: &str) -> bool {
        if path.starts_with('/') || path.starts_with('~') {
            return true;
        }
        path.as_bytes().get(1) == Some(&b':')
    }

    /// Resolve `reference`, as written in the file at the context relative path `source_file`.
    pub fn process_relative_path(&self, source_file: &str, reference: &str) -> PathProcessingResult {
        if reference.contains("://") {
            return PathProcessingResult::IsUrl;
        }
        if PathHelper::is_fs_specific(reference) {
            return PathProcessingResult::IsFsSpecific;
        }

        let resolved = if reference.starts_with('#') {
            Some(format!("{source_file}{reference}"))
        } else if reference == "." {
            Some(parent_dir(source_file).to_string())
        } else {
            join_normalized(parent_dir(source_file), reference)
        };

        match resolved {
            Some(key) => PathProcessingResult::Ok(key),
            None => PathProcessingResult::NotInContext,
        }
    }

    /// Strip the root from a normalized full path.
    pub fn context_relative_path(&self, full_path: &Path) -> Option<String> {
        full_path
            .strip_prefix(&self.root)
            .ok()
            .map(os_path_to_string)
    }

    /// Resolve `path` (absolute, or relative to the root) into its full and context relative forms.
    ///
    /// Paths outside the root are a contract violation of the caller.
    pub fn ensure_path_is_valid_for_context<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<(PathBuf, String), XrefError> {
        let full_path = normalize_os_path(self.root.join(path.as_ref()));
        match self.context_relative_path(&full_path) {
            Some(relative) => Ok((full_path, relative)),
            None => Err(XrefError::PathNotInContext(format!(
                "{}",
                path.as_ref().display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn helper() -> PathHelper {
        PathHelper::new("/work/docs")
    }

    #[test]
    fn urls_and_fs_specific_paths() {
        let h = helper();
        assert_eq!(
            h.process_relative_path("a.md", "https://example.com/x"),
            PathProcessingResult::IsUrl
        );
        assert_eq!(
            h.process_relative_path("a.md", "/etc/passwd"),
            PathProcessingResult::IsFsSpecific
        );
        assert_eq!(
            h.process_relative_path("a.md", "~/notes.md"),
            PathProcessingResult::IsFsSpecific
        );
        assert_eq!(
            h.process_relative_path("a.md", "C:\\notes.md"),
            PathProcessingResult::IsFsSpecific
        );
    }

    #[test]
    fn relative_references() {
        let h = helper();
        assert_eq!(
            h.process_relative_path("guide/a.md", "#Intro"),
            PathProcessingResult::Ok("guide/a.md#Intro".to_string())
        );
        assert_eq!(
            h.process_relative_path("guide/a.md", "."),
            PathProcessingResult::Ok("guide".to_string())
        );
        assert_eq!(
            h.process_relative_path("guide/a.md", "../b.md#top"),
            PathProcessingResult::Ok("b.md#top".to_string())
        );
        assert_eq!(
            h.process_relative_path("a.md", "../b.md"),
            PathProcessingResult::NotInContext
        );
    }

    #[test]
    fn ensure_path_is_valid() {
        let h = helper();
        let (full, rel) = h.ensure_path_is_valid_for_context("guide/a.md").unwrap();
        assert_eq!(full, PathBuf::from("/work/docs/guide/a.md"));
        assert_eq!(rel, "guide/a.md");

        let (_, rel) = h
            .ensure_path_is_valid_for_context("/work/docs/guide/../b.md")
            .unwrap();
        assert_eq!(rel, "b.md");

        let (_, rel) = h.ensure_path_is_valid_for_context("/work/docs").unwrap();
        assert_eq!(rel, "");

        assert!(matches!(
            h.ensure_path_is_valid_for_context("../elsewhere.md"),
            Err(XrefError::PathNotInContext(_))
        ));
        assert!(h.ensure_path_is_valid_for_context("/work/docsx/a.md").is_err());
    }
}
