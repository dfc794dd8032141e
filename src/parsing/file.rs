use std::{fmt, path::PathBuf, sync::Arc};

use super::result::{ParsingResult, ParsingResultDiff};
use crate::{config::Pipeline, paths::html_alias};

/// Arena index of a markdown file within one validation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file#{}", self.0)
    }
}

/// A markdown file and its latest parse. The identity survives updates; only the
/// [`ParsingResult`] is replaced.
#[derive(Debug)]
pub struct MarkdownFile {
    pub id: FileId,
    pub full_path: PathBuf,
    pub relative_path: String,
    pub html_path: String,
    result: ParsingResult,
}

impl MarkdownFile {
    pub fn new(
        id: FileId,
        full_path: PathBuf,
        relative_path: &str,
        source: &str,
        pipeline: &Pipeline,
    ) -> Self {
        let result = pipeline
            .parsers
            .parse(pipeline, id, relative_path, Arc::from(source));
        MarkdownFile {
            id,
            full_path,
            relative_path: relative_path.to_string(),
            html_path: html_alias(relative_path),
            result,
        }
    }

    pub fn result(&self) -> &ParsingResult {
        &self.result
    }

    pub fn result_mut(&mut self) -> &mut ParsingResult {
        &mut self.result
    }

    pub fn source(&self) -> &str {
        &self.result.source
    }

    /// Parse new content, returning what changed relative to the previous parse.
    pub fn update(&mut self, source: &str, pipeline: &Pipeline) -> ParsingResultDiff {
        self.replace_result(Arc::from(source), pipeline)
    }

    /// Parse the current content again, picking up newly cached web results.
    pub fn reparse(&mut self, pipeline: &Pipeline) -> ParsingResultDiff {
        let source = self.result.source.clone();
        self.replace_result(source, pipeline)
    }

    fn replace_result(&mut self, source: Arc<str>, pipeline: &Pipeline) -> ParsingResultDiff {
        let result = pipeline
            .parsers
            .parse(pipeline, self.id, &self.relative_path, source);
        let diff = ParsingResultDiff::diff(&self.result, &result);
        self.result = result;
        diff
    }
}
