use std::sync::Arc;

use super::{
    file::FileId,
    result::{normalize_label, ParsingResult, Reference, ReferenceDefinition},
};
use crate::{
    config::Pipeline,
    paths::{html_alias, PathProcessingResult},
    pending::PendingOperation,
    warnings::{line_of, SourceSpan, Warning, WarningId, WarningLocation, WarningSource},
    webio::WebIoController,
};

/// What a parser plugin sees while handling one file.
///
/// Plugins are shared between files and hold no state of their own. Everything a plugin learns
/// about a file goes through this context into the file's [`ParsingResult`].
pub struct ParsingContext<'a> {
    pub file: FileId,
    pub relative_path: &'a str,
    pub html_path: String,
    pub source: &'a str,
    pub pipeline: &'a Pipeline,
    pub(crate) warning_source: WarningSource,
    result: &'a mut ParsingResult,
}

impl<'a> ParsingContext<'a> {
    pub fn new(
        file: FileId,
        relative_path: &'a str,
        source: &'a str,
        pipeline: &'a Pipeline,
        result: &'a mut ParsingResult,
    ) -> Self {
        ParsingContext {
            file,
            relative_path,
            html_path: html_alias(relative_path),
            source,
            pipeline,
            warning_source: WarningSource::ParsingResultFinalize,
            result,
        }
    }

    pub fn result(&self) -> &ParsingResult {
        self.result
    }

    pub fn result_mut(&mut self) -> &mut ParsingResult {
        self.result
    }

    pub fn line_of(&self, offset: usize) -> usize {
        line_of(&self.result.line_starts, offset)
    }

    pub fn text(&self, span: SourceSpan) -> &'a str {
        self.source.get(span.start..span.end).unwrap_or_default()
    }

    pub fn web_io(&self) -> Arc<WebIoController> {
        self.pipeline.web_io.clone()
    }

    pub fn report_warning(
        &mut self,
        id: WarningId,
        span: SourceSpan,
        value: &str,
        message: impl Into<String>,
    ) {
        let location =
            WarningLocation::from_span(self.relative_path, span, &self.result.line_starts);
        self.result.warnings.push(Warning::new(
            id,
            location,
            value,
            message,
            self.warning_source.clone(),
        ));
    }

    /// Report a warning that applies to the whole file.
    pub fn report_general_warning(&mut self, id: WarningId, value: &str, message: impl Into<String>) {
        self.result.warnings.push(Warning::new(
            id,
            WarningLocation::whole_file(self.relative_path),
            value,
            message,
            self.warning_source.clone(),
        ));
    }

    /// Register a destination found in the file. Urls are kept as-is for the url processor, local
    /// paths are resolved against the file's directory.
    pub fn register_reference(&mut self, raw: &str, span: SourceSpan, is_image: bool) {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return;
        }
        let decoded = trimmed.replace("%20", " ");
        let key = match self
            .pipeline
            .path_helper
            .process_relative_path(self.relative_path, &decoded)
        {
            PathProcessingResult::Ok(key) => key,
            PathProcessingResult::IsUrl => {
                self.push_reference(raw, trimmed.to_string(), span, is_image, true);
                return;
            }
            PathProcessingResult::NotInContext => {
                self.report_warning(
                    WarningId::PathNotInContext,
                    span,
                    raw,
                    format!("Path `{raw}` is not in the validator's working directory"),
                );
                return;
            }
            PathProcessingResult::IsFsSpecific => {
                self.report_warning(
                    WarningId::PathIsFsSpecific,
                    span,
                    raw,
                    format!("`{raw}` is not a relative path to the markdown context"),
                );
                return;
            }
        };
        self.push_reference(raw, key, span, is_image, false);
    }

    /// Register a footnote reference that has no definition in this file.
    pub fn register_footnote_reference(&mut self, label: &str, span: SourceSpan) {
        let key = format!("^{label}");
        self.push_reference(&key, key.clone(), span, false, false);
    }

    fn push_reference(&mut self, raw: &str, key: String, span: SourceSpan, is_image: bool, is_url: bool) {
        let reference = Reference {
            raw: raw.to_string(),
            key,
            span,
            line: self.line_of(span.start),
            file: self.file,
            is_image,
            is_url,
        };
        tracing::trace!(
            "[Parsing] {}: reference `{}` -> `{}`",
            self.relative_path,
            reference.raw,
            reference.key
        );
        self.result.references.push(reference);
    }

    /// Define the heading anchor `{relative_path}#{anchor}`. Returns false if this file already
    /// defines it.
    pub fn add_heading_definition(&mut self, anchor: &str, span: SourceSpan) -> bool {
        let key = format!("{}#{}", self.relative_path, anchor);
        if self.result.has_heading(&key) {
            return false;
        }
        let line = self.line_of(span.start);
        self.result
            .heading_definitions
            .push(ReferenceDefinition::new(key, span, line, self.file));
        true
    }

    /// Record a `[label]: dest` definition. Returns false if the label is already defined.
    pub fn add_local_definition(&mut self, label: &str, span: SourceSpan) -> bool {
        let normalized = normalize_label(label);
        let is_new = !self
            .result
            .local_definitions
            .iter()
            .any(|def| normalize_label(&def.key) == normalized);
        let line = self.line_of(span.start);
        self.result
            .local_definitions
            .push(ReferenceDefinition::new(label, span, line, self.file));
        is_new
    }

    pub fn mark_definition_used(&mut self, label: &str) {
        self.result.used_definitions.insert(normalize_label(label));
    }

    pub fn register_pending_operation(&mut self, operation: PendingOperation) {
        if !operation.is_finished() {
            self.result.pending_operations.push(operation);
        }
    }
}
