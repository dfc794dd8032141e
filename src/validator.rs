use std::{fs::read_to_string, path::Path, sync::Arc};
use walkdir::WalkDir;

use crate::{
    config::{Config, Pipeline},
    context::ValidationContext,
    error::XrefError,
    paths::PathHelper,
    pending::CancellationToken,
    report::ValidationReport,
    webio::WebBackend,
};

/// Path checking front end of a [`ValidationContext`].
///
/// Accepts absolute paths or paths relative to the configured root. Paths outside the root are
/// a caller bug and fail with [`XrefError::PathNotInContext`]; everything else is forwarded.
pub struct MarkdownContextValidator {
    context: ValidationContext,
    path_helper: PathHelper,
}

impl MarkdownContextValidator {
    pub fn new(config: Config) -> Result<Self, XrefError> {
        Ok(MarkdownContextValidator::from_pipeline(Pipeline::new(config)?))
    }

    pub fn with_backend(config: Config, backend: Arc<dyn WebBackend>) -> Result<Self, XrefError> {
        Ok(MarkdownContextValidator::from_pipeline(
            Pipeline::with_backend(config, backend)?,
        ))
    }

    fn from_pipeline(pipeline: Pipeline) -> Self {
        MarkdownContextValidator {
            path_helper: pipeline.path_helper.clone(),
            context: ValidationContext::with_pipeline(pipeline),
        }
    }

    pub fn context(&self) -> &ValidationContext {
        &self.context
    }

    pub fn add_markdown_file<P: AsRef<Path>>(&self, path: P, source: &str) -> Result<bool, XrefError> {
        let (full_path, relative_path) = self.path_helper.ensure_path_is_valid_for_context(path)?;
        Ok(self
            .context
            .add_markdown_file(full_path, &relative_path, source))
    }

    pub fn update_markdown_file<P: AsRef<Path>>(
        &self,
        path: P,
        source: &str,
    ) -> Result<bool, XrefError> {
        let (_, relative_path) = self.path_helper.ensure_path_is_valid_for_context(path)?;
        Ok(self.context.update_markdown_file(&relative_path, source))
    }

    pub fn add_entity<P: AsRef<Path>>(&self, path: P) -> Result<bool, XrefError> {
        let (_, relative_path) = self.path_helper.ensure_path_is_valid_for_context(path)?;
        Ok(self.context.index_entity(&relative_path))
    }

    pub fn remove_entity<P: AsRef<Path>>(&self, path: P) -> Result<bool, XrefError> {
        let (_, relative_path) = self.path_helper.ensure_path_is_valid_for_context(path)?;
        Ok(self.context.remove_entity_from_index(&relative_path))
    }

    /// Index everything below `directory`: markdown files are parsed and added, directories and
    /// other files become plain entities. Hidden entries are skipped. Returns the number of
    /// markdown files added.
    pub fn index_directory<P: AsRef<Path>>(&self, directory: P) -> Result<usize, XrefError> {
        let (full_path, _) = self.path_helper.ensure_path_is_valid_for_context(directory)?;
        let parsing = &self.context.config().parsing;
        let mut added = 0;

        let walker = WalkDir::new(&full_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
            });
        for entry in walker {
            let entry = entry?;
            let Some(relative_path) = self.path_helper.context_relative_path(entry.path()) else {
                continue;
            };
            if relative_path.is_empty() {
                continue;
            }
            if entry.file_type().is_file() && parsing.is_markdown_file(entry.path()) {
                let source = read_to_string(entry.path())?;
                if self
                    .context
                    .add_markdown_file(entry.path(), &relative_path, &source)
                {
                    added += 1;
                }
            } else {
                self.context.index_entity(&relative_path);
            }
        }
        tracing::info!(
            "[Validator] Indexed {} markdown files below {}",
            added,
            full_path.display()
        );
        Ok(added)
    }

    /// Non-blocking validation; check [`ValidationReport::is_complete`].
    pub fn validate(&self) -> ValidationReport {
        self.context.validate(false, None)
    }

    pub fn validate_fully(&self, cancellation: Option<&CancellationToken>) -> ValidationReport {
        self.context.validate(true, cancellation)
    }

    pub fn clear(&self) {
        self.context.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::*;
    use test_log::test;

    #[test]
    fn paths_are_checked_against_the_root() {
        let validator = MarkdownContextValidator::new(offline_config()).unwrap();
        assert_eq!(validator.add_markdown_file("/ctx/docs/a.md", "[b](b.md)"), Ok(true));
        assert_eq!(validator.add_markdown_file("docs/a.md", ""), Ok(false));
        assert_eq!(validator.add_entity("docs/b.md"), Ok(true));
        assert!(validator.context().is_indexed("docs/b.md"));
        assert!(validator.validate().warnings.is_empty());

        assert!(matches!(
            validator.add_markdown_file("/elsewhere/a.md", ""),
            Err(XrefError::PathNotInContext(_))
        ));
        assert!(matches!(
            validator.remove_entity("../b.md"),
            Err(XrefError::PathNotInContext(_))
        ));

        assert_eq!(validator.remove_entity("/ctx/docs/b.md"), Ok(true));
        assert_eq!(validator.validate_fully(None).error_count(), 1);
        validator.clear();
        assert_eq!(validator.context().markdown_file_count(), 0);
    }
}
