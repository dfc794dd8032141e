//! The incremental validation coordinator.
//!
//! A [`ValidationContext`] owns every [`MarkdownFile`] of a context in an arena keyed by
//! [`FileId`], and a case-insensitive map from entity name to its (optional) definition and the
//! set of files referring to it. Entity names are context relative paths (`docs/a.md`), their
//! html aliases (`docs/a.html`) and heading anchors (`docs/a.md#intro`). The empty name, the
//! context root, always exists.
//!
//! Mutations keep the map consistent with the latest parse of every file:
//!
//! - adding or updating a file registers its names and heading anchors, and marks it unfinished;
//! - an update unregisters headings that disappeared and re-queues every reference to them;
//! - removing an entity re-queues every reference to the names it contributed.
//!
//! [`ValidationContext::validate`] then resolves whatever is still unprocessed against the map
//! as it stands at report time, so the order in which files are added does not matter.

use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    path::Path,
    time::Duration,
};

use crate::{
    config::{Config, Pipeline},
    error::XrefError,
    parsing::{FileId, MarkdownFile, ParsingResultDiff, ReferenceDefinition},
    paths::{html_alias, split_anchor},
    pending::{CancellationToken, PendingOperation},
    report::ValidationReport,
    warnings::{Warning, WarningId, WarningLocation, WarningSource},
};

#[derive(Debug)]
struct EntityEntry {
    /// Name as first registered, for case mismatch detection
    name: String,
    /// `None` for entities indexed directly (directories, images, ...)
    owner: Option<FileId>,
    definition: Option<ReferenceDefinition>,
    referrers: BTreeSet<FileId>,
}

#[derive(Debug)]
struct ContextState {
    next_file_id: u32,
    files: BTreeMap<FileId, MarkdownFile>,
    /// Lower cased relative path -> file
    file_ids: HashMap<String, FileId>,
    /// Lower cased entity name -> entry
    entities: HashMap<String, EntityEntry>,
    /// Outstanding operations per file
    pending: BTreeMap<FileId, Vec<PendingOperation>>,
    /// Files whose last refresh found unresolved keys or warnings
    unfinished: BTreeSet<FileId>,
}

impl ContextState {
    fn new() -> Self {
        let mut state = ContextState {
            next_file_id: 0,
            files: BTreeMap::new(),
            file_ids: HashMap::new(),
            entities: HashMap::new(),
            pending: BTreeMap::new(),
            unfinished: BTreeSet::new(),
        };
        state.register_entity("", None, None);
        state
    }

    fn allocate_id(&mut self) -> FileId {
        let id = FileId(self.next_file_id);
        self.next_file_id += 1;
        id
    }

    /// Returns false if an entity with the same (case-insensitive) name exists.
    fn register_entity(
        &mut self,
        name: &str,
        owner: Option<FileId>,
        definition: Option<ReferenceDefinition>,
    ) -> bool {
        let key = name.to_lowercase();
        if self.entities.contains_key(&key) {
            return false;
        }
        tracing::trace!("[ValidationContext] Registering entity `{}`", name);
        self.entities.insert(
            key,
            EntityEntry {
                name: name.to_string(),
                owner,
                definition,
                referrers: BTreeSet::new(),
            },
        );
        true
    }

    /// Remove `name` if `owner` contributed it, re-queueing its referrers other than `ignore`.
    fn unregister_entity(&mut self, name: &str, owner: Option<FileId>, ignore: Option<FileId>) {
        let key = name.to_lowercase();
        match self.entities.get(&key) {
            Some(entry) if entry.owner == owner => {}
            _ => return,
        }
        let Some(entry) = self.entities.remove(&key) else {
            return;
        };
        tracing::trace!(
            "[ValidationContext] Unregistering entity `{}` ({} referrers)",
            entry.name,
            entry.referrers.len()
        );
        for referrer in entry.referrers {
            if Some(referrer) != ignore {
                self.requeue(referrer, &key);
            }
        }
    }

    fn requeue(&mut self, id: FileId, key: &str) {
        let Some(file) = self.files.get_mut(&id) else {
            return;
        };
        if file.result().references_by_key.contains_key(key) {
            file.result_mut().unprocessed.insert(key.to_string());
        }
        self.unfinished.insert(id);
    }

    fn track_pending_operations(&mut self, id: FileId) {
        let operations: Vec<PendingOperation> = self
            .files
            .get(&id)
            .map(|file| file.result().outstanding_operations().cloned().collect())
            .unwrap_or_default();
        if operations.is_empty() {
            self.pending.remove(&id);
        } else {
            self.pending.insert(id, operations);
        }
    }

    fn index_markdown_file(&mut self, file: MarkdownFile) {
        let id = file.id;
        let relative_path = file.relative_path.clone();
        let headings = file.result().heading_definitions.clone();

        self.file_ids.insert(relative_path.to_lowercase(), id);
        self.files.insert(id, file);
        self.register_entity(&relative_path, Some(id), None);
        self.register_entity(&html_alias(&relative_path), Some(id), None);
        for heading in headings {
            let key = heading.key.clone();
            self.register_entity(&key, Some(id), Some(heading));
        }
        self.track_pending_operations(id);
        self.unfinished.insert(id);
    }

    fn apply_diff(&mut self, id: FileId, diff: ParsingResultDiff) {
        for heading in diff.removed_headings.iter() {
            self.unregister_entity(&heading.key, Some(id), Some(id));
        }
        for heading in diff.added_headings {
            let key = heading.key.clone();
            self.register_entity(&key, Some(id), Some(heading));
        }
        for key in diff.removed_reference_keys.iter() {
            if let Some(entry) = self.entities.get_mut(key) {
                entry.referrers.remove(&id);
            }
        }
        // Headings present before and after may have moved
        if let Some(file) = self.files.get(&id) {
            let mut seen = HashSet::new();
            for heading in file.result().heading_definitions.iter() {
                let key = heading.key.to_lowercase();
                if !seen.insert(key.clone()) {
                    continue;
                }
                if let Some(entry) = self.entities.get_mut(&key) {
                    if entry.owner == Some(id) {
                        entry.definition = Some(heading.clone());
                    }
                }
            }
        }
        self.track_pending_operations(id);
        self.unfinished.insert(id);
    }

    fn remove_markdown_file(&mut self, id: FileId) {
        let Some(file) = self.files.remove(&id) else {
            return;
        };
        tracing::debug!(
            "[ValidationContext] Removing markdown file {}",
            file.relative_path
        );
        self.file_ids.remove(&file.relative_path.to_lowercase());
        self.pending.remove(&id);
        self.unfinished.remove(&id);

        self.unregister_entity(&file.relative_path, Some(id), Some(id));
        self.unregister_entity(&file.html_path, Some(id), Some(id));
        for heading in file.result().heading_definitions.iter() {
            self.unregister_entity(&heading.key, Some(id), Some(id));
        }
        for key in file.result().references_by_key.keys() {
            if let Some(entry) = self.entities.get_mut(key) {
                entry.referrers.remove(&id);
            }
        }
    }

    /// Drop finished operations. With `fully`, first block on each outstanding one until it
    /// finishes or `cancellation` fires. Returns the files that saw an operation finish.
    fn settle_pending_operations(
        &mut self,
        fully: bool,
        cancellation: Option<&CancellationToken>,
    ) -> Vec<FileId> {
        let mut finished_any = Vec::new();
        for (id, operations) in self.pending.iter_mut() {
            if fully {
                for operation in operations.iter() {
                    if cancellation.is_some_and(|token| token.is_cancelled())
                        || !operation.wait_cancellable(cancellation)
                    {
                        break;
                    }
                }
            }
            let before = operations.len();
            operations.retain(|operation| !operation.is_finished());
            if operations.len() != before {
                finished_any.push(*id);
            }
        }
        self.pending.retain(|_, operations| !operations.is_empty());
        finished_any
    }

    fn reparse_file(&mut self, id: FileId, pipeline: &Pipeline) {
        let Some(file) = self.files.get_mut(&id) else {
            return;
        };
        tracing::debug!("[ValidationContext] Reparsing {}", file.relative_path);
        let diff = file.reparse(pipeline);
        self.apply_diff(id, diff);
    }

    /// Resolve the file's unprocessed keys against the entity map. Returns whether the file is
    /// finished, and its warnings if it is not.
    fn refresh_file(&mut self, id: FileId) -> (bool, Vec<Warning>) {
        let ContextState {
            files, entities, ..
        } = self;
        let Some(file) = files.get_mut(&id) else {
            return (true, Vec::new());
        };

        let resolved: Vec<String> = file
            .result()
            .unprocessed
            .iter()
            .filter(|key| match entities.get_mut(*key) {
                Some(entry) => {
                    entry.referrers.insert(id);
                    true
                }
                None => false,
            })
            .cloned()
            .collect();
        for key in resolved {
            file.result_mut().unprocessed.remove(&key);
        }

        let result = file.result();
        let mut warnings = Vec::new();
        let mut has_case_mismatch = false;
        for (key, references) in result.references_by_key.iter() {
            let unresolved = result.unprocessed.contains(key);
            for reference in references {
                let location = WarningLocation::from_span(
                    &file.relative_path,
                    reference.span,
                    &result.line_starts,
                );
                if unresolved {
                    let (warning_id, message) = if key.starts_with('^') {
                        (
                            WarningId::UnresolvedFootnoteReference,
                            format!("Unresolved footnote reference `{}`", reference.raw),
                        )
                    } else {
                        (
                            WarningId::UnresolvedReference,
                            format!("Unresolved reference `{}`", reference.raw),
                        )
                    };
                    warnings.push(Warning::new(
                        warning_id,
                        location,
                        &reference.raw,
                        message,
                        WarningSource::ValidationContext,
                    ));
                    continue;
                }

                let (path, _) = split_anchor(&reference.key);
                if path.is_empty() {
                    continue;
                }
                if let Some(entry) = entities.get(&path.to_lowercase()) {
                    if entry.name != path {
                        has_case_mismatch = true;
                        warnings.push(Warning::new(
                            WarningId::FileReferenceCaseMismatch,
                            location,
                            &reference.raw,
                            format!(
                                "`{}` is not an exact case-match for `{}`. This could be a problem on *nix hosts.",
                                path, entry.name
                            ),
                            WarningSource::ValidationContext,
                        ));
                    }
                }
            }
        }

        let finished =
            result.unprocessed.is_empty() && result.warnings.is_empty() && !has_case_mismatch;
        warnings.extend(result.warnings.iter().cloned());
        (finished, warnings)
    }
}

/// Incrementally maintained validation state for one set of markdown files.
///
/// All bookkeeping happens synchronously under one lock. Network work runs on the
/// [`crate::webio::WebIoController`] owned by the context's [`Pipeline`] and is bridged back
/// through [`PendingOperation`]s.
pub struct ValidationContext {
    pipeline: Pipeline,
    state: Mutex<ContextState>,
}

impl ValidationContext {
    pub fn new(config: Config) -> Result<Self, XrefError> {
        Ok(ValidationContext::with_pipeline(Pipeline::new(config)?))
    }

    pub fn with_pipeline(pipeline: Pipeline) -> Self {
        ValidationContext {
            pipeline,
            state: Mutex::new(ContextState::new()),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn config(&self) -> &Config {
        &self.pipeline.config
    }

    /// Whether `name` (a path, html alias or heading anchor) is a known entity.
    pub fn is_indexed(&self, name: &str) -> bool {
        self.state.lock().entities.contains_key(&name.to_lowercase())
    }

    /// The heading that defines `name`, if it is a heading anchor.
    pub fn entity_definition(&self, name: &str) -> Option<ReferenceDefinition> {
        self.state
            .lock()
            .entities
            .get(&name.to_lowercase())
            .and_then(|entry| entry.definition.clone())
    }

    pub fn markdown_file_count(&self) -> usize {
        self.state.lock().files.len()
    }

    /// Files referring to the entity `name`, as of the last validation.
    pub fn referrers_of(&self, name: &str) -> Vec<String> {
        let state = self.state.lock();
        state
            .entities
            .get(&name.to_lowercase())
            .map(|entry| {
                entry
                    .referrers
                    .iter()
                    .filter_map(|id| state.files.get(id))
                    .map(|file| file.relative_path.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Parse and index a new markdown file. Returns false if `relative_path` is already indexed.
    #[tracing::instrument(skip_all)]
    pub fn add_markdown_file<P: AsRef<Path>>(
        &self,
        full_path: P,
        relative_path: &str,
        source: &str,
    ) -> bool {
        let mut state = self.state.lock();
        if state.entities.contains_key(&relative_path.to_lowercase()) {
            tracing::debug!(
                "[ValidationContext] {} is already indexed",
                relative_path
            );
            return false;
        }
        let id = state.allocate_id();
        let file = MarkdownFile::new(
            id,
            full_path.as_ref().to_path_buf(),
            relative_path,
            source,
            &self.pipeline,
        );
        tracing::debug!(
            "[ValidationContext] Added markdown file {} as {}",
            relative_path,
            id
        );
        state.index_markdown_file(file);
        true
    }

    /// Reparse an indexed markdown file with new content. Returns false if it is not indexed.
    #[tracing::instrument(skip_all)]
    pub fn update_markdown_file(&self, relative_path: &str, source: &str) -> bool {
        let mut state = self.state.lock();
        let Some(id) = state.file_ids.get(&relative_path.to_lowercase()).copied() else {
            return false;
        };
        let Some(file) = state.files.get_mut(&id) else {
            return false;
        };
        let diff = file.update(source, &self.pipeline);
        tracing::debug!(
            "[ValidationContext] Updated {}: -{} +{} headings, {} references dropped",
            relative_path,
            diff.removed_headings.len(),
            diff.added_headings.len(),
            diff.removed_reference_keys.len()
        );
        state.apply_diff(id, diff);
        true
    }

    /// Index a non-markdown entity such as a directory or an image. Returns false if it exists.
    pub fn index_entity(&self, relative_path: &str) -> bool {
        self.state.lock().register_entity(relative_path, None, None)
    }

    /// Remove a markdown file or an entity indexed with [`ValidationContext::index_entity`].
    /// Returns false if nothing was removed.
    pub fn remove_entity_from_index(&self, relative_path: &str) -> bool {
        let key = relative_path.to_lowercase();
        let mut state = self.state.lock();
        if let Some(id) = state.file_ids.get(&key).copied() {
            state.remove_markdown_file(id);
            return true;
        }
        match state.entities.get(&key) {
            Some(entry) if entry.owner.is_none() && !key.is_empty() => {
                state.unregister_entity(relative_path, None, None);
                true
            }
            _ => false,
        }
    }

    pub fn clear(&self) {
        tracing::debug!("[ValidationContext] Clearing");
        *self.state.lock() = ContextState::new();
    }

    /// Bring the context up to date and report every warning.
    ///
    /// With `fully`, blocks until all outstanding network work has completed (reparsing files
    /// as their operations finish), or until `cancellation` fires. Without it, never blocks:
    /// operations that already finished are reconciled and the report says how long to wait
    /// before asking again.
    #[tracing::instrument(skip_all)]
    pub fn validate(
        &self,
        fully: bool,
        cancellation: Option<&CancellationToken>,
    ) -> ValidationReport {
        let mut state = self.state.lock();

        loop {
            let finished = state.settle_pending_operations(fully, cancellation);
            for id in finished {
                state.reparse_file(id, &self.pipeline);
            }
            let cancelled = cancellation.is_some_and(|token| token.is_cancelled());
            if !fully || state.pending.is_empty() || cancelled {
                break;
            }
        }

        // Earliest hint among the outstanding operations
        let suggested_wait: Option<Duration> = state
            .pending
            .values()
            .flatten()
            .map(|operation| operation.suggested_wait())
            .min();

        let mut warnings = Vec::new();
        let unfinished: Vec<FileId> = state.unfinished.iter().copied().collect();
        for id in unfinished {
            let (finished, file_warnings) = state.refresh_file(id);
            if finished {
                state.unfinished.remove(&id);
            } else {
                warnings.extend(file_warnings);
            }
        }
        if state.files.is_empty() {
            warnings.push(Warning::new(
                WarningId::EmptyContext,
                WarningLocation::whole_file(""),
                "",
                "No markdown files have been added to the context",
                WarningSource::ValidationContext,
            ));
        }

        let is_complete = state.pending.is_empty();
        tracing::debug!(
            "[ValidationContext] Validated {} files: {} warnings, complete: {}",
            state.files.len(),
            warnings.len(),
            is_complete
        );
        ValidationReport::new(is_complete, suggested_wait, warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::*;
    use test_log::test;

    fn context() -> ValidationContext {
        ValidationContext::with_pipeline(offline_pipeline())
    }

    fn add(ctx: &ValidationContext, path: &str, source: &str) -> bool {
        ctx.add_markdown_file(format!("/ctx/{path}"), path, source)
    }

    #[test]
    fn suggested_wait_is_the_earliest_hint() {
        let ctx = context();
        add(&ctx, "a.md", "# A\n");
        {
            let mut state = ctx.state.lock();
            let id = *state.files.keys().next().unwrap();
            state.pending.insert(
                id,
                vec![
                    PendingOperation::with_suggested_wait(Duration::from_millis(300)),
                    PendingOperation::with_suggested_wait(Duration::from_millis(40)),
                ],
            );
        }
        let report = ctx.validate(false, None);
        assert!(!report.is_complete);
        assert_eq!(report.suggested_wait_ms(), 40);
    }

    #[test]
    fn moved_headings_keep_an_up_to_date_definition() {
        let ctx = context();
        add(&ctx, "a.md", "# Intro\n\n## Usage\n");
        assert_eq!(ctx.entity_definition("a.md#intro").unwrap().line, 0);
        assert_eq!(ctx.entity_definition("a.md#usage").unwrap().line, 2);

        assert!(ctx.update_markdown_file("a.md", "Preamble.\n\n# Intro\n\nText.\n\n## Usage\n"));
        let intro = ctx.entity_definition("A.md#Intro").unwrap();
        assert_eq!(intro.line, 2);
        assert_eq!(intro.span.start, 11);
        assert_eq!(ctx.entity_definition("a.md#usage").unwrap().line, 6);
    }

    #[test]
    fn unresolved_until_entity_is_indexed() {
        let ctx = context();
        assert!(add(&ctx, "a.md", "[Foo](b.md)"));
        let report = ctx.validate(false, None);
        assert!(report.is_complete);
        assert_eq!(ids(&report.warnings), vec![WarningId::UnresolvedReference]);
        assert_eq!(report.warnings[0].location.span.start, 0);
        assert_eq!(report.warnings[0].location.span.end, 11);
        assert_eq!(report.warnings[0].message, "Unresolved reference `b.md`");

        assert!(ctx.index_entity("b.md"));
        assert!(ctx.validate(false, None).warnings.is_empty());
        assert_eq!(ctx.referrers_of("B.md"), vec!["a.md".to_string()]);
    }

    #[test]
    fn duplicate_adds_and_unknown_updates() {
        let ctx = context();
        assert!(add(&ctx, "a.md", "# A\n"));
        assert!(!add(&ctx, "A.md", "# A\n"));
        assert!(!ctx.update_markdown_file("missing.md", ""));
        assert!(!ctx.remove_entity_from_index("missing.md"));
        assert!(!ctx.remove_entity_from_index(""));
        assert!(!ctx.index_entity("a.md"));
        assert!(ctx.is_indexed("a.html"));
        assert!(ctx.is_indexed("a.md#a"));
        assert_eq!(ctx.entity_definition("A.md#A").map(|d| d.line), Some(0));
        assert!(ctx.entity_definition("a.md").is_none());
    }

    #[test]
    fn removing_a_file_unregisters_its_names() {
        let ctx = context();
        add(&ctx, "a.md", "# Title\n");
        add(&ctx, "b.md", "[x](a.md#title) [y](a.html)\n");
        assert!(ctx.validate(false, None).warnings.is_empty());

        assert!(ctx.remove_entity_from_index("a.md"));
        assert!(!ctx.is_indexed("a.md"));
        assert!(!ctx.is_indexed("a.html"));
        assert!(!ctx.is_indexed("a.md#title"));
        let report = ctx.validate(false, None);
        assert_eq!(
            ids(&report.warnings),
            vec![WarningId::UnresolvedReference, WarningId::UnresolvedReference]
        );
    }

    #[test]
    fn case_mismatch_is_reported() {
        let ctx = context();
        ctx.index_entity("Images");
        add(&ctx, "a.md", "![logo](images/logo.png) [dir](images)\n");
        let report = ctx.validate(false, None);
        let ids = ids(&report.warnings);
        assert_eq!(
            ids,
            vec![
                WarningId::FileReferenceCaseMismatch,
                WarningId::UnresolvedReference
            ]
        );
        let mismatch = find(&report.warnings, WarningId::FileReferenceCaseMismatch);
        assert_eq!(
            mismatch.message,
            "`images` is not an exact case-match for `Images`. This could be a problem on *nix hosts."
        );
        // reported on every pass until fixed
        assert_eq!(ctx.validate(false, None), report);
    }

    #[test]
    fn empty_context() {
        let ctx = context();
        assert_eq!(
            ids(&ctx.validate(false, None).warnings),
            vec![WarningId::EmptyContext]
        );
        add(&ctx, "a.md", "text\n");
        ctx.clear();
        assert_eq!(ctx.markdown_file_count(), 0);
        assert!(!ctx.is_indexed("a.md"));
        assert!(ctx.is_indexed(""));
    }
}
