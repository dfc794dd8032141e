use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use super::{context::ParsingContext, file::FileId, urls::process_url};
use crate::{
    pending::PendingOperation,
    warnings::{line_start_indexes, SourceSpan, Warning, WarningId},
};

/// One occurrence of a reference inside a markdown file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Destination exactly as written
    pub raw: String,
    /// Context relative entity name (`docs/a.md#intro`), or the url itself for url references
    pub key: String,
    pub span: SourceSpan,
    pub line: usize,
    pub file: FileId,
    pub is_image: bool,
    pub is_url: bool,
}

/// A declaration of something that can be referenced: a heading anchor or a `[label]: dest` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDefinition {
    /// Heading entity name (`docs/a.md#intro`) or local reference label
    pub key: String,
    pub span: SourceSpan,
    pub line: usize,
    pub file: FileId,
    pub used: bool,
}

impl ReferenceDefinition {
    pub fn new(key: impl Into<String>, span: SourceSpan, line: usize, file: FileId) -> Self {
        ReferenceDefinition {
            key: key.into(),
            span,
            line,
            file,
            used: false,
        }
    }
}

/// Everything one parse of a markdown file produced.
///
/// A `ParsingResult` is replaced wholesale on every (re)parse. The validation context only ever
/// mutates `unprocessed`, as keys resolve against the entity map or get re-queued.
#[derive(Debug, Clone)]
pub struct ParsingResult {
    pub source: Arc<str>,
    pub line_starts: Vec<usize>,
    pub warnings: Vec<Warning>,
    pub heading_definitions: Vec<ReferenceDefinition>,
    /// `[label]: dest` definitions, in source order
    pub local_definitions: Vec<ReferenceDefinition>,
    /// Normalized labels of local definitions some link made use of
    pub used_definitions: HashSet<String>,
    /// Registration order, before finalization
    pub references: Vec<Reference>,
    /// Lower cased entity name -> every non-url reference to it
    pub references_by_key: BTreeMap<String, Vec<Reference>>,
    /// Lower cased entity names not yet found in the context
    pub unprocessed: BTreeSet<String>,
    pub pending_operations: Vec<PendingOperation>,
}

impl ParsingResult {
    pub fn new(source: Arc<str>) -> Self {
        ParsingResult {
            line_starts: line_start_indexes(&source),
            source,
            warnings: Vec::new(),
            heading_definitions: Vec::new(),
            local_definitions: Vec::new(),
            used_definitions: HashSet::new(),
            references: Vec::new(),
            references_by_key: BTreeMap::new(),
            unprocessed: BTreeSet::new(),
            pending_operations: Vec::new(),
        }
    }

    pub fn has_heading(&self, key: &str) -> bool {
        self.heading_definitions
            .iter()
            .any(|def| def.key.eq_ignore_ascii_case(key))
    }

    pub fn outstanding_operations(&self) -> impl Iterator<Item = &PendingOperation> {
        self.pending_operations.iter().filter(|op| !op.is_finished())
    }
}

/// Normalize a reference label the way commonmark matches them.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Last step of every parse, run after all plugins and their finalizers.
pub(crate) fn finalize(ctx: &mut ParsingContext<'_>) {
    let mut first_definitions: HashMap<String, usize> = HashMap::new();
    let definitions = ctx.result().local_definitions.clone();
    for def in definitions.iter() {
        let label = normalize_label(&def.key);
        match first_definitions.get(&label) {
            Some(line) => {
                let message = format!(
                    "Duplicate reference definition `{}` - already defined on line {}",
                    def.key,
                    line + 1
                );
                ctx.report_warning(
                    WarningId::DuplicateReferenceDefinition,
                    def.span,
                    &def.key,
                    message,
                );
            }
            None => {
                first_definitions.insert(label, def.line);
            }
        }
    }

    let heading_lines: HashSet<usize> = ctx
        .result()
        .heading_definitions
        .iter()
        .map(|def| def.line)
        .collect();
    let references = std::mem::take(&mut ctx.result_mut().references);
    for reference in references
        .into_iter()
        .filter(|reference| !heading_lines.contains(&reference.line))
    {
        let label = normalize_label(&reference.raw);
        if !reference.is_url && first_definitions.contains_key(&label) {
            ctx.result_mut().used_definitions.insert(label);
            continue;
        }
        if reference.is_url {
            process_url(ctx, &reference);
            continue;
        }

        let key = reference.key.to_lowercase();
        let result = ctx.result_mut();
        if !key.is_empty() {
            result.unprocessed.insert(key.clone());
        }
        result.references_by_key.entry(key).or_default().push(reference);
    }

    let mut reported = HashSet::new();
    for def in definitions.iter() {
        let label = normalize_label(&def.key);
        if ctx.result().used_definitions.contains(&label) || !reported.insert(label) {
            continue;
        }
        ctx.report_warning(
            WarningId::UnusedDefinedReference,
            def.span,
            &def.key,
            format!("Unused defined reference `{}`", def.key),
        );
    }
}

/// Changes between two successive parses of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsingResultDiff {
    pub removed_headings: Vec<ReferenceDefinition>,
    pub added_headings: Vec<ReferenceDefinition>,
    /// Lower cased entity names the new parse no longer references
    pub removed_reference_keys: Vec<String>,
}

impl ParsingResultDiff {
    /// Compare heading anchors and referenced keys, case-insensitively.
    pub fn diff(previous: &ParsingResult, current: &ParsingResult) -> Self {
        let anchors = |result: &ParsingResult| -> HashSet<String> {
            result
                .heading_definitions
                .iter()
                .map(|def| def.key.to_lowercase())
                .collect()
        };
        let previous_anchors = anchors(previous);
        let current_anchors = anchors(current);

        ParsingResultDiff {
            removed_headings: previous
                .heading_definitions
                .iter()
                .filter(|def| !current_anchors.contains(&def.key.to_lowercase()))
                .cloned()
                .collect(),
            added_headings: current
                .heading_definitions
                .iter()
                .filter(|def| !previous_anchors.contains(&def.key.to_lowercase()))
                .cloned()
                .collect(),
            removed_reference_keys: previous
                .references_by_key
                .keys()
                .filter(|key| !current.references_by_key.contains_key(*key))
                .cloned()
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.removed_headings.is_empty()
            && self.added_headings.is_empty()
            && self.removed_reference_keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(headings: &[&str], keys: &[&str]) -> ParsingResult {
        let mut result = ParsingResult::new(Arc::from(""));
        for heading in headings {
            result.heading_definitions.push(ReferenceDefinition::new(
                *heading,
                SourceSpan::default(),
                0,
                FileId(0),
            ));
        }
        for key in keys {
            result
                .references_by_key
                .entry(key.to_string())
                .or_default();
        }
        result
    }

    #[test]
    fn label_normalization() {
        assert_eq!(normalize_label("  Foo \n Bar "), "foo bar");
        assert_eq!(normalize_label("X"), normalize_label("x"));
    }

    #[test]
    fn diff_headings_and_keys() {
        let previous = result_with(&["a.md#one", "a.md#Two"], &["b.md", "c.md"]);
        let current = result_with(&["a.md#two", "a.md#three"], &["c.md", "d.md"]);
        let diff = ParsingResultDiff::diff(&previous, &current);

        let keys = |defs: &[ReferenceDefinition]| -> Vec<String> {
            defs.iter().map(|d| d.key.clone()).collect()
        };
        assert_eq!(keys(&diff.removed_headings), vec!["a.md#one"]);
        assert_eq!(keys(&diff.added_headings), vec!["a.md#three"]);
        assert_eq!(diff.removed_reference_keys, vec!["b.md".to_string()]);
    }

    #[test]
    fn identical_results_have_empty_diff() {
        let a = result_with(&["a.md#x"], &["b.md"]);
        assert!(ParsingResultDiff::diff(&a, &a.clone()).is_empty());
    }
}
