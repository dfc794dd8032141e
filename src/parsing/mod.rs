//! Markdown parsing into [`ParsingResult`]s.
//!
//! ## Key Components
//!
//! - [`tree`] - flattens the pulldown-cmark event stream into [`SyntaxNode`]s with byte spans
//! - [`MarkdownParser`] - the plugin trait; one implementation per markdown construct
//! - [`ParsingController`] - explicit registry mapping [`NodeKind`] to an ordered handler list
//! - [`ParsingContext`] - what a plugin can see and do while handling one file
//! - [`ParsingResult`] - warnings, definitions, references and pending operations of one parse
//!
//! ## Pipeline
//!
//! 1. The source is parsed once into a flat node list (document node first).
//! 2. Every node is handed to each parser registered for its kind, in registration order.
//! 3. Each registered parser's `finalize` runs once with the full node list.
//! 4. The result itself is finalized: duplicate and unused reference definitions are reported,
//!    url references go through [`urls::process_url`] and every other reference key is queued
//!    as unprocessed for the validation context to resolve.
//!
//! Register additional plugins with [`ParsingController::register`]:
//!
//! ```rust
//! use xref_core::parsing::{MarkdownParser, NodeKind, ParsingContext, ParsingController, SyntaxNode};
//! use xref_core::warnings::WarningId;
//! use std::sync::Arc;
//!
//! struct NoTodoHeadings;
//!
//! impl MarkdownParser for NoTodoHeadings {
//!     fn identifier(&self) -> &'static str {
//!         "NoTodoHeadings"
//!     }
//!
//!     fn node_kinds(&self) -> &'static [NodeKind] {
//!         &[NodeKind::Heading]
//!     }
//!
//!     fn parse(&self, node: &SyntaxNode, ctx: &mut ParsingContext<'_>) {
//!         if ctx.text(node.span).contains("TODO") {
//!             ctx.report_warning(WarningId::EmptyHeading, node.span, "TODO", "Unfinished heading");
//!         }
//!     }
//! }
//!
//! let mut parsers = ParsingController::with_default_parsers();
//! parsers.register(Arc::new(NoTodoHeadings));
//! ```

use std::{collections::HashMap, sync::Arc};

use crate::{config::Pipeline, warnings::WarningSource};

pub mod context;
pub mod file;
pub mod parsers;
pub mod result;
pub mod tree;
pub mod urls;

pub use context::ParsingContext;
pub use file::{FileId, MarkdownFile};
pub use result::{
    normalize_label, ParsingResult, ParsingResultDiff, Reference, ReferenceDefinition,
};
pub use tree::{parse_tree, xref_md_options, LinkNode, Node, NodeKind, SyntaxNode};

/// A handler for one or more kinds of markdown construct.
///
/// Implementations are shared by every file of a context and must not keep per-file state;
/// everything goes through the [`ParsingContext`].
pub trait MarkdownParser: Send + Sync {
    fn identifier(&self) -> &'static str;

    /// Node kinds [`MarkdownParser::parse`] is called for
    fn node_kinds(&self) -> &'static [NodeKind];

    fn parse(&self, node: &SyntaxNode, ctx: &mut ParsingContext<'_>);

    /// Called once per file after every node was handled, with the full node list.
    fn finalize(&self, _nodes: &[SyntaxNode], _ctx: &mut ParsingContext<'_>) {}
}

#[derive(Clone, Default)]
pub struct ParsingController {
    parsers: Vec<Arc<dyn MarkdownParser>>,
    handlers: HashMap<NodeKind, Vec<Arc<dyn MarkdownParser>>>,
}

impl ParsingController {
    /// A controller with no plugins. References still get finalized.
    pub fn new() -> Self {
        ParsingController::default()
    }

    pub fn with_default_parsers() -> Self {
        let mut controller = ParsingController::new();
        controller.register(Arc::new(parsers::DocumentParser));
        controller.register(Arc::new(parsers::HeadingParser));
        controller.register(Arc::new(parsers::LinkParser));
        controller.register(Arc::new(parsers::FootnoteParser));
        controller.register(Arc::new(parsers::ListParser));
        controller.register(Arc::new(parsers::CodeBlockParser));
        controller
    }

    pub fn register(&mut self, parser: Arc<dyn MarkdownParser>) {
        for kind in parser.node_kinds() {
            self.handlers.entry(*kind).or_default().push(parser.clone());
        }
        self.parsers.push(parser);
    }

    pub fn identifiers(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|p| p.identifier()).collect()
    }

    pub fn parse(
        &self,
        pipeline: &Pipeline,
        file: FileId,
        relative_path: &str,
        source: Arc<str>,
    ) -> ParsingResult {
        let mut result = ParsingResult::new(source.clone());
        let nodes = parse_tree(&source, &result.line_starts);
        tracing::trace!(
            "[Parsing] {}: {} syntax nodes",
            relative_path,
            nodes.len()
        );

        let mut ctx = ParsingContext::new(file, relative_path, &source, pipeline, &mut result);
        for node in nodes.iter() {
            let Some(handlers) = self.handlers.get(&node.kind()) else {
                continue;
            };
            for handler in handlers {
                ctx.warning_source = WarningSource::Parser(handler.identifier().to_string());
                handler.parse(node, &mut ctx);
            }
        }
        for parser in self.parsers.iter() {
            ctx.warning_source = WarningSource::ParserFinalize(parser.identifier().to_string());
            parser.finalize(&nodes, &mut ctx);
        }
        ctx.warning_source = WarningSource::ParsingResultFinalize;
        result::finalize(&mut ctx);

        tracing::debug!(
            "[Parsing] {}: {} warnings, {} headings, {} referenced keys, {} pending operations",
            relative_path,
            result.warnings.len(),
            result.heading_definitions.len(),
            result.references_by_key.len(),
            result.pending_operations.len()
        );
        result
    }
}
