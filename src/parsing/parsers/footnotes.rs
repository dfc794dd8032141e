use pulldown_cmark::LinkType;
use std::collections::HashMap;

use crate::{
    parsing::{MarkdownParser, Node, NodeKind, ParsingContext, SyntaxNode},
    warnings::{SourceSpan, WarningId},
};

/// Matches footnote references against the definitions of the same file.
///
/// Undefined references are registered under `^label` keys, which never exist as entities, so
/// the validation context reports them as unresolved footnote references.
pub struct FootnoteParser;

impl MarkdownParser for FootnoteParser {
    fn identifier(&self) -> &'static str {
        "FootnoteParser"
    }

    fn node_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::FootnoteDefinition]
    }

    fn parse(&self, node: &SyntaxNode, ctx: &mut ParsingContext<'_>) {
        if let Node::FootnoteDefinition {
            label,
            is_empty: true,
        } = &node.node
        {
            ctx.report_warning(
                WarningId::EmptyFootnoteDefinition,
                node.span,
                label,
                format!("Footnote definition for `{label}` is empty"),
            );
        }
    }

    fn finalize(&self, nodes: &[SyntaxNode], ctx: &mut ParsingContext<'_>) {
        // lower cased label -> (label, span, used)
        let mut definitions: HashMap<String, (String, SourceSpan, bool)> = HashMap::new();
        let mut order = Vec::new();
        for node in nodes {
            if let Node::FootnoteDefinition { label, .. } = &node.node {
                let key = label.to_lowercase();
                if !definitions.contains_key(&key) {
                    order.push(key.clone());
                    definitions.insert(key, (label.clone(), node.span, false));
                }
            }
        }

        for node in nodes {
            let label = match &node.node {
                Node::FootnoteReference { label } => label.as_str(),
                Node::Link(link) | Node::Image(link)
                    if matches!(
                        link.link_type,
                        LinkType::ReferenceUnknown
                            | LinkType::CollapsedUnknown
                            | LinkType::ShortcutUnknown
                    ) && link.dest.starts_with('^') =>
                {
                    &link.dest[1..]
                }
                _ => continue,
            };
            match definitions.get_mut(&label.to_lowercase()) {
                Some((_, _, used)) => *used = true,
                None => ctx.register_footnote_reference(label, node.span),
            }
        }

        for key in order {
            if let Some((label, span, false)) = definitions.get(&key) {
                ctx.report_warning(
                    WarningId::UnusedDefinedFootnote,
                    *span,
                    label,
                    format!("Footnote `{label}` is not being used"),
                );
            }
        }
    }
}
