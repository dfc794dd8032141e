use crate::{
    parsing::{MarkdownParser, Node, NodeKind, ParsingContext, SyntaxNode},
    paths::to_anchor,
    warnings::WarningId,
};

/// Registers heading anchors as referenceable entities (`file.md#anchor`).
pub struct HeadingParser;

impl MarkdownParser for HeadingParser {
    fn identifier(&self) -> &'static str {
        "HeadingParser"
    }

    fn node_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Heading]
    }

    fn parse(&self, node: &SyntaxNode, ctx: &mut ParsingContext<'_>) {
        let Node::Heading { text, .. } = &node.node else {
            return;
        };

        let raw = ctx.text(node.span);
        let first_line = raw.lines().next().unwrap_or_default();
        // ATX only; setext underlines carry no trailing whitespace of interest
        if first_line.trim_start().starts_with('#') && first_line.ends_with([' ', '\t']) {
            ctx.report_warning(
                WarningId::HeadingEndsWithWhitespace,
                node.span,
                text,
                "Heading ends with whitespace",
            );
        }

        if text.trim().is_empty() {
            ctx.report_warning(WarningId::EmptyHeading, node.span, "", "Empty heading");
            return;
        }

        let anchor = to_anchor(text);
        if anchor.is_empty() {
            ctx.report_warning(
                WarningId::EffectivelyEmptyHeading,
                node.span,
                text,
                "Heading is effectively empty",
            );
            return;
        }

        if !ctx.add_heading_definition(&anchor, node.span) {
            ctx.report_warning(
                WarningId::DuplicateHeadingDefinition,
                node.span,
                &anchor,
                format!("Duplicate heading definition `{anchor}`"),
            );
        }
    }
}
