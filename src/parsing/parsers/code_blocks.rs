use crate::{
    parsing::{MarkdownParser, Node, NodeKind, ParsingContext, SyntaxNode},
    warnings::WarningId,
};

/// Empty and unclosed code blocks, and syntax checking of `json` blocks.
pub struct CodeBlockParser;

impl MarkdownParser for CodeBlockParser {
    fn identifier(&self) -> &'static str {
        "CodeBlockParser"
    }

    fn node_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::CodeBlock]
    }

    fn parse(&self, node: &SyntaxNode, ctx: &mut ParsingContext<'_>) {
        let Node::CodeBlock {
            fence_info,
            content,
        } = &node.node
        else {
            return;
        };

        if fence_info.is_some() && !is_closed(ctx.text(node.span)) {
            ctx.report_warning(
                WarningId::UnclosedCodeBlock,
                node.span,
                "",
                "Code block is never closed",
            );
        }

        if content.is_empty() {
            ctx.report_warning(WarningId::EmptyCodeBlock, node.span, "", "Code block is empty");
            return;
        }
        if content.trim().is_empty() {
            ctx.report_warning(
                WarningId::EffectivelyEmptyCodeBlock,
                node.span,
                "",
                "Code block is effectively empty",
            );
            return;
        }

        let language = fence_info
            .as_deref()
            .and_then(|info| info.split_whitespace().next())
            .unwrap_or_default();
        if language.eq_ignore_ascii_case("json") {
            if let Err(e) = serde_json::from_str::<serde_json::Value>(content) {
                ctx.report_warning(
                    WarningId::InvalidJsonInJsonCodeBlock,
                    node.span,
                    &e.to_string(),
                    "JSON is not valid",
                );
            }
        }
    }
}

/// Whether a fenced block's source ends with a fence at least as long as its opening one.
fn is_closed(block: &str) -> bool {
    let mut lines = block.lines();
    let Some(opening) = lines.next().map(str::trim_start) else {
        return false;
    };
    let Some(fence_char) = opening.chars().next().filter(|c| *c == '`' || *c == '~') else {
        return false;
    };
    let fence_len = opening.chars().take_while(|c| *c == fence_char).count();

    match lines.last().map(str::trim) {
        Some(closing) => {
            closing.chars().all(|c| c == fence_char)
                && closing.chars().count() >= fence_len
        }
        None => false,
    }
}
