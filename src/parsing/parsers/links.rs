use pulldown_cmark::LinkType;

use crate::{
    parsing::{urls::is_valid_email, LinkNode, MarkdownParser, Node, NodeKind, ParsingContext, SyntaxNode},
    warnings::{SourceSpan, WarningId},
};

/// Links, images and `[label]: dest` reference definitions.
pub struct LinkParser;

impl MarkdownParser for LinkParser {
    fn identifier(&self) -> &'static str {
        "LinkParser"
    }

    fn node_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Link, NodeKind::Image, NodeKind::ReferenceDefinition]
    }

    fn parse(&self, node: &SyntaxNode, ctx: &mut ParsingContext<'_>) {
        match &node.node {
            Node::Link(link) => parse_link(link, node.span, false, ctx),
            Node::Image(link) => parse_link(link, node.span, true, ctx),
            Node::ReferenceDefinition {
                label,
                dest,
                dest_span,
            } => {
                check_whitespace("reference", label, node.span, ctx);
                let is_new = ctx.add_local_definition(label, node.span);
                if dest.trim().is_empty() {
                    ctx.report_warning(WarningId::EmptyReference, node.span, label, "Empty reference");
                } else if is_new {
                    register_destination(dest, *dest_span, false, ctx);
                }
            }
            _ => {}
        }
    }
}

fn parse_link(link: &LinkNode, span: SourceSpan, is_image: bool, ctx: &mut ParsingContext<'_>) {
    match link.link_type {
        LinkType::ReferenceUnknown | LinkType::CollapsedUnknown | LinkType::ShortcutUnknown => {
            // `[^label]` without a definition belongs to the footnote parser
            if link.dest.starts_with('^') || link.dest.trim().is_empty() {
                return;
            }
            ctx.register_reference(&link.dest, span, is_image);
            return;
        }
        LinkType::Reference | LinkType::Collapsed | LinkType::Shortcut => {
            ctx.mark_definition_used(&link.id);
            if link.link_type == LinkType::Reference {
                if let Some(text) = link.raw_text.as_deref() {
                    if text.trim().eq_ignore_ascii_case(link.id.trim()) {
                        ctx.report_warning(
                            WarningId::SameLabelAndTargetReference,
                            span,
                            &link.id,
                            format!("You can use `[{text}]` instead of `[{text}][{}]`", link.id),
                        );
                    }
                }
            }
            if !is_image {
                check_link_content(link, span, ctx);
            }
            return;
        }
        LinkType::Email => {
            let address = link.dest.trim_start_matches("mailto:");
            if !is_valid_email(address) {
                report_invalid_email(address, span, ctx);
            }
            return;
        }
        _ => {}
    }

    if !is_image && link.link_type == LinkType::Inline {
        check_link_content(link, span, ctx);
    }
    register_destination(&link.dest, span, is_image, ctx);
}

fn register_destination(dest: &str, span: SourceSpan, is_image: bool, ctx: &mut ParsingContext<'_>) {
    let trimmed = dest.trim();
    if trimmed.is_empty() {
        ctx.report_warning(WarningId::EmptyReference, span, "", "Empty reference");
        return;
    }
    if trimmed == "#" {
        return;
    }
    if let Some(address) = trimmed.strip_prefix("mailto:") {
        if !is_valid_email(address) {
            report_invalid_email(address, span, ctx);
        }
        return;
    }
    ctx.register_reference(dest, span, is_image);
}

fn report_invalid_email(address: &str, span: SourceSpan, ctx: &mut ParsingContext<'_>) {
    ctx.report_warning(
        WarningId::InvalidEmailFormat,
        span,
        address,
        format!("`{address}` is not a valid email"),
    );
}

fn check_link_content(link: &LinkNode, span: SourceSpan, ctx: &mut ParsingContext<'_>) {
    let Some(text) = link.raw_text.as_deref() else {
        return;
    };
    if text.trim().is_empty() {
        ctx.report_warning(WarningId::EmptyLinkContent, span, "", "Empty link content");
        return;
    }
    check_whitespace("link content", text, span, ctx);
}

fn check_whitespace(what: &str, text: &str, span: SourceSpan, ctx: &mut ParsingContext<'_>) {
    if text.starts_with(char::is_whitespace) {
        ctx.report_warning(
            WarningId::ReferenceHasExcessWhitespace,
            span,
            text,
            format!("Leading space in {what} `{text}`"),
        );
    }
    if text.ends_with(char::is_whitespace) {
        ctx.report_warning(
            WarningId::ReferenceHasExcessWhitespace,
            span,
            text,
            format!("Trailing space in {what} `{text}`"),
        );
    }
}
