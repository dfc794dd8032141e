//! Flattened syntax tree built from the pulldown-cmark event stream.
//!
//! Parser plugins don't walk pulldown-cmark events themselves. Instead each markdown source is
//! turned into a list of [`SyntaxNode`]s (document, headings, links, images, footnotes, ordered
//! lists, code blocks and reference definitions) that carry byte spans and line numbers, and the
//! [`super::ParsingController`] dispatches them by [`NodeKind`].

use once_cell::sync::Lazy;
use pulldown_cmark::{
    BrokenLink, CodeBlockKind, Event as MdEvent, HeadingLevel, LinkType, Options,
    Parser as MdParser, Tag as MdTag, TagEnd as MdTagEnd,
};
use regex::Regex;
use std::ops::Range;

use crate::warnings::{line_of, SourceSpan};

pub fn xref_md_options() -> Options {
    let mut md_options = Options::empty();
    // Enabled explicitly rather than through Options::all() so results stay reproducible across
    // pulldown-cmark upgrades.
    md_options.insert(Options::ENABLE_DEFINITION_LIST);
    md_options.insert(Options::ENABLE_FOOTNOTES);
    md_options.insert(Options::ENABLE_GFM);
    md_options.insert(Options::ENABLE_MATH);
    md_options.insert(Options::ENABLE_STRIKETHROUGH);
    md_options.insert(Options::ENABLE_TABLES);
    md_options.insert(Options::ENABLE_TASKLISTS);
    md_options.insert(Options::ENABLE_YAML_STYLE_METADATA_BLOCKS);
    md_options
}

static FOOTNOTE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\^([^\]\s]+)\]").expect("footnote reference pattern is valid")
});

static REFERENCE_DEFINITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^ {0,3}\[((?:[^\]\\\n]|\\.)+)\]:[ \t]*(<[^>\n]*>|\S*)")
        .expect("reference definition pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Document,
    Heading,
    Link,
    Image,
    FootnoteReference,
    FootnoteDefinition,
    OrderedList,
    CodeBlock,
    ReferenceDefinition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkNode {
    pub link_type: LinkType,
    pub dest: String,
    pub title: String,
    /// Reference label for reference style links
    pub id: String,
    /// Rendered link text
    pub text: String,
    /// Raw source between the brackets, if any
    pub raw_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Document,
    Heading {
        level: u8,
        text: String,
    },
    Link(LinkNode),
    Image(LinkNode),
    FootnoteReference {
        label: String,
    },
    FootnoteDefinition {
        label: String,
        is_empty: bool,
    },
    OrderedList {
        start: u64,
        items: Vec<SourceSpan>,
    },
    CodeBlock {
        /// `None` for indented blocks
        fence_info: Option<String>,
        content: String,
    },
    ReferenceDefinition {
        label: String,
        dest: String,
        dest_span: SourceSpan,
    },
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Document => NodeKind::Document,
            Node::Heading { .. } => NodeKind::Heading,
            Node::Link(_) => NodeKind::Link,
            Node::Image(_) => NodeKind::Image,
            Node::FootnoteReference { .. } => NodeKind::FootnoteReference,
            Node::FootnoteDefinition { .. } => NodeKind::FootnoteDefinition,
            Node::OrderedList { .. } => NodeKind::OrderedList,
            Node::CodeBlock { .. } => NodeKind::CodeBlock,
            Node::ReferenceDefinition { .. } => NodeKind::ReferenceDefinition,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxNode {
    pub node: Node,
    pub span: SourceSpan,
    /// Zero based line of `span.start`
    pub line: usize,
}

impl SyntaxNode {
    pub fn kind(&self) -> NodeKind {
        self.node.kind()
    }
}

enum Open {
    Heading {
        level: u8,
        span: Range<usize>,
        text: String,
    },
    Link {
        is_image: bool,
        link_type: LinkType,
        dest: String,
        title: String,
        id: String,
        span: Range<usize>,
        text: String,
        text_range: Option<Range<usize>>,
    },
    FootnoteDefinition {
        label: String,
        span: Range<usize>,
        has_content: bool,
    },
    OrderedList {
        start: u64,
        span: Range<usize>,
        items: Vec<SourceSpan>,
    },
    UnorderedList,
    CodeBlock {
        fence_info: Option<String>,
        span: Range<usize>,
        content: String,
    },
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Parse `source` into syntax nodes. The first node is always [`Node::Document`].
///
/// Reference style links whose label has no definition are reported as links of one of the
/// `*Unknown` [`LinkType`]s with the label as destination, so `[Test]` becomes a reference that
/// the validation context can resolve (or flag) later. Footnote references without a definition
/// are emitted as [`Node::FootnoteReference`] all the same.
pub fn parse_tree(source: &str, line_starts: &[usize]) -> Vec<SyntaxNode> {
    let mut nodes = vec![SyntaxNode {
        node: Node::Document,
        span: SourceSpan::new(0, source.len()),
        line: 0,
    }];
    let push = |nodes: &mut Vec<SyntaxNode>, node: Node, span: Range<usize>| {
        nodes.push(SyntaxNode {
            node,
            line: line_of(line_starts, span.start),
            span: span.into(),
        });
    };

    let mut stack: Vec<Open> = Vec::new();
    let mut code_spans: Vec<Range<usize>> = Vec::new();

    for (event, offset) in MdParser::new_with_broken_link_callback(
        source,
        xref_md_options(),
        Some(|link: BrokenLink<'_>| {
            let reference = link.reference.into_static();
            Some((reference.clone(), reference))
        }),
    )
    .into_offset_iter()
    {
        if let MdEvent::Code(_) = &event {
            code_spans.push(offset.clone());
        }
        match event {
            MdEvent::Start(MdTag::Heading { level, .. }) => stack.push(Open::Heading {
                level: heading_level(level),
                span: offset,
                text: String::new(),
            }),
            MdEvent::Start(MdTag::Link {
                link_type,
                dest_url,
                title,
                id,
            }) => stack.push(Open::Link {
                is_image: false,
                link_type,
                dest: dest_url.to_string(),
                title: title.to_string(),
                id: id.to_string(),
                span: offset,
                text: String::new(),
                text_range: None,
            }),
            MdEvent::Start(MdTag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => stack.push(Open::Link {
                is_image: true,
                link_type,
                dest: dest_url.to_string(),
                title: title.to_string(),
                id: id.to_string(),
                span: offset,
                text: String::new(),
                text_range: None,
            }),
            MdEvent::Start(MdTag::FootnoteDefinition(label)) => {
                stack.push(Open::FootnoteDefinition {
                    label: label.to_string(),
                    span: offset,
                    has_content: false,
                })
            }
            MdEvent::Start(MdTag::List(Some(start))) => stack.push(Open::OrderedList {
                start,
                span: offset,
                items: Vec::new(),
            }),
            MdEvent::Start(MdTag::List(None)) => stack.push(Open::UnorderedList),
            MdEvent::Start(MdTag::Item) => {
                if let Some(Open::OrderedList { items, .. }) = stack
                    .iter_mut()
                    .rev()
                    .find(|open| matches!(open, Open::OrderedList { .. } | Open::UnorderedList))
                {
                    items.push(offset.into());
                }
            }
            MdEvent::Start(MdTag::CodeBlock(kind)) => stack.push(Open::CodeBlock {
                fence_info: match kind {
                    CodeBlockKind::Fenced(info) => Some(info.to_string()),
                    CodeBlockKind::Indented => None,
                },
                span: offset,
                content: String::new(),
            }),
            MdEvent::Text(text) | MdEvent::Code(text) => {
                for open in stack.iter_mut() {
                    match open {
                        Open::Heading { text: acc, .. } => acc.push_str(&text),
                        Open::Link {
                            text: acc,
                            text_range,
                            ..
                        } => {
                            acc.push_str(&text);
                            *text_range = Some(match text_range.take() {
                                Some(range) => range.start..offset.end,
                                None => offset.clone(),
                            });
                        }
                        Open::FootnoteDefinition { has_content, .. } => *has_content = true,
                        Open::CodeBlock { content, .. } => content.push_str(&text),
                        _ => {}
                    }
                }
            }
            MdEvent::InlineMath(_)
            | MdEvent::DisplayMath(_)
            | MdEvent::InlineHtml(_)
            | MdEvent::Html(_)
            | MdEvent::FootnoteReference(_) => {
                for open in stack.iter_mut() {
                    if let Open::FootnoteDefinition { has_content, .. } = open {
                        *has_content = true;
                    }
                }
                if let MdEvent::FootnoteReference(label) = event {
                    push(
                        &mut nodes,
                        Node::FootnoteReference {
                            label: label.to_string(),
                        },
                        offset,
                    );
                }
            }
            MdEvent::End(MdTagEnd::Heading(_)) => {
                if let Some(Open::Heading { level, span, text }) = stack.pop() {
                    push(&mut nodes, Node::Heading { level, text }, span);
                }
            }
            MdEvent::End(MdTagEnd::Link) | MdEvent::End(MdTagEnd::Image) => {
                if let Some(Open::Link {
                    is_image,
                    link_type,
                    dest,
                    title,
                    id,
                    span,
                    text,
                    text_range,
                }) = stack.pop()
                {
                    let link = LinkNode {
                        link_type,
                        dest,
                        title,
                        id,
                        text,
                        raw_text: bracket_text(source, &span, text_range),
                    };
                    let node = if is_image {
                        Node::Image(link)
                    } else {
                        Node::Link(link)
                    };
                    push(&mut nodes, node, span);
                }
            }
            MdEvent::End(MdTagEnd::FootnoteDefinition) => {
                if let Some(Open::FootnoteDefinition {
                    label,
                    span,
                    has_content,
                }) = stack.pop()
                {
                    push(
                        &mut nodes,
                        Node::FootnoteDefinition {
                            label,
                            is_empty: !has_content,
                        },
                        span,
                    );
                }
            }
            MdEvent::End(MdTagEnd::List(_)) => {
                if let Some(Open::OrderedList { start, span, items }) = stack.pop() {
                    push(&mut nodes, Node::OrderedList { start, items }, span);
                }
            }
            MdEvent::End(MdTagEnd::CodeBlock) => {
                if let Some(Open::CodeBlock {
                    fence_info,
                    span,
                    content,
                }) = stack.pop()
                {
                    code_spans.push(span.clone());
                    push(
                        &mut nodes,
                        Node::CodeBlock {
                            fence_info,
                            content,
                        },
                        span,
                    );
                }
            }
            _ => {}
        }
    }

    push_undefined_footnote_references(source, &code_spans, &mut nodes, line_starts);

    for captures in REFERENCE_DEFINITION.captures_iter(source) {
        let (Some(whole), Some(label), Some(dest)) =
            (captures.get(0), captures.get(1), captures.get(2))
        else {
            continue;
        };
        if label.as_str().starts_with('^')
            || code_spans
                .iter()
                .any(|code| code.contains(&whole.start()))
        {
            continue;
        }
        let (dest_text, dest_span) = match dest.as_str().strip_prefix('<') {
            Some(inner) => (
                inner.trim_end_matches('>').to_string(),
                SourceSpan::new(dest.start() + 1, dest.end().saturating_sub(1).max(dest.start() + 1)),
            ),
            None => (dest.as_str().to_string(), dest.range().into()),
        };
        push(
            &mut nodes,
            Node::ReferenceDefinition {
                label: label.as_str().to_string(),
                dest: dest_text,
                dest_span,
            },
            whole.range(),
        );
    }

    nodes
}

/// pulldown-cmark drops `[^label]` without a matching definition silently, neither as a
/// footnote reference nor as a broken link. Recover those from the source, skipping code,
/// escaped brackets, definitions (`[^label]:`) and anything already covered by a node.
fn push_undefined_footnote_references(
    source: &str,
    code_spans: &[Range<usize>],
    nodes: &mut Vec<SyntaxNode>,
    line_starts: &[usize],
) {
    let claimed: Vec<SourceSpan> = nodes
        .iter()
        .filter(|node| {
            matches!(
                node.kind(),
                NodeKind::Link | NodeKind::Image | NodeKind::FootnoteReference
            )
        })
        .map(|node| node.span)
        .collect();

    for captures in FOOTNOTE_REFERENCE.captures_iter(source) {
        let (Some(whole), Some(label)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let start = whole.start();
        if source[..start].ends_with('\\')
            || source[whole.end()..].starts_with(':')
            || code_spans.iter().any(|code| code.contains(&start))
            || claimed
                .iter()
                .any(|span| span.start <= start && start < span.end)
        {
            continue;
        }
        nodes.push(SyntaxNode {
            node: Node::FootnoteReference {
                label: label.as_str().to_string(),
            },
            span: whole.range().into(),
            line: line_of(line_starts, start),
        });
    }
}

/// The raw source of a link's text part, `Foo` for `[Foo](b.md)`.
fn bracket_text(
    source: &str,
    span: &Range<usize>,
    text_range: Option<Range<usize>>,
) -> Option<String> {
    let link_source = source.get(span.clone())?;
    let open = link_source.find('[')?;
    let close = match text_range {
        Some(range) if range.end >= span.start + open => {
            let after_text = range.end - span.start;
            after_text + link_source.get(after_text..)?.find(']')?
        }
        _ => open + 1 + link_source.get(open + 1..)?.find(']')?,
    };
    link_source
        .get(open + 1..close)
        .map(|text| text.to_string())
}
