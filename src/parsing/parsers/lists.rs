use crate::{
    parsing::{MarkdownParser, Node, NodeKind, ParsingContext, SyntaxNode},
    warnings::WarningId,
};

/// Ordered list numbering. Lists numbered `1.` throughout are fine; anything else has to count
/// up from the list's first number. Only the first mismatch of a list is reported.
pub struct ListParser;

impl MarkdownParser for ListParser {
    fn identifier(&self) -> &'static str {
        "ListParser"
    }

    fn node_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::OrderedList]
    }

    fn parse(&self, node: &SyntaxNode, ctx: &mut ParsingContext<'_>) {
        let Node::OrderedList { start, items } = &node.node else {
            return;
        };

        let numbers: Vec<(u64, _)> = items
            .iter()
            .filter_map(|span| {
                let digits: String = ctx
                    .text(*span)
                    .trim_start()
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                digits.parse().ok().map(|number| (number, *span))
            })
            .collect();
        if numbers.iter().all(|(number, _)| *number == 1) {
            return;
        }

        for (offset, (actual, span)) in numbers.iter().enumerate() {
            let expected = start + offset as u64;
            if *actual != expected {
                ctx.report_warning(
                    WarningId::InvalidListNumberOrder,
                    *span,
                    &format!("{expected}-{actual}"),
                    format!("Invalid list number order - expected {expected}, not {actual}"),
                );
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{tests::helpers::*, warnings::WarningId};
    use test_log::test;

    #[test]
    fn well_ordered_lists() {
        assert!(parse("a.md", "1. a\n2. b\n3. c\n").warnings.is_empty());
        assert!(parse("a.md", "1. a\n1. b\n1. c\n").warnings.is_empty());
        assert!(parse("a.md", "4. a\n5. b\n").warnings.is_empty());
    }

    #[test]
    fn first_mismatch_is_reported() {
        let result = parse("a.md", "1. a\n2. b\n4. c\n7. d\n");
        assert_eq!(ids(&result.warnings), vec![WarningId::InvalidListNumberOrder]);
        let warning = &result.warnings[0];
        assert_eq!(warning.value, "3-4");
        assert_eq!(warning.message, "Invalid list number order - expected 3, not 4");
        assert_eq!(warning.location.start_line, 2);
    }
}
