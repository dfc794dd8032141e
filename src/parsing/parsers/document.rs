use crate::{
    parsing::{ParsingContext, SyntaxNode, NodeKind, MarkdownParser},
    warnings::WarningId,
};

/// Whole-file checks: empty and huge files.
pub struct DocumentParser;

impl MarkdownParser for DocumentParser {
    fn identifier(&self) -> &'static str {
        "DocumentParser"
    }

    fn node_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Document]
    }

    fn parse(&self, _node: &SyntaxNode, ctx: &mut ParsingContext<'_>) {
        let parsing = &ctx.pipeline.config.parsing;
        let (warn_on_empty, threshold) = (parsing.warn_on_empty_file, parsing.huge_file_line_count);

        if ctx.source.trim().is_empty() {
            if warn_on_empty {
                ctx.report_general_warning(WarningId::EmptyMarkdownFile, "", "Empty markdown file");
            }
            return;
        }

        let lines = ctx.source.lines().count();
        if threshold > 0 && lines >= threshold {
            ctx.report_general_warning(
                WarningId::HugeMarkdownFile,
                &format!("{lines} >= {threshold}"),
                "Markdown file is huge! Consider moving some content into other files.",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::{Config, Pipeline},
        tests::helpers::*,
        warnings::WarningId,
    };
    use test_log::test;

    #[test]
    fn empty_files() {
        let result = parse("a.md", " \n\n");
        assert_eq!(ids(&result.warnings), vec![WarningId::EmptyMarkdownFile]);
        assert!(result.warnings[0].location.is_whole_file);

        let mut config = offline_config();
        config.parsing.warn_on_empty_file = false;
        let pipeline = Pipeline::new(config).unwrap();
        assert!(parse_with(&pipeline, "a.md", "").warnings.is_empty());
    }

    #[test]
    fn huge_files() {
        let mut config: Config = offline_config();
        config.parsing.huge_file_line_count = 3;
        let pipeline = Pipeline::new(config).unwrap();

        assert!(parse_with(&pipeline, "a.md", "one\n\ntwo\n").warnings.is_empty());
        let result = parse_with(&pipeline, "a.md", "one\n\ntwo\n\nthree\n");
        let warning = find(&result.warnings, WarningId::HugeMarkdownFile);
        assert_eq!(warning.value, "5 >= 3");
    }
}
