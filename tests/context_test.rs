//! Validation context integration tests
//!
//! Incremental bookkeeping of the entity map: adding, updating and removing files and entities
//! in various orders, and the properties reports must keep across repeated validation.

mod common;

use common::*;
use test_log::test;
use xref_core::{
    context::ValidationContext,
    report::ValidationReport,
    warnings::{Warning, WarningId},
};

fn context() -> ValidationContext {
    ValidationContext::new(offline_config()).unwrap()
}

fn add(ctx: &ValidationContext, path: &str, source: &str) -> bool {
    ctx.add_markdown_file(format!("/ctx/{path}"), path, source)
}

fn unresolved(report: &ValidationReport) -> Vec<(&str, &str)> {
    report
        .warnings
        .iter()
        .filter(|w| w.id == WarningId::UnresolvedReference)
        .map(|w| (w.location.relative_file_path.as_str(), w.value.as_str()))
        .collect()
}

#[test]
fn missing_file_is_unresolved_at_the_link_span() {
    let ctx = context();
    assert!(add(&ctx, "a.md", "[Foo](b.md)"));

    let report = ctx.validate(false, None);
    assert!(report.is_complete);
    assert_eq!(report.suggested_wait_ms(), -1);
    assert_eq!(report.warnings.len(), 1);
    let warning = &report.warnings[0];
    assert_eq!(warning.id, WarningId::UnresolvedReference);
    assert_eq!(warning.value, "b.md");
    assert_eq!(warning.location.relative_file_path, "a.md");
    assert_eq!((warning.location.span.start, warning.location.span.end), (0, 11));
    assert_eq!((warning.location.start_line, warning.location.start_column), (0, 1));
}

#[test]
fn indexing_the_target_resolves_the_reference() {
    let ctx = context();
    add(&ctx, "a.md", "[Foo](b.md)");
    assert_eq!(ctx.validate(false, None).warnings.len(), 1);

    assert!(ctx.index_entity("b.md"));
    let report = ctx.validate(false, None);
    assert!(report.warnings.is_empty());
    assert!(report.is_complete);
}

#[test]
fn removing_a_heading_unresolves_its_referrers() {
    let ctx = context();
    add(&ctx, "a.md", "# Title");
    add(&ctx, "b.md", "[Foo](a.md#title)");
    assert!(ctx.validate(false, None).warnings.is_empty());

    assert!(ctx.update_markdown_file("a.md", "No heading anymore\n"));
    let report = ctx.validate(false, None);
    assert_eq!(unresolved(&report), vec![("b.md", "a.md#title")]);

    assert!(ctx.update_markdown_file("a.md", "# Title\n"));
    assert!(ctx.validate(false, None).warnings.is_empty());
}

#[test]
fn validation_is_idempotent() {
    let ctx = context();
    add(&ctx, "a.md", "# A\n\n[b](b.md) [c](c.md#x)\n\n```\n```\n");
    add(&ctx, "c.md", "# Y\n");

    let first = ctx.validate(false, None);
    let second = ctx.validate(false, None);
    assert_eq!(first, second);
    assert_eq!(second.diff(&first), (vec![], vec![]));
    assert_eq!(unresolved(&first), vec![("a.md", "b.md"), ("a.md", "c.md#x")]);
    assert_eq!(first.warning_count(), 1);
}

#[test]
fn complete_reports_stay_complete() {
    let ctx = context();
    add(&ctx, "a.md", "# A\n\n[self](#a)\n");
    let first = ctx.validate(true, None);
    assert!(first.is_complete);
    for _ in 0..3 {
        let next = ctx.validate(false, None);
        assert!(next.is_complete);
        assert_eq!(next.warnings, first.warnings);
    }
}

#[test]
fn updates_do_not_leak_previous_content() {
    let version_a = "# Old\n\n[gone](missing.md)\n\n[unused]: x.md\n\n1. a\n3. b\n";
    let version_b = "# New\n\n[other](other.md)\n";

    let updated = context();
    add(&updated, "doc.md", version_a);
    add(&updated, "ref.md", "[n](doc.md#new) [o](doc.md#old)\n");
    updated.validate(false, None);
    updated.update_markdown_file("doc.md", version_b);
    let after_update = updated.validate(false, None);

    let fresh = context();
    add(&fresh, "doc.md", version_b);
    add(&fresh, "ref.md", "[n](doc.md#new) [o](doc.md#old)\n");
    let from_scratch = fresh.validate(false, None);

    assert_eq!(after_update.warnings, from_scratch.warnings);
    assert_eq!(
        unresolved(&from_scratch),
        vec![("doc.md", "other.md"), ("ref.md", "doc.md#old")]
    );
}

#[test]
fn update_then_clear_and_add_match() {
    let ctx = context();
    add(&ctx, "a.md", "[x](x.md)\n");
    ctx.update_markdown_file("a.md", "[y](y.md)\n");
    let updated: Vec<Warning> = ctx.validate(false, None).warnings;

    ctx.clear();
    add(&ctx, "a.md", "[y](y.md)\n");
    assert_eq!(ctx.validate(false, None).warnings, updated);
}

#[test]
fn resolution_is_order_independent() {
    let referrer = ("a.md", "See [setup](b.md#setup).\n");
    let target = ("b.md", "# Setup\n");

    for order in [[referrer, target], [target, referrer]] {
        let ctx = context();
        for (path, source) in order {
            add(&ctx, path, source);
        }
        assert!(ctx.validate(false, None).warnings.is_empty());

        assert!(ctx.remove_entity_from_index("b.md"));
        let report = ctx.validate(false, None);
        assert_eq!(unresolved(&report), vec![("a.md", "b.md#setup")]);
    }
}

#[test]
fn removing_an_entity_requeues_every_referrer() {
    let ctx = context();
    ctx.index_entity("images");
    ctx.index_entity("images/logo.png");
    add(&ctx, "a.md", "![logo](images/logo.png)\n");
    add(&ctx, "guide/b.md", "![logo](../images/logo.png) [all](../images)\n");
    assert!(ctx.validate(false, None).warnings.is_empty());
    let mut referrers = ctx.referrers_of("images/logo.png");
    referrers.sort();
    assert_eq!(referrers, vec!["a.md", "guide/b.md"]);

    assert!(ctx.remove_entity_from_index("images/logo.png"));
    assert!(!ctx.remove_entity_from_index("images/logo.png"));
    let report = ctx.validate(false, None);
    assert_eq!(
        unresolved(&report),
        vec![("a.md", "images/logo.png"), ("guide/b.md", "../images/logo.png")]
    );

    assert!(ctx.index_entity("images/logo.png"));
    assert!(ctx.validate(false, None).warnings.is_empty());
}

#[test]
fn html_aliases_resolve() {
    let ctx = context();
    add(&ctx, "guide/intro.md", "# Intro\n");
    add(&ctx, "index.md", "[intro](guide/intro.html) [dir](guide) [root](.)\n");
    ctx.index_entity("guide");
    assert!(ctx.validate(false, None).warnings.is_empty());
}

#[test]
fn parser_warnings_keep_a_file_unfinished() {
    let ctx = context();
    add(&ctx, "a.md", "");
    let report = ctx.validate(false, None);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].id, WarningId::EmptyMarkdownFile);
    assert_eq!(ctx.validate(false, None), report);

    ctx.update_markdown_file("a.md", "Some text.\n");
    assert!(ctx.validate(false, None).warnings.is_empty());
}

#[test]
fn undefined_footnote_is_reported_at_its_reference() {
    let ctx = context();
    add(&ctx, "a.md", "Claim[^missing].\n");

    let report = ctx.validate(false, None);
    assert!(report.is_complete);
    assert_eq!(report.warnings.len(), 1);
    let warning = &report.warnings[0];
    assert_eq!(warning.id, WarningId::UnresolvedFootnoteReference);
    assert_eq!(warning.value, "^missing");
    assert_eq!(warning.message, "Unresolved footnote reference `^missing`");
    assert_eq!((warning.location.span.start, warning.location.span.end), (5, 15));
    assert_eq!(ctx.validate(false, None), report);
}

#[test]
fn each_undefined_footnote_occurrence_is_reported() {
    let ctx = context();
    add(
        &ctx,
        "a.md",
        "Claim[^missing].\n\nAgain[^missing], see[^1].\n\n[^1]: Defined.\n",
    );

    let report = ctx.validate(false, None);
    let footnotes: Vec<usize> = report
        .warnings
        .iter()
        .filter(|w| w.id == WarningId::UnresolvedFootnoteReference)
        .map(|w| w.location.start_line)
        .collect();
    assert_eq!(footnotes, vec![0, 2]);
    assert_eq!(report.warnings.len(), 2);

    ctx.update_markdown_file(
        "a.md",
        "Claim[^missing].\n\nAgain[^missing], see[^1].\n\n[^1]: Defined.\n\n[^missing]: Found.\n",
    );
    assert!(ctx.validate(false, None).warnings.is_empty());
}
