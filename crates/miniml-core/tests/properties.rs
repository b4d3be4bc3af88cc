// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end behaviour across parser, normalizer and exporters

use miniml_core::ast::{MetaValue, Modifier, ObjectKind};
use miniml_core::formats::{HtmlRenderer, LatexRenderer, MarkdownRenderer};
use miniml_core::normalize::META_MARGIN_LEFT;
use miniml_core::{
    normalize_lists, parse, ConvertOptions, InputFormat, OutputFormat, RenderConfig, Renderer,
    RendererRegistry, SegmentKind, SyntaxNode, WidgetRegistry,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn parse_plain(source: &str) -> SyntaxNode {
    parse(source, &WidgetRegistry::new()).unwrap()
}

fn blocks(source: &str) -> Vec<SyntaxNode> {
    match parse_plain(source) {
        SyntaxNode::Segment(root) => root.content,
        other => panic!("root is not a segment: {other:?}"),
    }
}

fn p(content: Vec<SyntaxNode>) -> SyntaxNode {
    SyntaxNode::segment(Some(SegmentKind::P), content)
}

fn markdown(root: &SyntaxNode) -> String {
    MarkdownRenderer.render(root, &RenderConfig::default()).unwrap()
}

#[test]
fn emphasis_opens_only_after_non_alphanumerics() {
    assert_eq!(
        blocks("*a* b"),
        vec![p(vec![
            SyntaxNode::span(Some(Modifier::Italics), vec![SyntaxNode::text("a")]),
            SyntaxNode::text(" b"),
        ])]
    );
    assert_eq!(blocks("a*b*"), vec![p(vec![SyntaxNode::text("a*b*")])]);
}

#[test]
fn escaped_delimiters_are_literal() {
    assert_eq!(blocks("\\*a\\*"), vec![p(vec![SyntaxNode::text("*a*")])]);
}

#[test]
fn unknown_widget_tag_stays_generic_markup() {
    let content = match blocks("<Foo x=\"1\">bar</Foo>").remove(0) {
        SyntaxNode::Segment(p) => p.content,
        other => panic!("expected paragraph, got {other:?}"),
    };
    let SyntaxNode::Object(object) = &content[0] else {
        panic!("expected object, got {content:?}");
    };

    assert_eq!(object.kind, ObjectKind::Raw);
    assert_eq!(object.value.as_deref(), Some("Foo"));
    assert_eq!(object.format.attribute("x"), Some("1"));
    assert_eq!(object.content, vec![SyntaxNode::text("bar")]);
}

#[test]
fn flat_import_lists_regroup_and_re_emit() {
    let li = |text: &str, margin: i64| {
        let mut item = SyntaxNode::segment(Some(SegmentKind::Li), vec![p(vec![SyntaxNode::text(text)])]);
        item.set_metadata(META_MARGIN_LEFT, MetaValue::Integer(margin));
        item
    };
    let root = SyntaxNode::segment(
        None,
        vec![
            SyntaxNode::segment(Some(SegmentKind::Ul), vec![li("a", 0), li("b", 0), li("c", 1)]),
            SyntaxNode::segment(Some(SegmentKind::Ol), vec![li("d", 0)]),
        ],
    );

    let (normalized, modified) = normalize_lists(root);
    assert!(modified);

    let group = &normalized.content().unwrap()[0];
    let [ul, ol] = group.content().unwrap() else {
        panic!("expected two containers in {group:?}");
    };
    assert_eq!(ul.segment_kind(), Some(SegmentKind::Ul));
    assert_eq!(ol.segment_kind(), Some(SegmentKind::Ol));

    let kinds: Vec<_> = ul.content().unwrap().iter().map(SyntaxNode::segment_kind).collect();
    assert_eq!(kinds, vec![Some(SegmentKind::Li), Some(SegmentKind::Li), Some(SegmentKind::Ul)]);

    assert_eq!(markdown(&normalized), "- a\n- b\n  - c\n\n1. d\n");
}

#[test]
fn one_document_through_every_exporter() {
    let source = "# Title\n\nSome *text* with [a link](https://example.com).\n\n- one\n- two\n\n```\ncode\n```";
    let registry = RendererRegistry::with_defaults();
    let options = ConvertOptions::default();

    for format in OutputFormat::ALL {
        let output = registry
            .convert(source, InputFormat::Miniml, format, &options)
            .unwrap_or_else(|e| panic!("{format}: {e}"));
        assert!(!output.is_empty(), "{format} produced nothing");
    }
}

#[test]
fn dump_then_load_keeps_the_tree() {
    let source = "## Table\n\n<table><tr><th>A</th></tr><tr><td .x>1</td></tr></table>\n\n> _q_{.quiet}";
    let registry = RendererRegistry::with_defaults();
    let options = ConvertOptions::default();

    let dump = registry
        .convert(source, InputFormat::Miniml, OutputFormat::Dump, &options)
        .unwrap();
    let html_direct = registry
        .convert(source, InputFormat::Miniml, OutputFormat::Html, &options)
        .unwrap();
    let html_loaded = registry
        .convert(&dump, InputFormat::Ast, OutputFormat::Html, &options)
        .unwrap();

    assert_eq!(html_loaded, html_direct);
}

/// One inline construct of the core syntax
fn inline_piece() -> impl Strategy<Value = String> {
    let word = "[a-z]{1,6}";
    prop_oneof![
        4 => word.prop_map(|w| w.to_string()),
        1 => word.prop_map(|w| format!("*{w}*")),
        1 => word.prop_map(|w| format!("_{w}_")),
        1 => word.prop_map(|w| format!("**{w}**")),
        1 => word.prop_map(|w| format!("`{w}`")),
        1 => word.prop_map(|w| format!("[{w}](/{w})")),
        1 => word.prop_map(|w| format!("![{w}]({w}.png)")),
        1 => word.prop_map(|w| format!("_{w} **{w}**_")),
        1 => word.prop_map(|w| format!("_{w}_{{.c{w}}}")),
        1 => Just("\\*".to_string()),
        1 => Just("\\[x\\]".to_string()),
        1 => Just("\\<".to_string()),
        1 => Just("a\\\nb".to_string()),
    ]
}

fn line() -> impl Strategy<Value = String> {
    prop::collection::vec(inline_piece(), 1..6).prop_map(|pieces| pieces.join(" "))
}

fn block() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => line(),
        1 => (1..=4usize, line()).prop_map(|(level, text)| format!("{} {text}", "#".repeat(level))),
        1 => line().prop_map(|text| format!("> {text}")),
        1 => prop::collection::vec((any::<bool>(), line()), 1..5).prop_map(|items| {
            let mut out = Vec::new();
            for (index, (nested, text)) in items.into_iter().enumerate() {
                let indent = if nested && index > 0 { "  " } else { "" };
                out.push(format!("{indent}- {text}"));
            }
            out.join("\n")
        }),
        1 => "[a-z]{0,4}".prop_map(|lang| format!("```{lang}\nlet x = 1;\n```")),
    ]
}

fn document() -> impl Strategy<Value = String> {
    prop::collection::vec(block(), 1..6).prop_map(|blocks| blocks.join("\n\n"))
}

proptest! {
    #[test]
    fn markdown_output_reparses_to_the_same_tree(source in document()) {
        let first = parse_plain(&source);
        let output = markdown(&first);
        let second = parse_plain(&output);
        prop_assert_eq!(first, second, "re-emitted as:\n{}", output);
    }

    #[test]
    fn plain_text_is_one_trimmed_leaf(text in "[a-zA-Z][a-zA-Z0-9 ,.;:?'\"()=-]{0,40}") {
        let expected = vec![p(vec![SyntaxNode::text(text.trim_end())])];
        prop_assert_eq!(blocks(&text), expected);
    }

    #[test]
    fn html_text_never_leaks_angle_brackets(text in "[<>&\"a-z ]{0,30}") {
        let output = HtmlRenderer.render(&SyntaxNode::text(text), &RenderConfig::default()).unwrap();
        prop_assert!(!output.contains('<') && !output.contains('>'), "{}", output);
    }

    #[test]
    fn latex_spacing_pragma_normalizes_surrounding_blanks(before in 0..4usize, after in 0..4usize) {
        let source = format!(
            "a{}<cite pragma-spc1>k</cite>{}b",
            " ".repeat(before),
            " ".repeat(after)
        );
        let root = parse_plain(&source);
        let output = LatexRenderer.render(&root, &RenderConfig::default()).unwrap();
        prop_assert_eq!(output, "a \\cite{k} b\n\n");
    }
}
