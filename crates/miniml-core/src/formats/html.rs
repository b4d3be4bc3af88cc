// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTML fragment renderer

use super::element::ElementRenderer;
use crate::ast::{Attributes, SyntaxNode};
use crate::traits::{OutputFormat, RenderConfig, Renderer, Result};
use std::borrow::Cow;

/// Elements that never take content or a closing tag
const VOID_ELEMENTS: [&str; 3] = ["img", "br", "hr"];

/// Renders a syntax tree as an HTML fragment
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl HtmlRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for HtmlRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Html
    }

    fn render(&self, root: &SyntaxNode, _config: &RenderConfig) -> Result<String> {
        Ok(HtmlWriter.render_node(root))
    }
}

/// Element and attribute names are emitted unescaped, so only plain names pass
fn is_markup_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
}

struct HtmlWriter;

impl HtmlWriter {
    fn open_tag(&self, element: &str, attributes: Option<&Attributes>) -> String {
        format!("<{element}{}>", self.render_attributes(attributes))
    }
}

impl ElementRenderer for HtmlWriter {
    fn render_attributes(&self, attributes: Option<&Attributes>) -> String {
        let Some(attributes) = attributes else {
            return String::new();
        };

        let mut output = String::new();
        for (key, value) in attributes {
            if !is_markup_name(key) {
                tracing::debug!(key = key.as_str(), "skipping attribute with invalid name");
                continue;
            }
            output.push(' ');
            output.push_str(key);
            output.push_str("=\"");
            output.push_str(&html_escape::encode_double_quoted_attribute(value));
            output.push('"');
        }
        output
    }

    fn render_text(&self, text: &str) -> String {
        html_escape::encode_text(text).replace('\n', "<br>")
    }

    fn render_verbatim(&self, text: &str) -> String {
        html_escape::encode_text(text).into_owned()
    }

    fn render_element(
        &mut self,
        element: &str,
        attributes: Option<Cow<'_, Attributes>>,
        content: &[SyntaxNode],
    ) -> String {
        if element.starts_with("<>") {
            return String::new();
        }
        if element.is_empty() {
            return self.render_content(content).concat();
        }
        if !is_markup_name(element) {
            tracing::debug!(element, "rendering children of element with invalid name");
            return self.render_content(content).concat();
        }

        let attributes = attributes.as_deref();
        if VOID_ELEMENTS.contains(&element) {
            return self.open_tag(element, attributes);
        }

        let inner = self.render_content(content).concat();
        format!("{}{inner}</{element}>", self.open_tag(element, attributes))
    }

    fn render_element_raw(
        &mut self,
        element: &str,
        attributes: Option<Cow<'_, Attributes>>,
        content: String,
    ) -> String {
        format!("{}{content}</{element}>", self.open_tag(element, attributes.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Color, Modifier, Object, ObjectKind, SegmentKind};
    use crate::parser::parse;
    use crate::widget::WidgetRegistry;
    use pretty_assertions::assert_eq;

    fn html(root: &SyntaxNode) -> String {
        HtmlRenderer.render(root, &RenderConfig::default()).unwrap()
    }

    fn html_of(source: &str) -> String {
        html(&parse(source, &WidgetRegistry::new()).unwrap())
    }

    #[test]
    fn test_text_is_escaped() {
        let output = html(&SyntaxNode::text("<b> & \"q\""));
        assert!(!output.contains('<'));
        assert!(!output.contains('>'));
        assert_eq!(output, "&lt;b&gt; &amp; \"q\"");
    }

    #[test]
    fn test_paragraphs_and_emphasis() {
        assert_eq!(
            html_of("Hello *world*\n\n**bold** and `code`"),
            "<p>Hello <em>world</em></p><p><strong>bold</strong> and <code>code</code></p>"
        );
    }

    #[test]
    fn test_headings_and_lists() {
        assert_eq!(
            html_of("## Title\n\n- a\n- b\n\n1. c"),
            "<h2>Title</h2><ul><li><p>a</p></li><li><p>b</p></li></ul><ol><li><p>c</p></li></ol>"
        );
    }

    #[test]
    fn test_quote() {
        assert_eq!(html_of("> quoted"), "<blockquote><p>quoted</p></blockquote>");
    }

    #[test]
    fn test_link_with_class_and_named_color() {
        let mut link = Object::new(ObjectKind::Link, Some("https://x.org?a=1&b=2".into()), vec![SyntaxNode::text("x")]);
        link.format.push_class("ext");
        link.format.color = Some(Color::Named("primary"));

        assert_eq!(
            html(&SyntaxNode::Object(link)),
            r#"<a href="https://x.org?a=1&amp;b=2" class="ext primary">x</a>"#
        );
    }

    #[test]
    fn test_hex_color_goes_to_style() {
        let mut root = SyntaxNode::span(None, vec![SyntaxNode::text("red")]);
        root.format_mut().unwrap().color = Some(Color::Hex("#ff0000".into()));
        assert_eq!(html(&root), r#"<span style="color:#ff0000">red</span>"#);
    }

    #[test]
    fn test_media_is_void() {
        let mut media = SyntaxNode::media(Some("cat.png".into()), "A cat");
        media.format_mut().unwrap().width = Some(100.0);
        assert_eq!(html(&media), r#"<img alt="A cat" src="cat.png" style="width:100px">"#);
    }

    #[test]
    fn test_code_block_keeps_line_breaks() {
        let code = SyntaxNode::code_block(Some("rust".into()), "let a = 1 < 2;\n");
        assert_eq!(
            html(&code),
            "<pre><code class=\"language-rust\">let a = 1 &lt; 2;\n</code></pre>"
        );
    }

    #[test]
    fn test_sentinel_renders_nothing() {
        let root = SyntaxNode::segment(
            None,
            vec![
                SyntaxNode::raw_object("<>latex-table-options", vec![]),
                SyntaxNode::text("after"),
            ],
        );
        assert_eq!(html(&root), "after");
    }

    #[test]
    fn test_generic_tag_keeps_its_name() {
        assert_eq!(html_of("<kbd .key>Ctrl</kbd>"), r#"<p><kbd class="key">Ctrl</kbd></p>"#);
    }

    #[test]
    fn test_table() {
        let root = SyntaxNode::table(vec![
            SyntaxNode::table_row(true, vec![SyntaxNode::segment(None, vec![SyntaxNode::text("H")])]),
            SyntaxNode::table_row(false, vec![SyntaxNode::segment(None, vec![SyntaxNode::text("v")])]),
        ]);
        assert_eq!(
            html(&root),
            "<table><tr><th>H</th></tr><tr><td>v</td></tr></table>"
        );
    }

    #[test]
    fn test_newline_is_line_break() {
        let root = SyntaxNode::segment(
            Some(SegmentKind::P),
            vec![SyntaxNode::text("a"), SyntaxNode::newline(), SyntaxNode::text("b")],
        );
        assert_eq!(html(&root), "<p>a<br>b</p>");
    }

    #[test]
    fn test_invalid_names_from_imported_trees_are_dropped() {
        let mut tag = Object::new(ObjectKind::Raw, Some("div".into()), vec![SyntaxNode::text("a")]);
        tag.format.set_attribute("x\"><script>", "1");
        tag.format.set_attribute("id", "ok");
        assert_eq!(html(&SyntaxNode::Object(tag)), "<div id=\"ok\">a</div>");

        let tag = Object::new(
            ObjectKind::Raw,
            Some("img src=x onerror=alert(1)".into()),
            vec![SyntaxNode::text("b")],
        );
        assert_eq!(html(&SyntaxNode::Object(tag)), "b");
    }

    #[test]
    fn test_raw_is_not_escaped() {
        let root = SyntaxNode::span(Some(Modifier::Italics), vec![SyntaxNode::raw("<x>")]);
        assert_eq!(html(&root), "<em><x></em>");
    }
}
