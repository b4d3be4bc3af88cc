// SPDX-License-Identifier: AGPL-3.0-or-later
//! MiniML re-emitter
//!
//! Writes a tree back as MiniML source. Parsing the output of a parsed
//! document yields the same tree, as long as no widget took part and no
//! emphasis ends in whitespace: trailing blanks are moved outside the closing
//! delimiter so the output stays valid for stricter Markdown readers.

use crate::ast::{
    CodeBlock, Format, Modifier, Object, ObjectKind, Segment, SegmentKind, Span, SyntaxNode,
    Table, TableRow,
};
use crate::traits::{OutputFormat, RenderConfig, Renderer, Result};

/// Nesting step for list item and quote continuation lines
const NESTED_INDENT: &str = "  ";

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for MarkdownRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Markdown
    }

    fn render(&self, root: &SyntaxNode, _config: &RenderConfig) -> Result<String> {
        let mut writer = MarkdownWriter::default();
        writer.render_blocks(std::slice::from_ref(root), "", true);
        Ok(writer.out)
    }
}

fn is_escaped(c: char) -> bool {
    matches!(
        c,
        '*' | '_' | '\\' | '`' | '!' | '[' | ']' | '{' | '}' | '<'
    )
}

/// Byte offset of the character that would turn a line into a block marker
fn block_marker(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    match bytes.first()? {
        b'#' | b'>' => Some(0),
        b'-' | b'+' if bytes.get(1) == Some(&b' ') => Some(0),
        b'0'..=b'9' => {
            let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
            matches!(bytes.get(digits), Some(b'.' | b')')).then_some(digits)
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct TextContext {
    block_start: bool,
    in_tag: bool,
    after_bare_link: bool,
}

fn escape_text(text: &str, context: TextContext) -> String {
    let marker = if context.block_start {
        block_marker(text)
    } else {
        None
    };

    let mut output = String::with_capacity(text.len() + 4);
    for (index, c) in text.char_indices() {
        if c == '\n' {
            output.push_str(if context.in_tag { "\n" } else { "\\\n" });
            continue;
        }
        if is_escaped(c)
            || marker == Some(index)
            || (index == 0 && c == '(' && context.after_bare_link)
        {
            output.push('\\');
        }
        output.push(c);
    }
    output
}

fn plain_text(nodes: &[SyntaxNode], output: &mut String) {
    for node in nodes {
        match node {
            SyntaxNode::Text(text) => output.push_str(&text.value),
            SyntaxNode::Raw(raw) => output.push_str(&raw.value),
            other => plain_text(other.content().unwrap_or_default(), output),
        }
    }
}

fn attribute(key: &str, value: &str) -> String {
    if value.is_empty() {
        key.to_string()
    } else if value.contains('"') {
        format!("{key}={value}")
    } else {
        format!("{key}=\"{value}\"")
    }
}

/// Attribute tokens describing `format`, as used in tags and `{..}` blocks
fn format_parts(format: &Format, skip: &[&str]) -> Vec<String> {
    let mut parts = Vec::new();

    for class in format.class_list.iter().flatten() {
        parts.push(format!(".{class}"));
    }
    for (key, value) in format.attributes.iter().flatten() {
        if !skip.contains(&key.as_str()) {
            parts.push(attribute(key, value));
        }
    }

    let mut style = Vec::new();
    if let Some(color) = &format.color {
        style.push(format!("color: {color}"));
    }
    if let Some(align) = format.align {
        style.push(format!("text-align: {}", align.as_str()));
    }
    if let Some(width) = format.width {
        style.push(format!("width: {width}px"));
    }
    if let Some(height) = format.height {
        style.push(format!("height: {height}px"));
    }
    if !style.is_empty() {
        parts.push(format!("style=\"{}\"", style.join("; ")));
    }

    parts
}

#[derive(Default)]
struct MarkdownWriter {
    out: String,
    /// Open emphasis spans, picks the delimiter character
    emphasis: usize,
    /// Open generic tags, inside which line breaks are literal
    tags: usize,
    /// The last inline was a link or media without URL
    bare_link: bool,
}

impl MarkdownWriter {
    fn render_blocks(&mut self, nodes: &[SyntaxNode], indent: &str, separate: bool) {
        for node in nodes {
            match node {
                SyntaxNode::Segment(group) if group.kind.is_none() => {
                    self.render_blocks(&group.content, indent, separate);
                }
                SyntaxNode::Object(object) if object.is_sentinel() => {}
                _ => {
                    if separate && !self.out.is_empty() {
                        self.out.push('\n');
                    }
                    self.render_block(node, indent);
                }
            }
        }
    }

    fn render_block(&mut self, node: &SyntaxNode, indent: &str) {
        match node {
            SyntaxNode::Segment(segment) => self.render_segment(segment, indent),
            SyntaxNode::CodeBlock(code) => self.render_code_block(code, indent),
            other => {
                self.out.push_str(indent);
                self.render_inline(std::slice::from_ref(other), true);
                self.out.push('\n');
            }
        }
    }

    fn render_segment(&mut self, segment: &Segment, indent: &str) {
        let Some(kind) = segment.kind else {
            self.render_blocks(&segment.content, indent, false);
            return;
        };
        let nested = format!("{indent}{NESTED_INDENT}");

        match kind {
            SegmentKind::P => {
                self.out.push_str(indent);
                self.render_inline(&segment.content, true);
                self.out.push('\n');
            }
            SegmentKind::H1 | SegmentKind::H2 | SegmentKind::H3 | SegmentKind::H4 => {
                let level = kind.heading_level().unwrap_or(1);
                self.out.push_str(indent);
                self.out.push_str(&"#".repeat(level));
                self.out.push(' ');
                self.render_inline(&segment.content, true);
                self.out.push('\n');
            }
            SegmentKind::Ul | SegmentKind::Ol => {
                for child in &segment.content {
                    match child {
                        SyntaxNode::Segment(item) if item.kind == Some(SegmentKind::Li) => {
                            self.render_item(item, indent, kind);
                        }
                        other => self.render_block(other, &nested),
                    }
                }
            }
            SegmentKind::Li => self.render_item(segment, indent, SegmentKind::Ul),
            SegmentKind::Quote => {
                for (index, child) in segment.content.iter().enumerate() {
                    match child {
                        SyntaxNode::Segment(p) if p.kind == Some(SegmentKind::P) => {
                            self.out.push_str(indent);
                            self.out.push_str("> ");
                            self.render_inline(&p.content, true);
                            self.out.push('\n');
                        }
                        other => {
                            if index == 0 {
                                self.out.push_str(indent);
                                self.out.push_str(">\n");
                            }
                            self.render_block(other, &nested);
                        }
                    }
                }
            }
        }
    }

    fn render_item(&mut self, item: &Segment, indent: &str, list: SegmentKind) {
        self.out.push_str(indent);
        self.out.push_str(if list == SegmentKind::Ol { "1. " } else { "- " });

        let rest = match item.content.split_first() {
            Some((SyntaxNode::Segment(p), rest)) if p.kind == Some(SegmentKind::P) => {
                self.render_inline(&p.content, false);
                rest
            }
            _ => &item.content[..],
        };
        self.out.push('\n');

        let nested = format!("{indent}{NESTED_INDENT}");
        for child in rest {
            self.render_block(child, &nested);
        }
    }

    fn render_code_block(&mut self, code: &CodeBlock, indent: &str) {
        self.out.push_str(indent);
        self.out.push_str("```");
        self.out.push_str(code.lang.as_deref().unwrap_or_default());
        self.out.push('\n');
        // The closing fence directly follows the body so no indentation leaks into it
        self.out.push_str(&code.content);
        self.out.push_str("```\n");
    }

    fn render_inline(&mut self, nodes: &[SyntaxNode], block_start: bool) {
        for (index, node) in nodes.iter().enumerate() {
            let after_bare_link = std::mem::take(&mut self.bare_link);
            match node {
                SyntaxNode::Text(text) => {
                    let context = TextContext {
                        block_start: block_start && index == 0,
                        in_tag: self.tags > 0,
                        after_bare_link,
                    };
                    self.out.push_str(&escape_text(&text.value, context));
                }
                SyntaxNode::Newline(_) => self.out.push_str("\\\n"),
                SyntaxNode::Raw(raw) => self.out.push_str(&raw.value),
                SyntaxNode::Span(span) => self.render_span(span),
                SyntaxNode::Object(object) => self.render_object(object),
                SyntaxNode::CodeBlock(code) => {
                    self.out.push('`');
                    self.out.push_str(&code.content);
                    self.out.push('`');
                }
                SyntaxNode::Segment(segment) => self.render_inline(&segment.content, false),
                SyntaxNode::Table(table) => self.render_table(table),
                SyntaxNode::TableRow(row) => self.render_row(row),
            }
        }
    }

    fn render_attribute_block(&mut self, format: &Format, skip: &[&str]) {
        let parts = format_parts(format, skip);
        if !parts.is_empty() {
            self.out.push('{');
            self.out.push_str(&parts.join(" "));
            self.out.push('}');
        }
    }

    fn render_span(&mut self, span: &Span) {
        let modifier = match span.modifier {
            Some(Modifier::Code) => {
                let mut code = String::new();
                plain_text(&span.content, &mut code);
                self.out.push('`');
                self.out.push_str(&code);
                self.out.push('`');
                self.render_attribute_block(&span.format, &[]);
                return;
            }
            Some(modifier) => modifier,
            None if span.format.is_empty() => {
                self.render_inline(&span.content, false);
                return;
            }
            None => {
                self.render_tag("span", &span.format, &span.content);
                return;
            }
        };

        // Nested emphasis alternates characters so an inner opener never
        // closes the outer span
        let delimiter = match (modifier, self.emphasis % 2) {
            (Modifier::Bold, 0) => "__",
            (Modifier::Bold, _) => "**",
            (_, 0) => "_",
            _ => "*",
        };

        self.out.push_str(delimiter);
        let start = self.out.len();
        self.emphasis += 1;
        self.render_inline(&span.content, false);
        self.emphasis -= 1;

        let kept = start + self.out[start..].trim_end_matches([' ', '\t']).len();
        let moved = if kept > start {
            self.out.split_off(kept)
        } else {
            String::new()
        };

        self.out.push_str(delimiter);
        self.render_attribute_block(&span.format, &[]);
        self.out.push_str(&moved);
    }

    fn render_object(&mut self, object: &Object) {
        match object.kind {
            ObjectKind::Link => {
                self.out.push('[');
                self.render_inline(&object.content, false);
                self.out.push(']');
                if let Some(url) = &object.value {
                    self.out.push('(');
                    self.out.push_str(url);
                    self.out.push(')');
                }
                self.render_attribute_block(&object.format, &[]);
                self.bare_link = object.value.is_none();
            }
            ObjectKind::Media => {
                self.out.push_str("![");
                self.out.push_str(object.format.attribute("alt").unwrap_or_default());
                self.out.push(']');
                if let Some(url) = &object.value {
                    self.out.push('(');
                    self.out.push_str(url);
                    self.out.push(')');
                }
                self.render_attribute_block(&object.format, &["alt"]);
                self.bare_link = object.value.is_none();
            }
            ObjectKind::Raw if object.is_sentinel() => {}
            ObjectKind::Raw => match object.value.as_deref() {
                Some(name) => self.render_tag(name, &object.format, &object.content),
                None => self.render_inline(&object.content, false),
            },
        }
    }

    fn open_tag(&mut self, name: &str, format: &Format) {
        self.out.push('<');
        self.out.push_str(name);
        for part in format_parts(format, &[]) {
            self.out.push(' ');
            self.out.push_str(&part);
        }
    }

    fn render_tag(&mut self, name: &str, format: &Format, content: &[SyntaxNode]) {
        self.open_tag(name, format);
        if content.is_empty() {
            self.out.push_str("/>");
            return;
        }

        self.out.push('>');
        self.tags += 1;
        self.render_inline(content, false);
        self.tags -= 1;
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
    }

    fn render_table(&mut self, table: &Table) {
        self.open_tag("table", &table.format);
        self.out.push('>');
        self.tags += 1;
        for row in &table.content {
            match row {
                SyntaxNode::TableRow(row) => self.render_row(row),
                other => self.render_inline(std::slice::from_ref(other), false),
            }
        }
        self.tags -= 1;
        self.out.push_str("</table>");
    }

    fn render_row(&mut self, row: &TableRow) {
        self.open_tag("tr", &row.format);
        if row.header && row.content.is_empty() {
            self.out.push_str(" header");
        }
        self.out.push('>');

        let cell = if row.header { "th" } else { "td" };
        for node in &row.content {
            match node {
                SyntaxNode::Segment(segment) if segment.kind.is_none() => {
                    self.open_tag(cell, &segment.format);
                    self.out.push('>');
                    self.tags += 1;
                    self.render_inline(&segment.content, false);
                    self.tags -= 1;
                }
                other => {
                    self.out.push('<');
                    self.out.push_str(cell);
                    self.out.push('>');
                    self.tags += 1;
                    self.render_inline(std::slice::from_ref(other), false);
                    self.tags -= 1;
                }
            }
            self.out.push_str("</");
            self.out.push_str(cell);
            self.out.push('>');
        }
        self.out.push_str("</tr>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Align, Color};
    use crate::parser::parse;
    use crate::widget::WidgetRegistry;
    use pretty_assertions::assert_eq;

    fn markdown(root: &SyntaxNode) -> String {
        MarkdownRenderer.render(root, &RenderConfig::default()).unwrap()
    }

    fn reparse(source: &str) -> (SyntaxNode, String, SyntaxNode) {
        let widgets = WidgetRegistry::new();
        let first = parse(source, &widgets).unwrap();
        let output = markdown(&first);
        let second = parse(&output, &widgets).unwrap();
        (first, output, second)
    }

    fn assert_idempotent(source: &str) {
        let (first, output, second) = reparse(source);
        assert_eq!(first, second, "re-emitted as:\n{output}");
    }

    #[test]
    fn test_blocks() {
        let (_, output, _) = reparse("# Title\ntext *a* **b**\n- x\n  1. y\n> q\n```rs\nfn f() {}\n```");
        assert_eq!(
            output,
            "# Title\n\ntext _a_ __b__\n\n- x\n  1. y\n\n> q\n\n```rs\nfn f() {}\n```\n"
        );
    }

    #[test]
    fn test_nested_emphasis_alternates() {
        let (_, output, _) = reparse("_a **b *c*** d_");
        assert_eq!(output, "_a **b _c_** d_\n");
    }

    #[test]
    fn test_trailing_space_moves_outside() {
        let root = SyntaxNode::segment(
            Some(SegmentKind::P),
            vec![
                SyntaxNode::span(Some(Modifier::Bold), vec![SyntaxNode::text("a  ")]),
                SyntaxNode::text("b"),
            ],
        );
        assert_eq!(markdown(&root), "__a__  b\n");
    }

    #[test]
    fn test_text_is_escaped() {
        let root = SyntaxNode::segment(
            Some(SegmentKind::P),
            vec![SyntaxNode::text("1. a*b_c [d] <e> {f} \\ `g` !")],
        );
        assert_eq!(
            markdown(&root),
            "1\\. a\\*b\\_c \\[d\\] \\<e> \\{f\\} \\\\ \\`g\\` \\!\n"
        );
    }

    #[test]
    fn test_format_block() {
        let mut span = Span {
            modifier: Some(Modifier::Italics),
            content: vec![SyntaxNode::text("x")],
            ..Default::default()
        };
        span.format.push_class("note");
        span.format.set_attribute("id", "n1");
        span.format.color = Some(Color::Named("danger"));
        span.format.align = Some(Align::Center);
        span.format.width = Some(40.0);

        assert_eq!(
            markdown(&SyntaxNode::Span(span)),
            "_x_{.note id=\"n1\" style=\"color: danger; text-align: center; width: 40px\"}\n"
        );
    }

    #[test]
    fn test_media_drops_alt_from_block() {
        let (_, output, _) = reparse("![A cat](cat.png){.round}");
        assert_eq!(output, "![A cat](cat.png){.round}\n");
    }

    #[test]
    fn test_tags() {
        let (_, output, _) = reparse("<kbd .key title=\"Copy\">Ctrl</kbd> <hr/>");
        assert_eq!(output, "<kbd .key title=\"Copy\">Ctrl</kbd> <hr/>\n");
    }

    #[test]
    fn test_table_is_emitted_as_tags() {
        let (_, output, _) = reparse("<table><tr><th>A</th></tr><tr><td .n>1</td></tr></table>");
        assert_eq!(output, "<table><tr><th>A</th></tr><tr><td .n>1</td></tr></table>\n");
    }

    #[test]
    fn test_sentinel_is_skipped() {
        let root = SyntaxNode::segment(
            None,
            vec![
                SyntaxNode::raw_object("<>declare", vec![]),
                SyntaxNode::segment(Some(SegmentKind::P), vec![SyntaxNode::text("a")]),
            ],
        );
        assert_eq!(markdown(&root), "a\n");
    }

    #[test]
    fn test_idempotent_documents() {
        assert_idempotent("# Title\n\nPlain text with *em*, **strong** and `code`.");
        assert_idempotent("- one\n- two\n  - nested\n    1. deep\n  after nested\n- three\n\n1) x\n2) y");
        assert_idempotent("> quote\n> more\n  - inside\n\ntext");
        assert_idempotent("Link [to *docs*](/docs){.ext} and [bare] (paren) ![img](a.png)");
        assert_idempotent("Escapes \\* \\_ \\[ \\< \\{ \\\\ and a line\\\nbreak");
        assert_idempotent("#not a heading? \\# yes\n\n\\- dash\n\n3\\. three");
        assert_idempotent("<span style=\"color: #ff0000; width: 10px\">red</span> _x_{style=\"font-weight: bold\"}");
        assert_idempotent("<note .a>multi\nline *em*</note>");
        assert_idempotent("- item\n  ```\n  code\n  ```\n- next");
        assert_idempotent("## H2\n#### H4\n##### five");
    }
}
