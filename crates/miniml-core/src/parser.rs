// SPDX-License-Identifier: AGPL-3.0-or-later
//! Recursive-descent MiniML parser
//!
//! Block structure is line oriented and driven by indentation. Inline content
//! is scanned character by character without a tokenizer; an unmatched
//! delimiter falls back to literal text instead of failing the parse.

use crate::ast::{
    Format, Modifier, Object, ObjectKind, Segment, SegmentKind, SyntaxNode, Table, TableRow,
};
use crate::traits::{ConversionError, Result};
use crate::widget::{self, WidgetRegistry};
use std::borrow::Cow;
use std::collections::HashSet;
use unscanny::Scanner;

/// Nesting limit for fragments and blocks
///
/// Block nesting past the limit is rejected; inline openers past it are kept
/// as literal text.
const MAX_NESTING: usize = 32;

const LIST_MARKERS: [&str; 3] = ["- ", "+ ", "* "];
const EMPHASIS_DELIMITERS: [&str; 4] = ["**", "__", "*", "_"];

fn is_special(c: char) -> bool {
    matches!(
        c,
        '*' | '_' | '\\' | '`' | '\n' | '!' | '[' | ']' | '}' | '<'
    )
}

fn is_attr_terminator(c: char) -> bool {
    c == '}' || c == '>' || c == '/' || c.is_whitespace()
}

fn is_attr_name_terminator(c: char) -> bool {
    c == '=' || is_attr_terminator(c)
}

fn is_indent(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn is_element_name(c: char) -> bool {
    c == '-' || c == ':' || c == '_' || c.is_alphanumeric()
}

/// Parser owning its widget registry
#[derive(Debug, Default)]
pub struct MinimlParser {
    widgets: WidgetRegistry,
}

impl MinimlParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_widgets(widgets: WidgetRegistry) -> Self {
        Self { widgets }
    }

    pub fn widgets(&self) -> &WidgetRegistry {
        &self.widgets
    }

    pub fn widgets_mut(&mut self) -> &mut WidgetRegistry {
        &mut self.widgets
    }

    /// Parse a document into its root segment
    pub fn parse(&self, input: &str) -> Result<SyntaxNode> {
        parse(input, &self.widgets)
    }
}

/// Parse `input` into a root `Segment`, dispatching registered widgets
pub fn parse(input: &str, widgets: &WidgetRegistry) -> Result<SyntaxNode> {
    let input: Cow<'_, str> = if input.contains('\r') {
        Cow::Owned(input.replace("\r\n", "\n"))
    } else {
        Cow::Borrowed(input)
    };

    let mut parser = Parser {
        s: Scanner::new(&input),
        widgets,
        depth: 0,
        failed: HashSet::new(),
    };
    parser.parse_document()
}

/// Outcome of scanning at a special character
enum Inline<'s> {
    Node(SyntaxNode),
    /// A widget asked for its tag to be removed
    Dropped,
    Text(&'s str),
}

struct Parser<'s, 'w> {
    s: Scanner<'s>,
    widgets: &'w WidgetRegistry,
    depth: usize,
    /// Offsets of openers already known to be unmatched
    failed: HashSet<usize>,
}

impl<'s, 'w> Parser<'s, 'w> {
    fn parse_document(&mut self) -> Result<SyntaxNode> {
        let mut root = Vec::new();
        self.parse_segment(0, &mut root)?;
        Ok(SyntaxNode::segment(None, root))
    }

    fn error_here(&self, message: impl Into<String>) -> ConversionError {
        let before = self.s.before();
        let line = before.matches('\n').count() + 1;
        let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
        ConversionError::ParseError {
            line,
            column,
            message: message.into(),
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error_here(format!("nesting deeper than {MAX_NESTING} levels")));
        }
        Ok(())
    }

    /// Whether an inline opener may scan its content one level deeper
    fn can_descend(&self) -> bool {
        self.depth < MAX_NESTING
    }

    fn parse_segment(&mut self, indent: usize, content: &mut Vec<SyntaxNode>) -> Result<()> {
        self.enter()?;
        let result = self.scan_segment(indent, content);
        self.depth -= 1;
        result
    }

    fn scan_segment(&mut self, indent: usize, content: &mut Vec<SyntaxNode>) -> Result<()> {
        while !self.s.done() {
            let start = self.s.cursor();
            if self.skip_blank_line() {
                continue;
            }

            let current = self.s.eat_while(is_indent).len();
            if current < indent {
                self.s.jump(start);
                return Ok(());
            }

            if self.s.eat_if("```") {
                tracing::trace!(indent = current, "code block");
                content.push(self.parse_code_block());
                continue;
            }

            if let Some(level) = self.parse_heading_marker() {
                tracing::trace!(indent = current, level, "heading");
                let block = self.parse_text_block()?;
                content.push(SyntaxNode::segment(Some(SegmentKind::heading(level)), block));
                continue;
            }

            if self.s.eat_if('>') {
                tracing::trace!(indent = current, "quote");
                let mut quote = reopen(content, SegmentKind::Quote);
                let block = self.parse_text_block()?;
                quote.content.push(SyntaxNode::segment(Some(SegmentKind::P), block));
                self.parse_segment(current + 1, &mut quote.content)?;
                content.push(SyntaxNode::Segment(quote));
                continue;
            }

            if let Some(kind) = self.parse_list_marker() {
                tracing::trace!(indent = current, ?kind, "list item");
                let mut list = reopen(content, kind);
                let mut item = Segment::new(Some(SegmentKind::Li), Vec::new());
                let block = self.parse_text_block()?;
                item.content.push(SyntaxNode::segment(Some(SegmentKind::P), block));
                self.parse_segment(current + 1, &mut item.content)?;
                list.content.push(SyntaxNode::Segment(item));
                content.push(SyntaxNode::Segment(list));
                continue;
            }

            let mut block = self.parse_text_block()?;
            match block.as_slice() {
                [] => {}
                [SyntaxNode::Table(_)] => content.append(&mut block),
                _ => content.push(SyntaxNode::segment(Some(SegmentKind::P), block)),
            }
        }

        Ok(())
    }

    /// Consume a line holding only whitespace
    fn skip_blank_line(&mut self) -> bool {
        let after = self.s.after();
        let line = after.find('\n').map_or(after, |end| &after[..end]);
        if !line.trim().is_empty() {
            return false;
        }

        self.s.jump(self.s.cursor() + line.len());
        self.s.eat_if('\n');
        true
    }

    fn parse_code_block(&mut self) -> SyntaxNode {
        let lang = self.s.eat_until('\n').trim();
        self.s.eat_if('\n');
        // An unclosed fence runs to the end of input
        let body = self.s.eat_until("```");
        self.s.eat_if("```");

        let lang = (!lang.is_empty()).then(|| lang.to_string());
        SyntaxNode::code_block(lang, body)
    }

    fn parse_heading_marker(&mut self) -> Option<usize> {
        (1..=4).rev().find(|&level| self.s.eat_if(&"####"[..level]))
    }

    fn parse_list_marker(&mut self) -> Option<SegmentKind> {
        if LIST_MARKERS.iter().any(|marker| self.s.eat_if(*marker)) {
            return Some(SegmentKind::Ul);
        }

        let start = self.s.cursor();
        let digits = self.s.eat_while(|c: char| c.is_ascii_digit());
        if !digits.is_empty() && (self.s.eat_if('.') || self.s.eat_if(')')) {
            return Some(SegmentKind::Ol);
        }

        self.s.jump(start);
        None
    }

    fn parse_text_block(&mut self) -> Result<Vec<SyntaxNode>> {
        let (mut content, _) = self.parse_fragment("\n", false)?;
        trim_block(&mut content);
        Ok(content)
    }

    /// Scan inline content up to `term`, returning whether `term` was found
    ///
    /// A `single_line` fragment gives up at an unescaped line break, which is
    /// left unconsumed.
    fn parse_fragment(&mut self, term: &str, single_line: bool) -> Result<(Vec<SyntaxNode>, bool)> {
        self.enter()?;
        let result = self.scan_fragment(term, single_line);
        self.depth -= 1;
        result
    }

    fn scan_fragment(&mut self, term: &str, single_line: bool) -> Result<(Vec<SyntaxNode>, bool)> {
        let mut result = Vec::new();
        let mut closed = false;

        while !self.s.done() {
            let text = self.s.eat_until(is_special);
            append_text(&mut result, text);

            if self.s.done() {
                break;
            }

            if self.s.eat_if(term) {
                closed = true;
                break;
            }

            if single_line && self.s.at('\n') {
                break;
            }

            if self.s.eat_if('\\') {
                let start = self.s.cursor();
                match self.s.eat() {
                    Some('\n') => result.push(SyntaxNode::newline()),
                    Some(_) => append_text(&mut result, self.s.from(start)),
                    None => append_text(&mut result, "\\"),
                }
                continue;
            }

            match self.parse_inline()? {
                Inline::Node(mut node) => {
                    self.parse_attribute_block(&mut node);
                    result.push(node);
                }
                Inline::Dropped => {}
                Inline::Text(text) => append_text(&mut result, text),
            }
        }

        result.retain(|node| !is_layout_text(node));
        Ok((result, closed))
    }

    /// Emphasis opens at the start of input or after a non-alphanumeric char
    fn can_open_emphasis(&self) -> bool {
        self.s.scout(-1).map_or(true, |c| !c.is_alphanumeric())
    }

    fn parse_inline(&mut self) -> Result<Inline<'s>> {
        let start = self.s.cursor();

        match self.s.peek() {
            Some('*' | '_') if self.can_open_emphasis() => self.parse_emphasis(start),
            Some('`') => Ok(self.parse_code_span(start)),
            Some('!') if self.s.at("![") => Ok(self.parse_media(start)),
            Some('[') => self.parse_link(start),
            Some('<') => {
                self.s.eat();
                self.parse_tag(start)
            }
            _ => {
                self.s.eat();
                Ok(Inline::Text(self.s.from(start)))
            }
        }
    }

    fn parse_emphasis(&mut self, start: usize) -> Result<Inline<'s>> {
        let Some(delimiter) = EMPHASIS_DELIMITERS
            .into_iter()
            .find(|delimiter| self.s.eat_if(*delimiter))
        else {
            self.s.eat();
            return Ok(Inline::Text(self.s.from(start)));
        };

        let modifier = if delimiter.len() == 2 {
            Modifier::Bold
        } else {
            Modifier::Italics
        };

        if !self.can_descend() {
            tracing::debug!(delimiter, offset = start, "emphasis nested too deep, kept as text");
        } else if !self.failed.contains(&start) {
            let (content, closed) = self.parse_fragment(delimiter, true)?;
            if closed {
                return Ok(Inline::Node(SyntaxNode::span(Some(modifier), content)));
            }
            tracing::debug!(delimiter, offset = start, "unmatched emphasis kept as text");
            self.failed.insert(start);
        }

        self.s.jump(start + delimiter.len());
        Ok(Inline::Text(delimiter))
    }

    /// Code spans are literal: no escapes and no nested markup
    fn parse_code_span(&mut self, start: usize) -> Inline<'s> {
        self.s.eat();
        let body = self.s.eat_until(|c| c == '`' || c == '\n');
        if self.s.eat_if('`') {
            let content = if body.is_empty() {
                Vec::new()
            } else {
                vec![SyntaxNode::text(body)]
            };
            return Inline::Node(SyntaxNode::span(Some(Modifier::Code), content));
        }

        tracing::debug!(offset = start, "unmatched code delimiter kept as text");
        self.s.jump(start + 1);
        Inline::Text("`")
    }

    fn parse_media(&mut self, start: usize) -> Inline<'s> {
        self.s.eat_if("![");
        let alt = self.s.eat_until(|c| c == ']' || c == '\n');
        if !self.s.eat_if(']') {
            self.s.jump(start + 1);
            return Inline::Text("!");
        }

        let url = self.parse_url();
        Inline::Node(SyntaxNode::media(url, alt))
    }

    fn parse_link(&mut self, start: usize) -> Result<Inline<'s>> {
        self.s.eat();
        if self.failed.contains(&start) || !self.can_descend() {
            return Ok(Inline::Text("["));
        }

        let (content, closed) = self.parse_fragment("]", true)?;
        if !closed {
            tracing::debug!(offset = start, "unmatched link bracket kept as text");
            self.failed.insert(start);
            self.s.jump(start + 1);
            return Ok(Inline::Text("["));
        }

        let url = self.parse_url();
        Ok(Inline::Node(SyntaxNode::link(url, content)))
    }

    fn parse_url(&mut self) -> Option<String> {
        let start = self.s.cursor();
        if !self.s.eat_if('(') {
            return None;
        }

        let url = self.s.eat_until(|c| c == ')' || c == '\n');
        if self.s.eat_if(')') {
            Some(url.to_string())
        } else {
            self.s.jump(start);
            None
        }
    }

    /// Scan `<name attrs>content</name>` or `<name attrs/>`, the `<` is consumed
    fn parse_tag(&mut self, start: usize) -> Result<Inline<'s>> {
        let name = self.s.eat_while(is_element_name);
        if name.is_empty() || self.failed.contains(&start) {
            self.s.jump(start + 1);
            return Ok(Inline::Text("<"));
        }

        let mut tag = Object::new(ObjectKind::Raw, Some(name.to_string()), Vec::new());
        let mut opened = false;
        let mut self_closing = false;

        while !self.s.done() {
            self.s.eat_whitespace();
            if self.s.eat_if('>') {
                opened = true;
                break;
            }
            if self.s.eat_if("/>") {
                opened = true;
                self_closing = true;
                break;
            }

            let before = self.s.cursor();
            self.parse_attribute(&mut tag.format);
            if self.s.cursor() == before {
                self.s.eat();
            }
        }

        if !opened {
            return Ok(self.degrade_tag(start, name));
        }

        let bold = fold_style(&mut tag.format);
        let widgets = self.widgets;
        let widget = name
            .starts_with(char::is_uppercase)
            .then(|| widgets.get(name))
            .flatten();
        let verbatim = widget.is_some_and(|w| w.schema().verbatim);
        let closing = format!("</{name}>");

        let content = if self_closing {
            match widget {
                Some(widget) if verbatim => widget.parse_verbatim_content(""),
                _ => Vec::new(),
            }
        } else if let Some(widget) = widget.filter(|_| verbatim) {
            let body = self.s.eat_until(closing.as_str());
            if !self.s.eat_if(closing.as_str()) {
                return Ok(self.degrade_tag(start, name));
            }
            widget.parse_verbatim_content(body)
        } else {
            // Without a closer ahead the content would swallow the rest of
            // the input, one level deeper for every later unclosed tag
            if !self.can_descend() || !self.s.after().contains(closing.as_str()) {
                return Ok(self.degrade_tag(start, name));
            }
            let (content, closed) = self.parse_fragment(&closing, false)?;
            if !closed {
                return Ok(self.degrade_tag(start, name));
            }
            content
        };

        let node = match widget {
            Some(widget) => widget::apply(widget, tag, content)?,
            None => Some(build_tag(tag, content)),
        };

        Ok(match node {
            Some(node) if bold => Inline::Node(embolden(node)),
            Some(node) => Inline::Node(node),
            None => Inline::Dropped,
        })
    }

    fn degrade_tag(&mut self, start: usize, name: &str) -> Inline<'s> {
        tracing::debug!(tag = name, offset = start, "unclosed tag kept as text");
        self.failed.insert(start);
        self.s.jump(start + 1);
        Inline::Text("<")
    }

    fn parse_attribute(&mut self, format: &mut Format) {
        if self.s.eat_if('.') {
            let class = self.s.eat_until(is_attr_terminator);
            if !class.is_empty() {
                format.push_class(class);
            }
            return;
        }

        let name = self.s.eat_until(is_attr_name_terminator);
        if name.is_empty() {
            return;
        }

        let value = if self.s.eat_if('=') {
            if self.s.eat_if('"') {
                let value = self.s.eat_until('"');
                self.s.eat_if('"');
                value
            } else {
                self.s.eat_until(is_attr_terminator)
            }
        } else {
            ""
        };

        format.set_attribute(name, value);
    }

    /// Apply a `{...}` block directly following an inline construct
    ///
    /// The block must close on the same line, otherwise it is left as text.
    fn parse_attribute_block(&mut self, node: &mut SyntaxNode) {
        let start = self.s.cursor();
        if !self.s.eat_if('{') {
            return;
        }

        let mut block = Format::default();
        let mut closed = false;
        while !self.s.done() {
            self.s.eat_while(is_indent);
            if self.s.at('\n') {
                break;
            }
            if self.s.eat_if('}') {
                closed = true;
                break;
            }

            let before = self.s.cursor();
            self.parse_attribute(&mut block);
            if self.s.cursor() == before {
                self.s.eat();
            }
        }

        if !closed || self.s.from(start).contains('\n') {
            tracing::debug!(offset = start, "unterminated attribute block kept as text");
            self.s.jump(start);
            return;
        }

        let bold = fold_style(&mut block);
        if let Some(format) = node.format_mut() {
            apply_block(format, block);
        }
        if bold {
            let plain = std::mem::replace(node, SyntaxNode::newline());
            *node = embolden(plain);
        }
    }
}

/// Take the trailing container of `kind` back out for coalescing, or start one
fn reopen(content: &mut Vec<SyntaxNode>, kind: SegmentKind) -> Segment {
    if matches!(content.last(), Some(SyntaxNode::Segment(segment)) if segment.kind == Some(kind)) {
        if let Some(SyntaxNode::Segment(segment)) = content.pop() {
            return segment;
        }
    }
    Segment::new(Some(kind), Vec::new())
}

fn append_text(result: &mut Vec<SyntaxNode>, text: &str) {
    if text.is_empty() {
        return;
    }

    if let Some(SyntaxNode::Text(prev)) = result.last_mut() {
        prev.value.push_str(text);
    } else {
        result.push(SyntaxNode::text(text));
    }
}

/// Whitespace between tags spanning lines
fn is_layout_text(node: &SyntaxNode) -> bool {
    matches!(node, SyntaxNode::Text(text) if text.value.contains('\n') && text.value.trim().is_empty())
}

fn trim_block(content: &mut Vec<SyntaxNode>) {
    if let Some(SyntaxNode::Text(first)) = content.first_mut() {
        let leading = first.value.len() - first.value.trim_start().len();
        first.value.drain(..leading);
    }
    if let Some(SyntaxNode::Text(last)) = content.last_mut() {
        let end = last.value.trim_end().len();
        last.value.truncate(end);
    }
    content.retain(|node| !matches!(node, SyntaxNode::Text(text) if text.value.is_empty()));
}

fn leading_int(value: &str) -> Option<i64> {
    let end = value
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(value.len(), |(i, _)| i);
    value[..end].parse().ok()
}

/// Fold a `style` attribute into typed format fields
///
/// Returns whether the style asked for bold text.
fn fold_style(format: &mut Format) -> bool {
    let Some(style) = format.remove_attribute("style") else {
        return false;
    };

    let mut bold = false;
    for declaration in style.split(';') {
        let Some((property, value)) = declaration.split_once(':') else {
            continue;
        };
        let value = value.trim();

        match property.trim().to_ascii_lowercase().as_str() {
            "color" => {
                if let Ok(color) = value.parse() {
                    format.color = Some(color);
                }
            }
            "text-align" => {
                if let Ok(align) = value.parse() {
                    format.align = Some(align);
                }
            }
            "width" => {
                if let Some(width) = leading_int(value) {
                    format.width = Some(width as f64);
                }
            }
            "height" => {
                if let Some(height) = leading_int(value) {
                    format.height = Some(height as f64);
                }
            }
            "font-weight" => bold = matches!(value, "700" | "bold"),
            other => tracing::trace!(property = other, "ignoring style property"),
        }
    }

    bold
}

fn apply_block(format: &mut Format, block: Format) {
    if let Some(classes) = block.class_list {
        format.class_list.get_or_insert_with(Vec::new).extend(classes);
    }
    if let Some(attributes) = block.attributes {
        for (key, value) in attributes {
            format.set_attribute(key, value);
        }
    }
    if block.color.is_some() {
        format.color = block.color;
    }
    if block.align.is_some() {
        format.align = block.align;
    }
    if block.width.is_some() {
        format.width = block.width;
    }
    if block.height.is_some() {
        format.height = block.height;
    }
}

/// Bold a node: plain spans take the modifier, anything else is wrapped
fn embolden(node: SyntaxNode) -> SyntaxNode {
    match node {
        SyntaxNode::Span(mut span) if span.modifier.is_none() => {
            span.modifier = Some(Modifier::Bold);
            SyntaxNode::Span(span)
        }
        other => SyntaxNode::span(Some(Modifier::Bold), vec![other]),
    }
}

fn is_blank_text(node: &SyntaxNode) -> bool {
    matches!(node, SyntaxNode::Text(text) if text.value.trim().is_empty())
}

fn is_tag(node: &SyntaxNode, names: &[&str]) -> bool {
    matches!(node, SyntaxNode::Object(object)
        if object.kind == ObjectKind::Raw && object.value.as_deref().is_some_and(|v| names.contains(&v)))
}

/// Turn a generic tag into its typed node where one exists
fn build_tag(tag: Object, content: Vec<SyntaxNode>) -> SyntaxNode {
    if tag.value.as_deref() != Some("table") {
        return SyntaxNode::Object(Object { content, ..tag });
    }

    let well_formed = content.iter().all(|row| {
        is_blank_text(row)
            || (is_tag(row, &["tr"])
                && row
                    .content()
                    .is_some_and(|cells| cells.iter().all(|c| is_blank_text(c) || is_tag(c, &["td", "th"]))))
    });
    if !well_formed {
        return SyntaxNode::Object(Object { content, ..tag });
    }

    let rows = content
        .into_iter()
        .filter_map(|row| match row {
            SyntaxNode::Object(row) => Some(build_row(row)),
            _ => None,
        })
        .collect();

    SyntaxNode::Table(Table {
        format: tag.format,
        content: rows,
        meta: tag.meta,
    })
}

fn build_row(mut row: Object) -> SyntaxNode {
    let mut header = row.format.remove_attribute("header").is_some();
    let cells = std::mem::take(&mut row.content)
        .into_iter()
        .filter_map(|cell| match cell {
            SyntaxNode::Object(cell) => {
                header |= cell.value.as_deref() == Some("th");
                Some(SyntaxNode::Segment(Segment {
                    kind: None,
                    format: cell.format,
                    content: cell.content,
                    meta: cell.meta,
                }))
            }
            _ => None,
        })
        .collect();

    SyntaxNode::TableRow(TableRow {
        header,
        format: row.format,
        content: cells,
        meta: row.meta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Align, Color};
    use crate::widget::{FieldSchema, FieldType, WidgetSchema};
    use pretty_assertions::assert_eq;

    fn parse_plain(input: &str) -> Vec<SyntaxNode> {
        match parse(input, &WidgetRegistry::new()).unwrap() {
            SyntaxNode::Segment(root) => root.content,
            other => panic!("root is not a segment: {other:?}"),
        }
    }

    /// Inline content of the only paragraph
    fn inline(input: &str) -> Vec<SyntaxNode> {
        let blocks = parse_plain(input);
        assert_eq!(blocks.len(), 1, "expected one block in {blocks:?}");
        match blocks.into_iter().next() {
            Some(SyntaxNode::Segment(p)) if p.kind == Some(SegmentKind::P) => p.content,
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    fn text(value: &str) -> SyntaxNode {
        SyntaxNode::text(value)
    }

    fn p(content: Vec<SyntaxNode>) -> SyntaxNode {
        SyntaxNode::segment(Some(SegmentKind::P), content)
    }

    fn li(content: Vec<SyntaxNode>) -> SyntaxNode {
        SyntaxNode::segment(Some(SegmentKind::Li), content)
    }

    #[test]
    fn test_plain_paragraph_is_trimmed() {
        assert_eq!(inline("  hello world  "), vec![text("hello world")]);
    }

    #[test]
    fn test_emphasis_then_text() {
        assert_eq!(
            inline("*a* b"),
            vec![
                SyntaxNode::span(Some(Modifier::Italics), vec![text("a")]),
                text(" b"),
            ]
        );
    }

    #[test]
    fn test_mid_word_emphasis_stays_literal() {
        assert_eq!(inline("a*b*"), vec![text("a*b*")]);
        assert_eq!(inline("snake_case_name"), vec![text("snake_case_name")]);
    }

    #[test]
    fn test_bold_and_nested_italics() {
        assert_eq!(
            inline("**bold _inner_**"),
            vec![SyntaxNode::span(
                Some(Modifier::Bold),
                vec![
                    text("bold "),
                    SyntaxNode::span(Some(Modifier::Italics), vec![text("inner")]),
                ]
            )]
        );
    }

    #[test]
    fn test_escapes_are_literal() {
        assert_eq!(inline("\\*a\\*"), vec![text("*a*")]);
    }

    #[test]
    fn test_escaped_newline_is_explicit() {
        assert_eq!(inline("a\\\nb"), vec![text("a"), SyntaxNode::newline(), text("b")]);
    }

    #[test]
    fn test_unmatched_delimiters_degrade() {
        assert_eq!(inline("**open"), vec![text("**open")]);
        assert_eq!(inline("see [here"), vec![text("see [here")]);
        assert_eq!(inline("x `tick"), vec![text("x `tick")]);
        assert_eq!(inline("1 < 2"), vec![text("1 < 2")]);
    }

    #[test]
    fn test_emphasis_does_not_cross_lines() {
        let blocks = parse_plain("*a\nb*");
        assert_eq!(blocks, vec![p(vec![text("*a")]), p(vec![text("b*")])]);
    }

    #[test]
    fn test_code_span_is_literal() {
        assert_eq!(
            inline("`a*b*`"),
            vec![SyntaxNode::span(Some(Modifier::Code), vec![text("a*b*")])]
        );
    }

    #[test]
    fn test_link_and_media() {
        assert_eq!(
            inline("[docs](https://example.com) ![logo](logo.png)"),
            vec![
                SyntaxNode::link(Some("https://example.com".into()), vec![text("docs")]),
                text(" "),
                SyntaxNode::media(Some("logo.png".into()), "logo"),
            ]
        );
        assert_eq!(inline("[bare]"), vec![SyntaxNode::link(None, vec![text("bare")])]);
    }

    #[test]
    fn test_attribute_block() {
        let nodes = inline("*x*{.big .red id=main title=\"A title\" hidden}");
        let format = nodes[0].format().unwrap();

        assert_eq!(format.class_list, Some(vec!["big".to_string(), "red".to_string()]));
        assert_eq!(format.attribute("id"), Some("main"));
        assert_eq!(format.attribute("title"), Some("A title"));
        assert_eq!(format.attribute("hidden"), Some(""));
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_attribute_block_must_close_on_line() {
        let blocks = parse_plain("*x*{.a\nrest");
        assert_eq!(
            blocks[0],
            p(vec![
                SyntaxNode::span(Some(Modifier::Italics), vec![text("x")]),
                text("{.a"),
            ])
        );
    }

    #[test]
    fn test_style_folds_into_format() {
        let nodes = inline("<div style=\"color: #ff0000; text-align: center; width: 120px; height: 3\">x</div>");
        let format = nodes[0].format().unwrap();

        assert_eq!(format.color, Some(Color::Hex("#ff0000".into())));
        assert_eq!(format.align, Some(Align::Center));
        assert_eq!(format.width, Some(120.0));
        assert_eq!(format.height, Some(3.0));
        assert!(format.attributes.is_none());
    }

    #[test]
    fn test_font_weight_makes_bold() {
        let nodes = inline("[x](u){style=\"font-weight: 700\"}");
        match &nodes[0] {
            SyntaxNode::Span(span) => {
                assert_eq!(span.modifier, Some(Modifier::Bold));
                assert!(matches!(span.content[0], SyntaxNode::Object(_)));
            }
            other => panic!("expected bold wrapper, got {other:?}"),
        }
    }

    #[test]
    fn test_generic_tag_spans_lines() {
        let nodes = inline("<note kind=info>\n  first\n  <b>x</b>\n</note>");
        match &nodes[0] {
            SyntaxNode::Object(object) => {
                assert_eq!(object.value.as_deref(), Some("note"));
                assert_eq!(object.format.attribute("kind"), Some("info"));
                assert_eq!(object.content[0], text("\n  first\n  "));
                assert!(matches!(object.content[1], SyntaxNode::Object(_)));
                assert_eq!(object.content.len(), 2);
            }
            other => panic!("expected tag, got {other:?}"),
        }
    }

    #[test]
    fn test_self_closing_tag() {
        assert_eq!(
            inline("a <br/> b"),
            vec![text("a "), SyntaxNode::raw_object("br", vec![]), text(" b")]
        );
    }

    #[test]
    fn test_unclosed_tag_degrades() {
        assert_eq!(
            inline("<b>never closed"),
            vec![text("<b>never closed")]
        );
    }

    #[test]
    fn test_unknown_widget_is_generic_tag() {
        assert_eq!(
            inline("<Chart/>"),
            vec![SyntaxNode::raw_object("Chart", vec![])]
        );
    }

    const SHOUT: WidgetSchema = WidgetSchema {
        name: "Shout",
        fields: &[FieldSchema::optional("times", FieldType::Number)],
        verbatim: false,
    };

    const RAW: WidgetSchema = WidgetSchema {
        name: "Raw",
        fields: &[],
        verbatim: true,
    };

    fn widgets() -> WidgetRegistry {
        let mut registry = WidgetRegistry::new();
        registry.register_fn(SHOUT, |values, content| {
            let times = values.number("times").unwrap_or(1.0) as usize;
            let mut repeated = Vec::new();
            for _ in 0..times {
                repeated.extend(content.iter().cloned());
            }
            Ok(Some(SyntaxNode::span(Some(Modifier::Bold), repeated)))
        });
        registry.register_fn(RAW, |_, content| Ok(Some(SyntaxNode::span(None, content))));
        registry.register_fn(
            WidgetSchema {
                name: "Hidden",
                fields: &[],
                verbatim: false,
            },
            |_, _| Ok(None),
        );
        registry
    }

    fn parse_with_widgets(input: &str) -> Vec<SyntaxNode> {
        let root = parse(input, &widgets()).unwrap();
        match root {
            SyntaxNode::Segment(root) => match root.content.into_iter().next() {
                Some(SyntaxNode::Segment(p)) => p.content,
                other => panic!("expected paragraph, got {other:?}"),
            },
            other => panic!("root is not a segment: {other:?}"),
        }
    }

    #[test]
    fn test_widget_dispatch() {
        let nodes = parse_with_widgets("<Shout times=2 .loud>hey</Shout>");
        let expected = {
            let mut span = SyntaxNode::span(Some(Modifier::Bold), vec![text("hey"), text("hey")]);
            span.format_mut().unwrap().push_class("loud");
            span
        };
        assert_eq!(nodes, vec![expected]);
    }

    #[test]
    fn test_verbatim_widget_body_is_raw() {
        let nodes = parse_with_widgets("<Raw>*not* <b>markup</Raw>");
        assert_eq!(
            nodes,
            vec![SyntaxNode::span(None, vec![SyntaxNode::raw("*not* <b>markup")])]
        );
    }

    #[test]
    fn test_self_closing_verbatim_widget_keeps_empty_raw() {
        let nodes = parse_with_widgets("x <Raw/>");
        assert_eq!(
            nodes,
            vec![text("x "), SyntaxNode::span(None, vec![SyntaxNode::raw("")])]
        );
    }

    #[test]
    fn test_widget_may_drop_itself() {
        assert_eq!(parse_with_widgets("a<Hidden>b</Hidden>c"), vec![text("ac")]);
    }

    #[test]
    fn test_required_widget_attribute_fails_parse() {
        const NEED_FIELDS: &[FieldSchema] = &[FieldSchema::required("count", FieldType::Number)];
        let mut registry = WidgetRegistry::new();
        registry.register_fn(
            WidgetSchema {
                name: "Need",
                fields: NEED_FIELDS,
                verbatim: false,
            },
            |_, _| Ok(None),
        );

        let err = parse("<Need count=lots/>", &registry).unwrap_err();
        assert!(matches!(err, ConversionError::WidgetAttribute { ref field, .. } if field == "count"));
    }

    #[test]
    fn test_headings() {
        assert_eq!(
            parse_plain("# One\n### Three\n##### Five"),
            vec![
                SyntaxNode::segment(Some(SegmentKind::H1), vec![text("One")]),
                SyntaxNode::segment(Some(SegmentKind::H3), vec![text("Three")]),
                SyntaxNode::segment(Some(SegmentKind::H4), vec![text("# Five")]),
            ]
        );
    }

    #[test]
    fn test_list_nesting_and_coalescing() {
        let blocks = parse_plain("- a\n  - b\n- c\n\n1. d\n2) e");
        assert_eq!(
            blocks,
            vec![
                SyntaxNode::segment(
                    Some(SegmentKind::Ul),
                    vec![
                        li(vec![
                            p(vec![text("a")]),
                            SyntaxNode::segment(Some(SegmentKind::Ul), vec![li(vec![p(vec![text("b")])])]),
                        ]),
                        li(vec![p(vec![text("c")])]),
                    ]
                ),
                SyntaxNode::segment(
                    Some(SegmentKind::Ol),
                    vec![li(vec![p(vec![text("d")])]), li(vec![p(vec![text("e")])])]
                ),
            ]
        );
    }

    #[test]
    fn test_blank_line_keeps_list_open() {
        let blocks = parse_plain("- a\n\n  more\n- b");
        assert_eq!(
            blocks,
            vec![SyntaxNode::segment(
                Some(SegmentKind::Ul),
                vec![
                    li(vec![p(vec![text("a")]), p(vec![text("more")])]),
                    li(vec![p(vec![text("b")])]),
                ]
            )]
        );
    }

    #[test]
    fn test_ordered_marker_backtracks() {
        assert_eq!(parse_plain("12 apples"), vec![p(vec![text("12 apples")])]);
    }

    #[test]
    fn test_quote_coalesces() {
        assert_eq!(
            parse_plain("> a\n> b"),
            vec![SyntaxNode::segment(
                Some(SegmentKind::Quote),
                vec![p(vec![text("a")]), p(vec![text("b")])]
            )]
        );
    }

    #[test]
    fn test_code_block() {
        assert_eq!(
            parse_plain("```rust\nfn main() {}\n```\nafter"),
            vec![
                SyntaxNode::code_block(Some("rust".into()), "fn main() {}\n"),
                p(vec![text("after")]),
            ]
        );
    }

    #[test]
    fn test_unclosed_code_block_runs_to_end() {
        assert_eq!(
            parse_plain("```\nstill code\n# not a heading"),
            vec![SyntaxNode::code_block(None, "still code\n# not a heading")]
        );
    }

    #[test]
    fn test_table_tags() {
        let blocks = parse_plain("<table><tr><th>A</th><th>B</th></tr><tr><td>1</td> <td>2</td></tr></table>");
        let cell = |value: &str| SyntaxNode::segment(None, vec![text(value)]);
        assert_eq!(
            blocks,
            vec![SyntaxNode::table(vec![
                SyntaxNode::table_row(true, vec![cell("A"), cell("B")]),
                SyntaxNode::table_row(false, vec![cell("1"), cell("2")]),
            ])]
        );
    }

    #[test]
    fn test_malformed_table_stays_generic() {
        let nodes = inline("<table>loose text</table>");
        assert_eq!(
            nodes,
            vec![SyntaxNode::raw_object("table", vec![text("loose text")])]
        );
    }

    #[test]
    fn test_crlf_input() {
        assert_eq!(
            parse_plain("# T\r\nbody\r\n"),
            vec![
                SyntaxNode::segment(Some(SegmentKind::H1), vec![text("T")]),
                p(vec![text("body")]),
            ]
        );
    }

    #[test]
    fn test_excessive_block_nesting_is_an_error() {
        let input: Vec<String> = (0..MAX_NESTING + 10)
            .map(|level| format!("{}- a", "  ".repeat(level)))
            .collect();
        let err = parse(&input.join("\n"), &WidgetRegistry::new()).unwrap_err();
        assert!(matches!(err, ConversionError::ParseError { .. }));
    }

    #[test]
    fn test_deep_inline_openers_stay_text() {
        let input = "[".repeat(MAX_NESTING + 10);
        assert_eq!(inline(&input), vec![text(&input)]);

        let input = format!("{}x{}", "<b>".repeat(100), "</b>".repeat(100));
        assert!(parse(&input, &WidgetRegistry::new()).is_ok());

        let input = "_a ".repeat(300);
        assert!(parse(&input, &WidgetRegistry::new()).is_ok());
    }

    #[test]
    fn test_unclosed_tags_do_not_nest() {
        let blocks = parse_plain(&"line<br>\n".repeat(300));
        assert_eq!(blocks.len(), 300);
        assert!(blocks.iter().all(|block| *block == p(vec![text("line<br>")])));

        let input = "<i>".repeat(300);
        assert_eq!(inline(&input), vec![text(&input)]);
    }

    #[test]
    fn test_unmatched_openers_stay_linear() {
        let input = format!("{}]{}", "[".repeat(100), "*_".repeat(50));
        let nodes = inline(&input);
        assert!(!nodes.is_empty());
    }

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int("120px"), Some(120));
        assert_eq!(leading_int("-4"), Some(-4));
        assert_eq!(leading_int("px"), None);
    }
}
