// SPDX-License-Identifier: AGPL-3.0-or-later
//! Element-shaped rendering shared by the HTML and render-function targets
//!
//! The provided methods hold the structural mapping from nodes to elements.
//! A target only spells attributes, text and elements in its own syntax.

use crate::ast::{
    Attributes, CodeBlock, Color, Format, Modifier, Object, ObjectKind, Segment, SegmentKind,
    Span, SyntaxNode, Table, TableRow,
};
use std::borrow::Cow;

/// Element name for a segment kind; a typeless segment with format is a `div`
pub const fn segment_element(kind: Option<SegmentKind>) -> &'static str {
    match kind {
        Some(SegmentKind::P) => "p",
        Some(SegmentKind::H1) => "h1",
        Some(SegmentKind::H2) => "h2",
        Some(SegmentKind::H3) => "h3",
        Some(SegmentKind::H4) => "h4",
        Some(SegmentKind::Ul) => "ul",
        Some(SegmentKind::Ol) => "ol",
        Some(SegmentKind::Li) => "li",
        Some(SegmentKind::Quote) => "blockquote",
        None => "div",
    }
}

pub const fn modifier_element(modifier: Modifier) -> &'static str {
    match modifier {
        Modifier::Bold => "strong",
        Modifier::Italics => "em",
        Modifier::Code => "code",
    }
}

/// Whether `url` starts with a `scheme://` prefix
pub fn is_absolute_url(url: &str) -> bool {
    url.split_once("://").is_some_and(|(scheme, _)| {
        !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_lowercase())
    })
}

pub fn to_px(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else {
        format!("{value}px")
    }
}

fn single(key: &str, value: impl Into<String>) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert(key.to_string(), value.into());
    attributes
}

fn writable<'b>(attributes: &'b mut Option<Cow<'_, Attributes>>) -> &'b mut Attributes {
    attributes
        .get_or_insert_with(|| Cow::Owned(Attributes::new()))
        .to_mut()
}

fn append_class(attributes: &mut Attributes, class: &str) {
    match attributes.get_mut("class") {
        Some(existing) if !existing.is_empty() => {
            existing.push(' ');
            existing.push_str(class);
        }
        _ => {
            attributes.insert("class".to_string(), class.to_string());
        }
    }
}

fn append_style(attributes: &mut Attributes, property: &str, value: &str) {
    let style = attributes.entry("style".to_string()).or_default();
    if !style.is_empty() {
        style.push(';');
    }
    style.push_str(property);
    style.push(':');
    style.push_str(value);
}

/// Flatten a node's format into a single attribute map
///
/// `extra` entries are layered over the node's own attributes. The node's map
/// is borrowed as long as nothing has to be added to it and cloned on the
/// first write.
pub fn normalize_attributes<'a>(
    format: &'a Format,
    extra: Option<Attributes>,
) -> Option<Cow<'a, Attributes>> {
    let mut attributes = match (format.attributes.as_ref(), extra) {
        (Some(own), Some(extra)) => {
            let mut merged = own.clone();
            merged.extend(extra);
            Some(Cow::Owned(merged))
        }
        (Some(own), None) => Some(Cow::Borrowed(own)),
        (None, extra) => extra.map(Cow::Owned),
    };

    if let Some(classes) = format.class_list.as_ref().filter(|c| !c.is_empty()) {
        append_class(writable(&mut attributes), &classes.join(" "));
    }

    match &format.color {
        Some(Color::Hex(hex)) => append_style(writable(&mut attributes), "color", hex),
        Some(Color::Named(name)) => append_class(writable(&mut attributes), name),
        None => {}
    }

    if let Some(align) = format.align {
        append_style(writable(&mut attributes), "text-align", align.as_str());
    }
    if let Some(width) = format.width {
        append_style(writable(&mut attributes), "width", &to_px(width));
    }
    if let Some(height) = format.height {
        append_style(writable(&mut attributes), "height", &to_px(height));
    }

    attributes
}

/// Tree walk for targets that describe documents as nested elements
pub trait ElementRenderer {
    fn render_attributes(&self, attributes: Option<&Attributes>) -> String;

    fn render_text(&self, text: &str) -> String;

    /// Element with unrendered children; an empty name means no wrapper
    fn render_element(
        &mut self,
        element: &str,
        attributes: Option<Cow<'_, Attributes>>,
        content: &[SyntaxNode],
    ) -> String;

    /// Element around already rendered content
    fn render_element_raw(
        &mut self,
        element: &str,
        attributes: Option<Cow<'_, Attributes>>,
        content: String,
    ) -> String;

    fn render_raw(&self, value: &str) -> String {
        value.to_string()
    }

    fn render_newline(&self) -> String {
        self.render_text("\n")
    }

    /// Text whose line breaks are significant, as in code blocks
    fn render_verbatim(&self, text: &str) -> String {
        self.render_text(text)
    }

    /// Combine separately rendered siblings into one content value
    fn join_content(&self, parts: Vec<String>) -> String {
        parts.concat()
    }

    fn render_content(&mut self, nodes: &[SyntaxNode]) -> Vec<String> {
        nodes.iter().map(|node| self.render_node(node)).collect()
    }

    fn render_node(&mut self, node: &SyntaxNode) -> String {
        match node {
            SyntaxNode::Text(text) => self.render_text(&text.value),
            SyntaxNode::Newline(_) => self.render_newline(),
            SyntaxNode::Raw(raw) => self.render_raw(&raw.value),
            SyntaxNode::Span(span) => self.render_span(span),
            SyntaxNode::Object(object) => self.render_object(object),
            SyntaxNode::CodeBlock(code) => self.render_code_block(code),
            SyntaxNode::Segment(segment) => self.render_segment(segment),
            SyntaxNode::Table(table) => self.render_table(table),
            SyntaxNode::TableRow(row) => self.render_row(row),
        }
    }

    fn render_span(&mut self, span: &Span) -> String {
        let attributes = normalize_attributes(&span.format, None);
        match span.modifier {
            Some(modifier) => self.render_element(modifier_element(modifier), attributes, &span.content),
            None if attributes.is_some() => self.render_element("span", attributes, &span.content),
            None => self.render_element("", None, &span.content),
        }
    }

    fn render_object(&mut self, object: &Object) -> String {
        render_object(self, object)
    }

    fn render_segment(&mut self, segment: &Segment) -> String {
        let attributes = normalize_attributes(&segment.format, None);
        if segment.kind.is_none() && attributes.is_none() {
            return self.render_element("", None, &segment.content);
        }
        self.render_element(segment_element(segment.kind), attributes, &segment.content)
    }

    fn render_code_block(&mut self, code: &CodeBlock) -> String {
        let class = code
            .lang
            .as_ref()
            .map(|lang| Cow::Owned(single("class", format!("language-{lang}"))));
        let text = self.render_verbatim(&code.content);
        let inner = self.render_element_raw("code", class, text);
        self.render_element_raw("pre", None, inner)
    }

    fn render_table(&mut self, table: &Table) -> String {
        let rows = self.render_content(&table.content);
        let content = self.join_content(rows);
        self.render_element_raw("table", normalize_attributes(&table.format, None), content)
    }

    fn render_row(&mut self, row: &TableRow) -> String {
        let cell_element = if row.header { "th" } else { "td" };

        let mut cells = Vec::with_capacity(row.content.len());
        for cell in &row.content {
            let rendered = match cell {
                SyntaxNode::Segment(cell) if cell.kind.is_none() => self.render_element(
                    cell_element,
                    normalize_attributes(&cell.format, None),
                    &cell.content,
                ),
                other => self.render_element(cell_element, None, std::slice::from_ref(other)),
            };
            cells.push(rendered);
        }

        let content = self.join_content(cells);
        self.render_element_raw("tr", normalize_attributes(&row.format, None), content)
    }
}

/// Links become `a`, media `img`, generic tags keep their own name
pub fn render_object<R: ElementRenderer + ?Sized>(renderer: &mut R, object: &Object) -> String {
    match object.kind {
        ObjectKind::Link => {
            let href = object.value.as_ref().map(|url| single("href", url.as_str()));
            renderer.render_element("a", normalize_attributes(&object.format, href), &object.content)
        }
        ObjectKind::Media => {
            let src = object.value.as_ref().map(|url| single("src", url.as_str()));
            renderer.render_element("img", normalize_attributes(&object.format, src), &object.content)
        }
        ObjectKind::Raw => {
            let name = object.value.as_deref().unwrap_or("span");
            renderer.render_element(name, normalize_attributes(&object.format, None), &object.content)
        }
    }
}
