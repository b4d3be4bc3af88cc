// SPDX-License-Identifier: AGPL-3.0-or-later
//! Typst exporter
//!
//! Generic tags become function calls, `<box inset:="4pt">x</box>` renders as
//! `#box(inset: 4pt)[x]`. Attribute values are string literals unless the key
//! ends with `:`, and a `value` key is passed positionally. Children of a call
//! carrying a `_prop` attribute become arguments instead of content.

use super::writer::IndentWriter;
use crate::ast::{
    CodeBlock, Modifier, Object, ObjectKind, Segment, SegmentKind, Span, SyntaxNode, Table,
    TableRow,
};
use crate::traits::{OutputFormat, RenderConfig, Renderer, Result};
use crate::widget::{Widget, WidgetSchema, WidgetValues};

use super::element::is_absolute_url;

/// Attribute marking a child object as a call argument
pub const PROPERTY_ATTRIBUTE: &str = "_prop";
/// Attribute moving the content block into the argument list
const POSITIONAL_ATTRIBUTE: &str = "_pos";

/// `<Script>#let x = 1</Script>`: Typst code passed through untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptWidget;

impl ScriptWidget {
    pub const SCHEMA: WidgetSchema = WidgetSchema {
        name: "Script",
        fields: &[],
        verbatim: true,
    };
}

impl Widget for ScriptWidget {
    fn schema(&self) -> &WidgetSchema {
        &Self::SCHEMA
    }

    fn get_value(&self, _values: &WidgetValues, content: Vec<SyntaxNode>) -> Result<Option<SyntaxNode>> {
        Ok(Some(SyntaxNode::span(None, content)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TypstRenderer;

impl TypstRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for TypstRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Typst
    }

    fn render(&self, root: &SyntaxNode, config: &RenderConfig) -> Result<String> {
        let mut writer = TypstWriter {
            w: IndentWriter::new(&config.indent),
            lists: Vec::new(),
            script: Vec::new(),
        };
        writer.render_node(root);
        Ok(writer.w.finish())
    }
}

fn escape_text(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '$' | '@' | '#' | '`') {
            output.push('\\');
        }
        output.push(c);
    }
    output
}

fn string_literal(value: &str) -> String {
    serde_json::Value::from(value).to_string()
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

fn property_key(node: &SyntaxNode) -> Option<&str> {
    match node {
        SyntaxNode::Object(object) if object.kind == ObjectKind::Raw => {
            object.format.attribute(PROPERTY_ATTRIBUTE)
        }
        _ => None,
    }
}

struct TypstWriter<'c> {
    w: IndentWriter<'c>,
    /// Enclosing list kinds; a quote pushes `None`
    lists: Vec<Option<SegmentKind>>,
    /// Whether each enclosing construct is in code mode
    script: Vec<bool>,
}

impl TypstWriter<'_> {
    fn in_list(&self) -> bool {
        matches!(self.lists.last(), Some(Some(_)))
    }

    fn sigil(&self) -> &'static str {
        if self.script.last().copied().unwrap_or(false) {
            ""
        } else {
            "#"
        }
    }

    fn block_end(&mut self) {
        if self.in_list() {
            self.w.ensure_newline();
        } else {
            self.w.push("\n\n");
        }
    }

    fn render_content(&mut self, nodes: &[SyntaxNode]) {
        for node in nodes {
            self.render_node(node);
        }
    }

    /// Content block in markup mode, as in `[..]`
    fn render_markup(&mut self, nodes: &[SyntaxNode]) {
        self.w.push_char('[');
        self.script.push(false);
        self.render_content(nodes);
        self.script.pop();
        self.w.push_char(']');
    }

    fn render_node(&mut self, node: &SyntaxNode) {
        match node {
            SyntaxNode::Text(text) => self.w.push(&escape_text(&text.value)),
            SyntaxNode::Newline(_) => self.w.push("\\\n"),
            SyntaxNode::Raw(raw) => self.w.push(&raw.value),
            SyntaxNode::Span(span) => self.render_span(span),
            SyntaxNode::Object(object) => self.render_object(object),
            SyntaxNode::CodeBlock(code) => self.render_code_block(code),
            SyntaxNode::Segment(segment) => self.render_segment(segment),
            SyntaxNode::Table(table) => self.render_table(table),
            SyntaxNode::TableRow(_) => self.w.push(&format!("!?!{}", node.kind_name())),
        }
    }

    fn render_span(&mut self, span: &Span) {
        let delimiter = match span.modifier {
            Some(Modifier::Code) => {
                let mut code = String::new();
                plain_text(&span.content, &mut code);
                self.w.push(&format!("`{code}`"));
                return;
            }
            Some(Modifier::Bold) => "*",
            Some(Modifier::Italics) => "_",
            None => "",
        };

        self.w.push(delimiter);
        self.render_content(&span.content);
        self.w.push(delimiter);
    }

    fn render_object(&mut self, object: &Object) {
        match object.kind {
            ObjectKind::Link => self.render_link(object),
            ObjectKind::Media => {
                let url = object.value.as_deref().unwrap_or_default();
                let mut call = format!("{}image({}", self.sigil(), string_literal(url));
                if let Some(alt) = object.format.attribute("alt").filter(|alt| !alt.is_empty()) {
                    call.push_str(", alt: ");
                    call.push_str(&string_literal(alt));
                }
                call.push(')');
                self.w.push(&call);
            }
            ObjectKind::Raw if object.is_sentinel() => {}
            ObjectKind::Raw if object.value.as_deref() == Some("cite") => {
                let mut key = String::new();
                plain_text(&object.content, &mut key);
                self.w.push_char('@');
                self.w.push(key.trim());
            }
            ObjectKind::Raw => self.render_call(object),
        }
    }

    fn render_link(&mut self, object: &Object) {
        match object.value.as_deref() {
            Some(url) if is_absolute_url(url) => {
                let call = format!("{}link({})", self.sigil(), string_literal(url));
                self.w.push(&call);
                if !object.content.is_empty() {
                    self.render_markup(&object.content);
                }
            }
            Some(label) => {
                self.w.push_char('@');
                self.w.push(label);
                if !object.content.is_empty() {
                    self.render_markup(&object.content);
                }
            }
            None => {
                let Some(id) = object.format.attribute("id") else {
                    self.render_content(&object.content);
                    return;
                };
                let sigil = self.sigil();
                self.w.push(sigil);
                self.render_markup(&object.content);
                self.w.push(&format!("<{id}>"));
            }
        }
    }

    fn render_call(&mut self, object: &Object) {
        let Some(name) = object.value.as_deref() else {
            self.render_content(&object.content);
            return;
        };

        let opened_script = !self.script.last().copied().unwrap_or(false);
        if opened_script {
            self.w.push_char('#');
            self.script.push(true);
        }
        self.w.push(name);

        let (properties, content): (Vec<&SyntaxNode>, Vec<&SyntaxNode>) =
            object.content.iter().partition(|node| property_key(node).is_some());
        let content: Vec<SyntaxNode> = content.into_iter().cloned().collect();

        let positional = object.format.has_attribute(POSITIONAL_ATTRIBUTE);
        let attributes: Vec<(&String, &String)> = object
            .format
            .attributes
            .iter()
            .flatten()
            .filter(|(key, _)| key.as_str() != POSITIONAL_ATTRIBUTE)
            .collect();

        if !attributes.is_empty() || !properties.is_empty() || positional {
            self.w.push_char('(');
            let mut first = true;
            for (key, value) in attributes {
                self.separate(&mut first);
                let (name, value) = match key.strip_suffix(':') {
                    Some(name) => (name, value.clone()),
                    None => (key.as_str(), string_literal(value)),
                };
                if name == "value" {
                    self.w.push(&value);
                } else {
                    self.w.push(&format!("{name}: {value}"));
                }
            }

            for property in properties {
                self.separate(&mut first);
                self.render_argument(property);
            }

            if positional {
                self.separate(&mut first);
                self.render_markup(&content);
            }
            self.w.push_char(')');
        } else if content.is_empty() {
            self.w.push("()");
        }

        if !positional && !content.is_empty() {
            self.render_markup(&content);
        }

        if opened_script {
            self.script.pop();
        }
    }

    fn separate(&mut self, first: &mut bool) {
        if !std::mem::take(first) {
            self.w.push(", ");
        }
    }

    fn render_argument(&mut self, property: &SyntaxNode) {
        let SyntaxNode::Object(object) = property else {
            return;
        };
        let key = object.format.attribute(PROPERTY_ATTRIBUTE).unwrap_or_default();

        if key.is_empty() {
            let name = object.value.as_deref().unwrap_or_default();
            self.w.push(&format!("{name}: "));
            self.render_markup(&object.content);
            return;
        }

        let mut argument = object.clone();
        argument.format.remove_attribute(PROPERTY_ATTRIBUTE);
        if key != "main" {
            self.w.push(&format!("{key}: "));
        }
        self.render_object(&argument);
    }

    fn render_segment(&mut self, segment: &Segment) {
        let Some(kind) = segment.kind else {
            self.render_content(&segment.content);
            return;
        };

        match kind {
            SegmentKind::H1 | SegmentKind::H2 | SegmentKind::H3 | SegmentKind::H4 => {
                let level = kind.heading_level().unwrap_or(1);
                self.w.indent();
                self.w.push(&"=".repeat(level));
                self.w.push_char(' ');
                self.render_content(&segment.content);
                self.w.push("\n\n");
            }
            SegmentKind::P => {
                self.w.indent();
                self.render_content(&segment.content);
                self.block_end();
            }
            SegmentKind::Ul | SegmentKind::Ol => {
                self.lists.push(Some(kind));
                self.render_content(&segment.content);
                self.lists.pop();
                if !self.in_list() {
                    self.w.push_char('\n');
                }
            }
            SegmentKind::Li => self.render_item(segment),
            SegmentKind::Quote => {
                self.w.indent();
                let sigil = self.sigil();
                self.w.push(sigil);
                self.w.push("quote(block: true)");
                self.w.push_char('[');
                self.lists.push(None);
                self.script.push(false);
                self.render_content(&segment.content);
                self.script.pop();
                self.lists.pop();
                self.w.trim_end();
                self.w.push_char(']');
                self.block_end();
            }
        }
    }

    fn render_item(&mut self, item: &Segment) {
        let marker = match self.lists.last() {
            Some(Some(SegmentKind::Ol)) => "+ ",
            _ => "- ",
        };
        self.w.indent();
        self.w.push(marker);

        for (index, child) in item.content.iter().enumerate() {
            match child {
                SyntaxNode::Segment(paragraph) if index == 0 && paragraph.kind == Some(SegmentKind::P) => {
                    self.render_content(&paragraph.content);
                }
                other => {
                    self.w.ensure_newline();
                    self.w.more();
                    self.render_node(other);
                    self.w.less();
                }
            }
        }
        self.w.ensure_newline();
    }

    fn render_code_block(&mut self, code: &CodeBlock) {
        self.w.indent();
        self.w.push("```");
        self.w.push(code.lang.as_deref().unwrap_or_default());
        self.w.push_char('\n');
        self.w.push(&code.content);
        self.w.ensure_newline();
        self.w.push("```");
        self.block_end();
    }

    fn render_cells(&mut self, row: &TableRow) {
        for (index, cell) in row.content.iter().enumerate() {
            if index > 0 {
                self.w.push(", ");
            }
            match cell {
                SyntaxNode::Segment(cell) if cell.kind.is_none() => self.render_markup(&cell.content),
                other => self.render_markup(std::slice::from_ref(other)),
            }
        }
    }

    fn render_table(&mut self, table: &Table) {
        let rows: Vec<&TableRow> = table
            .content
            .iter()
            .filter_map(|row| match row {
                SyntaxNode::TableRow(row) => Some(row),
                _ => None,
            })
            .collect();
        let columns = rows.iter().map(|row| row.content.len()).max().unwrap_or(0);

        self.w.indent();
        let sigil = self.sigil();
        self.w.push(sigil);
        self.w.push("table(\n");
        self.w.more();
        self.w.indent();
        self.w.push(&format!("columns: {columns},\n"));

        for row in rows {
            self.w.indent();
            if row.header {
                self.w.push("table.header(");
                self.render_cells(row);
                self.w.push("),\n");
            } else {
                self.render_cells(row);
                self.w.push(",\n");
            }
        }

        self.w.less();
        self.w.indent();
        self.w.push_char(')');
        self.block_end();
    }
}
