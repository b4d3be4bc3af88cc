// SPDX-License-Identifier: AGPL-3.0-or-later
//! LaTeX exporter
//!
//! Generic tags become LaTeX commands: `<label key=v>x</label>` renders as
//! `\label[key=v]{x}`. Attributes prefixed `pragma-` steer the output instead
//! of becoming optional arguments:
//!
//! - `pragma-block` renders `\begin{name}..\end{name}`
//! - `pragma-star` appends `*` to the name
//! - `pragma-spc`, `pragma-spc0`, `pragma-spc1` force exactly one space
//!   before, after or on both sides of the command

use super::writer::IndentWriter;
use crate::ast::{
    Attributes, CodeBlock, Format, Modifier, Object, ObjectKind, Segment, SegmentKind, Span,
    SyntaxNode, Table, TableRow,
};
use crate::traits::{ConversionError, OutputFormat, RenderConfig, Renderer, Result};
use crate::widget::{FieldSchema, FieldType, Widget, WidgetSchema, WidgetValues};
use serde::{Deserialize, Serialize};

/// Sentinel tag carrying [`LatexTableOptions`] for the next table
pub const TABLE_OPTIONS_TAG: &str = "<>latex-table-options";

const PRAGMA_PREFIX: &str = "pragma-";

/// Column layout and borders of a LaTeX table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatexTableOptions {
    /// Column widths as fractions of `\linewidth`
    pub widths: Vec<f64>,
    /// Single-character column types, used where no width is given
    pub types: Vec<String>,
    /// Rules only around the header and the table edges
    pub compact: bool,
    /// No rules at all
    pub naked: bool,
    /// Use `longtable` instead of `tabular`
    pub long: bool,
}

/// `<Math>x^2</Math>`: inline or display math, body taken verbatim
#[derive(Debug, Clone, Copy, Default)]
pub struct MathWidget;

impl MathWidget {
    pub const SCHEMA: WidgetSchema = WidgetSchema {
        name: "Math",
        fields: &[
            FieldSchema::optional("equation", FieldType::Boolean),
            FieldSchema::optional("full", FieldType::Boolean),
        ],
        verbatim: true,
    };
}

impl Widget for MathWidget {
    fn schema(&self) -> &WidgetSchema {
        &Self::SCHEMA
    }

    fn get_value(&self, values: &WidgetValues, content: Vec<SyntaxNode>) -> Result<Option<SyntaxNode>> {
        let mut math: String = content
            .iter()
            .filter_map(|node| match node {
                SyntaxNode::Raw(raw) => Some(raw.value.as_str()),
                _ => None,
            })
            .collect();

        if values.flag("full") {
            math.insert_str(0, "\\displaystyle");
        }
        let value = if values.flag("equation") {
            format!("\\[{math}\\]")
        } else {
            format!("${math}$")
        };

        Ok(Some(SyntaxNode::span(None, vec![SyntaxNode::raw(value)])))
    }
}

/// `<TableOptions widths="0.3|0.7" compact/>`: layout for the next table
#[derive(Debug, Clone, Copy, Default)]
pub struct TableOptionsWidget;

impl TableOptionsWidget {
    pub const SCHEMA: WidgetSchema = WidgetSchema {
        name: "TableOptions",
        fields: &[
            FieldSchema::optional("widths", FieldType::String),
            FieldSchema::optional("types", FieldType::String),
            FieldSchema::optional("compact", FieldType::Boolean),
            FieldSchema::optional("naked", FieldType::Boolean),
            FieldSchema::optional("long", FieldType::Boolean),
        ],
        verbatim: false,
    };
}

impl Widget for TableOptionsWidget {
    fn schema(&self) -> &WidgetSchema {
        &Self::SCHEMA
    }

    fn get_value(&self, values: &WidgetValues, _content: Vec<SyntaxNode>) -> Result<Option<SyntaxNode>> {
        let mut options = LatexTableOptions::default();

        if let Some(widths) = values.string("widths") {
            let parsed: std::result::Result<Vec<f64>, _> =
                widths.split('|').map(|w| w.trim().parse::<f64>()).collect();
            match parsed {
                Ok(parsed) => options.widths = parsed,
                Err(_) => tracing::debug!(widths, "ignoring unparsable table widths"),
            }
        }
        if let Some(types) = values.string("types") {
            options.types = types.chars().map(String::from).collect();
        }
        options.compact = values.flag("compact");
        options.naked = values.flag("naked");
        options.long = values.flag("long");

        let json = serde_json::to_string(&options)
            .map_err(|e| ConversionError::SerializationError(e.to_string()))?;
        let mut node = Object::new(ObjectKind::Raw, Some(TABLE_OPTIONS_TAG.to_string()), Vec::new());
        node.format.set_attribute("value", json);
        Ok(Some(SyntaxNode::Object(node)))
    }
}

/// LaTeX document fragment exporter
#[derive(Debug, Clone, Copy, Default)]
pub struct LatexRenderer;

impl LatexRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for LatexRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Latex
    }

    fn render(&self, root: &SyntaxNode, config: &RenderConfig) -> Result<String> {
        let mut writer = LatexWriter {
            w: IndentWriter::new(&config.indent),
            table_options: None,
            eat_space: false,
        };
        writer.render_node(root);
        Ok(writer.w.finish())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Spacing {
    before: bool,
    after: bool,
}

impl Spacing {
    fn of(format: &Format) -> Self {
        let has = |key: &str| format.has_attribute(key);
        Self {
            before: has("pragma-spc") || has("pragma-spc1"),
            after: has("pragma-spc0") || has("pragma-spc1"),
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('\\', "\\textbackslash{}").replace('_', "\\_")
}

fn is_sentinel(node: &SyntaxNode) -> bool {
    matches!(node, SyntaxNode::Object(object) if object.is_sentinel())
}

fn command_options(attributes: Option<&Attributes>, skip: &[&str]) -> Vec<String> {
    attributes
        .into_iter()
        .flatten()
        .filter(|(key, _)| !key.starts_with(PRAGMA_PREFIX) && !skip.contains(&key.as_str()))
        .map(|(key, value)| {
            if value.is_empty() {
                key.clone()
            } else {
                format!("{key}={value}")
            }
        })
        .collect()
}

struct LatexWriter<'c> {
    w: IndentWriter<'c>,
    /// Options from the last sentinel, consumed by the next table
    table_options: Option<LatexTableOptions>,
    /// Leading blanks of the next text are dropped after a trailing pragma space
    eat_space: bool,
}

impl LatexWriter<'_> {
    fn emit(&mut self, text: &str) {
        self.eat_space = false;
        self.w.push(text);
    }

    fn indent(&mut self) {
        self.eat_space = false;
        self.w.indent();
    }

    fn render_content(&mut self, nodes: &[SyntaxNode]) {
        for node in nodes {
            self.render_node(node);
        }
    }

    fn render_node(&mut self, node: &SyntaxNode) {
        match node {
            SyntaxNode::Text(text) => self.render_text(&text.value),
            SyntaxNode::Newline(_) => self.emit("\\\\\n"),
            SyntaxNode::Raw(raw) => self.emit(&raw.value),
            SyntaxNode::Span(span) => self.render_span(span),
            SyntaxNode::Object(object) => self.render_object(object),
            SyntaxNode::CodeBlock(code) => self.render_code_block(code),
            SyntaxNode::Segment(segment) => self.render_segment(segment),
            SyntaxNode::Table(table) => self.render_table(table),
            SyntaxNode::TableRow(_) => self.emit(&format!("!?!{}", node.kind_name())),
        }
    }

    fn render_text(&mut self, text: &str) {
        let text = if self.eat_space {
            let trimmed = text.trim_start_matches([' ', '\t']);
            if trimmed.is_empty() {
                return;
            }
            trimmed
        } else {
            text
        };
        self.emit(&escape_text(text));
    }

    fn space_before(&mut self, spacing: Spacing) {
        if spacing.before {
            self.w.trim_trailing_blanks();
            self.emit(" ");
        }
    }

    fn space_after(&mut self, spacing: Spacing) {
        if spacing.after {
            self.emit(" ");
            self.eat_space = true;
        }
    }

    fn render_span(&mut self, span: &Span) {
        let spacing = Spacing::of(&span.format);
        self.space_before(spacing);

        let command = match span.modifier {
            Some(Modifier::Code) => Some("\\texttt{"),
            Some(Modifier::Bold) => Some("\\textbf{"),
            Some(Modifier::Italics) => Some("\\textit{"),
            None => None,
        };
        match command {
            Some(command) => {
                self.emit(command);
                self.render_content(&span.content);
                self.emit("}");
            }
            None => self.render_content(&span.content),
        }

        self.space_after(spacing);
    }

    fn render_object(&mut self, object: &Object) {
        match object.kind {
            ObjectKind::Link => match &object.value {
                Some(url) => {
                    self.emit(&format!("\\href{{{url}}}{{"));
                    self.render_content(&object.content);
                    self.emit("}");
                }
                None => self.render_content(&object.content),
            },
            ObjectKind::Media => {
                let options = command_options(object.format.attributes.as_ref(), &["alt"]);
                self.emit("\\includegraphics");
                if !options.is_empty() {
                    self.emit(&format!("[{}]", options.join(", ")));
                }
                self.emit(&format!("{{{}}}", object.value.as_deref().unwrap_or_default()));
            }
            ObjectKind::Raw if object.is_sentinel() => self.consume_sentinel(object),
            ObjectKind::Raw => self.render_command(object),
        }
    }

    fn consume_sentinel(&mut self, object: &Object) {
        if object.value.as_deref() != Some(TABLE_OPTIONS_TAG) {
            return;
        }
        let Some(value) = object.format.attribute("value") else {
            return;
        };
        match serde_json::from_str(value) {
            Ok(options) => self.table_options = Some(options),
            Err(error) => tracing::debug!(%error, "ignoring malformed table options"),
        }
    }

    fn render_command(&mut self, object: &Object) {
        let Some(name) = object.value.as_deref() else {
            self.render_content(&object.content);
            return;
        };

        let spacing = Spacing::of(&object.format);
        let block = object.format.has_attribute("pragma-block");
        let name = if object.format.has_attribute("pragma-star") {
            format!("{name}*")
        } else {
            name.to_string()
        };

        self.space_before(spacing);
        if block {
            self.emit(&format!("\\begin{{{name}}}"));
        } else {
            self.emit(&format!("\\{name}"));
        }

        let options = command_options(object.format.attributes.as_ref(), &[]);
        if !options.is_empty() {
            self.emit(&format!("[{}]", options.join(", ")));
        }

        if !object.content.is_empty() {
            if !block {
                self.emit("{");
            }
            self.render_content(&object.content);
            if !block {
                self.emit("}");
            }
        }

        if block {
            self.emit(&format!("\\end{{{name}}}"));
        }
        self.space_after(spacing);
    }

    fn render_segment(&mut self, segment: &Segment) {
        let Some(kind) = segment.kind else {
            self.render_content(&segment.content);
            return;
        };

        match kind {
            SegmentKind::H1 | SegmentKind::H2 | SegmentKind::H3 | SegmentKind::H4 => {
                let (command, end) = match kind {
                    SegmentKind::H1 => ("\\section{", "}\n\n"),
                    SegmentKind::H2 => ("\\subsection{", "}\n\n"),
                    SegmentKind::H3 => ("\\subsubsection{", "}\n\n"),
                    _ => ("\\paragraph{", "}\n"),
                };
                self.indent();
                self.emit(command);
                self.w.skip_next_indent();
                self.render_content(&segment.content);
                self.emit(end);
            }
            SegmentKind::P if segment.content.iter().all(is_sentinel) => {
                for node in &segment.content {
                    self.render_node(node);
                }
            }
            SegmentKind::P => {
                self.indent();
                self.render_content(&segment.content);
                self.emit("\n\n");
            }
            SegmentKind::Ul | SegmentKind::Ol | SegmentKind::Quote => {
                let environment = match kind {
                    SegmentKind::Ul => "itemize",
                    SegmentKind::Ol => "enumerate",
                    _ => "quote",
                };
                self.indent();
                self.emit(&format!("\\begin{{{environment}}}\n"));
                self.w.more();
                self.render_content(&segment.content);
                self.w.less();
                self.indent();
                self.emit(&format!("\\end{{{environment}}}\n"));
            }
            SegmentKind::Li => {
                self.indent();
                self.emit("\\item ");
                self.w.skip_next_indent();
                self.render_content(&segment.content);
            }
        }
    }

    fn render_code_block(&mut self, code: &CodeBlock) {
        self.indent();
        self.emit("\\begin{verbatim}\n");
        self.emit(&code.content);
        self.w.ensure_newline();
        self.emit("\\end{verbatim}\n\n");
    }

    fn column_spec(options: &LatexTableOptions, columns: usize) -> String {
        let border = if options.naked { "" } else { "|" };
        let columns: Vec<String> = (0..columns)
            .map(|i| match (options.widths.get(i), options.types.get(i)) {
                (Some(width), _) => format!("p{{{width}\\linewidth}}"),
                (None, Some(ty)) => ty.clone(),
                (None, None) => "l".to_string(),
            })
            .collect();
        format!("{border}{}{border}", columns.join(border))
    }

    fn render_table(&mut self, table: &Table) {
        let options = self.table_options.take().unwrap_or_default();
        let rows: Vec<&TableRow> = table
            .content
            .iter()
            .filter_map(|row| match row {
                SyntaxNode::TableRow(row) => Some(row),
                _ => None,
            })
            .collect();
        let columns = rows.iter().map(|row| row.content.len()).max().unwrap_or(0);
        let environment = if options.long { "longtable" } else { "tabular" };

        self.indent();
        self.emit(&format!(
            "\\begin{{{environment}}}{{{}}}\n",
            Self::column_spec(&options, columns)
        ));
        self.w.more();
        if !options.naked {
            self.indent();
            self.emit("\\hline\n");
        }

        for (index, row) in rows.iter().enumerate() {
            self.indent();
            for (column, cell) in row.content.iter().enumerate() {
                if column > 0 {
                    self.emit(" & ");
                }
                match cell {
                    SyntaxNode::Segment(cell) if cell.kind.is_none() => self.render_content(&cell.content),
                    other => self.render_node(other),
                }
            }
            self.emit(" \\\\\n");

            let last = index + 1 == rows.len();
            if !options.naked && (!options.compact || row.header || last) {
                self.indent();
                self.emit("\\hline\n");
            }
        }

        self.w.less();
        self.indent();
        self.emit(&format!("\\end{{{environment}}}\n\n"));
    }
}
