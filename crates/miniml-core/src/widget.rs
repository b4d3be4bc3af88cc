// SPDX-License-Identifier: AGPL-3.0-or-later
//! Widget protocol: schema-typed extension tags evaluated during parsing
//!
//! A widget is registered under a capitalized tag name. When the parser meets
//! `<Name attrs>content</Name>` it coerces the raw attribute strings into the
//! widget's declared fields and asks the widget for a replacement node.

use crate::ast::{Attributes, Object, SyntaxNode};
use crate::traits::{ConversionError, Result};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;

/// Declared type of a widget field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Enum(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
}

impl FieldSchema {
    pub const fn required(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: false,
        }
    }
}

/// Tag name, typed fields and verbatim flag of a widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidgetSchema {
    pub name: &'static str,
    pub fields: &'static [FieldSchema],
    /// Body is captured as raw text up to the closing tag instead of scanned
    pub verbatim: bool,
}

impl WidgetSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

/// Coerced field values handed to [`Widget::get_value`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WidgetValues(IndexMap<&'static str, FieldValue>);

impl WidgetValues {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        match self.0.get(name)? {
            FieldValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.0.get(name)? {
            FieldValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.0.get(name)? {
            FieldValue::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    /// Optional boolean, absent counts as `false`
    pub fn flag(&self, name: &str) -> bool {
        self.boolean(name).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn coerce_field(ty: FieldType, raw: &str) -> std::result::Result<FieldValue, String> {
    match ty {
        FieldType::String => Ok(FieldValue::String(raw.to_string())),
        FieldType::Number => raw
            .trim()
            .parse::<f64>()
            .map(FieldValue::Number)
            .map_err(|_| "expected a number".to_string()),
        // A bare attribute has an empty value and reads as a set flag
        FieldType::Boolean => match raw {
            "" | "true" | "1" => Ok(FieldValue::Boolean(true)),
            "false" | "0" => Ok(FieldValue::Boolean(false)),
            _ => Err("expected a boolean".to_string()),
        },
        FieldType::Enum(options) => {
            if options.contains(&raw) {
                Ok(FieldValue::String(raw.to_string()))
            } else {
                Err(format!("expected one of {}", options.join(", ")))
            }
        }
    }
}

/// Coerce raw attribute strings into the fields declared by `schema`
///
/// A required field that is missing or fails to coerce is an error. An
/// optional field that fails to coerce is left absent.
pub fn coerce(schema: &WidgetSchema, attributes: Option<&Attributes>) -> Result<WidgetValues> {
    let mut values = WidgetValues::default();

    for field in schema.fields {
        let Some(raw) = attributes.and_then(|attrs| attrs.get(field.name)) else {
            if field.required {
                return Err(ConversionError::MissingWidgetAttribute {
                    widget: schema.name.to_string(),
                    field: field.name.to_string(),
                });
            }
            continue;
        };

        match coerce_field(field.ty, raw) {
            Ok(value) => {
                values.0.insert(field.name, value);
            }
            Err(reason) if field.required => {
                return Err(ConversionError::WidgetAttribute {
                    widget: schema.name.to_string(),
                    field: field.name.to_string(),
                    value: raw.clone(),
                    reason,
                });
            }
            Err(reason) => {
                tracing::debug!(
                    widget = schema.name,
                    field = field.name,
                    value = raw.as_str(),
                    %reason,
                    "dropping optional widget attribute"
                );
            }
        }
    }

    Ok(values)
}

/// A named extension tag producing a replacement inline node
pub trait Widget: Send + Sync {
    fn schema(&self) -> &WidgetSchema;

    /// Build the node replacing the tag; `None` drops the tag entirely
    fn get_value(&self, values: &WidgetValues, content: Vec<SyntaxNode>)
        -> Result<Option<SyntaxNode>>;

    /// Content handed to [`Widget::get_value`] for a verbatim body
    fn parse_verbatim_content(&self, content: &str) -> Vec<SyntaxNode> {
        vec![SyntaxNode::raw(content)]
    }
}

type WidgetFn = dyn Fn(&WidgetValues, Vec<SyntaxNode>) -> Result<Option<SyntaxNode>> + Send + Sync;

/// Widget backed by a closure
pub struct FnWidget {
    schema: WidgetSchema,
    build: Box<WidgetFn>,
}

impl FnWidget {
    pub fn new(
        schema: WidgetSchema,
        build: impl Fn(&WidgetValues, Vec<SyntaxNode>) -> Result<Option<SyntaxNode>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            schema,
            build: Box::new(build),
        }
    }
}

impl Widget for FnWidget {
    fn schema(&self) -> &WidgetSchema {
        &self.schema
    }

    fn get_value(
        &self,
        values: &WidgetValues,
        content: Vec<SyntaxNode>,
    ) -> Result<Option<SyntaxNode>> {
        (self.build)(values, content)
    }
}

/// Per-parser mapping from tag name to widget
#[derive(Default)]
pub struct WidgetRegistry {
    widgets: HashMap<&'static str, Box<dyn Widget>>,
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, widget: Box<dyn Widget>) {
        self.widgets.insert(widget.schema().name, widget);
    }

    pub fn register_fn(
        &mut self,
        schema: WidgetSchema,
        build: impl Fn(&WidgetValues, Vec<SyntaxNode>) -> Result<Option<SyntaxNode>>
            + Send
            + Sync
            + 'static,
    ) {
        self.register(Box::new(FnWidget::new(schema, build)));
    }

    pub fn with(mut self, widget: impl Widget + 'static) -> Self {
        self.register(Box::new(widget));
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn Widget> {
        self.widgets.get(name).map(|w| w.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.widgets.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }
}

impl fmt::Debug for WidgetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.widgets.keys().collect();
        names.sort();
        f.debug_struct("WidgetRegistry").field("widgets", &names).finish()
    }
}

/// Evaluate `widget` for a scanned tag
///
/// Schema keys are stripped from the tag's format before the remainder is
/// merged onto the produced node. Values set by the widget win over inherited
/// ones.
pub(crate) fn apply(
    widget: &dyn Widget,
    mut tag: Object,
    content: Vec<SyntaxNode>,
) -> Result<Option<SyntaxNode>> {
    let schema = widget.schema();
    let values = coerce(schema, tag.format.attributes.as_ref())?;

    tracing::debug!(
        widget = schema.name,
        verbatim = schema.verbatim,
        fields = values.len(),
        "dispatching widget"
    );

    let produced = widget.get_value(&values, content)?;

    let mut inherited = std::mem::take(&mut tag.format);
    for field in schema.fields {
        inherited.remove_attribute(field.name);
    }

    Ok(produced.map(|mut node| {
        if let Some(format) = node.format_mut() {
            format.merge_missing(inherited);
        }
        node
    }))
}
