// SPDX-License-Identifier: AGPL-3.0-or-later
//! Typed syntax tree for MiniML documents
//!
//! The tree is the only artifact exchanged between the parser, the list
//! normalizer and the exporters. It is a strict tree: every node owns its
//! `content` and nothing is shared between nodes or documents.

use indexmap::IndexMap;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Ordered attribute map, keys are unique and keep insertion order
pub type Attributes = IndexMap<String, String>;

/// Palette entries accepted by [`Color`] besides `#RRGGBB`
pub const COLOR_NAMES: [&str; 7] = [
    "white",
    "black",
    "primary",
    "secondary",
    "success",
    "danger",
    "warning",
];

/// Text color: a named palette entry or a `#RRGGBB` literal
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum Color {
    Named(&'static str),
    Hex(String),
}

impl Color {
    pub fn as_str(&self) -> &str {
        match self {
            Color::Named(name) => name,
            Color::Hex(hex) => hex,
        }
    }

    pub fn is_hex(&self) -> bool {
        matches!(self, Color::Hex(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color {0:?}, expected one of {names} or #RRGGBB", names = COLOR_NAMES.join(", "))]
pub struct InvalidColor(pub String);

impl FromStr for Color {
    type Err = InvalidColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Ok(Color::Hex(s.to_string()));
            }
            return Err(InvalidColor(s.to_string()));
        }

        COLOR_NAMES
            .iter()
            .find(|name| **name == s)
            .map(|name| Color::Named(name))
            .ok_or_else(|| InvalidColor(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.as_str().to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Center,
    Right,
}

impl Align {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
        }
    }
}

impl FromStr for Align {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Align::Left),
            "center" => Ok(Align::Center),
            "right" => Ok(Align::Right),
            _ => Err(()),
        }
    }
}

/// Inline emphasis carried by a [`Span`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Bold,
    Italics,
    Code,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Link,
    Media,
    Raw,
}

/// Block role of a [`Segment`]; `None` on the segment means a generic group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    P,
    H1,
    H2,
    H3,
    H4,
    Ul,
    Ol,
    Li,
    Quote,
}

impl SegmentKind {
    /// Heading for a marker run of `level` characters, clamped to 1..=4
    pub const fn heading(level: usize) -> Self {
        match level {
            0 | 1 => SegmentKind::H1,
            2 => SegmentKind::H2,
            3 => SegmentKind::H3,
            _ => SegmentKind::H4,
        }
    }

    pub const fn heading_level(&self) -> Option<usize> {
        match self {
            SegmentKind::H1 => Some(1),
            SegmentKind::H2 => Some(2),
            SegmentKind::H3 => Some(3),
            SegmentKind::H4 => Some(4),
            _ => None,
        }
    }

    pub const fn is_list(&self) -> bool {
        matches!(self, SegmentKind::Ul | SegmentKind::Ol)
    }
}

/// Style fields shared by every node kind that carries content
///
/// Every field is independently optional. An absent field means "nothing",
/// exporters never inherit a value from an ancestor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Format {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_list: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Attributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<Align>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl Format {
    pub fn is_empty(&self) -> bool {
        self.color.is_none()
            && self.class_list.is_none()
            && self.attributes.is_none()
            && self.align.is_none()
            && self.width.is_none()
            && self.height.is_none()
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.as_ref()?.get(key).map(String::as_str)
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.as_ref().is_some_and(|attrs| attrs.contains_key(key))
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes
            .get_or_insert_with(Attributes::new)
            .insert(key.into(), value.into());
    }

    /// Removes `key`, collapsing an emptied map back to `None`
    pub fn remove_attribute(&mut self, key: &str) -> Option<String> {
        let attrs = self.attributes.as_mut()?;
        let removed = attrs.shift_remove(key);
        if attrs.is_empty() {
            self.attributes = None;
        }
        removed
    }

    pub fn push_class(&mut self, class: impl Into<String>) {
        self.class_list.get_or_insert_with(Vec::new).push(class.into());
    }

    /// Fills every absent field of `self` from `other`; attributes and
    /// classes are merged, with keys already present in `self` kept.
    pub fn merge_missing(&mut self, other: Format) {
        if self.color.is_none() {
            self.color = other.color;
        }
        if self.align.is_none() {
            self.align = other.align;
        }
        if self.width.is_none() {
            self.width = other.width;
        }
        if self.height.is_none() {
            self.height = other.height;
        }
        if let Some(classes) = other.class_list {
            self.class_list.get_or_insert_with(Vec::new).extend(classes);
        }
        if let Some(attrs) = other.attributes {
            let own = self.attributes.get_or_insert_with(Attributes::new);
            for (key, value) in attrs {
                own.entry(key).or_insert(value);
            }
        }
    }
}

/// Value stored in a node's metadata side-table
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    String(String),
    Bool(bool),
    Integer(i64),
    Float(f64),
    List(Vec<MetaValue>),
}

impl MetaValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            MetaValue::Integer(value) => Some(*value),
            MetaValue::Float(value) => Some(*value as i64),
            _ => None,
        }
    }
}

/// Transform-local annotations attached to a node
///
/// Allocated on first write. Metadata is not part of the document: it is never
/// serialized and never takes part in equality.
#[derive(Debug, Clone, Default)]
pub struct Metadata(Option<Box<HashMap<String, MetaValue>>>);

impl Metadata {
    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.0.as_ref()?.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: MetaValue) {
        self.0
            .get_or_insert_with(Default::default)
            .insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.as_ref().map_or(true, |map| map.is_empty())
    }
}

impl PartialEq for Metadata {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub value: String,
    #[serde(skip)]
    pub meta: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Newline {
    #[serde(skip)]
    pub meta: Metadata,
}

/// Verbatim output, never escaped by any exporter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Raw {
    pub value: String,
    #[serde(skip)]
    pub meta: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Span {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<Modifier>,
    #[serde(flatten)]
    pub format: Format,
    #[serde(default)]
    pub content: Vec<SyntaxNode>,
    #[serde(skip)]
    pub meta: Metadata,
}

/// Link, media reference or generic tag; `value` is the URL or the tag name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(flatten)]
    pub format: Format,
    #[serde(default)]
    pub content: Vec<SyntaxNode>,
    #[serde(skip)]
    pub meta: Metadata,
}

impl Object {
    pub fn new(kind: ObjectKind, value: Option<String>, content: Vec<SyntaxNode>) -> Self {
        Self {
            kind,
            value,
            format: Format::default(),
            content,
            meta: Metadata::default(),
        }
    }

    /// Raw object whose tag name is an internal `<>` marker
    pub fn is_sentinel(&self) -> bool {
        self.kind == ObjectKind::Raw && self.value.as_deref().is_some_and(|v| v.starts_with("<>"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    #[serde(default)]
    pub lang: Option<String>,
    pub content: String,
    #[serde(skip)]
    pub meta: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(rename = "type", default)]
    pub kind: Option<SegmentKind>,
    #[serde(flatten)]
    pub format: Format,
    #[serde(default)]
    pub content: Vec<SyntaxNode>,
    #[serde(skip)]
    pub meta: Metadata,
}

impl Segment {
    pub fn new(kind: Option<SegmentKind>, content: Vec<SyntaxNode>) -> Self {
        Self {
            kind,
            content,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(flatten)]
    pub format: Format,
    #[serde(default)]
    pub content: Vec<SyntaxNode>,
    #[serde(skip)]
    pub meta: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    #[serde(default)]
    pub header: bool,
    #[serde(flatten)]
    pub format: Format,
    #[serde(default)]
    pub content: Vec<SyntaxNode>,
    #[serde(skip)]
    pub meta: Metadata,
}

/// A node of the MiniML syntax tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SyntaxNode {
    Text(Text),
    Newline(Newline),
    Raw(Raw),
    Span(Span),
    Object(Object),
    CodeBlock(CodeBlock),
    Segment(Segment),
    Table(Table),
    TableRow(TableRow),
}

impl SyntaxNode {
    pub fn text(value: impl Into<String>) -> Self {
        SyntaxNode::Text(Text {
            value: value.into(),
            meta: Metadata::default(),
        })
    }

    pub fn newline() -> Self {
        SyntaxNode::Newline(Newline::default())
    }

    pub fn raw(value: impl Into<String>) -> Self {
        SyntaxNode::Raw(Raw {
            value: value.into(),
            meta: Metadata::default(),
        })
    }

    pub fn span(modifier: Option<Modifier>, content: Vec<SyntaxNode>) -> Self {
        SyntaxNode::Span(Span {
            modifier,
            content,
            ..Default::default()
        })
    }

    pub fn link(url: Option<String>, content: Vec<SyntaxNode>) -> Self {
        SyntaxNode::Object(Object::new(ObjectKind::Link, url, content))
    }

    pub fn media(url: Option<String>, alt: impl Into<String>) -> Self {
        let mut object = Object::new(ObjectKind::Media, url, Vec::new());
        object.format.set_attribute("alt", alt);
        SyntaxNode::Object(object)
    }

    pub fn raw_object(name: impl Into<String>, content: Vec<SyntaxNode>) -> Self {
        SyntaxNode::Object(Object::new(ObjectKind::Raw, Some(name.into()), content))
    }

    pub fn code_block(lang: Option<String>, content: impl Into<String>) -> Self {
        SyntaxNode::CodeBlock(CodeBlock {
            lang,
            content: content.into(),
            meta: Metadata::default(),
        })
    }

    pub fn segment(kind: Option<SegmentKind>, content: Vec<SyntaxNode>) -> Self {
        SyntaxNode::Segment(Segment::new(kind, content))
    }

    pub fn table(rows: Vec<SyntaxNode>) -> Self {
        SyntaxNode::Table(Table {
            content: rows,
            ..Default::default()
        })
    }

    pub fn table_row(header: bool, cells: Vec<SyntaxNode>) -> Self {
        SyntaxNode::TableRow(TableRow {
            header,
            content: cells,
            ..Default::default()
        })
    }

    /// Stable name of the node kind, as used by the serialized `kind` tag
    pub const fn kind_name(&self) -> &'static str {
        match self {
            SyntaxNode::Text(_) => "text",
            SyntaxNode::Newline(_) => "newline",
            SyntaxNode::Raw(_) => "raw",
            SyntaxNode::Span(_) => "span",
            SyntaxNode::Object(_) => "object",
            SyntaxNode::CodeBlock(_) => "code-block",
            SyntaxNode::Segment(_) => "segment",
            SyntaxNode::Table(_) => "table",
            SyntaxNode::TableRow(_) => "table-row",
        }
    }

    /// Child nodes; `None` for leaves and for code blocks
    pub fn content(&self) -> Option<&[SyntaxNode]> {
        match self {
            SyntaxNode::Span(node) => Some(&node.content),
            SyntaxNode::Object(node) => Some(&node.content),
            SyntaxNode::Segment(node) => Some(&node.content),
            SyntaxNode::Table(node) => Some(&node.content),
            SyntaxNode::TableRow(node) => Some(&node.content),
            SyntaxNode::Text(_)
            | SyntaxNode::Newline(_)
            | SyntaxNode::Raw(_)
            | SyntaxNode::CodeBlock(_) => None,
        }
    }

    pub fn content_mut(&mut self) -> Option<&mut Vec<SyntaxNode>> {
        match self {
            SyntaxNode::Span(node) => Some(&mut node.content),
            SyntaxNode::Object(node) => Some(&mut node.content),
            SyntaxNode::Segment(node) => Some(&mut node.content),
            SyntaxNode::Table(node) => Some(&mut node.content),
            SyntaxNode::TableRow(node) => Some(&mut node.content),
            SyntaxNode::Text(_)
            | SyntaxNode::Newline(_)
            | SyntaxNode::Raw(_)
            | SyntaxNode::CodeBlock(_) => None,
        }
    }

    pub fn format(&self) -> Option<&Format> {
        match self {
            SyntaxNode::Span(node) => Some(&node.format),
            SyntaxNode::Object(node) => Some(&node.format),
            SyntaxNode::Segment(node) => Some(&node.format),
            SyntaxNode::Table(node) => Some(&node.format),
            SyntaxNode::TableRow(node) => Some(&node.format),
            _ => None,
        }
    }

    pub fn format_mut(&mut self) -> Option<&mut Format> {
        match self {
            SyntaxNode::Span(node) => Some(&mut node.format),
            SyntaxNode::Object(node) => Some(&mut node.format),
            SyntaxNode::Segment(node) => Some(&mut node.format),
            SyntaxNode::Table(node) => Some(&mut node.format),
            SyntaxNode::TableRow(node) => Some(&mut node.format),
            _ => None,
        }
    }

    pub fn metadata(&self) -> &Metadata {
        match self {
            SyntaxNode::Text(node) => &node.meta,
            SyntaxNode::Newline(node) => &node.meta,
            SyntaxNode::Raw(node) => &node.meta,
            SyntaxNode::Span(node) => &node.meta,
            SyntaxNode::Object(node) => &node.meta,
            SyntaxNode::CodeBlock(node) => &node.meta,
            SyntaxNode::Segment(node) => &node.meta,
            SyntaxNode::Table(node) => &node.meta,
            SyntaxNode::TableRow(node) => &node.meta,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        match self {
            SyntaxNode::Text(node) => &mut node.meta,
            SyntaxNode::Newline(node) => &mut node.meta,
            SyntaxNode::Raw(node) => &mut node.meta,
            SyntaxNode::Span(node) => &mut node.meta,
            SyntaxNode::Object(node) => &mut node.meta,
            SyntaxNode::CodeBlock(node) => &mut node.meta,
            SyntaxNode::Segment(node) => &mut node.meta,
            SyntaxNode::Table(node) => &mut node.meta,
            SyntaxNode::TableRow(node) => &mut node.meta,
        }
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: MetaValue) {
        self.metadata_mut().set(key, value);
    }

    /// Segment kind, `None` for non-segments and generic groups alike
    pub fn segment_kind(&self) -> Option<SegmentKind> {
        match self {
            SyntaxNode::Segment(segment) => segment.kind,
            _ => None,
        }
    }

    /// Count words in text leaves below this node
    pub fn word_count(&self) -> usize {
        match self {
            SyntaxNode::Text(text) => text.value.split_whitespace().count(),
            SyntaxNode::CodeBlock(code) => code.content.split_whitespace().count(),
            _ => self
                .content()
                .map_or(0, |content| content.iter().map(SyntaxNode::word_count).sum()),
        }
    }
}
