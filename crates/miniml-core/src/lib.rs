// SPDX-License-Identifier: AGPL-3.0-or-later
//! MiniML core - typed syntax tree, parser and exporters
//!
//! This crate provides:
//! - A closed syntax tree shared by the parser, transforms and exporters
//! - A recursive-descent parser with schema-typed widget tags
//! - A list normalizer for trees built by importers
//! - Exporters for HTML, LaTeX, Typst, MiniML and render-function snippets

pub mod ast;
pub mod convert;
pub mod formats;
pub mod normalize;
pub mod parser;
pub mod traits;
pub mod widget;

pub use ast::{Format, Modifier, ObjectKind, SegmentKind, SyntaxNode};
pub use convert::{load, ConvertOptions, WidgetSet};
pub use normalize::normalize_lists;
pub use parser::{parse, MinimlParser};
pub use traits::{
    ConversionError, InputFormat, OutputFormat, RenderConfig, Renderer, RendererExt,
    RendererRegistry, Result,
};
pub use widget::{Widget, WidgetRegistry};
