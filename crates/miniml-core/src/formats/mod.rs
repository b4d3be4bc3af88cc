// SPDX-License-Identifier: AGPL-3.0-or-later
//! Exporters for each supported output format

pub mod element;
pub(crate) mod writer;

pub mod dump;
pub mod html;
pub mod latex;
pub mod markdown;
pub mod render_fn;
pub mod typst;

pub use dump::DumpRenderer;
pub use element::{normalize_attributes, ElementRenderer};
pub use html::HtmlRenderer;
pub use latex::{LatexRenderer, LatexTableOptions, MathWidget, TableOptionsWidget};
pub use markdown::MarkdownRenderer;
pub use render_fn::{
    DeclareWidget, PropWidget, PropertyDecl, PropertyManifest, RenderFunction,
    RenderFunctionRenderer,
};
pub use typst::{ScriptWidget, TypstRenderer};
