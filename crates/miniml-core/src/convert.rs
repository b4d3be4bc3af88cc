// SPDX-License-Identifier: AGPL-3.0-or-later
//! One-call conversion: load, optionally normalize, render

use crate::ast::SyntaxNode;
use crate::formats::{
    DeclareWidget, DumpRenderer, HtmlRenderer, LatexRenderer, MarkdownRenderer, MathWidget,
    PropWidget, RenderFunctionRenderer, ScriptWidget, TableOptionsWidget, TypstRenderer,
};
use crate::normalize::normalize_lists;
use crate::parser::parse;
use crate::traits::{ConversionError, InputFormat, OutputFormat, RenderConfig, RendererRegistry, Result};
use crate::widget::WidgetRegistry;
use serde::{Deserialize, Serialize};

/// Built-in widget families to register before parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetSet {
    /// `Math`
    pub math: bool,
    /// `TableOptions`
    pub table_options: bool,
    /// `Script`
    pub script: bool,
    /// `Prop` and `Declare`
    pub properties: bool,
}

impl Default for WidgetSet {
    fn default() -> Self {
        Self {
            math: true,
            table_options: true,
            script: true,
            properties: false,
        }
    }
}

impl WidgetSet {
    /// No widgets at all: every capitalized tag stays generic markup
    pub const NONE: WidgetSet = WidgetSet {
        math: false,
        table_options: false,
        script: false,
        properties: false,
    };

    pub fn registry(&self) -> WidgetRegistry {
        let mut registry = WidgetRegistry::new();
        if self.math {
            registry.register(Box::new(MathWidget));
        }
        if self.table_options {
            registry.register(Box::new(TableOptionsWidget));
        }
        if self.script {
            registry.register(Box::new(ScriptWidget));
        }
        if self.properties {
            registry.register(Box::new(PropWidget));
            registry.register(Box::new(DeclareWidget));
        }
        registry
    }
}

/// Options for [`RendererRegistry::convert`], loadable from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    pub normalize_lists: bool,
    pub widgets: WidgetSet,
    pub render: RenderConfig,
}

/// Build a tree from `input`, then normalize lists when asked to
pub fn load(input: &str, format: InputFormat, options: &ConvertOptions) -> Result<SyntaxNode> {
    let root = match format {
        InputFormat::Miniml => parse(input, &options.widgets.registry())?,
        InputFormat::Ast => serde_json::from_str(input).map_err(|e| ConversionError::ParseError {
            line: e.line(),
            column: e.column(),
            message: e.to_string(),
        })?,
    };

    if !options.normalize_lists {
        return Ok(root);
    }

    let (normalized, modified) = normalize_lists(root.clone());
    tracing::debug!(modified, "list normalization");
    Ok(if modified { normalized } else { root })
}

impl RendererRegistry {
    /// Registry with every built-in renderer
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(HtmlRenderer::new()));
        registry.register(Box::new(LatexRenderer::new()));
        registry.register(Box::new(TypstRenderer::new()));
        registry.register(Box::new(MarkdownRenderer::new()));
        registry.register(Box::new(RenderFunctionRenderer::new()));
        registry.register(Box::new(DumpRenderer::new()));
        registry
    }

    /// Load `input` and render it to `output`
    pub fn convert(
        &self,
        input: &str,
        from: InputFormat,
        output: OutputFormat,
        options: &ConvertOptions,
    ) -> Result<String> {
        let root = load(input, from, options)?;
        self.render(&root, output, &options.render)
    }
}
