// SPDX-License-Identifier: AGPL-3.0-or-later
//! Renderer trait, error type and configuration shared by every exporter

use crate::ast::SyntaxNode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;

/// Error type for parsing, widget coercion and rendering
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Parse error at line {line}, column {column}: {message}")]
    ParseError {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Invalid value {value:?} for attribute `{field}` of widget <{widget}>: {reason}")]
    WidgetAttribute {
        widget: String,
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required attribute `{field}` of widget <{widget}>")]
    MissingWidgetAttribute { widget: String, field: String },

    #[error("Unsupported feature: {feature} in format {format}")]
    UnsupportedFeature { format: String, feature: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, ConversionError>;

/// Formats a document can be loaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputFormat {
    /// MiniML source text
    #[serde(alias = "md")]
    Miniml,
    /// A JSON syntax tree produced by an import collaborator
    Ast,
}

impl InputFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "md" | "mml" | "markdown" => Some(InputFormat::Miniml),
            "json" => Some(InputFormat::Ast),
            _ => None,
        }
    }
}

/// Formats the registry can render to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    Html,
    Latex,
    Typst,
    Markdown,
    RenderFunction,
    Dump,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 6] = [
        OutputFormat::Html,
        OutputFormat::Latex,
        OutputFormat::Typst,
        OutputFormat::Markdown,
        OutputFormat::RenderFunction,
        OutputFormat::Dump,
    ];

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "html" | "htm" => Some(OutputFormat::Html),
            "tex" => Some(OutputFormat::Latex),
            "typ" => Some(OutputFormat::Typst),
            "md" | "mml" => Some(OutputFormat::Markdown),
            "js" => Some(OutputFormat::RenderFunction),
            "json" => Some(OutputFormat::Dump),
            _ => None,
        }
    }

    /// Preferred file extension, without the dot
    pub const fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Latex => "tex",
            OutputFormat::Typst => "typ",
            OutputFormat::Markdown => "md",
            OutputFormat::RenderFunction => "js",
            OutputFormat::Dump => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Html => "html",
            OutputFormat::Latex => "latex",
            OutputFormat::Typst => "typst",
            OutputFormat::Markdown => "markdown",
            OutputFormat::RenderFunction => "render-function",
            OutputFormat::Dump => "dump",
        };
        f.write_str(name)
    }
}

/// Configuration for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Indentation emitted per nesting level by the LaTeX and Typst exporters
    pub indent: String,
    /// Component names the render-function generator may reference directly
    pub allowed_components: Vec<String>,
    /// Enables `Prop` and `Declare` bindings in the render-function generator
    pub allow_properties: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            indent: "    ".to_string(),
            allowed_components: Vec::new(),
            allow_properties: false,
        }
    }
}

/// Renderer trait: convert a syntax tree to target format text
pub trait Renderer: Send + Sync {
    /// The target format this renderer produces
    fn format(&self) -> OutputFormat;

    /// Render a tree to a string
    fn render(&self, root: &SyntaxNode, config: &RenderConfig) -> Result<String>;
}

/// Extension trait for streaming operations (not dyn-compatible)
pub trait RendererExt: Renderer {
    /// Render to a writer
    fn render_writer<W: Write>(
        &self,
        root: &SyntaxNode,
        writer: &mut W,
        config: &RenderConfig,
    ) -> Result<()> {
        let output = self.render(root, config)?;
        writer.write_all(output.as_bytes())?;
        Ok(())
    }
}

impl<T: Renderer> RendererExt for T {}

/// Registry of renderers keyed by output format
pub struct RendererRegistry {
    renderers: HashMap<OutputFormat, Box<dyn Renderer>>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self {
            renderers: HashMap::new(),
        }
    }

    pub fn register(&mut self, renderer: Box<dyn Renderer>) {
        self.renderers.insert(renderer.format(), renderer);
    }

    pub fn get(&self, format: OutputFormat) -> Option<&dyn Renderer> {
        self.renderers.get(&format).map(|r| r.as_ref())
    }

    pub fn render(
        &self,
        root: &SyntaxNode,
        format: OutputFormat,
        config: &RenderConfig,
    ) -> Result<String> {
        let renderer = self
            .get(format)
            .ok_or_else(|| ConversionError::UnsupportedFeature {
                format: format.to_string(),
                feature: "rendering".to_string(),
            })?;

        renderer.render(root, config)
    }
}

impl Default for RendererRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_from_extension() {
        assert_eq!(OutputFormat::from_extension("htm"), Some(OutputFormat::Html));
        assert_eq!(OutputFormat::from_extension("TEX"), Some(OutputFormat::Latex));
        assert_eq!(OutputFormat::from_extension("typ"), Some(OutputFormat::Typst));
        assert_eq!(OutputFormat::from_extension("docx"), None);
        for format in OutputFormat::ALL {
            assert_eq!(OutputFormat::from_extension(format.extension()), Some(format));
        }
    }

    #[test]
    fn test_input_format_from_extension() {
        assert_eq!(InputFormat::from_extension("mml"), Some(InputFormat::Miniml));
        assert_eq!(InputFormat::from_extension("json"), Some(InputFormat::Ast));
        assert_eq!(InputFormat::from_extension("html"), None);
    }

    #[test]
    fn test_empty_registry_reports_unsupported() {
        let registry = RendererRegistry::new();
        let root = SyntaxNode::segment(None, vec![]);
        let err = registry
            .render(&root, OutputFormat::Typst, &RenderConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ConversionError::UnsupportedFeature { ref format, .. } if format == "typst"
        ));
    }

    #[test]
    fn test_render_config_from_partial_toml_shape() {
        let config: RenderConfig =
            serde_json::from_str(r#"{"allow_properties": true}"#).unwrap();
        assert!(config.allow_properties);
        assert_eq!(config.indent, "    ");
    }
}
