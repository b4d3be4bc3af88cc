// SPDX-License-Identifier: AGPL-3.0-or-later
//! Pretty JSON dump of the syntax tree

use crate::ast::SyntaxNode;
use crate::traits::{ConversionError, OutputFormat, RenderConfig, Renderer, Result};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

#[derive(Debug, Clone, Copy, Default)]
pub struct DumpRenderer;

impl DumpRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for DumpRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Dump
    }

    fn render(&self, root: &SyntaxNode, config: &RenderConfig) -> Result<String> {
        let mut buffer = Vec::new();
        let formatter = PrettyFormatter::with_indent(config.indent.as_bytes());
        let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
        root.serialize(&mut serializer)
            .map_err(|e| ConversionError::SerializationError(e.to_string()))?;

        let mut output =
            String::from_utf8(buffer).map_err(|e| ConversionError::SerializationError(e.to_string()))?;
        output.push('\n');
        Ok(output)
    }
}
