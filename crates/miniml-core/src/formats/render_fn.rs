// SPDX-License-Identifier: AGPL-3.0-or-later
//! Render-function generator
//!
//! Produces a JavaScript arrow function building the document through an
//! `h(type, props, children)` element factory. Capitalized tags refer to host
//! components, which must be allowed by the [`RenderConfig`]. The `Prop` and
//! `Declare` widgets bind host properties into the generated function and
//! describe them in a [`PropertyManifest`].

use super::element::{self, is_absolute_url, normalize_attributes, ElementRenderer};
use crate::ast::{Attributes, Object, ObjectKind, SyntaxNode};
use crate::traits::{OutputFormat, RenderConfig, Renderer, Result};
use crate::widget::{FieldSchema, FieldType, Widget, WidgetSchema, WidgetValues};
use indexmap::IndexMap;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeSet;

/// Sentinel tag produced by [`PropWidget`]
pub const PROP_TAG: &str = "<>prop";
/// Sentinel tag produced by [`DeclareWidget`]
pub const DECLARE_TAG: &str = "<>declare";

const ROUTER_LINK: &str = "RouterLink";

/// `<Prop name="x" use="fn">fallback</Prop>`: inserts a host property
#[derive(Debug, Clone, Copy, Default)]
pub struct PropWidget;

impl PropWidget {
    pub const SCHEMA: WidgetSchema = WidgetSchema {
        name: "Prop",
        fields: &[
            FieldSchema::required("name", FieldType::String),
            FieldSchema::optional("use", FieldType::String),
        ],
        verbatim: false,
    };
}

impl Widget for PropWidget {
    fn schema(&self) -> &WidgetSchema {
        &Self::SCHEMA
    }

    fn get_value(&self, values: &WidgetValues, content: Vec<SyntaxNode>) -> Result<Option<SyntaxNode>> {
        let mut node = Object::new(ObjectKind::Raw, Some(PROP_TAG.to_string()), content);
        if let Some(name) = values.string("name") {
            node.format.set_attribute("name", name);
        }
        if let Some(renderer) = values.string("use") {
            node.format.set_attribute("use", renderer);
        }
        Ok(Some(SyntaxNode::Object(node)))
    }
}

/// `<Declare name="x" required>default</Declare>`: declares a host property
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclareWidget;

impl DeclareWidget {
    pub const SCHEMA: WidgetSchema = WidgetSchema {
        name: "Declare",
        fields: &[
            FieldSchema::required("name", FieldType::String),
            FieldSchema::optional("required", FieldType::Boolean),
        ],
        verbatim: false,
    };
}

impl Widget for DeclareWidget {
    fn schema(&self) -> &WidgetSchema {
        &Self::SCHEMA
    }

    fn get_value(&self, values: &WidgetValues, content: Vec<SyntaxNode>) -> Result<Option<SyntaxNode>> {
        let mut node = Object::new(ObjectKind::Raw, Some(DECLARE_TAG.to_string()), content);
        if let Some(name) = values.string("name") {
            node.format.set_attribute("name", name);
        }
        if values.flag("required") {
            node.format.set_attribute("required", "");
        }
        Ok(Some(SyntaxNode::Object(node)))
    }
}

/// A host property referenced or declared by the document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropertyDecl {
    pub required: bool,
    /// JavaScript expression producing the default value
    pub default: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropertyManifest {
    pub properties: IndexMap<String, PropertyDecl>,
    /// Functions named by `Prop use=..`, to be provided by the host
    pub renderers: BTreeSet<String>,
}

impl PropertyManifest {
    pub fn ensure_property(&mut self, name: &str) -> &mut PropertyDecl {
        self.properties.entry(name.to_string()).or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.renderers.is_empty()
    }
}

/// Generated code with everything the host needs to wire it up
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderFunction {
    pub code: String,
    pub manifest: PropertyManifest,
    /// Allowed components the code references, to be imported by the host
    pub components: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderFunctionRenderer;

impl RenderFunctionRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn export(&self, root: &SyntaxNode, config: &RenderConfig) -> RenderFunction {
        let mut writer = FnWriter {
            config,
            used: BTreeSet::new(),
            manifest: PropertyManifest::default(),
        };
        let body = writer.render_node(root);

        let mut env = vec!["h"];
        env.extend(writer.used.iter().map(String::as_str));
        let code = format!("(({{{}}}) => () => {body})", env.join(", "));

        tracing::debug!(
            components = writer.used.len(),
            properties = writer.manifest.properties.len(),
            "generated render function"
        );

        RenderFunction {
            code,
            manifest: writer.manifest,
            components: writer.used,
        }
    }
}

impl Renderer for RenderFunctionRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::RenderFunction
    }

    fn render(&self, root: &SyntaxNode, config: &RenderConfig) -> Result<String> {
        Ok(self.export(root, config).code)
    }
}

fn json_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn array(parts: Vec<String>) -> String {
    format!("[{}]", parts.join(", "))
}

struct FnWriter<'c> {
    config: &'c RenderConfig,
    used: BTreeSet<String>,
    manifest: PropertyManifest,
}

impl FnWriter<'_> {
    fn is_allowed(&self, component: &str) -> bool {
        self.config.allowed_components.iter().any(|c| c == component)
    }

    /// Allowed component name, or `None` when it must fall back to `span`
    fn component(&mut self, element: &str) -> Option<String> {
        if !element.starts_with(|c: char| c.is_ascii_uppercase()) {
            return None;
        }
        if self.is_allowed(element) {
            self.used.insert(element.to_string());
            return Some(element.to_string());
        }
        tracing::debug!(component = element, "component not allowed, using span");
        None
    }

    fn render_prop(&mut self, attributes: Option<&Attributes>, content: &[SyntaxNode]) -> String {
        if !self.config.allow_properties {
            return json_string("Usage of properties is disabled");
        }
        let Some(name) = attributes.and_then(|a| a.get("name")) else {
            return json_string("Property name not provided");
        };

        self.manifest.ensure_property(name);
        let fallback = array(self.render_content(content));
        let access = format!("props[{}]", json_string(name));

        match attributes.and_then(|a| a.get("use")) {
            Some(renderer) if is_identifier(renderer) => {
                self.manifest.renderers.insert(renderer.clone());
                format!("{access} ? {renderer}({access}) : {fallback}")
            }
            Some(renderer) => {
                tracing::debug!(renderer = renderer.as_str(), "ignoring invalid property renderer");
                format!("{access} ? {access} : {fallback}")
            }
            None => format!("{access} ? {access} : {fallback}"),
        }
    }

    fn render_declare(&mut self, attributes: Option<&Attributes>, content: &[SyntaxNode]) -> String {
        if !self.config.allow_properties {
            return json_string("Usage of properties is disabled");
        }
        let Some(name) = attributes.and_then(|a| a.get("name")) else {
            return json_string("Property name not provided");
        };

        let default = (!content.is_empty()).then(|| format!("() => {}", array(self.render_content(content))));
        let property = self.manifest.ensure_property(name);
        if attributes.is_some_and(|a| a.contains_key("required")) {
            property.required = true;
        }
        if default.is_some() {
            property.default = default;
        }

        "[]".to_string()
    }
}

impl ElementRenderer for FnWriter<'_> {
    fn render_attributes(&self, attributes: Option<&Attributes>) -> String {
        let Some(attributes) = attributes else {
            return "{}".to_string();
        };

        let map: serde_json::Map<String, serde_json::Value> = attributes
            .iter()
            .map(|(key, value)| (key.clone(), serde_json::Value::from(value.as_str())))
            .collect();
        serde_json::Value::Object(map).to_string()
    }

    fn render_text(&self, text: &str) -> String {
        json_string(text)
    }

    fn render_raw(&self, value: &str) -> String {
        json_string(value)
    }

    fn join_content(&self, parts: Vec<String>) -> String {
        array(parts)
    }

    fn render_element(
        &mut self,
        element: &str,
        attributes: Option<Cow<'_, Attributes>>,
        content: &[SyntaxNode],
    ) -> String {
        match element {
            "" => {
                return match content {
                    [] => "[]".to_string(),
                    [single] => self.render_node(single),
                    _ => array(self.render_content(content)),
                }
            }
            PROP_TAG => return self.render_prop(attributes.as_deref(), content),
            DECLARE_TAG => return self.render_declare(attributes.as_deref(), content),
            sentinel if sentinel.starts_with("<>") => return "[]".to_string(),
            _ => {}
        }

        let props = self.render_attributes(attributes.as_deref());
        if let Some(component) = self.component(element) {
            let body = match content {
                [] => "null".to_string(),
                [single] => self.render_node(single),
                _ => array(self.render_content(content)),
            };
            return format!("h({component}, {props}, () => {body})");
        }

        let element = if element.starts_with(|c: char| c.is_ascii_uppercase()) {
            "span"
        } else {
            element
        };
        if content.is_empty() {
            format!("h({}, {props})", json_string(element))
        } else {
            let children = array(self.render_content(content));
            format!("h({}, {props}, {children})", json_string(element))
        }
    }

    fn render_element_raw(
        &mut self,
        element: &str,
        attributes: Option<Cow<'_, Attributes>>,
        content: String,
    ) -> String {
        if element.is_empty() {
            return content;
        }

        let props = self.render_attributes(attributes.as_deref());
        match self.component(element) {
            Some(component) => format!("h({component}, {props}, () => {content})"),
            None => format!("h({}, {props}, {content})", json_string(element)),
        }
    }

    fn render_object(&mut self, object: &Object) -> String {
        if object.kind == ObjectKind::Link && self.is_allowed(ROUTER_LINK) {
            if let Some(url) = object.value.as_deref().filter(|url| !is_absolute_url(url)) {
                let mut to = Attributes::new();
                to.insert("to".to_string(), url.to_string());
                let attributes = normalize_attributes(&object.format, Some(to));
                return self.render_element(ROUTER_LINK, attributes, &object.content);
            }
        }
        element::render_object(self, object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SegmentKind;
    use crate::parser::parse;
    use crate::widget::WidgetRegistry;
    use pretty_assertions::assert_eq;

    fn config(components: &[&str], allow_properties: bool) -> RenderConfig {
        RenderConfig {
            allowed_components: components.iter().map(|c| c.to_string()).collect(),
            allow_properties,
            ..Default::default()
        }
    }

    fn export(source: &str, config: &RenderConfig) -> RenderFunction {
        let widgets = WidgetRegistry::new().with(PropWidget).with(DeclareWidget);
        let root = parse(source, &widgets).unwrap();
        RenderFunctionRenderer.export(&root, config)
    }

    #[test]
    fn test_paragraph() {
        let output = export("Hello *you*", &RenderConfig::default());
        assert_eq!(
            output.code,
            r#"(({h}) => () => h("p", {}, ["Hello ", h("em", {}, ["you"])]))"#
        );
        assert!(output.components.is_empty());
    }

    #[test]
    fn test_empty_document() {
        let root = SyntaxNode::segment(None, vec![]);
        let output = RenderFunctionRenderer.export(&root, &RenderConfig::default());
        assert_eq!(output.code, "(({h}) => () => [])");
    }

    #[test]
    fn test_several_blocks_become_an_array() {
        let output = export("a\n\nb", &RenderConfig::default());
        assert_eq!(
            output.code,
            r#"(({h}) => () => [h("p", {}, ["a"]), h("p", {}, ["b"])])"#
        );
    }

    #[test]
    fn test_allowed_component_is_used() {
        let output = export("<Badge .pill>New</Badge>", &config(&["Badge"], false));
        assert_eq!(
            output.code,
            r#"(({h, Badge}) => () => h("p", {}, [h(Badge, {"class":"pill"}, () => "New")]))"#
        );
        assert_eq!(output.components.into_iter().collect::<Vec<_>>(), vec!["Badge"]);
    }

    #[test]
    fn test_unknown_component_falls_back_to_span() {
        let output = export("<Badge>New</Badge>", &RenderConfig::default());
        assert_eq!(
            output.code,
            r#"(({h}) => () => h("p", {}, [h("span", {}, ["New"])]))"#
        );
    }

    #[test]
    fn test_relative_link_uses_router() {
        let output = export("[docs](/docs) [web](https://x.org)", &config(&["RouterLink"], false));
        assert_eq!(
            output.code,
            r#"(({h, RouterLink}) => () => h("p", {}, [h(RouterLink, {"to":"/docs"}, () => "docs"), " ", h("a", {"href":"https://x.org"}, ["web"])]))"#
        );
    }

    #[test]
    fn test_properties_disabled() {
        let output = export(r#"<Prop name="title"/>"#, &RenderConfig::default());
        assert!(output.code.contains(r#""Usage of properties is disabled""#));
        assert!(output.manifest.is_empty());
    }

    #[test]
    fn test_prop_and_declare_fill_manifest() {
        let output = export(
            r#"<Declare name="title" required>Untitled</Declare><Prop name="title" use="format">x</Prop>"#,
            &config(&[], true),
        );

        assert_eq!(
            output.code,
            r#"(({h}) => () => h("p", {}, [[], props["title"] ? format(props["title"]) : ["x"]]))"#
        );
        let title = &output.manifest.properties["title"];
        assert!(title.required);
        assert_eq!(title.default.as_deref(), Some(r#"() => ["Untitled"]"#));
        assert!(output.manifest.renderers.contains("format"));
    }

    #[test]
    fn test_code_block_and_table() {
        let root = SyntaxNode::segment(
            None,
            vec![
                SyntaxNode::code_block(Some("js".into()), "x\n"),
                SyntaxNode::table(vec![SyntaxNode::table_row(
                    false,
                    vec![SyntaxNode::segment(None, vec![SyntaxNode::text("c")])],
                )]),
            ],
        );
        let output = RenderFunctionRenderer.export(&root, &RenderConfig::default());
        assert_eq!(
            output.code,
            r#"(({h}) => () => [h("pre", {}, h("code", {"class":"language-js"}, "x\n")), h("table", {}, [h("tr", {}, [h("td", {}, ["c"])])])])"#
        );
    }

    #[test]
    fn test_heading_segment() {
        let root = SyntaxNode::segment(Some(SegmentKind::H1), vec![SyntaxNode::text("T")]);
        let output = RenderFunctionRenderer.export(&root, &RenderConfig::default());
        assert_eq!(output.code, r#"(({h}) => () => h("h1", {}, ["T"]))"#);
    }
}
