//! # Style Registry
//!
//! Named style definitions with single-parent inheritance, and the cascade
//! that turns a tag plus its inline attributes into one flat option bag.
//!
//! The cascade is first-writer-wins. Resolution starts from the inline
//! attributes, then fills in missing keys from the style named by the inline
//! `style` attribute (and its `extends` chain), then from the tag's own style
//! (and its chain), and finally from the universal `*` style. A name already
//! visited during one resolution is skipped, so `extends` cycles terminate.
//!
//! Definitions are normalized once when the registry is built: color and
//! font aliases are substituted, font paths are resolved against the base
//! path, and `margin`/`padding` shorthands are expanded into the four edges.
//! After construction the registry is read-only and can be shared.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{resolve_path, Config};
use crate::error::FolioError;
use crate::model::value::{number, number_or, text, truthy};
use crate::model::{Edges, Properties};

/// Shorthand keys expanded into `<key>Top`, `<key>Left`, `<key>Right`, `<key>Bottom`.
const EDGE_SHORTHANDS: [&str; 2] = ["padding", "margin"];
const EDGE_SUFFIXES: [&str; 4] = ["Top", "Left", "Right", "Bottom"];

/// The universal fallback style, merged last into every resolution.
pub const UNIVERSAL: &str = "*";

/// A named style: properties plus an optional parent style.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    #[serde(flatten)]
    pub properties: Properties,
}

impl StyleDefinition {
    pub fn new(properties: Properties) -> Self {
        Self {
            extends: None,
            properties,
        }
    }

    pub fn extending(parent: &str, properties: Properties) -> Self {
        Self {
            extends: Some(parent.to_string()),
            properties,
        }
    }
}

/// Which layout behavior renders a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    /// Block or inline box around its children.
    #[default]
    Generic,
    /// Horizontal rule (`hr`).
    Rule,
    /// Image placement (`img`).
    Image,
    /// Indentation rail (`indent`).
    Indent,
    /// Column container (`row`).
    Row,
    /// One column inside a row (`column`).
    Column,
    /// Hyperlink (`a`).
    Link,
}

impl Behavior {
    /// The behavior a style name selects, if it names one.
    pub fn for_style(name: &str) -> Option<Behavior> {
        match name {
            "generic" => Some(Behavior::Generic),
            "hr" => Some(Behavior::Rule),
            "img" => Some(Behavior::Image),
            "indent" => Some(Behavior::Indent),
            "row" => Some(Behavior::Row),
            "column" => Some(Behavior::Column),
            "a" => Some(Behavior::Link),
            _ => None,
        }
    }
}

/// The fully-merged options for one node visit.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOptions {
    pub tag: String,
    pub behavior: Behavior,
    /// Style names applied, in cascade order.
    pub styles: Vec<String>,
    pub properties: Properties,
}

impl ResolvedOptions {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Numeric value of a property, if it reads as a number.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(number)
    }

    pub fn number_or(&self, key: &str, default: f64) -> f64 {
        number_or(self.get(key), default)
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(text)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(truthy)
    }

    pub fn is_block(&self) -> bool {
        self.get("display").and_then(Value::as_str) == Some("block")
    }

    pub fn margin(&self) -> Edges {
        self.edges("margin")
    }

    pub fn padding(&self) -> Edges {
        self.edges("padding")
    }

    fn edges(&self, key: &str) -> Edges {
        Edges {
            top: self.number_or(&format!("{key}Top"), 0.0),
            right: self.number_or(&format!("{key}Right"), 0.0),
            bottom: self.number_or(&format!("{key}Bottom"), 0.0),
            left: self.number_or(&format!("{key}Left"), 0.0),
        }
    }
}

/// Inherited text style, threaded through the traversal and handed to the canvas.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    pub color: String,
    pub font: String,
    pub size: f64,
    pub underline: bool,
    pub strike: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align: Option<String>,
    pub line_gap: f64,
    pub paragraph_gap: f64,
    pub pre: bool,
    pub trim: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            color: "black".to_string(),
            font: "Helvetica".to_string(),
            size: 12.0,
            underline: false,
            strike: false,
            align: None,
            line_gap: 0.0,
            paragraph_gap: 0.0,
            pre: false,
            trim: false,
            link: None,
        }
    }
}

impl TextStyle {
    /// Copy the text-style keys present in `props` onto this style.
    ///
    /// Numeric keys only apply when the value reads as a number; boolean keys
    /// take the value's truthiness; string keys take its string form.
    pub fn apply(&mut self, props: &Properties) {
        let string = |key: &str| props.get(key).and_then(text);
        let numeric = |key: &str| props.get(key).and_then(number);
        let boolean = |key: &str| props.get(key).map(truthy);

        if let Some(v) = string("color") {
            self.color = v;
        }
        if let Some(v) = string("font") {
            self.font = v;
        }
        if let Some(v) = numeric("size") {
            self.size = v;
        }
        if let Some(v) = boolean("underline") {
            self.underline = v;
        }
        if let Some(v) = boolean("strike") {
            self.strike = v;
        }
        if let Some(v) = string("align") {
            self.align = Some(v);
        }
        if let Some(v) = numeric("lineGap") {
            self.line_gap = v;
        }
        if let Some(v) = numeric("paragraphGap") {
            self.paragraph_gap = v;
        }
        if let Some(v) = boolean("pre") {
            self.pre = v;
        }
        if let Some(v) = boolean("trim") {
            self.trim = v;
        }
    }
}

/// The registry of named styles plus the alias tables used to normalize them.
#[derive(Debug, Clone, Default)]
pub struct StyleRegistry {
    styles: HashMap<String, StyleDefinition>,
    colors: Properties,
    fonts: Properties,
    base_path: PathBuf,
}

impl StyleRegistry {
    /// Build the registry from a merged configuration.
    pub fn new(config: &Config) -> Self {
        Self::from_parts(
            config.styles.clone(),
            config.colors.clone(),
            config.fonts.clone(),
            &config.base_path,
        )
    }

    pub fn from_parts(
        styles: HashMap<String, StyleDefinition>,
        colors: Properties,
        fonts: Properties,
        base_path: &Path,
    ) -> Self {
        let mut registry = Self {
            styles: HashMap::new(),
            colors,
            fonts,
            base_path: base_path.to_path_buf(),
        };
        let normalized = styles
            .into_iter()
            .map(|(name, mut def)| {
                registry.normalize(&mut def.properties);
                (name, def)
            })
            .collect();
        registry.styles = normalized;
        registry
    }

    pub fn get(&self, name: &str) -> Option<&StyleDefinition> {
        self.styles.get(name)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Substitute aliases, resolve font paths and expand edge shorthands in place.
    pub fn normalize(&self, props: &mut Properties) {
        for key in ["color", "backgroundColor"] {
            if let Some(alias) = props.get(key).filter(|v| truthy(v)).and_then(text) {
                if let Some(found) = self.colors.get(&alias).filter(|v| truthy(v)) {
                    props.insert(key.to_string(), found.clone());
                }
            }
        }

        if let Some(font) = props.get("font").filter(|v| truthy(v)).and_then(text) {
            let font = match self.fonts.get(&font).filter(|v| truthy(v)).and_then(text) {
                Some(aliased) => aliased,
                None => font,
            };
            let font = if font.contains('/') {
                resolve_path(&self.base_path, &font).to_string_lossy().into_owned()
            } else {
                font
            };
            props.insert("font".to_string(), Value::String(font));
        }

        for key in EDGE_SHORTHANDS {
            expand_edges(props, key);
        }
    }

    /// Resolve `tag` with its inline attributes into the merged option bag.
    pub fn resolve(&self, tag: &str, inline: &Properties) -> Result<ResolvedOptions, FolioError> {
        let mut properties = inline.clone();
        self.normalize(&mut properties);

        let mut cascade = Cascade {
            registry: self,
            visited: HashSet::new(),
            order: Vec::new(),
            behavior: None,
        };

        if let Some(style) = properties.get("style").filter(|v| truthy(v)).and_then(text) {
            cascade.extend(&style, &mut properties)?;
        }
        cascade.extend(tag, &mut properties)?;
        cascade.extend(UNIVERSAL, &mut properties)?;

        log::debug!(target: "folio::styles", "Built tag options {} {:?}", tag, cascade.order);

        Ok(ResolvedOptions {
            tag: tag.to_string(),
            behavior: cascade.behavior.unwrap_or_default(),
            styles: cascade.order,
            properties,
        })
    }
}

/// One resolution walk: the visited set spans the whole resolution.
struct Cascade<'a> {
    registry: &'a StyleRegistry,
    visited: HashSet<String>,
    order: Vec<String>,
    behavior: Option<Behavior>,
}

impl Cascade<'_> {
    fn extend(&mut self, start: &str, acc: &mut Properties) -> Result<(), FolioError> {
        let mut next = Some(start.to_string());
        while let Some(name) = next.take() {
            if !self.visited.insert(name.clone()) {
                return Ok(());
            }
            self.order.push(name.clone());
            if self.behavior.is_none() {
                self.behavior = Behavior::for_style(&name);
            }
            log::trace!(target: "folio::styles", "Extending tag options with {}", name);

            let def = self
                .registry
                .styles
                .get(&name)
                .ok_or_else(|| FolioError::StyleNotFound(name.clone()))?;
            for (key, value) in &def.properties {
                if !acc.contains_key(key) {
                    acc.insert(key.clone(), value.clone());
                }
            }
            next = def.extends.clone().filter(|parent| !parent.is_empty());
        }
        Ok(())
    }
}

/// Expand a numeric `key` into its four edges, keeping edges already set.
/// A non-numeric shorthand is left untouched.
pub fn expand_edges(props: &mut Properties, key: &str) {
    let Some(fallback) = props.get(key).and_then(number) else {
        return;
    };
    for suffix in EDGE_SUFFIXES {
        let edge = format!("{key}{suffix}");
        let value = number_or(props.get(&edge), fallback);
        props.insert(edge, Value::from(value));
    }
    props.remove(key);
}
