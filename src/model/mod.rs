//! # Document Model
//!
//! The input representation for the layout core: a uniform tree of named
//! nodes with an ordered attribute map, ordered children and, for leaf text,
//! literal content. The markup reader in [`crate::markup`] produces it, but it
//! can just as well be built directly or deserialized from JSON.
//!
//! A document is the `<pdf>` root split into its `<head>` (configuration and
//! metadata) and its `<page>` nodes.

pub mod value;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FolioError;

/// An ordered property bag: node attributes, style definitions, configuration nodes.
pub type Properties = serde_json::Map<String, Value>;

/// Name of the pseudo-tag carrying literal text content.
pub const TEXT_RUN: &str = "text-run";

/// A node in the markup tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Tag name, or [`TEXT_RUN`] for literal text.
    pub name: String,

    /// Attributes with numeric/boolean coercion already applied.
    #[serde(default)]
    pub attributes: Properties,

    /// Child nodes in document order.
    #[serde(default)]
    pub children: Vec<Node>,

    /// Literal text of a text run. Parsed elements carry their own direct
    /// text here, joined as written and trimmed once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Node {
    /// Create an element node.
    pub fn element(name: &str, attributes: Properties, children: Vec<Node>) -> Self {
        Self {
            name: name.to_string(),
            attributes,
            children,
            text: None,
        }
    }

    /// Create a text run.
    pub fn text_run(text: &str) -> Self {
        Self {
            name: TEXT_RUN.to_string(),
            attributes: Properties::new(),
            children: vec![],
            text: Some(text.to_string()),
        }
    }

    pub fn is_text_run(&self) -> bool {
        self.name == TEXT_RUN
    }

    /// The node's own text. Falls back to its direct text runs joined in
    /// order, `None` when it has no text runs at all.
    pub fn text_content(&self) -> Option<String> {
        if let Some(ref text) = self.text {
            return Some(text.clone());
        }
        let mut runs = self
            .children
            .iter()
            .filter(|c| c.is_text_run())
            .filter_map(|c| c.text.as_deref())
            .peekable();
        runs.peek()?;
        Some(runs.collect())
    }

    /// Direct children with the given tag name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Look up an attribute.
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// A parsed document: the optional head plus the pages in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub head: Option<Node>,
    pub pages: Vec<Node>,
}

impl Document {
    /// Split a `<pdf>` root node into head and pages.
    pub fn from_root(root: Node) -> Result<Self, FolioError> {
        if root.name != "pdf" {
            return Err(FolioError::MissingRoot);
        }
        let mut head = None;
        let mut pages = Vec::new();
        for child in root.children {
            match child.name.as_str() {
                "head" if head.is_none() => head = Some(child),
                "page" => pages.push(child),
                _ => {}
            }
        }
        Ok(Self { head, pages })
    }
}

/// Edge values (top, right, bottom, left) used for margins and padding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Edges {
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub right: f64,
    #[serde(default)]
    pub bottom: f64,
    #[serde(default)]
    pub left: f64,
}

impl Edges {
    pub fn uniform(v: f64) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }
}
