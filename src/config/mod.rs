//! # Configuration
//!
//! The render configuration is assembled in three layers, each deep-merged
//! over the previous one:
//!
//! 1. the built-in [`defaults`] (page setup, color and font aliases, the
//!    stock tag styles),
//! 2. the caller's options (a JSON tree, e.g. `{"basePath": "assets"}`),
//! 3. the document's own `<head>`, where every element extends the config
//!    node of the same name (`<styles><p size="14"/></styles>`).
//!
//! Merging happens on untyped JSON so that partial overrides stay partial.
//! The result is then read into the typed [`Config`].

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::error::FolioError;
use crate::model::value::truthy;
use crate::model::{Node, Properties};
use crate::style::StyleDefinition;

/// The typed, fully merged configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Directory that relative font and image paths are resolved against.
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,

    /// Page defaults: size, layout, margins, compression.
    #[serde(default)]
    pub document: Properties,

    /// Color aliases.
    #[serde(default)]
    pub colors: Properties,

    /// Font aliases. Values containing `/` are font file paths.
    #[serde(default)]
    pub fonts: Properties,

    #[serde(default)]
    pub styles: HashMap<String, StyleDefinition>,

    /// Stroke every tag's box.
    #[serde(default, deserialize_with = "truthy_flag")]
    pub debug: bool,
}

fn default_base_path() -> PathBuf {
    PathBuf::from(".")
}

fn truthy_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|v| truthy(&v))
}

impl Config {
    /// Defaults merged with caller options.
    pub fn from_options(options: &Value) -> Result<Self, FolioError> {
        Self::load(options, None)
    }

    /// Defaults merged with caller options, then with the document head.
    pub fn load(options: &Value, head: Option<&Node>) -> Result<Self, FolioError> {
        let mut tree = defaults();
        deep_merge(&mut tree, options);
        if let (Some(head), Value::Object(root)) = (head, &mut tree) {
            configure(root, head);
        }
        Ok(serde_json::from_value(tree)?)
    }
}

/// The built-in configuration tree.
pub fn defaults() -> Value {
    json!({
        "basePath": ".",
        "document": {
            "autoFirstPage": false,
            "size": "A4",
            "compress": true,
            "margins": {
                "top": 36,
                "left": 42.5,
                "right": 42.5,
                "bottom": 36
            }
        },
        "colors": {
            "grey": "#ddd"
        },
        "fonts": {
            "regular": "Helvetica",
            "bold": "Helvetica-Bold",
            "fixed": "Courier"
        },
        "styles": {
            "*": { "display": "inline", "margin": 0, "padding": 0 },
            "span": { "color": "black", "font": "regular", "size": 12, "pre": false },
            "block": { "extends": "span", "display": "block", "width": "100%" },
            "p": {
                "extends": "block",
                "marginTop": 2,
                "marginBottom": 5,
                "lineGap": 2,
                "paragraphGap": 1
            },
            "h1": { "extends": "block", "font": "bold", "lineGap": 0, "size": 24 },
            "h2": { "extends": "h1", "size": 19, "marginTop": 8, "marginBottom": 2 },
            "h3": { "extends": "h1", "size": 15, "marginTop": 5, "marginBottom": 2 },
            "h4": { "extends": "h1", "size": 10, "marginTop": 5, "marginBottom": 2 },
            "small": { "size": 10 },
            "strong": { "font": "bold" },
            "hr": {
                "color": "black",
                "display": "block",
                "width": "100%",
                "marginTop": 2,
                "marginBottom": 4,
                "thickness": 4
            },
            "div": { "extends": "block" },
            "indent": {
                "extends": "block",
                "paddingLeft": 15,
                "color": "grey",
                "thickness": 5,
                "marginBottom": -2
            },
            "row": { "extends": "block" },
            "column": { "extends": "block" },
            "img": { "height": null, "width": null },
            "br": { "display": "block" },
            "a": { "underline": true, "color": "blue" }
        }
    })
}

/// Merge `overlay` into `base`. Objects merge key by key; any other value replaces.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value)
                    }
                    _ => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Extend a configuration node with a head element: its attributes are
/// copied in, and each child element extends the entry of the same name.
pub fn configure(root: &mut Properties, tree: &Node) {
    if !tree.attributes.is_empty() {
        log::debug!(target: "folio::render", "Configure {} {:?}", tree.name, tree.attributes);
        for (key, value) in &tree.attributes {
            root.insert(key.clone(), value.clone());
        }
    }
    for child in tree.children.iter().filter(|c| !c.is_text_run()) {
        let entry = root
            .entry(child.name.clone())
            .or_insert_with(|| Value::Object(Properties::new()));
        if !entry.is_object() {
            *entry = Value::Object(Properties::new());
        }
        if let Value::Object(node) = entry {
            configure(node, child);
        }
    }
}

/// Resolve `rel` against `base` lexically, folding `.` and `..` components.
pub fn resolve_path(base: &Path, rel: &str) -> PathBuf {
    let joined = base.join(rel);
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup;

    #[test]
    fn test_defaults_parse() {
        let config = Config::from_options(&json!({})).unwrap();
        assert_eq!(config.base_path, PathBuf::from("."));
        assert_eq!(config.styles["p"].extends.as_deref(), Some("block"));
        assert_eq!(config.styles["img"].properties["height"], Value::Null);
        assert_eq!(config.fonts["bold"], json!("Helvetica-Bold"));
        assert!(!config.debug);
    }

    #[test]
    fn test_caller_options_merge_deeply() {
        let config = Config::from_options(&json!({
            "basePath": "/assets",
            "document": {"margins": {"top": 10}},
            "styles": {"p": {"size": 14}},
            "debug": true
        }))
        .unwrap();
        assert_eq!(config.base_path, PathBuf::from("/assets"));
        assert_eq!(config.document["margins"]["top"], json!(10));
        assert_eq!(config.document["margins"]["left"], json!(42.5));
        assert_eq!(config.document["size"], json!("A4"));
        assert_eq!(config.styles["p"].properties["size"], json!(14));
        assert_eq!(config.styles["p"].extends.as_deref(), Some("block"));
        assert!(config.debug);
    }

    #[test]
    fn test_deep_merge_replaces_scalars_and_arrays() {
        let mut base = json!({"a": {"b": 1, "c": [1, 2]}, "d": {"e": 1}});
        deep_merge(&mut base, &json!({"a": {"c": [3]}, "d": 5}));
        assert_eq!(base, json!({"a": {"b": 1, "c": [3]}, "d": 5}));
    }

    #[test]
    fn test_head_extends_config_tree() {
        let head = markup::parse(
            r#"<head foo="bar">
                <styles><p size="14"/><mystyle color="red" extends="span"/></styles>
                <document size="Letter"/>
            </head>"#,
        )
        .unwrap();
        let config = Config::load(&json!({}), Some(&head)).unwrap();
        assert_eq!(config.styles["p"].properties["size"], json!(14));
        assert_eq!(config.styles["p"].properties["marginBottom"], json!(5));
        assert_eq!(config.styles["mystyle"].extends.as_deref(), Some("span"));
        assert_eq!(config.document["size"], json!("Letter"));
    }

    #[test]
    fn test_configure_recurses() {
        let mut root = Properties::new();
        let tree = markup::parse(r#"<root a="1"><x b="2"><y c="3"/></x></root>"#).unwrap();
        configure(&mut root, &tree);
        assert_eq!(Value::Object(root), json!({"a": 1, "x": {"b": 2, "y": {"c": 3}}}));
    }

    #[test]
    fn test_bad_config_is_rejected() {
        let err = Config::from_options(&json!({"styles": {"p": 5}})).unwrap_err();
        assert!(matches!(err, FolioError::InvalidConfig(_)));
    }

    #[test]
    fn test_resolve_path() {
        assert_eq!(
            resolve_path(Path::new("/base/path"), "../fonts/times"),
            PathBuf::from("/base/fonts/times")
        );
        assert_eq!(
            resolve_path(Path::new("/base"), "/abs/img.png"),
            PathBuf::from("/abs/img.png")
        );
        assert_eq!(resolve_path(Path::new("."), "img.png"), PathBuf::from("img.png"));
        assert_eq!(
            resolve_path(Path::new("assets"), "../../x.png"),
            PathBuf::from("../x.png")
        );
    }
}
