//! # Markup Reader
//!
//! Reads XML markup into the [`Node`] tree the layout core consumes.
//!
//! - Tag names are lower-cased; attribute names are kept as written.
//! - Attribute values are coerced: numeric strings become numbers and
//!   `true`/`false` become booleans.
//! - Text (including CDATA) becomes `text-run` children in document order,
//!   trimmed at both ends. Whitespace-only text is dropped.
//! - An element's own text, all of its direct text joined as written and
//!   then trimmed once, is kept in its `text` field.
//! - Comments, processing instructions and the doctype are ignored.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::FolioError;
use crate::model::value::coerce;
use crate::model::{Node, Properties};

/// Parse markup and return its root element.
pub fn parse(xml: &str) -> Result<Node, FolioError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut stack: Vec<Node> = Vec::new();
    let mut text = String::new();
    // Untrimmed direct text of each open element.
    let mut own_text: Vec<String> = Vec::new();
    let mut root = None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| markup_error(&reader, e))?;
        match event {
            Event::Start(e) => {
                flush_text(&mut stack, &mut text);
                stack.push(element(&e)?);
                own_text.push(String::new());
            }
            Event::Empty(e) => {
                flush_text(&mut stack, &mut text);
                let node = element(&e)?;
                close(&mut stack, &mut root, node)?;
            }
            Event::End(_) => {
                flush_text(&mut stack, &mut text);
                let mut node = stack
                    .pop()
                    .ok_or_else(|| FolioError::Markup("unexpected closing tag".to_string()))?;
                let own = own_text.pop().unwrap_or_default();
                let own = own.trim();
                if !own.is_empty() {
                    node.text = Some(own.to_string());
                }
                close(&mut stack, &mut root, node)?;
            }
            Event::Text(e) => {
                let unescaped = e.unescape().map_err(|e| markup_error(&reader, e))?;
                text.push_str(&unescaped);
                if let Some(own) = own_text.last_mut() {
                    own.push_str(&unescaped);
                }
            }
            Event::CData(e) => {
                let data = String::from_utf8_lossy(&e);
                text.push_str(&data);
                if let Some(own) = own_text.last_mut() {
                    own.push_str(&data);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(FolioError::Markup(format!("unclosed tag <{}>", open.name)));
    }
    root.ok_or_else(|| FolioError::Markup("no root element".to_string()))
}

fn markup_error<R>(reader: &Reader<R>, err: impl std::fmt::Display) -> FolioError {
    FolioError::Markup(format!("{} at position {}", err, reader.buffer_position()))
}

/// Build an element node from a start tag.
fn element(e: &BytesStart) -> Result<Node, FolioError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
    let mut attributes = Properties::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| FolioError::Markup(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| FolioError::Markup(err.to_string()))?;
        attributes.insert(key, coerce(&value));
    }
    Ok(Node::element(&name, attributes, Vec::new()))
}

/// Attach a finished node to its parent, or make it the root.
fn close(stack: &mut [Node], root: &mut Option<Node>, node: Node) -> Result<(), FolioError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => *root = Some(node),
        None => {
            return Err(FolioError::Markup(
                "multiple root elements".to_string(),
            ))
        }
    }
    Ok(())
}

/// Emit the pending text as a trimmed text run of the innermost open element.
fn flush_text(stack: &mut [Node], text: &mut String) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        if let Some(parent) = stack.last_mut() {
            parent.children.push(Node::text_run(trimmed));
        }
    }
    text.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Document;
    use serde_json::json;

    #[test]
    fn test_parse_tree() {
        let root = parse(
            r#"<?xml version="1.0"?>
            <PDF>
                <page size="A4">
                    <P Size="14" pre="true">  Hello &amp; <strong>bold</strong> world </P>
                </page>
            </PDF>"#,
        )
        .unwrap();
        assert_eq!(root.name, "pdf");
        let page = &root.children[0];
        assert_eq!(page.attr("size"), Some(&json!("A4")));
        let p = &page.children[0];
        assert_eq!(p.name, "p");
        assert_eq!(p.attr("Size"), Some(&json!(14)));
        assert_eq!(p.attr("pre"), Some(&json!(true)));
        assert_eq!(p.children.len(), 3);
        assert_eq!(p.children[0].text.as_deref(), Some("Hello &"));
        assert_eq!(p.children[1].name, "strong");
        assert_eq!(p.children[2].text.as_deref(), Some("world"));
    }

    #[test]
    fn test_element_text_is_joined_before_trimming() {
        let root = parse("<pdf><a> example <b/>.com </a><p><b/></p></pdf>").unwrap();
        let link = &root.children[0];
        assert_eq!(link.text.as_deref(), Some("example .com"));
        assert_eq!(link.text_content().as_deref(), Some("example .com"));
        assert_eq!(link.children[0].text.as_deref(), Some("example"));
        assert_eq!(root.children[1].text_content(), None);
    }

    #[test]
    fn test_whitespace_only_text_is_dropped() {
        let root = parse("<pdf>\n   <page/>\n  </pdf>").unwrap();
        assert_eq!(root.children.len(), 1);
        assert!(!root.children[0].is_text_run());
    }

    #[test]
    fn test_cdata_is_text() {
        let root = parse("<pdf><p><![CDATA[a < b]]></p></pdf>").unwrap();
        assert_eq!(root.children[0].text_content().as_deref(), Some("a < b"));
    }

    #[test]
    fn test_malformed_markup_fails() {
        assert!(matches!(
            parse("<pdf><page></pdf>"),
            Err(FolioError::Markup(_))
        ));
        assert!(matches!(parse("<pdf><page>"), Err(FolioError::Markup(_))));
        assert!(matches!(parse(""), Err(FolioError::Markup(_))));
    }

    #[test]
    fn test_root_must_be_pdf() {
        let root = parse("<html><page/></html>").unwrap();
        assert!(matches!(
            Document::from_root(root),
            Err(FolioError::MissingRoot)
        ));
    }
}
