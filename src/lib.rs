//! # Folio
//!
//! Lays out a declarative markup document onto paginated PDF pages.
//!
//! A document is a `<pdf>` root holding an optional `<head>` (configuration
//! and metadata) and a sequence of `<page>` elements. Each page's tree is
//! walked once, top to bottom: every tag resolves its options through a
//! style cascade, gets a box from the current cursor and its parent's
//! content edges, and then runs the behavior its style selects (text
//! blocks, rules, images, indents, rows of columns, links). Nothing is
//! measured ahead of time; heights are discovered as content is drawn.
//!
//! ## Architecture
//!
//! ```text
//! Input (XML)
//!       ↓
//!   [markup]    → Node tree
//!       ↓
//!   [config]    → defaults + caller options + <head>
//!       ↓
//!   [style]     → named styles, cascade per tag
//!       ↓
//!   [layout]    → boxes, traversal state, tag behaviors
//!       ↓
//!   [canvas]    → drawing contract; [pdf] writes the bytes
//! ```

pub mod canvas;
pub mod config;
pub mod document;
pub mod error;
pub mod font;
pub mod image_loader;
pub mod layout;
pub mod markup;
pub mod model;
pub mod pdf;
pub mod style;
pub mod text;

use std::path::Path;

use serde_json::{json, Value};

pub use canvas::{Canvas, RecordingCanvas};
pub use document::{RenderedDocument, Renderer};
pub use error::{CanvasError, ErrorKind, FolioError};
pub use pdf::PdfCanvas;

/// Render markup to PDF bytes, resolving images and fonts against `base_path`.
pub fn render_xml(xml: &str, base_path: impl AsRef<Path>) -> Result<RenderedDocument, FolioError> {
    let base = base_path.as_ref().to_string_lossy().into_owned();
    render_xml_with(xml, &json!({ "basePath": base }))
}

/// Render markup to PDF bytes with caller configuration merged over the defaults.
pub fn render_xml_with(xml: &str, options: &Value) -> Result<RenderedDocument, FolioError> {
    Renderer::from_markup(xml, options)?.render_pdf()
}

/// Render markup and write the PDF to `dest`. Nothing is written if rendering fails.
pub fn render_to_file(
    xml: &str,
    base_path: impl AsRef<Path>,
    dest: impl AsRef<Path>,
) -> Result<RenderedDocument, FolioError> {
    let rendered = render_xml(xml, base_path)?;
    std::fs::write(dest, &rendered.bytes)?;
    Ok(rendered)
}
