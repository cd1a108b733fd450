//! # Document Driver
//!
//! Ties the pieces together for one render: merges the configuration with the
//! document head, builds the style registry, hands metadata to the canvas,
//! then opens each page and walks its children.
//!
//! Any error escaping a page is annotated with the structural path of the
//! node that was being rendered when it happened.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::canvas::{Canvas, PageOptions};
use crate::config::{deep_merge, Config};
use crate::error::FolioError;
use crate::layout::behavior::{render_children, LayoutContext};
use crate::layout::state::TraversalState;
use crate::markup;
use crate::model::{Document, Node};
use crate::pdf::PdfCanvas;
use crate::style::{StyleRegistry, TextStyle};

/// The finished PDF plus the filename the document suggests for itself.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub filename: Option<String>,
}

/// A document bound to its merged configuration, ready to render.
#[derive(Debug)]
pub struct Renderer {
    document: Document,
    config: Config,
    registry: StyleRegistry,
}

impl Renderer {
    /// Merge `options` and the document head over the built-in defaults.
    pub fn new(document: Document, options: &Value) -> Result<Self, FolioError> {
        let config = Config::load(options, document.head.as_ref())?;
        let registry = StyleRegistry::new(&config);
        log::debug!(
            target: "folio::render",
            "Loaded {} styles, {} pages",
            registry.len(),
            document.pages.len()
        );
        Ok(Self {
            document,
            config,
            registry,
        })
    }

    /// Parse markup and bind it to `options`.
    pub fn from_markup(xml: &str, options: &Value) -> Result<Self, FolioError> {
        let root = markup::parse(xml)?;
        Self::new(Document::from_root(root)?, options)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &StyleRegistry {
        &self.registry
    }

    /// Document information from the head: `<title>`, `<filename>`, and
    /// every child of `<meta>` under its capitalized tag name.
    pub fn metadata(&self) -> BTreeMap<String, String> {
        let mut info = BTreeMap::new();
        let Some(head) = &self.document.head else {
            return info;
        };

        for (tag, key) in [("title", "Title"), ("filename", "Filename")] {
            for node in head.children_named(tag) {
                let value = node.text_content().unwrap_or_default();
                log::debug!(target: "folio::render", "Meta data {} {:?}", key, value);
                info.insert(key.to_string(), value);
            }
        }
        for meta in head.children_named("meta") {
            for item in meta.children.iter().filter(|c| !c.is_text_run()) {
                let key = capitalize(&item.name);
                let value = item.text_content().unwrap_or_default();
                log::debug!(target: "folio::render", "Meta data {} {:?}", key, value);
                info.insert(key, value);
            }
        }
        info
    }

    /// `Filename` from the metadata, else the title with `.pdf` appended.
    pub fn suggested_filename(&self) -> Option<String> {
        let info = self.metadata();
        info.get("Filename")
            .filter(|f| !f.is_empty())
            .cloned()
            .or_else(|| {
                info.get("Title")
                    .filter(|t| !t.is_empty())
                    .map(|t| format!("{}.pdf", t))
            })
    }

    /// Render every page onto `canvas`. The canvas is not finished.
    pub fn render(&self, canvas: &mut dyn Canvas) -> Result<(), FolioError> {
        log::debug!(target: "folio::render", "Rendering document");

        let info = self.metadata();
        if !info.is_empty() {
            canvas.set_document_metadata(&info);
        }

        let page_style = self.page_style();
        // A block that ends one page leaves the next page's first run trimmed.
        let mut pending_trim = false;
        for (index, page) in self.document.pages.iter().enumerate() {
            pending_trim = self.render_page(canvas, page, index + 1, &page_style, pending_trim)?;
        }
        Ok(())
    }

    /// Render to PDF bytes.
    pub fn render_pdf(&self) -> Result<RenderedDocument, FolioError> {
        let mut canvas = PdfCanvas::new();
        self.render(&mut canvas)?;
        let bytes = canvas.finish()?;
        log::debug!(
            target: "folio::render",
            "Rendered {} pages, {} bytes",
            canvas.page_count(),
            bytes.len()
        );
        Ok(RenderedDocument {
            bytes,
            filename: self.suggested_filename(),
        })
    }

    /// Text style every page starts from: the `p` style over the text defaults.
    fn page_style(&self) -> TextStyle {
        let mut style = TextStyle::default();
        if let Some(p) = self.registry.get("p") {
            style.apply(&p.properties);
        }
        style
    }

    /// Page setup: document defaults deep-merged with the page's attributes.
    fn page_options(&self, page: &Node) -> PageOptions {
        let mut setup = Value::Object(self.config.document.clone());
        deep_merge(&mut setup, &Value::Object(page.attributes.clone()));
        setup
            .as_object()
            .map(PageOptions::from_properties)
            .unwrap_or_default()
    }

    /// Render one page. Returns the pending trim flag the page ended with.
    fn render_page(
        &self,
        canvas: &mut dyn Canvas,
        page: &Node,
        number: usize,
        style: &TextStyle,
        pending_trim: bool,
    ) -> Result<bool, FolioError> {
        let path = format!("pdf.page({})", number);
        let options = self.page_options(page);
        log::debug!(target: "folio::render", "Page added {} {:?}", path, options);

        let handle = canvas
            .new_page(&options)
            .map_err(|e| FolioError::from(e).at_path(&path))?;

        let mut state =
            TraversalState::new(handle.width, handle.height, handle.margins, style.clone());
        state.path = path;
        state.pending_trim = pending_trim;

        let mut ctx = LayoutContext {
            registry: &self.registry,
            base_path: &self.config.base_path,
            debug: self.config.debug,
            canvas,
        };
        render_children(&mut ctx, &mut state, &page.children).map_err(|e| e.at_path(&state.path))?;
        Ok(state.pending_trim)
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
