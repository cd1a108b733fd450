//! A canvas that records drawing commands instead of rendering them.
//!
//! Text never wraps: each completed line advances the cursor by the font
//! size plus the line gap, and an open line advances x by a rough
//! half-em per character. Images advance by their requested height.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{
    Canvas, ImageOptions, PageHandle, PageOptions, Point, Rect, StrokeOptions, TextOptions,
};
use crate::error::CanvasError;

/// One recorded canvas call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum DrawCommand {
    NewPage {
        page: PageHandle,
    },
    Text {
        text: String,
        x: f64,
        y: f64,
        options: TextOptions,
    },
    FillRect {
        rect: Rect,
        color: String,
    },
    StrokeRect {
        rect: Rect,
        options: StrokeOptions,
    },
    Image {
        source: String,
        x: f64,
        y: f64,
        options: ImageOptions,
    },
}

#[derive(Debug, Default)]
pub struct RecordingCanvas {
    pub commands: Vec<DrawCommand>,
    pub metadata: BTreeMap<String, String>,
    page: Option<PageHandle>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text commands in order, as `(text, x, y)`.
    pub fn texts(&self) -> Vec<(&str, f64, f64)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, x, y, .. } => Some((text.as_str(), *x, *y)),
                _ => None,
            })
            .collect()
    }

    fn page(&self) -> Result<&PageHandle, CanvasError> {
        self.page.as_ref().ok_or(CanvasError::NoPage)
    }
}

impl Canvas for RecordingCanvas {
    fn new_page(&mut self, options: &PageOptions) -> Result<PageHandle, CanvasError> {
        let page = PageHandle {
            width: options.width,
            height: options.height,
            margins: options.margins,
        };
        self.page = Some(page);
        self.commands.push(DrawCommand::NewPage { page });
        Ok(page)
    }

    fn draw_text(
        &mut self,
        text: &str,
        at: Point,
        options: &TextOptions,
    ) -> Result<Point, CanvasError> {
        self.page()?;
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            x: at.x,
            y: at.y,
            options: options.clone(),
        });

        let segments: Vec<&str> = text.split('\n').collect();
        let last = segments.last().copied().unwrap_or_default();
        let mut lines = segments.len() - 1;
        if !options.continued && !last.is_empty() {
            lines += 1;
        }
        let y = at.y + lines as f64 * options.line_advance();

        let x = if options.continued {
            at.x + last.chars().count() as f64 * options.size * 0.5
        } else {
            at.x
        };
        Ok(Point { x, y })
    }

    fn fill_rect(&mut self, rect: Rect, color: &str) -> Result<(), CanvasError> {
        self.page()?;
        self.commands.push(DrawCommand::FillRect {
            rect,
            color: color.to_string(),
        });
        Ok(())
    }

    fn stroke_rect(&mut self, rect: Rect, options: &StrokeOptions) -> Result<(), CanvasError> {
        self.page()?;
        self.commands.push(DrawCommand::StrokeRect {
            rect,
            options: options.clone(),
        });
        Ok(())
    }

    fn draw_image(
        &mut self,
        source: &str,
        at: Point,
        options: &ImageOptions,
    ) -> Result<f64, CanvasError> {
        self.page()?;
        self.commands.push(DrawCommand::Image {
            source: source.to_string(),
            x: at.x,
            y: at.y,
            options: options.clone(),
        });
        Ok(options
            .height
            .or(options.fit.map(|(_, h)| h))
            .unwrap_or(0.0))
    }

    fn set_document_metadata(&mut self, info: &BTreeMap<String, String>) {
        self.metadata.extend(info.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    fn finish(&mut self) -> Result<Vec<u8>, CanvasError> {
        serde_json::to_vec_pretty(&self.commands).map_err(|e| CanvasError::Output(e.to_string()))
    }
}
