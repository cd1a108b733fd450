//! # Canvas
//!
//! The drawing surface the layout core renders against. The core only ever
//! asks for a handful of high-level operations (open a page, draw a run of
//! text at the cursor, fill or stroke a rectangle, place an image) and never
//! sees fonts, glyphs or bytes. [`crate::pdf::PdfCanvas`] turns those calls
//! into a PDF file; [`RecordingCanvas`] just remembers them.
//!
//! Coordinates are in points with the origin at the top-left of the page
//! and y growing downwards.

pub mod recording;

pub use recording::{DrawCommand, RecordingCanvas};

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::CanvasError;
use crate::model::value::{number, number_or, text, truthy};
use crate::model::{Edges, Properties};
use crate::style::TextStyle;

/// A position on the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Horizontal alignment of completed text lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl TextAlign {
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(str::to_ascii_lowercase).as_deref() {
            Some("center") => TextAlign::Center,
            Some("right") => TextAlign::Right,
            Some("justify") => TextAlign::Justify,
            _ => TextAlign::Left,
        }
    }
}

/// Options for one text run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextOptions {
    pub color: String,
    pub font: String,
    pub size: f64,
    /// Keep the line open so the next run continues on it.
    pub continued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub align: TextAlign,
    pub line_gap: f64,
    pub paragraph_gap: f64,
    pub underline: bool,
    pub strike: bool,
    /// Wrapping width measured from the starting x. `None` runs to the page's right margin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
}

impl TextOptions {
    pub fn from_style(style: &TextStyle, continued: bool) -> Self {
        Self {
            color: style.color.clone(),
            font: style.font.clone(),
            size: style.size,
            continued,
            link: style.link.clone(),
            align: TextAlign::from_name(style.align.as_deref()),
            line_gap: style.line_gap,
            paragraph_gap: style.paragraph_gap,
            underline: style.underline,
            strike: style.strike,
            width: None,
        }
    }

    /// Height of one line: font size plus line gap.
    pub fn line_advance(&self) -> f64 {
        self.size + self.line_gap
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImageOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    /// Fit inside this box, keeping the aspect ratio.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit: Option<(f64, f64)>,
}

impl ImageOptions {
    /// Final drawn size for an image of `natural` pixel dimensions.
    ///
    /// Width and height together are used as given; one of them alone keeps
    /// the aspect ratio; otherwise `scale`, then `fit`, then the natural size.
    pub fn drawn_size(&self, natural: (f64, f64)) -> (f64, f64) {
        let (w0, h0) = natural;
        let width = self.width.filter(|w| *w != 0.0);
        let height = self.height.filter(|h| *h != 0.0);
        match (width, height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, if w0 > 0.0 { w * h0 / w0 } else { h0 }),
            (None, Some(h)) => (if h0 > 0.0 { h * w0 / h0 } else { w0 }, h),
            (None, None) => {
                if let Some(scale) = self.scale.filter(|s| *s != 0.0) {
                    (w0 * scale, h0 * scale)
                } else if let Some((fw, fh)) = self.fit {
                    let ratio = if h0 > 0.0 { w0 / h0 } else { 1.0 };
                    if fh > 0.0 && ratio > fw / fh {
                        (fw, fw / ratio)
                    } else {
                        (fh * ratio, fh)
                    }
                } else {
                    (w0, h0)
                }
            }
        }
    }
}

/// Page setup handed to [`Canvas::new_page`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageOptions {
    pub width: f64,
    pub height: f64,
    pub margins: Edges,
    pub compress: bool,
}

impl Default for PageOptions {
    fn default() -> Self {
        let (width, height) = PageSize::A4.dimensions();
        Self {
            width,
            height,
            margins: Edges::uniform(72.0),
            compress: true,
        }
    }
}

impl PageOptions {
    /// Read page setup from merged document and page properties.
    ///
    /// `size` is a named size or `"W H"`/`"WxH"` in points (or a two-number
    /// array); `layout="landscape"` swaps the sides. A numeric `margin` sets
    /// all edges, else `margins` supplies them; `marginTop` and friends
    /// override single edges.
    pub fn from_properties(props: &Properties) -> Self {
        let mut options = PageOptions::default();

        if let Some((w, h)) = props.get("size").and_then(parse_page_size) {
            options.width = w;
            options.height = h;
        }
        let landscape = props
            .get("layout")
            .and_then(Value::as_str)
            .is_some_and(|l| l.eq_ignore_ascii_case("landscape"));
        if landscape {
            std::mem::swap(&mut options.width, &mut options.height);
        }

        if let Some(m) = props.get("margin").and_then(number) {
            options.margins = Edges::uniform(m);
        } else if let Some(Value::Object(m)) = props.get("margins") {
            let d = options.margins;
            options.margins = Edges {
                top: number_or(m.get("top"), d.top),
                right: number_or(m.get("right"), d.right),
                bottom: number_or(m.get("bottom"), d.bottom),
                left: number_or(m.get("left"), d.left),
            };
        }
        let edges = &mut options.margins;
        for (key, edge) in [
            ("marginTop", &mut edges.top),
            ("marginRight", &mut edges.right),
            ("marginBottom", &mut edges.bottom),
            ("marginLeft", &mut edges.left),
        ] {
            if let Some(v) = props.get(key).and_then(number) {
                *edge = v;
            }
        }

        if let Some(compress) = props.get("compress") {
            options.compress = truthy(compress);
        }
        options
    }
}

/// What a canvas reports back about a freshly opened page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageHandle {
    pub width: f64,
    pub height: f64,
    pub margins: Edges,
}

/// Named paper sizes, in points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
    Letter,
    Legal,
    Tabloid,
    Executive,
    Folio,
}

impl PageSize {
    pub fn from_name(name: &str) -> Option<Self> {
        let size = match name.trim().to_ascii_uppercase().as_str() {
            "A0" => PageSize::A0,
            "A1" => PageSize::A1,
            "A2" => PageSize::A2,
            "A3" => PageSize::A3,
            "A4" => PageSize::A4,
            "A5" => PageSize::A5,
            "A6" => PageSize::A6,
            "LETTER" => PageSize::Letter,
            "LEGAL" => PageSize::Legal,
            "TABLOID" => PageSize::Tabloid,
            "EXECUTIVE" => PageSize::Executive,
            "FOLIO" => PageSize::Folio,
            _ => return None,
        };
        Some(size)
    }

    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PageSize::A0 => (2383.94, 3370.39),
            PageSize::A1 => (1683.78, 2383.94),
            PageSize::A2 => (1190.55, 1683.78),
            PageSize::A3 => (841.89, 1190.55),
            PageSize::A4 => (595.28, 841.89),
            PageSize::A5 => (419.53, 595.28),
            PageSize::A6 => (297.64, 419.53),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
            PageSize::Tabloid => (792.0, 1224.0),
            PageSize::Executive => (521.86, 756.0),
            PageSize::Folio => (612.0, 936.0),
        }
    }
}

fn parse_page_size(value: &Value) -> Option<(f64, f64)> {
    match value {
        Value::String(s) => {
            if let Some(size) = PageSize::from_name(s) {
                return Some(size.dimensions());
            }
            let mut parts = s
                .split(|c: char| c.is_whitespace() || c == 'x' || c == 'X' || c == ',')
                .filter(|p| !p.is_empty())
                .map(|p| p.parse::<f64>().ok());
            match (parts.next()??, parts.next()??, parts.next()) {
                (w, h, None) => Some((w, h)),
                _ => None,
            }
        }
        Value::Array(items) if items.len() == 2 => Some((number(&items[0])?, number(&items[1])?)),
        _ => None,
    }
}

/// An RGB color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f64 / 255.0,
            g: g as f64 / 255.0,
            b: b as f64 / 255.0,
        }
    }

    /// Parse `#rgb`, `#rrggbb` or a CSS color name.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return Self::hex(hex);
        }
        named_color(&s.to_ascii_lowercase()).and_then(Self::hex)
    }

    /// Parse a color, logging and falling back to black when it is unknown.
    pub fn parse_or_black(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|| {
            log::warn!(target: "folio::pdf", "Unknown color {:?}, using black", s);
            Self::BLACK
        })
    }

    fn hex(hex: &str) -> Option<Self> {
        let digit = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok();
        let pair = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            3 => Some(Self::rgb(digit(0)? * 17, digit(1)? * 17, digit(2)? * 17)),
            6 => Some(Self::rgb(pair(0)?, pair(2)?, pair(4)?)),
            _ => None,
        }
    }
}

fn named_color(name: &str) -> Option<&'static str> {
    let hex = match name {
        "black" => "000000",
        "white" => "ffffff",
        "red" => "ff0000",
        "green" => "008000",
        "blue" => "0000ff",
        "yellow" => "ffff00",
        "cyan" | "aqua" => "00ffff",
        "magenta" | "fuchsia" => "ff00ff",
        "grey" | "gray" => "808080",
        "darkgrey" | "darkgray" => "a9a9a9",
        "lightgrey" | "lightgray" => "d3d3d3",
        "dimgrey" | "dimgray" => "696969",
        "silver" => "c0c0c0",
        "maroon" => "800000",
        "olive" => "808000",
        "lime" => "00ff00",
        "teal" => "008080",
        "navy" => "000080",
        "purple" => "800080",
        "orange" => "ffa500",
        "pink" => "ffc0cb",
        "brown" => "a52a2a",
        "gold" => "ffd700",
        "indigo" => "4b0082",
        "violet" => "ee82ee",
        "crimson" => "dc143c",
        "coral" => "ff7f50",
        "salmon" => "fa8072",
        "tomato" => "ff6347",
        "khaki" => "f0e68c",
        "beige" => "f5f5dc",
        "ivory" => "fffff0",
        "lavender" => "e6e6fa",
        "tan" => "d2b48c",
        "turquoise" => "40e0d0",
        "skyblue" => "87ceeb",
        "steelblue" => "4682b4",
        "royalblue" => "4169e1",
        "darkblue" => "00008b",
        "darkred" => "8b0000",
        "darkgreen" => "006400",
        "lightblue" => "add8e6",
        "lightgreen" => "90ee90",
        "whitesmoke" => "f5f5f5",
        "gainsboro" => "dcdcdc",
        _ => return None,
    };
    Some(hex)
}

/// The drawing surface the layout core renders onto.
///
/// All positions are the top-left of what is drawn. Implementations own
/// pages, fonts, images and serialization; failures surface as
/// [`CanvasError`] and abort the render.
pub trait Canvas {
    /// Open a new page and make it current.
    fn new_page(&mut self, options: &PageOptions) -> Result<PageHandle, CanvasError>;

    /// Draw a run of text starting at `at`. Returns the cursor after the run:
    /// the end of the open line when `continued`, else the start of the next line.
    fn draw_text(&mut self, text: &str, at: Point, options: &TextOptions)
        -> Result<Point, CanvasError>;

    fn fill_rect(&mut self, rect: Rect, color: &str) -> Result<(), CanvasError>;

    fn stroke_rect(&mut self, rect: Rect, options: &StrokeOptions) -> Result<(), CanvasError>;

    /// Place an image (a file path or a `data:` URI). Returns the drawn height.
    fn draw_image(
        &mut self,
        source: &str,
        at: Point,
        options: &ImageOptions,
    ) -> Result<f64, CanvasError>;

    fn set_document_metadata(&mut self, info: &BTreeMap<String, String>);

    /// Finish the document and return its serialized bytes.
    fn finish(&mut self) -> Result<Vec<u8>, CanvasError>;
}

/// String form of an optional property, used for colors handed to the canvas.
pub fn color_name(value: Option<&Value>) -> Option<String> {
    value.filter(|v| truthy(v)).and_then(text)
}
