//! # PDF Canvas
//!
//! A [`Canvas`] that writes a PDF 1.7 file from scratch.
//!
//! Drawing calls append operators to the current page's content stream and
//! note which fonts and images the page uses. Nothing is serialized until
//! [`Canvas::finish`], which lays the objects out like this:
//!
//! ```text
//! %PDF-1.7            <- header
//! 1 0 obj ... endobj  <- catalog
//! 2 0 obj ... endobj  <- page tree
//! ...                 <- fonts, images, then per page: content, annotations, page
//! xref                <- byte offsets of each object
//! trailer             <- root and info references
//! %%EOF
//! ```
//!
//! Standard fonts are referenced as Type1 with WinAnsi encoding. Font files
//! are embedded whole as CIDFontType2 with Identity-H encoding, producing
//! five objects per font: FontFile2, FontDescriptor, CIDFont, ToUnicode CMap
//! and the Type0 root.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as FmtWrite; // for write! on String
use std::io::Write as IoWrite; // for write! on Vec<u8>

use miniz_oxide::deflate::compress_to_vec_zlib;

use crate::canvas::{
    Canvas, Color, ImageOptions, PageHandle, PageOptions, Point, Rect, StrokeOptions, TextAlign,
    TextOptions,
};
use crate::error::CanvasError;
use crate::font::{CustomFont, FontContext, FontData};
use crate::image_loader::{load_image, LoadedImage, Pixels};
use crate::model::Edges;
use crate::text::break_into_lines;

/// A canvas producing PDF bytes.
#[derive(Debug, Default)]
pub struct PdfCanvas {
    fonts: FontContext,
    images: Vec<LoadedImage>,
    image_index: HashMap<String, usize>,
    pages: Vec<PageContent>,
    info: BTreeMap<String, String>,
    open_line: Option<OpenLine>,
}

#[derive(Debug)]
struct PageContent {
    width: f64,
    height: f64,
    margins: Edges,
    compress: bool,
    stream: String,
    fonts: BTreeSet<usize>,
    images: BTreeSet<usize>,
    links: Vec<(Rect, String)>,
}

/// A text line left open by a `continued` run. Wrapped lines go back to `start_x`.
#[derive(Debug, Clone, Copy)]
struct OpenLine {
    start_x: f64,
    width: f64,
}

/// Objects allocated while serializing. Index 0 is the free-list head.
struct PdfBuilder {
    objects: Vec<Vec<u8>>,
}

impl PdfBuilder {
    fn new() -> Self {
        // 0 = placeholder, 1 = catalog, 2 = page tree
        Self {
            objects: vec![Vec::new(), Vec::new(), Vec::new()],
        }
    }

    fn add(&mut self, data: impl Into<Vec<u8>>) -> usize {
        self.objects.push(data.into());
        self.objects.len() - 1
    }

    /// Add a stream object. `extra` holds additional dictionary entries.
    fn add_stream(&mut self, extra: &str, content: &[u8], compress: bool) -> usize {
        let mut data: Vec<u8> = Vec::new();
        if compress {
            let compressed = compress_to_vec_zlib(content, 6);
            let _ = write!(
                data,
                "<< /Length {} /Filter /FlateDecode{} >>\nstream\n",
                compressed.len(),
                extra
            );
            data.extend_from_slice(&compressed);
        } else {
            let _ = write!(data, "<< /Length {}{} >>\nstream\n", content.len(), extra);
            data.extend_from_slice(content);
        }
        data.extend_from_slice(b"\nendstream");
        self.add(data)
    }

    fn serialize(&self, info: Option<usize>) -> Vec<u8> {
        let mut output: Vec<u8> = Vec::new();
        let mut offsets = vec![0usize; self.objects.len()];

        output.extend_from_slice(b"%PDF-1.7\n");
        output.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");

        for (i, obj) in self.objects.iter().enumerate().skip(1) {
            offsets[i] = output.len();
            let _ = write!(output, "{} 0 obj\n", i);
            output.extend_from_slice(obj);
            output.extend_from_slice(b"\nendobj\n\n");
        }

        let xref_offset = output.len();
        let _ = write!(output, "xref\n0 {}\n", self.objects.len());
        output.extend_from_slice(b"0000000000 65535 f \n");
        for offset in offsets.iter().skip(1) {
            let _ = write!(output, "{:010} 00000 n \n", offset);
        }

        let _ = write!(output, "trailer\n<< /Size {} /Root 1 0 R", self.objects.len());
        if let Some(id) = info {
            let _ = write!(output, " /Info {} 0 R", id);
        }
        let _ = write!(output, " >>\nstartxref\n{}\n%%EOF\n", xref_offset);
        output
    }
}

impl PdfCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn current_page(&mut self) -> Result<&mut PageContent, CanvasError> {
        self.pages.last_mut().ok_or(CanvasError::NoPage)
    }

    fn image(&mut self, source: &str) -> Result<usize, CanvasError> {
        if let Some(&index) = self.image_index.get(source) {
            return Ok(index);
        }
        let image = load_image(source)?;
        log::debug!(
            target: "folio::pdf",
            "Loaded image {}x{} px",
            image.width_px,
            image.height_px
        );
        self.images.push(image);
        let index = self.images.len() - 1;
        self.image_index.insert(source.to_string(), index);
        Ok(index)
    }
}

impl Canvas for PdfCanvas {
    fn new_page(&mut self, options: &PageOptions) -> Result<PageHandle, CanvasError> {
        log::debug!(
            target: "folio::pdf",
            "New page {} ({:.2} x {:.2})",
            self.pages.len() + 1,
            options.width,
            options.height
        );
        self.pages.push(PageContent {
            width: options.width,
            height: options.height,
            margins: options.margins,
            compress: options.compress,
            stream: String::new(),
            fonts: BTreeSet::new(),
            images: BTreeSet::new(),
            links: Vec::new(),
        });
        self.open_line = None;
        Ok(PageHandle {
            width: options.width,
            height: options.height,
            margins: options.margins,
        })
    }

    fn draw_text(
        &mut self,
        text: &str,
        at: Point,
        options: &TextOptions,
    ) -> Result<Point, CanvasError> {
        self.current_page()?;
        let font_index = self.fonts.load(&options.font)?;
        self.fonts.record_usage(font_index, text);
        let color = Color::parse_or_black(&options.color);

        let font = self
            .fonts
            .get(font_index)
            .ok_or_else(|| CanvasError::Font(options.font.clone()))?;
        let page = self.pages.last_mut().ok_or(CanvasError::NoPage)?;
        page.fonts.insert(font_index);

        let size = options.size;
        let font_line = font.line_height(size);
        let line_height = font_line + options.line_gap;
        let ascent = font.ascender(size);
        let (start_x, wrap_width) = match self.open_line {
            Some(line) => (line.start_x, line.width),
            None => (
                at.x,
                options
                    .width
                    .unwrap_or(page.width - page.margins.right - at.x),
            ),
        };
        let wrap_width = wrap_width.max(0.0);

        let paragraphs: Vec<&str> = text.split('\n').collect();
        let last_paragraph = paragraphs.len() - 1;
        let mut x = at.x;
        let mut y = at.y;
        let mut fresh_line = self.open_line.is_none();

        for (i, paragraph) in paragraphs.iter().enumerate() {
            if i > 0 {
                x = start_x;
                y += line_height + options.paragraph_gap;
                fresh_line = true;
            }
            if paragraph.is_empty() {
                continue;
            }
            let first_room = start_x + wrap_width - x;
            let lines = break_into_lines(paragraph, first_room, wrap_width, |c| {
                font.char_width(c, size)
            });
            let last_line = lines.len() - 1;

            for (j, line) in lines.iter().enumerate() {
                if j > 0 {
                    x = start_x;
                    y += line_height;
                    fresh_line = true;
                }
                if line.text.is_empty() {
                    continue;
                }
                let completed = i < last_paragraph || j < last_line || !options.continued;
                let offset = match options.align {
                    _ if !(completed && fresh_line) => 0.0,
                    TextAlign::Center => (wrap_width - line.width) / 2.0,
                    TextAlign::Right => wrap_width - line.width,
                    TextAlign::Left | TextAlign::Justify => 0.0,
                };
                let line_x = x + offset.max(0.0);

                write_text(&mut page.stream, font_index, font, &line.text, line_x, y + ascent, size, color, page.height);
                if options.underline || options.strike {
                    let thickness = if size < 10.0 { 0.5 } else { (size / 10.0).floor() };
                    if options.underline {
                        let rect = Rect::new(line_x, y + font_line - thickness, line.width, thickness);
                        write_fill(&mut page.stream, rect, color, page.height);
                    }
                    if options.strike {
                        let rect = Rect::new(line_x, y + font_line / 2.0, line.width, thickness);
                        write_fill(&mut page.stream, rect, color, page.height);
                    }
                }
                if let Some(uri) = &options.link {
                    page.links
                        .push((Rect::new(line_x, y, line.width, font_line), uri.clone()));
                }

                x = line_x + line.advance;
                fresh_line = false;
            }
        }

        if options.continued {
            self.open_line = Some(OpenLine {
                start_x,
                width: wrap_width,
            });
        } else {
            if !paragraphs[last_paragraph].is_empty() {
                y += line_height + options.paragraph_gap;
            }
            x = start_x;
            self.open_line = None;
        }
        Ok(Point { x, y })
    }

    fn fill_rect(&mut self, rect: Rect, color: &str) -> Result<(), CanvasError> {
        let color = Color::parse_or_black(color);
        let page = self.current_page()?;
        write_fill(&mut page.stream, rect, color, page.height);
        Ok(())
    }

    fn stroke_rect(&mut self, rect: Rect, options: &StrokeOptions) -> Result<(), CanvasError> {
        let color = options
            .color
            .as_deref()
            .map_or(Color::BLACK, Color::parse_or_black);
        let line_width = options.line_width.unwrap_or(1.0);
        let page = self.current_page()?;
        let y = page.height - rect.y - rect.height;
        let _ = write!(
            page.stream,
            "q\n{:.3} {:.3} {:.3} RG\n{:.2} w\n{:.2} {:.2} {:.2} {:.2} re\nS\nQ\n",
            color.r, color.g, color.b, line_width, rect.x, y, rect.width, rect.height
        );
        Ok(())
    }

    fn draw_image(
        &mut self,
        source: &str,
        at: Point,
        options: &ImageOptions,
    ) -> Result<f64, CanvasError> {
        self.current_page()?;
        let index = self.image(source)?;
        let (width, height) = options.drawn_size(self.images[index].natural_size());

        let page = self.current_page()?;
        page.images.insert(index);
        let y = page.height - at.y - height;
        let _ = write!(
            page.stream,
            "q\n{:.4} 0 0 {:.4} {:.2} {:.2} cm\n/Im{} Do\nQ\n",
            width, height, at.x, y, index
        );
        Ok(height)
    }

    fn set_document_metadata(&mut self, info: &BTreeMap<String, String>) {
        self.info
            .extend(info.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    fn finish(&mut self) -> Result<Vec<u8>, CanvasError> {
        let mut builder = PdfBuilder::new();

        let font_ids: Vec<usize> = self
            .fonts
            .iter()
            .map(|(font, used)| write_font(&mut builder, font, used))
            .collect::<Result<_, _>>()?;
        let image_ids: Vec<usize> = self
            .images
            .iter()
            .map(|image| write_image(&mut builder, image))
            .collect();

        let mut page_ids = Vec::with_capacity(self.pages.len());
        for page in &self.pages {
            let content = builder.add_stream("", page.stream.as_bytes(), page.compress);

            let annots: Vec<usize> = page
                .links
                .iter()
                .map(|(rect, uri)| {
                    let bottom = page.height - rect.y - rect.height;
                    builder.add(format!(
                        "<< /Type /Annot /Subtype /Link /Rect [{:.2} {:.2} {:.2} {:.2}] \
                         /Border [0 0 0] /A << /Type /Action /S /URI /URI {} >> >>",
                        rect.x,
                        bottom,
                        rect.x + rect.width,
                        bottom + rect.height,
                        pdf_string(uri)
                    ))
                })
                .collect();

            let mut resources = String::new();
            if !page.fonts.is_empty() {
                let entries = page
                    .fonts
                    .iter()
                    .map(|&i| format!("/F{} {} 0 R", i, font_ids[i]))
                    .collect::<Vec<_>>()
                    .join(" ");
                let _ = write!(resources, "/Font << {} >> ", entries);
            }
            if !page.images.is_empty() {
                let entries = page
                    .images
                    .iter()
                    .map(|&i| format!("/Im{} {} 0 R", i, image_ids[i]))
                    .collect::<Vec<_>>()
                    .join(" ");
                let _ = write!(resources, "/XObject << {} >> ", entries);
            }

            let mut dict = format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
                 /Contents {} 0 R /Resources << {}>>",
                page.width, page.height, content, resources
            );
            if !annots.is_empty() {
                let refs = annots
                    .iter()
                    .map(|id| format!("{} 0 R", id))
                    .collect::<Vec<_>>()
                    .join(" ");
                let _ = write!(dict, " /Annots [{}]", refs);
            }
            dict.push_str(" >>");
            page_ids.push(builder.add(dict));
        }

        builder.objects[1] = b"<< /Type /Catalog /Pages 2 0 R >>".to_vec();
        let kids = page_ids
            .iter()
            .map(|id| format!("{} 0 R", id))
            .collect::<Vec<_>>()
            .join(" ");
        builder.objects[2] = format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids,
            page_ids.len()
        )
        .into_bytes();

        let mut info = String::from("<< ");
        for (key, value) in &self.info {
            let _ = write!(info, "/{} {} ", pdf_name(key), pdf_string(value));
        }
        if !self.info.contains_key("Producer") {
            info.push_str("/Producer (folio) ");
        }
        info.push_str(">>");
        let info_id = builder.add(info);

        log::debug!(
            target: "folio::pdf",
            "Serializing {} pages, {} objects",
            page_ids.len(),
            builder.objects.len()
        );
        Ok(builder.serialize(Some(info_id)))
    }
}

/// Emit one line of text with its baseline at `baseline` (top-down).
#[allow(clippy::too_many_arguments)]
fn write_text(
    stream: &mut String,
    font_index: usize,
    font: &FontData,
    text: &str,
    x: f64,
    baseline: f64,
    size: f64,
    color: Color,
    page_height: f64,
) {
    let _ = write!(
        stream,
        "BT\n{:.3} {:.3} {:.3} rg\n/F{} {:.2} Tf\n{:.2} {:.2} Td\n",
        color.r,
        color.g,
        color.b,
        font_index,
        size,
        x,
        page_height - baseline
    );
    match font {
        FontData::Standard(_) => {
            let _ = write!(stream, "({}) Tj\n", encode_winansi(text));
        }
        FontData::Custom(custom) => {
            let mut hex = String::with_capacity(text.len() * 4);
            for ch in text.chars() {
                let gid = custom.metrics.glyph_ids.get(&ch).copied().unwrap_or(0);
                let _ = write!(hex, "{:04X}", gid);
            }
            let _ = write!(stream, "<{}> Tj\n", hex);
        }
    }
    stream.push_str("ET\n");
}

fn write_fill(stream: &mut String, rect: Rect, color: Color, page_height: f64) {
    let y = page_height - rect.y - rect.height;
    let _ = write!(
        stream,
        "q\n{:.3} {:.3} {:.3} rg\n{:.2} {:.2} {:.2} {:.2} re\nf\nQ\n",
        color.r, color.g, color.b, rect.x, y, rect.width, rect.height
    );
}

/// Write a font's objects and return the id referenced from page resources.
fn write_font(
    builder: &mut PdfBuilder,
    font: &FontData,
    used: &BTreeSet<char>,
) -> Result<usize, CanvasError> {
    match font {
        FontData::Standard(standard) => Ok(builder.add(format!(
            "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
            standard.pdf_name()
        ))),
        FontData::Custom(custom) => write_custom_font(builder, custom, used),
    }
}

fn write_custom_font(
    builder: &mut PdfBuilder,
    font: &CustomFont,
    used: &BTreeSet<char>,
) -> Result<usize, CanvasError> {
    let face = ttf_parser::Face::parse(&font.data, 0)
        .map_err(|e| CanvasError::Font(format!("Failed to parse font '{}': {}", font.name, e)))?;
    let metrics = &font.metrics;
    let scale = 1000.0 / metrics.units_per_em as f64;

    let char_to_gid: BTreeMap<char, u16> = used
        .iter()
        .filter_map(|ch| metrics.glyph_ids.get(ch).map(|&gid| (*ch, gid)))
        .collect();

    let fontfile = builder.add_stream(
        &format!(" /Length1 {}", font.data.len()),
        &font.data,
        true,
    );

    let bbox = face.global_bounding_box();
    let cap_height = face.capital_height().unwrap_or(metrics.ascender) as f64 * scale;
    let descriptor = builder.add(format!(
        "<< /Type /FontDescriptor /FontName /{} /Flags 4 \
         /FontBBox [{} {} {} {}] /ItalicAngle {} \
         /Ascent {} /Descent {} /CapHeight {} /StemV 80 \
         /FontFile2 {} 0 R >>",
        font.name,
        (bbox.x_min as f64 * scale) as i32,
        (bbox.y_min as f64 * scale) as i32,
        (bbox.x_max as f64 * scale) as i32,
        (bbox.y_max as f64 * scale) as i32,
        face.italic_angle() as i32,
        (metrics.ascender as f64 * scale) as i32,
        (metrics.descender as f64 * scale) as i32,
        cap_height as i32,
        fontfile,
    ));

    let default_width = face
        .glyph_hor_advance(ttf_parser::GlyphId(0))
        .map(|adv| (adv as f64 * scale) as u32)
        .unwrap_or(1000);
    let cidfont = builder.add(format!(
        "<< /Type /Font /Subtype /CIDFontType2 /BaseFont /{} \
         /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> \
         /FontDescriptor {} 0 R /DW {} /W {} /CIDToGIDMap /Identity >>",
        font.name,
        descriptor,
        default_width,
        build_w_array(&char_to_gid, &face, scale),
    ));

    let cmap = build_tounicode_cmap(&char_to_gid, &font.name);
    let tounicode = builder.add_stream("", cmap.as_bytes(), true);

    Ok(builder.add(format!(
        "<< /Type /Font /Subtype /Type0 /BaseFont /{} /Encoding /Identity-H \
         /DescendantFonts [{} 0 R] /ToUnicode {} 0 R >>",
        font.name, cidfont, tounicode,
    )))
}

/// Per-glyph widths for a CIDFont: `[gid [width] gid [width] ...]`.
fn build_w_array(char_to_gid: &BTreeMap<char, u16>, face: &ttf_parser::Face, scale: f64) -> String {
    let gids: BTreeSet<u16> = char_to_gid.values().copied().collect();
    let mut result = String::from("[");
    for gid in gids {
        let advance = face.glyph_hor_advance(ttf_parser::GlyphId(gid)).unwrap_or(0);
        let _ = write!(result, " {} [{}]", gid, (advance as f64 * scale) as u32);
    }
    result.push_str(" ]");
    result
}

/// ToUnicode CMap so text can be extracted and copied.
fn build_tounicode_cmap(char_to_gid: &BTreeMap<char, u16>, font_name: &str) -> String {
    let mut gid_to_char: Vec<(u16, char)> = char_to_gid.iter().map(|(&ch, &gid)| (gid, ch)).collect();
    gid_to_char.sort();
    gid_to_char.dedup_by_key(|(gid, _)| *gid);

    let mut cmap = String::new();
    cmap.push_str("/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n");
    cmap.push_str("/CIDSystemInfo\n<< /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
    let _ = writeln!(cmap, "/CMapName /{}-UTF16 def", font_name);
    cmap.push_str("/CMapType 2 def\n1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

    // At most 100 entries per bfchar block.
    for chunk in gid_to_char.chunks(100) {
        let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
        for &(gid, ch) in chunk {
            let mut units = [0u16; 2];
            let utf16: String = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{:04X}", u))
                .collect();
            let _ = writeln!(cmap, "<{:04X}> <{}>", gid, utf16);
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    cmap
}

/// Write an image as one XObject, plus an SMask when it has alpha.
fn write_image(builder: &mut PdfBuilder, image: &LoadedImage) -> usize {
    let (w, h) = (image.width_px, image.height_px);
    match &image.pixels {
        Pixels::Jpeg { data, gray } => {
            let color_space = if *gray { "/DeviceGray" } else { "/DeviceRGB" };
            let mut obj: Vec<u8> = Vec::new();
            let _ = write!(
                obj,
                "<< /Type /XObject /Subtype /Image /Width {} /Height {} \
                 /ColorSpace {} /BitsPerComponent 8 /Filter /DCTDecode /Length {} >>\nstream\n",
                w,
                h,
                color_space,
                data.len()
            );
            obj.extend_from_slice(data);
            obj.extend_from_slice(b"\nendstream");
            builder.add(obj)
        }
        Pixels::Rgb { rgb, alpha } => {
            let smask = alpha.as_ref().map(|alpha| {
                builder.add_stream(
                    &format!(
                        " /Type /XObject /Subtype /Image /Width {} /Height {} \
                         /ColorSpace /DeviceGray /BitsPerComponent 8",
                        w, h
                    ),
                    alpha,
                    true,
                )
            });
            let smask_ref = smask
                .map(|id| format!(" /SMask {} 0 R", id))
                .unwrap_or_default();
            builder.add_stream(
                &format!(
                    " /Type /XObject /Subtype /Image /Width {} /Height {} \
                     /ColorSpace /DeviceRGB /BitsPerComponent 8{}",
                    w, h, smask_ref
                ),
                rgb,
                true,
            )
        }
    }
}

/// Encode text for a WinAnsi string literal, escaping as needed.
fn encode_winansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        let b = unicode_to_winansi(ch).unwrap_or(b'?');
        match b {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            0x20..=0x7E => out.push(b as char),
            _ => {
                let _ = write!(out, "\\{:03o}", b);
            }
        }
    }
    out
}

/// Map a Unicode codepoint to a WinAnsiEncoding (Windows-1252) byte.
fn unicode_to_winansi(ch: char) -> Option<u8> {
    let cp = ch as u32;
    if (0x20..=0x7E).contains(&cp) || (0xA0..=0xFF).contains(&cp) {
        return Some(cp as u8);
    }
    let b = match cp {
        0x20AC => 0x80,
        0x201A => 0x82,
        0x0192 => 0x83,
        0x201E => 0x84,
        0x2026 => 0x85,
        0x2020 => 0x86,
        0x2021 => 0x87,
        0x02C6 => 0x88,
        0x2030 => 0x89,
        0x0160 => 0x8A,
        0x2039 => 0x8B,
        0x0152 => 0x8C,
        0x017D => 0x8E,
        0x2018 => 0x91,
        0x2019 => 0x92,
        0x201C => 0x93,
        0x201D => 0x94,
        0x2022 => 0x95,
        0x2013 => 0x96,
        0x2014 => 0x97,
        0x02DC => 0x98,
        0x2122 => 0x99,
        0x0161 => 0x9A,
        0x203A => 0x9B,
        0x0153 => 0x9C,
        0x017E => 0x9E,
        0x0178 => 0x9F,
        _ => return None,
    };
    Some(b)
}

/// A PDF text string: a literal for ASCII, UTF-16BE hex otherwise.
fn pdf_string(s: &str) -> String {
    if s.is_ascii() {
        let escaped = s
            .replace('\\', "\\\\")
            .replace('(', "\\(")
            .replace(')', "\\)")
            .replace('\r', "\\r")
            .replace('\n', "\\n");
        return format!("({})", escaped);
    }
    let mut hex = String::from("<FEFF");
    for unit in s.encode_utf16() {
        let _ = write!(hex, "{:04X}", unit);
    }
    hex.push('>');
    hex
}

/// A PDF name object body; anything outside regular characters is `#xx`-escaped.
fn pdf_name(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.' {
            out.push(b as char);
        } else {
            let _ = write!(out, "#{:02X}", b);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::TextStyle;

    fn page(compress: bool) -> PageOptions {
        PageOptions {
            width: 600.0,
            height: 800.0,
            margins: Edges::uniform(50.0),
            compress,
        }
    }

    fn text_options(size: f64, continued: bool) -> TextOptions {
        let mut style = TextStyle::default();
        style.size = size;
        TextOptions::from_style(&style, continued)
    }

    fn output(canvas: &mut PdfCanvas) -> String {
        String::from_utf8_lossy(&canvas.finish().unwrap()).into_owned()
    }

    #[test]
    fn test_empty_document_is_valid() {
        let mut canvas = PdfCanvas::new();
        canvas.new_page(&page(true)).unwrap();
        let bytes = canvas.finish().unwrap();
        assert!(bytes.starts_with(b"%PDF-1.7"));
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("xref"));
        assert!(text.contains("trailer"));
        assert!(text.contains("/Count 1"));
        assert!(text.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn test_drawing_requires_a_page() {
        let mut canvas = PdfCanvas::new();
        let err = canvas
            .draw_text("x", Point::default(), &text_options(12.0, false))
            .unwrap_err();
        assert!(matches!(err, CanvasError::NoPage));
    }

    #[test]
    fn test_text_is_written_and_advances() {
        let mut canvas = PdfCanvas::new();
        canvas.new_page(&page(false)).unwrap();
        let end = canvas
            .draw_text("Hello (you)", Point { x: 50.0, y: 100.0 }, &text_options(10.0, false))
            .unwrap();
        assert_eq!(end.x, 50.0);
        assert!((end.y - 111.56).abs() < 1e-9);

        let pdf = output(&mut canvas);
        assert!(pdf.contains("(Hello \\(you\\)) Tj"));
        assert!(pdf.contains("/BaseFont /Helvetica "));
        assert!(pdf.contains("/Font << /F0"));
    }

    #[test]
    fn test_continued_text_stays_on_line() {
        let mut canvas = PdfCanvas::new();
        canvas.new_page(&page(false)).unwrap();
        let end = canvas
            .draw_text("ii", Point { x: 50.0, y: 100.0 }, &text_options(10.0, true))
            .unwrap();
        assert!((end.x - 54.44).abs() < 1e-9);
        assert_eq!(end.y, 100.0);

        let end = canvas.draw_text("\n", end, &text_options(10.0, false)).unwrap();
        assert_eq!(end.x, 50.0);
        assert!((end.y - 111.56).abs() < 1e-9);
    }

    #[test]
    fn test_text_wraps_within_width() {
        let mut canvas = PdfCanvas::new();
        canvas.new_page(&page(false)).unwrap();
        let mut options = text_options(10.0, false);
        options.width = Some(30.0);
        let end = canvas
            .draw_text("aaaa bbbb", Point { x: 50.0, y: 100.0 }, &options)
            .unwrap();
        assert!((end.y - (100.0 + 2.0 * 11.56)).abs() < 1e-9);

        let pdf = output(&mut canvas);
        assert!(pdf.contains("(aaaa ) Tj"));
        assert!(pdf.contains("(bbbb) Tj"));
    }

    #[test]
    fn test_link_adds_annotation() {
        let mut canvas = PdfCanvas::new();
        canvas.new_page(&page(false)).unwrap();
        let mut options = text_options(12.0, false);
        options.link = Some("https://example.com".to_string());
        canvas.draw_text("site", Point { x: 50.0, y: 50.0 }, &options).unwrap();
        let pdf = output(&mut canvas);
        assert!(pdf.contains("/Subtype /Link"));
        assert!(pdf.contains("/URI (https://example.com)"));
        assert!(pdf.contains("/Annots ["));
    }

    #[test]
    fn test_rects_and_metadata() {
        let mut canvas = PdfCanvas::new();
        let mut info = BTreeMap::new();
        info.insert("Title".to_string(), "Report".to_string());
        info.insert("Author".to_string(), "Zoë".to_string());
        canvas.set_document_metadata(&info);
        canvas.new_page(&page(false)).unwrap();
        canvas.fill_rect(Rect::new(10.0, 20.0, 30.0, 40.0), "#ff0000").unwrap();
        canvas
            .stroke_rect(Rect::new(0.0, 0.0, 5.0, 5.0), &StrokeOptions::default())
            .unwrap();

        let pdf = output(&mut canvas);
        assert!(pdf.contains("1.000 0.000 0.000 rg\n10.00 740.00 30.00 40.00 re\nf"));
        assert!(pdf.contains("1.00 w\n0.00 795.00 5.00 5.00 re\nS"));
        assert!(pdf.contains("/Title (Report)"));
        assert!(pdf.contains("/Author <FEFF005A006F00EB>"));
        assert!(pdf.contains("/Producer (folio)"));
    }

    #[test]
    fn test_unknown_font_fails() {
        let mut canvas = PdfCanvas::new();
        canvas.new_page(&page(false)).unwrap();
        let mut options = text_options(12.0, false);
        options.font = "/missing/font.ttf".to_string();
        let err = canvas.draw_text("x", Point::default(), &options).unwrap_err();
        assert!(matches!(err, CanvasError::Font(_)));
    }

    #[test]
    fn test_missing_image_fails() {
        let mut canvas = PdfCanvas::new();
        canvas.new_page(&page(false)).unwrap();
        let err = canvas
            .draw_image("/missing/image.png", Point::default(), &ImageOptions::default())
            .unwrap_err();
        assert!(matches!(err, CanvasError::Image(_)));
    }

    #[test]
    fn test_image_is_embedded_once() {
        use base64::Engine;
        let mut img = image::RgbaImage::new(4, 2);
        for p in img.pixels_mut() {
            *p = image::Rgba([0, 0, 0, 255]);
        }
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(encoder, img.as_raw(), 4, 2, image::ColorType::Rgba8)
            .unwrap();
        let uri = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&buf)
        );

        let mut canvas = PdfCanvas::new();
        canvas.new_page(&page(false)).unwrap();
        let options = ImageOptions {
            width: Some(40.0),
            ..Default::default()
        };
        let h = canvas.draw_image(&uri, Point { x: 10.0, y: 10.0 }, &options).unwrap();
        assert_eq!(h, 20.0);
        canvas.draw_image(&uri, Point { x: 10.0, y: 40.0 }, &options).unwrap();

        let pdf = output(&mut canvas);
        assert_eq!(pdf.matches("/Subtype /Image").count(), 1);
        assert_eq!(pdf.matches("/Im0 Do").count(), 2);
    }

    #[test]
    fn test_winansi_encoding() {
        assert_eq!(encode_winansi("a\\b"), "a\\\\b");
        assert_eq!(encode_winansi("é"), "\\351");
        assert_eq!(encode_winansi("\u{2014}"), "\\227");
        assert_eq!(encode_winansi("漢"), "?");
    }

    #[test]
    fn test_tounicode_cmap_format() {
        let mut map = BTreeMap::new();
        map.insert('A', 36u16);
        map.insert('😀', 90u16);
        let cmap = build_tounicode_cmap(&map, "Test");
        assert!(cmap.contains("/CMapName /Test-UTF16 def"));
        assert!(cmap.contains("2 beginbfchar"));
        assert!(cmap.contains("<0024> <0041>"));
        assert!(cmap.contains("<005A> <D83DDE00>"));
    }

    #[test]
    fn test_pdf_name_escapes() {
        assert_eq!(pdf_name("Title"), "Title");
        assert_eq!(pdf_name("My Key"), "My#20Key");
    }
}
