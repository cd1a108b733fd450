//! # Font Management
//!
//! Fonts are named the way styles name them: either one of the standard
//! PDF fonts (`Helvetica-Bold`, `Times-Roman`, ...) which need no
//! embedding, or a path to a TrueType/OpenType file that gets parsed with
//! ttf-parser and embedded whole.

pub mod metrics;

pub use metrics::StandardFontMetrics;

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use crate::error::CanvasError;

/// The standard PDF fonts with WinAnsi metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl StandardFont {
    pub const ALL: [StandardFont; 12] = [
        Self::Helvetica,
        Self::HelveticaBold,
        Self::HelveticaOblique,
        Self::HelveticaBoldOblique,
        Self::TimesRoman,
        Self::TimesBold,
        Self::TimesItalic,
        Self::TimesBoldItalic,
        Self::Courier,
        Self::CourierBold,
        Self::CourierOblique,
        Self::CourierBoldOblique,
    ];

    /// The PDF name for this font.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::HelveticaBold => "Helvetica-Bold",
            Self::HelveticaOblique => "Helvetica-Oblique",
            Self::HelveticaBoldOblique => "Helvetica-BoldOblique",
            Self::TimesRoman => "Times-Roman",
            Self::TimesBold => "Times-Bold",
            Self::TimesItalic => "Times-Italic",
            Self::TimesBoldItalic => "Times-BoldItalic",
            Self::Courier => "Courier",
            Self::CourierBold => "Courier-Bold",
            Self::CourierOblique => "Courier-Oblique",
            Self::CourierBoldOblique => "Courier-BoldOblique",
        }
    }

    /// Look up a standard font by its PDF name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("Times") {
            return Some(Self::TimesRoman);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|font| font.pdf_name().eq_ignore_ascii_case(name))
    }

    pub fn metrics(&self) -> StandardFontMetrics {
        use metrics::{COURIER, HELVETICA, HELVETICA_BOLD, TIMES_BOLD, TIMES_ROMAN};
        let (widths, default_width, ascender, descender, line_height) = match self {
            Self::Helvetica | Self::HelveticaOblique => (&HELVETICA, 556, 718, -207, 1156),
            Self::HelveticaBold | Self::HelveticaBoldOblique => {
                (&HELVETICA_BOLD, 556, 718, -207, 1190)
            }
            Self::TimesRoman => (&TIMES_ROMAN, 500, 683, -217, 1116),
            Self::TimesItalic => (&TIMES_ROMAN, 500, 683, -217, 1100),
            Self::TimesBold => (&TIMES_BOLD, 500, 683, -217, 1153),
            Self::TimesBoldItalic => (&TIMES_BOLD, 500, 683, -217, 1139),
            Self::Courier
            | Self::CourierBold
            | Self::CourierOblique
            | Self::CourierBoldOblique => (&COURIER, 600, 629, -157, 1055),
        };
        StandardFontMetrics {
            widths,
            default_width,
            ascender,
            descender,
            line_height,
        }
    }
}

/// Parsed metrics from a TrueType/OpenType font via ttf-parser.
#[derive(Debug, Clone)]
pub struct CustomFontMetrics {
    pub units_per_em: u16,
    pub advance_widths: HashMap<char, u16>,
    pub default_advance: u16,
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
    /// Maps characters to their glyph IDs in the font.
    pub glyph_ids: HashMap<char, u16>,
}

impl CustomFontMetrics {
    /// Get the advance width of a character in points.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        let w = self
            .advance_widths
            .get(&ch)
            .copied()
            .unwrap_or(self.default_advance);
        (w as f64 / self.units_per_em as f64) * font_size
    }

    /// Parse metrics from font data using ttf-parser.
    pub fn from_font_data(data: &[u8]) -> Option<Self> {
        let face = ttf_parser::Face::parse(data, 0).ok()?;
        let units_per_em = face.units_per_em();

        let mut advance_widths = HashMap::new();
        let mut glyph_ids = HashMap::new();
        let mut default_advance = 0u16;

        for code in 32u32..=0xFFFF {
            if let Some(ch) = char::from_u32(code) {
                if let Some(glyph_id) = face.glyph_index(ch) {
                    let advance = face.glyph_hor_advance(glyph_id).unwrap_or(0);
                    advance_widths.insert(ch, advance);
                    glyph_ids.insert(ch, glyph_id.0);
                    if ch == ' ' {
                        default_advance = advance;
                    }
                }
            }
        }

        if default_advance == 0 {
            default_advance = units_per_em / 2;
        }

        Some(CustomFontMetrics {
            units_per_em,
            advance_widths,
            default_advance,
            ascender: face.ascender(),
            descender: face.descender(),
            line_gap: face.line_gap(),
            glyph_ids,
        })
    }
}

/// A font file loaded from disk.
#[derive(Debug, Clone)]
pub struct CustomFont {
    /// PDF-safe base font name derived from the file name.
    pub name: String,
    pub data: Vec<u8>,
    pub metrics: CustomFontMetrics,
}

#[derive(Debug, Clone)]
pub enum FontData {
    /// One of the standard PDF fonts. No embedding needed.
    Standard(StandardFont),
    /// A TrueType/OpenType font that needs to be embedded.
    Custom(CustomFont),
}

impl FontData {
    /// Advance width of one character in points.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        match self {
            FontData::Standard(font) => font.metrics().char_width(ch, font_size),
            FontData::Custom(font) => font.metrics.char_width(ch, font_size),
        }
    }

    pub fn measure_string(&self, text: &str, font_size: f64) -> f64 {
        text.chars().map(|ch| self.char_width(ch, font_size)).sum()
    }

    /// Distance from the top of a line to its baseline, in points.
    pub fn ascender(&self, font_size: f64) -> f64 {
        match self {
            FontData::Standard(font) => font.metrics().ascender as f64 / 1000.0 * font_size,
            FontData::Custom(font) => {
                font.metrics.ascender as f64 / font.metrics.units_per_em as f64 * font_size
            }
        }
    }

    /// Height of one line of text, in points.
    pub fn line_height(&self, font_size: f64) -> f64 {
        match self {
            FontData::Standard(font) => font.metrics().line_height as f64 / 1000.0 * font_size,
            FontData::Custom(font) => {
                let m = &font.metrics;
                let units = m.ascender as f64 - m.descender as f64 + m.line_gap as f64;
                units / m.units_per_em as f64 * font_size
            }
        }
    }
}

/// Fonts loaded for one document, in first-use order.
///
/// The index returned by [`FontContext::load`] doubles as the PDF resource
/// name (`/F0`, `/F1`, ...).
#[derive(Debug, Default)]
pub struct FontContext {
    fonts: Vec<FontData>,
    by_name: HashMap<String, usize>,
    used_chars: Vec<BTreeSet<char>>,
}

impl FontContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a font name to a loaded font, reading font files on first use.
    pub fn load(&mut self, name: &str) -> Result<usize, CanvasError> {
        if let Some(&index) = self.by_name.get(name) {
            return Ok(index);
        }
        let font = match StandardFont::from_name(name) {
            Some(standard) => FontData::Standard(standard),
            None => FontData::Custom(Self::read_font_file(name)?),
        };
        log::debug!(target: "folio::pdf", "Loaded font {}", name);

        let index = self.fonts.len();
        self.fonts.push(font);
        self.used_chars.push(BTreeSet::new());
        self.by_name.insert(name.to_string(), index);
        Ok(index)
    }

    fn read_font_file(path: &str) -> Result<CustomFont, CanvasError> {
        let data = std::fs::read(path)
            .map_err(|e| CanvasError::Font(format!("Failed to load font '{}': {}", path, e)))?;
        let metrics = CustomFontMetrics::from_font_data(&data).ok_or_else(|| {
            CanvasError::Font(format!("'{}' is not a TrueType/OpenType font", path))
        })?;
        let stem = Path::new(path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(CustomFont {
            name: sanitize_font_name(&stem),
            data,
            metrics,
        })
    }

    /// The font at `index`. Indexes come from [`FontContext::load`].
    pub fn get(&self, index: usize) -> Option<&FontData> {
        self.fonts.get(index)
    }

    /// Remember which characters were drawn with a font, for its width table.
    pub fn record_usage(&mut self, index: usize, text: &str) {
        if let Some(used) = self.used_chars.get_mut(index) {
            used.extend(text.chars());
        }
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// Every loaded font with the characters drawn in it.
    pub fn iter(&self) -> impl Iterator<Item = (&FontData, &BTreeSet<char>)> {
        self.fonts.iter().zip(self.used_chars.iter())
    }
}

/// Strip a name down to characters allowed in a PDF name object.
pub fn sanitize_font_name(name: &str) -> String {
    let name: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if name.is_empty() {
        "CustomFont".to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_font_lookup() {
        assert_eq!(StandardFont::from_name("Helvetica"), Some(StandardFont::Helvetica));
        assert_eq!(
            StandardFont::from_name("helvetica-bold"),
            Some(StandardFont::HelveticaBold)
        );
        assert_eq!(StandardFont::from_name("Times"), Some(StandardFont::TimesRoman));
        assert_eq!(StandardFont::from_name("Courier-BoldOblique"), Some(StandardFont::CourierBoldOblique));
        assert_eq!(StandardFont::from_name("Comic Sans"), None);
    }

    #[test]
    fn test_font_context_helvetica() {
        let mut ctx = FontContext::new();
        let idx = ctx.load("Helvetica").unwrap();
        let w = ctx.get(idx).unwrap().char_width(' ', 12.0);
        assert!((w - 3.336).abs() < 0.001);
    }

    #[test]
    fn test_bold_wider() {
        let mut ctx = FontContext::new();
        let regular = ctx.load("Helvetica").unwrap();
        let bold = ctx.load("Helvetica-Bold").unwrap();
        assert_ne!(regular, bold);
        let a = ctx.get(regular).unwrap().char_width('A', 12.0);
        let b = ctx.get(bold).unwrap().char_width('A', 12.0);
        assert!(b > a, "Bold A should be wider than regular A");
    }

    #[test]
    fn test_load_is_cached() {
        let mut ctx = FontContext::new();
        let first = ctx.load("Courier").unwrap();
        let second = ctx.load("Courier").unwrap();
        assert_eq!(first, second);
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_missing_font_file_fails() {
        let mut ctx = FontContext::new();
        let err = ctx.load("/definitely/not/here.ttf").unwrap_err();
        assert!(matches!(err, CanvasError::Font(_)));
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_line_metrics() {
        let helvetica = FontData::Standard(StandardFont::Helvetica);
        assert!((helvetica.line_height(10.0) - 11.56).abs() < 1e-9);
        assert!((helvetica.ascender(10.0) - 7.18).abs() < 1e-9);
        assert!((helvetica.measure_string("ii", 10.0) - 4.44).abs() < 1e-9);
    }

    #[test]
    fn test_record_usage() {
        let mut ctx = FontContext::new();
        let idx = ctx.load("Helvetica").unwrap();
        ctx.record_usage(idx, "abca");
        let (_, used) = ctx.iter().next().unwrap();
        assert_eq!(used.iter().collect::<String>(), "abc");
    }

    #[test]
    fn test_sanitize_font_name() {
        assert_eq!(sanitize_font_name("Open Sans"), "OpenSans");
        assert_eq!(sanitize_font_name("***"), "CustomFont");
    }
}
