//! # Image Loading
//!
//! Reads the images `<img>` tags place. A source is either a file path
//! (already resolved against the base path) or a base64 `data:` URI.
//!
//! JPEG bytes are embedded as-is (DCTDecode); only their size and component
//! count are read. PNG is decoded to RGB with a separate alpha plane that
//! becomes the image's soft mask.

use std::io::Cursor;

use crate::error::CanvasError;

/// An image ready for embedding.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub pixels: Pixels,
    pub width_px: u32,
    pub height_px: u32,
}

#[derive(Debug, Clone)]
pub enum Pixels {
    /// Untouched JPEG stream.
    Jpeg { data: Vec<u8>, gray: bool },
    /// 8-bit RGB samples, plus alpha when any pixel is not opaque.
    Rgb { rgb: Vec<u8>, alpha: Option<Vec<u8>> },
}

impl LoadedImage {
    /// Natural size in pixels, used as points when no size is requested.
    pub fn natural_size(&self) -> (f64, f64) {
        (self.width_px as f64, self.height_px as f64)
    }
}

/// Load an image from a file path or a `data:` URI.
pub fn load_image(source: &str) -> Result<LoadedImage, CanvasError> {
    let bytes = if source.starts_with("data:") {
        decode_data_uri(source)?
    } else {
        std::fs::read(source).map_err(|e| {
            CanvasError::Image(format!("Failed to read image '{}': {}", source, e))
        })?
    };
    decode(&bytes).map_err(|e| CanvasError::Image(format!("{}: {}", describe(source), e)))
}

/// Short form of a source for error messages; data URIs can be huge.
fn describe(source: &str) -> &str {
    if source.starts_with("data:") {
        source.split(',').next().unwrap_or("data:")
    } else {
        source
    }
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>, CanvasError> {
    use base64::Engine;

    let (header, payload) = uri
        .split_once(',')
        .ok_or_else(|| CanvasError::Image("Invalid data URI: missing comma".to_string()))?;
    if !header.ends_with(";base64") {
        return Err(CanvasError::Image(format!(
            "Unsupported data URI encoding: {}",
            header
        )));
    }
    let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| CanvasError::Image(format!("Base64 decode error: {}", e)))
}

fn decode(data: &[u8]) -> Result<LoadedImage, String> {
    if data.starts_with(&[0xFF, 0xD8]) {
        read_jpeg(data)
    } else if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        decode_png(data)
    } else {
        Err("unsupported image format (expected JPEG or PNG)".to_string())
    }
}

fn read_jpeg(data: &[u8]) -> Result<LoadedImage, String> {
    let (width, height) = image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| e.to_string())?
        .into_dimensions()
        .map_err(|e| format!("failed to read JPEG dimensions: {}", e))?;

    Ok(LoadedImage {
        pixels: Pixels::Jpeg {
            data: data.to_vec(),
            gray: jpeg_components(data) == Some(1),
        },
        width_px: width,
        height_px: height,
    })
}

/// Component count from the first start-of-frame segment.
fn jpeg_components(data: &[u8]) -> Option<u8> {
    let mut i = 2;
    while i + 3 < data.len() && data[i] == 0xFF {
        let marker = data[i + 1];
        if matches!(marker, 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF) {
            // length(2) precision(1) height(2) width(2) components(1)
            return data.get(i + 9).copied();
        }
        let len = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        i += 2 + len;
    }
    None
}

/// Pixels in a `width` by `height` image, widened before multiplying.
fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

fn decode_png(data: &[u8]) -> Result<LoadedImage, String> {
    let img = image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| e.to_string())?
        .decode()
        .map_err(|e| format!("failed to decode PNG: {}", e))?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let count = pixel_count(width, height);
    let mut rgb = Vec::with_capacity(count * 3);
    let mut alpha = Vec::with_capacity(count);
    for pixel in rgba.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }
    let opaque = alpha.iter().all(|&a| a == 255);

    Ok(LoadedImage {
        pixels: Pixels::Rgb {
            rgb,
            alpha: (!opaque).then_some(alpha),
        },
        width_px: width,
        height_px: height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(pixel: [u8; 4]) -> Vec<u8> {
        let mut img = image::RgbaImage::new(1, 1);
        img.put_pixel(0, 0, image::Rgba(pixel));
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(encoder, img.as_raw(), 1, 1, image::ColorType::Rgba8)
            .unwrap();
        buf
    }

    #[test]
    fn test_opaque_png_has_no_alpha() {
        let loaded = decode(&png([255, 0, 0, 255])).unwrap();
        assert_eq!(loaded.natural_size(), (1.0, 1.0));
        match loaded.pixels {
            Pixels::Rgb { rgb, alpha } => {
                assert_eq!(rgb, vec![255, 0, 0]);
                assert!(alpha.is_none());
            }
            _ => panic!("PNG should decode to RGB"),
        }
    }

    #[test]
    fn test_translucent_png_keeps_alpha() {
        let loaded = decode(&png([0, 0, 255, 128])).unwrap();
        match loaded.pixels {
            Pixels::Rgb { alpha, .. } => assert_eq!(alpha, Some(vec![128])),
            _ => panic!("PNG should decode to RGB"),
        }
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_pixel_count_does_not_overflow_u32() {
        assert_eq!(pixel_count(70_000, 70_000), 4_900_000_000);
        assert_eq!(pixel_count(3, 2), 6);
    }

    #[test]
    fn test_jpeg_passthrough() {
        let img = image::RgbImage::from_fn(2, 3, |_, _| image::Rgb([0, 128, 255]));
        let mut buf = Vec::new();
        let encoder = image::codecs::jpeg::JpegEncoder::new(&mut buf);
        image::ImageEncoder::write_image(encoder, img.as_raw(), 2, 3, image::ColorType::Rgb8)
            .unwrap();

        let loaded = decode(&buf).unwrap();
        assert_eq!((loaded.width_px, loaded.height_px), (2, 3));
        match loaded.pixels {
            Pixels::Jpeg { data, gray } => {
                assert_eq!(data, buf);
                assert!(!gray);
            }
            _ => panic!("JPEG should pass through"),
        }
    }

    #[test]
    fn test_data_uri() {
        use base64::Engine;
        let b64 = base64::engine::general_purpose::STANDARD.encode(png([0, 255, 0, 255]));
        let loaded = load_image(&format!("data:image/png;base64,{}", b64)).unwrap();
        assert_eq!(loaded.width_px, 1);
    }

    #[test]
    fn test_bad_sources() {
        assert!(matches!(
            load_image("data:image/png;base64"),
            Err(CanvasError::Image(_))
        ));
        assert!(matches!(
            load_image("/no/such/image.png"),
            Err(CanvasError::Image(_))
        ));
        assert!(decode(&[0, 1, 2, 3, 4]).is_err());
    }
}
