//! Image pixels: data URIs, decoding, PNG encoding and region extraction.
//!
//! Decoded images are kept twice: straight RGBA for re-encoding and cropping,
//! and a premultiplied pixmap ready to be composited by the rasterizer.

use crate::error::RenderError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::imageops::{self, FilterType};
use image::{ImageEncoder, RgbaImage};
use std::collections::HashMap;
use std::sync::Arc;
use tiny_skia::{IntSize, Pixmap};

#[derive(Debug, Clone)]
pub struct DecodedImage {
    rgba: Arc<RgbaImage>,
    pixmap: Arc<Pixmap>,
}

impl DecodedImage {
    pub fn from_rgba(rgba: RgbaImage) -> Result<Self, RenderError> {
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(RenderError::EmptyImage);
        }
        let mut data = Vec::with_capacity(rgba.as_raw().len());
        for px in rgba.pixels() {
            let [r, g, b, a] = px.0;
            let premul = |c: u8| ((u16::from(c) * u16::from(a) + 127) / 255) as u8;
            data.extend_from_slice(&[premul(r), premul(g), premul(b), a]);
        }
        let size = IntSize::from_wh(width, height).ok_or(RenderError::EmptyImage)?;
        let pixmap = Pixmap::from_vec(data, size).ok_or(RenderError::Surface { width, height })?;
        Ok(Self {
            rgba: Arc::new(rgba),
            pixmap: Arc::new(pixmap),
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, RenderError> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        Self::from_rgba(rgba)
    }

    pub fn from_data_uri(uri: &str) -> Result<Self, RenderError> {
        let (_, bytes) = decode_data_uri(uri)?;
        Self::decode(&bytes)
    }

    pub fn width(&self) -> u32 {
        self.rgba.width()
    }

    pub fn height(&self) -> u32 {
        self.rgba.height()
    }

    pub fn rgba(&self) -> &RgbaImage {
        &self.rgba
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Re-encode as a PNG data URI, optionally rescaled.
    pub fn to_png_data_uri(&self, multiplier: f64) -> Result<String, RenderError> {
        if (multiplier - 1.0).abs() < f64::EPSILON {
            return png_data_uri(&self.rgba);
        }
        png_data_uri(&rescale(&self.rgba, multiplier))
    }

    /// Cut out a pixel region, clamped to the image.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> RgbaImage {
        let x = x.min(self.width().saturating_sub(1));
        let y = y.min(self.height().saturating_sub(1));
        let width = width.clamp(1, self.width() - x);
        let height = height.clamp(1, self.height() - y);
        imageops::crop_imm(self.rgba.as_ref(), x, y, width, height).to_image()
    }
}

// ─── Data URIs ───────────────────────────────────────────────────────────

pub fn is_data_uri(s: &str) -> bool {
    s.starts_with("data:")
}

/// Split `data:<mime>;base64,<payload>` and decode the payload.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), RenderError> {
    let rest = uri.strip_prefix("data:").ok_or(RenderError::InvalidDataUri)?;
    let (header, payload) = rest.split_once(',').ok_or(RenderError::InvalidDataUri)?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or(RenderError::InvalidDataUri)?;
    let bytes = STANDARD.decode(payload.trim())?;
    Ok((mime.to_string(), bytes))
}

pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, RenderError> {
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out).write_image(
        img.as_raw(),
        img.width(),
        img.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(out)
}

pub fn png_data_uri(img: &RgbaImage) -> Result<String, RenderError> {
    Ok(data_uri("image/png", &encode_png(img)?))
}

pub fn rescale(img: &RgbaImage, multiplier: f64) -> RgbaImage {
    let w = ((f64::from(img.width()) * multiplier).round() as u32).max(1);
    let h = ((f64::from(img.height()) * multiplier).round() as u32).max(1);
    imageops::resize(img, w, h, FilterType::Triangle)
}

// ─── Cache ───────────────────────────────────────────────────────────────

/// Decoded pixels keyed by image source (URL or data URI).
#[derive(Debug, Default, Clone)]
pub struct ImageCache {
    entries: HashMap<String, DecodedImage>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, src: &str) -> Option<&DecodedImage> {
        self.entries.get(src)
    }

    pub fn contains(&self, src: &str) -> bool {
        self.entries.contains_key(src)
    }

    pub fn insert(&mut self, src: impl Into<String>, image: DecodedImage) {
        self.entries.insert(src.into(), image);
    }

    pub fn remove(&mut self, src: &str) -> Option<DecodedImage> {
        self.entries.remove(src)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use pretty_assertions::assert_eq;

    fn checker(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 128])
            }
        })
    }

    #[test]
    fn png_data_uri_roundtrip() {
        let img = checker(8, 4);
        let uri = png_data_uri(&img).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));

        let decoded = DecodedImage::from_data_uri(&uri).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 4));
        assert_eq!(decoded.rgba().get_pixel(1, 0), &Rgba([0, 0, 255, 128]));
    }

    #[test]
    fn premultiplied_pixmap() {
        let decoded = DecodedImage::from_rgba(checker(2, 1)).unwrap();
        let px = decoded.pixmap().pixels()[1];
        assert_eq!((px.blue(), px.alpha()), (128, 128));
    }

    #[test]
    fn rejects_bad_uris() {
        assert!(matches!(
            decode_data_uri("https://example.com/a.png"),
            Err(RenderError::InvalidDataUri)
        ));
        assert!(matches!(
            decode_data_uri("data:image/png,raw"),
            Err(RenderError::InvalidDataUri)
        ));
        assert!(matches!(
            decode_data_uri("data:image/png;base64,@@@"),
            Err(RenderError::Base64(_))
        ));
    }

    #[test]
    fn empty_images_are_rejected() {
        assert!(matches!(
            DecodedImage::from_rgba(RgbaImage::new(0, 5)),
            Err(RenderError::EmptyImage)
        ));
    }

    #[test]
    fn crop_is_clamped() {
        let decoded = DecodedImage::from_rgba(checker(10, 10)).unwrap();
        let part = decoded.crop(8, 8, 5, 5);
        assert_eq!(part.dimensions(), (2, 2));
        assert_eq!(decoded.crop(2, 3, 4, 1).dimensions(), (4, 1));
    }

    #[test]
    fn rescaled_reencode() {
        let decoded = DecodedImage::from_rgba(checker(10, 6)).unwrap();
        let uri = decoded.to_png_data_uri(2.0).unwrap();
        let back = DecodedImage::from_data_uri(&uri).unwrap();
        assert_eq!((back.width(), back.height()), (20, 12));
    }
}
