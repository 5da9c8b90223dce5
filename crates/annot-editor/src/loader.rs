//! Image pixel sources.
//!
//! Image objects only carry a source reference; the pixels behind it are
//! fetched through an [`ImageLoader`] and kept in the session's
//! [`ImageCache`]. Data URIs are decoded in place, remote URLs go through
//! whatever the host provides. A remote source the host has not delivered
//! yet is *pending*, not failed: the session keeps asking until bytes or a
//! fetch failure arrive.

use crate::error::EditorError;
use annot_render::pixels::{is_data_uri, DecodedImage, ImageCache};
use annot_render::RenderError;
use std::collections::HashMap;

pub trait ImageLoader {
    fn load(&mut self, src: &str) -> Result<DecodedImage, RenderError>;
}

/// Decodes data URIs and nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataUriLoader;

impl ImageLoader for DataUriLoader {
    fn load(&mut self, src: &str) -> Result<DecodedImage, RenderError> {
        if !is_data_uri(src) {
            return Err(RenderError::Unavailable(src.to_string()));
        }
        DecodedImage::from_data_uri(src)
    }
}

/// Bytes handed over by the host (fetched URLs, file picks), falling back
/// to data-URI decoding.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    bytes: HashMap<String, Vec<u8>>,
    failed: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provide(&mut self, src: impl Into<String>, bytes: Vec<u8>) {
        let src = src.into();
        self.failed.remove(&src);
        self.bytes.insert(src, bytes);
    }

    /// The host gave up fetching `src`.
    pub fn fail(&mut self, src: impl Into<String>, reason: impl Into<String>) {
        self.failed.insert(src.into(), reason.into());
    }
}

impl ImageLoader for MemoryLoader {
    fn load(&mut self, src: &str) -> Result<DecodedImage, RenderError> {
        if let Some(bytes) = self.bytes.get(src) {
            return DecodedImage::decode(bytes);
        }
        match self.failed.get(src) {
            Some(reason) => Err(RenderError::Fetch(reason.clone())),
            None => DataUriLoader.load(src),
        }
    }
}

/// Resolve the pixels for `src`: cache first, then the loader, then a
/// direct decode that bypasses both, then `fallback` if given.
///
/// Returns [`EditorError::ImagePending`] while the loader simply has no
/// bytes for `src` yet.
pub fn load_pixels(
    cache: &mut ImageCache,
    loader: &mut dyn ImageLoader,
    src: &str,
    fallback: Option<&str>,
) -> Result<DecodedImage, EditorError> {
    if let Some(hit) = cache.get(src) {
        return Ok(hit.clone());
    }
    let first = match loader.load(src) {
        Ok(decoded) => {
            cache.insert(src, decoded.clone());
            return Ok(decoded);
        }
        Err(e) => e,
    };
    let waiting = matches!(first, RenderError::Unavailable(_));
    if !waiting {
        log::warn!("loading {} failed ({first}), retrying", abbreviate(src));
    }

    if is_data_uri(src)
        && let Ok(decoded) = DecodedImage::from_data_uri(src)
    {
        cache.insert(src, decoded.clone());
        return Ok(decoded);
    }

    if let Some(alt) = fallback.filter(|alt| *alt != src) {
        let decoded = match cache.get(alt) {
            Some(hit) => Ok(hit.clone()),
            None => loader
                .load(alt)
                .or_else(|_| DecodedImage::from_data_uri(alt)),
        };
        if let Ok(decoded) = decoded {
            cache.insert(src, decoded.clone());
            return Ok(decoded);
        }
    }

    if waiting {
        log::trace!("waiting for pixels of {}", abbreviate(src));
        return Err(EditorError::ImagePending(src.to_string()));
    }
    log::error!("image {} could not be loaded", abbreviate(src));
    Err(EditorError::LoadFailed(first.to_string()))
}

/// Data URIs can be megabytes long; keep log lines readable.
pub(crate) fn abbreviate(src: &str) -> &str {
    match src.char_indices().nth(48) {
        Some((i, _)) => &src[..i],
        None => src,
    }
}
