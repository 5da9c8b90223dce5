/// Failures while decoding, encoding or rasterizing pixels.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("not a base64 data URI")]
    InvalidDataUri,
    #[error("bad base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("image codec error: {0}")]
    Codec(#[from] image::ImageError),
    #[error("image has zero width or height")]
    EmptyImage,
    #[error("cannot allocate a {width}×{height} surface")]
    Surface { width: u32, height: u32 },
    #[error("no pixels available for {0}")]
    Unavailable(String),
    #[error("fetching the image failed: {0}")]
    Fetch(String),
    #[error("unusable font {0}")]
    Font(String),
}
