//! Frame decoding
//!
//! Browser clients send frames as data URLs (`data:image/jpeg;base64,...`) or
//! bare base64. Decoding is stateless; a malformed payload yields a typed
//! error and the caller simply skips the frame.

use crate::error::VisionError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::GenericImageView;

/// Decoded raster frame, RGB8
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn area(&self) -> f32 {
        self.width as f32 * self.height as f32
    }
}

/// Decode a data-URL or bare-base64 frame payload into a raster frame.
///
/// The MIME prefix is stripped by splitting on the last comma, matching what
/// clients actually send (`data:image/<fmt>;base64,<payload>`).
pub fn decode_data_url(payload: &str) -> Result<Frame, VisionError> {
    let encoded = payload.rsplit(',').next().unwrap_or(payload).trim();
    if encoded.is_empty() {
        return Err(VisionError::Decode("empty frame payload".to_string()));
    }

    let bytes = BASE64.decode(encoded)?;
    decode_bytes(&bytes)
}

/// Decode raw encoded image bytes (JPEG/PNG/...) into a raster frame.
pub fn decode_bytes(bytes: &[u8]) -> Result<Frame, VisionError> {
    let img = image::load_from_memory(bytes)?;
    let (width, height) = img.dimensions();

    if width == 0 || height == 0 {
        return Err(VisionError::Decode("zero-sized frame".to_string()));
    }

    Ok(Frame {
        width,
        height,
        pixels: img.to_rgb8().into_raw(),
    })
}
