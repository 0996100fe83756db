//! Base image decoding.

use image::RgbImage;
use tickettock_common::error::{TicketTockError, TicketTockResult};

/// The uploaded ticket, decoded to opaque RGB at its original size.
///
/// Never mutated after decoding; every frame renders onto its own copy.
#[derive(Debug, Clone)]
pub struct BaseImage {
    pixels: RgbImage,
}

impl BaseImage {
    /// Decode an uploaded image from raw bytes.
    pub fn decode(bytes: &[u8]) -> TicketTockResult<Self> {
        if bytes.is_empty() {
            return Err(TicketTockError::input_decode("upload body is empty"));
        }

        let decoded = image::load_from_memory(bytes)
            .map_err(|e| TicketTockError::input_decode(format!("unreadable image: {e}")))?;
        Self::from_rgb(decoded.to_rgb8())
    }

    /// Wrap an already-decoded raster.
    pub fn from_rgb(pixels: RgbImage) -> TicketTockResult<Self> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(TicketTockError::input_decode("image has zero pixels"));
        }
        Ok(Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }
}
