//! Image format detection.
//!
//! Extracted images are classified by their leading magic bytes only. Anything
//! that is neither PNG nor JPEG is left alone.

pub mod png;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Image formats PIE keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    #[serde(rename = "PNG")]
    Png,
    #[serde(rename = "JPEG")]
    Jpeg,
}

impl ImageFormat {
    /// Get the format name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            ImageFormat::Png => "PNG",
            ImageFormat::Jpeg => "JPEG",
        }
    }

    /// File extension used for extracted images of this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Magic bytes for format detection.
mod magic {
    /// PNG magic bytes: 89 50 4E 47 0D 0A 1A 0A
    pub const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    /// JPEG start-of-image marker: FF D8
    pub const JPEG: &[u8] = &[0xFF, 0xD8];
}

pub(crate) use magic::PNG as PNG_SIGNATURE;

/// Detect image format from magic bytes.
///
/// Returns `None` for unrecognized data, including buffers too short to hold
/// a signature.
pub fn detect_format(data: &[u8]) -> Option<ImageFormat> {
    if data.starts_with(magic::PNG) {
        return Some(ImageFormat::Png);
    }

    if data.starts_with(magic::JPEG) {
        return Some(ImageFormat::Jpeg);
    }

    None
}
