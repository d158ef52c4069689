//! PNG container assembly.
//!
//! A PDF image stored with `FlateDecode` and a PNG predictor (`/Predictor` 10
//! to 15) already holds exactly what a PNG `IDAT` chunk holds: a zlib stream of
//! scanlines, each prefixed with its filter type byte. Wrapping that stream in
//! a signature, an `IHDR` and an `IEND` yields a valid PNG without touching
//! the pixel data.
//!
//! Each chunk has:
//! - 4 bytes: length (big-endian)
//! - 4 bytes: chunk type (ASCII)
//! - N bytes: data
//! - 4 bytes: CRC32 over type and data

use super::PNG_SIGNATURE;

/// PNG colour types PIE can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorType {
    Gray,
    Rgb,
}

impl ColorType {
    /// Colour type byte in `IHDR`.
    fn code(self) -> u8 {
        match self {
            ColorType::Gray => 0,
            ColorType::Rgb => 2,
        }
    }

    /// Number of samples per pixel.
    pub fn channels(self) -> u8 {
        match self {
            ColorType::Gray => 1,
            ColorType::Rgb => 3,
        }
    }

    /// Map a PDF colour space name to a PNG colour type.
    pub fn from_color_space(name: &[u8]) -> Option<Self> {
        match name {
            b"DeviceGray" | b"G" | b"CalGray" => Some(ColorType::Gray),
            b"DeviceRGB" | b"RGB" | b"CalRGB" => Some(ColorType::Rgb),
            _ => None,
        }
    }

    /// Bit depths PNG allows for this colour type.
    fn allows_bit_depth(self, depth: u8) -> bool {
        match self {
            ColorType::Gray => matches!(depth, 1 | 2 | 4 | 8 | 16),
            ColorType::Rgb => matches!(depth, 8 | 16),
        }
    }
}

/// Geometry of a raster image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterLayout {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: ColorType,
}

impl RasterLayout {
    /// Whether this layout can be expressed as a non-interlaced PNG.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.color_type.allows_bit_depth(self.bit_depth)
    }

    fn ihdr(&self) -> [u8; 13] {
        let mut data = [0u8; 13];
        data[0..4].copy_from_slice(&self.width.to_be_bytes());
        data[4..8].copy_from_slice(&self.height.to_be_bytes());
        data[8] = self.bit_depth;
        data[9] = self.color_type.code();
        // Compression, filter method and interlace are all zero.
        data
    }
}

/// A PNG chunk.
#[derive(Debug)]
struct Chunk<'a> {
    chunk_type: [u8; 4],
    data: &'a [u8],
}

impl<'a> Chunk<'a> {
    /// Calculate the CRC for this chunk.
    fn calculate_crc(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.chunk_type);
        hasher.update(self.data);
        hasher.finalize()
    }

    /// Write the chunk to a buffer.
    fn write_to(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        output.extend_from_slice(&self.chunk_type);
        output.extend_from_slice(self.data);
        output.extend_from_slice(&self.calculate_crc().to_be_bytes());
    }
}

/// Wrap a zlib stream of predictor-filtered scanlines in a PNG container.
///
/// Returns `None` if the layout cannot be expressed as PNG.
pub fn wrap_idat(layout: &RasterLayout, zlib_data: &[u8]) -> Option<Vec<u8>> {
    if !layout.is_valid() || zlib_data.is_empty() {
        return None;
    }

    // Signature + three chunk headers/CRCs + IHDR body + IDAT body.
    let mut output = Vec::with_capacity(PNG_SIGNATURE.len() + 3 * 12 + 13 + zlib_data.len());
    output.extend_from_slice(PNG_SIGNATURE);

    let ihdr = layout.ihdr();
    Chunk {
        chunk_type: *b"IHDR",
        data: &ihdr,
    }
    .write_to(&mut output);
    Chunk {
        chunk_type: *b"IDAT",
        data: zlib_data,
    }
    .write_to(&mut output);
    Chunk {
        chunk_type: *b"IEND",
        data: &[],
    }
    .write_to(&mut output);

    Some(output)
}
