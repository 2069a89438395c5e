//! Photoshop documents (PSD and large-document PSB).

use image::{DynamicImage, RgbaImage};
use std::io::Read;
use std::path::Path;

const SIGNATURE: &[u8; 4] = b"8BPS";
const HEADER_LEN: usize = 26;

pub fn is_photoshop_extension(extension: &str) -> bool {
    matches!(extension, "psd" | "psb")
}

/// Width and height from the fixed-size file header.
///
/// Layout: signature (4), version (2, 1 = PSD, 2 = PSB), reserved (6),
/// channels (2), height (4, BE), width (4, BE), depth (2), color mode (2).
pub fn header_dimensions(mut reader: impl Read) -> Option<(u32, u32)> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).ok()?;

    if &header[0..4] != SIGNATURE {
        return None;
    }
    let version = u16::from_be_bytes([header[4], header[5]]);
    if version != 1 && version != 2 {
        return None;
    }

    let height = u32::from_be_bytes([header[14], header[15], header[16], header[17]]);
    let width = u32::from_be_bytes([header[18], header[19], header[20], header[21]]);
    if width == 0 || height == 0 {
        return None;
    }
    Some((width, height))
}

/// Decode the flattened composite image stored after the layer data
pub fn decode_composite(path: &Path) -> Result<DynamicImage, String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    let document = ::psd::Psd::from_bytes(&bytes).map_err(|e| e.to_string())?;
    let (width, height) = (document.width(), document.height());

    RgbaImage::from_raw(width, height, document.rgba())
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| format!("composite buffer does not match {}x{}", width, height))
}

#[cfg(test)]
pub(crate) fn header_bytes(version: u16, width: u32, height: u32) -> Vec<u8> {
    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(SIGNATURE);
    header.extend_from_slice(&version.to_be_bytes());
    header.extend_from_slice(&[0; 6]);
    header.extend_from_slice(&3u16.to_be_bytes());
    header.extend_from_slice(&height.to_be_bytes());
    header.extend_from_slice(&width.to_be_bytes());
    header.extend_from_slice(&8u16.to_be_bytes());
    header.extend_from_slice(&3u16.to_be_bytes());
    header
}
