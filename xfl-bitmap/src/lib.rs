#![allow(dead_code)]

//! Decoder for the proprietary lossless `.dat` bitmap format: a 32-bit
//! premultiplied-ABGR raster or an 8-bit palette raster, both wrapped in
//! a chunked-or-not deflate payload that may be truncated or corrupted.

use log::{info, warn};
use std::error;
use std::fmt;

mod cascade;
mod header;
mod palette;

use header::Magic;
pub use header::{parse_header, Header, HeaderError};

#[derive(Debug)]
pub enum BitmapError {
    InvalidHeader(HeaderError),
    DecompressionFailed { produced: usize, expected: usize },
}

impl fmt::Display for BitmapError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BitmapError::InvalidHeader(e) => write!(f, "invalid bitmap header: {e}"),
            BitmapError::DecompressionFailed { produced, expected } => write!(
                f,
                "decompression recovery exhausted: produced {produced} of {expected} bytes"
            ),
        }
    }
}

impl error::Error for BitmapError {}

impl From<HeaderError> for BitmapError {
    fn from(e: HeaderError) -> Self {
        BitmapError::InvalidHeader(e)
    }
}

/// A decoded raster. `height` may be smaller than the header's declared
/// height when decompression recovery fell short: a partially decoded
/// image is still returned, cropped to whole rows, rather than discarded
/// (per spec, `BitmapRecoveryFailed` is reserved for recovering less than
/// one pixel's worth of data).
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    /// RGBA8, row-major, `height` rows of `width * 4` bytes each.
    pub rgba: Vec<u8>,
}

fn unpremultiply(a: u8, b: u8, g: u8, r: u8) -> [u8; 4] {
    if a == 0 || a == 255 {
        [r, g, b, a]
    } else {
        let scale = |c: u8| -> u8 {
            let v = (c as u32 * 256) / a as u32;
            v.min(255) as u8
        };
        [scale(r), scale(g), scale(b), a]
    }
}

fn decode_rgba32(pixels: &[u8], width: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels.len());
    for chunk in pixels.chunks_exact(4) {
        let (a, b, g, r) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        out.extend_from_slice(&unpremultiply(a, b, g, r));
    }
    // width is only used to let callers compute stride; the function
    // itself is stride-agnostic since every pixel is already a packed
    // ABGR quad.
    let _ = width;
    out
}

/// Decode a `.dat` byte blob into an RGBA8 raster.
pub fn decode_bitmap(bytes: &[u8]) -> Result<Raster, BitmapError> {
    let header = parse_header(bytes)?;
    let payload_bytes = &bytes[header::HEADER_LEN..];
    let raw_payload = if header.chunked {
        cascade::reassemble_chunks(payload_bytes)
    } else {
        payload_bytes.to_vec()
    };

    let width = header.width as u32;
    let height = header.height as u32;

    match header.magic {
        Magic::Rgba32 => {
            let expected = (width as usize) * (height as usize) * 4;
            let (decompressed, strategy) = cascade::decompress_cascade(&raw_payload, expected);
            if decompressed.len() < expected {
                warn!(
                    "bitmap decode: {strategy} produced {} of {expected} bytes, reducing height",
                    decompressed.len()
                );
            } else {
                info!("bitmap decode: {strategy} produced the expected {expected} bytes");
            }
            if decompressed.len() < 4 * width as usize {
                return Err(BitmapError::DecompressionFailed {
                    produced: decompressed.len(),
                    expected,
                });
            }
            let usable_rows = decompressed.len() / (4 * width.max(1) as usize);
            let usable_len = usable_rows * 4 * width as usize;
            let rgba = decode_rgba32(&decompressed[..usable_len], width);
            Ok(Raster {
                width,
                height: usable_rows as u32,
                rgba,
            })
        }
        Magic::Palette8 => {
            if raw_payload.len() < 2 {
                return Err(BitmapError::DecompressionFailed {
                    produced: 0,
                    expected: 2,
                });
            }
            let palette_count =
                u16::from_le_bytes([raw_payload[0], raw_payload[1]]) as usize;
            let palette_bytes = palette_count * 4;
            if raw_payload.len() < 2 + palette_bytes {
                return Err(BitmapError::DecompressionFailed {
                    produced: raw_payload.len(),
                    expected: 2 + palette_bytes,
                });
            }
            let palette = palette::decode_palette_entries(
                &raw_payload[2..2 + palette_bytes],
                palette_count,
                header.has_alpha,
            );
            let expected_indices = (width as usize) * (height as usize);
            let index_payload = &raw_payload[2 + palette_bytes..];
            let (decompressed, strategy) =
                cascade::decompress_cascade(index_payload, expected_indices);
            if decompressed.len() < expected_indices {
                warn!(
                    "bitmap decode: {strategy} produced {} of {expected_indices} index bytes, reducing height",
                    decompressed.len()
                );
            }
            if decompressed.len() < width as usize {
                return Err(BitmapError::DecompressionFailed {
                    produced: decompressed.len(),
                    expected: expected_indices,
                });
            }
            let usable_rows = decompressed.len() / width.max(1) as usize;
            let usable_len = usable_rows * width as usize;
            let rgba = palette::expand_indices(&decompressed[..usable_len], &palette);
            Ok(Raster {
                width,
                height: usable_rows as u32,
                rgba,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn build_header(magic: [u8; 2], width: u16, height: u16, has_alpha: u8, chunked: u8) -> Vec<u8> {
        let mut h = vec![0u8; header::HEADER_LEN];
        h[0] = magic[0];
        h[1] = magic[1];
        h[2..4].copy_from_slice(&(width * 4).to_le_bytes());
        h[4..6].copy_from_slice(&width.to_le_bytes());
        h[6..8].copy_from_slice(&height.to_le_bytes());
        h[24] = has_alpha;
        h[25] = chunked;
        h
    }

    fn zlib_compress(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn scenario_2x2_red_opaque() {
        // 2x2 red, ABGR bytes, opaque (alpha=255, not premultiplied at
        // full alpha).
        let mut pixels = Vec::new();
        for _ in 0..4 {
            pixels.extend_from_slice(&[255u8, 0, 0, 255]); // A,B,G,R
        }
        let compressed = zlib_compress(&pixels);
        let mut bytes = build_header([0x03, 0x05], 2, 2, 0, 0);
        bytes.extend_from_slice(&compressed);

        let raster = decode_bitmap(&bytes).unwrap();
        assert_eq!(raster.width, 2);
        assert_eq!(raster.height, 2);
        assert_eq!(
            raster.rgba,
            vec![255, 0, 0, 255, 255, 0, 0, 255, 255, 0, 0, 255, 255, 0, 0, 255]
        );
    }

    #[test]
    fn chunked_payload_reassembles_before_inflate() {
        let pixels: Vec<u8> = (0..(4 * 4 * 4)).map(|i| (i % 256) as u8).collect();
        let compressed = zlib_compress(&pixels);
        let mut payload = Vec::new();
        for chunk in compressed.chunks(7) {
            payload.extend_from_slice(&(chunk.len() as u16).to_le_bytes());
            payload.extend_from_slice(chunk);
        }
        payload.extend_from_slice(&0u16.to_le_bytes());

        let mut bytes = build_header([0x03, 0x05], 4, 4, 1, 1);
        bytes.extend_from_slice(&payload);

        let raster = decode_bitmap(&bytes).unwrap();
        assert_eq!(raster.width, 4);
        assert_eq!(raster.height, 4);
    }

    #[test]
    fn unpremultiply_scales_color_channels() {
        // Premultiplied 128 alpha, stored color 64 -> true color ~128.
        let out = unpremultiply(128, 64, 64, 64);
        assert_eq!(out[3], 128);
        assert_eq!(out[0], 128);
    }

    #[test]
    fn palette_indices_out_of_range_resolve_opaque_black() {
        let palette_entries = palette::decode_palette_entries(&[255, 0, 0, 200], 1, true);
        let expanded = palette::expand_indices(&[0, 5], &palette_entries);
        assert_eq!(&expanded[0..4], &[200, 0, 0, 255]);
        assert_eq!(&expanded[4..8], &[0, 0, 0, 255]);
    }

    #[test]
    fn invalid_magic_is_rejected() {
        let bytes = build_header([0x00, 0x00], 1, 1, 0, 0);
        assert!(matches!(
            decode_bitmap(&bytes),
            Err(BitmapError::InvalidHeader(_))
        ));
    }

    #[test]
    fn truncated_stream_reduces_height_instead_of_failing() {
        // Only the first row's worth of pixels compresses cleanly; the
        // rest of the declared height is unrecoverable.
        let mut pixels = Vec::new();
        for _ in 0..4 {
            pixels.extend_from_slice(&[255u8, 10, 20, 30]);
        }
        let compressed = zlib_compress(&pixels);
        let mut bytes = build_header([0x03, 0x05], 4, 10, 1, 0);
        bytes.extend_from_slice(&compressed);

        let raster = decode_bitmap(&bytes).unwrap();
        assert_eq!(raster.width, 4);
        assert!(raster.height < 10);
        assert!(raster.height >= 1);
    }
}
