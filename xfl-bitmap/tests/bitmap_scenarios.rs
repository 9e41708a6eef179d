//! Pins the literal lossless-bitmap decode scenario against the public
//! `xfl_bitmap` API.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;
use xfl_bitmap::decode_bitmap;

const HEADER_LEN: usize = 26;

fn build_header(magic: [u8; 2], width: u16, height: u16, has_alpha: u8, chunked: u8) -> Vec<u8> {
    let mut h = vec![0u8; HEADER_LEN];
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
fn two_by_two_red_opaque_bitmap_decodes_to_rgba() {
    // 2x2 fully-opaque red, stored as 32-bit premultiplied ABGR.
    let mut pixels = Vec::new();
    for _ in 0..4 {
        pixels.extend_from_slice(&[255u8, 0, 0, 255]); // A, B, G, R
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
