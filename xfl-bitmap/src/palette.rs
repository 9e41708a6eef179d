//! 8-bit palette (`03 03`) bitmap decoding.

/// `paletteCount` entries of (A,B,G,R); `hasAlpha=0` forces A=255.
pub fn decode_palette_entries(bytes: &[u8], count: usize, has_alpha: bool) -> Vec<[u8; 4]> {
    let mut entries = Vec::with_capacity(count);
    for chunk in bytes.chunks_exact(4).take(count) {
        let a = if has_alpha { chunk[0] } else { 255 };
        entries.push([chunk[3], chunk[2], chunk[1], a]); // RGBA
    }
    entries
}

/// Expands one byte per pixel into RGBA8 using the palette. Indices
/// outside the palette resolve to opaque black.
pub fn expand_indices(indices: &[u8], palette: &[[u8; 4]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(indices.len() * 4);
    for &index in indices {
        let rgba = palette
            .get(index as usize)
            .copied()
            .unwrap_or([0, 0, 0, 255]);
        out.extend_from_slice(&rgba);
    }
    out
}
