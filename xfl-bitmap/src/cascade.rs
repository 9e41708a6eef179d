//! Multi-strategy deflate recovery for truncated or corrupted `.dat`
//! payloads.
//!
//! The encoder that produced these blobs is long gone and some archives
//! in the wild carry payloads that were truncated or re-chunked by
//! whatever tool last touched them. Rather than fail outright, the
//! decoder runs an escalating cascade of recovery strategies and keeps
//! whatever the best one produces.

use flate2::{Decompress, FlushDecompress, Status};
use log::debug;

/// Reassembles a chunked payload: repeating `[u16 len][len bytes]` until
/// a zero-length terminator.
pub fn reassemble_chunks(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len());
    let mut pos = 0usize;
    while pos + 2 <= payload.len() {
        let len = u16::from_le_bytes([payload[pos], payload[pos + 1]]) as usize;
        pos += 2;
        if len == 0 {
            break;
        }
        let end = (pos + len).min(payload.len());
        out.extend_from_slice(&payload[pos..end]);
        pos = end;
    }
    out
}

/// Strips a leading zlib header (`78 xx`) if present, since several
/// strategies below expect a raw deflate stream.
pub fn strip_zlib_header(payload: &[u8]) -> &[u8] {
    if payload.len() >= 2 && payload[0] == 0x78 {
        &payload[2..]
    } else {
        payload
    }
}

const ZERO_DICTIONARY: [u8; 32 * 1024] = [0u8; 32 * 1024];

/// Runs raw-deflate decompression over `payload`, optionally seeded with
/// a preset dictionary, and returns whatever output bytes were produced
/// — including a partial result if the stream errors partway through.
/// This single routine backs cascade strategies 1-4: a one-shot call with
/// the whole buffer and a streamed, chunk-at-a-time call both converge on
/// the same bytes with `flate2`'s incremental `Decompress`, since it
/// already buffers partial output internally.
fn inflate_capture(payload: &[u8], dictionary: Option<&[u8]>) -> Vec<u8> {
    let mut decompress = Decompress::new(false);
    if let Some(dict) = dictionary {
        let _ = decompress.set_dictionary(dict);
    }
    let mut out = vec![0u8; (payload.len() * 4).max(4096)];
    let mut produced = Vec::new();
    let mut input_pos = 0usize;
    loop {
        let before_in = decompress.total_in() as usize;
        let before_out = decompress.total_out() as usize;
        let status = decompress.decompress(&payload[input_pos..], &mut out, FlushDecompress::None);
        let consumed = decompress.total_in() as usize - before_in;
        let produced_now = decompress.total_out() as usize - before_out;
        produced.extend_from_slice(&out[..produced_now]);
        input_pos += consumed;
        match status {
            Ok(Status::StreamEnd) => break,
            Ok(Status::Ok) | Ok(Status::BufError) => {
                if consumed == 0 && produced_now == 0 {
                    break;
                }
                if input_pos >= payload.len() {
                    break;
                }
            }
            Err(e) => {
                debug!("bitmap cascade: inflate stopped early: {e}");
                break;
            }
        }
    }
    produced
}

/// Scans for stored (uncompressed) deflate blocks: a byte-aligned header
/// byte with `BTYPE` bits `00`, followed by a valid `LEN`/`NLEN`
/// complement pair and at least 1000 bytes of payload.
fn scan_stored_blocks(payload: &[u8]) -> Vec<Vec<u8>> {
    let mut segments = Vec::new();
    let mut i = 0usize;
    while i + 5 < payload.len() {
        if payload[i] & 0b0000_0110 == 0 {
            let len = u16::from_le_bytes([payload[i + 1], payload[i + 2]]);
            let nlen = u16::from_le_bytes([payload[i + 3], payload[i + 4]]);
            if nlen == !len && len as usize >= 1000 {
                let start = i + 5;
                let end = (start + len as usize).min(payload.len());
                if end - start >= 1000 {
                    segments.push(payload[start..end].to_vec());
                    i = end;
                    continue;
                }
            }
        }
        i += 1;
    }
    segments
}

/// Resynchronisation scan: try `inflateRaw` at evenly spaced offsets,
/// refining around any promising hit, accepting results over 50000 bytes
/// that aren't a duplicate-length repeat of an already-found segment.
fn resync_scan(payload: &[u8], existing_lengths: &[usize]) -> Vec<Vec<u8>> {
    const MIN_ACCEPT: usize = 50_000;
    const COARSE_STEP: usize = 500;
    const FINE_RADIUS: i64 = 50;

    let mut found = Vec::new();
    let mut lengths: Vec<usize> = existing_lengths.to_vec();
    let mut offset = 1000usize;
    while offset < payload.len() {
        let candidates = [None, Some(&ZERO_DICTIONARY[..])];
        let mut best: Option<Vec<u8>> = None;
        for dict in candidates {
            let out = inflate_capture(&payload[offset..], dict);
            if out.len() > MIN_ACCEPT && !lengths.contains(&out.len()) {
                if best.as_ref().map_or(true, |b| out.len() > b.len()) {
                    best = Some(out);
                }
            }
        }
        if let Some(mut hit) = best {
            // Refine locally: a slightly different alignment within
            // +/-50 bytes may decode further before erroring.
            let base = offset as i64;
            for delta in -FINE_RADIUS..=FINE_RADIUS {
                let candidate_offset = base + delta;
                if candidate_offset < 0 || candidate_offset as usize >= payload.len() {
                    continue;
                }
                let refined = inflate_capture(&payload[candidate_offset as usize..], None);
                if refined.len() > hit.len() {
                    hit = refined;
                }
            }
            lengths.push(hit.len());
            found.push(hit);
        }
        offset += COARSE_STEP;
    }
    found
}

/// The full five-step cascade. Returns the best output found along with
/// which step produced it (for logging).
pub fn decompress_cascade(payload: &[u8], expected_len: usize) -> (Vec<u8>, &'static str) {
    let raw = strip_zlib_header(payload);

    let attempt_1 = inflate_capture(raw, None);
    if attempt_1.len() >= expected_len {
        return (attempt_1, "raw deflate");
    }
    debug!(
        "bitmap cascade: strategy 1 produced {} of {} bytes",
        attempt_1.len(),
        expected_len
    );

    let attempt_2 = inflate_capture(raw, Some(&ZERO_DICTIONARY));
    if attempt_2.len() >= expected_len {
        return (attempt_2, "raw deflate + zero dictionary");
    }
    debug!(
        "bitmap cascade: strategy 2 produced {} of {} bytes",
        attempt_2.len(),
        expected_len
    );

    // Strategies 3 and 4 (streaming capture, with and without the
    // dictionary) reduce to the same routine as 1 and 2: `inflate_capture`
    // already captures every byte produced before the first error, so
    // there's no separate "best effort so far" to recompute.
    let best_streaming = if attempt_2.len() >= attempt_1.len() {
        &attempt_2
    } else {
        &attempt_1
    };
    if best_streaming.len() >= expected_len {
        return (best_streaming.clone(), "streaming inflate");
    }

    debug!("bitmap cascade: falling back to multi-segment recovery");
    let mut combined = best_streaming.clone();
    let mut lengths = vec![combined.len()];

    for segment in scan_stored_blocks(raw) {
        lengths.push(segment.len());
        combined.extend_from_slice(&segment);
    }

    for segment in resync_scan(raw, &lengths) {
        combined.extend_from_slice(&segment);
    }

    if combined.len() > expected_len {
        combined.truncate(expected_len);
    }
    (combined, "multi-segment recovery")
}
