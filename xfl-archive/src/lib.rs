#![allow(dead_code)]

//! Opens an XFL/FLA ZIP container and offers case/slash-insensitive entry
//! lookup, repairing a handful of central-directory corruptions commonly
//! seen in archives that were re-saved or truncated by third-party tools.

use log::{debug, warn};
use std::error;
use std::fmt;
use std::io::Cursor;

#[derive(Debug)]
pub enum ArchiveError {
    /// The ZIP could not be opened even after both repair attempts.
    Malformed { reason: String },
    /// `read` was asked for a path with no matching entry, under any of
    /// the case/slash variants tried.
    EntryNotFound { path: String },
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArchiveError::Malformed { reason } => write!(f, "malformed archive: {reason}"),
            ArchiveError::EntryNotFound { path } => write!(f, "entry not found: {path}"),
        }
    }
}

impl error::Error for ArchiveError {}

const EOCD_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];
const EOCD_LEN: usize = 22;

/// Scans `bytes` backwards for the End-of-Central-Directory signature and
/// returns its offset, if present. EOCD records are small and always near
/// the tail, so scanning from the end is both correct (a ZIP comment can
/// legally embed the signature bytes, but the last occurrence is always
/// the real record when no further bytes follow a proper comment) and
/// fast in practice.
fn find_eocd(bytes: &[u8]) -> Option<usize> {
    if bytes.len() < EOCD_LEN {
        return None;
    }
    let mut i = bytes.len() - EOCD_LEN;
    loop {
        if bytes[i..i + 4] == EOCD_SIGNATURE {
            return Some(i);
        }
        if i == 0 {
            return None;
        }
        i -= 1;
    }
}

/// Repair 1: truncate trailing garbage past the comment-terminated EOCD.
fn repair_truncate(bytes: &[u8]) -> Option<Vec<u8>> {
    let eocd = find_eocd(bytes)?;
    let comment_len = u16::from_le_bytes([bytes[eocd + 20], bytes[eocd + 21]]) as usize;
    let expected_end = eocd + EOCD_LEN + comment_len;
    if expected_end < bytes.len() {
        Some(bytes[..expected_end].to_vec())
    } else {
        None
    }
}

/// Repair 2: patch a central-directory size field that disagrees with the
/// distance between the recorded `cdOffset` and the EOCD record itself.
fn repair_patch_cd_size(bytes: &[u8]) -> Option<Vec<u8>> {
    let eocd = find_eocd(bytes)?;
    let cd_size = u32::from_le_bytes([
        bytes[eocd + 12],
        bytes[eocd + 13],
        bytes[eocd + 14],
        bytes[eocd + 15],
    ]) as usize;
    let cd_offset = u32::from_le_bytes([
        bytes[eocd + 16],
        bytes[eocd + 17],
        bytes[eocd + 18],
        bytes[eocd + 19],
    ]) as usize;
    if eocd < cd_offset {
        return None;
    }
    let computed = eocd - cd_offset;
    if computed == cd_size {
        return None;
    }
    let mut patched = bytes.to_vec();
    patched[eocd + 12..eocd + 16].copy_from_slice(&(computed as u32).to_le_bytes());
    Some(patched)
}

pub struct Archive {
    inner: zip::ZipArchive<Cursor<Vec<u8>>>,
}

impl Archive {
    /// Opens `bytes` as a ZIP, applying the repair cascade on failure.
    pub fn open(bytes: Vec<u8>) -> Result<Archive, ArchiveError> {
        match zip::ZipArchive::new(Cursor::new(bytes.clone())) {
            Ok(inner) => return Ok(Archive { inner }),
            Err(e) => debug!("archive: initial zip open failed: {e}"),
        }

        if let Some(truncated) = repair_truncate(&bytes) {
            match zip::ZipArchive::new(Cursor::new(truncated)) {
                Ok(inner) => {
                    warn!("archive: recovered via EOCD-truncation repair");
                    return Ok(Archive { inner });
                }
                Err(e) => debug!("archive: truncation repair did not open: {e}"),
            }
        }

        if let Some(patched) = repair_patch_cd_size(&bytes) {
            match zip::ZipArchive::new(Cursor::new(patched)) {
                Ok(inner) => {
                    warn!("archive: recovered via central-directory-size patch");
                    return Ok(Archive { inner });
                }
                Err(e) => debug!("archive: cd-size patch repair did not open: {e}"),
            }
        }

        Err(ArchiveError::Malformed {
            reason: "central directory unreadable after both repair attempts".to_string(),
        })
    }

    /// All entry names, in archive order.
    pub fn file_names(&self) -> Vec<String> {
        self.inner.file_names().map(|s| s.to_string()).collect()
    }

    /// Reads an entry's bytes, trying the requested path verbatim, then a
    /// handful of case/slash variants, then finally any entry whose
    /// basename matches case-insensitively.
    pub fn read(&mut self, path: &str) -> Result<Vec<u8>, ArchiveError> {
        for candidate in lookup_candidates(path, &self.file_names()) {
            if let Ok(mut entry) = self.inner.by_name(&candidate) {
                let mut buf = Vec::with_capacity(entry.size() as usize);
                use std::io::Read;
                if entry.read_to_end(&mut buf).is_ok() {
                    return Ok(buf);
                }
            }
        }
        Err(ArchiveError::EntryNotFound {
            path: path.to_string(),
        })
    }
}

fn swap_separators(path: &str) -> String {
    path.chars()
        .map(|c| match c {
            '/' => '\\',
            '\\' => '/',
            other => other,
        })
        .collect()
}

/// Builds the ordered list of lookup attempts for a requested path: exact
/// match first, then increasingly tolerant variants, then a basename
/// fallback scan over every entry in the archive.
fn lookup_candidates(path: &str, entries: &[String]) -> Vec<String> {
    let mut tried = Vec::new();
    let mut candidates = Vec::new();

    let mut push = |tried: &mut Vec<String>, candidates: &mut Vec<String>, value: String| {
        if !tried.contains(&value) {
            tried.push(value.clone());
            candidates.push(value);
        }
    };

    push(&mut tried, &mut candidates, path.to_string());
    push(&mut tried, &mut candidates, swap_separators(path));
    push(&mut tried, &mut candidates, path.to_lowercase());
    push(&mut tried, &mut candidates, swap_separators(path).to_lowercase());

    if !path.starts_with("LIBRARY/") && !path.starts_with("library/") {
        push(&mut tried, &mut candidates, format!("LIBRARY/{path}"));
        push(
            &mut tried,
            &mut candidates,
            format!("LIBRARY/{}", path.to_lowercase()),
        );
    }

    let basename = path.rsplit(['/', '\\']).next().unwrap_or(path).to_lowercase();
    for entry in entries {
        let entry_basename = entry.rsplit(['/', '\\']).next().unwrap_or(entry).to_lowercase();
        if entry_basename == basename {
            push(&mut tried, &mut candidates, entry.clone());
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options = FileOptions::default().compression_method(zip::CompressionMethod::Stored);
            for (name, data) in entries {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
            writer.finish().unwrap();
        }
        buf
    }

    #[test]
    fn opens_well_formed_zip() {
        let bytes = build_zip(&[("DOMDocument.xml", b"<DOMDocument/>")]);
        let mut archive = Archive::open(bytes).unwrap();
        let data = archive.read("DOMDocument.xml").unwrap();
        assert_eq!(data, b"<DOMDocument/>");
    }

    #[test]
    fn lookup_is_case_and_slash_insensitive() {
        let bytes = build_zip(&[("LIBRARY/Symbol 1.xml", b"<DOMSymbolItem/>")]);
        let mut archive = Archive::open(bytes).unwrap();
        assert!(archive.read("library/symbol 1.xml").is_ok());
        assert!(archive.read("LIBRARY\\Symbol 1.xml").is_ok());
    }

    #[test]
    fn lookup_falls_back_to_basename_scan() {
        let bytes = build_zip(&[("LIBRARY/nested/Symbol 1.xml", b"<DOMSymbolItem/>")]);
        let mut archive = Archive::open(bytes).unwrap();
        assert!(archive.read("Symbol 1.xml").is_ok());
    }

    #[test]
    fn missing_entry_reports_not_found() {
        let bytes = build_zip(&[("DOMDocument.xml", b"<DOMDocument/>")]);
        let mut archive = Archive::open(bytes).unwrap();
        assert!(matches!(
            archive.read("missing.xml"),
            Err(ArchiveError::EntryNotFound { .. })
        ));
    }

    #[test]
    fn truncation_repair_recovers_archive_with_trailing_garbage() {
        let mut bytes = build_zip(&[("DOMDocument.xml", b"<DOMDocument/>")]);
        bytes.extend_from_slice(b"\x00\x00\x00trailing garbage appended by some tool");
        let mut archive = Archive::open(bytes).unwrap();
        assert!(archive.read("DOMDocument.xml").is_ok());
    }
}
