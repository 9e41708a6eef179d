#![allow(dead_code)]

//! Builds a renderable scene-graph [`Document`] from an XFL/FLA archive.

use std::error;
use std::fmt;

use log::{debug, info, warn};

use xfl_archive::{Archive, ArchiveError};

pub mod filters;
pub mod model;
mod symbol_registry;
mod xml_mapper;

pub use model::*;
pub use symbol_registry::SymbolRegistry;
pub use xml_mapper::MapperError;

/// Feature flags and behavioural toggles for [`open`].
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Skip decoding `.dat` bitmap payloads; `BitmapItem`s carry metadata
    /// only.
    pub skip_bitmaps: bool,
    /// Experimental: insert a synthetic `MoveTo` after `Close` at the
    /// subpath start when the next drawing command implies one.
    pub enable_implicit_move_after_close: bool,
    /// Experimental: split an `Edge` at its `S` style-change markers so
    /// each sub-edge carries a single style.
    pub enable_edge_splitting_on_style_change: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            skip_bitmaps: false,
            enable_implicit_move_after_close: false,
            enable_edge_splitting_on_style_change: false,
        }
    }
}

/// Notified at suspension points during parsing. The default
/// implementation never cancels and ignores progress notifications; hosts
/// (GUI, CLI, server request loop) override only what they need.
///
/// The core is single-threaded and cooperative rather than `async`: a
/// long parse yields to its caller only at these explicit checkpoints, so
/// a plain trait object does the job without pulling in a runtime.
pub trait ParseObserver {
    fn on_archive_entry(&mut self, _name: &str) {}
    fn on_symbol_loaded(&mut self, _name: &str) {}
    fn on_bitmap_decoded(&mut self, _name: &str) {}
    fn on_recovery_scan_step(&mut self, _payload_offset: usize) {}

    /// Checked at every suspension point; returning `true` aborts parsing
    /// with [`ParseError::Cancelled`].
    fn should_cancel(&mut self) -> bool {
        false
    }
}

/// An observer that never cancels and does nothing with progress.
pub struct NullObserver;
impl ParseObserver for NullObserver {}

#[derive(Debug)]
pub enum ParseError {
    Archive(ArchiveError),
    /// `DOMDocument.xml` was absent or failed to parse. Fatal.
    Malformed { reason: String },
    Cancelled,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::Archive(e) => write!(f, "archive error: {e}"),
            ParseError::Malformed { reason } => write!(f, "malformed document: {reason}"),
            ParseError::Cancelled => write!(f, "parsing cancelled"),
        }
    }
}

impl error::Error for ParseError {}

impl From<ArchiveError> for ParseError {
    fn from(e: ArchiveError) -> Self {
        ParseError::Archive(e)
    }
}

/// Full parse: opens the archive, maps `DOMDocument.xml`, loads every
/// library symbol, and (unless `skip_bitmaps`) decodes every referenced
/// bitmap. Always returns a structurally valid `Document` on success —
/// individual symbol or bitmap failures are logged and skipped rather
/// than propagated, per the `RecoverableMalformedData` policy.
pub fn open(
    archive_bytes: Vec<u8>,
    options: &ParseOptions,
    observer: &mut dyn ParseObserver,
) -> Result<Document, ParseError> {
    let mut archive = Archive::open(archive_bytes)?;

    if observer.should_cancel() {
        return Err(ParseError::Cancelled);
    }

    let dom_bytes = archive.read("DOMDocument.xml").map_err(|e| ParseError::Malformed {
        reason: format!("could not read DOMDocument.xml: {e}"),
    })?;
    let dom_text = std::str::from_utf8(&dom_bytes).map_err(|e| ParseError::Malformed {
        reason: format!("DOMDocument.xml is not valid UTF-8: {e}"),
    })?;
    let meta = xml_mapper::parse_document(dom_text).map_err(|e| ParseError::Malformed {
        reason: e.to_string(),
    })?;
    observer.on_archive_entry("DOMDocument.xml");

    if observer.should_cancel() {
        return Err(ParseError::Cancelled);
    }

    let registry = SymbolRegistry::load(&mut archive);
    let symbols = registry.into_map();
    for name in symbols.keys() {
        observer.on_symbol_loaded(name);
    }

    if observer.should_cancel() {
        return Err(ParseError::Cancelled);
    }

    let mut bitmaps = std::collections::HashMap::new();
    for mut item in meta.bitmaps {
        if !options.skip_bitmaps {
            if let Some(href) = item.bitmap_data_href.clone() {
                match load_raster(&mut archive, &href) {
                    Ok(raster) => item.raster = Some(raster),
                    Err(e) => warn!("bitmap {}: {e}", item.name),
                }
            }
            observer.on_bitmap_decoded(&item.name);
            if observer.should_cancel() {
                return Err(ParseError::Cancelled);
            }
        }
        bitmaps.insert(item.name.clone(), item);
    }

    let sounds = meta
        .sounds
        .into_iter()
        .map(|s| (s.name.clone(), s))
        .collect();
    let videos = meta
        .videos
        .into_iter()
        .map(|v| (v.name.clone(), v))
        .collect();

    info!(
        "parsed document: {} layers, {} symbols, {} bitmaps",
        meta.timeline.layers.len(),
        symbols.len(),
        bitmaps.len()
    );

    Ok(Document {
        width: meta.width,
        height: meta.height,
        frame_rate: meta.frame_rate,
        background_color: meta.background_color,
        timelines: vec![meta.timeline],
        symbols,
        bitmaps,
        sounds,
        videos,
    })
}

fn load_raster(archive: &mut Archive, href: &str) -> Result<xfl_bitmap::Raster, String> {
    let candidates = [href.to_string(), format!("bin/{href}"), format!("LIBRARY/{href}")];
    for candidate in candidates {
        if let Ok(bytes) = archive.read(&candidate) {
            debug!("decoding bitmap payload at {candidate}");
            return xfl_bitmap::decode_bitmap(&bytes).map_err(|e| e.to_string());
        }
    }
    Err(format!("no archive entry found for bitmap href {href}"))
}

/// A single drawable record in accumulated paint order, as produced for
/// the renderer by the (separately-crated) frame resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedElement {
    pub matrix: Matrix,
    pub color_transform: ColorTransform,
    pub blend_mode: String,
    pub filters: Vec<Filter>,
    pub element: DisplayElement,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn build_archive(dom_xml: &str, library: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            let options = FileOptions::default().compression_method(zip::CompressionMethod::Stored);
            writer.start_file("DOMDocument.xml", options).unwrap();
            writer.write_all(dom_xml.as_bytes()).unwrap();
            for (path, contents) in library {
                writer.start_file(*path, options).unwrap();
                writer.write_all(contents.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        buf
    }

    #[test]
    fn open_builds_document_with_symbols() {
        let dom = r##"<DOMDocument width="550" height="400" frameRate="24" backgroundColor="#FFFFFF">
            <timelines><DOMTimeline name="Scene 1"><layers>
              <DOMLayer name="L1"><frames><DOMFrame index="0" duration="1"><elements>
                <DOMSymbolInstance libraryItemName="Symbol 1" symbolType="graphic" firstFrame="0">
                  <matrix><Matrix a="1" b="0" c="0" d="1" tx="0" ty="0"/></matrix>
                </DOMSymbolInstance>
              </elements></DOMFrame></frames></DOMLayer>
            </layers></DOMTimeline></timelines>
        </DOMDocument>"##;
        let symbol = r#"<DOMSymbolItem name="Symbol 1" itemID="1" symbolType="graphic">
            <timeline><DOMTimeline name="Symbol 1"><layers></layers></DOMTimeline></timeline>
        </DOMSymbolItem>"#;
        let bytes = build_archive(dom, &[("LIBRARY/Symbol 1.xml", symbol)]);

        let mut observer = NullObserver;
        let doc = open(bytes, &ParseOptions::default(), &mut observer).unwrap();
        assert_eq!(doc.width, 550.0);
        assert_eq!(doc.timelines.len(), 1);
        assert!(doc.symbols.contains_key("symbol 1"));
    }

    #[test]
    fn missing_dom_document_is_fatal() {
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            let options = FileOptions::default().compression_method(zip::CompressionMethod::Stored);
            writer.start_file("README.txt", options).unwrap();
            writer.write_all(b"not an xfl archive").unwrap();
            writer.finish().unwrap();
        }
        let mut observer = NullObserver;
        assert!(matches!(
            open(buf, &ParseOptions::default(), &mut observer),
            Err(ParseError::Malformed { .. })
        ));
    }

    struct CancelImmediately;
    impl ParseObserver for CancelImmediately {
        fn should_cancel(&mut self) -> bool {
            true
        }
    }

    #[test]
    fn cancellation_predicate_aborts_parsing() {
        let dom = r#"<DOMDocument width="1" height="1"><timelines><DOMTimeline name="Scene 1"><layers></layers></DOMTimeline></timelines></DOMDocument>"#;
        let bytes = build_archive(dom, &[]);
        let mut observer = CancelImmediately;
        assert!(matches!(
            open(bytes, &ParseOptions::default(), &mut observer),
            Err(ParseError::Cancelled)
        ));
    }
}
