//! Loads every symbol XML under `LIBRARY/` exactly once, keyed by the
//! symbol's own library name (not its archive path) so a
//! `DOMSymbolInstance`'s `libraryItemName` resolves directly.

use std::collections::HashMap;

use log::{debug, warn};
use xfl_archive::Archive;

use crate::model::Symbol;
use crate::xml_mapper;

pub struct SymbolRegistry {
    entries: HashMap<String, Symbol>,
}

/// Lowercases and replaces backslashes with forward slashes, dropping a
/// leading `LIBRARY/` so `"LIBRARY/Foo"` and `"foo"` key the same. Library
/// item names never carry the `.xml` file extension, only their on-disk
/// path does.
pub fn normalize(path: &str) -> String {
    let slashed = path.replace('\\', "/");
    let trimmed = slashed
        .strip_prefix("LIBRARY/")
        .or_else(|| slashed.strip_prefix("library/"))
        .unwrap_or(&slashed);
    let without_ext = trimmed.strip_suffix(".xml").unwrap_or(trimmed);
    without_ext.to_lowercase()
}

impl SymbolRegistry {
    pub fn load(archive: &mut Archive) -> SymbolRegistry {
        let mut entries = HashMap::new();
        let xml_paths: Vec<String> = archive
            .file_names()
            .into_iter()
            .filter(|name| {
                let lower = name.to_lowercase();
                (lower.starts_with("library/")) && lower.ends_with(".xml")
            })
            .collect();

        for path in xml_paths {
            let bytes = match archive.read(&path) {
                Ok(b) => b,
                Err(e) => {
                    warn!("symbol registry: could not read {path}: {e}");
                    continue;
                }
            };
            let text = match std::str::from_utf8(&bytes) {
                Ok(t) => t,
                Err(e) => {
                    warn!("symbol registry: {path} is not valid UTF-8: {e}");
                    continue;
                }
            };
            match xml_mapper::parse_symbol_item(text) {
                Ok(symbol) => {
                    debug!("symbol registry: loaded {path}");
                    // Cache under both the path-derived key (tolerates
                    // archives that never authored a `name` attribute) and
                    // the symbol's own declared name, which is what
                    // `DOMSymbolInstance.libraryItemName` actually references.
                    entries.insert(normalize(&path), symbol.clone());
                    entries.insert(normalize(&symbol.name), symbol);
                }
                Err(e) => warn!("symbol registry: could not parse {path}: {e}"),
            }
        }

        SymbolRegistry { entries }
    }

    /// Looks up by the name as authored, falling back to a
    /// case/slash-normalised comparison.
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.entries
            .get(name)
            .or_else(|| self.entries.get(&normalize(name)))
    }

    pub fn into_map(self) -> HashMap<String, Symbol> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_library_prefix_extension_and_case() {
        assert_eq!(normalize("LIBRARY/Foo Bar.xml"), "foo bar");
        assert_eq!(normalize("library\\Foo Bar.xml"), "foo bar");
        assert_eq!(normalize("Foo Bar.xml"), "foo bar");
        assert_eq!(normalize("Foo Bar"), "foo bar");
    }
}
