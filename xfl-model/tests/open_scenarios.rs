//! End-to-end archive-to-document integration tests against the public
//! `xfl_model::open` API.

use std::io::Write;
use xfl_model::{DisplayElement, LayerKind, NullObserver, ParseOptions, TextAlignment};
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
fn masked_layer_and_nested_symbol_resolve_through_a_full_parse() {
    let dom = r##"<DOMDocument width="550" height="400" frameRate="24" backgroundColor="#FFFFFF">
        <timelines><DOMTimeline name="Scene 1"><layers>
          <DOMLayer name="Mask" layerType="mask"><frames></frames></DOMLayer>
          <DOMLayer name="Content" parentLayerIndex="0"><frames><DOMFrame index="0" duration="1"><elements>
            <DOMSymbolInstance libraryItemName="Symbol 1" symbolType="graphic" firstFrame="0">
              <matrix><Matrix a="1" b="0" c="0" d="1" tx="10" ty="20"/></matrix>
            </DOMSymbolInstance>
          </elements></DOMFrame></frames></DOMLayer>
        </layers></DOMTimeline></timelines>
    </DOMDocument>"##;
    let symbol = r#"<DOMSymbolItem name="Symbol 1" itemID="1" symbolType="graphic">
        <timeline><DOMTimeline name="Symbol 1"><layers></layers></DOMTimeline></timeline>
    </DOMSymbolItem>"#;
    let bytes = build_archive(dom, &[("LIBRARY/Symbol 1.xml", symbol)]);

    let mut observer = NullObserver;
    let doc = xfl_model::open(bytes, &ParseOptions::default(), &mut observer).unwrap();

    let timeline = &doc.timelines[0];
    assert_eq!(timeline.layers[0].kind, LayerKind::Mask);
    assert_eq!(timeline.layers[1].kind, LayerKind::Masked);
    assert!(doc.symbols.contains_key("symbol 1"));

    let elements = &timeline.layers[1].frames[0].elements;
    assert_eq!(elements.len(), 1);
    match &elements[0] {
        DisplayElement::Symbol(instance) => {
            assert_eq!(instance.library_item_name, "Symbol 1");
            assert_eq!(instance.matrix.tx, 10.0);
        }
        other => panic!("expected a symbol instance, got {other:?}"),
    }
}

#[test]
fn rich_text_run_metadata_survives_a_full_parse() {
    let dom = r##"<DOMDocument width="550" height="400" frameRate="24" backgroundColor="#FFFFFF">
        <timelines><DOMTimeline name="Scene 1"><layers>
          <DOMLayer name="L1"><frames><DOMFrame index="0" duration="1"><elements>
            <DOMStaticText>
              <matrix><Matrix a="1" b="0" c="0" d="1" tx="0" ty="0"/></matrix>
              <textRuns><DOMTextRun>
                <characters>Hello</characters>
                <textAttrs><DOMTextAttrs face="Arial" size="18" fillColor="#112233" alignment="center"/></textAttrs>
              </DOMTextRun></textRuns>
            </DOMStaticText>
          </elements></DOMFrame></frames></DOMLayer>
        </layers></DOMTimeline></timelines>
    </DOMDocument>"##;
    let bytes = build_archive(dom, &[]);

    let mut observer = NullObserver;
    let doc = xfl_model::open(bytes, &ParseOptions::default(), &mut observer).unwrap();

    let elements = &doc.timelines[0].layers[0].frames[0].elements;
    assert_eq!(elements.len(), 1);
    match &elements[0] {
        DisplayElement::Text(text) => {
            assert_eq!(text.text, "Hello");
            assert_eq!(text.runs.len(), 1);
            let run = &text.runs[0];
            assert_eq!(run.font, "Arial");
            assert_eq!(run.size, 18.0);
            assert_eq!(run.color, "#112233");
            assert_eq!(run.alignment, TextAlignment::Center);
        }
        other => panic!("expected a text element, got {other:?}"),
    }
}
