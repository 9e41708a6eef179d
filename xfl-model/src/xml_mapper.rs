//! Walks a DOM-shaped XFL XML tree (`DOMDocument.xml`, library symbol
//! XMLs) into the typed scene-graph records in [`crate::model`].

use std::collections::HashSet;
use std::error;
use std::fmt;

use roxmltree::{Document as XmlDoc, Node};

use crate::filters::{
    color_matrix_from_adjustments, color_transform_from_brightness, color_transform_from_tint,
    normalize_strength,
};
use crate::model::*;

#[derive(Debug)]
pub enum MapperError {
    Xml(roxmltree::Error),
    MissingRoot { expected: &'static str },
}

impl fmt::Display for MapperError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MapperError::Xml(e) => write!(f, "xml parse error: {e}"),
            MapperError::MissingRoot { expected } => {
                write!(f, "expected root element <{expected}>")
            }
        }
    }
}

impl error::Error for MapperError {}

impl From<roxmltree::Error> for MapperError {
    fn from(e: roxmltree::Error) -> Self {
        MapperError::Xml(e)
    }
}

const CAMERA_NAMES: [&str; 4] = ["ramka", "camera", "cam", "viewport"];

pub struct DocumentMeta {
    pub width: f64,
    pub height: f64,
    pub frame_rate: f64,
    pub background_color: String,
    pub timeline: Timeline,
    pub bitmaps: Vec<BitmapItem>,
    pub sounds: Vec<SoundItem>,
    pub videos: Vec<VideoItem>,
}

/// Parses the root `DOMDocument.xml` text into document metadata plus its
/// single top-level timeline.
pub fn parse_document(xml: &str) -> Result<DocumentMeta, MapperError> {
    let doc = XmlDoc::parse(xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != "DOMDocument" {
        return Err(MapperError::MissingRoot {
            expected: "DOMDocument",
        });
    }
    let width = attr_f64(root, "width", 550.0);
    let height = attr_f64(root, "height", 400.0);
    let frame_rate = attr_f64(root, "frameRate", 24.0);
    let background_color = attr_str(root, "backgroundColor", "#FFFFFF");

    let timeline_node = root
        .children()
        .find(|n| n.has_tag_name("timelines"))
        .and_then(|n| n.children().find(|c| c.has_tag_name("DOMTimeline")));

    let timeline = match timeline_node {
        Some(node) => parse_timeline(node, width, height),
        None => Timeline {
            name: "Scene 1".to_string(),
            layers: Vec::new(),
            total_frames: 1,
            camera_layer_index: None,
            reference_layers: HashSet::new(),
        },
    };

    let (bitmaps, sounds, videos) = root
        .children()
        .find(|n| n.has_tag_name("media"))
        .map(parse_media)
        .unwrap_or_default();

    Ok(DocumentMeta {
        width,
        height,
        frame_rate,
        background_color,
        timeline,
        bitmaps,
        sounds,
        videos,
    })
}

fn parse_media(node: Node) -> (Vec<BitmapItem>, Vec<SoundItem>, Vec<VideoItem>) {
    let mut bitmaps = Vec::new();
    let mut sounds = Vec::new();
    let mut videos = Vec::new();
    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "DOMBitmapItem" => bitmaps.push(BitmapItem {
                name: attr_str(child, "name", ""),
                href: attr_str(child, "href", ""),
                bitmap_data_href: child.attribute("bitmapDataHRef").map(|s| s.to_string()),
                width: attr_opt_u32(child, "width").unwrap_or(0),
                height: attr_opt_u32(child, "height").unwrap_or(0),
                raster: None,
            }),
            "DOMSoundItem" => sounds.push(SoundItem {
                name: attr_str(child, "name", ""),
                href: attr_str(child, "href", ""),
                exported_symbol_name: child.attribute("exportClassName").map(|s| s.to_string()),
            }),
            "DOMVideoItem" => videos.push(VideoItem {
                name: attr_str(child, "name", ""),
                href: attr_str(child, "href", ""),
                source: if attr_str(child, "sourceType", "embedded") == "linked" {
                    VideoSource::LinkedFlv
                } else {
                    VideoSource::EmbeddedFrameSequence
                },
                frame_count: attr_opt_u32(child, "frameCount").unwrap_or(0),
            }),
            _ => {}
        }
    }
    (bitmaps, sounds, videos)
}

/// Parses a `LIBRARY/*.xml` symbol item into a [`Symbol`].
pub fn parse_symbol_item(xml: &str) -> Result<Symbol, MapperError> {
    let doc = XmlDoc::parse(xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != "DOMSymbolItem" {
        return Err(MapperError::MissingRoot {
            expected: "DOMSymbolItem",
        });
    }
    let name = attr_str(root, "name", "");
    let item_id = attr_str(root, "itemID", "");
    let symbol_type = parse_symbol_type(&attr_str(root, "symbolType", "graphic"));

    let timeline_node = root
        .children()
        .find(|n| n.has_tag_name("timeline"))
        .and_then(|n| n.children().find(|c| c.has_tag_name("DOMTimeline")));

    let timeline = match timeline_node {
        Some(node) => parse_timeline(node, 550.0, 400.0),
        None => Timeline {
            name: name.clone(),
            layers: Vec::new(),
            total_frames: 1,
            camera_layer_index: None,
            reference_layers: HashSet::new(),
        },
    };

    let scale9_grid = root.children().find(|n| n.has_tag_name("scale9Grid")).map(|n| Rect {
        left: attr_f64(n, "left", 0.0),
        top: attr_f64(n, "top", 0.0),
        right: attr_f64(n, "right", 0.0),
        bottom: attr_f64(n, "bottom", 0.0),
    });

    let hit_area_frame = button_hit_frame(&timeline, symbol_type);

    Ok(Symbol {
        name,
        item_id,
        symbol_type,
        timeline,
        scale9_grid,
        hit_area_frame,
    })
}

fn button_hit_frame(timeline: &Timeline, symbol_type: SymbolType) -> Option<u32> {
    if symbol_type != SymbolType::Button {
        return None;
    }
    for layer in &timeline.layers {
        for frame in &layer.frames {
            if matches!(frame.label.as_deref(), Some("hit") | Some("_hit")) {
                return Some(frame.index);
            }
        }
    }
    let has_content_at_3 = timeline
        .layers
        .iter()
        .any(|l| l.frames.iter().any(|f| frame_covers(f, 3)));
    if has_content_at_3 {
        Some(3)
    } else {
        None
    }
}

fn frame_covers(frame: &Frame, index: u32) -> bool {
    frame.index <= index && index < frame.index + frame.duration
}

fn parse_timeline(node: Node, doc_width: f64, doc_height: f64) -> Timeline {
    let name = attr_str(node, "name", "");
    let mut layers = Vec::new();

    if let Some(layers_node) = node.children().find(|n| n.has_tag_name("layers")) {
        for layer_node in layers_node.children().filter(|n| n.has_tag_name("DOMLayer")) {
            layers.push(parse_layer(layer_node));
        }
    }

    resolve_masks(&mut layers);
    let reference_layers = detect_reference_layers(&layers);
    let camera_layer_index = detect_camera_layer(&layers, doc_width, doc_height);

    let total_frames = layers
        .iter()
        .flat_map(|l| l.frames.iter())
        .map(|f| f.index + f.duration)
        .max()
        .unwrap_or(1)
        .max(1);

    Timeline {
        name,
        layers,
        total_frames,
        camera_layer_index,
        reference_layers,
    }
}

fn parse_layer(node: Node) -> Layer {
    let layer_type = attr_str(node, "layerType", "normal");
    let kind = match layer_type.as_str() {
        "guide" => LayerKind::Guide,
        "folder" => LayerKind::Folder,
        "mask" => LayerKind::Mask,
        "masked" => LayerKind::Masked,
        "camera" => LayerKind::Camera,
        _ => LayerKind::Normal,
    };

    let mut frames = Vec::new();
    if let Some(frames_node) = node.children().find(|n| n.has_tag_name("frames")) {
        let mut cursor = 0u32;
        for frame_node in frames_node.children().filter(|n| n.has_tag_name("DOMFrame")) {
            let frame = parse_frame(frame_node, cursor);
            cursor = frame.index + frame.duration;
            frames.push(frame);
        }
    }

    Layer {
        name: attr_str(node, "name", ""),
        color: attr_str(node, "color", "#000000"),
        visible: attr_bool(node, "visible", true),
        locked: attr_bool(node, "locked", false),
        outline: attr_bool(node, "outline", false),
        transparent: attr_bool(node, "transparent", false),
        alpha_percent: attr_f64(node, "alphaPercent", 100.0),
        kind,
        parent_layer_index: attr_opt_usize(node, "parentLayerIndex"),
        mask_layer_index: None,
        frames,
    }
}

fn parse_frame(node: Node, default_index: u32) -> Frame {
    let index = attr_opt_u32(node, "index").unwrap_or(default_index);
    let duration = attr_f64(node, "duration", 1.0).max(1.0) as u32;
    let tween_type = match attr_str(node, "tweenType", "none").as_str() {
        "motion" => TweenType::Motion,
        "shape" => TweenType::Shape,
        _ => TweenType::None,
    };
    let label = node.attribute("name").map(|s| s.to_string());
    let label_kind = label.as_ref().map(|_| match attr_str(node, "labelType", "name").as_str() {
        "comment" => LabelKind::Comment,
        "anchor" => LabelKind::Anchor,
        _ => LabelKind::Name,
    });

    let mut elements = Vec::new();
    if let Some(elements_node) = node.children().find(|n| n.has_tag_name("elements")) {
        collect_elements(elements_node, Matrix::IDENTITY, &mut elements);
    }

    let sound = node
        .children()
        .find(|n| n.has_tag_name("SoundItem") || n.has_tag_name("frameSound"))
        .map(|n| FrameSound {
            library_item_name: attr_str(n, "libraryItemName", ""),
            sync: attr_str(n, "sync", "event"),
            loop_mode: attr_str(n, "loopMode", "loop"),
        });

    let tweens = node
        .children()
        .find(|n| n.has_tag_name("tweens"))
        .map(parse_tweens)
        .unwrap_or_default();

    Frame {
        index,
        duration,
        key_mode: attr_opt_u32(node, "keyMode").unwrap_or(0),
        tween_type,
        acceleration: attr_f64(node, "acceleration", 0.0),
        elements,
        tweens,
        label,
        label_kind,
        morph_shape: None,
        sound,
    }
}

/// A `<tweens>` block carries one entry per eased property (`all`,
/// `position`, `rotation`, `scale`, `color`, ...); `CustomEase` supplies an
/// explicit control-point curve in place of a flat `intensity` percentage.
fn parse_tweens(tweens_node: Node) -> Vec<Tween> {
    tweens_node
        .children()
        .filter(Node::is_element)
        .map(|n| {
            let target = attr_str(n, "target", "all");
            let ease = if n.has_tag_name("CustomEase") {
                n.children()
                    .filter(|p| p.has_tag_name("Point"))
                    .nth(1)
                    .map(|p| attr_f64(p, "y", 0.0))
                    .unwrap_or(0.0)
            } else {
                attr_f64(n, "intensity", 0.0) / 100.0
            };
            Tween { target, ease }
        })
        .collect()
}

/// Walks `<elements>`, flattening `DOMGroup` children into the parent
/// list in document order. A child with its own explicit matrix uses it
/// verbatim; a child with none inherits `inherited` (the composition of
/// every enclosing group's matrix down to identity).
fn collect_elements(elements_node: Node, inherited: Matrix, out: &mut Vec<DisplayElement>) {
    for child in elements_node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "DOMGroup" => {
                let group_matrix = parse_matrix_child(child).unwrap_or(Matrix::IDENTITY);
                let composed = group_matrix.compose(&inherited);
                if let Some(members) = child.children().find(|n| n.has_tag_name("members")) {
                    collect_elements(members, composed, out);
                }
            }
            "DOMSymbolInstance" => out.push(DisplayElement::Symbol(parse_symbol_instance(child, inherited))),
            "DOMShapeObj" | "DOMShape" => out.push(DisplayElement::Shape(parse_shape(child, inherited))),
            "DOMStaticText" => out.push(DisplayElement::Text(parse_text(child, inherited, TextKind::Static))),
            "DOMDynamicText" => out.push(DisplayElement::Text(parse_text(child, inherited, TextKind::Dynamic))),
            "DOMInputText" => out.push(DisplayElement::Text(parse_text(child, inherited, TextKind::Input))),
            "DOMBitmapInstance" => out.push(DisplayElement::Bitmap(BitmapInstance {
                library_item_name: attr_str(child, "libraryItemName", ""),
                matrix: parse_matrix_child(child).unwrap_or(inherited),
            })),
            "DOMVideoInstance" => out.push(DisplayElement::Video(VideoInstance {
                library_item_name: attr_str(child, "libraryItemName", ""),
                matrix: parse_matrix_child(child).unwrap_or(inherited),
            })),
            _ => {}
        }
    }
}

fn parse_matrix_child(node: Node) -> Option<Matrix> {
    let matrix_node = node
        .children()
        .find(|n| n.has_tag_name("matrix"))
        .and_then(|n| n.children().find(|c| c.has_tag_name("Matrix")))?;
    Some(Matrix {
        a: attr_f64(matrix_node, "a", 1.0),
        b: attr_f64(matrix_node, "b", 0.0),
        c: attr_f64(matrix_node, "c", 0.0),
        d: attr_f64(matrix_node, "d", 1.0),
        tx: attr_f64(matrix_node, "tx", 0.0),
        ty: attr_f64(matrix_node, "ty", 0.0),
    })
}

fn parse_symbol_instance(node: Node, inherited: Matrix) -> SymbolInstance {
    let matrix = parse_matrix_child(node).unwrap_or(inherited);
    let transformation_point = node
        .children()
        .find(|n| n.has_tag_name("transformationPoint"))
        .and_then(|n| n.children().find(|c| c.has_tag_name("Point")))
        .map(|p| (attr_f64(p, "x", 0.0), attr_f64(p, "y", 0.0)))
        .unwrap_or((0.0, 0.0));

    let loop_mode = match attr_str(node, "loop", "loop").as_str() {
        "play once" | "playonce" => LoopMode::PlayOnce,
        "single frame" | "singleframe" => LoopMode::SingleFrame,
        _ => LoopMode::Loop,
    };

    let color_transform = node
        .children()
        .find(|n| n.has_tag_name("color"))
        .map(parse_color_transform)
        .unwrap_or_default();

    let filters = node
        .children()
        .find(|n| n.has_tag_name("filters"))
        .map(parse_filters)
        .unwrap_or_default();

    SymbolInstance {
        library_item_name: attr_str(node, "libraryItemName", ""),
        symbol_type: parse_symbol_type(&attr_str(node, "symbolType", "graphic")),
        matrix,
        transformation_point,
        center_point_3d: None,
        rotation_x: attr_f64(node, "rotationX", 0.0),
        rotation_y: attr_f64(node, "rotationY", 0.0),
        rotation_z: attr_f64(node, "rotationZ", 0.0),
        z: attr_f64(node, "z", 0.0),
        loop_mode,
        first_frame: attr_opt_u32(node, "firstFrame").unwrap_or(0),
        last_frame: attr_opt_u32(node, "lastFrame"),
        filters,
        color_transform,
        blend_mode: attr_str(node, "blendMode", "normal"),
        is_visible: attr_bool(node, "isVisible", true),
        cache_as_bitmap: attr_bool(node, "cacheAsBitmap", false),
    }
}

fn parse_symbol_type(s: &str) -> SymbolType {
    match s {
        "movie clip" | "movieclip" => SymbolType::MovieClip,
        "button" => SymbolType::Button,
        _ => SymbolType::Graphic,
    }
}

fn parse_text(node: Node, inherited: Matrix, kind: TextKind) -> Text {
    let matrix = parse_matrix_child(node).unwrap_or(inherited);

    let runs: Vec<TextRun> = node
        .children()
        .find(|n| n.has_tag_name("textRuns"))
        .map(|runs_node| runs_node.children().filter(|n| n.has_tag_name("DOMTextRun")).map(parse_text_run).collect())
        .unwrap_or_default();

    let text = if runs.is_empty() {
        node.descendants()
            .find(|n| n.has_tag_name("text"))
            .and_then(|n| n.text())
            .unwrap_or("")
            .to_string()
    } else {
        runs.iter().map(|r| r.characters.as_str()).collect::<Vec<_>>().join("")
    };

    // A text node with no `<textRuns>` block still gets one default run so
    // callers always have run-level metadata to draw from.
    let runs = if runs.is_empty() && !text.is_empty() {
        vec![TextRun {
            characters: text.clone(),
            font: "Times New Roman".to_string(),
            size: 12.0,
            color: "#000000".to_string(),
            alignment: TextAlignment::Left,
        }]
    } else {
        runs
    };

    Text { matrix, kind, text, runs }
}

fn parse_text_run(run_node: Node) -> TextRun {
    let characters = run_node
        .children()
        .find(|n| n.has_tag_name("characters"))
        .and_then(|n| n.text())
        .unwrap_or("")
        .to_string();
    let attrs = run_node
        .children()
        .find(|n| n.has_tag_name("textAttrs"))
        .and_then(|n| n.children().find(|c| c.has_tag_name("DOMTextAttrs")));
    let (font, size, color, alignment) = match attrs {
        Some(a) => (
            attr_str(a, "face", "Times New Roman"),
            attr_f64(a, "size", 12.0),
            attr_str(a, "fillColor", "#000000"),
            parse_text_alignment(&attr_str(a, "alignment", "left")),
        ),
        None => ("Times New Roman".to_string(), 12.0, "#000000".to_string(), TextAlignment::Left),
    };
    TextRun { characters, font, size, color, alignment }
}

fn parse_text_alignment(raw: &str) -> TextAlignment {
    match raw {
        "center" => TextAlignment::Center,
        "right" => TextAlignment::Right,
        "justify" => TextAlignment::Justify,
        _ => TextAlignment::Left,
    }
}

fn parse_shape(node: Node, inherited: Matrix) -> Shape {
    let matrix = parse_matrix_child(node).unwrap_or(inherited);

    let mut fill_styles = Vec::new();
    if let Some(fills) = node.children().find(|n| n.has_tag_name("fills")) {
        let mut entries: Vec<(u32, FillStyle)> = fills
            .children()
            .filter(|n| n.has_tag_name("FillStyle"))
            .map(|f| (attr_opt_u32(f, "index").unwrap_or(1), parse_fill_style(f)))
            .collect();
        entries.sort_by_key(|(i, _)| *i);
        fill_styles = entries.into_iter().map(|(_, s)| s).collect();
    }

    let mut stroke_styles = Vec::new();
    if let Some(strokes) = node.children().find(|n| n.has_tag_name("strokes")) {
        let mut entries: Vec<(u32, StrokeStyle)> = strokes
            .children()
            .filter(|n| n.has_tag_name("StrokeStyle"))
            .map(|s| (attr_opt_u32(s, "index").unwrap_or(1), parse_stroke_style(s)))
            .collect();
        entries.sort_by_key(|(i, _)| *i);
        stroke_styles = entries.into_iter().map(|(_, s)| s).collect();
    }

    let mut edges = Vec::new();
    if let Some(edges_node) = node.children().find(|n| n.has_tag_name("edges")) {
        for edge_node in edges_node.children().filter(|n| n.has_tag_name("Edge")) {
            let raw = edge_node
                .attribute("cubics")
                .or_else(|| edge_node.attribute("edges"))
                .unwrap_or("");
            let decoded = xfl_path::decode_edge(raw);
            edges.push(Edge {
                fill_style_0: attr_opt_u32(edge_node, "fillStyle0"),
                fill_style_1: attr_opt_u32(edge_node, "fillStyle1"),
                stroke_style: attr_opt_u32(edge_node, "strokeStyle"),
                commands: decoded.commands,
            });
        }
    }

    Shape {
        matrix,
        fill_styles,
        stroke_styles,
        edges,
    }
}

fn parse_fill_style(node: Node) -> FillStyle {
    if let Some(solid) = node.children().find(|n| n.has_tag_name("SolidColor")) {
        return FillStyle::Solid {
            color: attr_str(solid, "color", "#000000"),
            alpha: attr_f64(solid, "alpha", 1.0),
        };
    }
    if let Some(linear) = node.children().find(|n| n.has_tag_name("LinearGradient")) {
        return FillStyle::LinearGradient {
            stops: parse_gradient_stops(linear),
            matrix: parse_matrix_child(linear).unwrap_or(Matrix::IDENTITY),
            spread: parse_spread(attr_str(linear, "spreadMethod", "pad").as_str()),
            interpolation: parse_interpolation(attr_str(linear, "interpolationMethod", "RGB").as_str()),
        };
    }
    if let Some(radial) = node.children().find(|n| n.has_tag_name("RadialGradient")) {
        return FillStyle::RadialGradient {
            stops: parse_gradient_stops(radial),
            matrix: parse_matrix_child(radial).unwrap_or(Matrix::IDENTITY),
            spread: parse_spread(attr_str(radial, "spreadMethod", "pad").as_str()),
            interpolation: parse_interpolation(attr_str(radial, "interpolationMethod", "RGB").as_str()),
            focal_point_ratio: attr_f64(radial, "focalPointRatio", 0.0),
        };
    }
    if let Some(bitmap) = node.children().find(|n| n.has_tag_name("BitmapFill")) {
        return FillStyle::Bitmap {
            bitmap_path: attr_str(bitmap, "bitmapPath", ""),
            matrix: parse_matrix_child(bitmap).unwrap_or(Matrix::IDENTITY),
            smoothed: attr_bool(bitmap, "isSmoothed", true),
            clipped: attr_bool(bitmap, "isClipped", false),
        };
    }
    FillStyle::Solid {
        color: "#000000".to_string(),
        alpha: 1.0,
    }
}

fn parse_gradient_stops(node: Node) -> Vec<GradientStop> {
    node.children()
        .find(|n| n.has_tag_name("GradientEntries"))
        .map(|entries| {
            entries
                .children()
                .filter(|n| n.has_tag_name("GradientEntry"))
                .map(|e| GradientStop {
                    ratio: attr_f64(e, "ratio", 0.0),
                    color: attr_str(e, "color", "#000000"),
                    alpha: attr_f64(e, "alpha", 1.0),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_spread(s: &str) -> GradientSpreadMethod {
    match s {
        "reflect" => GradientSpreadMethod::Reflect,
        "repeat" => GradientSpreadMethod::Repeat,
        _ => GradientSpreadMethod::Pad,
    }
}

fn parse_interpolation(s: &str) -> GradientInterpolation {
    match s {
        "linearRGB" => GradientInterpolation::LinearRgb,
        _ => GradientInterpolation::Rgb,
    }
}

fn parse_stroke_style(node: Node) -> StrokeStyle {
    let solid = node.children().find(|n| n.has_tag_name("SolidStroke"));
    let (weight, cap, join, miter_limit, scale_mode, pixel_hinting, fill_parent) =
        if let Some(s) = solid {
            (
                attr_f64(s, "weight", 1.0),
                parse_cap(attr_str(s, "caps", "round").as_str()),
                parse_join(attr_str(s, "joints", "round").as_str()),
                attr_f64(s, "miterLimit", 3.0),
                parse_scale_mode(attr_str(s, "scaleMode", "normal").as_str()),
                attr_bool(s, "pixelHinting", false),
                Some(s),
            )
        } else {
            (1.0, CapStyle::Round, JoinStyle::Round, 3.0, StrokeScaleMode::Normal, false, None)
        };

    let fill = fill_parent
        .and_then(|s| s.children().find(|n| n.has_tag_name("fill")))
        .map(parse_fill_style)
        .unwrap_or(FillStyle::Solid {
            color: "#000000".to_string(),
            alpha: 1.0,
        });

    StrokeStyle {
        weight,
        cap,
        join,
        miter_limit,
        scale_mode,
        pixel_hinting,
        fill,
    }
}

fn parse_cap(s: &str) -> CapStyle {
    match s {
        "none" => CapStyle::None,
        "square" => CapStyle::Square,
        _ => CapStyle::Round,
    }
}

fn parse_join(s: &str) -> JoinStyle {
    match s {
        "bevel" => JoinStyle::Bevel,
        "miter" => JoinStyle::Miter,
        _ => JoinStyle::Round,
    }
}

fn parse_scale_mode(s: &str) -> StrokeScaleMode {
    match s {
        "horizontal" => StrokeScaleMode::Horizontal,
        "vertical" => StrokeScaleMode::Vertical,
        "none" => StrokeScaleMode::None,
        _ => StrokeScaleMode::Normal,
    }
}

fn parse_color_transform(node: Node) -> ColorTransform {
    if let Some(color) = node.children().find(|n| n.has_tag_name("Color")) {
        if let Some(brightness) = color.attribute("brightness").and_then(|v| v.parse::<f64>().ok()) {
            return color_transform_from_brightness(brightness);
        }
        if let Some(tint_multiplier) = color.attribute("tintMultiplier").and_then(|v| v.parse::<f64>().ok()) {
            let tint_color = color.attribute("tintColor").unwrap_or("#000000");
            return color_transform_from_tint(tint_multiplier, parse_rgb(tint_color));
        }
        return ColorTransform {
            red_multiplier: attr_f64(color, "redMultiplier", 1.0),
            green_multiplier: attr_f64(color, "greenMultiplier", 1.0),
            blue_multiplier: attr_f64(color, "blueMultiplier", 1.0),
            alpha_multiplier: attr_f64(color, "alphaMultiplier", 1.0),
            red_offset: attr_f64(color, "redOffset", 0.0),
            green_offset: attr_f64(color, "greenOffset", 0.0),
            blue_offset: attr_f64(color, "blueOffset", 0.0),
            alpha_offset: attr_f64(color, "alphaOffset", 0.0),
        };
    }
    ColorTransform::default()
}

fn parse_rgb(hex: &str) -> (u8, u8, u8) {
    let hex = hex.trim_start_matches('#');
    let value = u32::from_str_radix(hex, 16).unwrap_or(0);
    (
        ((value >> 16) & 0xFF) as u8,
        ((value >> 8) & 0xFF) as u8,
        (value & 0xFF) as u8,
    )
}

fn parse_filters(node: Node) -> Vec<Filter> {
    node.children()
        .filter(Node::is_element)
        .filter_map(|n| match n.tag_name().name() {
            "BlurFilter" => Some(Filter::Blur {
                blur_x: attr_f64(n, "blurX", 5.0),
                blur_y: attr_f64(n, "blurY", 5.0),
                quality: attr_opt_u32(n, "quality").unwrap_or(1),
            }),
            "GlowFilter" => Some(Filter::Glow {
                color: attr_str(n, "color", "#000000"),
                alpha: attr_f64(n, "alpha", 1.0),
                blur_x: attr_f64(n, "blurX", 5.0),
                blur_y: attr_f64(n, "blurY", 5.0),
                strength: normalize_strength(attr_f64(n, "strength", 255.0)),
                inner: attr_bool(n, "inner", false),
                knockout: attr_bool(n, "knockout", false),
            }),
            "DropShadowFilter" => Some(Filter::DropShadow {
                color: attr_str(n, "color", "#000000"),
                alpha: attr_f64(n, "alpha", 1.0),
                angle: attr_f64(n, "angle", 45.0),
                distance: attr_f64(n, "distance", 5.0),
                blur_x: attr_f64(n, "blurX", 5.0),
                blur_y: attr_f64(n, "blurY", 5.0),
                strength: normalize_strength(attr_f64(n, "strength", 255.0)),
                inner: attr_bool(n, "inner", false),
                knockout: attr_bool(n, "knockout", false),
            }),
            "BevelFilter" => Some(Filter::Bevel {
                highlight_color: attr_str(n, "highlightColor", "#FFFFFF"),
                highlight_alpha: attr_f64(n, "highlightAlpha", 1.0),
                shadow_color: attr_str(n, "shadowColor", "#000000"),
                shadow_alpha: attr_f64(n, "shadowAlpha", 1.0),
                angle: attr_f64(n, "angle", 45.0),
                distance: attr_f64(n, "distance", 5.0),
                blur_x: attr_f64(n, "blurX", 5.0),
                blur_y: attr_f64(n, "blurY", 5.0),
                strength: normalize_strength(attr_f64(n, "strength", 255.0)),
                knockout: attr_bool(n, "knockout", false),
            }),
            "ColorMatrixFilter" => {
                let matrix = n.attribute("matrix").map(parse_matrix_csv).unwrap_or_else(|| {
                    color_matrix_from_adjustments(
                        attr_f64(n, "brightness", 0.0) / 255.0,
                        attr_f64(n, "contrast", 0.0) / 100.0,
                        attr_f64(n, "saturation", 0.0) / 100.0,
                        attr_f64(n, "hue", 0.0),
                    )
                });
                Some(Filter::ColorMatrix { matrix })
            }
            "ConvolutionFilter" => Some(Filter::Convolution {
                matrix_x: attr_opt_u32(n, "matrixX").unwrap_or(3),
                matrix_y: attr_opt_u32(n, "matrixY").unwrap_or(3),
                matrix: n
                    .attribute("matrix")
                    .map(|s| parse_f64_csv(s))
                    .unwrap_or_default(),
                divisor: attr_f64(n, "divisor", 1.0),
                bias: attr_f64(n, "bias", 0.0),
                clamp: attr_bool(n, "clamp", true),
            }),
            "GradientGlowFilter" => Some(Filter::GradientGlow {
                distance: attr_f64(n, "distance", 5.0),
                angle: attr_f64(n, "angle", 45.0),
                blur_x: attr_f64(n, "blurX", 5.0),
                blur_y: attr_f64(n, "blurY", 5.0),
                strength: normalize_strength(attr_f64(n, "strength", 255.0)),
                knockout: attr_bool(n, "knockout", false),
            }),
            "GradientBevelFilter" => Some(Filter::GradientBevel {
                distance: attr_f64(n, "distance", 5.0),
                angle: attr_f64(n, "angle", 45.0),
                blur_x: attr_f64(n, "blurX", 5.0),
                blur_y: attr_f64(n, "blurY", 5.0),
                strength: normalize_strength(attr_f64(n, "strength", 255.0)),
                knockout: attr_bool(n, "knockout", false),
            }),
            _ => None,
        })
        .collect()
}

fn parse_f64_csv(s: &str) -> Vec<f64> {
    s.split(',').filter_map(|v| v.trim().parse::<f64>().ok()).collect()
}

fn parse_matrix_csv(s: &str) -> [f64; 20] {
    let values = parse_f64_csv(s);
    let mut out = [0.0; 20];
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = value;
    }
    out
}

/// Rewrites `masked` layers to point at their controlling `mask` layer,
/// per the `parentLayerIndex` link authored on the masked layer.
fn resolve_masks(layers: &mut [Layer]) {
    let parents: Vec<Option<usize>> = layers.iter().map(|l| l.parent_layer_index).collect();
    for (i, parent) in parents.into_iter().enumerate() {
        if let Some(p) = parent {
            if layers.get(p).map(|l| l.kind) == Some(LayerKind::Mask) {
                layers[i].kind = LayerKind::Masked;
                layers[i].mask_layer_index = Some(p);
            }
        }
    }
}

fn detect_reference_layers(layers: &[Layer]) -> HashSet<usize> {
    let mut out = HashSet::new();
    for (i, layer) in layers.iter().enumerate() {
        let is_structural = matches!(layer.kind, LayerKind::Guide | LayerKind::Folder | LayerKind::Camera);
        let is_faint = layer.transparent && layer.alpha_percent < 50.0;
        let is_named_camera_outline = layer.outline
            && CAMERA_NAMES.iter().any(|n| layer.name.eq_ignore_ascii_case(n));
        if is_structural || is_faint || is_named_camera_outline {
            out.insert(i);
        }
    }
    out
}

fn detect_camera_layer(layers: &[Layer], doc_width: f64, doc_height: f64) -> Option<usize> {
    'outer: for (i, layer) in layers.iter().enumerate() {
        let name_matches = CAMERA_NAMES.iter().any(|n| layer.name.eq_ignore_ascii_case(n));
        if !name_matches {
            continue;
        }
        let posture_matches = layer.kind == LayerKind::Guide || !layer.visible || layer.outline;
        if !posture_matches {
            continue;
        }
        let mut shape_free_frame: Option<&Frame> = None;
        for frame in &layer.frames {
            let has_shape = frame.elements.iter().any(|e| matches!(e, DisplayElement::Shape(_)));
            let symbol_count = frame
                .elements
                .iter()
                .filter(|e| matches!(e, DisplayElement::Symbol(_)))
                .count();
            if !has_shape && symbol_count == 1 {
                if shape_free_frame.is_some() {
                    continue 'outer;
                }
                shape_free_frame = Some(frame);
            }
        }
        if let Some(frame) = shape_free_frame {
            if let Some(DisplayElement::Symbol(instance)) =
                frame.elements.iter().find(|e| matches!(e, DisplayElement::Symbol(_)))
            {
                if instance_center_within_tolerance(instance, doc_width, doc_height) {
                    return Some(i);
                }
            }
        }
    }
    None
}

fn instance_center_within_tolerance(instance: &SymbolInstance, doc_width: f64, doc_height: f64) -> bool {
    let (px, py) = instance.transformation_point;
    let dx = (px - doc_width / 2.0).abs() / doc_width.max(1.0);
    let dy = (py - doc_height / 2.0).abs() / doc_height.max(1.0);
    dx < 0.15 && dy < 0.15
}

fn attr_str(node: Node, name: &str, default: &str) -> String {
    node.attribute(name).unwrap_or(default).to_string()
}

fn attr_f64(node: Node, name: &str, default: f64) -> f64 {
    node.attribute(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn attr_bool(node: Node, name: &str, default: bool) -> bool {
    match node.attribute(name) {
        Some("true") => true,
        Some("false") => false,
        _ => default,
    }
}

fn attr_opt_u32(node: Node, name: &str) -> Option<u32> {
    node.attribute(name).and_then(|v| v.parse().ok())
}

fn attr_opt_usize(node: Node, name: &str) -> Option<usize> {
    node.attribute(name).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_document_metadata() {
        let xml = r##"<DOMDocument width="640" height="480" frameRate="30" backgroundColor="#112233">
            <timelines><DOMTimeline name="Scene 1"><layers></layers></DOMTimeline></timelines>
        </DOMDocument>"##;
        let meta = parse_document(xml).unwrap();
        assert_eq!(meta.width, 640.0);
        assert_eq!(meta.frame_rate, 30.0);
        assert_eq!(meta.background_color, "#112233");
        assert_eq!(meta.timeline.name, "Scene 1");
    }

    #[test]
    fn group_children_without_matrix_inherit_group_composition() {
        let xml = r#"<DOMDocument width="1" height="1">
            <timelines><DOMTimeline name="Scene 1"><layers>
              <DOMLayer name="L1"><frames><DOMFrame index="0" duration="1"><elements>
                <DOMGroup>
                  <matrix><Matrix a="2" b="0" c="0" d="2" tx="10" ty="10"/></matrix>
                  <members>
                    <DOMBitmapInstance libraryItemName="b.png"/>
                  </members>
                </DOMGroup>
              </elements></DOMFrame></frames></DOMLayer>
            </layers></DOMTimeline></timelines>
        </DOMDocument>"#;
        let meta = parse_document(xml).unwrap();
        let frame = &meta.timeline.layers[0].frames[0];
        match &frame.elements[0] {
            DisplayElement::Bitmap(b) => assert_eq!(b.matrix.a, 2.0),
            other => panic!("expected bitmap, got {other:?}"),
        }
    }

    #[test]
    fn group_child_with_explicit_matrix_overrides_group_composition() {
        let xml = r#"<DOMDocument width="1" height="1">
            <timelines><DOMTimeline name="Scene 1"><layers>
              <DOMLayer name="L1"><frames><DOMFrame index="0" duration="1"><elements>
                <DOMGroup>
                  <matrix><Matrix a="2" b="0" c="0" d="2" tx="10" ty="10"/></matrix>
                  <members>
                    <DOMBitmapInstance libraryItemName="b.png">
                      <matrix><Matrix a="5" b="0" c="0" d="5" tx="0" ty="0"/></matrix>
                    </DOMBitmapInstance>
                  </members>
                </DOMGroup>
              </elements></DOMFrame></frames></DOMLayer>
            </layers></DOMTimeline></timelines>
        </DOMDocument>"#;
        let meta = parse_document(xml).unwrap();
        let frame = &meta.timeline.layers[0].frames[0];
        match &frame.elements[0] {
            DisplayElement::Bitmap(b) => assert_eq!(b.matrix.a, 5.0),
            other => panic!("expected bitmap, got {other:?}"),
        }
    }

    #[test]
    fn masked_layer_is_rewritten_from_parent_link() {
        let xml = r#"<DOMDocument width="1" height="1">
            <timelines><DOMTimeline name="Scene 1"><layers>
              <DOMLayer name="Mask" layerType="mask"><frames></frames></DOMLayer>
              <DOMLayer name="Content" parentLayerIndex="0"><frames></frames></DOMLayer>
            </layers></DOMTimeline></timelines>
        </DOMDocument>"#;
        let meta = parse_document(xml).unwrap();
        assert_eq!(meta.timeline.layers[1].kind, LayerKind::Masked);
        assert_eq!(meta.timeline.layers[1].mask_layer_index, Some(0));
    }

    #[test]
    fn shape_edges_decode_through_the_path_crate() {
        let xml = r##"<DOMDocument width="1" height="1">
            <timelines><DOMTimeline name="Scene 1"><layers>
              <DOMLayer name="L1"><frames><DOMFrame index="0" duration="1"><elements>
                <DOMShape>
                  <fills><FillStyle index="1"><SolidColor color="#FF0000"/></FillStyle></fills>
                  <edges><Edge edges="!100 200|300 200|300 400|100 400/" fillStyle1="1"/></edges>
                </DOMShape>
              </elements></DOMFrame></frames></DOMLayer>
            </layers></DOMTimeline></timelines>
        </DOMDocument>"##;
        let meta = parse_document(xml).unwrap();
        let frame = &meta.timeline.layers[0].frames[0];
        match &frame.elements[0] {
            DisplayElement::Shape(shape) => {
                assert_eq!(shape.edges.len(), 1);
                assert!(!shape.edges[0].commands.is_empty());
            }
            other => panic!("expected shape, got {other:?}"),
        }
    }

    #[test]
    fn frame_tweens_parse_intensity_and_custom_ease() {
        let xml = r#"<DOMDocument width="1" height="1">
            <timelines><DOMTimeline name="Scene 1"><layers>
              <DOMLayer name="L1"><frames><DOMFrame index="0" duration="1" tweenType="motion">
                <tweens>
                  <Ease target="position" intensity="50"/>
                  <CustomEase target="rotation">
                    <Point x="0" y="0"/>
                    <Point x="1" y="0.75"/>
                  </CustomEase>
                </tweens>
                <elements></elements>
              </DOMFrame></frames></DOMLayer>
            </layers></DOMTimeline></timelines>
        </DOMDocument>"#;
        let meta = parse_document(xml).unwrap();
        let frame = &meta.timeline.layers[0].frames[0];
        assert_eq!(frame.tweens.len(), 2);
        assert_eq!(frame.tweens[0].target, "position");
        assert_eq!(frame.tweens[0].ease, 0.5);
        assert_eq!(frame.tweens[1].target, "rotation");
        assert_eq!(frame.tweens[1].ease, 0.75);
    }
}
