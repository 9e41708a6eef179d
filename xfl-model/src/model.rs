//! The scene-graph data model. Everything here is built once during parse
//! and is immutable afterwards.

use xfl_path::PathCommand;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub width: f64,
    pub height: f64,
    pub frame_rate: f64,
    pub background_color: String,
    pub timelines: Vec<Timeline>,
    pub symbols: std::collections::HashMap<String, Symbol>,
    pub bitmaps: std::collections::HashMap<String, BitmapItem>,
    pub sounds: std::collections::HashMap<String, SoundItem>,
    pub videos: std::collections::HashMap<String, VideoItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub name: String,
    pub layers: Vec<Layer>,
    pub total_frames: u32,
    pub camera_layer_index: Option<usize>,
    pub reference_layers: std::collections::HashSet<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Normal,
    Guide,
    Folder,
    Mask,
    Masked,
    Camera,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub color: String,
    pub visible: bool,
    pub locked: bool,
    pub outline: bool,
    pub transparent: bool,
    pub alpha_percent: f64,
    pub kind: LayerKind,
    pub parent_layer_index: Option<usize>,
    pub mask_layer_index: Option<usize>,
    pub frames: Vec<Frame>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweenType {
    None,
    Motion,
    Shape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Name,
    Comment,
    Anchor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub index: u32,
    pub duration: u32,
    pub key_mode: u32,
    pub tween_type: TweenType,
    pub acceleration: f64,
    pub elements: Vec<DisplayElement>,
    pub tweens: Vec<Tween>,
    pub label: Option<String>,
    pub label_kind: Option<LabelKind>,
    pub morph_shape: Option<Shape>,
    pub sound: Option<FrameSound>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tween {
    pub target: String,
    pub ease: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameSound {
    pub library_item_name: String,
    pub sync: String,
    pub loop_mode: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayElement {
    Symbol(SymbolInstance),
    Shape(Shape),
    Text(Text),
    Bitmap(BitmapInstance),
    Video(VideoInstance),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    /// `self` applied first, then `other` — `other.compose(self)` reads
    /// as "self, then other" when walking from a leaf up to the root.
    pub fn compose(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            tx: self.tx * other.a + self.ty * other.c + other.tx,
            ty: self.tx * other.b + self.ty * other.d + other.ty,
        }
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Loop,
    PlayOnce,
    SingleFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolType {
    Graphic,
    MovieClip,
    Button,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTransform {
    pub red_multiplier: f64,
    pub green_multiplier: f64,
    pub blue_multiplier: f64,
    pub alpha_multiplier: f64,
    pub red_offset: f64,
    pub green_offset: f64,
    pub blue_offset: f64,
    pub alpha_offset: f64,
}

impl Default for ColorTransform {
    fn default() -> Self {
        ColorTransform {
            red_multiplier: 1.0,
            green_multiplier: 1.0,
            blue_multiplier: 1.0,
            alpha_multiplier: 1.0,
            red_offset: 0.0,
            green_offset: 0.0,
            blue_offset: 0.0,
            alpha_offset: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Blur {
        blur_x: f64,
        blur_y: f64,
        quality: u32,
    },
    Glow {
        color: String,
        alpha: f64,
        blur_x: f64,
        blur_y: f64,
        strength: f64,
        inner: bool,
        knockout: bool,
    },
    DropShadow {
        color: String,
        alpha: f64,
        angle: f64,
        distance: f64,
        blur_x: f64,
        blur_y: f64,
        strength: f64,
        inner: bool,
        knockout: bool,
    },
    Bevel {
        highlight_color: String,
        highlight_alpha: f64,
        shadow_color: String,
        shadow_alpha: f64,
        angle: f64,
        distance: f64,
        blur_x: f64,
        blur_y: f64,
        strength: f64,
        knockout: bool,
    },
    ColorMatrix {
        matrix: [f64; 20],
    },
    Convolution {
        matrix_x: u32,
        matrix_y: u32,
        matrix: Vec<f64>,
        divisor: f64,
        bias: f64,
        clamp: bool,
    },
    GradientGlow {
        distance: f64,
        angle: f64,
        blur_x: f64,
        blur_y: f64,
        strength: f64,
        knockout: bool,
    },
    GradientBevel {
        distance: f64,
        angle: f64,
        blur_x: f64,
        blur_y: f64,
        strength: f64,
        knockout: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInstance {
    pub library_item_name: String,
    pub symbol_type: SymbolType,
    pub matrix: Matrix,
    pub transformation_point: (f64, f64),
    pub center_point_3d: Option<(f64, f64, f64)>,
    pub rotation_x: f64,
    pub rotation_y: f64,
    pub rotation_z: f64,
    pub z: f64,
    pub loop_mode: LoopMode,
    pub first_frame: u32,
    pub last_frame: Option<u32>,
    pub filters: Vec<Filter>,
    pub color_transform: ColorTransform,
    pub blend_mode: String,
    pub is_visible: bool,
    pub cache_as_bitmap: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GradientSpreadMethod {
    Pad,
    Reflect,
    Repeat,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GradientInterpolation {
    Rgb,
    LinearRgb,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradientStop {
    pub ratio: f64,
    pub color: String,
    pub alpha: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FillStyle {
    Solid {
        color: String,
        alpha: f64,
    },
    LinearGradient {
        stops: Vec<GradientStop>,
        matrix: Matrix,
        spread: GradientSpreadMethod,
        interpolation: GradientInterpolation,
    },
    RadialGradient {
        stops: Vec<GradientStop>,
        matrix: Matrix,
        spread: GradientSpreadMethod,
        interpolation: GradientInterpolation,
        focal_point_ratio: f64,
    },
    Bitmap {
        bitmap_path: String,
        matrix: Matrix,
        smoothed: bool,
        clipped: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapStyle {
    Round,
    None,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStyle {
    Round,
    Bevel,
    Miter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeScaleMode {
    Normal,
    Horizontal,
    Vertical,
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrokeStyle {
    pub weight: f64,
    pub cap: CapStyle,
    pub join: JoinStyle,
    pub miter_limit: f64,
    pub scale_mode: StrokeScaleMode,
    pub pixel_hinting: bool,
    pub fill: FillStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub fill_style_0: Option<u32>,
    pub fill_style_1: Option<u32>,
    pub stroke_style: Option<u32>,
    pub commands: Vec<PathCommand>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub matrix: Matrix,
    pub fill_styles: Vec<FillStyle>,
    pub stroke_styles: Vec<StrokeStyle>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub matrix: Matrix,
    pub kind: TextKind,
    pub text: String,
    /// One run per `<TextRun>`/`<TextAttrs>` pair; a plain `<text>` node
    /// with no run metadata yields a single run with the defaults below.
    pub runs: Vec<TextRun>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Static,
    Dynamic,
    Input,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub characters: String,
    pub font: String,
    pub size: f64,
    pub color: String,
    pub alignment: TextAlignment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlignment {
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BitmapInstance {
    pub library_item_name: String,
    pub matrix: Matrix,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoInstance {
    pub library_item_name: String,
    pub matrix: Matrix,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BitmapItem {
    pub name: String,
    pub href: String,
    pub bitmap_data_href: Option<String>,
    pub width: u32,
    pub height: u32,
    pub raster: Option<xfl_bitmap::Raster>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SoundItem {
    pub name: String,
    pub href: String,
    /// Linkage identifier symbol exported for runtime lookup, if any.
    pub exported_symbol_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoItem {
    pub name: String,
    pub href: String,
    pub source: VideoSource,
    pub frame_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoSource {
    EmbeddedFrameSequence,
    LinkedFlv,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub item_id: String,
    pub symbol_type: SymbolType,
    pub timeline: Timeline,
    pub scale9_grid: Option<Rect>,
    pub hit_area_frame: Option<u32>,
}
