//! Pins the literal frame-resolution scenario against the public
//! `xfl_resolve` API.

use xfl_model::{ColorTransform, LoopMode, Matrix, SymbolInstance, SymbolType};
use xfl_resolve::resolve;

fn instance(loop_mode: LoopMode, first: u32, last: Option<u32>, symbol_type: SymbolType) -> SymbolInstance {
    SymbolInstance {
        library_item_name: "Sym".to_string(),
        symbol_type,
        matrix: Matrix::IDENTITY,
        transformation_point: (0.0, 0.0),
        center_point_3d: None,
        rotation_x: 0.0,
        rotation_y: 0.0,
        rotation_z: 0.0,
        z: 0.0,
        loop_mode,
        first_frame: first,
        last_frame: last,
        filters: Vec::new(),
        color_transform: ColorTransform::default(),
        blend_mode: "normal".to_string(),
        is_visible: true,
        cache_as_bitmap: false,
    }
}

#[test]
fn looping_instance_with_bounded_range_wraps_around_parent_offset() {
    // totalFrames=10, firstFrame=2, lastFrame=5, loop=loop, parentFrame=7,
    // keyframeStart=3: range is 4, offset is 4, 2 + (4 % 4) = 2.
    let symbol_instance = instance(LoopMode::Loop, 2, Some(5), SymbolType::Graphic);
    let frame = resolve(&symbol_instance, 10, 7, 3);
    assert_eq!(frame, 2);
}

#[test]
fn single_frame_instance_ignores_parent_playhead() {
    let symbol_instance = instance(LoopMode::SingleFrame, 4, None, SymbolType::Graphic);
    assert_eq!(resolve(&symbol_instance, 10, 500, 0), 4);
}

#[test]
fn movieclip_plays_on_its_own_clock_even_when_authored_to_loop() {
    let symbol_instance = instance(LoopMode::Loop, 3, None, SymbolType::MovieClip);
    assert_eq!(resolve(&symbol_instance, 10, 999, 0), 3);
}
