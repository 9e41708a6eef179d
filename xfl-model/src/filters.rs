//! Derivation helpers for `ColorTransform` and `ColorMatrix` filters from
//! the shorthand attributes XFL authors instead of a raw matrix.

use crate::model::ColorTransform;

const LUMA_R: f64 = 0.299;
const LUMA_G: f64 = 0.587;
const LUMA_B: f64 = 0.114;

/// Normalises a filter strength attribute from the XFL `[0, 255]` range
/// into the `[0, 1]` range used internally.
pub fn normalize_strength(raw: f64) -> f64 {
    (raw / 255.0).clamp(0.0, 1.0)
}

/// `ColorTransform` derived from a `brightness` slider in `[-1, 1]`.
/// Positive values lighten by reducing the multiplier and adding an
/// offset; negative values only reduce the multiplier (darkening towards
/// black without an additive component).
pub fn color_transform_from_brightness(brightness: f64) -> ColorTransform {
    if brightness >= 0.0 {
        let multiplier = 1.0 - brightness;
        let offset = brightness * 255.0;
        ColorTransform {
            red_multiplier: multiplier,
            green_multiplier: multiplier,
            blue_multiplier: multiplier,
            alpha_multiplier: 1.0,
            red_offset: offset,
            green_offset: offset,
            blue_offset: offset,
            alpha_offset: 0.0,
        }
    } else {
        let multiplier = 1.0 + brightness;
        ColorTransform {
            red_multiplier: multiplier,
            green_multiplier: multiplier,
            blue_multiplier: multiplier,
            alpha_multiplier: 1.0,
            red_offset: 0.0,
            green_offset: 0.0,
            blue_offset: 0.0,
            alpha_offset: 0.0,
        }
    }
}

/// `ColorTransform` derived from a tint color and a `[0, 1]` tint amount:
/// a straight lerp of each RGB multiplier towards zero and each offset
/// towards the tint color's channel.
pub fn color_transform_from_tint(tint_multiplier: f64, tint_color: (u8, u8, u8)) -> ColorTransform {
    let m = tint_multiplier.clamp(0.0, 1.0);
    let (r, g, b) = tint_color;
    ColorTransform {
        red_multiplier: 1.0 - m,
        green_multiplier: 1.0 - m,
        blue_multiplier: 1.0 - m,
        alpha_multiplier: 1.0,
        red_offset: r as f64 * m,
        green_offset: g as f64 * m,
        blue_offset: b as f64 * m,
        alpha_offset: 0.0,
    }
}

/// 4x5 color matrix (row-major, affine: 4 columns + 1 constant column)
/// composed from `brightness`, `contrast`, `saturation` (each in
/// `[-1, 1]`) and `hue` (degrees), applied in that order: saturation,
/// then hue rotation around the luminance axis, then contrast, then
/// brightness.
pub fn color_matrix_from_adjustments(
    brightness: f64,
    contrast: f64,
    saturation: f64,
    hue: f64,
) -> [f64; 20] {
    let sat = saturation_matrix(saturation);
    let hue_m = hue_matrix(hue);
    let con = contrast_matrix(contrast);
    let bri = brightness_matrix(brightness);

    let m = multiply(&hue_m, &sat);
    let m = multiply(&con, &m);
    flatten(&multiply(&bri, &m))
}

type Mat5 = [[f64; 5]; 4];

fn identity() -> Mat5 {
    [
        [1.0, 0.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 0.0, 1.0, 0.0],
    ]
}

fn flatten(m: &Mat5) -> [f64; 20] {
    let mut out = [0.0; 20];
    for (row, values) in m.iter().enumerate() {
        out[row * 5..row * 5 + 5].copy_from_slice(values);
    }
    out
}

fn multiply(a: &Mat5, b: &Mat5) -> Mat5 {
    let mut out = identity();
    for row in 0..4 {
        for col in 0..5 {
            let mut sum = if col == 4 { a[row][4] } else { 0.0 };
            for k in 0..4 {
                sum += a[row][k] * b[k][col];
            }
            out[row][col] = sum;
        }
    }
    out
}

fn saturation_matrix(saturation: f64) -> Mat5 {
    let s = (1.0 + saturation).max(0.0);
    let inv = 1.0 - s;
    [
        [inv * LUMA_R + s, inv * LUMA_G, inv * LUMA_B, 0.0, 0.0],
        [inv * LUMA_R, inv * LUMA_G + s, inv * LUMA_B, 0.0, 0.0],
        [inv * LUMA_R, inv * LUMA_G, inv * LUMA_B + s, 0.0, 0.0],
        [0.0, 0.0, 0.0, 1.0, 0.0],
    ]
}

fn hue_matrix(hue_degrees: f64) -> Mat5 {
    let theta = hue_degrees.to_radians();
    let (sin, cos) = theta.sin_cos();
    [
        [
            LUMA_R + cos * (1.0 - LUMA_R) - sin * LUMA_R,
            LUMA_G - cos * LUMA_G - sin * LUMA_G,
            LUMA_B - cos * LUMA_B + sin * (1.0 - LUMA_B),
            0.0,
            0.0,
        ],
        [
            LUMA_R - cos * LUMA_R + sin * 0.143,
            LUMA_G + cos * (1.0 - LUMA_G) + sin * 0.140,
            LUMA_B - cos * LUMA_B - sin * 0.283,
            0.0,
            0.0,
        ],
        [
            LUMA_R - cos * LUMA_R - sin * (1.0 - LUMA_R),
            LUMA_G - cos * LUMA_G + sin * LUMA_G,
            LUMA_B + cos * (1.0 - LUMA_B) + sin * LUMA_B,
            0.0,
            0.0,
        ],
        [0.0, 0.0, 0.0, 1.0, 0.0],
    ]
}

fn contrast_matrix(contrast: f64) -> Mat5 {
    let c = 1.0 + contrast;
    let offset = 128.0 * (1.0 - c);
    [
        [c, 0.0, 0.0, 0.0, offset],
        [0.0, c, 0.0, 0.0, offset],
        [0.0, 0.0, c, 0.0, offset],
        [0.0, 0.0, 0.0, 1.0, 0.0],
    ]
}

fn brightness_matrix(brightness: f64) -> Mat5 {
    let offset = brightness * 255.0;
    [
        [1.0, 0.0, 0.0, 0.0, offset],
        [0.0, 1.0, 0.0, 0.0, offset],
        [0.0, 0.0, 1.0, 0.0, offset],
        [0.0, 0.0, 0.0, 1.0, 0.0],
    ]
}

pub fn flatten_matrix(m: &Mat5) -> [f64; 20] {
    flatten(m)
}
