//! Color primitives: alpha compositing, alpha erase, tolerance comparison,
//! and gradient ramps. All functions are pure and operate on straight
//! (non-premultiplied) RGBA.

use image::Rgba;

/// Standard "over" alpha compositing of `overlay` onto `base`.
///
/// The overlay's effective alpha is `overlay.a/255 * opacity`. The result is
/// canonical transparent black when the combined alpha is exactly zero, so
/// downstream un-premultiply code never divides by zero.
pub fn blend_colors(base: Rgba<u8>, overlay: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    // Fast path: nothing to blend
    if overlay[3] == 0 || opacity <= 0.0 {
        return base;
    }
    // Fast path: fully opaque overlay at full opacity completely replaces the base
    if opacity >= 1.0 && overlay[3] == 255 {
        return overlay;
    }

    let opacity = opacity.clamp(0.0, 1.0);
    let base_a = base[3] as f32 / 255.0;
    let top_a = (overlay[3] as f32 / 255.0) * opacity;

    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let mut out = [0u8; 4];
    for c in 0..3 {
        let b = base[c] as f32 / 255.0;
        let t = overlay[c] as f32 / 255.0;
        let v = (t * top_a + b * base_a * (1.0 - top_a)) / out_a;
        out[c] = (v * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

/// Reduce `base`'s alpha by `round(255 * strength)`, clamped at zero.
///
/// RGB channels pass through untouched unless the alpha reaches zero, in
/// which case the pixel collapses to canonical transparent black.
pub fn erase_color(base: Rgba<u8>, strength: f32) -> Rgba<u8> {
    let amount = (255.0 * strength.clamp(0.0, 1.0)).round() as u8;
    let a = base[3].saturating_sub(amount);
    if a == 0 {
        Rgba([0, 0, 0, 0])
    } else {
        Rgba([base[0], base[1], base[2], a])
    }
}

/// Per-channel absolute comparison across all four channels.
pub fn colors_equal(a: Rgba<u8>, b: Rgba<u8>, tolerance: u8) -> bool {
    (0..4).all(|c| a[c].abs_diff(b[c]) <= tolerance)
}

/// Linear per-channel interpolation from `from` to `to` in `steps` samples,
/// rounded to the nearest integer.
///
/// `steps` must be >= 2 — `t = i/(steps-1)` degenerates at 1 and callers are
/// required to special-case single-point ramps before calling this.
pub fn gradient_colors(from: Rgba<u8>, to: Rgba<u8>, steps: usize) -> Vec<Rgba<u8>> {
    debug_assert!(steps >= 2, "gradient_colors requires steps >= 2");
    let mut out = Vec::with_capacity(steps);
    let denom = steps.saturating_sub(1).max(1) as f32;
    for i in 0..steps {
        let t = i as f32 / denom;
        let mut color = [0u8; 4];
        for c in 0..4 {
            let v = from[c] as f32 + (to[c] as f32 - from[c] as f32) * t;
            color[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        out.push(Rgba(color));
    }
    out
}
