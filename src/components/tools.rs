//! Tool engine: pointer-driven editing tools over the active layer.
//!
//! Every tool runs through the same start/move/end lifecycle. Continuous
//! tools (pencil, eraser, noise) write pixels during the drag and report the
//! full before/after diff on release; click tools (fill, color replace,
//! eyedropper) complete on the press; shape tools (line, gradient, select)
//! preview during the drag and commit on release.
//!
//! Per-stroke bookkeeping is two maps keyed by packed pixel index:
//! `original` is first-touch-wins (the value before the stroke touched the
//! pixel), `changed` is last-write-wins (the value the stroke left behind).

use std::collections::HashMap;

use image::{Rgba, RgbaImage};
use uuid::Uuid;

use crate::canvas::Pixel;
use crate::color::{blend_colors, colors_equal, erase_color, gradient_colors};
use crate::geometry::{Rect, SymmetryMode, apply_symmetry, bresenham_line, brush_points};
use crate::regions::{SkinRegion, is_valid_for_paint_target};

/// Color tolerance shared by the fill and color-replace tools.
const MATCH_TOLERANCE: u8 = 10;

/// Marching-ants placeholder color for selection outline previews.
const MARQUEE_COLOR: Rgba<u8> = Rgba([0, 120, 215, 255]);

// ============================================================================
// TOOL KINDS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ToolKind {
    #[default]
    Pencil,
    Eraser,
    Noise,
    Fill,
    ColorReplace,
    Line,
    Gradient,
    Eyedropper,
    Select,
}

impl ToolKind {
    pub fn label(&self) -> &'static str {
        match self {
            ToolKind::Pencil => "Pencil",
            ToolKind::Eraser => "Eraser",
            ToolKind::Noise => "Noise",
            ToolKind::Fill => "Fill",
            ToolKind::ColorReplace => "Color Replace",
            ToolKind::Line => "Line",
            ToolKind::Gradient => "Gradient",
            ToolKind::Eyedropper => "Eyedropper",
            ToolKind::Select => "Select",
        }
    }

    pub fn all() -> &'static [ToolKind] {
        &[
            ToolKind::Pencil,
            ToolKind::Eraser,
            ToolKind::Noise,
            ToolKind::Fill,
            ToolKind::ColorReplace,
            ToolKind::Line,
            ToolKind::Gradient,
            ToolKind::Eyedropper,
            ToolKind::Select,
        ]
    }
}

// ============================================================================
// CONTEXT / RESULT
// ============================================================================

/// Everything a tool needs for one pointer event. Borrowed fresh from the
/// session per event; the engine itself never holds document state.
pub struct ToolContext<'a> {
    pub layer_id: Uuid,
    /// The active layer's pixel buffer.
    pub pixels: &'a mut RgbaImage,
    /// Flattened document, when a tool samples across layers (eyedropper).
    pub composite: Option<&'a RgbaImage>,
    pub primary_color: Rgba<u8>,
    pub secondary_color: Rgba<u8>,
    pub brush_size: u32,
    pub brush_opacity: f32,
    pub symmetry: SymmetryMode,
    pub paint_target: SkinRegion,
    pub width: u32,
    pub height: u32,
}

impl ToolContext<'_> {
    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    fn paintable(&self, x: i32, y: i32) -> bool {
        self.in_bounds(x, y) && is_valid_for_paint_target(x as u32, y as u32, self.paint_target)
    }
}

/// Rectangular selection over the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selection {
    pub bounds: Rect,
}

/// Outcome of a single pointer event.
#[derive(Default)]
pub struct ToolResult {
    /// Pixels written by this event, with their new colors.
    pub changed_pixels: Vec<Pixel>,
    /// Pre-stroke colors for the changed pixels. Populated only on
    /// completion, paired index-free by coordinate.
    pub original_pixels: Vec<Pixel>,
    /// True when the gesture finished and the diff is ready for history.
    pub is_complete: bool,
    /// Color sampled by the eyedropper.
    pub picked_color: Option<Rgba<u8>>,
    /// Transient overlay pixels (line/gradient/select previews).
    /// `Some(empty)` means "clear the previous preview".
    pub preview_pixels: Option<Vec<Pixel>>,
    /// New selection, when the event changed it.
    pub selection: Option<Selection>,
    pub selection_changed: bool,
}

// ============================================================================
// STROKE STATE
// ============================================================================

/// Mutable state of the gesture in progress.
struct StrokeState {
    active: bool,
    start: (i32, i32),
    last: (i32, i32),
    /// First-touch-wins: color each pixel had before the stroke.
    original: HashMap<u32, Rgba<u8>>,
    /// Last-write-wins: color the stroke left on each pixel.
    changed: HashMap<u32, Rgba<u8>>,
    rng: u64,
}

impl Default for StrokeState {
    fn default() -> Self {
        Self {
            active: false,
            start: (0, 0),
            last: (0, 0),
            original: HashMap::new(),
            changed: HashMap::new(),
            rng: 0x2545_F491_4F6C_DD1D,
        }
    }
}

impl StrokeState {
    fn begin(&mut self, x: i32, y: i32) {
        let rng = self.rng; // noise sequence continues across strokes
        *self = Self::default();
        self.rng = rng;
        self.active = true;
        self.start = (x, y);
        self.last = (x, y);
    }

    /// xorshift64, mapped to [-1, 1).
    fn next_signed(&mut self) -> f32 {
        let mut v = self.rng;
        v ^= v << 13;
        v ^= v >> 7;
        v ^= v << 17;
        self.rng = v;
        ((v >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
    }
}

// ============================================================================
// TOOL ENGINE
// ============================================================================

/// The active tool plus in-flight stroke state. One engine per session.
pub struct ToolEngine {
    kind: ToolKind,
    stroke: StrokeState,
}

impl Default for ToolEngine {
    fn default() -> Self {
        Self { kind: ToolKind::Pencil, stroke: StrokeState::default() }
    }
}

impl ToolEngine {
    pub fn kind(&self) -> ToolKind {
        self.kind
    }

    /// Switch tools. Any in-flight gesture is discarded without committing.
    pub fn set_kind(&mut self, kind: ToolKind) {
        self.kind = kind;
        self.reset();
    }

    pub fn is_stroke_active(&self) -> bool {
        self.stroke.active
    }

    /// Abort the in-flight gesture, discarding its bookkeeping. The caller is
    /// responsible for restoring [`Self::stroke_originals`] first if pixels
    /// were already written.
    pub fn reset(&mut self) {
        let rng = self.stroke.rng;
        self.stroke = StrokeState::default();
        self.stroke.rng = rng;
    }

    /// Pre-stroke colors of every pixel the in-flight gesture has written,
    /// for aborting a stroke midway.
    pub fn stroke_originals(&self, width: u32) -> Vec<Pixel> {
        self.stroke
            .original
            .iter()
            .map(|(&key, &color)| Pixel::new(key % width, key / width, color))
            .collect()
    }

    // ---- lifecycle ----------------------------------------------------------

    pub fn on_start(&mut self, ctx: &mut ToolContext, x: i32, y: i32) -> ToolResult {
        self.stroke.begin(x, y);
        match self.kind {
            ToolKind::Pencil | ToolKind::Eraser | ToolKind::Noise => {
                let changed = self.stamp(ctx, x, y);
                ToolResult { changed_pixels: changed, ..Default::default() }
            }
            ToolKind::Fill => {
                let result = self.flood_fill(ctx, x, y);
                self.reset();
                result
            }
            ToolKind::ColorReplace => {
                let result = self.color_replace(ctx, x, y);
                self.reset();
                result
            }
            ToolKind::Line => ToolResult {
                preview_pixels: Some(self.line_preview(ctx, x, y)),
                ..Default::default()
            },
            ToolKind::Gradient => ToolResult {
                preview_pixels: Some(self.gradient_preview(ctx, x, y)),
                ..Default::default()
            },
            ToolKind::Eyedropper => ToolResult {
                picked_color: Some(sample_color(ctx, x, y)),
                is_complete: true,
                ..Default::default()
            },
            ToolKind::Select => ToolResult {
                preview_pixels: Some(selection_outline(ctx, self.stroke.start, (x, y))),
                ..Default::default()
            },
        }
    }

    pub fn on_move(&mut self, ctx: &mut ToolContext, x: i32, y: i32) -> ToolResult {
        if !self.stroke.active {
            return ToolResult::default();
        }
        let (lx, ly) = self.stroke.last;
        self.stroke.last = (x, y);
        match self.kind {
            ToolKind::Pencil | ToolKind::Eraser | ToolKind::Noise => {
                // Interpolate so fast drags leave no gaps; the previous
                // position was already stamped by the prior event.
                let mut changed = Vec::new();
                for &(px, py) in bresenham_line(lx, ly, x, y).iter().skip(1) {
                    changed.extend(self.stamp(ctx, px, py));
                }
                ToolResult { changed_pixels: changed, ..Default::default() }
            }
            ToolKind::Line => ToolResult {
                preview_pixels: Some(self.line_preview(ctx, x, y)),
                ..Default::default()
            },
            ToolKind::Gradient => ToolResult {
                preview_pixels: Some(self.gradient_preview(ctx, x, y)),
                ..Default::default()
            },
            ToolKind::Eyedropper => ToolResult {
                picked_color: Some(sample_color(ctx, x, y)),
                is_complete: true,
                ..Default::default()
            },
            ToolKind::Select => ToolResult {
                preview_pixels: Some(selection_outline(ctx, self.stroke.start, (x, y))),
                ..Default::default()
            },
            ToolKind::Fill | ToolKind::ColorReplace => ToolResult::default(),
        }
    }

    pub fn on_end(&mut self, ctx: &mut ToolContext, x: i32, y: i32) -> ToolResult {
        if !self.stroke.active {
            return ToolResult::default();
        }
        let result = match self.kind {
            ToolKind::Pencil | ToolKind::Eraser | ToolKind::Noise => {
                if (x, y) != self.stroke.last {
                    let (lx, ly) = self.stroke.last;
                    for &(px, py) in bresenham_line(lx, ly, x, y).iter().skip(1) {
                        self.stamp(ctx, px, py);
                    }
                }
                // The stroke map already holds every stamped pixel, the final
                // segment included
                self.drain_diff(ctx.width)
            }
            ToolKind::Line => {
                let (sx, sy) = self.stroke.start;
                for &(px, py) in &bresenham_line(sx, sy, x, y) {
                    self.stamp(ctx, px, py);
                }
                let mut result = self.drain_diff(ctx.width);
                result.preview_pixels = Some(Vec::new());
                result
            }
            ToolKind::Gradient => {
                let mut result = self.commit_gradient(ctx, x, y);
                result.preview_pixels = Some(Vec::new());
                result
            }
            ToolKind::Select => {
                let selection = if (x, y) == self.stroke.start {
                    None
                } else {
                    let (sx, sy) = self.stroke.start;
                    Some(Selection { bounds: clamp_rect(Rect::from_drag(sx, sy, x, y), ctx) })
                };
                ToolResult {
                    selection,
                    selection_changed: true,
                    preview_pixels: Some(Vec::new()),
                    is_complete: true,
                    ..Default::default()
                }
            }
            ToolKind::Eyedropper => ToolResult {
                picked_color: Some(sample_color(ctx, x, y)),
                is_complete: true,
                ..Default::default()
            },
            ToolKind::Fill | ToolKind::ColorReplace => ToolResult::default(),
        };
        self.reset();
        result
    }

    // ---- continuous stamping ------------------------------------------------

    /// Stamp the brush footprint (with symmetry mirrors) at one path point.
    /// Returns the pixels written by this stamp.
    fn stamp(&mut self, ctx: &mut ToolContext, x: i32, y: i32) -> Vec<Pixel> {
        let mut written = Vec::new();
        for (bx, by) in brush_points(x, y, ctx.brush_size) {
            for &(sx, sy) in apply_symmetry(bx, by, ctx.symmetry, ctx.width, ctx.height).as_slice() {
                if !ctx.paintable(sx, sy) {
                    continue;
                }
                let (ux, uy) = (sx as u32, sy as u32);
                let key = uy * ctx.width + ux;
                let current = *ctx.pixels.get_pixel(ux, uy);
                self.stroke.original.entry(key).or_insert(current);

                let next = match self.kind {
                    ToolKind::Pencil | ToolKind::Line => {
                        blend_colors(current, ctx.primary_color, ctx.brush_opacity)
                    }
                    ToolKind::Eraser => erase_color(current, ctx.brush_opacity),
                    ToolKind::Noise => {
                        // Perturbing fully transparent pixels would reveal
                        // garbage RGB once anything raises their alpha
                        if current[3] == 0 {
                            continue;
                        }
                        let range = 255.0 * ctx.brush_opacity.clamp(0.0, 1.0);
                        let mut c = current;
                        for ch in 0..3 {
                            let delta = (range * self.stroke.next_signed()).round();
                            c[ch] = (current[ch] as f32 + delta).clamp(0.0, 255.0) as u8;
                        }
                        c
                    }
                    _ => current,
                };

                if next != current {
                    ctx.pixels.put_pixel(ux, uy, next);
                    self.stroke.changed.insert(key, next);
                    written.push(Pixel::new(ux, uy, next));
                }
            }
        }
        written
    }

    /// Convert the stroke maps into a completed diff result.
    fn drain_diff(&mut self, width: u32) -> ToolResult {
        let changed_pixels: Vec<Pixel> = self
            .stroke
            .changed
            .iter()
            .map(|(&key, &color)| Pixel::new(key % width, key / width, color))
            .collect();
        let original_pixels = changed_pixels
            .iter()
            .map(|p| Pixel::new(p.x, p.y, self.stroke.original[&(p.y * width + p.x)]))
            .collect();
        ToolResult {
            changed_pixels,
            original_pixels,
            is_complete: true,
            ..Default::default()
        }
    }

    // ---- fill / replace -----------------------------------------------------

    /// 4-connected flood fill from the press point. Matches against the
    /// pre-fill colors with tolerance, so already-written neighbors can't
    /// extend the match region.
    fn flood_fill(&mut self, ctx: &mut ToolContext, x: i32, y: i32) -> ToolResult {
        if !ctx.paintable(x, y) {
            return ToolResult { is_complete: true, ..Default::default() };
        }
        let target = *ctx.pixels.get_pixel(x as u32, y as u32);
        // Filling with the exact color already there would churn history
        if target == ctx.primary_color {
            return ToolResult { is_complete: true, ..Default::default() };
        }

        let mut visited = vec![false; (ctx.width * ctx.height) as usize];
        let mut stack = vec![(x, y)];
        while let Some((px, py)) = stack.pop() {
            if !ctx.paintable(px, py) {
                continue;
            }
            let (ux, uy) = (px as u32, py as u32);
            let key = uy * ctx.width + ux;
            if visited[key as usize] {
                continue;
            }
            visited[key as usize] = true;

            let current = *ctx.pixels.get_pixel(ux, uy);
            if !colors_equal(current, target, MATCH_TOLERANCE) {
                continue;
            }

            self.stroke.original.entry(key).or_insert(current);
            let next = blend_colors(current, ctx.primary_color, ctx.brush_opacity);
            if next != current {
                ctx.pixels.put_pixel(ux, uy, next);
                self.stroke.changed.insert(key, next);
            }

            stack.push((px + 1, py));
            stack.push((px - 1, py));
            stack.push((px, py + 1));
            stack.push((px, py - 1));
        }

        self.drain_diff(ctx.width)
    }

    /// Replace every canvas pixel matching the pressed color, across both UV
    /// layers, with the primary color verbatim (no blending — the typical use
    /// is palette swaps that must preserve exact alpha).
    fn color_replace(&mut self, ctx: &mut ToolContext, x: i32, y: i32) -> ToolResult {
        if !ctx.in_bounds(x, y) {
            return ToolResult { is_complete: true, ..Default::default() };
        }
        let seed = *ctx.pixels.get_pixel(x as u32, y as u32);
        // Transparent seed would repaint every unpainted region pixel
        if seed[3] == 0 || seed == ctx.primary_color {
            return ToolResult { is_complete: true, ..Default::default() };
        }

        for uy in 0..ctx.height {
            for ux in 0..ctx.width {
                if crate::regions::classify(ux, uy).is_none() {
                    continue;
                }
                let current = *ctx.pixels.get_pixel(ux, uy);
                if !colors_equal(current, seed, MATCH_TOLERANCE) {
                    continue;
                }
                let key = uy * ctx.width + ux;
                self.stroke.original.entry(key).or_insert(current);
                ctx.pixels.put_pixel(ux, uy, ctx.primary_color);
                self.stroke.changed.insert(key, ctx.primary_color);
            }
        }

        self.drain_diff(ctx.width)
    }

    // ---- line ---------------------------------------------------------------

    fn line_preview(&self, ctx: &ToolContext, x: i32, y: i32) -> Vec<Pixel> {
        let (sx, sy) = self.stroke.start;
        let mut preview = Vec::new();
        for (px, py) in bresenham_line(sx, sy, x, y) {
            for (bx, by) in brush_points(px, py, ctx.brush_size) {
                for &(mx, my) in apply_symmetry(bx, by, ctx.symmetry, ctx.width, ctx.height).as_slice() {
                    if !ctx.paintable(mx, my) {
                        continue;
                    }
                    let current = *ctx.pixels.get_pixel(mx as u32, my as u32);
                    preview.push(Pixel::new(
                        mx as u32,
                        my as u32,
                        blend_colors(current, ctx.primary_color, ctx.brush_opacity),
                    ));
                }
            }
        }
        preview
    }

    // ---- gradient -----------------------------------------------------------

    fn gradient_preview(&self, ctx: &ToolContext, x: i32, y: i32) -> Vec<Pixel> {
        let (sx, sy) = self.stroke.start;
        let path = bresenham_line(sx, sy, x, y);
        if path.len() < 2 {
            return path
                .into_iter()
                .filter(|&(px, py)| ctx.paintable(px, py))
                .map(|(px, py)| Pixel::new(px as u32, py as u32, ctx.primary_color))
                .collect();
        }
        let ramp = gradient_colors(ctx.primary_color, ctx.secondary_color, path.len());
        path.into_iter()
            .zip(ramp)
            .filter(|&((px, py), _)| ctx.paintable(px, py))
            .map(|((px, py), color)| Pixel::new(px as u32, py as u32, color))
            .collect()
    }

    /// Fill the dragged bounding box with a linear primary→secondary ramp.
    /// Each pixel projects onto the drag axis; the projection parameter picks
    /// the ramp sample. No brush footprint and no symmetry — the gesture
    /// already defines the full extent.
    fn commit_gradient(&mut self, ctx: &mut ToolContext, x: i32, y: i32) -> ToolResult {
        let (sx, sy) = self.stroke.start;
        if (x, y) == (sx, sy) {
            // Degenerate drag paints the single pressed pixel
            if ctx.paintable(x, y) {
                let (ux, uy) = (x as u32, y as u32);
                let key = uy * ctx.width + ux;
                let current = *ctx.pixels.get_pixel(ux, uy);
                let next = blend_colors(current, ctx.primary_color, ctx.brush_opacity);
                if next != current {
                    self.stroke.original.insert(key, current);
                    ctx.pixels.put_pixel(ux, uy, next);
                    self.stroke.changed.insert(key, next);
                }
            }
            return self.drain_diff(ctx.width);
        }

        let steps = bresenham_line(sx, sy, x, y).len();
        let ramp = gradient_colors(ctx.primary_color, ctx.secondary_color, steps);
        let rect = clamp_rect(Rect::from_drag(sx, sy, x, y), ctx);

        let dx = (x - sx) as f32;
        let dy = (y - sy) as f32;
        let len_sq = dx * dx + dy * dy;

        for uy in rect.y..rect.y + rect.height {
            for ux in rect.x..rect.x + rect.width {
                if !ctx.paintable(ux as i32, uy as i32) {
                    continue;
                }
                let t = (((ux as i32 - sx) as f32 * dx + (uy as i32 - sy) as f32 * dy) / len_sq)
                    .clamp(0.0, 1.0);
                let idx = (t * (steps - 1) as f32).round() as usize;

                let key = uy * ctx.width + ux;
                let current = *ctx.pixels.get_pixel(ux, uy);
                let next = blend_colors(current, ramp[idx], ctx.brush_opacity);
                if next != current {
                    self.stroke.original.entry(key).or_insert(current);
                    ctx.pixels.put_pixel(ux, uy, next);
                    self.stroke.changed.insert(key, next);
                }
            }
        }

        self.drain_diff(ctx.width)
    }
}

// ============================================================================
// FREE HELPERS
// ============================================================================

/// Composite-first color sampling. Out-of-bounds reads as transparent black.
fn sample_color(ctx: &ToolContext, x: i32, y: i32) -> Rgba<u8> {
    if !ctx.in_bounds(x, y) {
        return Rgba([0, 0, 0, 0]);
    }
    let (ux, uy) = (x as u32, y as u32);
    match ctx.composite {
        Some(composite) => *composite.get_pixel(ux, uy),
        None => *ctx.pixels.get_pixel(ux, uy),
    }
}

fn clamp_rect(rect: Rect, ctx: &ToolContext) -> Rect {
    let x = rect.x.min(ctx.width.saturating_sub(1));
    let y = rect.y.min(ctx.height.saturating_sub(1));
    Rect::new(x, y, rect.width.min(ctx.width - x), rect.height.min(ctx.height - y))
}

/// One-pixel border of the dragged rectangle, for the selection preview.
fn selection_outline(ctx: &ToolContext, start: (i32, i32), end: (i32, i32)) -> Vec<Pixel> {
    let rect = clamp_rect(Rect::from_drag(start.0, start.1, end.0, end.1), ctx);
    let mut outline = Vec::new();
    for ux in rect.x..rect.x + rect.width {
        outline.push(Pixel::new(ux, rect.y, MARQUEE_COLOR));
        outline.push(Pixel::new(ux, rect.y + rect.height - 1, MARQUEE_COLOR));
    }
    for uy in rect.y + 1..(rect.y + rect.height).saturating_sub(1) {
        outline.push(Pixel::new(rect.x, uy, MARQUEE_COLOR));
        outline.push(Pixel::new(rect.x + rect.width - 1, uy, MARQUEE_COLOR));
    }
    outline
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::DEFAULT_SEED_COLOR;
    use crate::regions;

    fn seeded_canvas() -> RgbaImage {
        let mut img = RgbaImage::new(64, 64);
        for y in 0..64 {
            for x in 0..64 {
                if regions::is_base_pixel(x, y) {
                    img.put_pixel(x, y, DEFAULT_SEED_COLOR);
                }
            }
        }
        img
    }

    fn ctx<'a>(pixels: &'a mut RgbaImage, target: SkinRegion) -> ToolContext<'a> {
        ToolContext {
            layer_id: Uuid::new_v4(),
            pixels,
            composite: None,
            primary_color: Rgba([255, 0, 0, 255]),
            secondary_color: Rgba([0, 0, 255, 255]),
            brush_size: 1,
            brush_opacity: 1.0,
            symmetry: SymmetryMode::None,
            paint_target: target,
            width: 64,
            height: 64,
        }
    }

    #[test]
    fn pencil_press_and_release_paints_single_pixel() {
        let mut img = seeded_canvas();
        let mut engine = ToolEngine::default();
        let mut c = ctx(&mut img, SkinRegion::Base);

        let start = engine.on_start(&mut c, 10, 10);
        assert_eq!(start.changed_pixels, vec![Pixel::new(10, 10, Rgba([255, 0, 0, 255]))]);
        assert!(!start.is_complete);

        let end = engine.on_end(&mut c, 10, 10);
        assert!(end.is_complete);
        assert_eq!(end.changed_pixels.len(), 1);
        assert_eq!(end.original_pixels, vec![Pixel::new(10, 10, DEFAULT_SEED_COLOR)]);
        assert_eq!(*img.get_pixel(10, 10), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn pencil_drag_interpolates_without_gaps() {
        let mut img = seeded_canvas();
        let mut engine = ToolEngine::default();
        let mut c = ctx(&mut img, SkinRegion::Base);

        engine.on_start(&mut c, 20, 20);
        // Jump several pixels in one event, as a fast drag does
        engine.on_move(&mut c, 25, 24);
        let end = engine.on_end(&mut c, 25, 24);
        let expected: Vec<(i32, i32)> = bresenham_line(20, 20, 25, 24);
        assert_eq!(end.changed_pixels.len(), expected.len());
        for (x, y) in expected {
            assert_eq!(*img.get_pixel(x as u32, y as u32), Rgba([255, 0, 0, 255]));
        }
    }

    #[test]
    fn release_away_from_last_point_yields_unique_diff() {
        let mut img = seeded_canvas();
        let mut engine = ToolEngine::default();
        let mut c = ctx(&mut img, SkinRegion::Base);

        engine.on_start(&mut c, 10, 10);
        // The final segment stamps during on_end; its pixels must appear in
        // the committed diff exactly once
        let end = engine.on_end(&mut c, 13, 10);
        let mut coords: Vec<(u32, u32)> =
            end.changed_pixels.iter().map(|p| (p.x, p.y)).collect();
        coords.sort_unstable();
        let len = coords.len();
        coords.dedup();
        assert_eq!(coords.len(), len);
        assert_eq!(len, 4);
        assert_eq!(end.original_pixels.len(), len);
    }

    #[test]
    fn first_touch_original_survives_overpainting() {
        let mut img = seeded_canvas();
        let mut engine = ToolEngine::default();
        let mut c = ctx(&mut img, SkinRegion::Base);
        c.brush_opacity = 0.5;

        engine.on_start(&mut c, 10, 10);
        // Crossing the same pixel again darkens it further but must not
        // overwrite the recorded original
        engine.on_move(&mut c, 11, 10);
        engine.on_move(&mut c, 10, 10);
        let end = engine.on_end(&mut c, 10, 10);
        let original = end
            .original_pixels
            .iter()
            .find(|p| p.x == 10 && p.y == 10)
            .expect("pixel touched");
        assert_eq!(original.color, DEFAULT_SEED_COLOR);
    }

    #[test]
    fn paint_target_gates_writes() {
        let mut img = seeded_canvas();
        let mut engine = ToolEngine::default();
        // (10, 10) is head base; painting it with overlay target must no-op
        let mut c = ctx(&mut img, SkinRegion::Overlay);
        engine.on_start(&mut c, 10, 10);
        let end = engine.on_end(&mut c, 10, 10);
        assert!(end.changed_pixels.is_empty());
        assert_eq!(*img.get_pixel(10, 10), DEFAULT_SEED_COLOR);
    }

    #[test]
    fn symmetry_mirrors_pencil_writes() {
        let mut img = seeded_canvas();
        let mut engine = ToolEngine::default();
        let mut c = ctx(&mut img, SkinRegion::Base);
        c.symmetry = SymmetryMode::Horizontal;

        // (10, 20) mirrors to (53, 20) — leg and arm faces, both base
        engine.on_start(&mut c, 10, 20);
        engine.on_end(&mut c, 10, 20);
        assert_eq!(*img.get_pixel(10, 20), Rgba([255, 0, 0, 255]));
        assert_eq!(*img.get_pixel(53, 20), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn eraser_reduces_alpha() {
        let mut img = seeded_canvas();
        let mut engine = ToolEngine::default();
        engine.set_kind(ToolKind::Eraser);
        let mut c = ctx(&mut img, SkinRegion::Base);
        c.brush_opacity = 0.5;

        engine.on_start(&mut c, 10, 10);
        engine.on_end(&mut c, 10, 10);
        let px = *img.get_pixel(10, 10);
        assert_eq!(px[3], 255 - 128);
        assert_eq!(px[0], DEFAULT_SEED_COLOR[0]);
    }

    #[test]
    fn noise_preserves_alpha_and_skips_transparent() {
        let mut img = seeded_canvas();
        let mut engine = ToolEngine::default();
        engine.set_kind(ToolKind::Noise);
        let mut c = ctx(&mut img, SkinRegion::Overlay);
        c.brush_opacity = 0.8;

        // Hat overlay is transparent — noise must not invent pixels there
        engine.on_start(&mut c, 42, 3);
        let end = engine.on_end(&mut c, 42, 3);
        assert!(end.changed_pixels.is_empty());
        assert_eq!(*img.get_pixel(42, 3), Rgba([0, 0, 0, 0]));

        let mut c = ctx(&mut img, SkinRegion::Base);
        c.brush_opacity = 0.8;
        engine.on_start(&mut c, 10, 10);
        engine.on_end(&mut c, 10, 10);
        assert_eq!(img.get_pixel(10, 10)[3], 255);
    }

    #[test]
    fn fill_is_bounded_by_paint_target_region() {
        let mut img = seeded_canvas();
        let mut engine = ToolEngine::default();
        engine.set_kind(ToolKind::Fill);
        let mut c = ctx(&mut img, SkinRegion::Overlay);

        // Fill the transparent hat overlay from inside its top face
        let result = engine.on_start(&mut c, 42, 3);
        assert!(result.is_complete);
        assert!(!result.changed_pixels.is_empty());
        assert_eq!(*img.get_pixel(42, 3), Rgba([255, 0, 0, 255]));
        assert_eq!(*img.get_pixel(47, 7), Rgba([255, 0, 0, 255]));
        // Base pixels and seam gaps stay untouched
        assert_eq!(*img.get_pixel(8, 8), DEFAULT_SEED_COLOR);
        assert_eq!(*img.get_pixel(39, 0), Rgba([0, 0, 0, 0]));
        for p in &result.changed_pixels {
            assert!(regions::is_overlay_pixel(p.x, p.y));
        }
    }

    #[test]
    fn fill_with_identical_color_is_noop() {
        let mut img = seeded_canvas();
        let mut engine = ToolEngine::default();
        engine.set_kind(ToolKind::Fill);
        let mut c = ctx(&mut img, SkinRegion::Base);
        c.primary_color = DEFAULT_SEED_COLOR;

        let result = engine.on_start(&mut c, 10, 10);
        assert!(result.is_complete);
        assert!(result.changed_pixels.is_empty());
    }

    #[test]
    fn fill_tolerance_respects_original_colors() {
        let mut img = seeded_canvas();
        // A near-seed pixel inside the matched area and a far one outside it
        img.put_pixel(9, 9, Rgba([165, 160, 160, 255]));
        img.put_pixel(12, 9, Rgba([60, 60, 60, 255]));

        let mut engine = ToolEngine::default();
        engine.set_kind(ToolKind::Fill);
        let mut c = ctx(&mut img, SkinRegion::Base);
        engine.on_start(&mut c, 10, 10);

        assert_eq!(*img.get_pixel(9, 9), Rgba([255, 0, 0, 255]));
        assert_eq!(*img.get_pixel(12, 9), Rgba([60, 60, 60, 255]));
    }

    #[test]
    fn color_replace_spans_whole_canvas_directly() {
        let mut img = seeded_canvas();
        // Semi-transparent primary: replacement must be verbatim, not blended
        let mut engine = ToolEngine::default();
        engine.set_kind(ToolKind::ColorReplace);
        let mut c = ctx(&mut img, SkinRegion::Base);
        c.primary_color = Rgba([0, 255, 0, 128]);

        let result = engine.on_start(&mut c, 10, 10);
        assert!(result.is_complete);
        // Seed color appears on every base region; all of it swaps
        assert_eq!(*img.get_pixel(10, 10), Rgba([0, 255, 0, 128]));
        assert_eq!(*img.get_pixel(24, 24), Rgba([0, 255, 0, 128]));
        assert_eq!(*img.get_pixel(20, 52), Rgba([0, 255, 0, 128]));
        // Transparent overlay untouched
        assert_eq!(*img.get_pixel(42, 3), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn color_replace_transparent_seed_is_noop() {
        let mut img = seeded_canvas();
        let mut engine = ToolEngine::default();
        engine.set_kind(ToolKind::ColorReplace);
        let mut c = ctx(&mut img, SkinRegion::Overlay);
        let result = engine.on_start(&mut c, 42, 3);
        assert!(result.is_complete);
        assert!(result.changed_pixels.is_empty());
    }

    #[test]
    fn line_previews_then_commits_on_release() {
        let mut img = seeded_canvas();
        let mut engine = ToolEngine::default();
        engine.set_kind(ToolKind::Line);
        let mut c = ctx(&mut img, SkinRegion::Base);

        engine.on_start(&mut c, 17, 20);
        let mv = engine.on_move(&mut c, 22, 20);
        let preview = mv.preview_pixels.expect("preview present");
        assert_eq!(preview.len(), 6);
        // Preview writes nothing
        assert_eq!(*c.pixels.get_pixel(20, 20), DEFAULT_SEED_COLOR);

        let end = engine.on_end(&mut c, 22, 20);
        assert!(end.is_complete);
        assert_eq!(end.preview_pixels, Some(Vec::new()));
        // The release writes the full path and reports it as the diff
        assert_eq!(end.changed_pixels.len(), 6);
        assert_eq!(end.original_pixels.len(), 6);
        for p in &end.original_pixels {
            assert_eq!(p.color, DEFAULT_SEED_COLOR);
        }
        for x in 17..=22 {
            assert_eq!(*img.get_pixel(x, 20), Rgba([255, 0, 0, 255]));
        }
    }

    #[test]
    fn gradient_commit_fills_drag_box_with_ramp() {
        let mut img = seeded_canvas();
        let mut engine = ToolEngine::default();
        engine.set_kind(ToolKind::Gradient);
        let mut c = ctx(&mut img, SkinRegion::Base);

        engine.on_start(&mut c, 17, 20);
        let end = engine.on_end(&mut c, 24, 20);
        assert!(end.is_complete);
        // Endpoints take the endpoint colors
        assert_eq!(*img.get_pixel(17, 20), Rgba([255, 0, 0, 255]));
        assert_eq!(*img.get_pixel(24, 20), Rgba([0, 0, 255, 255]));
        // Interior pixels interpolate: red falls, blue rises
        let mid = *img.get_pixel(20, 20);
        assert!(mid[0] < 255 && mid[0] > 0);
        assert!(mid[2] < 255 && mid[2] > 0);
        // The box spans a single row here, neighbors untouched
        assert_eq!(*img.get_pixel(20, 21), DEFAULT_SEED_COLOR);
    }

    #[test]
    fn gradient_zero_drag_paints_primary_pixel() {
        let mut img = seeded_canvas();
        let mut engine = ToolEngine::default();
        engine.set_kind(ToolKind::Gradient);
        let mut c = ctx(&mut img, SkinRegion::Base);

        engine.on_start(&mut c, 10, 10);
        let end = engine.on_end(&mut c, 10, 10);
        assert_eq!(end.changed_pixels, vec![Pixel::new(10, 10, Rgba([255, 0, 0, 255]))]);
    }

    #[test]
    fn eyedropper_samples_composite_first() {
        let mut img = seeded_canvas();
        let composite = {
            let mut c = img.clone();
            c.put_pixel(10, 10, Rgba([1, 2, 3, 255]));
            c
        };
        let mut engine = ToolEngine::default();
        engine.set_kind(ToolKind::Eyedropper);
        let mut c = ctx(&mut img, SkinRegion::Base);
        c.composite = Some(&composite);

        let result = engine.on_start(&mut c, 10, 10);
        assert_eq!(result.picked_color, Some(Rgba([1, 2, 3, 255])));
        assert!(result.changed_pixels.is_empty());

        // Out of bounds reads as transparent black
        let result = engine.on_start(&mut c, -1, 70);
        assert_eq!(result.picked_color, Some(Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn select_drag_yields_normalized_rect_and_zero_drag_clears() {
        let mut img = seeded_canvas();
        let mut engine = ToolEngine::default();
        engine.set_kind(ToolKind::Select);
        let mut c = ctx(&mut img, SkinRegion::Base);

        engine.on_start(&mut c, 12, 14);
        let end = engine.on_end(&mut c, 5, 3);
        assert!(end.selection_changed);
        assert_eq!(end.selection, Some(Selection { bounds: Rect::new(5, 3, 8, 12) }));

        engine.on_start(&mut c, 9, 9);
        let end = engine.on_end(&mut c, 9, 9);
        assert!(end.selection_changed);
        assert_eq!(end.selection, None);
    }

    #[test]
    fn switching_tools_discards_in_flight_stroke() {
        let mut img = seeded_canvas();
        let mut engine = ToolEngine::default();
        let mut c = ctx(&mut img, SkinRegion::Base);
        engine.on_start(&mut c, 10, 10);
        assert!(engine.is_stroke_active());
        engine.set_kind(ToolKind::Eraser);
        assert!(!engine.is_stroke_active());
        // A move after the switch is inert
        let result = engine.on_move(&mut c, 11, 10);
        assert!(result.changed_pixels.is_empty());
    }

    #[test]
    fn stroke_originals_report_pre_stroke_colors() {
        let mut img = seeded_canvas();
        let mut engine = ToolEngine::default();
        let mut c = ctx(&mut img, SkinRegion::Base);
        engine.on_start(&mut c, 10, 10);
        engine.on_move(&mut c, 11, 10);
        let originals = engine.stroke_originals(64);
        assert_eq!(originals.len(), 2);
        for p in originals {
            assert_eq!(p.color, DEFAULT_SEED_COLOR);
        }
    }
}
