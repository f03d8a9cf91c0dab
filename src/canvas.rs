//! Layered document model: layers, blend modes, and the CPU compositor.
//!
//! The document owns every layer buffer exclusively; tools mutate the active
//! layer's pixels in place and commands mutate the layer list. Nothing else
//! touches either.

use chrono::{DateTime, Utc};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::regions;

/// Canonical texture width — both formats are 64 pixels wide.
pub const SKIN_WIDTH: u32 = 64;

/// Flat color used to seed the base layer of a new document. Product choice;
/// the overlay regions staying transparent is the part that matters.
pub const DEFAULT_SEED_COLOR: Rgba<u8> = Rgba([160, 160, 160, 255]);

// ============================================================================
// PIXEL
// ============================================================================

/// One addressed texture pixel, the unit of diff lists and change events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pixel {
    pub x: u32,
    pub y: u32,
    pub color: Rgba<u8>,
}

impl Pixel {
    pub fn new(x: u32, y: u32, color: Rgba<u8>) -> Self {
        Self { x, y, color }
    }
}

// ============================================================================
// FORMAT / MODEL
// ============================================================================

/// Texture format of a skin document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SkinFormat {
    /// 64×64 with distinct left limbs and full overlay coverage.
    #[default]
    Modern,
    /// 64×32 — head/body/right-limb faces plus the hat overlay only.
    Legacy,
}

impl SkinFormat {
    pub fn height(self) -> u32 {
        match self {
            SkinFormat::Modern => 64,
            SkinFormat::Legacy => 32,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SkinFormat::Modern => "Modern (64×64)",
            SkinFormat::Legacy => "Legacy (64×32)",
        }
    }

    pub fn all() -> &'static [SkinFormat] {
        &[SkinFormat::Modern, SkinFormat::Legacy]
    }
}

/// Arm geometry of the model the texture maps onto. The editing core only
/// records it; the region tables are model-independent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayerModel {
    #[default]
    Classic,
    Slim,
}

impl PlayerModel {
    pub fn label(&self) -> &'static str {
        match self {
            PlayerModel::Classic => "Classic",
            PlayerModel::Slim => "Slim",
        }
    }

    pub fn all() -> &'static [PlayerModel] {
        &[PlayerModel::Classic, PlayerModel::Slim]
    }
}

// ============================================================================
// BLEND MODES
// ============================================================================

/// Per-layer blend modes. Channel math mirrors the W3C compositing formulas,
/// applied on normalized straight-alpha channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    SoftLight,
    HardLight,
    Difference,
    Exclusion,
}

impl BlendMode {
    pub fn all() -> &'static [BlendMode] {
        &[
            BlendMode::Normal,
            BlendMode::Multiply,
            BlendMode::Screen,
            BlendMode::Overlay,
            BlendMode::Darken,
            BlendMode::Lighten,
            BlendMode::ColorDodge,
            BlendMode::ColorBurn,
            BlendMode::SoftLight,
            BlendMode::HardLight,
            BlendMode::Difference,
            BlendMode::Exclusion,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            BlendMode::Normal => "Normal",
            BlendMode::Multiply => "Multiply",
            BlendMode::Screen => "Screen",
            BlendMode::Overlay => "Overlay",
            BlendMode::Darken => "Darken",
            BlendMode::Lighten => "Lighten",
            BlendMode::ColorDodge => "Color Dodge",
            BlendMode::ColorBurn => "Color Burn",
            BlendMode::SoftLight => "Soft Light",
            BlendMode::HardLight => "Hard Light",
            BlendMode::Difference => "Difference",
            BlendMode::Exclusion => "Exclusion",
        }
    }
}

/// Composite `top` onto `base` with the given blend mode and layer opacity.
pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>, mode: BlendMode, opacity: f32) -> Rgba<u8> {
    // Fast path: fully transparent top pixel — nothing to blend
    if top[3] == 0 || opacity <= 0.0 {
        return base;
    }
    // Fast path: Normal blend, full opacity, fully opaque top — overwrite
    if matches!(mode, BlendMode::Normal) && opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let opacity = opacity.clamp(0.0, 1.0);

    let base_r = base[0] as f32 / 255.0;
    let base_g = base[1] as f32 / 255.0;
    let base_b = base[2] as f32 / 255.0;
    let base_a = base[3] as f32 / 255.0;

    let top_r = top[0] as f32 / 255.0;
    let top_g = top[1] as f32 / 255.0;
    let top_b = top[2] as f32 / 255.0;
    let top_a = (top[3] as f32 / 255.0) * opacity;

    let (r, g, b) = match mode {
        BlendMode::Normal => (top_r, top_g, top_b),
        BlendMode::Multiply => (base_r * top_r, base_g * top_g, base_b * top_b),
        BlendMode::Screen => (
            1.0 - (1.0 - base_r) * (1.0 - top_r),
            1.0 - (1.0 - base_g) * (1.0 - top_g),
            1.0 - (1.0 - base_b) * (1.0 - top_b),
        ),
        BlendMode::Overlay => (
            overlay_channel(base_r, top_r),
            overlay_channel(base_g, top_g),
            overlay_channel(base_b, top_b),
        ),
        BlendMode::Darken => (base_r.min(top_r), base_g.min(top_g), base_b.min(top_b)),
        BlendMode::Lighten => (base_r.max(top_r), base_g.max(top_g), base_b.max(top_b)),
        BlendMode::ColorDodge => (
            color_dodge_channel(base_r, top_r),
            color_dodge_channel(base_g, top_g),
            color_dodge_channel(base_b, top_b),
        ),
        BlendMode::ColorBurn => (
            color_burn_channel(base_r, top_r),
            color_burn_channel(base_g, top_g),
            color_burn_channel(base_b, top_b),
        ),
        BlendMode::SoftLight => (
            soft_light_channel(base_r, top_r),
            soft_light_channel(base_g, top_g),
            soft_light_channel(base_b, top_b),
        ),
        BlendMode::HardLight => (
            // Hard light is overlay with the operands swapped
            overlay_channel(top_r, base_r),
            overlay_channel(top_g, base_g),
            overlay_channel(top_b, base_b),
        ),
        BlendMode::Difference => (
            (base_r - top_r).abs(),
            (base_g - top_g).abs(),
            (base_b - top_b).abs(),
        ),
        BlendMode::Exclusion => (
            base_r + top_r - 2.0 * base_r * top_r,
            base_g + top_g - 2.0 * base_g * top_g,
            base_b + top_b - 2.0 * base_b * top_b,
        ),
    };

    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let out_r = (r * top_a + base_r * base_a * (1.0 - top_a)) / out_a;
    let out_g = (g * top_a + base_g * base_a * (1.0 - top_a)) / out_a;
    let out_b = (b * top_a + base_b * base_a * (1.0 - top_a)) / out_a;

    Rgba([
        (out_r * 255.0).clamp(0.0, 255.0) as u8,
        (out_g * 255.0).clamp(0.0, 255.0) as u8,
        (out_b * 255.0).clamp(0.0, 255.0) as u8,
        (out_a * 255.0).clamp(0.0, 255.0) as u8,
    ])
}

fn overlay_channel(base: f32, top: f32) -> f32 {
    if base < 0.5 {
        2.0 * base * top
    } else {
        1.0 - 2.0 * (1.0 - base) * (1.0 - top)
    }
}

fn color_burn_channel(base: f32, top: f32) -> f32 {
    if top == 0.0 {
        0.0
    } else {
        (1.0 - (1.0 - base) / top).max(0.0)
    }
}

fn color_dodge_channel(base: f32, top: f32) -> f32 {
    if top >= 1.0 {
        1.0
    } else {
        (base / (1.0 - top)).min(1.0)
    }
}

/// W3C Soft Light formula.
fn soft_light_channel(base: f32, top: f32) -> f32 {
    if top <= 0.5 {
        base - (1.0 - 2.0 * top) * base * (1.0 - base)
    } else {
        let d = if base <= 0.25 {
            ((16.0 * base - 12.0) * base + 4.0) * base
        } else {
            base.sqrt()
        };
        base + (2.0 * top - 1.0) * (d - base)
    }
}

// ============================================================================
// LAYER
// ============================================================================

/// One layer of the document: a full-size RGBA buffer plus display state.
#[derive(Clone)]
pub struct Layer {
    pub id: Uuid,
    pub name: String,
    pub visible: bool,
    pub locked: bool,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    pub pixels: RgbaImage,
}

impl Layer {
    /// Create an empty (fully transparent) layer.
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            visible: true,
            locked: false,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            pixels: RgbaImage::new(width, height),
        }
    }

    /// Deep copy under a fresh id, for the duplicate-layer operation.
    pub fn duplicate(&self) -> Self {
        let mut copy = self.clone();
        copy.id = Uuid::new_v4();
        copy.name = format!("{} copy", self.name);
        copy
    }

    /// Bounds-checked read. Out-of-range coordinates read as absent.
    pub fn pixel_at(&self, x: i32, y: i32) -> Option<Rgba<u8>> {
        if x < 0 || y < 0 || x as u32 >= self.pixels.width() || y as u32 >= self.pixels.height() {
            None
        } else {
            Some(*self.pixels.get_pixel(x as u32, y as u32))
        }
    }

    /// Bounds-checked write. Out-of-range coordinates are silently dropped.
    pub fn put_pixel(&mut self, x: i32, y: i32, color: Rgba<u8>) {
        if x >= 0 && y >= 0 && (x as u32) < self.pixels.width() && (y as u32) < self.pixels.height() {
            self.pixels.put_pixel(x as u32, y as u32, color);
        }
    }

    /// Approximate heap footprint, used for history memory accounting.
    pub fn memory_bytes(&self) -> usize {
        self.pixels.as_raw().len() + self.name.len() + std::mem::size_of::<Layer>()
    }
}

// ============================================================================
// DOCUMENT
// ============================================================================

/// The layered skin document. Invariants: at least one layer always exists,
/// and `active_layer_id` always references a layer in `layers` (index 0 is
/// the bottom of the paint order).
pub struct Document {
    pub id: Uuid,
    pub name: String,
    pub format: SkinFormat,
    pub model: PlayerModel,
    pub width: u32,
    pub height: u32,
    pub layers: Vec<Layer>,
    pub active_layer_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Document {
    /// Create a document with a single base layer seeded with the default
    /// flat color on base-region pixels only — overlay regions must start
    /// fully transparent.
    pub fn new(format: SkinFormat, model: PlayerModel, name: impl Into<String>) -> Self {
        let width = SKIN_WIDTH;
        let height = format.height();
        let mut base = Layer::new("Skin", width, height);
        for y in 0..height {
            for x in 0..width {
                if regions::is_base_pixel(x, y) {
                    base.pixels.put_pixel(x, y, DEFAULT_SEED_COLOR);
                }
            }
        }

        let now = Utc::now();
        let active_layer_id = base.id;
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            format,
            model,
            width,
            height,
            layers: vec![base],
            active_layer_id,
            created_at: now,
            modified_at: now,
        }
    }

    /// Bump the modification timestamp.
    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    // ---- layer lookup -------------------------------------------------------

    pub fn layer_index(&self, id: Uuid) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn layer(&self, id: Uuid) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn layer_mut(&mut self, id: Uuid) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn active_layer(&self) -> Option<&Layer> {
        self.layer(self.active_layer_id)
    }

    pub fn active_layer_mut(&mut self) -> Option<&mut Layer> {
        let id = self.active_layer_id;
        self.layer_mut(id)
    }

    // ---- structural primitives (used by commands and session operations) ----

    /// Insert a layer at `index` (clamped) and make it active.
    pub fn insert_layer(&mut self, index: usize, layer: Layer) {
        let idx = index.min(self.layers.len());
        self.active_layer_id = layer.id;
        self.layers.insert(idx, layer);
    }

    /// Remove a layer by id, returning its index and the layer itself.
    ///
    /// Removing the last remaining layer is rejected. If the removed layer
    /// was active, the layer immediately below it becomes active (or the new
    /// bottom layer when there is none below).
    pub fn take_layer(&mut self, id: Uuid) -> Option<(usize, Layer)> {
        if self.layers.len() <= 1 {
            crate::log_warn!("take_layer: refusing to remove the last layer");
            return None;
        }
        let index = self.layer_index(id)?;
        let layer = self.layers.remove(index);
        if self.active_layer_id == id {
            let below = index.saturating_sub(1).min(self.layers.len() - 1);
            self.active_layer_id = self.layers[below].id;
        }
        Some((index, layer))
    }

    /// Move a layer one slot up (towards the top of the paint order) or down.
    /// Returns false when the move would fall off either end.
    pub fn shift_layer(&mut self, id: Uuid, up: bool) -> bool {
        let Some(index) = self.layer_index(id) else {
            return false;
        };
        let target = if up {
            if index + 1 >= self.layers.len() {
                return false;
            }
            index + 1
        } else {
            if index == 0 {
                return false;
            }
            index - 1
        };
        self.layers.swap(index, target);
        true
    }

    /// Composite the layer at `id` onto the layer directly beneath it,
    /// honoring the merged layer's opacity and blend mode, then remove it.
    /// The lower layer keeps its id. No-op for the bottom layer.
    pub fn merge_down(&mut self, id: Uuid) -> bool {
        let Some(index) = self.layer_index(id) else {
            crate::log_warn!("merge_down: unknown layer id {}", id);
            return false;
        };
        if index == 0 {
            return false;
        }

        let upper = self.layers.remove(index);
        let lower = &mut self.layers[index - 1];
        for y in 0..lower.pixels.height() {
            for x in 0..lower.pixels.width() {
                let base = *lower.pixels.get_pixel(x, y);
                let top = *upper.pixels.get_pixel(x, y);
                lower.pixels.put_pixel(
                    x,
                    y,
                    blend_pixel(base, top, upper.blend_mode, upper.opacity),
                );
            }
        }
        if self.active_layer_id == upper.id {
            self.active_layer_id = self.layers[index - 1].id;
        }
        true
    }

    /// Replace the entire layer stack with a single layer holding the
    /// current composite.
    pub fn flatten(&mut self) {
        let composite = self.composite();
        let mut layer = Layer::new("Flattened", self.width, self.height);
        layer.pixels = composite;
        self.active_layer_id = layer.id;
        self.layers = vec![layer];
    }

    // ---- compositing --------------------------------------------------------

    /// Flatten all visible layers bottom-to-top into one RGBA buffer.
    /// Row-parallel; this is the buffer handed to renderers, the eyedropper,
    /// and export.
    pub fn composite(&self) -> RgbaImage {
        let width = self.width;
        let height = self.height;
        let layers = &self.layers;

        let row_bytes = width as usize * 4;
        let mut raw = vec![0u8; row_bytes * height as usize];

        raw.par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(row_idx, row)| {
                let y = row_idx as u32;
                for x in 0..width {
                    let mut acc = Rgba([0u8, 0, 0, 0]);
                    for layer in layers.iter() {
                        if !layer.visible {
                            continue;
                        }
                        let top = *layer.pixels.get_pixel(x, y);
                        acc = blend_pixel(acc, top, layer.blend_mode, layer.opacity);
                    }
                    let off = x as usize * 4;
                    row[off..off + 4].copy_from_slice(&acc.0);
                }
            });

        // Length is width*height*4 by construction
        RgbaImage::from_raw(width, height, raw).unwrap()
    }
}
