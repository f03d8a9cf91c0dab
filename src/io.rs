//! Document persistence and texture import/export.
//!
//! Project files are a bincode-encoded [`DocumentSnapshot`] — a plain serde
//! mirror of [`Document`] with layer buffers as raw byte vectors. Import
//! additionally upconverts legacy 64×32 textures to the modern 64×64 layout
//! by mirroring the right limbs onto the left-limb slots.

use std::fmt;

use chrono::{DateTime, Utc};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::canvas::{BlendMode, Document, Layer, PlayerModel, SkinFormat, SKIN_WIDTH};

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug)]
pub enum SnapshotError {
    /// A layer buffer's byte length disagrees with the document dimensions.
    LayerSize { layer: String, expected: usize, actual: usize },
    /// The document dimensions themselves are not a known skin format.
    BadDimensions { width: u32, height: u32 },
    /// A snapshot with no layers cannot become a document.
    Empty,
    Encoding(Box<bincode::ErrorKind>),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::LayerSize { layer, expected, actual } => write!(
                f,
                "layer '{layer}' buffer is {actual} bytes, expected {expected}"
            ),
            SnapshotError::BadDimensions { width, height } => {
                write!(f, "unsupported document dimensions {width}x{height}")
            }
            SnapshotError::Empty => write!(f, "snapshot contains no layers"),
            SnapshotError::Encoding(err) => write!(f, "encoding error: {err}"),
        }
    }
}

impl std::error::Error for SnapshotError {}

impl From<Box<bincode::ErrorKind>> for SnapshotError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        SnapshotError::Encoding(err)
    }
}

// ============================================================================
// SNAPSHOT TYPES
// ============================================================================

#[derive(Serialize, Deserialize)]
pub struct LayerSnapshot {
    pub id: Uuid,
    pub name: String,
    pub visible: bool,
    pub locked: bool,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    /// Raw RGBA bytes, row-major, `width * height * 4` long.
    pub pixels: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub id: Uuid,
    pub name: String,
    pub format: SkinFormat,
    pub model: PlayerModel,
    pub width: u32,
    pub height: u32,
    pub layers: Vec<LayerSnapshot>,
    pub active_layer_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl DocumentSnapshot {
    pub fn capture(doc: &Document) -> Self {
        Self {
            id: doc.id,
            name: doc.name.clone(),
            format: doc.format,
            model: doc.model,
            width: doc.width,
            height: doc.height,
            layers: doc
                .layers
                .iter()
                .map(|layer| LayerSnapshot {
                    id: layer.id,
                    name: layer.name.clone(),
                    visible: layer.visible,
                    locked: layer.locked,
                    opacity: layer.opacity,
                    blend_mode: layer.blend_mode,
                    pixels: layer.pixels.as_raw().clone(),
                })
                .collect(),
            active_layer_id: doc.active_layer_id,
            created_at: doc.created_at,
            modified_at: doc.modified_at,
        }
    }

    /// Rebuild a document, validating dimensions and buffer lengths.
    pub fn restore(self) -> Result<Document, SnapshotError> {
        if self.width != SKIN_WIDTH || self.height != self.format.height() {
            return Err(SnapshotError::BadDimensions { width: self.width, height: self.height });
        }
        if self.layers.is_empty() {
            return Err(SnapshotError::Empty);
        }

        let expected = (self.width * self.height * 4) as usize;
        let mut layers = Vec::with_capacity(self.layers.len());
        for snap in self.layers {
            if snap.pixels.len() != expected {
                return Err(SnapshotError::LayerSize {
                    layer: snap.name,
                    expected,
                    actual: snap.pixels.len(),
                });
            }
            // Length was just validated
            let pixels = RgbaImage::from_raw(self.width, self.height, snap.pixels).unwrap();
            layers.push(Layer {
                id: snap.id,
                name: snap.name,
                visible: snap.visible,
                locked: snap.locked,
                opacity: snap.opacity,
                blend_mode: snap.blend_mode,
                pixels,
            });
        }

        let active_layer_id = if layers.iter().any(|l| l.id == self.active_layer_id) {
            self.active_layer_id
        } else {
            crate::log_warn!("snapshot active layer id is stale, falling back to bottom layer");
            layers[0].id
        };

        Ok(Document {
            id: self.id,
            name: self.name,
            format: self.format,
            model: self.model,
            width: self.width,
            height: self.height,
            layers,
            active_layer_id,
            created_at: self.created_at,
            modified_at: self.modified_at,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

// ============================================================================
// LEGACY UPCONVERSION
// ============================================================================

/// Face-to-face copy rule for mirroring one right limb onto its left slot.
/// `(src_x, src_y, w, h, dst_x, dst_y)`; every copy is horizontally flipped.
type FaceCopy = (u32, u32, u32, u32, u32, u32);

/// Right leg (0,16) → left leg (16,48). The right and left side faces swap
/// destinations so the limb reads correctly after mirroring.
const LEG_FACES: [FaceCopy; 6] = [
    (4, 16, 4, 4, 20, 48),   // top
    (8, 16, 4, 4, 24, 48),   // bottom
    (0, 20, 4, 12, 24, 52),  // right side → left slot
    (4, 20, 4, 12, 20, 52),  // front
    (8, 20, 4, 12, 16, 52),  // left side → right slot
    (12, 20, 4, 12, 28, 52), // back
];

/// Right arm (40,16) → left arm (32,48).
const ARM_FACES: [FaceCopy; 6] = [
    (44, 16, 4, 4, 36, 48),  // top
    (48, 16, 4, 4, 40, 48),  // bottom
    (40, 20, 4, 12, 40, 52), // right side → left slot
    (44, 20, 4, 12, 36, 52), // front
    (48, 20, 4, 12, 32, 52), // left side → right slot
    (52, 20, 4, 12, 44, 52), // back
];

/// Expand a legacy 64×32 texture to the modern 64×64 layout.
///
/// The top half copies verbatim; the left arm and leg are synthesized by
/// mirroring the right limb face by face, which is exactly how renderers
/// draw legacy skins. Overlay slots for the new limbs stay transparent.
pub fn upconvert_legacy(legacy: &RgbaImage) -> RgbaImage {
    debug_assert_eq!((legacy.width(), legacy.height()), (64, 32));
    let mut out = RgbaImage::new(64, 64);
    for y in 0..32.min(legacy.height()) {
        for x in 0..64.min(legacy.width()) {
            out.put_pixel(x, y, *legacy.get_pixel(x, y));
        }
    }
    for &(sx, sy, w, h, dx, dy) in LEG_FACES.iter().chain(ARM_FACES.iter()) {
        for row in 0..h {
            for col in 0..w {
                // Horizontal flip within the face
                let src = *legacy.get_pixel(sx + w - 1 - col, sy + row);
                out.put_pixel(dx + col, dy + row, src);
            }
        }
    }
    out
}

/// Build a modern-format document from an imported texture. 64×32 input is
/// upconverted; anything but 64×32 or 64×64 is rejected.
pub fn import_texture(
    image: &RgbaImage,
    model: PlayerModel,
    name: impl Into<String>,
) -> Result<Document, SnapshotError> {
    let pixels = match (image.width(), image.height()) {
        (64, 64) => image.clone(),
        (64, 32) => upconvert_legacy(image),
        (w, h) => return Err(SnapshotError::BadDimensions { width: w, height: h }),
    };

    let mut doc = Document::new(SkinFormat::Modern, PlayerModel::Classic, name);
    doc.model = model;
    if let Some(base) = doc.active_layer_mut() {
        base.pixels = pixels;
    }
    Ok(doc)
}

// ============================================================================
// EXPORT
// ============================================================================

/// Flatten the document into the texture to write out. Legacy documents
/// export at their native 64×32 — the composite already has that size.
pub fn export_composite(doc: &Document) -> RgbaImage {
    doc.composite()
}
