//! Static UV region tables for the canonical 64×64 skin texture.
//!
//! Each of the six body parts (head, body, both arms, both legs) is a cuboid
//! whose six faces unwrap into axis-aligned rectangles on the texture, once
//! for the body-fitting base skin and once for the offset overlay ("second
//! skin"). Pixels outside every face rectangle sit on texture seams that are
//! never visible on the 3D model — they are permanently transparent and
//! never paintable.
//!
//! Legacy 64×32 documents use the same table; all their pixels fall in the
//! `y < 32` band, which contains only head/body/right-limb faces.

use crate::geometry::Rect;

/// Which UV layer a pixel belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SkinRegion {
    #[default]
    Base,
    Overlay,
}

impl SkinRegion {
    pub fn label(&self) -> &'static str {
        match self {
            SkinRegion::Base => "Base",
            SkinRegion::Overlay => "Overlay",
        }
    }

    pub fn all() -> &'static [SkinRegion] {
        &[SkinRegion::Base, SkinRegion::Overlay]
    }
}

/// The six face rectangles of one cuboid unwrap.
///
/// `(ox, oy)` is the top-left of the part's sub-image; `w`/`h`/`d` are the
/// cuboid's width, height, and depth in texture pixels. Layout (standard
/// cross unwrap):
///
/// ```text
///         +-----+------+
///         | top | bot  |
/// +-------+-----+------+------+
/// | right |front| left | back |
/// +-------+-----+------+------+
/// ```
const fn cube_faces(ox: u32, oy: u32, w: u32, h: u32, d: u32) -> [Rect; 6] {
    [
        Rect::new(ox + d, oy, w, d),             // top
        Rect::new(ox + d + w, oy, w, d),         // bottom
        Rect::new(ox, oy + d, d, h),             // right
        Rect::new(ox + d, oy + d, w, h),         // front
        Rect::new(ox + d + w, oy + d, d, h),     // left
        Rect::new(ox + d + w + d, oy + d, w, h), // back
    ]
}

/// Base (body-fitting) face rectangles, one row per body part.
/// Arm rects use the classic 4px-wide model; the slim model's 3px arm
/// columns are a strict subset.
pub static BASE_REGIONS: [[Rect; 6]; 6] = [
    cube_faces(0, 0, 8, 8, 8),    // head
    cube_faces(16, 16, 8, 12, 4), // body
    cube_faces(40, 16, 4, 12, 4), // right arm
    cube_faces(32, 48, 4, 12, 4), // left arm
    cube_faces(0, 16, 4, 12, 4),  // right leg
    cube_faces(16, 48, 4, 12, 4), // left leg
];

/// Overlay ("second skin") face rectangles, same part order as
/// [`BASE_REGIONS`].
pub static OVERLAY_REGIONS: [[Rect; 6]; 6] = [
    cube_faces(32, 0, 8, 8, 8),   // hat
    cube_faces(16, 32, 8, 12, 4), // jacket
    cube_faces(40, 32, 4, 12, 4), // right sleeve
    cube_faces(48, 48, 4, 12, 4), // left sleeve
    cube_faces(0, 32, 4, 12, 4),  // right pant leg
    cube_faces(0, 48, 4, 12, 4),  // left pant leg
];

/// True if `(x, y)` lies inside any base face rectangle.
pub fn is_base_pixel(x: u32, y: u32) -> bool {
    BASE_REGIONS.iter().flatten().any(|r| r.contains(x, y))
}

/// True if `(x, y)` lies inside any overlay face rectangle.
pub fn is_overlay_pixel(x: u32, y: u32) -> bool {
    OVERLAY_REGIONS.iter().flatten().any(|r| r.contains(x, y))
}

/// Classify a texture pixel. `None` means the pixel is on a seam gap and is
/// never paintable. The base and overlay tables are disjoint, so at most one
/// classification applies.
pub fn classify(x: u32, y: u32) -> Option<SkinRegion> {
    if is_base_pixel(x, y) {
        Some(SkinRegion::Base)
    } else if is_overlay_pixel(x, y) {
        Some(SkinRegion::Overlay)
    } else {
        None
    }
}

/// True iff the pixel belongs to the user-selected paint target layer.
/// Gates every write operation while the base/overlay toggle is engaged.
pub fn is_valid_for_paint_target(x: u32, y: u32, target: SkinRegion) -> bool {
    classify(x, y) == Some(target)
}
