//! Integer raster geometry shared by the tool engine: line and circle
//! rasterization, rectangle handling, and symmetry reflection.

// ============================================================================
// RECT
// ============================================================================

/// Axis-aligned rectangle in pixel units. Membership is half-open:
/// `[x, x+width) × [y, y+height)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    /// Normalize a drag between two corners into a non-negative rect.
    /// Both corners are inclusive, so a zero-delta drag yields a 1×1 rect.
    /// Coordinates below zero clamp to the canvas origin.
    pub fn from_drag(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        let min_x = x0.min(x1);
        let min_y = y0.min(y1);
        // Clamp the origin at zero; any off-canvas overhang shrinks the extent
        let width = (x0.abs_diff(x1) + 1).saturating_sub(min_x.min(0).unsigned_abs());
        let height = (y0.abs_diff(y1) + 1).saturating_sub(min_y.min(0).unsigned_abs());
        Self {
            x: min_x.max(0) as u32,
            y: min_y.max(0) as u32,
            width: width.max(1),
            height: height.max(1),
        }
    }
}

// ============================================================================
// LINE / CIRCLE RASTERIZATION
// ============================================================================

/// Bresenham line between two integer points, both endpoints included,
/// ordered from `(x0, y0)` to `(x1, y1)`.
///
/// Integer arithmetic with the symmetric double-step error rule — the exact
/// pixel set matters because strokes and the line/gradient tools are built on
/// it.
pub fn bresenham_line(x0: i32, y0: i32, x1: i32, y1: i32) -> Vec<(i32, i32)> {
    let mut points = Vec::new();

    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx - dy;

    let (mut x, mut y) = (x0, y0);
    loop {
        points.push((x, y));
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x += sx;
        }
        if e2 < dx {
            err += dx;
            y += sy;
        }
    }

    points
}

/// Every integer point whose squared distance from `(cx, cy)` is <= `r²`.
pub fn filled_circle_points(cx: i32, cy: i32, r: i32) -> Vec<(i32, i32)> {
    if r <= 0 {
        return vec![(cx, cy)];
    }
    let r_sq = r * r;
    let mut points = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy <= r_sq {
                points.push((cx + dx, cy + dy));
            }
        }
    }
    points
}

/// Brush footprint for a configured brush size: a filled circle of radius
/// `size / 2` for sizes above 1, otherwise just the center point (no circle
/// math for the 1px pencil).
pub fn brush_points(x: i32, y: i32, size: u32) -> Vec<(i32, i32)> {
    if size <= 1 {
        vec![(x, y)]
    } else {
        filled_circle_points(x, y, (size / 2) as i32)
    }
}

// ============================================================================
// SYMMETRY
// ============================================================================

/// Mirroring rule applied to every brush touch point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SymmetryMode {
    #[default]
    None,
    /// Left↔Right (vertical axis at canvas center)
    Horizontal,
    /// Top↔Bottom (horizontal axis at canvas center)
    Vertical,
    /// 4-way symmetry (both axes)
    Both,
}

impl SymmetryMode {
    pub fn label(&self) -> &'static str {
        match self {
            SymmetryMode::None => "None",
            SymmetryMode::Horizontal => "Horizontal",
            SymmetryMode::Vertical => "Vertical",
            SymmetryMode::Both => "Both",
        }
    }

    pub fn all() -> &'static [SymmetryMode] {
        &[
            SymmetryMode::None,
            SymmetryMode::Horizontal,
            SymmetryMode::Vertical,
            SymmetryMode::Both,
        ]
    }

    /// Cycle to the next mode.
    pub fn next(self) -> Self {
        match self {
            SymmetryMode::None => SymmetryMode::Horizontal,
            SymmetryMode::Horizontal => SymmetryMode::Vertical,
            SymmetryMode::Vertical => SymmetryMode::Both,
            SymmetryMode::Both => SymmetryMode::None,
        }
    }

    pub fn is_active(self) -> bool {
        self != SymmetryMode::None
    }
}

/// Mirrored positions for one touch point. Inline fixed-size storage — no
/// heap allocation on the per-pixel hot path.
#[derive(Clone, Copy, Debug)]
pub struct SymmetryPoints {
    data: [(i32, i32); 4],
    len: usize,
}

impl SymmetryPoints {
    pub fn as_slice(&self) -> &[(i32, i32)] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Reflect `(x, y)` according to `mode` over a `width × height` canvas.
/// The original point always comes first; mirrors are `x' = width-1-x` and
/// `y' = height-1-y`. Yields exactly 1, 2, 2, or 4 points.
pub fn apply_symmetry(x: i32, y: i32, mode: SymmetryMode, width: u32, height: u32) -> SymmetryPoints {
    let mx = width as i32 - 1 - x;
    let my = height as i32 - 1 - y;
    match mode {
        SymmetryMode::None => SymmetryPoints { data: [(x, y), (0, 0), (0, 0), (0, 0)], len: 1 },
        SymmetryMode::Horizontal => SymmetryPoints { data: [(x, y), (mx, y), (0, 0), (0, 0)], len: 2 },
        SymmetryMode::Vertical => SymmetryPoints { data: [(x, y), (x, my), (0, 0), (0, 0)], len: 2 },
        SymmetryMode::Both => SymmetryPoints { data: [(x, y), (mx, y), (x, my), (mx, my)], len: 4 },
    }
}
