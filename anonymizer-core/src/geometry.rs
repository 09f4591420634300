//! Box geometry shared by the detector and the mosaic stage.
//!
//! Detections travel through a fixed pipeline: tile-relative fractions are mapped to frame
//! pixels ([`RawBox::from_relative`]), grown ([`expand`]), intersected with the frame
//! ([`clamp`]) and finally size-filtered ([`accept`]). Each step is a pure function.

/// Box reported by the detection oracle, as fractions of the tile it scanned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeBox {
    /// Left edge as a fraction of the tile width.
    pub xmin: f32,
    /// Top edge as a fraction of the tile height.
    pub ymin: f32,
    /// Width as a fraction of the tile width.
    pub width: f32,
    /// Height as a fraction of the tile height.
    pub height: f32,
    /// Oracle confidence for this box.
    pub score: f32,
}

/// Rectangular region of the frame scanned by one oracle call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionWindow {
    /// Left edge in frame pixels.
    pub x: u32,
    /// Top edge in frame pixels.
    pub y: u32,
    /// Horizontal extent, clipped to the frame.
    pub width: u32,
    /// Vertical extent, clipped to the frame.
    pub height: u32,
}

impl DetectionWindow {
    /// Window spanning the whole frame.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Largest distance, in tile extents, a relative coordinate may reach from the tile origin.
///
/// Oracle output beyond it is pinned to it, which keeps every pixel coordinate far inside `i64`.
pub const RELATIVE_LIMIT: f64 = 16.0;

/// Frame-global box before clamping. Coordinates may lie outside the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawBox {
    /// Left edge; `[x1, x2) x [y1, y2)` like [`FaceBox`].
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl RawBox {
    /// Map a tile-relative box into frame pixels, truncating toward zero.
    ///
    /// Returns `None` when any coordinate is NaN. Infinite or huge fractions are pinned to
    /// [`RELATIVE_LIMIT`], so a runaway width still reaches past the frame edge.
    pub fn from_relative(rel: &RelativeBox, window: &DetectionWindow) -> Option<Self> {
        let to_pixels = |fraction: f32, extent: u32| -> Option<i64> {
            let fraction = fraction as f64;
            if fraction.is_nan() {
                return None;
            }
            Some((fraction.clamp(-RELATIVE_LIMIT, RELATIVE_LIMIT) * extent as f64) as i64)
        };
        let x1 = to_pixels(rel.xmin, window.width)?;
        let y1 = to_pixels(rel.ymin, window.height)?;
        let w = to_pixels(rel.width, window.width)?;
        let h = to_pixels(rel.height, window.height)?;
        let (ox, oy) = (window.x as i64, window.y as i64);
        Some(Self {
            x1: x1.saturating_add(ox),
            y1: y1.saturating_add(oy),
            x2: x1.saturating_add(w).saturating_add(ox),
            y2: y1.saturating_add(h).saturating_add(oy),
        })
    }
}

/// Frame-global, half-open box `[x1, x2) x [y1, y2)` that lies inside its frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceBox {
    /// Left edge, inclusive.
    pub x1: u32,
    /// Top edge, inclusive.
    pub y1: u32,
    /// Right edge, exclusive.
    pub x2: u32,
    /// Bottom edge, exclusive.
    pub y2: u32,
}

impl FaceBox {
    /// Horizontal extent in pixels.
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    /// Vertical extent in pixels.
    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}

/// Grow every side by `factor` times the current extent of its axis.
///
/// The left/top side moves first; the right/bottom growth is then computed from the already
/// widened extent. Each growth is truncated to whole pixels.
pub fn expand(raw: RawBox, factor: f64) -> RawBox {
    let grow = |lo: i64, hi: i64| (factor * hi.saturating_sub(lo) as f64) as i64;

    let x1 = raw.x1.saturating_sub(grow(raw.x1, raw.x2));
    let y1 = raw.y1.saturating_sub(grow(raw.y1, raw.y2));
    let x2 = raw.x2.saturating_add(grow(x1, raw.x2));
    let y2 = raw.y2.saturating_add(grow(y1, raw.y2));
    RawBox { x1, y1, x2, y2 }
}

/// Intersect with a `width x height` frame. Degenerate inputs collapse to empty boxes.
pub fn clamp(raw: RawBox, width: u32, height: u32) -> FaceBox {
    let (w, h) = (width as i64, height as i64);
    let x1 = raw.x1.clamp(0, w);
    let y1 = raw.y1.clamp(0, h);
    let x2 = raw.x2.clamp(x1, w);
    let y2 = raw.y2.clamp(y1, h);
    FaceBox {
        x1: x1 as u32,
        y1: y1 as u32,
        x2: x2 as u32,
        y2: y2 as u32,
    }
}

/// Both sides are at least `min_size` pixels.
pub fn accept(face: &FaceBox, min_size: u32) -> bool {
    face.width() >= min_size && face.height() >= min_size
}

/// Run the full geometry pipeline for one oracle detection.
pub fn resolve(
    rel: &RelativeBox,
    window: &DetectionWindow,
    frame: (u32, u32),
    expand_factor: f64,
    min_size: u32,
) -> Option<FaceBox> {
    let raw = RawBox::from_relative(rel, window)?;
    let face = clamp(expand(raw, expand_factor), frame.0, frame.1);
    accept(&face, min_size).then_some(face)
}
