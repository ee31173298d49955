//! Deterministic output dimensions and placement for a geometry.
//!
//! A [`ResizePlan`] is computed from the source dimensions alone, so the same
//! source and geometry always produce the same canvas. All arithmetic is done
//! on integers; ratios are compared by cross-multiplication.

use crate::geometry::Geometry;

/// How single-axis geometries (`Nw`, `Nh`, `Nl`) treat the requested size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SingleAxis {
    /// The constrained side becomes `N - 1` pixels.
    #[default]
    Legacy,
    /// The constrained side becomes exactly `N` pixels.
    Exact,
}

impl SingleAxis {
    fn target(self, n: u32) -> u32 {
        match self {
            Self::Legacy => n.saturating_sub(1).max(1),
            Self::Exact => n,
        }
    }
}

/// Canvas size, scaled source size and where the scaled source is placed.
///
/// Offsets may be negative: the scaled source is larger than the canvas and
/// the overflow is cropped equally on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePlan {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub scaled_width: u32,
    pub scaled_height: u32,
    pub offset_x: i64,
    pub offset_y: i64,
}

impl ResizePlan {
    fn centered(canvas: (u32, u32), scaled: (u32, u32)) -> Self {
        Self {
            canvas_width: canvas.0,
            canvas_height: canvas.1,
            scaled_width: scaled.0,
            scaled_height: scaled.1,
            offset_x: (i64::from(canvas.0) - i64::from(scaled.0)) / 2,
            offset_y: (i64::from(canvas.1) - i64::from(scaled.1)) / 2,
        }
    }

    /// Whether any canvas pixel is left uncovered by the scaled source.
    pub fn has_padding(&self) -> bool {
        self.offset_x > 0
            || self.offset_y > 0
            || i64::from(self.scaled_width) + self.offset_x < i64::from(self.canvas_width)
            || i64::from(self.scaled_height) + self.offset_y < i64::from(self.canvas_height)
    }
}

/// `a * b / c` rounded down, in 64-bit to avoid overflow, clamped to `1..`.
fn scale_floor(a: u32, b: u32, c: u32) -> u32 {
    let v = u64::from(a) * u64::from(b) / u64::from(c.max(1));
    v.clamp(1, u64::from(u32::MAX)) as u32
}

/// `a * b / c` rounded up, clamped to `1..`.
fn scale_ceil(a: u32, b: u32, c: u32) -> u32 {
    let c = u64::from(c.max(1));
    let v = (u64::from(a) * u64::from(b)).div_ceil(c);
    v.clamp(1, u64::from(u32::MAX)) as u32
}

impl Geometry {
    /// Compute the plan for a `src_width`x`src_height` source.
    ///
    /// # Examples
    ///
    /// ```
    /// use attachforge_geometry::{Geometry, SingleAxis};
    ///
    /// let plan = "[100x100]".parse::<Geometry>().unwrap().plan(400, 200, SingleAxis::Legacy);
    /// assert_eq!((plan.canvas_width, plan.canvas_height), (100, 100));
    /// assert_eq!((plan.scaled_width, plan.scaled_height), (100, 50));
    /// assert_eq!((plan.offset_x, plan.offset_y), (0, 25));
    /// ```
    pub fn plan(&self, src_width: u32, src_height: u32, axis: SingleAxis) -> ResizePlan {
        let sw = src_width.max(1);
        let sh = src_height.max(1);

        match *self {
            Geometry::Cover { width, height } => {
                // Larger of the two ratios: the scaled source covers the box.
                let width_bound = u64::from(width) * u64::from(sh) >= u64::from(height) * u64::from(sw);
                let scaled = if width_bound {
                    (width, scale_ceil(sh, width, sw))
                } else {
                    (scale_ceil(sw, height, sh), height)
                };
                ResizePlan::centered((width, height), scaled)
            }
            Geometry::Band { width, height } => {
                // Smaller of the two ratios: the scaled source fits in the box.
                let width_bound = u64::from(width) * u64::from(sh) <= u64::from(height) * u64::from(sw);
                let scaled = if width_bound {
                    (width, scale_floor(sh, width, sw).min(height))
                } else {
                    (scale_floor(sw, height, sh).min(width), height)
                };
                ResizePlan::centered((width, height), scaled)
            }
            Geometry::Width(n) => {
                let w = axis.target(n);
                let dims = (w, scale_floor(w, sh, sw));
                ResizePlan::centered(dims, dims)
            }
            Geometry::Height(n) => {
                let h = axis.target(n);
                let dims = (scale_floor(h, sw, sh), h);
                ResizePlan::centered(dims, dims)
            }
            Geometry::LongSide(n) => {
                if sw > sh {
                    Geometry::Width(n).plan(sw, sh, axis)
                } else {
                    Geometry::Height(n).plan(sw, sh, axis)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(geometry: &str, w: u32, h: u32) -> ResizePlan {
        geometry
            .parse::<Geometry>()
            .unwrap()
            .plan(w, h, SingleAxis::Legacy)
    }

    #[test]
    fn test_cover_landscape_crops_width() {
        let p = plan("100x100", 400, 200);
        assert_eq!((p.canvas_width, p.canvas_height), (100, 100));
        assert_eq!((p.scaled_width, p.scaled_height), (200, 100));
        assert_eq!((p.offset_x, p.offset_y), (-50, 0));
        assert!(!p.has_padding());
    }

    #[test]
    fn test_cover_portrait_crops_height() {
        let p = plan("100x100", 300, 600);
        assert_eq!((p.scaled_width, p.scaled_height), (100, 200));
        assert_eq!((p.offset_x, p.offset_y), (0, -50));
        assert!(!p.has_padding());
    }

    #[test]
    fn test_cover_never_pads_on_awkward_ratios() {
        for (w, h) in [(401, 199), (333, 777), (1, 1000), (1000, 1), (7, 3)] {
            for g in ["100x100", "300x100", "64x480", "1x1"] {
                let p = plan(g, w, h);
                assert!(!p.has_padding(), "{} on {}x{} padded: {:?}", g, w, h, p);
            }
        }
    }

    #[test]
    fn test_band_landscape_pads_vertically() {
        let p = plan("[100x100]", 400, 200);
        assert_eq!((p.canvas_width, p.canvas_height), (100, 100));
        assert_eq!((p.scaled_width, p.scaled_height), (100, 50));
        assert_eq!((p.offset_x, p.offset_y), (0, 25));
        assert!(p.has_padding());
    }

    #[test]
    fn test_band_wide_box_pads_horizontally() {
        let p = plan("[300x100]", 400, 300);
        assert_eq!((p.canvas_width, p.canvas_height), (300, 100));
        assert_eq!((p.scaled_width, p.scaled_height), (133, 100));
        assert_eq!((p.offset_x, p.offset_y), (83, 0));
        assert!(p.has_padding());
    }

    #[test]
    fn test_band_always_fits() {
        for (w, h) in [(401, 199), (333, 777), (1, 1000), (1000, 1)] {
            for g in ["[100x100]", "[300x100]", "[64x480]"] {
                let p = plan(g, w, h);
                assert!(p.offset_x >= 0 && p.offset_y >= 0, "{} on {}x{}: {:?}", g, w, h, p);
                assert!(p.scaled_width <= p.canvas_width);
                assert!(p.scaled_height <= p.canvas_height);
            }
        }
    }

    #[test]
    fn test_width_is_off_by_one_in_legacy_mode() {
        let p = plan("100w", 400, 200);
        assert_eq!((p.canvas_width, p.canvas_height), (99, 49));
        assert_eq!((p.scaled_width, p.scaled_height), (99, 49));
        assert_eq!((p.offset_x, p.offset_y), (0, 0));

        // Any source: width is always N - 1.
        for (w, h) in [(10, 10), (5000, 20), (20, 5000)] {
            assert_eq!(plan("100w", w, h).canvas_width, 99);
        }
    }

    #[test]
    fn test_height_mode() {
        let p = plan("51h", 400, 200);
        assert_eq!((p.canvas_width, p.canvas_height), (100, 50));
    }

    #[test]
    fn test_long_side_constrains_longer_axis() {
        let landscape = plan("101l", 400, 200);
        assert_eq!((landscape.canvas_width, landscape.canvas_height), (100, 50));

        let portrait = plan("101l", 200, 400);
        assert_eq!((portrait.canvas_width, portrait.canvas_height), (50, 100));

        let square = plan("101l", 300, 300);
        assert_eq!((square.canvas_width, square.canvas_height), (100, 100));
    }

    #[test]
    fn test_exact_single_axis() {
        let p = "100w".parse::<Geometry>().unwrap().plan(400, 200, SingleAxis::Exact);
        assert_eq!((p.canvas_width, p.canvas_height), (100, 50));

        let p = "100l".parse::<Geometry>().unwrap().plan(200, 400, SingleAxis::Exact);
        assert_eq!((p.canvas_width, p.canvas_height), (50, 100));
    }

    #[test]
    fn test_degenerate_sizes_clamp_to_one_pixel() {
        let p = plan("1w", 400, 200);
        assert_eq!((p.canvas_width, p.canvas_height), (1, 1));

        let p = plan("10w", 1000, 1);
        assert_eq!(p.canvas_height, 1);
    }
}
