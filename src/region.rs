//! Regions of interest and the precomputed inclusion mask.
//!
//! The mask is built once per scan configuration on the downscaled working
//! grid and reused for every frame; detectors only ever index into it. The
//! point-in-polygon rule is even-odd ray casting with points on an edge
//! counted inside, so boundary pixels are always part of the region.

use crate::error::ScanError;

/// Integer 2D coordinate in full-resolution frame space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// A closed polygon region of interest (≥3 vertices).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    points: Vec<Point>,
}

impl Region {
    pub fn new(points: Vec<Point>) -> Result<Self, ScanError> {
        if points.len() < 3 {
            return Err(ScanError::config(format!(
                "region needs at least 3 points, got {}",
                points.len()
            )));
        }
        Ok(Self { points })
    }

    /// Rectangle covering the full frame; the default region when none is
    /// configured.
    pub fn full_frame(width: u32, height: u32) -> Self {
        let w = width as i64 - 1;
        let h = height as i64 - 1;
        Self {
            points: vec![
                Point::new(0, 0),
                Point::new(w, 0),
                Point::new(w, h),
                Point::new(0, h),
            ],
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Even-odd containment test; points lying on an edge count as inside.
    pub fn contains(&self, x: i64, y: i64) -> bool {
        let pts = &self.points;
        let n = pts.len();
        for i in 0..n {
            if on_segment(pts[i], pts[(i + 1) % n], x, y) {
                return true;
            }
        }
        let mut inside = false;
        for i in 0..n {
            let a = pts[i];
            let b = pts[(i + 1) % n];
            if (a.y > y) != (b.y > y) {
                let x_cross =
                    a.x as f64 + (y - a.y) as f64 * (b.x - a.x) as f64 / (b.y - a.y) as f64;
                if (x as f64) < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

fn on_segment(a: Point, b: Point, x: i64, y: i64) -> bool {
    let cross = (b.x - a.x) * (y - a.y) - (b.y - a.y) * (x - a.x);
    if cross != 0 {
        return false;
    }
    x >= a.x.min(b.x) && x <= a.x.max(b.x) && y >= a.y.min(b.y) && y <= a.y.max(b.y)
}

/// Boolean inclusion mask over the downscaled working grid: the union of all
/// configured regions. Immutable once built.
#[derive(Clone, Debug)]
pub struct RegionMask {
    width: u32,
    height: u32,
    include: Vec<bool>,
    active: usize,
}

impl RegionMask {
    /// Rasterize `regions` (full-resolution coordinates) onto the grid of a
    /// `frame_size` frame downscaled by `factor`. The sample point for the
    /// downscaled pixel (x, y) is the full-resolution point (x·f, y·f).
    pub fn build(
        regions: &[Region],
        frame_size: (u32, u32),
        factor: u32,
    ) -> Result<Self, ScanError> {
        if regions.is_empty() {
            return Err(ScanError::config("at least one region is required"));
        }
        if factor == 0 {
            return Err(ScanError::config("downscale factor must be >= 1"));
        }
        let (fw, fh) = frame_size;
        let width = (fw / factor).max(1);
        let height = (fh / factor).max(1);
        let mut include = vec![false; width as usize * height as usize];
        let mut active = 0usize;
        for y in 0..height {
            for x in 0..width {
                let fx = (x * factor) as i64;
                let fy = (y * factor) as i64;
                if regions.iter().any(|r| r.contains(fx, fy)) {
                    include[(y * width + x) as usize] = true;
                    active += 1;
                }
            }
        }
        if active == 0 {
            return Err(ScanError::config(
                "configured regions cover no pixels at this resolution",
            ));
        }
        Ok(Self {
            width,
            height,
            include,
            active,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of included pixels; the denominator of every motion score.
    pub fn active_pixels(&self) -> usize {
        self.active
    }

    #[inline]
    pub fn includes(&self, index: usize) -> bool {
        self.include[index]
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.include
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: i64, y0: i64, x1: i64, y1: i64) -> Region {
        Region::new(vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_degenerate_region() {
        assert!(Region::new(vec![Point::new(0, 0), Point::new(1, 1)]).is_err());
    }

    #[test]
    fn contains_interior_and_boundary() {
        let r = square(2, 2, 8, 8);
        assert!(r.contains(5, 5));
        assert!(r.contains(2, 5)); // left edge
        assert!(r.contains(8, 8)); // corner
        assert!(!r.contains(9, 5));
        assert!(!r.contains(1, 1));
    }

    #[test]
    fn full_frame_mask_includes_everything() {
        let region = Region::full_frame(16, 8);
        let mask = RegionMask::build(&[region], (16, 8), 1).unwrap();
        assert_eq!(mask.active_pixels(), 16 * 8);
    }

    #[test]
    fn mask_covers_only_region() {
        let mask = RegionMask::build(&[square(4, 4, 7, 7)], (16, 16), 1).unwrap();
        // Boundary-inclusive 4x4 block.
        assert_eq!(mask.active_pixels(), 16);
        assert!(mask.includes(4 * 16 + 4));
        assert!(mask.includes(7 * 16 + 7));
        assert!(!mask.includes(3 * 16 + 4));
        assert!(!mask.includes(8 * 16 + 8));
    }

    #[test]
    fn union_of_disjoint_regions() {
        let a = square(0, 0, 3, 3);
        let b = square(10, 10, 13, 13);
        let mask = RegionMask::build(&[a, b], (16, 16), 1).unwrap();
        assert_eq!(mask.active_pixels(), 32);
    }

    #[test]
    fn downscaled_grid_samples_full_res_coordinates() {
        // Region [4,7]^2 at factor 2: downscaled pixels sample full-res
        // points 0,2,4,...; included samples are x,y in {4, 6} -> 2x2.
        let mask = RegionMask::build(&[square(4, 4, 7, 7)], (16, 16), 2).unwrap();
        assert_eq!((mask.width(), mask.height()), (8, 8));
        assert_eq!(mask.active_pixels(), 4);
        assert!(mask.includes(2 * 8 + 2));
        assert!(mask.includes(3 * 8 + 3));
    }

    #[test]
    fn empty_region_list_is_rejected() {
        assert!(RegionMask::build(&[], (8, 8), 1).is_err());
    }
}
