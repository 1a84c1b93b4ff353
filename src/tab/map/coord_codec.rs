//! Conversion between dataset coordinates and the signed 32-bit integer
//! grid of a `.MAP` file.

use crate::errors::{MitabError, Result};
use crate::spatial_ref::Bounds;

/// Largest magnitude an integer coordinate may take.
pub const MAX_INT_COORD: f64 = 1_000_000_000.0;

/// Scale/displacement pair for each axis plus the coordinate origin
/// quadrant (1..=4) recorded in the header.
///
/// Quadrants 2 and 3 mirror X, quadrants 3 and 4 mirror Y; quadrant 0 in
/// old files behaves like 3.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CoordCodec {
    pub x_scale: f64,
    pub y_scale: f64,
    pub x_displ: f64,
    pub y_displ: f64,
    pub quadrant: u8,
}

impl CoordCodec {
    /// Spread `bounds` over the whole integer range, origin quadrant 1.
    pub fn from_bounds(bounds: &Bounds) -> Result<CoordCodec> {
        if !(bounds.width() > 0.0 && bounds.height() > 0.0) {
            return Err(MitabError::BadArgument(format!(
                "dataset bounds must have a positive extent, got {bounds}"
            )));
        }
        let x_scale = 2.0 * MAX_INT_COORD / bounds.width();
        let y_scale = 2.0 * MAX_INT_COORD / bounds.height();
        Ok(CoordCodec {
            x_scale,
            y_scale,
            x_displ: -x_scale * (bounds.xmax + bounds.xmin) / 2.0,
            y_displ: -y_scale * (bounds.ymax + bounds.ymin) / 2.0,
            quadrant: 1,
        })
    }

    pub fn mirror_x(&self) -> bool {
        matches!(self.quadrant, 0 | 2 | 3)
    }

    pub fn mirror_y(&self) -> bool {
        matches!(self.quadrant, 0 | 3 | 4)
    }

    /// Dataset coordinate to integer grid. Fails with `OutOfBounds` instead
    /// of wrapping when the result would leave the valid range.
    pub fn to_internal(&self, x: f64, y: f64) -> Result<(i32, i32)> {
        let mut nx = x * self.x_scale + self.x_displ;
        let mut ny = y * self.y_scale + self.y_displ;
        if self.mirror_x() {
            nx = -nx;
        }
        if self.mirror_y() {
            ny = -ny;
        }
        let (nx, ny) = (nx.round(), ny.round());
        if !(nx.abs() <= MAX_INT_COORD && ny.abs() <= MAX_INT_COORD) {
            return Err(MitabError::OutOfBounds { x, y });
        }
        Ok((nx as i32, ny as i32))
    }

    pub fn to_external(&self, nx: i32, ny: i32) -> (f64, f64) {
        let (nx, ny) = (nx as f64, ny as f64);
        let x = if self.mirror_x() {
            -(nx + self.x_displ) / self.x_scale
        } else {
            (nx - self.x_displ) / self.x_scale
        };
        let y = if self.mirror_y() {
            -(ny + self.y_displ) / self.y_scale
        } else {
            (ny - self.y_displ) / self.y_scale
        };
        (x, y)
    }

    /// Distances only scale; no displacement or mirroring applies.
    pub fn dist_to_internal(&self, dx: f64, dy: f64) -> Result<(i32, i32)> {
        let nx = dx * self.x_scale;
        let ny = dy * self.y_scale;
        if !(nx.abs() <= i32::MAX as f64 && ny.abs() <= i32::MAX as f64) {
            return Err(MitabError::OutOfBounds { x: dx, y: dy });
        }
        Ok((nx.round() as i32, ny.round() as i32))
    }

    pub fn dist_to_external(&self, nx: i32, ny: i32) -> (f64, f64) {
        (nx as f64 / self.x_scale, ny as f64 / self.y_scale)
    }

    /// Smallest representable step on each axis.
    pub fn precision(&self) -> (f64, f64) {
        (1.0 / self.x_scale, 1.0 / self.y_scale)
    }

    /// True when `(x, y)` comes back bit for bit after a trip through the grid.
    pub fn is_lossless(&self, x: f64, y: f64) -> bool {
        match self.to_internal(x, y) {
            Ok((nx, ny)) => self.to_external(nx, ny) == (x, y),
            Err(_) => false,
        }
    }

    /// The dataset bounds covered by the integer range.
    pub fn bounds(&self) -> Bounds {
        let (x1, y1) = self.to_external(-MAX_INT_COORD as i32, -MAX_INT_COORD as i32);
        let (x2, y2) = self.to_external(MAX_INT_COORD as i32, MAX_INT_COORD as i32);
        Bounds::new(x1, y1, x2, y2)
    }
}

/// Bounding box on the integer grid.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IntRect {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl IntRect {
    /// Inverted box that any `expand` call replaces.
    pub const EMPTY: IntRect = IntRect {
        xmin: i32::MAX,
        ymin: i32::MAX,
        xmax: i32::MIN,
        ymax: i32::MIN,
    };

    pub fn of_points(points: &[(i32, i32)]) -> IntRect {
        let mut rect = IntRect::EMPTY;
        for &(x, y) in points {
            rect.expand(x, y);
        }
        rect
    }

    pub fn is_empty(&self) -> bool {
        self.xmin > self.xmax || self.ymin > self.ymax
    }

    pub fn expand(&mut self, x: i32, y: i32) {
        self.xmin = self.xmin.min(x);
        self.ymin = self.ymin.min(y);
        self.xmax = self.xmax.max(x);
        self.ymax = self.ymax.max(y);
    }

    pub fn merge(&mut self, other: &IntRect) {
        if !other.is_empty() {
            self.expand(other.xmin, other.ymin);
            self.expand(other.xmax, other.ymax);
        }
    }

    pub fn union(&self, other: &IntRect) -> IntRect {
        let mut out = *self;
        out.merge(other);
        out
    }

    pub fn area(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        (self.xmax as f64 - self.xmin as f64) * (self.ymax as f64 - self.ymin as f64)
    }

    /// Growth in area needed to cover `other` as well.
    pub fn enlargement(&self, other: &IntRect) -> f64 {
        self.union(other).area() - self.area()
    }

    pub fn center(&self) -> (i32, i32) {
        (
            ((self.xmin as i64 + self.xmax as i64) / 2) as i32,
            ((self.ymin as i64 + self.ymax as i64) / 2) as i32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCategory;

    #[test]
    fn test_int_rect() {
        let mut r = IntRect::of_points(&[(0, 0), (10, 4)]);
        assert_eq!(r.center(), (5, 2));
        assert_eq!(r.area(), 40.0);
        assert_eq!(r.enlargement(&IntRect::of_points(&[(5, 5)])), 10.0);
        r.merge(&IntRect::EMPTY);
        assert_eq!(r, IntRect::of_points(&[(10, 4), (0, 0)]));
        assert!(IntRect::EMPTY.is_empty());
    }

    fn codec() -> CoordCodec {
        CoordCodec::from_bounds(&Bounds::new(-180.0, -90.0, 180.0, 90.0)).unwrap()
    }

    #[test]
    fn test_bounds_map_to_int_range() {
        let c = codec();
        assert_eq!(c.to_internal(-180.0, -90.0).unwrap(), (-1_000_000_000, -1_000_000_000));
        assert_eq!(c.to_internal(180.0, 90.0).unwrap(), (1_000_000_000, 1_000_000_000));
        assert_eq!(c.to_internal(0.0, 0.0).unwrap(), (0, 0));
        let b = c.bounds();
        assert!((b.xmin + 180.0).abs() < 1e-9);
        assert!((b.ymax - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_round_trip_within_precision() {
        let c = codec();
        let (px, py) = c.precision();
        for &(x, y) in &[(12.3456789, -45.6789), (-179.999, 89.999), (0.1, 0.2)] {
            let (nx, ny) = c.to_internal(x, y).unwrap();
            let (rx, ry) = c.to_external(nx, ny);
            assert!((rx - x).abs() <= px);
            assert!((ry - y).abs() <= py);
        }
    }

    #[test]
    fn test_out_of_bounds_is_reported() {
        let c = CoordCodec::from_bounds(&Bounds::new(0.0, 0.0, 100.0, 100.0)).unwrap();
        let err = c.to_internal(1000.0, 50.0).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::OutOfBounds);
        assert!(c.to_internal(f64::NAN, 0.0).is_err());
        assert!(c.to_internal(100.0, 100.0).is_ok());
    }

    #[test]
    fn test_lossless_detection() {
        let c = CoordCodec::from_bounds(&Bounds::new(0.0, 0.0, 2.0, 2.0)).unwrap();
        // 1e9 units per dataset unit: halves are exact, 1/3 is not.
        assert!(c.is_lossless(0.5, 1.5));
        assert!(!c.is_lossless(1.0 / 3.0, 0.5));
    }

    #[test]
    fn test_quadrants_are_consistent() {
        for quadrant in 0..=4 {
            let c = CoordCodec {
                quadrant,
                ..CoordCodec::from_bounds(&Bounds::new(-10.0, -10.0, 10.0, 10.0)).unwrap()
            };
            let (nx, ny) = c.to_internal(3.5, -7.25).unwrap();
            assert_eq!(c.to_external(nx, ny), (3.5, -7.25));
        }
        let q3 = CoordCodec {
            quadrant: 3,
            ..codec()
        };
        let (nx, ny) = q3.to_internal(90.0, 45.0).unwrap();
        assert!(nx < 0 && ny < 0);
    }

    #[test]
    fn test_distances() {
        let c = CoordCodec::from_bounds(&Bounds::new(0.0, 0.0, 1000.0, 100.0)).unwrap();
        let (nx, ny) = c.dist_to_internal(10.0, 10.0).unwrap();
        assert_eq!(c.dist_to_external(nx, ny), (10.0, 10.0));
    }

    #[test]
    fn test_zero_extent_rejected() {
        assert!(CoordCodec::from_bounds(&Bounds::new(1.0, 1.0, 1.0, 5.0)).is_err());
    }
}
