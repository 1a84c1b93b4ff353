use geo_types::Coord;

use crate::vector::Geometry;

/// # Ring predicates
///
/// A region stores its rings as a flat list without outer/inner flags. The
/// nesting is recovered geometrically: a ring is *interior* when an odd
/// number of the rings before it contain it. Containment counts points on
/// the boundary as inside, so a ring touching its enclosing ring is still a
/// hole of it.
impl Geometry {
    /// Tests if ring `ring` of a region is a hole.
    ///
    /// The first ring is always exterior. Returns `false` for geometries
    /// other than regions and for ring indexes out of range.
    pub fn is_interior_ring(&self, ring: usize) -> bool {
        match self {
            Geometry::Region { rings, .. } if ring < rings.len() => {
                let depth = rings[..ring]
                    .iter()
                    .filter(|outer| ring_contains_ring(outer, &rings[ring]))
                    .count();
                depth % 2 == 1
            }
            _ => false,
        }
    }

    /// `is_interior_ring` for every ring of a region, in order.
    pub fn interior_ring_flags(&self) -> Vec<bool> {
        (0..self.part_count())
            .map(|i| self.is_interior_ring(i))
            .collect()
    }

    /// Number of holes following each exterior ring, keyed by the index of
    /// the exterior ring.
    pub fn holes_per_polygon(&self) -> Vec<(usize, usize)> {
        let mut polygons: Vec<(usize, usize)> = Vec::new();
        for (i, interior) in self.interior_ring_flags().into_iter().enumerate() {
            match polygons.last_mut() {
                Some((_, holes)) if interior => *holes += 1,
                _ => polygons.push((i, 0)),
            }
        }
        polygons
    }
}

/// Every vertex of `inner` lies inside `outer` or on its boundary.
pub fn ring_contains_ring(outer: &[Coord], inner: &[Coord]) -> bool {
    outer.len() >= 3 && !inner.is_empty() && inner.iter().all(|p| point_in_ring(*p, outer))
}

/// Crossing number test, with points on an edge or vertex counted as
/// inside. The ring may be open or closed.
pub fn point_in_ring(p: Coord, ring: &[Coord]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        if on_segment(p, a, b) {
            return true;
        }
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    inside
}

fn on_segment(p: Coord, a: Coord, b: Coord) -> bool {
    let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
    let scale = (b.x - a.x).abs().max((b.y - a.y).abs()).max(1.0);
    if cross.abs() > 1e-12 * scale * scale {
        return false;
    }
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::coord;

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Coord> {
        vec![
            coord! { x: x0, y: y0 },
            coord! { x: x0 + size, y: y0 },
            coord! { x: x0 + size, y: y0 + size },
            coord! { x: x0, y: y0 + size },
            coord! { x: x0, y: y0 },
        ]
    }

    #[test]
    fn test_hole_inside_outer() {
        let region = Geometry::region(vec![square(0.0, 0.0, 10.0), square(2.0, 2.0, 3.0)]);
        assert!(!region.is_interior_ring(0));
        assert!(region.is_interior_ring(1));
        assert!(!region.is_interior_ring(2));
    }

    #[test]
    fn test_disjoint_rings_are_both_outer() {
        let region = Geometry::region(vec![square(0.0, 0.0, 1.0), square(5.0, 5.0, 1.0)]);
        assert_eq!(region.interior_ring_flags(), vec![false, false]);
        assert_eq!(region.holes_per_polygon(), vec![(0, 0), (1, 0)]);
    }

    #[test]
    fn test_island_in_hole() {
        let region = Geometry::region(vec![
            square(0.0, 0.0, 10.0),
            square(1.0, 1.0, 8.0),
            square(3.0, 3.0, 2.0),
        ]);
        assert_eq!(region.interior_ring_flags(), vec![false, true, false]);
        assert_eq!(region.holes_per_polygon(), vec![(0, 1), (2, 0)]);
    }

    #[test]
    fn test_touching_boundary_counts_as_inside() {
        // Shares the outer ring's lower-left corner and two edges.
        let region = Geometry::region(vec![square(0.0, 0.0, 10.0), square(0.0, 0.0, 5.0)]);
        assert!(region.is_interior_ring(1));
    }

    #[test]
    fn test_not_a_region() {
        let line = Geometry::polyline(vec![square(0.0, 0.0, 1.0)]);
        assert!(!line.is_interior_ring(0));
    }

    #[test]
    fn test_point_in_ring() {
        let ring = square(0.0, 0.0, 2.0);
        assert!(point_in_ring(coord! { x: 1.0, y: 1.0 }, &ring));
        assert!(point_in_ring(coord! { x: 2.0, y: 1.0 }, &ring));
        assert!(point_in_ring(coord! { x: 0.0, y: 0.0 }, &ring));
        assert!(!point_in_ring(coord! { x: 3.0, y: 1.0 }, &ring));
        assert!(!point_in_ring(coord! { x: -0.5, y: 2.0 }, &ring));
    }
}
