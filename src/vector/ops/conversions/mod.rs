mod geo_to_mitab;
mod mitab_to_geo;

pub use geo_to_mitab::ToMitab;

#[cfg(test)]
mod tests {
    use geo_types::{coord, line_string, point, polygon};

    use super::ToMitab;
    use crate::vector::{FeatureType, Geometry};

    #[test]
    fn test_polygon_with_hole_round_trip() {
        let poly = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0), (x: 0.0, y: 0.0)],
            interiors: [[(x: 2.0, y: 2.0), (x: 4.0, y: 2.0), (x: 4.0, y: 4.0), (x: 2.0, y: 4.0), (x: 2.0, y: 2.0)]],
        );
        let region = poly.to_mitab().unwrap();
        assert_eq!(region.feature_type(), FeatureType::Region);
        assert_eq!(region.part_count(), 2);
        assert!(region.is_interior_ring(1));

        let back: geo_types::Geometry<f64> = (&region).into();
        assert_eq!(back, geo_types::Geometry::Polygon(poly));
    }

    #[test]
    fn test_two_outer_rings_become_multipolygon() {
        let region = Geometry::region(vec![
            vec![
                coord! { x: 0.0, y: 0.0 },
                coord! { x: 1.0, y: 0.0 },
                coord! { x: 1.0, y: 1.0 },
                coord! { x: 0.0, y: 0.0 },
            ],
            vec![
                coord! { x: 5.0, y: 5.0 },
                coord! { x: 6.0, y: 5.0 },
                coord! { x: 6.0, y: 6.0 },
                coord! { x: 5.0, y: 5.0 },
            ],
        ]);
        match geo_types::Geometry::from(&region) {
            geo_types::Geometry::MultiPolygon(mp) => assert_eq!(mp.0.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_point_and_linestring() {
        let p = point!(x: 1.5, y: -2.0).to_mitab().unwrap();
        assert_eq!(p, Geometry::point(1.5, -2.0));

        let line = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)];
        let pline = line.to_mitab().unwrap();
        assert_eq!(pline.vertex_count(0), 2);
        assert_eq!(
            geo_types::Geometry::from(pline),
            geo_types::Geometry::LineString(line)
        );
    }

    #[test]
    fn test_collection_is_unsupported() {
        let gc = geo_types::Geometry::GeometryCollection(geo_types::GeometryCollection(vec![]));
        assert!(gc.to_mitab().is_err());
    }
}
