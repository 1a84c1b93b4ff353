use geo_types::{LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};

use crate::vector::Geometry;

/// Conversion to [`geo_types`].
///
/// Point-like and text features become points; arcs become line strings
/// and rectangles and ellipses polygons, using their generated vertices.
/// Regions are split into polygons at each exterior ring.
impl From<&Geometry> for geo_types::Geometry<f64> {
    fn from(geo: &Geometry) -> geo_types::Geometry<f64> {
        let part = |n: usize| {
            LineString::from(geo.part(n).map(|p| p.into_owned()).unwrap_or_default())
        };
        match geo {
            Geometry::Point(p) => geo_types::Geometry::Point(Point(*p)),
            Geometry::FontPoint { position, .. } | Geometry::CustomPoint { position, .. } => {
                geo_types::Geometry::Point(Point(*position))
            }
            Geometry::Text { origin, .. } => geo_types::Geometry::Point(Point(*origin)),
            Geometry::MultiPoint(points) => geo_types::Geometry::MultiPoint(MultiPoint(
                points.iter().map(|c| Point(*c)).collect(),
            )),
            Geometry::Polyline { parts, .. } if parts.len() == 1 => {
                geo_types::Geometry::LineString(part(0))
            }
            Geometry::Polyline { parts, .. } => geo_types::Geometry::MultiLineString(
                MultiLineString((0..parts.len()).map(part).collect()),
            ),
            Geometry::Arc { .. } => geo_types::Geometry::LineString(part(0)),
            Geometry::Rectangle { .. } | Geometry::Ellipse { .. } => {
                geo_types::Geometry::Polygon(Polygon::new(part(0), Vec::new()))
            }
            Geometry::Region { .. } => {
                let mut polygons: Vec<Polygon<f64>> = geo
                    .holes_per_polygon()
                    .into_iter()
                    .map(|(outer, holes)| {
                        let interiors = (outer + 1..outer + 1 + holes).map(part).collect();
                        Polygon::new(part(outer), interiors)
                    })
                    .collect();
                if polygons.len() == 1 {
                    geo_types::Geometry::Polygon(polygons.remove(0))
                } else {
                    geo_types::Geometry::MultiPolygon(MultiPolygon(polygons))
                }
            }
        }
    }
}

impl From<Geometry> for geo_types::Geometry<f64> {
    fn from(geo: Geometry) -> geo_types::Geometry<f64> {
        (&geo).into()
    }
}
