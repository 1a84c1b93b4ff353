use geo_types::{Coord, LineString};

use crate::errors::{MitabError, Result};
use crate::vector::Geometry;

/// Convert geo-types values into feature geometry.
pub trait ToMitab {
    fn to_mitab(&self) -> Result<Geometry>;
}

fn coords(line: &LineString<f64>) -> Vec<Coord> {
    line.0.clone()
}

impl ToMitab for geo_types::Point<f64> {
    fn to_mitab(&self) -> Result<Geometry> {
        Ok(Geometry::Point(self.0))
    }
}

impl ToMitab for geo_types::MultiPoint<f64> {
    fn to_mitab(&self) -> Result<Geometry> {
        Ok(Geometry::MultiPoint(self.0.iter().map(|p| p.0).collect()))
    }
}

impl ToMitab for geo_types::Line<f64> {
    fn to_mitab(&self) -> Result<Geometry> {
        Ok(Geometry::polyline(vec![vec![self.start, self.end]]))
    }
}

impl ToMitab for LineString<f64> {
    fn to_mitab(&self) -> Result<Geometry> {
        Ok(Geometry::polyline(vec![coords(self)]))
    }
}

impl ToMitab for geo_types::MultiLineString<f64> {
    fn to_mitab(&self) -> Result<Geometry> {
        Ok(Geometry::polyline(self.0.iter().map(coords).collect()))
    }
}

impl ToMitab for geo_types::Polygon<f64> {
    fn to_mitab(&self) -> Result<Geometry> {
        let mut rings = vec![coords(self.exterior())];
        rings.extend(self.interiors().iter().map(coords));
        Ok(Geometry::region(rings))
    }
}

impl ToMitab for geo_types::MultiPolygon<f64> {
    fn to_mitab(&self) -> Result<Geometry> {
        let mut rings = Vec::new();
        for polygon in &self.0 {
            rings.push(coords(polygon.exterior()));
            rings.extend(polygon.interiors().iter().map(coords));
        }
        Ok(Geometry::region(rings))
    }
}

impl ToMitab for geo_types::Rect<f64> {
    fn to_mitab(&self) -> Result<Geometry> {
        Ok(Geometry::rectangle(self.min(), self.max()))
    }
}

impl ToMitab for geo_types::Triangle<f64> {
    fn to_mitab(&self) -> Result<Geometry> {
        self.to_polygon().to_mitab()
    }
}

impl ToMitab for geo_types::Geometry<f64> {
    fn to_mitab(&self) -> Result<Geometry> {
        match self {
            geo_types::Geometry::Point(g) => g.to_mitab(),
            geo_types::Geometry::Line(g) => g.to_mitab(),
            geo_types::Geometry::LineString(g) => g.to_mitab(),
            geo_types::Geometry::Polygon(g) => g.to_mitab(),
            geo_types::Geometry::MultiPoint(g) => g.to_mitab(),
            geo_types::Geometry::MultiLineString(g) => g.to_mitab(),
            geo_types::Geometry::MultiPolygon(g) => g.to_mitab(),
            geo_types::Geometry::Rect(g) => g.to_mitab(),
            geo_types::Geometry::Triangle(g) => g.to_mitab(),
            geo_types::Geometry::GeometryCollection(_) => Err(MitabError::UnsupportedGeometry(
                "geometry collections have no feature equivalent".to_string(),
            )),
        }
    }
}
