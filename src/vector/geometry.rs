use std::borrow::Cow;
use std::f64::consts::PI;

use geo_types::{coord, Coord};

use crate::errors::{MitabError, Result};
use crate::utils::{arc_point_count, arc_sweep, close_ring, deg_to_rad, generate_arc};

/// The fixed set of feature types, with their wire codes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FeatureType {
    NoGeom = 0,
    Point = 1,
    FontPoint = 2,
    CustomPoint = 3,
    Text = 4,
    Polyline = 5,
    Arc = 6,
    Region = 7,
    Rectangle = 8,
    Ellipse = 9,
    MultiPoint = 10,
}

impl FeatureType {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Result<FeatureType> {
        Ok(match code {
            0 => FeatureType::NoGeom,
            1 => FeatureType::Point,
            2 => FeatureType::FontPoint,
            3 => FeatureType::CustomPoint,
            4 => FeatureType::Text,
            5 => FeatureType::Polyline,
            6 => FeatureType::Arc,
            7 => FeatureType::Region,
            8 => FeatureType::Rectangle,
            9 => FeatureType::Ellipse,
            10 => FeatureType::MultiPoint,
            _ => {
                return Err(MitabError::UnsupportedGeometry(format!(
                    "feature type code {code}"
                )))
            }
        })
    }
}

/// Bounding box of a geometry.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Envelope {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Envelope {
    /// Envelope of a point set, `None` when it is empty.
    pub fn of<I: IntoIterator<Item = Coord>>(points: I) -> Option<Envelope> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut env = Envelope {
            min_x: first.x,
            max_x: first.x,
            min_y: first.y,
            max_y: first.y,
        };
        for p in points {
            env.expand(p);
        }
        Some(env)
    }

    pub fn expand(&mut self, p: Coord) {
        self.min_x = self.min_x.min(p.x);
        self.max_x = self.max_x.max(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_y = self.max_y.max(p.y);
    }

    pub fn merge(&mut self, other: &Envelope) {
        self.expand(coord! { x: other.min_x, y: other.min_y });
        self.expand(coord! { x: other.max_x, y: other.max_y });
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Coord {
        coord! {
            x: (self.min_x + self.max_x) / 2.0,
            y: (self.min_y + self.max_y) / 2.0,
        }
    }
}

/// Feature geometry.
///
/// Every variant exposes its vertices as parts: one part for point-like,
/// arc, rectangle, ellipse and multipoint geometries, one part per segment
/// of a polyline and one per ring of a region. Arcs, ellipses and rectangles
/// store their defining parameters; their vertices are generated on demand.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Point(Coord),
    FontPoint {
        position: Coord,
        /// Degrees counter-clockwise.
        angle: f64,
    },
    CustomPoint {
        position: Coord,
        /// Bit 1 shows the background, bit 2 applies the symbol color.
        custom_style: u8,
    },
    Text {
        origin: Coord,
        text: String,
        /// End of the label line; equal to `origin` when there is none.
        line_end: Coord,
    },
    Polyline {
        parts: Vec<Vec<Coord>>,
        smooth: bool,
    },
    /// Portion of an ellipse, angles in degrees counter-clockwise from
    /// `start_angle` to `end_angle`.
    Arc {
        center: Coord,
        x_radius: f64,
        y_radius: f64,
        start_angle: f64,
        end_angle: f64,
    },
    Region {
        rings: Vec<Vec<Coord>>,
        /// Label point; defaults to the envelope center when unset.
        centroid: Option<Coord>,
    },
    Rectangle {
        min: Coord,
        max: Coord,
        /// Corner radii of a rounded rectangle.
        corner_radius: Option<(f64, f64)>,
    },
    Ellipse {
        center: Coord,
        x_radius: f64,
        y_radius: f64,
    },
    MultiPoint(Vec<Coord>),
}

const ORIGIN: Coord = Coord { x: 0.0, y: 0.0 };

impl Geometry {
    /// An empty geometry of the given type, to be filled with
    /// [`Geometry::add_part`].
    pub fn empty(feature_type: FeatureType) -> Result<Geometry> {
        Ok(match feature_type {
            FeatureType::NoGeom => {
                return Err(MitabError::UnsupportedGeometry(
                    "NoGeom features carry no geometry".to_string(),
                ))
            }
            FeatureType::Point => Geometry::Point(ORIGIN),
            FeatureType::FontPoint => Geometry::FontPoint {
                position: ORIGIN,
                angle: 0.0,
            },
            FeatureType::CustomPoint => Geometry::CustomPoint {
                position: ORIGIN,
                custom_style: 0,
            },
            FeatureType::Text => Geometry::text(ORIGIN, ""),
            FeatureType::Polyline => Geometry::Polyline {
                parts: Vec::new(),
                smooth: false,
            },
            FeatureType::Arc => Geometry::Arc {
                center: ORIGIN,
                x_radius: 0.0,
                y_radius: 0.0,
                start_angle: 0.0,
                end_angle: 0.0,
            },
            FeatureType::Region => Geometry::region(Vec::new()),
            FeatureType::Rectangle => Geometry::rectangle(ORIGIN, ORIGIN),
            FeatureType::Ellipse => Geometry::Ellipse {
                center: ORIGIN,
                x_radius: 0.0,
                y_radius: 0.0,
            },
            FeatureType::MultiPoint => Geometry::MultiPoint(Vec::new()),
        })
    }

    pub fn point(x: f64, y: f64) -> Geometry {
        Geometry::Point(coord! { x: x, y: y })
    }

    pub fn polyline(parts: Vec<Vec<Coord>>) -> Geometry {
        Geometry::Polyline {
            parts,
            smooth: false,
        }
    }

    pub fn region(rings: Vec<Vec<Coord>>) -> Geometry {
        Geometry::Region {
            rings,
            centroid: None,
        }
    }

    /// Axis aligned rectangle spanned by two opposite corners.
    pub fn rectangle(a: Coord, b: Coord) -> Geometry {
        Geometry::Rectangle {
            min: coord! { x: a.x.min(b.x), y: a.y.min(b.y) },
            max: coord! { x: a.x.max(b.x), y: a.y.max(b.y) },
            corner_radius: None,
        }
    }

    pub fn ellipse(center: Coord, x_radius: f64, y_radius: f64) -> Geometry {
        Geometry::Ellipse {
            center,
            x_radius,
            y_radius,
        }
    }

    pub fn arc(
        center: Coord,
        x_radius: f64,
        y_radius: f64,
        start_angle: f64,
        end_angle: f64,
    ) -> Geometry {
        Geometry::Arc {
            center,
            x_radius,
            y_radius,
            start_angle,
            end_angle,
        }
    }

    pub fn text(origin: Coord, text: &str) -> Geometry {
        Geometry::Text {
            origin,
            text: text.to_string(),
            line_end: origin,
        }
    }

    pub fn feature_type(&self) -> FeatureType {
        match self {
            Geometry::Point(_) => FeatureType::Point,
            Geometry::FontPoint { .. } => FeatureType::FontPoint,
            Geometry::CustomPoint { .. } => FeatureType::CustomPoint,
            Geometry::Text { .. } => FeatureType::Text,
            Geometry::Polyline { .. } => FeatureType::Polyline,
            Geometry::Arc { .. } => FeatureType::Arc,
            Geometry::Region { .. } => FeatureType::Region,
            Geometry::Rectangle { .. } => FeatureType::Rectangle,
            Geometry::Ellipse { .. } => FeatureType::Ellipse,
            Geometry::MultiPoint(_) => FeatureType::MultiPoint,
        }
    }

    pub fn part_count(&self) -> usize {
        match self {
            Geometry::Polyline { parts, .. } => parts.len(),
            Geometry::Region { rings, .. } => rings.len(),
            Geometry::MultiPoint(points) if points.is_empty() => 0,
            _ => 1,
        }
    }

    /// Vertices of `part`, or `None` for an invalid part index.
    pub fn part(&self, part: usize) -> Option<Cow<'_, [Coord]>> {
        match self {
            Geometry::Polyline { parts, .. } => parts.get(part).map(|p| Cow::Borrowed(&p[..])),
            Geometry::Region { rings, .. } => rings.get(part).map(|r| Cow::Borrowed(&r[..])),
            _ if part >= self.part_count() => None,
            Geometry::Point(p) => Some(Cow::Owned(vec![*p])),
            Geometry::FontPoint { position, .. } | Geometry::CustomPoint { position, .. } => {
                Some(Cow::Owned(vec![*position]))
            }
            Geometry::Text { origin, .. } => Some(Cow::Owned(vec![*origin])),
            Geometry::MultiPoint(points) => Some(Cow::Borrowed(&points[..])),
            Geometry::Arc {
                center,
                x_radius,
                y_radius,
                start_angle,
                end_angle,
            } => {
                let sweep = arc_sweep(*start_angle, *end_angle);
                let start = deg_to_rad(*start_angle);
                Some(Cow::Owned(generate_arc(
                    *center,
                    *x_radius,
                    *y_radius,
                    start,
                    start + deg_to_rad(sweep),
                    arc_point_count(*start_angle, *end_angle),
                )))
            }
            Geometry::Ellipse {
                center,
                x_radius,
                y_radius,
            } => {
                let mut ring = generate_arc(*center, *x_radius, *y_radius, 0.0, 2.0 * PI, 180);
                close_ring(&mut ring);
                Some(Cow::Owned(ring))
            }
            Geometry::Rectangle {
                min,
                max,
                corner_radius,
            } => Some(Cow::Owned(rectangle_ring(*min, *max, *corner_radius))),
        }
    }

    /// Number of vertices in `part`, 0 when the part does not exist.
    pub fn vertex_count(&self, part: usize) -> usize {
        self.part(part).map(|p| p.len()).unwrap_or(0)
    }

    /// Vertex `index` of `part`, `None` when either index is out of range.
    pub fn vertex(&self, part: usize, index: usize) -> Option<Coord> {
        self.part(part).and_then(|p| p.get(index).copied())
    }

    /// Total number of vertices over all parts.
    pub fn total_vertex_count(&self) -> usize {
        (0..self.part_count()).map(|i| self.vertex_count(i)).sum()
    }

    /// Append a part.
    ///
    /// Polylines and regions gain a segment or ring, multipoints gain
    /// points. Point-like and text geometries take exactly one vertex, their
    /// position. Rectangles, ellipses and arcs take the envelope of the
    /// vertices as their box (for an arc, the box of the whole ellipse).
    ///
    /// Returns the index of the part now holding the vertices.
    pub fn add_part(&mut self, vertices: &[Coord]) -> Result<usize> {
        let env = Envelope::of(vertices.iter().copied())
            .ok_or_else(|| MitabError::BadArgument("cannot add an empty part".to_string()))?;
        match self {
            Geometry::Point(p) => *p = single_vertex(vertices)?,
            Geometry::FontPoint { position, .. } | Geometry::CustomPoint { position, .. } => {
                *position = single_vertex(vertices)?
            }
            Geometry::Text {
                origin, line_end, ..
            } => {
                let at = single_vertex(vertices)?;
                if *line_end == *origin {
                    *line_end = at;
                }
                *origin = at;
            }
            Geometry::Polyline { parts, .. } => {
                if vertices.len() < 2 {
                    return Err(MitabError::BadArgument(
                        "a polyline part needs at least 2 vertices".to_string(),
                    ));
                }
                parts.push(vertices.to_vec());
                return Ok(parts.len() - 1);
            }
            Geometry::Region { rings, .. } => {
                if vertices.len() < 3 {
                    return Err(MitabError::BadArgument(
                        "a region ring needs at least 3 vertices".to_string(),
                    ));
                }
                rings.push(vertices.to_vec());
                return Ok(rings.len() - 1);
            }
            Geometry::MultiPoint(points) => points.extend_from_slice(vertices),
            Geometry::Rectangle { min, max, .. } => {
                *min = coord! { x: env.min_x, y: env.min_y };
                *max = coord! { x: env.max_x, y: env.max_y };
            }
            Geometry::Ellipse {
                center,
                x_radius,
                y_radius,
            }
            | Geometry::Arc {
                center,
                x_radius,
                y_radius,
                ..
            } => {
                *center = env.center();
                *x_radius = env.width() / 2.0;
                *y_radius = env.height() / 2.0;
            }
        }
        Ok(0)
    }

    /// Bounding box of all vertices.
    ///
    /// For text this is the origin only; the label box depends on the
    /// text display attributes of the feature style.
    pub fn envelope(&self) -> Option<Envelope> {
        match self {
            Geometry::Rectangle { min, max, .. } => Envelope::of([*min, *max]),
            Geometry::Ellipse {
                center,
                x_radius,
                y_radius,
            } => Envelope::of([
                coord! { x: center.x - x_radius, y: center.y - y_radius },
                coord! { x: center.x + x_radius, y: center.y + y_radius },
            ]),
            Geometry::Polyline { parts, .. } => Envelope::of(parts.iter().flatten().copied()),
            Geometry::Region { rings, .. } => Envelope::of(rings.iter().flatten().copied()),
            _ => self.part(0).and_then(|p| Envelope::of(p.iter().copied())),
        }
    }

    /// Check the geometry can be written to a dataset.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: &str| Err(MitabError::BadArgument(msg.to_string()));
        match self {
            Geometry::Polyline { parts, .. } => {
                if parts.is_empty() {
                    return bad("polyline without parts");
                }
                if parts.iter().any(|p| p.len() < 2) {
                    return bad("polyline part with fewer than 2 vertices");
                }
            }
            Geometry::Region { rings, .. } => {
                if rings.is_empty() {
                    return bad("region without rings");
                }
                if rings.iter().any(|r| r.len() < 3) {
                    return bad("region ring with fewer than 3 vertices");
                }
            }
            Geometry::MultiPoint(points) if points.is_empty() => {
                return bad("multipoint without points");
            }
            Geometry::Text { text, .. } if text.is_empty() => {
                return bad("text feature with an empty string");
            }
            _ => {}
        }
        let finite = (0..self.part_count())
            .filter_map(|i| self.part(i))
            .all(|p| p.iter().all(|c| c.x.is_finite() && c.y.is_finite()));
        if !finite {
            return bad("non-finite coordinate");
        }
        Ok(())
    }

    /// Label point of a region: the stored centroid or the envelope center.
    pub fn label_point(&self) -> Option<Coord> {
        match self {
            Geometry::Region {
                centroid: Some(c), ..
            } => Some(*c),
            _ => self.envelope().map(|e| e.center()),
        }
    }
}

fn single_vertex(vertices: &[Coord]) -> Result<Coord> {
    match vertices {
        [only] => Ok(*only),
        _ => Err(MitabError::BadArgument(format!(
            "expected exactly one vertex, got {}",
            vertices.len()
        ))),
    }
}

/// Closed ring outlining a rectangle, with 45-vertex quarter arcs at the
/// corners when it is rounded.
fn rectangle_ring(min: Coord, max: Coord, corner_radius: Option<(f64, f64)>) -> Vec<Coord> {
    let (rx, ry) = match corner_radius {
        Some((rx, ry)) if rx > 0.0 && ry > 0.0 => (
            rx.min((max.x - min.x) / 2.0),
            ry.min((max.y - min.y) / 2.0),
        ),
        _ => {
            return vec![
                min,
                coord! { x: max.x, y: min.y },
                max,
                coord! { x: min.x, y: max.y },
                min,
            ]
        }
    };
    let mut ring = Vec::with_capacity(181);
    let corners = [
        (coord! { x: max.x - rx, y: max.y - ry }, 0.0),
        (coord! { x: min.x + rx, y: max.y - ry }, PI / 2.0),
        (coord! { x: min.x + rx, y: min.y + ry }, PI),
        (coord! { x: max.x - rx, y: min.y + ry }, 3.0 * PI / 2.0),
    ];
    for (center, start) in corners {
        ring.extend(generate_arc(center, rx, ry, start, start + PI / 2.0, 45));
    }
    close_ring(&mut ring);
    ring
}
