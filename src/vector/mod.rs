//! MapInfo vector data: schema, features, geometries and styles, and the
//! [`Dataset`] that reads and writes them.
//!
//! ## Reading
//!
//! ```no_run
//! use mitab::vector::Dataset;
//!
//! let dataset = Dataset::open("fixtures/towns.mif").unwrap();
//! let mut last = None;
//! while let Some(fid) = dataset.next_feature_id(last).unwrap() {
//!     let feature = dataset.read_feature(fid).unwrap();
//!     println!("{fid}: {:?}", feature.field("Name").unwrap());
//!     last = Some(fid);
//! }
//! ```
//!
//! ## Writing
//!
//! ```no_run
//! use mitab::vector::{Dataset, FieldDefn, FieldType, Geometry};
//! use mitab::{Bounds, Format};
//!
//! let mut dataset = Dataset::create(
//!     "/tmp/cities.tab",
//!     Format::Tab,
//!     "Earth Projection 1, 104",
//!     Bounds::default(),
//! )
//! .unwrap();
//! dataset.add_field(FieldDefn::new("Name", FieldType::Char).unwrap()).unwrap();
//! let mut feature = mitab::vector::Feature::new(dataset.defn().unwrap().clone());
//! feature.set_field_string("Name", "Paris").unwrap();
//! feature.set_geometry(Geometry::point(2.35, 48.85));
//! dataset.write_feature(&mut feature).unwrap();
//! dataset.close().unwrap();
//! ```

pub use crate::vector::dataset::{Access, Dataset, FeatureIterator};
pub use crate::vector::defn::{Defn, Field, FieldDefn, FieldIterator, FieldType};
pub use crate::vector::feature::{Feature, FieldValue};
pub use crate::vector::geometry::{Envelope, FeatureType, Geometry};
pub use crate::vector::ops::conversions::ToMitab;
pub use crate::vector::style::{
    Brush, Color, Font, FontStyle, Pen, Style, Symbol, TextDisplay, TextJustification,
    TextLineType, TextSpacing, BLACK, MAX_FONT_NAME, WHITE,
};

pub(crate) use crate::vector::feature::{format_value, parse_value};

mod dataset;
mod defn;
mod feature;
mod geometry;
mod ops;
mod style;

#[cfg(test)]
mod tests;
