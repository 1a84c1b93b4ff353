//! MapInfo coordinate system definitions.
//!
//! The engine does not reproject: a [`CoordSys`] is parsed from and written
//! back to the MapInfo `CoordSys` clause syntax, and the pieces the `.MAP`
//! header needs (projection id, units, parameters) are extracted from it.

mod srs;

pub use srs::{units_code, units_name, Bounds, CoordSys, CoordSysKind};
