use std::path::Path;

use crate::config::ProjectionBoundsTable;
use crate::spatial_ref::Bounds;

/// On-disk flavour of a dataset.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Format {
    /// Binary `.TAB`/`.MAP`/`.DAT`/`.ID` quartet.
    #[default]
    Tab,
    /// Text `.MIF`/`.MID` pair.
    Mif,
}

impl Format {
    /// Format implied by the extension of `path`, if any.
    pub fn from_path(path: &Path) -> Option<Format> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("tab") {
            Some(Format::Tab)
        } else if ext.eq_ignore_ascii_case("mif") {
            Some(Format::Mif)
        } else {
            None
        }
    }
}

/// Creation options for [`crate::vector::Dataset::create_with_options`].
#[derive(Debug, Default)]
pub struct DatasetOptions<'a> {
    pub format: Format,
    /// MapInfo `CoordSys` clause; lat/long on WGS 84 when unset.
    pub coordsys: Option<&'a str>,
    /// Explicit bounds; `None` or all zeros means look them up.
    pub bounds: Option<Bounds>,
    /// Consulted before the process-wide projection bounds table.
    pub bounds_table: Option<&'a ProjectionBoundsTable>,
}
