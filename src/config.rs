//! Default projection bounds
//!
//! A binary dataset needs fixed bounds before its first geometry is written,
//! because they determine the integer coordinate grid. When a dataset is
//! created with all-zero bounds, the bounds are looked up here by
//! coordinate system.
//!
//! The process-wide table starts with built-in entries and can be extended
//! from a MapInfo `.prj` style file. If the `MITAB_BOUNDS_TABLE` environment
//! variable names such a file, it is merged in on first use.
//!
//! ```
//! use mitab::config::*;
//! use mitab::spatial_ref::CoordSys;
//!
//! let latlong = CoordSys::from_definition("Earth Projection 1, 104").unwrap();
//! let bounds = projection_bounds().lookup(&latlong).unwrap();
//! assert_eq!(bounds.xmax, 180.0);
//! ```

use std::fs;
use std::path::Path;
use std::sync::{LazyLock, RwLock, RwLockReadGuard};

use crate::errors::{MitabError, Result};
use crate::spatial_ref::{Bounds, CoordSys, CoordSysKind};

/// Environment variable naming a bounds file merged into the process table.
pub const BOUNDS_TABLE_ENV: &str = "MITAB_BOUNDS_TABLE";

/// Lookup table from coordinate system definition to default bounds.
#[derive(Clone, Debug, Default)]
pub struct ProjectionBoundsTable {
    entries: Vec<(CoordSys, Bounds)>,
    /// Answer for lat/long on datums without an entry of their own.
    any_latlong: bool,
}

/// Projection id of lat/long coordinate systems.
const LATLONG_PROJECTION: u8 = 1;

fn latlong_bounds() -> Bounds {
    Bounds::new(-180.0, -90.0, 180.0, 90.0)
}

impl ProjectionBoundsTable {
    /// An empty table, without the built-in entries.
    pub fn new() -> ProjectionBoundsTable {
        ProjectionBoundsTable::default()
    }

    /// Table holding only the built-in defaults: lat/long on any datum.
    pub fn builtin() -> ProjectionBoundsTable {
        ProjectionBoundsTable {
            entries: Vec::new(),
            any_latlong: true,
        }
    }

    /// Read a table file. Each usable line looks like
    ///
    /// ```text
    /// "Longitude / Latitude (WGS 84)", 1, 104 Bounds (-180, -90) (180, 90)
    /// ```
    ///
    /// i.e. a quoted description followed by the CoordSys parameters and a
    /// `Bounds` clause. Lines without a `Bounds` clause, blank lines and
    /// lines starting with `#` or `"---` are skipped.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ProjectionBoundsTable> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| MitabError::FileNotFound {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut table = ProjectionBoundsTable::new();
        table.merge_str(&text)?;
        log::debug!("Loaded {} projection bounds from {:?}", table.len(), path);
        Ok(table)
    }

    /// Parse table lines from `text` and add them.
    pub fn merge_str(&mut self, text: &str) -> Result<()> {
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("\"---") {
                continue;
            }
            if !line.to_ascii_lowercase().contains("bounds") {
                continue;
            }
            let rest = match strip_description(line) {
                Some(rest) => rest,
                None => {
                    return Err(MitabError::ParseError {
                        line: line_no + 1,
                        msg: "expected a quoted description".to_string(),
                    })
                }
            };
            let definition = if rest.to_ascii_lowercase().starts_with("nonearth") {
                rest.to_string()
            } else {
                format!("Earth Projection {rest}")
            };
            let cs =
                CoordSys::from_definition(&definition).map_err(|e| MitabError::ParseError {
                    line: line_no + 1,
                    msg: e.to_string(),
                })?;
            if let Some(bounds) = cs.bounds() {
                self.insert(cs, bounds);
            }
        }
        Ok(())
    }

    /// Add or replace the bounds of `coordsys`.
    pub fn insert(&mut self, mut coordsys: CoordSys, bounds: Bounds) {
        coordsys.set_bounds(None);
        match self
            .entries
            .iter_mut()
            .find(|(cs, _)| cs.same_definition(&coordsys))
        {
            Some(entry) => entry.1 = bounds,
            None => self.entries.push((coordsys, bounds)),
        }
    }

    pub fn extend(&mut self, other: &ProjectionBoundsTable) {
        self.any_latlong |= other.any_latlong;
        for (cs, bounds) in &other.entries {
            self.insert(cs.clone(), *bounds);
        }
    }

    /// Default bounds of `coordsys`, if known.
    ///
    /// Explicit entries win. A `NonEarth` system carrying its own `Bounds`
    /// clause answers for itself.
    pub fn lookup(&self, coordsys: &CoordSys) -> Option<Bounds> {
        if let Some((_, bounds)) = self
            .entries
            .iter()
            .find(|(cs, _)| cs.same_definition(coordsys))
        {
            return Some(*bounds);
        }
        match coordsys.kind() {
            CoordSysKind::NonEarth => coordsys.bounds(),
            CoordSysKind::Earth
                if self.any_latlong && coordsys.projection() == LATLONG_PROJECTION =>
            {
                Some(latlong_bounds())
            }
            CoordSysKind::Earth => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Returns what follows the leading `"description",` of a table line.
fn strip_description(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('"')?;
    let end = rest.find('"')?;
    let rest = rest[end + 1..].trim_start();
    Some(rest.strip_prefix(',').unwrap_or(rest).trim())
}

static PROJECTION_BOUNDS: LazyLock<RwLock<ProjectionBoundsTable>> = LazyLock::new(|| {
    let mut table = ProjectionBoundsTable::builtin();
    if let Ok(path) = std::env::var(BOUNDS_TABLE_ENV) {
        match ProjectionBoundsTable::load(&path) {
            Ok(extra) => table.extend(&extra),
            Err(e) => log::warn!("Ignoring {BOUNDS_TABLE_ENV}={path}: {e}"),
        }
    }
    RwLock::new(table)
});

/// Read access to the process-wide bounds table.
pub fn projection_bounds() -> RwLockReadGuard<'static, ProjectionBoundsTable> {
    PROJECTION_BOUNDS
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Merge the entries of a table file into the process-wide table.
///
/// Returns the number of entries read from the file.
pub fn load_projection_bounds_table<P: AsRef<Path>>(path: P) -> Result<usize> {
    let extra = ProjectionBoundsTable::load(path)?;
    let mut table = PROJECTION_BOUNDS
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    table.extend(&extra);
    Ok(extra.len())
}

/// Add a single entry to the process-wide table.
pub fn set_projection_bounds(coordsys: CoordSys, bounds: Bounds) {
    let mut table = PROJECTION_BOUNDS
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    table.insert(coordsys, bounds);
}

/// Drop everything loaded at runtime and go back to the built-in entries.
pub fn reset_projection_bounds_table() {
    let mut table = PROJECTION_BOUNDS
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *table = ProjectionBoundsTable::builtin();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixture;

    #[test]
    fn test_builtin_latlong() {
        let table = ProjectionBoundsTable::builtin();
        let cs = CoordSys::from_definition("Earth Projection 1, 74").unwrap();
        assert_eq!(
            table.lookup(&cs),
            Some(Bounds::new(-180.0, -90.0, 180.0, 90.0))
        );
        let utm = CoordSys::from_definition(
            "Earth Projection 8, 104, \"m\", 3, 0, 0.9996, 500000, 0",
        )
        .unwrap();
        assert_eq!(table.lookup(&utm), None);
    }

    #[test]
    fn test_latlong_on_any_datum() {
        let mut table = ProjectionBoundsTable::builtin();
        for datum in [0, 28, 115, 116] {
            let cs = CoordSys::from_definition(&format!("Earth Projection 1, {datum}")).unwrap();
            assert_eq!(table.lookup(&cs), Some(latlong_bounds()), "datum {datum}");
        }
        let nad27 = CoordSys::from_definition("Earth Projection 1, 62").unwrap();
        table.insert(nad27.clone(), Bounds::new(-170.0, 10.0, -50.0, 85.0));
        assert_eq!(table.lookup(&nad27).unwrap().xmin, -170.0);

        let empty = ProjectionBoundsTable::new();
        assert_eq!(empty.lookup(&nad27), None);
    }

    #[test]
    fn test_non_earth_answers_for_itself() {
        let table = ProjectionBoundsTable::new();
        let cs = CoordSys::from_definition("NonEarth Units \"m\" Bounds (0, 0) (10, 20)").unwrap();
        assert_eq!(table.lookup(&cs), Some(Bounds::new(0.0, 0.0, 10.0, 20.0)));
        let cs = CoordSys::from_definition("NonEarth Units \"m\"").unwrap();
        assert_eq!(table.lookup(&cs), None);
    }

    #[test]
    fn test_merge_lines() {
        let mut table = ProjectionBoundsTable::new();
        table
            .merge_str(
                "\"--- UTM ---\"\n\
                 # comment\n\
                 \"UTM Zone 31 (WGS 84)\", 8, 104, \"m\", 3, 0, 0.9996, 500000, 0 Bounds (-7745844, -9997964) (8745844, 9997964)\n\
                 \"No bounds here\", 1, 62\n",
            )
            .unwrap();
        assert_eq!(table.len(), 1);
        let utm = CoordSys::from_definition(
            "Earth Projection 8, 104, \"m\", 3, 0, 0.9996, 500000, 0",
        )
        .unwrap();
        let bounds = table.lookup(&utm).unwrap();
        assert_eq!(bounds.xmin, -7745844.0);
        assert_eq!(bounds.ymax, 9997964.0);
    }

    #[test]
    fn test_merge_reports_line() {
        let mut table = ProjectionBoundsTable::new();
        let err = table
            .merge_str("\n\"Broken\", 8, x Bounds (0, 0) (1, 1)\n")
            .unwrap_err();
        match err {
            MitabError::ParseError { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_load_fixture() {
        let table = ProjectionBoundsTable::load(fixture("mapinfow.prj")).unwrap();
        assert!(table.len() >= 2);
        let lambert = CoordSys::from_definition(
            "Earth Projection 3, 74, \"m\", -96, 23, 20, 60, 0, 0",
        )
        .unwrap();
        assert!(table.lookup(&lambert).is_some());
    }

    #[test]
    fn test_load_missing_file() {
        let err = ProjectionBoundsTable::load("fixtures/does-not-exist.prj").unwrap_err();
        assert_eq!(err.category(), crate::errors::ErrorCategory::NotFound);
    }
}
