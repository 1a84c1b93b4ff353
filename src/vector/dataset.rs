use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::projection_bounds;
use crate::errors::{MitabError, Result};
use crate::mif::{self, MifReader, MifWriter};
use crate::options::{DatasetOptions, Format};
use crate::spatial_ref::{Bounds, CoordSys};
use crate::tab::{TabReader, TabWriter};
use crate::vector::{Defn, Envelope, Feature, FeatureType, FieldDefn, Geometry};

/// What a [`Dataset`] may currently be used for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    Closed,
    OpenForRead,
    OpenForWrite,
}

impl Access {
    fn describe(self) -> &'static str {
        match self {
            Access::Closed => "closed",
            Access::OpenForRead => "open for read",
            Access::OpenForWrite => "open for write",
        }
    }
}

enum Backend {
    TabRead(TabReader),
    TabWrite(TabWriter),
    MifRead(MifReader),
    MifWrite(MifWriter),
    Closed,
}

/// A TAB or MIF/MID dataset.
///
/// A dataset is either read from an existing file or written from scratch;
/// the two are never mixed on the same handle.
///
/// ```no_run
/// use mitab::vector::Dataset;
///
/// let dataset = Dataset::open("fixtures/towns.mif").unwrap();
/// for feature in dataset.features() {
///     let feature = feature.unwrap();
///     println!("{:?} {:?}", feature.fid(), feature.feature_type());
/// }
/// ```
pub struct Dataset {
    path: PathBuf,
    format: Format,
    backend: Backend,
}

impl Dataset {
    /// Open the dataset at `path` for reading.
    ///
    /// The format follows the extension, `.tab` or `.mif`; any other
    /// extension is resolved by looking at the header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Dataset> {
        let path = path.as_ref();
        let format = match Format::from_path(path) {
            Some(format) => format,
            None if mif::sniff(path) => Format::Mif,
            None => Format::Tab,
        };
        let backend = match format {
            Format::Tab => Backend::TabRead(TabReader::open(path)?),
            Format::Mif => Backend::MifRead(MifReader::open(path)?),
        };
        Ok(Dataset {
            path: path.to_path_buf(),
            format,
            backend,
        })
    }

    /// Create a new dataset.
    ///
    /// Bounds of all zeros are replaced by the default bounds of
    /// `coordsys`; see [`Dataset::create_with_options`].
    pub fn create<P: AsRef<Path>>(
        path: P,
        format: Format,
        coordsys: &str,
        bounds: Bounds,
    ) -> Result<Dataset> {
        Self::create_with_options(
            path,
            DatasetOptions {
                format,
                coordsys: Some(coordsys),
                bounds: Some(bounds),
                ..DatasetOptions::default()
            },
        )
    }

    /// Create a new dataset.
    ///
    /// Bounds are taken from, in order: `options.bounds` unless all zeros,
    /// a `Bounds` clause of the CoordSys string, `options.bounds_table`,
    /// then the process-wide table of [`crate::config`]. Nothing is written
    /// when none of them knows the coordinate system.
    pub fn create_with_options<P: AsRef<Path>>(
        path: P,
        options: DatasetOptions<'_>,
    ) -> Result<Dataset> {
        let path = path.as_ref();
        let coordsys = match options.coordsys {
            Some(definition) => CoordSys::from_definition(definition)?,
            None => CoordSys::default(),
        };
        let bounds = resolve_bounds(&coordsys, &options)?;
        let backend = match options.format {
            Format::Tab => Backend::TabWrite(TabWriter::create(path, &coordsys, &bounds)?),
            Format::Mif => Backend::MifWrite(MifWriter::create(path, &coordsys, Some(&bounds))?),
        };
        Ok(Dataset {
            path: path.to_path_buf(),
            format: options.format,
            backend,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn access(&self) -> Access {
        match self.backend {
            Backend::TabRead(_) | Backend::MifRead(_) => Access::OpenForRead,
            Backend::TabWrite(_) | Backend::MifWrite(_) => Access::OpenForWrite,
            Backend::Closed => Access::Closed,
        }
    }

    fn invalid(&self, method_name: &'static str) -> MitabError {
        MitabError::InvalidState {
            method_name,
            state: self.access().describe(),
        }
    }

    pub fn defn(&self) -> Result<&Arc<Defn>> {
        match &self.backend {
            Backend::TabRead(r) => Ok(r.defn()),
            Backend::TabWrite(w) => Ok(w.defn()),
            Backend::MifRead(r) => Ok(r.defn()),
            Backend::MifWrite(w) => Ok(w.defn()),
            Backend::Closed => Err(self.invalid("defn")),
        }
    }

    pub fn coordsys(&self) -> Result<&CoordSys> {
        match &self.backend {
            Backend::TabRead(r) => Ok(r.coordsys()),
            Backend::TabWrite(w) => Ok(w.coordsys()),
            Backend::MifRead(r) => Ok(r.coordsys()),
            Backend::MifWrite(w) => Ok(w.coordsys()),
            Backend::Closed => Err(self.invalid("coordsys")),
        }
    }

    /// Declared bounds of the coordinate space.
    pub fn bounds(&self) -> Option<Bounds> {
        match &self.backend {
            Backend::TabRead(r) => r.bounds(),
            Backend::TabWrite(w) => Some(w.codec().bounds()),
            Backend::MifRead(r) => r.bounds(),
            Backend::MifWrite(w) => w.coordsys().bounds(),
            Backend::Closed => None,
        }
    }

    /// Add a field; only possible before the first feature is written.
    pub fn add_field(&mut self, field: FieldDefn) -> Result<usize> {
        match &mut self.backend {
            Backend::TabWrite(w) => w.add_field(field),
            Backend::MifWrite(w) => w.add_field(field),
            _ => Err(self.invalid("add_field")),
        }
    }

    /// A blank feature of this dataset's schema carrying an empty geometry
    /// of `feature_type`, ready to be filled and written.
    ///
    /// A dataset without fields gets an `NDX` integer field first.
    pub fn create_feature(&mut self, feature_type: FeatureType) -> Result<Feature> {
        let defn = match &mut self.backend {
            Backend::TabWrite(w) => {
                w.ensure_field()?;
                w.defn().clone()
            }
            Backend::MifWrite(w) => {
                w.ensure_field()?;
                w.defn().clone()
            }
            _ => return Err(self.invalid("create_feature")),
        };
        let mut feature = Feature::new(defn);
        if feature_type != FeatureType::NoGeom {
            feature.set_geometry(Geometry::empty(feature_type)?);
        }
        Ok(feature)
    }

    /// Append `feature` and return its id, which is also stored back into
    /// the feature.
    ///
    /// Nothing is written when the attributes or the geometry are rejected.
    pub fn write_feature(&mut self, feature: &mut Feature) -> Result<u64> {
        match &mut self.backend {
            Backend::TabWrite(w) => w.write_feature(feature),
            Backend::MifWrite(w) => w.write_feature(feature),
            _ => Err(self.invalid("write_feature")),
        }
    }

    /// Mark a written feature as deleted. Only TAB datasets being written
    /// support deletion.
    pub fn delete_feature(&mut self, fid: u64) -> Result<()> {
        match &mut self.backend {
            Backend::TabWrite(w) => w.delete_feature(fid),
            Backend::MifWrite(_) => Err(MitabError::BadArgument(
                "MIF datasets do not support deletion".to_string(),
            )),
            _ => Err(self.invalid("delete_feature")),
        }
    }

    /// The first valid id after `last`, or the first valid id when `last`
    /// is `None`. Deleted ids are skipped.
    pub fn next_feature_id(&self, last: Option<u64>) -> Result<Option<u64>> {
        match &self.backend {
            Backend::TabRead(r) => r.next_feature_id(last),
            Backend::MifRead(r) => Ok(r.next_feature_id(last)),
            _ => Err(self.invalid("next_feature_id")),
        }
    }

    /// An owned snapshot of feature `fid`.
    pub fn read_feature(&self, fid: u64) -> Result<Feature> {
        match &self.backend {
            Backend::TabRead(r) => r.read_feature(fid),
            Backend::MifRead(r) => r.read_feature(fid),
            _ => Err(self.invalid("read_feature")),
        }
    }

    /// Iterate over every valid feature in id order.
    pub fn features(&self) -> FeatureIterator<'_> {
        FeatureIterator {
            dataset: self,
            last: None,
            done: false,
        }
    }

    /// Number of valid features: live records when reading, features
    /// written so far when writing.
    pub fn feature_count(&self) -> Result<u64> {
        match &self.backend {
            Backend::TabRead(r) => {
                let mut count = 0;
                let mut last = None;
                while let Some(fid) = r.next_feature_id(last)? {
                    count += 1;
                    last = Some(fid);
                }
                Ok(count)
            }
            Backend::TabWrite(w) => Ok(w.live_count()),
            Backend::MifRead(r) => Ok(r.feature_count()),
            Backend::MifWrite(w) => Ok(w.feature_count()),
            Backend::Closed => Err(self.invalid("feature_count")),
        }
    }

    /// Bounding box of all geometries.
    pub fn extent(&self) -> Result<Option<Envelope>> {
        match &self.backend {
            Backend::TabRead(r) => Ok(r.extent()),
            Backend::TabWrite(w) => Ok(w.extent()),
            Backend::MifRead(r) => r.extent(),
            Backend::MifWrite(w) => Ok(w.extent()),
            Backend::Closed => Err(self.invalid("extent")),
        }
    }

    /// Ids of the live features reachable through the `.MAP` spatial index,
    /// sorted.
    pub fn indexed_feature_ids(&self) -> Result<Vec<u64>> {
        match &self.backend {
            Backend::TabRead(r) => r.indexed_feature_ids(),
            _ => Err(self.invalid("indexed_feature_ids")),
        }
    }

    /// Flush and release the files. Closing again does nothing.
    pub fn close(&mut self) -> Result<()> {
        match mem::replace(&mut self.backend, Backend::Closed) {
            Backend::TabWrite(w) => w.close(),
            Backend::MifWrite(w) => w.close(),
            Backend::TabRead(_) | Backend::MifRead(_) | Backend::Closed => Ok(()),
        }
    }
}

impl Drop for Dataset {
    fn drop(&mut self) {
        if self.access() == Access::OpenForWrite {
            log::warn!(
                "Dataset {} dropped without close, closing it now",
                self.path.display()
            );
            if let Err(e) = self.close() {
                log::warn!("Closing {} failed: {e}", self.path.display());
            }
        }
    }
}

fn resolve_bounds(coordsys: &CoordSys, options: &DatasetOptions<'_>) -> Result<Bounds> {
    if let Some(bounds) = options.bounds.filter(|b| !b.is_unset()) {
        return Ok(bounds);
    }
    if let Some(bounds) = coordsys.bounds().filter(|b| !b.is_unset()) {
        return Ok(bounds);
    }
    let found = options
        .bounds_table
        .and_then(|table| table.lookup(coordsys))
        .or_else(|| projection_bounds().lookup(coordsys));
    match found {
        Some(bounds) => {
            log::debug!("Using default bounds {bounds} for {coordsys}");
            Ok(bounds)
        }
        None => Err(MitabError::UnknownProjectionBounds {
            coordsys: coordsys.to_string(),
        }),
    }
}

/// Iterator over the features of a [`Dataset`], see [`Dataset::features`].
///
/// Stops after the first error.
pub struct FeatureIterator<'a> {
    dataset: &'a Dataset,
    last: Option<u64>,
    done: bool,
}

impl Iterator for FeatureIterator<'_> {
    type Item = Result<Feature>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let fid = match self.dataset.next_feature_id(self.last) {
            Ok(Some(fid)) => fid,
            Ok(None) => {
                self.done = true;
                return None;
            }
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        self.last = Some(fid);
        let feature = self.dataset.read_feature(fid);
        if feature.is_err() {
            self.done = true;
        }
        Some(feature)
    }
}
