//! Binary TAB datasets: the `.TAB` header, `.MAP` geometries, `.DAT`
//! attributes and `.ID` object offsets of one table.

pub mod dat;
pub mod header;
pub mod id_file;
pub mod map;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::{MitabError, Result};
use crate::spatial_ref::{Bounds, CoordSys};
use crate::vector::{Defn, Envelope, Feature, FieldDefn, FieldType, FieldValue};

use dat::{encode_record, DatReader, DatWriter};
use header::{TabHeader, COORDSYS_KEY};
use id_file::IdIndex;
use map::coord_codec::CoordCodec;
use map::header_block::{MapHeader, MULTIPOINT_VERSION};
use map::{MapReader, MapWriter};

/// Field added when the first feature is created in a table without fields.
pub const AUTO_FIELD_NAME: &str = "NDX";

const TAB_VERSION: i32 = 300;

/// Path of the companion file with extension `ext`, in the letter case of
/// the `.TAB` extension unless only the other case exists.
pub(crate) fn sibling(path: &Path, ext: &str) -> PathBuf {
    let upper = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.chars().any(|c| c.is_ascii_uppercase()))
        .unwrap_or(false);
    let (preferred, other) = if upper {
        (ext.to_ascii_uppercase(), ext.to_ascii_lowercase())
    } else {
        (ext.to_ascii_lowercase(), ext.to_ascii_uppercase())
    };
    let candidate = path.with_extension(preferred);
    if !candidate.exists() {
        let fallback = path.with_extension(other);
        if fallback.exists() {
            return fallback;
        }
    }
    candidate
}

pub(crate) fn read_text(path: &Path) -> Result<String> {
    fs::read(path)
        .map(|bytes| crate::utils::latin1_to_string(&bytes))
        .map_err(|e| MitabError::FileNotFound {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// A TAB dataset open for reading.
#[derive(Debug)]
pub struct TabReader {
    header: TabHeader,
    defn: Arc<Defn>,
    coordsys: CoordSys,
    map: Option<MapReader>,
    dat: DatReader,
    ids: IdIndex,
}

impl TabReader {
    pub fn open(path: &Path) -> Result<TabReader> {
        let header = TabHeader::parse(&read_text(path)?)?;
        let defn = Arc::new(header.defn.clone());
        let dat = DatReader::open(&sibling(path, "dat"), &defn)?;

        let map_path = sibling(path, "map");
        let (map, ids) = if map_path.exists() {
            let map = MapReader::open(&map_path)?;
            let ids = IdIndex::open(&sibling(path, "id"))?;
            (Some(map), ids)
        } else {
            log::debug!("{} has no .MAP file, features have no geometry", path.display());
            (None, IdIndex::new())
        };

        let coordsys = match header.coordsys().map(CoordSys::from_definition) {
            Some(Ok(cs)) => cs,
            Some(Err(e)) => {
                log::warn!("Ignoring unparsable CoordSys metadata: {e}");
                coordsys_from_map(map.as_ref())
            }
            None => coordsys_from_map(map.as_ref()),
        };
        log::debug!(
            "Opened {}: {} fields, {} records",
            path.display(),
            defn.field_count(),
            dat.num_records()
        );
        Ok(TabReader {
            header,
            defn,
            coordsys,
            map,
            dat,
            ids,
        })
    }

    pub fn defn(&self) -> &Arc<Defn> {
        &self.defn
    }

    pub fn coordsys(&self) -> &CoordSys {
        &self.coordsys
    }

    pub fn version(&self) -> i32 {
        self.header.version
    }

    /// Bounds of the coordinate grid of the `.MAP` file.
    pub fn bounds(&self) -> Option<Bounds> {
        self.map.as_ref().map(|m| m.codec().bounds())
    }

    pub fn map_header(&self) -> Option<&MapHeader> {
        self.map.as_ref().map(MapReader::header)
    }

    /// First live id after `last`, or the first live id for `None`.
    pub fn next_feature_id(&self, last: Option<u64>) -> Result<Option<u64>> {
        let start = match last {
            Some(l) => match l.checked_add(1) {
                Some(next) => next,
                None => return Ok(None),
            },
            None => 1,
        };
        for fid in start.max(1)..=self.dat.num_records() as u64 {
            if self.dat.is_live(fid)? {
                return Ok(Some(fid));
            }
        }
        Ok(None)
    }

    pub fn read_feature(&self, fid: u64) -> Result<Feature> {
        let values = self
            .dat
            .values(&self.defn, fid)?
            .ok_or(MitabError::FeatureNotFound {
                fid,
                method_name: "read_feature",
            })?;
        let mut feature = Feature::new(self.defn.clone());
        feature.set_fid(Some(fid));
        feature.set_values(values);
        if let Some(map) = &self.map {
            if let Some(object) = map.read_object(self.ids.ptr(fid))? {
                if object.id as u64 != fid {
                    log::warn!("Object for feature {fid} carries id {}", object.id);
                }
                feature.set_geometry(object.geometry);
                feature.set_style(object.style);
            }
        }
        Ok(feature)
    }

    pub fn extent(&self) -> Option<Envelope> {
        self.map.as_ref().and_then(MapReader::extent)
    }

    /// Live feature ids reachable through the `.MAP` spatial index.
    pub fn indexed_feature_ids(&self) -> Result<Vec<u64>> {
        let Some(map) = &self.map else {
            return Ok(Vec::new());
        };
        let mut ids = Vec::new();
        for (_, id) in map.indexed_objects()? {
            if id > 0 && self.dat.is_live(id as u64)? {
                ids.push(id as u64);
            }
        }
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}

fn coordsys_from_map(map: Option<&MapReader>) -> CoordSys {
    match map {
        Some(map) => {
            let h = map.header();
            CoordSys::from_map_header(h.projection, h.units, &h.proj_params)
        }
        None => CoordSys::default(),
    }
}

/// A new TAB dataset being written.
///
/// The `.TAB` file is written last by [`TabWriter::close`]; until then the
/// dataset cannot be opened.
pub struct TabWriter {
    tab_path: PathBuf,
    defn: Arc<Defn>,
    coordsys: CoordSys,
    map: MapWriter,
    dat: Option<DatWriter>,
    ids: IdIndex,
    deleted: BTreeSet<u64>,
    auto_field: bool,
}

impl TabWriter {
    pub fn create(path: &Path, coordsys: &CoordSys, bounds: &Bounds) -> Result<TabWriter> {
        let codec = CoordCodec::from_bounds(bounds)?;
        let mut map_header = MapHeader::new(codec);
        map_header.projection = coordsys.projection();
        map_header.units = coordsys.units_code();
        map_header.ellipsoid = coordsys.ellipsoid_code();
        for (slot, p) in map_header.proj_params.iter_mut().zip(coordsys.params()) {
            *slot = *p;
        }
        if path.exists() {
            fs::remove_file(path)?;
        }
        let map = MapWriter::create(&sibling(path, "map"), map_header)?;
        let mut coordsys = coordsys.clone();
        coordsys.set_bounds(Some(*bounds));
        log::debug!("Creating {} with bounds {bounds}", path.display());
        Ok(TabWriter {
            tab_path: path.to_path_buf(),
            defn: Arc::new(Defn::new()),
            coordsys,
            map,
            dat: None,
            ids: IdIndex::new(),
            deleted: BTreeSet::new(),
            auto_field: false,
        })
    }

    pub fn defn(&self) -> &Arc<Defn> {
        &self.defn
    }

    pub fn coordsys(&self) -> &CoordSys {
        &self.coordsys
    }

    pub fn codec(&self) -> &CoordCodec {
        self.map.codec()
    }

    /// True once a feature has been written.
    pub fn is_frozen(&self) -> bool {
        self.dat.is_some()
    }

    pub fn add_field(&mut self, field: FieldDefn) -> Result<usize> {
        if self.is_frozen() {
            return Err(MitabError::SchemaFrozen {
                field_name: field.name().to_string(),
            });
        }
        Arc::make_mut(&mut self.defn).push(field)?;
        Ok(self.defn.field_count() - 1)
    }

    /// Add the `NDX` field to a table that has none yet.
    pub fn ensure_field(&mut self) -> Result<()> {
        if self.defn.field_count() == 0 && !self.is_frozen() {
            self.add_field(FieldDefn::new(AUTO_FIELD_NAME, FieldType::Integer)?)?;
            self.auto_field = true;
        }
        Ok(())
    }

    fn num_records(&self) -> u64 {
        self.dat.as_ref().map(|d| d.num_records() as u64).unwrap_or(0)
    }

    /// Written features that were not deleted.
    pub fn live_count(&self) -> u64 {
        self.num_records() - self.deleted.len() as u64
    }

    pub fn is_live(&self, fid: u64) -> bool {
        fid >= 1 && fid <= self.num_records() && !self.deleted.contains(&fid)
    }

    /// Append `feature`, under its own id when it has one, and store the id
    /// it was written under back into it.
    ///
    /// A geometry that cannot be encoded fails the write before anything
    /// reaches the files.
    pub fn write_feature(&mut self, feature: &mut Feature) -> Result<u64> {
        if feature.field_count() == 0 {
            self.ensure_field()?;
        }
        let next = self.num_records() + 1;
        let fid = match feature.fid() {
            None => next,
            Some(0) => {
                return Err(MitabError::BadArgument(
                    "feature ids start at 1".to_string(),
                ))
            }
            Some(fid) if fid < next => {
                return Err(MitabError::BadArgument(format!(
                    "feature {fid} has already been written"
                )))
            }
            Some(fid) => fid,
        };
        let map_id = i32::try_from(fid)
            .map_err(|_| MitabError::BadArgument(format!("feature id {fid} is too large")))?;

        let mut values = if feature.field_count() == 0 && self.auto_field {
            vec![None]
        } else if feature.defn() == &*self.defn {
            feature.values().to_vec()
        } else {
            return Err(MitabError::SchemaMismatch(format!(
                "feature has {} fields, table has {}",
                feature.field_count(),
                self.defn.field_count()
            )));
        };
        if self.auto_field && values[0].is_none() {
            values[0] = Some(FieldValue::IntegerValue(map_id));
        }
        let record = encode_record(&self.defn, &values)?;

        let ptr = match feature.geometry() {
            Some(geom) => {
                geom.validate()?;
                self.map.write_object(map_id, geom, feature.style())?
            }
            None => 0,
        };

        let dat = match self.dat.take() {
            Some(dat) => dat,
            None => DatWriter::create(&sibling(&self.tab_path, "dat"), &self.defn)?,
        };
        let dat = self.dat.insert(dat);
        for skipped in next..fid {
            dat.append_deleted()?;
            self.ids.set(skipped, 0);
            self.deleted.insert(skipped);
        }
        dat.append(&record)?;
        self.ids.set(fid, ptr);
        feature.set_fid(Some(fid));
        Ok(fid)
    }

    pub fn delete_feature(&mut self, fid: u64) -> Result<()> {
        if !self.is_live(fid) {
            return Err(MitabError::FeatureNotFound {
                fid,
                method_name: "delete_feature",
            });
        }
        if let Some(dat) = self.dat.as_mut() {
            dat.mark_deleted(fid)?;
        }
        self.ids.set(fid, 0);
        self.deleted.insert(fid);
        Ok(())
    }

    pub fn extent(&self) -> Option<Envelope> {
        self.map.extent()
    }

    /// Write the `.MAP`, `.DAT` and `.ID` files, then the `.TAB` header.
    pub fn close(mut self) -> Result<()> {
        if self.dat.is_none() {
            self.ensure_field()?;
            self.dat = Some(DatWriter::create(
                &sibling(&self.tab_path, "dat"),
                &self.defn,
            )?);
        }
        let version = if self.map.header().version >= MULTIPOINT_VERSION {
            MULTIPOINT_VERSION as i32
        } else {
            TAB_VERSION
        };
        let mut header = TabHeader::new((*self.defn).clone(), version);
        header.set_metadata_item(COORDSYS_KEY, &self.coordsys.to_string());

        self.map.close()?;
        if let Some(dat) = self.dat {
            dat.finish()?;
        }
        self.ids.write(&sibling(&self.tab_path, "id"))?;
        fs::write(
            &self.tab_path,
            crate::utils::string_to_latin1(&header.to_text()),
        )?;
        log::debug!(
            "Closed {}: {} records",
            self.tab_path.display(),
            self.ids.len()
        );
        Ok(())
    }
}
