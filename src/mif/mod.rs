//! MIF/MID text datasets.
//!
//! The `.MIF` file holds the header (schema, coordinate system) followed by
//! one geometry body per feature, each starting with a geometry keyword and
//! followed by optional style clauses. The `.MID` file holds one line of
//! attribute values per feature. Features are numbered from 1 in file order.

pub mod geometry;
pub mod header;
pub mod lexer;
pub mod mid;

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::{MitabError, Result};
use crate::spatial_ref::{Bounds, CoordSys};
use crate::tab::dat::encode_record;
use crate::tab::{read_text, sibling, AUTO_FIELD_NAME};
use crate::utils::string_to_latin1;
use crate::vector::{Defn, Envelope, Feature, FieldDefn, FieldType, FieldValue};

use header::MifHeader;

const GEOMETRY_KEYWORDS: [&str; 11] = [
    "none",
    "point",
    "line",
    "pline",
    "region",
    "arc",
    "text",
    "rect",
    "roundrect",
    "ellipse",
    "multipoint",
];

fn starts_feature(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .map(|w| GEOMETRY_KEYWORDS.iter().any(|k| w.eq_ignore_ascii_case(k)))
        .unwrap_or(false)
}

/// A MIF/MID dataset open for reading.
///
/// Geometry bodies are located when the file is opened and parsed on
/// demand.
#[derive(Debug)]
pub struct MifReader {
    header: MifHeader,
    defn: Arc<Defn>,
    coordsys: CoordSys,
    lines: Vec<String>,
    starts: Vec<usize>,
    mid: Vec<String>,
}

impl MifReader {
    pub fn open(path: &Path) -> Result<MifReader> {
        let lines: Vec<String> = read_text(path)?.lines().map(str::to_string).collect();
        let (header, data) = MifHeader::parse(&lines)?;

        let mut starts = Vec::new();
        for (i, line) in lines.iter().enumerate().skip(data) {
            if starts_feature(line) {
                starts.push(i);
            } else if starts.is_empty() && !line.trim().is_empty() {
                return Err(MitabError::ParseError {
                    line: i + 1,
                    msg: format!("expected a geometry keyword, got '{}'", line.trim()),
                });
            }
        }

        let mid_path = sibling(path, "mid");
        let mid = if mid_path.exists() || header.defn.field_count() > 0 {
            read_text(&mid_path)?.lines().map(str::to_string).collect()
        } else {
            Vec::new()
        };
        if mid.len() < starts.len() && header.defn.field_count() > 0 {
            log::warn!(
                "{} has {} lines for {} features",
                mid_path.display(),
                mid.len(),
                starts.len()
            );
        }

        let coordsys = header.coordsys.clone().unwrap_or_default();
        log::debug!(
            "Opened {}: {} fields, {} features",
            path.display(),
            header.defn.field_count(),
            starts.len()
        );
        Ok(MifReader {
            defn: Arc::new(header.defn.clone()),
            header,
            coordsys,
            lines,
            starts,
            mid,
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

    pub fn bounds(&self) -> Option<Bounds> {
        self.coordsys.bounds()
    }

    pub fn feature_count(&self) -> u64 {
        self.starts.len() as u64
    }

    pub fn next_feature_id(&self, last: Option<u64>) -> Option<u64> {
        let next = match last {
            Some(l) => l.checked_add(1)?,
            None => 1,
        }
        .max(1);
        (next <= self.feature_count()).then_some(next)
    }

    fn body(&self, fid: u64) -> Option<(&[String], usize)> {
        let i = usize::try_from(fid.checked_sub(1)?).ok()?;
        let start = *self.starts.get(i)?;
        let end = self.starts.get(i + 1).copied().unwrap_or(self.lines.len());
        Some((&self.lines[start..end], start + 1))
    }

    pub fn read_feature(&self, fid: u64) -> Result<Feature> {
        let (body, first_line) = self.body(fid).ok_or(MitabError::FeatureNotFound {
            fid,
            method_name: "read_feature",
        })?;
        let (geometry, style) = geometry::parse_feature(body, first_line)?;

        let mut feature = Feature::new(self.defn.clone());
        feature.set_fid(Some(fid));
        if self.defn.field_count() > 0 {
            let line = self.mid.get(fid as usize - 1).ok_or_else(|| {
                MitabError::CorruptFormat(format!("MID file has no line for feature {fid}"))
            })?;
            feature.set_values(mid::parse_line(
                &self.defn,
                line,
                self.header.delimiter,
                fid as usize,
            )?);
        }
        if let Some(geometry) = geometry {
            feature.set_geometry(geometry);
        }
        feature.set_style(style);
        Ok(feature)
    }

    /// Envelope of every geometry in the file.
    pub fn extent(&self) -> Result<Option<Envelope>> {
        let mut extent: Option<Envelope> = None;
        for fid in 1..=self.feature_count() {
            let Some((body, first_line)) = self.body(fid) else {
                continue;
            };
            let (geometry, _) = geometry::parse_feature(body, first_line)?;
            if let Some(env) = geometry.as_ref().and_then(|g| g.envelope()) {
                match extent.as_mut() {
                    Some(e) => e.merge(&env),
                    None => extent = Some(env),
                }
            }
        }
        Ok(extent)
    }
}

/// A new MIF/MID dataset being written.
///
/// The header goes out with the first feature, which freezes the schema.
pub struct MifWriter {
    mif_path: PathBuf,
    defn: Arc<Defn>,
    coordsys: CoordSys,
    mif: BufWriter<File>,
    mid: BufWriter<File>,
    header_written: bool,
    num_features: u64,
    extent: Option<Envelope>,
    auto_field: bool,
}

impl MifWriter {
    pub fn create(path: &Path, coordsys: &CoordSys, bounds: Option<&Bounds>) -> Result<MifWriter> {
        let mut coordsys = coordsys.clone();
        if let Some(bounds) = bounds {
            coordsys.set_bounds(Some(*bounds));
        }
        let mif = BufWriter::new(File::create(path)?);
        let mid = BufWriter::new(File::create(sibling(path, "mid"))?);
        log::debug!("Creating {}", path.display());
        Ok(MifWriter {
            mif_path: path.to_path_buf(),
            defn: Arc::new(Defn::new()),
            coordsys,
            mif,
            mid,
            header_written: false,
            num_features: 0,
            extent: None,
            auto_field: false,
        })
    }

    pub fn defn(&self) -> &Arc<Defn> {
        &self.defn
    }

    pub fn coordsys(&self) -> &CoordSys {
        &self.coordsys
    }

    pub fn is_frozen(&self) -> bool {
        self.header_written
    }

    pub fn feature_count(&self) -> u64 {
        self.num_features
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

    pub fn ensure_field(&mut self) -> Result<()> {
        if self.defn.field_count() == 0 && !self.is_frozen() {
            self.add_field(FieldDefn::new(AUTO_FIELD_NAME, FieldType::Integer)?)?;
            self.auto_field = true;
        }
        Ok(())
    }

    fn write_header(&mut self) -> Result<()> {
        if !self.header_written {
            let header = MifHeader::new((*self.defn).clone(), Some(self.coordsys.clone()));
            self.mif.write_all(&string_to_latin1(&header.to_text()))?;
            self.header_written = true;
        }
        Ok(())
    }

    /// Append `feature`. MIF features are numbered in file order, so an
    /// explicit id must be the next one.
    pub fn write_feature(&mut self, feature: &mut Feature) -> Result<u64> {
        if feature.field_count() == 0 {
            self.ensure_field()?;
        }
        let fid = self.num_features + 1;
        if let Some(requested) = feature.fid() {
            if requested != fid {
                return Err(MitabError::BadArgument(format!(
                    "MIF features are numbered in order, expected id {fid}, got {requested}"
                )));
            }
        }

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
            let ndx = i32::try_from(fid)
                .map_err(|_| MitabError::BadArgument(format!("feature id {fid} is too large")))?;
            values[0] = Some(FieldValue::IntegerValue(ndx));
        }
        // Same value checks as a .DAT record.
        encode_record(&self.defn, &values)?;

        let mut body = String::new();
        if let Some(geom) = feature.geometry() {
            geom.validate()?;
        }
        geometry::write_feature(&mut body, feature.geometry(), feature.style());
        let mut line = mid::format_line(&self.defn, &values, header::DEFAULT_DELIMITER);
        line.push('\n');

        self.write_header()?;
        self.mif.write_all(&string_to_latin1(&body))?;
        self.mid.write_all(&string_to_latin1(&line))?;
        self.num_features = fid;
        if let Some(env) = feature.geometry().and_then(|g| g.envelope()) {
            match self.extent.as_mut() {
                Some(e) => e.merge(&env),
                None => self.extent = Some(env),
            }
        }
        feature.set_fid(Some(fid));
        Ok(fid)
    }

    pub fn extent(&self) -> Option<Envelope> {
        self.extent
    }

    pub fn close(mut self) -> Result<()> {
        if !self.header_written {
            self.ensure_field()?;
            self.write_header()?;
        }
        self.mif.flush()?;
        self.mid.flush()?;
        self.mif.get_ref().sync_all()?;
        self.mid.get_ref().sync_all()?;
        log::debug!(
            "Closed {}: {} features",
            self.mif_path.display(),
            self.num_features
        );
        Ok(())
    }
}

const SNIFF_LEN: u64 = 512;

/// True when `path` holds a MIF header rather than a `.TAB` one.
pub fn sniff(path: &Path) -> bool {
    let mut bytes = Vec::with_capacity(SNIFF_LEN as usize);
    let read = File::open(path).and_then(|f| f.take(SNIFF_LEN).read_to_end(&mut bytes));
    if read.is_err() {
        return false;
    }
    let head = crate::utils::latin1_to_string(&bytes);
    head.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|l| l.to_ascii_lowercase().starts_with("version"))
        .unwrap_or(false)
}
