//! The first block of a `.MAP` file.
//!
//! ```text
//! 0x000  object length table, one byte per object type code
//! 0x100  magic 42424242
//! 0x104  version (i16), block size (i16)
//! 0x110  MBR of all objects (4 x i32)
//! 0x130  first index, garbage and tool block (i32)
//! 0x13c  point, line, region and text object counts (i32)
//! 0x15f  index depth (u8)
//! 0x161  coordinate origin quadrant (u8)
//! 0x16d  projection, ellipsoid and units ids (u8)
//! 0x170  X/Y scale and displacement (f64)
//! 0x190  projection parameters (6 x f64)
//! 0x1c0  datum shift X/Y/Z, datum parameters (8 x f64)
//! ```
//!
//! A file being written has a zeroed header until it is closed; a missing
//! magic number thus marks an incomplete file.

use crate::errors::{MitabError, Result};
use crate::tab::map::coord_codec::{CoordCodec, IntRect};
use crate::tab::map::object::ObjectKind;
use crate::tab::map::raw_block::{BinReader, BinWriter, BLOCK_SIZE};

pub const HEADER_MAGIC: i32 = 42424242;

/// Version written when no object needs a newer reader.
pub const BASE_VERSION: i16 = 300;
/// Version needed to read multipoint objects.
pub const MULTIPOINT_VERSION: i16 = 650;

#[derive(Clone, Debug, PartialEq)]
pub struct MapHeader {
    pub version: i16,
    pub mbr: IntRect,
    pub first_index_block: u32,
    pub first_garbage_block: u32,
    pub first_tool_block: u32,
    pub num_points: i32,
    pub num_lines: i32,
    pub num_regions: i32,
    pub num_texts: i32,
    pub max_index_depth: u8,
    pub projection: u8,
    pub ellipsoid: u8,
    pub units: u8,
    pub codec: CoordCodec,
    pub proj_params: [f64; 6],
    pub datum_shift: [f64; 3],
    pub datum_params: [f64; 5],
}

impl MapHeader {
    pub fn new(codec: CoordCodec) -> MapHeader {
        MapHeader {
            version: BASE_VERSION,
            mbr: IntRect::EMPTY,
            first_index_block: 0,
            first_garbage_block: 0,
            first_tool_block: 0,
            num_points: 0,
            num_lines: 0,
            num_regions: 0,
            num_texts: 0,
            max_index_depth: 0,
            projection: 1,
            ellipsoid: 0,
            units: 13,
            codec,
            proj_params: [0.0; 6],
            datum_shift: [0.0; 3],
            datum_params: [0.0; 5],
        }
    }

    pub fn read(block: &[u8]) -> Result<MapHeader> {
        let mut r = BinReader::new(block, 0, "map header");
        r.goto(0x100)?;
        let magic = r.read_i32()?;
        if magic != HEADER_MAGIC {
            return Err(MitabError::CorruptFormat(format!(
                "bad .MAP magic number {magic}, expected {HEADER_MAGIC} (file incomplete or not a .MAP)"
            )));
        }
        let version = r.read_i16()?;
        let block_size = r.read_i16()?;
        if block_size as usize != BLOCK_SIZE {
            return Err(MitabError::CorruptFormat(format!(
                "unsupported .MAP block size {block_size}"
            )));
        }
        r.goto(0x110)?;
        let mbr = r.read_int_rect()?;
        r.goto(0x130)?;
        let first_index_block = read_ptr(&mut r)?;
        let first_garbage_block = read_ptr(&mut r)?;
        let first_tool_block = read_ptr(&mut r)?;
        let num_points = r.read_i32()?;
        let num_lines = r.read_i32()?;
        let num_regions = r.read_i32()?;
        let num_texts = r.read_i32()?;
        r.goto(0x15f)?;
        let max_index_depth = r.read_u8()?;
        r.goto(0x161)?;
        let quadrant = r.read_u8()?;
        r.goto(0x16d)?;
        let projection = r.read_u8()?;
        let ellipsoid = r.read_u8()?;
        let units = r.read_u8()?;
        let codec = CoordCodec {
            x_scale: r.read_f64()?,
            y_scale: r.read_f64()?,
            x_displ: r.read_f64()?,
            y_displ: r.read_f64()?,
            quadrant,
        };
        if !(codec.x_scale.is_normal() && codec.y_scale.is_normal()) {
            return Err(MitabError::CorruptFormat(format!(
                "invalid .MAP scale ({}, {})",
                codec.x_scale, codec.y_scale
            )));
        }
        let mut proj_params = [0.0; 6];
        for p in proj_params.iter_mut() {
            *p = r.read_f64()?;
        }
        let mut datum_shift = [0.0; 3];
        for p in datum_shift.iter_mut() {
            *p = r.read_f64()?;
        }
        let mut datum_params = [0.0; 5];
        for p in datum_params.iter_mut() {
            *p = r.read_f64()?;
        }
        Ok(MapHeader {
            version,
            mbr,
            first_index_block,
            first_garbage_block,
            first_tool_block,
            num_points,
            num_lines,
            num_regions,
            num_texts,
            max_index_depth,
            projection,
            ellipsoid,
            units,
            codec,
            proj_params,
            datum_shift,
            datum_params,
        })
    }

    pub fn write(&self) -> Result<Vec<u8>> {
        let mut w = BinWriter::block();
        for (code, len) in ObjectKind::length_table() {
            w.goto(code as usize);
            w.put_u8(len)?;
        }
        w.goto(0x100);
        w.put_i32(HEADER_MAGIC)?;
        w.put_i16(self.version)?;
        w.put_i16(BLOCK_SIZE as i16)?;
        w.goto(0x110);
        if self.mbr.is_empty() {
            w.put_int_rect(&IntRect {
                xmin: 0,
                ymin: 0,
                xmax: 0,
                ymax: 0,
            })?;
        } else {
            w.put_int_rect(&self.mbr)?;
        }
        w.goto(0x130);
        w.put_i32(self.first_index_block as i32)?;
        w.put_i32(self.first_garbage_block as i32)?;
        w.put_i32(self.first_tool_block as i32)?;
        w.put_i32(self.num_points)?;
        w.put_i32(self.num_lines)?;
        w.put_i32(self.num_regions)?;
        w.put_i32(self.num_texts)?;
        w.goto(0x15f);
        w.put_u8(self.max_index_depth)?;
        w.goto(0x161);
        w.put_u8(self.codec.quadrant)?;
        w.goto(0x16d);
        w.put_u8(self.projection)?;
        w.put_u8(self.ellipsoid)?;
        w.put_u8(self.units)?;
        w.put_f64(self.codec.x_scale)?;
        w.put_f64(self.codec.y_scale)?;
        w.put_f64(self.codec.x_displ)?;
        w.put_f64(self.codec.y_displ)?;
        for p in self
            .proj_params
            .iter()
            .chain(&self.datum_shift)
            .chain(&self.datum_params)
        {
            w.put_f64(*p)?;
        }
        Ok(w.into_inner())
    }
}

fn read_ptr(r: &mut BinReader) -> Result<u32> {
    let ptr = r.read_i32()?;
    u32::try_from(ptr)
        .map_err(|_| MitabError::CorruptFormat(format!("negative block pointer {ptr}")))
}
