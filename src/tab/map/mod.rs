//! The `.MAP` file: geometry objects, their drawing tools and the spatial
//! index over them, stored in 512 byte blocks.

pub mod coord_block;
pub mod coord_codec;
pub mod header_block;
pub mod index;
pub mod object;
pub mod raw_block;
pub mod tool_block;

use std::fs::{self, File};
use std::path::Path;

use geo_types::coord;

use crate::errors::{MitabError, Result};
use crate::vector::{Envelope, Geometry, Style};

use coord_block::CoordChainWriter;
use coord_codec::{CoordCodec, IntRect};
use header_block::{MapHeader, MULTIPOINT_VERSION};
use index::{walk_index, SpatialIndex};
use object::{encode_object, read_object, MapObject, ObjectClass, ObjectKind, OBJECT_HEADER};
use raw_block::{block_at, BinReader, BinWriter, BlockSink, BLOCK_OBJECT, BLOCK_SIZE};
use tool_block::ToolTable;

/// A `.MAP` file loaded for reading.
#[derive(Debug)]
pub struct MapReader {
    image: Vec<u8>,
    header: MapHeader,
    tools: ToolTable,
}

impl MapReader {
    pub fn open(path: &Path) -> Result<MapReader> {
        let image = fs::read(path).map_err(|e| MitabError::FileNotFound {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        MapReader::from_image(image)
    }

    pub fn from_image(image: Vec<u8>) -> Result<MapReader> {
        let header = MapHeader::read(image.get(..BLOCK_SIZE).unwrap_or(&image))?;
        let tools = if header.first_tool_block == 0 {
            ToolTable::new()
        } else {
            ToolTable::read(&image, header.first_tool_block)?
        };
        log::debug!(
            "Loaded .MAP: {} bytes, version {}, index depth {}",
            image.len(),
            header.version,
            header.max_index_depth
        );
        Ok(MapReader {
            image,
            header,
            tools,
        })
    }

    pub fn header(&self) -> &MapHeader {
        &self.header
    }

    pub fn codec(&self) -> &CoordCodec {
        &self.header.codec
    }

    /// The object at `ptr`, `None` when `ptr` is 0 or holds no object.
    pub fn read_object(&self, ptr: u32) -> Result<Option<MapObject>> {
        if ptr == 0 {
            return Ok(None);
        }
        read_object(&self.image, ptr, &self.header.codec, &self.tools)
    }

    /// Extent of all objects, from the header.
    pub fn extent(&self) -> Option<Envelope> {
        let mbr = &self.header.mbr;
        if mbr.is_empty() || (mbr.xmin == 0 && mbr.xmax == 0 && mbr.ymin == 0 && mbr.ymax == 0) {
            return None;
        }
        let (x1, y1) = self.header.codec.to_external(mbr.xmin, mbr.ymin);
        let (x2, y2) = self.header.codec.to_external(mbr.xmax, mbr.ymax);
        Envelope::of([coord! { x: x1, y: y1 }, coord! { x: x2, y: y2 }])
    }

    /// `(pointer, id)` of every object reachable through the spatial index.
    pub fn indexed_objects(&self) -> Result<Vec<(u32, i32)>> {
        let mut out = Vec::new();
        for block in walk_index(&self.image, self.header.first_index_block)? {
            out.extend(objects_in_block(&self.image, block)?);
        }
        Ok(out)
    }
}

/// `(pointer, id)` of the objects stored in the object block at `addr`.
fn objects_in_block(map: &[u8], addr: u32) -> Result<Vec<(u32, i32)>> {
    let block = block_at(map, addr, "object block")?;
    let mut r = BinReader::new(block, addr as u64, "object block");
    if r.read_i16()? != BLOCK_OBJECT as i16 {
        return Err(MitabError::CorruptFormat(format!(
            "index points at {addr}, which is not an object block"
        )));
    }
    let used = r.read_i16()?.max(0) as usize;
    let end = (OBJECT_HEADER + used).min(BLOCK_SIZE);
    let mut pos = OBJECT_HEADER;
    let mut out = Vec::new();
    while pos + 5 <= end {
        r.goto(pos)?;
        let code = r.read_u8()?;
        if code == 0 {
            break;
        }
        let (kind, compressed) = ObjectKind::from_code(code).ok_or_else(|| {
            MitabError::CorruptFormat(format!("unknown object type 0x{code:02x} in block {addr}"))
        })?;
        out.push((addr + pos as u32, r.read_i32()?));
        pos += kind.size(compressed) as usize;
    }
    Ok(out)
}

struct PendingBlock {
    addr: u32,
    data: BinWriter,
    mbr: IntRect,
    first_coord_block: u32,
    last_coord_block: u32,
}

/// Writes a new `.MAP` file.
///
/// The header block stays zeroed until [`MapWriter::close`], so a file
/// that was never closed is recognisably incomplete.
pub struct MapWriter {
    sink: BlockSink,
    header: MapHeader,
    tools: ToolTable,
    index: SpatialIndex,
    coords: CoordChainWriter,
    block: Option<PendingBlock>,
}

impl MapWriter {
    pub fn create(path: &Path, header: MapHeader) -> Result<MapWriter> {
        let file = File::create(path)?;
        Ok(MapWriter {
            sink: BlockSink::new(file),
            header,
            tools: ToolTable::new(),
            index: SpatialIndex::new(),
            coords: CoordChainWriter::new(),
            block: None,
        })
    }

    pub fn codec(&self) -> &CoordCodec {
        &self.header.codec
    }

    pub fn header(&self) -> &MapHeader {
        &self.header
    }

    /// Extent of the objects written so far.
    pub fn extent(&self) -> Option<Envelope> {
        let mbr = &self.header.mbr;
        if mbr.is_empty() {
            return None;
        }
        let codec = &self.header.codec;
        let (x1, y1) = codec.to_external(mbr.xmin, mbr.ymin);
        let (x2, y2) = codec.to_external(mbr.xmax, mbr.ymax);
        Envelope::of([coord! { x: x1, y: y1 }, coord! { x: x2, y: y2 }])
    }

    /// Append an object, returning its file offset for the `.ID` file.
    ///
    /// Encoding happens before anything is written: a geometry that does
    /// not fit the dataset bounds fails with nothing changed.
    pub fn write_object(&mut self, id: i32, geom: &Geometry, style: &Style) -> Result<u32> {
        let mut tools = self.tools.clone();
        let encoded = encode_object(geom, style, &self.header.codec, &mut tools)?;

        let fits = self
            .block
            .as_ref()
            .map(|b| b.data.remaining() >= encoded.len())
            .unwrap_or(false);
        if !fits {
            self.flush_block()?;
        }
        let coord_ptr = match &encoded.coord_data {
            Some(data) => self.coords.append(&mut self.sink, data)?,
            None => 0,
        };
        let coord_block = self.coords.current_block();
        let sink = &mut self.sink;
        let block = self.block.get_or_insert_with(|| {
            let mut data = BinWriter::block();
            data.goto(OBJECT_HEADER);
            PendingBlock {
                addr: sink.allocate(),
                data,
                mbr: IntRect::EMPTY,
                first_coord_block: 0,
                last_coord_block: 0,
            }
        });
        let ptr = block.addr + block.data.position() as u32;
        encoded.write(&mut block.data, id, coord_ptr)?;
        block.mbr.merge(&encoded.mbr);
        if encoded.coord_data.is_some() {
            if block.first_coord_block == 0 {
                block.first_coord_block = coord_block;
            }
            block.last_coord_block = coord_block;
        }

        self.tools = tools;
        self.header.mbr.merge(&encoded.mbr);
        match encoded.kind.class() {
            ObjectClass::Point => self.header.num_points += 1,
            ObjectClass::Line => self.header.num_lines += 1,
            ObjectClass::Region => self.header.num_regions += 1,
            ObjectClass::Text => self.header.num_texts += 1,
        }
        if encoded.kind == ObjectKind::MultiPoint {
            self.header.version = self.header.version.max(MULTIPOINT_VERSION);
        }
        Ok(ptr)
    }

    fn flush_block(&mut self) -> Result<()> {
        let Some(mut block) = self.block.take() else {
            return Ok(());
        };
        let used = block.data.position() - OBJECT_HEADER;
        let (cx, cy) = block.mbr.center();
        block.data.goto(0);
        block.data.put_i16(BLOCK_OBJECT as i16)?;
        block.data.put_i16(used as i16)?;
        block.data.put_i32(cx)?;
        block.data.put_i32(cy)?;
        block.data.put_i32(block.first_coord_block as i32)?;
        block.data.put_i32(block.last_coord_block as i32)?;
        self.sink.write_block(block.addr, block.data.as_slice())?;
        self.index.insert(block.mbr, block.addr);
        Ok(())
    }

    /// Write the pending blocks, the tools, the index and finally the
    /// header.
    pub fn close(mut self) -> Result<()> {
        self.flush_block()?;
        self.coords.finish(&mut self.sink)?;
        self.header.first_tool_block = self.tools.write(&mut self.sink)?;
        self.header.first_index_block = self.index.write(&mut self.sink)?;
        self.header.max_index_depth = self.index.depth().min(u8::MAX as usize) as u8;
        let header = self.header.write()?;
        self.sink.write_block(0, &header)?;
        self.sink.finish()?.sync_all()?;
        log::debug!(
            "Closed .MAP: {} object blocks indexed, depth {}",
            self.index.len(),
            self.header.max_index_depth
        );
        Ok(())
    }
}
