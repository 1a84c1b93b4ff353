//! Coordinate blocks hold the vertices of polylines, regions and
//! multipoints.
//!
//! Each block starts with its type (i16), the number of data bytes used
//! after the 8 byte header (i16) and the address of the next block of the
//! chain (i32). An object points at the first byte of its data and gives its
//! size; data longer than what is left in a block continues at byte 8 of the
//! next block.
//!
//! Multi-part objects start their data with one section header per part:
//!
//! ```text
//! vertex count (i16), hole count (i16), MBR, data offset (i32)
//! ```
//!
//! The MBR is four i32 values, or four i16 deltas from the object's
//! compression origin in compressed objects. The data offset counts bytes
//! from the start of the object's coordinate data.

use crate::errors::{MitabError, Result};
use crate::tab::map::coord_codec::IntRect;
use crate::tab::map::raw_block::{
    block_at, BinReader, BinWriter, BlockSink, BLOCK_COORD, BLOCK_SIZE,
};

pub const COORD_HEADER: usize = 8;

/// Objects whose data is at least this long never start in the last few
/// bytes of a block.
const MIN_CONTIGUOUS: usize = 24;

pub fn section_header_size(compressed: bool) -> usize {
    if compressed {
        16
    } else {
        24
    }
}

pub fn vertex_size(compressed: bool) -> usize {
    if compressed {
        4
    } else {
        8
    }
}

/// Gather `size` bytes of coordinate data starting at file offset `ptr`,
/// following the block chain as needed.
pub fn read_coord_data(map: &[u8], ptr: u32, size: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(size.min(map.len()));
    let mut addr = ptr - ptr % BLOCK_SIZE as u32;
    let mut offset = (ptr % BLOCK_SIZE as u32) as usize;
    if offset < COORD_HEADER {
        return Err(MitabError::CorruptFormat(format!(
            "coordinate pointer {ptr} points into a block header"
        )));
    }
    let mut visited = 0usize;
    while out.len() < size {
        visited += 1;
        if visited > map.len() / BLOCK_SIZE {
            return Err(MitabError::CorruptFormat(
                "coordinate block chain loops".to_string(),
            ));
        }
        let block = block_at(map, addr, "coordinate block")?;
        let mut r = BinReader::new(block, addr as u64, "coordinate block");
        let block_type = r.read_i16()?;
        if block_type != BLOCK_COORD as i16 {
            return Err(MitabError::CorruptFormat(format!(
                "block at {addr} has type {block_type}, expected coordinate block"
            )));
        }
        let used = (COORD_HEADER + r.read_i16()?.max(0) as usize).min(BLOCK_SIZE);
        let next = r.read_i32()?;
        if offset < used {
            let n = (used - offset).min(size - out.len());
            r.goto(offset)?;
            out.extend_from_slice(r.read_bytes(n)?);
        }
        if out.len() < size {
            if next <= 0 {
                return Err(MitabError::TruncatedData {
                    what: "coordinate data",
                    offset: ptr as u64,
                    needed: size,
                    available: out.len(),
                });
            }
            addr = next as u32;
            offset = COORD_HEADER;
        }
    }
    Ok(out)
}

/// Header of one part of a multi-part object.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SectionHeader {
    pub num_vertices: usize,
    pub num_holes: usize,
    pub mbr: IntRect,
    pub data_offset: usize,
}

pub fn decode_section_headers(
    data: &[u8],
    num_sections: usize,
    compressed: bool,
    origin: (i32, i32),
) -> Result<Vec<SectionHeader>> {
    let mut r = BinReader::new(data, 0, "section header");
    let mut headers = Vec::with_capacity(num_sections);
    for _ in 0..num_sections {
        let num_vertices = r.read_i16()?;
        let num_holes = r.read_i16()?;
        let mbr = if compressed {
            let (xmin, ymin) = read_vertex(&mut r, true, origin)?;
            let (xmax, ymax) = read_vertex(&mut r, true, origin)?;
            IntRect {
                xmin,
                ymin,
                xmax,
                ymax,
            }
        } else {
            r.read_int_rect()?
        };
        let data_offset = r.read_i32()?;
        if num_vertices < 0 || num_holes < 0 || data_offset < 0 {
            return Err(MitabError::CorruptFormat(format!(
                "bad section header ({num_vertices} vertices, {num_holes} holes, offset {data_offset})"
            )));
        }
        headers.push(SectionHeader {
            num_vertices: num_vertices as usize,
            num_holes: num_holes as usize,
            mbr,
            data_offset: data_offset as usize,
        });
    }
    Ok(headers)
}

fn read_vertex(r: &mut BinReader, compressed: bool, origin: (i32, i32)) -> Result<(i32, i32)> {
    if compressed {
        let dx = r.read_i16()? as i32;
        let dy = r.read_i16()? as i32;
        Ok((origin.0.wrapping_add(dx), origin.1.wrapping_add(dy)))
    } else {
        Ok((r.read_i32()?, r.read_i32()?))
    }
}

/// `count` vertices starting `offset` bytes into `data`.
pub fn decode_vertices(
    data: &[u8],
    offset: usize,
    count: usize,
    compressed: bool,
    origin: (i32, i32),
) -> Result<Vec<(i32, i32)>> {
    let mut r = BinReader::new(data, 0, "coordinate data");
    r.goto(offset)?;
    (0..count)
        .map(|_| read_vertex(&mut r, compressed, origin))
        .collect()
}

/// Every part of a multi-part object, as laid out by its section headers.
pub fn decode_sections(
    data: &[u8],
    num_sections: usize,
    compressed: bool,
    origin: (i32, i32),
) -> Result<Vec<Vec<(i32, i32)>>> {
    decode_section_headers(data, num_sections, compressed, origin)?
        .iter()
        .map(|h| decode_vertices(data, h.data_offset, h.num_vertices, compressed, origin))
        .collect()
}

/// Uncompressed vertex list.
pub fn encode_vertices(vertices: &[(i32, i32)]) -> Result<Vec<u8>> {
    let mut w = BinWriter::growable();
    for &(x, y) in vertices {
        w.put_i32(x)?;
        w.put_i32(y)?;
    }
    Ok(w.into_inner())
}

/// Uncompressed section headers followed by the vertices of every part.
/// `holes[i]` is the hole count recorded for part `i`.
pub fn encode_sections(parts: &[Vec<(i32, i32)>], holes: &[usize]) -> Result<Vec<u8>> {
    let header_size = section_header_size(false);
    let mut w = BinWriter::growable();
    let mut offset = parts.len() * header_size;
    for (i, part) in parts.iter().enumerate() {
        let num_vertices = i16::try_from(part.len()).map_err(|_| {
            MitabError::BadArgument(format!(
                "part of {} vertices exceeds the {} vertex limit",
                part.len(),
                i16::MAX
            ))
        })?;
        w.put_i16(num_vertices)?;
        w.put_i16(holes.get(i).copied().unwrap_or(0) as i16)?;
        w.put_int_rect(&IntRect::of_points(part))?;
        w.put_i32(offset as i32)?;
        offset += part.len() * vertex_size(false);
    }
    for part in parts {
        w.put_bytes(&encode_vertices(part)?)?;
    }
    Ok(w.into_inner())
}

/// Appends coordinate data to a chain of coordinate blocks.
#[derive(Default)]
pub struct CoordChainWriter {
    current: Option<(u32, BinWriter)>,
    first_block: u32,
}

impl CoordChainWriter {
    pub fn new() -> CoordChainWriter {
        CoordChainWriter::default()
    }

    /// Address of the first block of the chain, 0 while nothing was written.
    pub fn first_block(&self) -> u32 {
        self.first_block
    }

    /// Address of the block being filled.
    pub fn current_block(&self) -> u32 {
        self.current.as_ref().map(|(addr, _)| *addr).unwrap_or(0)
    }

    /// Append `bytes`, returning the file offset of their first byte.
    pub fn append(&mut self, sink: &mut BlockSink, bytes: &[u8]) -> Result<u32> {
        let need = bytes.len().clamp(1, MIN_CONTIGUOUS);
        let room = self.current.as_ref().map(|(_, w)| w.remaining()).unwrap_or(0);
        if room < need {
            self.start_block(sink)?;
        }
        let mut ptr = None;
        let mut rest = bytes;
        loop {
            if let Some((addr, w)) = self.current.as_mut() {
                ptr.get_or_insert(*addr + w.position() as u32);
                let n = rest.len().min(w.remaining());
                w.put_bytes(&rest[..n])?;
                rest = &rest[n..];
            }
            if rest.is_empty() {
                break;
            }
            self.start_block(sink)?;
        }
        ptr.ok_or_else(|| MitabError::CorruptFormat("no coordinate block allocated".to_string()))
    }

    fn start_block(&mut self, sink: &mut BlockSink) -> Result<()> {
        let addr = sink.allocate();
        match self.current.take() {
            Some((prev, w)) => seal(sink, prev, w, addr)?,
            None if self.first_block == 0 => self.first_block = addr,
            None => {}
        }
        let mut w = BinWriter::block();
        w.goto(COORD_HEADER);
        self.current = Some((addr, w));
        Ok(())
    }

    /// Write out the last block of the chain.
    pub fn finish(&mut self, sink: &mut BlockSink) -> Result<()> {
        match self.current.take() {
            Some((addr, w)) => seal(sink, addr, w, 0),
            None => Ok(()),
        }
    }
}

fn seal(sink: &mut BlockSink, addr: u32, mut w: BinWriter, next: u32) -> Result<()> {
    let used = w.position() - COORD_HEADER;
    w.goto(0);
    w.put_i16(BLOCK_COORD as i16)?;
    w.put_i16(used as i16)?;
    w.put_i32(next as i32)?;
    sink.write_block(addr, w.as_slice())
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Seek, SeekFrom};

    use super::*;
    use crate::errors::ErrorCategory;

    fn image_of(sink: BlockSink) -> Vec<u8> {
        let mut file = sink.finish().unwrap();
        let mut image = Vec::new();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.read_to_end(&mut image).unwrap();
        image
    }

    #[test]
    fn test_data_spans_blocks() {
        let mut sink = BlockSink::new(tempfile::tempfile().unwrap());
        let mut chain = CoordChainWriter::new();
        let small: Vec<(i32, i32)> = vec![(1, 2), (3, 4)];
        let big: Vec<(i32, i32)> = (0..150).map(|i| (i, -i)).collect();

        let p1 = chain.append(&mut sink, &encode_vertices(&small).unwrap()).unwrap();
        let big_bytes = encode_vertices(&big).unwrap();
        let p2 = chain.append(&mut sink, &big_bytes).unwrap();
        chain.finish(&mut sink).unwrap();
        assert_eq!(p1, 512 + COORD_HEADER as u32);
        assert_eq!(chain.first_block(), 512);
        let image = image_of(sink);
        assert_eq!(image.len(), 4 * BLOCK_SIZE);

        let data = read_coord_data(&image, p2, big_bytes.len()).unwrap();
        assert_eq!(decode_vertices(&data, 0, 150, false, (0, 0)).unwrap(), big);
        let data = read_coord_data(&image, p1, 16).unwrap();
        assert_eq!(decode_vertices(&data, 0, 2, false, (0, 0)).unwrap(), small);
    }

    #[test]
    fn test_missing_continuation() {
        let mut sink = BlockSink::new(tempfile::tempfile().unwrap());
        let mut chain = CoordChainWriter::new();
        let ptr = chain.append(&mut sink, &[7u8; 40]).unwrap();
        chain.finish(&mut sink).unwrap();
        let image = image_of(sink);
        let err = read_coord_data(&image, ptr, 1000).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::TruncatedData);
        let err = read_coord_data(&image, 514, 4).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::CorruptFormat);
    }

    #[test]
    fn test_sections() {
        let parts = vec![
            vec![(0, 0), (10, 0), (10, 10), (0, 0)],
            vec![(2, 2), (3, 2), (3, 3), (2, 2)],
        ];
        let data = encode_sections(&parts, &[1, 0]).unwrap();
        assert_eq!(data.len(), 2 * 24 + 8 * 8);
        let headers = decode_section_headers(&data, 2, false, (0, 0)).unwrap();
        assert_eq!(headers[0].num_holes, 1);
        assert_eq!(headers[1].data_offset, 48 + 32);
        assert_eq!(headers[0].mbr, IntRect::of_points(&parts[0]));
        assert_eq!(decode_sections(&data, 2, false, (0, 0)).unwrap(), parts);
    }

    #[test]
    fn test_compressed_sections() {
        let origin = (1000, -1000);
        let mut w = BinWriter::growable();
        // One section of two vertices, MBR relative to the origin.
        w.put_i16(2).unwrap();
        w.put_i16(0).unwrap();
        for v in [-5i16, 0, 5, 3] {
            w.put_i16(v).unwrap();
        }
        w.put_i32(16).unwrap();
        for v in [-5i16, 0, 5, 3] {
            w.put_i16(v).unwrap();
        }
        let data = w.into_inner();
        let headers = decode_section_headers(&data, 1, true, origin).unwrap();
        assert_eq!(headers[0].mbr, IntRect::of_points(&[(995, -1000), (1005, -997)]));
        assert_eq!(
            decode_sections(&data, 1, true, origin).unwrap(),
            vec![vec![(995, -1000), (1005, -997)]]
        );
    }
}
