//! Little-endian cursor over one block (or any byte buffer) of a `.MAP` file.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};

use crate::errors::{MitabError, Result};
use crate::tab::map::coord_codec::IntRect;

/// Size of every `.MAP` block, header included.
pub const BLOCK_SIZE: usize = 512;

pub const BLOCK_HEADER: u8 = 0;
pub const BLOCK_INDEX: u8 = 1;
pub const BLOCK_OBJECT: u8 = 2;
pub const BLOCK_COORD: u8 = 3;
pub const BLOCK_GARBAGE: u8 = 4;
pub const BLOCK_TOOL: u8 = 5;

/// The `BLOCK_SIZE` bytes at `addr`, which must be block aligned.
pub fn block_at<'a>(map: &'a [u8], addr: u32, what: &'static str) -> Result<&'a [u8]> {
    let start = addr as usize;
    if start % BLOCK_SIZE != 0 {
        return Err(MitabError::CorruptFormat(format!(
            "{what} pointer {addr} is not block aligned"
        )));
    }
    if start + BLOCK_SIZE > map.len() {
        return Err(MitabError::TruncatedData {
            what,
            offset: addr as u64,
            needed: BLOCK_SIZE,
            available: map.len().saturating_sub(start),
        });
    }
    Ok(&map[start..start + BLOCK_SIZE])
}

/// Bounds-checked reader. Reading past the end fails with `TruncatedData`.
pub struct BinReader<'a> {
    data: &'a [u8],
    pos: usize,
    /// File offset of `data[0]`, for error reporting.
    origin: u64,
    what: &'static str,
}

impl<'a> BinReader<'a> {
    pub fn new(data: &'a [u8], origin: u64, what: &'static str) -> BinReader<'a> {
        BinReader {
            data,
            pos: 0,
            origin,
            what,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn goto(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(self.truncated(pos - self.pos.min(pos)));
        }
        self.pos = pos;
        Ok(())
    }

    fn truncated(&self, needed: usize) -> MitabError {
        MitabError::TruncatedData {
            what: self.what,
            offset: self.origin + self.pos as u64,
            needed,
            available: self.remaining(),
        }
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(self.truncated(n));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    /// Three bytes, red first, packed as `0xRRGGBB`.
    pub fn read_rgb(&mut self) -> Result<u32> {
        let [r, g, b] = self.read_array::<3>()?;
        Ok(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    pub fn read_int_rect(&mut self) -> Result<IntRect> {
        Ok(IntRect {
            xmin: self.read_i32()?,
            ymin: self.read_i32()?,
            xmax: self.read_i32()?,
            ymax: self.read_i32()?,
        })
    }
}

/// Writer with an optional fixed capacity.
///
/// A block writer starts zero filled at `BLOCK_SIZE`; writing past the
/// capacity is refused so the caller can allocate a new block instead.
pub struct BinWriter {
    data: Vec<u8>,
    pos: usize,
    capacity: usize,
}

impl BinWriter {
    /// Zero filled `BLOCK_SIZE` image.
    pub fn block() -> BinWriter {
        BinWriter {
            data: vec![0; BLOCK_SIZE],
            pos: 0,
            capacity: BLOCK_SIZE,
        }
    }

    /// Unbounded buffer.
    pub fn growable() -> BinWriter {
        BinWriter {
            data: Vec::new(),
            pos: 0,
            capacity: usize::MAX,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn goto(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.pos)
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.remaining() < bytes.len() {
            return Err(MitabError::TruncatedData {
                what: "block (write)",
                offset: self.pos as u64,
                needed: bytes.len(),
                available: self.remaining(),
            });
        }
        let end = self.pos + bytes.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    pub fn put_u8(&mut self, v: u8) -> Result<()> {
        self.put_bytes(&[v])
    }

    pub fn put_i16(&mut self, v: i16) -> Result<()> {
        self.put_bytes(&v.to_le_bytes())
    }

    pub fn put_i32(&mut self, v: i32) -> Result<()> {
        self.put_bytes(&v.to_le_bytes())
    }

    pub fn put_f64(&mut self, v: f64) -> Result<()> {
        self.put_bytes(&v.to_le_bytes())
    }

    pub fn put_rgb(&mut self, rgb: u32) -> Result<()> {
        self.put_bytes(&[(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8])
    }

    pub fn put_int_rect(&mut self, rect: &IntRect) -> Result<()> {
        self.put_i32(rect.xmin)?;
        self.put_i32(rect.ymin)?;
        self.put_i32(rect.xmax)?;
        self.put_i32(rect.ymax)
    }

    /// Write `text` into exactly `len` bytes, NUL padded and truncated.
    pub fn put_fixed_str(&mut self, text: &[u8], len: usize) -> Result<()> {
        let mut field = vec![0u8; len];
        let n = text.len().min(len.saturating_sub(1));
        field[..n].copy_from_slice(&text[..n]);
        self.put_bytes(&field)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

/// Block allocator over a file being written.
///
/// Addresses are handed out in file order; a block's content may be
/// written any time after its address was allocated.
pub struct BlockSink {
    file: File,
    next_block: u32,
}

impl BlockSink {
    /// Start allocating after the header block.
    pub fn new(file: File) -> BlockSink {
        BlockSink {
            file,
            next_block: BLOCK_SIZE as u32,
        }
    }

    pub fn allocate(&mut self) -> u32 {
        let addr = self.next_block;
        self.next_block += BLOCK_SIZE as u32;
        log::trace!("Allocated .MAP block at {addr}");
        addr
    }

    /// Write one block, zero padded to `BLOCK_SIZE`.
    pub fn write_block(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        if data.len() > BLOCK_SIZE {
            return Err(MitabError::BadArgument(format!(
                "block of {} bytes at {addr}",
                data.len()
            )));
        }
        let mut block = [0u8; BLOCK_SIZE];
        block[..data.len()].copy_from_slice(data);
        self.file.seek(SeekFrom::Start(addr as u64))?;
        self.file.write_all(&block)?;
        Ok(())
    }

    /// Flush and hand back the file.
    pub fn finish(mut self) -> Result<File> {
        self.file.flush()?;
        Ok(self.file)
    }
}
