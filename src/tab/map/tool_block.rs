//! Drawing tool definitions shared by all objects of a `.MAP` file.
//!
//! Objects refer to pens, brushes, fonts and symbols by 1-based index into
//! per-kind tables; 0 means none. The tables are stored as a chain of tool
//! blocks, each holding whole definitions.

use crate::errors::{MitabError, Result};
use crate::tab::map::raw_block::{
    block_at, BinReader, BinWriter, BlockSink, BLOCK_SIZE, BLOCK_TOOL,
};
use crate::utils::{latin1_to_string, string_to_latin1, trim_nul};
use crate::vector::{Brush, Pen, Symbol};

const DEF_PEN: u8 = 1;
const DEF_BRUSH: u8 = 2;
const DEF_FONT: u8 = 3;
const DEF_SYMBOL: u8 = 4;

const TOOL_HEADER: usize = 8;
const FONT_NAME_LEN: usize = 32;

/// De-duplicated tool definitions with use counts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolTable {
    pens: Vec<(Pen, i32)>,
    brushes: Vec<(Brush, i32)>,
    fonts: Vec<(String, i32)>,
    symbols: Vec<(Symbol, i32)>,
}

fn add<T: PartialEq + Clone>(table: &mut Vec<(T, i32)>, item: &T, kind: &str) -> Result<u8> {
    if let Some(pos) = table.iter().position(|(t, _)| t == item) {
        table[pos].1 += 1;
        return Ok(pos as u8 + 1);
    }
    if table.len() >= u8::MAX as usize {
        return Err(MitabError::BadArgument(format!(
            "more than {} distinct {kind} definitions",
            u8::MAX
        )));
    }
    table.push((item.clone(), 1));
    Ok(table.len() as u8)
}

fn get<T: Clone>(table: &[(T, i32)], index: u8, kind: &str) -> Option<T> {
    if index == 0 {
        return None;
    }
    let found = table.get(index as usize - 1).map(|(t, _)| t.clone());
    if found.is_none() {
        log::warn!("Dangling {kind} index {index} in .MAP object");
    }
    found
}

impl ToolTable {
    pub fn new() -> ToolTable {
        ToolTable::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pens.is_empty()
            && self.brushes.is_empty()
            && self.fonts.is_empty()
            && self.symbols.is_empty()
    }

    pub fn add_pen(&mut self, pen: &Pen) -> Result<u8> {
        add(&mut self.pens, pen, "pen")
    }

    pub fn add_brush(&mut self, brush: &Brush) -> Result<u8> {
        add(&mut self.brushes, brush, "brush")
    }

    pub fn add_font(&mut self, name: &str) -> Result<u8> {
        add(&mut self.fonts, &name.to_string(), "font")
    }

    pub fn add_symbol(&mut self, symbol: &Symbol) -> Result<u8> {
        add(&mut self.symbols, symbol, "symbol")
    }

    pub fn pen(&self, index: u8) -> Option<Pen> {
        get(&self.pens, index, "pen")
    }

    pub fn brush(&self, index: u8) -> Option<Brush> {
        get(&self.brushes, index, "brush")
    }

    pub fn font(&self, index: u8) -> Option<String> {
        get(&self.fonts, index, "font")
    }

    pub fn symbol(&self, index: u8) -> Option<Symbol> {
        get(&self.symbols, index, "symbol")
    }

    fn encode_defs(&self) -> Result<Vec<Vec<u8>>> {
        let mut defs = Vec::new();
        for (pen, refs) in &self.pens {
            let mut w = BinWriter::growable();
            w.put_u8(DEF_PEN)?;
            w.put_i32(*refs)?;
            w.put_u8(pen.width)?;
            w.put_u8(pen.pattern)?;
            w.put_u8(pen.style)?;
            w.put_rgb(pen.color)?;
            defs.push(w.into_inner());
        }
        for (brush, refs) in &self.brushes {
            let mut w = BinWriter::growable();
            w.put_u8(DEF_BRUSH)?;
            w.put_i32(*refs)?;
            w.put_u8(brush.pattern)?;
            w.put_u8(brush.transparent as u8)?;
            w.put_rgb(brush.fg_color)?;
            w.put_rgb(brush.bg_color)?;
            defs.push(w.into_inner());
        }
        for (name, refs) in &self.fonts {
            let mut w = BinWriter::growable();
            w.put_u8(DEF_FONT)?;
            w.put_i32(*refs)?;
            w.put_fixed_str(&string_to_latin1(name), FONT_NAME_LEN)?;
            defs.push(w.into_inner());
        }
        for (symbol, refs) in &self.symbols {
            let mut w = BinWriter::growable();
            w.put_u8(DEF_SYMBOL)?;
            w.put_i32(*refs)?;
            w.put_i16(symbol.number)?;
            w.put_i16(symbol.size)?;
            w.put_u8(0)?;
            w.put_rgb(symbol.color)?;
            defs.push(w.into_inner());
        }
        Ok(defs)
    }

    /// Write the tables as a tool block chain, returning the address of the
    /// first block (0 when there is nothing to write).
    pub fn write(&self, sink: &mut BlockSink) -> Result<u32> {
        let defs = self.encode_defs()?;
        if defs.is_empty() {
            return Ok(0);
        }
        let mut blocks: Vec<Vec<u8>> = vec![Vec::new()];
        for def in defs {
            let current = blocks.len() - 1;
            if TOOL_HEADER + blocks[current].len() + def.len() > BLOCK_SIZE {
                blocks.push(Vec::new());
            }
            if let Some(last) = blocks.last_mut() {
                last.extend_from_slice(&def);
            }
        }
        let addrs: Vec<u32> = blocks.iter().map(|_| sink.allocate()).collect();
        for (i, data) in blocks.iter().enumerate() {
            let mut w = BinWriter::block();
            w.put_i16(BLOCK_TOOL as i16)?;
            w.put_i16(data.len() as i16)?;
            w.put_i32(addrs.get(i + 1).copied().unwrap_or(0) as i32)?;
            w.put_bytes(data)?;
            sink.write_block(addrs[i], w.as_slice())?;
        }
        log::trace!("Wrote {} tool block(s) at {}", blocks.len(), addrs[0]);
        Ok(addrs[0])
    }

    /// Read the tool block chain starting at `first_block` of the whole
    /// file image `map`.
    pub fn read(map: &[u8], first_block: u32) -> Result<ToolTable> {
        let mut table = ToolTable::new();
        let mut next = first_block;
        let mut visited = 0usize;
        while next != 0 {
            visited += 1;
            if visited > map.len() / BLOCK_SIZE {
                return Err(MitabError::CorruptFormat(
                    "tool block chain loops".to_string(),
                ));
            }
            let addr = next;
            let block = block_at(map, addr, "tool block")?;
            let mut r = BinReader::new(block, addr as u64, "tool block");
            let block_type = r.read_i16()?;
            if block_type != BLOCK_TOOL as i16 {
                return Err(MitabError::CorruptFormat(format!(
                    "block at {addr} has type {block_type}, expected tool block"
                )));
            }
            let data_len = r.read_i16()? as usize;
            next = r.read_i32()?.max(0) as u32;
            let data = r.read_bytes(data_len)?;
            table.decode_defs(data, addr as u64 + TOOL_HEADER as u64)?;
        }
        Ok(table)
    }

    fn decode_defs(&mut self, data: &[u8], origin: u64) -> Result<()> {
        let mut r = BinReader::new(data, origin, "tool definition");
        while r.remaining() > 0 {
            let kind = r.read_u8()?;
            let refs = r.read_i32()?;
            match kind {
                DEF_PEN => {
                    let pen = Pen {
                        width: r.read_u8()?,
                        pattern: r.read_u8()?,
                        style: r.read_u8()?,
                        color: r.read_rgb()?,
                    };
                    self.pens.push((pen, refs));
                }
                DEF_BRUSH => {
                    let pattern = r.read_u8()?;
                    let transparent = r.read_u8()? != 0;
                    let brush = Brush {
                        pattern,
                        transparent,
                        fg_color: r.read_rgb()?,
                        bg_color: r.read_rgb()?,
                    };
                    self.brushes.push((brush, refs));
                }
                DEF_FONT => {
                    let name = latin1_to_string(trim_nul(r.read_bytes(FONT_NAME_LEN)?));
                    self.fonts.push((name, refs));
                }
                DEF_SYMBOL => {
                    let number = r.read_i16()?;
                    let size = r.read_i16()?;
                    r.read_u8()?;
                    let symbol = Symbol {
                        number,
                        size,
                        color: r.read_rgb()?,
                    };
                    self.symbols.push((symbol, refs));
                }
                other => {
                    return Err(MitabError::CorruptFormat(format!(
                        "unknown tool definition type {other}"
                    )))
                }
            }
        }
        Ok(())
    }
}
