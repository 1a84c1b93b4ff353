//! The `.MAP` spatial index: a tree of index blocks whose leaves point at
//! object blocks.
//!
//! An index block holds its type (i16), entry count (i16) and up to 25
//! entries of five i32 values: the MBR of the child and the child's block
//! address. Whether a child is an index or an object block is told by the
//! child's own type.
//!
//! The writer keeps the tree in memory and serializes it when the file is
//! closed, the root first.

use crate::errors::{MitabError, Result};
use crate::tab::map::coord_codec::IntRect;
use crate::tab::map::raw_block::{
    block_at, BinReader, BinWriter, BlockSink, BLOCK_INDEX, BLOCK_OBJECT,
};

pub const MAX_ENTRIES: usize = 25;
const INDEX_HEADER: usize = 4;

/// Deepest tree accepted when reading.
const MAX_DEPTH: usize = 255;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Child {
    ObjectBlock(u32),
    Node(usize),
}

#[derive(Clone, Debug, Default)]
struct Node {
    entries: Vec<(IntRect, Child)>,
    parent: Option<usize>,
}

impl Node {
    fn mbr(&self) -> IntRect {
        self.entries
            .iter()
            .fold(IntRect::EMPTY, |acc, (mbr, _)| acc.union(mbr))
    }

    fn is_leaf(&self) -> bool {
        self.entries
            .iter()
            .all(|(_, child)| matches!(child, Child::ObjectBlock(_)))
    }
}

/// R-tree over object blocks, kept in an arena.
#[derive(Clone, Debug)]
pub struct SpatialIndex {
    nodes: Vec<Node>,
    root: usize,
    len: usize,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        SpatialIndex {
            nodes: vec![Node::default()],
            root: 0,
            len: 0,
        }
    }
}

impl SpatialIndex {
    pub fn new() -> SpatialIndex {
        SpatialIndex::default()
    }

    /// Number of object blocks indexed.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Levels of index blocks between the root and the object blocks.
    pub fn depth(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        let mut depth = 1;
        let mut node = self.root;
        while let Some((_, Child::Node(child))) = self.nodes[node].entries.first() {
            node = *child;
            depth += 1;
        }
        depth
    }

    /// Record an object block covering `mbr`.
    pub fn insert(&mut self, mbr: IntRect, block: u32) {
        let leaf = self.choose_leaf(&mbr);
        self.nodes[leaf].entries.push((mbr, Child::ObjectBlock(block)));
        self.len += 1;
        if self.nodes[leaf].entries.len() > MAX_ENTRIES {
            self.split(leaf);
        }
    }

    /// Walk down from the root along the entries needing the least
    /// enlargement, growing their MBRs on the way.
    fn choose_leaf(&mut self, mbr: &IntRect) -> usize {
        let mut node = self.root;
        while !self.nodes[node].is_leaf() {
            let best = self.nodes[node]
                .entries
                .iter()
                .enumerate()
                .min_by(|(_, (a, _)), (_, (b, _))| {
                    a.enlargement(mbr)
                        .total_cmp(&b.enlargement(mbr))
                        .then(a.area().total_cmp(&b.area()))
                })
                .map(|(i, _)| i);
            let Some(best) = best else { break };
            let entry = &mut self.nodes[node].entries[best];
            entry.0.merge(mbr);
            node = match entry.1 {
                Child::Node(child) => child,
                Child::ObjectBlock(_) => break,
            };
        }
        node
    }

    /// Split an overflowing node at the median of its entry centers, along
    /// the axis where they spread the most.
    fn split(&mut self, node: usize) {
        let mut entries = std::mem::take(&mut self.nodes[node].entries);
        let centers: Vec<(i32, i32)> = entries.iter().map(|(mbr, _)| mbr.center()).collect();
        let spread = |pick: fn(&(i32, i32)) -> i32| {
            let min = centers.iter().map(pick).min().unwrap_or(0) as i64;
            let max = centers.iter().map(pick).max().unwrap_or(0) as i64;
            max - min
        };
        if spread(|c| c.0) >= spread(|c| c.1) {
            entries.sort_by_key(|(mbr, _)| mbr.center().0);
        } else {
            entries.sort_by_key(|(mbr, _)| mbr.center().1);
        }
        let upper = entries.split_off(entries.len() / 2);
        self.nodes[node].entries = entries;

        let sibling = self.nodes.len();
        for (_, child) in &upper {
            if let Child::Node(c) = child {
                self.nodes[*c].parent = Some(sibling);
            }
        }
        self.nodes.push(Node {
            entries: upper,
            parent: self.nodes[node].parent,
        });
        log::trace!(
            "Split index node {node}: {} + {} entries",
            self.nodes[node].entries.len(),
            self.nodes[sibling].entries.len()
        );

        match self.nodes[node].parent {
            None => {
                let root = self.nodes.len();
                self.nodes.push(Node {
                    entries: vec![
                        (self.nodes[node].mbr(), Child::Node(node)),
                        (self.nodes[sibling].mbr(), Child::Node(sibling)),
                    ],
                    parent: None,
                });
                self.nodes[node].parent = Some(root);
                self.nodes[sibling].parent = Some(root);
                self.root = root;
            }
            Some(parent) => {
                let node_mbr = self.nodes[node].mbr();
                let sibling_mbr = self.nodes[sibling].mbr();
                for entry in self.nodes[parent].entries.iter_mut() {
                    if entry.1 == Child::Node(node) {
                        entry.0 = node_mbr;
                    }
                }
                self.nodes[parent]
                    .entries
                    .push((sibling_mbr, Child::Node(sibling)));
                if self.nodes[parent].entries.len() > MAX_ENTRIES {
                    self.split(parent);
                }
            }
        }
    }

    /// Write every node as an index block. Returns the address of the root
    /// block, 0 for an empty index.
    pub fn write(&self, sink: &mut BlockSink) -> Result<u32> {
        if self.is_empty() {
            return Ok(0);
        }
        let mut order = vec![self.root];
        let mut i = 0;
        while i < order.len() {
            for (_, child) in &self.nodes[order[i]].entries {
                if let Child::Node(c) = child {
                    order.push(*c);
                }
            }
            i += 1;
        }
        let mut addrs = vec![0u32; self.nodes.len()];
        for &node in &order {
            addrs[node] = sink.allocate();
        }
        for &node in &order {
            let entries = &self.nodes[node].entries;
            let mut w = BinWriter::block();
            w.put_i16(BLOCK_INDEX as i16)?;
            w.put_i16(entries.len() as i16)?;
            for (mbr, child) in entries {
                w.put_int_rect(mbr)?;
                let ptr = match child {
                    Child::ObjectBlock(addr) => *addr,
                    Child::Node(c) => addrs[*c],
                };
                w.put_i32(ptr as i32)?;
            }
            sink.write_block(addrs[node], w.as_slice())?;
        }
        Ok(addrs[self.root])
    }
}

/// One entry of an index block on disk.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub mbr: IntRect,
    pub child: u32,
}

pub fn read_index_block(map: &[u8], addr: u32) -> Result<Vec<IndexEntry>> {
    let block = block_at(map, addr, "index block")?;
    let mut r = BinReader::new(block, addr as u64, "index block");
    let block_type = r.read_i16()?;
    if block_type != BLOCK_INDEX as i16 {
        return Err(MitabError::CorruptFormat(format!(
            "block at {addr} has type {block_type}, expected index block"
        )));
    }
    let count = r.read_i16()?;
    if !(0..=MAX_ENTRIES as i16).contains(&count) {
        return Err(MitabError::CorruptFormat(format!(
            "index block at {addr} claims {count} entries"
        )));
    }
    r.goto(INDEX_HEADER)?;
    (0..count)
        .map(|_| {
            let mbr = r.read_int_rect()?;
            let child = r.read_i32()?;
            let child = u32::try_from(child).map_err(|_| {
                MitabError::CorruptFormat(format!("negative child pointer {child} at {addr}"))
            })?;
            Ok(IndexEntry { mbr, child })
        })
        .collect()
}

/// Addresses of every object block reachable from the index rooted at
/// `root`, in depth-first order.
pub fn walk_index(map: &[u8], root: u32) -> Result<Vec<u32>> {
    let mut out = Vec::new();
    if root == 0 {
        return Ok(out);
    }
    let mut visited = std::collections::HashSet::new();
    let mut stack = vec![(root, 0usize)];
    while let Some((addr, depth)) = stack.pop() {
        if depth > MAX_DEPTH || !visited.insert(addr) {
            return Err(MitabError::CorruptFormat(format!(
                "index tree revisits block {addr}"
            )));
        }
        for entry in read_index_block(map, addr)?.into_iter().rev() {
            let child = block_at(map, entry.child, "index child")?;
            match child[0] {
                BLOCK_INDEX => stack.push((entry.child, depth + 1)),
                BLOCK_OBJECT => out.push(entry.child),
                other => {
                    return Err(MitabError::CorruptFormat(format!(
                        "index entry at {addr} points at a block of type {other}"
                    )))
                }
            }
        }
    }
    out.sort_unstable();
    out.dedup();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Seek, SeekFrom};

    use super::*;
    use crate::errors::ErrorCategory;
    use crate::tab::map::raw_block::BLOCK_SIZE;

    fn rect(x: i32, y: i32) -> IntRect {
        IntRect::of_points(&[(x, y), (x + 10, y + 10)])
    }

    /// Index `n` fake object blocks laid out on a grid, written after them.
    fn build(n: u32) -> (SpatialIndex, Vec<u8>, u32, Vec<u32>) {
        let mut sink = BlockSink::new(tempfile::tempfile().unwrap());
        let mut index = SpatialIndex::new();
        let mut blocks = Vec::new();
        for i in 0..n {
            let addr = sink.allocate();
            let mut w = BinWriter::block();
            w.put_i16(BLOCK_OBJECT as i16).unwrap();
            sink.write_block(addr, w.as_slice()).unwrap();
            index.insert(rect((i % 37) as i32 * 100, (i / 37) as i32 * 100), addr);
            blocks.push(addr);
        }
        let root = index.write(&mut sink).unwrap();
        let mut file = sink.finish().unwrap();
        let mut image = Vec::new();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.read_to_end(&mut image).unwrap();
        (index, image, root, blocks)
    }

    #[test]
    fn test_single_leaf() {
        let (index, image, root, blocks) = build(3);
        assert_eq!(index.depth(), 1);
        assert_eq!(walk_index(&image, root).unwrap(), blocks);
        let entries = read_index_block(&image, root).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].mbr, rect(100, 0));
    }

    #[test]
    fn test_splits_keep_every_block_reachable() {
        let (index, image, root, blocks) = build(1000);
        assert_eq!(index.len(), 1000);
        assert!(index.depth() >= 3);
        assert_eq!(walk_index(&image, root).unwrap(), blocks);
        for entry in read_index_block(&image, root).unwrap() {
            assert!(entry.mbr.area() > 0.0);
        }
    }

    #[test]
    fn test_node_mbrs_cover_children() {
        let mut index = SpatialIndex::new();
        for i in 0..200 {
            index.insert(rect(i * 7 % 500, i * 13 % 300), 512 * (i as u32 + 1));
        }
        for node in &index.nodes {
            for (mbr, child) in &node.entries {
                if let Child::Node(c) = child {
                    let inner = index.nodes[*c].mbr();
                    assert_eq!(mbr.union(&inner), *mbr);
                }
            }
        }
    }

    #[test]
    fn test_empty_index() {
        let mut sink = BlockSink::new(tempfile::tempfile().unwrap());
        assert_eq!(SpatialIndex::new().write(&mut sink).unwrap(), 0);
        assert!(walk_index(&[], 0).unwrap().is_empty());
    }

    #[test]
    fn test_cycle_is_corrupt() {
        let mut image = vec![0u8; 2 * BLOCK_SIZE];
        let mut w = BinWriter::block();
        w.put_i16(BLOCK_INDEX as i16).unwrap();
        w.put_i16(1).unwrap();
        w.put_int_rect(&rect(0, 0)).unwrap();
        w.put_i32(512).unwrap();
        image[BLOCK_SIZE..].copy_from_slice(w.as_slice());
        let err = walk_index(&image, 512).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::CorruptFormat);
    }
}
