//! The `.ID` file: one little-endian i32 per feature, the `.MAP` offset of
//! its object. 0 stands for a feature without geometry.

use std::fs;
use std::path::Path;

use crate::errors::{MitabError, Result};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdIndex {
    ptrs: Vec<u32>,
}

impl IdIndex {
    pub fn new() -> IdIndex {
        IdIndex::default()
    }

    pub fn open(path: &Path) -> Result<IdIndex> {
        let data = fs::read(path).map_err(|e| MitabError::FileNotFound {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        IdIndex::from_bytes(&data)
    }

    pub fn from_bytes(data: &[u8]) -> Result<IdIndex> {
        if data.len() % 4 != 0 {
            return Err(MitabError::TruncatedData {
                what: ".ID file",
                offset: (data.len() - data.len() % 4) as u64,
                needed: 4,
                available: data.len() % 4,
            });
        }
        let ptrs = data
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]).max(0) as u32)
            .collect();
        Ok(IdIndex { ptrs })
    }

    pub fn len(&self) -> usize {
        self.ptrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ptrs.is_empty()
    }

    /// Object offset of feature `fid`, 0 for none or an unknown id.
    pub fn ptr(&self, fid: u64) -> u32 {
        match fid.checked_sub(1) {
            Some(i) => self.ptrs.get(i as usize).copied().unwrap_or(0),
            None => 0,
        }
    }

    /// Record the offset of `fid`, growing the index with zeros as needed.
    pub fn set(&mut self, fid: u64, ptr: u32) {
        let Some(i) = fid.checked_sub(1) else {
            return;
        };
        let i = i as usize;
        if i >= self.ptrs.len() {
            self.ptrs.resize(i + 1, 0);
        }
        self.ptrs[i] = ptr;
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.ptrs
            .iter()
            .flat_map(|p| (*p as i32).to_le_bytes())
            .collect()
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_lookup() {
        let mut ids = IdIndex::new();
        ids.set(3, 1044);
        ids.set(1, 532);
        assert_eq!(ids.len(), 3);
        assert_eq!(ids.ptr(1), 532);
        assert_eq!(ids.ptr(2), 0);
        assert_eq!(ids.ptr(3), 1044);
        assert_eq!(ids.ptr(0), 0);
        assert_eq!(ids.ptr(4), 0);

        let bytes = ids.to_bytes();
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[..4], &532i32.to_le_bytes());
        assert_eq!(IdIndex::from_bytes(&bytes).unwrap(), ids);
    }

    #[test]
    fn test_truncated_file() {
        let err = IdIndex::from_bytes(&[1, 0, 0, 0, 2, 0]).unwrap_err();
        assert!(matches!(err, MitabError::TruncatedData { offset: 4, .. }));
    }
}
