//! Read-only view of the canonical source DB.
//!
//! The file is a stream of little-endian 16-byte records
//! `(snp_with_offset: u64, kmer: u64)`, sorted ascending by kmer, where
//! `snp_with_offset = (snp_coord << 8) | offset`. The optimizer borrows the
//! mapping for its build and validation passes and drops it before any
//! scanner starts.

use std::fs::File;
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;

use crate::error::{Error, Result};

/// Bytes per source record.
pub const RECORD_BYTES: usize = 16;

/// One `(snp_with_offset, kmer)` pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DbRecord {
    pub snp_with_offset: u64,
    pub kmer: u64,
}

impl DbRecord {
    /// SNP coordinate: the top 56 bits.
    #[inline]
    pub fn snp_coord(&self) -> u64 {
        self.snp_with_offset >> 8
    }

    /// SNP offset within the kmer: the low byte.
    #[inline]
    pub fn offset(&self) -> u32 {
        (self.snp_with_offset & 0xff) as u32
    }
}

/// Memory-mapped source DB.
pub struct SourceDb {
    path: PathBuf,
    map: Mmap,
}

impl SourceDb {
    /// Map the DB file. Fatal if it cannot be opened or its length is not a
    /// whole number of records.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let map = unsafe { Mmap::map(&file) }.map_err(|e| Error::io(path, e))?;
        if map.len() % RECORD_BYTES != 0 {
            return Err(Error::DbSize {
                path: path.to_owned(),
                len: map.len() as u64,
            });
        }
        Ok(SourceDb {
            path: path.to_owned(),
            map,
        })
    }

    /// Path the DB was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of 16-byte records.
    pub fn record_count(&self) -> usize {
        self.map.len() / RECORD_BYTES
    }

    /// Iterate records in file order.
    pub fn records(&self) -> impl Iterator<Item = DbRecord> + '_ {
        self.map.chunks_exact(RECORD_BYTES).map(|raw| DbRecord {
            snp_with_offset: LittleEndian::read_u64(&raw[..8]),
            kmer: LittleEndian::read_u64(&raw[8..]),
        })
    }
}
