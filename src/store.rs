//! File-backed fixed-element-size index stores, and the set of four derived
//! indices the pipeline runs on.
//!
//! A store either maps/loads an existing file read-only or, when the file is
//! missing or empty, hands out a zero-initialized writable buffer and reports
//! `needs_build`. `save` writes the buffer back so that a later open with the
//! same sizing succeeds without recomputation.

use std::fs::{self, File};
use std::io::Read;
use std::mem;
use std::path::{Path, PathBuf};

use bytemuck::{Pod, Zeroable};
use memmap2::Mmap;
use tracing::info;

use crate::error::{Error, Result};
use crate::params::Params;
use crate::snp::SnpRecord;

/// How a store learns its element count at open time.
#[derive(Copy, Clone, Debug)]
pub enum Sizing {
    /// The count is known up front; an existing file of any other size is
    /// fatal, and build mode starts from `n` zeroed elements.
    Exact(usize),
    /// The count is whatever an existing file holds; build mode starts empty
    /// and grows by [`IndexStore::push`]. Used by `snps`, whose cardinality
    /// is only known once the source DB has been scanned.
    FromFile,
}

enum Storage<T> {
    /// Read-only mapping of the backing file.
    Mapped(Mmap),
    /// Backing file fully read into an owned buffer (`-p`).
    Loaded(Vec<T>),
    /// Writable buffer to be filled by the optimizer and saved.
    Building(Vec<T>),
}

/// A file-backed array of Pod elements.
pub struct IndexStore<T: Pod> {
    path: PathBuf,
    storage: Storage<T>,
}

impl<T: Pod + Zeroable> IndexStore<T> {
    /// Open the store at `path`. Missing or empty file means build mode;
    /// an existing file must match `sizing` exactly.
    pub fn open(path: &Path, sizing: Sizing, preload: bool) -> Result<Self> {
        let file_len = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(Error::io(path, e)),
        };

        if file_len == 0 {
            let buf = match sizing {
                Sizing::Exact(n) => vec![T::zeroed(); n],
                Sizing::FromFile => Vec::new(),
            };
            info!(path = %path.display(), "index missing, will be recomputed");
            return Ok(IndexStore {
                path: path.to_owned(),
                storage: Storage::Building(buf),
            });
        }

        let elem = mem::size_of::<T>() as u64;
        let count = (file_len / elem) as usize;
        let expected = match sizing {
            Sizing::Exact(n) => n,
            Sizing::FromFile => count,
        };
        if file_len % elem != 0 || count != expected {
            return Err(Error::IndexSize {
                path: path.to_owned(),
                expected,
                actual: (file_len / elem) as usize,
            });
        }

        let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
        let storage = if preload {
            let mut buf = vec![T::zeroed(); count];
            file.read_exact(bytemuck::cast_slice_mut::<T, u8>(&mut buf))
                .map_err(|e| Error::io(path, e))?;
            Storage::Loaded(buf)
        } else {
            let map = unsafe { Mmap::map(&file) }.map_err(|e| Error::io(path, e))?;
            bytemuck::try_cast_slice::<u8, T>(&map[..]).map_err(|e| Error::Cast {
                path: path.to_owned(),
                msg: format!("{e:?}"),
            })?;
            Storage::Mapped(map)
        };
        info!(path = %path.display(), elements = count, preload, "index loaded");
        Ok(IndexStore {
            path: path.to_owned(),
            storage,
        })
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this store was opened in build mode.
    pub fn needs_build(&self) -> bool {
        matches!(self.storage, Storage::Building(_))
    }

    /// Number of elements currently held.
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether the store holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read-only view of the elements.
    pub fn as_slice(&self) -> &[T] {
        match &self.storage {
            Storage::Mapped(map) => bytemuck::cast_slice::<u8, T>(&map[..]),
            Storage::Loaded(buf) | Storage::Building(buf) => buf,
        }
    }

    /// Writable view. Only valid in build mode.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match &mut self.storage {
            Storage::Building(buf) => buf,
            _ => panic!("mutation of an index store not opened for building"),
        }
    }

    /// Append an element. Only valid in build mode (used by `FromFile`
    /// stores whose count grows during the build).
    pub fn push(&mut self, value: T) {
        match &mut self.storage {
            Storage::Building(buf) => buf.push(value),
            _ => panic!("push into an index store not opened for building"),
        }
    }

    /// Persist the build buffer to the backing path. Only valid in build
    /// mode; the saved file is byte-identical to the buffer.
    pub fn save(&self) -> Result<()> {
        let Storage::Building(buf) = &self.storage else {
            panic!("save of an index store not opened for building");
        };
        fs::write(&self.path, bytemuck::cast_slice::<T, u8>(buf))
            .map_err(|e| Error::io(&self.path, e))?;
        Ok(())
    }
}

/// Derived index file paths, placed beside the source DB. The base name is
/// the DB file name with a trailing `.bin` stripped and remaining dots
/// replaced by underscores.
#[derive(Clone, Debug)]
pub struct IndexPaths {
    pub snps: PathBuf,
    pub kmer_index: PathBuf,
    pub mmer_bloom: PathBuf,
    pub lmer_index: PathBuf,
}

impl IndexPaths {
    pub fn derive(db_path: &Path, params: &Params) -> Self {
        let name = db_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let base = name
            .strip_suffix(".bin")
            .unwrap_or(&name)
            .replace('.', "_");
        let dir = db_path.parent().unwrap_or_else(|| Path::new("."));
        let file = |suffix: String| dir.join(format!("{base}_optimized_db_{suffix}"));
        IndexPaths {
            snps: file("snps.bin".into()),
            kmer_index: file(format!("kmer_index_{}.bin", params.m2())),
            mmer_bloom: file(format!("mmer_bloom_{}.bin", params.m3())),
            lmer_index: file(format!("lmer_index_{}.bin", params.l2())),
        }
    }
}

/// The four derived indices, each exclusively owned by one store.
pub struct IndexSet {
    pub snps: IndexStore<SnpRecord>,
    pub kmer_index: IndexStore<u32>,
    pub mmer_bloom: IndexStore<u64>,
    pub lmer_index: IndexStore<u64>,
}

impl IndexSet {
    /// Open all four stores for a DB of `record_count` records.
    pub fn open(
        db_path: &Path,
        record_count: usize,
        params: &Params,
        preload: bool,
    ) -> Result<Self> {
        let paths = IndexPaths::derive(db_path, params);
        Ok(IndexSet {
            snps: IndexStore::open(&paths.snps, Sizing::FromFile, preload)?,
            kmer_index: IndexStore::open(&paths.kmer_index, Sizing::Exact(record_count), preload)?,
            mmer_bloom: IndexStore::open(
                &paths.mmer_bloom,
                Sizing::Exact(params.bloom_words()),
                preload,
            )?,
            lmer_index: IndexStore::open(
                &paths.lmer_index,
                Sizing::Exact(params.lmer_count()),
                preload,
            )?,
        })
    }

    /// Read-only views shared by every scanner thread.
    pub fn views(&self) -> IndexViews<'_> {
        IndexViews {
            snps: self.snps.as_slice(),
            kmer_index: self.kmer_index.as_slice(),
            mmer_bloom: self.mmer_bloom.as_slice(),
            lmer_index: self.lmer_index.as_slice(),
        }
    }
}

/// Borrowed, immutable views of the four indices.
#[derive(Copy, Clone)]
pub struct IndexViews<'a> {
    pub snps: &'a [SnpRecord],
    pub kmer_index: &'a [u32],
    pub mmer_bloom: &'a [u64],
    pub lmer_index: &'a [u64],
}
