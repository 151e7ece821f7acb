//! Crate-wide error type. Every fatal condition maps to one variant; there is
//! no retry or partial-success path anywhere in the pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the database optimizer, index stores and scanners.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure with the path that caused it.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source DB length is not a whole number of 16-byte records.
    #[error("source DB {path} has size {len}, not a multiple of 16 bytes")]
    DbSize { path: PathBuf, len: u64 },

    /// An index file exists but its size disagrees with the expected layout.
    #[error("index file {path} holds {actual} elements, expected {expected}")]
    IndexSize {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    /// An index file's bytes could not be viewed as its element type.
    #[error("index file {path}: {msg}")]
    Cast { path: PathBuf, msg: String },

    /// `snps` and `kmer_index` must be built together; one of the two files
    /// is present without the other.
    #[error("snps and kmer_index must be rebuilt as a pair (snps needs build: {snps}, kmer_index needs build: {kmer_index})")]
    PairedBuild { snps: bool, kmer_index: bool },

    /// Two kmers claiming the same SNP disagree on overlapping bases.
    #[error(
        "SNP {snp_id} coverage conflict on kmer {kmer:#018x} ({decoded}) at offset {offset}: \
         accumulated low={low:#018x}/{low_mask:#018x} high={high:#018x}/{high_mask:#018x}"
    )]
    SnpConflict {
        snp_id: u32,
        kmer: u64,
        decoded: String,
        offset: u32,
        low: u64,
        low_mask: u64,
        high: u64,
        high_mask: u64,
    },

    /// The SNP-position base disagrees between the low and high halves.
    #[error("SNP {snp_id} redundant base mismatch: low half encodes {low_base}, high half encodes {high_base}")]
    Redundancy {
        snp_id: u32,
        low_base: u8,
        high_base: u8,
    },

    /// Unique-SNP count exceeded the 27-bit id space.
    #[error("source DB holds more than {max} unique SNPs")]
    TooManySnps { max: u32 },

    /// A record's SNP offset falls outside the kmer.
    #[error("record {record}: SNP offset {offset} out of range (kmer length {k})")]
    OffsetRange {
        record: usize,
        offset: u32,
        k: usize,
    },

    /// An lmer run exceeds the packed 48-bit start / 16-bit length fields.
    #[error("lmer {lmer:#x} run exceeds range encoding (start {start}, length {len})")]
    LmerOverflow { lmer: u64, start: usize, len: usize },

    /// Post-build validation reconstructed the wrong kmer for a record.
    #[error(
        "validation failed at record {record}: reconstructed kmer {reconstructed:#018x}, DB holds {expected:#018x}"
    )]
    Validation {
        record: usize,
        reconstructed: u64,
        expected: u64,
    },

    /// An input FASTQ ended mid-sequence-line.
    #[error("truncated read sequence at end of file: {path}")]
    TruncatedRead { path: PathBuf },

    /// Lmer prefix width outside 1..=32.
    #[error("lmer prefix width {0} out of range 1..=32")]
    LmerBits(u32),

    /// Bloom index width outside 1..=62.
    #[error("bloom index width {0} out of range 1..=62")]
    MmerBits(u32),
}

impl Error {
    /// Attach a path to a raw I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
