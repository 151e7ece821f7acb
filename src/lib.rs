//! Exact-match 31-mer SNP genotyping in Rust.
//!
//! Scans sequencing reads (FASTQ) for exact matches against a precomputed
//! dictionary of 31-mers centered on known SNPs and emits per-SNP hit counts
//! per input file. The pipeline has two halves:
//!
//! - the **optimizer** transforms the canonical `(snp, kmer)` table into four
//!   compact, mmap-friendly indices (`snps`, `kmer_index`, `mmer_bloom`,
//!   `lmer_index`), cross-validating every derived fact against the source;
//! - the **scanner** streams reads through a presence bit-vector and a
//!   prefix-indexed sorted run, deduplicates hits per read, and writes sorted
//!   `coord\tcount` TSVs, one per input file.
//!
//! A thin driver fans scanners out across input files in bounded-parallelism
//! rounds. Everything is exact: no reverse complements, no approximate
//! matching, k fixed at 31.

pub mod db;
pub mod driver;
pub mod encode;
pub mod error;
pub mod optimize;
pub mod params;
pub mod scan;
pub mod snp;
pub mod store;

pub use db::SourceDb;
pub use driver::{run, RunOptions};
pub use error::{Error, Result};
pub use params::Params;
pub use scan::Scanner;
pub use snp::SnpRecord;
pub use store::{IndexPaths, IndexSet, IndexStore, IndexViews, Sizing};
