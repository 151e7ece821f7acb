//! Per-file scanner: streams FASTQ bytes through the two-stage filter and
//! aggregates per-SNP hit counts.
//!
//! Reads are consumed in fixed-size chunks. Only FASTQ sequence lines
//! (`line % 4 == 1`) are examined; they are split into tokens at wildcard
//! `N`/`n` characters and at the terminating newline, and every 31-base
//! window of a token is checked against the mmer bloom, then resolved through
//! `lmer_index → kmer_index → snps`. A per-read footprint credits each SNP at
//! most once per read.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::Instant;

use ahash::AHashSet;
use tracing::{info, warn};

use crate::encode::{encode_seq, K};
use crate::error::{Error, Result};
use crate::params::Params;
use crate::snp::{unpack_entry, unpack_range};
use crate::store::IndexViews;

/// Input chunk size. Streaming throughput saturates in the tens of
/// megabytes; the buffer is reused across chunks.
const CHUNK_SIZE: usize = 32 * 1024 * 1024;

/// Tokens shorter than one kmer cannot hit and are dropped silently.
const MIN_TOKEN_LEN: usize = K;

/// Tokens longer than this are dropped whole; the buffer never grows past it.
const MAX_TOKEN_LEN: usize = 500;

/// Progress is reported every this many input lines.
const PROGRESS_LINES: u64 = 5_000_000;

/// Read-only scanner over the shared indices. One instance per input file,
/// each running on its own thread; nothing here is shared mutable state.
pub struct Scanner<'a> {
    views: IndexViews<'a>,
    m2: u32,
    mmer_mask: u64,
    mmer_bases: usize,
}

impl<'a> Scanner<'a> {
    /// Bind a scanner to the shared index views, hoisting the geometry into
    /// plain fields for the window loop.
    pub fn new(params: &Params, views: IndexViews<'a>) -> Self {
        Scanner {
            views,
            m2: params.m2(),
            mmer_mask: params.mmer_mask(),
            mmer_bases: params.mmer_bases(),
        }
    }

    /// Scan one FASTQ file and write its sorted `coord\tcount` TSV.
    pub fn scan_file(&self, in_path: &Path, out_path: &Path) -> Result<()> {
        let started = Instant::now();
        let mut file = File::open(in_path).map_err(|e| Error::io(in_path, e))?;

        let mut chunk = vec![0u8; CHUNK_SIZE];
        let mut seq_buf = [0u8; MAX_TOKEN_LEN];
        let mut token_len: usize = 0;
        let mut n_lines: u64 = 0;
        let mut footprint: AHashSet<u32> = AHashSet::new();
        let mut hits: Vec<u32> = Vec::new();

        loop {
            let n = file.read(&mut chunk).map_err(|e| Error::io(in_path, e))?;
            if n == 0 {
                break;
            }
            for &b in &chunk[..n] {
                // In FASTQ, every 4 lines define a read; the sequence is on
                // the second line.
                if n_lines % 4 == 1 {
                    match b {
                        b'\n' => {
                            self.flush_token(&seq_buf, token_len, &mut footprint, &mut hits)?;
                            token_len = 0;
                            // Footprint is scoped to the read, not the token.
                            footprint.clear();
                            n_lines += 1;
                            progress(n_lines, &started, in_path);
                        }
                        b'N' | b'n' => {
                            self.flush_token(&seq_buf, token_len, &mut footprint, &mut hits)?;
                            token_len = 0;
                        }
                        _ => {
                            if token_len < MAX_TOKEN_LEN {
                                seq_buf[token_len] = b;
                            }
                            token_len += 1;
                        }
                    }
                } else if b == b'\n' {
                    n_lines += 1;
                    progress(n_lines, &started, in_path);
                }
            }
        }

        if token_len != 0 {
            return Err(Error::TruncatedRead {
                path: in_path.to_owned(),
            });
        }

        info!(
            file = %in_path.display(),
            reads = (n_lines + 3) / 4,
            hits = hits.len(),
            elapsed_s = started.elapsed().as_secs(),
            "scan complete"
        );
        self.write_counts(out_path, &hits)
    }

    /// Process a completed token if its length is in bounds.
    fn flush_token(
        &self,
        seq_buf: &[u8; MAX_TOKEN_LEN],
        token_len: usize,
        footprint: &mut AHashSet<u32>,
        hits: &mut Vec<u32>,
    ) -> Result<()> {
        if token_len > MAX_TOKEN_LEN {
            warn!(len = token_len, "token exceeds {MAX_TOKEN_LEN} bases, dropped");
            return Ok(());
        }
        if token_len < MIN_TOKEN_LEN {
            return Ok(());
        }
        self.process_token(&seq_buf[..token_len], footprint, hits)
    }

    /// Slide the 31-base window across a token.
    fn process_token(
        &self,
        token: &[u8],
        footprint: &mut AHashSet<u32>,
        hits: &mut Vec<u32>,
    ) -> Result<()> {
        for j in 0..=(token.len() - K) {
            let window = &token[j..j + K];

            // Stage 1: presence bit over the low M3 kmer bits, computed from
            // the window's trailing bases alone.
            let mpres = encode_seq(&window[K - self.mmer_bases..]) & self.mmer_mask;
            if (self.views.mmer_bloom[(mpres / 64) as usize] >> (mpres % 64)) & 1 == 0 {
                continue;
            }

            // Stage 2: linear probe of the lmer's sorted run.
            let kmer = encode_seq(window);
            let range = self.views.lmer_index[(kmer >> self.m2) as usize];
            let (start, len) = unpack_range(range);
            for &entry in &self.views.kmer_index[start as usize..(start + len) as usize] {
                let (snp_id, offset) = unpack_entry(entry);
                let rec = &self.views.snps[snp_id as usize];
                let db_kmer = rec.reconstruct(offset);
                if kmer == db_kmer {
                    if !rec.redundancy_ok() {
                        let (low_base, high_base) = rec.redundant_bases();
                        return Err(Error::Redundancy {
                            snp_id,
                            low_base,
                            high_base,
                        });
                    }
                    if footprint.insert(snp_id) {
                        hits.push(snp_id);
                    }
                } else if kmer < db_kmer {
                    // Runs are sorted by kmer value.
                    break;
                }
            }
        }
        Ok(())
    }

    /// Sort hit coordinates and emit run-length-encoded `coord\tcount` lines.
    fn write_counts(&self, out_path: &Path, hits: &[u32]) -> Result<()> {
        let mut coords: Vec<u64> = hits
            .iter()
            .map(|&id| self.views.snps[id as usize].coord)
            .collect();
        coords.sort_unstable();

        let file = File::create(out_path).map_err(|e| Error::io(out_path, e))?;
        let mut out = BufWriter::new(file);
        if coords.is_empty() {
            info!(file = %out_path.display(), "zero hits");
        } else {
            let mut cur = coords[0];
            let mut count: u64 = 0;
            for &coord in &coords {
                if coord != cur {
                    writeln!(out, "{cur}\t{count}").map_err(|e| Error::io(out_path, e))?;
                    cur = coord;
                    count = 1;
                } else {
                    count += 1;
                }
            }
            writeln!(out, "{cur}\t{count}").map_err(|e| Error::io(out_path, e))?;
        }
        out.flush().map_err(|e| Error::io(out_path, e))
    }
}

fn progress(n_lines: u64, started: &Instant, path: &Path) {
    if n_lines % PROGRESS_LINES == 0 {
        info!(
            file = %path.display(),
            reads = (n_lines + 3) / 4,
            elapsed_s = started.elapsed().as_secs(),
            "scanning"
        );
    }
}
