//! End-to-end scenarios: build a tiny source DB on disk, run the optimizer
//! and driver, and check the emitted TSVs and index invariants.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use snpscan::encode::{encode_seq, K};
use snpscan::snp::{unpack_entry, unpack_range};
use snpscan::{driver, Error, IndexPaths, IndexStore, Params, RunOptions, Sizing, SnpRecord};
use tempfile::TempDir;

const KMER1: &[u8] = b"ACGTACGTACGTACGTACGTACGTACGTACG";
const KMER2: &[u8] = b"ACGTACGTACGTACGTACGTACGTACGTACT";

fn params() -> Params {
    // Small geometry keeps the lmer and bloom files tiny for tests.
    Params::new(8, 10).unwrap()
}

/// Write a source DB of `(coord, offset, kmer-sequence)` records; callers
/// pass them pre-sorted by kmer value.
fn write_db(path: &Path, records: &[(u64, u64, &[u8])]) {
    let mut f = File::create(path).unwrap();
    for &(coord, offset, seq) in records {
        assert_eq!(seq.len(), K);
        f.write_u64::<LittleEndian>((coord << 8) | offset).unwrap();
        f.write_u64::<LittleEndian>(encode_seq(seq)).unwrap();
    }
}

fn two_snp_db(dir: &Path) -> PathBuf {
    let path = dir.join("snpdb.bin");
    write_db(&path, &[(1000, 5, KMER1), (2000, 10, KMER2)]);
    path
}

fn write_fastq(path: &Path, seqs: &[&[u8]]) {
    let mut f = File::create(path).unwrap();
    for (i, seq) in seqs.iter().enumerate() {
        write!(f, "@read{i}\n").unwrap();
        f.write_all(seq).unwrap();
        write!(f, "\n+\n").unwrap();
        f.write_all(&vec![b'F'; seq.len()]).unwrap();
        write!(f, "\n").unwrap();
    }
}

fn run(db: &Path, inputs: &[PathBuf], out_prefix: &str, threads: usize) -> snpscan::Result<()> {
    driver::run(&RunOptions {
        db_path: db.to_owned(),
        params: params(),
        n_threads: threads,
        out_prefix: out_prefix.into(),
        preload: false,
        inputs: inputs.to_vec(),
    })
}

fn out_prefix(dir: &Path) -> String {
    dir.join("out").display().to_string()
}

#[test]
fn build_persists_all_four_indices_and_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let db = two_snp_db(tmp.path());
    run(&db, &[], &out_prefix(tmp.path()), 1).unwrap();

    let paths = IndexPaths::derive(&db, &params());
    let snps = IndexStore::<SnpRecord>::open(&paths.snps, Sizing::FromFile, false).unwrap();
    assert!(!snps.needs_build());
    assert_eq!(snps.len(), 2);
    assert_eq!(snps.as_slice()[0].coord, 1000);
    assert_eq!(snps.as_slice()[1].coord, 2000);

    let kmer_index = IndexStore::<u32>::open(&paths.kmer_index, Sizing::Exact(2), false).unwrap();
    assert!(!kmer_index.needs_build());
    assert_eq!(kmer_index.len(), 2);

    let all = [
        &paths.snps,
        &paths.kmer_index,
        &paths.mmer_bloom,
        &paths.lmer_index,
    ];
    let first: Vec<Vec<u8>> = all.iter().map(|p| fs::read(p).unwrap()).collect();
    for p in &all {
        fs::remove_file(p).unwrap();
    }
    run(&db, &[], &out_prefix(tmp.path()), 1).unwrap();
    let second: Vec<Vec<u8>> = all.iter().map(|p| fs::read(p).unwrap()).collect();
    assert_eq!(first, second);
}

#[test]
fn built_indices_satisfy_run_and_bloom_invariants() {
    let tmp = TempDir::new().unwrap();
    let db = two_snp_db(tmp.path());
    run(&db, &[], &out_prefix(tmp.path()), 1).unwrap();

    let p = params();
    let paths = IndexPaths::derive(&db, &p);
    let snps = IndexStore::<SnpRecord>::open(&paths.snps, Sizing::FromFile, false).unwrap();
    let kmer_index = IndexStore::<u32>::open(&paths.kmer_index, Sizing::Exact(2), false).unwrap();
    let bloom =
        IndexStore::<u64>::open(&paths.mmer_bloom, Sizing::Exact(p.bloom_words()), false).unwrap();
    let lmers =
        IndexStore::<u64>::open(&paths.lmer_index, Sizing::Exact(p.lmer_count()), false).unwrap();

    // Every DB kmer's presence bit is set.
    for seq in [KMER1, KMER2] {
        let bit = encode_seq(seq) & p.mmer_mask();
        assert_eq!(
            (bloom.as_slice()[(bit / 64) as usize] >> (bit % 64)) & 1,
            1,
            "presence bit missing"
        );
    }

    // Non-empty lmer runs decode to non-decreasing kmers sharing the prefix.
    let mut covered = 0usize;
    for (lmer, &range) in lmers.as_slice().iter().enumerate() {
        let (start, len) = unpack_range(range);
        covered += len as usize;
        let mut prev = 0u64;
        for &entry in &kmer_index.as_slice()[start as usize..(start + len) as usize] {
            let (snp_id, offset) = unpack_entry(entry);
            let kmer = snps.as_slice()[snp_id as usize].reconstruct(offset);
            assert_eq!((kmer >> p.m2()) as usize, lmer, "entry outside its bucket");
            assert!(kmer >= prev, "run not sorted");
            prev = kmer;
        }
    }
    assert_eq!(covered, 2);
}

#[test]
fn single_read_hits_its_snp_once() {
    let tmp = TempDir::new().unwrap();
    let db = two_snp_db(tmp.path());
    let mut seq = vec![b'N'; 10];
    seq.extend_from_slice(KMER1);
    seq.resize(100, b'N');
    let fq = tmp.path().join("reads.fq");
    write_fastq(&fq, &[&seq]);

    let prefix = out_prefix(tmp.path());
    run(&db, &[fq], &prefix, 1).unwrap();
    assert_eq!(fs::read_to_string(format!("{prefix}.0.tsv")).unwrap(), "1000\t1\n");
}

#[test]
fn repeated_kmer_is_credited_once_per_read() {
    let tmp = TempDir::new().unwrap();
    let db = two_snp_db(tmp.path());
    let mut seq = Vec::new();
    for _ in 0..3 {
        seq.extend_from_slice(KMER1);
        seq.push(b'A');
    }
    let fq = tmp.path().join("reads.fq");
    write_fastq(&fq, &[&seq]);

    let prefix = out_prefix(tmp.path());
    run(&db, &[fq], &prefix, 1).unwrap();
    assert_eq!(fs::read_to_string(format!("{prefix}.0.tsv")).unwrap(), "1000\t1\n");
}

#[test]
fn dedup_spans_tokens_within_a_read() {
    let tmp = TempDir::new().unwrap();
    let db = two_snp_db(tmp.path());
    let mut seq = Vec::new();
    seq.extend_from_slice(KMER1);
    seq.push(b'N');
    seq.extend_from_slice(KMER1);
    let fq = tmp.path().join("reads.fq");
    write_fastq(&fq, &[&seq]);

    let prefix = out_prefix(tmp.path());
    run(&db, &[fq], &prefix, 1).unwrap();
    assert_eq!(fs::read_to_string(format!("{prefix}.0.tsv")).unwrap(), "1000\t1\n");
}

#[test]
fn counts_accumulate_across_reads() {
    let tmp = TempDir::new().unwrap();
    let db = two_snp_db(tmp.path());
    let fq = tmp.path().join("reads.fq");
    write_fastq(&fq, &[KMER1, KMER1, KMER2]);

    let prefix = out_prefix(tmp.path());
    run(&db, &[fq], &prefix, 1).unwrap();
    assert_eq!(
        fs::read_to_string(format!("{prefix}.0.tsv")).unwrap(),
        "1000\t2\n2000\t1\n"
    );
}

#[test]
fn wildcard_terminates_and_restarts_tokens() {
    let tmp = TempDir::new().unwrap();
    let db = two_snp_db(tmp.path());
    let mut seq = vec![b'A'; 31];
    seq.push(b'N');
    seq.extend_from_slice(KMER1);
    let fq = tmp.path().join("reads.fq");
    write_fastq(&fq, &[&seq]);

    let prefix = out_prefix(tmp.path());
    run(&db, &[fq], &prefix, 1).unwrap();
    assert_eq!(fs::read_to_string(format!("{prefix}.0.tsv")).unwrap(), "1000\t1\n");
}

#[test]
fn two_files_fan_out_to_their_channels() {
    let tmp = TempDir::new().unwrap();
    let db = two_snp_db(tmp.path());
    let a = tmp.path().join("a.fq");
    let b = tmp.path().join("b.fq");
    write_fastq(&a, &[KMER2]);
    write_fastq(&b, &[KMER2]);

    let prefix = out_prefix(tmp.path());
    run(&db, &[a, b], &prefix, 2).unwrap();
    assert_eq!(fs::read_to_string(format!("{prefix}.0.tsv")).unwrap(), "2000\t1\n");
    assert_eq!(fs::read_to_string(format!("{prefix}.1.tsv")).unwrap(), "2000\t1\n");
}

#[test]
fn scan_outputs_are_reproducible() {
    let tmp = TempDir::new().unwrap();
    let db = two_snp_db(tmp.path());
    let fq = tmp.path().join("reads.fq");
    write_fastq(&fq, &[KMER1, KMER2]);

    let prefix = out_prefix(tmp.path());
    run(&db, &[fq.clone()], &prefix, 1).unwrap();
    let first = fs::read(format!("{prefix}.0.tsv")).unwrap();
    run(&db, &[fq], &prefix, 1).unwrap();
    assert_eq!(fs::read(format!("{prefix}.0.tsv")).unwrap(), first);
}

#[test]
fn truncated_sequence_is_fatal_and_names_the_file() {
    let tmp = TempDir::new().unwrap();
    let db = two_snp_db(tmp.path());
    let fq = tmp.path().join("cut.fq");
    let mut f = File::create(&fq).unwrap();
    // Sequence line cut mid-base: no terminating newline.
    write!(f, "@read0\nACGTACGTACGTACGTACG").unwrap();
    drop(f);

    let err = run(&db, &[fq.clone()], &out_prefix(tmp.path()), 1).unwrap_err();
    match err {
        Error::TruncatedRead { path } => assert_eq!(path, fq),
        other => panic!("expected truncation error, got {other}"),
    }
}

#[test]
fn overlong_tokens_are_dropped_whole() {
    let tmp = TempDir::new().unwrap();
    let db = two_snp_db(tmp.path());
    let mut seq = Vec::new();
    seq.extend_from_slice(KMER1);
    seq.resize(501, b'A');
    let fq = tmp.path().join("reads.fq");
    write_fastq(&fq, &[&seq]);

    let prefix = out_prefix(tmp.path());
    run(&db, &[fq], &prefix, 1).unwrap();
    assert_eq!(fs::read_to_string(format!("{prefix}.0.tsv")).unwrap(), "");
}

#[test]
fn zero_hits_still_writes_an_empty_output() {
    let tmp = TempDir::new().unwrap();
    let db = two_snp_db(tmp.path());
    let fq = tmp.path().join("reads.fq");
    write_fastq(&fq, &[&vec![b'T'; 40]]);

    let prefix = out_prefix(tmp.path());
    run(&db, &[fq], &prefix, 1).unwrap();
    assert_eq!(fs::read_to_string(format!("{prefix}.0.tsv")).unwrap(), "");
}

#[test]
fn snps_and_kmer_index_must_rebuild_together() {
    let tmp = TempDir::new().unwrap();
    let db = two_snp_db(tmp.path());
    run(&db, &[], &out_prefix(tmp.path()), 1).unwrap();

    let paths = IndexPaths::derive(&db, &params());
    fs::remove_file(&paths.kmer_index).unwrap();
    let err = run(&db, &[], &out_prefix(tmp.path()), 1).unwrap_err();
    assert!(matches!(err, Error::PairedBuild { .. }), "got {err}");
}

#[test]
fn wrong_sized_index_file_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let db = two_snp_db(tmp.path());
    run(&db, &[], &out_prefix(tmp.path()), 1).unwrap();

    let paths = IndexPaths::derive(&db, &params());
    fs::write(&paths.mmer_bloom, [0u8; 24]).unwrap();
    let err = run(&db, &[], &out_prefix(tmp.path()), 1).unwrap_err();
    assert!(matches!(err, Error::IndexSize { .. }), "got {err}");
}

#[test]
fn ragged_source_db_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("snpdb.bin");
    fs::write(&db, [0u8; 20]).unwrap();
    let err = run(&db, &[], &out_prefix(tmp.path()), 1).unwrap_err();
    assert!(matches!(err, Error::DbSize { .. }), "got {err}");
}
