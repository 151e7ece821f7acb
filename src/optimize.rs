//! DB optimizer: one sequential pass over the source DB fills whichever of
//! the four indices opened in build mode, then a second pass validates every
//! record against the freshly built (or previously loaded) tables before
//! anything is saved.

use std::time::Instant;

use ahash::AHashMap;
use tracing::info;

use crate::db::SourceDb;
use crate::encode::{decode_seq, K, KMER_MASK};
use crate::error::{Error, Result};
use crate::params::Params;
use crate::snp::{
    high_bits, high_mask, low_bits, low_mask, pack_entry, pack_range, unpack_entry, SnpRecord,
    MAX_RANGE_LEN, MAX_RANGE_START, MAX_SNPS,
};
use crate::store::IndexSet;

/// Per-SNP coverage masks, kept only for the duration of a build.
#[derive(Copy, Clone, Default)]
struct Coverage {
    low: u64,
    high: u64,
}

/// Build missing indices from the source DB, validate, and persist them.
///
/// `snps` and `kmer_index` must be built as a pair: `kmer_index` entries are
/// indices into `snps`, so one without the other is a configuration error.
/// Returns without touching the DB when every store opened ready-built.
pub fn optimize(db: &SourceDb, set: &mut IndexSet, params: &Params) -> Result<()> {
    let build_pair = set.snps.needs_build();
    if build_pair != set.kmer_index.needs_build() {
        return Err(Error::PairedBuild {
            snps: set.snps.needs_build(),
            kmer_index: set.kmer_index.needs_build(),
        });
    }
    let build_bloom = set.mmer_bloom.needs_build();
    let build_lmer = set.lmer_index.needs_build();
    if !(build_pair || build_bloom || build_lmer) {
        info!("all indices loaded, skipping rebuild");
        return Ok(());
    }

    let started = Instant::now();
    let m2 = params.m2();
    let mmer_mask = params.mmer_mask();

    let mut coord_ids: AHashMap<u64, u32> = AHashMap::new();
    let mut coverage: Vec<Coverage> = Vec::new();

    let mut last_lmer: u64 = 0;
    let mut start: usize = 0;

    for (r, rec) in db.records().enumerate() {
        let kmer = rec.kmer;
        assert!(kmer <= KMER_MASK, "record {r}: kmer exceeds {K} bases");
        let lmer = kmer >> m2;

        if build_bloom {
            let bit = kmer & mmer_mask;
            set.mmer_bloom.as_mut_slice()[(bit / 64) as usize] |= 1u64 << (bit % 64);
        }

        if build_pair {
            let offset = rec.offset();
            if offset >= K as u32 {
                return Err(Error::OffsetRange {
                    record: r,
                    offset,
                    k: K,
                });
            }
            let snp_id = allocate_snp(
                &mut coord_ids,
                &mut coverage,
                set,
                rec.snp_coord(),
            )?;
            accumulate(set, &mut coverage, snp_id, kmer, offset)?;
            set.kmer_index.as_mut_slice()[r] = pack_entry(snp_id, offset);
        }

        if build_lmer {
            if r > 0 && lmer != last_lmer {
                start = r;
            }
            let len = r - start + 1;
            if start as u64 > MAX_RANGE_START || len as u64 > MAX_RANGE_LEN {
                return Err(Error::LmerOverflow { lmer, start, len });
            }
            set.lmer_index.as_mut_slice()[lmer as usize] = pack_range(start as u64, len as u64);
        }
        last_lmer = lmer;
    }

    info!(
        records = db.record_count(),
        snps = set.snps.len(),
        elapsed_s = started.elapsed().as_secs(),
        "optimized DB built"
    );

    validate(db, set)?;

    let save_started = Instant::now();
    if build_pair {
        set.snps.save()?;
        set.kmer_index.save()?;
    }
    if build_bloom {
        set.mmer_bloom.save()?;
    }
    if build_lmer {
        set.lmer_index.save()?;
    }
    info!(
        elapsed_s = save_started.elapsed().as_secs(),
        "optimized indices saved"
    );
    Ok(())
}

/// Id for `coord`, allocating a fresh record on first sight.
fn allocate_snp(
    coord_ids: &mut AHashMap<u64, u32>,
    coverage: &mut Vec<Coverage>,
    set: &mut IndexSet,
    coord: u64,
) -> Result<u32> {
    if let Some(&id) = coord_ids.get(&coord) {
        return Ok(id);
    }
    let id = set.snps.len() as u32;
    if id >= MAX_SNPS {
        return Err(Error::TooManySnps { max: MAX_SNPS });
    }
    set.snps.push(SnpRecord::new(coord));
    coverage.push(Coverage::default());
    coord_ids.insert(coord, id);
    Ok(id)
}

/// Fold one kmer into its SNP record, checking agreement with everything
/// accumulated so far on the overlapping covered bits.
fn accumulate(
    set: &mut IndexSet,
    coverage: &mut [Coverage],
    snp_id: u32,
    kmer: u64,
    offset: u32,
) -> Result<()> {
    let lo = low_bits(kmer, offset);
    let hi = high_bits(kmer, offset);
    let lo_mask = low_mask(offset);
    let hi_mask = high_mask(offset);

    let snp = &mut set.snps.as_mut_slice()[snp_id as usize];
    let seen = &mut coverage[snp_id as usize];

    let conflict =
        ((snp.low ^ lo) & seen.low & lo_mask) != 0 || ((snp.high ^ hi) & seen.high & hi_mask) != 0;
    if conflict {
        return Err(Error::SnpConflict {
            snp_id,
            kmer,
            decoded: decode_seq(kmer, K),
            offset,
            low: snp.low,
            low_mask: seen.low & lo_mask,
            high: snp.high,
            high_mask: seen.high & hi_mask,
        });
    }

    snp.low |= lo;
    snp.high |= hi;
    seen.low |= lo_mask;
    seen.high |= hi_mask;

    if !snp.redundancy_ok() {
        let (low_base, high_base) = snp.redundant_bases();
        return Err(Error::Redundancy {
            snp_id,
            low_base,
            high_base,
        });
    }
    Ok(())
}

/// Re-scan the source DB and assert that every record's kmer reconstructs
/// exactly from its `kmer_index` entry and SNP record.
fn validate(db: &SourceDb, set: &IndexSet) -> Result<()> {
    let started = Instant::now();
    let kmer_index = set.kmer_index.as_slice();
    let snps = set.snps.as_slice();
    for (r, rec) in db.records().enumerate() {
        let (snp_id, offset) = unpack_entry(kmer_index[r]);
        let reconstructed = snps[snp_id as usize].reconstruct(offset);
        if reconstructed != rec.kmer {
            return Err(Error::Validation {
                record: r,
                reconstructed,
                expected: rec.kmer,
            });
        }
    }
    info!(
        records = db.record_count(),
        elapsed_s = started.elapsed().as_secs(),
        "optimized DB validated"
    );
    Ok(())
}
