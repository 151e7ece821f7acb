//! Tunable index geometry: the `(L2, M3)` pair and everything derived from it.
//!
//! `L2` is the lmer prefix width (direct-addressed bucket bits), `M3` the
//! bloom index width over the low kmer bits. Rule of thumb for throughput is
//! `L2 >= K2 - M3`, but any pair in range is accepted; the hot loops hoist
//! the derived values into locals on entry.

use crate::encode::K2;
use crate::error::{Error, Result};

/// Validated `(L2, M3)` pair with derived widths, masks and element counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Params {
    l2: u32,
    m3: u32,
}

impl Params {
    /// Validate and freeze an `(L2, M3)` pair. `L2` in 1..=32; `M3` in
    /// 1..=62, since the mmer must be coverable by whole bases of a 31-base
    /// window.
    pub fn new(l2: u32, m3: u32) -> Result<Self> {
        if !(1..=32).contains(&l2) {
            return Err(Error::LmerBits(l2));
        }
        if !(1..=62).contains(&m3) {
            return Err(Error::MmerBits(m3));
        }
        Ok(Params { l2, m3 })
    }

    /// Lmer prefix width in bits.
    #[inline]
    pub fn l2(&self) -> u32 {
        self.l2
    }

    /// Bloom index width in bits.
    #[inline]
    pub fn m3(&self) -> u32 {
        self.m3
    }

    /// Remainder width: bits of a kmer below the lmer prefix.
    #[inline]
    pub fn m2(&self) -> u32 {
        K2 - self.l2
    }

    /// Number of direct-addressed lmer buckets (`2^L2`).
    #[inline]
    pub fn lmer_count(&self) -> usize {
        1usize << self.l2
    }

    /// Mask selecting the low `M3` bits of a kmer.
    #[inline]
    pub fn mmer_mask(&self) -> u64 {
        (1u64 << self.m3) - 1
    }

    /// Bloom vector length in 64-bit words (`2^M3` bits, rounded up).
    #[inline]
    pub fn bloom_words(&self) -> usize {
        (((1u64 << self.m3) + 63) / 64) as usize
    }

    /// Minimal number of bases whose encoding covers `M3` bits.
    #[inline]
    pub fn mmer_bases(&self) -> usize {
        ((self.m3 + 1) / 2) as usize
    }
}
