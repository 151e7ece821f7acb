//! DNA codec: 2-bit mapping via LUT, MSB-first packing into `u64`.
//!
//! Conventions
//! - `encode_seq` packs the **first** base into the highest 2 bits, so the
//!   low bits of a packed kmer always encode its trailing bases.
//! - Callers must hand in pure-ACGT buffers; the scanner guarantees this by
//!   tokenizing reads at wildcard characters before encoding.

/// Bases per kmer.
pub const K: usize = 31;

/// Bits per encoded base.
pub const BITS_PER_BASE: usize = 2;

/// Bits per packed kmer.
pub const K2: u32 = (K * BITS_PER_BASE) as u32;

/// Mask selecting the `K2` payload bits of a packed kmer.
pub const KMER_MASK: u64 = (1u64 << K2) - 1;

/// LUT sentinel for bytes outside `ACGTacgt`.
pub const INVALID_CODE: u8 = 0xff;

/// 256-entry LUT: ASCII → 2-bit (A=0, C=1, G=2, T=3), `0xff` otherwise.
pub static BASE_CODES: [u8; 256] = {
    let mut t = [INVALID_CODE; 256];
    t[b'A' as usize] = 0;
    t[b'a' as usize] = 0;
    t[b'C' as usize] = 1;
    t[b'c' as usize] = 1;
    t[b'G' as usize] = 2;
    t[b'g' as usize] = 2;
    t[b'T' as usize] = 3;
    t[b't' as usize] = 3;
    t
};

/// Encode up to 32 bases, first base in the highest bits.
///
/// Panics on a non-ACGT byte: by the time a buffer reaches the codec it has
/// been tokenized at wildcards, so an invalid byte is a caller bug.
#[inline]
pub fn encode_seq(seq: &[u8]) -> u64 {
    debug_assert!(seq.len() <= 32);
    let mut code: u64 = 0;
    for &b in seq {
        let v = BASE_CODES[b as usize];
        assert!(
            v != INVALID_CODE,
            "non-ACGT byte {:#04x} in tokenized sequence",
            b
        );
        code = (code << BITS_PER_BASE) | v as u64;
    }
    code
}

/// Decode a single 2-bit code.
#[inline]
pub fn decode_base(code: u8) -> u8 {
    match code & 0b11 {
        0 => b'A',
        1 => b'C',
        2 => b'G',
        _ => b'T',
    }
}

/// Decode `len` bases from a packed code, for diagnostics and tests.
pub fn decode_seq(code: u64, len: usize) -> String {
    debug_assert!(len <= 32);
    let mut out = String::with_capacity(len);
    for i in (0..len).rev() {
        out.push(decode_base((code >> (i * BITS_PER_BASE)) as u8) as char);
    }
    out
}
