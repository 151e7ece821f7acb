use snpscan::encode::*;

#[test]
fn encode_packs_first_base_highest() {
    assert_eq!(encode_seq(b"AC"), 0b0001);
    assert_eq!(encode_seq(b"CA"), 0b0100);
    assert_eq!(encode_seq(b"ACGT"), 0b00_01_10_11);
    assert_eq!(encode_seq(b"acgt"), encode_seq(b"ACGT"));
}

#[test]
fn lut_flags_wildcards() {
    assert_eq!(BASE_CODES[b'N' as usize], INVALID_CODE);
    assert_eq!(BASE_CODES[b'n' as usize], INVALID_CODE);
    assert_eq!(BASE_CODES[b'\n' as usize], INVALID_CODE);
    assert_eq!(BASE_CODES[b'g' as usize], BASE_CODES[b'G' as usize]);
}

#[test]
fn decode_inverts_encode() {
    let seq = b"ACGTACGTACGTACGTACGTACGTACGTACG";
    assert_eq!(seq.len(), K);
    let code = encode_seq(seq);
    assert!(code <= KMER_MASK);
    assert_eq!(decode_seq(code, K).as_bytes(), seq);
}

#[test]
fn low_bits_encode_trailing_bases() {
    // The mmer pre-filter relies on the low bits of a full kmer equalling
    // the encoding of its trailing bases.
    let seq = b"ACGTACGTACGTACGTACGTACGTACGTACG";
    let kmer = encode_seq(seq);
    for bases in 1..=10usize {
        let mask = (1u64 << (2 * bases)) - 1;
        assert_eq!(encode_seq(&seq[K - bases..]) & mask, kmer & mask);
    }
}

#[test]
#[should_panic(expected = "non-ACGT")]
fn wildcard_in_tokenized_buffer_is_a_bug() {
    encode_seq(b"ACN");
}
