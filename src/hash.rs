//! Multiplicative bucket hash.
//!
//! The key's `BuildHasher` output is scrambled once more with an odd
//! multiplier and the top `bits` bits select the bucket. Trying a few
//! multipliers at build time is what keeps buckets short for a key set
//! that is known in advance.

/// Upper bound on the bucket bit-width; keeps `shift` non-zero.
pub(crate) const MAX_BITS: u32 = 63;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HashFunction {
    a: u64,
    // shift == 64 - bits
    shift: u32,
}

impl HashFunction {
    pub(crate) fn new(a: u64, bits: u32) -> Self {
        debug_assert!((1..=MAX_BITS).contains(&bits));
        debug_assert!(a & 1 == 1, "multiplier must be odd");
        Self {
            a,
            shift: u64::BITS - bits,
        }
    }

    #[inline]
    pub fn bucket(&self, h: u64) -> usize {
        (self.a.wrapping_mul(h) >> self.shift) as usize
    }

    pub fn bits(&self) -> u32 {
        u64::BITS - self.shift
    }

    pub fn num_buckets(&self) -> usize {
        1usize << self.bits()
    }

    pub fn multiplier(&self) -> u64 {
        self.a
    }
}

/// Smallest `b >= 1` with `2^b >= n`, plus `extra`, capped at `MAX_BITS`.
pub(crate) fn pick_num_bits(n: usize, extra: u8) -> u32 {
    let mut bits = 1u32;
    while bits < MAX_BITS && (1u64 << bits) < n as u64 {
        bits += 1;
    }
    (bits + u32::from(extra)).min(MAX_BITS)
}

/// Deterministic stream of odd multipliers (splitmix64).
pub(crate) struct Multipliers {
    state: u64,
}

impl Multipliers {
    pub(crate) fn new(seed: u64) -> Self {
        Self { state: seed }
    }
}

impl Iterator for Multipliers {
    type Item = u64;

    #[inline]
    fn next(&mut self) -> Option<u64> {
        self.state = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        Some((z ^ (z >> 31)) | 1)
    }
}
