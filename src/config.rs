//! Sizing knobs for `HashedLookupTable`.

/// Build-time tunables for the bucket layout of a lookup table.
///
/// The defaults suit the intended workload: a few hundred to a few
/// thousand keys, all known up front, with at most a handful of small
/// extensions afterward.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TableConfig {
    /// Target upper bound on entries sharing one bucket. The builder keeps
    /// drawing hash multipliers until the fullest bucket holds at most this
    /// many entries (or `max_hash_attempts` runs out).
    pub max_bucket_len: usize,
    /// Number of multipliers tried before settling for the best layout seen.
    pub max_hash_attempts: usize,
    /// Seed for the deterministic multiplier sequence.
    pub seed: u64,
    /// Bits added on top of the minimal bucket bit-width. Each extra bit
    /// doubles the bucket array and roughly halves bucket occupancy.
    pub extra_bits: u8,
}

pub(crate) const DEFAULT_MAX_BUCKET_LEN: usize = 4;
pub(crate) const DEFAULT_MAX_HASH_ATTEMPTS: usize = 32;
pub(crate) const DEFAULT_SEED: u64 = 0x243f_6a88_85a3_08d3;

impl TableConfig {
    pub const fn new() -> Self {
        Self {
            max_bucket_len: DEFAULT_MAX_BUCKET_LEN,
            max_hash_attempts: DEFAULT_MAX_HASH_ATTEMPTS,
            seed: DEFAULT_SEED,
            extra_bits: 0,
        }
    }

    /// Zero is treated as one: a bucket can always hold at least one entry.
    pub const fn with_max_bucket_len(mut self, n: usize) -> Self {
        self.max_bucket_len = if n == 0 { 1 } else { n };
        self
    }

    /// Zero is treated as one: at least one multiplier is always drawn.
    pub const fn with_max_hash_attempts(mut self, n: usize) -> Self {
        self.max_hash_attempts = if n == 0 { 1 } else { n };
        self
    }

    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub const fn with_extra_bits(mut self, bits: u8) -> Self {
        self.extra_bits = bits;
        self
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self::new()
    }
}
