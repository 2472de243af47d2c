//! HashedLookupTable: bulk-built key→value map with cheap versioned extension.
//!
//! Layout: entries live in immutable `Rc<[HashEntry]>` segments, grouped by
//! bucket. The bucket array maps each bucket to a `BucketRange` inside one
//! segment. A bulk build produces exactly one segment; every extension adds
//! one more segment holding the rematerialized buckets, and records the new
//! ranges in an override map instead of copying the bucket array.

use crate::config::TableConfig;
use crate::error::TableError;
use crate::hash::{pick_num_bits, HashFunction, Multipliers};
use crate::verify;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use hashbrown::HashMap;
use std::collections::hash_map::RandomState;
use std::rc::Rc;

#[derive(Clone, Debug)]
struct HashEntry<K, V> {
    key: K,
    value: V,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
struct BucketRange {
    segment: usize,
    begin: usize,
    end: usize,
}

impl BucketRange {
    fn len(&self) -> usize {
        self.end - self.begin
    }
}

pub struct HashedLookupTable<K, V, S = RandomState> {
    hasher: S,
    hash_fn: HashFunction,
    config: TableConfig,
    buckets: Rc<[BucketRange]>,
    // Buckets rematerialized by extensions; shadows `buckets`.
    overrides: HashMap<usize, BucketRange>,
    segments: Vec<Rc<[HashEntry<K, V>]>>,
    len: usize,
    max_bucket_len: usize,
    depth: usize,
}

impl<K, V> HashedLookupTable<K, V>
where
    K: Eq + Hash,
{
    /// Bulk-builds a table with the default config and a random hasher.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        Self::from_records_with(records, TableConfig::default(), RandomState::new())
    }

    pub fn with_config<I>(records: I, config: TableConfig) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        Self::from_records_with(records, config, RandomState::new())
    }
}

impl<K, V, S> FromIterator<(K, V)> for HashedLookupTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(records: I) -> Self {
        Self::from_records_with(records, TableConfig::default(), S::default())
    }
}

impl<K, V, S> HashedLookupTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Bulk-builds a table from records with unique keys.
    ///
    /// Duplicate keys are a contract violation; they are detected (and
    /// panic) only in verification mode.
    pub fn from_records_with<I>(records: I, config: TableConfig, hasher: S) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let records: Vec<(K, V)> = records.into_iter().collect();
        let n = records.len();
        let hashes: Vec<u64> = records.iter().map(|(k, _)| hasher.hash_one(k)).collect();

        let bits = pick_num_bits(n, config.extra_bits);
        let (hash_fn, attempts) = choose_hash_function(&hashes, bits, &config);
        let num_buckets = hash_fn.num_buckets();

        // Counting sort by bucket.
        let mut counts = vec![0usize; num_buckets];
        for &h in &hashes {
            counts[hash_fn.bucket(h)] += 1;
        }
        let mut buckets = Vec::with_capacity(num_buckets);
        let mut begin = 0;
        for &c in &counts {
            buckets.push(BucketRange {
                segment: 0,
                begin,
                end: begin + c,
            });
            begin += c;
        }
        let max_bucket_len = counts.iter().copied().max().unwrap_or(0);

        let mut cursor: Vec<usize> = buckets.iter().map(|r| r.begin).collect();
        let mut slots: Vec<Option<HashEntry<K, V>>> = (0..n).map(|_| None).collect();
        for ((key, value), &h) in records.into_iter().zip(&hashes) {
            let b = hash_fn.bucket(h);
            slots[cursor[b]] = Some(HashEntry { key, value });
            cursor[b] += 1;
        }
        let entries: Rc<[HashEntry<K, V>]> = slots
            .into_iter()
            .map(|e| e.expect("every slot is filled by the counting sort"))
            .collect();

        if max_bucket_len > config.max_bucket_len {
            tracing::warn!(
                len = n,
                max_bucket_len,
                target = config.max_bucket_len,
                attempts,
                "no hash multiplier met the bucket length target"
            );
        }
        tracing::debug!(
            len = n,
            bits = hash_fn.bits(),
            multiplier = hash_fn.multiplier(),
            attempts,
            max_bucket_len,
            "built lookup table"
        );

        let table = Self {
            hasher,
            hash_fn,
            config,
            buckets: buckets.into(),
            overrides: HashMap::new(),
            segments: vec![entries],
            len: n,
            max_bucket_len,
            depth: 1,
        };
        if verify::ENABLED && verify::first_duplicate(table.iter().map(|(k, _)| k)).is_some() {
            verify::contract_violation(format_args!(
                "duplicate key in HashedLookupTable bulk build"
            ));
        }
        table
    }

    #[inline]
    fn bucket_of<Q>(&self, q: &Q) -> usize
    where
        Q: ?Sized + Hash,
    {
        self.hash_fn.bucket(self.hasher.hash_one(q))
    }

    #[inline]
    fn range(&self, bucket: usize) -> BucketRange {
        if self.overrides.is_empty() {
            return self.buckets[bucket];
        }
        match self.overrides.get(&bucket) {
            Some(&r) => r,
            None => self.buckets[bucket],
        }
    }

    #[inline]
    fn bucket_entries(&self, bucket: usize) -> &[HashEntry<K, V>] {
        let r = self.range(bucket);
        &self.segments[r.segment][r.begin..r.end]
    }

    #[inline]
    fn lookup<Q>(&self, q: &Q) -> Option<&HashEntry<K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.bucket_entries(self.bucket_of(q))
            .iter()
            .find(|e| e.key.borrow() == q)
    }

    /// Returns the value for a key that must be present.
    ///
    /// Panics with a contract-violation message if the key is absent. Use
    /// `find` when absence is a legitimate outcome.
    #[inline]
    #[track_caller]
    pub fn at<Q>(&self, q: &Q) -> &V
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.lookup(q) {
            Some(e) => &e.value,
            None => verify::contract_violation(format_args!(
                "HashedLookupTable::at called with a key that is not present"
            )),
        }
    }

    /// Unchecked variant of [`at`](Self::at).
    ///
    /// # Safety
    /// The key must be present in the table. Debug builds still assert it;
    /// in release builds an absent key is undefined behavior.
    #[inline]
    pub unsafe fn at_unchecked<Q>(&self, q: &Q) -> &V
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.lookup(q) {
            Some(e) => &e.value,
            None => {
                debug_assert!(false, "at_unchecked called with an absent key");
                // SAFETY: the caller guarantees the key is present.
                unsafe { core::hint::unreachable_unchecked() }
            }
        }
    }

    pub fn find<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.lookup(q).map(|e| &e.value)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.lookup(q).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn num_buckets(&self) -> usize {
        self.hash_fn.num_buckets()
    }

    /// Largest bucket occupancy, including buckets grown by extensions.
    pub fn max_bucket_len(&self) -> usize {
        self.max_bucket_len
    }

    /// Number of versions in this table's chain: 1 for a bulk build, plus
    /// one per extension.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    #[cfg(feature = "bench_internal")]
    pub fn hash_function(&self) -> HashFunction {
        self.hash_fn
    }

    /// Iterates live entries in bucket order. Entries superseded by an
    /// extension's rematerialized bucket are not visited.
    pub fn iter(&self) -> Iter<'_, K, V, S> {
        Iter {
            table: self,
            next_bucket: 0,
            current: <&[HashEntry<K, V>]>::default().iter(),
            remaining: self.len,
        }
    }

    /// Checks that every entry is stored in the bucket its key hashes to
    /// and that no key appears twice.
    pub fn verify(&self) -> Result<(), TableError<K>>
    where
        K: Clone,
    {
        for bucket in 0..self.num_buckets() {
            for e in self.bucket_entries(bucket) {
                let expected = self.bucket_of(&e.key);
                if expected != bucket {
                    return Err(TableError::Misplaced {
                        key: e.key.clone(),
                        found: bucket,
                        expected,
                    });
                }
            }
        }
        match verify::first_duplicate(self.iter().map(|(k, _)| k)) {
            Some(k) => Err(TableError::DuplicateKey { key: k.clone() }),
            None => Ok(()),
        }
    }

    // First key of `keys` that repeats within the batch or is already in `self`.
    fn first_conflict<'a, It>(&self, keys: It) -> Option<&'a K>
    where
        It: IntoIterator<Item = &'a K> + Clone,
        K: 'a,
    {
        verify::first_duplicate(keys.clone())
            .or_else(|| keys.into_iter().find(|k| self.contains_key(*k)))
    }
}

impl<K, V, S> HashedLookupTable<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Creates a new version of `base` with additional records.
    ///
    /// The new keys must be unique and absent from `base` (checked only in
    /// verification mode). `base` is left untouched and both tables stay
    /// valid independently; storage is shared, so dropping either one
    /// does not invalidate the other.
    ///
    /// Only buckets that receive a new key are copied. Cost is
    /// O(k log k) in the number of new records plus the number of buckets
    /// overridden by earlier extensions, independent of `base.len()`.
    pub fn extend<I>(base: &Self, records: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let fresh: Vec<(usize, K, V)> = records
            .into_iter()
            .map(|(k, v)| (base.bucket_of(&k), k, v))
            .collect();
        if verify::ENABLED && base.first_conflict(fresh.iter().map(|(_, k, _)| k)).is_some() {
            verify::contract_violation(format_args!(
                "HashedLookupTable::extend called with a duplicate key"
            ));
        }
        Self::extend_unchecked(base, fresh)
    }

    /// Checked variant of [`extend`](Self::extend): returns
    /// `TableError::DuplicateKey` instead of trusting the caller.
    pub fn try_extend<I>(base: &Self, records: I) -> Result<Self, TableError<K>>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let fresh: Vec<(usize, K, V)> = records
            .into_iter()
            .map(|(k, v)| (base.bucket_of(&k), k, v))
            .collect();
        if let Some(k) = base.first_conflict(fresh.iter().map(|(_, k, _)| k)) {
            return Err(TableError::DuplicateKey { key: k.clone() });
        }
        Ok(Self::extend_unchecked(base, fresh))
    }

    fn extend_unchecked(base: &Self, mut fresh: Vec<(usize, K, V)>) -> Self {
        let added = fresh.len();
        // Stable: keeps batch order within a bucket.
        fresh.sort_by_key(|&(b, _, _)| b);

        let segment = base.segments.len();
        let mut entries: Vec<HashEntry<K, V>> = Vec::with_capacity(added);
        let mut overrides = base.overrides.clone();
        let mut max_bucket_len = base.max_bucket_len;
        let mut touched = 0usize;

        let mut it = fresh.into_iter().peekable();
        while let Some((bucket, key, value)) = it.next() {
            let begin = entries.len();
            entries.extend(base.bucket_entries(bucket).iter().cloned());
            entries.push(HashEntry { key, value });
            while let Some((_, key, value)) = it.next_if(|&(b, _, _)| b == bucket) {
                entries.push(HashEntry { key, value });
            }
            let r = BucketRange {
                segment,
                begin,
                end: entries.len(),
            };
            max_bucket_len = max_bucket_len.max(r.len());
            overrides.insert(bucket, r);
            touched += 1;
        }

        let mut segments = base.segments.clone();
        if !entries.is_empty() {
            segments.push(entries.into());
        }

        tracing::debug!(
            added,
            touched_buckets = touched,
            depth = base.depth + 1,
            max_bucket_len,
            "extended lookup table"
        );

        Self {
            hasher: base.hasher.clone(),
            hash_fn: base.hash_fn,
            config: base.config,
            buckets: Rc::clone(&base.buckets),
            overrides,
            segments,
            len: base.len + added,
            max_bucket_len,
            depth: base.depth + 1,
        }
    }
}

// Picks the multiplier with the shortest fullest bucket, stopping early once
// the configured target is met. Returns the chosen function and the number
// of multipliers tried.
fn choose_hash_function(hashes: &[u64], bits: u32, config: &TableConfig) -> (HashFunction, usize) {
    let num_buckets = 1usize << bits;
    let mut counts = vec![0usize; num_buckets];
    let mut best: Option<(HashFunction, usize)> = None;
    let mut attempts = 0;
    for a in Multipliers::new(config.seed).take(config.max_hash_attempts.max(1)) {
        attempts += 1;
        let f = HashFunction::new(a, bits);
        counts.iter_mut().for_each(|c| *c = 0);
        let mut max = 0;
        for &h in hashes {
            let c = &mut counts[f.bucket(h)];
            *c += 1;
            max = max.max(*c);
        }
        if best.map_or(true, |(_, m)| max < m) {
            best = Some((f, max));
        }
        if max <= config.max_bucket_len {
            break;
        }
    }
    let (f, _) = best.expect("at least one multiplier is always tried");
    (f, attempts)
}

/// Iterator over the live entries of a `HashedLookupTable`.
pub struct Iter<'a, K, V, S> {
    table: &'a HashedLookupTable<K, V, S>,
    next_bucket: usize,
    current: core::slice::Iter<'a, HashEntry<K, V>>,
    remaining: usize,
}

impl<'a, K, V, S> Iterator for Iter<'a, K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(e) = self.current.next() {
                self.remaining -= 1;
                return Some((&e.key, &e.value));
            }
            if self.next_bucket >= self.table.num_buckets() {
                return None;
            }
            self.current = self.table.bucket_entries(self.next_bucket).iter();
            self.next_bucket += 1;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V, S> ExactSizeIterator for Iter<'a, K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
}

impl<'a, K, V, S> IntoIterator for &'a HashedLookupTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, S> fmt::Debug for HashedLookupTable<K, V, S>
where
    K: Eq + Hash + fmt::Debug,
    V: fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
