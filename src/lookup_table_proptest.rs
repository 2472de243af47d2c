#![cfg(test)]

// Model-based property tests for HashedLookupTable versions.

use crate::config::TableConfig;
use crate::error::TableError;
use crate::lookup_table::HashedLookupTable;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::hash_map::RandomState;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length. Version selectors are
// taken modulo the number of live versions.
#[derive(Clone, Debug)]
enum OpI {
    Extend(Vec<(usize, i32)>),
    TryExtend(usize, i32),
    Find(usize, usize),
    Contains(usize, String),
    Iterate(usize),
    DropVersion(usize),
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<(usize, i32)>, Vec<OpI>)> {
    proptest::collection::btree_set("[a-z]{0,6}", 1..=24).prop_flat_map(|set| {
        let pool: Vec<String> = set.into_iter().collect();
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let initial = proptest::collection::vec((idx.clone(), any::<i32>()), 0..16);
        let op = prop_oneof![
            proptest::collection::vec((idx.clone(), any::<i32>()), 0..6).prop_map(OpI::Extend),
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::TryExtend(i, v)),
            (any::<usize>(), idx.clone()).prop_map(|(v, i)| OpI::Find(v, i)),
            (
                any::<usize>(),
                prop_oneof![contains_pool.prop_map(|s: String| s), "[a-z]{0,6}".prop_map(|s| s)]
            )
                .prop_map(|(v, s)| OpI::Contains(v, s)),
            any::<usize>().prop_map(OpI::Iterate),
            any::<usize>().prop_map(OpI::DropVersion),
        ];
        (initial, proptest::collection::vec(op, 1..40))
            .prop_map(move |(initial, ops)| (pool.clone(), initial, ops))
    })
}

// Property: every live version behaves like its own std HashMap model.
// Invariants exercised across random operation sequences:
// - `find`/`at`/`contains_key` agree with the model for present and absent keys.
// - `extend` never changes the base version; the derived version adds exactly
//   the new keys.
// - `try_extend` rejects exactly the keys already present.
// - `iter` yields each live entry exactly once; `len` matches the model.
// - Dropping any version leaves every other version intact.
fn run_scenario<S>(
    pool: Vec<String>,
    initial: Vec<(usize, i32)>,
    ops: Vec<OpI>,
    hasher: S,
) -> Result<(), TestCaseError>
where
    S: BuildHasher + Clone,
{
    // First occurrence of each key wins, to keep the bulk build duplicate-free.
    let mut first: HashMap<Key, i32> = HashMap::new();
    for (i, v) in initial {
        first.entry(key_from(&pool, i)).or_insert(v);
    }
    let table = HashedLookupTable::from_records_with(
        first.iter().map(|(k, v)| (k.clone(), *v)),
        TableConfig::new().with_max_bucket_len(2),
        hasher,
    );
    let mut versions: Vec<(HashedLookupTable<Key, i32, S>, HashMap<Key, i32>)> =
        vec![(table, first)];

    for op in ops {
        match op {
            OpI::Extend(batch) => {
                let (base, model) = versions.last().expect("at least one live version");
                let mut next = model.clone();
                let mut fresh = Vec::new();
                for (i, v) in batch {
                    let k = key_from(&pool, i);
                    if !next.contains_key(&k) {
                        next.insert(k.clone(), v);
                        fresh.push((k, v));
                    }
                }
                let before: Vec<(Key, i32)> = base.iter().map(|(k, v)| (k.clone(), *v)).collect();
                let ext = HashedLookupTable::extend(base, fresh);
                let after: Vec<(Key, i32)> = base.iter().map(|(k, v)| (k.clone(), *v)).collect();
                prop_assert_eq!(before, after, "extend must not touch the base");
                prop_assert_eq!(ext.depth(), base.depth() + 1);
                versions.push((ext, next));
            }
            OpI::TryExtend(i, v) => {
                let (base, model) = versions.last().expect("at least one live version");
                let k = key_from(&pool, i);
                match HashedLookupTable::try_extend(base, vec![(k.clone(), v)]) {
                    Ok(ext) => {
                        prop_assert!(!model.contains_key(&k), "try_extend must reject present keys");
                        let mut next = model.clone();
                        next.insert(k, v);
                        versions.push((ext, next));
                    }
                    Err(TableError::DuplicateKey { key }) => {
                        prop_assert!(model.contains_key(&k));
                        prop_assert_eq!(key, k);
                    }
                    Err(other) => prop_assert!(false, "unexpected error: {:?}", other),
                }
            }
            OpI::Find(sel, i) => {
                let (t, model) = &versions[sel % versions.len()];
                let k = key_from(&pool, i);
                prop_assert_eq!(t.find(&k), model.get(&k));
                prop_assert_eq!(t.find(k.0.as_str()), model.get(&k));
                if let Some(v) = model.get(&k) {
                    prop_assert_eq!(t.at(&k), v);
                }
            }
            OpI::Contains(sel, s) => {
                let (t, model) = &versions[sel % versions.len()];
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(t.contains_key(s.as_str()), has_model);
            }
            OpI::Iterate(sel) => {
                let (t, model) = &versions[sel % versions.len()];
                let s_keys: BTreeSet<_> = t.iter().map(|(k, _)| k.clone()).collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(t.iter().count(), t.len());
                prop_assert_eq!(s_keys, m_keys);
            }
            OpI::DropVersion(sel) => {
                if versions.len() > 1 {
                    let _ = versions.remove(sel % versions.len());
                }
            }
        }

        // Post-conditions after each op
        for (t, model) in &versions {
            prop_assert_eq!(t.len(), model.len());
            prop_assert_eq!(t.is_empty(), model.is_empty());
            for (k, v) in model {
                prop_assert_eq!(t.at(k), v);
            }
        }
    }

    for (t, _) in &versions {
        prop_assert!(t.verify().is_ok());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_versions_match_model((pool, initial, ops) in arb_scenario()) {
        run_scenario(pool, initial, ops, RandomState::new())?;
    }
}

// Collision variant using a constant hasher to stress equality resolution.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Property: Same invariants as above under worst-case collision behavior
// (every key lands in one bucket, and every extension rematerializes it).
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_versions_match_model_with_collisions((pool, initial, ops) in arb_scenario()) {
        run_scenario(pool, initial, ops, ConstBuildHasher)?;
    }
}
