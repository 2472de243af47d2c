//! Verification mode.
//!
//! Integrity checks on the build/extend path (duplicate keys, duplicate
//! node declarations) run only when `ENABLED` is set: in debug builds, or
//! in any build with the `verify` feature. Otherwise they compile away and
//! the caller is trusted.
//!
//! Precondition failures on lookups (`at` with an absent key, `neighbors`
//! on a terminal node) are reported through `contract_violation` in every
//! build; only the explicit `unsafe` accessors skip them.

use core::hash::Hash;
use hashbrown::HashSet;

pub(crate) const ENABLED: bool = cfg!(any(debug_assertions, feature = "verify"));

/// Reports a broken caller precondition.
#[cold]
#[inline(never)]
#[track_caller]
pub(crate) fn contract_violation(args: core::fmt::Arguments<'_>) -> ! {
    panic!("contract violation: {}", args)
}

/// Returns the first key that was already yielded earlier by `keys`.
pub(crate) fn first_duplicate<'a, K, It>(keys: It) -> Option<&'a K>
where
    K: Hash + Eq + 'a,
    It: IntoIterator<Item = &'a K>,
{
    let mut keys = keys.into_iter();
    let mut seen: HashSet<&'a K> = HashSet::with_capacity(keys.size_hint().0);
    keys.find(|&k| !seen.insert(k))
}
