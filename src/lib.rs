//! semistatic: a lookup table and a dependency graph for key sets that are
//! almost entirely known up front, with cheap versioned extension.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: near-static lookup cost for the bulk of the keys, while still
//!   allowing a few keys (or graph nodes) to be added later without
//!   rebuilding.
//! - Layers:
//!   - HashedLookupTable<K, V, S>: bulk-built map. Entries are grouped by
//!     bucket in immutable segments; a multiplicative hash picked at build
//!     time keeps buckets short.
//!   - DependencyGraph<I, N, S>: maps caller ids to dense `InternalId`s
//!     through a HashedLookupTable, then stores edges as runs of internal
//!     ids so traversal never hashes.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` (storage is shared through `Rc`).
//! - No deletion and no resizing. Growth only happens by `extend`, which
//!   returns a new version and leaves the base untouched.
//! - Each extension adds a little indirection to lookups; after many
//!   extensions a rebuild is cheaper. `depth()` reports the chain length.
//!
//! Versioning and storage
//! - Backing storage is append-only and reference-counted. A derived
//!   version holds `Rc`s to every segment of its ancestors, so versions can
//!   be dropped in any order.
//! - Table extension copies only the buckets that receive new keys, and
//!   records them in an override map; the bucket array itself is shared.
//! - Graph extension copies node slots (values and terminal flags are per
//!   version), appends a new edge segment and extends the id table.
//!
//! Contract checks
//! - `at` on an absent key, `neighbors` on a terminal node and `value` on
//!   a placeholder panic with a "contract violation" message in every
//!   build. `at_unchecked` is the explicit `unsafe` fast path.
//! - Duplicate keys or node declarations passed to a build or `extend`
//!   are only detected in verification mode (debug builds, or the
//!   `verify` feature). `try_extend` and `verify` are always checked and
//!   return errors instead of panicking.
//!
//! Non-goals
//! - General-purpose map or graph algorithms: the graph only enumerates
//!   neighbors, and the caller tracks how many each node has.

mod config;
mod error;
mod graph;
#[cfg(feature = "bench_internal")]
pub mod hash;
#[cfg(not(feature = "bench_internal"))]
mod hash;
mod lookup_table;
mod lookup_table_proptest;
mod record;
mod verify;

// Public surface
pub use config::TableConfig;
pub use error::{GraphError, TableError};
pub use graph::{DependencyGraph, EdgeCursor, InternalId, NodeHandle};
pub use lookup_table::{HashedLookupTable, Iter};
pub use record::{NodeDecl, NodeRecord};
