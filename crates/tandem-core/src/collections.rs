//! Hash map aliases shared by every tandem crate.
//!
//! The default build hashes with `rustc-hash`; the `std-hash` feature swaps in
//! the SipHash-backed std maps for hosts that receive ids from untrusted peers.

#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::{HashMap, HashSet};
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
}

/// Arena keyed by snapshot id.
pub type IdMap<V> = map::HashMap<crate::SnapshotId, V>;

/// Set of snapshot ids.
pub type IdSet = map::HashSet<crate::SnapshotId>;
