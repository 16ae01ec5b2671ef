//! Re-exports of performance-oriented collection types.

pub use rustc_hash::{FxHashMap, FxHashSet};
pub use smallvec::SmallVec;
pub use std::collections::{BTreeMap, BTreeSet};

/// SmallVec for candidate definitions (usually 1-2).
pub type SmallVec2<T> = SmallVec<[T; 2]>;

/// SmallVec for per-function call edges (usually <8).
pub type SmallVec8<T> = SmallVec<[T; 8]>;
