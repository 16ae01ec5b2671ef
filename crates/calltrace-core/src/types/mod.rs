//! Shared data structures: fast collections, string interning, pagination.

pub mod collections;
pub mod interning;
pub mod pagination;

pub use collections::{FxHashMap, FxHashSet};
pub use interning::NameInterner;
pub use pagination::{paginate_sorted, PaginatedResult, PaginationCursor};
