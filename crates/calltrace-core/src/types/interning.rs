//! String interning for names looked up during resolution.
//!
//! The resolution index is built and queried on a single thread, so a plain
//! `lasso::Rodeo` is enough.

use lasso::{Rodeo, Spur};

/// Interner for function, class and token names.
#[derive(Debug, Default)]
pub struct NameInterner {
    inner: Rodeo,
}

impl NameInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a name, returning its key.
    pub fn intern(&mut self, name: &str) -> Spur {
        self.inner.get_or_intern(name)
    }

    /// Look up a previously interned name without inserting.
    pub fn get(&self, name: &str) -> Option<Spur> {
        self.inner.get(name)
    }

    /// Resolve a key back to its string.
    pub fn resolve(&self, key: &Spur) -> &str {
        self.inner.resolve(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
