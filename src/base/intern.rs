//! String interning for passage, variable, and namespace names.
//!
//! Uses `Arc<str>` for cheap cloning (reference-count bump instead of a
//! fresh allocation) and deduplicates repeated names across a large story
//! — qualified passage names in particular repeat heavily once namespace
//! prefixes are applied. `Arc` rather than `Rc` so that `Name`-bearing
//! types (`Story`, `Passage`, and the `DocumentCache` that holds them
//! behind a `parking_lot::RwLock`) stay `Send`/`Sync` and can actually be
//! shared across a host's worker threads.

use std::sync::Arc;
use rustc_hash::FxHashSet;

/// An interned name — cheap to clone, compares by value.
pub type Name = Arc<str>;

/// Deduplicating string interner.
#[derive(Debug, Default, Clone)]
pub struct Interner {
    strings: FxHashSet<Arc<str>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning a cheap-to-clone handle. Returns the
    /// existing handle if this string was already interned.
    pub fn intern(&mut self, s: &str) -> Name {
        if let Some(existing) = self.strings.get(s) {
            Arc::clone(existing)
        } else {
            let rc: Arc<str> = Arc::from(s);
            self.strings.insert(Arc::clone(&rc));
            rc
        }
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_dedupes_identical_strings() {
        let mut interner = Interner::new();
        let a = interner.intern("Start");
        let b = interner.intern("Start");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn intern_keeps_distinct_strings_separate() {
        let mut interner = Interner::new();
        let a = interner.intern("Start");
        let b = interner.intern("End");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(interner.len(), 2);
    }
}
