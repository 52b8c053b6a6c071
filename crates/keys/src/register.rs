//! Lock-free single-slot holder for the current signing key.
//!
//! Signing paths that never need older keys read from a [`CurrentKey`]
//! instead of the store. Reads and writes swap the whole `Arc<KeyRecord>`
//! atomically, so a reader gets either the old key or the new one, never a mix.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::{
    error::{KeyError, KeyResult},
    record::KeyRecord,
};

/// Holds the most recently published signing key.
#[derive(Debug, Default)]
pub struct CurrentKey {
    slot: ArcSwapOption<KeyRecord>,
}

impl CurrentKey {
    /// Creates an empty register.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a register already holding `record`.
    #[must_use]
    pub fn with_key(record: Arc<KeyRecord>) -> Self {
        Self { slot: ArcSwapOption::from(Some(record)) }
    }

    /// Publishes `record`, unconditionally replacing any previous key.
    pub fn store(&self, record: Arc<KeyRecord>) {
        self.slot.store(Some(record));
    }

    /// Returns the published key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::NoCurrentKey`] if nothing was ever stored.
    pub fn load(&self) -> KeyResult<Arc<KeyRecord>> {
        self.slot.load_full().ok_or(KeyError::NoCurrentKey)
    }

    /// Returns `true` once a key has been stored.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.slot.load().is_some()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::{generator::KeyGenerator, testutil::test_generator};

    #[test]
    fn test_load_before_store() {
        let register = CurrentKey::new();
        assert!(!register.is_initialized());
        assert!(matches!(register.load(), Err(KeyError::NoCurrentKey)));
    }

    #[test]
    fn test_store_overwrites() {
        let generator = test_generator();
        let a = Arc::new(generator.generate().unwrap());
        let b = Arc::new(generator.generate().unwrap());

        let register = CurrentKey::with_key(Arc::clone(&a));
        assert_eq!(register.load().unwrap().kid(), a.kid());

        register.store(Arc::clone(&b));
        assert_eq!(register.load().unwrap().kid(), b.kid());
        assert!(Arc::ptr_eq(&register.load().unwrap(), &b));
    }

    #[test]
    fn test_concurrent_readers_see_whole_records() {
        let generator = test_generator();
        let records: Vec<Arc<KeyRecord>> =
            (0..4).map(|_| Arc::new(generator.generate().unwrap())).collect();
        let register = Arc::new(CurrentKey::with_key(Arc::clone(&records[0])));

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let register = Arc::clone(&register);
                let records = &records;
                scope.spawn(move || {
                    for _ in 0..1_000 {
                        let key = register.load().unwrap();
                        assert!(records.iter().any(|r| Arc::ptr_eq(r, &key)));
                    }
                });
            }
            for record in records.iter().cycle().take(200) {
                register.store(Arc::clone(record));
            }
        });
    }
}
