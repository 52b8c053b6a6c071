//! The authoritative collection of live signing keys.
//!
//! [`KeyStore`] holds every key that may still verify tokens, the pointer to
//! the current signing key, and the precomputed public key set. All three are
//! guarded by one reader/writer lock and always change together, so a reader
//! never sees a current key missing from the records or a key set that
//! disagrees with them.
//!
//! Key generation always happens before the write lock is taken; the critical
//! section is pure bookkeeping.
//!
//! # Example
//!
//! ```
//! use utu_keys::{KeyConfig, KeyPairGenerator, KeyStore};
//!
//! let generator = KeyPairGenerator::new(&KeyConfig::default())?;
//! let store = KeyStore::initialize(&generator)?;
//!
//! let first = store.current();
//! let rotation = store.rotate(&generator)?;
//! assert_eq!(rotation.previous.kid(), first.kid());
//! assert_eq!(store.len(), 2);
//!
//! store.delete(first.kid())?;
//! assert!(store.get(first.kid()).is_none());
//! # Ok::<(), utu_keys::KeyError>(())
//! ```

use std::{collections::HashMap, sync::Arc};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::{
    error::{KeyError, KeyResult},
    generator::KeyGenerator,
    record::KeyRecord,
    snapshot,
};

/// Outcome of a successful rotation.
#[derive(Debug, Clone)]
pub struct Rotation {
    /// The key that was current before the rotation. It stays in the store
    /// until it is deleted.
    pub previous: Arc<KeyRecord>,
    /// The newly installed current key.
    pub current: Arc<KeyRecord>,
}

struct KeyState {
    records: HashMap<String, Arc<KeyRecord>>,
    // Insertion order, oldest first; drives the key set layout.
    order: Vec<String>,
    current: Arc<KeyRecord>,
    public_snapshot: Bytes,
}

impl KeyState {
    fn rebuild_snapshot(&mut self) {
        let records = &self.records;
        self.public_snapshot =
            snapshot::render(self.order.iter().filter_map(|kid| records.get(kid).map(Arc::as_ref)));
    }
}

/// Concurrency-safe store of live key records.
///
/// A store only exists initialized: [`KeyStore::initialize`] is the sole
/// constructor, so [`current`](Self::current) always has an answer.
pub struct KeyStore {
    state: RwLock<KeyState>,
}

impl KeyStore {
    /// Creates a store holding one freshly generated key as current.
    ///
    /// # Errors
    ///
    /// Returns the generator's error if the first key cannot be produced.
    #[tracing::instrument(skip(generator))]
    pub fn initialize(generator: &dyn KeyGenerator) -> KeyResult<Self> {
        let first = Arc::new(generator.generate()?);
        let kid = first.kid().to_owned();

        let mut state = KeyState {
            records: HashMap::from([(kid.clone(), Arc::clone(&first))]),
            order: vec![kid],
            current: Arc::clone(&first),
            public_snapshot: Bytes::new(),
        };
        state.rebuild_snapshot();

        tracing::info!(kid = %first.kid(), algorithm = %first.algorithm(), "initialized signing key");
        Ok(Self { state: RwLock::new(state) })
    }

    /// Generates a new key and makes it current.
    ///
    /// The previous current key stays in the store and is returned so the
    /// caller can schedule its retirement.
    ///
    /// # Errors
    ///
    /// - The generator's error, leaving the store unchanged
    /// - [`KeyError::Generation`] if the new key's identifier collides with a
    ///   stored key, also leaving the store unchanged
    #[tracing::instrument(skip(self, generator))]
    pub fn rotate(&self, generator: &dyn KeyGenerator) -> KeyResult<Rotation> {
        let next = Arc::new(generator.generate()?);

        let previous = {
            let mut state = self.state.write();
            if state.records.contains_key(next.kid()) {
                return Err(KeyError::generation(format!(
                    "generated key identifier {} is already in use",
                    next.kid()
                )));
            }
            state.records.insert(next.kid().to_owned(), Arc::clone(&next));
            state.order.push(next.kid().to_owned());
            let previous = std::mem::replace(&mut state.current, Arc::clone(&next));
            state.rebuild_snapshot();
            previous
        };

        tracing::info!(
            previous_kid = %previous.kid(),
            kid = %next.kid(),
            algorithm = %next.algorithm(),
            "rotated signing key"
        );
        Ok(Rotation { previous, current: next })
    }

    /// Removes a non-current key.
    ///
    /// # Errors
    ///
    /// - [`KeyError::CannotDeleteCurrent`] if `kid` is the current key; the
    ///   store is unchanged
    /// - [`KeyError::NotFound`] if no key has this identifier
    #[tracing::instrument(skip(self))]
    pub fn delete(&self, kid: &str) -> KeyResult<()> {
        {
            let mut state = self.state.write();
            if state.current.kid() == kid {
                drop(state);
                tracing::warn!(kid, "refused to delete the current signing key");
                return Err(KeyError::cannot_delete_current(kid));
            }
            if state.records.remove(kid).is_none() {
                return Err(KeyError::not_found(kid));
            }
            state.order.retain(|k| k != kid);
            state.rebuild_snapshot();
        }

        tracing::info!(
            audit.action = "retire_key",
            audit.resource = %kid,
            audit.result = "success",
            "audit_event"
        );
        Ok(())
    }

    /// Looks up a key by identifier.
    #[must_use]
    pub fn get(&self, kid: &str) -> Option<Arc<KeyRecord>> {
        self.state.read().records.get(kid).cloned()
    }

    /// Returns the current signing key.
    #[must_use]
    pub fn current(&self) -> Arc<KeyRecord> {
        Arc::clone(&self.state.read().current)
    }

    /// Returns the precomputed JWK Set document of all stored public keys.
    ///
    /// The returned bytes are shared, not copied.
    #[must_use]
    pub fn snapshot_public(&self) -> Bytes {
        self.state.read().public_snapshot.clone()
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    /// Returns `true` if no keys are stored. Never the case for an
    /// initialized store; provided for API completeness.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }

    /// Returns the stored key identifiers, oldest first.
    #[must_use]
    pub fn kids(&self) -> Vec<String> {
        self.state.read().order.clone()
    }

    /// Returns `true` if a key with this identifier is stored.
    #[must_use]
    pub fn contains(&self, kid: &str) -> bool {
        self.state.read().records.contains_key(kid)
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("KeyStore")
            .field("current", &state.current.kid())
            .field("keys", &state.order)
            .finish()
    }
}
