//! Shared randomness source and key identifier generation.

use std::{fmt, sync::Arc};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::Mutex;
use rand_core::{CryptoRngCore, OsRng};

use crate::error::{KeyError, KeyResult};

/// Number of random bytes in a generated key identifier (128 bits).
pub const KID_ENTROPY_BYTES: usize = 16;

/// A cryptographically secure random source shared by everything that
/// generates keys.
///
/// Defaults to the operating system generator. Tests inject deterministic or
/// failing sources through [`RandomSource::new`].
#[derive(Clone)]
pub struct RandomSource {
    rng: Arc<Mutex<dyn CryptoRngCore + Send>>,
}

impl RandomSource {
    /// Wraps the given generator.
    #[must_use]
    pub fn new(rng: impl CryptoRngCore + Send + 'static) -> Self {
        Self { rng: Arc::new(Mutex::new(rng)) }
    }

    /// Fills `dest` with random bytes.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Generation`] if the underlying generator fails.
    pub fn fill(&self, dest: &mut [u8]) -> KeyResult<()> {
        self.rng
            .lock()
            .try_fill_bytes(dest)
            .map_err(|e| KeyError::generation_with_source("unable to read random bytes", e))
    }

    /// Runs `f` with exclusive access to the generator.
    ///
    /// Key generation borrows the generator for its whole duration, so
    /// concurrent generators sharing one source are serialized.
    pub fn with_rng<T>(&self, f: impl FnOnce(&mut dyn CryptoRngCore) -> T) -> T {
        let mut guard = self.rng.lock();
        f(&mut *guard)
    }

    /// Draws [`KID_ENTROPY_BYTES`] random bytes and encodes them as
    /// unpadded base64url.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Generation`] if the generator fails.
    pub fn generate_kid(&self) -> KeyResult<String> {
        self.generate_id(KID_ENTROPY_BYTES)
    }

    /// Draws `size` random bytes and encodes them as unpadded base64url.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Generation`] if the generator fails.
    pub fn generate_id(&self, size: usize) -> KeyResult<String> {
        let mut raw = vec![0u8; size];
        self.fill(&mut raw)?;
        Ok(URL_SAFE_NO_PAD.encode(raw))
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::new(OsRng)
    }
}

impl fmt::Debug for RandomSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomSource").finish_non_exhaustive()
    }
}
