//! Shared test utilities for the key lifecycle.
//!
//! Feature-gated behind `testutil` so helpers never reach production builds.
//!
//! ```toml
//! [dev-dependencies]
//! utu-keys = { path = "../keys", features = ["testutil"] }
//! ```

#![allow(clippy::expect_used, clippy::panic)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use rand_core::{CryptoRng, RngCore};

use crate::{
    config::KeyConfig,
    error::{KeyError, KeyResult},
    generator::{KeyGenerator, KeyPairGenerator},
    record::KeyRecord,
    store::KeyStore,
};

/// Rotation interval used by [`test_config`].
pub const TEST_ROTATION_INTERVAL: Duration = Duration::from_secs(60);

/// Token lifetime used by [`test_config`].
pub const TEST_TOKEN_TTL: Duration = Duration::from_secs(20);

/// Safety margin used by [`test_config`].
pub const TEST_SAFETY_MARGIN: Duration = Duration::from_secs(1);

/// A random source that always reports failure.
///
/// `try_fill_bytes` returns an error; the infallible entry points panic so a
/// provider that bypasses error reporting is caught immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingRng;

impl RngCore for FailingRng {
    fn next_u32(&mut self) -> u32 {
        panic!("FailingRng: random source unavailable")
    }

    fn next_u64(&mut self) -> u64 {
        panic!("FailingRng: random source unavailable")
    }

    fn fill_bytes(&mut self, _dest: &mut [u8]) {
        panic!("FailingRng: random source unavailable")
    }

    fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand_core::Error> {
        Err(rand_core::Error::new(std::io::Error::other("random source unavailable")))
    }
}

impl CryptoRng for FailingRng {}

/// Fast EC P-256 configuration with a one-minute rotation interval and a
/// 21-second grace period.
pub fn test_config() -> KeyConfig {
    KeyConfig::builder()
        .rotation_interval(TEST_ROTATION_INTERVAL)
        .token_ttl(TEST_TOKEN_TTL)
        .safety_margin(TEST_SAFETY_MARGIN)
        .build()
        .expect("test configuration is valid")
}

/// A generator for [`test_config`].
pub fn test_generator() -> Arc<KeyPairGenerator> {
    Arc::new(KeyPairGenerator::new(&test_config()).expect("test generator"))
}

/// An initialized store plus the generator that seeded it.
pub fn test_store() -> (Arc<KeyStore>, Arc<KeyPairGenerator>) {
    let generator = test_generator();
    let store = KeyStore::initialize(generator.as_ref()).expect("store initialization");
    (Arc::new(store), generator)
}

/// A generator that always fails.
#[derive(Debug, Default)]
pub struct FailingGenerator {
    calls: AtomicUsize,
}

impl FailingGenerator {
    /// Returns how many times `generate` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl KeyGenerator for FailingGenerator {
    fn generate(&self) -> KeyResult<KeyRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(KeyError::generation("injected generation failure"))
    }
}

/// A generator that fails a fixed number of times, then delegates.
#[derive(Debug)]
pub struct FlakyGenerator<G> {
    inner: G,
    remaining_failures: AtomicUsize,
    calls: AtomicUsize,
}

impl<G: KeyGenerator> FlakyGenerator<G> {
    /// Wraps `inner`, failing the first `failures` calls.
    pub fn new(inner: G, failures: usize) -> Self {
        Self { inner, remaining_failures: AtomicUsize::new(failures), calls: AtomicUsize::new(0) }
    }

    /// Returns how many times `generate` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<G: KeyGenerator> KeyGenerator for FlakyGenerator<G> {
    fn generate(&self) -> KeyResult<KeyRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(KeyError::generation("injected generation failure"));
        }
        self.inner.generate()
    }
}

/// Yields to the runtime until `condition` holds.
///
/// Rotations generate keys on the blocking pool, so progress under a paused
/// clock needs both task yields and a little wall-clock time.
///
/// # Panics
///
/// Panics if the condition does not hold within roughly five seconds of wall
/// time.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..5_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
        std::thread::sleep(Duration::from_millis(1));
    }
    panic!("condition not reached");
}

/// Yields to the runtime a fixed number of times without advancing the clock.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
        std::thread::sleep(Duration::from_micros(200));
    }
}
