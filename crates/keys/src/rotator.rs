//! Scheduled key rotation with delayed retirement.
//!
//! A running [`KeyRotator`] owns one background task that rotates the store
//! every `rotation_interval`. Each successful rotation schedules a one-shot
//! retirement task that deletes the superseded key after `grace_period`, long
//! enough for every token it signed to expire.
//!
//! All tasks belong to one cancellation scope per run. [`KeyRotator::stop`]
//! cancels the scope and waits for every task to finish; retirements still
//! waiting out their grace period are abandoned and their keys stay in the
//! store.
//!
//! ```no_run
//! use std::sync::Arc;
//! use utu_keys::{KeyConfig, KeyPairGenerator, KeyRotator, KeyStore};
//!
//! # async fn example() -> utu_keys::KeyResult<()> {
//! let config = KeyConfig::default();
//! let generator = Arc::new(KeyPairGenerator::new(&config)?);
//! let store = Arc::new(KeyStore::initialize(generator.as_ref())?);
//!
//! let rotator = KeyRotator::builder()
//!     .store(Arc::clone(&store))
//!     .generator(generator)
//!     .rotation_interval(config.rotation_interval())
//!     .grace_period(config.grace_period())
//!     .build()?;
//!
//! rotator.start()?;
//! // ... serve traffic ...
//! rotator.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    error::{KeyError, KeyResult},
    generator::KeyGenerator,
    register::CurrentKey,
    store::{KeyStore, Rotation},
};

/// Cancellation scope shared by every task of one run.
#[derive(Clone)]
struct Scope {
    token: CancellationToken,
    tracker: TaskTracker,
}

struct Running {
    scope: Scope,
    handle: JoinHandle<()>,
}

struct Inner {
    store: Arc<KeyStore>,
    generator: Arc<dyn KeyGenerator>,
    register: Option<Arc<CurrentKey>>,
    rotation_interval: Duration,
    grace_period: Duration,
    // Serializes rotate-and-publish so the register never lags the store.
    rotate_lock: tokio::sync::Mutex<()>,
    rotations: AtomicU64,
    rotation_failures: AtomicU64,
    retirements: AtomicU64,
    abandoned_retirements: AtomicU64,
    pending_retirements: AtomicUsize,
}

/// Background scheduler for key rotation and retirement.
///
/// States are `Stopped` (initial) and `Running`. A rotator may be started
/// again after it has been stopped. Dropping a running rotator cancels its
/// tasks without waiting for them.
pub struct KeyRotator {
    inner: Arc<Inner>,
    running: Mutex<Option<Running>>,
}

#[bon::bon]
impl KeyRotator {
    /// Creates a stopped rotator.
    ///
    /// # Arguments
    ///
    /// * `store` - The store to rotate
    /// * `generator` - Source of new keys, run on the blocking pool
    /// * `rotation_interval` - Time between rotations; the first rotation
    ///   happens one full interval after [`start`](Self::start)
    /// * `grace_period` - How long a superseded key stays verifiable before
    ///   it is deleted
    /// * `register` - Optional current-key register updated after every
    ///   rotation
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Configuration`] if `rotation_interval` is zero.
    #[builder]
    pub fn new(
        store: Arc<KeyStore>,
        generator: Arc<dyn KeyGenerator>,
        rotation_interval: Duration,
        grace_period: Duration,
        register: Option<Arc<CurrentKey>>,
    ) -> KeyResult<Self> {
        if rotation_interval.is_zero() {
            return Err(KeyError::configuration("rotation_interval must be greater than zero"));
        }

        if let Some(register) = &register {
            register.store(store.current());
        }

        Ok(Self {
            inner: Arc::new(Inner {
                store,
                generator,
                register,
                rotation_interval,
                grace_period,
                rotate_lock: tokio::sync::Mutex::new(()),
                rotations: AtomicU64::new(0),
                rotation_failures: AtomicU64::new(0),
                retirements: AtomicU64::new(0),
                abandoned_retirements: AtomicU64::new(0),
                pending_retirements: AtomicUsize::new(0),
            }),
            running: Mutex::new(None),
        })
    }
}

impl KeyRotator {
    /// Starts the rotation task.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::AlreadyStarted`] if the rotator is running; no
    /// second task is spawned.
    ///
    /// # Panics
    ///
    /// Must be called within a Tokio runtime context.
    #[tracing::instrument(skip(self))]
    pub fn start(&self) -> KeyResult<()> {
        let mut running = self.running.lock();
        if running.is_some() {
            tracing::debug!("key rotator already running");
            return Err(KeyError::AlreadyStarted);
        }

        let scope = Scope { token: CancellationToken::new(), tracker: TaskTracker::new() };
        let first = Instant::now() + self.inner.rotation_interval;
        let handle = tokio::spawn(Inner::run(Arc::clone(&self.inner), scope.clone(), first));
        *running = Some(Running { scope, handle });

        tracing::info!(
            rotation_interval = ?self.inner.rotation_interval,
            grace_period = ?self.inner.grace_period,
            "key rotator started"
        );
        Ok(())
    }

    /// Stops the rotation task and abandons pending retirements.
    ///
    /// Waits for the rotation task and every retirement task to finish. A
    /// rotation or deletion already in progress completes first.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::AlreadyStopped`] if the rotator is not running.
    #[tracing::instrument(skip(self))]
    pub async fn stop(&self) -> KeyResult<()> {
        // Take the run state so the lock is not held across awaits.
        let Some(Running { scope, handle }) = self.running.lock().take() else {
            tracing::debug!("key rotator already stopped");
            return Err(KeyError::AlreadyStopped);
        };

        scope.token.cancel();
        if let Err(err) = handle.await {
            tracing::warn!(error = %err, "key rotation task panicked");
        }
        scope.tracker.close();
        scope.tracker.wait().await;

        tracing::info!(
            abandoned_retirements = self.abandoned_retirements(),
            "key rotator stopped"
        );
        Ok(())
    }

    /// Rotates immediately, outside the schedule.
    ///
    /// While running, the superseded key's retirement is scheduled exactly as
    /// for a scheduled rotation. While stopped, nothing is scheduled and the
    /// caller owns the superseded key's deletion.
    ///
    /// # Errors
    ///
    /// Returns the generation error if the rotation failed; the store is
    /// unchanged.
    pub async fn rotate_now(&self) -> KeyResult<Rotation> {
        let scope = self.running.lock().as_ref().map(|running| running.scope.clone());
        if scope.is_none() {
            tracing::debug!("manual rotation while stopped; superseded key will not be retired");
        }
        self.inner.rotate_once(scope.as_ref()).await
    }

    /// Returns `true` while the rotation task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Returns the number of successful rotations.
    #[must_use]
    pub fn rotations(&self) -> u64 {
        self.inner.rotations.load(Ordering::Relaxed)
    }

    /// Returns the number of failed rotation attempts.
    #[must_use]
    pub fn rotation_failures(&self) -> u64 {
        self.inner.rotation_failures.load(Ordering::Relaxed)
    }

    /// Returns the number of keys deleted after their grace period.
    #[must_use]
    pub fn retirements(&self) -> u64 {
        self.inner.retirements.load(Ordering::Relaxed)
    }

    /// Returns the number of retirements cancelled by [`stop`](Self::stop).
    #[must_use]
    pub fn abandoned_retirements(&self) -> u64 {
        self.inner.abandoned_retirements.load(Ordering::Relaxed)
    }

    /// Returns the number of retirements waiting out their grace period.
    #[must_use]
    pub fn pending_retirements(&self) -> usize {
        self.inner.pending_retirements.load(Ordering::Acquire)
    }

    /// Returns the configured rotation interval.
    #[must_use]
    pub fn rotation_interval(&self) -> Duration {
        self.inner.rotation_interval
    }

    /// Returns the configured grace period.
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        self.inner.grace_period
    }
}

impl Drop for KeyRotator {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.scope.token.cancel();
        }
    }
}

impl std::fmt::Debug for KeyRotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRotator")
            .field("running", &self.is_running())
            .field("rotation_interval", &self.inner.rotation_interval)
            .field("grace_period", &self.inner.grace_period)
            .field("rotations", &self.rotations())
            .field("pending_retirements", &self.pending_retirements())
            .finish()
    }
}

impl Inner {
    async fn run(inner: Arc<Self>, scope: Scope, first: Instant) {
        let mut ticker = tokio::time::interval_at(first, inner.rotation_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = scope.token.cancelled() => {
                    tracing::info!("key rotation task shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    // Failures are logged inside; the next tick is the retry.
                    let _ = inner.rotate_once(Some(&scope)).await;
                }
            }
        }
    }

    async fn rotate_once(self: &Arc<Self>, scope: Option<&Scope>) -> KeyResult<Rotation> {
        let _guard = self.rotate_lock.lock().await;
        let store = Arc::clone(&self.store);
        let generator = Arc::clone(&self.generator);
        let result = tokio::task::spawn_blocking(move || store.rotate(generator.as_ref()))
            .await
            .map_err(|e| KeyError::generation_with_source("key generation task failed", e))
            .and_then(|rotated| rotated);

        let rotation = match result {
            Ok(rotation) => rotation,
            Err(err) => {
                self.rotation_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(error = %err, "key rotation failed; retrying at next interval");
                return Err(err);
            },
        };

        self.rotations.fetch_add(1, Ordering::Relaxed);
        if let Some(register) = &self.register {
            register.store(Arc::clone(&rotation.current));
        }
        if let Some(scope) = scope {
            self.schedule_retirement(scope, rotation.previous.kid().to_owned());
        }
        Ok(rotation)
    }

    fn schedule_retirement(self: &Arc<Self>, scope: &Scope, kid: String) {
        let inner = Arc::clone(self);
        let token = scope.token.clone();
        let grace_period = self.grace_period;
        let deadline = Instant::now() + grace_period;
        let pending = PendingRetirement::new(Arc::clone(self));

        tracing::debug!(kid = %kid, grace_period = ?grace_period, "scheduled key retirement");

        scope.tracker.spawn(async move {
            let _pending = pending;
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    inner.abandoned_retirements.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(kid = %kid, "key retirement abandoned on shutdown; key retained");
                }
                _ = tokio::time::sleep_until(deadline) => inner.retire(&kid),
            }
        });
    }

    fn retire(&self, kid: &str) {
        match self.store.delete(kid) {
            Ok(()) => {
                self.retirements.fetch_add(1, Ordering::Relaxed);
            },
            Err(err) => {
                tracing::warn!(kid, error = %err, "key retirement failed");
            },
        }
    }
}

/// Counts a retirement as pending until its task finishes or is dropped.
struct PendingRetirement(Arc<Inner>);

impl PendingRetirement {
    fn new(inner: Arc<Inner>) -> Self {
        inner.pending_retirements.fetch_add(1, Ordering::AcqRel);
        Self(inner)
    }
}

impl Drop for PendingRetirement {
    fn drop(&mut self) {
        self.0.pending_retirements.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::testutil::{
        FailingGenerator, FlakyGenerator, TEST_ROTATION_INTERVAL, settle, test_config,
        test_generator, test_store, wait_until,
    };

    const INTERVAL: Duration = TEST_ROTATION_INTERVAL;

    fn grace() -> Duration {
        test_config().grace_period()
    }

    fn rotator(store: &Arc<KeyStore>, generator: Arc<dyn KeyGenerator>) -> KeyRotator {
        KeyRotator::builder()
            .store(Arc::clone(store))
            .generator(generator)
            .rotation_interval(INTERVAL)
            .grace_period(grace())
            .build()
            .unwrap()
    }

    // ── construction ────────────────────────────────────────────────

    #[test]
    fn test_zero_interval_rejected() {
        let (store, generator) = test_store();
        let err = KeyRotator::builder()
            .store(store)
            .generator(generator)
            .rotation_interval(Duration::ZERO)
            .grace_period(Duration::from_secs(1))
            .build()
            .unwrap_err();
        assert!(matches!(err, KeyError::Configuration { .. }));
    }

    #[test]
    fn test_register_seeded_on_build() {
        let (store, generator) = test_store();
        let register = Arc::new(CurrentKey::new());
        let _rotator = KeyRotator::builder()
            .store(Arc::clone(&store))
            .generator(generator)
            .rotation_interval(INTERVAL)
            .grace_period(grace())
            .register(Arc::clone(&register))
            .build()
            .unwrap();

        assert_eq!(register.load().unwrap().kid(), store.current().kid());
    }

    // ── start / stop state machine ──────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_spawns_one_task() {
        let (store, generator) = test_store();
        let rotator = rotator(&store, generator);

        rotator.start().unwrap();
        assert!(matches!(rotator.start(), Err(KeyError::AlreadyStarted)));
        assert!(rotator.is_running());

        tokio::time::advance(INTERVAL).await;
        wait_until(|| rotator.rotations() == 1).await;
        settle().await;

        assert_eq!(rotator.rotations(), 1, "a second task would have rotated twice");
        assert_eq!(store.len(), 2);
        rotator.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_when_stopped() {
        let (store, generator) = test_store();
        let rotator = rotator(&store, generator);

        assert!(matches!(rotator.stop().await, Err(KeyError::AlreadyStopped)));

        rotator.start().unwrap();
        rotator.stop().await.unwrap();
        assert!(!rotator.is_running());
        assert!(matches!(rotator.stop().await, Err(KeyError::AlreadyStopped)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let (store, generator) = test_store();
        let rotator = rotator(&store, generator);

        rotator.start().unwrap();
        rotator.stop().await.unwrap();
        rotator.start().unwrap();

        tokio::time::advance(INTERVAL).await;
        wait_until(|| rotator.rotations() == 1).await;
        rotator.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_rotation_before_first_interval() {
        let (store, generator) = test_store();
        let rotator = rotator(&store, generator);

        rotator.start().unwrap();
        tokio::time::advance(INTERVAL - Duration::from_millis(1)).await;
        settle().await;

        assert_eq!(rotator.rotations(), 0);
        assert_eq!(store.len(), 1);
        rotator.stop().await.unwrap();
    }

    // ── retirement ──────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_superseded_key_retired_after_grace() {
        let (store, generator) = test_store();
        let original = store.current();
        let rotator = rotator(&store, generator);

        rotator.start().unwrap();
        tokio::time::advance(INTERVAL).await;
        wait_until(|| rotator.rotations() == 1).await;
        let current = store.current();
        assert_eq!(rotator.pending_retirements(), 1);

        // Still verifiable during the grace period.
        tokio::time::advance(grace() - Duration::from_millis(1)).await;
        settle().await;
        assert!(store.contains(original.kid()));

        tokio::time::advance(Duration::from_millis(1)).await;
        wait_until(|| !store.contains(original.kid())).await;

        assert!(matches!(store.delete(original.kid()), Err(KeyError::NotFound { .. })));
        assert_eq!(store.current().kid(), current.kid());
        assert_eq!(rotator.retirements(), 1);
        assert_eq!(rotator.pending_retirements(), 0);
        rotator.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_abandons_pending_retirement() {
        let (store, generator) = test_store();
        let original = store.current();
        let rotator = rotator(&store, generator);

        rotator.start().unwrap();
        tokio::time::advance(INTERVAL).await;
        wait_until(|| rotator.rotations() == 1).await;

        rotator.stop().await.unwrap();
        assert_eq!(rotator.abandoned_retirements(), 1);
        assert_eq!(rotator.pending_retirements(), 0);

        tokio::time::advance(grace() * 2).await;
        settle().await;

        assert!(store.contains(original.kid()), "abandoned retirement must not delete");
        assert_eq!(rotator.retirements(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_retirement_tracks_its_own_key() {
        let (store, generator) = test_store();
        let first = store.current();
        let rotator = rotator(&store, generator);
        rotator.start().unwrap();

        let second = rotator.rotate_now().await.unwrap().current;
        let _third = rotator.rotate_now().await.unwrap().current;
        assert_eq!(rotator.pending_retirements(), 2);

        tokio::time::advance(grace()).await;
        wait_until(|| rotator.retirements() == 2).await;

        assert!(!store.contains(first.kid()));
        assert!(!store.contains(second.kid()));
        assert_eq!(store.len(), 1);
        rotator.stop().await.unwrap();
    }

    // ── failures and manual rotation ────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_failed_rotation_retries_next_tick() {
        let (store, _) = test_store();
        let original = store.current();
        let flaky = Arc::new(FlakyGenerator::new(test_generator(), 1));
        let rotator = rotator(&store, Arc::clone(&flaky) as Arc<dyn KeyGenerator>);

        rotator.start().unwrap();
        tokio::time::advance(INTERVAL).await;
        wait_until(|| rotator.rotation_failures() == 1).await;
        assert_eq!(store.current().kid(), original.kid());
        assert!(rotator.is_running());

        tokio::time::advance(INTERVAL).await;
        wait_until(|| rotator.rotations() == 1).await;
        assert_ne!(store.current().kid(), original.kid());
        assert_eq!(flaky.calls(), 2);
        rotator.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_rotate_now_while_stopped_schedules_nothing() {
        let (store, generator) = test_store();
        let rotator = rotator(&store, generator);

        let rotation = rotator.rotate_now().await.unwrap();

        assert_eq!(store.current().kid(), rotation.current.kid());
        assert!(store.contains(rotation.previous.kid()));
        assert_eq!(rotator.pending_retirements(), 0);
    }

    #[tokio::test]
    async fn test_rotate_now_reports_failure() {
        let (store, _) = test_store();
        let rotator = rotator(&store, Arc::new(FailingGenerator::default()));

        let err = rotator.rotate_now().await.unwrap_err();
        assert!(matches!(err, KeyError::Generation { .. }));
        assert_eq!(rotator.rotation_failures(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_rotation_publishes_to_register() {
        let (store, generator) = test_store();
        let register = Arc::new(CurrentKey::new());
        let rotator = KeyRotator::builder()
            .store(Arc::clone(&store))
            .generator(generator)
            .rotation_interval(INTERVAL)
            .grace_period(grace())
            .register(Arc::clone(&register))
            .build()
            .unwrap();

        let rotation = rotator.rotate_now().await.unwrap();
        assert!(Arc::ptr_eq(&register.load().unwrap(), &rotation.current));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_rotations_keep_register_in_step() {
        let (store, generator) = test_store();
        let register = Arc::new(CurrentKey::new());
        let rotator = KeyRotator::builder()
            .store(Arc::clone(&store))
            .generator(generator)
            .rotation_interval(INTERVAL)
            .grace_period(grace())
            .register(Arc::clone(&register))
            .build()
            .unwrap();

        for round in 0..100 {
            let (a, b, c) =
                tokio::join!(rotator.rotate_now(), rotator.rotate_now(), rotator.rotate_now());
            a.unwrap();
            b.unwrap();
            c.unwrap();
            assert_eq!(
                register.load().unwrap().kid(),
                store.current().kid(),
                "register lagged the store in round {round}"
            );
        }
        assert_eq!(rotator.rotations(), 300);
    }

    // ── shutdown ────────────────────────────────────────────────────

    #[test]
    fn test_pending_count_released_when_runtime_drops() {
        let (store, generator) = test_store();
        let original = store.current();
        let rotator = rotator(&store, generator);
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();

        runtime.block_on(async {
            rotator.start().unwrap();
            rotator.rotate_now().await.unwrap();
        });
        assert_eq!(rotator.pending_retirements(), 1);

        drop(runtime);
        assert_eq!(rotator.pending_retirements(), 0);
        assert_eq!(rotator.retirements(), 0);
        assert!(store.contains(original.kid()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_scope() {
        let (store, generator) = test_store();
        let original = store.current();
        {
            let rotator = rotator(&store, generator);
            rotator.start().unwrap();
            rotator.rotate_now().await.unwrap();
        }

        tokio::time::advance(grace() * 2).await;
        settle().await;
        assert!(store.contains(original.kid()));
    }
}
