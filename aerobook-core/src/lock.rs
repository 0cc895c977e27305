//! Named, time-bounded mutual exclusion.
//!
//! The booking core never talks to a lock backend directly. It receives a
//! [`LockProvider`] at construction and asks it for a lock named after the
//! flight (`flight:{id}`). Holding the returned [`LockHandle`] means holding the
//! lock; releasing it, or dropping it, gives the lock back.
//!
//! [`LocalLockProvider`] serializes callers inside one process. The Redis-backed
//! provider in `aerobook-store` does the same across processes.

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::{BookingError, BookingResult, LockError};

/// Backend-specific part of a held lock.
pub trait LockLease: Send + Sync + 'static {
    /// Gives the lock back. Work that can be done synchronously must happen
    /// before the returned future is created; the future may run in the background.
    fn release(self: Box<Self>) -> BoxFuture<'static, Result<(), LockError>>;
}

/// A held lock. Released exactly once: by [`LockHandle::release`] or on drop.
pub struct LockHandle {
    name: String,
    lease: Option<Box<dyn LockLease>>,
}

impl LockHandle {
    pub fn new(name: impl Into<String>, lease: Box<dyn LockLease>) -> Self {
        Self {
            name: name.into(),
            lease: Some(lease),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn release(mut self) -> Result<(), LockError> {
        match self.lease.take() {
            Some(lease) => lease.release().await,
            None => Ok(()),
        }
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        let Some(lease) = self.lease.take() else {
            return;
        };
        let release = lease.release();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let name = self.name.clone();
                runtime.spawn(async move {
                    if let Err(e) = release.await {
                        warn!(lock = %name, error = %e, "Background lock release failed");
                    }
                });
            }
            Err(_) => {
                warn!(lock = %self.name, "Lock handle dropped outside a runtime; relying on lease expiry");
            }
        }
    }
}

impl fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockHandle")
            .field("name", &self.name)
            .field("held", &self.lease.is_some())
            .finish()
    }
}

#[async_trait]
pub trait DistributedLock: Send + Sync {
    fn name(&self) -> &str;

    /// Waits up to `timeout` for the lock. `Ok(None)` means it was not granted in time.
    ///
    /// Dropping the returned future abandons the attempt without taking the lock.
    async fn try_acquire(&self, timeout: Duration) -> Result<Option<LockHandle>, LockError>;
}

pub trait LockProvider: Send + Sync {
    fn create_lock(&self, name: &str) -> Box<dyn DistributedLock>;
}

pub fn flight_lock_name(flight_id: Uuid) -> String {
    format!("flight:{flight_id}")
}

/// Acquires the lock scoped to one flight.
///
/// Not being granted the lock in time and a failing lock backend both surface
/// as `LockUnavailable`, which callers may retry.
pub async fn acquire_flight_lock(
    locks: &dyn LockProvider,
    flight_id: Uuid,
    timeout: Duration,
) -> BookingResult<LockHandle> {
    let lock = locks.create_lock(&flight_lock_name(flight_id));
    match lock.try_acquire(timeout).await {
        Ok(Some(handle)) => Ok(handle),
        Ok(None) => {
            warn!(lock = lock.name(), ?timeout, "Flight lock not granted in time");
            Err(BookingError::LockUnavailable(flight_id))
        }
        Err(e) => {
            error!(lock = lock.name(), error = %e, "Lock backend failed");
            Err(BookingError::LockUnavailable(flight_id))
        }
    }
}

/// Runs `critical` while holding the flight lock and releases the lock on every exit path.
///
/// `critical` is not polled before the lock is held.
pub async fn with_flight_lock<T, F>(
    locks: &dyn LockProvider,
    flight_id: Uuid,
    timeout: Duration,
    critical: F,
) -> BookingResult<T>
where
    F: Future<Output = BookingResult<T>>,
{
    let handle = acquire_flight_lock(locks, flight_id, timeout).await?;
    let outcome = critical.await;
    let name = handle.name().to_string();
    if let Err(e) = handle.release().await {
        warn!(lock = %name, error = %e, "Failed to release flight lock; lease will expire");
    }
    outcome
}

const PRUNE_THRESHOLD: usize = 1024;

/// In-process lock provider: one async mutex per lock name.
///
/// Suitable for a single instance and for tests. It does not protect against
/// other processes.
#[derive(Clone, Default)]
pub struct LocalLockProvider {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl LocalLockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, name: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if locks.len() > PRUNE_THRESHOLD {
            // Only the map references these; nobody holds or waits on them.
            locks.retain(|_, m| Arc::strong_count(m) > 1);
        }
        locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// True while some caller holds the named lock.
    pub fn is_held(&self, name: &str) -> bool {
        self.entry(name).try_lock().is_err()
    }
}

impl LockProvider for LocalLockProvider {
    fn create_lock(&self, name: &str) -> Box<dyn DistributedLock> {
        Box::new(LocalLock {
            name: name.to_string(),
            mutex: self.entry(name),
        })
    }
}

struct LocalLock {
    name: String,
    mutex: Arc<AsyncMutex<()>>,
}

#[async_trait]
impl DistributedLock for LocalLock {
    fn name(&self) -> &str {
        &self.name
    }

    async fn try_acquire(&self, timeout: Duration) -> Result<Option<LockHandle>, LockError> {
        match tokio::time::timeout(timeout, self.mutex.clone().lock_owned()).await {
            Ok(guard) => Ok(Some(LockHandle::new(
                self.name.clone(),
                Box::new(LocalLease { _guard: guard }),
            ))),
            Err(_) => Ok(None),
        }
    }
}

struct LocalLease {
    _guard: OwnedMutexGuard<()>,
}

impl LockLease for LocalLease {
    fn release(self: Box<Self>) -> BoxFuture<'static, Result<(), LockError>> {
        drop(self);
        Box::pin(async { Ok(()) })
    }
}
