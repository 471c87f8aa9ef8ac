//! Distributed Lock Module
//!
//! Mutual exclusion on top of a provider's conditional writes. The lock record
//! holds a per-handle UUID token and expires after the lease, so a crashed
//! holder cannot block others forever.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::error::{CacheError, Result};
use crate::providers::{AtomicSupport, Provider};

/// Pause between two attempts in [`DistributedLock::acquire`].
pub const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

// == Lock Outcome ==
/// Result of one acquisition attempt. Contention is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Acquired,
    /// Another holder owns a live lock record
    Contended,
}

impl LockOutcome {
    pub fn is_acquired(&self) -> bool {
        matches!(self, LockOutcome::Acquired)
    }
}

// == Distributed Lock ==
/// A lock handle bound to one token.
pub struct DistributedLock {
    provider: Arc<dyn Provider>,
    key: String,
    token: Value,
    lease: Duration,
}

impl DistributedLock {
    /// # Arguments
    /// * `provider` - Backend holding the lock record; must offer conditional writes
    /// * `key` - Full provider key of the lock record
    /// * `lease` - Lifetime of the record once acquired or refreshed
    pub fn new(provider: Arc<dyn Provider>, key: String, lease: Duration) -> Result<Self> {
        if provider.atomic().is_none() {
            return Err(CacheError::Unsupported(format!(
                "{} provider cannot hold locks",
                provider.name()
            )));
        }
        if lease.is_zero() {
            return Err(CacheError::Operation("lock lease must be positive".to_string()));
        }

        Ok(Self {
            provider,
            key,
            token: Value::String(Uuid::new_v4().to_string()),
            lease,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Token written into the lock record while this handle holds it.
    pub fn token(&self) -> &str {
        self.token.as_str().unwrap_or_default()
    }

    pub fn lease(&self) -> Duration {
        self.lease
    }

    fn atomic(&self) -> Result<&dyn AtomicSupport> {
        self.provider.atomic().ok_or_else(|| {
            CacheError::Unsupported(format!("{} provider cannot hold locks", self.provider.name()))
        })
    }

    // == Lock ==
    /// One attempt: succeeds only if no live record exists.
    pub async fn lock(&self) -> Result<LockOutcome> {
        let acquired = self
            .atomic()?
            .set_if_absent(&self.key, self.token.clone(), self.lease)
            .await?;

        if acquired {
            debug!(key = %self.key, "Lock acquired");
            Ok(LockOutcome::Acquired)
        } else {
            Ok(LockOutcome::Contended)
        }
    }

    // == Acquire ==
    /// Retries [`lock`](Self::lock) every [`LOCK_RETRY_INTERVAL`] until it
    /// succeeds or `wait` has elapsed. A `wait` past the clock's range
    /// retries until the lock is acquired.
    pub async fn acquire(&self, wait: Duration) -> Result<LockOutcome> {
        let deadline = Instant::now().checked_add(wait);
        loop {
            if self.lock().await?.is_acquired() {
                return Ok(LockOutcome::Acquired);
            }

            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(LockOutcome::Contended);
                    }
                    LOCK_RETRY_INTERVAL.min(deadline - now)
                }
                None => LOCK_RETRY_INTERVAL,
            };
            tokio::time::sleep(pause).await;
        }
    }

    // == Unlock ==
    /// Releases the lock if this handle still holds it.
    pub async fn unlock(&self) -> Result<bool> {
        let released = self
            .atomic()?
            .delete_if_equals(&self.key, &self.token)
            .await?;
        if released {
            debug!(key = %self.key, "Lock released");
        }
        Ok(released)
    }

    // == Refresh ==
    /// Restarts the lease if this handle still holds the lock.
    pub async fn refresh(&self) -> Result<bool> {
        self.atomic()?
            .expire_if_equals(&self.key, &self.token, self.lease)
            .await
    }
}
