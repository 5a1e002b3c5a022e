// ABOUTME: Single-flight guard serialising builds, deploys, stops, and resets.
// ABOUTME: Holder info is kept beside the lock so a rejected caller can see who is running.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

/// Who holds the guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardInfo {
    pub operation: String,
    pub started_at: DateTime<Utc>,
}

impl GuardInfo {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            started_at: Utc::now(),
        }
    }
}

#[derive(Default)]
struct GuardInner {
    lock: Arc<tokio::sync::Mutex<()>>,
    holder: Mutex<Option<GuardInfo>>,
}

#[derive(Clone, Default)]
pub struct DeployGuard {
    inner: Arc<GuardInner>,
}

impl DeployGuard {
    /// Take the guard if it is free. On failure, returns the current holder
    /// if it is still known.
    pub fn try_acquire(&self, info: GuardInfo) -> Result<GuardToken, Option<GuardInfo>> {
        match self.inner.lock.clone().try_lock_owned() {
            Ok(permit) => Ok(self.install(permit, info)),
            Err(_) => Err(self.holder()),
        }
    }

    /// Wait for the guard.
    pub async fn acquire(&self, info: GuardInfo) -> GuardToken {
        let permit = self.inner.lock.clone().lock_owned().await;
        self.install(permit, info)
    }

    pub fn holder(&self) -> Option<GuardInfo> {
        self.inner.holder.lock().clone()
    }

    fn install(&self, permit: OwnedMutexGuard<()>, info: GuardInfo) -> GuardToken {
        *self.inner.holder.lock() = Some(info);
        GuardToken {
            inner: self.inner.clone(),
            _permit: permit,
        }
    }
}

/// Proof of holding the guard; released on drop.
pub struct GuardToken {
    inner: Arc<GuardInner>,
    _permit: OwnedMutexGuard<()>,
}

impl Drop for GuardToken {
    fn drop(&mut self) {
        self.inner.holder.lock().take();
    }
}

impl std::fmt::Debug for GuardToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardToken")
            .field("holder", &*self.inner.holder.lock())
            .finish()
    }
}
