//! Re-entrancy guard for applying remote patches.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Shared counter of remote patches currently being applied.
///
/// While any [`ApplyScope`] is alive, outgoing sync is suppressed so that
/// state derived from a remote patch is not echoed back.
#[derive(Debug, Clone, Default)]
pub struct SyncGuard {
    depth: Arc<AtomicUsize>,
    settled: Arc<Notify>,
}

impl SyncGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> ApplyScope {
        self.depth.fetch_add(1, Ordering::SeqCst);
        ApplyScope {
            depth: Arc::clone(&self.depth),
            settled: Arc::clone(&self.settled),
        }
    }

    pub fn is_applying(&self) -> bool {
        self.depth.load(Ordering::SeqCst) > 0
    }

    /// Resolves once no scope is held; immediately if none is.
    pub async fn settled(&self) {
        loop {
            let notified = self.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_applying() {
                return;
            }
            notified.await;
        }
    }
}

/// Held while a remote patch and its follow-up effects settle.
#[must_use = "dropping the scope releases the guard immediately"]
#[derive(Debug)]
pub struct ApplyScope {
    depth: Arc<AtomicUsize>,
    settled: Arc<Notify>,
}

impl ApplyScope {
    pub fn release(self) {}

    /// Releases the guard after `delay` on the current tokio runtime.
    pub fn release_after(self, delay: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            drop(self);
        })
    }
}

impl Drop for ApplyScope {
    fn drop(&mut self) {
        if self.depth.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.settled.notify_waiters();
        }
    }
}
