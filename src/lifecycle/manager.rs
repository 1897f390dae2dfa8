//! Lock ownership and slot-boundary handoff.

use std::sync::Arc;

use tracing::{info, warn};

use super::launcher::ProcessLauncher;
use super::lock::ExclusivityLock;
use crate::error::LifecycleError;
use crate::market::SlotChange;
use crate::metrics;

/// Owns the exclusivity lock and replaces the process at slot boundaries.
pub struct LifecycleManager {
    lock: Arc<dyn ExclusivityLock>,
    launcher: Arc<dyn ProcessLauncher>,
}

impl LifecycleManager {
    /// Manager over an injected lock and launcher.
    pub fn new(lock: Arc<dyn ExclusivityLock>, launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self { lock, launcher }
    }

    /// Take the lock at startup.
    pub fn acquire(&self) -> Result<(), LifecycleError> {
        self.lock.acquire()
    }

    /// Release the lock, then start the replacement process.
    ///
    /// The caller exits with success once this returns `Ok`. The replacement
    /// can only acquire the lock because it is released first.
    pub fn hand_off(&self, change: &SlotChange) -> Result<u32, LifecycleError> {
        info!(from = %change.from, to = %change.to, "Handing off to replacement process");
        self.lock.release()?;

        let pid = self.launcher.launch()?;
        metrics::inc_handoffs();
        info!(pid, to = %change.to, "Handoff complete");
        Ok(pid)
    }

    /// Release the lock on graceful shutdown.
    pub fn shutdown(&self) {
        if let Err(e) = self.lock.release() {
            warn!(error = %e, "Failed to release lock on shutdown");
        }
    }
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager").finish_non_exhaustive()
    }
}
