//! Single-slot job registry
//!
//! The external encoder is a serially-reusable resource: exactly one encode
//! job may run at a time, process-wide. The registry owns that slot
//! explicitly so the "second export while running" policy (reject) stays
//! auditable, and it hands out the cancellation flag for the active job.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{VmuxError, VmuxResult};

/// Cooperative cancellation flag for one job
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Owner of the single encode slot
#[derive(Debug, Default)]
pub struct JobRegistry {
    active: Mutex<Option<CancelToken>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for a new job. Fails with [`VmuxError::JobBusy`] when
    /// another job holds it; the caller must cancel that job first.
    pub fn try_acquire(self: &Arc<Self>) -> VmuxResult<JobGuard> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.is_some() {
            return Err(VmuxError::JobBusy);
        }
        let token = CancelToken::new();
        *active = Some(token.clone());
        Ok(JobGuard {
            registry: Arc::clone(self),
            token,
        })
    }

    /// Request cancellation of the active job, if any. Returns whether a
    /// job was flagged.
    pub fn cancel_active(&self) -> bool {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        match active.as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

/// RAII claim on the encode slot; releases it on drop
pub struct JobGuard {
    registry: Arc<JobRegistry>,
    token: CancelToken,
}

impl JobGuard {
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        let mut active = self
            .registry
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_rejected_while_busy() {
        let registry = Arc::new(JobRegistry::new());
        let guard = registry.try_acquire().unwrap();
        assert!(registry.is_busy());
        assert!(matches!(registry.try_acquire(), Err(VmuxError::JobBusy)));
        drop(guard);
        assert!(!registry.is_busy());
        assert!(registry.try_acquire().is_ok());
    }

    #[test]
    fn test_cancel_active_flags_the_running_job() {
        let registry = Arc::new(JobRegistry::new());
        assert!(!registry.cancel_active());

        let guard = registry.try_acquire().unwrap();
        let token = guard.token();
        assert!(!token.is_cancelled());
        assert!(registry.cancel_active());
        assert!(token.is_cancelled());
    }
}
