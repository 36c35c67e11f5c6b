// ── Session guard ──
//
// The facade's shared mutable state: the initialization and shutdown
// latches, the single-flight collection flag, the discovery-in-progress flag
// and the current backend authority. Each flag is a single atomic, owned here and
// shared by `Arc` with the components that read it.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use tillbridge_api::BackendKind;

use crate::error::CoreError;

#[derive(Debug, Default)]
pub struct SessionState {
    initialized: AtomicBool,
    closed: AtomicBool,
    collecting: AtomicBool,
    discovering: AtomicBool,
    web_selected: AtomicBool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Initialization ───────────────────────────────────────────────

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub(crate) fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Fails with `NotInitialized` until `mark_initialized` has run, and with
    /// `ShutDown` once `mark_closed` has.
    pub fn ensure_initialized(&self) -> Result<(), CoreError> {
        if self.is_closed() {
            Err(CoreError::ShutDown)
        } else if self.is_initialized() {
            Ok(())
        } else {
            Err(CoreError::NotInitialized)
        }
    }

    // ── Payment collection ───────────────────────────────────────────

    pub fn is_collecting(&self) -> bool {
        self.collecting.load(Ordering::Acquire)
    }

    /// Claim the collection slot. `None` if another collection holds it.
    pub fn try_begin_collect(&self) -> Option<CollectGuard<'_>> {
        self.collecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CollectGuard { state: self })
    }

    // ── Discovery ────────────────────────────────────────────────────

    pub fn is_discovering(&self) -> bool {
        self.discovering.load(Ordering::Acquire)
    }

    pub(crate) fn set_discovering(&self, discovering: bool) {
        self.discovering.store(discovering, Ordering::Release);
    }

    // ── Backend authority ────────────────────────────────────────────

    /// The backend most recently pinned.
    pub fn selected(&self) -> BackendKind {
        if self.web_selected.load(Ordering::Acquire) {
            BackendKind::Web
        } else {
            BackendKind::Native
        }
    }

    pub(crate) fn select(&self, kind: BackendKind) {
        let previous = self
            .web_selected
            .swap(kind == BackendKind::Web, Ordering::AcqRel);
        if previous != (kind == BackendKind::Web) {
            debug!(backend = %kind, "backend authority changed");
        }
    }
}

/// Holds the collection slot; releasing it on drop covers every exit path,
/// including cancellation of the owning future.
#[derive(Debug)]
pub struct CollectGuard<'a> {
    state: &'a SessionState,
}

impl Drop for CollectGuard<'_> {
    fn drop(&mut self) {
        self.state.collecting.store(false, Ordering::Release);
    }
}
