//! Redraw signaling toward the renderer collaborator
//!
//! The core never pushes drawing primitives anywhere. When the model
//! changes in a way a map should reflect, it flips a shared dirty flag;
//! the renderer polls the flag, and when set, pulls current station state
//! through the registry's iteration interface. Reasons are logged at
//! trace level for diagnostics only.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::trace;

/// Shared "needs redraw" signal
///
/// Cheap to clone behind an `Arc` and safe to touch from any task.
#[derive(Debug, Default)]
pub struct RedrawSignal {
    dirty: AtomicBool,
    bounds_changed: AtomicBool,
}

impl RedrawSignal {
    /// Create a clean signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark that a redraw is needed
    pub fn mark(&self, reason: &str) {
        trace!(reason, "redraw needed");
        self.dirty.store(true, Ordering::Relaxed);
    }

    /// Mark that a station position changed, so the viewport bounds
    /// should be recomputed before the next redraw
    pub fn mark_bounds(&self, reason: &str) {
        self.bounds_changed.store(true, Ordering::Relaxed);
        self.mark(reason);
    }

    /// Check the dirty flag without clearing it
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Relaxed)
    }

    /// Consume the dirty flag, returning whether a redraw was pending
    pub fn take(&self) -> bool {
        self.dirty.swap(false, Ordering::Relaxed)
    }

    /// Consume the bounds-changed flag
    pub fn take_bounds(&self) -> bool {
        self.bounds_changed.swap(false, Ordering::Relaxed)
    }
}
