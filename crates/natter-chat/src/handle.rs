//! A cloneable handle for interrupting the controller from external code.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio_util::sync::CancellationToken;

/// A cloneable handle for interrupting the controller from external code.
///
/// All fields are `Arc`-wrapped, so cloning is cheap. Each generation gets a
/// fresh token, so an abort only ever stops the generation in flight.
#[derive(Clone)]
pub struct ControllerHandle {
    pub(crate) cancel: Arc<Mutex<CancellationToken>>,
    pub(crate) is_generating: Arc<AtomicBool>,
}

impl ControllerHandle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            is_generating: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop the current generation. The partial answer is kept.
    pub fn abort(&self) {
        self.cancel.lock().cancel();
    }

    /// Whether an answer is currently streaming.
    pub fn is_generating(&self) -> bool {
        self.is_generating.load(Ordering::Acquire)
    }

    /// Install a fresh token for a new generation and return it.
    pub(crate) fn begin_generation(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        self.is_generating.store(true, Ordering::Release);
        token
    }

    pub(crate) fn end_generation(&self) {
        self.is_generating.store(false, Ordering::Release);
    }
}
