//! Cooperative cancellation (spec.md §5): the VM is single-threaded, but the
//! host may request cancellation from another thread (a timeout watchdog, a
//! UI cancel button), so the flag itself is the one `Arc`/atomic in an
//! otherwise `Rc`-based runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
