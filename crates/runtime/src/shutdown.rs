//! Process-wide shutdown coordination.
//!
//! One atomic flag behind a cloneable handle, passed explicitly to every
//! spawned thread. Signal handlers do nothing except flip the flag; the
//! join-and-unload sequence runs on the main thread once the flag is
//! observed.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use signal_hook::consts::{SIGINT, SIGTERM};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ShutdownContext {
    requested: Arc<AtomicBool>,
}

impl ShutdownContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// False once shutdown has been requested.
    pub fn is_running(&self) -> bool {
        !self.requested.load(Ordering::SeqCst)
    }

    /// Flip the flag. Safe from any thread, any number of times.
    pub fn request_shutdown(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Wire SIGINT/SIGTERM to the flag. The handler performs no other work.
    pub fn register_signals(&self) -> io::Result<()> {
        for signal in [SIGINT, SIGTERM] {
            signal_hook::flag::register(signal, Arc::clone(&self.requested))?;
        }
        debug!("signal handlers registered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_running() {
        let ctx = ShutdownContext::new();
        assert!(ctx.is_running());
    }

    #[test]
    fn test_request_shutdown_is_idempotent() {
        let ctx = ShutdownContext::new();
        ctx.request_shutdown();
        ctx.request_shutdown();
        assert!(!ctx.is_running());
    }

    #[test]
    fn test_clones_share_the_flag() {
        let ctx = ShutdownContext::new();
        let clone = ctx.clone();
        clone.request_shutdown();
        assert!(!ctx.is_running());
    }
}
