//! Minimal runtime helpers for mcpkit.
//!
//! This module provides the small `block_on` utility used by the
//! synchronous client and server façades to drive their async
//! counterparts to completion.

use std::future::Future;
use std::sync::OnceLock;

static RUNTIME: OnceLock<tokio::runtime::Runtime> = OnceLock::new();

/// Blocks the current thread on the provided future.
///
/// Uses a lazily initialized multi-thread tokio runtime shared by all
/// callers. Must not be called from within an async context; it exists so
/// that fully synchronous applications can use the sync façades without
/// owning a runtime.
pub fn block_on<F: Future>(future: F) -> F::Output {
    let runtime = RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("failed to build mcpkit runtime")
    });

    runtime.block_on(future)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_on_returns_value() {
        let value = block_on(async { 41 + 1 });
        assert_eq!(value, 42);
    }

    #[test]
    fn block_on_supports_timers() {
        let value = block_on(async {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            "done"
        });
        assert_eq!(value, "done");
    }
}
