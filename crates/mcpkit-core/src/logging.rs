//! Internal logging conventions for mcpkit.
//!
//! The SDK logs through the [`tracing`] facade and never installs a
//! subscriber. Applications pick their own backend (for example
//! `tracing-subscriber`).
//!
//! Note that this is unrelated to the MCP *protocol* logging feature
//! (`notifications/message`), which is part of the schema and flows over
//! the wire.
//!
//! # Log Targets
//!
//! mcpkit uses hierarchical targets for filtering:
//!
//! - `mcpkit`: root target
//! - `mcpkit::session`: request correlation and dispatch
//! - `mcpkit::transport`: framing and wire I/O
//! - `mcpkit::client`: client role lifecycle and fan-out
//! - `mcpkit::server`: server role lifecycle and registries
//!
//! Example filter: `RUST_LOG=mcpkit::session=debug,mcpkit::transport=trace`

/// Log targets used by mcpkit components.
///
/// Use these constants with the `target:` argument to `tracing` macros
/// for consistent filtering.
pub mod targets {
    /// Root target for all mcpkit logs.
    pub const MCPKIT: &str = "mcpkit";

    /// Session layer: request correlation, handler dispatch.
    pub const SESSION: &str = "mcpkit::session";

    /// Transport layer: stdio, SSE, in-memory.
    pub const TRANSPORT: &str = "mcpkit::transport";

    /// Client role: initialization, typed operations, change fan-out.
    pub const CLIENT: &str = "mcpkit::client";

    /// Server role: registries, request handling, notifications.
    pub const SERVER: &str = "mcpkit::server";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_are_hierarchical() {
        assert!(targets::SESSION.starts_with(targets::MCPKIT));
        assert!(targets::TRANSPORT.starts_with(targets::MCPKIT));
        assert!(targets::CLIENT.starts_with(targets::MCPKIT));
        assert!(targets::SERVER.starts_with(targets::MCPKIT));
    }
}
