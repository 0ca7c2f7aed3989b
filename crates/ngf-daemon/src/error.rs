//! Error types for the feedback daemon.
//!
//! [`DaemonError`] wraps every failure that can stop the daemon: bad
//! configuration, an unreachable bus, or losing the race for the
//! well-known service name. Per-request failures never become a
//! `DaemonError`; they are logged and answered on the bus instead.

/// Top-level error for the feedback daemon binary.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ngf_core::config::ConfigError,
    },

    /// Failed to connect to or communicate with the NATS server.
    #[error("NATS error: {0}")]
    Nats(String),

    /// The well-known service name could not be claimed.
    #[error("could not acquire service name {name}: {reason}")]
    NameAcquisition {
        /// The name that was requested.
        name: String,
        /// Why the claim failed.
        reason: String,
    },
}
