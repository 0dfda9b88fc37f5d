//! Error taxonomy shared by every component.
//!
//! Components return these up to `main`, which alone decides the exit code.

use thiserror::Error;

/// Errors raised while monitoring power or driving the shutdown.
#[derive(Error, Debug)]
pub enum PowerError {
    /// The UPS could not be queried (unreachable, SNMP engine error).
    #[error("UPS {appliance} query failed: {reason}")]
    UpsQuery {
        /// UPS address
        appliance: String,
        /// Transport or agent error text
        reason: String,
    },

    /// The UPS answered with a value outside the expected range.
    #[error("UPS {appliance} returned unexpected value for {oid}: {value:?}")]
    UpsResponse {
        /// UPS address
        appliance: String,
        /// Queried OID
        oid: String,
        /// Raw value as returned
        value: String,
    },

    /// The virtualization API rejected a request.
    #[error("virtualization API error: {0}")]
    Virt(String),

    /// HTTP transport failure.
    #[error("HTTP error: {source}")]
    Http {
        /// Source reqwest error
        #[from]
        source: reqwest::Error,
    },

    /// An external command could not run or exited non-zero.
    #[error("command `{command}` failed: {reason}")]
    Command {
        /// Command line, space-joined
        command: String,
        /// Exit status or stderr
        reason: String,
    },

    /// Configuration missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Webhook delivery failed.
    #[error("notification failed: {0}")]
    Notify(String),
}

/// Result alias for power/shutdown operations.
pub type PowerResult<T> = Result<T, PowerError>;
