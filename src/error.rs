//! Error taxonomy for the Homebrew bridge core.
//!
//! Library code returns [`Error`] via `Result<T, Error>`. The binary crate
//! wraps this (and anything else that can fail during startup) in
//! `anyhow::Result` at the CLI boundary.

use thiserror::Error;

/// Every failure mode the core can report, per the error handling design.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller passed a malformed argument (wrong length, out-of-range id, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Allocation failure. Unreachable in practice with the fixed-size tables
    /// this crate uses, but kept so callers can match on it uniformly.
    #[error("out of memory")]
    OutOfMemory,

    /// A bounded wait (recv, auth step) exceeded its deadline. This is normal
    /// control flow, not a hard failure: callers are expected to retry.
    #[error("operation timed out")]
    Timeout,

    /// The master replied MSTNAK during authentication.
    #[error("master rejected repeater id or credentials")]
    ProtocolRejected,

    /// The master sent MSTCL ("closing").
    #[error("master is closing the connection")]
    ProtocolClosed,

    /// A send or receive on the transport failed.
    #[error("transport I/O error: {0}")]
    TransportIo(#[from] std::io::Error),

    /// A received frame did not match any known shape.
    #[error("could not decode frame: {0}")]
    DecodeFailure(String),

    /// Reed-Solomon decoding could not correct the received block.
    #[error("Reed-Solomon block unrecoverable (code {0})")]
    FecUnrecoverable(u8),
}

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;
