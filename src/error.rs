//! # Error Types
//!
//! Purpose: Give every failure surfaced by the client a distinct variant so
//! callers (and the dispatcher's retry policy) can tell a dead transport from
//! a live connection that merely reported an error.

use std::io::ErrorKind;

/// Result type for the pooled client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the pooled client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Network or IO failure while dialing, reading, or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The transport reported the connection as already dead. The dispatcher
    /// recovers from this by discarding the connection and retrying once.
    #[error("connection closed")]
    ConnectionClosed,
    /// RESP2 framing or parse error.
    #[error("protocol error")]
    Protocol,
    /// Server returned an error reply. The connection stays usable.
    #[error("server error: {0}")]
    Server(String),
    /// Server rejected the AUTH handshake.
    #[error("authentication rejected: {0}")]
    Auth(String),
    /// The client has been shut down.
    #[error("client closed")]
    Closed,
    /// Address could not be used on this platform.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// IO error kinds that mean the peer is gone rather than a transient fault.
pub(crate) fn is_stale_kind(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::UnexpectedEof
    )
}
