//! # resp-pool
//!
//! Purpose: Provide a pooled async client for a RESP key-value server,
//! hiding per-request connection setup behind a bounded cache of live
//! connections.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Reuse connections to avoid repeated dials.
//! 2. **Self-Healing**: A background checker probes the oldest idle
//!    connection and discards it on failure; the dispatcher retries once
//!    when it trips over a stale connection.
//! 3. **Minimal Locking**: One mutex guards in-memory bookkeeping only and
//!    is never held across network IO.
//! 4. **Explicit Lifecycles**: Borrowed handles have exactly one terminal
//!    disposition, and shutdown is a one-shot broadcast.

mod client;
mod conn;
mod error;
mod health;
mod monitor;
mod pool;
mod resp;

pub use client::{Client, Config, PoolConn};
pub use conn::Connection;
pub use error::{ClientError, ClientResult};
pub use resp::Value;
