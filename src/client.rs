//! # Pool Manager
//!
//! Purpose: Own the idle pool and the connection factory, dispatch commands
//! with a bounded retry for stale connections, and coordinate shutdown with
//! the background health checker.
//!
//! ## Design Principles
//! 1. **One Lock, No IO Under It**: A single mutex guards the idle pool and
//!    configuration; dialing and round trips always happen outside it, so
//!    cold-pool acquires dial in parallel.
//! 2. **Eviction at Release**: The idle bound is enforced when a connection
//!    comes back, evicting from the back so the oldest entries go first.
//! 3. **Single Disposition**: `PoolConn` consumes itself on release/discard,
//!    so a connection can never be returned to the pool twice.
//! 4. **One-Shot Shutdown**: A cancellation token stops the health checker; a
//!    second `close` fails fast instead of re-arming anything.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::conn::{Connection, DialConfig};
use crate::error::{ClientError, ClientResult};
use crate::health;
use crate::pool::IdlePool;
use crate::resp::Value;

/// Configuration for a [`Client`].
///
/// All values except the health-check interval can be changed after
/// construction; changes apply to future connections only.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum idle connections kept in the pool.
    pub max_idle_conns: usize,
    /// Advisory read buffer capacity per connection.
    pub read_buffer_size: usize,
    /// Advisory write buffer capacity per connection.
    pub write_buffer_size: usize,
    /// Period of the background liveness probe.
    pub check_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_idle_conns: 10,
            read_buffer_size: 2048,
            write_buffer_size: 2048,
            check_interval: Duration::from_secs(10),
        }
    }
}

struct State {
    password: String,
    config: Config,
    idle: IdlePool<Connection>,
    /// Set exactly once by `close`; afterwards released connections are
    /// dropped instead of pooled and acquire refuses new work.
    closed: bool,
    checker: Option<JoinHandle<()>>,
}

struct ClientInner {
    addr: String,
    state: Mutex<State>,
    shutdown: CancellationToken,
}

/// Pooled client for one RESP server address.
///
/// Cloning is cheap and every clone shares the same pool. Construction spawns
/// the background health checker, so a `Client` must be created inside a
/// tokio runtime.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Creates a client with default configuration.
    pub fn new(addr: impl Into<String>, password: impl Into<String>) -> Self {
        Self::with_config(addr, password, Config::default())
    }

    /// Creates a client with a custom configuration.
    pub fn with_config(
        addr: impl Into<String>,
        password: impl Into<String>,
        config: Config,
    ) -> Self {
        let client = Client {
            inner: Arc::new(ClientInner {
                addr: addr.into(),
                state: Mutex::new(State {
                    password: password.into(),
                    config,
                    idle: IdlePool::new(),
                    closed: false,
                    checker: None,
                }),
                shutdown: CancellationToken::new(),
            }),
        };

        let handle = tokio::spawn(health::run(client.clone()));
        client.inner.state.lock().checker = Some(handle);
        client
    }

    /// Replaces the password used for future connections.
    pub fn set_password(&self, password: impl Into<String>) {
        self.inner.state.lock().password = password.into();
    }

    /// Changes the idle bound. Lowering it takes effect on the next release,
    /// which may evict several connections at once.
    pub fn set_max_idle_conns(&self, max: usize) {
        self.inner.state.lock().config.max_idle_conns = max;
    }

    /// Changes the advisory read buffer size for future connections.
    pub fn set_read_buffer_size(&self, size: usize) {
        self.inner.state.lock().config.read_buffer_size = size;
    }

    /// Changes the advisory write buffer size for future connections.
    pub fn set_write_buffer_size(&self, size: usize) {
        self.inner.state.lock().config.write_buffer_size = size;
    }

    /// Current number of idle connections.
    pub fn idle_conns(&self) -> usize {
        self.inner.state.lock().idle.len()
    }

    /// Executes one command, retrying once on a fresh connection when the
    /// pooled one turns out to be dead.
    ///
    /// A dead pooled connection is expected: the server may have dropped it
    /// while idle, or the health checker may have raced this call. Any other
    /// failure returns the connection to the pool and surfaces verbatim.
    pub async fn execute(&self, args: &[&[u8]]) -> ClientResult<Value> {
        let mut last_err = ClientError::ConnectionClosed;
        for attempt in 0..2 {
            let mut conn = self.acquire().await?;
            match conn.execute(args).await {
                Ok(value) => {
                    self.release(conn);
                    return Ok(value);
                }
                Err(err @ ClientError::ConnectionClosed) => {
                    warn!(attempt, "command hit a stale connection, retrying");
                    conn.close();
                    last_err = err;
                }
                Err(err) => {
                    self.release(conn);
                    return Err(err);
                }
            }
        }
        Err(last_err)
    }

    /// Checks out one connection wrapped in a [`PoolConn`].
    pub async fn borrow(&self) -> ClientResult<PoolConn> {
        let conn = self.acquire().await?;
        Ok(PoolConn {
            client: self.clone(),
            conn: Some(conn),
        })
    }

    /// Shuts the client down: stops the health checker, waits for it, then
    /// drains and closes every idle connection.
    ///
    /// In-flight borrowed connections are not force-closed; the closed flag
    /// makes their eventual release drop them instead of pooling them. A
    /// second call fails with [`ClientError::Closed`].
    pub async fn close(&self) -> ClientResult<()> {
        let checker = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(ClientError::Closed);
            }
            state.closed = true;
            state.checker.take()
        };

        self.inner.shutdown.cancel();
        if let Some(handle) = checker {
            let _ = handle.await;
        }

        let drained = self.inner.state.lock().idle.drain();
        let count = drained.len();
        for mut conn in drained {
            conn.close();
        }
        debug!(drained = count, "client closed, idle pool drained");
        Ok(())
    }

    /// Pops the most recently used idle connection, or dials a new one. The
    /// lock is dropped before dialing.
    pub(crate) async fn acquire(&self) -> ClientResult<Connection> {
        let dial = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(ClientError::Closed);
            }
            if let Some(conn) = state.idle.pop_front() {
                return Ok(conn);
            }
            DialConfig {
                addr: self.inner.addr.clone(),
                password: state.password.clone(),
                read_buffer_size: state.config.read_buffer_size,
                write_buffer_size: state.config.write_buffer_size,
            }
        };
        Connection::dial(&dial).await
    }

    /// Returns a connection to the front of the pool, evicting from the back
    /// while the idle bound is exceeded. Closed connections are dropped, as
    /// is anything released after shutdown.
    pub(crate) fn release(&self, conn: Connection) {
        if conn.is_closed() {
            return;
        }
        let mut state = self.inner.state.lock();
        if state.closed {
            return;
        }
        let max = state.config.max_idle_conns;
        while state.idle.len() >= max {
            match state.idle.pop_back() {
                Some(mut oldest) => {
                    oldest.close();
                    debug!("evicted oldest idle connection");
                }
                None => break,
            }
        }
        if max == 0 {
            return;
        }
        state.idle.push_front(conn);
    }

    /// Pops the least recently used idle connection for the health checker.
    pub(crate) fn pop_oldest_idle(&self) -> Option<Connection> {
        self.inner.state.lock().idle.pop_back()
    }

    pub(crate) fn check_interval(&self) -> Duration {
        self.inner.state.lock().config.check_interval
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }
}

/// Borrowed connection handle.
///
/// Exactly one terminal operation applies: [`release`](PoolConn::release)
/// returns the connection to the pool, [`discard`](PoolConn::discard)
/// force-closes it. Both consume the handle. Dropping the handle without
/// either behaves as release.
pub struct PoolConn {
    client: Client,
    conn: Option<Connection>,
}

impl PoolConn {
    /// Returns the connection to the pool; a no-op if it already reports
    /// closed.
    pub fn release(mut self) {
        if let Some(conn) = self.conn.take() {
            self.client.release(conn);
        }
    }

    /// Force-closes the connection without touching the pool. Use this for a
    /// connection known to be in a bad state, e.g. after a mid-command error.
    pub fn discard(mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.close();
        }
    }
}

impl Deref for PoolConn {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until disposal")
    }
}

impl DerefMut for PoolConn {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection present until disposal")
    }
}

impl Drop for PoolConn {
    fn drop(&mut self) {
        // The take() guard makes a second return impossible.
        if let Some(conn) = self.conn.take() {
            self.client.release(conn);
        }
    }
}
