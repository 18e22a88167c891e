//! # Wire Connection
//!
//! Purpose: Own one stream socket to the server and expose the request/reply
//! round trip plus the split send/receive pair the monitor relay needs.
//!
//! ## Design Principles
//! 1. **Buffered Reads, Direct Writes**: A `BufReader` reduces syscalls while
//!    commands are written from one reusable buffer.
//! 2. **Explicit Staleness**: Transport failures that mean "peer is gone" mark
//!    the connection closed so it can never re-enter the pool.
//! 3. **Address Classification**: A path separator in the address selects a
//!    Unix domain socket, anything else dials TCP.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tracing::debug;

use crate::error::{is_stale_kind, ClientError, ClientResult};
use crate::resp::{encode_command, read_value, Value};

/// Snapshot of the dialing configuration, taken under the client lock so the
/// factory itself never touches shared state.
#[derive(Debug, Clone)]
pub(crate) struct DialConfig {
    pub addr: String,
    pub password: String,
    pub read_buffer_size: usize,
    pub write_buffer_size: usize,
}

enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            #[cfg(unix)]
            Stream::Unix(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            Stream::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            #[cfg(unix)]
            Stream::Unix(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            #[cfg(unix)]
            Stream::Unix(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            #[cfg(unix)]
            Stream::Unix(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// One live connection to the server with reusable buffers.
pub struct Connection {
    reader: BufReader<Stream>,
    write_buf: Vec<u8>,
    line_buf: Vec<u8>,
    closed: bool,
}

impl Connection {
    /// Dials the configured address and runs the AUTH handshake when a
    /// password is set.
    pub(crate) async fn dial(config: &DialConfig) -> ClientResult<Self> {
        let stream = if config.addr.contains('/') {
            #[cfg(unix)]
            {
                Stream::Unix(UnixStream::connect(&config.addr).await?)
            }
            #[cfg(not(unix))]
            {
                return Err(ClientError::InvalidAddress(config.addr.clone()));
            }
        } else {
            let stream = TcpStream::connect(&config.addr).await?;
            // Disable Nagle to keep request latency low for small payloads.
            stream.set_nodelay(true)?;
            Stream::Tcp(stream)
        };

        let mut conn = Connection {
            reader: BufReader::with_capacity(config.read_buffer_size, stream),
            write_buf: Vec::with_capacity(config.write_buffer_size),
            line_buf: Vec::with_capacity(128),
            closed: false,
        };

        if !config.password.is_empty() {
            match conn.execute(&[b"AUTH", config.password.as_bytes()]).await {
                Ok(_) => {}
                Err(ClientError::Server(message)) => return Err(ClientError::Auth(message)),
                Err(err) => return Err(err),
            }
        }

        debug!(addr = %config.addr, "dialed new connection");
        Ok(conn)
    }

    /// Performs one blocking request/reply round trip.
    ///
    /// An error reply from the server surfaces as [`ClientError::Server`]
    /// without marking the connection closed.
    pub async fn execute(&mut self, args: &[&[u8]]) -> ClientResult<Value> {
        self.send(args).await?;
        match self.receive().await? {
            Value::Error(message) => Err(ClientError::Server(
                String::from_utf8_lossy(&message).into_owned(),
            )),
            value => Ok(value),
        }
    }

    /// Writes one command without waiting for a reply.
    pub async fn send(&mut self, args: &[&[u8]]) -> ClientResult<()> {
        if self.closed {
            return Err(ClientError::ConnectionClosed);
        }
        self.write_buf.clear();
        encode_command(args, &mut self.write_buf);

        let result = {
            let stream = self.reader.get_mut();
            match stream.write_all(&self.write_buf).await {
                Ok(()) => stream.flush().await,
                Err(err) => Err(err),
            }
        };
        match result {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Reads one reply value, including error replies.
    pub async fn receive(&mut self) -> ClientResult<Value> {
        if self.closed {
            return Err(ClientError::ConnectionClosed);
        }
        match read_value(&mut self.reader, &mut self.line_buf).await {
            Ok(value) => Ok(value),
            Err(ClientError::Io(err)) => Err(self.fail(err)),
            Err(err) => Err(err),
        }
    }

    /// Non-blocking closed query.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Marks the connection closed; the socket is released on drop.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Classifies an IO failure, marking the connection dead when the error
    /// kind says the peer is gone.
    fn fail(&mut self, err: std::io::Error) -> ClientError {
        if is_stale_kind(err.kind()) {
            self.closed = true;
            return ClientError::ConnectionClosed;
        }
        ClientError::Io(err)
    }
}
