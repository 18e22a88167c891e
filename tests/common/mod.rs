#![allow(dead_code)]

//! In-process mock RESP server shared by the integration tests. Each test
//! drives accepted connections directly so it can assert which connection a
//! command lands on.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;

pub async fn listen() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();
    (listener, addr)
}

/// Awaits a future with a test-level deadline so a regression hangs the test
/// for seconds, not forever.
pub async fn within<F: std::future::Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("test deadline exceeded")
}

/// Server side of one accepted connection.
pub struct ServerConn {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl ServerConn {
    pub async fn accept(listener: &TcpListener) -> ServerConn {
        let (stream, _) = listener.accept().await.expect("accept");
        let (read, write) = stream.into_split();
        ServerConn {
            reader: BufReader::new(read),
            writer: write,
        }
    }

    /// Reads one RESP array command, panicking on malformed input.
    pub async fn read_command(&mut self) -> Vec<Vec<u8>> {
        let line = self.read_line().await.expect("command line");
        assert_eq!(line[0], b'*', "expected array header");
        let count = parse_usize(&line[1..]);
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            let header = self.read_line().await.expect("bulk header");
            assert_eq!(header[0], b'$', "expected bulk header");
            let len = parse_usize(&header[1..]);
            let mut data = vec![0u8; len];
            self.reader.read_exact(&mut data).await.expect("bulk body");
            let mut crlf = [0u8; 2];
            self.reader.read_exact(&mut crlf).await.expect("bulk crlf");
            assert_eq!(&crlf, b"\r\n");
            args.push(data);
        }
        args
    }

    /// Asserts the client side closed this connection.
    pub async fn expect_eof(&mut self) {
        let mut buf = [0u8; 1];
        let bytes = self.reader.read(&mut buf).await.expect("read");
        assert_eq!(bytes, 0, "expected end of stream");
    }

    pub async fn write_simple(&mut self, msg: &str) {
        self.write_raw(format!("+{msg}\r\n").as_bytes()).await;
    }

    pub async fn write_error(&mut self, msg: &str) {
        self.write_raw(format!("-{msg}\r\n").as_bytes()).await;
    }

    pub async fn write_integer(&mut self, value: i64) {
        self.write_raw(format!(":{value}\r\n").as_bytes()).await;
    }

    pub async fn write_bulk(&mut self, data: &[u8]) {
        self.write_raw(format!("${}\r\n", data.len()).as_bytes()).await;
        self.write_raw(data).await;
        self.write_raw(b"\r\n").await;
    }

    pub async fn write_raw(&mut self, data: &[u8]) {
        self.writer.write_all(data).await.expect("write");
        self.writer.flush().await.expect("flush");
    }

    async fn read_line(&mut self) -> Option<Vec<u8>> {
        let mut buf = Vec::new();
        let bytes = self.reader.read_until(b'\n', &mut buf).await.expect("read line");
        if bytes == 0 {
            return None;
        }
        assert!(buf.ends_with(b"\r\n"), "line not CRLF terminated");
        buf.truncate(buf.len() - 2);
        Some(buf)
    }
}

fn parse_usize(data: &[u8]) -> usize {
    std::str::from_utf8(data)
        .expect("utf8 length")
        .parse()
        .expect("numeric length")
}
