//! # RESP2 Encoding and Parsing
//!
//! Purpose: Encode client commands and parse server replies without external
//! dependencies, keeping allocations under control.
//!
//! ## Design Principles
//! 1. **State-Free Parsing**: Replies are parsed top-down with minimal state.
//! 2. **Buffer Reuse**: The caller provides the line buffer to avoid per-call
//!    allocations.
//! 3. **Binary-Safe**: Bulk strings are treated as raw bytes.
//! 4. **Fail Fast**: Invalid framing returns protocol errors immediately.

use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::{ClientError, ClientResult};

/// RESP reply value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// +OK or +PONG style replies.
    Simple(Vec<u8>),
    /// -ERR ... replies.
    Error(Vec<u8>),
    /// :123 replies.
    Integer(i64),
    /// $... bulk strings, with None for null.
    Bulk(Option<Vec<u8>>),
    /// *... arrays.
    Array(Vec<Value>),
}

/// Encodes a RESP2 array command into the provided buffer.
pub fn encode_command(args: &[&[u8]], out: &mut Vec<u8>) {
    out.push(b'*');
    push_usize(out, args.len());
    out.extend_from_slice(b"\r\n");
    for arg in args {
        out.push(b'$');
        push_usize(out, arg.len());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
}

/// Reads one RESP value from the buffered reader.
///
/// A clean end-of-stream surfaces as an `UnexpectedEof` IO error so the
/// connection layer can classify it as a dead transport.
pub async fn read_value<R>(reader: &mut R, line_buf: &mut Vec<u8>) -> ClientResult<Value>
where
    R: AsyncBufRead + Unpin + Send,
{
    read_line(reader, line_buf).await?;
    if line_buf.is_empty() {
        return Err(ClientError::Protocol);
    }

    match line_buf[0] {
        b'+' => Ok(Value::Simple(line_buf[1..].to_vec())),
        b'-' => Ok(Value::Error(line_buf[1..].to_vec())),
        b':' => Ok(Value::Integer(parse_i64(&line_buf[1..])?)),
        b'$' => {
            let len = parse_i64(&line_buf[1..])?;
            parse_bulk(reader, len, line_buf).await
        }
        b'*' => {
            let len = parse_i64(&line_buf[1..])?;
            parse_array(reader, len, line_buf).await
        }
        _ => Err(ClientError::Protocol),
    }
}

// Boxing breaks the recursive future type for nested arrays.
fn read_value_boxed<'a, R>(
    reader: &'a mut R,
    line_buf: &'a mut Vec<u8>,
) -> Pin<Box<dyn Future<Output = ClientResult<Value>> + Send + 'a>>
where
    R: AsyncBufRead + Unpin + Send,
{
    Box::pin(read_value(reader, line_buf))
}

async fn parse_bulk<R>(reader: &mut R, len: i64, line_buf: &mut Vec<u8>) -> ClientResult<Value>
where
    R: AsyncBufRead + Unpin + Send,
{
    if len < 0 {
        return Ok(Value::Bulk(None));
    }
    let mut data = vec![0u8; len as usize];
    reader.read_exact(&mut data).await?;

    let mut crlf = [0u8; 2];
    reader.read_exact(&mut crlf).await?;
    if crlf != [b'\r', b'\n'] {
        return Err(ClientError::Protocol);
    }

    line_buf.clear();
    Ok(Value::Bulk(Some(data)))
}

async fn parse_array<R>(reader: &mut R, len: i64, line_buf: &mut Vec<u8>) -> ClientResult<Value>
where
    R: AsyncBufRead + Unpin + Send,
{
    if len <= 0 {
        return Ok(Value::Array(Vec::new()));
    }

    let mut items = Vec::with_capacity(len as usize);
    for _ in 0..len {
        items.push(read_value_boxed(reader, line_buf).await?);
    }
    Ok(Value::Array(items))
}

async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> ClientResult<()>
where
    R: AsyncBufRead + Unpin + Send,
{
    buf.clear();
    let bytes = reader.read_until(b'\n', buf).await?;
    if bytes == 0 {
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(ClientError::Protocol);
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn parse_i64(data: &[u8]) -> ClientResult<i64> {
    if data.is_empty() {
        return Err(ClientError::Protocol);
    }
    let mut negative = false;
    let mut idx = 0;
    if data[0] == b'-' {
        negative = true;
        idx = 1;
    }

    let mut value: i64 = 0;
    while idx < data.len() {
        let b = data[idx];
        if b < b'0' || b > b'9' {
            return Err(ClientError::Protocol);
        }
        value = value.saturating_mul(10).saturating_add((b - b'0') as i64);
        idx += 1;
    }

    if negative {
        Ok(-value)
    } else {
        Ok(value)
    }
}

fn push_usize(out: &mut Vec<u8>, mut value: usize) {
    // Write digits into a small stack buffer to avoid heap allocations.
    let mut buf = [0u8; 20];
    let mut len = 0;
    if value == 0 {
        buf[0] = b'0';
        len = 1;
    } else {
        while value > 0 {
            buf[len] = b'0' + (value % 10) as u8;
            value /= 10;
            len += 1;
        }
    }
    for idx in (0..len).rev() {
        out.push(buf[idx]);
    }
}
