//! Byte-level framing shared by all three components.
//!
//! Control messages are single JSON documents: one write on the sending side,
//! one read of at most [`MAX_MESSAGE_BYTES`] on the receiving side. Chunk
//! payloads bypass that framing entirely; the `READY` token lets the receiver
//! allocate before the bulk bytes arrive. Every operation here is bounded by
//! the caller-supplied timeout and a timed-out socket is simply dropped.

use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use utilities::result::{DfsError, Result};

/// Handshake token exchanged before raw chunk bytes.
pub const READY: &[u8; 5] = b"READY";

/// Upper bound for a single control message.
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Payloads move in slices of this size.
pub const TRANSFER_BUF_BYTES: usize = 8192;

pub async fn connect(addr: &str, io_timeout: Duration) -> Result<TcpStream> {
    let stream = timeout(io_timeout, TcpStream::connect(addr))
        .await?
        .map_err(|e| DfsError::Network(format!("connect to {addr} failed: {e}")))?;
    Ok(stream)
}

/// Serialize `message` and push it in a single write.
pub async fn send_message<T: Serialize>(
    stream: &mut TcpStream,
    message: &T,
    io_timeout: Duration,
) -> Result<()> {
    let payload = serde_json::to_vec(message)?;
    if payload.len() > MAX_MESSAGE_BYTES {
        return Err(DfsError::Internal(format!(
            "control message of {} bytes exceeds the {} byte frame",
            payload.len(),
            MAX_MESSAGE_BYTES
        )));
    }
    timeout(io_timeout, stream.write_all(&payload)).await??;
    Ok(())
}

/// Receive one control message: a single read, then parse.
pub async fn read_message<T: DeserializeOwned>(
    stream: &mut TcpStream,
    io_timeout: Duration,
) -> Result<T> {
    let mut buf = vec![0u8; MAX_MESSAGE_BYTES];
    let n = timeout(io_timeout, stream.read(&mut buf)).await??;
    if n == 0 {
        return Err(DfsError::Network(
            "connection closed before a message arrived".to_owned(),
        ));
    }
    Ok(serde_json::from_slice(&buf[..n])?)
}

pub async fn send_ready(stream: &mut TcpStream, io_timeout: Duration) -> Result<()> {
    timeout(io_timeout, stream.write_all(READY)).await??;
    Ok(())
}

pub async fn await_ready(stream: &mut TcpStream, io_timeout: Duration) -> Result<()> {
    let mut token = [0u8; READY.len()];
    timeout(io_timeout, stream.read_exact(&mut token)).await??;
    if &token != READY {
        return Err(DfsError::Network(format!(
            "expected READY token, got {token:?}"
        )));
    }
    Ok(())
}

/// Read exactly `size` raw payload bytes, in bounded slices.
pub async fn read_payload(
    stream: &mut TcpStream,
    size: u64,
    io_timeout: Duration,
) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(size as usize);
    let mut buf = [0u8; TRANSFER_BUF_BYTES];
    let mut remaining = size as usize;
    while remaining > 0 {
        let want = remaining.min(TRANSFER_BUF_BYTES);
        let n = timeout(io_timeout, stream.read(&mut buf[..want])).await??;
        if n == 0 {
            return Err(DfsError::Network(format!(
                "connection closed with {remaining} payload bytes outstanding"
            )));
        }
        data.extend_from_slice(&buf[..n]);
        remaining -= n;
    }
    Ok(data)
}

pub async fn write_payload(
    stream: &mut TcpStream,
    data: &[u8],
    io_timeout: Duration,
) -> Result<()> {
    timeout(io_timeout, stream.write_all(data)).await??;
    timeout(io_timeout, stream.flush()).await??;
    Ok(())
}
