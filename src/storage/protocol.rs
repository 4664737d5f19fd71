//! Store IPC Protocol
//!
//! Defines the messages a worker exchanges with the primary to reach the shared table,
//! and the framing used to carry them over a byte stream.
//!
//! ```text
//! [u32 BE: len][UTF-8 JSON bytes of len]
//! ```
//!
//! Requests that expect a reply carry a request id, which the primary echoes back in the
//! response frame. Fire-and-forget requests (`set`, `delete` from workers) carry no id
//! and receive no reply.

use super::error::StoreError;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound for a single frame payload.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Operations understood by the primary's table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoreRequest {
    Get { key: String },
    Set { key: String, value: Value },
    Delete { key: String },
    /// Push `item` onto the collection under `key`.
    Append { key: String, item: Value },
    /// Merge `patch` into the collection element with the given `id`.
    MergeById { key: String, id: String, patch: Value },
    /// Drop the collection element with the given `id`.
    RemoveById { key: String, id: String },
}

impl StoreRequest {
    pub fn key(&self) -> &str {
        match self {
            StoreRequest::Get { key }
            | StoreRequest::Set { key, .. }
            | StoreRequest::Delete { key }
            | StoreRequest::Append { key, .. }
            | StoreRequest::MergeById { key, .. }
            | StoreRequest::RemoveById { key, .. } => key,
        }
    }
}

/// Replies produced by the primary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreResponse {
    /// Result of a `get`. `None` marks an absent key.
    Value { value: Option<Value> },
    /// Acknowledges a write.
    Ack,
    /// Result of a `merge_by_id`. `None` when no element matched.
    Merged { item: Option<Value> },
    /// Result of a `remove_by_id`.
    Removed { found: bool },
    /// The request was applied or read but its reply could not be delivered.
    Error { message: String },
}

/// A request as sent on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestFrame {
    /// Correlation id, absent for fire-and-forget requests.
    pub id: Option<u64>,
    pub request: StoreRequest,
}

/// A reply as sent on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFrame {
    /// Id of the request this frame answers.
    pub id: u64,
    pub response: StoreResponse,
}

/// Read one length-prefixed frame.
///
/// Returns `None` on clean EOF (peer closed the channel).
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>, StoreError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(StoreError::Protocol(format!(
            "frame size {} exceeds maximum {}",
            len, MAX_FRAME_SIZE
        )));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    Ok(Some(payload))
}

/// Write one length-prefixed frame and flush it.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<(), StoreError> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(StoreError::Protocol(format!(
            "frame size {} exceeds maximum {}",
            payload.len(),
            MAX_FRAME_SIZE
        )));
    }

    let len = payload.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Serialize `message` as a frame payload, rejecting payloads over `MAX_FRAME_SIZE`.
///
/// Failing here leaves the stream untouched, so the caller can answer with an error
/// instead of abandoning the channel.
pub fn encode_frame<T: Serialize>(message: &T) -> Result<Vec<u8>, StoreError> {
    let bytes = serde_json::to_vec(message)?;
    if bytes.len() > MAX_FRAME_SIZE {
        return Err(StoreError::Protocol(format!(
            "frame size {} exceeds maximum {}",
            bytes.len(),
            MAX_FRAME_SIZE
        )));
    }
    Ok(bytes)
}

/// Read one frame and decode it as JSON. `None` on clean EOF.
pub async fn recv_message<R, T>(reader: &mut R) -> Result<Option<T>, StoreError>
where
    R: AsyncRead + Unpin,
    T: serde::de::DeserializeOwned,
{
    match read_frame(reader).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}
