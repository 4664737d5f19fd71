use super::error::StoreError;
use super::protocol::{RequestFrame, ResponseFrame, StoreResponse, encode_frame, recv_message, write_frame};
use super::table::SharedTable;

use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// Serves one worker's IPC channel against the primary's table.
///
/// Frames are applied strictly in arrival order. A reply frame is written only for
/// requests that carry a correlation id. A reply that cannot be encoded (for example one
/// above `MAX_FRAME_SIZE`) is answered with `StoreResponse::Error` and the channel stays
/// open; only I/O and framing failures on the stream end it. Returns `Ok(())` once the
/// worker closes its side of the channel.
pub async fn serve_channel<R, W>(
    mut reader: R,
    mut writer: W,
    table: Arc<SharedTable>,
    worker: usize,
) -> Result<(), StoreError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tracing::debug!("Serving store channel for worker {}", worker);

    while let Some(frame) = recv_message::<_, RequestFrame>(&mut reader).await? {
        tracing::trace!(
            "Worker {} -> {:?} on '{}'",
            worker,
            frame.id,
            frame.request.key()
        );

        let response = table.apply(frame.request);

        if let Some(id) = frame.id {
            let payload = match encode_frame(&ResponseFrame { id, response }) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!("Reply {} to worker {} not deliverable: {}", id, worker, e);
                    encode_frame(&ResponseFrame {
                        id,
                        response: StoreResponse::Error {
                            message: e.to_string(),
                        },
                    })?
                }
            };
            write_frame(&mut writer, &payload).await?;
        }
    }

    tracing::info!("Store channel for worker {} closed", worker);
    Ok(())
}
