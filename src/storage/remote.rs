//! Worker-side store client.
//!
//! Forwards every store call to the primary over the worker's IPC channel. Replies are
//! matched to callers by request id, so any number of calls may be outstanding at once.
//!
//! # Tasks
//!
//! `connect` spawns two background tasks: a writer that drains an unbounded queue of
//! outbound frames (preserving the order in which calls were issued), and a reader that
//! dispatches reply frames to the pending callers. When either side of the channel fails,
//! the link is marked closed and every pending caller is released with `Unavailable`.

use super::error::StoreError;
use super::protocol::{
    RequestFrame, ResponseFrame, StoreRequest, StoreResponse, encode_frame, recv_message, write_frame,
};
use super::store::SharedStore;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// State shared between the client handle and its background tasks.
struct Link {
    pending: DashMap<u64, oneshot::Sender<StoreResponse>>,
    closed: watch::Sender<bool>,
}

impl Link {
    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Marks the link closed, then releases every waiter. The flag is set first so a
    /// caller registering concurrently either sees it or has its sender dropped here.
    fn close(&self) {
        self.closed.send_replace(true);
        self.pending.clear();
    }
}

/// Removes a pending entry when its caller finishes or is cancelled.
struct PendingGuard<'a> {
    link: &'a Link,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.link.pending.remove(&self.id);
    }
}

pub struct RemoteStore {
    link: Arc<Link>,
    outbound: mpsc::UnboundedSender<RequestFrame>,
    next_id: AtomicU64,
    timeout: Duration,
    reader_task: JoinHandle<()>,
}

impl RemoteStore {
    /// Starts a client over an arbitrary byte channel to the primary.
    ///
    /// `reader` carries reply frames from the primary, `writer` carries request frames to it.
    pub fn connect<R, W>(reader: R, writer: W, timeout: Duration) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (closed, _) = watch::channel(false);
        let link = Arc::new(Link {
            pending: DashMap::new(),
            closed,
        });
        let (outbound, queue) = mpsc::unbounded_channel();

        tokio::spawn(write_loop(writer, queue, link.clone()));
        let reader_task = tokio::spawn(read_loop(reader, link.clone()));

        Self {
            link,
            outbound,
            next_id: AtomicU64::new(1),
            timeout,
            reader_task,
        }
    }

    /// Starts a client over this process's stdin (replies) and stdout (requests).
    pub fn from_stdio(timeout: Duration) -> Self {
        Self::connect(tokio::io::stdin(), tokio::io::stdout(), timeout)
    }

    /// Completes once the channel to the primary is gone.
    pub async fn closed(&self) {
        let mut closed = self.link.closed.subscribe();
        let _ = closed.wait_for(|closed| *closed).await;
    }

    pub fn is_closed(&self) -> bool {
        self.link.is_closed()
    }

    /// Number of calls still waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.link.pending.len()
    }

    /// Sends `request` and waits for the correlated reply, bounded by the configured timeout.
    async fn call(&self, request: StoreRequest) -> Result<StoreResponse, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();

        self.link.pending.insert(id, reply_tx);
        let _guard = PendingGuard {
            link: self.link.as_ref(),
            id,
        };

        if self.link.is_closed() {
            return Err(channel_closed());
        }

        tracing::trace!("Store request {} ({})", id, request.key());
        self.outbound
            .send(RequestFrame {
                id: Some(id),
                request,
            })
            .map_err(|_| channel_closed())?;

        match tokio::time::timeout(self.timeout, reply_rx).await {
            Ok(Ok(StoreResponse::Error { message })) => Err(StoreError::Protocol(message)),
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(channel_closed()),
            Err(_) => {
                tracing::warn!("Store request {} timed out after {:?}", id, self.timeout);
                Err(StoreError::Timeout(self.timeout))
            }
        }
    }

    /// Sends `request` without waiting for any acknowledgment.
    fn notify(&self, request: StoreRequest) -> Result<(), StoreError> {
        if self.link.is_closed() {
            return Err(channel_closed());
        }

        self.outbound
            .send(RequestFrame { id: None, request })
            .map_err(|_| channel_closed())
    }
}

impl Drop for RemoteStore {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

#[async_trait]
impl SharedStore for RemoteStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        match self.call(StoreRequest::Get { key: key.to_string() }).await? {
            StoreResponse::Value { value } => Ok(value),
            other => Err(unexpected("get", &other)),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.notify(StoreRequest::Set {
            key: key.to_string(),
            value,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.notify(StoreRequest::Delete { key: key.to_string() })
    }

    async fn append(&self, key: &str, item: Value) -> Result<(), StoreError> {
        match self
            .call(StoreRequest::Append {
                key: key.to_string(),
                item,
            })
            .await?
        {
            StoreResponse::Ack => Ok(()),
            other => Err(unexpected("append", &other)),
        }
    }

    async fn merge_by_id(&self, key: &str, id: &str, patch: Value) -> Result<Option<Value>, StoreError> {
        match self
            .call(StoreRequest::MergeById {
                key: key.to_string(),
                id: id.to_string(),
                patch,
            })
            .await?
        {
            StoreResponse::Merged { item } => Ok(item),
            other => Err(unexpected("merge_by_id", &other)),
        }
    }

    async fn remove_by_id(&self, key: &str, id: &str) -> Result<bool, StoreError> {
        match self
            .call(StoreRequest::RemoveById {
                key: key.to_string(),
                id: id.to_string(),
            })
            .await?
        {
            StoreResponse::Removed { found } => Ok(found),
            other => Err(unexpected("remove_by_id", &other)),
        }
    }
}

async fn write_loop<W>(mut writer: W, mut queue: mpsc::UnboundedReceiver<RequestFrame>, link: Arc<Link>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = queue.recv().await {
        let payload = match encode_frame(&frame) {
            Ok(payload) => payload,
            Err(e) => {
                // Only this caller fails; the channel itself is still usable.
                tracing::error!("Store request {:?} not sendable: {}", frame.id, e);
                if let Some((_, waiter)) = frame.id.and_then(|id| link.pending.remove(&id)) {
                    let _ = waiter.send(StoreResponse::Error {
                        message: e.to_string(),
                    });
                }
                continue;
            }
        };

        if let Err(e) = write_frame(&mut writer, &payload).await {
            tracing::error!("Failed to send store request to primary: {}", e);
            break;
        }
    }

    link.close();
}

async fn read_loop<R>(mut reader: R, link: Arc<Link>)
where
    R: AsyncRead + Unpin,
{
    loop {
        match recv_message::<_, ResponseFrame>(&mut reader).await {
            Ok(Some(frame)) => match link.pending.remove(&frame.id) {
                Some((_, waiter)) => {
                    let _ = waiter.send(frame.response);
                }
                None => {
                    tracing::debug!("Dropping reply {} with no waiting caller", frame.id);
                }
            },
            Ok(None) => {
                tracing::info!("IPC channel closed by primary");
                break;
            }
            Err(e) => {
                tracing::error!("Failed to read store reply: {}", e);
                break;
            }
        }
    }

    link.close();
}

fn channel_closed() -> StoreError {
    StoreError::Unavailable("IPC channel to primary is closed".to_string())
}

fn unexpected(op: &str, response: &StoreResponse) -> StoreError {
    StoreError::Protocol(format!("unexpected reply to {}: {:?}", op, response))
}
