use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

/// Forwards each accepted connection, byte for byte, to one worker.
///
/// Upstreams are picked round-robin in accept order. When the chosen worker cannot be
/// reached within `connect_timeout`, the client gets a `502 Bad Gateway` JSON body.
pub struct Balancer {
    upstreams: Vec<SocketAddr>,
    next: AtomicUsize,
    connect_timeout: Duration,
}

impl Balancer {
    pub fn new(upstreams: Vec<SocketAddr>, connect_timeout: Duration) -> Self {
        Self {
            upstreams,
            next: AtomicUsize::new(0),
            connect_timeout,
        }
    }

    /// The upstream for the next connection, or `None` when there are no workers.
    pub fn next_upstream(&self) -> Option<SocketAddr> {
        if self.upstreams.is_empty() {
            return None;
        }

        let turn = self.next.fetch_add(1, Ordering::Relaxed);
        Some(self.upstreams[turn % self.upstreams.len()])
    }

    /// Accept loop. Only returns if the listener itself cannot report its address.
    pub async fn run(self: Arc<Self>, listener: TcpListener) -> std::io::Result<()> {
        tracing::info!(
            "Forwarding {} to {} workers",
            listener.local_addr()?,
            self.upstreams.len()
        );

        loop {
            let (inbound, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
            };

            let balancer = self.clone();
            tokio::spawn(async move {
                balancer.relay(inbound, peer).await;
            });
        }
    }

    async fn relay(&self, mut inbound: TcpStream, peer: SocketAddr) {
        let Some(upstream) = self.next_upstream() else {
            tracing::error!("No workers to forward {} to", peer);
            reply_bad_gateway(&mut inbound).await;
            return;
        };

        let mut outbound =
            match tokio::time::timeout(self.connect_timeout, TcpStream::connect(upstream)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    tracing::warn!("Worker {} refused connection from {}: {}", upstream, peer, e);
                    reply_bad_gateway(&mut inbound).await;
                    return;
                }
                Err(_) => {
                    tracing::warn!(
                        "Worker {} did not accept within {:?}",
                        upstream,
                        self.connect_timeout
                    );
                    reply_bad_gateway(&mut inbound).await;
                    return;
                }
            };

        tracing::debug!("{} -> {}", peer, upstream);

        match tokio::io::copy_bidirectional(&mut inbound, &mut outbound).await {
            Ok((sent, received)) => {
                tracing::debug!(
                    "{} <-> {} closed ({} bytes up, {} bytes down)",
                    peer,
                    upstream,
                    sent,
                    received
                );
            }
            Err(e) => tracing::debug!("{} <-> {} ended: {}", peer, upstream, e),
        }
    }
}

/// Raw HTTP/1.1 response written when no worker could take the connection.
pub fn bad_gateway_response() -> Vec<u8> {
    let body = serde_json::json!({ "status": 502, "message": "Bad Gateway" }).to_string();

    format!(
        "HTTP/1.1 502 Bad Gateway\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

async fn reply_bad_gateway(inbound: &mut TcpStream) {
    if let Err(e) = inbound.write_all(&bad_gateway_response()).await {
        tracing::debug!("Could not deliver 502: {}", e);
    }
    let _ = inbound.shutdown().await;

    // Drain what the client already sent; closing with unread input resets the
    // connection and can discard the 502 before the client reads it.
    let _ = tokio::time::timeout(
        Duration::from_secs(1),
        tokio::io::copy(inbound, &mut tokio::io::sink()),
    )
    .await;
}
