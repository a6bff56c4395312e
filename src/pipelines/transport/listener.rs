// SPDX-License-Identifier: GPL-3.0-only

//! Result receiver
//!
//! Accepts connections one at a time, reads a single frame from each,
//! and keeps the most recent payload in memory. A bad connection is
//! logged and dropped; the loop keeps going.

use super::framing::{Framing, read_frame};
use super::payload::TransportPayload;
use crate::constants::timing;
use crate::errors::{TransportError, TransportResult};
use chrono::{DateTime, Local};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, info, warn};

/// A payload together with where and when it arrived
#[derive(Debug, Clone)]
pub struct ReceivedResult {
    pub payload: TransportPayload,
    pub peer: SocketAddr,
    pub received_at: DateTime<Local>,
}

/// Shared handle on the most recently received payload
#[derive(Debug, Clone, Default)]
pub struct LastReceived {
    inner: Arc<Mutex<Option<ReceivedResult>>>,
}

impl LastReceived {
    pub fn get(&self) -> Option<ReceivedResult> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, result: ReceivedResult) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
    }
}

pub struct ResultListener {
    listener: TcpListener,
    framing: Framing,
    read_limit: usize,
    read_timeout: Duration,
    last: LastReceived,
}

impl ResultListener {
    pub async fn bind<A: ToSocketAddrs>(addr: A, framing: Framing) -> TransportResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            framing,
            read_limit: framing.default_limit(),
            read_timeout: timing::RECEIVE_TIMEOUT,
            last: LastReceived::default(),
        })
    }

    pub fn with_read_limit(mut self, limit: usize) -> Self {
        self.read_limit = limit;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle for reading the latest payload from elsewhere
    pub fn last_received(&self) -> LastReceived {
        self.last.clone()
    }

    /// Accept connections until `shutdown` completes
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            addr = ?self.listener.local_addr().ok(),
            framing = %self.framing,
            "Result listener waiting for data"
        );
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Result listener shutting down");
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            if let Err(e) = self.handle(stream, peer).await {
                                warn!(peer = %peer, error = %e, "Dropping connection");
                            }
                        }
                        Err(e) => warn!(error = %e, "Accept failed"),
                    }
                }
            }
        }
    }

    /// Accept and handle exactly one connection
    pub async fn accept_one(&self) -> TransportResult<Option<ReceivedResult>> {
        let (stream, peer) = self.listener.accept().await?;
        self.handle(stream, peer).await
    }

    async fn handle(
        &self,
        mut stream: TcpStream,
        peer: SocketAddr,
    ) -> TransportResult<Option<ReceivedResult>> {
        debug!(peer = %peer, "Connection accepted");
        let body = tokio::time::timeout(
            self.read_timeout,
            read_frame(&mut stream, self.framing, self.read_limit),
        )
        .await
        .map_err(|_| TransportError::Timeout)??;

        if body.is_empty() {
            debug!(peer = %peer, "Empty message, ignoring");
            return Ok(None);
        }

        let payload = TransportPayload::from_json(&body)?;
        let result = ReceivedResult {
            payload,
            peer,
            received_at: Local::now(),
        };
        info!(
            peer = %peer,
            time = %result.received_at.format("%Y-%m-%d %H:%M:%S"),
            bounding_boxes = ?result.payload.bounding_boxes,
            center_points = ?result.payload.center_points,
            "Detection results received"
        );
        self.last.replace(result.clone());
        Ok(Some(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_bad_json_keeps_previous_state() {
        let listener = ResultListener::bind("127.0.0.1:0", Framing::Raw).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let last = listener.last_received();

        let client = tokio::spawn(async move {
            let mut s = TcpStream::connect(addr).await.unwrap();
            s.write_all(br#"{"center_points": [[1, 2, 3]]}"#).await.unwrap();
            s.shutdown().await.unwrap();
            drop(s);
            let mut s = TcpStream::connect(addr).await.unwrap();
            s.write_all(b"{ broken").await.unwrap();
            s.shutdown().await.unwrap();
        });

        assert!(listener.accept_one().await.unwrap().is_some());
        assert!(listener.accept_one().await.is_err());
        client.await.unwrap();

        let kept = last.get().unwrap();
        assert_eq!(kept.payload.center_points, vec![vec![1.0, 2.0, 3.0]]);
        assert!(kept.payload.bounding_boxes.is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_ignored() {
        let listener = ResultListener::bind("127.0.0.1:0", Framing::Raw).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(async move {
            let s = TcpStream::connect(addr).await.unwrap();
            drop(s);
        });
        assert!(listener.accept_one().await.unwrap().is_none());
        client.await.unwrap();
        assert!(listener.last_received().get().is_none());
    }
}
