// SPDX-License-Identifier: GPL-3.0-only

//! Result sender
//!
//! One TCP connection per message: connect, write one frame, close.
//! Delivery is at most once; failures are reported, never retried.

use super::framing::{Framing, write_frame};
use super::payload::TransportPayload;
use crate::constants::{timing, transport};
use crate::errors::{TransportError, TransportResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{info, warn};

/// Outcome of one send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SendStatus {
    Sent { bytes: usize },
    Failed { reason: String },
}

impl SendStatus {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendStatus::Sent { .. })
    }
}

#[derive(Debug, Clone)]
pub struct TransportChannel {
    remote: String,
    framing: Framing,
    timeout: Duration,
    max_frame_len: usize,
}

impl TransportChannel {
    pub fn new(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            framing: Framing::default(),
            timeout: timing::SEND_TIMEOUT,
            max_frame_len: transport::MAX_FRAME_LEN,
        }
    }

    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Send one payload; failures come back as `SendStatus::Failed`
    pub async fn send(&self, payload: &TransportPayload) -> SendStatus {
        match self.try_send(payload).await {
            Ok(bytes) => {
                info!(
                    remote = %self.remote,
                    framing = %self.framing,
                    bytes,
                    boxes = payload.bounding_boxes.len(),
                    "Sent detection results"
                );
                SendStatus::Sent { bytes }
            }
            Err(e) => {
                warn!(remote = %self.remote, error = %e, "Failed to send detection results");
                SendStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Send one payload, returning the body size on success
    pub async fn try_send(&self, payload: &TransportPayload) -> TransportResult<usize> {
        let body = payload.to_json()?;
        let exchange = async {
            let mut stream = TcpStream::connect(&self.remote).await?;
            write_frame(&mut stream, self.framing, &body, self.max_frame_len).await?;
            stream.shutdown().await?;
            Ok::<_, TransportError>(())
        };
        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| TransportError::Timeout)??;
        Ok(body.len())
    }
}

impl Default for TransportChannel {
    fn default() -> Self {
        Self::new(transport::REMOTE_ADDR)
    }
}
