// SPDX-License-Identifier: GPL-3.0-only

//! On-demand detection requests
//!
//! snapshot → aggregate (blocking pool) → store annotated image → send.
//! Storage and transport failures degrade the report, they never fail
//! the request.

use super::aggregator::{Aggregation, DetectionAggregator};
use super::{DetectionRecord, validate_threshold};
use crate::errors::{DetectionError, DetectionResult};
use crate::pipelines::broker::FrameBroker;
use crate::pipelines::transport::{SendStatus, TransportChannel, TransportPayload};
use crate::storage::{ImageStore, result_filename};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

/// Response of one detection request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    /// Path of the stored annotated image, `None` when storing failed
    pub image: Option<String>,
    pub detections: Vec<DetectionRecord>,
    pub bbox_coordinate_list: Vec<Vec<f64>>,
    pub center_coordinate_list: Vec<Vec<f64>>,
    /// `None` when nothing was sent (no boxes or no transport)
    pub send_status: Option<SendStatus>,
    /// Broker sequence number of the sample used
    pub sequence: u64,
}

pub struct DetectionService {
    broker: Arc<FrameBroker>,
    aggregator: DetectionAggregator,
    store: Option<Arc<dyn ImageStore>>,
    transport: Option<TransportChannel>,
    last_report: Mutex<Option<DetectionReport>>,
    /// Numbers stored result images
    requests: AtomicU64,
}

impl DetectionService {
    pub fn new(broker: Arc<FrameBroker>, aggregator: DetectionAggregator) -> Self {
        Self {
            broker,
            aggregator,
            store: None,
            transport: None,
            last_report: Mutex::new(None),
            requests: AtomicU64::new(0),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ImageStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_transport(mut self, transport: TransportChannel) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Run detection on the latest captured sample
    pub async fn process(&self, threshold: f64) -> DetectionResult<DetectionReport> {
        let threshold = validate_threshold(threshold)?;
        let sample = self.broker.snapshot_sample().ok_or_else(|| {
            if self.broker.is_running() {
                DetectionError::NoFrameAvailable
            } else {
                DetectionError::CameraNotRunning
            }
        })?;
        let sequence = sample.sequence;

        let aggregator = self.aggregator.clone();
        let aggregation =
            tokio::task::spawn_blocking(move || aggregator.aggregate(&sample, threshold)).await??;
        let has_boxes = !aggregation.is_empty();
        let Aggregation {
            records,
            bbox_list,
            center_list,
            annotated,
        } = aggregation;

        let image = self.store_annotated(annotated).await;

        let send_status = match &self.transport {
            Some(channel) if has_boxes => {
                let payload = TransportPayload::new(bbox_list.clone(), center_list.clone());
                Some(channel.send(&payload).await)
            }
            _ => None,
        };

        info!(
            sequence,
            detections = records.len(),
            image = image.as_deref().unwrap_or("-"),
            sent = send_status.as_ref().is_some_and(SendStatus::is_sent),
            "Detection request complete"
        );

        let report = DetectionReport {
            image,
            detections: records,
            bbox_coordinate_list: bbox_list,
            center_coordinate_list: center_list,
            send_status,
            sequence,
        };
        *self.lock_report() = Some(report.clone());
        Ok(report)
    }

    async fn store_annotated(&self, annotated: crate::backends::camera::ColorImage) -> Option<String> {
        let store = self.store.clone()?;
        let request = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        let name = result_filename(request);
        let written =
            tokio::task::spawn_blocking(move || store.write_image(&name, &annotated)).await;
        match written {
            Ok(Ok(path)) => Some(path.display().to_string()),
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to store result image");
                None
            }
            Err(e) => {
                warn!(error = %e, "Result image task failed");
                None
            }
        }
    }

    fn lock_report(&self) -> std::sync::MutexGuard<'_, Option<DetectionReport>> {
        self.last_report.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Report of the most recent successful request
    pub fn last_report(&self) -> Option<DetectionReport> {
        self.lock_report().clone()
    }

    /// Forget the last report
    pub fn clear(&self) {
        *self.lock_report() = None;
    }
}
