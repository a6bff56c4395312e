// SPDX-License-Identifier: GPL-3.0-only

//! Builds runtime objects from a [`Config`]
//!
//! Shared by the HTTP server and the headless `detect` command so both
//! run the same capture and detection setup.

use crate::backends::camera::{FrameSource, create_sensor};
use crate::config::Config;
use crate::errors::AppResult;
use crate::pipelines::broker::FrameBroker;
use crate::pipelines::detection::{
    DetectionAggregator, DetectionService, ObjectDetector, ScriptedDetector,
};
use crate::pipelines::transport::TransportChannel;
use crate::storage::DiskImageStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Sensor + filter pipeline as configured, not yet started
pub fn frame_source(config: &Config) -> AppResult<FrameSource> {
    let sensor = create_sensor(&config.camera)?;
    Ok(FrameSource::new(sensor, config.camera.profile())
        .with_filters(config.filters.clone())
        .with_capture_timeout(config.camera.capture_timeout()))
}

/// Detector named by the config (boxes file, or the built-in scene)
pub fn detector(config: &Config) -> AppResult<Arc<dyn ObjectDetector>> {
    let detector = match &config.detection.boxes_file {
        Some(path) => ScriptedDetector::from_file(path)?,
        None => ScriptedDetector::synthetic_scene(),
    };
    Ok(Arc::new(detector))
}

pub fn transport_channel(config: &Config) -> TransportChannel {
    TransportChannel::new(config.transport.remote.clone())
        .with_framing(config.transport.framing)
        .with_timeout(Duration::from_millis(config.transport.timeout_ms))
        .with_max_frame_len(config.transport.max_frame_len)
}

/// Detection service reading from `broker`, with storage and (optionally)
/// transport attached
pub fn detection_service(config: &Config, broker: Arc<FrameBroker>) -> AppResult<DetectionService> {
    let aggregator =
        DetectionAggregator::new(detector(config)?).with_corner_mode(config.detection.corner_mode);
    let store = DiskImageStore::new(config.detection.output_dir());
    info!(
        output_dir = %store.dir().display(),
        send_results = config.detection.send_results,
        remote = %config.transport.remote,
        "Detection service configured"
    );

    let service = DetectionService::new(broker, aggregator).with_store(Arc::new(store));
    Ok(if config.detection.send_results {
        service.with_transport(transport_channel(config))
    } else {
        service
    })
}
