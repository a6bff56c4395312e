// SPDX-License-Identifier: GPL-3.0-only

//! Depth sensor backends
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   Capture loop      │  ← CaptureLoopController thread
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │    FrameSource      │  ← alignment + depth filter pipeline
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  DepthSensor Trait  │  ← Common interface
//! └──────────┬──────────┘
//!            │
//!       ┌────┴─────┐
//!       ▼          ▼
//!  ┌─────────┐ ┌────────┐
//!  │Synthetic│ │ Replay │
//!  └─────────┘ └────────┘
//! ```

pub mod align;
pub mod frame_loop;
pub mod replay;
pub mod source;
pub mod synthetic;
pub mod types;

pub use align::DepthAligner;
pub use frame_loop::{CaptureLoopController, LoopAction};
pub use replay::ReplaySensor;
pub use source::{CapturedFrames, FrameSource};
pub use synthetic::SyntheticSensor;
pub use types::*;

use crate::config::CameraSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Depth sensor driver interface
///
/// A sensor delivers color + depth pairs from one session. Calibration
/// queries are valid only while the session is open.
pub trait DepthSensor: Send {
    // ===== Lifecycle =====

    /// Open a session with one color and one depth stream
    fn open(&mut self, profile: &StreamProfile) -> SensorResult<()>;

    /// Release the session (idempotent)
    fn close(&mut self);

    /// Check if a session is currently open
    fn is_open(&self) -> bool;

    // ===== Calibration =====

    /// Meters per Z16 depth unit
    fn depth_scale(&self) -> SensorResult<f32>;

    /// Intrinsics of one stream of the open session
    fn intrinsics(&self, stream: StreamKind) -> SensorResult<Intrinsics>;

    /// Rigid transform from the depth to the color camera
    fn depth_to_color(&self) -> SensorResult<Extrinsics>;

    /// Stereo baseline in meters, used for disparity conversion
    fn stereo_baseline(&self) -> f32 {
        crate::constants::stream::STEREO_BASELINE_M
    }

    // ===== Streaming =====

    /// Block until the next pair is available or `timeout` elapses
    ///
    /// Either stream of the returned pair may be missing when the
    /// sensor lost sync for this poll.
    fn wait_for_frames(&mut self, timeout: Duration) -> SensorResult<RawFramePair>;

    // ===== Metadata =====

    /// Human-readable sensor name for logging
    fn name(&self) -> &str;
}

/// Available sensor implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorBackendType {
    /// Procedurally generated scene
    #[default]
    Synthetic,
    /// Recorded frames from a directory
    Replay,
}

impl std::fmt::Display for SensorBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorBackendType::Synthetic => write!(f, "synthetic"),
            SensorBackendType::Replay => write!(f, "replay"),
        }
    }
}

/// Build the sensor selected by the camera settings
pub fn create_sensor(settings: &CameraSettings) -> SensorResult<Box<dyn DepthSensor>> {
    match settings.backend {
        SensorBackendType::Synthetic => Ok(Box::new(
            SyntheticSensor::new()
                .with_distance(settings.synthetic_distance_m)
                .with_drop_every(settings.synthetic_drop_every),
        )),
        SensorBackendType::Replay => {
            let dir = settings.replay_dir.clone().ok_or_else(|| {
                SensorError::UnsupportedProfile("replay backend needs replay_dir".to_string())
            })?;
            Ok(Box::new(
                ReplaySensor::new(dir).with_looping(settings.replay_loop),
            ))
        }
    }
}
