// SPDX-License-Identifier: GPL-3.0-only

//! Synchronized color + filtered depth source
//!
//! Owns the sensor session and everything derived from it: the alignment
//! transform and the depth filter pipeline. All pulls go through `&mut
//! self`, so exactly one owner (the capture loop) can drive it.

use super::DepthSensor;
use super::align::DepthAligner;
use super::types::{ColorImage, DepthFrame, Intrinsics, StreamKind, StreamProfile};
use crate::constants::timing;
use crate::errors::{AppResult, FilterError};
use crate::pipelines::depth_filter::{DepthFilterPipeline, DepthFilterSettings};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// One synchronized capture: color image plus filtered, aligned depth
#[derive(Debug, Clone)]
pub struct CapturedFrames {
    pub color: ColorImage,
    /// Carries its own (possibly decimated) intrinsics and depth scale
    pub depth: DepthFrame,
    pub timestamp_ms: f64,
}

impl CapturedFrames {
    pub fn depth_scale(&self) -> f32 {
        self.depth.depth_scale
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.depth.intrinsics
    }
}

struct ActiveSession {
    aligner: DepthAligner,
    pipeline: DepthFilterPipeline,
    depth_scale: f32,
    current_intrinsics: Intrinsics,
    delivered: u64,
    missed: u64,
}

pub struct FrameSource {
    sensor: Box<dyn DepthSensor>,
    profile: StreamProfile,
    filters: DepthFilterSettings,
    capture_timeout: Duration,
    session: Option<ActiveSession>,
}

impl FrameSource {
    pub fn new(sensor: Box<dyn DepthSensor>, profile: StreamProfile) -> Self {
        Self {
            sensor,
            profile,
            filters: DepthFilterSettings::default(),
            capture_timeout: timing::CAPTURE_TIMEOUT,
            session: None,
        }
    }

    pub fn with_filters(mut self, filters: DepthFilterSettings) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_capture_timeout(mut self, timeout: Duration) -> Self {
        self.capture_timeout = timeout;
        self
    }

    /// Open the sensor and build per-session state
    ///
    /// Calling this while already started is a no-op.
    pub fn start(&mut self) -> AppResult<()> {
        if self.session.is_some() {
            debug!("Frame source already started");
            return Ok(());
        }

        self.sensor.open(&self.profile)?;
        match self.build_session() {
            Ok(session) => {
                info!(
                    sensor = self.sensor.name(),
                    profile = %self.profile,
                    depth_scale = session.depth_scale,
                    passthrough_alignment = session.aligner.is_passthrough(),
                    "Frame source started"
                );
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                self.sensor.close();
                Err(e)
            }
        }
    }

    fn build_session(&self) -> AppResult<ActiveSession> {
        let depth_scale = self.sensor.depth_scale()?;
        let color_intr = self.sensor.intrinsics(StreamKind::Color)?;
        let depth_intr = self.sensor.intrinsics(StreamKind::Depth)?;
        let extrinsics = self.sensor.depth_to_color()?;
        let pipeline = DepthFilterPipeline::new(&self.filters, self.sensor.stereo_baseline())?;

        Ok(ActiveSession {
            aligner: DepthAligner::new(depth_intr, color_intr, extrinsics),
            pipeline,
            depth_scale,
            current_intrinsics: color_intr.decimated(self.filters.decimation_magnitude),
            delivered: 0,
            missed: 0,
        })
    }

    /// Pull one sample, swallowing every failure
    pub fn capture(&mut self) -> Option<CapturedFrames> {
        match self.try_capture() {
            Ok(frames) => frames,
            Err(e) => {
                error!(error = %e, "Depth filter configuration error");
                None
            }
        }
    }

    /// Pull one sample
    ///
    /// Timeouts, sensor errors and half-missing pairs give `Ok(None)`.
    /// Only filter configuration errors, which will not go away by
    /// retrying, are returned as `Err`.
    pub fn try_capture(&mut self) -> Result<Option<CapturedFrames>, FilterError> {
        let Some(session) = self.session.as_mut() else {
            warn!("Capture requested before the frame source was started");
            return Ok(None);
        };

        let pair = match self.sensor.wait_for_frames(self.capture_timeout) {
            Ok(pair) => pair,
            Err(e) => {
                session.missed += 1;
                warn!(error = %e, "No frames from sensor");
                return Ok(None);
            }
        };

        let (Some(color), Some(depth)) = (pair.color, pair.depth) else {
            session.missed += 1;
            debug!(missed = session.missed, "Incomplete frame pair, skipping");
            return Ok(None);
        };

        let aligned = session.aligner.align(depth)?;
        let filtered = session.pipeline.filter(aligned)?;
        session.current_intrinsics = filtered.intrinsics;
        session.delivered += 1;

        if session.delivered % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(
                delivered = session.delivered,
                missed = session.missed,
                "Frame source statistics"
            );
        }

        Ok(Some(CapturedFrames {
            color,
            depth: filtered,
            timestamp_ms: pair.timestamp_ms,
        }))
    }

    /// Close the sensor session (idempotent)
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            self.sensor.close();
            info!(
                delivered = session.delivered,
                missed = session.missed,
                "Frame source stopped"
            );
        }
    }

    pub fn is_started(&self) -> bool {
        self.session.is_some()
    }

    /// Depth scale of the running session
    pub fn depth_scale(&self) -> Option<f32> {
        self.session.as_ref().map(|s| s.depth_scale)
    }

    /// Intrinsics matching the most recently delivered depth frame
    pub fn current_intrinsics(&self) -> Option<Intrinsics> {
        self.session.as_ref().map(|s| s.current_intrinsics)
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}
