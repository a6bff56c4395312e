// SPDX-License-Identifier: GPL-3.0-only

//! File-based configuration
//!
//! Every section and field has a default, so an empty file (or no file)
//! is a valid configuration.

use crate::backends::camera::SensorBackendType;
use crate::backends::camera::types::StreamProfile;
use crate::constants::{detection, server, stream, timing, transport};
use crate::errors::ConfigError;
use crate::pipelines::depth_filter::DepthFilterSettings;
use crate::pipelines::detection::CornerMode;
use crate::pipelines::transport::Framing;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Sensor selection and stream settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Sensor implementation to use
    pub backend: SensorBackendType,
    /// Recording directory for the replay backend
    pub replay_dir: Option<PathBuf>,
    /// Restart the recording when it runs out
    pub replay_loop: bool,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Bounded wait for one frame pair
    pub capture_timeout_ms: u64,
    /// Wall distance rendered by the synthetic backend
    pub synthetic_distance_m: f32,
    /// Synthetic backend drops every Nth depth frame (0 = never)
    pub synthetic_drop_every: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            backend: SensorBackendType::default(),
            replay_dir: None,
            replay_loop: true,
            width: stream::WIDTH,
            height: stream::HEIGHT,
            fps: stream::FPS,
            capture_timeout_ms: timing::CAPTURE_TIMEOUT.as_millis() as u64,
            synthetic_distance_m: 2.0,
            synthetic_drop_every: 0,
        }
    }
}

impl CameraSettings {
    /// Same resolution for color and depth
    pub fn profile(&self) -> StreamProfile {
        StreamProfile {
            color_width: self.width,
            color_height: self.height,
            depth_width: self.width,
            depth_height: self.height,
            fps: self.fps,
        }
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }
}

/// Detection request settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Threshold used when a request does not name one
    pub confidence: f64,
    pub corner_mode: CornerMode,
    /// JSON file with the scripted detector's boxes
    pub boxes_file: Option<PathBuf>,
    /// Where result images go (default: Pictures/depth-locator)
    pub output_dir: Option<PathBuf>,
    /// Send results to the receiver (false = local only)
    pub send_results: bool,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            confidence: detection::CONFIDENCE,
            corner_mode: CornerMode::default(),
            boxes_file: None,
            output_dir: None,
            send_results: true,
        }
    }
}

impl DetectionSettings {
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(crate::storage::default_output_dir)
    }
}

/// Outgoing result transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub remote: String,
    pub framing: Framing,
    pub timeout_ms: u64,
    pub max_frame_len: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            remote: transport::REMOTE_ADDR.to_string(),
            framing: Framing::default(),
            timeout_ms: timing::SEND_TIMEOUT.as_millis() as u64,
            max_frame_len: transport::MAX_FRAME_LEN,
        }
    }
}

/// HTTP control surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub preview_jpeg_quality: u8,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: server::BIND_ADDR.to_string(),
            preview_jpeg_quality: server::PREVIEW_JPEG_QUALITY,
        }
    }
}

/// Result listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverSettings {
    pub listen: String,
    pub framing: Framing,
    /// Largest accepted message (default depends on framing)
    pub read_limit: Option<usize>,
}

impl Default for ReceiverSettings {
    fn default() -> Self {
        Self {
            listen: transport::LISTEN_ADDR.to_string(),
            framing: Framing::default(),
            read_limit: None,
        }
    }
}

impl ReceiverSettings {
    pub fn read_limit(&self) -> usize {
        self.read_limit
            .unwrap_or_else(|| self.framing.default_limit())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: CameraSettings,
    pub filters: DepthFilterSettings,
    pub detection: DetectionSettings,
    pub transport: TransportSettings,
    pub server: ServerSettings,
    pub receiver: ReceiverSettings,
}

impl Config {
    /// Load and validate a TOML config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml(&contents)?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cam = &self.camera;
        if cam.width == 0 || cam.height == 0 || cam.fps == 0 {
            return Err(ConfigError::Invalid(format!(
                "camera stream {}x{} @ {}fps",
                cam.width, cam.height, cam.fps
            )));
        }
        if cam.backend == SensorBackendType::Replay && cam.replay_dir.is_none() {
            return Err(ConfigError::Invalid(
                "camera.replay_dir is required for the replay backend".to_string(),
            ));
        }
        if !(cam.synthetic_distance_m >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "camera.synthetic_distance_m {}",
                cam.synthetic_distance_m
            )));
        }

        self.filters
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("filters: {}", e)))?;

        if !(0.0..=1.0).contains(&self.detection.confidence) {
            return Err(ConfigError::Invalid(format!(
                "detection.confidence {} outside [0, 1]",
                self.detection.confidence
            )));
        }

        if self.transport.remote.is_empty() {
            return Err(ConfigError::Invalid("transport.remote is empty".to_string()));
        }
        if self.transport.timeout_ms == 0 {
            return Err(ConfigError::Invalid("transport.timeout_ms is 0".to_string()));
        }

        self.server
            .bind
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid(format!("server.bind '{}': {}", self.server.bind, e)))?;
        if !(1..=100).contains(&self.server.preview_jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "server.preview_jpeg_quality {} outside 1..=100",
                self.server.preview_jpeg_quality
            )));
        }
        self.receiver.listen.parse::<SocketAddr>().map_err(|e| {
            ConfigError::Invalid(format!("receiver.listen '{}': {}", self.receiver.listen, e))
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_section() {
        let config = Config::from_toml(
            r#"
            [transport]
            remote = "10.0.0.2:6000"
            framing = "raw"
            "#,
        )
        .unwrap();
        assert_eq!(config.transport.remote, "10.0.0.2:6000");
        assert_eq!(config.transport.framing, Framing::Raw);
        assert_eq!(config.transport.timeout_ms, 5000);
    }

    #[test]
    fn test_replay_needs_dir() {
        let err = Config::from_toml("[camera]\nbackend = \"replay\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
