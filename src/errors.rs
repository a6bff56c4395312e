// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the depth locator

use std::fmt;

use crate::backends::camera::types::{DepthEncoding, SensorError};

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type for depth filter stages
pub type FilterResult<T> = Result<T, FilterError>;

/// Result type for detection requests
pub type DetectionResult<T> = Result<T, DetectionError>;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for image storage
pub type StorageResult<T> = Result<T, StorageError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Sensor session errors
    Sensor(SensorError),
    /// Depth filter configuration errors
    Filter(FilterError),
    /// Detection request errors
    Detection(DetectionError),
    /// Network transport errors
    Transport(TransportError),
    /// Storage/filesystem errors
    Storage(StorageError),
    /// Configuration errors
    Config(ConfigError),
    /// Generic error with message
    Other(String),
}

/// Depth filter errors
///
/// These are configuration errors: a stage was handed a frame in the wrong
/// encoding or with parameters it cannot work with. They are not retried.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    /// A stage received a frame in an encoding it does not accept
    UnexpectedEncoding {
        stage: &'static str,
        expected: DepthEncoding,
        found: DepthEncoding,
    },
    /// Stage parameter out of range
    InvalidParameter(String),
    /// Frame sample count disagrees with its dimensions
    DimensionMismatch { expected: usize, found: usize },
}

/// Detection request errors
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionError {
    /// Capture loop is not running
    CameraNotRunning,
    /// Nothing has been captured yet
    NoFrameAvailable,
    /// Confidence threshold outside [0, 1]
    InvalidThreshold(f64),
    /// The detector collaborator failed
    DetectorFailed(String),
    /// Background task panicked or was cancelled
    TaskFailed(String),
}

/// Transport errors
#[derive(Debug, Clone)]
pub enum TransportError {
    /// Could not reach the remote end
    Connect(String),
    /// Connect or write did not finish in time
    Timeout,
    /// Payload could not be serialized or parsed
    Serialization(String),
    /// Frame exceeds the configured read bound
    FrameTooLarge { size: usize, limit: usize },
    /// Socket I/O failed mid-transfer
    Io(String),
}

/// Image storage errors
#[derive(Debug, Clone)]
pub enum StorageError {
    /// Output directory could not be created
    CreateDir(String),
    /// Image could not be encoded
    Encode(String),
    /// Encoded image could not be written
    Write(String),
}

/// Configuration errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Config file could not be read
    Read(String),
    /// Config file could not be parsed
    Parse(String),
    /// A value is outside its allowed range
    Invalid(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Sensor(e) => write!(f, "Sensor error: {}", e),
            AppError::Filter(e) => write!(f, "Filter error: {}", e),
            AppError::Detection(e) => write!(f, "Detection error: {}", e),
            AppError::Transport(e) => write!(f, "Transport error: {}", e),
            AppError::Storage(e) => write!(f, "Storage error: {}", e),
            AppError::Config(e) => write!(f, "Configuration error: {}", e),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::UnexpectedEncoding {
                stage,
                expected,
                found,
            } => write!(
                f,
                "{} stage expects {} input, got {}",
                stage, expected, found
            ),
            FilterError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            FilterError::DimensionMismatch { expected, found } => write!(
                f,
                "Frame has {} samples, dimensions need {}",
                found, expected
            ),
        }
    }
}

impl fmt::Display for DetectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionError::CameraNotRunning => write!(f, "Camera is not running"),
            DetectionError::NoFrameAvailable => write!(f, "No frame available"),
            DetectionError::InvalidThreshold(t) => {
                write!(f, "Confidence threshold {} is outside [0, 1]", t)
            }
            DetectionError::DetectorFailed(msg) => write!(f, "Detector failed: {}", msg),
            DetectionError::TaskFailed(msg) => write!(f, "Detection task failed: {}", msg),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Connect(msg) => write!(f, "Connection failed: {}", msg),
            TransportError::Timeout => write!(f, "Timed out"),
            TransportError::Serialization(msg) => write!(f, "Serialization failed: {}", msg),
            TransportError::FrameTooLarge { size, limit } => {
                write!(f, "Frame of {} bytes exceeds limit of {}", size, limit)
            }
            TransportError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::CreateDir(msg) => write!(f, "Failed to create directory: {}", msg),
            StorageError::Encode(msg) => write!(f, "Encoding failed: {}", msg),
            StorageError::Write(msg) => write!(f, "Write failed: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read(msg) => write!(f, "Failed to read config: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for FilterError {}
impl std::error::Error for DetectionError {}
impl std::error::Error for TransportError {}
impl std::error::Error for StorageError {}
impl std::error::Error for ConfigError {}

// Conversions from sub-errors to AppError
impl From<SensorError> for AppError {
    fn from(err: SensorError) -> Self {
        AppError::Sensor(err)
    }
}

impl From<FilterError> for AppError {
    fn from(err: FilterError) -> Self {
        AppError::Filter(err)
    }
}

impl From<DetectionError> for AppError {
    fn from(err: DetectionError) -> Self {
        AppError::Detection(err)
    }
}

impl From<TransportError> for AppError {
    fn from(err: TransportError) -> Self {
        AppError::Transport(err)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Other(err.to_string())
    }
}

// Conversions for I/O and codec errors
impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => TransportError::Timeout,
            std::io::ErrorKind::ConnectionRefused => TransportError::Connect(err.to_string()),
            _ => TransportError::Io(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for StorageError {
    fn from(err: image::ImageError) -> Self {
        StorageError::Encode(err.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Write(err.to_string())
    }
}

impl From<tokio::task::JoinError> for DetectionError {
    fn from(err: tokio::task::JoinError) -> Self {
        DetectionError::TaskFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_error_display() {
        let err = FilterError::UnexpectedEncoding {
            stage: "spatial",
            expected: DepthEncoding::Disparity,
            found: DepthEncoding::Z16,
        };
        assert_eq!(err.to_string(), "spatial stage expects disparity input, got Z16");
    }

    #[test]
    fn test_io_error_maps_to_transport_kind() {
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(
            TransportError::from(refused),
            TransportError::Connect(_)
        ));

        let timed_out = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert!(matches!(
            TransportError::from(timed_out),
            TransportError::Timeout
        ));
    }

    #[test]
    fn test_app_error_wraps_sub_errors() {
        let err: AppError = DetectionError::CameraNotRunning.into();
        assert_eq!(err.to_string(), "Detection error: Camera is not running");
    }
}
