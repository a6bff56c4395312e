// SPDX-License-Identifier: GPL-3.0-only

//! Depth Locator - 3D localization of detected objects with a depth camera
//!
//! Captures aligned color + depth frames, filters the depth stream,
//! turns detector boxes into camera-frame coordinates in centimeters, and
//! relays them to a remote receiver over TCP.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Depth sensor abstraction, alignment and the capture loop
//! - [`pipelines`]: Depth filtering, projection, detection and transport
//! - [`server`]: HTTP control surface
//! - [`session`]: Runtime wiring from a [`Config`]
//! - [`config`]: File-based configuration
//! - [`storage`]: Result image storage
//!
//! # Example
//!
//! ```no_run
//! # async fn run() -> depth_locator::errors::AppResult<()> {
//! let config = depth_locator::Config::default();
//! depth_locator::server::serve(&config).await?;
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipelines;
pub mod server;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use constants::PersistenceMode;
pub use pipelines::detection::{DetectionBox, DetectionRecord, DetectionReport};
pub use pipelines::projection::SpatialPoint;
pub use pipelines::transport::TransportPayload;
