// SPDX-License-Identifier: GPL-3.0-only

//! Processing pipelines from captured frames to remote coordinates
//!
//! # Pipeline Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Capture loop │ ──▶ │   FrameBroker     │ ──▶ │  HTTP views  │
//! │ (filtered    │     │  latest sample    │     │  (MJPEG)     │
//! │  depth)      │     │                   │     │              │
//! └──────────────┘     └─────────┬─────────┘     └──────────────┘
//!                                │ on request
//!                                ▼
//!                      ┌───────────────────┐     ┌──────────────┐
//!                      │ DetectionService  │ ──▶ │ ResultListener│
//!                      │  - detect         │ TCP │  (remote)    │
//!                      │  - deproject (cm) │     │              │
//!                      │  - store image    │     │              │
//!                      └───────────────────┘     └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`depth_filter`]: decimation, disparity, spatial and temporal filtering
//! - [`broker`]: latest-wins slot between capture and requests
//! - [`projection`]: pixel + depth to camera-frame points
//! - [`detection`]: detection aggregation and the request service
//! - [`transport`]: TCP sender and receiver for coordinate lists

pub mod broker;
pub mod depth_filter;
pub mod detection;
pub mod projection;
pub mod transport;
