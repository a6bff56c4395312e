// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for depth capture
//!
//! The backend layer hides where frames come from, providing the same
//! capture API for live-like synthetic scenes and recorded sessions:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │         Server / headless commands          │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌──────────────────────────────────────┐   │
//! │  │ Camera: sensor, alignment, filtering │   │
//! │  │         capture loop                 │   │
//! │  └──────────────────────────────────────┘   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Depth sensor trait, implementations and the frame source

pub mod camera;
