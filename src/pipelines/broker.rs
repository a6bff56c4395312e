// SPDX-License-Identifier: GPL-3.0-only

//! Latest-wins frame slot shared between the capture loop and requests
//!
//! One writer (the capture loop) replaces the slot, any number of readers
//! take snapshots. There is no queue: a reader always sees the newest
//! complete sample, never a mix of two captures. The capture loop's
//! running flag lives behind the same lock, tagged with a run number so a
//! loop that is shutting down never sees a newer loop's flag as its own.

use crate::backends::camera::source::CapturedFrames;
use crate::backends::camera::types::{ColorImage, DepthFrame};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// One published capture
///
/// Immutable once published; readers share it through an `Arc`.
#[derive(Debug, Clone)]
pub struct CapturedSample {
    pub color: ColorImage,
    /// `None` when only a color frame was published
    pub depth: Option<DepthFrame>,
    pub timestamp_ms: f64,
    /// Monotonic publish counter, starts at 1
    pub sequence: u64,
}

#[derive(Default)]
struct BrokerState {
    running: bool,
    run: u64,
    latest: Option<Arc<CapturedSample>>,
    sequence: u64,
}

#[derive(Default)]
pub struct FrameBroker {
    state: Mutex<BrokerState>,
}

impl FrameBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store(&self, color: ColorImage, depth: Option<DepthFrame>, timestamp_ms: f64) -> u64 {
        let mut state = self.lock();
        state.sequence += 1;
        let sequence = state.sequence;
        state.latest = Some(Arc::new(CapturedSample {
            color,
            depth,
            timestamp_ms,
            sequence,
        }));
        sequence
    }

    /// Publish a color-only frame, returns its sequence number
    pub fn publish(&self, color: &ColorImage) -> u64 {
        // Copy before taking the lock
        let copy = color.clone();
        self.store(copy, None, 0.0)
    }

    /// Publish a full capture, returns its sequence number
    pub fn publish_sample(&self, frames: CapturedFrames) -> u64 {
        self.store(frames.color, Some(frames.depth), frames.timestamp_ms)
    }

    /// Copy of the latest color image
    pub fn snapshot(&self) -> Option<ColorImage> {
        let latest = self.lock().latest.clone();
        latest.map(|sample| sample.color.clone())
    }

    /// The latest complete sample
    pub fn snapshot_sample(&self) -> Option<Arc<CapturedSample>> {
        self.lock().latest.clone()
    }

    /// Sequence number of the latest publish (0 = nothing yet)
    pub fn sequence(&self) -> u64 {
        self.lock().sequence
    }

    /// Mark the capture loop as running, returns false if it already was
    pub fn start(&self) -> bool {
        let mut state = self.lock();
        if state.running {
            return false;
        }
        state.run += 1;
        state.running = true;
        debug!(run = state.run, "Frame broker running");
        true
    }

    /// Begin a new run and return its number
    ///
    /// Any earlier run stops being current, even if its loop has not
    /// noticed yet.
    pub fn begin_run(&self) -> u64 {
        let mut state = self.lock();
        state.run += 1;
        state.running = true;
        debug!(run = state.run, "Frame broker running");
        state.run
    }

    /// Stop `run` if it is still the current one
    pub fn end_run(&self, run: u64) -> bool {
        let mut state = self.lock();
        if !state.running || state.run != run {
            return false;
        }
        state.running = false;
        debug!(run, "Frame broker stopped");
        true
    }

    /// True while `run` is the running one
    pub fn is_current(&self, run: u64) -> bool {
        let state = self.lock();
        state.running && state.run == run
    }

    /// Ask the capture loop to stop, returns false if it was not running
    pub fn stop(&self) -> bool {
        let mut state = self.lock();
        if !state.running {
            return false;
        }
        state.running = false;
        debug!(run = state.run, "Frame broker stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Drop the latest sample
    pub fn clear(&self) {
        self.lock().latest = None;
    }
}
