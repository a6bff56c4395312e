// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for the capture loop
//!
//! The loop runs on its own OS thread and checks once per iteration that
//! its run is still the broker's current one, so stopping is cooperative:
//! a request ends the run, the current iteration finishes, then teardown
//! runs on the capture thread itself. Starting a new loop on the same
//! broker also ends the previous run.

use super::source::FrameSource;
use crate::pipelines::broker::FrameBroker;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Action returned by the capture loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a capture loop running in a separate thread
///
/// # Example
///
/// ```ignore
/// let controller = CaptureLoopController::start_with_init(
///     "depth-capture",
///     broker.clone(),
///     move || source.start().map(|_| source).map_err(|e| e.to_string()),
///     |source| { /* capture + publish */ LoopAction::Continue },
///     |mut source| source.stop(),
/// );
/// ```
pub struct CaptureLoopController {
    /// Thread handle for joining
    thread_handle: Option<JoinHandle<()>>,
    /// Holds the running flag
    broker: Arc<FrameBroker>,
    /// Run number this loop owns in the broker
    run: u64,
    /// Name for logging
    name: String,
}

impl CaptureLoopController {
    /// Start a capture loop with initialization and teardown
    ///
    /// `init_fn` runs once on the new thread; if it fails the running flag
    /// is cleared and the thread exits. `loop_fn` runs until it returns
    /// `LoopAction::Stop` or the broker is stopped. `teardown_fn` always
    /// runs after the loop body has exited.
    pub fn start_with_init<S, I, F, T>(
        name: &str,
        broker: Arc<FrameBroker>,
        init_fn: I,
        mut loop_fn: F,
        teardown_fn: T,
    ) -> Self
    where
        S: Send + 'static,
        I: FnOnce() -> Result<S, String> + Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
        T: FnOnce(S) + Send + 'static,
    {
        let loop_broker = Arc::clone(&broker);
        let name_clone = name.to_string();

        let run = broker.begin_run();
        info!(name = %name, run, "Starting capture loop");

        let thread_handle = thread::spawn(move || {
            debug!(name = %name_clone, "Capture loop thread started, initializing...");

            let mut state = match init_fn() {
                Ok(s) => s,
                Err(e) => {
                    warn!(name = %name_clone, error = %e, "Initialization failed");
                    loop_broker.end_run(run);
                    return;
                }
            };

            let mut iterations: u64 = 0;
            loop {
                if !loop_broker.is_current(run) {
                    debug!(name = %name_clone, "Stop requested");
                    break;
                }

                iterations += 1;
                match loop_fn(&mut state) {
                    LoopAction::Continue => {}
                    LoopAction::Stop => {
                        debug!(name = %name_clone, "Loop requested stop");
                        loop_broker.end_run(run);
                        break;
                    }
                }
            }

            teardown_fn(state);
            info!(name = %name_clone, iterations, "Capture loop thread exiting");
        });

        Self {
            thread_handle: Some(thread_handle),
            broker,
            run,
            name: name.to_string(),
        }
    }

    /// Check if the loop thread is alive and still owns the current run
    ///
    /// A loop whose run has ended may still be tearing down; it reports
    /// false here.
    pub fn is_running(&self) -> bool {
        self.broker.is_current(self.run)
            && self
                .thread_handle
                .as_ref()
                .is_some_and(|h| !h.is_finished())
    }

    /// Signal the loop to stop (non-blocking)
    pub fn request_stop(&self) {
        debug!(name = %self.name, run = self.run, "Requesting capture loop stop");
        self.broker.end_run(self.run);
    }

    /// Stop the loop and wait for teardown to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending stop signal
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            debug!(name = %self.name, "Waiting for capture loop thread to finish");
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Capture loop thread panicked: {:?}", e);
            }
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "CaptureLoopController dropped, stopping loop");
            self.stop();
        }
    }
}

/// Run a frame source on a capture thread, publishing every sample
///
/// The source is started on the capture thread and stopped there once the
/// loop exits. A filter configuration error ends the loop.
pub fn start_source_loop(broker: Arc<FrameBroker>, source: FrameSource) -> CaptureLoopController {
    let publish_to = Arc::clone(&broker);
    CaptureLoopController::start_with_init(
        "depth-capture",
        broker,
        move || {
            let mut source = source;
            source.start().map_err(|e| e.to_string())?;
            Ok(source)
        },
        move |source: &mut FrameSource| match source.try_capture() {
            Ok(Some(frames)) => {
                publish_to.publish_sample(frames);
                LoopAction::Continue
            }
            Ok(None) => LoopAction::Continue,
            Err(e) => {
                error!(error = %e, "Stopping capture loop on filter configuration error");
                LoopAction::Stop
            }
        },
        |mut source: FrameSource| source.stop(),
    )
}
