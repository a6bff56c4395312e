// SPDX-License-Identifier: GPL-3.0-only

//! HTTP control surface
//!
//! Opens and closes the camera, serves the live preview, and runs
//! detection requests against the latest captured sample.
//!
//! | Method | Path             | Effect                                  |
//! |--------|------------------|-----------------------------------------|
//! | GET    | `/`              | status                                  |
//! | POST   | `/open_camera`   | start the capture loop                  |
//! | POST   | `/close_camera`  | stop the capture loop                   |
//! | POST   | `/exit`          | stop the capture loop and the server    |
//! | GET    | `/video_frame`   | latest frame as one JPEG                |
//! | GET    | `/video_feed`    | multipart MJPEG stream                  |
//! | POST   | `/start_process` | detect, locate, store, send (`?conf=`)  |
//! | GET    | `/result`        | last detection report                   |
//! | POST   | `/clear`         | forget the last report                  |

pub mod error;
pub mod handlers;

pub use error::ApiError;

use crate::backends::camera::frame_loop::start_source_loop;
use crate::backends::camera::{CaptureLoopController, FrameSource};
use crate::config::Config;
use crate::errors::AppResult;
use crate::pipelines::broker::FrameBroker;
use crate::pipelines::detection::DetectionService;
use crate::session;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

/// Builds a fresh, unstarted frame source each time the camera is opened
pub type SourceFactory = Arc<dyn Fn() -> AppResult<FrameSource> + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub(crate) broker: Arc<FrameBroker>,
    pub(crate) service: Arc<DetectionService>,
    /// Held across teardown so an open waits for a pending close
    camera: Arc<Mutex<Option<CaptureLoopController>>>,
    source_factory: SourceFactory,
    shutdown: Arc<Notify>,
    pub(crate) preview_quality: u8,
    pub(crate) default_confidence: f64,
}

impl AppState {
    pub fn new(
        broker: Arc<FrameBroker>,
        service: DetectionService,
        source_factory: SourceFactory,
    ) -> Self {
        Self {
            broker,
            service: Arc::new(service),
            camera: Arc::new(Mutex::new(None)),
            source_factory,
            shutdown: Arc::new(Notify::new()),
            preview_quality: crate::constants::server::PREVIEW_JPEG_QUALITY,
            default_confidence: crate::constants::detection::CONFIDENCE,
        }
    }

    pub fn from_config(config: &Config) -> AppResult<Self> {
        let broker = Arc::new(FrameBroker::new());
        let service = session::detection_service(config, Arc::clone(&broker))?;
        let source_config = config.clone();
        let factory: SourceFactory = Arc::new(move || session::frame_source(&source_config));
        Ok(Self::new(broker, service, factory)
            .with_preview_quality(config.server.preview_jpeg_quality)
            .with_default_confidence(config.detection.confidence))
    }

    pub fn with_preview_quality(mut self, quality: u8) -> Self {
        self.preview_quality = quality;
        self
    }

    pub fn with_default_confidence(mut self, confidence: f64) -> Self {
        self.default_confidence = confidence;
        self
    }

    pub fn camera_running(&self) -> bool {
        self.broker.is_running()
    }

    /// Start the capture loop, returns false if it was already running
    pub async fn open_camera(&self) -> AppResult<bool> {
        let mut slot = self.camera.lock().await;
        if slot.as_ref().is_some_and(CaptureLoopController::is_running) {
            debug!("Camera already open");
            return Ok(false);
        }
        // A loop that ended on its own may still be releasing its sensor
        if let Some(previous) = slot.take() {
            stop_blocking(previous).await;
        }

        let source = (self.source_factory)()?;
        *slot = Some(start_source_loop(Arc::clone(&self.broker), source));
        info!("Camera opened");
        Ok(true)
    }

    /// Stop the capture loop and drop the last frame
    ///
    /// Returns false if no loop was active.
    pub async fn close_camera(&self) -> bool {
        let mut slot = self.camera.lock().await;
        let Some(controller) = slot.take() else {
            self.broker.clear();
            return false;
        };

        stop_blocking(controller).await;
        self.broker.clear();
        info!("Camera closed");
        true
    }

    /// Ask `serve_on` to return after in-flight requests finish
    pub fn request_shutdown(&self) {
        self.shutdown.notify_one();
    }
}

/// Stop a capture loop and join its thread off the async runtime
async fn stop_blocking(mut controller: CaptureLoopController) {
    if let Err(e) = tokio::task::spawn_blocking(move || controller.stop()).await {
        warn!(error = %e, "Capture loop stop task failed");
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::status))
        .route("/open_camera", post(handlers::open_camera))
        .route("/close_camera", post(handlers::close_camera))
        .route("/exit", post(handlers::exit))
        .route("/video_frame", get(handlers::video_frame))
        .route("/video_feed", get(handlers::video_feed))
        .route("/start_process", post(handlers::start_process))
        .route("/result", get(handlers::result))
        .route("/clear", post(handlers::clear))
        .with_state(state)
}

/// Bind the configured address and serve until `/exit` or Ctrl+C
pub async fn serve(config: &Config) -> AppResult<()> {
    let state = AppState::from_config(config)?;
    let listener = TcpListener::bind(&config.server.bind).await?;
    serve_on(listener, state).await
}

pub async fn serve_on(listener: TcpListener, state: AppState) -> AppResult<()> {
    info!(addr = ?listener.local_addr().ok(), "HTTP server listening");

    let closing = state.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown_signal(&closing.shutdown).await;
            // Open MJPEG streams end once the capture loop stops
            closing.close_camera().await;
        })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal(notify: &Notify) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = notify.notified() => info!("Exit requested"),
        _ = ctrl_c => info!("Interrupt received"),
    }
}
