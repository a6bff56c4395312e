// SPDX-License-Identifier: GPL-3.0-only

use super::{ApiError, AppState};
use crate::backends::camera::types::ColorImage;
use crate::constants::{app_info, server, timing};
use crate::pipelines::detection::DetectionReport;
use crate::storage::encode_jpeg;
use axum::Json;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
pub struct ProcessQuery {
    /// Confidence threshold in [0, 1]
    pub conf: Option<f64>,
}

fn status_message(status: &str) -> Json<Value> {
    Json(json!({ "status": status }))
}

/// GET /
pub async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": app_info::NAME,
        "version": app_info::version(),
        "camera_running": state.camera_running(),
        "frames_published": state.broker.sequence(),
        "has_result": state.service.last_report().is_some(),
    }))
}

/// POST /open_camera
pub async fn open_camera(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state
        .open_camera()
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to open camera: {}", e)))?;
    Ok(status_message("Camera Opened"))
}

/// POST /close_camera
pub async fn close_camera(State(state): State<AppState>) -> Json<Value> {
    state.close_camera().await;
    status_message("Camera Closed")
}

/// POST /exit
pub async fn exit(State(state): State<AppState>) -> Json<Value> {
    state.close_camera().await;
    state.request_shutdown();
    status_message("Stopped")
}

/// POST /clear
pub async fn clear(State(state): State<AppState>) -> Json<Value> {
    state.service.clear();
    status_message("Cleared")
}

/// GET /result
pub async fn result(State(state): State<AppState>) -> Json<Option<DetectionReport>> {
    Json(state.service.last_report())
}

/// POST /start_process?conf=0.5
pub async fn start_process(
    State(state): State<AppState>,
    Query(query): Query<ProcessQuery>,
) -> Result<Json<DetectionReport>, ApiError> {
    let threshold = query.conf.unwrap_or(state.default_confidence);
    let report = state.service.process(threshold).await?;
    Ok(Json(report))
}

fn placeholder() -> ColorImage {
    ColorImage::new(server::PLACEHOLDER_WIDTH, server::PLACEHOLDER_HEIGHT)
}

/// GET /video_frame
///
/// Serves a black frame until the first capture is published.
pub async fn video_frame(State(state): State<AppState>) -> Result<Response, ApiError> {
    let broker = Arc::clone(&state.broker);
    let quality = state.preview_quality;
    let jpeg = tokio::task::spawn_blocking(move || {
        let frame = broker.snapshot().unwrap_or_else(placeholder);
        encode_jpeg(&frame, quality)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?
    .map_err(|e| ApiError::Internal(format!("Failed to encode frame: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        jpeg,
    )
        .into_response())
}

/// One part of a `multipart/x-mixed-replace` stream
pub(crate) fn multipart_part(jpeg: &[u8]) -> Vec<u8> {
    let head = format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        server::MJPEG_BOUNDARY,
        jpeg.len()
    );
    let mut part = Vec::with_capacity(head.len() + jpeg.len() + 2);
    part.extend_from_slice(head.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    part
}

/// GET /video_feed
///
/// Emits each newly published frame while the capture loop runs.
pub async fn video_feed(State(state): State<AppState>) -> Response {
    let broker = Arc::clone(&state.broker);
    let quality = state.preview_quality;

    let stream = async_stream::stream! {
        let mut last_sequence = 0;
        let mut ticker = tokio::time::interval(timing::STREAM_FRAME_INTERVAL);
        while broker.is_running() {
            ticker.tick().await;
            let sequence = broker.sequence();
            if sequence == last_sequence {
                continue;
            }
            last_sequence = sequence;
            let Some(frame) = broker.snapshot() else {
                continue;
            };
            match tokio::task::spawn_blocking(move || encode_jpeg(&frame, quality)).await {
                Ok(Ok(jpeg)) => {
                    yield Ok::<Vec<u8>, std::io::Error>(multipart_part(&jpeg));
                }
                Ok(Err(e)) => warn!(error = %e, "Skipping frame that failed to encode"),
                Err(e) => {
                    warn!(error = %e, "Preview encode task failed");
                    break;
                }
            }
        }
        debug!("MJPEG stream ended");
    };

    (
        [(
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={}", server::MJPEG_BOUNDARY),
        )],
        Body::from_stream(stream),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::super::{AppState, SourceFactory, serve_on};
    use super::*;
    use crate::backends::camera::{FrameSource, StreamProfile, SyntheticSensor};
    use crate::pipelines::broker::FrameBroker;
    use crate::pipelines::detection::{
        DetectionAggregator, DetectionBox, DetectionService, ScriptedDetector,
    };
    use reqwest::Method;
    use std::net::SocketAddr;
    use std::time::{Duration, Instant};
    use tokio::net::TcpListener;

    fn test_state() -> AppState {
        let broker = Arc::new(FrameBroker::new());
        let detector = ScriptedDetector::new(vec![DetectionBox::new(20, 20, 60, 60, 0.9, 0)]);
        let service =
            DetectionService::new(Arc::clone(&broker), DetectionAggregator::new(Arc::new(detector)));
        let factory: SourceFactory = Arc::new(|| {
            let profile = StreamProfile {
                color_width: 160,
                color_height: 90,
                depth_width: 160,
                depth_height: 90,
                fps: 60,
            };
            Ok(FrameSource::new(Box::new(SyntheticSensor::new()), profile))
        });
        AppState::new(broker, service, factory)
    }

    async fn spawn_server(state: AppState) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            serve_on(listener, state).await.unwrap();
        });
        (addr, handle)
    }

    async fn request(addr: SocketAddr, method: Method, path: &str) -> reqwest::Response {
        reqwest::Client::new()
            .request(method, format!("http://{}{}", addr, path))
            .send()
            .await
            .unwrap()
    }

    async fn request_json(addr: SocketAddr, method: Method, path: &str) -> (u16, Value) {
        let response = request(addr, method, path).await;
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    #[test]
    fn test_multipart_part_layout() {
        let part = multipart_part(b"JPEG");
        assert_eq!(
            part,
            b"--frame\r\nContent-Type: image/jpeg\r\nContent-Length: 4\r\n\r\nJPEG\r\n".to_vec()
        );
    }

    #[tokio::test]
    async fn test_placeholder_frame_before_capture() {
        let (addr, _server) = spawn_server(test_state()).await;
        let response = request(addr, Method::GET, "/video_frame").await;
        assert_eq!(response.status().as_u16(), 200);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE.as_str()], "image/jpeg");
        assert_eq!(
            headers[header::CACHE_CONTROL.as_str()],
            "no-cache, no-store, must-revalidate"
        );
        assert_eq!(headers[header::PRAGMA.as_str()], "no-cache");
        assert_eq!(headers[header::EXPIRES.as_str()], "0");

        let body = response.bytes().await.unwrap();
        let decoded = image::load_from_memory(&body).unwrap();
        assert_eq!(decoded.width(), 1280);
        assert_eq!(decoded.height(), 720);
    }

    #[tokio::test]
    async fn test_process_without_camera() {
        let (addr, _server) = spawn_server(test_state()).await;
        let (status, body) = request_json(addr, Method::POST, "/start_process").await;
        assert_eq!(status, 503);
        assert!(body["error"].as_str().unwrap().contains("not running"));

        let (status, _) = request_json(addr, Method::POST, "/start_process?conf=1.5").await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn test_camera_lifecycle_and_detection() {
        let state = test_state();
        let (addr, _server) = spawn_server(state.clone()).await;

        let (status, body) = request_json(addr, Method::POST, "/open_camera").await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "Camera Opened");

        let deadline = Instant::now() + Duration::from_secs(10);
        while state.broker.sequence() == 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(state.broker.sequence() > 0);

        let (_, status_body) = request_json(addr, Method::GET, "/").await;
        assert_eq!(status_body["camera_running"], true);

        let (status, report) = request_json(addr, Method::POST, "/start_process?conf=0.5").await;
        assert_eq!(status, 200);
        assert_eq!(report["detections"].as_array().unwrap().len(), 1);
        assert_eq!(report["bbox_coordinate_list"][0].as_array().unwrap().len(), 6);
        assert!(report["send_status"].is_null());

        let (_, last) = request_json(addr, Method::GET, "/result").await;
        assert_eq!(last["sequence"], report["sequence"]);

        let (_, body) = request_json(addr, Method::POST, "/clear").await;
        assert_eq!(body["status"], "Cleared");
        let (_, last) = request_json(addr, Method::GET, "/result").await;
        assert!(last.is_null());

        let (_, body) = request_json(addr, Method::POST, "/close_camera").await;
        assert_eq!(body["status"], "Camera Closed");
        assert!(!state.camera_running());
        assert!(state.broker.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_exit_stops_server() {
        let (addr, server) = spawn_server(test_state()).await;
        let (status, body) = request_json(addr, Method::POST, "/exit").await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "Stopped");
        tokio::time::timeout(Duration::from_secs(10), server)
            .await
            .unwrap()
            .unwrap();
    }
}
