// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the TCP result transport

use depth_locator::errors::TransportError;
use depth_locator::pipelines::transport::{
    Framing, ResultListener, SendStatus, TransportChannel, TransportPayload,
};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

fn sample_payload() -> TransportPayload {
    TransportPayload::new(
        vec![
            vec![-180.0, -86.67, 200.0, -146.67, -53.33, 200.0],
            vec![-113.33, -103.33, 200.0],
        ],
        vec![vec![-163.33, -70.0, 200.0], vec![-96.67, -86.67, 200.0]],
    )
}

async fn round_trip(framing: Framing) {
    let listener = ResultListener::bind("127.0.0.1:0", framing).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let last = listener.last_received();
    let receiver = tokio::spawn(async move { listener.accept_one().await });

    let channel = TransportChannel::new(addr.to_string()).with_framing(framing);
    let payload = sample_payload();
    let status = channel.send(&payload).await;
    assert!(status.is_sent(), "send failed: {:?}", status);

    let received = receiver.await.unwrap().unwrap().unwrap();
    assert_eq!(received.payload, payload);
    assert_eq!(received.peer.ip(), addr.ip());
    assert_eq!(last.get().unwrap().payload, payload);
}

#[tokio::test]
async fn test_round_trip_length_prefixed() {
    round_trip(Framing::LengthPrefixed).await;
}

#[tokio::test]
async fn test_round_trip_raw() {
    round_trip(Framing::Raw).await;
}

#[tokio::test]
async fn test_send_reports_byte_count() {
    let listener = ResultListener::bind("127.0.0.1:0", Framing::LengthPrefixed)
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let receiver = tokio::spawn(async move { listener.accept_one().await });

    let payload = sample_payload();
    let status = TransportChannel::new(addr.to_string()).send(&payload).await;
    assert_eq!(
        status,
        SendStatus::Sent {
            bytes: payload.to_json().unwrap().len()
        }
    );
    receiver.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unreachable_receiver() {
    let channel = TransportChannel::new("127.0.0.1:1").with_timeout(Duration::from_secs(2));
    let status = channel.send(&sample_payload()).await;
    assert!(matches!(status, SendStatus::Failed { .. }));
    assert!(channel.try_send(&sample_payload()).await.is_err());
}

#[tokio::test]
async fn test_sender_refuses_oversize_frame() {
    let channel = TransportChannel::new("127.0.0.1:1").with_max_frame_len(16);
    let err = channel.try_send(&sample_payload()).await.unwrap_err();
    assert!(matches!(err, TransportError::FrameTooLarge { limit: 16, .. }));
}

#[tokio::test]
async fn test_raw_listener_rejects_oversize_message() {
    let listener = ResultListener::bind("127.0.0.1:0", Framing::Raw)
        .await
        .unwrap()
        .with_read_limit(32);
    let addr = listener.local_addr().unwrap();
    let last = listener.last_received();

    let sender = tokio::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let body = sample_payload().to_json().unwrap();
        // The listener may close early once it has seen too much
        let _ = stream.write_all(&body).await;
        let _ = stream.shutdown().await;
    });

    let err = listener.accept_one().await.unwrap_err();
    assert!(matches!(err, TransportError::FrameTooLarge { .. }));
    assert!(last.get().is_none());
    sender.await.unwrap();
}

#[tokio::test]
async fn test_listener_survives_bad_connection() {
    let listener = ResultListener::bind("127.0.0.1:0", Framing::LengthPrefixed)
        .await
        .unwrap()
        .with_read_timeout(Duration::from_secs(2));
    let addr = listener.local_addr().unwrap();
    let last = listener.last_received();

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(listener.run_until(async {
        let _ = stop_rx.await;
    }));

    // Length prefix promising more bytes than ever arrive
    let mut bad = TcpStream::connect(addr).await.unwrap();
    bad.write_all(&[0, 0, 0, 100, b'{']).await.unwrap();
    bad.shutdown().await.unwrap();

    let status = TransportChannel::new(addr.to_string())
        .send(&sample_payload())
        .await;
    assert!(status.is_sent());

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while last.get().is_none() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(last.get().unwrap().payload, sample_payload());

    stop_tx.send(()).unwrap();
    server.await.unwrap();
}
