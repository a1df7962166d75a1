use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use viewbeacon_relay::sender::{BeaconSink, HttpBeaconSender};

/// Accepts one HTTP request, answers 204, and reports its request line.
async fn one_shot_server() -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().expect("listener has an address");
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("failed to accept");
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut chunk).await.expect("failed to read request");
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let request = String::from_utf8_lossy(&buf);
        let request_line = request.lines().next().unwrap_or_default().to_string();
        socket
            .write_all(b"HTTP/1.1 204 No Content\r\ncontent-length: 0\r\n\r\n")
            .await
            .expect("failed to write response");
        let _ = tx.send(request_line);
    });

    (format!("http://{addr}"), rx)
}

#[tokio::test]
async fn beacon_is_sent_as_get_with_query() {
    let (base, request_line) = one_shot_server().await;
    let sender = HttpBeaconSender::new(Duration::from_secs(5)).expect("client should build");

    sender.send(&format!("{base}/collect?type=impression&a%5Bb%5D=1"));
    sender.flush().await;

    let line = tokio::time::timeout(Duration::from_secs(5), request_line)
        .await
        .expect("server should see the request")
        .expect("server task should report");
    assert_eq!(line, "GET /collect?type=impression&a%5Bb%5D=1 HTTP/1.1");
    assert_eq!(sender.in_flight(), 0);
}

#[tokio::test]
async fn failed_beacon_is_dropped_silently() {
    // Bind then drop to get a port nobody listens on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test listener");
        listener.local_addr().expect("listener has an address").port()
    };
    let sender = HttpBeaconSender::new(Duration::from_millis(500)).expect("client should build");

    sender.send(&format!("http://127.0.0.1:{port}/collect?x=1"));
    assert_eq!(sender.in_flight(), 1);
    sender.flush().await;
    assert_eq!(sender.in_flight(), 0);
}
