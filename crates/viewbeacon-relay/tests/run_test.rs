use std::io::Write;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use viewbeacon_relay::config::Config;
use viewbeacon_relay::replay::ReplayError;
use viewbeacon_relay::RelayError;

/// Answers every request with 204 and records its request line before
/// responding.
async fn collecting_server() -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().expect("listener has an address");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let record = Arc::clone(&record);
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&buf);
                let request_line = request.lines().next().unwrap_or_default().to_string();
                record.lock().unwrap().push(request_line);
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 204 No Content\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                    )
                    .await;
            });
        }
    });

    (format!("http://{addr}/collect?"), seen)
}

#[tokio::test]
async fn pending_geometry_beacon_is_sent_before_run_returns() {
    let (log_server, seen) = collecting_server().await;

    let mut log = tempfile::NamedTempFile::new().expect("failed to create event log");
    writeln!(
        log,
        r#"{{"adSessionId":"s1","timestamp":0,"type":"geometryChange","data":{{"adView":{{"percentageInView":80}}}}}}"#
    )
    .expect("failed to write event log");

    let mut config = Config::default();
    config.relay.log_server = log_server;
    config.relay.confirm_delay_ms = 200;
    config.replay.input = Some(log.path().to_string_lossy().into_owned());

    let stats = viewbeacon_relay::run(&config).await.expect("run should succeed");

    assert_eq!(stats.delivered, 1);
    let requests = seen.lock().unwrap().clone();
    assert_eq!(requests.len(), 3, "requests: {requests:?}");
    assert!(requests.iter().any(|line| line.contains("omidVersion=")));
    assert!(requests.iter().any(|line| line.contains("supported=yes")));
    let geometry = requests
        .iter()
        .find(|line| line.contains("type=geometryChange"))
        .expect("confirmed geometry event should be sent");
    assert!(geometry.starts_with("GET /collect?adSessionId=s1&"));
    assert!(geometry.contains("data%5BadView%5D%5BpercentageInView%5D=80"));
    assert!(geometry.contains("&rawJSON="));
}

#[tokio::test]
async fn missing_event_log_fails_to_open() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("absent.ndjson");

    let mut config = Config::default();
    config.relay.log_server = "http://127.0.0.1:9/collect?".to_string();
    config.replay.input = Some(path.to_string_lossy().into_owned());

    let err = viewbeacon_relay::run(&config)
        .await
        .expect_err("a missing event log should abort the run");

    match err {
        RelayError::Replay(ReplayError::Open { path: reported, .. }) => {
            assert!(reported.ends_with("absent.ndjson"));
        }
        other => panic!("expected an open error, got {other:?}"),
    }
}
