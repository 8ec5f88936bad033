//! Sidecar Server Tests
//!
//! End-to-end over a real socket with the file-backed replica reader:
//! - Serving on a bound listener and stopping on shutdown
//! - Replica snapshot updates observed without restart
//! - Connections that stall before sending headers are closed at the read deadline

use std::fs;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use ctlstore_sidecar::reader::ReplicaReader;
use ctlstore_sidecar::{Sidecar, SidecarConfig};

// =============================================================================
// Test Utilities
// =============================================================================

fn write_replica(dir: &TempDir, names: &[&str]) -> std::path::PathBuf {
    let rows: Vec<_> = names
        .iter()
        .enumerate()
        .map(|(i, name)| json!({"id": i + 1, "name": name}))
        .collect();
    let snapshot = json!({
        "last_update": Utc::now().to_rfc3339(),
        "families": {
            "hr": {
                "people": {"key_columns": ["id"], "rows": rows}
            }
        }
    });

    let path = dir.path().join("replica.json");
    fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();
    path
}

/// Send one HTTP/1.1 request and return the raw response text
async fn send(addr: &str, method: &str, path: &str, body: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "{} {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: sidecar-test\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        method,
        path,
        addr,
        body.len(),
        body
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

fn status_line(response: &str) -> &str {
    response.lines().next().unwrap_or_default()
}

fn body(response: &str) -> &str {
    response.split("\r\n\r\n").nth(1).unwrap_or_default()
}

// =============================================================================
// Serving
// =============================================================================

#[tokio::test]
async fn test_serve_until_shutdown() {
    let dir = TempDir::new().unwrap();
    let replica = ReplicaReader::open(write_replica(&dir, &["Ann", "Bob"]))
        .await
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let sidecar = Sidecar::new(SidecarConfig::with_bind_addr(addr.clone()), replica);
    let server = tokio::spawn(sidecar.serve(listener, async {
        let _ = stop_rx.await;
    }));

    let response = send(&addr, "GET", "/ping", "").await;
    assert!(status_line(&response).contains("200"));

    let response = send(&addr, "POST", "/get-row-by-key/hr/people", r#"{"Key":[{"Value":2}]}"#).await;
    assert!(status_line(&response).contains("200"));
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(body(&response)).unwrap(),
        json!({"id": 2, "name": "Bob"})
    );

    let response = send(&addr, "POST", "/get-row-by-key/hr/people", r#"{"Key":[{"Value":9}]}"#).await;
    assert!(status_line(&response).contains("404"));
    assert!(response.to_ascii_lowercase().contains("x-ctlstore: not found"));

    stop_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_replica_updates_are_served_without_restart() {
    let dir = TempDir::new().unwrap();
    let path = write_replica(&dir, &["Ann"]);
    let replica = ReplicaReader::open(path).await.unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let sidecar = Sidecar::new(SidecarConfig::with_bind_addr(addr.clone()).max_rows(2), replica);
    let server = tokio::spawn(sidecar.serve(listener, async {
        let _ = stop_rx.await;
    }));

    let response = send(&addr, "POST", "/get-rows-by-key-prefix/hr/people", r#"{"Key":[]}"#).await;
    assert!(status_line(&response).contains("200"));

    write_replica(&dir, &["Ann", "Bob", "Cid"]);
    let response = send(&addr, "POST", "/get-rows-by-key-prefix/hr/people", r#"{"Key":[]}"#).await;
    assert!(status_line(&response).contains("500"));
    assert_eq!(body(&response), "max row count (2) exceeded");

    stop_tx.send(()).unwrap();
    assert!(server.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_ledger_latency_from_replica() {
    let dir = TempDir::new().unwrap();
    let replica = ReplicaReader::open(write_replica(&dir, &[])).await.unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let sidecar = Sidecar::new(SidecarConfig::with_bind_addr(addr.clone()), replica);
    let server = tokio::spawn(sidecar.serve(listener, async {
        let _ = stop_rx.await;
    }));

    let response = send(&addr, "GET", "/get-ledger-latency", "").await;
    assert!(status_line(&response).contains("200"));
    let latency: serde_json::Value = serde_json::from_str(body(&response)).unwrap();
    assert_eq!(latency["unit"], "seconds");
    assert!(latency["value"].as_f64().unwrap() < 60.0);

    stop_tx.send(()).unwrap();
    assert!(server.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_stalled_headers_close_at_read_deadline() {
    let dir = TempDir::new().unwrap();
    let replica = ReplicaReader::open(write_replica(&dir, &["Ann"])).await.unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let config = SidecarConfig {
        read_timeout_secs: 1,
        ..SidecarConfig::with_bind_addr(addr.clone())
    };
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(Sidecar::new(config, replica).serve(listener, async {
        let _ = stop_rx.await;
    }));

    // Half a request line, then nothing
    let mut stalled = TcpStream::connect(&addr).await.unwrap();
    stalled.write_all(b"GET /ping HTTP/1.1\r\n").await.unwrap();

    // Connected but silent
    let mut idle = TcpStream::connect(&addr).await.unwrap();

    for stream in [&mut stalled, &mut idle] {
        let mut response = Vec::new();
        let closed =
            tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response)).await;
        assert!(closed.is_ok(), "connection should be closed at the read deadline");
        assert!(response.is_empty());
    }

    // The server keeps serving other clients
    let response = send(&addr, "GET", "/healthcheck", "").await;
    assert!(status_line(&response).contains("200"));

    stop_tx.send(()).unwrap();
    assert!(server.await.unwrap().is_ok());
}
