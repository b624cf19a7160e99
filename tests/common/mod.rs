//! Shared mock servers for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use detector_client::net::codec::{read_section, write_section, MASK_LAST, TAG_HEADER};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Switches and counters of a mock detection service.
#[derive(Default)]
pub struct MockDetector {
    /// When false, connections are closed instead of answering heartbeats.
    pub alive: AtomicBool,
    pub accepted: AtomicUsize,
    pub heartbeats: AtomicUsize,
}

/// Start a mock detection service answering heartbeats.
pub async fn start_mock_detector() -> (SocketAddr, Arc<MockDetector>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(MockDetector {
        alive: AtomicBool::new(true),
        ..Default::default()
    });

    let shared = state.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            shared.accepted.fetch_add(1, Ordering::SeqCst);
            let state = shared.clone();
            tokio::spawn(async move {
                while let Ok((_tag, _body)) = read_section(&mut socket).await {
                    if !state.alive.load(Ordering::SeqCst) {
                        break;
                    }
                    state.heartbeats.fetch_add(1, Ordering::SeqCst);
                    if write_section(&mut socket, TAG_HEADER | MASK_LAST, b"").await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    (addr, state)
}

/// Address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Start an HTTP backend answering every request with the given status and body.
pub async fn start_http_backend(status: u16, body: &'static str) -> SocketAddr {
    start_switchable_http_backend(Arc::new(AtomicBool::new(true)), status, body).await
}

/// Answers 200 while `up` is set, `status`/`body` otherwise.
pub async fn start_switchable_http_backend(
    up: Arc<AtomicBool>,
    status: u16,
    body: &'static str,
) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let up = up.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                let (status, body) = if up.load(Ordering::SeqCst) {
                    (200, "ok")
                } else {
                    (status, body)
                };
                let status_text = match status {
                    200 => "200 OK",
                    404 => "404 Not Found",
                    500 => "500 Internal Server Error",
                    503 => "503 Service Unavailable",
                    _ => "502 Bad Gateway",
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}
