//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use ip_gate::config::GateConfig;
use ip_gate::http::HttpServer;
use ip_gate::lifecycle::Shutdown;
use ip_gate::AccessGate;

/// Start a mock upstream that answers every request with `200` and echoes
/// the request line in the body.
pub async fn start_mock_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&buf[..n]);
                let body = format!("upstream: {}", head.lines().next().unwrap_or_default());
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
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

/// A gate server running on an ephemeral port.
pub struct RunningGate {
    pub addr: SocketAddr,
    pub gate: Arc<AccessGate>,
    pub updates: mpsc::UnboundedSender<GateConfig>,
    pub shutdown: Shutdown,
}

/// Start the gate in front of `upstream` with the given allow-list.
pub async fn start_gate(allowed_hosts: &str, upstream: SocketAddr) -> RunningGate {
    let mut config = GateConfig::default();
    config.access.allowed_hosts = Some(allowed_hosts.to_string());
    config.upstream.address = upstream.to_string();
    config.upstream.request_timeout_secs = 5;

    let gate = Arc::new(AccessGate::from_config(&config.access).unwrap());
    let server = HttpServer::new(&config, gate.clone()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (updates, config_updates) = mpsc::unbounded_channel();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    RunningGate {
        addr,
        gate,
        updates,
        shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
