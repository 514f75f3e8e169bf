//! vigil integration test harness.
//!
//! End-to-end tests run the real components in-process over localhost
//! sockets: the supervisor's control server, the relay's receive/forward
//! loop, the watcher's sender, and the kill link. OS child processes are
//! stood in by `sleep`/`sh` so supervision paths run against real PIDs
//! without needing the workspace binaries on $PATH.
//!
//! Each test reserves its own loopback ports; tests are independent.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, UdpSocket};

use vigil_core::config::VigilConfig;

mod framing;
mod lifecycle;
mod teardown;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Reserve a loopback TCP address by binding an ephemeral port, then
/// releasing it for the component under test.
pub async fn reserved_tcp_addr() -> SocketAddr {
    let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = probe.local_addr().unwrap();
    drop(probe);
    addr
}

/// Reserve a loopback UDP address the same way.
pub async fn reserved_udp_addr() -> SocketAddr {
    let probe = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = probe.local_addr().unwrap();
    drop(probe);
    addr
}

/// Config with every endpoint on a fresh loopback port and timings cut
/// down to test scale. Child commands are OS stand-ins; the protocol
/// peers run in-process.
pub async fn localhost_config() -> VigilConfig {
    let mut config = VigilConfig::default();
    config.endpoints.control_addr = reserved_tcp_addr().await;
    config.endpoints.kill_addr = reserved_tcp_addr().await;
    config.endpoints.image_addr = reserved_udp_addr().await;
    config.commands.relay = vec!["sleep".to_string(), "300".to_string()];
    config.commands.watcher = vec!["sleep".to_string(), "300".to_string()];
    config.watcher.send_interval_secs = 0;
    config.watcher.poll_interval_ms = 1;
    config.supervise.grace_secs = 2;
    config.supervise.poll_ms = 50;
    config
}

/// Await a future with the harness-wide patience bound.
pub async fn within<T, F: std::future::Future<Output = T>>(what: &str, fut: F) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
}
