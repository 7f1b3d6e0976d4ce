//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use app_harness::config::ListenerConfig;
use app_harness::AppConfig;
use tokio::net::TcpStream;

/// Configuration listening on a fixed loopback port.
pub fn config_on(port: u16) -> AppConfig {
    AppConfig {
        listener: ListenerConfig {
            network: "tcp".into(),
            address: format!("127.0.0.1:{port}"),
        },
        ..AppConfig::default()
    }
}

/// Poll until something accepts connections on `addr`.
pub async fn wait_for_port(addr: &str) -> Result<(), String> {
    for _ in 0..100 {
        if TcpStream::connect(addr).await.is_ok() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Err(format!("nothing listening on {addr}"))
}

/// Client that never reuses connections, so shutdown is not held up.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
