//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use core_service::config::{CoreConfig, Environment};
use core_service::{Service, ServiceError};
use tokio::net::TcpStream;

/// Validated config for a service on `addr` plus any extra keys.
#[allow(dead_code)]
pub fn config_for(addr: SocketAddr, extra: &[(&str, &str)]) -> CoreConfig {
    let bind = addr.to_string();
    let mut pairs = vec![("CORE_BIND_ADDRESS", bind.as_str())];
    pairs.extend_from_slice(extra);
    CoreConfig::from_env(&Environment::from_pairs(pairs)).expect("test config is valid")
}

/// Wait until something accepts TCP connections on `addr`.
#[allow(dead_code)]
pub async fn wait_for_listener(addr: SocketAddr) {
    for _ in 0..100 {
        if TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("nothing listening on {}", addr);
}

/// Service double that counts `run` calls and returns a scripted outcome.
#[allow(dead_code)]
pub struct ScriptedService {
    pub runs: Arc<AtomicUsize>,
    pub fail_with: Option<&'static str>,
}

#[async_trait]
impl Service for ScriptedService {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn run(self: Box<Self>) -> Result<(), ServiceError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        match self.fail_with {
            Some(message) => Err(std::io::Error::other(message).into()),
            None => Ok(()),
        }
    }
}
