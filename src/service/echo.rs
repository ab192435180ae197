//! Bounded TCP echo service.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::{CoreConfig, ListenerConfig, TimeoutConfig};
use crate::lifecycle::{signals, Shutdown};
use crate::net::{ConnectionGuard, ConnectionPermit, ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::service::{Service, ServiceError};

const BUFFER_SIZE: usize = 8 * 1024;

/// Echoes every byte back to the sender.
pub struct EchoService {
    name: String,
    listener: ListenerConfig,
    timeouts: TimeoutConfig,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
}

impl EchoService {
    /// Create a new echo service from validated configuration.
    pub fn new(config: &CoreConfig, shutdown: Shutdown) -> Self {
        Self {
            name: config.service.name.clone(),
            listener: config.listener.clone(),
            timeouts: config.timeouts.clone(),
            shutdown,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Handle that stops this service when triggered.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Tracker for connections opened by this service.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    async fn accept_loop(&self, listener: &Listener) {
        let idle = Duration::from_secs(self.timeouts.idle_secs);
        let mut shutdown_rx = self.shutdown.subscribe();
        if self.shutdown.is_triggered() {
            return;
        }

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let guard = self.tracker.track();
                        let shutdown = self.shutdown.clone();
                        tokio::spawn(handle_connection(stream, peer, permit, guard, idle, shutdown));
                    }
                    Err(ListenerError::Closed) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        // Persistent accept errors (e.g. EMFILE) would otherwise spin.
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
                _ = shutdown_rx.recv() => break,
            }
        }
    }
}

#[async_trait]
impl Service for EchoService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(self: Box<Self>) -> Result<(), ServiceError> {
        let listener = Listener::bind(&self.listener).await?;
        tracing::info!(
            service = %self.name,
            address = %self.listener.bind_address,
            max_connections = listener.max_connections(),
            idle_secs = self.timeouts.idle_secs,
            "Echo service starting"
        );

        let signal_task = signals::shutdown_on_signal(self.shutdown.clone());

        self.accept_loop(&listener).await;
        drop(listener);

        let open = self.tracker.active_count();
        tracing::info!(open_connections = open, "Stopped accepting; draining connections");

        let remaining = self
            .tracker
            .drain(Duration::from_secs(self.timeouts.shutdown_secs))
            .await;
        if remaining > 0 {
            tracing::warn!(
                open_connections = remaining,
                grace_secs = self.timeouts.shutdown_secs,
                "Connections still open at shutdown deadline"
            );
        }

        signal_task.abort();
        tracing::info!(service = %self.name, "Echo service stopped");
        Ok(())
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    _permit: ConnectionPermit,
    guard: ConnectionGuard,
    idle: Duration,
    shutdown: Shutdown,
) {
    let id = guard.id();
    tracing::debug!(connection_id = %id, peer_addr = %peer, "Connection opened");

    let mut shutdown_rx = shutdown.subscribe();
    if shutdown.is_triggered() {
        return;
    }

    let mut buf = vec![0u8; BUFFER_SIZE];
    let mut echoed: u64 = 0;

    loop {
        let read = tokio::select! {
            read = tokio::time::timeout(idle, stream.read(&mut buf)) => read,
            _ = shutdown_rx.recv() => {
                tracing::debug!(connection_id = %id, "Closing connection for shutdown");
                break;
            }
        };

        let n = match read {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                tracing::debug!(connection_id = %id, error = %e, "Read failed");
                break;
            }
            Err(_) => {
                tracing::debug!(connection_id = %id, idle_secs = idle.as_secs(), "Idle timeout");
                break;
            }
        };

        if let Err(e) = stream.write_all(&buf[..n]).await {
            tracing::debug!(connection_id = %id, error = %e, "Write failed");
            break;
        }
        echoed += n as u64;
        metrics::record_echo_bytes(n as u64);
    }

    let _ = stream.shutdown().await;
    tracing::debug!(connection_id = %id, bytes = echoed, "Connection finished");
}
