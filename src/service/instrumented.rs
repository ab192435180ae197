//! Lifecycle instrumentation around any service.

use std::net::SocketAddr;
use std::time::Instant;

use async_trait::async_trait;

use crate::config::ServiceKind;
use crate::observability::metrics;
use crate::service::{Service, ServiceError};

/// Decorator that logs start/stop, maintains `core_service_up`, and
/// installs the Prometheus exporter when one is configured.
pub struct Instrumented {
    inner: Box<dyn Service>,
    kind: ServiceKind,
    metrics_address: Option<SocketAddr>,
}

impl Instrumented {
    pub fn new(
        inner: Box<dyn Service>,
        kind: ServiceKind,
        metrics_address: Option<SocketAddr>,
    ) -> Self {
        Self {
            inner,
            kind,
            metrics_address,
        }
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }
}

#[async_trait]
impl Service for Instrumented {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn run(self: Box<Self>) -> Result<(), ServiceError> {
        let Self {
            inner,
            kind,
            metrics_address,
        } = *self;
        let name = inner.name().to_string();

        if let Some(addr) = metrics_address {
            metrics::init_metrics(addr)?;
        }

        let started = Instant::now();
        metrics::set_service_up(&name, kind.as_str(), true);
        tracing::info!(service = %name, kind = %kind, "Service running");

        let result = inner.run().await;

        metrics::set_service_up(&name, kind.as_str(), false);
        let elapsed_secs = started.elapsed().as_secs_f64();
        match &result {
            Ok(()) => tracing::info!(service = %name, elapsed_secs, "Service terminated"),
            Err(e) => tracing::error!(service = %name, elapsed_secs, error = %e, "Service failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

    struct Probe {
        runs: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Service for Probe {
        fn name(&self) -> &str {
            "probe"
        }

        async fn run(self: Box<Self>) -> Result<(), ServiceError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(std::io::Error::other("boom").into())
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn delegates_name_and_result() {
        let runs = Arc::new(AtomicUsize::new(0));
        let ok = Instrumented::new(
            Box::new(Probe {
                runs: runs.clone(),
                fail: false,
            }),
            ServiceKind::Echo,
            None,
        );
        assert_eq!(ok.name(), "probe");
        assert_eq!(ok.kind(), ServiceKind::Echo);
        Box::new(ok).run().await.unwrap();

        let failing = Instrumented::new(
            Box::new(Probe {
                runs: runs.clone(),
                fail: true,
            }),
            ServiceKind::Http,
            None,
        );
        let err = Box::new(failing).run().await.unwrap_err();
        assert!(matches!(err, ServiceError::Io(_)));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    fn service_up(snapshotter: &Snapshotter) -> Option<f64> {
        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .find_map(|(key, _, _, value)| match value {
                DebugValue::Gauge(v) if key.key().name() == "core_service_up" => Some(v.into_inner()),
                _ => None,
            })
    }

    /// Records the liveness gauge as seen from inside `run`.
    struct GaugeWatcher {
        snapshotter: Snapshotter,
        seen: Arc<Mutex<Option<f64>>>,
    }

    #[async_trait]
    impl Service for GaugeWatcher {
        fn name(&self) -> &str {
            "watcher"
        }

        async fn run(self: Box<Self>) -> Result<(), ServiceError> {
            *self.seen.lock().unwrap() = service_up(&self.snapshotter);
            Ok(())
        }
    }

    #[test]
    fn service_up_gauge_tracks_run() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let seen = Arc::new(Mutex::new(None));

        let service = Instrumented::new(
            Box::new(GaugeWatcher {
                snapshotter: recorder.snapshotter(),
                seen: seen.clone(),
            }),
            ServiceKind::Http,
            None,
        );

        ::metrics::with_local_recorder(&recorder, || {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap()
                .block_on(Box::new(service).run())
        })
        .unwrap();

        assert_eq!(*seen.lock().unwrap(), Some(1.0));
        assert_eq!(service_up(&snapshotter), Some(0.0));
    }
}
