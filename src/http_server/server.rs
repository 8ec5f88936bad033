//! # Sidecar Server
//!
//! Composes the routes, latency instrumentation, error translation and a
//! configured reader into one serving entity.

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use super::config::SidecarConfig;
use super::errors::StartupError;
use super::sidecar_routes::{sidecar_routes, SidecarState};
use crate::observability::{ApiMetrics, LatencyRecorder, Logger};
use crate::reader::Reader;

/// Pause after a failed accept, e.g. when the process is out of file descriptors
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Read-only HTTP sidecar in front of a [`Reader`]
pub struct Sidecar<R: Reader> {
    config: SidecarConfig,
    state: Arc<SidecarState<R>>,
}

impl<R: Reader> Sidecar<R> {
    /// Create a sidecar recording latency into a fresh [`ApiMetrics`]
    pub fn new(config: SidecarConfig, reader: R) -> Self {
        Self::with_recorder(config, reader, Arc::new(ApiMetrics::new()))
    }

    /// Create a sidecar recording latency into `recorder`
    pub fn with_recorder(
        config: SidecarConfig,
        reader: R,
        recorder: Arc<dyn LatencyRecorder>,
    ) -> Self {
        let state = Arc::new(SidecarState::new(reader, &config, recorder));
        Self { config, state }
    }

    pub fn config(&self) -> &SidecarConfig {
        &self.config
    }

    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }

    /// Build the router. Each handler runs under the write deadline.
    pub fn router(&self) -> Router {
        sidecar_routes(self.state.clone())
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn start(self) -> Result<(), StartupError> {
        self.start_until(shutdown_signal()).await
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn start_until<F>(self, shutdown: F) -> Result<(), StartupError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.config.validate()?;
        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .map_err(|source| StartupError::Bind {
                addr: self.config.bind_addr.clone(),
                source,
            })?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    ///
    /// Connections that do not deliver their request headers within the read
    /// deadline are closed. On shutdown the listener stops accepting and every
    /// open connection finishes its current request before this returns.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), StartupError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr().map_err(StartupError::Serve)?.to_string();
        let max_rows = self.config.max_rows.to_string();
        Logger::info(
            "SIDECAR_START",
            &[
                ("bind_addr", local_addr.as_str()),
                ("max_rows", max_rows.as_str()),
            ],
        );

        let mut connections = http1::Builder::new();
        connections
            .timer(TokioTimer::new())
            .header_read_timeout(self.config.read_timeout());
        let router = self.router();

        let (stop_tx, stop_rx) = watch::channel(());
        let (open_tx, open_rx) = watch::channel(());
        let mut shutdown = pin!(shutdown);

        loop {
            let stream = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        let err = e.to_string();
                        Logger::warn("ACCEPT_FAILED", &[("err", err.as_str())]);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                },
                _ = &mut shutdown => break,
            };

            tokio::spawn(serve_connection(
                &connections,
                stream,
                router.clone(),
                stop_rx.clone(),
                open_rx.clone(),
            ));
        }

        drop(listener);
        drop(open_rx);
        let _ = stop_tx.send(());
        open_tx.closed().await;

        Logger::info("SIDECAR_STOP", &[("bind_addr", local_addr.as_str())]);
        Ok(())
    }
}

/// Drive one connection to completion. A stop signal lets the request in
/// progress finish and then closes the connection. `open` is dropped when
/// the connection ends.
fn serve_connection(
    connections: &http1::Builder,
    stream: TcpStream,
    router: Router,
    mut stop: watch::Receiver<()>,
    open: watch::Receiver<()>,
) -> impl Future<Output = ()> + Send + 'static {
    let connection =
        connections.serve_connection(TokioIo::new(stream), TowerToHyperService::new(router));

    async move {
        let _open = open;
        let mut connection = pin!(connection);
        let mut stopping = false;
        loop {
            tokio::select! {
                result = connection.as_mut() => {
                    if let Err(e) = result {
                        let err = e.to_string();
                        Logger::trace("CONNECTION_CLOSED", &[("err", err.as_str())]);
                    }
                    break;
                }
                _ = stop.changed(), if !stopping => {
                    stopping = true;
                    connection.as_mut().graceful_shutdown();
                }
            }
        }
    }
}

async fn shutdown_signal() {
    // If the signal handler cannot be installed, serve until the process is killed.
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
