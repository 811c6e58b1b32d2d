//! Gateway server setup and lifecycle.
//!
//! # Responsibilities
//! - Build the accept and request worker runtimes
//! - Bind the plaintext and secured listeners (port 0 disables one)
//! - Run accept loops and hand connections to the worker runtime
//! - Coordinate graceful shutdown and connection draining
//!
//! # Design Decisions
//! - The API is synchronous: the gateway owns its runtimes, so callers
//!   must not drive it from inside another async runtime
//! - Accepted sockets are re-registered with the worker runtime so their
//!   I/O is driven by the pool that runs the pipeline
//! - The service registry is frozen into an `Arc` at start

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;

use crate::config::validation::{validate_config, ValidationError};
use crate::config::GatewayConfig;
use crate::http::dispatcher::Dispatcher;
use crate::http::pipeline::Pipeline;
use crate::lifecycle::{signals, Shutdown, ShutdownSignal};
use crate::net::connection::{ConnectionContext, ConnectionTracker};
use crate::net::listener::{Listener, ListenerError, Scheme};
use crate::net::tls::{self, TlsError};
use crate::observability::metrics;
use crate::routing::ServiceRegistry;
use crate::security::FramingLimits;

/// Time given to runtime threads to stop after draining.
const RUNTIME_STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause after a failed accept, so resource exhaustion does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Errors that abort gateway startup.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid configuration: {}", format_errors(.0))]
    InvalidConfig(Vec<ValidationError>),

    #[error("failed to build {name} runtime: {source}")]
    Runtime {
        name: &'static str,
        source: io::Error,
    },

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error(transparent)]
    Tls(#[from] TlsError),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A running gateway.
pub struct Gateway {
    accept_runtime: Runtime,
    worker_runtime: Runtime,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
    accept_tasks: Vec<JoinHandle<()>>,
    http_addr: Option<SocketAddr>,
    https_addr: Option<SocketAddr>,
    grace: Duration,
}

impl Gateway {
    /// Bind the configured listeners and start serving.
    pub fn start(config: GatewayConfig, registry: ServiceRegistry) -> Result<Self, GatewayError> {
        validate_config(&config).map_err(GatewayError::InvalidConfig)?;

        let accept_runtime = build_runtime("accept", config.workers.accept_workers())?;
        let worker_runtime = build_runtime("worker", config.workers.request_workers())?;

        if config.observability.metrics_enabled {
            match config.observability.metrics_address.parse() {
                Ok(addr) => {
                    let _enter = worker_runtime.enter();
                    metrics::init_metrics(addr);
                }
                Err(_) => tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                ),
            }
        }

        let limits = FramingLimits::from_config(&config.limits);
        let idle_timeout = config.timeouts.idle_read();

        let mut listeners = Vec::new();
        let host = config.listener.host.as_str();
        if config.listener.http_port != 0 {
            let listener =
                accept_runtime.block_on(Listener::bind(host, config.listener.http_port, Scheme::Http))?;
            listeners.push((listener, Pipeline::plain(limits, idle_timeout)));
        }
        let https_port = config.listener.https_port;
        if let Some(tls_config) = config.listener.tls.as_ref().filter(|_| https_port != 0) {
            let acceptor = tls::build_acceptor(tls_config)?;
            let listener =
                accept_runtime.block_on(Listener::bind(host, https_port, Scheme::Https))?;
            listeners.push((listener, Pipeline::secured(acceptor, limits, idle_timeout)));
        }

        tracing::info!(
            services = ?registry.names().collect::<Vec<_>>(),
            accept_workers = config.workers.accept_workers(),
            request_workers = config.workers.request_workers(),
            "Gateway starting"
        );

        let shutdown = Shutdown::new();
        let tracker = ConnectionTracker::new();
        let dispatcher = Dispatcher::new(Arc::new(registry));

        let mut http_addr = None;
        let mut https_addr = None;
        let mut accept_tasks = Vec::with_capacity(listeners.len());
        for (listener, pipeline) in listeners {
            match listener.scheme() {
                Scheme::Http => http_addr = Some(listener.local_addr()),
                Scheme::Https => https_addr = Some(listener.local_addr()),
            }
            let acceptor = Acceptor {
                listener,
                pipeline: Arc::new(pipeline),
                dispatcher: dispatcher.clone(),
                tracker: tracker.clone(),
                shutdown: shutdown.clone(),
                workers: worker_runtime.handle().clone(),
            };
            accept_tasks.push(accept_runtime.spawn(acceptor.run()));
        }

        Ok(Self {
            accept_runtime,
            worker_runtime,
            shutdown,
            tracker,
            accept_tasks,
            http_addr,
            https_addr,
            grace: config.timeouts.shutdown_grace(),
        })
    }

    /// Bound address of the plaintext listener, if enabled.
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http_addr
    }

    /// Bound address of the secured listener, if enabled.
    pub fn https_addr(&self) -> Option<SocketAddr> {
        self.https_addr
    }

    /// Handle that stops the gateway from any thread.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Number of connections currently open.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Trigger shutdown on SIGINT or SIGTERM.
    pub fn shutdown_on_signal(&self) {
        let shutdown = self.shutdown.clone();
        self.accept_runtime.spawn(async move {
            signals::wait_for_signal().await;
            shutdown.trigger();
        });
    }

    /// Block the calling thread until shutdown is triggered.
    pub fn wait_for_shutdown(&self) {
        let mut signal = self.shutdown.subscribe();
        self.accept_runtime.block_on(signal.recv());
    }

    /// Stop accepting, drain open connections within the grace period,
    /// then stop both runtimes.
    pub fn shutdown(self) {
        self.shutdown.trigger();

        let accept_tasks = self.accept_tasks;
        self.accept_runtime.block_on(async {
            for task in accept_tasks {
                let _ = task.await;
            }
        });

        let grace = self.grace;
        let drained = self
            .worker_runtime
            .block_on(self.tracker.wait_for_drain(grace));
        if drained {
            tracing::info!("All connections drained");
        } else {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                grace = ?grace,
                "Grace period elapsed with connections still open"
            );
        }

        self.accept_runtime.shutdown_timeout(RUNTIME_STOP_TIMEOUT);
        self.worker_runtime.shutdown_timeout(RUNTIME_STOP_TIMEOUT);
        tracing::info!("Gateway stopped");
    }
}

fn build_runtime(name: &'static str, threads: usize) -> Result<Runtime, GatewayError> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(threads)
        .thread_name(format!("gateway-{name}"))
        .enable_all()
        .build()
        .map_err(|source| GatewayError::Runtime { name, source })
}

/// One listener's accept loop.
struct Acceptor {
    listener: Listener,
    pipeline: Arc<Pipeline>,
    dispatcher: Dispatcher,
    tracker: ConnectionTracker,
    shutdown: Shutdown,
    workers: Handle,
}

impl Acceptor {
    async fn run(self) {
        let mut signal: ShutdownSignal = self.shutdown.subscribe();
        loop {
            let accepted = tokio::select! {
                accepted = self.listener.accept() => accepted,
                _ = signal.recv() => break,
            };
            match accepted {
                Ok((stream, peer)) => self.hand_off(stream, peer),
                Err(e) => {
                    tracing::warn!(
                        scheme = %self.listener.scheme(),
                        error = %e,
                        "Accept failed"
                    );
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
        tracing::info!(
            address = %self.listener.local_addr(),
            scheme = %self.listener.scheme(),
            "Listener stopped accepting"
        );
    }

    fn hand_off(&self, stream: TcpStream, peer: SocketAddr) {
        let stream = match stream.into_std() {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(peer_addr = %peer, error = %e, "Failed to detach accepted socket");
                return;
            }
        };

        let connection = ConnectionContext::new(peer, self.listener.local_addr());
        let guard = self.tracker.track(connection.id());
        let pipeline = Arc::clone(&self.pipeline);
        let dispatcher = self.dispatcher.clone();
        let signal = self.shutdown.subscribe();

        self.workers.spawn(async move {
            let _guard = guard;
            match TcpStream::from_std(stream) {
                Ok(stream) => pipeline.run(stream, connection, &dispatcher, signal).await,
                Err(e) => tracing::warn!(
                    connection_id = %connection.id(),
                    error = %e,
                    "Failed to register socket with worker runtime"
                ),
            }
        });
    }
}
