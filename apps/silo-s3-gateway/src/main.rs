//! Silo S3 Gateway server.
//!
//! Fronts the Silo object store with the AWS S3 REST dialect. This binary
//! wires the request pipeline to an in-memory development backend; a
//! production deployment substitutes the real Silo client and credential
//! center behind the same interfaces.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `S3_GW_LISTEN` | `0.0.0.0:8080` | Bind address |
//! | `S3_GW_DEFAULT_POLICY` | `REP 3` | Fallback placement policy |
//! | `S3_GW_COPIES_NUMBER` | *(empty)* | Default copies-number list |
//! | `S3_GW_DOMAIN` | *(unset)* | Virtual-hosted-style domain |
//! | `S3_GW_LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained filter (overrides `S3_GW_LOG_LEVEL`) |

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use silo_s3_core::notifications::{Event, NotificationTarget, Notifier};
use silo_s3_core::{Gateway, GatewayConfig};
use silo_s3_gateway::{DevAuthCenter, MemoryObjectLayer};
use silo_s3_http::S3HttpService;
use silo_s3_http::metrics::{HealthStatus, set_health};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Gateway version reported in startup logs.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Notification target that writes events to the log; stands in for a
/// message broker in development.
struct LogTarget;

#[async_trait::async_trait]
impl NotificationTarget for LogTarget {
    async fn publish(&self, event: &Event) -> anyhow::Result<()> {
        info!(payload = %serde_json::to_string(event)?, "notification");
        Ok(())
    }
}

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise the configured log level.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Run the accept loop until a shutdown signal, then drain connections.
async fn serve(listener: TcpListener, service: S3HttpService) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                break;
            }
        }
    }

    set_health(HealthStatus::ShuttingDown);
    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = GatewayConfig::from_env();

    init_tracing(&config.log_level)?;
    set_health(HealthStatus::Starting);

    info!(
        listen = %config.listen,
        default_placement_policy = %config.default_placement_policy,
        domain = %config.domain,
        version = VERSION,
        "starting Silo S3 gateway",
    );

    let layer = Arc::new(MemoryObjectLayer::new("silo-dev-owner"));
    let notifier = Notifier::new(vec![Arc::new(LogTarget)]);
    let gateway = Gateway::new(layer, notifier, config.clone());
    let auth = Arc::new(DevAuthCenter::default());
    let service = S3HttpService::new(gateway, auth);

    let addr: SocketAddr = config
        .listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.listen))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    set_health(HealthStatus::Healthy);
    info!(%addr, "listening for connections");

    serve(listener, service).await
}
