//! API server entry point.

use std::error::Error;
use std::sync::Arc;

use api::config::{Config, LogFormat};
use metrics_exporter_prometheus::PrometheusHandle;
use registration::{DownstreamClient, HttpDownstreamClient, InMemoryDownstreamClient};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use user_store::{
    AuditTrail, InMemoryUserStore, JsonFileAuditTrail, PostgresUserStore, UserStore,
};

type BoxError = Box<dyn Error + Send + Sync>;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let json = config.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

async fn serve<S, C>(
    config: &Config,
    store: S,
    audit: Option<Arc<dyn AuditTrail>>,
    client: C,
    metrics_handle: PrometheusHandle,
) -> Result<(), BoxError>
where
    S: UserStore + 'static,
    C: DownstreamClient + 'static,
{
    let state = api::create_state(config, store, audit, client);
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn serve_with_client<S>(
    config: &Config,
    store: S,
    audit: Option<Arc<dyn AuditTrail>>,
    metrics_handle: PrometheusHandle,
) -> Result<(), BoxError>
where
    S: UserStore + 'static,
{
    if config.uses_http_downstream() {
        let client = HttpDownstreamClient::new(config.downstream_timeout)?;
        serve(config, store, audit, client, metrics_handle).await
    } else {
        tracing::warn!("downstream URLs not fully configured, using in-memory downstream services");
        serve(config, store, audit, InMemoryDownstreamClient::new(), metrics_handle).await
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("failed to install Prometheus recorder: {e}"))?;

    // 3. Open the audit trail
    let audit: Option<Arc<dyn AuditTrail>> = match &config.audit_file {
        Some(path) => {
            tracing::info!(path = %path.display(), "audit trail enabled");
            Some(Arc::new(JsonFileAuditTrail::open(path.clone()).await?))
        }
        None => {
            tracing::warn!("audit trail disabled");
            None
        }
    };

    // 4. Pick the primary store and start serving
    match config.database_url.clone() {
        Some(url) => {
            let store = PostgresUserStore::connect(&url).await?;
            store.run_migrations().await?;
            tracing::info!("connected to PostgreSQL");
            serve_with_client(&config, store, audit, metrics_handle).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            serve_with_client(&config, InMemoryUserStore::new(), audit, metrics_handle).await
        }
    }
}
