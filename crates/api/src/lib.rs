//! HTTP API server for user registration.
//!
//! Exposes the user endpoints over the registration saga, with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use registration::{
    DownstreamClient, DownstreamNotifier, InMemoryDownstreamClient, RegistrationOrchestrator,
    UserService,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use user_store::{AuditTrail, InMemoryUserStore, LocalPersistenceUnit, UserStore};

use config::Config;
use routes::users::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, C>(state: Arc<AppState<S, C>>, metrics_handle: PrometheusHandle) -> Router
where
    S: UserStore + 'static,
    C: DownstreamClient + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/user",
            post(routes::users::insert::<S, C>).put(routes::users::update::<S, C>),
        )
        .route("/user/GetAll", get(routes::users::get_all::<S, C>))
        .route(
            "/user/{id}",
            get(routes::users::get_by_id::<S, C>).delete(routes::users::delete::<S, C>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the store, audit trail and downstream client into the application state.
pub fn create_state<S, C>(
    config: &Config,
    store: S,
    audit: Option<Arc<dyn AuditTrail>>,
    client: C,
) -> Arc<AppState<S, C>>
where
    S: UserStore + 'static,
    C: DownstreamClient + 'static,
{
    let mut persistence = LocalPersistenceUnit::new(store);
    if let Some(audit) = audit {
        persistence = persistence.with_audit(audit);
    }

    let mut notifier =
        DownstreamNotifier::new(client, config.retry_policy()).with_fan_out(config.fan_out());
    if let Some(deadline) = config.notify_deadline {
        notifier = notifier.with_deadline(deadline);
    }

    let orchestrator =
        RegistrationOrchestrator::new(Arc::new(persistence), notifier, config.endpoints());
    Arc::new(AppState {
        users: UserService::new(orchestrator),
    })
}

/// Creates the default application state: in-memory store and downstream
/// fakes, no audit trail.
pub fn create_default_state(
    client: InMemoryDownstreamClient,
) -> Arc<AppState<InMemoryUserStore, InMemoryDownstreamClient>> {
    create_state(&Config::default(), InMemoryUserStore::new(), None, client)
}
