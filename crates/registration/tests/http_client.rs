//! Tests for the reqwest client against a local axum server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, post};
use axum::{Json, Router};
use chrono::Utc;
use common::UserId;
use registration::{
    DownstreamClient, DownstreamError, DownstreamNotifier, Endpoint, HttpDownstreamClient,
    NotificationPayload, RetryPolicy,
};
use user_store::User;

#[derive(Clone, Default)]
struct Received {
    posts: Arc<Mutex<Vec<NotificationPayload>>>,
    deletes: Arc<Mutex<Vec<String>>>,
}

async fn accept(State(r): State<Received>, Json(payload): Json<NotificationPayload>) -> StatusCode {
    r.posts.lock().unwrap().push(payload);
    StatusCode::CREATED
}

async fn retract(State(r): State<Received>, Path(id): Path<String>) -> StatusCode {
    r.deletes.lock().unwrap().push(id);
    StatusCode::NO_CONTENT
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn hang() -> StatusCode {
    tokio::time::sleep(Duration::from_secs(5)).await;
    StatusCode::OK
}

/// Starts a downstream service on an ephemeral port and returns its base URL.
async fn spawn_service() -> (String, Received) {
    let received = Received::default();
    let app = Router::new()
        .route("/users", post(accept))
        .route("/users/{id}", delete(retract))
        .route("/broken", post(broken))
        .route("/slow", post(hang))
        .with_state(received.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), received)
}

fn payload() -> NotificationPayload {
    NotificationPayload::build(
        &User::new("a@x.com", "Ada", "Lovelace"),
        Utc::now(),
        Duration::from_millis(12),
    )
}

#[tokio::test]
async fn post_sends_json_payload() {
    let (base, received) = spawn_service().await;
    let client = HttpDownstreamClient::new(Duration::from_secs(2)).unwrap();
    let endpoint = Endpoint::new("a", format!("{base}/users"));
    let payload = payload();

    let response = client.post(&endpoint, &payload).await.unwrap();

    assert_eq!(response.status, 201);
    assert_eq!(*received.posts.lock().unwrap(), vec![payload]);
}

#[tokio::test]
async fn delete_targets_id_under_endpoint_url() {
    let (base, received) = spawn_service().await;
    let client = HttpDownstreamClient::new(Duration::from_secs(2)).unwrap();
    let endpoint = Endpoint::new("a", format!("{base}/users/"));
    let id = UserId::new();

    let response = client.delete(&endpoint, id).await.unwrap();

    assert_eq!(response.status, 204);
    assert_eq!(*received.deletes.lock().unwrap(), vec![id.to_string()]);
}

#[tokio::test]
async fn failing_status_is_returned_not_raised() {
    let (base, _) = spawn_service().await;
    let client = HttpDownstreamClient::new(Duration::from_secs(2)).unwrap();
    let endpoint = Endpoint::new("a", format!("{base}/broken"));

    let response = client.post(&endpoint, &payload()).await.unwrap();

    assert!(response.is_failure());
    assert_eq!(response.status, 500);
}

#[tokio::test]
async fn hung_service_times_out_at_transport() {
    let (base, _) = spawn_service().await;
    let client = HttpDownstreamClient::new(Duration::from_millis(100)).unwrap();
    let endpoint = Endpoint::new("a", format!("{base}/slow"));

    let err = client.post(&endpoint, &payload()).await.unwrap_err();

    assert_eq!(
        err,
        DownstreamError::Timeout {
            endpoint: "a".to_string()
        }
    );
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let client = HttpDownstreamClient::new(Duration::from_secs(1)).unwrap();
    // Port 9 (discard) on localhost is assumed closed in test environments.
    let endpoint = Endpoint::new("a", "http://127.0.0.1:9/users");

    let err = client.post(&endpoint, &payload()).await.unwrap_err();

    assert!(matches!(err, DownstreamError::Transport { .. }));
}

#[tokio::test]
async fn notifier_retries_over_http() {
    let (base, received) = spawn_service().await;
    let notifier = DownstreamNotifier::new(
        HttpDownstreamClient::new(Duration::from_secs(2)).unwrap(),
        RetryPolicy::new(3),
    );
    let endpoints = vec![
        Endpoint::new("a", format!("{base}/users")),
        Endpoint::new("b", format!("{base}/broken")),
    ];

    let outcomes = notifier.notify(&payload(), &endpoints).await;

    assert!(outcomes[0].succeeded);
    assert_eq!(outcomes[0].attempts, 1);
    assert!(!outcomes[1].succeeded);
    assert_eq!(outcomes[1].attempts, 3);
    assert_eq!(outcomes[1].error.as_deref(), Some("b: returned status 500"));
    assert_eq!(received.posts.lock().unwrap().len(), 1);
}
