//! In-memory downstream client for tests and local runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use common::UserId;

use super::{CallResponse, DownstreamClient, Endpoint};
use crate::error::DownstreamError;
use crate::payload::NotificationPayload;

/// How a scripted failure shows up to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    Status(u16),
    Transport,
}

#[derive(Debug, Default)]
struct EndpointState {
    registrations: HashMap<UserId, NotificationPayload>,
    post_attempts: u32,
    deletes: Vec<UserId>,
    /// Remaining posts to fail; `None` fails every post.
    failing_posts: Option<u32>,
    post_failure: Option<FailureMode>,
    fail_on_delete: bool,
}

impl EndpointState {
    fn next_post_failure(&mut self) -> Option<FailureMode> {
        let mode = self.post_failure?;
        match self.failing_posts {
            None => Some(mode),
            Some(0) => None,
            Some(n) => {
                self.failing_posts = Some(n - 1);
                Some(mode)
            }
        }
    }
}

/// In-memory downstream client.
///
/// Keeps, per endpoint name, the registrations it accepted and every
/// delete it received. Failures are scripted per endpoint.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDownstreamClient {
    endpoints: Arc<Mutex<HashMap<String, EndpointState>>>,
}

impl InMemoryDownstreamClient {
    /// Creates a client where every call succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HashMap<String, EndpointState>> {
        self.endpoints.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_endpoint<R>(&self, name: &str, f: impl FnOnce(&mut EndpointState) -> R) -> R {
        let mut endpoints = self.state();
        f(endpoints.entry(name.to_string()).or_default())
    }

    /// Fails the next `count` posts to `endpoint` with `status`.
    pub fn fail_next_posts(&self, endpoint: &str, count: u32, status: u16) {
        self.with_endpoint(endpoint, |s| {
            s.failing_posts = Some(count);
            s.post_failure = Some(FailureMode::Status(status));
        });
    }

    /// Fails every post to `endpoint` with `status`.
    pub fn fail_all_posts(&self, endpoint: &str, status: u16) {
        self.with_endpoint(endpoint, |s| {
            s.failing_posts = None;
            s.post_failure = Some(FailureMode::Status(status));
        });
    }

    /// Fails every post to `endpoint` without producing a response.
    pub fn fail_all_posts_unreachable(&self, endpoint: &str) {
        self.with_endpoint(endpoint, |s| {
            s.failing_posts = None;
            s.post_failure = Some(FailureMode::Transport);
        });
    }

    /// Configures deletes to `endpoint` to answer 500.
    pub fn set_fail_on_delete(&self, endpoint: &str, fail: bool) {
        self.with_endpoint(endpoint, |s| s.fail_on_delete = fail);
    }

    /// Returns the number of post attempts `endpoint` received.
    pub fn post_attempts(&self, endpoint: &str) -> u32 {
        self.with_endpoint(endpoint, |s| s.post_attempts)
    }

    /// Returns the number of registrations `endpoint` currently holds.
    pub fn registration_count(&self, endpoint: &str) -> usize {
        self.with_endpoint(endpoint, |s| s.registrations.len())
    }

    /// Returns the payload `endpoint` holds for `id`.
    pub fn registration(&self, endpoint: &str, id: UserId) -> Option<NotificationPayload> {
        self.with_endpoint(endpoint, |s| s.registrations.get(&id).cloned())
    }

    /// Returns every delete `endpoint` received, in order.
    pub fn deletes(&self, endpoint: &str) -> Vec<UserId> {
        self.with_endpoint(endpoint, |s| s.deletes.clone())
    }
}

#[async_trait]
impl DownstreamClient for InMemoryDownstreamClient {
    async fn post(
        &self,
        endpoint: &Endpoint,
        payload: &NotificationPayload,
    ) -> Result<CallResponse, DownstreamError> {
        self.with_endpoint(&endpoint.name, |s| {
            s.post_attempts += 1;
            match s.next_post_failure() {
                Some(FailureMode::Status(status)) => Ok(CallResponse::new(status)),
                Some(FailureMode::Transport) => Err(DownstreamError::Transport {
                    endpoint: endpoint.name.clone(),
                    reason: "connection refused".to_string(),
                }),
                None => {
                    s.registrations.insert(payload.id, payload.clone());
                    Ok(CallResponse::new(201))
                }
            }
        })
    }

    async fn delete(
        &self,
        endpoint: &Endpoint,
        id: UserId,
    ) -> Result<CallResponse, DownstreamError> {
        self.with_endpoint(&endpoint.name, |s| {
            s.deletes.push(id);
            if s.fail_on_delete {
                return Ok(CallResponse::new(500));
            }
            match s.registrations.remove(&id) {
                Some(_) => Ok(CallResponse::new(204)),
                None => Ok(CallResponse::new(404)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use std::time::Duration;
    use user_store::User;

    use super::*;

    fn payload() -> NotificationPayload {
        NotificationPayload::build(
            &User::new("a@x.com", "Ada", "Lovelace"),
            Utc::now(),
            Duration::from_millis(3),
        )
    }

    #[tokio::test]
    async fn post_and_delete() {
        let client = InMemoryDownstreamClient::new();
        let endpoint = Endpoint::new("a", "http://a");
        let p = payload();

        let response = client.post(&endpoint, &p).await.unwrap();
        assert!(!response.is_failure());
        assert_eq!(client.registration(&endpoint.name, p.id), Some(p.clone()));

        let response = client.delete(&endpoint, p.id).await.unwrap();
        assert_eq!(response.status, 204);
        assert_eq!(client.registration_count("a"), 0);
        assert_eq!(client.deletes("a"), vec![p.id]);

        let again = client.delete(&endpoint, p.id).await.unwrap();
        assert_eq!(again.status, 404);
    }

    #[tokio::test]
    async fn scripted_failures_then_success() {
        let client = InMemoryDownstreamClient::new();
        let endpoint = Endpoint::new("a", "http://a");
        client.fail_next_posts("a", 2, 503);

        assert_eq!(client.post(&endpoint, &payload()).await.unwrap().status, 503);
        assert_eq!(client.post(&endpoint, &payload()).await.unwrap().status, 503);
        assert_eq!(client.post(&endpoint, &payload()).await.unwrap().status, 201);
        assert_eq!(client.post_attempts("a"), 3);
        assert_eq!(client.registration_count("a"), 1);
    }

    #[tokio::test]
    async fn unreachable_endpoint_returns_error() {
        let client = InMemoryDownstreamClient::new();
        let endpoint = Endpoint::new("b", "http://b");
        client.fail_all_posts_unreachable("b");

        let err = client.post(&endpoint, &payload()).await.unwrap_err();
        assert!(matches!(err, DownstreamError::Transport { .. }));
    }

    #[tokio::test]
    async fn endpoints_are_independent() {
        let client = InMemoryDownstreamClient::new();
        client.fail_all_posts("b", 500);

        let a = Endpoint::new("a", "http://a");
        let b = Endpoint::new("b", "http://b");
        assert!(!client.post(&a, &payload()).await.unwrap().is_failure());
        assert!(client.post(&b, &payload()).await.unwrap().is_failure());
    }
}
