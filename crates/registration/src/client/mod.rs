//! Downstream service client trait and implementations.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use common::UserId;
use serde::{Deserialize, Serialize};

use crate::error::DownstreamError;
use crate::payload::NotificationPayload;

pub use http::HttpDownstreamClient;
pub use memory::InMemoryDownstreamClient;

/// A downstream service notified of new registrations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Short name used in logs and failure messages.
    pub name: String,
    /// Base URL. Registrations are POSTed here; compensation DELETEs `<url>/<id>`.
    pub url: String,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Returns the URL used to retract the registration of `id`.
    pub fn delete_url(&self, id: UserId) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), id)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Response of a downstream call that reached the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallResponse {
    pub status: u16,
}

impl CallResponse {
    pub fn new(status: u16) -> Self {
        Self { status }
    }

    /// Returns true for status codes >= 400.
    pub fn is_failure(&self) -> bool {
        self.status >= 400
    }
}

/// Trait for calls to downstream services.
///
/// Implementations report a non-2xx/3xx answer as `Ok` with that status;
/// `Err` is reserved for calls that produced no response at all.
#[async_trait]
pub trait DownstreamClient: Send + Sync {
    /// Sends the registration payload to `endpoint`.
    async fn post(
        &self,
        endpoint: &Endpoint,
        payload: &NotificationPayload,
    ) -> Result<CallResponse, DownstreamError>;

    /// Retracts the registration of `id` from `endpoint`.
    async fn delete(&self, endpoint: &Endpoint, id: UserId)
    -> Result<CallResponse, DownstreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_url_joins_without_double_slash() {
        let id = UserId::new();
        let a = Endpoint::new("a", "http://svc-a/users/");
        let b = Endpoint::new("b", "http://svc-b/users");
        assert_eq!(a.delete_url(id), format!("http://svc-a/users/{id}"));
        assert_eq!(b.delete_url(id), format!("http://svc-b/users/{id}"));
    }

    #[test]
    fn failure_threshold_is_400() {
        assert!(!CallResponse::new(200).is_failure());
        assert!(!CallResponse::new(399).is_failure());
        assert!(CallResponse::new(400).is_failure());
        assert!(CallResponse::new(503).is_failure());
    }
}
