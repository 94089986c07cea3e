//! Fan-out of the registration payload to downstream endpoints.

use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;

use crate::client::{DownstreamClient, Endpoint};
use crate::error::DownstreamError;
use crate::payload::NotificationPayload;
use crate::retry::RetryPolicy;

/// How the notifier issues calls to several endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FanOut {
    /// One endpoint after the other, in the given order.
    #[default]
    Sequential,
    /// All endpoints at once, joined before returning.
    Concurrent,
}

/// What happened when notifying one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointOutcome {
    pub endpoint: Endpoint,
    pub succeeded: bool,
    pub error: Option<String>,
    pub attempts: u32,
}

/// Sends a payload to each endpoint, each call wrapped by the retry policy.
///
/// The notifier only reports outcomes; deciding what to undo is left to the
/// compensation step.
pub struct DownstreamNotifier<C: DownstreamClient> {
    client: C,
    retry: RetryPolicy,
    fan_out: FanOut,
    deadline: Option<Duration>,
}

impl<C: DownstreamClient> DownstreamNotifier<C> {
    pub fn new(client: C, retry: RetryPolicy) -> Self {
        Self {
            client,
            retry,
            fan_out: FanOut::default(),
            deadline: None,
        }
    }

    pub fn with_fan_out(mut self, fan_out: FanOut) -> Self {
        self.fan_out = fan_out;
        self
    }

    /// Bounds the total time spent on one endpoint, retries included.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Notifies every endpoint and returns one outcome per endpoint, in the
    /// order the endpoints were given.
    #[tracing::instrument(skip(self, payload, endpoints), fields(user_id = %payload.id, fan_out = ?self.fan_out))]
    pub async fn notify(
        &self,
        payload: &NotificationPayload,
        endpoints: &[Endpoint],
    ) -> Vec<EndpointOutcome> {
        match self.fan_out {
            FanOut::Sequential => {
                let mut outcomes = Vec::with_capacity(endpoints.len());
                for endpoint in endpoints {
                    outcomes.push(self.notify_one(payload, endpoint).await);
                }
                outcomes
            }
            FanOut::Concurrent => {
                join_all(endpoints.iter().map(|e| self.notify_one(payload, e))).await
            }
        }
    }

    async fn notify_one(&self, payload: &NotificationPayload, endpoint: &Endpoint) -> EndpointOutcome {
        let call = self.retry.execute(|| self.client.post(endpoint, payload));
        let outcome = match self.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let error = DownstreamError::DeadlineExceeded {
                        endpoint: endpoint.name.clone(),
                        deadline_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                    };
                    return failed(endpoint, error, 0);
                }
            },
            None => call.await,
        };

        match outcome.result {
            Ok(response) if !response.is_failure() => {
                metrics::counter!("downstream_notifications_total", "outcome" => "success")
                    .increment(1);
                EndpointOutcome {
                    endpoint: endpoint.clone(),
                    succeeded: true,
                    error: None,
                    attempts: outcome.attempts,
                }
            }
            Ok(response) => {
                let error = DownstreamError::Status {
                    endpoint: endpoint.name.clone(),
                    status: response.status,
                };
                failed(endpoint, error, outcome.attempts)
            }
            Err(error) => failed(endpoint, error, outcome.attempts),
        }
    }
}

fn failed(endpoint: &Endpoint, error: DownstreamError, attempts: u32) -> EndpointOutcome {
    metrics::counter!("downstream_notifications_total", "outcome" => "failure").increment(1);
    tracing::warn!(endpoint = %endpoint, attempts, error = %error, "endpoint notification failed");
    EndpointOutcome {
        endpoint: endpoint.clone(),
        succeeded: false,
        error: Some(error.to_string()),
        attempts,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use common::UserId;
    use user_store::User;

    use super::*;
    use crate::client::{CallResponse, InMemoryDownstreamClient};

    fn payload() -> NotificationPayload {
        NotificationPayload::build(
            &User::new("a@x.com", "Ada", "Lovelace"),
            Utc::now(),
            Duration::from_millis(1),
        )
    }

    fn endpoints() -> Vec<Endpoint> {
        vec![
            Endpoint::new("a", "http://a/users"),
            Endpoint::new("b", "http://b/users"),
        ]
    }

    #[tokio::test]
    async fn all_succeed() {
        let client = InMemoryDownstreamClient::new();
        let notifier = DownstreamNotifier::new(client.clone(), RetryPolicy::default());

        let outcomes = notifier.notify(&payload(), &endpoints()).await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.succeeded && o.error.is_none()));
        assert_eq!(client.registration_count("a"), 1);
        assert_eq!(client.registration_count("b"), 1);
    }

    #[tokio::test]
    async fn failure_is_attributed_to_the_right_endpoint() {
        for fan_out in [FanOut::Sequential, FanOut::Concurrent] {
            let client = InMemoryDownstreamClient::new();
            client.fail_all_posts("a", 502);
            let notifier = DownstreamNotifier::new(client.clone(), RetryPolicy::default())
                .with_fan_out(fan_out);

            let outcomes = notifier.notify(&payload(), &endpoints()).await;

            assert_eq!(outcomes[0].endpoint.name, "a");
            assert!(!outcomes[0].succeeded);
            assert_eq!(outcomes[0].attempts, 5);
            assert_eq!(
                outcomes[0].error.as_deref(),
                Some("a: returned status 502")
            );
            assert_eq!(outcomes[1].endpoint.name, "b");
            assert!(outcomes[1].succeeded);
            assert_eq!(outcomes[1].attempts, 1);
        }
    }

    #[tokio::test]
    async fn transient_failure_recovers_within_bound() {
        let client = InMemoryDownstreamClient::new();
        client.fail_next_posts("b", 2, 503);
        let notifier = DownstreamNotifier::new(client.clone(), RetryPolicy::default());

        let outcomes = notifier.notify(&payload(), &endpoints()).await;

        assert!(outcomes[1].succeeded);
        assert_eq!(outcomes[1].attempts, 3);
        assert_eq!(client.post_attempts("b"), 3);
    }

    #[tokio::test]
    async fn unreachable_endpoint_reports_transport_error() {
        let client = InMemoryDownstreamClient::new();
        client.fail_all_posts_unreachable("b");
        let notifier = DownstreamNotifier::new(client, RetryPolicy::new(2));

        let outcomes = notifier.notify(&payload(), &endpoints()).await;

        assert!(!outcomes[1].succeeded);
        assert!(outcomes[1].error.as_deref().unwrap().contains("transport error"));
    }

    struct HangingClient;

    #[async_trait]
    impl DownstreamClient for HangingClient {
        async fn post(
            &self,
            _endpoint: &Endpoint,
            _payload: &NotificationPayload,
        ) -> Result<CallResponse, DownstreamError> {
            std::future::pending().await
        }

        async fn delete(
            &self,
            _endpoint: &Endpoint,
            _id: UserId,
        ) -> Result<CallResponse, DownstreamError> {
            Ok(CallResponse::new(204))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_fails_hung_endpoint() {
        let notifier = DownstreamNotifier::new(HangingClient, RetryPolicy::default())
            .with_deadline(Duration::from_secs(2));

        let outcomes = notifier.notify(&payload(), &endpoints()).await;

        assert!(outcomes.iter().all(|o| !o.succeeded));
        assert_eq!(
            outcomes[0].error.as_deref(),
            Some("a: deadline of 2000 ms exceeded")
        );
    }
}
