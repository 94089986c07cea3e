//! Commit-or-compensate decision after the downstream fan-out.

use common::ApiResponse;
use user_store::{LocalPersistenceUnit, User, UserStore};

use crate::client::DownstreamClient;
use crate::error::DownstreamError;
use crate::notifier::EndpointOutcome;

/// How a registration ended once every endpoint was heard from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalOutcome {
    /// The local insert never happened, so nothing downstream was touched.
    NothingToCompensate { message: String },
    /// Local record and every endpoint agree on the new user.
    Committed,
    /// An endpoint failed; the local record was deleted and accepted
    /// notifications were retracted.
    Compensated {
        /// Newline-joined endpoint failures.
        message: String,
        /// Undo steps that did not go through.
        compensation_failures: Vec<String>,
    },
}

impl FinalOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, FinalOutcome::Committed)
    }
}

/// Decides whether a registration commits and runs the undo steps when it
/// does not.
///
/// Compensation is best-effort: each undo step is attempted once, and a
/// failing step is logged and reported without stopping the others.
pub struct CompensationController<'a, S: UserStore, C: DownstreamClient> {
    persistence: &'a LocalPersistenceUnit<S>,
    client: &'a C,
}

impl<'a, S: UserStore, C: DownstreamClient> CompensationController<'a, S, C> {
    pub fn new(persistence: &'a LocalPersistenceUnit<S>, client: &'a C) -> Self {
        Self {
            persistence,
            client,
        }
    }

    #[tracing::instrument(skip_all)]
    pub async fn evaluate(
        &self,
        local: &ApiResponse<User>,
        outcomes: &[EndpointOutcome],
    ) -> FinalOutcome {
        let Some(user) = local.data().filter(|_| local.is_success()) else {
            return FinalOutcome::NothingToCompensate {
                message: local.message().to_string(),
            };
        };

        if outcomes.iter().all(|o| o.succeeded) {
            return FinalOutcome::Committed;
        }

        let message = outcomes
            .iter()
            .filter(|o| !o.succeeded)
            .filter_map(|o| o.error.as_deref())
            .filter(|e| !e.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        tracing::warn!(user_id = %user.id, reason = %message, "compensating registration");
        let compensation_failures = self.compensate(user, outcomes).await;

        FinalOutcome::Compensated {
            message,
            compensation_failures,
        }
    }

    async fn compensate(&self, user: &User, outcomes: &[EndpointOutcome]) -> Vec<String> {
        let mut failures = Vec::new();

        let deleted = self.persistence.delete(user.id).await;
        if !deleted.is_success() {
            failures.push(format!("local record {}: {}", user.id, deleted.message()));
        }

        for outcome in outcomes.iter().filter(|o| o.succeeded) {
            let endpoint = &outcome.endpoint;
            let failure = match self.client.delete(endpoint, user.id).await {
                Ok(response) if !response.is_failure() => None,
                Ok(response) => Some(DownstreamError::Status {
                    endpoint: endpoint.name.clone(),
                    status: response.status,
                }),
                Err(e) => Some(e),
            };
            if let Some(e) = failure {
                failures.push(e.to_string());
            }
        }

        for failure in &failures {
            metrics::counter!("compensation_failures_total").increment(1);
            tracing::error!(user_id = %user.id, error = %failure, "compensation step failed");
        }
        failures
    }
}
