//! Registration saga orchestrator.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use common::ApiResponse;
use user_store::persistence::USER_INSERTED;
use user_store::{LocalPersistenceUnit, UserStore};

use crate::client::{DownstreamClient, Endpoint};
use crate::compensation::{CompensationController, FinalOutcome};
use crate::dto::{InsertUserDto, UserDto};
use crate::error::RegistrationError;
use crate::messages::REGISTER_ERROR;
use crate::notifier::{DownstreamNotifier, EndpointOutcome};
use crate::payload::NotificationPayload;
use crate::state::{FailureKind, RegistrationState};

/// Everything observable about one registration run.
#[derive(Debug, Clone)]
pub struct RegistrationReport {
    pub response: ApiResponse<UserDto>,
    /// Every state visited, starting with `Validating`.
    pub states: Vec<RegistrationState>,
    /// One outcome per endpoint, empty if the saga stopped before notifying.
    pub outcomes: Vec<EndpointOutcome>,
}

impl RegistrationReport {
    pub fn final_state(&self) -> RegistrationState {
        self.states.last().copied().unwrap_or_default()
    }
}

/// Tracks the states a single run moves through.
struct Trace {
    states: Vec<RegistrationState>,
}

impl Trace {
    fn start() -> Self {
        Self {
            states: vec![RegistrationState::Validating],
        }
    }

    fn current(&self) -> RegistrationState {
        self.states.last().copied().unwrap_or_default()
    }

    fn advance(&mut self, next: RegistrationState) {
        let current = self.current();
        debug_assert!(
            current.can_transition_to(next),
            "invalid transition {current} -> {next}"
        );
        tracing::info!(from = %current, to = %next, "registration state changed");
        self.states.push(next);
    }
}

/// Runs the registration saga for new users.
///
/// The saga is synchronous and keeps no log: validate the email, persist
/// the record and its audit entry, notify every endpoint, then commit or
/// compensate.
pub struct RegistrationOrchestrator<S: UserStore, C: DownstreamClient> {
    persistence: Arc<LocalPersistenceUnit<S>>,
    notifier: DownstreamNotifier<C>,
    endpoints: Vec<Endpoint>,
}

impl<S: UserStore, C: DownstreamClient> RegistrationOrchestrator<S, C> {
    pub fn new(
        persistence: Arc<LocalPersistenceUnit<S>>,
        notifier: DownstreamNotifier<C>,
        endpoints: Vec<Endpoint>,
    ) -> Self {
        Self {
            persistence,
            notifier,
            endpoints,
        }
    }

    pub fn persistence(&self) -> &LocalPersistenceUnit<S> {
        &self.persistence
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Registers a new user and returns the result envelope.
    pub async fn register(&self, request: InsertUserDto) -> ApiResponse<UserDto> {
        self.register_traced(request).await.response
    }

    /// Registers a new user, also returning the visited states and the
    /// per-endpoint outcomes.
    #[tracing::instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register_traced(&self, request: InsertUserDto) -> RegistrationReport {
        metrics::counter!("registrations_total").increment(1);
        let started = Instant::now();
        let mut trace = Trace::start();

        let report = self.run(request, &mut trace).await;

        metrics::histogram!("registration_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        match trace.current() {
            RegistrationState::Committed => {
                metrics::counter!("registrations_committed").increment(1)
            }
            RegistrationState::Compensated => {
                metrics::counter!("registrations_compensated").increment(1)
            }
            _ => metrics::counter!("registrations_rejected").increment(1),
        }

        let (response, outcomes) = report;
        RegistrationReport {
            response,
            states: trace.states,
            outcomes,
        }
    }

    async fn run(
        &self,
        request: InsertUserDto,
        trace: &mut Trace,
    ) -> (ApiResponse<UserDto>, Vec<EndpointOutcome>) {
        // Validating
        match self.persistence.store().is_email_taken(&request.email).await {
            Ok(false) => {}
            Ok(true) => {
                trace.advance(RegistrationState::Failed(FailureKind::EmailExists));
                let err = RegistrationError::Validation(request.email);
                tracing::info!(error = %err, "registration rejected");
                return (ApiResponse::fail(err.to_string()), Vec::new());
            }
            Err(e) => {
                trace.advance(RegistrationState::Failed(FailureKind::PersistError));
                let err = RegistrationError::Persistence(e.to_string());
                tracing::warn!(error = %err, "uniqueness check failed");
                return (ApiResponse::fail(err.to_string()), Vec::new());
            }
        }

        // Persisting
        trace.advance(RegistrationState::Persisting);
        let persist_started = Instant::now();
        let local = self.persistence.insert(request.into_user()).await;
        let persist_elapsed = persist_started.elapsed();
        let Some(user) = local.data().filter(|_| local.is_success()).cloned() else {
            trace.advance(RegistrationState::Failed(FailureKind::PersistError));
            let err = RegistrationError::Persistence(local.message().to_string());
            return (ApiResponse::fail(err.to_string()), Vec::new());
        };

        // Notifying
        trace.advance(RegistrationState::Notifying);
        let payload = NotificationPayload::build(&user, Utc::now(), persist_elapsed);
        let outcomes = self.notifier.notify(&payload, &self.endpoints).await;

        // Evaluating
        trace.advance(RegistrationState::Evaluating);
        let controller = CompensationController::new(&self.persistence, self.notifier.client());
        let response = match controller.evaluate(&local, &outcomes).await {
            FinalOutcome::Committed => {
                trace.advance(RegistrationState::Committed);
                tracing::info!(user_id = %user.id, "registration committed");
                ApiResponse::ok(UserDto::from(user), USER_INSERTED)
            }
            FinalOutcome::Compensated {
                message,
                compensation_failures,
            } => {
                trace.advance(RegistrationState::Compensated);
                let mut lines = vec![REGISTER_ERROR.to_string()];
                lines.push(RegistrationError::Downstream(message).to_string());
                lines.extend(
                    compensation_failures
                        .into_iter()
                        .map(|f| RegistrationError::Compensation(f).to_string()),
                );
                ApiResponse::fail(lines.join("\n"))
            }
            // Not produced once the local insert succeeded.
            FinalOutcome::NothingToCompensate { message } => {
                trace.advance(RegistrationState::Compensated);
                ApiResponse::fail(message)
            }
        };

        (response, outcomes)
    }
}
