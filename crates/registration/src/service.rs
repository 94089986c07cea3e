//! User operations exposed to the HTTP layer.

use common::{ApiResponse, UserId};
use user_store::{LocalPersistenceUnit, User, UserStore};

use crate::client::DownstreamClient;
use crate::dto::{InsertUserDto, UpdateUserDto, UserDto};
use crate::messages::{NO_USERS_FOUND, USER_NOT_FOUND, USER_RETRIEVED, USERS_RETRIEVED};
use crate::orchestrator::RegistrationOrchestrator;

/// Service for user operations.
///
/// Inserts go through the registration saga. The other writes go through
/// the local persistence unit only, so the audit trail stays in step with
/// the store. Every operation answers with an envelope.
pub struct UserService<S: UserStore, C: DownstreamClient> {
    orchestrator: RegistrationOrchestrator<S, C>,
}

impl<S: UserStore, C: DownstreamClient> UserService<S, C> {
    pub fn new(orchestrator: RegistrationOrchestrator<S, C>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &RegistrationOrchestrator<S, C> {
        &self.orchestrator
    }

    fn persistence(&self) -> &LocalPersistenceUnit<S> {
        self.orchestrator.persistence()
    }

    pub async fn insert(&self, request: InsertUserDto) -> ApiResponse<UserDto> {
        self.orchestrator.register(request).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_all(&self) -> ApiResponse<Vec<UserDto>> {
        match self.persistence().store().list().await {
            Ok(users) => {
                let message = if users.is_empty() {
                    NO_USERS_FOUND
                } else {
                    USERS_RETRIEVED
                };
                ApiResponse::ok(users.into_iter().map(UserDto::from).collect(), message)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to list users");
                ApiResponse::fail(e.to_string())
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_by_id(&self, id: UserId) -> ApiResponse<UserDto> {
        match self.persistence().store().get(id).await {
            Ok(Some(user)) => ApiResponse::ok(UserDto::from(user), USER_RETRIEVED),
            Ok(None) => ApiResponse::fail(USER_NOT_FOUND),
            Err(e) => {
                tracing::error!(error = %e, "failed to load user");
                ApiResponse::fail(e.to_string())
            }
        }
    }

    pub async fn update(&self, request: UpdateUserDto) -> ApiResponse<UserDto> {
        self.persistence()
            .update(User::from(request))
            .await
            .map(UserDto::from)
    }

    pub async fn delete(&self, id: UserId) -> ApiResponse<bool> {
        self.persistence().delete(id).await
    }
}
