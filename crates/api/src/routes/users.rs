//! User registration and CRUD endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{ApiResponse, UserId};
use registration::messages::USER_NOT_FOUND;
use registration::{DownstreamClient, InsertUserDto, UpdateUserDto, UserDto, UserService};
use user_store::UserStore;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: UserStore, C: DownstreamClient> {
    pub users: UserService<S, C>,
}

type Envelope<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn parse_user_id(id: &str) -> Result<UserId, ApiError> {
    UserId::parse(id).map_err(|e| ApiError::BadRequest(format!("Invalid user id '{id}': {e}")))
}

/// POST /user: runs the registration saga.
///
/// Always answers 200; the envelope says whether the user was registered.
#[tracing::instrument(skip(state, req))]
pub async fn insert<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Json(req): Json<InsertUserDto>,
) -> Json<ApiResponse<UserDto>>
where
    S: UserStore + 'static,
    C: DownstreamClient + 'static,
{
    Json(state.users.insert(req).await)
}

/// GET /user/GetAll
#[tracing::instrument(skip(state))]
pub async fn get_all<S, C>(State(state): State<Arc<AppState<S, C>>>) -> Json<ApiResponse<Vec<UserDto>>>
where
    S: UserStore + 'static,
    C: DownstreamClient + 'static,
{
    Json(state.users.get_all().await)
}

/// GET /user/{id}
#[tracing::instrument(skip(state))]
pub async fn get_by_id<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Envelope<UserDto>
where
    S: UserStore + 'static,
    C: DownstreamClient + 'static,
{
    let id = parse_user_id(&id)?;
    let response = state.users.get_by_id(id).await;
    if !response.is_success() && response.message() == USER_NOT_FOUND {
        return Err(ApiError::NotFound(USER_NOT_FOUND.to_string()));
    }
    Ok(Json(response))
}

/// PUT /user
#[tracing::instrument(skip(state, req), fields(user_id = %req.id))]
pub async fn update<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Json(req): Json<UpdateUserDto>,
) -> Json<ApiResponse<UserDto>>
where
    S: UserStore + 'static,
    C: DownstreamClient + 'static,
{
    Json(state.users.update(req).await)
}

/// DELETE /user/{id}: 404 unless the user was actually deleted.
#[tracing::instrument(skip(state))]
pub async fn delete<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Envelope<bool>
where
    S: UserStore + 'static,
    C: DownstreamClient + 'static,
{
    let id = parse_user_id(&id)?;
    let response = state.users.delete(id).await;
    if response.data() != Some(&true) {
        return Err(ApiError::NotFound(response.message().to_string()));
    }
    Ok(Json(response))
}
