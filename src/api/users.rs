//! User API endpoints.

use axum::{
    extract::{Path, State},
    Extension,
};

use super::{success, ApiResult, JsonOrForm};
use crate::auth::{password, AuthUser};
use crate::errors::AppError;
use crate::models::{UpdateUserRequest, User, UserChanges};
use crate::AppState;

/// GET /api/v1/users - List all users.
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    success(state.users.list_users().await?)
}

/// GET /api/v1/users/{id} - Get a user by ID.
pub async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<User> {
    let user = state
        .users
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;
    success(user)
}

/// PUT /api/v1/users/{id} - Update the caller's own account.
pub async fn update_user(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
    JsonOrForm(request): JsonOrForm<UpdateUserRequest>,
) -> ApiResult<User> {
    ensure_self(&caller, &id)?;
    let (name, email) = request.validate()?;

    let password_hash = match request.password {
        Some(plain) => Some(password::hash_password(plain, state.config.bcrypt_cost).await?),
        None => None,
    };

    let changes = UserChanges {
        name,
        email,
        password_hash,
    };
    let user = state.users.update_user(&id, changes).await?;
    success(user)
}

/// DELETE /api/v1/users/{id} - Delete the caller's own account.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    ensure_self(&caller, &id)?;
    state.users.delete_user(&id).await?;

    tracing::info!(user_id = %id, "User deleted");
    success(())
}

fn ensure_self(caller: &AuthUser, id: &str) -> Result<(), AppError> {
    if caller.id != id {
        return Err(AppError::Forbidden(
            "You can only modify your own account".to_string(),
        ));
    }
    Ok(())
}
