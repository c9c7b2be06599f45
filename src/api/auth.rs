//! Auth API endpoints.

use axum::{extract::State, http::StatusCode};
use axum_extra::extract::CookieJar;

use super::{ApiResponse, JsonOrForm};
use crate::auth::{password, removal_cookie, session_cookie};
use crate::errors::AppError;
use crate::models::{AuthSession, NewUser, SignInRequest, SignUpRequest, User};
use crate::AppState;

/// POST /api/v1/auth/sign-up - Register a user and start a session.
pub async fn sign_up(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonOrForm(request): JsonOrForm<SignUpRequest>,
) -> Result<(StatusCode, CookieJar, ApiResponse<AuthSession>), AppError> {
    let (name, email) = request.validate()?;

    if state.users.find_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("User already exists".to_string()));
    }

    let password_hash = password::hash_password(request.password, state.config.bcrypt_cost).await?;
    let user = state
        .users
        .create_user(NewUser {
            name,
            email,
            password_hash,
        })
        .await?;

    tracing::info!(user_id = %user.id, "User signed up");

    let (jar, session) = start_session(&state, jar, user)?;
    Ok((
        StatusCode::CREATED,
        jar,
        ApiResponse::new(session).with_message("User created successfully"),
    ))
}

/// POST /api/v1/auth/sign-in - Verify credentials and start a session.
pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonOrForm(request): JsonOrForm<SignInRequest>,
) -> Result<(CookieJar, ApiResponse<AuthSession>), AppError> {
    let email = request.validate()?;

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !password::verify_password(request.password, user.password_hash.clone()).await? {
        return Err(AppError::Unauthorized("Invalid password".to_string()));
    }

    tracing::info!(user_id = %user.id, "User signed in");

    let (jar, session) = start_session(&state, jar, user)?;
    Ok((
        jar,
        ApiResponse::new(session).with_message("User signed in successfully"),
    ))
}

/// POST /api/v1/auth/sign-out - Clear the session cookie.
pub async fn sign_out(jar: CookieJar) -> (CookieJar, ApiResponse<()>) {
    (
        jar.remove(removal_cookie()),
        ApiResponse::new(()).with_message("User signed out successfully"),
    )
}

fn start_session(
    state: &AppState,
    jar: CookieJar,
    user: User,
) -> Result<(CookieJar, AuthSession), AppError> {
    let token = state.tokens.issue(&user.id)?;
    let jar = jar.add(session_cookie(token.clone(), state.config.cookie_secure));
    Ok((jar, AuthSession { token, user }))
}
