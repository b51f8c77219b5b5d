//! Authentication route handlers.
//!
//! Password login stores the resolved capability claims in the session.
//! Claims are not reloaded per request; `refresh` re-reads them explicitly.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;

use tablewise_core::SessionClaims;

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_claims, set_claims};
use crate::services::{AuthError, AuthService};
use crate::state::AppState;

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/me", get(me))
        .route("/api/auth/signup", post(signup))
}

/// Email and password credentials.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

fn session_error(e: &tower_sessions::session::Error) -> AppError {
    AppError::Internal(format!("session error: {e}"))
}

async fn start_session(session: &Session, claims: &SessionClaims) -> Result<(), AppError> {
    set_claims(session, claims)
        .await
        .map_err(|e| session_error(&e))?;
    set_sentry_user(claims.user_id, Some(claims.email.as_str()));
    Ok(())
}

/// Log in with email and password.
///
/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<Credentials>,
) -> Result<Json<SessionClaims>, AppError> {
    let claims = AuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Login failed"))?;

    start_session(&session, &claims).await?;
    tracing::info!(user_id = %claims.user_id, roles = ?claims.role_names(), "User logged in");
    Ok(Json(claims))
}

/// Log out and clear the session.
///
/// POST /api/auth/logout
async fn logout(session: Session) -> Result<StatusCode, AppError> {
    clear_claims(&session)
        .await
        .map_err(|e| session_error(&e))?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// Re-issue the session claims from the database.
///
/// An account that was deleted or deactivated since login is logged out.
///
/// POST /api/auth/refresh
async fn refresh(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(current): RequireAuth,
) -> Result<Json<SessionClaims>, AppError> {
    match AuthService::new(state.pool()).refresh(current.user_id).await {
        Ok(claims) => {
            start_session(&session, &claims).await?;
            Ok(Json(claims))
        }
        Err(e @ (AuthError::InvalidCredentials | AuthError::InactiveAccount)) => {
            tracing::info!(user_id = %current.user_id, error = %e, "Session ended on refresh");
            clear_claims(&session)
                .await
                .map_err(|e| session_error(&e))?;
            clear_sentry_user();
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// The claims of the logged-in user.
///
/// GET /api/auth/me
async fn me(RequireAuth(claims): RequireAuth) -> Json<SessionClaims> {
    Json(claims)
}

/// Register a customer account and log it in.
///
/// POST /api/auth/signup
async fn signup(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<Credentials>,
) -> Result<(StatusCode, Json<SessionClaims>), AppError> {
    let claims = AuthService::new(state.pool())
        .signup(&body.email, &body.password)
        .await?;

    start_session(&session, &claims).await?;
    tracing::info!(user_id = %claims.user_id, "Customer signed up");
    Ok((StatusCode::CREATED, Json(claims)))
}
