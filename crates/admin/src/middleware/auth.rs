//! Authentication extractors.
//!
//! The session holds [`SessionClaims`] written at login. Handlers either
//! require them ([`RequireAuth`]) or evaluate access for whoever is asking,
//! logged in or not ([`CurrentPrincipal`]).

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower_sessions::Session;

use tablewise_core::{Principal, SessionClaims};

use crate::models::session_keys;

async fn claims_from_parts(parts: &Parts) -> Option<SessionClaims> {
    let session = parts.extensions.get::<Session>()?;
    match session.get::<SessionClaims>(session_keys::CLAIMS).await {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read session claims");
            None
        }
    }
}

/// Extractor that requires a logged-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(claims): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", claims.email)
/// }
/// ```
pub struct RequireAuth(pub SessionClaims);

/// Rejection returned when a login is required but missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthRejection;

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "authentication required" })),
        )
            .into_response()
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        claims_from_parts(parts).await.map(Self).ok_or(AuthRejection)
    }
}

/// Extractor for the principal making the request.
///
/// Never rejects: a request without session claims is [`Principal::Anonymous`]
/// and the evaluator decides what it may do.
pub struct CurrentPrincipal(pub Principal);

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = claims_from_parts(parts)
            .await
            .map_or(Principal::Anonymous, |claims| claims.principal());

        Ok(Self(principal))
    }
}

/// Store claims in the session (login, refresh).
///
/// The session ID is cycled first so a pre-login session cannot be fixated.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_claims(
    session: &Session,
    claims: &SessionClaims,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CLAIMS, claims).await
}

/// Clear the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_claims(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
