//! Unified error handling for the API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use tablewise_core::{AccessError, UserId};

use crate::db::RepositoryError;
use crate::services::auth::AuthError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Access control refused the request.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Login, signup or claim refresh failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Access(err) => access_status(err),
            Self::Auth(err) => auth_status(err),
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show the client.
    fn public_message(&self) -> String {
        match self {
            Self::Access(AccessError::Denied) => "forbidden".to_owned(),
            Self::Database(RepositoryError::NotFound) => "not found".to_owned(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Auth(AuthError::Access(AccessError::Denied)) => "forbidden".to_owned(),
            _ if self.status().is_server_error() => "Internal server error".to_owned(),
            Self::Auth(err) => err.to_string(),
            Self::Access(err) => err.to_string(),
            _ => self.to_string(),
        }
    }
}

const fn access_status(err: &AccessError) -> StatusCode {
    match err {
        AccessError::Denied | AccessError::PrivilegeEscalationAttempt => StatusCode::FORBIDDEN,
        AccessError::ProtectedRoleViolation(_) | AccessError::LastAdminLockout => {
            StatusCode::CONFLICT
        }
        AccessError::UnresolvedRole(_) | AccessError::UnresolvedPermission(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

const fn auth_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidEmail(_) | AuthError::WeakPassword(_) => StatusCode::BAD_REQUEST,
        AuthError::InvalidCredentials | AuthError::InactiveAccount => StatusCode::UNAUTHORIZED,
        AuthError::UserAlreadyExists => StatusCode::CONFLICT,
        AuthError::Access(access) => access_status(access),
        AuthError::PasswordHash | AuthError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "API request error"
            );
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

/// Set the Sentry user context from a user ID.
pub fn set_sentry_user(user_id: UserId, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablewise_core::RoleId;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order 12".to_string());
        assert_eq!(err.to_string(), "Not found: order 12");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_access_error_status_codes() {
        assert_eq!(get_status(AccessError::Denied.into()), StatusCode::FORBIDDEN);
        assert_eq!(
            get_status(AccessError::PrivilegeEscalationAttempt.into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AccessError::ProtectedRoleViolation("it cannot be deleted").into()),
            StatusCode::CONFLICT
        );
        assert_eq!(get_status(AccessError::LastAdminLockout.into()), StatusCode::CONFLICT);
        assert_eq!(
            get_status(AccessError::UnresolvedRole(RoleId::new(1)).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(RepositoryError::NotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(RepositoryError::Conflict("email already exists".into()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AuthError::InvalidCredentials.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AuthError::UserAlreadyExists.into()),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_denied_hides_detail() {
        assert_eq!(AppError::from(AccessError::Denied).public_message(), "forbidden");
        assert_eq!(
            AppError::from(RepositoryError::DataCorruption("bad row".into())).public_message(),
            "Internal server error"
        );
        assert_eq!(
            AppError::from(AccessError::LastAdminLockout).public_message(),
            "at least one active Administrator must remain"
        );
    }
}
