//! User account route handlers.
//!
//! Customers sign up through `/api/auth/signup`; this router lets staff
//! manage accounts and lets users read and edit their own.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tablewise_core::hooks::LoyaltyTier;
use tablewise_core::{Email, RestaurantId, RoleId, UserId};

use crate::db::users::Account;
use crate::error::AppError;
use crate::middleware::CurrentPrincipal;
use crate::services::UserService;
use crate::services::users::{CreateUser, UpdateUser};
use crate::state::AppState;

/// Build the users router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list).post(create))
        .route("/api/users/{id}", get(read).patch(update).delete(remove))
}

/// An account as returned by the API. Never includes the password hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: UserId,
    pub email: Email,
    pub roles: Vec<RoleId>,
    pub restaurants: Vec<RestaurantId>,
    pub is_active: bool,
    pub loyalty_points: i64,
    pub loyalty_tier: LoyaltyTier,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Account> for UserResponse {
    fn from(account: Account) -> Self {
        Self {
            loyalty_tier: LoyaltyTier::for_points(u64::try_from(account.loyalty_points).unwrap_or(0)),
            id: account.id,
            email: account.email,
            roles: account.roles,
            restaurants: account.restaurants,
            is_active: account.is_active,
            loyalty_points: account.loyalty_points,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// Request for creating a staff account.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub roles: Vec<RoleId>,
    #[serde(default)]
    pub restaurants: Vec<RestaurantId>,
}

/// Request for updating an account.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub roles: Option<Vec<RoleId>>,
    pub restaurants: Option<Vec<RestaurantId>>,
    pub is_active: Option<bool>,
}

/// GET /api/users
async fn list(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let accounts = UserService::new(state.pool()).list(&principal).await?;
    Ok(Json(accounts.into_iter().map(Into::into).collect()))
}

/// POST /api/users
async fn create(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let account = UserService::new(state.pool())
        .create(
            &principal,
            CreateUser {
                email: body.email,
                password: body.password,
                roles: body.roles,
                restaurants: body.restaurants,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(account.into())))
}

/// GET /api/users/{id}
async fn read(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<UserId>,
) -> Result<Json<UserResponse>, AppError> {
    let account = UserService::new(state.pool()).get(&principal, id).await?;
    Ok(Json(account.into()))
}

/// PATCH /api/users/{id}
async fn update(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<UserId>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let account = UserService::new(state.pool())
        .update(
            &principal,
            id,
            UpdateUser {
                email: body.email,
                password: body.password,
                roles: body.roles,
                restaurants: body.restaurants,
                is_active: body.is_active,
            },
        )
        .await?;

    Ok(Json(account.into()))
}

/// DELETE /api/users/{id}
async fn remove(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<UserId>,
) -> Result<StatusCode, AppError> {
    UserService::new(state.pool()).delete(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
