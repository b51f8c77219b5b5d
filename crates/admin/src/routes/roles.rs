//! Role route handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;

use tablewise_core::{PermissionId, Role, RoleId};

use crate::db::roles::{NewRole, RolePatch};
use crate::error::AppError;
use crate::middleware::CurrentPrincipal;
use crate::services::RoleService;
use crate::state::AppState;

/// Build the roles router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/roles", get(list).post(create))
        .route("/api/roles/{id}", get(read).patch(update).delete(remove))
}

/// Request for creating a role.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<PermissionId>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

/// Request for updating a role. `permissions` replaces the whole set.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub permissions: Option<Vec<PermissionId>>,
    pub is_active: Option<bool>,
}

fn validate_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("role name cannot be empty".into()));
    }
    Ok(name.to_owned())
}

/// GET /api/roles
async fn list(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<Vec<Role>>, AppError> {
    let roles = RoleService::new(state.pool()).list(&principal).await?;
    Ok(Json(roles))
}

/// POST /api/roles
async fn create(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(body): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<Role>), AppError> {
    let role = RoleService::new(state.pool())
        .create(
            &principal,
            &NewRole {
                name: validate_name(&body.name)?,
                permissions: body.permissions,
                is_active: body.is_active,
                system: false,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(role)))
}

/// GET /api/roles/{id}
async fn read(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<RoleId>,
) -> Result<Json<Role>, AppError> {
    let role = RoleService::new(state.pool()).get(&principal, id).await?;
    Ok(Json(role))
}

/// PATCH /api/roles/{id}
async fn update(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<RoleId>,
    Json(body): Json<UpdateRoleRequest>,
) -> Result<Json<Role>, AppError> {
    let patch = RolePatch {
        name: body.name.as_deref().map(validate_name).transpose()?,
        permissions: body.permissions,
        is_active: body.is_active,
    };
    let role = RoleService::new(state.pool())
        .update(&principal, id, &patch)
        .await?;

    Ok(Json(role))
}

/// DELETE /api/roles/{id}
async fn remove(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<RoleId>,
) -> Result<StatusCode, AppError> {
    RoleService::new(state.pool()).delete(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
