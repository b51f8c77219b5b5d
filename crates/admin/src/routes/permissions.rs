//! Permission catalog route handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;

use tablewise_core::{Action, Permission, PermissionId, Resource};

use crate::db::permissions::{NewPermission, PermissionPatch, catalog_name};
use crate::error::AppError;
use crate::middleware::CurrentPrincipal;
use crate::services::PermissionService;
use crate::state::AppState;

/// Build the permissions router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/permissions", get(list).post(create))
        .route(
            "/api/permissions/{id}",
            get(read).patch(update).delete(remove),
        )
}

/// Request for creating a permission. The name defaults to the catalog
/// name, e.g. `orders:read`.
#[derive(Debug, Deserialize)]
pub struct CreatePermissionRequest {
    pub name: Option<String>,
    pub action: Action,
    pub resource: Resource,
    #[serde(default)]
    pub description: String,
}

/// Request for updating a permission.
#[derive(Debug, Deserialize)]
pub struct UpdatePermissionRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// GET /api/permissions
async fn list(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<Vec<Permission>>, AppError> {
    let permissions = PermissionService::new(state.pool()).list(&principal).await?;
    Ok(Json(permissions))
}

/// POST /api/permissions
async fn create(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(body): Json<CreatePermissionRequest>,
) -> Result<(StatusCode, Json<Permission>), AppError> {
    let name = body
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| catalog_name(body.action, body.resource));

    let permission = PermissionService::new(state.pool())
        .create(
            &principal,
            &NewPermission {
                name,
                action: body.action,
                resource: body.resource,
                description: body.description,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(permission)))
}

/// GET /api/permissions/{id}
async fn read(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<PermissionId>,
) -> Result<Json<Permission>, AppError> {
    let permission = PermissionService::new(state.pool()).get(&principal, id).await?;
    Ok(Json(permission))
}

/// PATCH /api/permissions/{id}
async fn update(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<PermissionId>,
    Json(body): Json<UpdatePermissionRequest>,
) -> Result<Json<Permission>, AppError> {
    let permission = PermissionService::new(state.pool())
        .update(
            &principal,
            id,
            &PermissionPatch {
                name: body.name,
                description: body.description,
            },
        )
        .await?;

    Ok(Json(permission))
}

/// DELETE /api/permissions/{id}
async fn remove(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<PermissionId>,
) -> Result<StatusCode, AppError> {
    PermissionService::new(state.pool()).delete(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
