//! Generic collection route handlers.
//!
//! One set of handlers serves every content collection; the collection slug
//! in the path selects the access policy and derived fields.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use tablewise_core::{Collection, RecordId, RestaurantId};

use crate::db::records::Page;
use crate::error::AppError;
use crate::middleware::CurrentPrincipal;
use crate::models::Record;
use crate::services::RecordService;
use crate::services::records::{RecordInput, RecordUpdate, is_content_collection};
use crate::state::AppState;

/// Build the collections router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/collections/{collection}",
            get(list).post(create),
        )
        .route(
            "/api/collections/{collection}/{id}",
            get(read).patch(update).delete(remove),
        )
}

/// Resolve a path slug to a content collection.
///
/// # Errors
///
/// Returns `AppError::NotFound` for unknown slugs and for collections with
/// dedicated endpoints.
pub fn content_collection(slug: &str) -> Result<Collection, AppError> {
    slug.parse::<Collection>()
        .ok()
        .filter(|c| is_content_collection(*c))
        .ok_or_else(|| AppError::NotFound(format!("collection {slug}")))
}

/// Pagination query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// A page of records.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub docs: Vec<Record>,
    pub total_docs: i64,
    pub page: i64,
    pub limit: i64,
}

/// Body of a create or update.
#[derive(Debug, Default, Deserialize)]
pub struct RecordBody {
    #[serde(default)]
    pub restaurant: Option<RestaurantId>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// GET /api/collections/{collection}
async fn list(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(slug): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, AppError> {
    let collection = content_collection(&slug)?;
    let page = Page::new(query.page, query.limit);

    let result = RecordService::new(state.pool(), state.config())
        .list(&principal, collection, page)
        .await?;

    Ok(Json(ListResponse {
        docs: result.records,
        total_docs: result.total,
        page: result.page.offset / result.page.limit + 1,
        limit: result.page.limit,
    }))
}

/// POST /api/collections/{collection}
async fn create(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(slug): Path<String>,
    Json(body): Json<RecordBody>,
) -> Result<(StatusCode, Json<Record>), AppError> {
    let collection = content_collection(&slug)?;
    let record = RecordService::new(state.pool(), state.config())
        .create(
            &principal,
            collection,
            RecordInput {
                restaurant: body.restaurant,
                data: body.data,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/collections/{collection}/{id}
async fn read(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path((slug, id)): Path<(String, RecordId)>,
) -> Result<Json<Record>, AppError> {
    let collection = content_collection(&slug)?;
    let record = RecordService::new(state.pool(), state.config())
        .get(&principal, collection, id)
        .await?;

    Ok(Json(record))
}

/// PATCH /api/collections/{collection}/{id}
async fn update(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path((slug, id)): Path<(String, RecordId)>,
    Json(body): Json<RecordBody>,
) -> Result<Json<Record>, AppError> {
    let collection = content_collection(&slug)?;
    let record = RecordService::new(state.pool(), state.config())
        .update(
            &principal,
            collection,
            id,
            RecordUpdate {
                restaurant: body.restaurant,
                data: body.data,
            },
        )
        .await?;

    Ok(Json(record))
}

/// DELETE /api/collections/{collection}/{id}
async fn remove(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path((slug, id)): Path<(String, RecordId)>,
) -> Result<StatusCode, AppError> {
    let collection = content_collection(&slug)?;
    RecordService::new(state.pool(), state.config())
        .delete(&principal, collection, id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_content_collection_slugs() {
        assert_eq!(content_collection("menu-items").unwrap(), Collection::MenuItems);
        assert!(matches!(content_collection("roles"), Err(AppError::NotFound(_))));
        assert!(matches!(content_collection("spaceships"), Err(AppError::NotFound(_))));
    }
}
