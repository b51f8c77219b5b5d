//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (database ping)
//!
//! # Auth (email + password, claims cached in the session)
//! POST /api/auth/login                  - Log in
//! POST /api/auth/logout                 - Log out
//! POST /api/auth/refresh                - Re-issue claims from the database
//! GET  /api/auth/me                     - Current claims
//! POST /api/auth/signup                 - Customer signup
//!
//! # Content collections
//! GET    /api/collections/{collection}       - List (filtered by access)
//! POST   /api/collections/{collection}       - Create
//! GET    /api/collections/{collection}/{id}  - Read
//! PATCH  /api/collections/{collection}/{id}  - Update
//! DELETE /api/collections/{collection}/{id}  - Delete
//!
//! # Access control
//! GET|POST               /api/permissions
//! GET|PATCH|DELETE       /api/permissions/{id}
//! GET|POST               /api/roles
//! GET|PATCH|DELETE       /api/roles/{id}
//! GET|POST               /api/users
//! GET|PATCH|DELETE       /api/users/{id}
//! ```

pub mod auth;
pub mod collections;
pub mod permissions;
pub mod roles;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the API router (without health checks and layers).
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(collections::router())
        .merge(permissions::router())
        .merge(roles::router())
        .merge(users::router())
}
