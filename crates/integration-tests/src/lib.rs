//! Integration tests for Tablewise.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tablewise-integration-tests
//! ```
//!
//! Most tests need no database. Router tests build the real application
//! around a lazily connecting pool aimed at a closed port and an in-memory
//! session store, so only paths that never reach the database can succeed;
//! access refusals still go through the audit sink, whose failure must not
//! change the response.
//!
//! Tests in `store_guards` run against `PostgreSQL` and are ignored by
//! default:
//!
//! ```bash
//! TABLEWISE_TEST_DATABASE_URL=postgres://localhost/tablewise_test \
//!     cargo test -p tablewise-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `access_evaluator` - Evaluator properties and scenarios
//! - `role_guard` - Role and user write guard
//! - `derived_fields` - Totals, costing, loyalty and codes
//! - `api_errors` - HTTP status mapping through the router
//! - `store_guards` - Guarded writes and the last-admin lock in the database

use std::collections::BTreeSet;
use std::time::Duration;

use axum::Router;
use secrecy::SecretString;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tower_sessions::{MemoryStore, SessionManagerLayer};

use tablewise_admin::config::AdminConfig;
use tablewise_admin::middleware::cookie_key;
use tablewise_admin::state::AppState;
use tablewise_core::access::{ADMINISTRATOR, Grant, RoleGrant, UserPrincipal};
use tablewise_core::{Principal, RestaurantId, RoleId, UserId};

/// A staff principal with one active role holding `grants`.
#[must_use]
pub fn staff(id: i32, grants: &[Grant], restaurants: &[i32]) -> Principal {
    with_roles(id, vec![role(2, "Manager", true, grants)], restaurants)
}

/// A principal with no roles and no restaurants.
#[must_use]
pub fn customer(id: i32) -> Principal {
    with_roles(id, Vec::new(), &[])
}

/// A principal holding the Administrator role.
#[must_use]
pub fn administrator(id: i32) -> Principal {
    with_roles(id, vec![role(1, ADMINISTRATOR, true, &[])], &[])
}

#[must_use]
pub fn role(id: i32, name: &str, active: bool, grants: &[Grant]) -> RoleGrant {
    RoleGrant {
        id: RoleId::new(id),
        name: name.to_owned(),
        active,
        grants: grants.iter().copied().collect::<BTreeSet<_>>(),
        system: false,
    }
}

#[must_use]
pub fn with_roles(id: i32, roles: Vec<RoleGrant>, restaurants: &[i32]) -> Principal {
    Principal::User(UserPrincipal {
        id: UserId::new(id),
        roles,
        restaurants: restaurants.iter().copied().map(RestaurantId::new).collect(),
    })
}

/// Configuration that passes no environment through.
#[must_use]
pub fn test_config() -> AdminConfig {
    AdminConfig {
        database_url: SecretString::from("postgres://tablewise@127.0.0.1:1/tablewise"),
        host: [127, 0, 0, 1].into(),
        port: 3001,
        base_url: "https://tablewise.test".to_owned(),
        session_secret: SecretString::from("kq8Zr2vLx9NwT4bYp7HcJm3Fs6DgAe1U"),
        cart_ttl: chrono::Duration::hours(24),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// The application router over an unreachable database.
///
/// # Panics
///
/// Panics if the database URL in [`test_config`] does not parse.
#[must_use]
pub fn test_app() -> Router {
    let config = test_config();
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(250))
        .connect_lazy("postgres://tablewise@127.0.0.1:1/tablewise")
        .expect("static database URL parses");

    let key = cookie_key(&config.session_secret).expect("test secret derives a key");
    let sessions = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_signed(key);
    tablewise_admin::app(AppState::new(config, pool), sessions)
}

/// A migrated pool on `TABLEWISE_TEST_DATABASE_URL`.
///
/// # Panics
///
/// Panics if the variable is unset, the database is unreachable or a
/// migration fails.
pub async fn database_pool() -> PgPool {
    let url = std::env::var("TABLEWISE_TEST_DATABASE_URL")
        .expect("TABLEWISE_TEST_DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .expect("test database is reachable");
    sqlx::migrate!("../admin/migrations")
        .run(&pool)
        .await
        .expect("migrations apply");
    pool
}

/// An email address no earlier run has used.
#[must_use]
pub fn unique_email(tag: &str) -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{tag}-{nanos}@tablewise.test")
}
