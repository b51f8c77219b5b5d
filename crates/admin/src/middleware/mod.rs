//! HTTP middleware for the API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, outermost)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions with `PostgreSQL` store)
//!
//! Authentication is applied per handler through the extractors in [`auth`].

pub mod auth;
pub mod session;

pub use auth::{AuthRejection, CurrentPrincipal, RequireAuth, clear_claims, set_claims};
pub use session::{SESSION_COOKIE_NAME, cookie_key, create_session_layer};
