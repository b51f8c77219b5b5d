//! Domain models for the admin API.
//!
//! - [`record`] - Stored collection records
//! - [`session`] - Session keys and the claims stored under them

pub mod record;
pub mod session;

pub use record::Record;
pub use session::keys as session_keys;
