//! Session keys.
//!
//! The session stores the [`tablewise_core::SessionClaims`] resolved at
//! login; requests derive their principal from them without touching the
//! database.

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the claims of the logged-in account.
    pub const CLAIMS: &str = "claims";
}
