//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions with strict
//! cookie settings (SameSite=Strict, 24hr inactivity expiry). The session
//! cookie is signed with a key derived from `TABLEWISE_SESSION_SECRET`.

use argon2::Argon2;
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use tower_sessions::cookie::Key;
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::AdminConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "tablewise_session";

/// Session expiry time in seconds (24 hours).
const SESSION_EXPIRY_SECONDS: i64 = 24 * 60 * 60;

/// Fixed salt for cookie key derivation. The secret itself carries the entropy.
const COOKIE_KEY_SALT: &[u8] = b"tablewise-session-cookie";

/// Derive the 64-byte cookie signing key from the session secret.
///
/// # Errors
///
/// Returns an error if key derivation fails.
pub fn cookie_key(secret: &SecretString) -> Result<Key, String> {
    let mut material = [0u8; 64];
    Argon2::default()
        .hash_password_into(secret.expose_secret().as_bytes(), COOKIE_KEY_SALT, &mut material)
        .map_err(|e| format!("cookie key derivation failed: {e}"))?;
    Key::try_from(material.as_slice()).map_err(|e| format!("invalid cookie key: {e}"))
}

/// Create the session layer with `PostgreSQL` store.
///
/// The session table is created by migration in the `app` schema.
///
/// # Errors
///
/// Returns an error if the schema or table name is rejected by the store, or
/// if the cookie key cannot be derived.
pub fn create_session_layer(
    pool: &PgPool,
    config: &AdminConfig,
) -> Result<SessionManagerLayer<PostgresStore, SignedCookie>, String> {
    let store = PostgresStore::new(pool.clone())
        .with_schema_name("app")?
        .with_table_name("session")?;

    Ok(SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Strict)
        .with_http_only(true)
        .with_path("/")
        .with_signed(cookie_key(&config.session_secret)?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_key_is_stable_per_secret() {
        let secret = SecretString::from("kq8Zr2vLx9NwT4bYp7HcJm3Fs6DgAe1U");
        let first = cookie_key(&secret).unwrap();
        let second = cookie_key(&secret).unwrap();
        assert_eq!(first.signing(), second.signing());

        let other = cookie_key(&SecretString::from("Wm4Tz8Qp1Rx6Ls3Vn9Kd2Hf7Jb5Gc0Ya")).unwrap();
        assert_ne!(first.signing(), other.signing());
    }
}
