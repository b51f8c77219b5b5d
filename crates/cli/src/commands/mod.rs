pub mod admin;
pub mod migrate;
pub mod policy;

use secrecy::SecretString;
use sqlx::PgPool;

/// Errors shared by the commands that talk to the database.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Connect using `TABLEWISE_DATABASE_URL`, falling back to `DATABASE_URL`.
pub async fn connect() -> Result<PgPool, DatabaseError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("TABLEWISE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| DatabaseError::MissingEnvVar("TABLEWISE_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(tablewise_admin::db::create_pool(&database_url).await?)
}
