//! Audit trail persistence.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use tablewise_core::{AuditEvent, RecordId};

use super::RepositoryError;

/// An audit event as stored: the evaluator's event stamped with an ID, a
/// time and the record it concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAuditEvent {
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub record: Option<RecordId>,
    pub event: AuditEvent,
}

impl StoredAuditEvent {
    /// Stamp an event with a fresh ID and the current time.
    #[must_use]
    pub fn stamp(event: AuditEvent, record: Option<RecordId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            record,
            event,
        }
    }
}

/// Repository for the audit trail.
pub struct AuditRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AuditRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append an event.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record(&self, stored: &StoredAuditEvent) -> Result<(), RepositoryError> {
        let event = &stored.event;
        sqlx::query(
            r"
            INSERT INTO app.audit_event
                (id, occurred_at, actor_id, action, collection, record_id, outcome, reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(stored.id)
        .bind(stored.occurred_at)
        .bind(event.actor.map(|a| a.as_i32()))
        .bind(event.action)
        .bind(event.collection.slug())
        .bind(stored.record.map(|r| r.as_i32()))
        .bind(event.outcome.as_str())
        .bind(event.reason.as_str())
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
