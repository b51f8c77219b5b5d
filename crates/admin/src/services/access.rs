//! Access decisions with audit.
//!
//! Every collection operation asks [`AccessService`] for a decision. The
//! service runs the evaluator, logs the resulting audit event, and persists
//! it. A failure to persist is logged and never changes the decision.

use std::future::Future;

use sqlx::PgPool;

use tablewise_core::{
    AccessError, Action, AuditEvent, Collection, Decision, Principal, RecordFilter, RecordId,
    RecordRef, evaluate,
};

use crate::db::RepositoryError;
use crate::db::audit::{AuditRepository, StoredAuditEvent};
use crate::error::AppError;

/// Access control service.
pub struct AccessService<'a> {
    audit: AuditRepository<'a>,
}

impl<'a> AccessService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            audit: AuditRepository::new(pool),
        }
    }

    /// Evaluate and audit a request.
    pub async fn decide(
        &self,
        principal: &Principal,
        action: Action,
        collection: Collection,
        target: Option<&RecordRef>,
        record: Option<RecordId>,
    ) -> Decision {
        let evaluation = evaluate(principal, action, collection, target);
        self.emit(evaluation.audit, record).await;
        evaluation.decision
    }

    /// Require access to a concrete record (or a proposed one, for creates).
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Denied`] unless the evaluator allows it.
    pub async fn require(
        &self,
        principal: &Principal,
        action: Action,
        collection: Collection,
        target: &RecordRef,
        record: Option<RecordId>,
    ) -> Result<(), AccessError> {
        self.decide(principal, action, collection, Some(target), record)
            .await
            .check(target)
    }

    /// Require access to a collection as a whole, for operations that don't
    /// touch a tagged record.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Denied`] unless the evaluator returns `Allow`.
    pub async fn require_unconditional(
        &self,
        principal: &Principal,
        action: Action,
        collection: Collection,
    ) -> Result<(), AccessError> {
        match self.decide(principal, action, collection, None, None).await {
            Decision::Allow => Ok(()),
            Decision::Deny | Decision::AllowIf(_) => Err(AccessError::Denied),
        }
    }

    /// The filter a list query must apply, or `None` for no constraint.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Denied`] if the principal may not list at all.
    pub async fn list_filter(
        &self,
        principal: &Principal,
        collection: Collection,
    ) -> Result<Option<RecordFilter>, AccessError> {
        self.decide(principal, Action::Read, collection, None, None)
            .await
            .into_filter()
    }

    /// Gate an operation on a stored record.
    ///
    /// The collection-level decision is taken before `fetch` runs, so a
    /// principal with no access at all never causes a lookup. A principal
    /// limited by a predicate gets `Denied` both for records outside its
    /// scope and for records that don't exist; only unconstrained principals
    /// see `NotFound`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Access` when refused, `AppError::Database` when
    /// the record is missing or the lookup fails.
    pub async fn authorize_stored<T, Fut>(
        &self,
        principal: &Principal,
        action: Action,
        collection: Collection,
        id: RecordId,
        fetch: Fut,
        access_ref: impl FnOnce(&T) -> RecordRef,
    ) -> Result<T, AppError>
    where
        Fut: Future<Output = Result<Option<T>, RepositoryError>>,
    {
        let precheck = evaluate(principal, action, collection, None);
        match precheck.decision {
            Decision::Deny => {
                self.emit(precheck.audit, Some(id)).await;
                Err(AccessError::Denied.into())
            }
            Decision::Allow => {
                let item = fetch.await?.ok_or(RepositoryError::NotFound)?;
                self.emit(precheck.audit, Some(id)).await;
                Ok(item)
            }
            Decision::AllowIf(_) => {
                let item = fetch.await?;
                // A missing record is judged as one carrying no tags, which no
                // predicate matches.
                let target = item.as_ref().map_or_else(RecordRef::default, access_ref);
                self.require(principal, action, collection, &target, Some(id))
                    .await?;
                item.ok_or_else(|| RepositoryError::NotFound.into())
            }
        }
    }

    /// Audit a write the role-mutation guard rejected and hand the error
    /// back.
    pub async fn reject(
        &self,
        principal: &Principal,
        action: Action,
        collection: Collection,
        record: Option<RecordId>,
        error: AccessError,
    ) -> AccessError {
        let event = AuditEvent::rejected(principal.user_id(), action, collection, &error);
        self.emit(event, record).await;
        error
    }

    async fn emit(&self, event: AuditEvent, record: Option<RecordId>) {
        let stored = StoredAuditEvent::stamp(event, record);
        log_event(&stored);

        if let Err(e) = self.audit.record(&stored).await {
            tracing::error!(
                error = %e,
                audit_id = %stored.id,
                "Failed to persist audit event"
            );
        }
    }
}

fn log_event(stored: &StoredAuditEvent) {
    let event = &stored.event;
    let actor = event.actor.map(|a| a.as_i32());
    let record = stored.record.map(|r| r.as_i32());

    if event.is_refusal() {
        tracing::warn!(
            audit_id = %stored.id,
            actor = ?actor,
            action = %event.action,
            collection = %event.collection,
            record = ?record,
            outcome = event.outcome.as_str(),
            reason = event.reason.as_str(),
            "Access refused"
        );
    } else {
        tracing::info!(
            audit_id = %stored.id,
            actor = ?actor,
            action = %event.action,
            collection = %event.collection,
            record = ?record,
            outcome = event.outcome.as_str(),
            reason = event.reason.as_str(),
            "Access granted"
        );
    }
}
