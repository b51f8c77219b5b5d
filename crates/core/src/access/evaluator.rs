//! The access evaluator.
//!
//! [`evaluate`] is the single entry point every collection operation goes
//! through. Rules are checked in a fixed order and the first one that applies
//! decides:
//!
//! 1. public allow-list of the collection
//! 2. Administrator override
//! 3. permission lookup across the principal's active roles
//! 4. tenant scoping for scoped actions
//! 5. ownership fallback when no permission matched
//!
//! Anything not allowed by those rules is denied. The evaluator never fails.

use serde::{Deserialize, Serialize};

use super::audit::{AuditEvent, AuditOutcome, AuditReason};
use super::error::AccessError;
use super::filter::{Predicate, RecordFilter, RecordRef};
use super::model::{Action, Grant};
use super::policy::Collection;
use super::principal::Principal;

/// Result of an access check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "predicate", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
    /// Allowed only for records satisfying the predicate.
    AllowIf(Predicate),
}

impl Decision {
    /// Whether the decision is an unconditional allow.
    #[must_use]
    pub const fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    #[must_use]
    pub const fn is_deny(&self) -> bool {
        matches!(self, Self::Deny)
    }

    /// Convert into what a list query needs: no constraint, a filter, or an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Denied`] for `Deny`.
    pub fn into_filter(self) -> Result<Option<RecordFilter>, AccessError> {
        match self {
            Self::Allow => Ok(None),
            Self::AllowIf(predicate) => Ok(Some(predicate.compile())),
            Self::Deny => Err(AccessError::Denied),
        }
    }

    /// Resolve against a concrete record.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Denied`] for `Deny` or an unsatisfied predicate.
    pub fn check(&self, record: &RecordRef) -> Result<(), AccessError> {
        match self {
            Self::Allow => Ok(()),
            Self::AllowIf(predicate) if predicate.matches(record) => Ok(()),
            Self::AllowIf(_) | Self::Deny => Err(AccessError::Denied),
        }
    }
}

/// A decision together with its audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub decision: Decision,
    pub audit: AuditEvent,
}

/// Decide whether `principal` may perform `action` on `collection`.
///
/// `target` is the record being acted on (the proposed record for creates).
/// Without a target, scoped rules return [`Decision::AllowIf`] for the caller
/// to apply as a query filter; with one, they resolve to allow or deny.
#[must_use]
pub fn evaluate(
    principal: &Principal,
    action: Action,
    collection: Collection,
    target: Option<&RecordRef>,
) -> Evaluation {
    let policy = collection.policy();
    let actor = principal.user_id();
    let finish = |decision: Decision, outcome: AuditOutcome, reason: AuditReason| Evaluation {
        decision,
        audit: AuditEvent::new(actor, action, collection, outcome, reason),
    };

    if policy.is_public(action) {
        return finish(Decision::Allow, AuditOutcome::Allowed, AuditReason::PublicPolicy);
    }

    let Principal::User(user) = principal else {
        return finish(Decision::Deny, AuditOutcome::Denied, AuditReason::NoPermission);
    };

    if user.is_admin() {
        return finish(Decision::Allow, AuditOutcome::Allowed, AuditReason::Administrator);
    }

    if user.has_grant(Grant::new(action, policy.resource)) {
        if !policy.is_tenant_scoped(action) {
            return finish(Decision::Allow, AuditOutcome::Allowed, AuditReason::Permission);
        }
        let predicate = Predicate::TenantIn(user.restaurants.clone());
        return scoped(predicate, target, AuditReason::TenantScope, AuditReason::OutsideTenant, finish);
    }

    if policy.ownership && owner_action(action) {
        return scoped(
            Predicate::OwnedBy(user.id),
            target,
            AuditReason::Ownership,
            AuditReason::NoPermission,
            finish,
        );
    }

    finish(Decision::Deny, AuditOutcome::Denied, AuditReason::NoPermission)
}

/// Owners may read, change and remove their own records, never create them
/// on someone's behalf.
const fn owner_action(action: Action) -> bool {
    matches!(action, Action::Read | Action::Update | Action::Delete)
}

fn scoped(
    predicate: Predicate,
    target: Option<&RecordRef>,
    allowed: AuditReason,
    refused: AuditReason,
    finish: impl Fn(Decision, AuditOutcome, AuditReason) -> Evaluation,
) -> Evaluation {
    match target {
        Some(record) if predicate.matches(record) => {
            finish(Decision::Allow, AuditOutcome::Allowed, allowed)
        }
        Some(_) => finish(Decision::Deny, AuditOutcome::Denied, refused),
        None => finish(Decision::AllowIf(predicate), AuditOutcome::Filtered, allowed),
    }
}
