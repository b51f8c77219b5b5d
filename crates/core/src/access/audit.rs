//! Audit events produced by access decisions.
//!
//! Events are plain values. The evaluator returns one with every decision and
//! the caller hands it to whatever sink persists audit history; nothing in this
//! crate writes logs. Events carry no timestamp or ID so that identical inputs
//! produce identical events; the sink stamps them.

use serde::{Deserialize, Serialize};

use super::error::AccessError;
use super::model::Action;
use super::policy::Collection;
use crate::types::UserId;

/// What happened to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Allowed,
    Filtered,
    Denied,
    Rejected,
}

impl AuditOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Filtered => "filtered",
            Self::Denied => "denied",
            Self::Rejected => "rejected",
        }
    }
}

/// Which rule produced the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditReason {
    PublicPolicy,
    Administrator,
    Permission,
    TenantScope,
    OutsideTenant,
    Ownership,
    NoPermission,
    ProtectedRole,
    LastAdmin,
    PrivilegeEscalation,
}

impl AuditReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PublicPolicy => "public_policy",
            Self::Administrator => "administrator",
            Self::Permission => "permission",
            Self::TenantScope => "tenant_scope",
            Self::OutsideTenant => "outside_tenant",
            Self::Ownership => "ownership",
            Self::NoPermission => "no_permission",
            Self::ProtectedRole => "protected_role",
            Self::LastAdmin => "last_admin",
            Self::PrivilegeEscalation => "privilege_escalation",
        }
    }
}

/// One audited access decision or rejected write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub actor: Option<UserId>,
    pub action: Action,
    pub collection: Collection,
    pub outcome: AuditOutcome,
    pub reason: AuditReason,
}

impl AuditEvent {
    #[must_use]
    pub const fn new(
        actor: Option<UserId>,
        action: Action,
        collection: Collection,
        outcome: AuditOutcome,
        reason: AuditReason,
    ) -> Self {
        Self {
            actor,
            action,
            collection,
            outcome,
            reason,
        }
    }

    /// Event for a write the role-mutation guard rejected.
    ///
    /// Non-guard errors are recorded as plain denials.
    #[must_use]
    pub const fn rejected(
        actor: Option<UserId>,
        action: Action,
        collection: Collection,
        error: &AccessError,
    ) -> Self {
        let (outcome, reason) = match error {
            AccessError::ProtectedRoleViolation(_) => {
                (AuditOutcome::Rejected, AuditReason::ProtectedRole)
            }
            AccessError::LastAdminLockout => (AuditOutcome::Rejected, AuditReason::LastAdmin),
            AccessError::PrivilegeEscalationAttempt => {
                (AuditOutcome::Rejected, AuditReason::PrivilegeEscalation)
            }
            AccessError::Denied
            | AccessError::UnresolvedRole(_)
            | AccessError::UnresolvedPermission(_) => {
                (AuditOutcome::Denied, AuditReason::NoPermission)
            }
        };
        Self::new(actor, action, collection, outcome, reason)
    }

    /// Whether the event should be surfaced at warning level.
    #[must_use]
    pub const fn is_refusal(&self) -> bool {
        matches!(self.outcome, AuditOutcome::Denied | AuditOutcome::Rejected)
    }
}
