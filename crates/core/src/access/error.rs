//! Access-control error taxonomy.

use thiserror::Error;

use crate::types::{PermissionId, RoleId};

/// Errors raised by access control.
///
/// `Denied` carries no detail on purpose: callers must not learn whether the
/// record exists or which rule failed. The three guard rejections carry an
/// explicit message because they describe an attempted state transition the
/// user can correct.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// The evaluator returned `Deny`.
    #[error("access denied")]
    Denied,

    /// Rename or delete of the protected Administrator role.
    #[error("the Administrator role is protected: {0}")]
    ProtectedRoleViolation(&'static str),

    /// The write would leave no active Administrator.
    #[error("at least one active Administrator must remain")]
    LastAdminLockout,

    /// A non-admin tried to grant, revoke or impersonate Administrator.
    #[error("only an Administrator can change Administrator membership")]
    PrivilegeEscalationAttempt,

    /// A role reference was not resolved before building a principal.
    #[error("role {0} was not resolved")]
    UnresolvedRole(RoleId),

    /// A permission reference was not resolved before building a principal.
    #[error("permission {0} was not resolved")]
    UnresolvedPermission(PermissionId),
}

impl AccessError {
    /// Whether this error is one of the role-mutation guard rejections.
    #[must_use]
    pub const fn is_guard_rejection(&self) -> bool {
        matches!(
            self,
            Self::ProtectedRoleViolation(_) | Self::LastAdminLockout | Self::PrivilegeEscalationAttempt
        )
    }
}
