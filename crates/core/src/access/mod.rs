//! Role/permission access control.
//!
//! Permissions grant one action on one resource; roles bundle permissions;
//! users hold roles and restaurant assignments. [`evaluate`] turns a
//! principal, an action, a collection and an optional record into a
//! [`Decision`], and [`guard`] validates writes that change who holds the
//! Administrator role.
//!
//! # Example
//!
//! ```
//! use tablewise_core::{Action, Collection, Decision, Principal, evaluate};
//!
//! let eval = evaluate(&Principal::Anonymous, Action::Create, Collection::Orders, None);
//! assert_eq!(eval.decision, Decision::Allow);
//! ```

pub mod audit;
pub mod claims;
pub mod error;
pub mod evaluator;
pub mod filter;
pub mod guard;
pub mod model;
pub mod policy;
pub mod principal;

pub use audit::{AuditEvent, AuditOutcome, AuditReason};
pub use claims::SessionClaims;
pub use error::AccessError;
pub use evaluator::{Decision, Evaluation, evaluate};
pub use filter::{FilterField, FilterOp, Predicate, RecordFilter, RecordRef};
pub use guard::{AccountState, RoleMutation, UserWrite, check_role_mutation, check_user_write};
pub use model::{
    ADMINISTRATOR, Action, Grant, Permission, PermissionRef, Resource, Role, RoleRef, User,
    is_administrator_name,
};
pub use policy::{Collection, CollectionPolicy};
pub use principal::{Principal, RoleGrant, UserPrincipal};
