//! Tablewise Core - Shared types, access control and derived-field hooks.
//!
//! This crate is used by every Tablewise component:
//! - `admin` - JSON API backend for staff and customers
//! - `cli` - Command-line tools for migrations, bootstrap and policy checks
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Access decisions are computed from values the caller
//! already holds (session claims, fetched records), which keeps the evaluator
//! deterministic and trivially testable.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, money and status enums
//! - [`access`] - Permission/role model, the access evaluator, filter compiler,
//!   role-mutation guard and audit events
//! - [`hooks`] - Derived-field recomputation (cart/order totals, recipe cost,
//!   loyalty tiers, generated codes)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod access;
pub mod hooks;
pub mod types;

pub use access::{
    AccessError, Action, AuditEvent, AuditOutcome, AuditReason, Collection, Decision, Evaluation,
    Grant, Permission, PermissionRef, Predicate, Principal, RecordFilter, RecordRef, Resource,
    Role, RoleGrant, RoleRef, SessionClaims, User, evaluate,
};
pub use types::*;
