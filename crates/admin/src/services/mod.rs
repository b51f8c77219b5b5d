//! Business logic services.
//!
//! Services sit between route handlers and repositories: they ask the
//! access evaluator first, run the role-mutation guard on account and role
//! writes, recompute derived fields, and only then touch the database.

pub mod access;
pub mod auth;
pub mod hooks;
pub mod permissions;
pub mod records;
pub mod roles;
pub mod users;

pub use access::AccessService;
pub use auth::{AuthError, AuthService};
pub use permissions::PermissionService;
pub use records::RecordService;
pub use roles::RoleService;
pub use users::UserService;
