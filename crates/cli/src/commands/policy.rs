//! Offline policy inspection.
//!
//! # Usage
//!
//! ```bash
//! tw-cli policy show
//! tw-cli policy check requests.yaml
//! ```
//!
//! `check` reads a list of requests and runs each through the evaluator,
//! with no database involved:
//!
//! ```yaml
//! requests:
//!   - name: cashier reads an order in their restaurant
//!     principal:
//!       id: 7
//!       roles:
//!         - name: Cashier
//!           grants: ["orders:read"]
//!       restaurants: [1]
//!     action: read
//!     collection: orders
//!     target: { restaurant: 1 }
//!     expect: allow
//! ```
//!
//! A request without `principal` is anonymous. `expect` is optional and
//! one of `allow`, `deny` or `allow_if`.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use tablewise_core::access::{Collection, Grant, RoleGrant, UserPrincipal};
use tablewise_core::{
    Action, Decision, Principal, RecordRef, Resource, RestaurantId, RoleId, UserId, evaluate,
};

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Failed to read {0}: {1}")]
    Read(String, std::io::Error),

    #[error("Invalid request file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid grant '{0}': expected resource:action")]
    InvalidGrant(String),

    #[error("{0}")]
    InvalidValue(String),
}

#[derive(Debug, Deserialize)]
struct RequestFile {
    requests: Vec<RequestFixture>,
}

#[derive(Debug, Deserialize)]
struct RequestFixture {
    name: String,
    #[serde(default)]
    principal: Option<PrincipalFixture>,
    action: Action,
    collection: Collection,
    #[serde(default)]
    target: Option<TargetFixture>,
    #[serde(default)]
    expect: Option<Expectation>,
}

#[derive(Debug, Deserialize)]
struct PrincipalFixture {
    id: i32,
    #[serde(default)]
    roles: Vec<RoleFixture>,
    #[serde(default)]
    restaurants: Vec<i32>,
}

#[derive(Debug, Deserialize)]
struct RoleFixture {
    #[serde(default)]
    id: Option<i32>,
    name: String,
    #[serde(default = "active_by_default")]
    active: bool,
    #[serde(default)]
    grants: Vec<String>,
    #[serde(default)]
    system: bool,
}

const fn active_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct TargetFixture {
    restaurant: Option<i32>,
    user: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Expectation {
    Allow,
    Deny,
    AllowIf,
}

impl Expectation {
    const fn matches(self, decision: &Decision) -> bool {
        matches!(
            (self, decision),
            (Self::Allow, Decision::Allow)
                | (Self::Deny, Decision::Deny)
                | (Self::AllowIf, Decision::AllowIf(_))
        )
    }
}

/// Result of evaluating one request from a file.
#[derive(Debug)]
pub struct CheckOutcome {
    pub name: String,
    pub decision: Decision,
    /// Whether the target record, if given, satisfies the decision.
    pub target_allowed: Option<bool>,
    /// `None` when the request states no expectation.
    pub matched: Option<bool>,
}

impl CheckOutcome {
    fn render(&self) -> String {
        let decision = match &self.decision {
            Decision::Allow => "allow".to_owned(),
            Decision::Deny => "deny".to_owned(),
            Decision::AllowIf(predicate) => {
                format!("allow_if {}", predicate.compile().to_where())
            }
        };
        let target = match self.target_allowed {
            Some(true) => " (target permitted)",
            Some(false) => " (target refused)",
            None => "",
        };
        let verdict = match self.matched {
            Some(true) => "ok",
            Some(false) => "MISMATCH",
            None => "-",
        };
        format!("{verdict:<8} {}: {decision}{target}", self.name)
    }
}

/// Print the per-collection policy table.
pub fn show() {
    #[allow(clippy::print_stdout)]
    {
        println!(
            "{:<16} {:<13} {:<16} {:<22} {}",
            "COLLECTION", "RESOURCE", "PUBLIC", "TENANT-SCOPED", "OWNERSHIP"
        );
        for collection in Collection::ALL {
            let policy = collection.policy();
            println!(
                "{:<16} {:<13} {:<16} {:<22} {}",
                collection.slug(),
                policy.resource.as_str(),
                join(policy.public),
                join(policy.tenant_scoped),
                if policy.ownership { "yes" } else { "no" }
            );
        }
    }
}

fn join(actions: &[Action]) -> String {
    if actions.is_empty() {
        return "-".to_owned();
    }
    actions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Evaluate every request in `path`, print one line per request and return
/// the number of requests whose decision differs from `expect`.
pub fn check_file(path: &Path) -> Result<usize, PolicyError> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| PolicyError::Read(path.display().to_string(), e))?;
    let outcomes = check(&source)?;

    #[allow(clippy::print_stdout)]
    {
        for outcome in &outcomes {
            println!("{}", outcome.render());
        }
    }

    Ok(outcomes
        .iter()
        .filter(|o| o.matched == Some(false))
        .count())
}

/// Evaluate every request in a YAML document.
pub fn check(source: &str) -> Result<Vec<CheckOutcome>, PolicyError> {
    let file: RequestFile = serde_yaml::from_str(source)?;
    file.requests.into_iter().map(evaluate_fixture).collect()
}

fn evaluate_fixture(request: RequestFixture) -> Result<CheckOutcome, PolicyError> {
    let principal = match request.principal {
        Some(fixture) => fixture.into_principal()?,
        None => Principal::Anonymous,
    };
    let target = request.target.map(|t| {
        RecordRef::new(t.restaurant.map(RestaurantId::new), t.user.map(UserId::new))
    });

    let decision = evaluate(&principal, request.action, request.collection, target.as_ref()).decision;
    let target_allowed = target.as_ref().map(|t| decision.check(t).is_ok());
    let matched = request.expect.map(|e| e.matches(&decision));

    Ok(CheckOutcome {
        name: request.name,
        decision,
        target_allowed,
        matched,
    })
}

impl PrincipalFixture {
    fn into_principal(self) -> Result<Principal, PolicyError> {
        let roles = self
            .roles
            .into_iter()
            .zip(1..)
            .map(|(role, position)| role.into_grant(position))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Principal::User(UserPrincipal {
            id: UserId::new(self.id),
            roles,
            restaurants: self.restaurants.into_iter().map(RestaurantId::new).collect(),
        }))
    }
}

impl RoleFixture {
    fn into_grant(self, position: i32) -> Result<RoleGrant, PolicyError> {
        let grants = self
            .grants
            .iter()
            .map(String::as_str)
            .map(parse_grant)
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(RoleGrant {
            id: RoleId::new(self.id.unwrap_or(position)),
            name: self.name,
            active: self.active,
            grants,
            system: self.system,
        })
    }
}

/// Parse `resource:action`, the format permissions are named in the catalog.
fn parse_grant(value: &str) -> Result<Grant, PolicyError> {
    let (resource, action) = value
        .split_once(':')
        .ok_or_else(|| PolicyError::InvalidGrant(value.to_owned()))?;
    let resource: Resource = resource.parse().map_err(PolicyError::InvalidValue)?;
    let action: Action = action.parse().map_err(PolicyError::InvalidValue)?;
    Ok(Grant::new(action, resource))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const REQUESTS: &str = r#"
requests:
  - name: guest browses the menu
    action: read
    collection: menu-items
    expect: allow
  - name: guest reads orders
    action: read
    collection: orders
    expect: deny
  - name: cashier reads an order elsewhere
    principal:
      id: 7
      roles:
        - name: Cashier
          grants: ["orders:read"]
      restaurants: [1]
    action: read
    collection: orders
    target: { restaurant: 2 }
    expect: deny
  - name: cashier lists orders
    principal:
      id: 7
      roles:
        - name: Cashier
          grants: ["orders:read"]
      restaurants: [1]
    action: read
    collection: orders
    expect: allow_if
  - name: inactive admin role
    principal:
      id: 9
      roles:
        - name: Administrator
          active: false
    action: delete
    collection: roles
    expect: allow
"#;

    #[test]
    fn test_check_evaluates_each_request() {
        let outcomes = check(REQUESTS).unwrap();
        assert_eq!(outcomes.len(), 5);

        assert_eq!(outcomes[0].decision, Decision::Allow);
        assert_eq!(outcomes[0].matched, Some(true));
        assert_eq!(outcomes[1].decision, Decision::Deny);
        assert_eq!(outcomes[1].matched, Some(true));

        assert_eq!(outcomes[2].decision, Decision::Deny);
        assert_eq!(outcomes[2].target_allowed, Some(false));
        assert_eq!(outcomes[2].matched, Some(true));

        assert!(matches!(outcomes[3].decision, Decision::AllowIf(_)));
        assert_eq!(outcomes[3].target_allowed, None);
        assert!(outcomes[3].render().contains(r#"{"restaurant":{"in":[1]}}"#));
    }

    #[test]
    fn test_administrator_override_ignores_active_flag() {
        let outcomes = check(REQUESTS).unwrap();
        assert_eq!(outcomes[4].decision, Decision::Allow);
        assert!(outcomes[4].render().starts_with("ok"));
    }

    #[test]
    fn test_mismatch_is_reported() {
        let source = r"
requests:
  - name: guest deletes a table
    action: delete
    collection: tables
    expect: allow
";
        let outcomes = check(source).unwrap();
        assert_eq!(outcomes[0].matched, Some(false));
        assert!(outcomes[0].render().starts_with("MISMATCH"));
    }

    #[test]
    fn test_parse_grant() {
        assert_eq!(
            parse_grant("orders:read").unwrap(),
            Grant::new(Action::Read, Resource::Orders)
        );
        assert!(matches!(parse_grant("orders"), Err(PolicyError::InvalidGrant(_))));
        assert!(matches!(parse_grant("orders:fly"), Err(PolicyError::InvalidValue(_))));
    }

    #[test]
    fn test_unknown_collection_is_rejected() {
        let source = "requests:\n  - name: x\n    action: read\n    collection: kitchens\n";
        assert!(matches!(check(source), Err(PolicyError::Yaml(_))));
    }
}
