//! Integration tests for the access evaluator.
//!
//! Properties are checked exhaustively over every collection and action,
//! followed by end-to-end scenarios mixing the evaluator with the filter
//! compiler.

#![allow(clippy::unwrap_used)]

use serde_json::json;

use tablewise_core::access::{AuditOutcome, AuditReason, Collection, Grant};
use tablewise_core::{
    Action, Decision, Predicate, Principal, RecordRef, Resource, RestaurantId, UserId, evaluate,
};
use tablewise_integration_tests::{administrator, customer, role, staff, with_roles};

fn targets() -> Vec<Option<RecordRef>> {
    vec![
        None,
        Some(RecordRef::default()),
        Some(RecordRef::in_restaurant(RestaurantId::new(1))),
        Some(RecordRef::in_restaurant(RestaurantId::new(77))),
        Some(RecordRef::owned_by(UserId::new(5))),
        Some(RecordRef::new(Some(RestaurantId::new(3)), Some(UserId::new(9)))),
    ]
}

// =============================================================================
// Properties
// =============================================================================

#[test]
fn test_no_grant_and_not_public_is_denied() {
    let principal = staff(5, &[], &[1]);

    for collection in Collection::ALL {
        let policy = collection.policy();
        if policy.ownership {
            continue;
        }
        for action in Action::ALL {
            if policy.is_public(action) {
                continue;
            }
            for target in targets() {
                let eval = evaluate(&principal, action, collection, target.as_ref());
                assert_eq!(
                    eval.decision,
                    Decision::Deny,
                    "{action} on {collection} with {target:?}"
                );
                assert_eq!(eval.audit.outcome, AuditOutcome::Denied);
            }
        }
    }
}

#[test]
fn test_ownership_never_reaches_a_stranger_record() {
    let principal = customer(5);
    let stranger = RecordRef::new(Some(RestaurantId::new(1)), Some(UserId::new(6)));

    for collection in Collection::ALL {
        for action in Action::ALL {
            if collection.policy().is_public(action) {
                continue;
            }
            let eval = evaluate(&principal, action, collection, Some(&stranger));
            assert_eq!(eval.decision, Decision::Deny, "{action} on {collection}");
        }
    }
}

#[test]
fn test_administrator_is_allowed_everything() {
    let principal = administrator(1);

    for collection in Collection::ALL {
        for action in Action::ALL {
            for target in targets() {
                let eval = evaluate(&principal, action, collection, target.as_ref());
                assert_eq!(eval.decision, Decision::Allow, "{action} on {collection}");
            }
        }
    }
}

#[test]
fn test_tenant_scope_allows_iff_target_restaurant_assigned() {
    let assigned = [1, 2];

    for collection in Collection::ALL {
        let policy = collection.policy();
        for action in policy.tenant_scoped.iter().copied() {
            if policy.is_public(action) {
                continue;
            }
            let principal = staff(5, &[Grant::new(action, policy.resource)], &assigned);
            for restaurant in 0..5 {
                let target = RecordRef::in_restaurant(RestaurantId::new(restaurant));
                let decision = evaluate(&principal, action, collection, Some(&target)).decision;
                let expected = if assigned.contains(&restaurant) {
                    Decision::Allow
                } else {
                    Decision::Deny
                };
                assert_eq!(decision, expected, "{action} on {collection} in {restaurant}");
            }
        }
    }
}

#[test]
fn test_evaluate_is_idempotent() {
    let principals = [
        Principal::Anonymous,
        customer(5),
        staff(5, &[Grant::new(Action::Read, Resource::Orders)], &[1]),
        administrator(1),
    ];

    for principal in &principals {
        for collection in Collection::ALL {
            for action in Action::ALL {
                for target in targets() {
                    let first = evaluate(principal, action, collection, target.as_ref());
                    let second = evaluate(principal, action, collection, target.as_ref());
                    assert_eq!(first, second);
                }
            }
        }
    }
}

#[test]
fn test_public_allow_list_applies_to_authenticated_users() {
    let principals = [customer(5), staff(5, &[], &[9])];

    for principal in &principals {
        for collection in Collection::ALL {
            for action in collection.policy().public.iter().copied() {
                let eval = evaluate(principal, action, collection, None);
                assert_eq!(eval.decision, Decision::Allow);
                assert_eq!(eval.audit.reason, AuditReason::PublicPolicy);
            }
        }
    }
}

#[test]
fn test_inactive_roles_grant_nothing() {
    let grants: Vec<Grant> = Resource::ALL
        .into_iter()
        .flat_map(|r| Action::ALL.into_iter().map(move |a| Grant::new(a, r)))
        .collect();
    let principal = with_roles(5, vec![role(3, "Suspended", false, &grants)], &[1]);

    let eval = evaluate(&principal, Action::Read, Collection::InventoryItems, None);
    assert_eq!(eval.decision, Decision::Deny);

    let target = RecordRef::in_restaurant(RestaurantId::new(1));
    let eval = evaluate(&principal, Action::Delete, Collection::Tables, Some(&target));
    assert_eq!(eval.decision, Decision::Deny);
}

#[test]
fn test_filter_agrees_with_predicate() {
    let principal = staff(5, &[Grant::new(Action::Read, Resource::Inventory)], &[2, 4]);
    let Decision::AllowIf(predicate) =
        evaluate(&principal, Action::Read, Collection::InventoryItems, None).decision
    else {
        panic!("expected a conditional allow");
    };
    let filter = predicate.compile();

    for target in targets().into_iter().flatten() {
        assert_eq!(filter.matches(&target), predicate.matches(&target), "{target:?}");
    }
    assert_eq!(filter.to_where(), json!({"restaurant": {"in": [2, 4]}}));
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_principal_without_roles_cannot_read_orders() {
    let eval = evaluate(&customer(5), Action::Read, Collection::Orders, None);
    assert_eq!(eval.decision, Decision::Deny);
    assert_eq!(eval.audit.actor, Some(UserId::new(5)));
    assert_eq!(eval.audit.reason, AuditReason::NoPermission);
}

#[test]
fn test_anonymous_may_place_an_order() {
    let eval = evaluate(&Principal::Anonymous, Action::Create, Collection::Orders, None);
    assert_eq!(eval.decision, Decision::Allow);
    assert_eq!(eval.audit.actor, None);
}

#[test]
fn test_staff_without_restaurants_lists_nothing() {
    let principal = staff(5, &[Grant::new(Action::Read, Resource::Orders)], &[]);
    let filter = evaluate(&principal, Action::Read, Collection::Orders, None)
        .decision
        .into_filter()
        .unwrap()
        .unwrap();
    assert!(filter.matches_nothing());
}

#[test]
fn test_customer_reads_only_own_account() {
    let principal = customer(8);
    let decision = evaluate(&principal, Action::Read, Collection::Users, None).decision;
    assert_eq!(decision, Decision::AllowIf(Predicate::OwnedBy(UserId::new(8))));

    assert!(decision.check(&RecordRef::owned_by(UserId::new(8))).is_ok());
    assert!(decision.check(&RecordRef::owned_by(UserId::new(9))).is_err());
}

#[test]
fn test_owners_cannot_create_for_others() {
    let eval = evaluate(&customer(8), Action::Create, Collection::Users, None);
    assert_eq!(eval.decision, Decision::Deny);
}

#[test]
fn test_manager_menu_update_confined_but_delete_is_not() {
    let principal = staff(
        5,
        &[
            Grant::new(Action::Update, Resource::Menu),
            Grant::new(Action::Delete, Resource::Menu),
        ],
        &[1],
    );
    let elsewhere = RecordRef::in_restaurant(RestaurantId::new(2));

    let update = evaluate(&principal, Action::Update, Collection::MenuItems, Some(&elsewhere));
    assert_eq!(update.decision, Decision::Deny);
    assert_eq!(update.audit.reason, AuditReason::OutsideTenant);

    let delete = evaluate(&principal, Action::Delete, Collection::MenuItems, Some(&elsewhere));
    assert_eq!(delete.decision, Decision::Allow);
}
