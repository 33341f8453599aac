//! Level 3 - Transactional envelope.
//!
//! Every mutating entry point runs in one transaction that is retried from
//! scratch on transient failures.
//!
//! Test modules:
//! - retry: transient commit failures are absorbed, writes happen once
//! - exhaustion: the retry budget surfaces as a transient persistence error
//! - atomicity: a failing hook rolls back every write of the call

use morph_tests::prelude::*;

mod retry {
    use super::*;

    pub fn scenario() -> Scenario {
        Scenario::new("transactions_retry", fixtures::shop)
            .step("test_add_after_two_conflicts", "addcustomer", json!({ "input": { "name": "Ann" } }), |a| {
                a.field("name", "Ann")
            })
            .fail_commits(2)
            .bind("ann")
            .step(
                "test_delta_after_one_conflict",
                "addcustomer",
                json!({ "input": {
                    "name": "Bea",
                    "orders": { "added": [{ "number": 1 }, { "number": 2 }] }
                } }),
                |a| a.ok(),
            )
            .fail_commits(1)
            .step("test_transition_after_one_conflict", "addorder", json!({ "input": { "number": 3 } }), |a| a.ok())
            .bind("o3")
            .step("test_pay", "pay_order", json!({ "input": { "id": "$o3" } }), |a| a.field("state", "PAID"))
            .fail_commits(1)
            .step("test_custom_after_one_conflict", "orderCount", json!({}), |a| a.custom(|n| n == &json!(3)))
            .fail_commits(1)
    }

    #[tokio::test]
    async fn test_transient_failures_commit_exactly_once() {
        let outcome = scenario().run().await.unwrap();

        assert_eq!(outcome.store.count("customers"), 2);
        assert_eq!(outcome.store.count("orders"), 3);
    }
}

mod exhaustion {
    use super::*;
    use morph_core::EngineConfig;

    pub fn scenario() -> Scenario {
        let mut config = EngineConfig::default();
        config.retry.max_attempts = 2;
        config.retry.base_delay_ms = 0;
        config.retry.jitter = false;

        Scenario::new("transactions_exhaustion", fixtures::shop)
            .config(config)
            .step("test_budget_spent", "addcustomer", json!({ "input": { "name": "Ann" } }), |a| {
                a.code("TRANSIENT_TRANSACTION_ERROR").status(503).error("after 2 attempts")
            })
            .fail_commits(2)
            .step("test_nothing_written", "customers", json!({}), |a| a.rows(0))
            .step("test_next_call_succeeds", "addcustomer", json!({ "input": { "name": "Ann" } }), |a| a.ok())
    }

    #[tokio::test]
    async fn test_retry_budget_is_bounded() {
        let outcome = scenario().run().await.unwrap();

        assert_eq!(outcome.store.count("customers"), 1);
    }
}

mod atomicity {
    use super::*;

    pub fn scenario() -> Scenario {
        Scenario::new("transactions_atomicity", fixtures::shop)
            // The second child fails its input check inside the delta: nothing is kept
            .step(
                "test_delta_child_rejected",
                "addcustomer",
                json!({ "input": {
                    "name": "Ann",
                    "email": "ann@example.com",
                    "orders": { "added": [{ "number": 1 }, { "number": 2, "items": [{ "qty": 1 }] }] }
                } }),
                |a| a.status(400).error("sku"),
            )
            .step("test_no_customer", "customers", json!({}), |a| a.rows(0))
            .step("test_no_orders", "orders", json!({}), |a| a.rows(0))
            // The unique index fires at commit: the parent and its children roll back together
            .step("test_setup_owner", "addcustomer", json!({ "input": { "name": "Owner", "email": "taken@example.com" } }), |a| {
                a.ok()
            })
            .step(
                "test_duplicate_rolls_back_children",
                "addcustomer",
                json!({ "input": {
                    "name": "Copycat",
                    "email": "taken@example.com",
                    "orders": { "added": [{ "number": 7 }] }
                } }),
                |a| a.code("DUPLICATE_KEY"),
            )
            .step("test_children_rolled_back", "orders", json!({}), |a| a.rows(0))
    }

    #[tokio::test]
    async fn test_failed_calls_leave_no_partial_writes() {
        let outcome = scenario().run().await.unwrap();

        assert_eq!(outcome.store.count("customers"), 1);
        assert_eq!(outcome.store.count("orders"), 0);
    }
}
