//! Level 1 - Customers integration tests.
//!
//! Single-entity lifecycle against the shop domain.
//!
//! Test modules:
//! - crud: add, get by id, update, delete
//! - embedded: object merge on update, explicit null unsets a field
//! - validation: input shape rejects, field validators, unique indexes

use morph_tests::prelude::*;

mod crud {
    use super::*;

    pub fn scenario() -> Scenario {
        Scenario::new("customers_crud", fixtures::shop)
            .step(
                "test_add_customer",
                "addcustomer",
                json!({ "input": { "name": "Ann", "email": "ann@example.com", "tier": "GOLD" } }),
                |a| a.field("name", "Ann").field("tier", "GOLD"),
            )
            .bind("ann")
            .step("test_get_by_id", "customer", json!({ "id": "$ann" }), |a| {
                a.field("email", "ann@example.com").custom(|c| c["id"].is_string())
            })
            .step(
                "test_update_name",
                "updatecustomer",
                json!({ "input": { "id": "$ann", "name": "Annie" } }),
                |a| a.field("name", "Annie").field("email", "ann@example.com"),
            )
            .step("test_list_all", "customers", json!({}), |a| a.rows(1).column("name", ["Annie"]))
            .step("test_delete", "deletecustomer", json!({ "id": "$ann" }), |a| a.field("name", "Annie"))
            .step("test_gone_after_delete", "customer", json!({ "id": "$ann" }), |a| a.is_null())
            .step("test_delete_again", "deletecustomer", json!({ "id": "$ann" }), |a| {
                a.code("NOT_VALID_ID").status(404)
            })
    }

    #[tokio::test]
    async fn test_crud_operations_on_customers() {
        let outcome = scenario().run().await.unwrap();

        assert_eq!(outcome.store.count("customers"), 0);
        assert_eq!(outcome.id("ann").len(), 24);
    }
}

mod embedded {
    use super::*;

    pub fn scenario() -> Scenario {
        Scenario::new("customers_embedded", fixtures::shop)
            .step(
                "test_add_with_address",
                "addcustomer",
                json!({ "input": {
                    "name": "Bob",
                    "email": "bob@example.com",
                    "address": { "street": "1 Main St", "city": "Lyon", "country": "FR" }
                } }),
                |a| a.field("address.city", "Lyon"),
            )
            .bind("bob")
            // Embedded objects merge: street and country survive
            .step(
                "test_update_city_only",
                "updatecustomer",
                json!({ "input": { "id": "$bob", "address": { "city": "Paris" } } }),
                |a| {
                    a.field("address.city", "Paris")
                        .field("address.street", "1 Main St")
                        .field("address.country", "FR")
                },
            )
            // Explicit null on a nullable field removes it
            .step(
                "test_null_unsets_email",
                "updatecustomer",
                json!({ "input": { "id": "$bob", "email": null } }),
                |a| a.custom(|customer| customer.get("email").is_none()),
            )
            .step("test_stored_without_email", "customer", json!({ "id": "$bob" }), |a| {
                a.custom(|customer| customer.get("email").is_none() && customer["name"] == "Bob")
            })
    }

    #[tokio::test]
    async fn test_embedded_object_updates_merge() {
        scenario().run().await.unwrap();
    }
}

mod validation {
    use super::*;

    pub fn scenario() -> Scenario {
        Scenario::new("customers_validation", fixtures::shop)
            .step("test_missing_required_name", "addcustomer", json!({ "input": { "email": "x@example.com" } }), |a| {
                a.code("BAD_REQUEST").error("CustomerInput.name")
            })
            .step(
                "test_unknown_field",
                "addcustomer",
                json!({ "input": { "name": "Cy", "age": 3 } }),
                |a| a.status(400).error("CustomerInput.age"),
            )
            .step(
                "test_unknown_enum_symbol",
                "addcustomer",
                json!({ "input": { "name": "Cy", "tier": "PLATINUM" } }),
                |a| a.status(400).error("CustomerInput.tier"),
            )
            .step(
                "test_name_too_long",
                "addcustomer",
                json!({ "input": { "name": "x".repeat(41) } }),
                |a| a.code("BAD_REQUEST").error("Customer.name must be at most 40 characters"),
            )
            .step(
                "test_first_email",
                "addcustomer",
                json!({ "input": { "name": "Cy", "email": "cy@example.com" } }),
                |a| a.ok(),
            )
            .step(
                "test_duplicate_email",
                "addcustomer",
                json!({ "input": { "name": "Cy again", "email": "cy@example.com" } }),
                |a| a.code("DUPLICATE_KEY").status(409).error_pattern("duplicate key in customers\\.email"),
            )
            .step("test_update_without_id", "updatecustomer", json!({ "input": { "name": "Nobody" } }), |a| {
                a.status(400).error("CustomerInputForUpdate.id")
            })
            .step("test_unknown_entry_point", "addcustomers", json!({}), |a| {
                a.status(400).error("unknown entry point")
            })
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected_without_writes() {
        let outcome = scenario().run().await.unwrap();

        assert_eq!(outcome.store.count("customers"), 1);
    }
}
