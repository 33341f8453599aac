//! Level 3 - Middleware, error formatting and entry point selection.

use std::sync::Arc;

use async_trait::async_trait;
use morph_core::{DomainError, ErrorPayload, Value};
use morph_dispatch::{
    CallContext, DispatchResult, ErrorFormatter, Middleware, Next, RequestContext, Schema, SchemaBuilder,
};
use morph_store::{DocumentStore, MemoryStore};
use morph_tests::prelude::*;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

/// Records `operation endpoint` for every call.
struct Audit(Arc<Mutex<Vec<String>>>);

#[async_trait]
impl Middleware for Audit {
    async fn handle(&self, call: &mut CallContext<'_>, next: Next<'_>) -> DispatchResult<()> {
        self.0
            .lock()
            .push(format!("{} {}", call.operation(), call.endpoint.name));
        next.run(call).await
    }
}

/// Rejects writes to customers unless the request is marked as admin.
struct CustomersReadOnly;

#[async_trait]
impl Middleware for CustomersReadOnly {
    async fn handle(&self, call: &mut CallContext<'_>, next: Next<'_>) -> DispatchResult<()> {
        let customer_write = !call.endpoint.kind.is_query() && call.endpoint.entity.as_deref() == Some("Customer");
        let admin = call.request.values.get("role") == Some(&Value::from("admin"));
        if customer_write && !admin {
            return Err(DomainError::coded("customers are read-only", "FORBIDDEN", 403).into());
        }
        next.run(call).await
    }
}

async fn schema(builder: impl FnOnce(SchemaBuilder) -> SchemaBuilder) -> (Schema, MemoryStore) {
    fixtures::init_tracing();
    let store = MemoryStore::new();
    let shared: Arc<dyn DocumentStore> = Arc::new(store.clone());
    let schema = builder(SchemaBuilder::new(fixtures::shop(), shared)).build().await.unwrap();
    (schema, store)
}

#[tokio::test]
async fn test_middleware_sees_every_operation() {
    // GIVEN
    let log = Arc::new(Mutex::new(Vec::new()));
    let (schema, _) = schema(|b| b.use_middleware(Audit(log.clone()))).await;
    let mut request = RequestContext::new();

    // WHEN
    let ann = schema
        .execute("addcustomer", json!({ "input": { "name": "Ann" } }), &mut request)
        .await
        .unwrap();
    let order = schema
        .execute("addorder", json!({ "input": { "customer": { "id": ann["id"] } } }), &mut request)
        .await
        .unwrap();
    schema.execute("customer", json!({ "id": ann["id"] }), &mut request).await.unwrap();
    schema.execute("orders", json!({}), &mut request).await.unwrap();
    schema
        .execute("updatecustomer", json!({ "input": { "id": ann["id"], "name": "Annie" } }), &mut request)
        .await
        .unwrap();
    schema.execute("pay_order", json!({ "input": { "id": order["id"] } }), &mut request).await.unwrap();
    schema.execute("orderCount", json!({}), &mut request).await.unwrap();
    schema.execute("deleteorder", json!({ "id": order["id"] }), &mut request).await.unwrap();

    // THEN
    assert_eq!(
        *log.lock(),
        vec![
            "save addcustomer",
            "save addorder",
            "get_by_id customer",
            "find orders",
            "update updatecustomer",
            "state_changed pay_order",
            "custom_mutation orderCount",
            "delete deleteorder",
        ]
    );
}

#[tokio::test]
async fn test_middleware_rejection_stops_the_call() {
    let (schema, store) = schema(|b| b.use_middleware(CustomersReadOnly)).await;

    let mut guest = RequestContext::new();
    let denied = schema
        .execute("addcustomer", json!({ "input": { "name": "Ann" } }), &mut guest)
        .await
        .unwrap_err();
    let listed = schema.execute("customers", json!({}), &mut guest).await.unwrap();
    let mut admin = RequestContext::new().with_value("role", "admin");
    let allowed = schema
        .execute("addcustomer", json!({ "input": { "name": "Ann" } }), &mut admin)
        .await;

    assert_eq!((denied.code.as_str(), denied.status), ("FORBIDDEN", 403));
    assert_eq!(denied.message, "customers are read-only");
    assert_eq!(listed, json!([]));
    assert!(allowed.is_ok());
    assert_eq!(store.count("customers"), 1);
}

#[tokio::test]
async fn test_error_callback_rewrites_payloads() {
    let formatter = ErrorFormatter::with_callback(|payload| {
        (payload.code == "NOT_VALID_ID").then(|| ErrorPayload::new("gone", "GONE", 410))
    });
    let (schema, _) = schema(|b| b.error_formatter(formatter)).await;
    let mut request = RequestContext::new();

    let missing = schema
        .execute("deletecustomer", json!({ "id": "5f1e0c9a2b3c4d5e6f708192" }), &mut request)
        .await
        .unwrap_err();
    let invalid = schema
        .execute("addcustomer", json!({ "input": {} }), &mut request)
        .await
        .unwrap_err();
    let malformed = schema.execute("customers", json!([1, 2]), &mut request).await.unwrap_err();

    assert_eq!((missing.code.as_str(), missing.status, missing.message.as_str()), ("GONE", 410, "gone"));
    assert_eq!(invalid.code, "BAD_REQUEST");
    assert_eq!(malformed.status, 400);
}

#[tokio::test]
async fn test_count_lands_in_request_context() {
    let (schema, _) = schema(|b| b).await;
    let mut request = RequestContext::new();
    for n in 0..3 {
        schema
            .execute("addorder", json!({ "input": { "number": n } }), &mut request)
            .await
            .unwrap();
    }

    let page = schema
        .execute("orders", json!({ "pagination": { "page": 1, "size": 2, "count": true } }), &mut request)
        .await
        .unwrap();

    assert_eq!(page.as_array().map(Vec::len), Some(2));
    assert_eq!(request.count, Some(3));
}

#[tokio::test]
async fn test_include_lists_select_entry_points() {
    let (schema, _) = schema(|b| {
        b.include_queries(["Order"])
            .include_mutations(["Order"])
            .include_custom_mutations(Vec::<String>::new())
    })
    .await;
    let mut request = RequestContext::new();

    let names: Vec<&str> = schema.endpoints().map(|e| e.name.as_str()).collect();
    let hidden = schema
        .execute("addcustomer", json!({ "input": { "name": "Ann" } }), &mut request)
        .await
        .unwrap_err();

    assert_eq!(
        names,
        vec!["addorder", "cancel_order", "deleteorder", "order", "orders", "pay_order", "ship_order", "updateorder"]
    );
    assert_eq!(hidden.status, 400);
}
