//! Shared domains and setup.

use async_trait::async_trait;
use morph_core::{doc, Document, ObjectId, Value};
use morph_registry::validators::Length;
use morph_registry::{
    Controller, CustomMutation, EntityDef, EnumType, FieldDef, HookError, Operation, Registry,
    RegistryBuilder, ScalarType, StateAction, StateMachine,
};
use morph_store::{SessionHandle, Stage};

/// Route engine logs to the test harness. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

// ==================== Shop ====================

/// Keeps `total` equal to the sum of `qty * price` over the line items.
pub struct OrderTotals;

fn total(items: &Value) -> f64 {
    items
        .as_list()
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_object)
        .map(|item| {
            let qty = item.get("qty").and_then(Value::as_float).unwrap_or(0.0);
            let price = item.get("price").and_then(Value::as_float).unwrap_or(0.0);
            qty * price
        })
        .sum()
}

#[async_trait]
impl Controller for OrderTotals {
    async fn on_saving(&self, doc: &mut Document, _args: &Document, _session: &SessionHandle) -> Result<(), HookError> {
        let sum = doc.get("items").map(total).unwrap_or(0.0);
        doc.insert("total".into(), Value::Float(sum));
        Ok(())
    }

    async fn on_updating(
        &self,
        _id: ObjectId,
        changes: &mut Document,
        _args: &Document,
        _session: &SessionHandle,
    ) -> Result<(), HookError> {
        if let Some(items) = changes.get("items") {
            let sum = total(items);
            changes.insert("total".into(), Value::Float(sum));
        }
        Ok(())
    }
}

/// Customers with an embedded address and referenced orders; orders with
/// embedded line items and a fulfilment state machine.
pub fn shop() -> Registry {
    let mut builder = RegistryBuilder::new();
    builder
        .add_no_endpoint_type(
            EntityDef::new("Address")
                .field(FieldDef::scalar("street", ScalarType::String))
                .field(FieldDef::scalar("city", ScalarType::String))
                .field(FieldDef::scalar("country", ScalarType::String)),
        )
        .expect("Address");
    builder
        .add_no_endpoint_type(
            EntityDef::new("LineItem")
                .field(FieldDef::scalar("sku", ScalarType::String).non_null())
                .field(FieldDef::scalar("qty", ScalarType::Int))
                .field(FieldDef::scalar("price", ScalarType::Float)),
        )
        .expect("LineItem");
    builder
        .connect(
            EntityDef::new("Customer")
                .field(FieldDef::id())
                .field(
                    FieldDef::scalar("name", ScalarType::String)
                        .non_null()
                        .validate(Operation::Create, Length::between(1, 40)),
                )
                .field(FieldDef::scalar("email", ScalarType::String).unique())
                .field(FieldDef::enumeration("tier", EnumType::new("Tier", &["GOLD", "SILVER"])))
                .field(FieldDef::object("address", "Address").embedded())
                .field(FieldDef::list_of("orders", "Order").references("customer")),
            "customer",
            "customers",
        )
        .collection("customers")
        .done()
        .expect("Customer");
    builder
        .connect(
            EntityDef::new("Order")
                .field(FieldDef::id())
                .field(FieldDef::scalar("number", ScalarType::Int))
                .field(FieldDef::object("customer", "Customer").references("customer"))
                .field(FieldDef::list_of("items", "LineItem").embedded())
                .field(FieldDef::scalar("total", ScalarType::Float).read_only())
                .field(FieldDef::scalar("placed_at", ScalarType::DateTime))
                .field(FieldDef::scalar("state", ScalarType::String)),
            "order",
            "orders",
        )
        .collection("orders")
        .controller(OrderTotals)
        .state_machine(
            StateMachine::new("PLACED")
                .state("PAID")
                .state("SHIPPED")
                .state("CANCELLED")
                .action(StateAction::new("pay", "PLACED", "PAID"))
                .action(StateAction::new("ship", "PAID", "SHIPPED"))
                .action(StateAction::new("cancel", "PLACED", "CANCELLED").describe("Cancel before payment")),
        )
        .done()
        .expect("Order");
    builder
        .register_mutation(CustomMutation::new(
            "orderCount",
            "Number of stored orders",
            |_args, session| async move {
                let counted = session.aggregate("orders", &[Stage::Count("n".into())]).await?;
                let n = counted.first().and_then(|d| d.get("n")).and_then(Value::as_int).unwrap_or(0);
                Ok::<_, HookError>(Value::Int(n))
            },
        ))
        .expect("orderCount");
    builder.build().expect("shop registry")
}

// ==================== Tasks ====================

/// Projects owning tasks; tasks with subtasks and a workflow whose `finish`
/// action records an activity entry.
pub fn tasks() -> Registry {
    let mut builder = RegistryBuilder::new();
    builder
        .connect(
            EntityDef::new("Project")
                .field(FieldDef::id())
                .field(FieldDef::scalar("name", ScalarType::String).non_null())
                .field(FieldDef::list_of("tasks", "Task").references("project")),
            "project",
            "projects",
        )
        .collection("projects")
        .done()
        .expect("Project");
    builder
        .connect(
            EntityDef::new("Task")
                .field(FieldDef::id())
                .field(FieldDef::scalar("title", ScalarType::String).non_null())
                .field(FieldDef::scalar("due", ScalarType::Date))
                .field(FieldDef::scalar("state", ScalarType::String))
                .field(FieldDef::object("project", "Project").references("project"))
                .field(FieldDef::list_of("subtasks", "Task").references("parent")),
            "task",
            "tasks",
        )
        .collection("tasks")
        .state_machine(
            StateMachine::new("TODO")
                .state("DOING")
                .state("DONE")
                .action(StateAction::new("start", "TODO", "DOING"))
                .action(StateAction::new("finish", "DOING", "DONE").effect(|args, session| async move {
                    let task = args.get("id").and_then(Value::to_id).map(Value::Id).unwrap_or_default();
                    session
                        .create("activity", doc! { "task" => task, "action" => "finish" })
                        .await?;
                    Ok::<_, HookError>(())
                })),
        )
        .done()
        .expect("Task");
    builder
        .connect(
            EntityDef::new("Activity")
                .field(FieldDef::id())
                .field(FieldDef::scalar("task", ScalarType::Id))
                .field(FieldDef::scalar("action", ScalarType::String)),
            "activity",
            "activities",
        )
        .collection("activity")
        .done()
        .expect("Activity");
    builder.build().expect("tasks registry")
}
