//! Level 1 - Input shape synthesis.
//!
//! Shapes derived from the shop and tasks domains, and the pass budget.

use std::sync::Arc;

use morph_core::{Classify, EngineConfig, ErrorKind};
use morph_dispatch::SchemaBuilder;
use morph_registry::{EntityDef, FieldDef, RegistryBuilder, ScalarType};
use morph_store::{DocumentStore, MemoryStore};
use morph_synth::{InputType, Synthesizer};
use morph_tests::fixtures;
use pretty_assertions::assert_eq;

#[test]
fn test_shop_add_shapes() {
    let registry = fixtures::shop();

    let catalog = Synthesizer::new(&registry, 8).synthesize().unwrap();

    let customer = catalog.add_shape("Customer").unwrap();
    assert_eq!(customer.name, "CustomerInput");
    assert_eq!(customer.field_names(), vec!["name", "email", "tier", "address", "orders"]);
    assert!(customer.get_field("name").unwrap().non_null);
    assert_eq!(customer.get_field("address").unwrap().ty, InputType::Shape("AddressInput".into()));
    assert_eq!(
        customer.get_field("orders").unwrap().ty,
        InputType::Delta {
            name: "OneToManyAorders".into(),
            added: "OrderInput".into(),
            updated: "OrderInputForUpdate".into(),
        }
    );

    // Read-only and machine-owned fields never appear
    let order = catalog.add_shape("Order").unwrap();
    assert_eq!(order.field_names(), vec!["number", "customer", "items", "placed_at"]);
    assert_eq!(order.get_field("customer").unwrap().ty, InputType::IdRef);
    assert_eq!(order.get_field("items").unwrap().ty, InputType::ShapeList("LineItemInput".into()));
    assert!(catalog.is_machine_owned("Order", "state"));
    assert_eq!(catalog.passes(), 1);
}

#[test]
fn test_update_shapes_only_require_id() {
    let registry = fixtures::shop();

    let catalog = Synthesizer::new(&registry, 8).synthesize().unwrap();

    let update = catalog.update_shape("Customer").unwrap();
    let required: Vec<&str> = update.fields.iter().filter(|f| f.non_null).map(|f| f.name.as_str()).collect();
    assert_eq!(update.name, "CustomerInputForUpdate");
    assert_eq!(required, vec!["id"]);
    assert_eq!(update.get_field("address").unwrap().ty, InputType::Shape("AddressInputForUpdate".into()));
}

#[test]
fn test_self_reference_uses_own_shapes() {
    let registry = fixtures::tasks();

    let catalog = Synthesizer::new(&registry, 8).synthesize().unwrap();

    let task = catalog.add_shape("Task").unwrap();
    assert_eq!(
        task.get_field("subtasks").unwrap().ty,
        InputType::Delta {
            name: "OneToManyAsubtasks".into(),
            added: "TaskInput".into(),
            updated: "TaskInputForUpdate".into(),
        }
    );
}

#[tokio::test]
async fn test_schema_build_fails_when_passes_run_out() {
    // GIVEN a three-level embedding chain registered outermost first
    let mut builder = RegistryBuilder::new();
    builder
        .connect(
            EntityDef::new("Shipment")
                .field(FieldDef::id())
                .field(FieldDef::object("parcel", "Parcel").embedded()),
            "shipment",
            "shipments",
        )
        .done()
        .unwrap();
    builder
        .add_no_endpoint_type(EntityDef::new("Parcel").field(FieldDef::object("label", "Label").embedded()))
        .unwrap();
    builder
        .add_no_endpoint_type(EntityDef::new("Label").field(FieldDef::scalar("text", ScalarType::String)))
        .unwrap();
    let registry = builder.build().unwrap();
    let mut config = EngineConfig::default();
    config.synthesis.max_passes = 2;
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());

    // WHEN
    let result = SchemaBuilder::new(registry, store).config(config).build().await;

    // THEN
    match result {
        Err(err) => {
            assert_eq!(err.kind(), ErrorKind::Configuration);
            assert!(err.to_string().contains("Shipment"));
        }
        Ok(_) => panic!("expected synthesis to run out of passes"),
    }
}
