//! End-to-end dependency tracking: declared properties re-notify when the
//! objects they are computed from change, including mid-path replacement of
//! intermediate objects.

use std::sync::{Arc, Mutex};

use bindflow::{
    BinaryOp, ChangeHandler, DynamicObject, Expr, Model, ModelError, ObjectRef, Record,
    Subscription, Value, ValueKind,
};

// =============================================================================
// Fixtures
// =============================================================================

/// Records every aggregate change notification a model raises.
struct ChangeLog {
    names: Arc<Mutex<Vec<String>>>,
    _handler: Arc<ChangeHandler>,
    _subscription: Subscription,
}

impl ChangeLog {
    fn attach(model: &Model) -> Self {
        let names = Arc::new(Mutex::new(Vec::new()));
        let seen = names.clone();
        let handler: Arc<ChangeHandler> = Arc::new(move |name: &str| {
            seen.lock().unwrap().push(name.to_string());
        });
        let subscription = model.changed().subscribe(&handler);
        Self {
            names,
            _handler: handler,
            _subscription: subscription,
        }
    }

    fn names(&self) -> Vec<String> {
        self.names.lock().unwrap().clone()
    }

    fn count(&self) -> usize {
        self.names.lock().unwrap().len()
    }
}

fn full_name_model() -> (Arc<Record>, Model) {
    let customer = Record::new("Customer");
    customer.set("FirstName", "Paul");
    customer.set("LastName", "Stovell");
    let customer_ref: ObjectRef = customer.clone();

    let model = Model::new();
    let expression = Expr::binary(
        BinaryOp::Add,
        Expr::property_path(&customer_ref, "FirstName"),
        Expr::binary(
            BinaryOp::Add,
            Expr::constant(" "),
            Expr::property_path(&customer_ref, "LastName"),
        ),
    );
    model
        .property("FullName", ValueKind::Str, expression)
        .unwrap();
    model.seal().unwrap();
    (customer, model)
}

// =============================================================================
// Computed Properties
// =============================================================================

#[test]
fn test_computed_property_reads_through_its_expression() {
    let (_customer, model) = full_name_model();
    assert_eq!(model.read("FullName").unwrap(), Value::from("Paul Stovell"));
}

#[test]
fn test_upstream_mutation_renotifies_the_owning_property() {
    let (customer, model) = full_name_model();
    let log = ChangeLog::attach(&model);

    customer.set("FirstName", "Jack");
    assert_eq!(log.names(), vec!["FullName"]);
    assert_eq!(model.read("FullName").unwrap(), Value::from("Jack Stovell"));
}

#[test]
fn test_each_mutation_fires_exactly_once() {
    let (customer, model) = full_name_model();
    let log = ChangeLog::attach(&model);

    customer.set("FirstName", "Jack");
    customer.set("LastName", "Jones");
    customer.set("FirstName", "Jill");
    assert_eq!(log.count(), 3);
}

#[test]
fn test_unrelated_properties_fire_nothing() {
    let (customer, model) = full_name_model();
    let log = ChangeLog::attach(&model);

    customer.set("Age", 23);
    assert_eq!(log.count(), 0);
}

// =============================================================================
// Path Re-attachment
// =============================================================================

#[test]
fn test_intermediate_replacement_rebinds_the_chain() {
    let original = Record::new("Customer");
    original.set("Name", "Paul");
    let order = Record::new("Order");
    order.set("Customer", Value::from(original.clone()));
    let order_ref: ObjectRef = order.clone();

    let model = Model::new();
    model
        .property(
            "CustomerName",
            ValueKind::Str,
            Expr::property_path(&order_ref, "Customer.Name"),
        )
        .unwrap();
    model.seal().unwrap();
    let log = ChangeLog::attach(&model);

    let replacement = Record::new("Customer");
    replacement.set("Name", "Jack");
    order.set("Customer", Value::from(replacement.clone()));

    // Exactly one notification for the reassignment itself.
    assert_eq!(log.names(), vec!["CustomerName"]);
    assert_eq!(model.read("CustomerName").unwrap(), Value::from("Jack"));

    // The old subtree is detached; only the replacement is monitored.
    original.set("Name", "Ghost");
    assert_eq!(log.count(), 1);
    replacement.set("Name", "Jill");
    assert_eq!(log.count(), 2);
    assert_eq!(model.read("CustomerName").unwrap(), Value::from("Jill"));
}

#[test]
fn test_null_intermediate_is_silent_until_populated() {
    let order = Record::new("Order");
    order.set("Customer", Value::Null);
    let order_ref: ObjectRef = order.clone();

    let model = Model::new();
    model
        .property(
            "CustomerName",
            ValueKind::Str,
            Expr::property_path(&order_ref, "Customer.Name"),
        )
        .unwrap();
    model.seal().unwrap();
    let log = ChangeLog::attach(&model);

    // A broken chain reads as Null and raises nothing.
    assert_eq!(model.read("CustomerName").unwrap(), Value::Null);
    assert_eq!(log.count(), 0);

    let customer = Record::new("Customer");
    customer.set("Name", "Paul");
    order.set("Customer", Value::from(customer.clone()));
    assert_eq!(log.count(), 1);
    assert_eq!(model.read("CustomerName").unwrap(), Value::from("Paul"));

    customer.set("Name", "Jack");
    assert_eq!(log.count(), 2);
}

// =============================================================================
// Whole-object Dependencies
// =============================================================================

#[test]
fn test_bare_object_capture_depends_on_every_property() {
    let customer = Record::new("Customer");
    let customer_ref: ObjectRef = customer.clone();

    let model = Model::new();
    model
        .property("Customer", ValueKind::Object, Expr::object(&customer_ref))
        .unwrap();
    model.seal().unwrap();
    let log = ChangeLog::attach(&model);

    customer.set("Name", "Paul");
    customer.set("Age", 23);
    assert_eq!(log.names(), vec!["Customer", "Customer"]);
}

// =============================================================================
// Lambda Properties
// =============================================================================

#[test]
fn test_lambda_property_follows_the_swapped_target() {
    let first = Record::new("Customer");
    first.set("Name", "Paul");
    let screen = Record::new("Screen");
    screen.set("Customer", Value::from(first.clone()));
    let screen_ref: ObjectRef = screen.clone();

    let model = Model::new();
    let property = model
        .lambda_property(Expr::member(
            Expr::member(Expr::object(&screen_ref), "Customer"),
            "Name",
        ))
        .unwrap();
    assert_eq!(property.name(), "Name");
    assert!(!property.is_read_only());
    model.seal().unwrap();

    model.write("Name", Value::from("Jack")).unwrap();
    assert_eq!(first.get("Name"), Some(Value::from("Jack")));

    // Swap the object behind the path; reads and writes follow it.
    let second = Record::new("Customer");
    second.set("Name", "Jill");
    screen.set("Customer", Value::from(second.clone()));

    assert_eq!(model.read("Name").unwrap(), Value::from("Jill"));
    model.write("Name", Value::from("Joan")).unwrap();
    assert_eq!(second.get("Name"), Some(Value::from("Joan")));
    assert_eq!(first.get("Name"), Some(Value::from("Jack")));
}

// =============================================================================
// Disposal
// =============================================================================

#[test]
fn test_disposal_unsubscribes_fully() {
    let (customer, model) = full_name_model();
    let log = ChangeLog::attach(&model);

    model.dispose();
    customer.set("FirstName", "Jack");
    customer.set("LastName", "Jones");
    assert_eq!(log.count(), 0);
    assert_eq!(customer.change_event().unwrap().subscriber_count(), 0);
}

#[test]
fn test_dropping_the_model_detaches_its_monitors() {
    let (customer, model) = full_name_model();
    drop(model);
    customer.set("FirstName", "Jack");
    assert_eq!(customer.change_event().unwrap().subscriber_count(), 0);
}

// =============================================================================
// Static Dependencies
// =============================================================================

#[test]
fn test_static_dependencies_cannot_attach() {
    let model = Model::new();
    model
        .property(
            "Hour",
            ValueKind::Int,
            Expr::member(Expr::static_member("Clock", "Now"), "Hour"),
        )
        .unwrap();
    let error = model.seal().unwrap_err();
    assert!(matches!(error, ModelError::UnattachableDependency { .. }));
}
