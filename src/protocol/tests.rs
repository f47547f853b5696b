// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::config::DispatchConfig;
use crate::core::value::{AttrType, AttrValue, Rect};
use crate::error::DispatchError;
use crate::object::{Inspectable, ObjectRegistry, OwnerExecutor, OwnerHandle};
use crate::protocol::capability::CapabilityTable;
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::message::AttributeModification;
use crate::snapshot::hierarchy::{Attribute, AttributesGroup};
use std::any::Any;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct View {
    hidden: Mutex<bool>,
    frame: Mutex<Rect>,
}

impl Inspectable for View {
    fn class_chain(&self) -> &'static [&'static str] {
        &["View"]
    }

    fn describe(&self) -> Vec<AttributesGroup> {
        vec![AttributesGroup::single(
            "Visibility",
            vec![Attribute::new("hidden", *self.hidden.lock().unwrap())],
        )]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct Unrelated;

impl Inspectable for Unrelated {
    fn class_chain(&self) -> &'static [&'static str] {
        &["Unrelated"]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn dispatcher(owner: OwnerHandle) -> Dispatcher {
    let capabilities = CapabilityTable::new();
    capabilities
        .register("View", "setHidden", |view: &View, hidden: bool| {
            *view.hidden.lock().unwrap() = hidden;
            Ok(())
        })
        .unwrap();
    capabilities
        .register("View", "setFrame", |view: &View, frame: Rect| {
            if frame.width < 0.0 || frame.height < 0.0 {
                return Err("negative size".into());
            }
            *view.frame.lock().unwrap() = frame;
            Ok(())
        })
        .unwrap();
    Dispatcher::new(
        Arc::new(ObjectRegistry::new()),
        capabilities,
        owner,
        &DispatchConfig::default(),
    )
}

fn register(
    dispatcher: &Dispatcher,
    object: Arc<dyn Inspectable>,
) -> (Arc<dyn Inspectable>, crate::object::Oid) {
    let oid = dispatcher.registry().register(&object);
    (object, oid)
}

#[tokio::test]
async fn test_apply_sets_property_and_acks() {
    let (owner, _join) = OwnerExecutor::spawn(8).expect("spawn owner");
    let dispatcher = dispatcher(owner);
    let view = Arc::new(View::default());
    let (_keep, oid) = register(&dispatcher, view.clone());

    let ack = dispatcher
        .apply(AttributeModification::typed(oid, "setHidden", true, "1.0.0"), 9)
        .await
        .expect("applied");

    assert_eq!(ack.correlation_id, 9);
    assert_eq!(ack.target_oid, oid);
    assert_eq!(ack.operation, "setHidden");
    assert!(*view.hidden.lock().unwrap());
    assert_eq!(
        ack.attributes[0].sections[0].attributes[0].value,
        AttrValue::Bool(true)
    );
}

#[tokio::test]
async fn test_setter_runs_on_owning_thread() {
    let (owner, _join) = OwnerExecutor::spawn(8).expect("spawn owner");
    let capabilities = CapabilityTable::new();
    let seen = Arc::new(Mutex::new(None));
    let record = seen.clone();
    capabilities
        .register("View", "setHidden", move |_: &View, _: bool| {
            *record.lock().unwrap() = std::thread::current().name().map(str::to_owned);
            Ok(())
        })
        .unwrap();
    let dispatcher = Dispatcher::new(
        Arc::new(ObjectRegistry::new()),
        capabilities,
        owner,
        &DispatchConfig::default(),
    );
    let (_keep, oid) = register(&dispatcher, Arc::new(View::default()));

    dispatcher
        .apply(AttributeModification::typed(oid, "setHidden", false, "1.0.0"), 1)
        .await
        .expect("applied");
    assert_eq!(seen.lock().unwrap().as_deref(), Some("inspector-owner"));
}

#[tokio::test]
async fn test_stale_target_after_drop() {
    let (owner, _join) = OwnerExecutor::spawn(8).expect("spawn owner");
    let dispatcher = dispatcher(owner);
    let (view, oid) = register(&dispatcher, Arc::new(View::default()));
    drop(view);

    let err = dispatcher
        .apply(AttributeModification::typed(oid, "setHidden", true, "1.0.0"), 2)
        .await
        .unwrap_err();
    assert_eq!(err, DispatchError::StaleTarget(oid));
}

#[tokio::test]
async fn test_unknown_operation_and_type() {
    let (owner, _join) = OwnerExecutor::spawn(8).expect("spawn owner");
    let dispatcher = dispatcher(owner);
    let (_view, view_oid) = register(&dispatcher, Arc::new(View::default()));
    let (_other, other_oid) = register(&dispatcher, Arc::new(Unrelated));

    let err = dispatcher
        .apply(AttributeModification::typed(view_oid, "setAlpha", 0.5f64, "1.0.0"), 3)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::UnsupportedOperation { .. }));

    let err = dispatcher
        .apply(AttributeModification::typed(other_oid, "setHidden", true, "1.0.0"), 4)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::UnsupportedOperation { .. }));
}

#[tokio::test]
async fn test_type_mismatch_does_not_mutate() {
    let (owner, _join) = OwnerExecutor::spawn(8).expect("spawn owner");
    let dispatcher = dispatcher(owner);
    let view = Arc::new(View::default());
    let (_keep, oid) = register(&dispatcher, view.clone());

    let err = dispatcher
        .apply(AttributeModification::typed(oid, "setHidden", 1i64, "1.0.0"), 5)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DispatchError::TypeMismatch {
            expected: AttrType::Bool,
            actual: AttrType::Int
        }
    );
    assert!(!*view.hidden.lock().unwrap());
}

#[tokio::test]
async fn test_rejected_by_target() {
    let (owner, _join) = OwnerExecutor::spawn(8).expect("spawn owner");
    let dispatcher = dispatcher(owner);
    let view = Arc::new(View::default());
    let (_keep, oid) = register(&dispatcher, view.clone());

    let frame = Rect::new(0.0, 0.0, -1.0, 10.0);
    let err = dispatcher
        .apply(AttributeModification::typed(oid, "setFrame", frame, "1.0.0"), 6)
        .await
        .unwrap_err();
    assert_eq!(err, DispatchError::RejectedByTarget("negative size".into()));
    assert_eq!(*view.frame.lock().unwrap(), Rect::default());
}

#[tokio::test]
async fn test_wedged_owner_times_out() {
    // Nobody drives the loop, so the job is never picked up
    let (owner, _owner_loop) = OwnerExecutor::channel(8);
    let capabilities = CapabilityTable::new();
    capabilities
        .register("View", "setHidden", |_: &View, _: bool| Ok(()))
        .unwrap();
    let dispatcher = Dispatcher::new(
        Arc::new(ObjectRegistry::new()),
        capabilities,
        owner,
        &DispatchConfig {
            mutation_timeout: Duration::from_millis(50),
            ..DispatchConfig::default()
        },
    );
    let (_keep, oid) = register(&dispatcher, Arc::new(View::default()));

    let err = dispatcher
        .apply(AttributeModification::typed(oid, "setHidden", true, "1.0.0"), 7)
        .await
        .unwrap_err();
    assert_eq!(err, DispatchError::Timeout);
}
