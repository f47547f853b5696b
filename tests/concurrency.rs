//! Concurrency tests: ordering on the owning thread, destruction races, registry churn

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{Target, View};
use inspector_protocol::core::value::{AttrValue, Rect};
use inspector_protocol::error::ErrorKind;
use inspector_protocol::object::{Inspectable, ObjectRegistry};
use inspector_protocol::{AttributeModification, Oid};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

fn bounds_for(i: u64) -> Rect {
    let v = i as f64;
    Rect::new(v, v + 0.25, v + 0.5, v + 0.75)
}

fn reported_bounds(ack: &inspector_protocol::Ack) -> Option<AttrValue> {
    ack.attributes
        .iter()
        .flat_map(|group| &group.sections)
        .flat_map(|section| &section.attributes)
        .find(|attribute| attribute.identifier == "bounds")
        .map(|attribute| attribute.value.clone())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_applies_to_one_object() {
    let target = Target::with_defaults();
    let view = View::new();
    let oid = target.register(&view);
    let dispatcher = target.service.dispatcher().clone();

    // The setter writes its four fields separately and yields in between, so
    // overlapping applies would leave a rect mixing two requests.
    let mut tasks = Vec::new();
    for i in 0..64u64 {
        let dispatcher = dispatcher.clone();
        tasks.push(tokio::spawn(async move {
            dispatcher
                .apply(
                    AttributeModification::typed(oid, "setBounds", bounds_for(i), "1.0.0"),
                    i,
                )
                .await
        }));
    }

    let mut acked = Vec::new();
    for task in tasks {
        let ack = task.await.unwrap().expect("ack");
        // Refreshed attributes are read right after this request's own write
        assert_eq!(
            reported_bounds(&ack),
            Some(AttrValue::Rect(bounds_for(ack.correlation_id)))
        );
        acked.push(ack.correlation_id);
    }
    acked.sort_unstable();
    assert_eq!(acked, (0..64).collect::<Vec<_>>());

    // The final rect is exactly one request's value, never a blend
    let last = view.bounds();
    assert!((0..64).any(|i| bounds_for(i) == last), "mixed rect {last:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_destroyed_from_another_thread_is_stale() {
    let target = Target::with_defaults();
    let view = View::new();
    let oid = target.register(&view);
    let dispatcher = target.service.dispatcher().clone();

    thread::spawn(move || drop(view)).join().unwrap();

    let err = dispatcher
        .apply(AttributeModification::typed(oid, "setHidden", true, "1.0.0"), 1)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StaleTarget);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_apply_racing_destruction_never_panics() {
    let target = Target::with_defaults();
    let dispatcher = target.service.dispatcher().clone();

    for round in 0..32u64 {
        let view = View::new();
        let oid = target.register(&view);
        let dropper = thread::spawn(move || drop(view));
        let result = dispatcher
            .apply(AttributeModification::typed(oid, "setHidden", true, "1.0.0"), round)
            .await;
        dropper.join().unwrap();
        if let Err(e) = result {
            assert_eq!(e.kind(), ErrorKind::StaleTarget);
        }
    }
}

#[test]
fn test_registry_resolve_during_churn() {
    let registry = Arc::new(ObjectRegistry::new());
    let stop = Arc::new(AtomicBool::new(false));
    let start = Arc::new(Barrier::new(3));

    let writers: Vec<_> = (0..2)
        .map(|_| {
            let registry = registry.clone();
            let stop = stop.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                let mut seen = Vec::new();
                while !stop.load(Ordering::Relaxed) {
                    let view: Arc<dyn Inspectable> = View::new();
                    let oid = registry.register(&view);
                    assert!(registry.resolve(oid).is_some());
                    drop(view);
                    assert!(registry.resolve(oid).is_none());
                    registry.prune();
                    seen.push(oid);
                }
                seen
            })
        })
        .collect();

    start.wait();
    thread::sleep(std::time::Duration::from_millis(100));
    stop.store(true, Ordering::Relaxed);

    let mut all: Vec<Oid> = writers
        .into_iter()
        .flat_map(|writer| writer.join().unwrap())
        .collect();
    let total = all.len();
    all.sort_unstable();
    all.dedup();
    // Generations make every issued OID unique, even with slot reuse
    assert_eq!(all.len(), total);
}
