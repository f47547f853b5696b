//! Shared fixtures for integration tests
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use inspector_protocol::config::InspectorConfig;
use inspector_protocol::core::value::{Rect, Rgba};
use inspector_protocol::object::{Inspectable, ObjectRegistry, OwnerExecutor};
use inspector_protocol::protocol::capability::CapabilityTable;
use inspector_protocol::service::InspectorService;
use inspector_protocol::snapshot::{Attribute, AttributesGroup, RootsProvider};
use inspector_protocol::Oid;
use std::any::Any;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// A minimal UI-like node
#[derive(Default)]
pub struct View {
    pub hidden: Mutex<bool>,
    pub alpha: Mutex<f64>,
    pub frame: Mutex<Rect>,
    pub background: Mutex<Rgba>,
    /// x, y, width, height, each stored on its own
    pub bounds: [Mutex<f64>; 4],
    pub children: Mutex<Vec<Arc<dyn Inspectable>>>,
}

impl View {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            alpha: Mutex::new(1.0),
            ..Self::default()
        })
    }

    pub fn add_child(&self, child: Arc<dyn Inspectable>) {
        self.children.lock().unwrap().push(child);
    }

    pub fn bounds(&self) -> Rect {
        let field = |i: usize| *self.bounds[i].lock().unwrap();
        Rect::new(field(0), field(1), field(2), field(3))
    }
}

impl Inspectable for View {
    fn class_chain(&self) -> &'static [&'static str] {
        &["View"]
    }

    fn children(&self) -> Vec<Arc<dyn Inspectable>> {
        self.children.lock().unwrap().clone()
    }

    fn describe(&self) -> Vec<AttributesGroup> {
        vec![
            AttributesGroup::single(
                "Visibility",
                vec![
                    Attribute::new("hidden", *self.hidden.lock().unwrap()),
                    Attribute::new("alpha", *self.alpha.lock().unwrap()),
                ],
            ),
            AttributesGroup::single(
                "Layout",
                vec![
                    Attribute::new("frame", *self.frame.lock().unwrap()),
                    Attribute::new("bounds", self.bounds()),
                ],
            ),
        ]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn capabilities() -> CapabilityTable {
    let table = CapabilityTable::new();
    table
        .register("View", "setHidden", |view: &View, hidden: bool| {
            *view.hidden.lock().unwrap() = hidden;
            Ok(())
        })
        .unwrap();
    table
        .register("View", "setAlpha", |view: &View, alpha: f64| {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(format!("alpha {alpha} out of range"));
            }
            *view.alpha.lock().unwrap() = alpha;
            Ok(())
        })
        .unwrap();
    table
        .register("View", "setFrame", |view: &View, frame: Rect| {
            if frame.width < 0.0 || frame.height < 0.0 {
                return Err("negative size".into());
            }
            *view.frame.lock().unwrap() = frame;
            Ok(())
        })
        .unwrap();
    table
        .register("View", "setBounds", |view: &View, bounds: Rect| {
            // One field at a time; an interleaved writer would leave a mixed rect
            let fields = [bounds.x, bounds.y, bounds.width, bounds.height];
            for (slot, value) in view.bounds.iter().zip(fields) {
                *slot.lock().unwrap() = value;
                std::thread::yield_now();
            }
            Ok(())
        })
        .unwrap();
    table
        .register("View", "setBackgroundColor", |view: &View, color: Rgba| {
            *view.background.lock().unwrap() = color;
            Ok(())
        })
        .unwrap();
    table
}

/// A running target: service, registry, roots and owning thread
pub struct Target {
    pub service: InspectorService,
    pub registry: Arc<ObjectRegistry>,
    pub roots: Arc<Mutex<Vec<Arc<dyn Inspectable>>>>,
    pub owner_thread: JoinHandle<()>,
}

impl Target {
    pub fn new(config: &InspectorConfig) -> Self {
        let registry = Arc::new(ObjectRegistry::new());
        let roots: Arc<Mutex<Vec<Arc<dyn Inspectable>>>> = Arc::default();
        let provided = roots.clone();
        let provider: RootsProvider = Arc::new(move || provided.lock().unwrap().clone());
        let (owner, owner_thread) =
            OwnerExecutor::spawn(config.dispatch.owner_queue_capacity).expect("spawn owner");
        let service =
            InspectorService::new(registry.clone(), capabilities(), owner, provider, config)
                .expect("valid config");
        Self {
            service,
            registry,
            roots,
            owner_thread,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(&InspectorConfig::default())
    }

    pub fn register(&self, view: &Arc<View>) -> Oid {
        let object: Arc<dyn Inspectable> = view.clone();
        self.registry.register(&object)
    }

    pub fn add_root(&self, view: &Arc<View>) {
        self.roots.lock().unwrap().push(view.clone());
    }
}

/// Register throwaway views until the next OID handed out is `oid`
pub fn fill_until(target: &Target, oid: u64) -> Vec<Arc<View>> {
    let fillers: Vec<Arc<View>> = (1..oid).map(|_| View::new()).collect();
    for filler in &fillers {
        target.register(filler);
    }
    fillers
}
