//! Snapshot scheduler
//!
//! Only the most recent request is ever answered with a snapshot. Each request bumps a
//! generation counter and cancels the previous capture's token; the previous handle
//! resolves to [`SnapshotError::Superseded`] at once. A finished capture is delivered
//! under the scheduler lock and only if its generation is still current, so a stale
//! result can never land after a newer request was made.
//!
//! The traversal runs on the owning thread, so it never sees a half-applied mutation.
//! The token is checked before the roots are fetched and before every subtree. Registry
//! entries of destroyed objects are swept before each traversal. Encoding runs on a
//! blocking task.

use crate::config::SnapshotConfig;
use crate::core::serialization::encode_snapshot;
use crate::error::SnapshotError;
use crate::object::owner::OwnerError;
use crate::object::{Inspectable, ObjectRegistry, OwnerHandle};
use crate::snapshot::hierarchy::{DisplayItem, HierarchySnapshot};
use crate::utils::metrics::{global_metrics, Timer};
use bytes::Bytes;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Produces the current root objects. Called on the owning thread.
pub type RootsProvider = Arc<dyn Fn() -> Vec<Arc<dyn Inspectable>> + Send + Sync>;

type Delivery = oneshot::Sender<Result<Arc<EncodedSnapshot>, SnapshotError>>;

/// A captured snapshot together with its wire encoding
#[derive(Debug)]
pub struct EncodedSnapshot {
    pub generation: u64,
    pub snapshot: HierarchySnapshot,
    pub bytes: Bytes,
}

/// Pending result of one [`SnapshotScheduler::request_snapshot`] call
#[derive(Debug)]
pub struct SnapshotHandle {
    generation: u64,
    rx: oneshot::Receiver<Result<Arc<EncodedSnapshot>, SnapshotError>>,
}

impl SnapshotHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn wait(self) -> Result<Arc<EncodedSnapshot>, SnapshotError> {
        // A dropped sender means the request was overtaken
        self.rx.await.unwrap_or(Err(SnapshotError::Superseded))
    }
}

struct SchedulerState {
    generation: u64,
    token: CancellationToken,
    pending: Option<Delivery>,
}

#[derive(Clone)]
pub struct SnapshotScheduler {
    registry: Arc<ObjectRegistry>,
    owner: OwnerHandle,
    roots: RootsProvider,
    server_version: Arc<str>,
    max_depth: usize,
    capture_timeout: Duration,
    state: Arc<Mutex<SchedulerState>>,
}

impl SnapshotScheduler {
    pub fn new(
        registry: Arc<ObjectRegistry>,
        owner: OwnerHandle,
        roots: RootsProvider,
        server_version: impl Into<Arc<str>>,
        config: &SnapshotConfig,
    ) -> Self {
        Self {
            registry,
            owner,
            roots,
            server_version: server_version.into(),
            max_depth: config.max_depth.max(1),
            capture_timeout: config.capture_timeout,
            state: Arc::new(Mutex::new(SchedulerState {
                generation: 0,
                token: CancellationToken::new(),
                pending: None,
            })),
        }
    }

    /// Start a capture, superseding any that is still in flight.
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(level = "debug", skip(self))]
    pub fn request_snapshot(&self) -> SnapshotHandle {
        let (tx, rx) = oneshot::channel();
        let (generation, token) = {
            let mut state = self.lock();
            state.token.cancel();
            if let Some(previous) = state.pending.take() {
                debug!(generation = state.generation, "Superseding in-flight snapshot");
                global_metrics().snapshot_superseded();
                let _ = previous.send(Err(SnapshotError::Superseded));
            }
            state.generation += 1;
            state.token = CancellationToken::new();
            state.pending = Some(tx);
            (state.generation, state.token.clone())
        };

        let scheduler = self.clone();
        tokio::spawn(async move {
            let result = scheduler.produce(generation, token).await;
            scheduler.deliver(generation, result);
        });

        SnapshotHandle { generation, rx }
    }

    /// Generation of the most recent request
    pub fn current_generation(&self) -> u64 {
        self.lock().generation
    }

    async fn produce(
        &self,
        generation: u64,
        token: CancellationToken,
    ) -> Result<Arc<EncodedSnapshot>, SnapshotError> {
        let _timer = Timer::start("snapshot");

        let capture = Capture {
            registry: self.registry.clone(),
            token: token.clone(),
            max_depth: self.max_depth,
        };
        let roots = self.roots.clone();
        let server_version = self.server_version.to_string();
        let snapshot = self
            .owner
            .run(self.capture_timeout, move || capture.snapshot(&roots, server_version))
            .await
            .map_err(|e| match e {
                OwnerError::Timeout => SnapshotError::Timeout,
                OwnerError::Unavailable => SnapshotError::OwnerUnavailable,
            })??;

        if token.is_cancelled() {
            return Err(SnapshotError::Cancelled);
        }

        let (snapshot, bytes) = tokio::task::spawn_blocking(move || {
            encode_snapshot(&snapshot).map(|bytes| (snapshot, bytes))
        })
        .await
        .map_err(|e| SnapshotError::Encode(e.to_string()))?
        .map_err(|e| SnapshotError::Encode(e.to_string()))?;

        Ok(Arc::new(EncodedSnapshot {
            generation,
            snapshot,
            bytes,
        }))
    }

    fn deliver(&self, generation: u64, result: Result<Arc<EncodedSnapshot>, SnapshotError>) {
        let mut state = self.lock();
        if state.generation != generation {
            debug!(generation, current = state.generation, "Discarding superseded snapshot");
            return;
        }
        let Some(tx) = state.pending.take() else {
            return;
        };
        match &result {
            Ok(encoded) => {
                debug!(
                    generation,
                    items = encoded.snapshot.item_count(),
                    bytes = encoded.bytes.len(),
                    "Snapshot delivered"
                );
                global_metrics().snapshot_delivered();
            }
            Err(e) => warn!(generation, error = %e, "Snapshot failed"),
        }
        let _ = tx.send(result);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Traversal run on the owning thread
struct Capture {
    registry: Arc<ObjectRegistry>,
    token: CancellationToken,
    max_depth: usize,
}

impl Capture {
    fn snapshot(
        &self,
        roots: &RootsProvider,
        server_version: String,
    ) -> Result<HierarchySnapshot, SnapshotError> {
        if self.token.is_cancelled() {
            return Err(SnapshotError::Cancelled);
        }
        self.registry.prune();
        let items = roots()
            .iter()
            .map(|root| self.item(root, 1))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(HierarchySnapshot {
            server_version,
            items,
        })
    }

    fn item(
        &self,
        object: &Arc<dyn Inspectable>,
        depth: usize,
    ) -> Result<DisplayItem, SnapshotError> {
        if self.token.is_cancelled() {
            return Err(SnapshotError::Cancelled);
        }
        let children = if depth < self.max_depth {
            object
                .children()
                .iter()
                .map(|child| self.item(child, depth + 1))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };
        Ok(DisplayItem {
            oid: self.registry.register(object),
            class_name: object.class_name().to_string(),
            attributes: object.describe(),
            children,
        })
    }
}
