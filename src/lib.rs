//! # Inspector Protocol
//!
//! Wire protocol for inspecting and mutating a live object graph from another process.
//!
//! An inspector client sends [`AttributeModification`]s and hierarchy requests wrapped in
//! [`Attachment`]s. The target checks the sender's version, decodes the payload against
//! an allow-list, resolves the target object by [`Oid`] and applies the change on the
//! thread that owns the object. Hierarchy snapshots are captured on demand; a newer
//! request always supersedes an older one still in flight.
//!
//! ## Layers
//! - [`core`]: typed values, envelope framing and secure payload decoding
//! - [`object`]: the object registry and the owning-thread executor
//! - [`protocol`]: messages, versions, capabilities, dispatch and correlation
//! - [`snapshot`]: hierarchy model and snapshot scheduling
//! - [`service`] / [`transport`]: both ends of a connection
//!
//! ## Example
//! ```rust,no_run
//! use inspector_protocol::config::InspectorConfig;
//! use inspector_protocol::object::{Inspectable, ObjectRegistry, OwnerExecutor};
//! use inspector_protocol::protocol::capability::CapabilityTable;
//! use inspector_protocol::service::InspectorService;
//! use inspector_protocol::snapshot::RootsProvider;
//! use std::sync::Arc;
//!
//! # async fn run(stream: tokio::io::DuplexStream) -> inspector_protocol::Result<()> {
//! let config = InspectorConfig::default();
//! let (owner, _thread) = OwnerExecutor::spawn(config.dispatch.owner_queue_capacity)?;
//! let roots: RootsProvider = Arc::new(Vec::<Arc<dyn Inspectable>>::new);
//! let service = InspectorService::new(
//!     Arc::new(ObjectRegistry::new()),
//!     CapabilityTable::new(),
//!     owner,
//!     roots,
//!     &config,
//! )?;
//! inspector_protocol::transport::serve(stream, service).await
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod object;
pub mod protocol;
pub mod service;
pub mod snapshot;
pub mod transport;
pub mod utils;

pub use crate::core::packet::{Attachment, PayloadKind};
pub use crate::core::value::{AttrType, AttrValue};
pub use crate::error::{ErrorKind, ProtocolError, Result};
pub use crate::object::{Inspectable, Oid};
pub use crate::protocol::message::{Ack, AttributeModification, ErrorReport};
