//! Target-side request handling.
//!
//! Every inbound attachment gets exactly one response carrying its correlation id. The
//! sender's version is checked before the payload is looked at; the payload is then
//! decoded against the target allow-list and routed to the dispatcher or the snapshot
//! scheduler.

use crate::config::InspectorConfig;
use crate::core::packet::{Attachment, PayloadKind};
use crate::core::serialization::{
    encode_ack, encode_error, AllowList, DecodeLimits, Inbound, SecureDecoder,
};
use crate::error::{ErrorKind, ProtocolError, Result};
use crate::object::{ObjectRegistry, OwnerHandle};
use crate::protocol::capability::CapabilityTable;
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::message::ErrorReport;
use crate::protocol::version::VersionRange;
use crate::snapshot::scheduler::{RootsProvider, SnapshotScheduler};
use crate::utils::metrics::global_metrics;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

#[derive(Clone)]
pub struct InspectorService {
    versions: VersionRange,
    decoder: SecureDecoder,
    dispatcher: Dispatcher,
    scheduler: SnapshotScheduler,
    server_version: Arc<str>,
    max_in_flight: usize,
}

impl InspectorService {
    /// Build a service from its collaborators; fails if `config` does not validate
    pub fn new(
        registry: Arc<ObjectRegistry>,
        capabilities: CapabilityTable,
        owner: OwnerHandle,
        roots: RootsProvider,
        config: &InspectorConfig,
    ) -> Result<Self> {
        config.validate_strict()?;
        let server_version: Arc<str> = config.protocol.server_version.as_str().into();
        let dispatcher =
            Dispatcher::new(registry.clone(), capabilities, owner.clone(), &config.dispatch);
        let scheduler = SnapshotScheduler::new(
            registry,
            owner,
            roots,
            server_version.clone(),
            &config.snapshot,
        );
        Ok(Self {
            versions: config.protocol.version_range()?,
            decoder: SecureDecoder::new(AllowList::target(), DecodeLimits::from_config(config)),
            dispatcher,
            scheduler,
            server_version,
            max_in_flight: config.protocol.max_in_flight,
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn scheduler(&self) -> &SnapshotScheduler {
        &self.scheduler
    }

    /// Bounds applied to inbound payloads, including the frame size limit
    pub fn limits(&self) -> DecodeLimits {
        self.decoder.limits()
    }

    /// Requests a single connection may have in progress at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Answer one attachment
    #[instrument(
        level = "debug",
        skip_all,
        fields(correlation_id = request.correlation_id, kind = request.kind.name())
    )]
    pub async fn handle(&self, request: Attachment) -> Attachment {
        let metrics = global_metrics();
        metrics.attachment_received();
        let correlation_id = request.correlation_id;

        if let Err(e) = self.versions.check(&request.client_readable_version) {
            warn!(version = %request.client_readable_version, "Rejecting incompatible client");
            metrics.attachment_rejected();
            return self.error(correlation_id, e.kind(), e.to_string());
        }

        let inbound = match self.decoder.decode(request.kind, &request.payload) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!(error = %e, "Rejecting payload");
                metrics.attachment_rejected();
                return self.error(correlation_id, e.kind(), e.to_string());
            }
        };

        match inbound {
            Inbound::Modification(modification) => {
                match self.dispatcher.apply(modification, correlation_id).await {
                    Ok(ack) => match encode_ack(&ack) {
                        Ok(payload) => self.reply(PayloadKind::Ack, correlation_id, payload),
                        Err(e) => self.internal(correlation_id, e),
                    },
                    Err(e) => self.error(correlation_id, e.kind(), e.to_string()),
                }
            }
            Inbound::HierarchyRequest => match self.scheduler.request_snapshot().wait().await {
                Ok(encoded) => {
                    self.reply(PayloadKind::Snapshot, correlation_id, encoded.bytes.clone())
                }
                Err(e) => {
                    debug!(error = %e, "No snapshot for request");
                    self.error(correlation_id, e.kind(), e.to_string())
                }
            },
            // The target allow-list admits nothing else
            other => {
                error!(?other, "Allow-list admitted an unexpected payload");
                self.error(correlation_id, ErrorKind::UntrustedPayload, "unexpected payload")
            }
        }
    }

    fn reply(&self, kind: PayloadKind, correlation_id: u64, payload: Bytes) -> Attachment {
        Attachment::new(kind, correlation_id, &*self.server_version, payload)
    }

    fn error(
        &self,
        correlation_id: u64,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Attachment {
        let report = ErrorReport::new(correlation_id, kind, message.into());
        let payload = encode_error(&report).unwrap_or_else(|e| {
            error!(error = %e, "Failed to encode error report");
            Bytes::new()
        });
        self.reply(PayloadKind::Error, correlation_id, payload)
    }

    fn internal(&self, correlation_id: u64, e: ProtocolError) -> Attachment {
        error!(error = %e, "Failed to encode response");
        self.error(correlation_id, ErrorKind::Internal, e.to_string())
    }
}
