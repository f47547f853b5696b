//! Inspector-side client.
//!
//! Requests may be issued concurrently from any number of tasks over one connection. A
//! background reader routes each response to its request by correlation id, so
//! responses may come back in any order.

use crate::config::PROTOCOL_READABLE_VERSION;
use crate::core::codec::AttachmentCodec;
use crate::core::packet::{Attachment, PayloadKind};
use crate::core::serialization::{
    encode_modification, AllowList, DecodeLimits, Inbound, SecureDecoder,
};
use crate::error::{ProtocolError, Result};
use crate::protocol::correlation::Correlator;
use crate::protocol::message::{Ack, AttributeModification};
use crate::snapshot::hierarchy::HierarchySnapshot;
use crate::utils::timeout::{with_timeout_error, RESPONSE_TIMEOUT};
use bytes::Bytes;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, instrument, warn};

pub struct InspectorClient<S> {
    sink: Mutex<SplitSink<Framed<S, AttachmentCodec>, Attachment>>,
    correlator: Correlator,
    decoder: SecureDecoder,
    version: String,
    response_timeout: Duration,
    reader: JoinHandle<()>,
}

impl<S> InspectorClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap a connected stream. Must be called from within a tokio runtime.
    pub fn new(stream: S) -> Self {
        Self::with_version(stream, PROTOCOL_READABLE_VERSION)
    }

    /// Like [`InspectorClient::new`], announcing `version` instead of this build's
    pub fn with_version(stream: S, version: impl Into<String>) -> Self {
        let limits = DecodeLimits::default();
        let codec = AttachmentCodec::new(limits.max_payload_size);
        let (sink, mut source) = Framed::new(stream, codec).split();
        let correlator = Correlator::new();

        let routes = correlator.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(response) => {
                        routes.complete(response);
                    }
                    Err(e) => {
                        warn!(error = %e, "Dropping connection after bad frame");
                        break;
                    }
                }
            }
            debug!("Client reader finished");
            routes.fail_all();
        });

        Self {
            sink: Mutex::new(sink),
            correlator,
            decoder: SecureDecoder::new(AllowList::client(), limits),
            version: version.into(),
            response_timeout: RESPONSE_TIMEOUT,
            reader,
        }
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Number of requests still waiting for a response
    pub fn in_flight(&self) -> usize {
        self.correlator.pending()
    }

    /// Send a modification and wait for its acknowledgement
    #[instrument(
        level = "debug",
        skip_all,
        fields(oid = %modification.target_oid(), operation = modification.operation())
    )]
    pub async fn modify(&self, modification: &AttributeModification) -> Result<Ack> {
        let payload = encode_modification(modification)?;
        match self.request(PayloadKind::Modification, payload).await? {
            Inbound::Ack(ack) => Ok(ack),
            _ => Err(ProtocolError::UnexpectedMessage),
        }
    }

    /// Ask the target for its current hierarchy
    #[instrument(level = "debug", skip_all)]
    pub async fn request_hierarchy(&self) -> Result<HierarchySnapshot> {
        match self.request(PayloadKind::HierarchyRequest, Bytes::new()).await? {
            Inbound::Snapshot(snapshot) => Ok(snapshot),
            _ => Err(ProtocolError::UnexpectedMessage),
        }
    }

    async fn request(&self, kind: PayloadKind, payload: Bytes) -> Result<Inbound> {
        let (id, response) = self.correlator.begin();
        let attachment = Attachment::new(kind, id, self.version.as_str(), payload);

        let sent = self.sink.lock().await.send(attachment).await;
        if let Err(e) = sent {
            self.correlator.cancel(id);
            return Err(e);
        }

        // A closed slot means the reader saw the connection end
        let waited = with_timeout_error(
            async { response.await.map_err(|_| ProtocolError::ConnectionClosed) },
            self.response_timeout,
        )
        .await;
        let response = match waited {
            Ok(response) => response,
            Err(e) => {
                self.correlator.cancel(id);
                return Err(e);
            }
        };

        match self.decoder.decode(response.kind, &response.payload)? {
            Inbound::Error(report) => Err(ProtocolError::Remote {
                kind: report.kind,
                message: report.message,
            }),
            inbound => Ok(inbound),
        }
    }
}

impl<S> Drop for InspectorClient<S> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
