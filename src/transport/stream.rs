//! One inspector connection over any async byte stream.
//!
//! Each inbound attachment is handled on its own task and its response is written as
//! soon as it is ready, so a slow snapshot never holds up a quick modification behind
//! it. At most `max_in_flight` requests are in progress; beyond that the connection
//! stops reading until one finishes.
//!
//! A frame with an unknown kind or an unreadable version is still answered under its
//! own correlation id. Only a frame that cannot be delimited (bad magic, unknown frame
//! version, oversize) ends the connection, after an unsolicited error report
//! (correlation id 0).

use crate::config::PROTOCOL_READABLE_VERSION;
use crate::core::codec::AttachmentCodec;
use crate::core::packet::{Attachment, PayloadKind};
use crate::core::serialization::encode_error;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::ErrorReport;
use crate::service::inspector::InspectorService;
use crate::utils::metrics::global_metrics;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Responses buffered ahead of the writer
const RESPONSE_QUEUE: usize = 64;

/// Serve `stream` until the peer closes it or sends an untrustworthy frame
pub async fn serve<S>(stream: S, service: InspectorService) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let codec = AttachmentCodec::new(service.limits().max_payload_size);
    let (mut sink, mut source) = Framed::new(stream, codec).split();
    let (tx, mut rx) = mpsc::channel::<Attachment>(RESPONSE_QUEUE);
    let in_flight = Arc::new(Semaphore::new(service.max_in_flight()));

    // Ends once every sender is gone, i.e. after the last in-flight request answered
    let writer = tokio::spawn(async move {
        while let Some(response) = rx.recv().await {
            sink.send(response).await?;
        }
        sink.close().await?;
        Ok::<_, ProtocolError>(())
    });

    info!("Inspector connection opened");
    let mut outcome = Ok(());
    while let Some(frame) = source.next().await {
        match frame {
            Ok(request) => {
                if in_flight.available_permits() == 0 {
                    debug!("In-flight limit reached; pausing reads");
                }
                // The semaphore is never closed
                let Ok(permit) = in_flight.clone().acquire_owned().await else {
                    break;
                };
                let service = service.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    // Held until the response is queued for the writer
                    let _permit = permit;
                    let response = service.handle(request).await;
                    if tx.send(response).await.is_err() {
                        debug!("Connection writer gone; dropping response");
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "Closing connection after untrusted frame");
                global_metrics().attachment_rejected();
                let report = ErrorReport::new(0, e.kind(), e.to_string());
                if let Ok(payload) = encode_error(&report) {
                    let unsolicited = Attachment::new(
                        PayloadKind::Error,
                        0,
                        PROTOCOL_READABLE_VERSION,
                        payload,
                    );
                    let _ = tx.send(unsolicited).await;
                }
                outcome = Err(e);
                break;
            }
        }
    }
    drop(tx);

    let written = writer
        .await
        .map_err(|e| ProtocolError::Custom(format!("{}: {e}", constants::ERR_CONNECTION_WRITER)))?;
    info!("Inspector connection closed");
    outcome.and(written)
}
