//! # Attachment Envelope
//!
//! Every request and response travels as an [`Attachment`].
//!
//! ## Wire Format
//! ```text
//! [Magic(4)] [FrameVersion(1)] [Kind(1)] [CorrelationId(8)]
//! [VersionLen(2)] [ClientVersion(N)] [PayloadLen(4)] [Payload(M)]
//! ```
//! Integers are big-endian. The client version string sits in the header so a receiver
//! can refuse an incompatible peer before it looks at the payload.
//!
//! Only the magic, frame version and lengths are needed to delimit a frame. A frame with
//! an unknown kind or a version that is not UTF-8 is still delimited and keeps its
//! correlation id, so the receiver can answer it instead of dropping the connection.

use crate::config::{FRAME_VERSION, MAGIC_BYTES, MAX_PAYLOAD_SIZE};
use crate::error::{ProtocolError, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Bytes before the variable-length client version
pub const FIXED_HEADER_LEN: usize = 16;

/// Upper bound on the client version string
pub const MAX_VERSION_LEN: usize = 256;

/// What an attachment's payload holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    /// An encoded `AttributeModification`
    Modification,
    /// An encoded `HierarchySnapshot`
    Snapshot,
    /// An encoded `Ack`
    Ack,
    /// An encoded `ErrorReport`
    Error,
    /// A request for a fresh snapshot; empty payload
    HierarchyRequest,
    /// A kind byte this build does not know. No allow-list admits it.
    Unknown(u8),
}

impl PayloadKind {
    pub fn to_byte(self) -> u8 {
        match self {
            PayloadKind::Modification => 0x01,
            PayloadKind::Snapshot => 0x02,
            PayloadKind::Ack => 0x03,
            PayloadKind::Error => 0x04,
            PayloadKind::HierarchyRequest => 0x05,
            PayloadKind::Unknown(byte) => byte,
        }
    }

    /// Known kinds only; see [`PayloadKind::Unknown`] for the rest
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(PayloadKind::Modification),
            0x02 => Some(PayloadKind::Snapshot),
            0x03 => Some(PayloadKind::Ack),
            0x04 => Some(PayloadKind::Error),
            0x05 => Some(PayloadKind::HierarchyRequest),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PayloadKind::Modification => "modification",
            PayloadKind::Snapshot => "snapshot",
            PayloadKind::Ack => "ack",
            PayloadKind::Error => "error",
            PayloadKind::HierarchyRequest => "hierarchy_request",
            PayloadKind::Unknown(_) => "unknown",
        }
    }
}

/// Wire envelope: payload plus correlation and version metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub correlation_id: u64,
    pub client_readable_version: String,
    pub kind: PayloadKind,
    pub payload: Bytes,
}

impl Attachment {
    pub fn new(
        kind: PayloadKind,
        correlation_id: u64,
        client_readable_version: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            correlation_id,
            client_readable_version: client_readable_version.into(),
            kind,
            payload: payload.into(),
        }
    }

    /// Size of this attachment on the wire
    pub fn encoded_len(&self) -> usize {
        FIXED_HEADER_LEN + self.client_readable_version.len() + 4 + self.payload.len()
    }

    /// Append the wire form to `dst`
    pub fn write_to(&self, dst: &mut BytesMut) -> Result<()> {
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::OversizedPacket(self.payload.len()));
        }
        if self.client_readable_version.len() > MAX_VERSION_LEN {
            return Err(ProtocolError::InvalidHeader);
        }
        dst.reserve(self.encoded_len());
        dst.put_slice(&MAGIC_BYTES);
        dst.put_u8(FRAME_VERSION);
        dst.put_u8(self.kind.to_byte());
        dst.put_u64(self.correlation_id);
        dst.put_u16(self.client_readable_version.len() as u16);
        dst.put_slice(self.client_readable_version.as_bytes());
        dst.put_u32(self.payload.len() as u32);
        dst.put_slice(&self.payload);
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_to(&mut buf)?;
        Ok(buf.to_vec())
    }

    /// Parse exactly one attachment from `data`
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        match frame_len(data, MAX_PAYLOAD_SIZE)? {
            Some(len) if len == data.len() => Ok(parse_frame(Bytes::copy_from_slice(data))),
            _ => Err(ProtocolError::InvalidHeader),
        }
    }
}

/// Total frame length if `data` starts with a complete frame, `None` if more bytes are
/// needed. Header violations are reported as soon as the offending field is visible.
///
/// A declared payload longer than `max_payload_size` is refused before it is buffered.
pub fn frame_len(data: &[u8], max_payload_size: usize) -> Result<Option<usize>> {
    if data.len() < FIXED_HEADER_LEN {
        // Reject garbage early rather than waiting for a full header
        let seen = data.len().min(MAGIC_BYTES.len());
        if data[..seen] != MAGIC_BYTES[..seen] {
            return Err(ProtocolError::InvalidHeader);
        }
        return Ok(None);
    }
    if data[..4] != MAGIC_BYTES {
        return Err(ProtocolError::InvalidHeader);
    }
    if data[4] != FRAME_VERSION {
        return Err(ProtocolError::UnsupportedVersion(data[4]));
    }
    let version_len = u16::from_be_bytes([data[14], data[15]]) as usize;
    if version_len > MAX_VERSION_LEN {
        return Err(ProtocolError::InvalidHeader);
    }
    let len_at = FIXED_HEADER_LEN + version_len;
    if data.len() < len_at + 4 {
        return Ok(None);
    }
    let payload_len = u32::from_be_bytes([
        data[len_at],
        data[len_at + 1],
        data[len_at + 2],
        data[len_at + 3],
    ]) as usize;
    if payload_len > max_payload_size {
        return Err(ProtocolError::OversizedPacket(payload_len));
    }
    let total = len_at + 4 + payload_len;
    Ok((data.len() >= total).then_some(total))
}

/// Split a complete frame (as measured by [`frame_len`]) into an attachment.
///
/// The payload is sliced out of `frame` without copying and without being inspected.
/// A version that is not UTF-8 is carried lossily; it can never pass a version check.
pub(crate) fn parse_frame(frame: Bytes) -> Attachment {
    let kind = PayloadKind::from_byte(frame[5]).unwrap_or(PayloadKind::Unknown(frame[5]));
    let correlation_id = u64::from_be_bytes([
        frame[6], frame[7], frame[8], frame[9], frame[10], frame[11], frame[12], frame[13],
    ]);
    let version_len = u16::from_be_bytes([frame[14], frame[15]]) as usize;
    let version_end = FIXED_HEADER_LEN + version_len;
    let client_readable_version =
        String::from_utf8_lossy(&frame[FIXED_HEADER_LEN..version_end]).into_owned();
    let payload = frame.slice(version_end + 4..);

    Attachment {
        correlation_id,
        client_readable_version,
        kind,
        payload,
    }
}
