//! # Secure Payload Decoding
//!
//! Decodes attachment payloads strictly against the shapes a receiver has declared it
//! accepts.
//!
//! ## Guarantees
//! - A payload kind outside the receiver's [`AllowList`] is refused before its bytes
//!   are read.
//! - Each kind decodes into exactly one Rust type; nothing else can be instantiated.
//! - Missing fields, extra fields and trailing bytes are all refused.
//! - Entities are assembled only after every field has parsed, so no partially built
//!   value is ever returned.
//!
//! ## Layouts
//! Modifications use a fixed hand-written layout (big-endian):
//! ```text
//! [TargetOid u64] [OpLen u16] [Operation] [AttrType u8] [Value] [VerLen u16] [Version]
//! ```
//! Snapshots, acks and error reports use bincode with fixed-width big-endian integers,
//! a byte limit and trailing-byte rejection. Snapshots travel flattened in pre-order
//! with child counts and are rebuilt iteratively, so nesting depth is checked without
//! recursion.

use crate::config::{InspectorConfig, MAX_PAYLOAD_SIZE};
use crate::core::packet::{PayloadKind, MAX_VERSION_LEN};
use crate::core::value::{read_value, write_value, AttrType, MAX_STRING_LEN};
use crate::error::{DecodeError, ProtocolError, Result};
use crate::object::Oid;
use crate::protocol::message::{Ack, AttributeModification, ErrorReport};
use crate::snapshot::hierarchy::{AttributesGroup, DisplayItem, HierarchySnapshot};
use bincode::Options;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Upper bound on operation names
pub const MAX_OPERATION_LEN: usize = 256;

/// Default snapshot nesting limit
pub const MAX_SNAPSHOT_DEPTH: usize = 256;

/// Set of payload kinds a receiver accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowList {
    mask: u8,
}

impl AllowList {
    pub const fn new(kinds: &[PayloadKind]) -> Self {
        let mut mask = 0u8;
        let mut i = 0;
        while i < kinds.len() {
            mask |= Self::bit(kinds[i]);
            i += 1;
        }
        Self { mask }
    }

    /// What the inspected process accepts from a client
    pub const fn target() -> Self {
        Self::new(&[PayloadKind::Modification, PayloadKind::HierarchyRequest])
    }

    /// What a client accepts from the inspected process
    pub const fn client() -> Self {
        Self::new(&[PayloadKind::Snapshot, PayloadKind::Ack, PayloadKind::Error])
    }

    pub const fn permits(self, kind: PayloadKind) -> bool {
        self.mask & Self::bit(kind) != 0
    }

    const fn bit(kind: PayloadKind) -> u8 {
        match kind {
            PayloadKind::Modification => 1 << 0,
            PayloadKind::Snapshot => 1 << 1,
            PayloadKind::Ack => 1 << 2,
            PayloadKind::Error => 1 << 3,
            PayloadKind::HierarchyRequest => 1 << 4,
            PayloadKind::Unknown(_) => 0,
        }
    }
}

/// Size and shape bounds applied while decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_payload_size: usize,
    pub max_string_len: usize,
    pub max_depth: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD_SIZE,
            max_string_len: MAX_STRING_LEN,
            max_depth: MAX_SNAPSHOT_DEPTH,
        }
    }
}

impl DecodeLimits {
    pub fn from_config(config: &InspectorConfig) -> Self {
        Self {
            max_payload_size: config.protocol.max_payload_size,
            max_string_len: config.protocol.max_string_len,
            max_depth: config.snapshot.max_depth,
        }
    }
}

/// A decoded, allow-listed payload
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Modification(AttributeModification),
    HierarchyRequest,
    Snapshot(HierarchySnapshot),
    Ack(Ack),
    Error(ErrorReport),
}

/// Payload decoder bound to one receiver's allow-list
#[derive(Debug, Clone, Copy)]
pub struct SecureDecoder {
    allow: AllowList,
    limits: DecodeLimits,
}

impl SecureDecoder {
    pub fn new(allow: AllowList, limits: DecodeLimits) -> Self {
        Self { allow, limits }
    }

    pub fn allow_list(&self) -> AllowList {
        self.allow
    }

    pub fn limits(&self) -> DecodeLimits {
        self.limits
    }

    /// Decode `payload` as `kind`
    #[instrument(level = "debug", skip_all, fields(kind = kind.name(), len = payload.len()))]
    pub fn decode(
        &self,
        kind: PayloadKind,
        payload: &[u8],
    ) -> std::result::Result<Inbound, DecodeError> {
        if !self.allow.permits(kind) {
            debug!("Refusing payload kind outside allow-list");
            return Err(DecodeError::untrusted(format!(
                "payload kind '{}' is not accepted here",
                kind.name()
            )));
        }
        if payload.len() > self.limits.max_payload_size {
            return Err(DecodeError::untrusted(format!(
                "payload of {} bytes exceeds limit",
                payload.len()
            )));
        }

        match kind {
            PayloadKind::Modification => {
                decode_modification(payload, self.limits.max_string_len).map(Inbound::Modification)
            }
            PayloadKind::HierarchyRequest => {
                if payload.is_empty() {
                    Ok(Inbound::HierarchyRequest)
                } else {
                    Err(DecodeError::untrusted("hierarchy request carries a payload"))
                }
            }
            PayloadKind::Snapshot => {
                let wire: WireSnapshot = from_wire(payload, self.limits.max_payload_size)?;
                wire.rebuild(self.limits.max_depth).map(Inbound::Snapshot)
            }
            PayloadKind::Ack => from_wire(payload, self.limits.max_payload_size).map(Inbound::Ack),
            PayloadKind::Error => {
                from_wire(payload, self.limits.max_payload_size).map(Inbound::Error)
            }
            // Never admitted by an allow-list
            PayloadKind::Unknown(byte) => Err(DecodeError::untrusted(format!(
                "unknown payload kind {byte:#04x}"
            ))),
        }
    }
}

fn wire_options(limit: usize) -> impl Options {
    bincode::DefaultOptions::new()
        .with_big_endian()
        .with_fixint_encoding()
        .with_limit(limit as u64)
        .reject_trailing_bytes()
}

fn from_wire<T: DeserializeOwned>(
    payload: &[u8],
    limit: usize,
) -> std::result::Result<T, DecodeError> {
    wire_options(limit)
        .deserialize(payload)
        .map_err(|e| DecodeError::untrusted(e.to_string()))
}

fn to_wire<T: Serialize>(value: &T) -> Result<Bytes> {
    let bytes = wire_options(MAX_PAYLOAD_SIZE).serialize(value)?;
    Ok(Bytes::from(bytes))
}

pub fn encode_ack(ack: &Ack) -> Result<Bytes> {
    to_wire(ack)
}

pub fn encode_error(report: &ErrorReport) -> Result<Bytes> {
    to_wire(report)
}

pub fn encode_snapshot(snapshot: &HierarchySnapshot) -> Result<Bytes> {
    to_wire(&WireSnapshot::flatten(snapshot))
}

/// Encode a modification in its fixed layout
pub fn encode_modification(modification: &AttributeModification) -> Result<Bytes> {
    let operation = modification.operation();
    let version = modification.client_readable_version();
    if operation.is_empty() || operation.len() > MAX_OPERATION_LEN {
        return Err(ProtocolError::Custom(format!(
            "operation name must be 1..={MAX_OPERATION_LEN} bytes"
        )));
    }
    if version.len() > MAX_VERSION_LEN {
        return Err(ProtocolError::Custom("client version string too long".into()));
    }

    let mut buf = BytesMut::with_capacity(
        8 + 2 + operation.len() + 1 + modification.value().encoded_len() + 2 + version.len(),
    );
    buf.put_u64(modification.target_oid().as_u64());
    put_short_str(&mut buf, operation);
    buf.put_u8(modification.attr_type().tag());
    write_value(&mut buf, modification.value());
    put_short_str(&mut buf, version);
    Ok(buf.freeze())
}

/// Decode a modification from its fixed layout
pub fn decode_modification(
    payload: &[u8],
    max_string_len: usize,
) -> std::result::Result<AttributeModification, DecodeError> {
    let mut cursor = payload;

    if cursor.remaining() < 8 {
        return Err(DecodeError::untrusted("truncated target_oid"));
    }
    let target_oid = cursor.get_u64();
    if target_oid == 0 {
        return Err(DecodeError::untrusted("target_oid 0 is never assigned"));
    }

    let operation = get_short_str(&mut cursor, MAX_OPERATION_LEN, "operation")?;
    if operation.is_empty() {
        return Err(DecodeError::untrusted("empty operation"));
    }

    if !cursor.has_remaining() {
        return Err(DecodeError::untrusted("truncated attr_type"));
    }
    let attr_type = AttrType::from_tag(cursor.get_u8())?;
    let value = read_value(&mut cursor, attr_type, max_string_len)?;

    let version = get_short_str(&mut cursor, MAX_VERSION_LEN, "client_readable_version")?;

    if cursor.has_remaining() {
        return Err(DecodeError::untrusted(format!(
            "{} trailing bytes after modification",
            cursor.remaining()
        )));
    }

    AttributeModification::new(Oid::from_raw(target_oid), operation, attr_type, value, version)
}

fn put_short_str(buf: &mut BytesMut, s: &str) {
    buf.put_u16(s.len() as u16);
    buf.put_slice(s.as_bytes());
}

fn get_short_str(
    cursor: &mut &[u8],
    max_len: usize,
    field: &'static str,
) -> std::result::Result<String, DecodeError> {
    if cursor.remaining() < 2 {
        return Err(DecodeError::untrusted(format!("truncated {field} length")));
    }
    let len = cursor.get_u16() as usize;
    if len > max_len {
        return Err(DecodeError::untrusted(format!(
            "{field} length {len} exceeds {max_len}"
        )));
    }
    if cursor.remaining() < len {
        return Err(DecodeError::untrusted(format!("truncated {field}")));
    }
    let text = std::str::from_utf8(&cursor[..len])
        .map_err(|_| DecodeError::untrusted(format!("{field} is not valid UTF-8")))?
        .to_owned();
    cursor.advance(len);
    Ok(text)
}

/// Snapshot as it travels: items in pre-order, each with its child count
#[derive(Serialize, Deserialize)]
struct WireSnapshot {
    server_version: String,
    root_count: u32,
    items: Vec<WireItem>,
}

#[derive(Serialize, Deserialize)]
struct WireItem {
    oid: Oid,
    class_name: String,
    attributes: Vec<AttributesGroup>,
    child_count: u32,
}

impl WireSnapshot {
    fn flatten(snapshot: &HierarchySnapshot) -> Self {
        let mut items = Vec::with_capacity(snapshot.item_count());
        let mut stack: Vec<&DisplayItem> = snapshot.items.iter().rev().collect();
        while let Some(item) = stack.pop() {
            items.push(WireItem {
                oid: item.oid,
                class_name: item.class_name.clone(),
                attributes: item.attributes.clone(),
                child_count: item.children.len() as u32,
            });
            stack.extend(item.children.iter().rev());
        }
        Self {
            server_version: snapshot.server_version.clone(),
            root_count: snapshot.items.len() as u32,
            items,
        }
    }

    fn rebuild(self, max_depth: usize) -> std::result::Result<HierarchySnapshot, DecodeError> {
        let mut roots = Vec::new();
        let mut open: Vec<(DisplayItem, u32)> = Vec::new();

        for wire in self.items {
            if open.is_empty() && roots.len() as u32 >= self.root_count {
                return Err(DecodeError::untrusted("more items than declared roots"));
            }
            if open.len() >= max_depth {
                return Err(DecodeError::untrusted(format!(
                    "snapshot deeper than {max_depth}"
                )));
            }
            open.push((
                DisplayItem {
                    oid: wire.oid,
                    class_name: wire.class_name,
                    attributes: wire.attributes,
                    children: Vec::new(),
                },
                wire.child_count,
            ));

            // Close every item whose children are now complete
            while matches!(open.last(), Some((_, 0))) {
                let Some((done, _)) = open.pop() else { break };
                match open.last_mut() {
                    Some((parent, remaining)) => {
                        parent.children.push(done);
                        *remaining = remaining.saturating_sub(1);
                    }
                    None => roots.push(done),
                }
            }
        }

        if !open.is_empty() || roots.len() as u32 != self.root_count {
            return Err(DecodeError::untrusted(
                "child counts do not match the items present",
            ));
        }

        Ok(HierarchySnapshot {
            server_version: self.server_version,
            items: roots,
        })
    }
}
