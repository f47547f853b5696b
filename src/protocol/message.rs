//! Request and response entities carried inside attachments.

use crate::core::value::{AttrType, AttrValue};
use crate::error::{DecodeError, ErrorKind};
use crate::object::Oid;
use crate::snapshot::hierarchy::AttributesGroup;
use serde::{Deserialize, Serialize};

/// A request to set one property on one live object.
///
/// The active variant of `value` always equals `attr_type`; [`AttributeModification::new`]
/// and the secure decoder both enforce it.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeModification {
    target_oid: Oid,
    operation: String,
    attr_type: AttrType,
    value: AttrValue,
    client_readable_version: String,
}

impl AttributeModification {
    pub fn new(
        target_oid: Oid,
        operation: impl Into<String>,
        attr_type: AttrType,
        value: AttrValue,
        client_readable_version: impl Into<String>,
    ) -> Result<Self, DecodeError> {
        if value.attr_type() != attr_type {
            return Err(DecodeError::TypeMismatch {
                declared: attr_type,
                actual: value.attr_type(),
            });
        }
        Ok(Self {
            target_oid,
            operation: operation.into(),
            attr_type,
            value,
            client_readable_version: client_readable_version.into(),
        })
    }

    /// Build a modification whose declared type is taken from the value itself
    pub fn typed(
        target_oid: Oid,
        operation: impl Into<String>,
        value: impl Into<AttrValue>,
        client_readable_version: impl Into<String>,
    ) -> Self {
        let value = value.into();
        Self {
            target_oid,
            operation: operation.into(),
            attr_type: value.attr_type(),
            value,
            client_readable_version: client_readable_version.into(),
        }
    }

    pub fn target_oid(&self) -> Oid {
        self.target_oid
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn attr_type(&self) -> AttrType {
        self.attr_type
    }

    pub fn value(&self) -> &AttrValue {
        &self.value
    }

    pub fn client_readable_version(&self) -> &str {
        &self.client_readable_version
    }

    pub(crate) fn into_value(self) -> AttrValue {
        self.value
    }
}

/// Successful application of a modification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub correlation_id: u64,
    pub target_oid: Oid,
    pub operation: String,
    /// Description of the target read back right after the mutation
    pub attributes: Vec<AttributesGroup>,
}

/// Rejection of an attachment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub correlation_id: u64,
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorReport {
    pub fn new(correlation_id: u64, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            correlation_id,
            kind,
            message: message.into(),
        }
    }
}
