use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::object::owner::OwnerError;
use crate::object::{ObjectRegistry, OwnerHandle};
use crate::protocol::capability::{CapabilityTable, InvokeError};
use crate::protocol::message::{Ack, AttributeModification};
use crate::snapshot::hierarchy::AttributesGroup;
use crate::utils::metrics::global_metrics;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Applies decoded modifications to live objects.
///
/// Resolution and type checks run on the caller's task. Only the setter call is sent to
/// the owning thread, and the caller awaits it. Because the owning thread runs one job
/// at a time, applies to the same object are totally ordered.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ObjectRegistry>,
    capabilities: CapabilityTable,
    owner: OwnerHandle,
    mutation_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ObjectRegistry>,
        capabilities: CapabilityTable,
        owner: OwnerHandle,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            registry,
            capabilities,
            owner,
            mutation_timeout: config.mutation_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ObjectRegistry> {
        &self.registry
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    /// Apply `modification` and acknowledge it under `correlation_id`.
    ///
    /// Nothing is mutated unless every check passes; the setter is the only mutating
    /// step.
    #[instrument(
        level = "debug",
        skip_all,
        fields(
            oid = %modification.target_oid(),
            operation = modification.operation(),
            correlation_id = correlation_id
        )
    )]
    pub async fn apply(
        &self,
        modification: AttributeModification,
        correlation_id: u64,
    ) -> Result<Ack, DispatchError> {
        let result = self.try_apply(modification, correlation_id).await;
        let metrics = global_metrics();
        match &result {
            Ok(_) => metrics.modification_applied(),
            Err(DispatchError::StaleTarget(oid)) => {
                debug!(%oid, "Modification target is stale");
                metrics.stale_target();
            }
            Err(e) => {
                warn!(error = %e, "Modification rejected");
                metrics.modification_rejected();
            }
        }
        result
    }

    async fn try_apply(
        &self,
        modification: AttributeModification,
        correlation_id: u64,
    ) -> Result<Ack, DispatchError> {
        let oid = modification.target_oid();

        // 1. Resolve
        let target = self
            .registry
            .resolve(oid)
            .ok_or(DispatchError::StaleTarget(oid))?;

        // 2. Look up the operation for the object's dynamic type
        let capability = self
            .capabilities
            .lookup(target.class_chain(), modification.operation())
            .ok_or_else(|| DispatchError::UnsupportedOperation {
                class: target.class_name().to_string(),
                operation: modification.operation().to_string(),
            })?;

        // 3. Declared types must agree exactly
        let declared = modification.attr_type();
        if capability.param_type() != declared {
            return Err(DispatchError::TypeMismatch {
                expected: capability.param_type(),
                actual: declared,
            });
        }
        if modification.value().attr_type() != declared {
            return Err(DispatchError::TypeMismatch {
                expected: declared,
                actual: modification.value().attr_type(),
            });
        }

        // 4. Invoke on the owning thread. Only a weak reference crosses over, so an
        // object destroyed in the meantime is reported stale rather than revived.
        let param = capability.param_type();
        let weak = Arc::downgrade(&target);
        drop(target);
        let operation = modification.operation().to_string();
        let value = modification.into_value();
        let outcome = self
            .owner
            .run(self.mutation_timeout, move || -> Result<Vec<AttributesGroup>, InvokeError> {
                let target = weak.upgrade().ok_or(InvokeError::Stale)?;
                capability.invoke(target.as_ref(), value)?;
                Ok(target.describe())
            })
            .await
            .map_err(|e| match e {
                OwnerError::Timeout => DispatchError::Timeout,
                OwnerError::Unavailable => DispatchError::OwnerUnavailable,
            })?;

        let attributes = outcome.map_err(|e| match e {
            InvokeError::Stale => DispatchError::StaleTarget(oid),
            InvokeError::Rejected(reason) => DispatchError::RejectedByTarget(reason),
            InvokeError::WrongValue => DispatchError::TypeMismatch {
                expected: param,
                actual: declared,
            },
            InvokeError::WrongTarget(expected) => DispatchError::UnsupportedOperation {
                class: expected.to_string(),
                operation: operation.clone(),
            },
        })?;

        // 5. Acknowledge
        Ok(Ack {
            correlation_id,
            target_oid: oid,
            operation,
            attributes,
        })
    }
}
