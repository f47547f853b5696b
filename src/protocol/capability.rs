//! Capability table: which operations each object type accepts, and with what
//! parameter type.
//!
//! Entries are registered with a strongly typed setter `fn(&T, V)`. The parameter's
//! [`AttrType`] comes from `V` at registration, so dispatch reduces to a table lookup
//! plus one tag comparison.

use crate::core::value::{AttrType, AttrValue, FromAttrValue};
use crate::error::{constants, ProtocolError, Result};
use crate::object::Inspectable;
use std::any::type_name;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

type InvokeFn = dyn Fn(&dyn Inspectable, AttrValue) -> std::result::Result<(), InvokeError>
    + Send
    + Sync
    + 'static;

/// Why an invocation did not mutate its target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeError {
    /// The object's concrete type is not the one the entry was registered for
    WrongTarget(&'static str),
    /// The value does not carry the entry's parameter type
    WrongValue,
    /// The target was destroyed before the invocation ran
    Stale,
    /// The setter refused the value
    Rejected(String),
}

/// One typed mutation entry point
pub struct Capability {
    param: AttrType,
    invoke: Box<InvokeFn>,
}

impl Capability {
    pub fn param_type(&self) -> AttrType {
        self.param
    }

    pub fn invoke(
        &self,
        target: &dyn Inspectable,
        value: AttrValue,
    ) -> std::result::Result<(), InvokeError> {
        (self.invoke)(target, value)
    }
}

type OperationMap = HashMap<Cow<'static, str>, Arc<Capability>>;

/// Mapping from (type name, operation name) to capability
#[derive(Clone, Default)]
pub struct CapabilityTable {
    entries: Arc<RwLock<HashMap<Cow<'static, str>, OperationMap>>>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `setter` as `operation` on objects whose class chain contains `class`.
    ///
    /// Re-registering the same pair replaces the previous entry.
    pub fn register<T, V, F>(
        &self,
        class: impl Into<Cow<'static, str>>,
        operation: impl Into<Cow<'static, str>>,
        setter: F,
    ) -> Result<()>
    where
        T: Inspectable,
        V: FromAttrValue + 'static,
        F: Fn(&T, V) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        let class = class.into();
        let operation = operation.into();
        let invoke = move |target: &dyn Inspectable, value: AttrValue| {
            let target = target
                .as_any()
                .downcast_ref::<T>()
                .ok_or(InvokeError::WrongTarget(type_name::<T>()))?;
            let value = V::from_attr_value(value).ok_or(InvokeError::WrongValue)?;
            setter(target, value).map_err(InvokeError::Rejected)
        };

        let mut entries = self.entries.write().map_err(|_| {
            ProtocolError::Custom(constants::ERR_CAPABILITY_WRITE_LOCK.to_string())
        })?;

        debug!(%class, %operation, param = ?V::ATTR_TYPE, "Registered capability");
        entries.entry(class).or_default().insert(
            operation,
            Arc::new(Capability {
                param: V::ATTR_TYPE,
                invoke: Box::new(invoke),
            }),
        );
        Ok(())
    }

    /// Find `operation` along `class_chain`, most derived type first
    pub fn lookup(&self, class_chain: &[&str], operation: &str) -> Option<Arc<Capability>> {
        // Entries are only ever inserted whole, so a poisoned table is still consistent
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        class_chain
            .iter()
            .filter_map(|class| entries.get(*class))
            .find_map(|operations| operations.get(operation))
            .cloned()
    }

    /// Number of registered (type, operation) pairs
    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Label {
        text: Mutex<String>,
    }

    impl Inspectable for Label {
        fn class_chain(&self) -> &'static [&'static str] {
            &["Label", "View"]
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Other;

    impl Inspectable for Other {
        fn class_chain(&self) -> &'static [&'static str] {
            &["Label"]
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[allow(clippy::unwrap_used)]
    fn table() -> CapabilityTable {
        let table = CapabilityTable::new();
        table
            .register("Label", "setText", |label: &Label, text: String| {
                if text.len() > 8 {
                    return Err("text too long".into());
                }
                *label.text.lock().unwrap() = text;
                Ok(())
            })
            .unwrap();
        table
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_typed_invoke() {
        let table = table();
        let capability = table.lookup(&["Label"], "setText").unwrap();
        assert_eq!(capability.param_type(), AttrType::String);

        let label = Label::default();
        capability
            .invoke(&label, AttrValue::String("hello".into()))
            .unwrap();
        assert_eq!(*label.text.lock().unwrap(), "hello");

        assert_eq!(
            capability.invoke(&label, AttrValue::String("far too long".into())),
            Err(InvokeError::Rejected("text too long".into()))
        );
        assert_eq!(*label.text.lock().unwrap(), "hello");
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_guards_inside_invoke() {
        let table = table();
        let capability = table.lookup(&["Label"], "setText").unwrap();
        assert_eq!(
            capability.invoke(&Label::default(), AttrValue::Bool(true)),
            Err(InvokeError::WrongValue)
        );
        assert!(matches!(
            capability.invoke(&Other, AttrValue::String("x".into())),
            Err(InvokeError::WrongTarget(_))
        ));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_lookup_walks_class_chain() {
        let table = CapabilityTable::new();
        table
            .register("View", "setHidden", |_: &Label, _: bool| Ok(()))
            .unwrap();
        assert!(table.lookup(&["Label", "View"], "setHidden").is_some());
        assert!(table.lookup(&["Label"], "setHidden").is_none());
        assert!(table.lookup(&["Label", "View"], "setAlpha").is_none());
        assert_eq!(table.len(), 1);
    }
}
