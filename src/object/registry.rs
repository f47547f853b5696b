//! Object Registry
//!
//! Maps OIDs to live objects without owning them.
//!
//! Entries live in a generational arena: an OID is `(generation << 32) | slot`. When an
//! entry is released its slot generation is bumped before the slot is reused, so an old
//! OID can never resolve to the slot's next occupant. Slot numbers start at 1, which
//! keeps OID 0 unassigned and makes a fresh registry hand out 1, 2, 3, ...
//!
//! Resolution upgrades a `Weak` reference. The upgrade is atomic with respect to the
//! object's destruction, so a resolve racing a drop returns either the live object or
//! nothing.

use super::{Inspectable, Oid};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tracing::{debug, instrument, trace};

struct Entry {
    object: Weak<dyn Inspectable>,
    address: usize,
}

struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

#[derive(Default)]
struct RegistryInner {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_address: HashMap<usize, Oid>,
}

impl RegistryInner {
    fn slot(&self, oid: Oid) -> Option<&Slot> {
        let index = oid.slot().checked_sub(1)? as usize;
        self.slots
            .get(index)
            .filter(|slot| slot.generation == oid.generation())
    }

    fn allocate(&mut self, entry: Entry) -> Oid {
        let address = entry.address;
        let oid = match self.free.pop() {
            Some(slot_no) => {
                let slot = &mut self.slots[(slot_no - 1) as usize];
                slot.entry = Some(entry);
                Oid::from_parts(slot.generation, slot_no)
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                Oid::from_parts(0, self.slots.len() as u32)
            }
        };
        self.by_address.insert(address, oid);
        oid
    }

    /// Invalidate the entry behind `oid`. Returns false if it was not current.
    fn release(&mut self, oid: Oid) -> bool {
        let Some(index) = oid.slot().checked_sub(1) else {
            return false;
        };
        let Some(slot) = self.slots.get_mut(index as usize) else {
            return false;
        };
        if slot.generation != oid.generation() {
            return false;
        }
        let Some(entry) = slot.entry.take() else {
            return false;
        };
        if self.by_address.get(&entry.address) == Some(&oid) {
            self.by_address.remove(&entry.address);
        }
        // A slot whose generation would wrap is retired instead of reused
        if let Some(next) = slot.generation.checked_add(1) {
            slot.generation = next;
            self.free.push(oid.slot());
        }
        true
    }
}

/// Registry of remotely addressable objects
pub struct ObjectRegistry {
    inner: RwLock<RegistryInner>,
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    // Every mutation of the inner state completes without panicking, so a poisoned
    // lock still guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `object` addressable and return its OID.
    ///
    /// Registering the same live instance again returns the same OID.
    #[instrument(level = "trace", skip_all)]
    pub fn register(&self, object: &Arc<dyn Inspectable>) -> Oid {
        let address = Arc::as_ptr(object) as *const () as usize;
        let weak = Arc::downgrade(object);
        let mut inner = self.write();

        if let Some(&existing) = inner.by_address.get(&address) {
            let same_object = inner
                .slot(existing)
                .and_then(|slot| slot.entry.as_ref())
                .map(|entry| entry.object.strong_count() > 0 && entry.object.ptr_eq(&weak))
                .unwrap_or(false);
            if same_object {
                return existing;
            }
            // The address belonged to an object that has since been destroyed
            inner.release(existing);
        }

        let oid = inner.allocate(Entry {
            object: weak,
            address,
        });
        trace!(%oid, class = object.class_name(), "Registered object");
        oid
    }

    /// Resolve `oid` to its live object, if any
    pub fn resolve(&self, oid: Oid) -> Option<Arc<dyn Inspectable>> {
        self.read()
            .slot(oid)
            .and_then(|slot| slot.entry.as_ref())
            .and_then(|entry| entry.object.upgrade())
    }

    /// Explicitly invalidate an OID, e.g. from an object's destructor
    pub fn unregister(&self, oid: Oid) -> bool {
        let removed = self.write().release(oid);
        if removed {
            debug!(%oid, "Unregistered object");
        }
        removed
    }

    /// Drop entries whose objects have been destroyed. Returns the number removed.
    pub fn prune(&self) -> usize {
        let mut inner = self.write();
        let dead: Vec<Oid> = inner
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let entry = slot.entry.as_ref()?;
                (entry.object.strong_count() == 0)
                    .then(|| Oid::from_parts(slot.generation, index as u32 + 1))
            })
            .collect();
        for oid in &dead {
            inner.release(*oid);
        }
        if !dead.is_empty() {
            debug!(count = dead.len(), "Pruned dead registry entries");
        }
        dead.len()
    }

    /// Invalidate every entry. Previously issued OIDs stop resolving.
    pub fn clear(&self) {
        let mut inner = self.write();
        let live: Vec<Oid> = inner
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.entry.is_some())
            .map(|(index, slot)| Oid::from_parts(slot.generation, index as u32 + 1))
            .collect();
        for oid in live {
            inner.release(oid);
        }
        debug!("Object registry cleared");
    }

    /// Number of entries, including ones whose object died but is not yet pruned
    pub fn len(&self) -> usize {
        self.read()
            .slots
            .iter()
            .filter(|slot| slot.entry.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
