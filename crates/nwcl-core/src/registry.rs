//! Handle → wrapper identity registry.
//!
//! The registry guarantees that at most one live [`Wrapper`] exists for each
//! native handle. Entries hold weak references, so the registry never keeps a
//! wrapper alive; when the last clone of a wrapper is dropped (the host
//! finalized it) its entry is removed.
//!
//! Both the registry and its wrappers are `!Send`: they live on the control
//! thread, which is the only thread allowed to mutate them.
//!
//! # Example
//!
//! ```
//! use nwcl_core::{HandleRegistry, PlatformId, PlatformKind};
//!
//! let registry = HandleRegistry::<PlatformKind>::new();
//! let a = registry.get_or_create(PlatformId::from_raw(0x1));
//! let b = registry.get_or_create(PlatformId::from_raw(0x1));
//! assert_eq!(a, b);
//! assert_eq!(registry.len(), 1);
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::ptr;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::handle::{NativeHandle, ResourceKind};

struct RegistryInner<K: ResourceKind> {
    entries: RefCell<HashMap<K::Handle, Weak<Slot<K>>>>,
    next_serial: Cell<u64>,
}

impl<K: ResourceKind> RegistryInner<K> {
    /// Erase the entry for `handle`. An absent entry is a redundant release:
    /// logged and tolerated.
    fn remove(&self, handle: K::Handle) -> bool {
        if self.entries.borrow_mut().remove(&handle).is_some() {
            debug!(class = K::CLASS_NAME, ?handle, "Released wrapper");
            true
        } else {
            warn!(class = K::CLASS_NAME, ?handle, "Redundant release of wrapper");
            false
        }
    }

    /// Drop-path removal: only erase the entry if it still points at `slot`.
    fn release(&self, handle: K::Handle, slot: *const Slot<K>) {
        let superseded = self
            .entries
            .borrow()
            .get(&handle)
            .is_some_and(|entry| !ptr::eq(entry.as_ptr(), slot));

        if superseded {
            debug!(class = K::CLASS_NAME, ?handle, "Entry already owned by a newer wrapper");
        } else {
            self.remove(handle);
        }
    }
}

/// Registry of live wrappers for one resource kind.
///
/// Cloning is cheap and yields another reference to the same registry.
pub struct HandleRegistry<K: ResourceKind> {
    inner: Rc<RegistryInner<K>>,
}

impl<K: ResourceKind> HandleRegistry<K> {
    pub fn new() -> Self {
        HandleRegistry {
            inner: Rc::new(RegistryInner {
                entries: RefCell::new(HashMap::new()),
                next_serial: Cell::new(1),
            }),
        }
    }

    /// Return the live wrapper for `handle`, creating and registering one if
    /// none exists.
    ///
    /// This is the only way a [`Wrapper`] comes into existence.
    pub fn get_or_create(&self, handle: K::Handle) -> Wrapper<K> {
        if let Some(existing) = self.get(handle) {
            return existing;
        }

        let serial = self.inner.next_serial.get();
        self.inner.next_serial.set(serial + 1);

        let slot = Rc::new(Slot {
            handle,
            serial,
            registry: Rc::downgrade(&self.inner),
        });
        self.inner
            .entries
            .borrow_mut()
            .insert(handle, Rc::downgrade(&slot));

        debug!(class = K::CLASS_NAME, ?handle, serial, "Created wrapper");
        Wrapper { slot }
    }

    /// Live wrapper for `handle`, if any.
    pub fn get(&self, handle: K::Handle) -> Option<Wrapper<K>> {
        let slot = self.inner.entries.borrow().get(&handle)?.upgrade()?;
        Some(Wrapper { slot })
    }

    pub fn contains(&self, handle: K::Handle) -> bool {
        self.inner.entries.borrow().contains_key(&handle)
    }

    /// Number of registered handles.
    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered handles, in no particular order.
    pub fn handles(&self) -> Vec<K::Handle> {
        self.inner.entries.borrow().keys().copied().collect()
    }
}

impl<K: ResourceKind> Default for HandleRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ResourceKind> Clone for HandleRegistry<K> {
    fn clone(&self) -> Self {
        HandleRegistry {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<K: ResourceKind> fmt::Debug for HandleRegistry<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("class", &K::CLASS_NAME)
            .field("len", &self.len())
            .finish()
    }
}

struct Slot<K: ResourceKind> {
    handle: K::Handle,
    serial: u64,
    registry: Weak<RegistryInner<K>>,
}

impl<K: ResourceKind> Drop for Slot<K> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.release(self.handle, self as *const Slot<K>);
        }
    }
}

/// Host-visible object owning one native handle.
///
/// Clones share identity; equality is object identity, not handle equality.
/// There is no public constructor: wrappers only come from
/// [`HandleRegistry::get_or_create`].
pub struct Wrapper<K: ResourceKind> {
    slot: Rc<Slot<K>>,
}

impl<K: ResourceKind> Wrapper<K> {
    /// The owned native handle.
    pub fn handle(&self) -> K::Handle {
        self.slot.handle
    }

    /// Creation number, unique within the owning registry.
    pub fn serial(&self) -> u64 {
        self.slot.serial
    }

    /// Host class name of this wrapper.
    pub fn class_name(&self) -> &'static str {
        K::CLASS_NAME
    }

    /// Object identity.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.slot, &b.slot)
    }
}

impl<K: ResourceKind> Clone for Wrapper<K> {
    fn clone(&self) -> Self {
        Wrapper {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<K: ResourceKind> PartialEq for Wrapper<K> {
    fn eq(&self, other: &Self) -> bool {
        Wrapper::ptr_eq(self, other)
    }
}

impl<K: ResourceKind> Eq for Wrapper<K> {}

impl<K: ResourceKind> fmt::Debug for Wrapper<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({:#x} #{})",
            K::CLASS_NAME,
            self.slot.handle.as_raw(),
            self.slot.serial
        )
    }
}
