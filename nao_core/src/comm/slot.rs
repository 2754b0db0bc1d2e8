//! Typed storage cells and the accessors handed out at registration time.
//!
//! A [`TypedSlot`] holds the latest value for one blackboard key behind its own
//! reader/writer lock. Accessors never hand out references into the slot:
//! [`Getter::get`] copies the value out under a shared lock and
//! [`Setter::set`] overwrites it under an exclusive lock.

use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Runtime type identity of a blackboard key.
///
/// Equality is by [`TypeId`] only; the name is kept for diagnostics.
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

type ErasedValue = Box<dyn Any + Send + Sync>;

/// Storage cell for a single key.
pub struct TypedSlot {
    type_tag: TypeTag,
    value: RwLock<Option<ErasedValue>>,
}

impl TypedSlot {
    pub(crate) fn new(type_tag: TypeTag) -> Self {
        Self {
            type_tag,
            value: RwLock::new(None),
        }
    }

    pub fn type_tag(&self) -> TypeTag {
        self.type_tag
    }

    /// Whether a value has been written yet.
    pub fn is_set(&self) -> bool {
        self.value.read().is_some()
    }

    fn read<T: Clone + 'static>(&self) -> Option<T> {
        self.value
            .read()
            .as_ref()
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    fn write<T: Send + Sync + 'static>(&self, value: T) {
        let mut guard = self.value.write();
        match guard.as_mut().and_then(|current| current.downcast_mut::<T>()) {
            Some(current) => *current = value,
            None => *guard = Some(Box::new(value)),
        }
    }
}

impl fmt::Debug for TypedSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedSlot")
            .field("type", &self.type_tag)
            .field("set", &self.is_set())
            .finish()
    }
}

/// Read accessor returned by a require registration.
///
/// Holds a handle to the slot itself, so it stays valid however the owning
/// blackboard is moved or shared.
pub struct Getter<T> {
    slot: Arc<TypedSlot>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Clone + Send + Sync + 'static> Getter<T> {
    pub(crate) fn new(slot: Arc<TypedSlot>) -> Self {
        debug_assert!(slot.type_tag().is::<T>());
        Self {
            slot,
            _marker: PhantomData,
        }
    }

    /// Copy of the current value, or `None` if nothing has been written yet.
    ///
    /// A key that is globally provided always yields `Some`.
    pub fn get(&self) -> Option<T> {
        self.slot.read()
    }

    /// Copy of the current value, falling back to `default` while unset.
    pub fn get_or(&self, default: T) -> T {
        self.get().unwrap_or(default)
    }
}

impl<T> Clone for Getter<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Getter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Getter").field(&self.slot).finish()
    }
}

/// Write accessor returned by a provide registration.
pub struct Setter<T> {
    slot: Arc<TypedSlot>,
    _marker: PhantomData<fn(T)>,
}

impl<T: Clone + Send + Sync + 'static> Setter<T> {
    pub(crate) fn new(slot: Arc<TypedSlot>) -> Self {
        debug_assert!(slot.type_tag().is::<T>());
        Self {
            slot,
            _marker: PhantomData,
        }
    }

    /// Overwrite the slot with `value`.
    pub fn set(&self, value: T) {
        self.slot.write(value);
    }
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Setter").field(&self.slot).finish()
    }
}
