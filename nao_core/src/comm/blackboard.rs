//! The per-context typed exchange point.
//!
//! A [`Blackboard`] lets modules declare what they consume (requires) and
//! what they produce (provides), checked against a runtime type identity per
//! key. Registration returns accessors bound to the key's [`TypedSlot`]; all
//! later traffic goes through those accessors and the slot's own lock.
//!
//! # Registration states
//!
//! | state            | set by                    | fixed by                  |
//! |------------------|---------------------------|---------------------------|
//! | `Requested`      | require on an unknown key | a global provide only     |
//! | `Provided`       | local provide             | never crosses contexts    |
//! | `GlobalProvided` | global provide            | unique, initialised value |
//!
//! Registration is a setup-phase activity: it is expected to complete before
//! any wave reading this blackboard is started.

use super::slot::{Getter, Setter, TypeTag, TypedSlot};
use crate::error::RegistrationError;
use parking_lot::Mutex;
use std::collections::hash_map::{Entry, HashMap};
use std::sync::Arc;

/// Registration state of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    /// Consumed but not yet provided; only a global provide can fix it.
    Requested,
    /// Provided by a module of the owning context.
    Provided,
    /// Provided once, with an initial value, for every context.
    GlobalProvided,
}

struct Registration {
    state: RegistrationState,
    slot: Arc<TypedSlot>,
}

impl Registration {
    fn new<T: 'static>(state: RegistrationState) -> Self {
        Self {
            state,
            slot: Arc::new(TypedSlot::new(TypeTag::of::<T>())),
        }
    }

    fn check_type<T: 'static>(&self, key: &str) -> Result<(), RegistrationError> {
        let tag = self.slot.type_tag();
        if tag.is::<T>() {
            Ok(())
        } else {
            Err(RegistrationError::WrongType {
                key: key.to_string(),
                expected: tag.name(),
                found: std::any::type_name::<T>(),
            })
        }
    }
}

/// Typed publish/subscribe store for one execution context.
pub struct Blackboard {
    name: String,
    entries: Mutex<HashMap<String, Registration>>,
}

impl Blackboard {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Current registration state of `key`, if it is known.
    pub fn state_of(&self, key: &str) -> Option<RegistrationState> {
        self.entries.lock().get(key).map(|entry| entry.state)
    }

    /// Register a consumer of `key`.
    ///
    /// An unknown key becomes `Requested`. A known key only has its type
    /// checked; its state is left alone.
    pub fn register_require<T>(&self, key: &str) -> Result<Getter<T>, RegistrationError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let slot = match self.entries.lock().entry(key.to_string()) {
            Entry::Occupied(occupied) => {
                let registration = occupied.get();
                registration.check_type::<T>(key)?;
                Arc::clone(&registration.slot)
            }
            Entry::Vacant(vacant) => {
                log::debug!("[{}] '{}' requested", self.name, key);
                let registration =
                    vacant.insert(Registration::new::<T>(RegistrationState::Requested));
                Arc::clone(&registration.slot)
            }
        };
        Ok(Getter::new(slot))
    }

    /// Register a local producer of `key`.
    ///
    /// Fails if the key is `Requested` (only a global provide may satisfy a
    /// pending require) or `GlobalProvided` (the global provider is unique).
    /// Providing again a key that is already `Provided` is allowed.
    pub fn register_provide<T>(&self, key: &str) -> Result<Setter<T>, RegistrationError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let slot = match self.entries.lock().entry(key.to_string()) {
            Entry::Occupied(occupied) => {
                let registration = occupied.get();
                match registration.state {
                    RegistrationState::Requested => {
                        return Err(RegistrationError::Requested {
                            key: key.to_string(),
                        })
                    }
                    RegistrationState::GlobalProvided => {
                        return Err(RegistrationError::GloballyProvided {
                            key: key.to_string(),
                        })
                    }
                    RegistrationState::Provided => registration.check_type::<T>(key)?,
                }
                log::debug!("[{}] '{}' provided again", self.name, key);
                Arc::clone(&registration.slot)
            }
            Entry::Vacant(vacant) => {
                log::debug!("[{}] '{}' provided", self.name, key);
                let registration =
                    vacant.insert(Registration::new::<T>(RegistrationState::Provided));
                Arc::clone(&registration.slot)
            }
        };
        Ok(Setter::new(slot))
    }

    /// Register a consumer of `key` from another context.
    ///
    /// A locally provided key is rejected: nothing guarantees it is written
    /// before a foreign wave reads it.
    pub fn register_global_require<T>(&self, key: &str) -> Result<Getter<T>, RegistrationError>
    where
        T: Clone + Send + Sync + 'static,
    {
        if self.state_of(key) == Some(RegistrationState::Provided) {
            return Err(RegistrationError::LocallyProvided {
                key: key.to_string(),
            });
        }
        self.register_require(key)
    }

    /// Register the unique global producer of `key` and write `initial`.
    ///
    /// The initial value is stored before this returns, so no require on the
    /// key, local or foreign, can ever observe it unset.
    pub fn register_global_provide<T>(
        &self,
        key: &str,
        initial: T,
    ) -> Result<Setter<T>, RegistrationError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut entries = self.entries.lock();
        let slot = match entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let registration = occupied.get_mut();
                match registration.state {
                    RegistrationState::Provided => {
                        return Err(RegistrationError::LocallyProvided {
                            key: key.to_string(),
                        })
                    }
                    RegistrationState::GlobalProvided => {
                        return Err(RegistrationError::GloballyProvided {
                            key: key.to_string(),
                        })
                    }
                    RegistrationState::Requested => registration.check_type::<T>(key)?,
                }
                registration.state = RegistrationState::GlobalProvided;
                Arc::clone(&registration.slot)
            }
            Entry::Vacant(vacant) => {
                let registration =
                    vacant.insert(Registration::new::<T>(RegistrationState::GlobalProvided));
                Arc::clone(&registration.slot)
            }
        };
        let setter = Setter::new(slot);
        setter.set(initial);
        drop(entries);

        log::debug!("[{}] '{}' globally provided", self.name, key);
        Ok(setter)
    }

    /// True iff no key is left in the `Requested` state.
    ///
    /// A static check: call it once every registration for the topology is
    /// done.
    pub fn validate_globals(&self) -> bool {
        self.entries
            .lock()
            .values()
            .all(|entry| entry.state != RegistrationState::Requested)
    }

    /// Keys still waiting on a global provider, sorted.
    pub fn unresolved_requests(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, entry)| entry.state == RegistrationState::Requested)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

impl std::fmt::Debug for Blackboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blackboard")
            .field("name", &self.name)
            .field("keys", &self.len())
            .finish()
    }
}
