//! Capability-restricted views over a [`Blackboard`].
//!
//! A module receives a [`LocalAdapter`] for the blackboard of the context it
//! will run in, and an [`ExternalAdapterMap`] giving [`ExternalAdapter`]s for
//! every other context. The external view only allows global requires, so a
//! module can never create local state or claim a unique global provider on a
//! board it does not own.

use super::blackboard::Blackboard;
use super::slot::{Getter, Setter};
use crate::error::RegistrationError;
use std::collections::HashMap;
use std::sync::Arc;

/// In-context view: requires, local provides and global provides.
#[derive(Debug, Clone)]
pub struct LocalAdapter {
    board: Arc<Blackboard>,
}

impl LocalAdapter {
    pub fn new(board: Arc<Blackboard>) -> Self {
        Self { board }
    }

    /// Name of the context this adapter writes into.
    pub fn context(&self) -> &str {
        self.board.name()
    }

    /// See [`Blackboard::register_require`].
    pub fn register_require<T>(&self, key: &str) -> Result<Getter<T>, RegistrationError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.board.register_require(key)
    }

    /// See [`Blackboard::register_provide`].
    pub fn register_provide<T>(&self, key: &str) -> Result<Setter<T>, RegistrationError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.board.register_provide(key)
    }

    /// See [`Blackboard::register_global_provide`].
    pub fn register_global_provide<T>(
        &self,
        key: &str,
        initial: T,
    ) -> Result<Setter<T>, RegistrationError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.board.register_global_provide(key, initial)
    }
}

/// Cross-context view: global requires only.
#[derive(Debug, Clone)]
pub struct ExternalAdapter {
    board: Arc<Blackboard>,
}

impl ExternalAdapter {
    pub fn new(board: Arc<Blackboard>) -> Self {
        Self { board }
    }

    /// Name of the context this adapter reads from.
    pub fn context(&self) -> &str {
        self.board.name()
    }

    /// See [`Blackboard::register_global_require`].
    pub fn register_global_require<T>(&self, key: &str) -> Result<Getter<T>, RegistrationError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.board.register_global_require(key)
    }
}

/// Lookup-or-create access to the external adapters of other contexts.
///
/// Implementations decide what "create" means; the supervisor creates a new,
/// empty context when a module references one that does not exist yet.
pub trait ExternalAdapterMap {
    /// External adapter for the context called `context`.
    fn adapter(&mut self, context: &str) -> ExternalAdapter;
}

/// Stand-alone [`ExternalAdapterMap`] owning its blackboards.
///
/// Used where no supervisor is involved, e.g. when wiring modules by hand.
#[derive(Debug, Default)]
pub struct BlackboardMap {
    boards: HashMap<String, Arc<Blackboard>>,
}

impl BlackboardMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blackboard named `name`, created empty on first use.
    pub fn board(&mut self, name: &str) -> Arc<Blackboard> {
        Arc::clone(
            self.boards
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Blackboard::new(name))),
        )
    }

    /// Local adapter for the blackboard named `name`.
    pub fn local(&mut self, name: &str) -> LocalAdapter {
        LocalAdapter::new(self.board(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.boards.contains_key(name)
    }
}

impl ExternalAdapterMap for BlackboardMap {
    fn adapter(&mut self, context: &str) -> ExternalAdapter {
        ExternalAdapter::new(self.board(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::RegistrationState;

    #[test]
    fn test_local_adapter_forwards() {
        let board = Arc::new(Blackboard::new("W1"));
        let local = LocalAdapter::new(Arc::clone(&board));
        assert_eq!(local.context(), "W1");

        local.register_provide::<i32>("count").unwrap();
        local.register_require::<i32>("count").unwrap();
        assert!(local.register_require::<String>("count").is_err());
        local.register_global_provide::<f64>("temp", 1.5).unwrap();

        assert_eq!(board.state_of("count"), Some(RegistrationState::Provided));
        assert_eq!(
            board.state_of("temp"),
            Some(RegistrationState::GlobalProvided)
        );
    }

    #[test]
    fn test_external_adapter_reads_global_value() {
        let mut map = BlackboardMap::new();
        map.local("W1")
            .register_global_provide::<f64>("temp", 36.6)
            .unwrap();

        let temp = map
            .adapter("W1")
            .register_global_require::<f64>("temp")
            .unwrap();
        assert_eq!(temp.get(), Some(36.6));
    }

    #[test]
    fn test_external_adapter_rejects_local_provide() {
        let mut map = BlackboardMap::new();
        map.local("W1").register_provide::<i32>("count").unwrap();

        let err = map
            .adapter("W1")
            .register_global_require::<i32>("count")
            .unwrap_err();
        assert!(matches!(err, RegistrationError::LocallyProvided { .. }));
    }

    #[test]
    fn test_map_creates_unknown_context() {
        let mut map = BlackboardMap::new();
        assert!(!map.contains("W2"));

        let adapter = map.adapter("W2");
        assert_eq!(adapter.context(), "W2");
        assert!(map.contains("W2"));
        assert!(Arc::ptr_eq(&map.board("W2"), &map.board("W2")));
    }
}
