//! Unified error handling for NAO
//!
//! This module provides the error taxonomy shared by every component:
//!
//! - [`RegistrationError`]: raised synchronously while modules declare their
//!   data dependencies on a [`Blackboard`](crate::comm::Blackboard)
//! - [`LoadError`]: raised by the [`PluginLoader`](crate::plugin::PluginLoader)
//! - [`NaoError`]: the umbrella type returned by the supervisor and the CLI

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported while registering a require/provide on a blackboard key.
///
/// All of these are returned at setup time and are non-fatal: the module
/// constructor decides whether to abort its own construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// The key is already bound to a different type.
    #[error("key '{key}' holds {expected}, not {found}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The key has a pending require that only a global provide can satisfy.
    #[error("key '{key}' is requested and can only be satisfied by a global provide")]
    Requested { key: String },

    /// The key is provided locally, so no cross-context guarantee is possible.
    #[error("key '{key}' is provided locally")]
    LocallyProvided { key: String },

    /// The key already has its unique global provider.
    #[error("key '{key}' is already globally provided")]
    GloballyProvided { key: String },
}

impl RegistrationError {
    /// The key the failed registration referred to.
    pub fn key(&self) -> &str {
        match self {
            Self::WrongType { key, .. }
            | Self::Requested { key }
            | Self::LocallyProvided { key }
            | Self::GloballyProvided { key } => key,
        }
    }
}

/// Errors reported by the plugin loader.
///
/// Whenever one of these is returned the loader has already unloaded the
/// compiled unit, so no library handle outlives the failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The compiled unit could not be opened.
    #[error("failed to open module {path:?}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    /// A mandatory entry point is not exported by the unit.
    #[error("module {path:?} does not export '{symbol}': {reason}")]
    SymbolMissing {
        path: PathBuf,
        symbol: &'static str,
        reason: String,
    },

    /// The unit was built against an incompatible module ABI.
    #[error("module {path:?} targets ABI {found}, host speaks {expected}")]
    AbiMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    /// The unit's construction entry point rejected the module.
    #[error("module {path:?} failed to construct")]
    ConstructionFailed { path: PathBuf },
}

/// Main error type for NAO operations
#[derive(Debug, Error)]
pub enum NaoError {
    /// Blackboard registration errors
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// Plugin loading errors
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// I/O related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parsing or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/Deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Resource not found errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Already exists errors (for creation operations)
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// A context still has requires that no global provider satisfies
    #[error("Dependencies for context '{context}' are not met: {}", keys.join(", "))]
    UnmetDependencies { context: String, keys: Vec<String> },

    /// Scheduling errors
    #[error("Scheduling error: {0}")]
    Scheduling(String),
}

/// Convenience type alias for Results using NaoError
pub type NaoResult<T> = std::result::Result<T, NaoError>;

impl From<serde_yaml::Error> for NaoError {
    fn from(err: serde_yaml::Error) -> Self {
        NaoError::Serialization(format!("YAML error: {}", err))
    }
}

// Helper methods
impl NaoError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(msg: S) -> Self {
        NaoError::Config(msg.into())
    }

    /// Create a not-found error
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        NaoError::NotFound(what.into())
    }

    /// Create an already-exists error
    pub fn already_exists<S: Into<String>>(what: S) -> Self {
        NaoError::AlreadyExists(what.into())
    }

    /// Create a scheduling error
    pub fn scheduling<S: Into<String>>(msg: S) -> Self {
        NaoError::Scheduling(msg.into())
    }

    /// Process exit code for this error, as reported by the `nao` CLI.
    ///
    /// Zero is reserved for success.
    pub fn exit_code(&self) -> u8 {
        match self {
            NaoError::Registration(_) => 2,
            NaoError::Load(_) => 3,
            NaoError::UnmetDependencies { .. } => 4,
            NaoError::NotFound(_) => 5,
            NaoError::AlreadyExists(_) => 6,
            NaoError::Config(_) | NaoError::Serialization(_) => 7,
            NaoError::Io(_) | NaoError::Scheduling(_) => 1,
        }
    }
}
