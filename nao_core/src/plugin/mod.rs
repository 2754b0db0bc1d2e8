//! # NAO Plugin System
//!
//! Loads modules out of separately compiled units (`cdylib` crates) at
//! runtime.
//!
//! ## Key Types
//!
//! - [`PluginLoader`]: opens a unit, checks its ABI, constructs its module
//! - [`PluginHandle`]: owning handle to a loaded module; a [`Module`](crate::Module) itself
//! - [`CompiledUnit`] / [`UnitOpener`]: the seam between the loader and the
//!   platform's dynamic-library facility
//!
//! ## Creating a Plugin
//!
//! Implement [`DynamicModule`](crate::DynamicModule) and export it:
//!
//! ```rust,ignore
//! nao_core::export_module!(MyModule);
//! ```
//!
//! with `crate-type = ["cdylib"]` in the plugin's `Cargo.toml`.
//!
//! ## Safety
//!
//! Calling into a foreign unit cannot be checked by the compiler. This module
//! is the only place in the crate that does so; everything outside it works
//! with the safe [`PluginHandle`].

pub mod abi;
pub mod loader;
pub mod unit;

pub use abi::{ModuleInstance, MODULE_ABI_VERSION};
pub use loader::{PluginHandle, PluginLoader, DYNAMIC_NAME_PREFIX};
pub use unit::{CompiledUnit, LibraryOpener, SharedLibrary, UnitOpener};
