//! # Module ABI
//!
//! The entry points a compiled module unit exports, and the helpers that
//! [`export_module!`](crate::export_module) expands to.
//!
//! ## Symbols
//!
//! | symbol | signature |
//! |---|---|
//! | `nao_module_abi_version` | `() -> u32` |
//! | `nao_module_construct` | `(&LocalAdapter, &mut dyn ExternalAdapterMap) -> *mut ModuleInstance` |
//! | `nao_module_destroy` | `(*mut *mut ModuleInstance)` |
//!
//! `nao_module_construct` returns null when the module rejects construction.
//! `nao_module_destroy` drops the instance and nulls the pointer. The host
//! never frees an instance itself.
//!
//! ## Versioning
//!
//! Version format: (major << 24) | (minor << 16) | patch. A unit is accepted
//! when its major version equals the host's.
//!
//! Adapters and `ModuleInstance` are Rust types passed by reference, so the
//! unit and the host must be built with the same compiler and the same
//! `nao_core`. The version check catches mismatched `nao_core` releases, not
//! mismatched compilers.

use crate::comm::{ExternalAdapterMap, LocalAdapter};
use crate::core::{DynamicModule, Module};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

/// Current module ABI version (1.0.0).
pub const MODULE_ABI_VERSION: u32 = 0x01_00_0000;

/// Symbol name for the ABI version function.
pub const SYMBOL_ABI_VERSION: &str = "nao_module_abi_version";

/// Symbol name for the construction function.
pub const SYMBOL_CONSTRUCT: &str = "nao_module_construct";

/// Symbol name for the destruction function.
pub const SYMBOL_DESTROY: &str = "nao_module_destroy";

/// The owned module a unit hands across the boundary.
pub type ModuleInstance = Box<dyn Module>;

/// `nao_module_abi_version() -> u32`
pub type AbiVersionFn = unsafe extern "C" fn() -> u32;

/// `nao_module_construct(local, external) -> *mut ModuleInstance`
#[allow(improper_ctypes_definitions)]
pub type ConstructFn = unsafe extern "C" fn(
    local: &LocalAdapter,
    external: &mut dyn ExternalAdapterMap,
) -> *mut ModuleInstance;

/// `nao_module_destroy(instance: *mut *mut ModuleInstance)`
pub type DestroyFn = unsafe extern "C" fn(instance: *mut *mut ModuleInstance);

#[inline]
pub const fn version_major(v: u32) -> u32 {
    (v >> 24) & 0xFF
}

#[inline]
pub const fn version_minor(v: u32) -> u32 {
    (v >> 16) & 0xFF
}

#[inline]
pub const fn version_patch(v: u32) -> u32 {
    v & 0xFFFF
}

/// Versions are compatible if they have the same major version.
#[inline]
pub const fn versions_compatible(host: u32, unit: u32) -> bool {
    version_major(host) == version_major(unit)
}

pub fn format_version(v: u32) -> String {
    format!("{}.{}.{}", version_major(v), version_minor(v), version_patch(v))
}

/// Build `M` and leak it as a raw [`ModuleInstance`] pointer.
///
/// Returns null if `M::construct` fails or panics. A panic must not unwind
/// through the `extern "C"` frame.
pub fn construct_instance<M: DynamicModule>(
    local: &LocalAdapter,
    external: &mut dyn ExternalAdapterMap,
) -> *mut ModuleInstance {
    let type_name = std::any::type_name::<M>();
    match panic::catch_unwind(AssertUnwindSafe(|| M::construct(local, external))) {
        Ok(Ok(module)) => {
            log::debug!(
                "[{}] constructed module {}",
                local.context(),
                module.name()
            );
            let instance: ModuleInstance = Box::new(module);
            Box::into_raw(Box::new(instance))
        }
        Ok(Err(e)) => {
            log::error!(
                "[{}] {} rejected construction: {}",
                local.context(),
                type_name,
                e
            );
            ptr::null_mut()
        }
        Err(_) => {
            log::error!(
                "[{}] {} panicked during construction",
                local.context(),
                type_name
            );
            ptr::null_mut()
        }
    }
}

/// Drop the instance behind `*instance` and null the pointer.
///
/// # Safety
///
/// `instance` must be null or point to a pointer that is null or was
/// returned by [`construct_instance`] in the same unit and not yet destroyed.
pub unsafe fn destroy_instance(instance: *mut *mut ModuleInstance) {
    if instance.is_null() {
        return;
    }
    let module = ptr::replace(instance, ptr::null_mut());
    if !module.is_null() {
        drop(Box::from_raw(module));
    }
}

/// Export `$module` (a [`DynamicModule`](crate::DynamicModule)) as a
/// loadable unit.
///
/// Use once per `cdylib` crate:
///
/// ```rust,ignore
/// use nao_core::{export_module, DynamicModule, Module, NaoResult};
/// use nao_core::comm::{ExternalAdapterMap, LocalAdapter, Setter};
///
/// pub struct Clock {
///     now: Setter<u64>,
/// }
///
/// impl Module for Clock {
///     fn step(&mut self) { /* ... */ }
/// }
///
/// impl DynamicModule for Clock {
///     fn construct(local: &LocalAdapter, _: &mut dyn ExternalAdapterMap) -> NaoResult<Self> {
///         Ok(Self { now: local.register_global_provide("clock.now", 0u64)? })
///     }
/// }
///
/// export_module!(Clock);
/// ```
#[macro_export]
macro_rules! export_module {
    ($module:ty) => {
        #[no_mangle]
        pub extern "C" fn nao_module_abi_version() -> u32 {
            $crate::plugin::abi::MODULE_ABI_VERSION
        }

        #[no_mangle]
        #[allow(improper_ctypes_definitions)]
        pub extern "C" fn nao_module_construct(
            local: &$crate::comm::LocalAdapter,
            external: &mut dyn $crate::comm::ExternalAdapterMap,
        ) -> *mut $crate::plugin::abi::ModuleInstance {
            $crate::plugin::abi::construct_instance::<$module>(local, external)
        }

        /// # Safety
        ///
        /// `instance` must come from `nao_module_construct` of this unit.
        #[no_mangle]
        pub unsafe extern "C" fn nao_module_destroy(
            instance: *mut *mut $crate::plugin::abi::ModuleInstance,
        ) {
            $crate::plugin::abi::destroy_instance(instance)
        }
    };
}
