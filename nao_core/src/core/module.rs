use crate::comm::{ExternalAdapterMap, LocalAdapter};
use crate::error::NaoResult;

/// A unit of periodic behaviour driven by a [`Wave`](crate::scheduling::Wave).
///
/// Modules wire themselves to blackboards while they are being constructed
/// (see [`DynamicModule`]) and keep the returned accessors; `step` then only
/// reads and writes through those accessors.
///
/// The wave calls `step` in a tight loop with no throttling, so a module that
/// needs a fixed rate paces itself.
///
/// # Example
///
/// ```rust
/// use nao_core::comm::{Getter, LocalAdapter, Setter};
/// use nao_core::Module;
///
/// struct Doubler {
///     input: Getter<i64>,
///     output: Setter<i64>,
/// }
///
/// impl Doubler {
///     fn new(local: &LocalAdapter) -> nao_core::NaoResult<Self> {
///         Ok(Self {
///             input: local.register_require("input")?,
///             output: local.register_provide("doubled")?,
///         })
///     }
/// }
///
/// impl Module for Doubler {
///     fn step(&mut self) {
///         if let Some(value) = self.input.get() {
///             self.output.set(value * 2);
///         }
///     }
/// }
/// ```
pub trait Module: Send {
    /// The module's name (must be unique within a wave).
    ///
    /// Defaults to the struct's type name (e.g. `Doubler`).
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        // generic arguments carry paths of their own
        let path = full.split('<').next().unwrap_or(full);
        match path.rfind("::") {
            Some(pos) => &path[pos + 2..],
            None => path,
        }
    }

    /// One pass of the module's behaviour.
    fn step(&mut self);
}

impl<M: Module + ?Sized> Module for Box<M> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn step(&mut self) {
        (**self).step()
    }
}

/// Construction contract for modules shipped as plugins.
///
/// [`export_module!`](crate::export_module) turns an implementor into the
/// entry points the [`PluginLoader`](crate::plugin::PluginLoader) resolves.
/// Returning an error rejects the module; the loader then unloads the unit.
///
/// Adapters are only valid for the duration of the call. Keep the accessors
/// they return, not the adapters.
pub trait DynamicModule: Module + Sized + 'static {
    fn construct(local: &LocalAdapter, external: &mut dyn ExternalAdapterMap) -> NaoResult<Self>;
}
