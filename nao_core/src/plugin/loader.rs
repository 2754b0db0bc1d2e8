//! Plugin loader for NAO modules
//!
//! [`PluginLoader::load`] opens a compiled unit, checks its ABI version,
//! resolves the construct/destroy entry points and constructs the module
//! against the adapters it is given. The result is a [`PluginHandle`], which
//! is itself a [`Module`] and can be handed to a wave.
//!
//! ```rust,ignore
//! let mut loader = PluginLoader::new();
//! loader.add_search_path("~/.nao/modules");
//!
//! let handle = loader.load("libnao_writer.so", &local, &mut contexts)?;
//! wave.add_module(Box::new(handle))?;
//! ```

use super::abi::{
    format_version, versions_compatible, DestroyFn, ModuleInstance, MODULE_ABI_VERSION,
    SYMBOL_ABI_VERSION, SYMBOL_CONSTRUCT, SYMBOL_DESTROY,
};
use super::unit::{CompiledUnit, LibraryOpener, UnitOpener};
use crate::comm::{ExternalAdapterMap, LocalAdapter};
use crate::core::Module;
use crate::error::LoadError;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Prefix of every dynamically loaded module's display name.
pub const DYNAMIC_NAME_PREFIX: &str = "Dynamic";

/// Units whose modules are destroyed but whose code may still be referenced.
///
/// A value a module wrote into a blackboard was boxed by the module's own
/// unit, so its drop code lives there. Units are parked here until the loader
/// and every handle it produced are gone, then unloaded newest first.
#[derive(Default)]
struct RetainedUnits {
    units: Mutex<Vec<(PathBuf, Box<dyn CompiledUnit>)>>,
}

impl RetainedUnits {
    fn keep(&self, path: &Path, unit: Box<dyn CompiledUnit>) {
        self.units.lock().push((path.to_path_buf(), unit));
    }

    fn len(&self) -> usize {
        self.units.lock().len()
    }
}

impl Drop for RetainedUnits {
    fn drop(&mut self) {
        let units = std::mem::take(self.units.get_mut());
        for (path, unit) in units.into_iter().rev() {
            drop(unit);
            log::debug!("module unit {:?} unloaded", path);
        }
    }
}

/// Loads modules out of compiled units.
///
/// Any failure unloads the unit before the error is returned, so a caller
/// never holds half of a plugin.
///
/// Units of successfully loaded modules stay mapped until the loader and all
/// of its handles are dropped. Drop the loader only after every blackboard
/// its modules registered against.
pub struct PluginLoader {
    /// Directories consulted for bare file names
    search_paths: Vec<PathBuf>,

    opener: Box<dyn UnitOpener>,
    retained: Arc<RetainedUnits>,
}

impl PluginLoader {
    /// Loader backed by the platform's shared-library facility.
    pub fn new() -> Self {
        Self::with_opener(LibraryOpener)
    }

    /// Loader that opens units through `opener`.
    pub fn with_opener(opener: impl UnitOpener + 'static) -> Self {
        Self {
            search_paths: Vec::new(),
            opener: Box::new(opener),
            retained: Arc::new(RetainedUnits::default()),
        }
    }

    /// Add a directory to search for module units.
    ///
    /// Paths are searched in order. Supports `~` for the home directory.
    pub fn add_search_path(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();

        let expanded = match path.to_str().and_then(|s| s.strip_prefix("~/")) {
            Some(rest) => match dirs::home_dir() {
                Some(home) => home.join(rest),
                None => path.to_path_buf(),
            },
            None => path.to_path_buf(),
        };

        if !self.search_paths.contains(&expanded) {
            log::debug!("module search path added: {:?}", expanded);
            self.search_paths.push(expanded);
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Units whose modules were destroyed and that wait to be unloaded.
    pub fn retained_units(&self) -> usize {
        self.retained.len()
    }

    /// Where `path` would be opened from.
    ///
    /// Existing or absolute paths are used as given. Otherwise the first
    /// search path holding a file of that name wins; if none does, the path
    /// is returned unchanged and opening it reports the failure.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() || path.exists() {
            return path.to_path_buf();
        }
        let Some(file_name) = path.file_name() else {
            return path.to_path_buf();
        };
        self.search_paths
            .iter()
            .map(|dir| dir.join(file_name))
            .find(|candidate| candidate.is_file())
            .unwrap_or_else(|| path.to_path_buf())
    }

    /// Open the unit at `path` and construct its module.
    ///
    /// The module registers its requires and provides through `local` and
    /// `external` while it is being constructed.
    ///
    /// A unit whose construction fails is unloaded at once. Values it wrote
    /// before failing, such as the initial value of a global provide, remain
    /// in the blackboard with their drop code unmapped; a unit must not fail
    /// after a successful global provide.
    pub fn load(
        &self,
        path: impl AsRef<Path>,
        local: &LocalAdapter,
        external: &mut dyn ExternalAdapterMap,
    ) -> Result<PluginHandle, LoadError> {
        let path = self.resolve(path.as_ref());
        log::debug!("[{}] opening module unit {:?}", local.context(), path);

        let unit = self
            .opener
            .open(&path)
            .map_err(|reason| LoadError::OpenFailed {
                path: path.clone(),
                reason,
            })?;

        let missing = |symbol: &'static str| {
            let path = path.clone();
            move |reason: String| LoadError::SymbolMissing {
                path,
                symbol,
                reason,
            }
        };

        let abi_version = unit.abi_version_fn().map_err(missing(SYMBOL_ABI_VERSION))?;
        // SAFETY: resolved from `unit`, which is alive; the signature is fixed
        // by the ABI.
        let found = unsafe { abi_version() };
        if !versions_compatible(MODULE_ABI_VERSION, found) {
            return Err(LoadError::AbiMismatch {
                path: path.clone(),
                expected: format_version(MODULE_ABI_VERSION),
                found: format_version(found),
            });
        }

        let construct = unit.construct_fn().map_err(missing(SYMBOL_CONSTRUCT))?;
        let destroy = unit.destroy_fn().map_err(missing(SYMBOL_DESTROY))?;

        // SAFETY: as above. A unit built with `export_module!` catches
        // construction panics and reports them as null.
        let instance = unsafe { construct(local, external) };
        if instance.is_null() {
            log::error!(
                "[{}] module unit {:?} failed to construct, unloading",
                local.context(),
                path
            );
            return Err(LoadError::ConstructionFailed { path });
        }

        // SAFETY: non-null pointers from the construct entry point refer to a
        // live instance until `destroy` is called.
        let name = format!("{}{}", DYNAMIC_NAME_PREFIX, unsafe { (*instance).name() });
        log::info!(
            "[{}] loaded {} from {:?} (ABI {})",
            local.context(),
            name,
            path,
            format_version(found)
        );

        Ok(PluginHandle {
            instance,
            destroy,
            unit: Some(unit),
            retained: Arc::clone(&self.retained),
            name,
            path,
        })
    }
}

impl Default for PluginLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginLoader")
            .field("search_paths", &self.search_paths)
            .field("retained_units", &self.retained_units())
            .finish_non_exhaustive()
    }
}

/// Owning handle to a module living in a compiled unit.
///
/// Dropping the handle calls the unit's destroy entry point and then hands
/// the unit back to its loader, which unloads it once the loader itself is
/// dropped. The unit is never unloaded before destroy has run.
pub struct PluginHandle {
    instance: *mut ModuleInstance,
    destroy: DestroyFn,
    unit: Option<Box<dyn CompiledUnit>>,
    retained: Arc<RetainedUnits>,
    name: String,
    path: PathBuf,
}

// SAFETY: the instance is a `Box<dyn Module>` and `Module: Send`; the handle
// is its only owner.
unsafe impl Send for PluginHandle {}

impl PluginHandle {
    /// The unit the module was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Module for PluginHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self) {
        // SAFETY: `instance` stays valid until drop, and `&mut self`
        // guarantees exclusive access.
        unsafe { (*self.instance).step() }
    }
}

impl Drop for PluginHandle {
    fn drop(&mut self) {
        if !self.instance.is_null() {
            // SAFETY: `destroy` belongs to the unit that produced
            // `instance`, and the unit is still loaded.
            unsafe { (self.destroy)(&mut self.instance) };
        }
        if let Some(unit) = self.unit.take() {
            self.retained.keep(&self.path, unit);
        }
        log::debug!("{} destroyed, {:?} retained", self.name, self.path);
    }
}

impl std::fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHandle")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{BlackboardMap, Getter, Setter};
    use crate::core::DynamicModule;
    use crate::error::{NaoError, NaoResult};
    use crate::plugin::abi::{
        construct_instance, destroy_instance, AbiVersionFn, ConstructFn,
    };
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    type Trace = Arc<Mutex<Vec<&'static str>>>;

    /// Records its destruction into the trace it finds on the blackboard
    struct Stepper {
        steps: Setter<u32>,
        count: u32,
        trace: Trace,
    }

    impl Module for Stepper {
        fn step(&mut self) {
            self.count += 1;
            self.steps.set(self.count);
        }
    }

    impl DynamicModule for Stepper {
        fn construct(local: &LocalAdapter, _: &mut dyn ExternalAdapterMap) -> NaoResult<Self> {
            let trace: Getter<Trace> = local.register_require("trace")?;
            Ok(Self {
                steps: local.register_provide("stepper.steps")?,
                count: 0,
                trace: trace.get().unwrap_or_default(),
            })
        }
    }

    impl Drop for Stepper {
        fn drop(&mut self) {
            self.trace.lock().push("destroy");
        }
    }

    struct Rejects;

    impl Module for Rejects {
        fn step(&mut self) {}
    }

    impl DynamicModule for Rejects {
        fn construct(_: &LocalAdapter, _: &mut dyn ExternalAdapterMap) -> NaoResult<Self> {
            Err(NaoError::config("refusing to start"))
        }
    }

    extern "C" fn abi_current() -> u32 {
        MODULE_ABI_VERSION
    }

    extern "C" fn abi_next_major() -> u32 {
        0x02_00_0000
    }

    #[allow(improper_ctypes_definitions)]
    extern "C" fn construct_stepper(
        local: &LocalAdapter,
        external: &mut dyn ExternalAdapterMap,
    ) -> *mut ModuleInstance {
        construct_instance::<Stepper>(local, external)
    }

    #[allow(improper_ctypes_definitions)]
    extern "C" fn construct_rejects(
        local: &LocalAdapter,
        external: &mut dyn ExternalAdapterMap,
    ) -> *mut ModuleInstance {
        construct_instance::<Rejects>(local, external)
    }

    unsafe extern "C" fn destroy(instance: *mut *mut ModuleInstance) {
        destroy_instance(instance)
    }

    #[derive(Clone, Copy)]
    struct Entries {
        abi: Option<AbiVersionFn>,
        construct: Option<ConstructFn>,
        destroy: Option<DestroyFn>,
    }

    impl Entries {
        fn stepper() -> Self {
            Self {
                abi: Some(abi_current as AbiVersionFn),
                construct: Some(construct_stepper as ConstructFn),
                destroy: Some(destroy as DestroyFn),
            }
        }
    }

    #[derive(Default)]
    struct Counters {
        opens: AtomicUsize,
        unloads: AtomicUsize,
    }

    impl Counters {
        fn live(&self) -> usize {
            self.opens.load(Ordering::SeqCst) - self.unloads.load(Ordering::SeqCst)
        }
    }

    struct FakeUnit {
        entries: Entries,
        counters: Arc<Counters>,
        trace: Trace,
    }

    fn entry<T>(entry: Option<T>, symbol: &str) -> Result<T, String> {
        entry.ok_or_else(|| format!("undefined symbol: {}", symbol))
    }

    impl CompiledUnit for FakeUnit {
        fn abi_version_fn(&self) -> Result<AbiVersionFn, String> {
            entry(self.entries.abi, SYMBOL_ABI_VERSION)
        }

        fn construct_fn(&self) -> Result<ConstructFn, String> {
            entry(self.entries.construct, SYMBOL_CONSTRUCT)
        }

        fn destroy_fn(&self) -> Result<DestroyFn, String> {
            entry(self.entries.destroy, SYMBOL_DESTROY)
        }
    }

    impl Drop for FakeUnit {
        fn drop(&mut self) {
            self.counters.unloads.fetch_add(1, Ordering::SeqCst);
            self.trace.lock().push("unload");
        }
    }

    /// Hands out fake units for paths ending in `.so`, fails otherwise
    struct FakeOpener {
        entries: Entries,
        counters: Arc<Counters>,
        trace: Trace,
    }

    impl UnitOpener for FakeOpener {
        fn open(&self, path: &Path) -> Result<Box<dyn CompiledUnit>, String> {
            if path.extension().and_then(|e| e.to_str()) != Some("so") {
                return Err(format!("{}: cannot open shared object file", path.display()));
            }
            self.counters.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeUnit {
                entries: self.entries,
                counters: Arc::clone(&self.counters),
                trace: Arc::clone(&self.trace),
            }))
        }
    }

    struct Harness {
        loader: PluginLoader,
        counters: Arc<Counters>,
        trace: Trace,
        boards: BlackboardMap,
        local: LocalAdapter,
    }

    fn harness(entries: Entries) -> Harness {
        let counters = Arc::new(Counters::default());
        let trace: Trace = Arc::new(Mutex::new(Vec::new()));
        let loader = PluginLoader::with_opener(FakeOpener {
            entries,
            counters: Arc::clone(&counters),
            trace: Arc::clone(&trace),
        });
        let mut boards = BlackboardMap::new();
        let local = boards.local("W1");
        local
            .register_global_provide::<Trace>("trace", Arc::clone(&trace))
            .unwrap();
        Harness {
            loader,
            counters,
            trace,
            boards,
            local,
        }
    }

    #[test]
    fn test_load_constructs_dynamic_module() {
        let mut h = harness(Entries::stepper());
        let mut handle = h
            .loader
            .load("stepper.so", &h.local, &mut h.boards)
            .unwrap();

        assert_eq!(handle.name(), "DynamicStepper");
        assert_eq!(handle.path(), Path::new("stepper.so"));

        let steps = h.local.register_require::<u32>("stepper.steps").unwrap();
        handle.step();
        handle.step();
        assert_eq!(steps.get(), Some(2));
        assert_eq!(h.counters.live(), 1);

        drop(handle);
        assert_eq!(h.loader.retained_units(), 1);
        drop(h.loader);
        assert_eq!(h.counters.live(), 0);
    }

    #[test]
    fn test_drop_destroys_before_unload() {
        let mut h = harness(Entries::stepper());
        let handle = h
            .loader
            .load("stepper.so", &h.local, &mut h.boards)
            .unwrap();
        drop(handle);
        assert_eq!(*h.trace.lock(), ["destroy"]);

        drop(h.loader);
        assert_eq!(*h.trace.lock(), ["destroy", "unload"]);
    }

    #[test]
    fn test_unit_outlives_values_it_wrote() {
        let mut h = harness(Entries::stepper());
        let mut handle = h
            .loader
            .load("stepper.so", &h.local, &mut h.boards)
            .unwrap();
        let steps = h.local.register_require::<u32>("stepper.steps").unwrap();
        handle.step();
        drop(handle);

        // the module is gone but its unit is still mapped
        assert_eq!(steps.get(), Some(1));
        assert_eq!(h.counters.live(), 1);

        drop(steps);
        drop(h.boards);
        drop(h.local);
        drop(h.loader);
        assert_eq!(h.counters.live(), 0);
    }

    #[test]
    fn test_handle_keeps_unit_after_loader_drop() {
        let mut h = harness(Entries::stepper());
        let handle = h
            .loader
            .load("stepper.so", &h.local, &mut h.boards)
            .unwrap();

        drop(h.loader);
        assert!(h.trace.lock().is_empty());
        assert_eq!(h.counters.live(), 1);

        drop(handle);
        assert_eq!(*h.trace.lock(), ["destroy", "unload"]);
        assert_eq!(h.counters.live(), 0);
    }

    #[test]
    fn test_retained_units_unload_with_loader() {
        let mut h = harness(Entries::stepper());
        let other = h.boards.local("W2");
        other
            .register_global_provide::<Trace>("trace", Arc::clone(&h.trace))
            .unwrap();

        let first = h
            .loader
            .load("first.so", &h.local, &mut h.boards)
            .unwrap();
        let second = h
            .loader
            .load("second.so", &other, &mut h.boards)
            .unwrap();
        drop(first);
        drop(second);
        assert_eq!(h.loader.retained_units(), 2);
        assert_eq!(h.counters.live(), 2);

        drop(h.loader);
        assert_eq!(h.counters.unloads.load(Ordering::SeqCst), 2);
        assert_eq!(*h.trace.lock(), ["destroy", "destroy", "unload", "unload"]);
    }

    #[test]
    fn test_handle_is_a_movable_module() {
        let mut h = harness(Entries::stepper());
        let handle = h
            .loader
            .load("stepper.so", &h.local, &mut h.boards)
            .unwrap();

        let boxed: Box<dyn Module> = Box::new(handle);
        assert_eq!(boxed.name(), "DynamicStepper");
        drop(boxed);
        drop(h.loader);

        assert_eq!(*h.trace.lock(), ["destroy", "unload"]);
        assert_eq!(h.counters.unloads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_open_failure_leaves_nothing_loaded() {
        let mut h = harness(Entries::stepper());
        let err = h
            .loader
            .load("does-not-exist.dylib", &h.local, &mut h.boards)
            .unwrap_err();

        assert!(matches!(err, LoadError::OpenFailed { .. }));
        assert_eq!(h.counters.opens.load(Ordering::SeqCst), 0);
        assert_eq!(h.counters.live(), 0);
    }

    #[test]
    fn test_missing_construct_symbol_unloads() {
        let mut h = harness(Entries {
            construct: None,
            ..Entries::stepper()
        });
        let err = h
            .loader
            .load("stepper.so", &h.local, &mut h.boards)
            .unwrap_err();

        assert!(matches!(
            err,
            LoadError::SymbolMissing {
                symbol: SYMBOL_CONSTRUCT,
                ..
            }
        ));
        assert_eq!(h.counters.unloads.load(Ordering::SeqCst), 1);
        assert_eq!(h.counters.live(), 0);
    }

    #[test]
    fn test_missing_destroy_symbol_unloads() {
        let mut h = harness(Entries {
            destroy: None,
            ..Entries::stepper()
        });
        let err = h
            .loader
            .load("stepper.so", &h.local, &mut h.boards)
            .unwrap_err();

        assert!(matches!(
            err,
            LoadError::SymbolMissing {
                symbol: SYMBOL_DESTROY,
                ..
            }
        ));
        assert_eq!(h.counters.live(), 0);
        // nothing was constructed, so nothing was destroyed
        assert_eq!(*h.trace.lock(), ["unload"]);
    }

    #[test]
    fn test_abi_mismatch_unloads() {
        let mut h = harness(Entries {
            abi: Some(abi_next_major as AbiVersionFn),
            ..Entries::stepper()
        });
        let err = h
            .loader
            .load("stepper.so", &h.local, &mut h.boards)
            .unwrap_err();

        match err {
            LoadError::AbiMismatch {
                expected, found, ..
            } => {
                assert_eq!(expected, "1.0.0");
                assert_eq!(found, "2.0.0");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(h.counters.live(), 0);
    }

    #[test]
    fn test_construction_failure_unloads_exactly_once() {
        let mut h = harness(Entries {
            construct: Some(construct_rejects as ConstructFn),
            ..Entries::stepper()
        });
        let err = h
            .loader
            .load("rejects.so", &h.local, &mut h.boards)
            .unwrap_err();

        assert_eq!(
            err,
            LoadError::ConstructionFailed {
                path: PathBuf::from("rejects.so")
            }
        );
        assert_eq!(h.counters.opens.load(Ordering::SeqCst), 1);
        assert_eq!(h.counters.unloads.load(Ordering::SeqCst), 1);
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[test]
    fn test_real_library_without_entry_points() {
        let mut boards = BlackboardMap::new();
        let local = boards.local("W1");
        let err = PluginLoader::new()
            .load("libc.so.6", &local, &mut boards)
            .unwrap_err();

        assert!(matches!(
            err,
            LoadError::SymbolMissing {
                symbol: SYMBOL_ABI_VERSION,
                ..
            }
        ));
    }

    #[test]
    fn test_real_library_open_failure() {
        let mut boards = BlackboardMap::new();
        let local = boards.local("W1");
        let err = PluginLoader::new()
            .load("/nonexistent/libnao_ghost.so", &local, &mut boards)
            .unwrap_err();
        assert!(matches!(err, LoadError::OpenFailed { .. }));
    }

    #[test]
    fn test_search_paths_dedup_and_expand() {
        let mut loader = PluginLoader::new();
        loader.add_search_path("/opt/nao/modules");
        loader.add_search_path("/opt/nao/modules");
        assert_eq!(loader.search_paths().len(), 1);

        if let Some(home) = dirs::home_dir() {
            loader.add_search_path("~/.nao/modules");
            assert_eq!(loader.search_paths()[1], home.join(".nao/modules"));
        }
    }

    #[test]
    fn test_resolve_uses_search_paths() {
        let dir = tempfile::tempdir().unwrap();
        let unit = dir.path().join("libnao_stepper.so");
        std::fs::write(&unit, b"").unwrap();

        let mut loader = PluginLoader::new();
        loader.add_search_path("/nonexistent/first");
        loader.add_search_path(dir.path());

        assert_eq!(loader.resolve(Path::new("libnao_stepper.so")), unit);
        assert_eq!(
            loader.resolve(Path::new("libnao_other.so")),
            PathBuf::from("libnao_other.so")
        );
        assert_eq!(
            loader.resolve(Path::new("/abs/libnao_stepper.so")),
            PathBuf::from("/abs/libnao_stepper.so")
        );
    }
}
