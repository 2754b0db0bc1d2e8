//! Compiled units and how they are opened.
//!
//! [`CompiledUnit`] is the loader's view of an opened library: something that
//! can resolve the three module entry points and unloads itself on drop.
//! [`LibraryOpener`] backs it with `libloading`; tests substitute their own
//! [`UnitOpener`].

use super::abi::{
    AbiVersionFn, ConstructFn, DestroyFn, SYMBOL_ABI_VERSION, SYMBOL_CONSTRUCT, SYMBOL_DESTROY,
};
use libloading::Library;
use std::path::{Path, PathBuf};

/// An opened unit. Dropping it unloads the unit.
///
/// Function pointers returned by the resolvers are only valid while the
/// unit is alive.
pub trait CompiledUnit: Send {
    fn abi_version_fn(&self) -> Result<AbiVersionFn, String>;
    fn construct_fn(&self) -> Result<ConstructFn, String>;
    fn destroy_fn(&self) -> Result<DestroyFn, String>;
}

/// Opens compiled units by path.
pub trait UnitOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn CompiledUnit>, String>;
}

/// Opens units as shared libraries through the platform loader.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibraryOpener;

impl UnitOpener for LibraryOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn CompiledUnit>, String> {
        Ok(Box::new(SharedLibrary::open(path)?))
    }
}

/// A shared library (.so/.dylib/.dll) opened with `libloading`.
pub struct SharedLibrary {
    library: Option<Library>,
    path: PathBuf,
}

impl SharedLibrary {
    pub fn open(path: &Path) -> Result<Self, String> {
        // SAFETY: loading a library runs its initialisers. We trust module
        // units the same way we trust the code that asked for them.
        let library = unsafe { Library::new(path) }.map_err(|e| e.to_string())?;
        log::debug!("opened library {:?}", path);
        Ok(Self {
            library: Some(library),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lookup<T: Copy>(&self, symbol: &str) -> Result<T, String> {
        let library = self
            .library
            .as_ref()
            .ok_or_else(|| format!("library {:?} is unloaded", self.path))?;
        // SAFETY: callers only instantiate T with the fn pointer type the
        // ABI module declares for `symbol`.
        unsafe {
            library
                .get::<T>(symbol.as_bytes())
                .map(|sym| *sym)
                .map_err(|e| e.to_string())
        }
    }
}

impl CompiledUnit for SharedLibrary {
    fn abi_version_fn(&self) -> Result<AbiVersionFn, String> {
        self.lookup(SYMBOL_ABI_VERSION)
    }

    fn construct_fn(&self) -> Result<ConstructFn, String> {
        self.lookup(SYMBOL_CONSTRUCT)
    }

    fn destroy_fn(&self) -> Result<DestroyFn, String> {
        self.lookup(SYMBOL_DESTROY)
    }
}

impl Drop for SharedLibrary {
    fn drop(&mut self) {
        if let Some(library) = self.library.take() {
            if let Err(e) = library.close() {
                log::warn!("failed to unload library {:?}: {}", self.path, e);
            } else {
                log::debug!("unloaded library {:?}", self.path);
            }
        }
    }
}

impl std::fmt::Debug for SharedLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedLibrary")
            .field("path", &self.path)
            .field("loaded", &self.library.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_library_fails() {
        let err = LibraryOpener
            .open(Path::new("/nonexistent/libnao_missing.so"))
            .err()
            .unwrap();
        assert!(!err.is_empty());
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[test]
    fn test_system_library_lacks_module_symbols() {
        let unit = SharedLibrary::open(Path::new("libc.so.6")).unwrap();
        assert!(unit.abi_version_fn().is_err());
        assert!(unit.construct_fn().is_err());
        assert!(unit.destroy_fn().is_err());
    }
}
