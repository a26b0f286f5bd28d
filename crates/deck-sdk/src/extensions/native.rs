//! Extension modules shipped as dynamic libraries.
//!
//! A code unit may point at a shared library instead of a catalog module:
//!
//! ```toml
//! library = "target/release/libgreeter.so"
//! ```
//!
//! The library exports a constructor generated by [`declare_extension!`].
//! It must be built with the same compiler and `deck-sdk` version as the
//! host, since the module crosses the boundary as a Rust trait object.
//!
//! [`declare_extension!`]: crate::declare_extension

use libloading::{Library, Symbol};
use std::collections::HashMap;
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::types::{ExtensionError, ExtensionResult};
use super::unit::ExtensionModule;

/// Symbol every extension library exports
pub const CREATE_SYMBOL: &str = "deck_extension_create";

/// Signature of [`CREATE_SYMBOL`]
///
/// Returns a `Box<Box<dyn ExtensionModule>>` as an opaque pointer, or null.
pub type CreateFn = unsafe extern "C" fn() -> *mut c_void;

/// Export a module constructor from an extension library
///
/// ```ignore
/// deck_sdk::declare_extension!(Greeter::default());
/// ```
#[macro_export]
macro_rules! declare_extension {
    ($constructor:expr) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn deck_extension_create() -> *mut ::std::ffi::c_void {
            let module: ::std::boxed::Box<dyn $crate::ExtensionModule> =
                ::std::boxed::Box::new($constructor);
            ::std::boxed::Box::into_raw(::std::boxed::Box::new(module)) as *mut ::std::ffi::c_void
        }
    };
}

/// Take ownership of a module returned by a [`CreateFn`]
///
/// # Safety
///
/// `raw` must be null or come from the constructor generated by
/// [`declare_extension!`](crate::declare_extension), and must not be used again.
pub unsafe fn module_from_raw(raw: *mut c_void) -> Option<Arc<dyn ExtensionModule>> {
    if raw.is_null() {
        return None;
    }
    // SAFETY: guaranteed by the caller
    let module = unsafe { Box::from_raw(raw as *mut Box<dyn ExtensionModule>) };
    Some(Arc::from(*module))
}

/// Libraries opened so far, by canonical path
///
/// Libraries are never closed while the cache lives. Handlers registered by a
/// library may still be serving an in-flight request after its extension is
/// deactivated.
#[derive(Debug, Default)]
pub struct LibraryCache {
    libraries: Mutex<HashMap<PathBuf, Arc<Library>>>,
}

impl LibraryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of libraries currently held open
    pub fn len(&self) -> usize {
        self.libraries.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn open(&self, path: &Path) -> ExtensionResult<Arc<Library>> {
        let failed = |message: String| ExtensionError::LibraryLoad {
            path: path.display().to_string(),
            message,
        };

        let canonical = path.canonicalize().map_err(|e| failed(e.to_string()))?;
        let mut libraries = self.libraries.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(library) = libraries.get(&canonical) {
            return Ok(Arc::clone(library));
        }

        debug!("Opening extension library {:?}", canonical);
        // SAFETY: running the library's initializers is the point of loading it
        let library = unsafe { Library::new(&canonical) }.map_err(|e| failed(e.to_string()))?;
        let library = Arc::new(library);
        libraries.insert(canonical, Arc::clone(&library));
        Ok(library)
    }

    /// Open `path` (once) and construct a fresh module from it
    pub fn load_module(&self, path: &Path) -> ExtensionResult<Arc<dyn ExtensionModule>> {
        let library = self.open(path)?;
        let failed = |message: String| ExtensionError::LibraryLoad {
            path: path.display().to_string(),
            message,
        };

        // SAFETY: the symbol type matches what declare_extension! generates
        let create: Symbol<CreateFn> = unsafe { library.get(CREATE_SYMBOL.as_bytes()) }
            .map_err(|e| failed(format!("Symbol '{}' not found: {}", CREATE_SYMBOL, e)))?;

        // SAFETY: the pointer comes straight from the library's constructor
        unsafe { module_from_raw(create()) }
            .ok_or_else(|| failed("Module constructor returned null".to_string()))
    }
}
