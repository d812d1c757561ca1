//! Where symbols come from.
//!
//! The loader never calls `dlopen`/`dlsym` directly. It asks a
//! [`LibraryOpener`] for a [`SymbolSource`] by name and resolves entries
//! through it. [`DynamicLibraryOpener`] is the real implementation on top of
//! `libloading`; tests substitute in-process tables of `extern "C"` stubs.

use std::ffi::{CStr, c_void};
use std::ptr::NonNull;

/// An opened library that can resolve exported names to addresses.
///
/// # Safety
///
/// The call shim transmutes resolved addresses to typed function pointers and
/// calls them. For every [`NvmlOp`](crate::NvmlOp), an address returned for
/// `op.c_symbol()` must point at a function with that op's native signature
/// (see the aliases in `ffi`), and it must stay callable for as long as the
/// source is alive. Names outside [`NvmlOp`](crate::NvmlOp) carry no
/// obligation.
///
/// Safe code cannot hand the loader an arbitrary address:
///
/// ```compile_fail,E0200
/// use std::ffi::{CStr, c_void};
/// use std::ptr::NonNull;
///
/// struct Dangling;
///
/// impl nvml_shim::SymbolSource for Dangling {
///     fn name(&self) -> &str {
///         "dangling"
///     }
///
///     fn lookup(&self, _symbol: &CStr) -> Result<NonNull<c_void>, String> {
///         Ok(NonNull::dangling())
///     }
/// }
/// ```
pub unsafe trait SymbolSource: Send + Sync {
    /// Name the library was opened under.
    fn name(&self) -> &str;

    /// Address of `symbol`, or the linker's error text.
    fn lookup(&self, symbol: &CStr) -> Result<NonNull<c_void>, String>;
}

/// Opens libraries by candidate name.
///
/// # Safety
///
/// Every source returned from [`LibraryOpener::open`] must uphold the
/// [`SymbolSource`] contract.
pub unsafe trait LibraryOpener: Send + Sync {
    /// Open `name`, or return the loader's error text.
    fn open(&self, name: &str) -> Result<Box<dyn SymbolSource>, String>;
}

/// A library opened through the host dynamic linker.
pub struct DynamicLibrary {
    name: String,
    library: libloading::Library,
}

impl DynamicLibrary {
    /// Open `name` through the platform search path.
    ///
    /// On Unix the library is bound eagerly (`RTLD_NOW | RTLD_LOCAL`) so that
    /// unresolvable imports surface here rather than at first call.
    ///
    /// # Safety
    ///
    /// Opening runs the library's initializers. `name` must resolve to an NVML
    /// build whose `nvml*` exports have the documented C signatures, since the
    /// result is used as a [`SymbolSource`].
    pub unsafe fn open(name: &str) -> Result<Self, libloading::Error> {
        #[cfg(unix)]
        let library: libloading::Library = {
            // SAFETY: forwarded to the caller.
            let opened = unsafe {
                libloading::os::unix::Library::open(Some(name), libc::RTLD_NOW | libc::RTLD_LOCAL)
            };
            opened?.into()
        };

        #[cfg(not(unix))]
        // SAFETY: as above.
        let library = unsafe { libloading::Library::new(name) }?;

        Ok(Self {
            name: name.to_string(),
            library,
        })
    }

    /// The underlying `libloading` handle.
    #[must_use]
    pub fn library(&self) -> &libloading::Library {
        &self.library
    }
}

// SAFETY: `open` requires a genuine NVML build, and the handle keeps the
// library mapped until this value is dropped.
unsafe impl SymbolSource for DynamicLibrary {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, symbol: &CStr) -> Result<NonNull<c_void>, String> {
        // SAFETY: the symbol is read as a plain address and never called here.
        let raw: *mut c_void = unsafe {
            let sym: libloading::Symbol<'_, *mut c_void> = self
                .library
                .get(symbol.to_bytes_with_nul())
                .map_err(|e| e.to_string())?;
            *sym
        };
        NonNull::new(raw).ok_or_else(|| format!("{} resolved to a null address", symbol.to_string_lossy()))
    }
}

impl std::fmt::Debug for DynamicLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicLibrary")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// [`LibraryOpener`] backed by the host dynamic linker.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicLibraryOpener;

// SAFETY: candidate names come from `LoaderConfig`. A library found under an
// NVML soname is trusted to be NVML, the same trust the dynamic linker extends
// to any `-lnvidia-ml` consumer.
unsafe impl LibraryOpener for DynamicLibraryOpener {
    fn open(&self, name: &str) -> Result<Box<dyn SymbolSource>, String> {
        // SAFETY: see the impl comment above.
        unsafe { DynamicLibrary::open(name) }
            .map(|lib| Box::new(lib) as Box<dyn SymbolSource>)
            .map_err(|e| e.to_string())
    }
}
