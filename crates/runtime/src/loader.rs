//! Module loading and cross-module connector ownership.
//!
//! [`ModuleLoader`] resolves a logical connector name to the platform's
//! shared-module path, validates the plugin ABI, and produces a
//! [`ConnectorHandle`]. The handle owns the instance pointer, the module's
//! destroy function, and the library itself; dropping it stops the connector,
//! frees the instance through the module's own allocator, and only then
//! unloads the library. The host must join every thread that can hold
//! references into the module before letting the handle drop.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use libloading::Library;
use tracing::debug;

use crate::error::LoaderError;
use xconn_api::plugin::{
    AbiVersionFn, ConnectorBox, CreateFn, DestroyFn, ABI_VERSION, ABI_VERSION_SYMBOL,
    CREATE_SYMBOL, DESTROY_SYMBOL,
};
use xconn_api::Connector;

/// Platform file name for a logical connector name.
pub fn module_file_name(name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{name}.dll")
    } else if cfg!(target_os = "macos") {
        format!("lib{name}.dylib")
    } else {
        format!("lib{name}.so")
    }
}

/// Locates, loads, and validates one connector module.
pub struct ModuleLoader {
    name: String,
    path: PathBuf,
    lib: Option<Library>,
}

impl ModuleLoader {
    pub fn new(modules_dir: &Path, name: &str) -> Self {
        let path = modules_dir.join(module_file_name(name));
        Self {
            name: name.to_string(),
            path,
            lib: None,
        }
    }

    /// The logical name used to resolve the module path.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resolved module path, for diagnostics.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the module and validate its plugin ABI.
    ///
    /// Total: every failure comes back as a [`LoaderError`], never a panic,
    /// and no partially constructed instance is leaked.
    pub fn open(&mut self) -> Result<(), LoaderError> {
        if self.lib.is_some() {
            return Ok(());
        }
        if !self.path.exists() {
            return Err(LoaderError::NotFound {
                path: self.path.clone(),
            });
        }
        // Resolve symlinks/relative segments before handing the path to the
        // dynamic loader.
        self.path = self.path.canonicalize().map_err(|err| LoaderError::Load {
            path: self.path.clone(),
            reason: err.to_string(),
        })?;

        // SAFETY: loading a module runs its initializers. The module is
        // trusted host configuration (resolved from the operator-controlled
        // modules directory), which is the trust model of this host.
        let lib = unsafe { Library::new(&self.path) }.map_err(|err| LoaderError::Load {
            path: self.path.clone(),
            reason: err.to_string(),
        })?;

        // SAFETY: symbol types match the exports generated by
        // `declare_connector!`; the ABI gate below rejects modules built
        // against a different contract.
        let abi = unsafe {
            let version: libloading::Symbol<'_, AbiVersionFn> = lib
                .get(ABI_VERSION_SYMBOL)
                .map_err(|err| LoaderError::Instantiation(format!("missing ABI probe: {err}")))?;
            version()
        };
        if abi != ABI_VERSION {
            return Err(LoaderError::AbiMismatch {
                expected: ABI_VERSION,
                found: abi,
            });
        }
        // SAFETY: as above; presence checks only, the symbols are re-fetched
        // at instantiation time.
        unsafe {
            lib.get::<CreateFn>(CREATE_SYMBOL)
                .map_err(|err| LoaderError::Instantiation(format!("missing factory: {err}")))?;
            lib.get::<DestroyFn>(DESTROY_SYMBOL)
                .map_err(|err| LoaderError::Instantiation(format!("missing destroy: {err}")))?;
        }

        debug!(module = %self.name, path = %self.path.display(), "module validated");
        self.lib = Some(lib);
        Ok(())
    }

    /// Instantiate the module's connector and wrap it in a handle.
    ///
    /// Opens the module first if [`open`](ModuleLoader::open) has not run.
    /// Ownership of the instance stays with the module; the handle routes
    /// destruction through the module's destroy entry point.
    pub fn instance(mut self) -> Result<ConnectorHandle, LoaderError> {
        self.open()?;
        let lib = match self.lib.take() {
            Some(lib) => lib,
            None => return Err(LoaderError::Instantiation("module not opened".to_string())),
        };

        // SAFETY: symbols were validated by open(); fn pointers stay valid
        // for as long as the library is loaded, and the handle keeps the
        // library alive until after destroy runs.
        let (create, destroy) = unsafe {
            let create: CreateFn = *lib
                .get::<CreateFn>(CREATE_SYMBOL)
                .map_err(|err| LoaderError::Instantiation(err.to_string()))?;
            let destroy: DestroyFn = *lib
                .get::<DestroyFn>(DESTROY_SYMBOL)
                .map_err(|err| LoaderError::Instantiation(err.to_string()))?;
            (create, destroy)
        };

        // SAFETY: the factory contract returns either null or a pointer
        // produced by Box::into_raw inside the module.
        let raw = unsafe { create() };
        if raw.is_null() {
            return Err(LoaderError::Instantiation(format!(
                "factory returned null for module {}",
                self.name
            )));
        }

        Ok(ConnectorHandle {
            name: self.name,
            raw,
            destroy,
            _lib: lib,
        })
    }
}

/// Owning handle over a module-created connector instance.
///
/// Exactly one handle is active per process in this design. Field order
/// matters: the library is dropped last, after the instance has been
/// destroyed through the module's own entry point.
pub struct ConnectorHandle {
    name: String,
    raw: *mut ConnectorBox,
    destroy: DestroyFn,
    _lib: Library,
}

// SAFETY: the connector contract requires Send, and the handle never hands
// out the raw pointer; access goes through Deref on a single owner.
unsafe impl Send for ConnectorHandle {}

impl ConnectorHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Deref for ConnectorHandle {
    type Target = dyn Connector;

    fn deref(&self) -> &Self::Target {
        // SAFETY: raw is non-null (checked at instantiation) and stays valid
        // until Drop runs.
        unsafe { &**self.raw }
    }
}

impl DerefMut for ConnectorHandle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: as in deref; &mut self guarantees exclusive access.
        unsafe { &mut **self.raw }
    }
}

impl Drop for ConnectorHandle {
    fn drop(&mut self) {
        debug!(module = %self.name, "destroying connector instance");
        // SAFETY: stop() is idempotent by contract; destroy consumes the
        // pointer exactly once, and the library outlives both calls.
        unsafe {
            (**self.raw).stop();
            (self.destroy)(self.raw);
        }
    }
}
