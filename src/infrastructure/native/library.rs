//! Library manager - Loads native modules into the host process

use libloading::Library;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::bridge_library::BridgeLibrary;
use super::module::DynamicModule;
use super::platform::MODULE_EXTENSION;
use crate::application::errors::HostError;
use crate::domain::traits::{ModuleLoader, NativeModule};

/// List candidate module files in `dir`, sorted by file name
pub fn list_modules(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Failed to read directory entry: {}", e);
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_module = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(MODULE_EXTENSION))
            .unwrap_or(false);
        if is_module {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Keeps every library the host has loaded resident until released
pub struct LibraryManager {
    libraries: Mutex<Vec<(PathBuf, Arc<Library>)>>,
}

impl LibraryManager {
    pub fn new() -> Self {
        Self {
            libraries: Mutex::new(Vec::new()),
        }
    }

    /// Load a library by absolute path
    pub fn load(&self, path: &Path) -> Result<Arc<Library>, HostError> {
        if !path.exists() {
            return Err(HostError::NativeLoad {
                path: path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }

        // SAFETY: loading runs the module's initializers. Loaded modules are
        // trusted; there is no isolation from native code.
        let library = unsafe {
            Library::new(path).map_err(|e| HostError::NativeLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        };
        let library = Arc::new(library);

        let mut libraries = self.libraries.lock().unwrap_or_else(|e| e.into_inner());
        libraries.push((path.to_path_buf(), library.clone()));
        tracing::debug!("Loaded library: {}", path.display());
        Ok(library)
    }

    /// Load every library in the shared dependency directory.
    ///
    /// Failures are advisory: they are logged and the library is skipped.
    pub fn load_dependencies(&self, dir: &Path) -> Vec<PathBuf> {
        if !dir.exists() {
            tracing::debug!("Library directory does not exist: {}", dir.display());
            return Vec::new();
        }

        let candidates = match list_modules(dir) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Failed to read library directory {}: {}", dir.display(), e);
                return Vec::new();
            }
        };

        let mut loaded = Vec::new();
        for path in candidates {
            tracing::info!("Loading external library {}", path.display());
            match self.load(&path) {
                Ok(_) => loaded.push(path),
                Err(e) => tracing::warn!("{}", e),
            }
        }
        loaded
    }

    /// Load the primary bridge module; callers treat failure as fatal
    pub fn load_bridge(&self, path: &Path) -> Result<BridgeLibrary, HostError> {
        tracing::info!("Loading native bridge {}", path.display());
        let library = self.load(path)?;
        Ok(BridgeLibrary::new(path, library))
    }

    pub fn release(&self, path: &Path) {
        let mut libraries = self.libraries.lock().unwrap_or_else(|e| e.into_inner());
        let before = libraries.len();
        libraries.retain(|(p, _)| p != path);
        if libraries.len() != before {
            tracing::debug!("Released library: {}", path.display());
        }
    }
}

impl Default for LibraryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleLoader for LibraryManager {
    fn open(&self, path: &Path) -> Result<Arc<dyn NativeModule>, HostError> {
        let library = self.load(path)?;
        Ok(Arc::new(DynamicModule::new(path, library)))
    }

    fn release(&self, path: &Path) {
        LibraryManager::release(self, path);
    }
}
