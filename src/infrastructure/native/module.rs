//! libloading-backed implementation of the legacy plugin ABI

use libloading::{Library, Symbol};
use std::ffi::{c_char, CStr, CString};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::application::errors::HostError;
use crate::domain::traits::NativeModule;

type AppInfoFn = unsafe extern "system" fn() -> *const c_char;
type InitializeFn = unsafe extern "system" fn(i32) -> i32;
type EventFn = unsafe extern "system" fn(i32, *const c_char) -> i32;
type InvokeFn = unsafe extern "system" fn() -> i32;

const APP_INFO: &str = "AppInfo";
const INITIALIZE: &str = "Initialize";

/// A plugin module opened from disk
pub struct DynamicModule {
    path: PathBuf,
    library: Arc<Library>,
}

impl DynamicModule {
    pub fn new(path: &Path, library: Arc<Library>) -> Self {
        Self {
            path: path.to_path_buf(),
            library,
        }
    }

    fn symbol<T>(&self, name: &str) -> Result<Symbol<'_, T>, HostError> {
        // SAFETY: the export's signature is fixed by the legacy ABI for each
        // caller below; a module exporting a mismatched symbol is undefined.
        unsafe {
            self.library
                .get::<T>(name.as_bytes())
                .map_err(|e| HostError::NativeLoad {
                    path: self.path.clone(),
                    reason: format!("missing export '{}': {}", name, e),
                })
        }
    }
}

impl NativeModule for DynamicModule {
    fn app_info(&self) -> Result<String, HostError> {
        let app_info = self.symbol::<AppInfoFn>(APP_INFO)?;
        // SAFETY: the module returns a pointer to a static NUL-terminated string.
        let raw = unsafe { app_info() };
        if raw.is_null() {
            return Ok(String::new());
        }
        let info = unsafe { CStr::from_ptr(raw) };
        Ok(info.to_string_lossy().into_owned())
    }

    fn initialize(&self, auth_code: i32) -> Result<i32, HostError> {
        if !self.has_export(INITIALIZE) {
            return Ok(0);
        }
        let initialize = self.symbol::<InitializeFn>(INITIALIZE)?;
        Ok(unsafe { initialize(auth_code) })
    }

    fn has_export(&self, name: &str) -> bool {
        self.symbol::<InvokeFn>(name).is_ok()
    }

    fn call_event(&self, function: &str, sub_type: i32, payload: &str) -> Result<i32, HostError> {
        let handler = self.symbol::<EventFn>(function)?;
        let payload = CString::new(payload).map_err(|e| HostError::Dispatch {
            plugin: self.path.display().to_string(),
            reason: format!("payload contains NUL: {}", e),
        })?;
        // SAFETY: `payload` outlives the call; the module must not retain the pointer.
        Ok(unsafe { handler(sub_type, payload.as_ptr()) })
    }

    fn invoke(&self, function: &str) -> Result<i32, HostError> {
        let export = self.symbol::<InvokeFn>(function)?;
        Ok(unsafe { export() })
    }
}
