use std::path::Path;
use std::sync::Arc;

use crate::application::errors::HostError;
use crate::domain::entities::OutboundAction;

/// A loaded module implementing the legacy plugin ABI.
///
/// Implementations are not reentrant: every method must be called from the
/// bridge worker only.
pub trait NativeModule: Send + Sync {
    /// The `apiVersion,identifier` string the module reports about itself
    fn app_info(&self) -> Result<String, HostError>;

    /// Hand the module its auth code; called once per handle, right after load
    fn initialize(&self, auth_code: i32) -> Result<i32, HostError>;

    fn has_export(&self, name: &str) -> bool;

    /// Call an event handler export
    fn call_event(&self, function: &str, sub_type: i32, payload: &str) -> Result<i32, HostError>;

    /// Call a no-argument export (lifecycle hooks, menu items)
    fn invoke(&self, function: &str) -> Result<i32, HostError>;
}

/// Opens native modules from disk
pub trait ModuleLoader: Send + Sync {
    fn open(&self, path: &Path) -> Result<Arc<dyn NativeModule>, HostError>;

    /// Drop the loader's hold on a module so the handle can be released
    fn release(&self, path: &Path);
}

/// Something the pump can drain outbound actions from
pub trait ActionSource: Send + Sync {
    fn drain(&self, max: usize) -> Vec<OutboundAction>;

    /// Stop accepting new actions
    fn close(&self) {}
}
