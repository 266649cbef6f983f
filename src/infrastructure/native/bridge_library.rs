//! The primary bridge module plugins link against.
//!
//! Plugins request host effects by calling into this library, which buffers
//! them; the host drains the buffer through `mn_poll_action`.

use libloading::Library;
use std::ffi::{c_char, CStr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::entities::OutboundAction;
use crate::domain::traits::ActionSource;

type PollFn = unsafe extern "C" fn() -> *mut c_char;
type FreeFn = unsafe extern "C" fn(*mut c_char);
type ShutdownFn = unsafe extern "C" fn();

const POLL: &[u8] = b"mn_poll_action";
const FREE: &[u8] = b"mn_free_string";
const SHUTDOWN: &[u8] = b"mn_shutdown";

pub struct BridgeLibrary {
    path: PathBuf,
    library: Arc<Library>,
}

impl BridgeLibrary {
    pub fn new(path: &Path, library: Arc<Library>) -> Self {
        Self {
            path: path.to_path_buf(),
            library,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pop one raw action, or None when the buffer is empty
    fn poll_raw(&self) -> Option<String> {
        // SAFETY: signatures are fixed by the bridge module's ABI.
        unsafe {
            let poll = self.library.get::<PollFn>(POLL).ok()?;
            let raw = poll();
            if raw.is_null() {
                return None;
            }
            let text = CStr::from_ptr(raw).to_string_lossy().into_owned();
            if let Ok(free) = self.library.get::<FreeFn>(FREE) {
                free(raw);
            }
            Some(text)
        }
    }
}

impl ActionSource for BridgeLibrary {
    fn drain(&self, max: usize) -> Vec<OutboundAction> {
        let mut actions = Vec::new();
        while actions.len() < max {
            let Some(raw) = self.poll_raw() else {
                break;
            };
            match serde_json::from_str::<OutboundAction>(&raw) {
                Ok(action) => actions.push(action),
                Err(e) => tracing::warn!("Dropping malformed action from bridge: {} ({})", e, raw),
            }
        }
        actions
    }

    fn close(&self) {
        // SAFETY: no-argument export, optional.
        unsafe {
            if let Ok(shutdown) = self.library.get::<ShutdownFn>(SHUTDOWN) {
                shutdown();
            }
        }
    }
}
