//! Message filters applied to raw chat messages before a plugin sees them

use crate::domain::entities::{EventCategory, NativePlugin};

/// Per-plugin rewrite hook for raw message payloads
pub trait MessageFilter: Send + Sync {
    fn process(&self, plugin: &NativePlugin, category: EventCategory, message: String) -> String;
}

/// Identity filter; the default
pub struct PassThrough;

impl MessageFilter for PassThrough {
    fn process(&self, _plugin: &NativePlugin, _category: EventCategory, message: String) -> String {
        message
    }
}
