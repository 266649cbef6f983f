//! Application services - Plugin lifecycle, event fan-out and operator control

pub mod control_service;
pub mod event_manager;
pub mod plugin_manager;

pub use control_service::{ControlOutcome, ControlService};
pub use event_manager::{DispatchReport, EventManager};
pub use plugin_manager::{DeliveryGate, PluginEntry, PluginManager, PluginSettings};
