//! Domain entities - Core objects of the plugin host

pub mod action;
pub mod command;
pub mod descriptor;
pub mod event;
pub mod plugin;

pub use action::OutboundAction;
pub use command::ControlCommand;
pub use descriptor::{EventBinding, MenuEntry, PluginInfo, StatusEntry};
pub use event::{EventCategory, HostEvent};
pub use plugin::{NativePlugin, PluginState, DEV_MARKER, UNKNOWN_API};
