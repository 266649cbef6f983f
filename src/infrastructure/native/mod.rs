//! Native module loading
//!
//! Modules are plain dynamic libraries implementing the legacy plugin ABI.
//! Dependency libraries are loaded first, then the primary bridge module,
//! then the plugins themselves.

pub mod bridge_library;
pub mod library;
pub mod module;
pub mod platform;

pub use bridge_library::BridgeLibrary;
pub use library::{list_modules, LibraryManager};
pub use module::DynamicModule;
pub use platform::{Platform, MODULE_EXTENSION};
