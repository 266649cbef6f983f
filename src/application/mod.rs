//! Application layer - Use cases and orchestration
//!
//! This layer contains:
//! - Services: Plugin lifecycle, event fan-out, console commands
//! - Host: Startup and shutdown of the whole system
//! - Errors: Host error taxonomy
//! - Messaging: Message filters applied before dispatch

pub mod errors;
pub mod host;
pub mod messaging;
pub mod services;

pub use host::NativeHost;
