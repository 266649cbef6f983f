//! Domain traits - Seams between the host core and the outside world

pub mod native;
pub mod sink;

pub use native::{ActionSource, ModuleLoader, NativeModule};
pub use sink::{ActionSink, HostInfo};
