//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Native: Platform naming, library loading, the libloading ABI binding
//! - Bridge: The native worker, outbound queue and pump
//! - Cache: Media cache expiry
//! - Config: Configuration loading
//! - Adapters: Host integrations (console)

pub mod adapters;
pub mod bridge;
pub mod cache;
pub mod config;
pub mod native;
