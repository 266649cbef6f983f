//! Domain layer - Plugin records, events and the native ABI seams
//!
//! This layer contains:
//! - Entities: NativePlugin, descriptors, host events, outbound actions
//! - Traits: Abstractions over native modules and host side effects

pub mod entities;
pub mod traits;
