//! Native plugin host: loads legacy bot plugins, bridges their calls onto a
//! single native thread and fans host events out to them.

pub mod application;
pub mod domain;
pub mod infrastructure;
