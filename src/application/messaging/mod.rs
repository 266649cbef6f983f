//! Message handling - Pre-processing of raw chat messages

pub mod filter;

pub use filter::{MessageFilter, PassThrough};
