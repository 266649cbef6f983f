//! Application layer errors

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::domain::entities::PluginState;

/// Errors raised by the native host
#[derive(Error, Debug)]
pub enum HostError {
    /// Module file missing, corrupt or ABI-incompatible
    #[error("Failed to load native module {path}: {reason}")]
    NativeLoad { path: PathBuf, reason: String },

    /// Self-reported identity or descriptor sidecar could not be parsed
    #[error("Descriptor error for {plugin}: {reason}")]
    DescriptorParse { plugin: String, reason: String },

    /// A single plugin's event handler failed
    #[error("Dispatch to {plugin} failed: {reason}")]
    Dispatch { plugin: String, reason: String },

    /// Startup/enable/disable/exit export failed
    #[error("{stage} call failed for {plugin}: {reason}")]
    LifecycleCall {
        plugin: String,
        stage: &'static str,
        reason: String,
    },

    #[error("Native call '{operation}' timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    /// Native call panicked or the module crashed
    #[error("Native call '{operation}' crashed: {reason}")]
    Crashed { operation: String, reason: String },

    #[error("Bridge is shut down")]
    BridgeClosed,

    #[error("Event dispatch is closed")]
    DispatchClosed,

    #[error("Plugin not found: {0}")]
    PluginNotFound(u32),

    #[error("Cannot {operation} {plugin} while {from:?}")]
    InvalidTransition {
        plugin: String,
        from: PluginState,
        operation: &'static str,
    },

    #[error("Plugin is not reloadable: {0}")]
    NotReloadable(String),

    #[error("Menu function '{function}' is not declared by {plugin}")]
    MenuNotDeclared { plugin: String, function: String },

    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Console control command errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Command not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
