//! Module descriptor - the manifest a plugin ships next to its library

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::EventCategory;
use crate::application::errors::HostError;

/// Binding of an event category to an exported handler
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EventBinding {
    #[serde(rename = "type")]
    pub category: EventCategory,
    pub function: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub priority: Option<i32>,
}

/// Menu item the module exposes to the host UI
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MenuEntry {
    pub name: String,
    pub function: String,
}

/// Status/floating window entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StatusEntry {
    pub name: String,
    pub function: String,
    #[serde(default)]
    pub period: Option<u64>,
}

/// Parsed descriptor, immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct PluginInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub event: Vec<EventBinding>,
    #[serde(default)]
    pub menu: Vec<MenuEntry>,
    #[serde(default)]
    pub status: Vec<StatusEntry>,
}

impl PluginInfo {
    pub fn parse(plugin: &str, content: &str) -> Result<Self, HostError> {
        serde_json::from_str(content).map_err(|e| HostError::DescriptorParse {
            plugin: plugin.to_string(),
            reason: e.to_string(),
        })
    }

    /// Read the sidecar descriptor of `module`, if one exists
    pub fn from_sidecar(plugin: &str, module: &Path) -> Result<Option<Self>, HostError> {
        let path = module.with_extension("json");
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|e| HostError::DescriptorParse {
            plugin: plugin.to_string(),
            reason: format!("Failed to read {}: {}", path.display(), e),
        })?;
        Self::parse(plugin, &content).map(Some)
    }
}
