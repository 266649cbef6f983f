//! Native plugin record and its lifecycle state

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{EventCategory, PluginInfo, StatusEntry};
use crate::application::errors::HostError;

/// API version reported before the module has identified itself
pub const UNKNOWN_API: i32 = -1;

/// File-name marker of development builds that may be hot-reloaded
pub const DEV_MARKER: &str = ".dev.dll";

/// Lifecycle state of a native plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginState {
    /// Found on disk, no native handle
    Discovered,
    /// Module loaded and descriptor attached, never started
    Loaded,
    Enabled,
    /// Stopped after having been started at least once
    Disabled,
    Unloaded,
}

impl PluginState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginState::Discovered => "discovered",
            PluginState::Loaded => "loaded",
            PluginState::Enabled => "enabled",
            PluginState::Disabled => "disabled",
            PluginState::Unloaded => "unloaded",
        }
    }
}

/// One record per module file.
///
/// Records are immutable snapshots: every transition produces a new value that
/// the plugin manager swaps in whole, so readers never see half-applied flags.
#[derive(Debug, Clone)]
pub struct NativePlugin {
    file: PathBuf,
    id: u32,
    identifier: String,
    api: i32,
    /// Set once the module has reported its identity
    identified: bool,
    auto_enable: bool,
    state: PluginState,
    info: Option<PluginInfo>,
    events: HashMap<EventCategory, String>,
    entries: Vec<StatusEntry>,
    temp_file: Option<PathBuf>,
}

impl NativePlugin {
    pub fn discovered(file: impl Into<PathBuf>, id: u32) -> Self {
        let file = file.into();
        let identifier = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            file,
            id,
            identifier,
            api: UNKNOWN_API,
            identified: false,
            auto_enable: true,
            state: PluginState::Discovered,
            info: None,
            events: HashMap::new(),
            entries: Vec::new(),
            temp_file: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn file_name(&self) -> String {
        self.file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn api(&self) -> i32 {
        self.api
    }

    pub fn state(&self) -> PluginState {
        self.state
    }

    pub fn auto_enable(&self) -> bool {
        self.auto_enable
    }

    pub fn info(&self) -> Option<&PluginInfo> {
        self.info.as_ref()
    }

    pub fn events(&self) -> &HashMap<EventCategory, String> {
        &self.events
    }

    pub fn entries(&self) -> &[StatusEntry] {
        &self.entries
    }

    pub fn temp_file(&self) -> Option<&Path> {
        self.temp_file.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        matches!(
            self.state,
            PluginState::Loaded | PluginState::Enabled | PluginState::Disabled
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.state == PluginState::Enabled
    }

    /// True once the module's startup export has run for the current handle
    pub fn is_started(&self) -> bool {
        matches!(self.state, PluginState::Enabled | PluginState::Disabled)
    }

    pub fn reloadable(&self) -> bool {
        self.file_name().ends_with(DEV_MARKER)
    }

    /// Path the native handle is opened from: the staged copy if there is one
    pub fn load_path(&self) -> &Path {
        self.temp_file.as_deref().unwrap_or(&self.file)
    }

    pub fn name(&self) -> &str {
        self.info
            .as_ref()
            .map(|i| i.name.as_str())
            .unwrap_or(&self.identifier)
    }

    pub fn detailed_identifier(&self) -> String {
        format!(
            "\"{}\" ({}) (ID: {})",
            self.identifier,
            self.file_name(),
            self.id
        )
    }

    /// Private data directory, created on first access
    pub fn app_dir(&self, data_root: &Path) -> std::io::Result<PathBuf> {
        let dir = data_root.join("data").join(&self.identifier);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Apply the module's self-reported `apiVersion,identifier` string.
    ///
    /// The identity is fixed the first time it is reported; later reports
    /// (e.g. after a reload) leave the record unchanged.
    pub fn with_app_info(&self, raw: &str) -> Result<Self, HostError> {
        let parts: Vec<&str> = raw.split(',').collect();
        let malformed = |reason: String| HostError::DescriptorParse {
            plugin: self.detailed_identifier(),
            reason,
        };
        if parts.len() != 2 {
            return Err(malformed(format!("expected 'api,identifier', got '{}'", raw)));
        }
        let api = parts[0]
            .trim()
            .parse::<i32>()
            .map_err(|e| malformed(format!("bad api version '{}': {}", parts[0], e)))?;
        let identifier = parts[1].trim();
        if identifier.is_empty() {
            return Err(malformed("empty identifier".to_string()));
        }

        let mut next = self.clone();
        if !self.identified {
            next.api = api;
            next.identifier = identifier.to_string();
            next.identified = true;
        }
        Ok(next)
    }

    /// Attach a parsed descriptor, rebuilding the event table from scratch
    pub fn attach_descriptor(&self, info: PluginInfo) -> Self {
        let mut next = self.clone();
        next.events = info
            .event
            .iter()
            .map(|binding| (binding.category, binding.function.clone()))
            .collect();
        next.entries = info.status.clone();
        next.info = Some(info);
        next
    }

    /// Fresh record for the same file and id, as found by a new scan.
    /// Identity and auto-enable survive; descriptor, handle-derived data and
    /// staging are dropped.
    pub fn rediscovered(&self) -> Self {
        let mut next = self.clone();
        next.state = PluginState::Discovered;
        next.info = None;
        next.events.clear();
        next.entries.clear();
        next.temp_file = None;
        next
    }

    pub fn with_state(&self, state: PluginState) -> Self {
        let mut next = self.clone();
        next.state = state;
        next
    }

    pub fn with_auto_enable(&self, auto_enable: bool) -> Self {
        let mut next = self.clone();
        next.auto_enable = auto_enable;
        next
    }

    pub fn with_temp_file(&self, temp_file: Option<PathBuf>) -> Self {
        let mut next = self.clone();
        next.temp_file = temp_file;
        next
    }

    pub fn get_event_or_default<'a>(&'a self, category: EventCategory, default: &'a str) -> &'a str {
        self.events
            .get(&category)
            .map(String::as_str)
            .unwrap_or(default)
    }

    pub fn should_call_event(&self, category: EventCategory, ignore_state: bool) -> bool {
        if !self.is_enabled() && !ignore_state {
            return false;
        }
        self.events.contains_key(&category)
    }

    pub fn verify_menu_func(&self, function: &str) -> bool {
        match &self.info {
            None => true,
            Some(info) => info.menu.iter().any(|m| m.function == function),
        }
    }
}
