//! Plugin manager - discovers native plugins and drives their lifecycle
//!
//! The manager is the only writer of plugin state. Each plugin lives in a
//! slot holding an immutable snapshot; a transition builds the next snapshot
//! and swaps it in whole, under a per-plugin lock so that no two transitions
//! for the same id overlap. All native work goes through the bridge.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::application::errors::HostError;
use crate::domain::entities::{EventCategory, NativePlugin, PluginInfo, PluginState};
use crate::domain::traits::{ModuleLoader, NativeModule};
use crate::infrastructure::bridge::Bridge;
use crate::infrastructure::native::list_modules;

/// Where plugins come from and how they start
#[derive(Debug, Clone)]
pub struct PluginSettings {
    /// Directory scanned for modules (already platform-specific)
    pub scan_dir: PathBuf,
    /// Root of per-plugin data directories
    pub data_root: PathBuf,
    /// Staging area for reloadable modules
    pub temp_dir: PathBuf,
    pub auto_enable: bool,
    /// Identifiers never enabled automatically
    pub disabled: Vec<String>,
}

/// Whether a native handle may still receive events.
///
/// Opened once the plugin is enabled and closed before a disable or exit
/// call is queued on the bridge. Handlers check it again on the worker, so
/// an event queued behind a stop call never reaches the module.
#[derive(Debug, Clone, Default)]
pub struct DeliveryGate(Arc<AtomicBool>);

impl DeliveryGate {
    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn open(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn close(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A plugin record together with its native handle
#[derive(Clone)]
pub struct PluginEntry {
    pub plugin: NativePlugin,
    module: Option<Arc<dyn NativeModule>>,
    gate: DeliveryGate,
}

impl PluginEntry {
    fn new(plugin: NativePlugin, module: Option<Arc<dyn NativeModule>>) -> Self {
        Self {
            plugin,
            module,
            gate: DeliveryGate::default(),
        }
    }

    pub fn module(&self) -> Option<&Arc<dyn NativeModule>> {
        self.module.as_ref()
    }

    /// Gate shared by every snapshot of the same native handle
    pub fn gate(&self) -> &DeliveryGate {
        &self.gate
    }

    fn with_state(&self, state: PluginState) -> Self {
        Self {
            plugin: self.plugin.with_state(state),
            module: self.module.clone(),
            gate: self.gate.clone(),
        }
    }
}

impl fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginEntry")
            .field("plugin", &self.plugin)
            .field("has_module", &self.module.is_some())
            .field("accepting_events", &self.gate.is_open())
            .finish()
    }
}

struct PluginSlot {
    transition: Mutex<()>,
    current: RwLock<Arc<PluginEntry>>,
}

impl PluginSlot {
    fn new(plugin: NativePlugin) -> Self {
        Self {
            transition: Mutex::new(()),
            current: RwLock::new(Arc::new(PluginEntry::new(plugin, None))),
        }
    }

    fn snapshot(&self) -> Arc<PluginEntry> {
        self.current.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn swap(&self, entry: PluginEntry) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(entry);
    }
}

/// Owns every native plugin record
pub struct PluginManager {
    bridge: Bridge,
    loader: Arc<dyn ModuleLoader>,
    settings: PluginSettings,
    slots: RwLock<Vec<Arc<PluginSlot>>>,
}

impl PluginManager {
    pub fn new(bridge: Bridge, loader: Arc<dyn ModuleLoader>, settings: PluginSettings) -> Self {
        Self {
            bridge,
            loader,
            settings,
            slots: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of every plugin, in ascending id order
    pub fn plugins(&self) -> Vec<Arc<PluginEntry>> {
        self.slots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|slot| slot.snapshot())
            .collect()
    }

    pub fn get(&self, id: u32) -> Option<Arc<PluginEntry>> {
        self.slot(id).ok().map(|slot| slot.snapshot())
    }

    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Private data directory of a plugin, created on first access
    pub fn app_dir(&self, id: u32) -> Result<PathBuf, HostError> {
        let entry = self.get(id).ok_or(HostError::PluginNotFound(id))?;
        Ok(entry.plugin.app_dir(&self.settings.data_root)?)
    }

    fn slot(&self, id: u32) -> Result<Arc<PluginSlot>, HostError> {
        self.slots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id as usize)
            .cloned()
            .ok_or(HostError::PluginNotFound(id))
    }

    /// Scan the plugin directory and record every new module file.
    ///
    /// Ids are assigned in scan order and never reused. Returns the new ids.
    pub fn discover(&self) -> Result<Vec<u32>, HostError> {
        if !self.settings.scan_dir.exists() {
            warn!("Plugin directory does not exist: {}", self.settings.scan_dir.display());
            return Ok(Vec::new());
        }

        let files = list_modules(&self.settings.scan_dir)?;
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        let mut added = Vec::new();
        for file in files {
            if slots.iter().any(|slot| slot.snapshot().plugin.file() == file.as_path()) {
                continue;
            }
            let id = slots.len() as u32;
            let plugin = NativePlugin::discovered(file, id);
            debug!("Discovered {}", plugin.detailed_identifier());
            slots.push(Arc::new(PluginSlot::new(plugin)));
            added.push(id);
        }
        Ok(added)
    }

    /// Discover and load every plugin. Individual failures are logged and
    /// leave that plugin in `Discovered`. Returns how many loaded.
    pub async fn load_plugins(&self) -> Result<usize, HostError> {
        let mut loaded = 0;
        for id in self.discover()? {
            if self.load(id).await.is_ok() {
                loaded += 1;
            }
        }
        info!("Loaded {} of {} plugins", loaded, self.len());
        Ok(loaded)
    }

    /// `Discovered -> Loaded`
    pub async fn load(&self, id: u32) -> Result<(), HostError> {
        let slot = self.slot(id)?;
        let _guard = slot.transition.lock().await;
        let entry = slot.snapshot();
        if entry.plugin.state() != PluginState::Discovered {
            return Err(HostError::InvalidTransition {
                plugin: entry.plugin.detailed_identifier(),
                from: entry.plugin.state(),
                operation: "load",
            });
        }
        self.load_locked(&slot, &entry.plugin).await
    }

    async fn load_locked(&self, slot: &PluginSlot, plugin: &NativePlugin) -> Result<(), HostError> {
        match self.open(plugin).await {
            Ok(entry) => {
                info!(
                    "Loaded {} (api {}, {} events)",
                    entry.plugin.detailed_identifier(),
                    entry.plugin.api(),
                    entry.plugin.events().len()
                );
                slot.swap(entry);
                Ok(())
            }
            Err(e) => {
                error!("Failed to load {}: {}", plugin.detailed_identifier(), e);
                Err(e)
            }
        }
    }

    /// Open the module, read its identity and descriptor
    async fn open(&self, plugin: &NativePlugin) -> Result<PluginEntry, HostError> {
        let plugin = self.stage(plugin)?;
        let loader = self.loader.clone();
        let path = plugin.load_path().to_path_buf();
        let auth_code = plugin.id() as i32;

        let opened = self
            .bridge
            .call(format!("load {}", plugin.detailed_identifier()), move || {
                let module = loader.open(&path)?;
                match module.app_info() {
                    Ok(app_info) => Ok((module, app_info)),
                    Err(e) => {
                        drop(module);
                        loader.release(&path);
                        Err(e)
                    }
                }
            })
            .await
            .and_then(|r| r);

        let (module, app_info) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                self.remove_staged(&plugin);
                return Err(e);
            }
        };

        let described = plugin.with_app_info(&app_info).and_then(|identified| {
            match PluginInfo::from_sidecar(&identified.detailed_identifier(), identified.file())? {
                Some(info) => Ok(identified.attach_descriptor(info)),
                None => Ok(identified),
            }
        });
        let described = match described {
            Ok(p) => p,
            Err(e) => {
                self.release(&plugin, module).await;
                return Err(e);
            }
        };

        let init = {
            let module = module.clone();
            self.bridge
                .call(format!("initialize {}", described.detailed_identifier()), move || {
                    module.initialize(auth_code)
                })
                .await
                .and_then(|r| r)
        };
        if let Err(e) = init {
            self.release(&plugin, module).await;
            return Err(HostError::LifecycleCall {
                plugin: described.detailed_identifier(),
                stage: "initialize",
                reason: e.to_string(),
            });
        }

        let auto_enable = self.settings.auto_enable
            && !self
                .settings
                .disabled
                .iter()
                .any(|d| d == described.identifier());

        Ok(PluginEntry::new(
            described.with_auto_enable(auto_enable).with_state(PluginState::Loaded),
            Some(module),
        ))
    }

    /// Copy a reloadable module to the staging area so the original stays writable
    fn stage(&self, plugin: &NativePlugin) -> Result<NativePlugin, HostError> {
        if !plugin.reloadable() {
            return Ok(plugin.clone());
        }
        std::fs::create_dir_all(&self.settings.temp_dir)?;
        let stem = plugin
            .file()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("plugin{}", plugin.id()));
        let staged = self
            .settings
            .temp_dir
            .join(format!("{}.{}.dll", stem, uuid::Uuid::new_v4().simple()));
        std::fs::copy(plugin.file(), &staged)?;
        debug!("Staged {} at {}", plugin.detailed_identifier(), staged.display());
        Ok(plugin.with_temp_file(Some(staged)))
    }

    fn remove_staged(&self, plugin: &NativePlugin) {
        if let Some(staged) = plugin.temp_file() {
            if let Err(e) = std::fs::remove_file(staged) {
                warn!("Failed to remove staged copy {}: {}", staged.display(), e);
            }
        }
    }

    /// Drop the native handle on the worker, then clean up staging
    async fn release(&self, plugin: &NativePlugin, module: Arc<dyn NativeModule>) {
        let loader = self.loader.clone();
        let path = plugin.load_path().to_path_buf();
        let released = self
            .bridge
            .call(format!("release {}", plugin.detailed_identifier()), move || {
                loader.release(&path);
                drop(module);
            })
            .await;
        if let Err(e) = released {
            warn!("Failed to release {}: {}", plugin.detailed_identifier(), e);
        }
        self.remove_staged(plugin);
    }

    /// Call a lifecycle export if the module has it
    async fn call_lifecycle(
        &self,
        plugin: &NativePlugin,
        module: &Arc<dyn NativeModule>,
        category: EventCategory,
    ) -> Result<(), HostError> {
        let default = category.conventional_handler().unwrap_or_default();
        let function = plugin.get_event_or_default(category, default).to_string();
        let stage = category.as_str();
        let module = module.clone();
        let export = function.clone();

        let outcome = self
            .bridge
            .call(format!("{} {}", stage, plugin.detailed_identifier()), move || {
                if export.is_empty() || !module.has_export(&export) {
                    return Ok(None);
                }
                module.invoke(&export).map(Some)
            })
            .await
            .and_then(|r| r);

        match outcome {
            Ok(Some(code)) => {
                debug!("{} {} returned {}", function, plugin.detailed_identifier(), code);
                Ok(())
            }
            Ok(None) => {
                debug!("{} has no {} export", plugin.detailed_identifier(), stage);
                Ok(())
            }
            Err(e) => Err(HostError::LifecycleCall {
                plugin: plugin.detailed_identifier(),
                stage,
                reason: e.to_string(),
            }),
        }
    }

    /// `Loaded | Disabled -> Enabled`
    pub async fn enable(&self, id: u32) -> Result<(), HostError> {
        let slot = self.slot(id)?;
        let _guard = slot.transition.lock().await;
        self.enable_locked(&slot).await
    }

    async fn enable_locked(&self, slot: &PluginSlot) -> Result<(), HostError> {
        let entry = slot.snapshot();
        let plugin = &entry.plugin;
        match plugin.state() {
            PluginState::Enabled => return Ok(()),
            PluginState::Loaded | PluginState::Disabled => {}
            from => {
                return Err(HostError::InvalidTransition {
                    plugin: plugin.detailed_identifier(),
                    from,
                    operation: "enable",
                })
            }
        }
        let module = entry.module().cloned().ok_or_else(|| HostError::InvalidTransition {
            plugin: plugin.detailed_identifier(),
            from: plugin.state(),
            operation: "enable",
        })?;

        let result = async {
            if !plugin.is_started() {
                self.call_lifecycle(plugin, &module, EventCategory::STARTUP).await?;
            }
            self.call_lifecycle(plugin, &module, EventCategory::ENABLE).await
        }
        .await;

        if let Err(e) = result {
            error!("{}", e);
            return Err(e);
        }
        let enabled = entry.with_state(PluginState::Enabled);
        let gate = enabled.gate().clone();
        slot.swap(enabled);
        gate.open();
        info!("Plugin {} enabled", plugin.detailed_identifier());
        Ok(())
    }

    /// `Enabled -> Disabled`
    pub async fn disable(&self, id: u32) -> Result<(), HostError> {
        let slot = self.slot(id)?;
        let _guard = slot.transition.lock().await;
        let entry = slot.snapshot();
        let plugin = &entry.plugin;
        match plugin.state() {
            PluginState::Disabled => return Ok(()),
            PluginState::Enabled => {}
            from => {
                return Err(HostError::InvalidTransition {
                    plugin: plugin.detailed_identifier(),
                    from,
                    operation: "disable",
                })
            }
        }

        entry.gate().close();
        if let Some(module) = entry.module() {
            if let Err(e) = self.call_lifecycle(plugin, module, EventCategory::DISABLE).await {
                entry.gate().open();
                error!("{}", e);
                return Err(e);
            }
        }
        slot.swap(entry.with_state(PluginState::Disabled));
        info!("Plugin {} disabled", plugin.detailed_identifier());
        Ok(())
    }

    /// Any state -> `Unloaded`. Native failures are logged; the bookkeeping
    /// always completes.
    pub async fn unload(&self, id: u32) -> Result<(), HostError> {
        let slot = self.slot(id)?;
        let _guard = slot.transition.lock().await;
        let entry = slot.snapshot();
        if entry.plugin.state() == PluginState::Unloaded {
            return Ok(());
        }
        self.teardown(&entry).await;
        slot.swap(PluginEntry::new(entry.plugin.with_state(PluginState::Unloaded), None));
        info!("Plugin {} unloaded", entry.plugin.detailed_identifier());
        Ok(())
    }

    async fn teardown(&self, entry: &PluginEntry) {
        entry.gate().close();
        let plugin = &entry.plugin;
        let Some(module) = entry.module().cloned() else {
            return;
        };
        if let Err(e) = self.call_lifecycle(plugin, &module, EventCategory::EXIT).await {
            warn!("{}", e);
        }
        self.release(plugin, module).await;
    }

    /// Swap a development module for the current file content, keeping its id
    pub async fn reload(&self, id: u32) -> Result<(), HostError> {
        let slot = self.slot(id)?;
        let _guard = slot.transition.lock().await;
        let entry = slot.snapshot();
        let plugin = &entry.plugin;
        if !plugin.reloadable() {
            return Err(HostError::NotReloadable(plugin.detailed_identifier()));
        }
        if plugin.state() == PluginState::Unloaded {
            return Err(HostError::InvalidTransition {
                plugin: plugin.detailed_identifier(),
                from: PluginState::Unloaded,
                operation: "reload",
            });
        }

        let was_enabled = plugin.is_enabled();
        entry.gate().close();
        if was_enabled {
            if let Some(module) = entry.module() {
                if let Err(e) = self.call_lifecycle(plugin, module, EventCategory::DISABLE).await {
                    warn!("{}", e);
                }
            }
        }
        self.teardown(&entry).await;

        let fresh = plugin.rediscovered();
        slot.swap(PluginEntry::new(fresh.clone(), None));
        info!("Reloading {}", fresh.detailed_identifier());

        self.load_locked(&slot, &fresh).await?;
        if was_enabled {
            self.enable_locked(&slot).await?;
        }
        Ok(())
    }

    /// Enable every loaded plugin marked auto-enable. Returns how many were enabled.
    pub async fn enable_plugins(&self) -> usize {
        let mut enabled = 0;
        for entry in self.plugins() {
            let plugin = &entry.plugin;
            if plugin.state() != PluginState::Loaded {
                continue;
            }
            if !plugin.auto_enable() {
                debug!("Skipping {} (auto-enable off)", plugin.detailed_identifier());
                continue;
            }
            if self.enable(plugin.id()).await.is_ok() {
                enabled += 1;
            }
        }
        enabled
    }

    /// Unload every plugin in ascending id order
    pub async fn unload_plugins(&self) {
        for entry in self.plugins() {
            if let Err(e) = self.unload(entry.plugin.id()).await {
                warn!("Failed to unload {}: {}", entry.plugin.detailed_identifier(), e);
            }
        }
    }

    /// Invoke a menu export of a loaded plugin
    pub async fn invoke_menu(&self, id: u32, function: &str) -> Result<i32, HostError> {
        let slot = self.slot(id)?;
        let _guard = slot.transition.lock().await;
        let entry = slot.snapshot();
        let plugin = &entry.plugin;
        let module = match (plugin.is_loaded(), entry.module()) {
            (true, Some(module)) => module.clone(),
            _ => {
                return Err(HostError::InvalidTransition {
                    plugin: plugin.detailed_identifier(),
                    from: plugin.state(),
                    operation: "invoke menu of",
                })
            }
        };
        if !plugin.verify_menu_func(function) {
            return Err(HostError::MenuNotDeclared {
                plugin: plugin.detailed_identifier(),
                function: function.to_string(),
            });
        }

        let export = function.to_string();
        self.bridge
            .call(format!("menu {} {}", function, plugin.detailed_identifier()), move || {
                module.invoke(&export)
            })
            .await
            .and_then(|r| r)
    }
}
