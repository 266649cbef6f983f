//! Native host - wires the bridge, plugins, events and maintenance together

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::errors::HostError;
use crate::application::services::{DispatchReport, EventManager, PluginManager, PluginSettings};
use crate::domain::entities::HostEvent;
use crate::domain::traits::{ActionSink, ModuleLoader};
use crate::infrastructure::bridge::{deliver, Bridge, PumpHandle};
use crate::infrastructure::cache::CacheManager;
use crate::infrastructure::config::Config;
use crate::infrastructure::native::{LibraryManager, Platform};

struct Background {
    pump: PumpHandle,
    sweeper: PumpHandle,
    event_loop: JoinHandle<()>,
}

pub struct NativeHost {
    config: Config,
    bridge: Bridge,
    plugins: Arc<PluginManager>,
    events: Arc<EventManager>,
    cache: Arc<CacheManager>,
    sink: Arc<dyn ActionSink>,
    inbox: Mutex<Option<mpsc::Sender<HostEvent>>>,
    background: Mutex<Option<Background>>,
    online: AtomicBool,
    shut_down: AtomicBool,
}

impl NativeHost {
    /// Start against real native modules for the current platform.
    ///
    /// Fails if the platform is unsupported or a configured bridge library
    /// cannot be loaded; nothing is left running in that case.
    pub async fn start(config: Config, sink: Arc<dyn ActionSink>) -> Result<Arc<Self>, HostError> {
        let platform = Platform::current()?;
        info!("Starting native host {}", config.host.name);

        let bridge = Bridge::new(config.call_timeout(), config.bridge.queue_capacity)?;
        let libraries = Arc::new(LibraryManager::new());

        let bridge_path = config.bridge.library.clone().or_else(|| {
            let candidate = config.plugins.directory.join(platform.bridge_file_name());
            candidate.exists().then_some(candidate)
        });
        let manager = libraries.clone();
        let library_dir = config.plugins.library_directory.clone();
        let loaded = bridge
            .call("load libraries", move || {
                let deps = manager.load_dependencies(&library_dir);
                debug!("Loaded {} dependency libraries", deps.len());
                bridge_path.map(|path| manager.load_bridge(&path)).transpose()
            })
            .await
            .and_then(|r| r);

        match loaded {
            Ok(Some(library)) => {
                info!("Bridge library loaded from {}", library.path().display());
                bridge.attach_upstream(Arc::new(library));
            }
            Ok(None) => warn!("No bridge library configured; modules can only use the in-process queue"),
            Err(e) => {
                error!("Failed to load bridge library: {}", e);
                bridge.shutdown().await;
                return Err(e);
            }
        }

        let scan_dir = platform.plugin_dir(&config.plugins.directory);
        Self::start_with(config, bridge, libraries, scan_dir, sink).await
    }

    /// Start with an explicit bridge and module loader
    pub async fn start_with(
        config: Config,
        bridge: Bridge,
        loader: Arc<dyn ModuleLoader>,
        scan_dir: PathBuf,
        sink: Arc<dyn ActionSink>,
    ) -> Result<Arc<Self>, HostError> {
        let settings = PluginSettings {
            scan_dir,
            data_root: config.host.data_dir.clone(),
            temp_dir: config.temp_dir(),
            auto_enable: config.plugins.auto_enable,
            disabled: config.plugins.disabled.clone(),
        };
        let plugins = Arc::new(PluginManager::new(bridge.clone(), loader, settings));
        if let Err(e) = plugins.load_plugins().await {
            bridge.shutdown().await;
            return Err(e);
        }

        let events = Arc::new(EventManager::new(
            plugins.clone(),
            bridge.clone(),
            config.event_workers(),
        ));
        let cache = Arc::new(CacheManager::new(config.cache.directories.clone()));

        let pump = bridge.spawn_pump(sink.clone(), config.poll_interval());
        let sweeper = spawn_sweeper(cache.clone(), &config);
        let (inbox, rx) = mpsc::channel(config.bridge.queue_capacity);
        let event_loop = tokio::spawn(run_event_loop(events.clone(), rx));

        info!("Native host ready with {} plugins", plugins.len());
        Ok(Arc::new(Self {
            config,
            bridge,
            plugins,
            events,
            cache,
            sink,
            inbox: Mutex::new(Some(inbox)),
            background: Mutex::new(Some(Background {
                pump,
                sweeper,
                event_loop,
            })),
            online: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        }))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn plugins(&self) -> &Arc<PluginManager> {
        &self.plugins
    }

    pub fn events(&self) -> &Arc<EventManager> {
        &self.events
    }

    pub fn sink(&self) -> &Arc<dyn ActionSink> {
        &self.sink
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// The bot came online: enable every auto-enable plugin. Only the first
    /// call has an effect; returns how many plugins were enabled.
    pub async fn set_online(&self) -> usize {
        if self.online.swap(true, Ordering::SeqCst) {
            return 0;
        }
        let enabled = self.plugins.enable_plugins().await;
        info!("Host online, {} plugins enabled", enabled);
        enabled
    }

    /// Queue an event for background fan-out. Returns false if the host is
    /// shutting down or the inbox is full.
    pub fn post(&self, event: HostEvent) -> bool {
        let inbox = self.inbox.lock().unwrap_or_else(|e| e.into_inner());
        let Some(tx) = inbox.as_ref() else {
            warn!("Dropping event {}: host is shutting down", event.category);
            return false;
        };
        match tx.try_send(event) {
            Ok(()) => true,
            Err(e) => {
                warn!("Dropping event: {}", e);
                false
            }
        }
    }

    /// Fan an event out and wait for every handler
    pub async fn dispatch(&self, event: HostEvent) -> Result<DispatchReport, HostError> {
        self.events.dispatch(event).await
    }

    /// Tear everything down: event intake, maintenance tasks, plugins, then
    /// the bridge. Actions still queued at the end are delivered.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down native host");

        drop(self.inbox.lock().unwrap_or_else(|e| e.into_inner()).take());
        let background = self.background.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(background) = background {
            if let Err(e) = background.event_loop.await {
                error!("Event loop failed: {}", e);
            }
            self.events.close().await;
            background.pump.stop().await;
            background.sweeper.stop().await;
        } else {
            self.events.close().await;
        }

        self.plugins.unload_plugins().await;

        for action in self.bridge.shutdown().await {
            deliver(self.sink.as_ref(), action).await;
        }

        let cache = self.cache.clone();
        match tokio::task::spawn_blocking(move || cache.clear()).await {
            Ok(removed) => debug!("Cleared {} cached files", removed),
            Err(e) => warn!("Cache clear failed: {}", e),
        }
        let temp_dir = self.config.temp_dir();
        if temp_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&temp_dir) {
                warn!("Failed to remove {}: {}", temp_dir.display(), e);
            }
        }
        info!("Native host stopped");
    }
}

async fn run_event_loop(events: Arc<EventManager>, mut rx: mpsc::Receiver<HostEvent>) {
    while let Some(event) = rx.recv().await {
        match events.spawn_dispatch(event).await {
            Ok(_) => {}
            Err(HostError::DispatchClosed) => break,
            Err(e) => warn!("Event dispatch failed: {}", e),
        }
    }
    debug!("Event loop stopped");
}

fn spawn_sweeper(cache: Arc<CacheManager>, config: &Config) -> PumpHandle {
    let expiry = config.cache.expiration_seconds;
    PumpHandle::spawn("Cache sweeper", config.sweep_interval(), move || {
        let cache = cache.clone();
        async move {
            if let Err(e) = tokio::task::spawn_blocking(move || cache.check_cache_limit(expiry)).await {
                warn!("Cache sweep failed: {}", e);
            }
            true
        }
    })
}
