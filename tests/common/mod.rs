//! Test doubles for native modules

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use native_host::application::errors::HostError;
use native_host::application::services::{PluginManager, PluginSettings};
use native_host::domain::entities::OutboundAction;
use native_host::domain::traits::{ActionSink, HostInfo, ModuleLoader, NativeModule};
use native_host::infrastructure::bridge::{ActionSender, Bridge};

static INIT: Once = Once::new();

pub fn ensure_init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// How a fake module behaves
#[derive(Clone, Default)]
pub struct FakeSpec {
    pub app_info: String,
    pub exports: Vec<&'static str>,
    /// Exports that report an error when called
    pub failing: Vec<&'static str>,
    /// Exports that panic when called
    pub panicking: Vec<&'static str>,
    /// Exports that block longer than any test timeout
    pub hanging: Vec<&'static str>,
    /// Message handlers echo their payload back through the action queue
    pub echo: bool,
    /// The module lacks an app info export
    pub no_app_info: bool,
}

impl FakeSpec {
    pub fn new(app_info: &str, exports: &[&'static str]) -> Self {
        Self {
            app_info: app_info.to_string(),
            exports: exports.to_vec(),
            ..Default::default()
        }
    }

    pub fn failing(mut self, export: &'static str) -> Self {
        self.failing.push(export);
        self
    }

    pub fn panicking(mut self, export: &'static str) -> Self {
        self.panicking.push(export);
        self
    }

    pub fn hanging(mut self, export: &'static str) -> Self {
        self.hanging.push(export);
        self
    }

    pub fn echo(mut self) -> Self {
        self.echo = true;
        self
    }

    pub fn without_app_info(mut self) -> Self {
        self.no_app_info = true;
        self
    }
}

/// Shared record of everything the fakes were asked to do
#[derive(Clone, Default)]
pub struct Journal {
    calls: Arc<Mutex<Vec<String>>>,
    threads: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    fn record(&self, entry: String) {
        let thread = std::thread::current().name().unwrap_or("unnamed").to_string();
        self.threads.lock().unwrap().push(thread);
        self.calls.lock().unwrap().push(entry);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, needle: &str) -> Vec<String> {
        self.calls().into_iter().filter(|c| c.contains(needle)).collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
        self.threads.lock().unwrap().clear();
    }

    /// Names of the threads native calls ran on
    pub fn threads(&self) -> Vec<String> {
        self.threads.lock().unwrap().clone()
    }
}

pub struct FakeModule {
    key: String,
    spec: FakeSpec,
    journal: Journal,
    auth_code: AtomicI32,
    sender: Option<ActionSender>,
}

impl FakeModule {
    fn run(&self, function: &str, detail: String) -> Result<i32, HostError> {
        self.journal.record(format!("{}:{}{}", self.key, function, detail));
        if self.spec.panicking.iter().any(|f| *f == function) {
            panic!("{} crashed in {}", self.key, function);
        }
        if self.spec.hanging.iter().any(|f| *f == function) {
            std::thread::sleep(Duration::from_millis(500));
        }
        if self.spec.failing.iter().any(|f| *f == function) {
            return Err(HostError::Dispatch {
                plugin: self.key.clone(),
                reason: format!("{} failed", function),
            });
        }
        Ok(0)
    }
}

impl NativeModule for FakeModule {
    fn app_info(&self) -> Result<String, HostError> {
        if self.spec.no_app_info {
            return Err(HostError::NativeLoad {
                path: PathBuf::from(&self.key),
                reason: "missing export AppInfo".to_string(),
            });
        }
        Ok(self.spec.app_info.clone())
    }

    fn initialize(&self, auth_code: i32) -> Result<i32, HostError> {
        self.auth_code.store(auth_code, Ordering::SeqCst);
        self.run("Initialize", format!("({})", auth_code))
    }

    fn has_export(&self, name: &str) -> bool {
        self.spec.exports.iter().any(|e| *e == name)
    }

    fn call_event(&self, function: &str, sub_type: i32, payload: &str) -> Result<i32, HostError> {
        let code = self.run(function, format!("({},{})", sub_type, payload))?;
        if self.spec.echo {
            if let Some(sender) = &self.sender {
                sender.enqueue(OutboundAction::SendGroupMessage {
                    plugin_id: self.auth_code.load(Ordering::SeqCst) as u32,
                    group_id: 1,
                    message: payload.to_string(),
                });
            }
        }
        Ok(code)
    }

    fn invoke(&self, function: &str) -> Result<i32, HostError> {
        self.run(function, String::new())
    }
}

/// Opens fake modules by file stem; staged copies (`<stem>.<uuid>.dll`) match too
pub struct FakeLoader {
    specs: HashMap<String, FakeSpec>,
    journal: Journal,
    sender: Mutex<Option<ActionSender>>,
    opens: AtomicUsize,
    released: Mutex<Vec<PathBuf>>,
}

impl FakeLoader {
    pub fn new(journal: Journal) -> Self {
        Self {
            specs: HashMap::new(),
            journal,
            sender: Mutex::new(None),
            opens: AtomicUsize::new(0),
            released: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, stem: &str, spec: FakeSpec) -> Self {
        self.specs.insert(stem.to_string(), spec);
        self
    }

    pub fn set_sender(&self, sender: ActionSender) {
        *self.sender.lock().unwrap() = Some(sender);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> Vec<PathBuf> {
        self.released.lock().unwrap().clone()
    }

    fn find(&self, path: &Path) -> Option<(String, FakeSpec)> {
        let name = path.file_name()?.to_string_lossy().into_owned();
        self.specs
            .iter()
            .find(|(stem, _)| name == format!("{}.dll", stem) || name.starts_with(&format!("{}.", stem)))
            .map(|(stem, spec)| (stem.clone(), spec.clone()))
    }
}

impl ModuleLoader for FakeLoader {
    fn open(&self, path: &Path) -> Result<Arc<dyn NativeModule>, HostError> {
        let (key, spec) = self.find(path).ok_or_else(|| HostError::NativeLoad {
            path: path.to_path_buf(),
            reason: "no such fake module".to_string(),
        })?;
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeModule {
            key,
            spec,
            journal: self.journal.clone(),
            auth_code: AtomicI32::new(-1),
            sender: self.sender.lock().unwrap().clone(),
        }))
    }

    fn release(&self, path: &Path) {
        self.released.lock().unwrap().push(path.to_path_buf());
    }
}

/// Scratch plugin directory
pub struct PluginDir {
    pub root: tempfile::TempDir,
}

impl PluginDir {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
        }
    }

    pub fn scan_dir(&self) -> PathBuf {
        let dir = self.root.path().join("plugins");
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    pub fn add_module(&self, file_name: &str) -> PathBuf {
        let path = self.scan_dir().join(file_name);
        std::fs::write(&path, b"not really a library").unwrap();
        path
    }

    /// Write the JSON sidecar next to `module`
    pub fn add_descriptor(&self, module: &str, json: &str) {
        let path = self.scan_dir().join(module).with_extension("json");
        std::fs::write(path, json).unwrap();
    }

    pub fn settings(&self) -> PluginSettings {
        PluginSettings {
            scan_dir: self.scan_dir(),
            data_root: self.root.path().join("data"),
            temp_dir: self.root.path().join("tmp"),
            auto_enable: true,
            disabled: Vec::new(),
        }
    }
}

pub fn bridge() -> Bridge {
    Bridge::new(Duration::from_secs(5), 64).unwrap()
}

pub fn manager(bridge: &Bridge, loader: Arc<FakeLoader>, dir: &PluginDir) -> Arc<PluginManager> {
    Arc::new(PluginManager::new(bridge.clone(), loader, dir.settings()))
}

/// Sink that remembers every effect it was asked to perform
#[derive(Default)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionSink for RecordingSink {
    async fn send_private_message(&self, user_id: i64, text: &str) -> Result<i64, HostError> {
        self.sent.lock().unwrap().push(format!("private:{}:{}", user_id, text));
        Ok(1)
    }

    async fn send_group_message(&self, group_id: i64, text: &str) -> Result<i64, HostError> {
        self.sent.lock().unwrap().push(format!("group:{}:{}", group_id, text));
        Ok(1)
    }

    async fn send_discuss_message(&self, discuss_id: i64, text: &str) -> Result<i64, HostError> {
        self.sent.lock().unwrap().push(format!("discuss:{}:{}", discuss_id, text));
        Ok(1)
    }

    async fn delete_message(&self, message_id: i64) -> Result<(), HostError> {
        self.sent.lock().unwrap().push(format!("delete:{}", message_id));
        Ok(())
    }

    async fn set_group_ban(&self, group_id: i64, user_id: i64, duration_secs: i64) -> Result<(), HostError> {
        self.sent
            .lock()
            .unwrap()
            .push(format!("ban:{}:{}:{}", group_id, user_id, duration_secs));
        Ok(())
    }

    fn host_info(&self) -> HostInfo {
        HostInfo {
            id: "test".to_string(),
            name: "test".to_string(),
            online: true,
        }
    }
}

/// Poll until `cond` holds or a second passes
pub async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}
