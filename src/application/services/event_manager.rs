//! Event manager - fans host events out to interested plugins

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::plugin_manager::PluginManager;
use crate::application::errors::HostError;
use crate::application::messaging::{MessageFilter, PassThrough};
use crate::domain::entities::{EventCategory, HostEvent};
use crate::infrastructure::bridge::{Bridge, PendingCall};

/// Outcome of one fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// `(plugin id, handler return code)` in delivery order
    pub delivered: Vec<(u32, i32)>,
    /// `(plugin id, reason)` for handlers that failed
    pub failed: Vec<(u32, String)>,
    /// Plugins that were stopping by the time their handler came up
    pub skipped: Vec<u32>,
}

impl DispatchReport {
    pub fn is_empty(&self) -> bool {
        self.delivered.is_empty() && self.failed.is_empty() && self.skipped.is_empty()
    }
}

struct Submitted {
    plugin_id: u32,
    plugin: String,
    call: PendingCall<Result<Option<i32>, HostError>>,
}

/// Delivers events to every enabled plugin bound to the event's category.
///
/// Handlers are submitted to the bridge in ascending plugin id order, so they
/// also run in that order. A failing handler is logged and the rest still run.
pub struct EventManager {
    plugins: Arc<PluginManager>,
    bridge: Bridge,
    pool: Arc<Semaphore>,
    workers: usize,
    filter: Arc<dyn MessageFilter>,
}

impl EventManager {
    pub fn new(plugins: Arc<PluginManager>, bridge: Bridge, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            plugins,
            bridge,
            pool: Arc::new(Semaphore::new(workers)),
            workers,
            filter: Arc::new(PassThrough),
        }
    }

    pub fn with_filter(mut self, filter: Arc<dyn MessageFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Ids of plugins that would receive an event of this category right now
    pub fn interested(&self, category: EventCategory) -> Vec<u32> {
        self.plugins
            .plugins()
            .iter()
            .filter(|entry| entry.gate().is_open() && entry.plugin.should_call_event(category, false))
            .map(|entry| entry.plugin.id())
            .collect()
    }

    /// Deliver `event` and wait for every handler
    pub async fn dispatch(&self, event: HostEvent) -> Result<DispatchReport, HostError> {
        let permit = self.acquire().await?;
        let submitted = self.submit(&event)?;
        let report = collect(submitted).await;
        drop(permit);
        Ok(report)
    }

    /// Submit `event` now and collect the results in the background.
    ///
    /// Submission happens before this returns, so events dispatched one
    /// after another reach each plugin in that order.
    pub async fn spawn_dispatch(&self, event: HostEvent) -> Result<JoinHandle<DispatchReport>, HostError> {
        let permit = self.acquire().await?;
        let submitted = self.submit(&event)?;
        Ok(tokio::spawn(async move {
            let report = collect(submitted).await;
            drop(permit);
            report
        }))
    }

    /// Wait for in-flight dispatches, then refuse new ones
    pub async fn close(&self) {
        if self.pool.is_closed() {
            return;
        }
        match self.pool.acquire_many(self.workers as u32).await {
            Ok(permits) => {
                self.pool.close();
                drop(permits);
            }
            Err(_) => debug!("Event pool already closed"),
        }
    }

    async fn acquire(&self) -> Result<OwnedSemaphorePermit, HostError> {
        self.pool
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| HostError::DispatchClosed)
    }

    fn submit(&self, event: &HostEvent) -> Result<Vec<Submitted>, HostError> {
        let category = event.category;
        let mut submitted = Vec::new();

        for entry in self.plugins.plugins() {
            let plugin = &entry.plugin;
            if !entry.gate().is_open() || !plugin.should_call_event(category, false) {
                continue;
            }
            let Some(module) = entry.module().cloned() else {
                continue;
            };
            let function = plugin.get_event_or_default(category, "").to_string();
            let payload = if category.is_message() {
                self.filter.process(plugin, category, event.payload.clone())
            } else {
                event.payload.clone()
            };
            let sub_type = event.sub_type;
            let gate = entry.gate().clone();

            let call = self.bridge.submit(
                format!("{} {}", category, plugin.detailed_identifier()),
                move || {
                    if !gate.is_open() {
                        return Ok(None);
                    }
                    module.call_event(&function, sub_type, &payload).map(Some)
                },
            )?;
            submitted.push(Submitted {
                plugin_id: plugin.id(),
                plugin: plugin.detailed_identifier(),
                call,
            });
        }

        debug!("Event {} submitted to {} plugins", category, submitted.len());
        Ok(submitted)
    }
}

async fn collect(submitted: Vec<Submitted>) -> DispatchReport {
    let mut report = DispatchReport::default();
    for Submitted { plugin_id, plugin, call } in submitted {
        match call.wait().await.and_then(|r| r) {
            Ok(Some(code)) => report.delivered.push((plugin_id, code)),
            Ok(None) => {
                debug!("{} stopped before the event reached it", plugin);
                report.skipped.push(plugin_id);
            }
            Err(e) => {
                let e = HostError::Dispatch {
                    plugin,
                    reason: e.to_string(),
                };
                warn!("{}", e);
                report.failed.push((plugin_id, e.to_string()));
            }
        }
    }
    report
}
