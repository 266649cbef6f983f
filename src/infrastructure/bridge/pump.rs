//! Polling loop that turns queued native requests into host effects

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::Bridge;
use crate::application::errors::HostError;
use crate::domain::entities::OutboundAction;
use crate::domain::traits::ActionSink;

/// Running periodic task; stop it before shutting the bridge down
pub struct PumpHandle {
    name: &'static str,
    stop: Arc<AtomicBool>,
    wake: Arc<Notify>,
    task: JoinHandle<()>,
}

impl PumpHandle {
    /// Run `tick` every `period` until stopped or until `tick` returns false
    pub(crate) fn spawn<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());
        let flag = stop.clone();
        let woken = wake.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = woken.notified() => {}
                }
                if flag.load(Ordering::SeqCst) || !tick().await {
                    break;
                }
            }
            tracing::debug!("{} stopped", name);
        });

        Self { name, stop, wake, task }
    }

    /// Set the stop flag and wait for the current iteration to finish
    pub async fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        self.wake.notify_one();
        if let Err(e) = self.task.await {
            tracing::error!("{} task failed: {}", self.name, e);
        }
    }
}

impl Bridge {
    /// Spawn the outbound pump, polling every `period`
    pub fn spawn_pump(&self, sink: Arc<dyn ActionSink>, period: Duration) -> PumpHandle {
        let bridge = self.clone();
        PumpHandle::spawn("Outbound pump", period, move || {
            let bridge = bridge.clone();
            let sink = sink.clone();
            async move {
                match bridge.poll_outbound().await {
                    Ok(actions) => {
                        for action in actions {
                            deliver(sink.as_ref(), action).await;
                        }
                        true
                    }
                    Err(HostError::BridgeClosed) => false,
                    Err(e) => {
                        tracing::warn!("Outbound poll failed: {}", e);
                        true
                    }
                }
            }
        })
    }
}

/// Perform one outbound action against the host. Failures are logged.
pub async fn deliver(sink: &dyn ActionSink, action: OutboundAction) {
    let plugin_id = action.plugin_id();
    let kind = action.as_str();
    let result = match action {
        OutboundAction::SendPrivateMessage { user_id, message, .. } => {
            sink.send_private_message(user_id, &message).await.map(|_| ())
        }
        OutboundAction::SendGroupMessage { group_id, message, .. } => {
            sink.send_group_message(group_id, &message).await.map(|_| ())
        }
        OutboundAction::SendDiscussMessage { discuss_id, message, .. } => {
            sink.send_discuss_message(discuss_id, &message).await.map(|_| ())
        }
        OutboundAction::DeleteMessage { message_id, .. } => sink.delete_message(message_id).await,
        OutboundAction::SetGroupBan {
            group_id,
            user_id,
            duration_secs,
            ..
        } => sink.set_group_ban(group_id, user_id, duration_secs).await,
        OutboundAction::AddLog {
            priority,
            kind: category,
            content,
            ..
        } => {
            // Legacy priorities: 0 debug, 10 info, 11-13 info variants, 20 warning, 30+ error
            match priority {
                p if p >= 30 => tracing::error!(plugin_id, "[{}] {}", category, content),
                p if p >= 20 => tracing::warn!(plugin_id, "[{}] {}", category, content),
                p if p >= 10 => tracing::info!(plugin_id, "[{}] {}", category, content),
                _ => tracing::debug!(plugin_id, "[{}] {}", category, content),
            }
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::warn!(plugin_id, action = kind, "Failed to perform action: {}", e);
    }
}
