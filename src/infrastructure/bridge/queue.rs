//! Outbound action queue filled by native code, drained by the pump

use std::sync::Mutex;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

use crate::domain::entities::OutboundAction;
use crate::domain::traits::ActionSource;

/// Bounded FIFO with a single consumer
pub struct ActionQueue {
    tx: mpsc::Sender<OutboundAction>,
    rx: Mutex<mpsc::Receiver<OutboundAction>>,
}

/// Producer handle given to native-side code
#[derive(Clone)]
pub struct ActionSender {
    tx: mpsc::Sender<OutboundAction>,
}

impl ActionSender {
    /// Enqueue an action. Never blocks; a full or closed queue drops the
    /// action with a warning and returns false.
    pub fn enqueue(&self, action: OutboundAction) -> bool {
        match self.tx.try_send(action) {
            Ok(()) => true,
            Err(TrySendError::Full(action)) => {
                tracing::warn!(
                    plugin_id = action.plugin_id(),
                    action = action.as_str(),
                    "Outbound queue full, dropping action"
                );
                false
            }
            Err(TrySendError::Closed(action)) => {
                tracing::warn!(
                    plugin_id = action.plugin_id(),
                    action = action.as_str(),
                    "Bridge is shut down, dropping action"
                );
                false
            }
        }
    }
}

impl ActionQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    pub fn sender(&self) -> ActionSender {
        ActionSender {
            tx: self.tx.clone(),
        }
    }

    /// Refuse further enqueues; already buffered entries stay drainable
    pub fn close(&self) {
        self.rx.lock().unwrap_or_else(|e| e.into_inner()).close();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl ActionSource for ActionQueue {
    fn drain(&self, max: usize) -> Vec<OutboundAction> {
        let mut rx = self.rx.lock().unwrap_or_else(|e| e.into_inner());
        let mut actions = Vec::new();
        while actions.len() < max {
            match rx.try_recv() {
                Ok(action) => actions.push(action),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        actions
    }

    fn close(&self) {
        ActionQueue::close(self);
    }
}
