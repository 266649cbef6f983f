use serde::{Deserialize, Serialize};

/// Host-side effect requested by native code through the outbound queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum OutboundAction {
    SendPrivateMessage {
        plugin_id: u32,
        user_id: i64,
        message: String,
    },
    SendGroupMessage {
        plugin_id: u32,
        group_id: i64,
        message: String,
    },
    SendDiscussMessage {
        plugin_id: u32,
        discuss_id: i64,
        message: String,
    },
    DeleteMessage {
        plugin_id: u32,
        message_id: i64,
    },
    SetGroupBan {
        plugin_id: u32,
        group_id: i64,
        user_id: i64,
        duration_secs: i64,
    },
    AddLog {
        plugin_id: u32,
        priority: i32,
        kind: String,
        content: String,
    },
}

impl OutboundAction {
    pub fn plugin_id(&self) -> u32 {
        match self {
            OutboundAction::SendPrivateMessage { plugin_id, .. }
            | OutboundAction::SendGroupMessage { plugin_id, .. }
            | OutboundAction::SendDiscussMessage { plugin_id, .. }
            | OutboundAction::DeleteMessage { plugin_id, .. }
            | OutboundAction::SetGroupBan { plugin_id, .. }
            | OutboundAction::AddLog { plugin_id, .. } => *plugin_id,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutboundAction::SendPrivateMessage { .. } => "send-private-message",
            OutboundAction::SendGroupMessage { .. } => "send-group-message",
            OutboundAction::SendDiscussMessage { .. } => "send-discuss-message",
            OutboundAction::DeleteMessage { .. } => "delete-message",
            OutboundAction::SetGroupBan { .. } => "set-group-ban",
            OutboundAction::AddLog { .. } => "add-log",
        }
    }
}
