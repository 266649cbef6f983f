use async_trait::async_trait;
use crate::application::errors::HostError;

/// Host-side effects that native modules may request
#[async_trait]
pub trait ActionSink: Send + Sync {
    /// Send a private message, returning the platform message id
    async fn send_private_message(&self, user_id: i64, text: &str) -> Result<i64, HostError>;

    async fn send_group_message(&self, group_id: i64, text: &str) -> Result<i64, HostError>;

    async fn send_discuss_message(&self, discuss_id: i64, text: &str) -> Result<i64, HostError>;

    async fn delete_message(&self, message_id: i64) -> Result<(), HostError>;

    /// Mute a group member; a zero duration lifts the ban
    async fn set_group_ban(&self, group_id: i64, user_id: i64, duration_secs: i64) -> Result<(), HostError>;

    fn host_info(&self) -> HostInfo;
}

/// Host information
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub id: String,
    pub name: String,
    pub online: bool,
}
