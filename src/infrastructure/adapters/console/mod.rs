//! Console adapter for development/testing

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use crate::domain::traits::{ActionSink, HostInfo};
use crate::application::errors::HostError;

/// Prints requested host effects to stdout
pub struct ConsoleAdapter {
    name: String,
    online: AtomicBool,
    next_message_id: AtomicI64,
}

impl ConsoleAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            online: AtomicBool::new(false),
            next_message_id: AtomicI64::new(1),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn message_id(&self) -> i64 {
        self.next_message_id.fetch_add(1, Ordering::SeqCst)
    }

    pub async fn read_line(&self, prompt: &str) -> Option<String> {
        use std::io::Write;
        print!("{}", prompt);
        let _ = std::io::stdout().flush();
        tokio::task::spawn_blocking(|| {
            let mut input = String::new();
            match std::io::stdin().read_line(&mut input) {
                Ok(0) | Err(_) => None,
                Ok(_) => Some(input.trim().to_string()),
            }
        })
        .await
        .ok()
        .flatten()
    }
}

impl Default for ConsoleAdapter {
    fn default() -> Self {
        Self::new("native-host")
    }
}

#[async_trait]
impl ActionSink for ConsoleAdapter {
    async fn send_private_message(&self, user_id: i64, text: &str) -> Result<i64, HostError> {
        println!("[PRIVATE {}] {}", user_id, text);
        Ok(self.message_id())
    }

    async fn send_group_message(&self, group_id: i64, text: &str) -> Result<i64, HostError> {
        println!("[GROUP {}] {}", group_id, text);
        Ok(self.message_id())
    }

    async fn send_discuss_message(&self, discuss_id: i64, text: &str) -> Result<i64, HostError> {
        println!("[DISCUSS {}] {}", discuss_id, text);
        Ok(self.message_id())
    }

    async fn delete_message(&self, message_id: i64) -> Result<(), HostError> {
        println!("[DELETE] {}", message_id);
        Ok(())
    }

    async fn set_group_ban(&self, group_id: i64, user_id: i64, duration_secs: i64) -> Result<(), HostError> {
        println!("[BAN {}] user {} for {}s", group_id, user_id, duration_secs);
        Ok(())
    }

    fn host_info(&self) -> HostInfo {
        HostInfo {
            id: "console".to_string(),
            name: self.name.clone(),
            online: self.online.load(Ordering::SeqCst),
        }
    }
}
