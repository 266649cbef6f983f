use std::sync::Arc;

use crate::application::errors::HostError;
use crate::application::host::NativeHost;
use crate::domain::entities::{ControlCommand, HostEvent};

/// What the console should do after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOutcome {
    Reply(String),
    Quit,
}

/// Executes operator commands against a running host
pub struct ControlService {
    host: Arc<NativeHost>,
}

impl ControlService {
    pub fn new(host: Arc<NativeHost>) -> Self {
        Self { host }
    }

    /// Parse and execute one console line. Errors become replies.
    pub async fn handle_line(&self, line: &str) -> ControlOutcome {
        match ControlCommand::parse(line) {
            Ok(command) => match self.execute(command).await {
                Ok(outcome) => outcome,
                Err(e) => ControlOutcome::Reply(format!("Error: {}", e)),
            },
            Err(e) => ControlOutcome::Reply(format!("{}\n{}", e, ControlCommand::usage())),
        }
    }

    pub async fn execute(&self, command: ControlCommand) -> Result<ControlOutcome, HostError> {
        let plugins = self.host.plugins();
        let reply = match command {
            ControlCommand::Help => ControlCommand::usage().to_string(),
            ControlCommand::List => self.list(),
            ControlCommand::Enable(id) => {
                plugins.enable(id).await?;
                format!("Plugin {} enabled", id)
            }
            ControlCommand::Disable(id) => {
                plugins.disable(id).await?;
                format!("Plugin {} disabled", id)
            }
            ControlCommand::Reload(id) => {
                plugins.reload(id).await?;
                format!("Plugin {} reloaded", id)
            }
            ControlCommand::Menu { id, function } => {
                let code = plugins.invoke_menu(id, &function).await?;
                format!("{} returned {}", function, code)
            }
            ControlCommand::Event { category, payload } => {
                let report = self.host.dispatch(HostEvent::new(category, payload)).await?;
                let mut reply = format!(
                    "Delivered to {} plugins, {} failed",
                    report.delivered.len(),
                    report.failed.len()
                );
                for (id, reason) in &report.failed {
                    reply.push_str(&format!("\n  #{}: {}", id, reason));
                }
                reply
            }
            ControlCommand::Online => {
                let enabled = self.host.set_online().await;
                format!("Online, {} plugins enabled", enabled)
            }
            ControlCommand::Quit => return Ok(ControlOutcome::Quit),
        };
        Ok(ControlOutcome::Reply(reply))
    }

    /// Plugin table, one row per plugin
    pub fn list(&self) -> String {
        let plugins = self.host.plugins().plugins();
        if plugins.is_empty() {
            return "No plugins found".to_string();
        }
        let mut out = format!("{:<4} {:<10} {:<5} {}\n", "ID", "STATE", "API", "PLUGIN");
        for entry in plugins {
            let plugin = &entry.plugin;
            out.push_str(&format!(
                "{:<4} {:<10} {:<5} {} [{}]{}\n",
                plugin.id(),
                plugin.state().as_str(),
                plugin.api(),
                plugin.name(),
                plugin.file_name(),
                if plugin.reloadable() { " (dev)" } else { "" }
            ));
        }
        out
    }
}
