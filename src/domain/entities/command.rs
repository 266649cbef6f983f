use crate::application::errors::CommandError;

/// Operator command typed on the control console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Help,
    List,
    Enable(u32),
    Disable(u32),
    Reload(u32),
    Menu { id: u32, function: String },
    Event { category: i32, payload: String },
    Online,
    Quit,
}

impl ControlCommand {
    /// Parse a line such as `/enable 2` or `menu 0 _menuSettings`
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim().trim_start_matches('/');
        let mut parts = line.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or("").to_lowercase();
        let rest = parts.next().unwrap_or("").trim();

        match name.as_str() {
            "help" | "?" => Ok(ControlCommand::Help),
            "list" | "ls" => Ok(ControlCommand::List),
            "enable" => Ok(ControlCommand::Enable(parse_id(rest)?)),
            "disable" => Ok(ControlCommand::Disable(parse_id(rest)?)),
            "reload" => Ok(ControlCommand::Reload(parse_id(rest)?)),
            "menu" => {
                let mut args = rest.split_whitespace();
                let id = parse_id(args.next().unwrap_or(""))?;
                let function = args
                    .next()
                    .ok_or_else(|| CommandError::InvalidArgs("usage: menu <id> <function>".to_string()))?
                    .to_string();
                Ok(ControlCommand::Menu { id, function })
            }
            "event" => {
                let mut args = rest.splitn(2, char::is_whitespace);
                let category = args
                    .next()
                    .unwrap_or("")
                    .parse::<i32>()
                    .map_err(|_| CommandError::InvalidArgs("usage: event <category> <payload>".to_string()))?;
                let payload = args.next().unwrap_or("").trim().to_string();
                Ok(ControlCommand::Event { category, payload })
            }
            "online" => Ok(ControlCommand::Online),
            "quit" | "exit" => Ok(ControlCommand::Quit),
            "" => Err(CommandError::InvalidArgs("empty command".to_string())),
            other => Err(CommandError::NotFound(other.to_string())),
        }
    }

    pub fn usage() -> &'static str {
        "Available commands:\n\
         /list - Show plugins\n\
         /enable <id> - Enable a plugin\n\
         /disable <id> - Disable a plugin\n\
         /reload <id> - Reload a development plugin\n\
         /menu <id> <function> - Invoke a menu export\n\
         /event <category> <payload> - Dispatch a host event\n\
         /online - Mark the bot online and enable plugins\n\
         /quit - Shut down"
    }
}

fn parse_id(raw: &str) -> Result<u32, CommandError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| CommandError::InvalidArgs(format!("expected plugin id, got '{}'", raw.trim())))
}
