use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer code identifying a class of host event a plugin may subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventCategory(pub i32);

impl EventCategory {
    pub const PRIVATE_MESSAGE: EventCategory = EventCategory(21);
    pub const GROUP_MESSAGE: EventCategory = EventCategory(2);
    pub const DISCUSS_MESSAGE: EventCategory = EventCategory(4);
    pub const GROUP_UPLOAD: EventCategory = EventCategory(11);
    pub const GROUP_ADMIN: EventCategory = EventCategory(101);
    pub const GROUP_MEMBER_DECREASE: EventCategory = EventCategory(102);
    pub const GROUP_MEMBER_INCREASE: EventCategory = EventCategory(103);
    pub const GROUP_BAN: EventCategory = EventCategory(104);
    pub const FRIEND_ADD: EventCategory = EventCategory(201);
    pub const REQUEST_FRIEND: EventCategory = EventCategory(301);
    pub const REQUEST_GROUP: EventCategory = EventCategory(302);

    pub const STARTUP: EventCategory = EventCategory(1001);
    pub const EXIT: EventCategory = EventCategory(1002);
    pub const ENABLE: EventCategory = EventCategory(1003);
    pub const DISABLE: EventCategory = EventCategory(1004);

    /// Raw chat messages go through the per-plugin message filter before delivery
    pub fn is_message(&self) -> bool {
        matches!(
            *self,
            Self::PRIVATE_MESSAGE | Self::GROUP_MESSAGE | Self::DISCUSS_MESSAGE
        )
    }

    /// Export name a legacy module uses when its descriptor omits the binding
    pub fn conventional_handler(&self) -> Option<&'static str> {
        match *self {
            Self::STARTUP => Some("_eventStartup"),
            Self::EXIT => Some("_eventExit"),
            Self::ENABLE => Some("_eventEnable"),
            Self::DISABLE => Some("_eventDisable"),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::PRIVATE_MESSAGE => "private-message",
            Self::GROUP_MESSAGE => "group-message",
            Self::DISCUSS_MESSAGE => "discuss-message",
            Self::GROUP_UPLOAD => "group-upload",
            Self::GROUP_ADMIN => "group-admin",
            Self::GROUP_MEMBER_DECREASE => "group-member-decrease",
            Self::GROUP_MEMBER_INCREASE => "group-member-increase",
            Self::GROUP_BAN => "group-ban",
            Self::FRIEND_ADD => "friend-add",
            Self::REQUEST_FRIEND => "request-friend",
            Self::REQUEST_GROUP => "request-group",
            Self::STARTUP => "startup",
            Self::EXIT => "exit",
            Self::ENABLE => "enable",
            Self::DISABLE => "disable",
            _ => "other",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.as_str(), self.0)
    }
}

impl From<i32> for EventCategory {
    fn from(code: i32) -> Self {
        EventCategory(code)
    }
}

/// A host event on its way to interested plugins
#[derive(Debug, Clone)]
pub struct HostEvent {
    pub category: EventCategory,
    pub sub_type: i32,
    /// Serialized payload; the format belongs to the surrounding host
    pub payload: String,
}

impl HostEvent {
    pub fn new(category: impl Into<EventCategory>, payload: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            sub_type: 1,
            payload: payload.into(),
        }
    }

    pub fn with_sub_type(mut self, sub_type: i32) -> Self {
        self.sub_type = sub_type;
        self
    }
}
