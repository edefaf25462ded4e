use serde::{Deserialize, Serialize};
use std::fmt;

/// Frame kind tag carried in the `type` field.
///
/// Known kinds get their own variant; anything else the server invents later
/// lands in `Other` so it can still be subscribed to by its raw tag. Build
/// values through `From<&str>` so a known tag never ends up inside `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageKind {
    /// Greeting sent by the server right after the socket opens
    Connection,
    EnvironmentData,
    Alarm,
    Statistics,
    AlarmConfirmed,
    AlarmResolved,
    AlarmIgnored,
    /// Client keep-alive
    Ping,
    Other(String),
}

impl MessageKind {
    /// Kinds the registry is seeded with. A frame of one of these kinds with no
    /// listeners is silently dropped rather than reported as unrecognized.
    pub const SEEDED: [MessageKind; 6] = [
        MessageKind::EnvironmentData,
        MessageKind::Alarm,
        MessageKind::Statistics,
        MessageKind::AlarmConfirmed,
        MessageKind::AlarmResolved,
        MessageKind::AlarmIgnored,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::Connection => "CONNECTION",
            MessageKind::EnvironmentData => "ENVIRONMENT_DATA",
            MessageKind::Alarm => "ALARM",
            MessageKind::Statistics => "STATISTICS",
            MessageKind::AlarmConfirmed => "ALARM_CONFIRMED",
            MessageKind::AlarmResolved => "ALARM_RESOLVED",
            MessageKind::AlarmIgnored => "ALARM_IGNORED",
            MessageKind::Ping => "PING",
            MessageKind::Other(tag) => tag.as_str(),
        }
    }
}

impl From<&str> for MessageKind {
    fn from(tag: &str) -> Self {
        // Case-sensitive: "alarm" is not ALARM
        match tag {
            "CONNECTION" => MessageKind::Connection,
            "ENVIRONMENT_DATA" => MessageKind::EnvironmentData,
            "ALARM" => MessageKind::Alarm,
            "STATISTICS" => MessageKind::Statistics,
            "ALARM_CONFIRMED" => MessageKind::AlarmConfirmed,
            "ALARM_RESOLVED" => MessageKind::AlarmResolved,
            "ALARM_IGNORED" => MessageKind::AlarmIgnored,
            "PING" => MessageKind::Ping,
            other => MessageKind::Other(other.to_string()),
        }
    }
}

impl From<String> for MessageKind {
    fn from(tag: String) -> Self {
        MessageKind::from(tag.as_str())
    }
}

impl From<MessageKind> for String {
    fn from(kind: MessageKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
