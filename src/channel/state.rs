use std::fmt;

/// Connection state of the channel. The driver task is the only writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Graceful close of the owned connection is in progress
    Closing,
}

impl ChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::Disconnected => "DISCONNECTED",
            ChannelState::Connecting => "CONNECTING",
            ChannelState::Connected => "CONNECTED",
            ChannelState::Closing => "CLOSING",
        }
    }

    /// Connecting or connected: a further connect to the same target is redundant
    pub fn is_live(&self) -> bool {
        matches!(self, ChannelState::Connecting | ChannelState::Connected)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text() {
        assert_eq!(ChannelState::Disconnected.as_str(), "DISCONNECTED");
        assert_eq!(ChannelState::Connecting.as_str(), "CONNECTING");
        assert_eq!(ChannelState::Connected.to_string(), "CONNECTED");
        assert_eq!(ChannelState::Closing.to_string(), "CLOSING");
    }

    #[test]
    fn test_live_states() {
        assert!(ChannelState::Connecting.is_live());
        assert!(ChannelState::Connected.is_live());
        assert!(!ChannelState::Closing.is_live());
        assert!(!ChannelState::Disconnected.is_live());
    }
}
