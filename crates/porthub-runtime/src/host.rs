//! Host-side channel type and the notifications a host feeds the registry.
//!
//! Notifications are JSON, tagged by `type`:
//!
//! ```json
//! { "type": "open", "channel": { "id": 1, "name": "bridge", "sender": { "tab_id": 4, "url": "https://example.com/" } } }
//! { "type": "message", "channel_id": 1, "payload": { "kind": "ping" } }
//! { "type": "close", "channel_id": 1 }
//! ```

use porthub_core::{Channel, ChannelId, ChannelOrigin};
use serde::{Deserialize, Serialize};

/// A physical channel as reported by the host.
///
/// `sender` absent means the host gave no sender information; such channels
/// are rejected on open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostChannel {
    pub id: ChannelId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<ChannelOrigin>,
}

impl HostChannel {
    pub fn new(id: u64, name: impl Into<String>, sender: Option<ChannelOrigin>) -> Self {
        Self {
            id: ChannelId(id),
            name: name.into(),
            sender,
        }
    }
}

impl Channel for HostChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn origin(&self) -> Option<&ChannelOrigin> {
        self.sender.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostNotification {
    Open {
        channel: HostChannel,
    },
    Message {
        channel_id: ChannelId,
        #[serde(default)]
        payload: serde_json::Value,
    },
    Close {
        channel_id: ChannelId,
    },
}

impl HostNotification {
    pub fn channel_id(&self) -> ChannelId {
        match self {
            Self::Open { channel } => channel.id,
            Self::Message { channel_id, .. } | Self::Close { channel_id } => *channel_id,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_notifications() {
        let raw = r#"[
            { "type": "open", "channel": { "id": 3, "name": "bridge", "sender": { "tab_id": 4, "frame_id": 0, "url": "https://example.com/" } } },
            { "type": "message", "channel_id": 3, "payload": { "kind": "ping" } },
            { "type": "close", "channel_id": 3 }
        ]"#;
        let parsed: Vec<HostNotification> = serde_json::from_str(raw).expect("valid notifications");

        assert_eq!(parsed.len(), 3);
        let HostNotification::Open { channel } = &parsed[0] else {
            panic!("expected open");
        };
        assert_eq!(channel.id, ChannelId(3));
        assert_eq!(channel.sender.as_ref().and_then(|s| s.tab_id), Some(4));
        assert!(parsed.iter().all(|n| n.channel_id() == ChannelId(3)));
    }

    #[test]
    fn open_without_sender_has_no_origin() {
        let raw = r#"{ "type": "open", "channel": { "id": 9 } }"#;
        let parsed: HostNotification = serde_json::from_str(raw).expect("valid");
        let HostNotification::Open { channel } = parsed else {
            panic!("expected open");
        };
        assert!(channel.origin().is_none());
        assert_eq!(channel.name(), "");
    }

    #[test]
    fn message_payload_defaults_to_null() {
        let raw = r#"{ "type": "message", "channel_id": 1 }"#;
        let parsed: HostNotification = serde_json::from_str(raw).expect("valid");
        assert_eq!(
            parsed,
            HostNotification::Message {
                channel_id: ChannelId(1),
                payload: serde_json::Value::Null,
            }
        );
    }
}
