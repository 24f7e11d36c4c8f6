//! Inbound chat events.

use confidant_core::types::{ChatId, UserId};
use serde::{Deserialize, Serialize};

/// Kind of chat a message arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    /// One-to-one chat with the agent.
    Private,
    /// Group or supergroup.
    Group,
}

/// A message delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Chat the message was posted in.
    pub chat_id: ChatId,
    /// Author.
    pub sender_id: UserId,
    /// Author's current display name.
    pub sender_display_name: String,
    /// Message text.
    pub text: String,
    /// Private or group.
    pub chat_kind: ChatKind,
    /// Whether the agent was mentioned, replied to or otherwise addressed.
    pub is_addressed_to_agent: bool,
}

impl InboundEvent {
    /// A private message. Private messages are always addressed to the agent.
    #[must_use]
    pub fn private(
        sender_id: UserId,
        display_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            // In a private chat the chat id is the user id.
            chat_id: ChatId(sender_id.0),
            sender_id,
            sender_display_name: display_name.into(),
            text: text.into(),
            chat_kind: ChatKind::Private,
            is_addressed_to_agent: true,
        }
    }

    /// A group message.
    #[must_use]
    pub fn group(
        chat_id: ChatId,
        sender_id: UserId,
        display_name: impl Into<String>,
        text: impl Into<String>,
        addressed: bool,
    ) -> Self {
        Self {
            chat_id,
            sender_id,
            sender_display_name: display_name.into(),
            text: text.into(),
            chat_kind: ChatKind::Group,
            is_addressed_to_agent: addressed,
        }
    }

    /// Whether the engine should produce a reply.
    #[must_use]
    pub fn wants_reply(&self) -> bool {
        self.chat_kind == ChatKind::Private || self.is_addressed_to_agent
    }

    /// Display name, or `None` if the transport sent a blank one.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        let name = self.sender_display_name.trim();
        (!name.is_empty()).then_some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_messages_always_want_a_reply() {
        let event = InboundEvent::private(UserId(5), "Alex", "hi");
        assert_eq!(event.chat_id, ChatId(5));
        assert!(event.wants_reply());
    }

    #[test]
    fn group_messages_reply_only_when_addressed() {
        assert!(!InboundEvent::group(ChatId(-1), UserId(5), "Alex", "hi all", false).wants_reply());
        assert!(InboundEvent::group(ChatId(-1), UserId(5), "Alex", "@bot hi", true).wants_reply());
    }

    #[test]
    fn blank_display_name_is_none() {
        assert_eq!(InboundEvent::private(UserId(1), "  ", "x").display_name(), None);
        assert_eq!(InboundEvent::private(UserId(1), " Sam ", "x").display_name(), Some("Sam"));
    }
}
