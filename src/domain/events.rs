use super::{chat::Chat, message::Message};

/// Connection lifecycle of the realtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Push payload: a message was appended to a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessagePush {
    pub chat_id: String,
    pub message: Message,
}

/// Push payload: a chat's metadata changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUpdatedPush {
    pub chat: Chat,
}

/// Push payload: a participant acknowledged a chat as read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReadPush {
    pub chat_id: String,
    pub user_id: String,
}

/// Ephemeral typing indicator; last value wins at the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingUpdate {
    pub chat_id: String,
    pub user_id: String,
    pub is_typing: bool,
}

/// Ephemeral presence change; the status string is broker-defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceUpdate {
    pub user_id: String,
    pub status: String,
}

/// All inbound push events the realtime channel dispatches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeEvent {
    NewMessage(NewMessagePush),
    ChatUpdated(ChatUpdatedPush),
    ChatRead(ChatReadPush),
    Typing(TypingUpdate),
    PresenceChange(PresenceUpdate),
}

/// Events the session store forwards verbatim without persisting state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EphemeralEvent {
    Typing(TypingUpdate),
    Presence(PresenceUpdate),
}
