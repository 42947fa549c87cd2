//! Frames exchanged with the message broker.
//!
//! Every frame is a JSON text message shaped `{"event": ..., "data": ...}`;
//! payload keys are camelCase. The REST DTOs are reused for entity
//! payloads so both transports decode identically.

use serde::{Deserialize, Serialize};

use crate::rest::dto::{ChatDto, MessageDto};

/// Frames this client emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientFrame {
    /// Handshake: presented immediately after the socket opens.
    Authenticate { token: String },
    JoinUserRooms {
        user_id: String,
        chat_ids: Vec<String>,
    },
    JoinRoom { chat_id: String },
    LeaveRoom { chat_id: String },
    Typing {
        chat_id: String,
        user_id: String,
        is_typing: bool,
    },
    UpdateStatus { user_id: String, status: String },
}

/// Frames the broker pushes to this client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerFrame {
    /// Handshake accepted; carries the authenticated user's id.
    Authenticated { user_id: String },
    /// Handshake refused.
    Unauthorized { reason: String },
    NewMessage {
        message: MessageDto,
        chat_id: String,
    },
    ChatUpdated { chat: ChatDto },
    ChatRead { chat_id: String, user_id: String },
    UserTyping {
        chat_id: String,
        user_id: String,
        is_typing: bool,
    },
    UserStatusChanged { user_id: String, status: String },
}
