use std::collections::HashMap;

/// One side of a buyer/seller conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Listing lifecycle as reported by the catalog service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductStatus {
    #[default]
    Active,
    Reserved,
    Sold,
    Removed,
    /// Catalog reported a status this client version does not know.
    Unknown,
}

impl ProductStatus {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "active" => Self::Active,
            "reserved" => Self::Reserved,
            "sold" => Self::Sold,
            "removed" => Self::Removed,
            _ => Self::Unknown,
        }
    }
}

/// Summary of the product listing a chat is anchored to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSummary {
    pub id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    /// Price in minor currency units.
    pub price_cents: i64,
    pub status: ProductStatus,
}

/// Snapshot of the newest confirmed message in a chat, kept on the chat so
/// the directory can render previews without loading timelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastMessage {
    pub message_id: String,
    pub sender_id: String,
    pub preview: String,
    pub sent_at_unix_ms: i64,
}

/// A thread between exactly two participants, optionally anchored to one
/// product listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub id: String,
    /// Always exactly two distinct participants; enforced when decoding
    /// server payloads.
    pub participants: Vec<Participant>,
    pub product: Option<ProductSummary>,
    pub last_message: Option<LastMessage>,
    /// Unread counter per participant id; holds an entry for every
    /// participant of the chat.
    pub unread_counts: HashMap<String, u32>,
    pub created_at_unix_ms: i64,
    pub updated_at_unix_ms: i64,
}

impl Chat {
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p.id == user_id)
    }

    /// The other side of the conversation, from `user_id`'s point of view.
    pub fn counterpart(&self, user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id != user_id)
    }

    pub fn unread_for(&self, user_id: &str) -> u32 {
        self.unread_counts.get(user_id).copied().unwrap_or(0)
    }

    /// Timestamp of the most recent activity, used for directory ordering.
    pub fn activity_unix_ms(&self) -> i64 {
        self.last_message
            .as_ref()
            .map(|last| last.sent_at_unix_ms)
            .unwrap_or(self.updated_at_unix_ms)
    }
}
