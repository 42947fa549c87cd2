use super::chat::Participant;

/// Delivery state of a timeline entry.
///
/// Client-generated temporary ids and server-assigned ids live in separate
/// variants, so the two id spaces can never collide and reconciliation is
/// always keyed by the temporary id, never by content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Appended optimistically, awaiting server confirmation.
    Pending { temp_id: String },
    /// Persisted by the server under a server-assigned id.
    Confirmed { server_id: String },
    /// Confirmation was rejected or never arrived.
    Failed { temp_id: String, reason: String },
}

impl Delivery {
    pub fn is_pending(&self) -> bool {
        matches!(self, Delivery::Pending { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Delivery::Failed { .. })
    }

    pub fn server_id(&self) -> Option<&str> {
        match self {
            Delivery::Confirmed { server_id } => Some(server_id),
            _ => None,
        }
    }

    pub fn temp_id(&self) -> Option<&str> {
        match self {
            Delivery::Pending { temp_id } | Delivery::Failed { temp_id, .. } => Some(temp_id),
            Delivery::Confirmed { .. } => None,
        }
    }
}

/// An atomic unit of communication within one chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub delivery: Delivery,
    pub chat_id: String,
    pub sender: Participant,
    pub content: String,
    /// Opaque attachment references; storage mechanics live elsewhere.
    pub attachments: Vec<String>,
    pub created_at_unix_ms: i64,
    pub updated_at_unix_ms: i64,
}

impl Message {
    pub fn is_from(&self, user_id: &str) -> bool {
        self.sender.id == user_id
    }

    /// Returns the directory preview text: attachment marker plus content,
    /// or just one of the two when the other is absent.
    pub fn preview(&self) -> String {
        match (self.attachments.is_empty(), self.content.is_empty()) {
            (false, true) => "[Attachment]".to_owned(),
            (false, false) => format!("[Attachment] {}", self.content),
            (true, _) => self.content.clone(),
        }
    }
}
