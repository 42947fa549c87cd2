use super::{
    chat::{Chat, LastMessage},
    message::Message,
};

/// Ordered collection of chats, keyed by id, most recent activity first.
///
/// Every mutation that counts as activity (a new message, a pushed chat
/// update, a newly created chat) moves the affected entry to the front;
/// the relative order of the other entries is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatDirectory {
    chats: Vec<Chat>,
}

impl ChatDirectory {
    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }

    pub fn get(&self, chat_id: &str) -> Option<&Chat> {
        self.chats.iter().find(|chat| chat.id == chat_id)
    }

    pub fn contains(&self, chat_id: &str) -> bool {
        self.get(chat_id).is_some()
    }

    /// Replaces the whole directory with a freshly fetched listing.
    pub fn replace_all(&mut self, chats: Vec<Chat>) {
        self.chats = chats;
    }

    /// Inserts a chat at the front; an existing entry with the same id is
    /// replaced rather than duplicated.
    pub fn insert_front(&mut self, chat: Chat) {
        self.chats.retain(|existing| existing.id != chat.id);
        self.chats.insert(0, chat);
    }

    pub fn remove(&mut self, chat_id: &str) -> Option<Chat> {
        let index = self.chats.iter().position(|chat| chat.id == chat_id)?;
        Some(self.chats.remove(index))
    }

    /// Refreshes an entry in place with freshly fetched state, without
    /// treating the refresh as activity (no reordering).
    pub fn refresh(&mut self, chat: Chat) -> bool {
        match self.chats.iter_mut().find(|existing| existing.id == chat.id) {
            Some(entry) => {
                *entry = chat;
                true
            }
            None => false,
        }
    }

    /// Applies pushed chat metadata and moves the entry to the front.
    pub fn apply_update(&mut self, chat: Chat) -> bool {
        if !self.contains(&chat.id) {
            return false;
        }
        self.insert_front(chat);
        true
    }

    /// Records a confirmed message: updates the owning chat's last-message
    /// snapshot and moves the chat to the front.
    pub fn record_message(&mut self, message: &Message) -> bool {
        let Some(index) = self
            .chats
            .iter()
            .position(|chat| chat.id == message.chat_id)
        else {
            return false;
        };

        let mut chat = self.chats.remove(index);
        chat.last_message = Some(LastMessage {
            message_id: message
                .delivery
                .server_id()
                .unwrap_or_default()
                .to_owned(),
            sender_id: message.sender.id.clone(),
            preview: message.preview(),
            sent_at_unix_ms: message.created_at_unix_ms,
        });
        chat.updated_at_unix_ms = chat.updated_at_unix_ms.max(message.created_at_unix_ms);
        self.chats.insert(0, chat);
        true
    }

    pub fn set_unread(&mut self, chat_id: &str, user_id: &str, count: u32) -> bool {
        match self.chats.iter_mut().find(|chat| chat.id == chat_id) {
            Some(chat) => {
                chat.unread_counts.insert(user_id.to_owned(), count);
                true
            }
            None => false,
        }
    }

    pub fn increment_unread(&mut self, chat_id: &str, user_id: &str) -> bool {
        match self.chats.iter_mut().find(|chat| chat.id == chat_id) {
            Some(chat) => {
                let counter = chat.unread_counts.entry(user_id.to_owned()).or_insert(0);
                *counter = counter.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Summed unread count for one user across all chats (the badge value).
    pub fn total_unread_for(&self, user_id: &str) -> u32 {
        self.chats
            .iter()
            .map(|chat| chat.unread_for(user_id))
            .fold(0, u32::saturating_add)
    }
}
