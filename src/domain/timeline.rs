use super::message::Message;

/// Append-ordered message sequence for the currently selected chat.
///
/// Holds messages for at most one chat at a time; selecting a new chat
/// replaces the whole container. Ordering is local operation order, not
/// server timestamps: an optimistic append keeps its position when the
/// confirmation later replaces it in place.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageTimeline {
    chat_id: Option<String>,
    messages: Vec<Message>,
}

impl MessageTimeline {
    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Replaces the timeline with another chat's history.
    pub fn reset(&mut self, chat_id: impl Into<String>, messages: Vec<Message>) {
        self.chat_id = Some(chat_id.into());
        self.messages = messages;
    }

    pub fn clear(&mut self) {
        self.chat_id = None;
        self.messages.clear();
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Replaces the pending entry with the confirmed server message,
    /// preserving its position. Returns false when no entry with that
    /// temporary id is present (e.g. the selection changed mid-flight).
    pub fn confirm(&mut self, temp_id: &str, confirmed: Message) -> bool {
        match self.position_of_temp(temp_id) {
            Some(index) => {
                self.messages[index] = confirmed;
                true
            }
            None => false,
        }
    }

    /// Removes and returns the entry with the given temporary id.
    pub fn extract_pending(&mut self, temp_id: &str) -> Option<Message> {
        let index = self.position_of_temp(temp_id)?;
        Some(self.messages.remove(index))
    }

    /// True when the tail is a pending message from `sender_id` with this
    /// exact content — the probe used to drop a racing push copy of an
    /// optimistic send.
    pub fn pending_tail_matches(&self, sender_id: &str, content: &str) -> bool {
        self.messages.last().is_some_and(|last| {
            last.delivery.is_pending() && last.sender.id == sender_id && last.content == content
        })
    }

    /// True when a confirmed entry with this server id already exists.
    pub fn contains_server_id(&self, server_id: &str) -> bool {
        self.messages
            .iter()
            .any(|message| message.delivery.server_id() == Some(server_id))
    }

    fn position_of_temp(&self, temp_id: &str) -> Option<usize> {
        self.messages
            .iter()
            .position(|message| message.delivery.temp_id() == Some(temp_id))
    }
}
