use std::collections::HashMap;

/// Per-chat read clocks for the current user.
///
/// Unread derivation receives three independent signals — selecting a chat
/// locally, a pushed read receipt, and a pushed foreign message — and they
/// may arrive in any order. The tracker keeps, per chat, when the user
/// last marked the thread read and when the newest foreign message was
/// authored, so the derived state converges to the same answer regardless
/// of arrival order: unread is zero iff the read marker is at least as
/// recent as the newest foreign message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadStateTracker {
    clocks: HashMap<String, ReadClock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct ReadClock {
    last_read_unix_ms: i64,
    last_foreign_unix_ms: i64,
}

impl ReadStateTracker {
    /// Records a read-marking action (local selection or a read receipt
    /// for the current user) at the given instant.
    pub fn note_read(&mut self, chat_id: &str, at_unix_ms: i64) {
        let clock = self.clocks.entry(chat_id.to_owned()).or_default();
        clock.last_read_unix_ms = clock.last_read_unix_ms.max(at_unix_ms);
    }

    /// Records a message not authored by the current user. Returns true
    /// when the message is newer than the last read marker, i.e. it should
    /// count towards the unread total.
    pub fn note_foreign_message(&mut self, chat_id: &str, authored_at_unix_ms: i64) -> bool {
        let clock = self.clocks.entry(chat_id.to_owned()).or_default();
        clock.last_foreign_unix_ms = clock.last_foreign_unix_ms.max(authored_at_unix_ms);
        authored_at_unix_ms > clock.last_read_unix_ms
    }

    /// True when the most recent read marker is no earlier than the most
    /// recent foreign message for the chat.
    pub fn is_caught_up(&self, chat_id: &str) -> bool {
        self.clocks
            .get(chat_id)
            .map(|clock| clock.last_read_unix_ms >= clock.last_foreign_unix_ms)
            .unwrap_or(true)
    }

    pub fn forget(&mut self, chat_id: &str) {
        self.clocks.remove(chat_id);
    }
}
