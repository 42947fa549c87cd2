//! Shared fixtures and the scripted backend stub used across session
//! tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::domain::{
    chat::{Chat, Participant},
    identity::UserIdentity,
    message::{Delivery, Message},
};
use crate::rest::error::ApiError;
use crate::session::backend::MessagingBackend;

pub fn identity(id: &str) -> UserIdentity {
    UserIdentity {
        id: id.to_owned(),
        display_name: id.to_uppercase(),
        avatar_url: None,
    }
}

pub fn participant(id: &str) -> Participant {
    Participant {
        id: id.to_owned(),
        display_name: id.to_uppercase(),
        avatar_url: None,
    }
}

pub fn chat_between(chat_id: &str, a: &str, b: &str) -> Chat {
    Chat {
        id: chat_id.to_owned(),
        participants: vec![participant(a), participant(b)],
        product: None,
        last_message: None,
        unread_counts: HashMap::from([(a.to_owned(), 0), (b.to_owned(), 0)]),
        created_at_unix_ms: 1_000,
        updated_at_unix_ms: 1_000,
    }
}

pub fn unread_entry(mut chat: Chat, user_id: &str, count: u32) -> Chat {
    chat.unread_counts.insert(user_id.to_owned(), count);
    chat
}

pub fn confirmed_message(
    server_id: &str,
    chat_id: &str,
    sender_id: &str,
    content: &str,
    at_unix_ms: i64,
) -> Message {
    Message {
        delivery: Delivery::Confirmed {
            server_id: server_id.to_owned(),
        },
        chat_id: chat_id.to_owned(),
        sender: participant(sender_id),
        content: content.to_owned(),
        attachments: vec![],
        created_at_unix_ms: at_unix_ms,
        updated_at_unix_ms: at_unix_ms,
    }
}

/// Backend stub with per-operation scripted results, a call log, and
/// optional gates that hold a call open until the test releases it.
#[derive(Default)]
pub struct StubBackend {
    list_chats_results: Mutex<VecDeque<Result<Vec<Chat>, ApiError>>>,
    get_chat_results: Mutex<VecDeque<Result<Chat, ApiError>>>,
    get_messages_results: Mutex<VecDeque<Result<Vec<Message>, ApiError>>>,
    create_chat_results: Mutex<VecDeque<Result<Chat, ApiError>>>,
    send_results: Mutex<VecDeque<Result<Message, ApiError>>>,
    delete_results: Mutex<VecDeque<Result<(), ApiError>>>,
    call_log: Mutex<Vec<String>>,
    send_gate: Mutex<Option<Arc<Notify>>>,
    message_gates: Mutex<HashMap<String, Arc<Notify>>>,
}

impl StubBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script_list_chats(&self, result: Result<Vec<Chat>, ApiError>) {
        self.list_chats_results
            .lock()
            .expect("stub lock")
            .push_back(result);
    }

    pub fn script_get_chat(&self, result: Result<Chat, ApiError>) {
        self.get_chat_results
            .lock()
            .expect("stub lock")
            .push_back(result);
    }

    pub fn script_get_messages(&self, result: Result<Vec<Message>, ApiError>) {
        self.get_messages_results
            .lock()
            .expect("stub lock")
            .push_back(result);
    }

    pub fn script_create_chat(&self, result: Result<Chat, ApiError>) {
        self.create_chat_results
            .lock()
            .expect("stub lock")
            .push_back(result);
    }

    pub fn script_send(&self, result: Result<Message, ApiError>) {
        self.send_results
            .lock()
            .expect("stub lock")
            .push_back(result);
    }

    pub fn script_delete(&self, result: Result<(), ApiError>) {
        self.delete_results
            .lock()
            .expect("stub lock")
            .push_back(result);
    }

    /// Holds every subsequent `send_message` call until the returned gate
    /// is notified (one permit per call).
    pub fn gate_send(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.send_gate.lock().expect("stub lock") = Some(Arc::clone(&gate));
        gate
    }

    /// Holds `get_messages` calls for one chat until the returned gate is
    /// notified.
    pub fn gate_messages(&self, chat_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.message_gates
            .lock()
            .expect("stub lock")
            .insert(chat_id.to_owned(), Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.call_log.lock().expect("stub lock").clone()
    }

    fn record(&self, call: String) {
        self.call_log.lock().expect("stub lock").push(call);
    }

    fn next<T>(
        queue: &Mutex<VecDeque<Result<T, ApiError>>>,
        operation: &str,
    ) -> Result<T, ApiError> {
        queue
            .lock()
            .expect("stub lock")
            .pop_front()
            .unwrap_or_else(|| {
                Err(ApiError::NotFound(format!(
                    "stub: no scripted result for {operation}"
                )))
            })
    }
}

#[async_trait]
impl MessagingBackend for StubBackend {
    async fn list_chats(&self) -> Result<Vec<Chat>, ApiError> {
        self.record("list_chats".to_owned());
        Self::next(&self.list_chats_results, "list_chats")
    }

    async fn get_chat(&self, chat_id: &str) -> Result<Chat, ApiError> {
        self.record(format!("get_chat {chat_id}"));
        Self::next(&self.get_chat_results, "get_chat")
    }

    async fn get_messages(&self, chat_id: &str) -> Result<Vec<Message>, ApiError> {
        self.record(format!("get_messages {chat_id}"));
        let gate = self
            .message_gates
            .lock()
            .expect("stub lock")
            .get(chat_id)
            .cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Self::next(&self.get_messages_results, "get_messages")
    }

    async fn create_chat(
        &self,
        receiver_id: &str,
        product_id: Option<&str>,
    ) -> Result<Chat, ApiError> {
        match product_id {
            Some(product_id) => self.record(format!("create_chat {receiver_id} {product_id}")),
            None => self.record(format!("create_chat {receiver_id}")),
        }
        Self::next(&self.create_chat_results, "create_chat")
    }

    async fn send_message(
        &self,
        chat_id: &str,
        content: &str,
        attachments: &[String],
    ) -> Result<Message, ApiError> {
        if attachments.is_empty() {
            self.record(format!("send_message {chat_id} {content}"));
        } else {
            self.record(format!(
                "send_message {chat_id} {content} [{}]",
                attachments.join(",")
            ));
        }
        let gate = self.send_gate.lock().expect("stub lock").clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Self::next(&self.send_results, "send_message")
    }

    async fn mark_read(&self, chat_id: &str) -> Result<(), ApiError> {
        self.record(format!("mark_read {chat_id}"));
        Ok(())
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<(), ApiError> {
        self.record(format!("delete_chat {chat_id}"));
        Self::next(&self.delete_results, "delete_chat")
    }
}
