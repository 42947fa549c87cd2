//! Optimistic send and reconciliation for the session store.
//!
//! A send appends a provisional entry immediately, issues the REST call,
//! and either swaps the confirmation in at the same position or rolls the
//! entry back into the failed-send slot. Reconciliation is keyed by the
//! client-generated temporary id, never by content; content matching is
//! only used to drop the push copy of a send racing its own confirmation.

use uuid::Uuid;

use crate::domain::{
    chat::Participant,
    message::{Delivery, Message},
    now_unix_ms,
};
use crate::session::backend::MessagingBackend;
use crate::session::store::{ChatSessionStore, StoreError};

const SESSION_SEND_FAILED: &str = "SESSION_SEND_FAILED";

impl<B: MessagingBackend> ChatSessionStore<B> {
    /// Sends a message on the currently selected chat.
    ///
    /// Rejects immediately, without touching session state, when no chat is
    /// selected or the trimmed content is empty. Otherwise a pending entry
    /// with a fresh temporary id is appended before the REST call is
    /// issued, and reconciled when it resolves.
    pub async fn send_message(
        &self,
        content: &str,
        attachments: Vec<String>,
    ) -> Result<(), StoreError> {
        let text = content.trim();
        if text.is_empty() {
            return Err(StoreError::EmptyMessage);
        }

        let (temp_id, draft) = {
            let mut state = self.locked();
            let Some(chat_id) = state.selection.ready_chat_id().map(str::to_owned) else {
                return Err(StoreError::NoChatSelected);
            };

            let temp_id = format!("local-{}", Uuid::new_v4());
            let now = now_unix_ms();
            let user = self.user();
            let draft = Message {
                delivery: Delivery::Pending {
                    temp_id: temp_id.clone(),
                },
                chat_id,
                sender: Participant {
                    id: user.id.clone(),
                    display_name: user.display_name.clone(),
                    avatar_url: user.avatar_url.clone(),
                },
                content: text.to_owned(),
                attachments,
                created_at_unix_ms: now,
                updated_at_unix_ms: now,
            };
            state.timeline.append(draft.clone());
            (temp_id, draft)
        };

        self.dispatch_send(temp_id, draft).await
    }

    /// Re-runs the pipeline for the parked failed send, re-appending it as
    /// pending when its chat is still the selected one.
    pub async fn resend_failed(&self) -> Result<(), StoreError> {
        let (temp_id, draft) = {
            let mut state = self.locked();
            let Some(parked) = state.failed_send.take() else {
                return Err(StoreError::NoFailedSend);
            };
            let Some(temp_id) = parked.delivery.temp_id().map(str::to_owned) else {
                return Err(StoreError::NoFailedSend);
            };

            let now = now_unix_ms();
            let mut draft = parked;
            draft.delivery = Delivery::Pending {
                temp_id: temp_id.clone(),
            };
            draft.created_at_unix_ms = now;
            draft.updated_at_unix_ms = now;
            if state.timeline.chat_id() == Some(draft.chat_id.as_str()) {
                state.timeline.append(draft.clone());
            }
            (temp_id, draft)
        };

        self.dispatch_send(temp_id, draft).await
    }

    /// Drops the parked failed send and returns it.
    pub fn discard_failed(&self) -> Result<Message, StoreError> {
        self.locked()
            .failed_send
            .take()
            .ok_or(StoreError::NoFailedSend)
    }

    async fn dispatch_send(&self, temp_id: String, draft: Message) -> Result<(), StoreError> {
        let result = self
            .backend()
            .send_message(&draft.chat_id, &draft.content, &draft.attachments)
            .await;

        match result {
            Ok(confirmed) => {
                let mut state = self.locked();
                let already_present = confirmed
                    .delivery
                    .server_id()
                    .is_some_and(|id| state.timeline.contains_server_id(id));
                if already_present {
                    // The broker echo slipped in behind an interleaved
                    // foreign message, so the tail probe let it through;
                    // drop the pending entry rather than confirm a second
                    // copy.
                    state.timeline.extract_pending(&temp_id);
                } else {
                    // Replace by temporary id, preserving position. A false
                    // return means the selection changed mid-flight and the
                    // pending entry is gone with the old timeline.
                    state.timeline.confirm(&temp_id, confirmed.clone());
                }
                state.directory.record_message(&confirmed);
                state.last_error = None;
                Ok(())
            }
            Err(error) => {
                let mut state = self.locked();
                let mut parked = state
                    .timeline
                    .extract_pending(&temp_id)
                    .unwrap_or(draft);
                parked.delivery = Delivery::Failed {
                    temp_id,
                    reason: error.to_string(),
                };
                let chat_id = parked.chat_id.clone();
                state.failed_send = Some(parked);
                let error = StoreError::from(error);
                state.last_error = Some(error.clone());
                tracing::warn!(
                    code = SESSION_SEND_FAILED,
                    chat_id = %chat_id,
                    error = %error,
                    "optimistic send failed; pending entry rolled back"
                );
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::domain::events::{NewMessagePush, RealtimeEvent};
    use crate::domain::message::Delivery;
    use crate::rest::error::ApiError;
    use crate::session::store::{ChatSessionStore, StoreError};
    use crate::test_support::{chat_between, confirmed_message, identity, StubBackend};

    async fn ready_store(backend: Arc<StubBackend>) -> Arc<ChatSessionStore<Arc<StubBackend>>> {
        backend.script_list_chats(Ok(vec![chat_between("a", "u1", "u2")]));
        backend.script_get_chat(Ok(chat_between("a", "u1", "u2")));
        backend.script_get_messages(Ok(vec![]));
        let store = Arc::new(ChatSessionStore::new(backend, identity("u1")));
        store.load_chats().await.expect("directory must load");
        store.select_chat("a").await.expect("selection must load");
        store
    }

    #[tokio::test]
    async fn send_appends_pending_then_swaps_in_the_confirmation() {
        let backend = StubBackend::new();
        let store = ready_store(Arc::clone(&backend)).await;
        store.apply_event(RealtimeEvent::NewMessage(NewMessagePush {
            chat_id: "a".to_owned(),
            message: confirmed_message("m1", "a", "u2", "earlier", 1_000),
        }));
        backend.script_send(Ok(confirmed_message("srv-9", "a", "u1", "hello", 9_000)));
        let gate = backend.gate_send();

        let in_flight = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.send_message("hello", vec![]).await }
        });
        tokio::task::yield_now().await;

        // Optimistic feedback: the pending entry is visible immediately.
        let pending = store.timeline();
        assert_eq!(pending.len(), 2);
        assert!(pending[1].delivery.is_pending());
        assert_eq!(pending[1].content, "hello");

        gate.notify_one();
        in_flight
            .await
            .expect("task must join")
            .expect("send must succeed");

        let confirmed = store.timeline();
        assert_eq!(confirmed.len(), 2);
        assert_eq!(confirmed[1].delivery.server_id(), Some("srv-9"));
        assert!(!confirmed.iter().any(|m| m.delivery.is_pending()));
        let snapshot = store.chats()[0].last_message.clone().expect("snapshot set");
        assert_eq!(snapshot.preview, "hello");
    }

    #[tokio::test]
    async fn failed_send_restores_the_timeline_and_parks_the_message() {
        let backend = StubBackend::new();
        let store = ready_store(Arc::clone(&backend)).await;
        backend.script_send(Err(ApiError::NetworkFailure("reset by peer".to_owned())));

        let error = store
            .send_message("hello", vec![])
            .await
            .expect_err("send must fail");

        assert!(matches!(
            error,
            StoreError::Api(ApiError::NetworkFailure(_))
        ));
        assert!(store.timeline().is_empty());
        assert_eq!(store.last_error(), Some(error));
        let parked = store.failed_send().expect("failed send parked");
        assert!(parked.delivery.is_failed());
        assert_eq!(parked.content, "hello");
    }

    #[tokio::test]
    async fn send_without_selection_rejects_without_state_change() {
        let backend = StubBackend::new();
        let store = ChatSessionStore::new(Arc::clone(&backend), identity("u1"));

        let error = store
            .send_message("hello", vec![])
            .await
            .expect_err("must reject");

        assert_eq!(error, StoreError::NoChatSelected);
        assert!(store.timeline().is_empty());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn whitespace_only_content_rejects_without_state_change() {
        let backend = StubBackend::new();
        let store = ready_store(Arc::clone(&backend)).await;
        let calls_before = backend.calls().len();

        let error = store
            .send_message("   \n\t ", vec![])
            .await
            .expect_err("must reject");

        assert_eq!(error, StoreError::EmptyMessage);
        assert!(store.timeline().is_empty());
        assert_eq!(backend.calls().len(), calls_before);
    }

    #[tokio::test]
    async fn content_is_trimmed_before_sending() {
        let backend = StubBackend::new();
        let store = ready_store(Arc::clone(&backend)).await;
        backend.script_send(Ok(confirmed_message("srv-1", "a", "u1", "hi", 9_000)));

        store
            .send_message("  hi  ", vec![])
            .await
            .expect("send must succeed");

        assert!(backend.calls().contains(&"send_message a hi".to_owned()));
    }

    #[tokio::test]
    async fn racing_push_for_the_same_send_never_duplicates() {
        let backend = StubBackend::new();
        let store = ready_store(Arc::clone(&backend)).await;
        backend.script_send(Ok(confirmed_message("srv-2", "a", "u1", "hello", 9_000)));
        let gate = backend.gate_send();

        let in_flight = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.send_message("hello", vec![]).await }
        });
        tokio::task::yield_now().await;

        // The broker echoes the same logical message before the REST
        // response resolves.
        store.apply_event(RealtimeEvent::NewMessage(NewMessagePush {
            chat_id: "a".to_owned(),
            message: confirmed_message("srv-2", "a", "u1", "hello", 9_000),
        }));

        gate.notify_one();
        in_flight
            .await
            .expect("task must join")
            .expect("send must succeed");

        let timeline = store.timeline();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].delivery.server_id(), Some("srv-2"));
    }

    #[tokio::test]
    async fn echo_behind_an_interleaved_foreign_message_still_yields_one_copy() {
        let backend = StubBackend::new();
        let store = ready_store(Arc::clone(&backend)).await;
        backend.script_send(Ok(confirmed_message("srv-4", "a", "u1", "hello", 9_000)));
        let gate = backend.gate_send();

        let in_flight = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.send_message("hello", vec![]).await }
        });
        tokio::task::yield_now().await;

        // A foreign message slips in behind the pending entry, so the tail
        // probe cannot recognize the echoed copy of the send when it lands.
        store.apply_event(RealtimeEvent::NewMessage(NewMessagePush {
            chat_id: "a".to_owned(),
            message: confirmed_message("m8", "a", "u2", "wait", 9_050),
        }));
        store.apply_event(RealtimeEvent::NewMessage(NewMessagePush {
            chat_id: "a".to_owned(),
            message: confirmed_message("srv-4", "a", "u1", "hello", 9_100),
        }));

        gate.notify_one();
        in_flight
            .await
            .expect("task must join")
            .expect("send must succeed");

        let timeline = store.timeline();
        let copies = timeline
            .iter()
            .filter(|m| m.delivery.server_id() == Some("srv-4"))
            .count();
        assert_eq!(copies, 1);
        assert!(!timeline.iter().any(|m| m.delivery.is_pending()));
    }

    #[tokio::test]
    async fn an_unrelated_foreign_push_still_lands_during_a_send() {
        let backend = StubBackend::new();
        let store = ready_store(Arc::clone(&backend)).await;
        backend.script_send(Ok(confirmed_message("srv-3", "a", "u1", "hello", 9_000)));
        let gate = backend.gate_send();

        let in_flight = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.send_message("hello", vec![]).await }
        });
        tokio::task::yield_now().await;

        store.apply_event(RealtimeEvent::NewMessage(NewMessagePush {
            chat_id: "a".to_owned(),
            message: confirmed_message("m7", "a", "u2", "unrelated", 9_100),
        }));

        gate.notify_one();
        in_flight
            .await
            .expect("task must join")
            .expect("send must succeed");

        let contents: Vec<String> = store.timeline().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["hello", "unrelated"]);
    }

    #[tokio::test]
    async fn resend_failed_reruns_the_pipeline() {
        let backend = StubBackend::new();
        let store = ready_store(Arc::clone(&backend)).await;
        backend.script_send(Err(ApiError::NetworkFailure("reset".to_owned())));
        backend.script_send(Ok(confirmed_message("srv-5", "a", "u1", "hello", 9_000)));

        store
            .send_message("hello", vec![])
            .await
            .expect_err("first attempt fails");
        store.resend_failed().await.expect("resend must succeed");

        let timeline = store.timeline();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].delivery.server_id(), Some("srv-5"));
        assert_eq!(store.failed_send(), None);
    }

    #[tokio::test]
    async fn discard_failed_clears_the_slot() {
        let backend = StubBackend::new();
        let store = ready_store(Arc::clone(&backend)).await;
        backend.script_send(Err(ApiError::ServerError {
            status: 500,
            message: "boom".to_owned(),
        }));
        store
            .send_message("hello", vec![])
            .await
            .expect_err("send must fail");

        let discarded = store.discard_failed().expect("slot must hold the send");
        assert!(matches!(discarded.delivery, Delivery::Failed { .. }));

        assert_eq!(store.discard_failed(), Err(StoreError::NoFailedSend));
        assert_eq!(store.failed_send(), None);
    }

    #[tokio::test]
    async fn attachments_are_carried_through_the_pipeline() {
        let backend = StubBackend::new();
        let store = ready_store(Arc::clone(&backend)).await;
        backend.script_send(Ok(confirmed_message("srv-6", "a", "u1", "look", 9_000)));

        store
            .send_message("look", vec!["att-1".to_owned()])
            .await
            .expect("send must succeed");

        assert!(backend
            .calls()
            .contains(&"send_message a look [att-1]".to_owned()));
    }
}
