use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::domain::{
    chat::Chat,
    directory::ChatDirectory,
    events::{
        ChatReadPush, ChatUpdatedPush, EphemeralEvent, NewMessagePush, PresenceUpdate,
        RealtimeEvent, TypingUpdate,
    },
    identity::UserIdentity,
    message::Message,
    now_unix_ms,
    timeline::MessageTimeline,
};
use crate::realtime::{channel::RealtimeChannel, listeners::Subscription};
use crate::rest::error::ApiError;
use crate::session::{backend::MessagingBackend, read_state::ReadStateTracker};

const SESSION_MARK_READ_FAILED: &str = "SESSION_MARK_READ_FAILED";
const SESSION_STALE_SELECTION_DROPPED: &str = "SESSION_STALE_SELECTION_DROPPED";
const SESSION_PUSH_FOR_UNKNOWN_CHAT: &str = "SESSION_PUSH_FOR_UNKNOWN_CHAT";

/// Failure surfaced by a session store operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no chat is selected")]
    NoChatSelected,
    #[error("message content is empty")]
    EmptyMessage,
    #[error("no failed send to act on")]
    NoFailedSend,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Selection state machine for the active thread. At most one chat is
/// `Loading` or `Ready` at any time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    Unselected,
    Loading { chat_id: String },
    Ready { chat_id: String },
    Error { chat_id: String },
}

impl Selection {
    /// The chat id when a thread is fully loaded.
    pub fn ready_chat_id(&self) -> Option<&str> {
        match self {
            Selection::Ready { chat_id } => Some(chat_id),
            _ => None,
        }
    }

    /// The chat id the selection currently refers to, in any state.
    pub fn chat_id(&self) -> Option<&str> {
        match self {
            Selection::Unselected => None,
            Selection::Loading { chat_id }
            | Selection::Ready { chat_id }
            | Selection::Error { chat_id } => Some(chat_id),
        }
    }
}

#[derive(Debug, Default)]
pub(super) struct SessionState {
    pub(super) directory: ChatDirectory,
    pub(super) timeline: MessageTimeline,
    pub(super) selection: Selection,
    /// Bumped on every selection change; an in-flight load commits its
    /// result only when the epoch it captured is still current.
    pub(super) selection_epoch: u64,
    pub(super) loading_chats: bool,
    pub(super) last_error: Option<StoreError>,
    pub(super) failed_send: Option<Message>,
    pub(super) read_tracker: ReadStateTracker,
}

/// Authoritative in-memory session state: the chat directory, the active
/// thread's timeline, and the locally known user identity.
///
/// The store is the only component allowed to mutate this state. All
/// mutation happens in short synchronous sections behind one mutex that is
/// never held across an await, so in-flight REST calls and push events may
/// interleave freely without a hung request blocking other operations.
pub struct ChatSessionStore<B> {
    backend: B,
    current_user: UserIdentity,
    state: Mutex<SessionState>,
    ephemeral_subscribers: Mutex<Vec<mpsc::Sender<EphemeralEvent>>>,
}

impl<B: MessagingBackend> ChatSessionStore<B> {
    pub fn new(backend: B, current_user: UserIdentity) -> Self {
        Self {
            backend,
            current_user,
            state: Mutex::new(SessionState::default()),
            ephemeral_subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn current_user(&self) -> &UserIdentity {
        &self.current_user
    }

    pub fn chats(&self) -> Vec<Chat> {
        self.locked().directory.chats().to_vec()
    }

    pub fn timeline(&self) -> Vec<Message> {
        self.locked().timeline.messages().to_vec()
    }

    pub fn selection(&self) -> Selection {
        self.locked().selection.clone()
    }

    pub fn selected_chat_id(&self) -> Option<String> {
        self.locked().selection.ready_chat_id().map(str::to_owned)
    }

    pub fn is_loading_chats(&self) -> bool {
        self.locked().loading_chats
    }

    pub fn last_error(&self) -> Option<StoreError> {
        self.locked().last_error.clone()
    }

    /// The most recent optimistic send that failed, if any; see
    /// [`ChatSessionStore::resend_failed`] and
    /// [`ChatSessionStore::discard_failed`].
    pub fn failed_send(&self) -> Option<Message> {
        self.locked().failed_send.clone()
    }

    /// Summed unread count for the current user across all chats.
    pub fn total_unread(&self) -> u32 {
        self.locked().directory.total_unread_for(&self.current_user.id)
    }

    /// Ids of every chat in the directory; the room set to join after
    /// (re)connecting the realtime channel.
    pub fn chat_room_ids(&self) -> Vec<String> {
        self.locked()
            .directory
            .chats()
            .iter()
            .map(|chat| chat.id.clone())
            .collect()
    }

    /// Fetches the chat directory, replacing it wholesale on success. On
    /// failure the previous directory is preserved and the error recorded.
    pub async fn load_chats(&self) -> Result<(), StoreError> {
        self.locked().loading_chats = true;

        let result = self.backend.list_chats().await;

        let mut state = self.locked();
        state.loading_chats = false;
        match result {
            Ok(chats) => {
                state.directory.replace_all(chats);
                state.last_error = None;
                Ok(())
            }
            Err(error) => {
                let error = StoreError::from(error);
                state.last_error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Loads one thread: fetches chat and history concurrently, replaces
    /// the timeline, then marks the chat read (optimistically zeroing the
    /// local unread entry before the mark-read call resolves).
    ///
    /// Selecting another chat while a load is in flight cancels interest in
    /// the stale result: the late response is discarded by comparing the
    /// selection epoch at resolution time.
    pub async fn select_chat(&self, chat_id: &str) -> Result<(), StoreError> {
        let epoch = {
            let mut state = self.locked();
            state.selection_epoch += 1;
            state.selection = Selection::Loading {
                chat_id: chat_id.to_owned(),
            };
            state.timeline.clear();
            state.selection_epoch
        };

        let (chat_result, messages_result) = tokio::join!(
            self.backend.get_chat(chat_id),
            self.backend.get_messages(chat_id)
        );
        let loaded = chat_result.and_then(|chat| messages_result.map(|messages| (chat, messages)));

        {
            let mut state = self.locked();
            if state.selection_epoch != epoch {
                tracing::debug!(
                    code = SESSION_STALE_SELECTION_DROPPED,
                    chat_id,
                    "discarding load result for a superseded selection"
                );
                return Ok(());
            }

            match loaded {
                Ok((chat, messages)) => {
                    state.timeline.reset(chat_id, messages);
                    if state.directory.contains(chat_id) {
                        state.directory.refresh(chat);
                    } else {
                        state.directory.insert_front(chat);
                    }
                    state.selection = Selection::Ready {
                        chat_id: chat_id.to_owned(),
                    };
                    state.read_tracker.note_read(chat_id, now_unix_ms());
                    state.directory.set_unread(chat_id, &self.current_user.id, 0);
                    state.last_error = None;
                }
                Err(error) => {
                    let error = StoreError::from(error);
                    state.selection = Selection::Error {
                        chat_id: chat_id.to_owned(),
                    };
                    state.last_error = Some(error.clone());
                    return Err(error);
                }
            }
        }

        if let Err(error) = self.backend.mark_read(chat_id).await {
            tracing::warn!(
                code = SESSION_MARK_READ_FAILED,
                chat_id,
                error = %error,
                "mark-read call failed; keeping the optimistic zero"
            );
        }
        Ok(())
    }

    /// Creates (or finds) the chat with `receiver_id`, prepends it to the
    /// directory, and selects it with an empty timeline. Returns the chat
    /// id.
    pub async fn create_chat(
        &self,
        receiver_id: &str,
        product_id: Option<&str>,
    ) -> Result<String, StoreError> {
        match self.backend.create_chat(receiver_id, product_id).await {
            Ok(chat) => {
                let mut state = self.locked();
                let chat_id = chat.id.clone();
                state.selection_epoch += 1;
                state.directory.insert_front(chat);
                state.selection = Selection::Ready {
                    chat_id: chat_id.clone(),
                };
                state.timeline.reset(chat_id.clone(), Vec::new());
                state.last_error = None;
                Ok(chat_id)
            }
            Err(error) => {
                let error = StoreError::from(error);
                self.locked().last_error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Deletes the chat for the caller, removes it from the directory, and
    /// clears the selection when the deleted chat was the active one.
    pub async fn delete_chat(&self, chat_id: &str) -> Result<(), StoreError> {
        if let Err(error) = self.backend.delete_chat(chat_id).await {
            let error = StoreError::from(error);
            self.locked().last_error = Some(error.clone());
            return Err(error);
        }

        let mut state = self.locked();
        state.directory.remove(chat_id);
        state.read_tracker.forget(chat_id);
        if state.selection.chat_id() == Some(chat_id) {
            state.selection_epoch += 1;
            state.selection = Selection::Unselected;
            state.timeline.clear();
        }
        state.last_error = None;
        Ok(())
    }

    /// Returns the active thread to `Unselected` and drops its timeline.
    pub fn deselect(&self) {
        let mut state = self.locked();
        state.selection_epoch += 1;
        state.selection = Selection::Unselected;
        state.timeline.clear();
    }

    /// Applies one inbound push event to session state.
    pub fn apply_event(&self, event: RealtimeEvent) {
        match event {
            RealtimeEvent::NewMessage(push) => self.apply_new_message(push),
            RealtimeEvent::ChatUpdated(push) => self.apply_chat_updated(push),
            RealtimeEvent::ChatRead(push) => self.apply_chat_read(push),
            RealtimeEvent::Typing(update) => self.forward_ephemeral(EphemeralEvent::Typing(update)),
            RealtimeEvent::PresenceChange(update) => {
                self.forward_ephemeral(EphemeralEvent::Presence(update))
            }
        }
    }

    /// Subscribes to typing/presence events the store forwards verbatim.
    pub fn subscribe_ephemeral(&self) -> mpsc::Receiver<EphemeralEvent> {
        let (tx, rx) = mpsc::channel();
        self.ephemeral_locked().push(tx);
        rx
    }

    fn apply_new_message(&self, push: NewMessagePush) {
        let now = now_unix_ms();
        let mut state = self.locked();
        let NewMessagePush { chat_id, message } = push;

        let selected =
            matches!(&state.selection, Selection::Ready { chat_id: current } if *current == chat_id);

        if selected && state.timeline.chat_id() == Some(chat_id.as_str()) {
            let duplicate_confirmed = message
                .delivery
                .server_id()
                .is_some_and(|id| state.timeline.contains_server_id(id));
            // A pending tail from the current user with identical content is
            // this send's own push racing its REST confirmation; the REST
            // response is the sole source of truth, so the push copy is
            // dropped.
            let racing_own_send = message.is_from(&self.current_user.id)
                && state
                    .timeline
                    .pending_tail_matches(&self.current_user.id, &message.content);
            if !duplicate_confirmed && !racing_own_send {
                state.timeline.append(message.clone());
            }
        }

        if !state.directory.record_message(&message) {
            tracing::debug!(
                code = SESSION_PUSH_FOR_UNKNOWN_CHAT,
                chat_id = %chat_id,
                "message event for a chat missing from the directory"
            );
        }

        if !message.is_from(&self.current_user.id) {
            let unread_worthy = state
                .read_tracker
                .note_foreign_message(&chat_id, message.created_at_unix_ms);
            if selected {
                // The thread is on screen; the message is read immediately.
                state
                    .read_tracker
                    .note_read(&chat_id, now.max(message.created_at_unix_ms));
            } else if unread_worthy {
                state
                    .directory
                    .increment_unread(&chat_id, &self.current_user.id);
            }
        }
    }

    fn apply_chat_updated(&self, push: ChatUpdatedPush) {
        let mut state = self.locked();
        if !state.directory.apply_update(push.chat) {
            tracing::debug!(
                code = SESSION_PUSH_FOR_UNKNOWN_CHAT,
                "chat update for a chat missing from the directory"
            );
        }
    }

    fn apply_chat_read(&self, push: ChatReadPush) {
        let mut state = self.locked();
        state.directory.set_unread(&push.chat_id, &push.user_id, 0);
        if push.user_id == self.current_user.id {
            state.read_tracker.note_read(&push.chat_id, now_unix_ms());
        }
    }

    fn forward_ephemeral(&self, event: EphemeralEvent) {
        self.ephemeral_locked()
            .retain(|sub| sub.send(event.clone()).is_ok());
    }

    pub(super) fn locked(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn backend(&self) -> &B {
        &self.backend
    }

    pub(super) fn user(&self) -> &UserIdentity {
        &self.current_user
    }

    fn ephemeral_locked(&self) -> MutexGuard<'_, Vec<mpsc::Sender<EphemeralEvent>>> {
        self.ephemeral_subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<B: MessagingBackend + 'static> ChatSessionStore<B> {
    /// Registers the store's handlers on the realtime channel. The returned
    /// binding keeps the listeners attached; dropping it detaches them.
    pub fn attach(self: &Arc<Self>, channel: &RealtimeChannel) -> RealtimeBinding {
        let subscriptions = vec![
            channel.on_message({
                let store = Arc::clone(self);
                move |push: &NewMessagePush| {
                    store.apply_event(RealtimeEvent::NewMessage(push.clone()));
                }
            }),
            channel.on_chat_updated({
                let store = Arc::clone(self);
                move |push: &ChatUpdatedPush| {
                    store.apply_event(RealtimeEvent::ChatUpdated(push.clone()));
                }
            }),
            channel.on_chat_read({
                let store = Arc::clone(self);
                move |push: &ChatReadPush| {
                    store.apply_event(RealtimeEvent::ChatRead(push.clone()));
                }
            }),
            channel.on_typing({
                let store = Arc::clone(self);
                move |update: &TypingUpdate| {
                    store.apply_event(RealtimeEvent::Typing(update.clone()));
                }
            }),
            channel.on_presence_change({
                let store = Arc::clone(self);
                move |update: &PresenceUpdate| {
                    store.apply_event(RealtimeEvent::PresenceChange(update.clone()));
                }
            }),
        ];

        RealtimeBinding {
            _subscriptions: subscriptions,
        }
    }
}

/// Keeps the session store's realtime listeners registered; dropping the
/// binding detaches all of them at once.
pub struct RealtimeBinding {
    _subscriptions: Vec<Subscription>,
}
