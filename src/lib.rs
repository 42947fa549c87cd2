//! Real-time chat engine for the Tradewind marketplace.
//!
//! Buyers and sellers exchange messages about listings through three
//! cooperating components:
//!
//! - [`RestBackend`] — stateless, single-attempt facade over the messaging
//!   REST API.
//! - [`RealtimeChannel`] — the persistent broker connection: handshake,
//!   room subscriptions, and push-event dispatch to registered listeners.
//! - [`ChatSessionStore`] — the authoritative in-memory session state: the
//!   chat directory, the active thread's timeline, unread bookkeeping, and
//!   the optimistic send pipeline. The store is the only component that
//!   mutates shared state; REST results and push events both flow through
//!   it.
//!
//! A typical session wires the three together:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tradewind_messaging::{
//!     ChatSessionStore, RealtimeChannel, RestBackend, SessionCredentials, UserIdentity,
//! };
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = tradewind_messaging::infra::config::load(None)?;
//! let credentials = SessionCredentials::new("bearer-from-auth");
//! let me = UserIdentity {
//!     id: "u1".into(),
//!     display_name: "Ada".into(),
//!     avatar_url: None,
//! };
//!
//! let backend = RestBackend::new(&config.api, credentials.clone())?;
//! let store = Arc::new(ChatSessionStore::new(backend, me));
//! let channel = RealtimeChannel::new(config.realtime.clone());
//!
//! let _binding = store.attach(&channel);
//! channel.connect(&credentials).await?;
//! store.load_chats().await?;
//! channel.join_rooms_for_user(&store.chat_room_ids());
//! # Ok(())
//! # }
//! ```

pub mod domain;
pub mod infra;
pub mod realtime;
pub mod rest;
pub mod session;

#[cfg(test)]
mod test_support;

pub use domain::{
    chat::{Chat, LastMessage, Participant, ProductStatus, ProductSummary},
    events::{
        ChatReadPush, ChatUpdatedPush, ConnectionStatus, EphemeralEvent, NewMessagePush,
        PresenceUpdate, RealtimeEvent, TypingUpdate,
    },
    identity::{SessionCredentials, UserIdentity},
    message::{Delivery, Message},
};
pub use realtime::{
    channel::{RealtimeChannel, RealtimeError},
    listeners::Subscription,
};
pub use rest::{client::RestBackend, error::ApiError};
pub use session::{
    backend::MessagingBackend,
    store::{ChatSessionStore, RealtimeBinding, Selection, StoreError},
};
