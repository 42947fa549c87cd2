//! Realtime layer: the persistent broker connection, room subscriptions,
//! and push-event dispatch.

pub mod channel;
pub mod listeners;
pub mod protocol;
