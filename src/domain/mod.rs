//! Domain layer: core entities and state containers for the messaging engine.

pub mod chat;
pub mod directory;
pub mod events;
pub mod identity;
pub mod message;
pub mod timeline;

/// Current wall-clock time as unix milliseconds, the timestamp unit used
/// throughout the domain layer.
pub fn now_unix_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
