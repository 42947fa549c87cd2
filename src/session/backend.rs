use async_trait::async_trait;

use crate::domain::{chat::Chat, message::Message};
use crate::rest::error::ApiError;

/// Port over the durable messaging operations the session store needs.
///
/// Implementations perform exactly one attempt per call and classify
/// failures; the store decides what a failure means for session state.
#[async_trait]
pub trait MessagingBackend: Send + Sync {
    async fn list_chats(&self) -> Result<Vec<Chat>, ApiError>;

    async fn get_chat(&self, chat_id: &str) -> Result<Chat, ApiError>;

    /// Full history for one chat, oldest first.
    async fn get_messages(&self, chat_id: &str) -> Result<Vec<Message>, ApiError>;

    /// Creates a chat with `receiver_id`, optionally anchored to a product.
    /// The server returns the existing chat when one already exists for the
    /// same pair and product.
    async fn create_chat(
        &self,
        receiver_id: &str,
        product_id: Option<&str>,
    ) -> Result<Chat, ApiError>;

    async fn send_message(
        &self,
        chat_id: &str,
        content: &str,
        attachments: &[String],
    ) -> Result<Message, ApiError>;

    async fn mark_read(&self, chat_id: &str) -> Result<(), ApiError>;

    async fn delete_chat(&self, chat_id: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl<T: MessagingBackend + ?Sized> MessagingBackend for std::sync::Arc<T> {
    async fn list_chats(&self) -> Result<Vec<Chat>, ApiError> {
        (**self).list_chats().await
    }

    async fn get_chat(&self, chat_id: &str) -> Result<Chat, ApiError> {
        (**self).get_chat(chat_id).await
    }

    async fn get_messages(&self, chat_id: &str) -> Result<Vec<Message>, ApiError> {
        (**self).get_messages(chat_id).await
    }

    async fn create_chat(
        &self,
        receiver_id: &str,
        product_id: Option<&str>,
    ) -> Result<Chat, ApiError> {
        (**self).create_chat(receiver_id, product_id).await
    }

    async fn send_message(
        &self,
        chat_id: &str,
        content: &str,
        attachments: &[String],
    ) -> Result<Message, ApiError> {
        (**self).send_message(chat_id, content, attachments).await
    }

    async fn mark_read(&self, chat_id: &str) -> Result<(), ApiError> {
        (**self).mark_read(chat_id).await
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<(), ApiError> {
        (**self).delete_chat(chat_id).await
    }
}
