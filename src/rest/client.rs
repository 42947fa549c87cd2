use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::domain::{
    chat::Chat,
    identity::SessionCredentials,
    message::Message,
};
use crate::infra::{config::ApiConfig, error::AppError};
use crate::rest::dto::{ApiErrorBody, ChatDto, CreateChatBody, MessageDto, SendMessageBody};
use crate::rest::error::ApiError;
use crate::session::backend::MessagingBackend;

/// Stateless facade over the messaging REST API.
///
/// Every operation is a single attempt with the caller-supplied bearer
/// credential attached; failures are classified into [`ApiError`] and
/// returned, never retried or cached here.
pub struct RestBackend {
    http: reqwest::Client,
    base_url: String,
    credentials: SessionCredentials,
}

impl RestBackend {
    pub fn new(config: &ApiConfig, credentials: SessionCredentials) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(AppError::HttpClientInit)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            credentials,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn dispatch(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ApiError> {
        let response = request
            .bearer_auth(self.credentials.token())
            .send()
            .await
            .map_err(|error| ApiError::NetworkFailure(error.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = read_failure_message(response).await;
        Err(match status.as_u16() {
            401 => ApiError::Unauthorized(message),
            403 => ApiError::Forbidden(message),
            404 => ApiError::NotFound(message),
            400 => ApiError::InvalidRequest(message),
            code => ApiError::ServerError {
                status: code,
                message,
            },
        })
    }
}

async fn decode_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status().as_u16();
    response.json::<T>().await.map_err(|error| ApiError::ServerError {
        status,
        message: format!("malformed response body: {error}"),
    })
}

async fn read_failure_message(response: reqwest::Response) -> String {
    let fallback = response
        .status()
        .canonical_reason()
        .unwrap_or("request failed")
        .to_owned();

    match response.json::<ApiErrorBody>().await {
        Ok(ApiErrorBody {
            message: Some(message),
        }) if !message.is_empty() => message,
        _ => fallback,
    }
}

fn chat_from_dto(dto: ChatDto) -> Result<Chat, ApiError> {
    dto.into_domain().map_err(|reason| ApiError::ServerError {
        status: 200,
        message: format!("malformed response body: {reason}"),
    })
}

#[async_trait::async_trait]
impl MessagingBackend for RestBackend {
    async fn list_chats(&self) -> Result<Vec<Chat>, ApiError> {
        let response = self.dispatch(self.http.get(self.endpoint("/chats"))).await?;
        let dtos: Vec<ChatDto> = decode_json(response).await?;
        dtos.into_iter().map(chat_from_dto).collect()
    }

    async fn get_chat(&self, chat_id: &str) -> Result<Chat, ApiError> {
        let url = self.endpoint(&format!("/chats/{chat_id}"));
        let response = self.dispatch(self.http.get(url)).await?;
        chat_from_dto(decode_json(response).await?)
    }

    async fn get_messages(&self, chat_id: &str) -> Result<Vec<Message>, ApiError> {
        let url = self.endpoint(&format!("/chats/{chat_id}/messages"));
        let response = self.dispatch(self.http.get(url)).await?;
        let dtos: Vec<MessageDto> = decode_json(response).await?;
        Ok(dtos.into_iter().map(MessageDto::into_domain).collect())
    }

    async fn create_chat(
        &self,
        receiver_id: &str,
        product_id: Option<&str>,
    ) -> Result<Chat, ApiError> {
        let body = CreateChatBody {
            receiver_id: receiver_id.to_owned(),
            product_id: product_id.map(str::to_owned),
        };
        let response = self
            .dispatch(self.http.post(self.endpoint("/chats")).json(&body))
            .await?;
        chat_from_dto(decode_json(response).await?)
    }

    async fn send_message(
        &self,
        chat_id: &str,
        content: &str,
        attachments: &[String],
    ) -> Result<Message, ApiError> {
        let body = SendMessageBody {
            content: content.to_owned(),
            attachments: attachments.to_vec(),
        };
        let url = self.endpoint(&format!("/chats/{chat_id}/messages"));
        let response = self.dispatch(self.http.post(url).json(&body)).await?;
        let dto: MessageDto = decode_json(response).await?;
        Ok(dto.into_domain())
    }

    async fn mark_read(&self, chat_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("/chats/{chat_id}/read"));
        self.dispatch(self.http.put(url)).await?;
        Ok(())
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("/chats/{chat_id}"));
        self.dispatch(self.http.delete(url)).await?;
        Ok(())
    }
}
