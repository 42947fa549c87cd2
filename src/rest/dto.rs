//! Wire shapes of the messaging API and their conversion into domain
//! entities. The realtime push protocol reuses the same payloads.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::chat::{Chat, LastMessage, Participant, ProductStatus, ProductSummary};
use crate::domain::message::{Delivery, Message};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDto {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummaryDto {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub price_cents: i64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessageDto {
    pub message_id: String,
    pub sender_id: String,
    pub preview: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub chat_id: String,
    pub sender: ParticipantDto,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDto {
    pub id: String,
    pub participants: Vec<ParticipantDto>,
    #[serde(default)]
    pub product: Option<ProductSummaryDto>,
    #[serde(default)]
    pub last_message: Option<LastMessageDto>,
    #[serde(default)]
    pub unread_counts: HashMap<String, u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateChatBody {
    pub receiver_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendMessageBody {
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

/// Error body the API attaches to non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub message: Option<String>,
}

impl ParticipantDto {
    pub fn into_domain(self) -> Participant {
        Participant {
            id: self.id,
            display_name: self.display_name,
            avatar_url: self.avatar_url,
        }
    }
}

impl ProductSummaryDto {
    pub fn into_domain(self) -> ProductSummary {
        ProductSummary {
            id: self.id,
            title: self.title,
            thumbnail_url: self.thumbnail_url,
            price_cents: self.price_cents,
            status: ProductStatus::from_wire(&self.status),
        }
    }
}

impl MessageDto {
    pub fn into_domain(self) -> Message {
        let created = self.created_at.timestamp_millis();
        Message {
            delivery: Delivery::Confirmed { server_id: self.id },
            chat_id: self.chat_id,
            sender: self.sender.into_domain(),
            content: self.content,
            attachments: self.attachments,
            created_at_unix_ms: created,
            updated_at_unix_ms: self
                .updated_at
                .map(|at| at.timestamp_millis())
                .unwrap_or(created),
        }
    }
}

impl ChatDto {
    /// Converts into the domain entity, enforcing the two-participant
    /// invariant and filling a zero unread entry for any participant the
    /// server omitted from the map.
    pub fn into_domain(self) -> Result<Chat, String> {
        if self.participants.len() != 2 {
            return Err(format!(
                "chat {} has {} participants, expected exactly 2",
                self.id,
                self.participants.len()
            ));
        }
        if self.participants[0].id == self.participants[1].id {
            return Err(format!(
                "chat {} lists the same participant twice",
                self.id
            ));
        }

        let participants: Vec<Participant> = self
            .participants
            .into_iter()
            .map(ParticipantDto::into_domain)
            .collect();

        let mut unread_counts = self.unread_counts;
        for participant in &participants {
            unread_counts.entry(participant.id.clone()).or_insert(0);
        }

        Ok(Chat {
            id: self.id,
            participants,
            product: self.product.map(ProductSummaryDto::into_domain),
            last_message: self.last_message.map(|last| LastMessage {
                message_id: last.message_id,
                sender_id: last.sender_id,
                preview: last.preview,
                sent_at_unix_ms: last.sent_at.timestamp_millis(),
            }),
            unread_counts,
            created_at_unix_ms: self.created_at.timestamp_millis(),
            updated_at_unix_ms: self.updated_at.timestamp_millis(),
        })
    }
}
