//! Conversation message types
//!
//! These are plain values shared between the store, the completion client and
//! whatever UI renders the conversation. A `Message` cannot be modified after
//! construction; the store only ever appends new ones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::MessageError;

/// Identifier of a single message, time-ordered and unique for the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One typed fragment of a message body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    /// Self-contained image reference, usually a `data:` URI
    #[serde(rename = "input_image")]
    Image { image_url: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image(image_url: impl Into<String>) -> Self {
        ContentPart::Image {
            image_url: image_url.into(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            ContentPart::Image { .. } => None,
        }
    }

    pub fn as_image_url(&self) -> Option<&str> {
        match self {
            ContentPart::Image { image_url } => Some(image_url),
            ContentPart::Text { .. } => None,
        }
    }
}

/// A single turn in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredMessage")]
pub struct Message {
    id: MessageId,
    role: Role,
    content: Vec<ContentPart>,
    timestamp: DateTime<Utc>,
}

/// Unchecked form used when reading a message back, e.g. from a saved log
#[derive(Deserialize)]
struct StoredMessage {
    id: MessageId,
    role: Role,
    content: Vec<ContentPart>,
    timestamp: DateTime<Utc>,
}

impl TryFrom<StoredMessage> for Message {
    type Error = MessageError;

    fn try_from(stored: StoredMessage) -> Result<Self, Self::Error> {
        if stored.content.is_empty() {
            return Err(MessageError::EmptyContent);
        }

        Ok(Self {
            id: stored.id,
            role: stored.role,
            content: stored.content,
            timestamp: stored.timestamp,
        })
    }
}

impl Message {
    /// Build a message stamped with a fresh id and the current time.
    ///
    /// Fails if `content` is empty, since an empty message must never reach
    /// the conversation log.
    pub fn new(role: Role, content: Vec<ContentPart>) -> Result<Self, MessageError> {
        if content.is_empty() {
            return Err(MessageError::EmptyContent);
        }

        Ok(Self {
            id: MessageId::new(),
            role,
            content,
            timestamp: Utc::now(),
        })
    }

    pub fn user(content: Vec<ContentPart>) -> Result<Self, MessageError> {
        Self::new(Role::User, content)
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::Assistant,
            content: vec![ContentPart::text(text)],
            timestamp: Utc::now(),
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &[ContentPart] {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// All text parts joined with newlines
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn images(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(ContentPart::as_image_url)
    }
}
