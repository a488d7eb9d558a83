//! Chat-completion client with reasoning continuation
//!
//! Every logical turn costs two requests. The first asks the backend for a
//! reply with reasoning enabled. The second replays the history plus that
//! reply, carrying the backend's `reasoning_details` back verbatim, so that
//! backends which drop reasoning state between calls can continue the same
//! chain of thought. The second reply is the one handed to the caller.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{CompletionError, Phase};
use crate::message::{ContentPart, Message, Role};

/// Something that can turn a conversation history into the next assistant reply
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, history: &[Message]) -> Result<String, CompletionError>;
}

#[derive(Serialize)]
struct Reasoning {
    enabled: bool,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestMessage<'a> {
    Turn {
        role: Role,
        content: &'a [ContentPart],
    },
    /// Phase 1 reply replayed in phase 2. Both fields go back exactly as
    /// received; `reasoning_details` is `null` when the backend sent none.
    Continuation {
        role: Role,
        content: &'a Value,
        reasoning_details: &'a Option<Value>,
    },
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<RequestMessage<'a>>,
    reasoning: Reasoning,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Value,
    #[serde(default)]
    reasoning_details: Option<Value>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    reasoning_details: Option<Value>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

/// The part of a phase 1 reply that phase 2 needs
#[derive(Debug, Clone, PartialEq)]
struct AssistantTurn {
    content: Value,
    reasoning_details: Option<Value>,
}

impl AssistantTurn {
    fn from_choice(choice: Choice) -> Self {
        // No message at all replays as an empty reply
        let message = choice.message.unwrap_or_else(|| ResponseMessage {
            content: Value::String(String::new()),
            reasoning_details: None,
        });
        Self {
            content: message.content,
            // Top-level placement wins; some backends nest it on the message.
            reasoning_details: choice.reasoning_details.or(message.reasoning_details),
        }
    }
}

#[derive(Clone)]
pub struct CompletionClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl CompletionClient {
    pub fn new(api_key: Option<&str>, base_url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.map(str::to_string),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.api_key.as_deref(), &config.base_url(), &config.model())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn post(
        &self,
        phase: Phase,
        messages: Vec<RequestMessage<'_>>,
    ) -> Result<CompletionResponse, CompletionError> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            reasoning: Reasoning { enabled: true },
        };

        let mut builder = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder
            .send()
            .await
            .map_err(|source| CompletionError::Transport { phase, source })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%phase, status = status.as_u16(), "completion backend returned an error");
            return Err(CompletionError::Upstream {
                phase,
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<CompletionResponse>()
            .await
            .map_err(|source| CompletionError::Transport { phase, source })
    }

    async fn initial(&self, history: &[Message]) -> Result<AssistantTurn, CompletionError> {
        let response = self.post(Phase::Initial, history_messages(history)).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(CompletionError::EmptyResponse {
                phase: Phase::Initial,
            })?;

        let turn = AssistantTurn::from_choice(choice);
        debug!(
            content_is_text = turn.content.is_string(),
            has_reasoning = turn.reasoning_details.is_some(),
            "initial completion received"
        );
        Ok(turn)
    }

    async fn continuation(
        &self,
        history: &[Message],
        turn: &AssistantTurn,
    ) -> Result<String, CompletionError> {
        let mut messages = history_messages(history);
        messages.push(RequestMessage::Continuation {
            role: Role::Assistant,
            content: &turn.content,
            reasoning_details: &turn.reasoning_details,
        });

        let response = self.post(Phase::Continuation, messages).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(CompletionError::EmptyResponse {
                phase: Phase::Continuation,
            })?;

        Ok(choice
            .message
            .map(|m| reply_text(&m.content))
            .unwrap_or_default())
    }
}

#[async_trait]
impl Completer for CompletionClient {
    async fn complete(&self, history: &[Message]) -> Result<String, CompletionError> {
        let turn = self.initial(history).await?;
        self.continuation(history, &turn).await
    }
}

/// Plain text of a reply. Structured content is reduced to its text parts.
fn reply_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

fn history_messages(history: &[Message]) -> Vec<RequestMessage<'_>> {
    history
        .iter()
        .map(|m| RequestMessage::Turn {
            role: m.role(),
            content: m.content(),
        })
        .collect()
}
