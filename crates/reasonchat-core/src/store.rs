//! Conversation store
//!
//! The single owner of the message log and the composing flag. UIs hold a
//! handle to the store, read snapshots (or subscribe to changes) and mutate
//! only through the operations below.
//!
//! A send cycle runs: encode the attachment if any, append the user message,
//! raise the composing flag, ask the completer, append the reply, lower the
//! flag. The flag is owned by a guard, so it drops back to `false` on every
//! exit path, including when the send future itself is dropped.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info};

use crate::attachment::{self, Attachment};
use crate::completion::Completer;
use crate::error::SendError;
use crate::message::{ContentPart, Message};

/// Read-only view of the conversation handed to renderers
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub is_composing: bool,
}

pub type ConversationWatcher = watch::Receiver<ConversationState>;

pub struct ConversationStore {
    state: watch::Sender<ConversationState>,
    completer: Arc<dyn Completer>,
    // Held for a whole send cycle so replies land in request order
    in_flight: Mutex<()>,
}

impl ConversationStore {
    pub fn new(completer: Arc<dyn Completer>) -> Self {
        let (state, _) = watch::channel(ConversationState::default());
        Self {
            state,
            completer,
            in_flight: Mutex::new(()),
        }
    }

    /// Start the conversation with an assistant greeting already in the log
    pub fn with_greeting(completer: Arc<dyn Completer>, greeting: impl Into<String>) -> Self {
        let store = Self::new(completer);
        store.add_message(Message::assistant_text(greeting));
        store
    }

    pub fn subscribe(&self) -> ConversationWatcher {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ConversationState {
        self.state.borrow().clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.borrow().messages.clone()
    }

    pub fn is_composing(&self) -> bool {
        self.state.borrow().is_composing
    }

    pub fn add_message(&self, message: Message) {
        self.state.send_modify(|state| state.messages.push(message));
    }

    pub fn set_composing(&self, composing: bool) {
        self.state.send_if_modified(|state| {
            if state.is_composing == composing {
                return false;
            }
            state.is_composing = composing;
            true
        });
    }

    /// Send a user turn and append the assistant's reply.
    ///
    /// Empty `text` is not rejected here. On failure the error is logged and
    /// returned; the log keeps the user message (unless the attachment could
    /// not be read, in which case nothing is appended) and never receives a
    /// partial assistant message.
    pub async fn send_message(
        &self,
        text: &str,
        image: Option<Attachment>,
    ) -> Result<(), SendError> {
        let _in_flight = self.in_flight.lock().await;

        let mut content = Vec::with_capacity(2);
        if let Some(attachment) = image {
            let name = attachment.name();
            match attachment::encode(attachment).await {
                Ok(part) => content.push(part),
                Err(err) => {
                    error!(attachment = %name, error = %err, "failed to read attachment");
                    return Err(err.into());
                }
            }
        }
        content.push(ContentPart::text(text));

        let user_message = Message::user(content)?;
        debug!(id = %user_message.id(), "appending user message");
        self.add_message(user_message);

        let history = self.messages();
        let reply = {
            let _composing = ComposingGuard::acquire(self);
            self.completer.complete(&history).await
        };

        match reply {
            Ok(text) => {
                let reply = Message::assistant_text(text);
                info!(id = %reply.id(), history_len = history.len(), "assistant reply received");
                self.add_message(reply);
                Ok(())
            }
            Err(err) => {
                error!(phase = %err.phase(), error = %err, "completion failed");
                Err(err.into())
            }
        }
    }
}

/// Keeps `is_composing` raised for as long as it lives
struct ComposingGuard<'a> {
    store: &'a ConversationStore,
}

impl<'a> ComposingGuard<'a> {
    fn acquire(store: &'a ConversationStore) -> Self {
        store.set_composing(true);
        Self { store }
    }
}

impl Drop for ComposingGuard<'_> {
    fn drop(&mut self) {
        self.store.set_composing(false);
    }
}
