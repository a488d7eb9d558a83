pub mod attachment;
pub mod completion;
pub mod config;
pub mod error;
pub mod message;
pub mod store;

// Re-export main types for convenience
pub use attachment::Attachment;
pub use completion::{Completer, CompletionClient};
pub use config::Config;
pub use error::{AttachmentError, CompletionError, MessageError, Phase, SendError};
pub use message::{ContentPart, Message, MessageId, Role};
pub use store::{ConversationState, ConversationStore, ConversationWatcher};
