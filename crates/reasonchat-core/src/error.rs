use std::fmt;

use thiserror::Error;

/// Which leg of the two-call completion exchange failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initial,
    Continuation,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Initial => f.write_str("initial"),
            Phase::Continuation => f.write_str("continuation"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("a message must have at least one content part")]
    EmptyContent,
}

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("Failed to read attachment {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Upstream completion error during {phase} call: {status} {body}")]
    Upstream {
        phase: Phase,
        status: u16,
        body: String,
    },

    #[error("Completion backend returned no choices during {phase} call")]
    EmptyResponse { phase: Phase },

    #[error("Request to completion backend failed during {phase} call: {source}")]
    Transport {
        phase: Phase,
        #[source]
        source: reqwest::Error,
    },
}

impl CompletionError {
    pub fn phase(&self) -> Phase {
        match self {
            CompletionError::Upstream { phase, .. }
            | CompletionError::EmptyResponse { phase }
            | CompletionError::Transport { phase, .. } => *phase,
        }
    }
}

/// Everything that can end a `send_message` cycle early
#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Message(#[from] MessageError),
}
