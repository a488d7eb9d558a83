//! Image attachments
//!
//! Turns a user-selected blob into an `input_image` content part carrying a
//! base64 `data:` URI, so the message can hold the image without any external
//! byte store. Nothing here checks that the bytes actually are an image.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

use crate::error::AttachmentError;
use crate::message::ContentPart;

const FALLBACK_MIME: &str = "application/octet-stream";

/// A binary blob the user wants to attach to their next message
#[derive(Debug, Clone)]
pub enum Attachment {
    /// Read from disk when the message is sent
    File(PathBuf),
    /// Already in memory
    Bytes {
        name: String,
        mime: String,
        data: Vec<u8>,
    },
}

impl Attachment {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Attachment::File(path.into())
    }

    pub fn bytes(name: impl Into<String>, mime: impl Into<String>, data: Vec<u8>) -> Self {
        Attachment::Bytes {
            name: name.into(),
            mime: mime.into(),
            data,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Attachment::File(path) => path.display().to_string(),
            Attachment::Bytes { name, .. } => name.clone(),
        }
    }
}

/// Encode an attachment as an image content part.
///
/// Reading a file is the only suspension point; the caller must not attach
/// the part to a message before this settles.
pub async fn encode(attachment: Attachment) -> Result<ContentPart, AttachmentError> {
    let (mime, data) = match attachment {
        Attachment::File(path) => {
            let data = tokio::fs::read(&path)
                .await
                .map_err(|source| AttachmentError::Read {
                    name: path.display().to_string(),
                    source,
                })?;
            (mime_for_path(&path).to_string(), data)
        }
        Attachment::Bytes { mime, data, .. } => {
            let mime = if mime.trim().is_empty() {
                FALLBACK_MIME.to_string()
            } else {
                mime
            };
            (mime, data)
        }
    };

    debug!(mime = %mime, bytes = data.len(), "encoded image attachment");
    Ok(ContentPart::image(data_uri(&mime, &data)))
}

pub fn data_uri(mime: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(data))
}

fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("svg") => "image/svg+xml",
        Some("heic") => "image/heic",
        Some("heif") => "image/heif",
        Some("avif") => "image/avif",
        _ => FALLBACK_MIME,
    }
}
