//! Parsed message structure produced by the structure walkers.

use std::collections::BTreeMap;

/// Which top-level parser handles a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    /// RFC 5322 message (`.eml`).
    Eml,
    /// Legacy Outlook compound document (`.msg`).
    LegacyCompound,
}

impl MessageFormat {
    /// Detect a message format from a file name's extension.
    ///
    /// Returns `None` for anything that is not a mail container.
    pub fn from_filename(filename: &str) -> Option<Self> {
        match crate::extract::extension_of(filename).as_str() {
            "eml" => Some(Self::Eml),
            "msg" => Some(Self::LegacyCompound),
            _ => None,
        }
    }
}

/// A fully walked message. Created once per input blob and discarded after
/// its text has been derived.
#[derive(Debug, Clone, Default)]
pub struct ParsedMessage {
    /// Decoded subject line.
    pub subject: String,
    /// Decoded `From` value.
    pub sender: String,
    /// Decoded `To` value.
    pub recipients: String,
    /// Decoded `Cc` value.
    pub cc: String,
    /// Date as written in the message (or rendered from the container's timestamp).
    pub date: String,
    /// Concatenated `text/plain` parts, or text derived from the HTML body.
    pub body_plain: String,
    /// Concatenated `text/html` parts.
    pub body_html: String,
    /// Selected threading/diagnostic headers.
    pub headers: BTreeMap<String, String>,
    /// Attachments in structural encounter order.
    pub attachments: Vec<Attachment>,
}

/// One attachment as found in the message structure.
#[derive(Debug, Clone)]
pub struct Attachment {
    /// File name, or a positional `attachment_<n>` fallback.
    pub filename: String,
    /// MIME content type (e.g. `"application/pdf"`).
    pub content_type: String,
    /// Decoded payload.
    pub data: Vec<u8>,
    /// Text recovered by the extractor, filled in by the pipeline.
    pub extracted_text: Option<String>,
}

impl Attachment {
    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Headers copied into [`ParsedMessage::headers`] when present.
pub const SELECTED_HEADERS: [&str; 4] = ["Message-ID", "References", "In-Reply-To", "X-Mailer"];

/// Positional fallback name for the attachment at `index`.
pub fn fallback_attachment_name(index: usize) -> String {
    format!("attachment_{index}")
}
