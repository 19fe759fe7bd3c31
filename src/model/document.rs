//! The sanitized, display-ready view of a message.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Post-cleaning textual representation of a message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SanitizedDocument {
    /// Original file name of the input blob.
    pub filename: String,
    /// Raw subject, empty if absent.
    pub subject: String,
    /// Display label for the subject (e.g. `"Subject: Hi"` or `"No subject"`).
    pub subject_line: String,
    /// Display label for the sender.
    pub sender_line: String,
    /// Display label for the recipients.
    pub recipient_line: String,
    /// Display label for the date.
    pub date_line: String,
    /// Decoded `Cc` value, empty if absent.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cc: String,
    /// Threading headers (`Message-ID`, `References`, ...) found in the message.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Cleaned body with URLs removed.
    pub body: String,
    /// URLs removed from the body, in order of occurrence (duplicates kept).
    pub urls: Vec<String>,
    /// One summary per attachment, in encounter order.
    pub attachments: Vec<AttachmentSummary>,
}

/// Extracted text and metadata of one attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentSummary {
    /// Attachment file name.
    pub filename: String,
    /// MIME content type.
    pub content_type: String,
    /// Payload size in bytes.
    pub size: usize,
    /// Extracted text (trimmed) or a placeholder.
    pub text: String,
}

impl SanitizedDocument {
    /// Flatten into display lines: labels, body, then `name: text` per attachment.
    pub fn to_plain_text(&self) -> String {
        let mut lines = vec![
            self.subject_line.clone(),
            self.sender_line.clone(),
            self.recipient_line.clone(),
            self.date_line.clone(),
        ];
        if !self.body.is_empty() {
            lines.push(self.body.clone());
        }
        for attachment in &self.attachments {
            lines.push(format!("{}: {}", attachment.filename, attachment.text));
        }
        lines.join("\n")
    }
}
