//! Structure walker for RFC 5322 `.eml` messages.
//!
//! Top-level headers are read directly from the header block and decoded
//! through [`header::decode`]; the MIME tree is parsed with `mail-parser` and
//! visited recursively with a depth cap.

use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::{debug, warn};

use crate::error::{MailLensError, Result};
use crate::model::message::{fallback_attachment_name, Attachment, ParsedMessage, SELECTED_HEADERS};
use crate::parser::{header, mime};

/// Parse a complete `.eml` blob into a [`ParsedMessage`].
///
/// Fails only when the top-level envelope is unusable (no header block, or
/// no MIME structure) or the nesting exceeds `max_depth`.
pub fn parse_eml(data: &[u8], filename: &str, max_depth: usize) -> Result<ParsedMessage> {
    let data = skip_preamble(data);

    let header_end = find_header_end(data).unwrap_or(data.len());
    let headers = header::unfold_headers(&header::decode_header_bytes(&data[..header_end]));
    if headers.is_empty() {
        return Err(MailLensError::parse(filename, "no RFC 5322 header block found"));
    }

    let message = MessageParser::default()
        .parse(data)
        .ok_or_else(|| MailLensError::parse(filename, "MIME structure could not be parsed"))?;

    let decoded = |name: &str| {
        header::get_header(&headers, name)
            .map(header::decode)
            .unwrap_or_default()
    };

    let mut parsed = ParsedMessage {
        subject: decoded("subject"),
        sender: decoded("from"),
        recipients: decoded("to"),
        cc: decoded("cc"),
        date: decoded("date"),
        ..ParsedMessage::default()
    };
    for name in SELECTED_HEADERS {
        if let Some(value) = header::get_header(&headers, name) {
            parsed.headers.insert(name.to_string(), header::decode(value));
        }
    }

    let mut walker = Walker {
        filename,
        max_depth,
        parsed: &mut parsed,
    };
    walker.walk_message(&message, 0)?;

    if parsed.body_plain.trim().is_empty() && !parsed.body_html.trim().is_empty() {
        parsed.body_plain = mime::html_to_text(&parsed.body_html);
    }

    debug!(
        filename = filename,
        attachments = parsed.attachments.len(),
        "Parsed .eml message"
    );
    Ok(parsed)
}

struct Walker<'a> {
    filename: &'a str,
    max_depth: usize,
    parsed: &'a mut ParsedMessage,
}

impl Walker<'_> {
    fn walk_message(&mut self, message: &Message<'_>, depth: usize) -> Result<()> {
        match message.parts.first() {
            Some(root) => self.walk_part(message, root, depth),
            None => Ok(()),
        }
    }

    fn walk_part(&mut self, message: &Message<'_>, part: &MessagePart<'_>, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(MailLensError::parse(
                self.filename,
                format!("message nesting exceeds {} levels", self.max_depth),
            ));
        }

        if let PartType::Multipart(children) = &part.body {
            for &child in children {
                match message.parts.get(child as usize) {
                    Some(sub) => self.walk_part(message, sub, depth + 1)?,
                    None => warn!(filename = self.filename, part = child as usize, "Dangling MIME part"),
                }
            }
            return Ok(());
        }

        if is_attachment(part) {
            self.push_attachment(part);
            return Ok(());
        }

        if part.is_encoding_problem {
            warn!(
                filename = self.filename,
                "Charset problem in body part, decoded with lossy fallback"
            );
        }

        match &part.body {
            PartType::Text(text) => {
                let ctype = content_type_of(part);
                if ctype == "text/plain" {
                    self.parsed.body_plain.push_str(text);
                    self.parsed.body_plain.push('\n');
                } else {
                    debug!(content_type = %ctype, "Skipping non-plain text part");
                }
            }
            PartType::Html(html) => {
                self.parsed.body_html.push_str(html);
                self.parsed.body_html.push('\n');
            }
            PartType::Message(nested) => self.walk_message(nested, depth + 1)?,
            PartType::Binary(_) | PartType::InlineBinary(_) => {
                debug!(
                    content_type = %content_type_of(part),
                    "Skipping unnamed binary part"
                );
            }
            PartType::Multipart(_) => {}
        }
        Ok(())
    }

    fn push_attachment(&mut self, part: &MessagePart<'_>) {
        let index = self.parsed.attachments.len();
        let mut filename = part
            .attachment_name()
            .map(header::decode)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| fallback_attachment_name(index));

        if matches!(part.body, PartType::Message(_))
            && crate::model::message::MessageFormat::from_filename(&filename).is_none()
        {
            filename.push_str(".eml");
        }

        self.parsed.attachments.push(Attachment {
            filename,
            content_type: content_type_of(part),
            data: part.contents().to_vec(),
            extracted_text: None,
        });
    }
}

/// A part is an attachment when it is named or explicitly disposed as one.
fn is_attachment(part: &MessagePart<'_>) -> bool {
    part.attachment_name().is_some()
        || part
            .content_disposition()
            .is_some_and(|d| d.ctype().eq_ignore_ascii_case("attachment"))
}

/// `type/subtype` in lowercase; `text/plain` when the header is missing.
fn content_type_of(part: &MessagePart<'_>) -> String {
    part.content_type()
        .map(|ct| match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub),
            None => ct.ctype().to_string(),
        })
        .unwrap_or_else(|| "text/plain".to_string())
        .to_ascii_lowercase()
}

/// Skip a UTF-8 BOM and an mbox `From ` separator line if present.
fn skip_preamble(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Find the byte offset where headers end (position of the first blank line).
fn find_header_end(data: &[u8]) -> Option<usize> {
    for i in 0..data.len().saturating_sub(1) {
        if data[i] == b'\n' && data[i + 1] == b'\n' {
            return Some(i);
        }
        if data[i..].starts_with(b"\r\n\r\n") {
            return Some(i);
        }
    }
    None
}
