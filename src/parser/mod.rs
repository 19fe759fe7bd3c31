//! Message parsing: EML and Outlook `.msg` walkers, header decoding, HTML to text.

pub mod eml;
pub mod header;
pub mod mime;
#[cfg(feature = "outlook")]
pub mod msg;

use crate::error::Result;
use crate::model::message::{MessageFormat, ParsedMessage};

/// Parse a message blob with the walker for `format`.
///
/// `max_depth` bounds the nesting of multiparts and attached messages.
pub fn parse(
    data: &[u8],
    format: MessageFormat,
    filename: &str,
    max_depth: usize,
) -> Result<ParsedMessage> {
    match format {
        MessageFormat::Eml => eml::parse_eml(data, filename, max_depth),
        MessageFormat::LegacyCompound => parse_compound(data, filename),
    }
}

#[cfg(feature = "outlook")]
fn parse_compound(data: &[u8], filename: &str) -> Result<ParsedMessage> {
    msg::parse_msg(data, filename)
}

#[cfg(not(feature = "outlook"))]
fn parse_compound(_data: &[u8], filename: &str) -> Result<ParsedMessage> {
    Err(crate::error::MailLensError::parse(
        filename,
        "Outlook .msg support is not enabled in this build",
    ))
}
