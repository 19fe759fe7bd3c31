//! Paragraph text from Word (`.docx`) documents.
//!
//! A `.docx` is a ZIP archive; the body lives in `word/document.xml` as
//! `<w:p>` paragraphs made of `<w:t>` runs.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{MailLensError, Result};

const DOCUMENT_PART: &str = "word/document.xml";

/// Paragraphs in document order, one per line.
pub fn extract(data: &[u8]) -> Result<String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(data)).map_err(|e| MailLensError::extraction("DOCX", e))?;
    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| MailLensError::extraction("DOCX", e))?
        .read_to_string(&mut xml)
        .map_err(|e| MailLensError::extraction("DOCX", e))?;

    Ok(paragraphs(&xml)?.join("\n").trim().to_string())
}

fn paragraphs(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.name().as_ref() == b"w:t" {
                    in_text = true;
                }
            }
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" | b"w:cr" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().map_err(|e| MailLensError::extraction("DOCX", e))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(MailLensError::extraction("DOCX", e)),
        }
    }
    Ok(paragraphs)
}
