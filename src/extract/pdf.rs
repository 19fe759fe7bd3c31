//! PDF page text via `pdf-extract`.

use crate::error::{MailLensError, Result};

/// Text of all pages in page order.
pub fn extract(data: &[u8]) -> Result<String> {
    let text =
        pdf_extract::extract_text_from_mem(data).map_err(|e| MailLensError::extraction("PDF", e))?;
    Ok(text.trim().to_string())
}
