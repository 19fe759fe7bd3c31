//! Attachment text extraction.
//!
//! Each attachment is dispatched by its lowercase extension to one pure
//! `fn(&[u8], &ExtractOptions) -> Result<String>` extractor. Failures never
//! propagate: they become localized placeholder strings so that sibling
//! attachments are unaffected.

mod csv;
#[cfg(feature = "office")]
mod docx;
#[cfg(feature = "pdf")]
mod pdf;
#[cfg(feature = "office")]
mod sheet;
mod text;

use std::panic::{self, AssertUnwindSafe};

use encoding_rs::Encoding;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;
use crate::i18n::{self, Lang};

/// Extractor family selected from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Pdf,
    Docx,
    Spreadsheet,
    Csv,
    PlainText,
    /// `.eml` / `.msg`: handled by the full pipeline.
    Message,
    /// Anything else: described, never decoded.
    Binary,
}

impl FormatKind {
    /// Map a lowercase extension (without the dot) to a format.
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "xlsx" | "xls" => Self::Spreadsheet,
            "csv" => Self::Csv,
            "txt" | "text" | "log" => Self::PlainText,
            "eml" | "msg" => Self::Message,
            _ => Self::Binary,
        }
    }

    /// Short name used in logs and placeholders.
    pub fn label(self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Docx => "DOCX",
            Self::Spreadsheet => "Excel",
            Self::Csv => "CSV",
            Self::PlainText => "text",
            Self::Message => "message",
            Self::Binary => "binary",
        }
    }
}

/// Lowercase extension of `filename` without the dot; empty if there is none.
pub fn extension_of(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Settings shared by all extractors.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Language of placeholders and sheet headers.
    pub lang: Lang,
    /// Encodings tried in order for CSV payloads.
    pub csv_encodings: Vec<&'static Encoding>,
    /// Encoding for text attachments that are not valid UTF-8.
    pub text_fallback: &'static Encoding,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ExtractOptions {
    /// Resolve encoding labels from the configuration.
    ///
    /// Unknown labels are skipped with a warning.
    pub fn from_config(config: &Config) -> Self {
        let csv_encodings: Vec<&'static Encoding> = config
            .extraction
            .csv_encodings
            .iter()
            .filter_map(|label| {
                let encoding = Encoding::for_label(label.trim().as_bytes());
                if encoding.is_none() {
                    warn!(label = %label, "Unknown CSV encoding label, skipping");
                }
                encoding
            })
            .collect();

        let text_fallback =
            Encoding::for_label(config.extraction.text_fallback_encoding.trim().as_bytes())
                .unwrap_or_else(|| {
                    warn!(
                        label = %config.extraction.text_fallback_encoding,
                        "Unknown text fallback encoding, using windows-1251"
                    );
                    encoding_rs::WINDOWS_1251
                });

        Self {
            lang: config.general.language,
            csv_encodings: if csv_encodings.is_empty() {
                vec![encoding_rs::UTF_8]
            } else {
                csv_encodings
            },
            text_fallback,
        }
    }
}

/// Turns an attached message into text by running the full pipeline on it.
pub trait NestedMessageReader {
    fn read_nested(&self, data: &[u8], filename: &str) -> Result<String>;
}

/// Extract text from one attachment. Never fails.
pub fn extract(
    data: &[u8],
    filename: &str,
    options: &ExtractOptions,
    nested: &dyn NestedMessageReader,
) -> String {
    let lang = options.lang;
    if data.is_empty() {
        return i18n::empty_file(lang, filename);
    }

    let ext = extension_of(filename);
    let kind = FormatKind::from_extension(&ext);
    debug!(filename = filename, format = kind.label(), size = data.len(), "Extracting attachment");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match kind {
        FormatKind::Pdf => extract_pdf(data, filename, options),
        FormatKind::Docx => extract_docx(data, filename, options),
        FormatKind::Spreadsheet => extract_sheet(data, filename, options),
        FormatKind::Csv => csv::extract(data, options),
        FormatKind::PlainText => Ok(text::extract(data, options)),
        FormatKind::Message => nested
            .read_nested(data, filename)
            .map(|body| format!("{}\n{}", i18n::nested_message(lang, filename), body)),
        FormatKind::Binary => {
            let ext = if ext.is_empty() { String::new() } else { format!(".{ext}") };
            Ok(i18n::binary_file(lang, filename, data.len(), &ext))
        }
    }));

    match outcome {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!(filename = filename, format = kind.label(), error = %e, "Attachment extraction failed");
            i18n::extraction_failed(lang).to_string()
        }
        Err(_) => {
            warn!(filename = filename, format = kind.label(), "Extractor panicked");
            i18n::extraction_failed(lang).to_string()
        }
    }
}

#[cfg(feature = "pdf")]
fn extract_pdf(data: &[u8], _filename: &str, _options: &ExtractOptions) -> Result<String> {
    pdf::extract(data)
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf(_data: &[u8], filename: &str, options: &ExtractOptions) -> Result<String> {
    Ok(i18n::format_unavailable(options.lang, "PDF", filename))
}

#[cfg(feature = "office")]
fn extract_docx(data: &[u8], _filename: &str, _options: &ExtractOptions) -> Result<String> {
    docx::extract(data)
}

#[cfg(not(feature = "office"))]
fn extract_docx(_data: &[u8], filename: &str, options: &ExtractOptions) -> Result<String> {
    Ok(i18n::format_unavailable(options.lang, "DOCX", filename))
}

#[cfg(feature = "office")]
fn extract_sheet(data: &[u8], _filename: &str, options: &ExtractOptions) -> Result<String> {
    sheet::extract(data, options)
}

#[cfg(not(feature = "office"))]
fn extract_sheet(_data: &[u8], filename: &str, options: &ExtractOptions) -> Result<String> {
    Ok(i18n::format_unavailable(options.lang, "Excel", filename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MailLensError;

    struct NoNested;

    impl NestedMessageReader for NoNested {
        fn read_nested(&self, _data: &[u8], filename: &str) -> Result<String> {
            Err(MailLensError::parse(filename, "not expected"))
        }
    }

    struct EchoNested;

    impl NestedMessageReader for EchoNested {
        fn read_nested(&self, data: &[u8], _filename: &str) -> Result<String> {
            Ok(String::from_utf8_lossy(data).into_owned())
        }
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("Report.PDF"), "pdf");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("README"), "");
    }

    #[test]
    fn test_format_dispatch_table() {
        assert_eq!(FormatKind::from_extension("xls"), FormatKind::Spreadsheet);
        assert_eq!(FormatKind::from_extension("log"), FormatKind::PlainText);
        assert_eq!(FormatKind::from_extension("msg"), FormatKind::Message);
        assert_eq!(FormatKind::from_extension("bin"), FormatKind::Binary);
    }

    #[test]
    fn test_empty_attachment_placeholder() {
        let text = extract(b"", "empty.pdf", &ExtractOptions::default(), &NoNested);
        assert_eq!(text, "Empty file: empty.pdf");
    }

    #[test]
    fn test_binary_placeholder_contains_size() {
        let data = vec![0u8; 2048];
        let text = extract(&data, "blob.bin", &ExtractOptions::default(), &NoNested);
        assert!(text.contains("2048"));
        assert!(text.contains("blob.bin"));
        assert!(text.contains(".bin"));
    }

    #[test]
    fn test_text_attachment() {
        let text = extract(b"  hello log  \n", "app.log", &ExtractOptions::default(), &NoNested);
        assert_eq!(text, "hello log");
    }

    #[test]
    fn test_nested_message_marker() {
        let text = extract(b"inner body", "fwd.eml", &ExtractOptions::default(), &EchoNested);
        assert_eq!(text, "Nested message: fwd.eml\ninner body");
    }

    #[test]
    fn test_nested_failure_becomes_generic_placeholder() {
        let text = extract(b"x", "fwd.eml", &ExtractOptions::default(), &NoNested);
        assert_eq!(text, "Could not extract data from attachment");
    }

    #[test]
    fn test_russian_placeholders() {
        let options = ExtractOptions {
            lang: Lang::Ru,
            ..ExtractOptions::default()
        };
        assert_eq!(extract(b"", "a.txt", &options, &NoNested), "Пустой файл: a.txt");
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn test_corrupt_pdf_is_contained() {
        let text = extract(b"%PDF-1.4 garbage", "bad.pdf", &ExtractOptions::default(), &NoNested);
        assert_eq!(text, "Could not extract data from attachment");
    }

    #[test]
    fn test_options_skip_unknown_labels() {
        let mut config = Config::default();
        config.extraction.csv_encodings = vec!["no-such-encoding".into(), "koi8-r".into()];
        let options = ExtractOptions::from_config(&config);
        assert_eq!(options.csv_encodings, vec![encoding_rs::KOI8_R]);
    }
}
