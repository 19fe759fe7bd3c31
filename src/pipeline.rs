//! End-to-end processing of one input blob.
//!
//! walk → attachment extraction (bounded worker pool) → cleaning and URL
//! removal → classification text → injection guard.

use std::collections::BTreeSet;
use std::thread;

use crossbeam_channel::bounded;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{MailLensError, Result};
use crate::extract::{self, ExtractOptions, NestedMessageReader};
use crate::i18n::{self, Lang};
use crate::model::document::{AttachmentSummary, SanitizedDocument};
use crate::model::message::{Attachment, MessageFormat, ParsedMessage};
use crate::parser;
use crate::text::{self, InjectionGuard};

/// A processed input: the display document and the guarded classifier input.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProcessedMessage {
    pub document: SanitizedDocument,
    pub classification_text: String,
}

/// Stateless message processor; share it freely between threads.
pub struct Pipeline {
    config: Config,
    options: ExtractOptions,
    guard: InjectionGuard,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        let options = ExtractOptions::from_config(&config);
        let guard = InjectionGuard::new(config.guard.patterns.as_deref());
        Self {
            config,
            options,
            guard,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn lang(&self) -> Lang {
        self.config.general.language
    }

    /// Process a blob: `.eml`/`.msg` are parsed as messages, anything else
    /// is extracted as a bare attachment whose text becomes the body.
    pub fn process(&self, data: &[u8], filename: &str) -> Result<ProcessedMessage> {
        let document = self.document(data, filename)?;
        let raw = prepare_for_classification(
            &document,
            self.lang(),
            self.config.extraction.attachment_summary_chars,
        );
        let classification_text = self.guard.sanitize(&raw);
        info!(
            filename = filename,
            body_chars = document.body.chars().count(),
            attachments = document.attachments.len(),
            urls = document.urls.len(),
            "Processed message"
        );
        Ok(ProcessedMessage {
            document,
            classification_text,
        })
    }

    /// Produce only the sanitized document.
    pub fn document(&self, data: &[u8], filename: &str) -> Result<SanitizedDocument> {
        self.document_at(data, filename, 0)
    }

    fn document_at(&self, data: &[u8], filename: &str, depth: usize) -> Result<SanitizedDocument> {
        let reader = NestedReader {
            pipeline: self,
            depth,
        };

        let Some(format) = MessageFormat::from_filename(filename) else {
            debug!(filename = filename, "Not a message container, extracting as attachment");
            let text = extract::extract(data, filename, &self.options, &reader);
            return Ok(self.assemble(
                filename,
                ParsedMessage {
                    body_plain: text,
                    ..ParsedMessage::default()
                },
            ));
        };

        let budget = self.config.extraction.max_nesting_depth.saturating_sub(depth);
        let mut parsed = parser::parse(data, format, filename, budget)?;
        let texts = self.extract_attachments(&parsed.attachments, &reader);
        for (attachment, text) in parsed.attachments.iter_mut().zip(texts) {
            attachment.extracted_text = Some(text);
        }
        Ok(self.assemble(filename, parsed))
    }

    /// Threads used for one message's attachments. Attached messages are
    /// already running on a pool worker, so they extract inline.
    fn pool_size(&self, attachments: usize, depth: usize) -> usize {
        if depth > 0 {
            return 1;
        }
        self.config.extraction.worker_count().min(attachments)
    }

    /// Extract every attachment on a bounded pool, keeping encounter order.
    fn extract_attachments(&self, attachments: &[Attachment], reader: &NestedReader<'_>) -> Vec<String> {
        let workers = self.pool_size(attachments.len(), reader.depth);
        if workers <= 1 {
            return attachments
                .iter()
                .map(|a| extract::extract(&a.data, &a.filename, &self.options, reader))
                .collect();
        }

        let (job_tx, job_rx) = bounded::<(usize, &Attachment)>(workers * 2);
        let (result_tx, result_rx) = bounded::<(usize, String)>(attachments.len());

        thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for (index, attachment) in job_rx {
                        let text = extract::extract(
                            &attachment.data,
                            &attachment.filename,
                            &self.options,
                            reader,
                        );
                        if result_tx.send((index, text)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(result_tx);
            for job in attachments.iter().enumerate() {
                if job_tx.send(job).is_err() {
                    break;
                }
            }
            drop(job_tx);
        });

        let mut texts = vec![String::new(); attachments.len()];
        for (index, text) in result_rx.try_iter() {
            texts[index] = text;
        }
        texts
    }

    fn assemble(&self, filename: &str, parsed: ParsedMessage) -> SanitizedDocument {
        let lang = self.lang();
        let cleaned = text::clean(&parsed.body_plain);
        let (body, urls) =
            text::extract_and_remove_urls(&cleaned, &self.config.extraction.url_placeholder);

        let attachments = parsed
            .attachments
            .iter()
            .map(|attachment| AttachmentSummary {
                filename: attachment.filename.clone(),
                content_type: attachment.content_type.clone(),
                size: attachment.size(),
                text: attachment
                    .extracted_text
                    .as_deref()
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
            })
            .collect();

        SanitizedDocument {
            filename: filename.to_string(),
            subject_line: i18n::subject_line(lang, &parsed.subject),
            sender_line: i18n::sender_line(lang, &parsed.sender),
            recipient_line: i18n::recipient_line(lang, &parsed.recipients),
            date_line: i18n::date_line(lang, &parsed.date),
            subject: parsed.subject,
            cc: parsed.cc,
            headers: parsed.headers,
            body,
            urls,
            attachments,
        }
    }
}

/// Runs attached messages back through the pipeline one level deeper.
struct NestedReader<'a> {
    pipeline: &'a Pipeline,
    depth: usize,
}

impl NestedMessageReader for NestedReader<'_> {
    fn read_nested(&self, data: &[u8], filename: &str) -> Result<String> {
        let depth = self.depth + 1;
        let max = self.pipeline.config.extraction.max_nesting_depth;
        if depth > max {
            return Err(MailLensError::parse(
                filename,
                format!("attached messages nested deeper than {max} levels"),
            ));
        }
        let document = self.pipeline.document_at(data, filename, depth)?;
        Ok(document.to_plain_text())
    }
}

/// Build the classifier input from a document: the subject line, the body
/// with its label, and the first `summary_chars` characters of each
/// non-empty, non-image attachment (deduplicated, sorted).
pub fn prepare_for_classification(
    document: &SanitizedDocument,
    lang: Lang,
    summary_chars: usize,
) -> String {
    let mut parts = Vec::new();
    if !document.subject.is_empty() {
        parts.push(document.subject_line.clone());
    }
    parts.push(format!("{}: {}", i18n::body_label(lang), document.body));

    let summaries: BTreeSet<String> = document
        .attachments
        .iter()
        .filter(|a| a.size > 0 && !a.content_type.contains("image"))
        .map(|a| a.text.chars().take(summary_chars).collect::<String>())
        .filter(|s| !s.trim().is_empty())
        .collect();
    if !summaries.is_empty() {
        parts.push(format!(
            "{}: {}",
            i18n::attachments_label(lang),
            summaries.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }
    parts.join("\n")
}
