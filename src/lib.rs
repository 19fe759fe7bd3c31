//! `maillens`: clean text extraction and example-based classification for
//! email messages.
//!
//! This crate parses `.eml` and Outlook `.msg` messages with nested
//! attachments, recovers readable text from common attachment formats,
//! filters noise and injection phrases, and scores messages against
//! user-defined categories described by a few example messages.

pub mod classify;
pub mod config;
pub mod error;
pub mod extract;
pub mod i18n;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod text;

pub use classify::Classifier;
pub use error::{MailLensError, Result};
pub use pipeline::{Pipeline, ProcessedMessage};
