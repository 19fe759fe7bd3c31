//! Core data model: parsed messages, sanitized documents, categories and results.

pub mod classification;
pub mod document;
pub mod message;
